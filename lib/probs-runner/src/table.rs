//! Delimited tables mapped column by column onto ontology concepts.

use crate::error::ConfigurationError;
use crate::vocabulary::{Vocabulary, SYSTEM_NAMESPACE};
use md5::{Digest, Md5};
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// How a delimited file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub delimiter: char,
    /// Whether the first line names the columns.
    pub header: bool,
    pub quote: char,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            header: true,
            quote: '"',
        }
    }
}

impl FormatOptions {
    /// Tab-separated values with a header line.
    pub fn tsv() -> Self {
        Self {
            delimiter: '\t',
            ..Self::default()
        }
    }

    fn delimiter_byte(self) -> Result<u8, ConfigurationError> {
        ascii(self.delimiter, "delimiter")
    }

    fn quote_byte(self) -> Result<u8, ConfigurationError> {
        ascii(self.quote, "quote")
    }
}

fn ascii(c: char, what: &str) -> Result<u8, ConfigurationError> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| ConfigurationError::InvalidFormat(format!("the {what} {c:?} is not ASCII")))
}

/// The datatype a column's values get in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Decimal,
    Double,
    Boolean,
    /// The value is an IRI.
    Iri,
}

impl ColumnType {
    /// The datatype name understood by the engine's tuple tables.
    pub fn engine_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "xsd:integer",
            Self::Decimal => "xsd:decimal",
            Self::Double => "xsd:double",
            Self::Boolean => "xsd:boolean",
            Self::Iri => "iri",
        }
    }
}

/// Maps the values of one column onto a property of the row's subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub column: String,
    /// The property concept, as `prefix:local` or `<iri>`.
    pub property: String,
    pub datatype: ColumnType,
}

/// Where the rows of a table come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableData {
    File(PathBuf),
    Rows {
        /// The name of the file the rows are written to.
        name: String,
        header: Vec<String>,
        records: Vec<Vec<String>>,
    },
}

/// A delimited table together with its mapping.
///
/// Every row becomes one subject, minted by appending the value of the key column to the
/// subject prefix. The subject is an instance of the class concept and gets one property
/// per mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSource {
    data: TableData,
    format: FormatOptions,
    key_column: String,
    subject_prefix: String,
    class: String,
    columns: Vec<ColumnMapping>,
}

impl TableSource {
    pub fn from_file(
        path: impl Into<PathBuf>,
        key_column: impl Into<String>,
        subject_prefix: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        Self::new(
            TableData::File(path.into()),
            key_column.into(),
            subject_prefix.into(),
            class.into(),
        )
    }

    /// A table held in memory. It is written out as a delimited file named `name`.
    pub fn from_rows(
        name: impl Into<String>,
        header: Vec<String>,
        records: Vec<Vec<String>>,
        key_column: impl Into<String>,
        subject_prefix: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        Self::new(
            TableData::Rows {
                name: name.into(),
                header,
                records,
            },
            key_column.into(),
            subject_prefix.into(),
            class.into(),
        )
    }

    fn new(data: TableData, key_column: String, subject_prefix: String, class: String) -> Self {
        Self {
            data,
            format: FormatOptions::default(),
            key_column,
            subject_prefix,
            class,
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_column(
        mut self,
        column: impl Into<String>,
        property: impl Into<String>,
        datatype: ColumnType,
    ) -> Self {
        self.columns.push(ColumnMapping {
            column: column.into(),
            property: property.into(),
            datatype,
        });
        self
    }

    pub fn data(&self) -> &TableData {
        &self.data
    }

    pub fn format(&self) -> FormatOptions {
        self.format
    }

    pub fn columns(&self) -> &[ColumnMapping] {
        &self.columns
    }

    /// The file name the table is staged under.
    pub fn file_name(&self) -> String {
        match &self.data {
            TableData::File(path) => path
                .file_name()
                .map_or_else(|| "table.csv".to_owned(), |n| n.to_string_lossy().into_owned()),
            TableData::Rows { name, .. } => name.clone(),
        }
    }

    /// Checks that every mapped column exists and the rows are well-formed.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.format.delimiter_byte()?;
        self.format.quote_byte()?;
        let header = match &self.data {
            TableData::Rows {
                header, records, ..
            } => {
                for (index, record) in records.iter().enumerate() {
                    if record.len() != header.len() {
                        return Err(ConfigurationError::RowLength {
                            row: index + 1,
                            found: record.len(),
                            expected: header.len(),
                        });
                    }
                }
                Some(header.clone())
            }
            TableData::File(path) if self.format.header => Some(self.read_header(path)?),
            TableData::File(_) => None,
        };

        for column in self.mapped_columns() {
            let known = match &header {
                Some(header) => header.iter().any(|name| name == column),
                // Without a header, columns are referred to by their position.
                None => column.parse::<usize>().is_ok_and(|position| position > 0),
            };
            if !known {
                return Err(ConfigurationError::UnknownColumn {
                    column: column.to_owned(),
                    header: header.unwrap_or_default(),
                });
            }
        }
        Ok(())
    }

    fn read_header(&self, path: &Path) -> Result<Vec<String>, ConfigurationError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.format.delimiter_byte()?)
            .quote(self.format.quote_byte()?)
            .has_headers(true)
            .from_path(path)
            .map_err(|e| table_error(path, &e))?;
        let header = reader.headers().map_err(|e| table_error(path, &e))?;
        Ok(header.iter().map(str::to_owned).collect())
    }

    fn mapped_columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.key_column.as_str())
            .chain(self.columns.iter().map(|mapping| mapping.column.as_str()))
    }

    /// Renders in-memory rows as delimited text. Returns [`None`] for file-backed tables.
    pub fn render_rows(&self) -> Result<Option<String>, ConfigurationError> {
        let TableData::Rows {
            header, records, ..
        } = &self.data
        else {
            return Ok(None);
        };
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.format.delimiter_byte()?)
            .quote(self.format.quote_byte()?)
            .from_writer(Vec::new());
        let write_error = |e: csv::Error| ConfigurationError::InvalidFormat(e.to_string());
        if self.format.header {
            writer.write_record(header).map_err(write_error)?;
        }
        for record in records {
            writer.write_record(record).map_err(write_error)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ConfigurationError::InvalidFormat(e.to_string()))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| ConfigurationError::InvalidFormat(e.to_string()))
    }

    /// A stable identifier derived from the table's origin and its mapping.
    pub(crate) fn fingerprint(&self) -> Result<String, ConfigurationError> {
        let mut hasher = Md5::new();
        match &self.data {
            TableData::File(path) => hasher.update(path.as_os_str().as_encoded_bytes()),
            TableData::Rows { name, .. } => {
                hasher.update(name.as_bytes());
                hasher.update(self.render_rows()?.unwrap_or_default().as_bytes());
            }
        }
        for part in [&self.key_column, &self.subject_prefix, &self.class] {
            hasher.update(part.as_bytes());
            hasher.update([0]);
        }
        for mapping in &self.columns {
            hasher.update(mapping.column.as_bytes());
            hasher.update([0]);
            hasher.update(mapping.property.as_bytes());
            hasher.update([0]);
            hasher.update(mapping.datatype.engine_name().as_bytes());
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// The engine commands registering the table as a data source named `id`.
    pub(crate) fn load_data_script(&self, id: &str) -> String {
        let format = self.format;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "dsource register \"{id}\" type delimitedFile file \"$(dir.datasource){}\" header {} delimiter \"{}\" quote \"{}\"",
            escape(&self.file_name()),
            format.header,
            escape(&format.delimiter.to_string()),
            escape(&format.quote.to_string()),
        );
        let _ = write!(
            out,
            "tupletable create <{}> dataSourceName \"{id}\" \"columns\" {}",
            table_iri(id),
            self.columns.len() + 1
        );
        let _ = write!(
            out,
            " \"1\" \"{}{{{}}}\" \"1.datatype\" \"iri\"",
            escape(&self.subject_prefix),
            escape(&self.key_column)
        );
        for (index, mapping) in self.columns.iter().enumerate() {
            let position = index + 2;
            let _ = write!(
                out,
                " \"{position}\" \"{{{}}}\" \"{position}.datatype\" \"{}\"",
                escape(&mapping.column),
                mapping.datatype.engine_name()
            );
        }
        out.push('\n');
        out
    }

    /// The rule deriving the subject's class and properties from the table.
    pub(crate) fn rules(&self, id: &str, vocabulary: &Vocabulary) -> Result<String, ConfigurationError> {
        let class = vocabulary.resolve(&self.class)?;
        let mut heads = vec![format!("[?Subject, a, {class}]")];
        let mut arguments = vec!["?Subject".to_owned()];
        for (index, mapping) in self.columns.iter().enumerate() {
            let property = vocabulary.resolve(&mapping.property)?;
            let variable = format!("?C{}", index + 1);
            heads.push(format!("[?Subject, {property}, {variable}]"));
            arguments.push(variable);
        }
        Ok(format!(
            "{} :-\n    <{}>({}) .\n",
            heads.join(",\n"),
            table_iri(id),
            arguments.join(", ")
        ))
    }
}

fn table_iri(id: &str) -> String {
    format!("{SYSTEM_NAMESPACE}table/{id}")
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn table_error(path: &Path, error: &csv::Error) -> ConfigurationError {
    ConfigurationError::InvalidFormat(format!("{}: {error}", path.display()))
}
