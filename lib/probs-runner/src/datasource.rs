//! Descriptions of the data a run loads into the engine.

use crate::error::ConfigurationError;
use crate::table::{TableData, TableSource};
use crate::vocabulary::Vocabulary;
use md5::{Digest, Md5};
use rdfox_runner::{InputFiles, InputSource};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Suffixes the engine imports without a load-data script.
const AUTO_IMPORT_SUFFIXES: &[&str] = &[".ttl.gz", ".nt.gz", ".ttl", ".nt"];

/// The load-data script of a folder loaded with [`load_datasource`].
pub const LOAD_DATA_FILE: &str = "load_data.rdfox";
/// The mapping rules of a folder loaded with [`load_datasource`].
pub const MAP_FILE: &str = "map.dlog";

/// A script given either literally or as a file to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptText {
    Inline(String),
    File(PathBuf),
}

impl ScriptText {
    fn read(&self) -> Result<String, ConfigurationError> {
        match self {
            Self::Inline(text) => Ok(text.clone()),
            Self::File(path) => {
                fs::read_to_string(path).map_err(|e| ConfigurationError::read(path, e))
            }
        }
    }
}

impl From<&str> for ScriptText {
    fn from(text: &str) -> Self {
        Self::Inline(text.to_owned())
    }
}

impl From<String> for ScriptText {
    fn from(text: String) -> Self {
        Self::Inline(text)
    }
}

impl From<&Path> for ScriptText {
    fn from(path: &Path) -> Self {
        Self::File(path.to_owned())
    }
}

impl From<PathBuf> for ScriptText {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

/// What the engine executes to load a datasource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub datasource: String,
    /// Engine commands, starting with the `dir.datasource` setting.
    pub load_data: String,
    /// Datalog rules mapping the loaded data onto the ontology.
    pub rules: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Loading {
    Scripted {
        load_data_script: String,
        rules: String,
    },
    Table(TableSource),
}

/// One input of a run: the files staged for it below `data/<name>/` and how the engine loads
/// them.
///
/// The name is derived from the inputs with md5, so the same inputs always land in the same
/// folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datasource {
    name: String,
    input_files: InputFiles,
    loading: Loading,
}

impl Datasource {
    /// Facts given as Turtle text.
    pub fn from_facts(facts: &str) -> Self {
        let name = hex::encode(Md5::digest(facts.as_bytes()));
        let mut input_files = InputFiles::new();
        input_files.insert(data_dir(&name).join("facts.ttl"), InputSource::from(facts));
        Self::scripted(name, input_files, "import \"$(dir.datasource)facts.ttl\"\n", "")
            .with_dir_setup()
    }

    /// Files copied into the working directory under their own file names.
    ///
    /// Without a load-data script, files that are all RDF (`.ttl`, `.nt`, optionally
    /// gzipped) are imported automatically.
    pub fn from_files<P: AsRef<Path>>(
        files: impl IntoIterator<Item = P>,
        load_data_script: Option<ScriptText>,
        rules: Option<ScriptText>,
    ) -> Result<Self, ConfigurationError> {
        let mut named = BTreeMap::new();
        for path in files {
            let path = path.as_ref();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if named.insert(file_name.clone(), path.to_owned()).is_some() {
                return Err(ConfigurationError::DuplicateFileName(file_name));
            }
        }
        Self::from_named_files(named, load_data_script, rules)
    }

    /// Files copied into the working directory under the names they are keyed by.
    pub fn from_named_files(
        files: BTreeMap<String, PathBuf>,
        load_data_script: Option<ScriptText>,
        rules: Option<ScriptText>,
    ) -> Result<Self, ConfigurationError> {
        let mut hasher = Md5::new();
        for path in files.values() {
            hasher.update(path.as_os_str().as_encoded_bytes());
        }
        let name = hex::encode(hasher.finalize());

        let load_data_script = match load_data_script {
            Some(script) => script.read()?,
            None => auto_import_script(files.keys())?,
        };
        let rules = match rules {
            Some(rules) => rules.read()?,
            None => String::new(),
        };
        let input_files = files
            .into_iter()
            .map(|(file_name, path)| (data_dir(&name).join(file_name), InputSource::Path(path)))
            .collect();
        Ok(Self::scripted(name, input_files, &load_data_script, &rules).with_dir_setup())
    }

    /// A delimited table registered with the engine and mapped by generated rules.
    pub fn from_table(table: TableSource) -> Result<Self, ConfigurationError> {
        table.validate()?;
        let name = table.fingerprint()?;
        let source = match table.data() {
            TableData::File(path) => InputSource::Path(path.clone()),
            TableData::Rows { .. } => InputSource::Content(table.render_rows()?.unwrap_or_default()),
        };
        let mut input_files = InputFiles::new();
        input_files.insert(data_dir(&name).join(table.file_name()), source);
        Ok(Self {
            name,
            input_files,
            loading: Loading::Table(table),
        })
    }

    fn scripted(name: String, input_files: InputFiles, load_data_script: &str, rules: &str) -> Self {
        Self {
            name,
            input_files,
            loading: Loading::Scripted {
                load_data_script: load_data_script.to_owned(),
                rules: rules.to_owned(),
            },
        }
    }

    fn with_dir_setup(mut self) -> Self {
        if let Loading::Scripted {
            load_data_script, ..
        } = &mut self.loading
        {
            *load_data_script = format!("{}\n{load_data_script}", dir_setup(&self.name));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The files staged for this datasource, keyed by their path in the working directory.
    pub fn input_files(&self) -> &InputFiles {
        &self.input_files
    }

    /// The load-data script, unless it is generated from a table mapping.
    pub fn load_data_script(&self) -> Option<&str> {
        match &self.loading {
            Loading::Scripted {
                load_data_script, ..
            } => Some(load_data_script),
            Loading::Table(_) => None,
        }
    }

    /// The mapping rules, unless they are generated from a table mapping.
    pub fn rules(&self) -> Option<&str> {
        match &self.loading {
            Loading::Scripted { rules, .. } => Some(rules),
            Loading::Table(_) => None,
        }
    }

    pub fn table(&self) -> Option<&TableSource> {
        match &self.loading {
            Loading::Table(table) => Some(table),
            Loading::Scripted { .. } => None,
        }
    }

    /// Renders the commands and rules loading this datasource, resolving mapped concepts
    /// against `vocabulary`.
    pub fn registration(&self, vocabulary: &Vocabulary) -> Result<Registration, ConfigurationError> {
        let (load_data, rules) = match &self.loading {
            Loading::Scripted {
                load_data_script,
                rules,
            } => (load_data_script.clone(), rules.clone()),
            Loading::Table(table) => (
                format!("{}\n{}", dir_setup(&self.name), table.load_data_script(&self.name)),
                table.rules(&self.name, vocabulary)?,
            ),
        };
        Ok(Registration {
            datasource: self.name.clone(),
            load_data,
            rules,
        })
    }
}

/// Loads a datasource from a folder holding `*.csv` and `*.ttl` files, an optional
/// `load_data.rdfox` and an optional `map.dlog`.
pub fn load_datasource(dir: &Path) -> Result<Datasource, ConfigurationError> {
    if !dir.is_dir() {
        return Err(ConfigurationError::NotADirectory(dir.to_owned()));
    }

    let load_data_path = dir.join(LOAD_DATA_FILE);
    let load_data_script = if load_data_path.is_file() {
        ScriptText::File(load_data_path)
    } else {
        ScriptText::Inline(String::new())
    };
    let map_path = dir.join(MAP_FILE);
    let rules = map_path.is_file().then_some(ScriptText::File(map_path));

    let mut data_files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_owned();
            ConfigurationError::read(path, e.into())
        })?;
        let is_data = entry
            .path()
            .extension()
            .is_some_and(|extension| extension == "csv" || extension == "ttl");
        if entry.file_type().is_file() && is_data {
            data_files.push(entry.into_path());
        }
    }
    tracing::debug!(dir = %dir.display(), files = data_files.len(), "Loading datasource folder");
    Datasource::from_files(data_files, Some(load_data_script), rules)
}

fn data_dir(name: &str) -> PathBuf {
    PathBuf::from("data").join(name)
}

fn dir_setup(name: &str) -> String {
    format!("set dir.datasource \"$(dir.root)/data/{name}/\"")
}

fn auto_import_script<'a>(
    file_names: impl Iterator<Item = &'a String> + Clone,
) -> Result<String, ConfigurationError> {
    let mut unsupported: Vec<String> = file_names
        .clone()
        .filter(|name| !AUTO_IMPORT_SUFFIXES.iter().any(|s| name.ends_with(s)))
        .map(|name| suffix(name))
        .collect();
    if !unsupported.is_empty() {
        unsupported.sort();
        unsupported.dedup();
        return Err(ConfigurationError::UnknownSourceKind {
            suffixes: unsupported,
        });
    }

    let mut script = "# Auto generated to load RDF files\n".to_owned();
    for name in file_names {
        let _ = writeln!(script, "import \"$(dir.datasource){name}\"");
    }
    Ok(script)
}

fn suffix(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(index) if index > 0 => file_name[index..].to_owned(),
        _ => "(no suffix)".to_owned(),
    }
}
