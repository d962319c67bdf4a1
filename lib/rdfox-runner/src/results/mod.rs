//! Parsing of the tab-separated query answers written by the engine.

use crate::error::RunnerError;
use sparesults::{QueryResultsFormat, QueryResultsParser, ReaderQueryResultsParserOutput};
use std::collections::BTreeMap;

mod value;

pub use value::Value;

/// The media type the engine is asked to answer queries in.
pub const TSV_MEDIA_TYPE: &str = "text/tab-separated-values";

/// One solution of a query, keyed by output variable name. Unbound variables are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    pub fn get(&self, variable: &str) -> Option<&Value> {
        self.values.get(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The answers of a single query, in the order the engine returned them.
///
/// `ASK` answers have no variables and hold a single empty row when the answer is `true`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    variables: Vec<String>,
    rows: Vec<Row>,
}

impl ResultTable {
    pub fn new(variables: Vec<String>, rows: Vec<Row>) -> Self {
        Self { variables, rows }
    }

    /// The declared output variables, without the leading `?`.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Parses tab-separated SPARQL results.
    ///
    /// Blank lines at the end of `raw` are ignored.
    pub fn from_tsv(raw: &str) -> Result<Self, RunnerError> {
        let trimmed = raw.trim_end_matches(['\n', '\r', ' ']);
        if trimmed.trim().is_empty() {
            return Err(parse_error("the engine returned no output", raw));
        }
        let text = format!("{trimmed}\n");

        let parser = QueryResultsParser::from_format(QueryResultsFormat::Tsv);
        let output = parser
            .for_reader(text.as_bytes())
            .map_err(|e| parse_error(e, raw))?;
        match output {
            ReaderQueryResultsParserOutput::Solutions(solutions) => {
                let variables = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_owned())
                    .collect();
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| parse_error(e, raw))?;
                    rows.push(
                        solution
                            .iter()
                            .map(|(variable, term)| {
                                (variable.as_str(), Value::from(term.clone()))
                            })
                            .collect(),
                    );
                }
                Ok(Self { variables, rows })
            }
            ReaderQueryResultsParserOutput::Boolean(answer) => Ok(Self {
                variables: Vec::new(),
                rows: if answer { vec![Row::default()] } else { Vec::new() },
            }),
        }
    }
}

impl IntoIterator for ResultTable {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

fn parse_error(error: impl ToString, raw: &str) -> RunnerError {
    RunnerError::ResultParse {
        message: error.to_string(),
        raw: raw.to_owned(),
    }
}
