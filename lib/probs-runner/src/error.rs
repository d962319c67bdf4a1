use crate::config::SCRIPT_SOURCE_ENV;
use rdfox_runner::RunnerError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A problem with the inputs of a run, detected before the engine is launched.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("No script source directory given. Pass one explicitly or set {}.", SCRIPT_SOURCE_ENV)]
    MissingScriptSource,
    #[error("The script source directory '{}' has no '{}'", dir.display(), missing.display())]
    IncompleteScriptSource { dir: PathBuf, missing: PathBuf },
    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("Could not read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Files without a load-data script that cannot be imported automatically.
    #[error("No load-data script given, and cannot automatically load {} files", suffixes.join(", "))]
    UnknownSourceKind { suffixes: Vec<String> },
    #[error("Duplicate file name '{0}' in the list of inputs; name the files explicitly to rename them")]
    DuplicateFileName(String),
    #[error("More than one input is staged at '{}'", .0.display())]
    DuplicateTarget(PathBuf),
    #[error("The prefix of concept '{0}' is unknown")]
    UnknownPrefix(String),
    #[error("Concept '{0}' is not declared by the ontology")]
    UndeclaredConcept(String),
    #[error("Column '{column}' is not part of the table header ({})", header.join(", "))]
    UnknownColumn { column: String, header: Vec<String> },
    #[error("Row {row} has {found} values but the header has {expected}")]
    RowLength {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("Invalid table format: {0}")]
    InvalidFormat(String),
    #[error("Query '{name}' is invalid: {message}")]
    InvalidQuery { name: String, message: String },
    #[error("Datasources were given, but no stage of the run loads data")]
    UnusedDatasources,
    #[error("Script block '{block}' cannot follow a {previous} block")]
    OutOfOrder {
        block: &'static str,
        previous: &'static str,
    },
}

impl ConfigurationError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}

/// Any error raised by the PRObs pipelines.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProbsError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("Expected exactly one answer but got {0}")]
    UnexpectedAnswerCount(usize),
}
