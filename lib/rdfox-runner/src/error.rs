use std::io;
use std::path::PathBuf;

/// An error raised while running the engine or reading its answers.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// The engine process could not be started or did not come up.
    #[error("Could not launch '{}': {message}", executable.display())]
    EngineLaunch {
        /// The executable that was invoked.
        executable: PathBuf,
        /// What went wrong.
        message: String,
        /// Everything the engine printed before it failed.
        output: String,
        /// The underlying I/O error, if any.
        #[source]
        source: Option<io::Error>,
    },
    /// The engine reported a failure while executing the script or a query.
    #[error("The engine failed: {message}\n{output}")]
    EngineExecution {
        /// What went wrong.
        message: String,
        /// The raw diagnostic text of the engine.
        output: String,
    },
    /// The answers produced by the engine could not be parsed.
    #[error("Could not parse query results: {message}\n{raw}")]
    ResultParse {
        /// The parser error.
        message: String,
        /// The offending text.
        raw: String,
    },
    /// The session is not running anymore.
    #[error("The session is {0} and cannot be used")]
    NotRunning(&'static str),
    /// An error while preparing or reading the working directory.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// The path that was accessed.
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RunnerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn execution(message: impl Into<String>, output: impl Into<String>) -> Self {
        Self::EngineExecution {
            message: message.into(),
            output: output.into(),
        }
    }

    /// Returns the raw engine output attached to this error, if there is any.
    pub fn engine_output(&self) -> Option<&str> {
        match self {
            Self::EngineLaunch { output, .. } | Self::EngineExecution { output, .. } => {
                Some(output)
            }
            Self::ResultParse { raw, .. } => Some(raw),
            Self::NotRunning(_) | Self::Io { .. } => None,
        }
    }
}
