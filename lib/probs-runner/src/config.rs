use crate::error::ConfigurationError;
use crate::script::Stage;
use crate::vocabulary::Vocabulary;
use rdfox_runner::{InputFiles, InputSource, RunnerConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable pointing at the PRObs ontology scripts.
pub const SCRIPT_SOURCE_ENV: &str = "PROBS_SCRIPT_SOURCE_DIR";

/// The ontology in functional syntax, relative to the script source directory.
pub const ONTOLOGY_FILE: &str = "probs.fss";
/// Extra facts loaded together with the ontology.
pub const ADDITIONAL_INFO_FILE: &str = "additional_info.ttl";

/// Configuration of the PRObs pipelines.
#[derive(Debug, Clone)]
pub struct ProbsConfig {
    /// Where the ontology and its stage scripts live. Falls back to [`SCRIPT_SOURCE_ENV`].
    pub script_source_dir: Option<PathBuf>,
    /// How the engine is launched.
    pub runner: RunnerConfig,
    /// Whether queried facts go through the data-enhancement stage before reasoning.
    pub enhance: bool,
}

impl Default for ProbsConfig {
    fn default() -> Self {
        Self {
            script_source_dir: None,
            runner: RunnerConfig::default(),
            enhance: true,
        }
    }
}

impl ProbsConfig {
    /// Reads the script source directory and the engine settings from the environment.
    pub fn from_env() -> Self {
        Self {
            script_source_dir: env::var_os(SCRIPT_SOURCE_ENV).map(PathBuf::from),
            runner: RunnerConfig::from_env(),
            enhance: true,
        }
    }

    #[must_use]
    pub fn with_script_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_source_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_enhancement(mut self, enhance: bool) -> Self {
        self.enhance = enhance;
        self
    }

    /// Resolves the script source directory.
    pub fn script_source(&self) -> Result<ScriptSource, ConfigurationError> {
        match &self.script_source_dir {
            Some(dir) => ScriptSource::new(dir),
            None => Err(ConfigurationError::MissingScriptSource),
        }
    }
}

/// A checkout of the PRObs ontology: `probs.fss`, `additional_info.ttl` and one folder per
/// stage below `scripts/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    dir: PathBuf,
}

impl ScriptSource {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ConfigurationError> {
        let dir = dir.into();
        if dir.is_dir() {
            Ok(Self { dir })
        } else {
            Err(ConfigurationError::NotADirectory(dir))
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads the vocabulary declared by the ontology.
    pub fn vocabulary(&self) -> Result<Vocabulary, ConfigurationError> {
        let path = self.require(Path::new(ONTOLOGY_FILE))?;
        let text = fs::read_to_string(&path).map_err(|e| ConfigurationError::read(&path, e))?;
        Ok(Vocabulary::from_ontology(&text))
    }

    /// The files every run stages: the ontology, the additional facts, the shared scripts and
    /// the scripts of `stages`.
    pub fn standard_files(
        &self,
        stages: impl IntoIterator<Item = Stage>,
    ) -> Result<InputFiles, ConfigurationError> {
        let mut files = InputFiles::new();
        for (target, relative) in [
            (format!("data/{ONTOLOGY_FILE}"), ONTOLOGY_FILE.to_owned()),
            (format!("data/{ADDITIONAL_INFO_FILE}"), ADDITIONAL_INFO_FILE.to_owned()),
            ("scripts/shared".to_owned(), "scripts/shared".to_owned()),
        ] {
            let source = self.require(Path::new(&relative))?;
            files.insert(PathBuf::from(target), InputSource::Path(source));
        }
        for stage in stages {
            let folder = stage.script_dir();
            let source = self.require(&folder)?;
            files.insert(folder, InputSource::Path(source));
        }
        Ok(files)
    }

    fn require(&self, relative: &Path) -> Result<PathBuf, ConfigurationError> {
        let path = self.dir.join(relative);
        if path.exists() {
            Ok(path)
        } else {
            Err(ConfigurationError::IncompleteScriptSource {
                dir: self.dir.clone(),
                missing: relative.to_owned(),
            })
        }
    }
}
