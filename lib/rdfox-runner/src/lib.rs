//! Runs [RDFox](https://www.oxfordsemantic.tech/) on generated scripts.
//!
//! The engine is treated as an opaque executable: this crate stages the files it needs in a
//! scoped working directory, writes a master script, launches the process and either waits for
//! it to finish ([`run_script`]) or keeps it running behind its HTTP endpoint
//! ([`start_endpoint`]). Query answers come back as [`ResultTable`]s.
//!
//! ```no_run
//! use rdfox_runner::{start_endpoint, EngineInput, InputFiles, Namespaces, RunnerConfig};
//!
//! let namespaces = Namespaces::new().with("", "https://ukfires.org/probs/ontology/");
//! let mut files = InputFiles::new();
//! files.insert("data/facts.ttl".into(), ":Bread a :Object .".into());
//! let input = EngineInput::new(files, vec!["import facts.ttl".to_owned()], namespaces);
//!
//! let mut session = start_endpoint(&input, &RunnerConfig::from_env())?;
//! let answers = session.query("SELECT ?o WHERE { ?o a :Object }")?;
//! assert_eq!(answers.len(), 1);
//! session.close()?;
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

pub mod config;
pub mod error;
mod input;
mod namespaces;
mod process;
pub mod results;
mod session;
mod workdir;

pub use config::RunnerConfig;
pub use error::RunnerError;
pub use input::{stage_files, Completion, EngineInput, InputFiles, InputSource};
pub use namespaces::Namespaces;
pub use results::{ResultTable, Row, Value};
pub use session::{run_script, start_endpoint, CompletedRun, Session, SessionState};
pub use workdir::WorkingDir;
