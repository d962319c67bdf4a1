#![doc = include_str!("../README.md")]

pub mod config;
pub mod datasource;
pub mod error;
mod pipeline;
pub mod script;
pub mod table;
pub mod vocabulary;

pub use config::{ProbsConfig, ScriptSource, SCRIPT_SOURCE_ENV};
pub use datasource::{load_datasource, Datasource, Registration, ScriptText};
pub use error::{ConfigurationError, ProbsError};
pub use pipeline::{
    answer_queries, convert_and_query_data, convert_data, convert_endpoint,
    convert_enhance_data, convert_enhance_endpoint, enhance_data, enhance_endpoint,
    open_endpoint, query_data, validate_data, ProbsFacts,
};
pub use rdfox_runner::{ResultTable, Row, RunnerConfig, Session, SessionState, Value};
pub use script::{
    ScriptAssembler, ScriptBlock, ScriptPlan, Stage, StageEntry, ENHANCED_DATA_FILE,
    ORIGINAL_DATA_FILE,
};
pub use table::{ColumnMapping, ColumnType, FormatOptions, TableData, TableSource};
pub use vocabulary::{probs_namespaces, Vocabulary, PROBS_NAMESPACE};
