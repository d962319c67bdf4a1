use clap::{Args as ClapArgs, Parser, Subcommand, ValueHint};
use probs_runner::SCRIPT_SOURCE_ENV;
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "probs-runner")]
/// Convert, enhance, validate and query PRObs data with RDFox
pub struct Args {
    #[command(flatten)]
    pub global: GlobalOptions,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs)]
pub struct GlobalOptions {
    /// Log more (-v for progress, -vv for everything the engine prints)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// PRObs ontology folder holding probs.fss and the stage scripts
    #[arg(short, long, env = SCRIPT_SOURCE_ENV, value_hint = ValueHint::DirPath, global = true)]
    pub scripts: Option<PathBuf>,
    /// Folder the engine runs in
    ///
    /// By default a temporary folder is created and removed afterwards.
    #[arg(short, long, value_hint = ValueHint::DirPath, global = true)]
    pub working_dir: Option<PathBuf>,
    /// Keep the working folder after the engine stopped
    #[arg(long, global = true)]
    pub keep_working_dir: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert datasource folders into PRObs RDF
    ConvertData {
        /// Datasource folders (data files with load_data.rdfox and map.dlog)
        #[arg(required = true, value_hint = ValueHint::DirPath)]
        inputs: Vec<PathBuf>,
        /// File the converted facts are written to
        #[arg(value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },
    /// Run the enhancement scripts on converted PRObs RDF
    EnhanceData {
        /// Converted RDF files
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        inputs: Vec<PathBuf>,
        /// File the enhanced facts are written to
        #[arg(value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },
    /// Validate converted PRObs RDF
    ///
    /// The findings are logged: run with -v to see them.
    ValidateData {
        /// Converted RDF files
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        inputs: Vec<PathBuf>,
    },
    /// Reason over converted PRObs RDF and print the answers to SPARQL queries as TSV
    Query {
        /// Converted RDF files
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        inputs: Vec<PathBuf>,
        /// Files holding one SPARQL query each
        #[arg(short, long = "query", required = true, value_hint = ValueHint::FilePath)]
        queries: Vec<PathBuf>,
        /// Query the converted facts as they are, without running the enhancement scripts
        #[arg(long)]
        no_enhance: bool,
    },
    /// Start an RDFox endpoint over converted PRObs RDF and serve until Enter is pressed
    Endpoint {
        /// Converted RDF files
        #[arg(value_hint = ValueHint::FilePath)]
        inputs: Vec<PathBuf>,
        /// Port of the endpoint
        #[arg(short, long)]
        port: Option<u16>,
        /// Files holding queries to open in the endpoint console
        #[arg(short, long = "query", value_hint = ValueHint::FilePath)]
        queries: Vec<PathBuf>,
    },
}
