//! The PRObs runs: conversion, enhancement, validation and querying.

use crate::config::ProbsConfig;
use crate::datasource::Datasource;
use crate::error::ProbsError;
use crate::script::{ScriptAssembler, Stage, StageEntry, ENHANCED_DATA_FILE};
use rdfox_runner::{run_script, start_endpoint, ResultTable, Row, RunnerError, Session};
use std::collections::BTreeMap;
use std::path::Path;

const CONVERT_STAGES: [(Stage, StageEntry); 1] = [(Stage::DataConversion, StageEntry::Pipeline)];
const ENHANCE_STAGES: [(Stage, StageEntry); 1] = [(Stage::DataEnhancement, StageEntry::Pipeline)];
const CONVERT_ENHANCE_STAGES: [(Stage, StageEntry); 2] = [
    (Stage::DataConversion, StageEntry::Pipeline),
    (Stage::DataEnhancement, StageEntry::Pipeline),
];
const QUERY_STAGES: [(Stage, StageEntry); 2] = [
    (Stage::DataEnhancement, StageEntry::Pipeline),
    (Stage::Reasoning, StageEntry::Pipeline),
];
const REASONING_ONLY: [(Stage, StageEntry); 1] = [(Stage::Reasoning, StageEntry::Pipeline)];
const CONVERT_AND_QUERY_STAGES: [(Stage, StageEntry); 3] = [
    (Stage::DataConversion, StageEntry::Pipeline),
    (Stage::DataEnhancement, StageEntry::Pipeline),
    (Stage::Reasoning, StageEntry::Pipeline),
];
const FACTS_DUMP: &str = "results/facts.ttl";

/// Converts `datasources` into PRObs facts and writes them, as gzipped N-Triples, to
/// `output`.
pub fn convert_data(
    datasources: &[Datasource],
    output: &Path,
    config: &ProbsConfig,
) -> Result<(), ProbsError> {
    run_to_file(Stage::DataConversion, datasources, output, config)
}

/// Runs the enhancement scripts on converted facts and writes the result to `output`.
pub fn enhance_data<P: AsRef<Path>>(
    inputs: &[P],
    output: &Path,
    config: &ProbsConfig,
) -> Result<(), ProbsError> {
    let datasources = fact_datasources(inputs)?;
    run_to_file(Stage::DataEnhancement, &datasources, output, config)
}

/// Converts `datasources` and enhances the result in a single engine run, writing the
/// enhanced facts to `output`.
pub fn convert_enhance_data(
    datasources: &[Datasource],
    output: &Path,
    config: &ProbsConfig,
) -> Result<(), ProbsError> {
    let assembler = assembler(config)?;
    let mut plan = assembler.plan(&CONVERT_ENHANCE_STAGES, datasources, &[])?;
    plan.add_export(ENHANCED_DATA_FILE);
    let input = assembler.render(&plan, datasources)?;
    tracing::info!(datasources = datasources.len(), "Converting and enhancing data");
    let run = run_script(&input, &config.runner)?;
    run.copy_out(ENHANCED_DATA_FILE, output)?;
    tracing::info!(output = %output.display(), "Output written");
    run.close()?;
    Ok(())
}

/// Runs the validation scripts on converted facts and returns what the engine reported.
pub fn validate_data<P: AsRef<Path>>(
    inputs: &[P],
    config: &ProbsConfig,
) -> Result<String, ProbsError> {
    let datasources = fact_datasources(inputs)?;
    let input = assembler(config)?.assemble(
        &[(Stage::DataValidation, StageEntry::Master)],
        &datasources,
        &[],
    )?;
    tracing::info!(inputs = inputs.len(), "Validating data");
    let run = run_script(&input, &config.runner)?;
    for line in run.output().lines() {
        tracing::info!(target: "probs_runner::validation", "{line}");
    }
    let output = run.output().to_owned();
    run.close()?;
    Ok(output)
}

/// Loads converted facts, reasons over them and answers `queries`.
///
/// The facts go through the enhancement stage first unless [`ProbsConfig::enhance`] is off.
pub fn query_data<P: AsRef<Path>>(
    facts: &[P],
    queries: &[&str],
    config: &ProbsConfig,
) -> Result<Vec<ResultTable>, ProbsError> {
    let datasources = fact_datasources(facts)?;
    Ok(run_queries(query_stages(config), &datasources, queries, false, config)?.1)
}

/// Converts `datasources`, enhances and reasons over the result and answers `queries` in a
/// single engine run.
pub fn convert_and_query_data(
    datasources: &[Datasource],
    queries: &[&str],
    config: &ProbsConfig,
) -> Result<Vec<ResultTable>, ProbsError> {
    Ok(run_queries(&CONVERT_AND_QUERY_STAGES, datasources, queries, false, config)?.1)
}

/// Starts an engine endpoint over converted facts. The engine runs until the session is
/// closed or dropped.
pub fn open_endpoint<P: AsRef<Path>>(
    facts: &[P],
    config: &ProbsConfig,
) -> Result<Session, ProbsError> {
    let datasources = fact_datasources(facts)?;
    serve(query_stages(config), &datasources, config)
}

/// Starts an engine endpoint over freshly converted `datasources`, without enhancement or
/// reasoning.
pub fn convert_endpoint(
    datasources: &[Datasource],
    config: &ProbsConfig,
) -> Result<Session, ProbsError> {
    serve(&CONVERT_STAGES, datasources, config)
}

/// Starts an engine endpoint over converted facts after running only the enhancement stage.
pub fn enhance_endpoint<P: AsRef<Path>>(
    facts: &[P],
    config: &ProbsConfig,
) -> Result<Session, ProbsError> {
    let datasources = fact_datasources(facts)?;
    serve(&ENHANCE_STAGES, &datasources, config)
}

/// Starts an engine endpoint over `datasources` after converting and enhancing them.
pub fn convert_enhance_endpoint(
    datasources: &[Datasource],
    config: &ProbsConfig,
) -> Result<Session, ProbsError> {
    serve(&CONVERT_ENHANCE_STAGES, datasources, config)
}

/// Answers named queries against a running endpoint.
pub fn answer_queries(
    session: &mut Session,
    queries: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, ResultTable>, RunnerError> {
    let mut answers = BTreeMap::new();
    for (name, query) in queries {
        let table = session.query(query)?;
        log_answers(name, &table);
        answers.insert(name.clone(), table);
    }
    Ok(answers)
}

/// Datasources that are converted and queried together on every call.
#[derive(Debug, Clone)]
pub struct ProbsFacts {
    sources: Vec<Datasource>,
    config: ProbsConfig,
    print_facts: bool,
}

impl ProbsFacts {
    pub fn new(sources: Vec<Datasource>, config: ProbsConfig) -> Self {
        Self {
            sources,
            config,
            print_facts: false,
        }
    }

    /// Logs every fact of the store, as Turtle, before the answers of each query run.
    #[must_use]
    pub fn with_print_facts(mut self, print_facts: bool) -> Self {
        self.print_facts = print_facts;
        self
    }

    /// Facts given as Turtle text.
    pub fn from_facts(facts: &str, config: ProbsConfig) -> Self {
        Self::new(vec![Datasource::from_facts(facts)], config)
    }

    pub fn query(&self, query: &str) -> Result<ResultTable, ProbsError> {
        self.query_all(&[query])?
            .into_iter()
            .next()
            .ok_or(ProbsError::UnexpectedAnswerCount(0))
    }

    pub fn query_all(&self, queries: &[&str]) -> Result<Vec<ResultTable>, ProbsError> {
        let (facts, answers) = run_queries(
            &CONVERT_AND_QUERY_STAGES,
            &self.sources,
            queries,
            self.print_facts,
            &self.config,
        )?;
        if let Some(facts) = facts {
            tracing::info!(target: "probs_runner::facts", "Dump of the engine data:\n{facts}");
        }
        Ok(answers)
    }

    /// Every fact of the store after conversion, enhancement and reasoning, as Turtle.
    pub fn facts(&self) -> Result<String, ProbsError> {
        let (facts, _) = run_queries(
            &CONVERT_AND_QUERY_STAGES,
            &self.sources,
            &[],
            true,
            &self.config,
        )?;
        Ok(facts.unwrap_or_default())
    }

    /// Answers a query expected to have exactly one solution.
    pub fn query_one(&self, query: &str) -> Result<Row, ProbsError> {
        let table = self.query(query)?;
        if table.len() != 1 {
            return Err(ProbsError::UnexpectedAnswerCount(table.len()));
        }
        table
            .into_iter()
            .next()
            .ok_or(ProbsError::UnexpectedAnswerCount(0))
    }
}

fn assembler(config: &ProbsConfig) -> Result<ScriptAssembler, ProbsError> {
    Ok(ScriptAssembler::new(config.script_source()?)?)
}

fn query_stages(config: &ProbsConfig) -> &'static [(Stage, StageEntry)] {
    if config.enhance {
        &QUERY_STAGES
    } else {
        &REASONING_ONLY
    }
}

/// One datasource per file, so files with the same name do not clash.
fn fact_datasources<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<Datasource>, ProbsError> {
    inputs
        .iter()
        .map(|input| Ok(Datasource::from_files([input.as_ref()], None, None)?))
        .collect()
}

fn run_to_file(
    stage: Stage,
    datasources: &[Datasource],
    output: &Path,
    config: &ProbsConfig,
) -> Result<(), ProbsError> {
    let mut input =
        assembler(config)?.assemble(&[(stage, StageEntry::Master)], datasources, &[])?;
    if let Some(file) = stage.output_file() {
        input.expect_output(file);
    }
    tracing::info!(%stage, datasources = datasources.len(), "Running stage");
    let run = run_script(&input, &config.runner)?;
    if let Some(file) = stage.output_file() {
        run.copy_out(file, output)?;
        tracing::info!(output = %output.display(), "Output written");
    }
    run.close()?;
    Ok(())
}

fn serve(
    stages: &[(Stage, StageEntry)],
    datasources: &[Datasource],
    config: &ProbsConfig,
) -> Result<Session, ProbsError> {
    let input = assembler(config)?.assemble(stages, datasources, &[])?;
    let names: Vec<&str> = stages.iter().map(|(stage, _)| stage.name()).collect();
    tracing::info!(
        stages = %names.join(", "),
        datasources = datasources.len(),
        port = config.runner.port,
        "Starting endpoint"
    );
    Ok(start_endpoint(&input, &config.runner)?)
}

/// Answers `queries` in a one-shot run, optionally exporting the whole store as Turtle first.
fn run_queries(
    stages: &[(Stage, StageEntry)],
    datasources: &[Datasource],
    queries: &[&str],
    dump_facts: bool,
    config: &ProbsConfig,
) -> Result<(Option<String>, Vec<ResultTable>), ProbsError> {
    let named: Vec<(String, String)> = queries
        .iter()
        .enumerate()
        .map(|(index, query)| (index.to_string(), (*query).to_owned()))
        .collect();
    let assembler = assembler(config)?;
    let mut plan = assembler.plan(stages, datasources, &named)?;
    if dump_facts {
        plan.add_export(FACTS_DUMP);
    }
    let input = assembler.render(&plan, datasources)?;
    let run = run_script(&input, &config.runner)?;
    let facts = if dump_facts {
        Some(run.read_output(FACTS_DUMP)?)
    } else {
        None
    };
    let answers = run.into_answers();
    for ((name, _), table) in named.iter().zip(&answers) {
        log_answers(name, table);
    }
    Ok((facts, answers))
}

fn log_answers(name: &str, table: &ResultTable) {
    tracing::info!(query = name, rows = table.len(), "Query answered");
    for row in table {
        let values: Vec<String> = table
            .variables()
            .iter()
            .map(|variable| row.get(variable).map(ToString::to_string).unwrap_or_default())
            .collect();
        tracing::debug!(query = name, "{}", values.join("\t"));
    }
}
