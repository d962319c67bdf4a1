//! Assembly of the engine script for a run.
//!
//! A run is described by a [`ScriptPlan`]: setup directives, one registration per
//! datasource, the stage pipelines, exports of the store and the queries, in that order. The plan is rendered into
//! an [`EngineInput`] holding the staged files and the master script commands.
//!
//! Registrations reach the engine in one of two ways. A stage started through its `master`
//! script, and the data-conversion pipeline, load data from the stage's hook files
//! (`load_data.rdfox` and `map.dlog`), so registrations are written there. Otherwise the load
//! commands are inlined into the master script and the rules imported from a staged file.

use crate::config::ScriptSource;
use crate::datasource::{Datasource, Registration};
use crate::error::ConfigurationError;
use crate::vocabulary::Vocabulary;
use rdfox_runner::{EngineInput, InputFiles, InputSource};
use std::collections::btree_map::Entry;
use std::fmt;
use std::path::PathBuf;

const SETUP_SCRIPT: &str = "exec scripts/shared/setup-RDFox";
const INIT_ENHANCEMENT_SCRIPT: &str = "exec scripts/shared/init-enhancement";
const INLINE_RULES_FILE: &str = "data/datasources.dlog";
/// Where the conversion stage exports its facts.
pub const ORIGINAL_DATA_FILE: &str = "data/probs_original_data.nt.gz";
/// Where the enhancement stage exports its facts.
pub const ENHANCED_DATA_FILE: &str = "data/probs_enhanced_data.nt.gz";

/// A folder of ontology scripts below `scripts/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    DataConversion,
    DataEnhancement,
    Reasoning,
    DataValidation,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::DataConversion => "data-conversion",
            Self::DataEnhancement => "data-enhancement",
            Self::Reasoning => "reasoning",
            Self::DataValidation => "data-validation",
        }
    }

    /// The folder of the stage, relative to the script source and working directories.
    pub fn script_dir(self) -> PathBuf {
        PathBuf::from("scripts").join(self.name())
    }

    /// The file the stage's `master` script exports its facts to.
    pub fn output_file(self) -> Option<&'static str> {
        match self {
            Self::DataConversion => Some(ORIGINAL_DATA_FILE),
            Self::DataEnhancement => Some(ENHANCED_DATA_FILE),
            Self::Reasoning | Self::DataValidation => None,
        }
    }

    fn hook_file(self, name: &str) -> PathBuf {
        self.script_dir().join(name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which script of a stage is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEntry {
    /// `master`: sets the engine up, loads data, materializes and exports.
    Master,
    /// `master-pipeline`: only materializes.
    Pipeline,
}

impl StageEntry {
    fn script_name(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Pipeline => "master-pipeline",
        }
    }
}

/// One block of a [`ScriptPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptBlock {
    /// A fixed directive.
    Setup(String),
    Registration(Registration),
    Pipeline { stage: Stage, entry: StageEntry },
    /// Writes every fact of the store to a file relative to the working directory.
    Export(String),
    Query { name: String, text: String },
}

impl ScriptBlock {
    fn kind(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::Registration(_) => "registration",
            Self::Pipeline { .. } => "pipeline",
            Self::Export(_) => "export",
            Self::Query { .. } => "query",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Setup(_) => 0,
            Self::Registration(_) => 1,
            Self::Pipeline { .. } => 2,
            Self::Export(_) => 3,
            Self::Query { .. } => 4,
        }
    }
}

/// The ordered blocks of a run: setup, then registrations, pipelines, exports and queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptPlan {
    blocks: Vec<ScriptBlock>,
}

impl ScriptPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block, rejecting it if it belongs before the last one.
    pub fn push(&mut self, block: ScriptBlock) -> Result<(), ConfigurationError> {
        if let Some(last) = self.blocks.last() {
            if last.rank() > block.rank() {
                return Err(ConfigurationError::OutOfOrder {
                    block: block.kind(),
                    previous: last.kind(),
                });
            }
        }
        self.blocks.push(block);
        Ok(())
    }

    /// Adds an export of the store after the pipelines and before any query.
    pub fn add_export(&mut self, file: impl Into<String>) {
        let position = self
            .blocks
            .iter()
            .position(|block| matches!(block, ScriptBlock::Query { .. }))
            .unwrap_or(self.blocks.len());
        self.blocks.insert(position, ScriptBlock::Export(file.into()));
    }

    pub fn blocks(&self) -> &[ScriptBlock] {
        &self.blocks
    }

    /// The stages the plan runs, in order.
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.blocks.iter().filter_map(|block| match block {
            ScriptBlock::Pipeline { stage, .. } => Some(*stage),
            _ => None,
        })
    }

    /// The names of the queries, in the order their answers are returned.
    pub fn query_names(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|block| match block {
            ScriptBlock::Query { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    fn loading_stage(&self) -> Option<(Stage, StageEntry)> {
        self.blocks.iter().find_map(|block| match block {
            ScriptBlock::Pipeline { stage, entry } => Some((*stage, *entry)),
            _ => None,
        })
    }
}

/// Builds plans and renders them into engine input.
#[derive(Debug, Clone)]
pub struct ScriptAssembler {
    source: ScriptSource,
    vocabulary: Vocabulary,
}

impl ScriptAssembler {
    /// Uses the vocabulary declared by the ontology of `source`.
    pub fn new(source: ScriptSource) -> Result<Self, ConfigurationError> {
        let vocabulary = source.vocabulary()?;
        Ok(Self::with_vocabulary(source, vocabulary))
    }

    pub fn with_vocabulary(source: ScriptSource, vocabulary: Vocabulary) -> Self {
        Self { source, vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Orders the blocks of a run of `stages` loading `datasources` and answering `queries`.
    pub fn plan(
        &self,
        stages: &[(Stage, StageEntry)],
        datasources: &[Datasource],
        queries: &[(String, String)],
    ) -> Result<ScriptPlan, ConfigurationError> {
        if stages.is_empty() && !datasources.is_empty() {
            return Err(ConfigurationError::UnusedDatasources);
        }

        let mut plan = ScriptPlan::new();
        if let Some(&(first, StageEntry::Pipeline)) = stages.first() {
            plan.push(ScriptBlock::Setup(SETUP_SCRIPT.to_owned()))?;
            if first == Stage::DataEnhancement {
                plan.push(ScriptBlock::Setup(INIT_ENHANCEMENT_SCRIPT.to_owned()))?;
            }
            // Only the conversion pipeline loads the ontology itself.
            if first != Stage::DataConversion {
                for directive in ["import probs.fss", "import additional_info.ttl"] {
                    plan.push(ScriptBlock::Setup(directive.to_owned()))?;
                }
            }
        }
        for datasource in datasources {
            let registration = datasource.registration(&self.vocabulary)?;
            plan.push(ScriptBlock::Registration(registration))?;
        }
        for &(stage, entry) in stages {
            plan.push(ScriptBlock::Pipeline { stage, entry })?;
        }
        for (name, text) in queries {
            self.check_query(name, text)?;
            plan.push(ScriptBlock::Query {
                name: name.clone(),
                text: text.clone(),
            })?;
        }
        Ok(plan)
    }

    /// Renders `plan` together with the files of `datasources`.
    pub fn render(
        &self,
        plan: &ScriptPlan,
        datasources: &[Datasource],
    ) -> Result<EngineInput, ConfigurationError> {
        let mut files = self.source.standard_files(plan.stages())?;
        for datasource in datasources {
            for (target, source) in datasource.input_files() {
                match files.entry(target.clone()) {
                    Entry::Occupied(_) => {
                        return Err(ConfigurationError::DuplicateTarget(target.clone()))
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(source.clone());
                    }
                }
            }
        }

        let registrations: Vec<&Registration> = plan
            .blocks()
            .iter()
            .filter_map(|block| match block {
                ScriptBlock::Registration(registration) => Some(registration),
                _ => None,
            })
            .collect();
        let delivery = plan.loading_stage().map(|(stage, entry)| {
            if entry == StageEntry::Master || stage == Stage::DataConversion {
                Delivery::Hooks(stage)
            } else {
                Delivery::Inline
            }
        });

        let mut script = Vec::new();
        let mut exports = Vec::new();
        let mut queries = Vec::new();
        let mut rules_imported = false;
        match delivery {
            None if !registrations.is_empty() => return Err(ConfigurationError::UnusedDatasources),
            Some(Delivery::Hooks(stage)) => write_hooks(&mut files, stage, &registrations),
            _ => {}
        }
        for block in plan.blocks() {
            match block {
                ScriptBlock::Setup(directive) => script.push(directive.clone()),
                ScriptBlock::Registration(registration) => {
                    if delivery == Some(Delivery::Inline) {
                        script.push(registration.load_data.trim_end().to_owned());
                    }
                }
                ScriptBlock::Pipeline { stage, entry } => {
                    if delivery == Some(Delivery::Inline) && !rules_imported {
                        rules_imported = true;
                        if let Some(rules) = joined_rules(&registrations) {
                            files.insert(INLINE_RULES_FILE.into(), InputSource::Content(rules));
                            script.push(format!("import \"$(dir.root)/{INLINE_RULES_FILE}\""));
                        }
                    }
                    script.push(format!(
                        "exec scripts/{}/{}",
                        stage.name(),
                        entry.script_name()
                    ));
                }
                ScriptBlock::Export(file) => {
                    script.push(format!(
                        "export \"$(dir.root)/{file}\" \"{}\"",
                        export_format(file)
                    ));
                    exports.push(file.as_str());
                }
                ScriptBlock::Query { text, .. } => queries.push(text.as_str()),
            }
        }

        let mut input = EngineInput::new(files, script, self.vocabulary.namespaces().clone());
        for file in exports {
            input.expect_output(file);
        }
        for query in queries {
            input.add_query(query);
        }
        Ok(input)
    }

    /// Plans and renders a run in one go.
    pub fn assemble(
        &self,
        stages: &[(Stage, StageEntry)],
        datasources: &[Datasource],
        queries: &[(String, String)],
    ) -> Result<EngineInput, ConfigurationError> {
        let plan = self.plan(stages, datasources, queries)?;
        self.render(&plan, datasources)
    }

    fn check_query(&self, name: &str, text: &str) -> Result<(), ConfigurationError> {
        let invalid = |message: String| ConfigurationError::InvalidQuery {
            name: name.to_owned(),
            message,
        };
        if text.trim().is_empty() {
            return Err(invalid("the query is empty".to_owned()));
        }
        let full = format!("{}{text}", self.vocabulary.namespaces().sparql_prologue());
        spargebra::Query::parse(&full, None).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }
}

fn export_format(file: &str) -> &'static str {
    if file.ends_with(".ttl") {
        "text/turtle"
    } else {
        "application/n-triples"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Hooks(Stage),
    Inline,
}

fn write_hooks(files: &mut InputFiles, stage: Stage, registrations: &[&Registration]) {
    let load_data = registrations
        .iter()
        .map(|registration| registration.load_data.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let rules = registrations
        .iter()
        .map(|registration| registration.rules.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    files.insert(
        stage.hook_file("load_data.rdfox"),
        InputSource::Content(load_data),
    );
    files.insert(stage.hook_file("map.dlog"), InputSource::Content(rules));
}

fn joined_rules(registrations: &[&Registration]) -> Option<String> {
    let rules: Vec<&str> = registrations
        .iter()
        .map(|registration| registration.rules.as_str())
        .filter(|rules| !rules.trim().is_empty())
        .collect();
    (!rules.is_empty()).then(|| rules.join("\n"))
}
