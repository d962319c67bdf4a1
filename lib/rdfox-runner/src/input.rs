use crate::error::RunnerError;
use crate::namespaces::Namespaces;
use crate::results::TSV_MEDIA_TYPE;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const RESULTS_DIR: &str = "results";

/// Where the content of a staged file comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputSource {
    /// A file or a directory tree on disk, copied as is.
    Path(PathBuf),
    /// Literal content, written out verbatim.
    Content(String),
}

impl From<PathBuf> for InputSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for InputSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_owned())
    }
}

impl From<String> for InputSource {
    fn from(content: String) -> Self {
        Self::Content(content)
    }
}

impl From<&str> for InputSource {
    fn from(content: &str) -> Self {
        Self::Content(content.to_owned())
    }
}

/// Files to place in the working directory before the engine starts, keyed by their path
/// relative to the working directory.
///
/// Entries are staged in key order, so a file nested in a staged directory overrides the
/// copied one.
pub type InputFiles = BTreeMap<PathBuf, InputSource>;

/// What the engine needs in order to run: the files to stage, the commands of the master
/// script, the prefixes and the queries answered during a one-shot run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineInput {
    pub files: InputFiles,
    pub script: Vec<String>,
    pub namespaces: Namespaces,
    queries: usize,
    outputs: Vec<PathBuf>,
}

/// How the master script ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The engine quits once the script is done.
    Exit,
    /// The engine starts its endpoint and keeps running.
    Endpoint,
}

impl EngineInput {
    pub fn new(files: InputFiles, script: Vec<String>, namespaces: Namespaces) -> Self {
        Self {
            files,
            script,
            namespaces,
            queries: 0,
            outputs: Vec::new(),
        }
    }

    /// Declares a file the engine is expected to write, relative to the working directory.
    ///
    /// A leftover copy from an earlier run in the same directory is removed before launch.
    pub fn expect_output(&mut self, relative: impl Into<PathBuf>) {
        self.outputs.push(relative.into());
    }

    /// Everything the engine writes: the declared outputs and, with queries, `results/`.
    pub fn outputs(&self) -> Vec<PathBuf> {
        let mut outputs = self.outputs.clone();
        if self.queries > 0 {
            outputs.push(PathBuf::from(RESULTS_DIR));
        }
        outputs
    }

    /// Appends commands that answer `query` into its own results file and returns the index
    /// to read the answers back with.
    pub fn add_query(&mut self, query: &str) -> usize {
        let index = self.queries;
        self.queries += 1;
        let query_file = query_file(index);
        let mut text = self.namespaces.sparql_prologue();
        text.push_str(query);
        self.files.insert(query_file.clone(), InputSource::Content(text));
        self.files
            .entry(PathBuf::from(RESULTS_DIR).join(".placeholder"))
            .or_insert_with(|| InputSource::Content(String::new()));
        self.script.extend([
            format!("set query.answer-format \"{TSV_MEDIA_TYPE}\""),
            format!("set output \"$(dir.root)/{}\"", results_file(index).display()),
            format!("answer \"$(dir.root)/{}\"", query_file.display()),
            "set output \"out\"".to_owned(),
        ]);
        index
    }

    /// The number of queries added with [`Self::add_query`].
    pub fn query_count(&self) -> usize {
        self.queries
    }

    /// Renders the master script executed by the engine.
    pub fn master_script(&self, completion: Completion, port: u16) -> String {
        let mut out = self.namespaces.shell_declarations();
        if completion == Completion::Endpoint {
            let _ = writeln!(out, "set endpoint.port \"{port}\"");
        }
        for command in &self.script {
            out.push_str(command);
            out.push('\n');
        }
        out.push_str(match completion {
            Completion::Exit => "quit\n",
            Completion::Endpoint => "endpoint start\n",
        });
        out
    }
}

pub(crate) fn query_file(index: usize) -> PathBuf {
    PathBuf::from(format!("queries/query-{index}.rq"))
}

pub(crate) fn results_file(index: usize) -> PathBuf {
    PathBuf::from(RESULTS_DIR).join(format!("query-{index}.tsv"))
}

/// Copies or writes every entry of `files` below `root`.
pub fn stage_files(root: &Path, files: &InputFiles) -> Result<(), RunnerError> {
    for (target, source) in files {
        let target = root.join(target);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| RunnerError::io(parent, e))?;
        }
        match source {
            InputSource::Content(content) => {
                fs::write(&target, content).map_err(|e| RunnerError::io(&target, e))?;
            }
            InputSource::Path(path) if path.is_dir() => copy_dir(path, &target)?,
            InputSource::Path(path) => {
                fs::copy(path, &target).map_err(|e| RunnerError::io(path, e))?;
            }
        }
        tracing::debug!(target = %target.display(), "Staged input file");
    }
    Ok(())
}

fn copy_dir(source: &Path, target: &Path) -> Result<(), RunnerError> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_owned();
            RunnerError::io(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or_else(|_| entry.path());
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|e| RunnerError::io(&destination, e))?;
        } else {
            fs::copy(entry.path(), &destination).map_err(|e| RunnerError::io(entry.path(), e))?;
        }
    }
    Ok(())
}
