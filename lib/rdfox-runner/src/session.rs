//! Lifecycle of one engine process.
//!
//! A [`Session`] goes through `idle -> running -> (closed | crashed)`. It owns the engine
//! process and its working directory, and releases both on every exit path: on
//! [`Session::close`], when an operation fails, and when it is dropped.
//!
//! Two entry points share it:
//! - [`run_script`] runs the engine to completion and returns a [`CompletedRun`] holding the
//!   answers of the queries embedded in the script.
//! - [`start_endpoint`] keeps the engine running behind its HTTP endpoint, answering
//!   [`Session::query`] calls until the session is closed.

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::input::{results_file, stage_files, Completion, EngineInput};
use crate::namespaces::Namespaces;
use crate::process::{EngineProcess, MASTER_SCRIPT};
use crate::results::{ResultTable, TSV_MEDIA_TYPE};
use crate::workdir::WorkingDir;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::thread;
use std::time::{Duration, Instant};

const READINESS_INTERVAL: Duration = Duration::from_millis(100);
const SPARQL_QUERY_MEDIA_TYPE: &str = "application/sparql-query";
const TURTLE_MEDIA_TYPE: &str = "text/turtle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The working directory is staged but the engine has not been started.
    Idle,
    Running,
    /// The engine was shut down on request or finished its script.
    Closed,
    /// The engine failed or exited unexpectedly.
    Crashed,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Closed => "closed",
            Self::Crashed => "crashed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs the engine on `input` until it quits and collects the answers of every query added
/// with [`EngineInput::add_query`].
///
/// The working directory stays available through the returned [`CompletedRun`] and is
/// removed when that is dropped. On error it is removed before this function returns.
pub fn run_script(input: &EngineInput, config: &RunnerConfig) -> Result<CompletedRun, RunnerError> {
    let mut session = Session::prepare(input, Completion::Exit, config.clone())?;
    session.launch()?;
    let output = session.wait_for_exit()?;

    let mut answers = Vec::with_capacity(input.query_count());
    for index in 0..input.query_count() {
        answers.push(session.read_answers(index, &output)?);
    }

    let working_dir = session
        .working_dir
        .take()
        .ok_or(RunnerError::NotRunning(SessionState::Closed.name()))?;
    Ok(CompletedRun {
        working_dir,
        output,
        answers,
    })
}

/// Starts the engine on `input` and returns once its endpoint answers requests.
pub fn start_endpoint(input: &EngineInput, config: &RunnerConfig) -> Result<Session, RunnerError> {
    let mut session = Session::prepare(input, Completion::Endpoint, config.clone())?;
    session.launch()?;
    session.wait_for_endpoint()?;
    Ok(session)
}

/// An engine process together with the directory it runs in.
pub struct Session {
    config: RunnerConfig,
    namespaces: Namespaces,
    working_dir: Option<WorkingDir>,
    process: Option<EngineProcess>,
    client: Client,
    state: SessionState,
}

impl Session {
    fn prepare(
        input: &EngineInput,
        completion: Completion,
        config: RunnerConfig,
    ) -> Result<Self, RunnerError> {
        let working_dir =
            WorkingDir::create(config.working_dir.as_deref(), config.retain_working_dir)?;
        working_dir.remove_stale(&input.outputs())?;
        stage_files(working_dir.path(), &input.files)?;
        let master = working_dir.path().join(format!("{MASTER_SCRIPT}.rdfox"));
        let script = input.master_script(completion, config.port);
        tracing::debug!(path = %master.display(), "Writing master script:\n{script}");
        fs::write(&master, script).map_err(|e| RunnerError::io(&master, e))?;

        Ok(Self {
            config,
            namespaces: input.namespaces.clone(),
            working_dir: Some(working_dir),
            process: None,
            client: Client::new(),
            state: SessionState::Idle,
        })
    }

    fn launch(&mut self) -> Result<(), RunnerError> {
        let root = self.root()?.to_owned();
        match EngineProcess::spawn(&self.config, &root) {
            Ok(process) => {
                tracing::info!(pid = process.id(), root = %root.display(), "Engine started");
                self.process = Some(process);
                self.state = SessionState::Running;
                Ok(())
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    fn wait_for_exit(&mut self) -> Result<String, RunnerError> {
        let process = self.process_mut()?;
        let status = match process.wait() {
            Ok(status) => status,
            Err(error) => return Err(self.fail(error)),
        };
        let output = process.output();
        let executable = process.executable().to_owned();

        if !status.success() {
            return Err(self.fail(exit_error(&executable, status, output)));
        }
        if let Some(line) = self.config.find_error(&output) {
            let message = format!("the engine reported an error: {}", line.trim());
            return Err(self.fail(RunnerError::execution(message, output)));
        }
        self.process = None;
        self.state = SessionState::Closed;
        Ok(output)
    }

    fn wait_for_endpoint(&mut self) -> Result<(), RunnerError> {
        let deadline = Instant::now() + self.config.startup_timeout;
        let readiness_url = format!("{}/datastores", self.endpoint());
        loop {
            let process = self.process_mut()?;
            let exited = match process.try_exit() {
                Ok(exited) => exited,
                Err(error) => return Err(self.fail(error)),
            };
            let output = process.output();
            let executable = process.executable().to_owned();

            if let Some(status) = exited {
                let error = match exit_error(&executable, status, output) {
                    RunnerError::EngineExecution { message, output } => RunnerError::EngineLaunch {
                        executable,
                        message: format!("{message} before its endpoint came up"),
                        output,
                        source: None,
                    },
                    other => other,
                };
                return Err(self.fail(error));
            }
            if let Some(line) = self.config.find_error(&output) {
                let message = format!("the engine reported an error: {}", line.trim());
                return Err(self.fail(RunnerError::execution(message, output)));
            }
            let ready = self
                .client
                .get(&readiness_url)
                .send()
                .is_ok_and(|response| response.status().is_success());
            if ready {
                tracing::info!(endpoint = %self.endpoint(), "Engine endpoint is ready");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(self.fail(RunnerError::EngineLaunch {
                    executable,
                    message: format!(
                        "the endpoint did not come up within {}s",
                        self.config.startup_timeout.as_secs_f32()
                    ),
                    output,
                    source: None,
                }));
            }
            thread::sleep(READINESS_INTERVAL);
        }
    }

    /// Evaluates a SPARQL query against the running engine.
    ///
    /// The session's namespaces are declared in front of `query`.
    pub fn query(&mut self, query: &str) -> Result<ResultTable, RunnerError> {
        self.ensure_running()?;
        let body = format!("{}{query}", self.namespaces.sparql_prologue());
        tracing::debug!("Sending query:\n{body}");
        let response = self
            .client
            .post(self.datastore_url("sparql"))
            .header(CONTENT_TYPE, SPARQL_QUERY_MEDIA_TYPE)
            .header(ACCEPT, TSV_MEDIA_TYPE)
            .body(body)
            .send();
        let text = self.read_response(response)?;
        ResultTable::from_tsv(&text).map_err(|error| self.fail(error))
    }

    /// Returns every fact of the data store, serialized as Turtle.
    pub fn facts(&mut self) -> Result<String, RunnerError> {
        self.ensure_running()?;
        let response = self
            .client
            .get(self.datastore_url("content"))
            .header(ACCEPT, TURTLE_MEDIA_TYPE)
            .send();
        self.read_response(response)
    }

    /// Shuts the engine down and removes the working directory.
    pub fn close(mut self) -> Result<(), RunnerError> {
        if let Some(mut process) = self.process.take() {
            process.shutdown(self.config.shutdown_timeout)?;
            tracing::info!("Engine stopped");
        }
        if self.state != SessionState::Crashed {
            self.state = SessionState::Closed;
        }
        match self.working_dir.take() {
            Some(working_dir) => working_dir.close(),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The base URL of the engine endpoint.
    pub fn endpoint(&self) -> String {
        self.config.endpoint_url()
    }

    /// The process id of the engine, while it runs.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(EngineProcess::id)
    }

    /// Everything the engine printed so far.
    pub fn output(&self) -> String {
        self.process
            .as_ref()
            .map(EngineProcess::output)
            .unwrap_or_default()
    }

    /// The working directory, until it is removed.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_ref().map(WorkingDir::path)
    }

    /// Resolves a path relative to the working directory.
    pub fn files(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        self.working_dir().map(|root| root.join(relative))
    }

    fn root(&self) -> Result<&Path, RunnerError> {
        self.working_dir()
            .ok_or(RunnerError::NotRunning(self.state.name()))
    }

    fn process_mut(&mut self) -> Result<&mut EngineProcess, RunnerError> {
        let state = self.state;
        self.process
            .as_mut()
            .ok_or(RunnerError::NotRunning(state.name()))
    }

    fn ensure_running(&self) -> Result<(), RunnerError> {
        if self.state == SessionState::Running {
            Ok(())
        } else {
            Err(RunnerError::NotRunning(self.state.name()))
        }
    }

    fn datastore_url(&self, resource: &str) -> String {
        format!(
            "{}/datastores/{}/{resource}",
            self.endpoint(),
            self.config.datastore
        )
    }

    fn read_response(
        &mut self,
        response: reqwest::Result<Response>,
    ) -> Result<String, RunnerError> {
        let response = match response {
            Ok(response) => response,
            Err(error) => return Err(self.request_failed(&error)),
        };
        let status = response.status();
        let text = match response.text() {
            Ok(text) => text,
            Err(error) => return Err(self.request_failed(&error)),
        };
        if status.is_success() {
            Ok(text)
        } else {
            Err(RunnerError::execution(
                format!("the endpoint answered with {status}"),
                text,
            ))
        }
    }

    /// Turns a failed request into an error, marking the session as crashed if the engine
    /// is gone.
    fn request_failed(&mut self, error: &reqwest::Error) -> RunnerError {
        let exited = self
            .process
            .as_mut()
            .and_then(|process| process.try_exit().ok().flatten());
        let output = self.output();
        match exited {
            Some(status) => self.fail(RunnerError::execution(
                format!("the engine exited with {status}: {error}"),
                output,
            )),
            None => RunnerError::execution(format!("request to the engine failed: {error}"), output),
        }
    }

    /// Tears the session down after an error and hands the error back.
    fn fail(&mut self, error: RunnerError) -> RunnerError {
        tracing::debug!(%error, "Session failed, cleaning up");
        self.state = SessionState::Crashed;
        if let Some(mut process) = self.process.take() {
            if let Err(kill_error) = process.kill() {
                tracing::warn!(error = %kill_error, "Failed to kill engine process");
            }
        }
        if let Some(working_dir) = self.working_dir.take() {
            if let Err(close_error) = working_dir.close() {
                tracing::warn!(error = %close_error, "Failed to remove working directory");
            }
        }
        error
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            if let Err(error) = process.shutdown(self.config.shutdown_timeout) {
                tracing::warn!(%error, "Failed to stop engine process");
            }
        }
    }
}

impl Session {
    fn read_answers(&mut self, index: usize, output: &str) -> Result<ResultTable, RunnerError> {
        let path = self.root()?.join(results_file(index));
        match fs::read_to_string(&path) {
            Ok(raw) => ResultTable::from_tsv(&raw).map_err(|error| self.fail(error)),
            Err(error) => {
                let message = format!(
                    "the answers of query {index} were not written to '{}': {error}",
                    path.display()
                );
                Err(self.fail(RunnerError::execution(message, output)))
            }
        }
    }
}

/// The outcome of [`run_script`]: the answers of the embedded queries and the working
/// directory the engine ran in.
#[derive(Debug)]
pub struct CompletedRun {
    working_dir: WorkingDir,
    output: String,
    answers: Vec<ResultTable>,
}

impl CompletedRun {
    /// Everything the engine printed.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn answers(&self) -> &[ResultTable] {
        &self.answers
    }

    /// The answers of the query with the given index.
    pub fn query_results(&self, index: usize) -> Option<&ResultTable> {
        self.answers.get(index)
    }

    /// Returns the answers and removes the working directory.
    pub fn into_answers(self) -> Vec<ResultTable> {
        self.answers
    }

    pub fn working_dir(&self) -> &Path {
        self.working_dir.path()
    }

    /// Resolves a path relative to the working directory.
    pub fn files(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.working_dir.path().join(relative)
    }

    /// Reads a text file the engine produced.
    pub fn read_output(&self, relative: impl AsRef<Path>) -> Result<String, RunnerError> {
        let source = self.produced(relative.as_ref())?;
        fs::read_to_string(&source).map_err(|e| RunnerError::io(source, e))
    }

    /// Copies a file the engine produced to `destination`.
    pub fn copy_out(
        &self,
        relative: impl AsRef<Path>,
        destination: &Path,
    ) -> Result<(), RunnerError> {
        let source = self.produced(relative.as_ref())?;
        fs::copy(&source, destination).map_err(|e| RunnerError::io(destination, e))?;
        Ok(())
    }

    fn produced(&self, relative: &Path) -> Result<PathBuf, RunnerError> {
        let source = self.files(relative);
        if source.is_file() {
            Ok(source)
        } else {
            Err(RunnerError::execution(
                format!("the engine did not produce '{}'", source.display()),
                self.output.clone(),
            ))
        }
    }

    /// Removes the working directory, reporting failures.
    pub fn close(self) -> Result<(), RunnerError> {
        self.working_dir.close()
    }
}

fn exit_error(executable: &Path, status: ExitStatus, output: String) -> RunnerError {
    let license_problem = output.lines().any(|line| {
        let line = line.to_lowercase();
        line.contains("license")
            && ["invalid", "expired", "not found", "could not", "no valid"]
                .iter()
                .any(|problem| line.contains(problem))
    });
    if license_problem {
        RunnerError::EngineLaunch {
            executable: executable.to_owned(),
            message: format!("the engine rejected its license ({status})"),
            output,
            source: None,
        }
    } else {
        RunnerError::execution(format!("the engine exited with {status}"), output)
    }
}
