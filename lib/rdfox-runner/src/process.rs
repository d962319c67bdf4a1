use crate::config::{RunnerConfig, LICENSE_ENV};
use crate::error::RunnerError;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// The name of the master script, relative to the working directory, without extension.
pub const MASTER_SCRIPT: &str = "master";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running engine process with its console output drained into a shared buffer.
///
/// The process is killed when this value is dropped before it was reaped.
pub(crate) struct EngineProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    output: Arc<Mutex<String>>,
    readers: Vec<JoinHandle<()>>,
    executable: PathBuf,
    reaped: bool,
}

impl EngineProcess {
    /// Starts `<executable> sandbox <root> "exec master"` inside `root`.
    pub fn spawn(config: &RunnerConfig, root: &Path) -> Result<Self, RunnerError> {
        let mut command = Command::new(&config.executable);
        command
            .arg("sandbox")
            .arg(root)
            .arg(format!("exec {MASTER_SCRIPT}"))
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(license) = &config.license_content {
            command.env(LICENSE_ENV, license);
        }

        tracing::debug!(executable = %config.executable.display(), root = %root.display(), "Launching engine");
        let mut child = command.spawn().map_err(|e| RunnerError::EngineLaunch {
            executable: config.executable.clone(),
            message: match e.kind() {
                io::ErrorKind::NotFound => "executable not found".to_owned(),
                _ => "process failed to start".to_owned(),
            },
            output: String::new(),
            source: Some(e),
        })?;

        let output = Arc::new(Mutex::new(String::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(drain(stdout, Arc::clone(&output)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(drain(stderr, Arc::clone(&output)));
        }

        Ok(Self {
            stdin: child.stdin.take(),
            child,
            output,
            readers,
            executable: config.executable.clone(),
            reaped: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Everything the engine printed so far.
    pub fn output(&self) -> String {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the exit status if the process has already terminated.
    pub fn try_exit(&mut self) -> Result<Option<ExitStatus>, RunnerError> {
        let status = self
            .child
            .try_wait()
            .map_err(|e| RunnerError::io(&self.executable, e))?;
        if status.is_some() {
            self.reap(true);
        }
        Ok(status)
    }

    /// Closes stdin and blocks until the process exits on its own.
    pub fn wait(&mut self) -> Result<ExitStatus, RunnerError> {
        self.stdin = None;
        let status = self
            .child
            .wait()
            .map_err(|e| RunnerError::io(&self.executable, e))?;
        self.reap(true);
        Ok(status)
    }

    /// Asks the engine to quit, and kills it if it is still alive after `timeout`.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<(), RunnerError> {
        if self.reaped {
            return Ok(());
        }
        if let Some(mut stdin) = self.stdin.take() {
            // The engine may already be gone, in which case the pipe is closed.
            let _ = stdin.write_all(b"quit\n").and_then(|()| stdin.flush());
        }
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.try_exit()?.is_some() {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        tracing::warn!(pid = self.id(), "Engine did not quit in time, killing it");
        self.kill()
    }

    pub fn kill(&mut self) -> Result<(), RunnerError> {
        if self.reaped {
            return Ok(());
        }
        match self.child.kill() {
            Ok(()) => {}
            // Already exited but not yet reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(RunnerError::io(&self.executable, e)),
        }
        self.child
            .wait()
            .map_err(|e| RunnerError::io(&self.executable, e))?;
        self.reap(false);
        Ok(())
    }

    /// Marks the process as gone. Output readers are only joined after a regular exit, a
    /// killed engine may leave children holding its pipes open.
    fn reap(&mut self, join_readers: bool) {
        self.reaped = true;
        self.stdin = None;
        for reader in self.readers.drain(..) {
            if join_readers {
                let _ = reader.join();
            }
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if !self.reaped {
            if let Err(error) = self.kill() {
                tracing::warn!(%error, "Failed to kill engine process");
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(reader: R, output: Arc<Mutex<String>>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break,
                Ok(_) => {}
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    tracing::debug!(target: "rdfox", %error, "Stopped reading engine output");
                    break;
                }
            }
            let line = String::from_utf8_lossy(&buffer);
            let line = line.trim_end_matches(['\n', '\r']);
            tracing::debug!(target: "rdfox", "{line}");
            let mut output = output.lock().unwrap_or_else(PoisonError::into_inner);
            output.push_str(line);
            output.push('\n');
        }
    })
}
