use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the engine executable.
pub const EXECUTABLE_ENV: &str = "RDFOX_EXECUTABLE";
/// Environment variable holding the engine license, passed through untouched.
pub const LICENSE_ENV: &str = "RDFOX_LICENSE_CONTENT";

pub const DEFAULT_EXECUTABLE: &str = "RDFox";
pub const DEFAULT_PORT: u16 = 12112;
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lines of engine output that mark a failed command.
const DEFAULT_ERROR_MARKERS: &[&str] = &["An error occurred", "Error:"];

/// Holds the configuration used to launch the engine.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// The engine binary. A bare name is looked up on `PATH`.
    pub executable: PathBuf,
    /// License content handed to the engine through its environment.
    pub license_content: Option<String>,
    /// Runs the engine in this directory instead of a temporary one.
    ///
    /// A caller-supplied directory is never removed.
    pub working_dir: Option<PathBuf>,
    /// Whether a temporary working directory survives the run.
    pub retain_working_dir: bool,
    /// Host name of the engine endpoint.
    pub host: String,
    /// Port of the engine endpoint.
    pub port: u16,
    /// The data store queries are sent to.
    pub datastore: String,
    /// How long to wait for the endpoint to answer after launch.
    pub startup_timeout: Duration,
    /// How long to wait for a graceful exit before killing the process.
    pub shutdown_timeout: Duration,
    /// Engine output lines starting with one of these are treated as failures.
    pub error_markers: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            license_content: None,
            working_dir: None,
            retain_working_dir: false,
            host: "localhost".to_owned(),
            port: DEFAULT_PORT,
            datastore: "default".to_owned(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            error_markers: DEFAULT_ERROR_MARKERS
                .iter()
                .map(|marker| (*marker).to_owned())
                .collect(),
        }
    }
}

impl RunnerConfig {
    /// Creates the default configuration, taking the executable and license from the
    /// environment when they are set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(executable) = env::var_os(EXECUTABLE_ENV) {
            config.executable = PathBuf::from(executable);
        }
        config.license_content = env::var(LICENSE_ENV).ok();
        config
    }

    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, working_dir: Option<PathBuf>) -> Self {
        self.working_dir = working_dir;
        self
    }

    #[must_use]
    pub fn with_retained_working_dir(mut self, retain: bool) -> Self {
        self.retain_working_dir = retain;
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// The base URL of the engine endpoint.
    pub fn endpoint_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Returns the first line of `output` that starts with an error marker.
    pub(crate) fn find_error<'a>(&self, output: &'a str) -> Option<&'a str> {
        output.lines().find(|line| {
            let line = line.trim_start();
            self.error_markers
                .iter()
                .any(|marker| line.starts_with(marker.as_str()))
        })
    }
}
