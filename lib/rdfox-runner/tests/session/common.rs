use assert_fs::TempDir;
use rdfox_runner::RunnerConfig;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A shell script standing in for the engine. It is called as
/// `<script> sandbox <root> "exec master"`.
pub struct FakeEngine {
    dir: TempDir,
}

impl FakeEngine {
    pub fn new(body: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = dir.path().join("RDFox");
        fs::write(
            &path,
            format!(
                "#!/bin/sh\nENGINE_DIR='{}'\ncd \"$2\" || exit 99\n{body}\n",
                dir.path().display()
            ),
        )?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(Self { dir })
    }

    /// An engine that keeps running until it reads `quit`.
    pub fn long_running() -> Result<Self, Box<dyn std::error::Error>> {
        Self::new(
            r#"echo "Starting endpoint"
while read -r line; do
  if [ "$line" = "quit" ]; then
    echo "Stopping"
    exit 0
  fi
done"#,
        )
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("RDFox")
    }

    /// The working directory recorded by a script running `echo "$PWD" > "$ENGINE_DIR/last-root"`.
    pub fn last_root(&self) -> Option<PathBuf> {
        fs::read_to_string(self.dir.path().join("last-root"))
            .ok()
            .map(|root| PathBuf::from(root.trim_end()))
    }

    pub fn config(&self) -> RunnerConfig {
        RunnerConfig::default()
            .with_executable(self.path())
            .with_host("127.0.0.1")
            .with_startup_timeout(Duration::from_secs(10))
            .with_shutdown_timeout(Duration::from_secs(2))
    }
}

/// Extracts the working directory a fake engine printed as `root=<path>`.
pub fn printed_root(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("root="))
        .map(PathBuf::from)
}

#[cfg(target_os = "linux")]
pub fn process_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
pub fn process_is_alive(_pid: u32) -> bool {
    false
}

/// A minimal HTTP server answering like the engine endpoint.
pub struct FakeEndpoint {
    pub port: u16,
    pub queries: Arc<AtomicUsize>,
}

impl FakeEndpoint {
    pub fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let queries = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&queries);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let _ = answer(stream, &counter);
            }
        });
        Ok(Self { port, queries })
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

/// A port nothing listens on.
pub fn unused_port() -> Result<u16, Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

fn answer(stream: TcpStream, queries: &AtomicUsize) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut content_length = 0;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header)?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)?;
    let body = String::from_utf8_lossy(&body);

    let (status, content) = if request_line.starts_with("GET /datastores ") {
        ("200 OK", "?Name\n\"default\"\n".to_owned())
    } else if request_line.starts_with("GET /datastores/default/content ") {
        ("200 OK", ":Bread a :Object .\n".to_owned())
    } else if request_line.starts_with("POST /datastores/default/sparql ") {
        queries.fetch_add(1, Ordering::SeqCst);
        if body.contains("CRASH") {
            // Hang up without answering.
            return Ok(());
        } else if body.contains("TRUNCATED") {
            ("200 OK", "?obj\t?value\n<https://ukfires.org/probs/ontology/data/simple/Obj".to_owned())
        } else if body.contains("BROKEN") {
            ("400 Bad Request", "Parse error at line 1".to_owned())
        } else if body.contains("?obj") {
            (
                "200 OK",
                "?obj\t?value\n<https://ukfires.org/probs/ontology/data/simple/Object-Bread>\t6.0E0\n<https://ukfires.org/probs/ontology/data/simple/Object-Cake>\t3.0E0\n".to_owned(),
            )
        } else {
            ("200 OK", "?n\n1\n".to_owned())
        }
    } else {
        ("404 Not Found", String::new())
    };

    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: text/tab-separated-values\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{content}",
        content.len()
    )?;
    stream.flush()
}
