use assert_fs::prelude::*;
use assert_fs::TempDir;
use probs_runner::{ProbsConfig, RunnerConfig};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// A minimal copy of the ontology: an ontology file and one empty folder per stage.
pub fn script_source() -> Result<TempDir, Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    dir.child("probs.fss").write_str(
        "Prefix(:=<https://ukfires.org/probs/ontology/>)\n\
         Ontology(<https://ukfires.org/probs/ontology/>\n\
         Declaration(Class(:Object))\n\
         Declaration(DataProperty(:hasName))\n\
         Declaration(DataProperty(:hasValue))\n\
         )\n",
    )?;
    dir.child("additional_info.ttl").write_str("")?;
    for stage in [
        "shared",
        "data-conversion",
        "data-enhancement",
        "reasoning",
        "data-validation",
    ] {
        dir.child(format!("scripts/{stage}/master.rdfox"))
            .write_str("# stage script\n")?;
    }
    Ok(dir)
}

/// A shell script standing in for the engine. `$ENGINE_DIR` is a folder the script may
/// leave files in for the test to inspect.
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
                "#!/bin/sh\nENGINE_DIR='{}'\ncd \"$2\" || exit 99\ncp master.rdfox \"$ENGINE_DIR/\"\n{body}\n",
                dir.path().display()
            ),
        )?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(Self { dir })
    }

    /// An engine that keeps running until it reads `quit`.
    pub fn long_running() -> Result<Self, Box<dyn std::error::Error>> {
        Self::new("while read -r line; do\n  [ \"$line\" = \"quit\" ] && exit 0\ndone")
    }

    /// A file the script left in `$ENGINE_DIR`.
    pub fn seen(&self, name: &str) -> Result<String, std::io::Error> {
        fs::read_to_string(self.dir.path().join(name))
    }

    pub fn config(&self, scripts: &Path) -> ProbsConfig {
        ProbsConfig::default()
            .with_script_source_dir(scripts)
            .with_runner(
                RunnerConfig::default()
                    .with_executable(self.dir.path().join("RDFox"))
                    .with_host("127.0.0.1")
                    .with_startup_timeout(Duration::from_secs(10))
                    .with_shutdown_timeout(Duration::from_secs(2)),
            )
    }
}

/// Writes a small data folder like the ones converted from the command line.
pub fn datasource_folder(root: &TempDir) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let folder = root.child("sample_datasource_simple");
    folder.child("data.csv").write_str("Object,Value\nBread,6\nCake,3\n")?;
    folder.child("load_data.rdfox").write_str(
        "prefix ufrd: <https://ukfires.org/probs/ontology/rawdata/>\n\
         dsource register \"data\" type delimitedFile file \"$(dir.datasource)data.csv\" header true\n",
    )?;
    folder
        .child("map.dlog")
        .write_str(":Object[?ObjectID] :- ufrd:data(?ObjectID, ?Value) .\n")?;
    Ok(folder.path().to_owned())
}

/// Answers readiness checks and queries like the engine endpoint.
pub fn fake_endpoint() -> Result<u16, Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let _ = answer(stream);
        }
    });
    Ok(port)
}

fn answer(stream: TcpStream) -> std::io::Result<()> {
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

    let content = if request_line.starts_with("POST ") {
        "?obj\t?value\n<https://ukfires.org/probs/ontology/data/simple/Object-Bread>\t6.0E0\n<https://ukfires.org/probs/ontology/data/simple/Object-Cake>\t3.0E0\n"
    } else {
        "?Name\n\"default\"\n"
    };
    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: text/tab-separated-values\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{content}",
        content.len()
    )?;
    stream.flush()
}
