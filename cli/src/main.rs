#![allow(clippy::print_stderr, reason = "Progress is reported on stderr")]
use crate::cli::{Args, Command, GlobalOptions};
use anyhow::Context;
use clap::Parser;
use probs_runner::{
    convert_data, enhance_data, load_datasource, open_endpoint, probs_namespaces, query_data,
    validate_data, Datasource, ProbsConfig, ResultTable, RunnerConfig,
};
use std::fs;
use std::io::{self, stdin, stdout, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

mod cli;

const DEFAULT_QUERY: &str = "
SELECT ?Observation ?p ?o
WHERE {
    ?Observation a :Observation; ?p ?o .
}
ORDER BY ?Observation ?p ?o
";

pub fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.global.verbose);
    let config = config(&args.global);
    match args.command {
        Command::ConvertData { inputs, output } => {
            eprintln!("Converting {} inputs...", inputs.len());
            let datasources = inputs
                .iter()
                .map(|input| {
                    load_datasource(input).with_context(|| {
                        format!("Failed to load the datasource in {}", input.display())
                    })
                })
                .collect::<anyhow::Result<Vec<Datasource>>>()?;
            convert_data(&datasources, &output, &config)?;
            eprintln!("Output written to {}.", output.display());
            Ok(())
        }
        Command::EnhanceData { inputs, output } => {
            eprintln!("Enhancing {} inputs...", inputs.len());
            enhance_data(&inputs, &output, &config)?;
            eprintln!("Output written to {}.", output.display());
            Ok(())
        }
        Command::ValidateData { inputs } => {
            eprintln!("Checking {} inputs...", inputs.len());
            if args.global.verbose == 0 {
                eprintln!("(run with -v to see the results)");
            }
            validate_data(&inputs, &config)?;
            Ok(())
        }
        Command::Query {
            inputs,
            queries,
            no_enhance,
        } => {
            let texts = read_queries(&queries)?;
            let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
            let answers = query_data(&inputs, &texts, &config.with_enhancement(!no_enhance))?;
            write_answers(&answers)
        }
        Command::Endpoint {
            inputs,
            port,
            queries,
        } => {
            let mut config = config;
            if let Some(port) = port {
                config.runner = config.runner.with_port(port);
            }
            let mut texts = read_queries(&queries)?;
            if texts.is_empty() {
                texts.push(format!(
                    "{}{DEFAULT_QUERY}",
                    probs_namespaces().sparql_prologue()
                ));
            }

            eprintln!("Starting endpoint...");
            let session = open_endpoint(&inputs, &config)?;
            let url = console_url(&session.endpoint(), &texts.join("\n"))?;
            eprintln!("Started endpoint");
            eprintln!("Open {url} in your browser.");
            eprintln!("Press Enter to stop the endpoint.");
            stdin()
                .read_line(&mut String::new())
                .context("Failed to read from stdin")?;
            eprintln!("Stopping endpoint");
            session.close()?;
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,probs_runner={level},rdfox_runner={level}"))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn config(options: &GlobalOptions) -> ProbsConfig {
    let runner = RunnerConfig::from_env()
        .with_working_dir(options.working_dir.clone())
        .with_retained_working_dir(options.keep_working_dir);
    let config = ProbsConfig::default().with_runner(runner);
    match &options.scripts {
        Some(scripts) => config.with_script_source_dir(scripts),
        None => config,
    }
}

fn read_queries(files: &[PathBuf]) -> anyhow::Result<Vec<String>> {
    files
        .iter()
        .map(|file| {
            fs::read_to_string(file)
                .with_context(|| format!("Failed to read the query file {}", file.display()))
        })
        .collect()
}

/// Writes every table as TSV, separated by empty lines.
fn write_answers(answers: &[ResultTable]) -> anyhow::Result<()> {
    let mut out = stdout().lock();
    for (index, table) in answers.iter().enumerate() {
        if index > 0 {
            writeln!(out)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(&mut out);
        writer.write_record(table.variables())?;
        for row in table {
            writer.write_record(table.variables().iter().map(|variable| {
                row.get(variable)
                    .map(ToString::to_string)
                    .unwrap_or_default()
            }))?;
        }
        writer.flush()?;
    }
    Ok(())
}

/// The endpoint console with `query` filled in.
fn console_url(endpoint: &str, query: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(endpoint)
        .and_then(|url| url.join("/console/default"))
        .with_context(|| format!("Invalid endpoint URL {endpoint}"))?;
    url.query_pairs_mut().append_pair("query", query);
    Ok(url)
}
