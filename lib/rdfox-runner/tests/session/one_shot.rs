use crate::common::{printed_root, FakeEngine};
use rdfox_runner::{run_script, EngineInput, InputFiles, Namespaces, RunnerError, Value};
use std::error::Error;
use std::fs;

const WIDGET_ANSWERS: &str = r#"mkdir -p results
printf '?Object\t?Value\n"Widget"\t3.5\n\n' > results/query-0.tsv
echo "root=$PWD""#;

fn input_with_query() -> EngineInput {
    let namespaces = Namespaces::new().with("", "https://ukfires.org/probs/ontology/");
    let mut files = InputFiles::new();
    files.insert("data/data.csv".into(), "Object,Value\n\"Widget\",3.5\n".into());
    let mut input = EngineInput::new(
        files,
        vec!["exec scripts/shared/setup-RDFox".to_owned()],
        namespaces,
    );
    input.add_query("SELECT ?Object ?Value WHERE { ?x :hasName ?Object ; :hasValue ?Value }");
    input
}

#[test]
fn collects_answers_of_embedded_queries() -> Result<(), Box<dyn Error>> {
    let engine = FakeEngine::new(WIDGET_ANSWERS)?;
    let run = run_script(&input_with_query(), &engine.config())?;

    assert_eq!(run.answers().len(), 1);
    let table = run.query_results(0).ok_or("no answers")?;
    assert_eq!(table.variables(), ["Object", "Value"]);
    assert_eq!(table.len(), 1);
    assert_eq!(
        table.rows()[0].get("Object"),
        Some(&Value::String("Widget".to_owned()))
    );
    assert_eq!(table.rows()[0].get("Value").and_then(Value::as_f64), Some(3.5));

    let master = fs::read_to_string(run.files("master.rdfox"))?;
    assert!(master.starts_with("prefix : <https://ukfires.org/probs/ontology/>\n"));
    assert!(master.ends_with("quit\n"));
    assert!(run.files("data/data.csv").is_file());
    Ok(())
}

#[test]
fn working_dir_is_removed_with_the_run() -> Result<(), Box<dyn Error>> {
    let engine = FakeEngine::new(WIDGET_ANSWERS)?;
    let run = run_script(&input_with_query(), &engine.config())?;
    let root = run.working_dir().to_owned();
    assert!(root.is_dir());
    let answers = run.into_answers();
    assert_eq!(answers.len(), 1);
    assert!(!root.exists());
    Ok(())
}

#[test]
fn retained_working_dir_survives() -> Result<(), Box<dyn Error>> {
    let engine = FakeEngine::new(WIDGET_ANSWERS)?;
    let config = engine.config().with_retained_working_dir(true);
    let root = run_script(&input_with_query(), &config)?.working_dir().to_owned();
    assert!(root.join("results/query-0.tsv").is_file());
    fs::remove_dir_all(root)?;
    Ok(())
}

#[test]
fn failing_exit_code_carries_engine_output() -> Result<(), Box<dyn Error>> {
    let engine = FakeEngine::new("echo \"root=$PWD\"\necho 'Loading map.dlog failed' >&2\nexit 3")?;
    let error = run_script(&EngineInput::default(), &engine.config()).err();

    let Some(RunnerError::EngineExecution { message, output }) = error else {
        panic!("expected an execution error, got {error:?}");
    };
    assert!(message.contains('3'), "{message}");
    assert!(output.contains("Loading map.dlog failed"), "{output}");
    let root = printed_root(&output).ok_or("root not printed")?;
    assert!(!root.exists());
    Ok(())
}

#[test]
fn error_marker_in_output_fails_the_run() -> Result<(), Box<dyn Error>> {
    let engine = FakeEngine::new("echo 'Error: unknown prefix ufrd'")?;
    let error = run_script(&EngineInput::default(), &engine.config()).err();
    assert!(matches!(error, Some(RunnerError::EngineExecution { .. })));
    Ok(())
}

#[test]
fn missing_executable_is_a_launch_error() {
    let config = rdfox_runner::RunnerConfig::default()
        .with_executable("/nonexistent/path/to/RDFox");
    let error = run_script(&EngineInput::default(), &config).err();
    assert!(matches!(error, Some(RunnerError::EngineLaunch { .. })));
}

#[test]
fn rejected_license_is_a_launch_error() -> Result<(), Box<dyn Error>> {
    let engine = FakeEngine::new("echo 'The license key is invalid.' >&2\nexit 1")?;
    let error = run_script(&EngineInput::default(), &engine.config()).err();
    assert!(matches!(error, Some(RunnerError::EngineLaunch { .. })));
    Ok(())
}

#[test]
fn license_is_passed_through() -> Result<(), Box<dyn Error>> {
    let engine = FakeEngine::new("echo \"license=$RDFOX_LICENSE_CONTENT\"")?;
    let mut config = engine.config();
    config.license_content = Some("abc123".to_owned());
    let run = run_script(&EngineInput::default(), &config)?;
    assert!(run.output().contains("license=abc123"));
    Ok(())
}

#[test]
fn missing_answers_are_an_execution_error() -> Result<(), Box<dyn Error>> {
    let engine = FakeEngine::new("echo \"root=$PWD\"")?;
    let error = run_script(&input_with_query(), &engine.config()).err();
    let Some(RunnerError::EngineExecution { message, output }) = error else {
        panic!("expected an execution error, got {error:?}");
    };
    assert!(message.contains("query 0"), "{message}");
    let root = printed_root(&output).ok_or("root not printed")?;
    assert!(!root.exists());
    Ok(())
}

#[test]
fn truncated_answers_raise_parse_error_and_clean_up() -> Result<(), Box<dyn Error>> {
    let engine = FakeEngine::new(
        r#"mkdir -p results
printf '?Object\t?Value\n"Wid' > results/query-0.tsv
echo "$PWD" > "$ENGINE_DIR/last-root""#,
    )?;
    let error = run_script(&input_with_query(), &engine.config()).err();
    let Some(RunnerError::ResultParse { raw, .. }) = error else {
        panic!("expected a parse error, got {error:?}");
    };
    assert!(raw.ends_with("\"Wid"));
    let root = engine.last_root().ok_or("root not recorded")?;
    assert!(!root.exists());
    Ok(())
}

#[test]
fn output_that_is_not_utf8_is_drained_to_the_end() -> Result<(), Box<dyn Error>> {
    let engine = FakeEngine::new(
        r#"printf 'Importing caf\351.ttl\n'
i=0
while [ $i -lt 8000 ]; do
  echo "line $i"
  i=$((i + 1))
done
echo 'Import done'"#,
    )?;
    let run = run_script(&EngineInput::default(), &engine.config())?;
    assert!(run.output().starts_with("Importing caf\u{FFFD}.ttl\n"));
    assert!(run.output().contains("line 7999\n"));
    assert!(run.output().ends_with("Import done\n"));
    Ok(())
}

#[test]
fn reused_working_dir_does_not_return_earlier_answers() -> Result<(), Box<dyn Error>> {
    let root = assert_fs::TempDir::new()?;
    let answering = FakeEngine::new("mkdir -p results\nprintf '?n\\n1\\n' > results/query-0.tsv")?;
    let config = answering
        .config()
        .with_working_dir(Some(root.path().to_owned()));
    assert_eq!(run_script(&input_with_query(), &config)?.answers().len(), 1);

    let silent = FakeEngine::new("echo 'nothing answered'")?;
    let error = run_script(
        &input_with_query(),
        &config.with_executable(silent.path()),
    )
    .err();
    assert!(matches!(error, Some(RunnerError::EngineExecution { .. })));
    Ok(())
}

#[test]
fn reused_working_dir_does_not_return_earlier_outputs() -> Result<(), Box<dyn Error>> {
    let root = assert_fs::TempDir::new()?;
    let mut input = EngineInput::default();
    input.expect_output("data/export.nt.gz");
    let exporting = FakeEngine::new("mkdir -p data\necho '<a> <b> <c> .' > data/export.nt.gz")?;
    let config = exporting
        .config()
        .with_working_dir(Some(root.path().to_owned()));
    let destination = root.path().join("copy.nt.gz");
    run_script(&input, &config)?.copy_out("data/export.nt.gz", &destination)?;
    assert!(destination.is_file());

    let silent = FakeEngine::new("echo 'nothing exported'")?;
    let run = run_script(&input, &config.with_executable(silent.path()))?;
    let error = run.copy_out("data/export.nt.gz", &destination).err();
    assert!(matches!(error, Some(RunnerError::EngineExecution { .. })));
    Ok(())
}
