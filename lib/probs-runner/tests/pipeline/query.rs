use crate::common::{fake_endpoint, script_source, FakeEngine, TestResult};
use assert_fs::prelude::*;
use assert_fs::TempDir;
use probs_runner::{
    answer_queries, convert_and_query_data, convert_endpoint, convert_enhance_endpoint,
    enhance_endpoint, open_endpoint, query_data, ColumnType, ConfigurationError, Datasource,
    ProbsError, ProbsFacts, SessionState, TableSource, Value,
};
use rdfox_runner::RunnerError;
use std::collections::BTreeMap;

const WIDGET_QUERY: &str = "SELECT ?Object ?Value WHERE { ?x :hasName ?Object ; :hasValue ?Value }";

fn widgets(class: &str) -> Result<Datasource, ConfigurationError> {
    Datasource::from_table(
        TableSource::from_rows(
            "data.csv",
            vec!["Object".to_owned(), "Value".to_owned()],
            vec![vec!["Widget".to_owned(), "3.5".to_owned()]],
            "Object",
            "https://ukfires.org/probs/ontology/data/simple/",
            class,
        )
        .with_column("Object", ":hasName", ColumnType::String)
        .with_column("Value", ":hasValue", ColumnType::Double),
    )
}

#[test]
fn converted_table_answers_queries() -> TestResult {
    let scripts = script_source()?;
    let engine = FakeEngine::new(
        r#"cp scripts/data-conversion/map.dlog "$ENGINE_DIR/"
mkdir -p results
printf '?Object\t?Value\n"Widget"\t3.5\n' > results/query-0.tsv"#,
    )?;

    let answers =
        convert_and_query_data(&[widgets(":Object")?], &[WIDGET_QUERY], &engine.config(scripts.path()))?;

    assert_eq!(answers.len(), 1);
    let table = &answers[0];
    assert_eq!(table.len(), 1);
    assert_eq!(
        table.rows()[0].get("Object"),
        Some(&Value::String("Widget".to_owned()))
    );
    assert_eq!(table.rows()[0].get("Value").and_then(Value::as_f64), Some(3.5));

    let rules = engine.seen("map.dlog")?;
    assert!(rules.contains("[?Subject, a, <https://ukfires.org/probs/ontology/Object>]"));
    assert!(rules.contains("<https://ukfires.org/probs/ontology/hasValue>"));
    assert!(engine.seen("master.rdfox")?.contains(
        "exec scripts/data-conversion/master-pipeline\n\
         exec scripts/data-enhancement/master-pipeline\n\
         exec scripts/reasoning/master-pipeline\n"
    ));
    Ok(())
}

#[test]
fn undeclared_mapping_fails_before_launch() -> TestResult {
    let scripts = script_source()?;
    let engine = FakeEngine::new("exit 1")?;
    let error = convert_and_query_data(
        &[widgets(":Widget")?],
        &[WIDGET_QUERY],
        &engine.config(scripts.path()),
    )
    .err();
    assert!(matches!(
        error,
        Some(ProbsError::Configuration(ConfigurationError::UndeclaredConcept(_)))
    ));
    assert!(engine.seen("master.rdfox").is_err());
    Ok(())
}

#[test]
fn queries_converted_facts() -> TestResult {
    let scripts = script_source()?;
    let data = TempDir::new()?;
    data.child("output.nt.gz").write_str("<a> <b> <c> .\n")?;
    let engine = FakeEngine::new(
        r#"mkdir -p results
printf '?n\n1\n' > results/query-0.tsv
printf '?n\n2\n' > results/query-1.tsv"#,
    )?;

    let answers = query_data(
        &[data.path().join("output.nt.gz")],
        &["SELECT (COUNT(*) AS ?n) WHERE { ?s ?p ?o }", "SELECT ?n WHERE { ?n a :Object }"],
        &engine.config(scripts.path()),
    )?;
    let counts: Vec<_> = answers
        .iter()
        .map(|table| table.rows()[0].get("n").cloned())
        .collect();
    assert_eq!(counts, [Some(Value::Integer(1)), Some(Value::Integer(2))]);

    let master = engine.seen("master.rdfox")?;
    assert!(master.contains("exec scripts/shared/init-enhancement\n"));
    assert!(master.contains("import \"$(dir.datasource)output.nt.gz\"\n"));
    assert!(master.contains("exec scripts/data-enhancement/master-pipeline\n"));
    Ok(())
}

#[test]
fn enhancement_can_be_skipped() -> TestResult {
    let scripts = script_source()?;
    let data = TempDir::new()?;
    data.child("enhanced.nt.gz").write_str("<a> <b> <c> .\n")?;
    let engine = FakeEngine::new("mkdir -p results\nprintf '?n\\n1\\n' > results/query-0.tsv")?;

    query_data(
        &[data.path().join("enhanced.nt.gz")],
        &["SELECT (COUNT(*) AS ?n) WHERE { ?s ?p ?o }"],
        &engine.config(scripts.path()).with_enhancement(false),
    )?;
    let master = engine.seen("master.rdfox")?;
    assert!(!master.contains("data-enhancement"));
    assert!(!master.contains("init-enhancement"));
    assert!(master.contains(
        "exec scripts/shared/setup-RDFox\nimport probs.fss\nimport additional_info.ttl\n"
    ));
    assert!(master.contains("exec scripts/reasoning/master-pipeline\n"));
    Ok(())
}

#[test]
fn query_one_expects_a_single_answer() -> TestResult {
    let scripts = script_source()?;
    let single = FakeEngine::new("mkdir -p results\nprintf '?n\\n1\\n' > results/query-0.tsv")?;
    let facts = ProbsFacts::from_facts(":Bread a :Object .", single.config(scripts.path()));
    let row = facts.query_one("SELECT ?n WHERE { ?n a :Object }")?;
    assert_eq!(row.get("n"), Some(&Value::Integer(1)));

    let double = FakeEngine::new("mkdir -p results\nprintf '?n\\n1\\n2\\n' > results/query-0.tsv")?;
    let facts = ProbsFacts::from_facts(":Bread a :Object .", double.config(scripts.path()));
    let error = facts.query_one("SELECT ?n WHERE { ?n a :Object }").err();
    assert!(matches!(error, Some(ProbsError::UnexpectedAnswerCount(2))));
    Ok(())
}

#[test]
fn endpoint_answers_named_queries() -> TestResult {
    let scripts = script_source()?;
    let data = TempDir::new()?;
    data.child("output.nt.gz").write_str("<a> <b> <c> .\n")?;
    let engine = FakeEngine::long_running()?;
    let mut config = engine.config(scripts.path());
    config.runner = config.runner.with_port(fake_endpoint()?);

    let mut session = open_endpoint(&[data.path().join("output.nt.gz")], &config)?;
    assert_eq!(session.state(), SessionState::Running);

    let query = "SELECT ?obj ?value WHERE { ?obj :hasValue ?value } ORDER BY ?obj";
    let direct = session.query(query)?;
    let mut queries = BTreeMap::new();
    queries.insert("q1".to_owned(), query.to_owned());
    let named = answer_queries(&mut session, &queries)?;

    assert_eq!(named.get("q1"), Some(&direct));
    let values: Vec<_> = direct
        .iter()
        .filter_map(|row| row.get("value").and_then(Value::as_f64))
        .collect();
    assert_eq!(values, [6.0, 3.0]);
    assert!(engine.seen("master.rdfox")?.ends_with("endpoint start\n"));
    session.close()?;
    Ok(())
}

#[test]
fn facts_can_be_dumped_as_turtle() -> TestResult {
    let scripts = script_source()?;
    let engine = FakeEngine::new(
        r#"mkdir -p results
echo '<https://ukfires.org/probs/ontology/Bread> a <https://ukfires.org/probs/ontology/Object> .' > results/facts.ttl
printf '?n\n1\n' > results/query-0.tsv"#,
    )?;
    let facts = ProbsFacts::from_facts(":Bread a :Object .", engine.config(scripts.path()))
        .with_print_facts(true);

    let row = facts.query_one("SELECT ?n WHERE { ?n a :Object }")?;
    assert_eq!(row.get("n"), Some(&Value::Integer(1)));
    let master = engine.seen("master.rdfox")?;
    assert!(master.contains(
        "exec scripts/reasoning/master-pipeline\n\
         export \"$(dir.root)/results/facts.ttl\" \"text/turtle\"\n\
         set query.answer-format"
    ));

    let dump = facts.facts()?;
    assert!(dump.contains("<https://ukfires.org/probs/ontology/Bread>"));
    Ok(())
}

#[test]
fn missing_facts_dump_is_an_execution_error() -> TestResult {
    let scripts = script_source()?;
    let engine = FakeEngine::new("echo 'nothing exported'")?;
    let facts = ProbsFacts::from_facts(":Bread a :Object .", engine.config(scripts.path()));
    assert!(matches!(
        facts.facts().err(),
        Some(ProbsError::Runner(RunnerError::EngineExecution { .. }))
    ));
    Ok(())
}

#[test]
fn endpoint_over_converted_datasources() -> TestResult {
    let scripts = script_source()?;
    let engine = FakeEngine::long_running()?;
    let mut config = engine.config(scripts.path());
    config.runner = config.runner.with_port(fake_endpoint()?);

    let mut session = convert_endpoint(&[widgets(":Object")?], &config)?;
    assert_eq!(session.query("SELECT ?obj ?value WHERE { ?obj :hasValue ?value }")?.len(), 2);
    session.close()?;

    let master = engine.seen("master.rdfox")?;
    assert!(master.ends_with("exec scripts/data-conversion/master-pipeline\nendpoint start\n"));
    assert!(!master.contains("data-enhancement"));
    Ok(())
}

#[test]
fn endpoint_over_converted_and_enhanced_datasources() -> TestResult {
    let scripts = script_source()?;
    let engine = FakeEngine::long_running()?;
    let mut config = engine.config(scripts.path());
    config.runner = config.runner.with_port(fake_endpoint()?);

    let session = convert_enhance_endpoint(&[widgets(":Object")?], &config)?;
    assert_eq!(session.state(), SessionState::Running);
    session.close()?;

    let master = engine.seen("master.rdfox")?;
    assert!(master.ends_with(
        "exec scripts/data-conversion/master-pipeline\n\
         exec scripts/data-enhancement/master-pipeline\n\
         endpoint start\n"
    ));
    assert!(!master.contains("reasoning"));
    Ok(())
}

#[test]
fn endpoint_over_enhanced_facts() -> TestResult {
    let scripts = script_source()?;
    let data = TempDir::new()?;
    data.child("original.nt.gz").write_str("<a> <b> <c> .\n")?;
    let engine = FakeEngine::long_running()?;
    let mut config = engine.config(scripts.path());
    config.runner = config.runner.with_port(fake_endpoint()?);

    let session = enhance_endpoint(&[data.path().join("original.nt.gz")], &config)?;
    session.close()?;

    let master = engine.seen("master.rdfox")?;
    assert!(master.contains("exec scripts/shared/init-enhancement\nimport probs.fss\n"));
    assert!(master.contains("import \"$(dir.datasource)original.nt.gz\"\n"));
    assert!(master.ends_with("exec scripts/data-enhancement/master-pipeline\nendpoint start\n"));
    Ok(())
}
