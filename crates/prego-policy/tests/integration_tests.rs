//! Integration tests for prego-policy with the fixture policies under
//! `testing/fixtures/policies`.

use prego_core::{
    EventSource, ParseMode, PipelineRunner, PregoError, RunConfig, RunSummary, Shutdown,
};
use prego_out::Formatter;
use prego_policy::{prepare_controller, PolicySources};
use std::path::PathBuf;

/// Path to the fixture policies relative to the workspace root
const FIXTURES_PATH: &str = "testing/fixtures/policies";

fn fixture(relative: &str) -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = std::path::Path::new(&manifest_dir).parent().unwrap().parent().unwrap();
    workspace_root.join(FIXTURES_PATH).join(relative)
}

async fn run(config: RunConfig, input: &str) -> (prego_core::Result<RunSummary>, String) {
    let controller = prepare_controller(&config).unwrap();
    let formatter = Formatter::from_spec(&config.output).unwrap();
    let mut runner = PipelineRunner::new(controller, formatter);

    let mut source = EventSource::new(input.as_bytes(), config.parse_mode);
    let mut sink = Vec::new();
    let result = runner.run(&mut source, &mut sink, &Shutdown::new()).await;
    (result, String::from_utf8(sink).unwrap())
}

// =============================================================================
// Simple mode
// =============================================================================

#[tokio::test]
async fn test_plus_one_per_event() {
    let config = RunConfig::new()
        .with_policy(fixture("plus_one/plus_one.rego"))
        .with_query("res = data.test.res");

    let (result, output) = run(config, "{\"x\":1}\n{\"x\":41}\n").await;

    assert_eq!(result.unwrap().items, 2);
    assert_eq!(output, "{\"res\":2}\n{\"res\":42}\n");
}

#[tokio::test]
async fn test_undefined_events_print_nothing() {
    let config = RunConfig::new()
        .with_policy(fixture("plus_one/plus_one.rego"))
        .with_query("res = data.test.res");

    let (result, output) = run(config, "{\"y\":1}\nnot json\n{\"x\":0}\n").await;

    let summary = result.unwrap();
    assert_eq!(summary.events, 3);
    assert_eq!(output, "{\"res\":1}\n");
}

#[tokio::test]
async fn test_extract_output() {
    let config = RunConfig::new()
        .with_policy(fixture("plus_one/plus_one.rego"))
        .with_query("res = data.test.res")
        .with_output("regogo=res");

    let (_, output) = run(config, "{\"x\":9}\n").await;
    assert_eq!(output, "10\n");
}

#[tokio::test]
async fn test_strict_mode_reports_line() {
    let config = RunConfig::new()
        .with_policy(fixture("plus_one/plus_one.rego"))
        .with_query("res = data.test.res")
        .with_parse_mode(ParseMode::Strict);

    let (result, output) = run(config, "{\"x\":1}\n[1]\n").await;

    assert!(matches!(result, Err(PregoError::Decode { line: 2, .. })));
    assert_eq!(output, "{\"res\":2}\n");
}

// =============================================================================
// State feedback
// =============================================================================

#[tokio::test]
async fn test_state_counts_events() {
    let config = RunConfig::new()
        .with_policy(fixture("counter/counter.rego"))
        .with_policy(fixture("counter/seen.rego"))
        .with_query("seen = data.test.seen")
        .stateful(true);

    let controller = prepare_controller(&config).unwrap();
    let mut runner = PipelineRunner::new(controller, Formatter::from_spec("json").unwrap());
    let mut source = EventSource::new(&b"{}\n{}\n{}\n"[..], ParseMode::Lenient);
    let mut sink = Vec::new();

    runner.run(&mut source, &mut sink, &Shutdown::new()).await.unwrap();

    assert_eq!(
        String::from_utf8(sink).unwrap(),
        "{\"seen\":null}\n{\"seen\":1}\n{\"seen\":2}\n"
    );
    let state = runner.controller().state();
    assert_eq!(state.document(), &serde_json::json!(3));
    assert_eq!(state.version(), 3);
}

#[tokio::test]
async fn test_stateless_run_does_not_mount_state() {
    let config = RunConfig::new()
        .with_policy(fixture("counter/counter.rego"))
        .with_policy(fixture("counter/seen.rego"))
        .with_query("seen = data.test.seen");

    let (result, output) = run(config, "{}\n{}\n").await;

    assert_eq!(result.unwrap().items, 0);
    assert!(output.is_empty());
}

#[test]
fn test_missing_nextstate_rule_is_not_a_startup_error() {
    // NEXTSTATE is only required to bind when it has results
    let config = RunConfig::new()
        .with_policy(fixture("plus_one/plus_one.rego"))
        .with_query("res = data.test.res")
        .stateful(true);

    assert!(prepare_controller(&config).is_ok());
}

// =============================================================================
// Configuration errors
// =============================================================================

#[test]
fn test_missing_policy_file_is_config_error() {
    let config = RunConfig::new().with_policy(fixture("plus_one/absent.rego"));
    let err = prepare_controller(&config).err().unwrap();
    assert!(matches!(err, PregoError::Config(_)));
    assert!(err.is_startup());
}

#[test]
fn test_bad_query_is_compile_error() {
    let config = RunConfig::new()
        .with_policy(fixture("plus_one/plus_one.rego"))
        .with_query("res := := data");
    let err = prepare_controller(&config).err().unwrap();
    assert!(matches!(err, PregoError::Compile(_)));
}

// =============================================================================
// Discovery
// =============================================================================

#[test]
fn test_discover_loads_data_and_skips_notes() {
    let sources = PolicySources::discover(&[fixture("session")]).unwrap();

    assert_eq!(sources.modules().len(), 1);
    assert!(sources.modules()[0].path.ends_with("main.rego"));
    assert_eq!(sources.data()["limits"]["threshold"], 10);
}

#[test]
fn test_discover_merges_yaml_and_json_in_temp_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("a.json"), r#"{"cfg": {"a": 1, "shared": "json"}}"#).unwrap();
    std::fs::write(dir.path().join("nested/b.yml"), "cfg:\n  b: 2\n  shared: yaml\n").unwrap();
    std::fs::write(dir.path().join("policy.rego"), "package p\n").unwrap();
    std::fs::write(dir.path().join("README"), "ignored").unwrap();

    let sources = PolicySources::discover(&[dir.path()]).unwrap();

    assert_eq!(sources.modules().len(), 1);
    assert_eq!(
        serde_json::Value::Object(sources.data().clone()),
        serde_json::json!({"cfg": {"a": 1, "b": 2, "shared": "yaml"}})
    );
}
