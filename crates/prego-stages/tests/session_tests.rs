//! Integration tests for staged sessions against the fixture policies.

use prego_core::{EventSource, ParseMode, PregoError, RunSummary, Shutdown};
use prego_out::Formatter;
use prego_policy::PolicySources;
use prego_stages::{Session, StagedPipeline};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

/// Path to the fixture policies relative to the workspace root
const FIXTURES_PATH: &str = "testing/fixtures/policies";

fn fixture(relative: &str) -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = std::path::Path::new(&manifest_dir).parent().unwrap().parent().unwrap();
    workspace_root.join(FIXTURES_PATH).join(relative)
}

fn pipeline(dir: &str, stateful: bool, output: &str) -> StagedPipeline<prego_policy::RegoQuery, Formatter> {
    let sources = PolicySources::discover(&[fixture(dir)]).unwrap();
    let session = Session::resolve(&sources, "main", stateful).unwrap();
    StagedPipeline::new(session, Formatter::from_spec(output).unwrap())
}

async fn run(
    pipeline: StagedPipeline<prego_policy::RegoQuery, Formatter>,
    input: &'static str,
) -> (prego_core::Result<RunSummary>, String) {
    run_with_mode(pipeline, input, ParseMode::Lenient).await
}

async fn run_with_mode(
    pipeline: StagedPipeline<prego_policy::RegoQuery, Formatter>,
    input: &'static str,
    mode: ParseMode,
) -> (prego_core::Result<RunSummary>, String) {
    let (sink, mut reader) = tokio::io::duplex(64 * 1024);
    let source = EventSource::new(input.as_bytes(), mode);

    let result = pipeline.run(source, sink, &Shutdown::new()).await;
    let mut output = String::new();
    reader.read_to_string(&mut output).await.unwrap();
    (result, output)
}

// =============================================================================
// BEGIN / MAIN / END
// =============================================================================

#[tokio::test]
async fn test_session_prints_begin_alerts_end() {
    let input = "{\"id\":1,\"value\":5}\n{\"id\":2,\"value\":20}\n{\"id\":3,\"value\":11}\n";

    let (result, output) = run(pipeline("session", false, "json"), input).await;

    let summary = result.unwrap();
    assert_eq!(summary.events, 3);
    assert_eq!(summary.items, 2);
    assert!(!summary.interrupted);
    assert_eq!(
        output,
        "threshold=10\n{\"id\":2,\"value\":20}\n{\"id\":3,\"value\":11}\ndone\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_on_multi_thread_runtime() {
    let input = "{\"id\":1,\"value\":50}\n{\"id\":2,\"value\":1}\n";

    let (result, output) = run(pipeline("session", false, "json"), input).await;

    assert_eq!(result.unwrap().events, 2);
    assert_eq!(output, "threshold=10\n{\"id\":1,\"value\":50}\ndone\n");
}

#[tokio::test]
async fn test_empty_input_still_prints_begin_and_end() {
    let (result, output) = run(pipeline("session", false, "json"), "").await;

    assert_eq!(result.unwrap().events, 0);
    assert_eq!(output, "threshold=10\ndone\n");
}

#[tokio::test]
async fn test_items_go_through_the_formatter_but_lines_do_not() {
    let (_, output) = run(
        pipeline("session", false, "template=alert {{id}}"),
        "{\"id\":7,\"value\":99}\n",
    )
    .await;

    assert_eq!(output, "threshold=10\nalert 7\ndone\n");
}

#[tokio::test]
async fn test_stateful_session_threads_state_to_end() {
    let (result, output) = run(
        pipeline("session_counter", true, "json"),
        "{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n",
    )
    .await;

    assert_eq!(result.unwrap().items, 3);
    assert_eq!(
        output,
        concat!(
            "{\"event\":1,\"seen\":null}\n",
            "{\"event\":2,\"seen\":1}\n",
            "{\"event\":3,\"seen\":2}\n",
            "events=3\n"
        )
    );
}

#[tokio::test]
async fn test_strict_decode_error_skips_end() {
    let input = "{\"id\":1,\"value\":50}\nnot json\n{\"id\":3,\"value\":60}\n";

    let (result, output) =
        run_with_mode(pipeline("session", false, "json"), input, ParseMode::Strict).await;

    assert!(matches!(result, Err(PregoError::Decode { line: 2, .. })));
    assert_eq!(output, "threshold=10\n{\"id\":1,\"value\":50}\n");
    assert!(!output.contains("done"));
}

#[test]
fn test_invalid_package_is_config_error() {
    let sources = PolicySources::discover(&[fixture("session")]).unwrap();
    let err = Session::resolve(&sources, "main; data", false).err().unwrap();
    assert!(matches!(err, PregoError::Config(_)));
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn test_shutdown_with_open_input_still_runs_end() {
    let (mut input, input_reader) = tokio::io::duplex(1024);
    let (sink, output) = tokio::io::duplex(64 * 1024);
    let shutdown = Shutdown::new();

    let run = {
        let shutdown = shutdown.clone();
        let source = EventSource::new(BufReader::new(input_reader), ParseMode::Lenient);
        tokio::spawn(async move {
            pipeline("session", false, "json")
                .run(source, sink, &shutdown)
                .await
        })
    };

    let mut lines = BufReader::new(output).lines();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "threshold=10");

    input.write_all(b"{\"id\":1,\"value\":50}\n").await.unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"id\":1,\"value\":50}");

    // input stays open; only the signal can end the run
    shutdown.trigger();
    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run should stop after shutdown")
        .unwrap()
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.events, 1);
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "done");
    assert_eq!(lines.next_line().await.unwrap(), None);
    drop(input);
}
