//! Integration tests for whole runs: discovery, reports and output formats.

use std::path::PathBuf;

use spancover::analysis::{Category, ChainStyle};
use spancover::report;
use spancover::{Config, Engine};
use tempfile::TempDir;

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

#[test]
fn test_mixed_tree_discovery_and_attribution() {
    spancover::init();
    let engine = Engine::new(testdata_path().join("mixed"), Config::default()).unwrap();
    let result = engine.scan().unwrap();

    let files: Vec<_> = result.files.iter().map(|f| f.file.replace('\\', "/")).collect();
    assert_eq!(files, vec!["Job.java", "app/worker.py"]);
    assert!(result.skipped.is_empty());

    let job = &result.files[0];
    assert_eq!(job.language, "java");
    let run = job.report.function("run").unwrap();
    assert_eq!(run.calls.spans.len(), 1);
    assert!(run.span_ended);

    let worker = &result.files[1];
    assert_eq!(worker.language, "python");
    assert_eq!(worker.report.calls.tracers.len(), 1);
    assert_eq!(worker.report.function("work").unwrap().calls.spans.len(), 1);
}

#[test]
fn test_python_directory_skips_broken_file() {
    spancover::init();
    let engine = Engine::new(testdata_path().join("python"), Config::default()).unwrap();
    let result = engine.scan().unwrap();

    let files: Vec<_> = result.files.iter().map(|f| f.file.as_str()).collect();
    assert_eq!(files, vec!["checkout.py", "inventory.py"]);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].file, "broken.py");
}

#[test]
fn test_coverage_table_for_fixtures() {
    spancover::init();
    let root = testdata_path().join("python");
    let engine = Engine::new(&root, Config::default()).unwrap();
    let result = engine.scan().unwrap();

    let categories = Config::default().categories().unwrap();
    let rows = report::coverage_rows(&result, &categories);
    assert_eq!(rows[0].file, "python/checkout.py");
    // spans, tracers, counters, events, attributes
    assert_eq!(rows[0].present, vec![true, true, false, false, true]);
    assert_eq!(rows[0].coverage, 60);
    assert_eq!(rows[1].present, vec![true, true, true, true, true]);
    assert_eq!(rows[1].coverage, 100);

    let table = report::render_table(&rows, &categories);
    let lines: Vec<_> = table.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("File "));
    assert!(lines[0].contains("Spans    Tracers    Counters    Events    Attributes    Coverage"));
    assert!(lines[2].starts_with("python/checkout.py"));
    assert!(lines[2].trim_end().ends_with("60%"));
}

#[test]
fn test_detailed_json_written_to_file() {
    spancover::init();
    let out = TempDir::new().unwrap();
    let output = out.path().join("report.json");

    let config = Config {
        chain_style: ChainStyle::Trailing,
        ..Config::default()
    };
    let engine = Engine::new(testdata_path().join("java"), config).unwrap();
    let result = engine.scan().unwrap();
    report::write_json(&result, &output).unwrap();

    let content = std::fs::read_to_string(&output).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["files"][0]["file"], "OrderService.java");
    assert_eq!(json["files"][0]["language"], "java");
    assert_eq!(json["files"][0]["tracers"][0]["line"], 9);

    let place = &json["files"][0]["functions"]["place"];
    assert_eq!(place["description"], "Places an order.");
    assert_eq!(place["exception_recorded"], true);
    assert_eq!(place["span_ended"], true);

    let payload = &place["events"][0]["args"][1];
    assert_eq!(payload["target"], "builder");
    assert_eq!(payload["trailing_calls"][0]["target"], "put");
    assert_eq!(payload["trailing_calls"][1]["target"], "build");
}

#[test]
fn test_config_file_drives_discovery() {
    spancover::init();
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("spancover.yaml"),
        "language: java\ncolumns: [spans, span_ends, exceptions]\n",
    )
    .unwrap();

    let config = Config::load(None, dir.path()).unwrap();
    assert_eq!(
        config.categories().unwrap(),
        vec![Category::Spans, Category::SpanEnds, Category::Exceptions]
    );

    let engine = Engine::new(testdata_path().join("mixed"), config).unwrap();
    let files = engine.collect_files().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("Job.java"));
}
