//! Test: CSV Parsing - files, inline text and state references

use crate::helpers::*;
use adaptors::adaptors::csv::{parse_csv, CsvOptions, CsvSource};
use adaptors::{AdaptorError, Job, Operation, State, StatePath};
use serde_json::json;
use std::io::Write;

fn csv_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// A file is read and parsed into row objects
#[tokio::test]
async fn test_parse_file_with_columns() {
    let file = csv_file("FREQ,PARTNER\nA,\"Doctors, Without Borders\"\nM,IRC\n");
    let op = parse_csv(
        CsvSource::File(file.path().to_path_buf()),
        CsvOptions::default().with_columns(true),
    );

    let state = op.run(State::default()).await.unwrap();

    assert_eq!(
        state.data,
        json!([
            {"FREQ": "A", "PARTNER": "Doctors, Without Borders"},
            {"FREQ": "M", "PARTNER": "IRC"}
        ])
    );
    assert_eq!(state.references, vec![json!(null)]);
}

/// A missing file is an I/O error, never parsed as literal text
#[tokio::test]
async fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let op = parse_csv(
        CsvSource::File(dir.path().join("nope.csv")),
        CsvOptions::default(),
    );

    let err = op.run(State::default()).await.unwrap_err();
    assert!(matches!(err, AdaptorError::Io { .. }));
}

/// CSV text stored in the state is parsed with a custom delimiter
#[tokio::test]
async fn test_parse_referenced_text() {
    let op = parse_csv(
        CsvSource::Reference(StatePath::parse("$.data.body").unwrap()),
        CsvOptions::default().with_delimiter(';'),
    );
    let state = State::from_value(json!({"data": {"body": "a;b\n1;2\n"}})).unwrap();

    let next = op.run(state).await.unwrap();

    assert_eq!(next.data, json!([["a", "b"], ["1", "2"]]));
    assert_eq!(next.references, vec![json!({"body": "a;b\n1;2\n"})]);
}

/// A non-ASCII delimiter is rejected before any parsing
#[tokio::test]
async fn test_multibyte_delimiter_rejected() {
    let op = parse_csv(
        CsvSource::Text("a§b".to_string()),
        CsvOptions::default().with_delimiter('§'),
    );

    let err = op.run(State::default()).await.unwrap_err();
    assert!(matches!(err, AdaptorError::Configuration(_)));
}

/// Text that looks like a state path is parsed as CSV, never looked up
#[tokio::test]
async fn test_text_source_shaped_like_a_path_is_parsed_literally() {
    let op = parse_csv(CsvSource::Text("$.data.csv".to_string()), CsvOptions::default());
    let state = State::from_value(json!({"data": {"csv": "x,y\n1,2\n"}})).unwrap();

    let next = op.run(state).await.unwrap();

    assert_eq!(next.data, json!([["$.data.csv"]]));
    assert_eq!(next.references, vec![json!({"csv": "x,y\n1,2\n"})]);
}

/// A job file parses CSV and tags every row
#[tokio::test]
async fn test_csv_job_from_yaml() {
    let file = csv_file("code,name\nA1,Alpha\nB2,Beta\n");
    let yaml = format!(
        r#"
name: "Tag codes"
steps:
  - id: parse
    operation: parse_csv
    source:
      file: "{}"
    options:
      columns: true
  - id: tag
    operation: merge
    path: $.data
    fields:
      origin:
        literal: upload
      count:
        reference: $.references[0].total
"#,
        file.path().display()
    );

    let state = State::from_value(json!({"data": {"total": 2}})).unwrap();
    let result = run_job_yaml(&yaml, state).await;

    assert_run_completed(&result);
    assert_execution_order(&result, &["parse", "tag"]);
    assert_eq!(
        result.state().data,
        json!([
            {"code": "A1", "name": "Alpha", "origin": "upload", "count": 2},
            {"code": "B2", "name": "Beta", "origin": "upload", "count": 2}
        ])
    );
}

/// Parsing runs inside a job like any step
#[tokio::test]
async fn test_inline_text_step() {
    let job = Job::new("inline").step(
        "parse",
        adaptors::core::operation::boxed(parse_csv(
            CsvSource::Text("x,y\n".to_string()),
            CsvOptions::default(),
        )),
    );

    let result = run_job(&job, State::default()).await;

    assert_run_completed(&result);
    assert_eq!(result.state().data, json!([["x", "y"]]));
}
