//! Test: Sequencing - operations run in order and thread the state

use crate::helpers::*;
use adaptors::core::common::{data_value, each, field, last_reference_value, merge};
use adaptors::core::operation::named;
use adaptors::{compose_next_state, execute, set_data, Input, Job, Operation, State, StatePath};
use serde_json::json;

/// Each step sees the state returned by the one before it
#[tokio::test]
async fn test_steps_run_in_declared_order() {
    let log = new_log();
    let job = Job::new("ordered")
        .step("first", recording("first", &log, json!(1)))
        .step("second", recording("second", &log, json!(2)))
        .step("third", recording("third", &log, json!(3)));

    let result = run_job(&job, State::default()).await;

    assert_run_completed(&result);
    assert_execution_order(&result, &["first", "second", "third"]);
    assert_eq!(entries(&log), vec!["first", "second", "third"]);

    let state = result.state();
    assert_eq!(state.data, json!(3));
    assert_eq!(state.references, vec![json!(2), json!(1), json!(null)]);
}

/// A step that suspends still finishes before the next one starts
#[tokio::test]
async fn test_suspended_step_is_awaited() {
    let log = new_log();
    let sequence = execute![
        suspended("slow", &log, 30),
        recording("fast", &log, json!("done")),
    ];

    let state = sequence.run(State::default()).await.unwrap();

    assert_eq!(entries(&log), vec!["slow", "fast"]);
    assert_eq!(state.data, json!("done"));
}

/// Host-supplied fields survive seeding and the run
#[tokio::test]
async fn test_run_from_host_json() {
    let sequence = execute![named("answer", |state: State| async move {
        Ok(compose_next_state(&state, json!(42)))
    })];

    let state = sequence
        .run_value(json!({"configuration": {"token": "x"}, "jobId": "abc"}))
        .await
        .unwrap();

    assert_eq!(
        state.to_value().unwrap(),
        json!({
            "configuration": {"token": "x"},
            "jobId": "abc",
            "references": [null],
            "data": 42
        })
    );
}

/// Values resolved from data and references feed later operations
#[tokio::test]
async fn test_references_feed_later_steps() {
    let sequence = execute![
        set_data(Input::literal(json!({"rows": [{"code": "A"}, {"code": "B"}], "source": "upload"}))),
        set_data(data_value("rows").unwrap()),
        merge(
            StatePath::parse("$.data").unwrap(),
            vec![field("source", last_reference_value("source").unwrap())],
        ),
    ];

    let state = sequence.run(State::default()).await.unwrap();

    assert_eq!(
        state.data,
        json!([
            {"code": "A", "source": "upload"},
            {"code": "B", "source": "upload"}
        ])
    );
    assert_eq!(state.references.len(), 3);
}

/// `each` runs its operation per element and keeps what the last run produced
#[tokio::test]
async fn test_each_visits_every_element() {
    let log = new_log();
    let sink = log.clone();
    let times_ten = named("times_ten", move |state: State| {
        sink.lock().unwrap().push(state.data.to_string());
        async move {
            let value = state.data.as_i64().unwrap_or_default() * 10;
            Ok(compose_next_state(&state, json!(value)))
        }
    });

    let sequence = execute![
        set_data(Input::literal(json!([1, 2]))),
        each(StatePath::parse("$.data").unwrap(), times_ten),
    ];

    let state = sequence.run(State::default()).await.unwrap();

    assert_eq!(entries(&log), vec!["1", "2"]);
    assert_eq!(state.data, json!(20));
    assert_eq!(state.references, vec![json!(2), json!(1), json!(null)]);
}

/// A sequence nests inside a job step like any other operation
#[tokio::test]
async fn test_nested_sequence_as_step() {
    let log = new_log();
    let inner = execute![
        recording("inner-a", &log, json!("a")),
        recording("inner-b", &log, json!("b")),
    ];
    let job = Job::new("nested")
        .step("outer", recording("outer", &log, json!("o")))
        .step("group", adaptors::core::operation::boxed(inner));

    let result = run_job(&job, State::default()).await;

    assert_run_completed(&result);
    assert_execution_order(&result, &["outer", "group"]);
    assert_eq!(entries(&log), vec!["outer", "inner-a", "inner-b"]);
    assert_eq!(result.state().data, json!("b"));
    assert_eq!(result.summary.completed_operations, 2);
}
