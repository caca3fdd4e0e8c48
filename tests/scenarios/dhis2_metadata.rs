//! Test: DHIS2 Metadata - building the model from a live-looking instance

use crate::helpers::*;
use adaptors::adaptors::dhis2::{fetch_metadata, metadata_for, Dhis2Config};
use adaptors::{AdaptorError, Job, Operation, State};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// admin:district
const BASIC_AUTH: &str = "Basic YWRtaW46ZGlzdHJpY3Q=";

fn settings(server: &MockServer) -> serde_json::Value {
    json!({
        "hostUrl": server.uri(),
        "username": "admin",
        "password": "district"
    })
}

async fn mount_collection(server: &MockServer, resource: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/{}.json", resource)))
        .and(query_param("fields", "id,displayName"))
        .and(query_param("paging", "false"))
        .and(header("Authorization", BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_instance(server: &MockServer) {
    mount_collection(
        server,
        "organisationUnits",
        json!({"organisationUnits": [
            {"id": "ImspTQPwCqd", "displayName": "Sierra Leone"},
            {"id": "O6uvpzGd5pu", "displayName": "Bo"}
        ]}),
    )
    .await;
    mount_collection(
        server,
        "trackedEntityTypes",
        json!({"trackedEntityTypes": [{"id": "nEenWmSyUEp", "displayName": "Person"}]}),
    )
    .await;
    mount_collection(
        server,
        "attributes",
        json!({"attributes": [{"id": "w75KJ2mc4zz", "displayName": "First name"}]}),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/resources.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [{"singular": "dataElement", "plural": "dataElements"}]
        })))
        .mount(server)
        .await;
}

/// The operation composes the model into data
#[tokio::test]
async fn test_fetch_metadata_from_instance() {
    let server = MockServer::start().await;
    mount_instance(&server).await;

    let job = Job::new("metadata").step("meta", adaptors::core::operation::boxed(fetch_metadata()));
    let result = run_job(&job, State::new(settings(&server))).await;

    assert_run_completed(&result);
    let data = &result.state().data;
    assert_eq!(data["type"], "model");
    assert_eq!(data["name"], "dhis2");
    assert_eq!(data["children"]["orgUnits"].as_array().unwrap().len(), 2);
    assert_eq!(
        data["children"]["orgUnits"][1],
        json!({"name": "O6uvpzGd5pu", "type": "orgUnit", "datatype": "string", "label": "Bo"})
    );
    assert_eq!(data["children"]["trackedEntityTypes"][0]["label"], "Person");
    assert_eq!(data["children"]["attributes"][0]["type"], "attribute");
    assert_eq!(data["children"]["resourceTypes"][0]["plural"], "dataElements");
}

/// An error status carries the instance's error body
#[tokio::test]
async fn test_unauthorized_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/organisationUnits.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "httpStatus": "Unauthorized",
            "httpStatusCode": 401,
            "status": "ERROR",
            "message": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let config: Dhis2Config = serde_json::from_value(settings(&server)).unwrap();
    let err = metadata_for(&config).await.unwrap_err();

    match err {
        AdaptorError::Remote { system, errors } => {
            assert_eq!(system, "dhis2");
            assert_eq!(errors[0]["httpStatusCode"], 401);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

/// Error reports in a successful response still fail the call
#[tokio::test]
async fn test_error_reports_fail_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/organisationUnits.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organisationUnits": [],
            "errorReports": [{"message": "Property `fields` is invalid", "errorCode": "E1004"}]
        })))
        .mount(&server)
        .await;

    let op = fetch_metadata();
    let err = op.run(State::new(settings(&server))).await.unwrap_err();

    assert!(err.is_remote());
    assert!(err.to_string().contains("Property `fields` is invalid"));
}

/// Missing connection settings fail before any request
#[tokio::test]
async fn test_missing_settings_fail() {
    let err = fetch_metadata().run(State::default()).await.unwrap_err();
    assert!(matches!(err, AdaptorError::Configuration(_)));
}
