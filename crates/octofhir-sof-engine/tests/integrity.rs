//! Integrity validator and refresh tests

mod common;

use common::{MockDocumentStore, test_registry};
use octofhir_sof_engine::{IntegrityValidator, MatviewRefresher};
use octofhir_sof_model::SchemaCatalog;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn validator(store: Arc<MockDocumentStore>) -> IntegrityValidator {
    IntegrityValidator::new(store, SchemaCatalog::default(), test_registry())
}

#[tokio::test]
async fn battery_runs_over_materialized_reference_pairs() {
    let store = Arc::new(MockDocumentStore::new());
    store.set_matviews(vec![
        "condition_summary".to_string(),
        "patient_demographics".to_string(),
    ]);
    // dual_columns and join_latency go through count queries
    store.set_count(2);
    // extracted_id, reference_format, fk_complete in check order
    store.queue_rows(vec![json!({"total": 5, "valid": 5})]);
    store.queue_rows(vec![json!({"total": 5, "valid": 5})]);
    store.queue_rows(vec![json!({"total": 5, "valid": 4})]);

    let report = validator(store.clone()).validate().await.unwrap();

    let names: Vec<&str> = report.checks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "condition_summary.subject_id:dual_columns",
            "condition_summary.subject_id:extracted_id",
            "condition_summary.subject_reference:reference_format",
            "condition_summary.subject_id->patient_demographics:fk_complete",
            "condition_summary.subject_id->patient_demographics:join_latency",
        ]
    );

    assert!(!report.passed(), "one dangling reference must fail the report");
    assert_eq!(report.violations(), 1);

    let fk = &report.checks[3];
    assert_eq!(fk.examined, 5);
    assert_eq!(fk.valid, 4);
    assert!(!fk.passed());
}

#[tokio::test]
async fn passing_battery_produces_clean_report() {
    let store = Arc::new(MockDocumentStore::new());
    store.set_matviews(vec![
        "condition_summary".to_string(),
        "patient_demographics".to_string(),
    ]);
    store.set_count(2);
    store.queue_rows(vec![json!({"total": 3, "valid": 3})]);
    store.queue_rows(vec![json!({"total": 3, "valid": 3})]);
    store.queue_rows(vec![json!({"total": 3, "valid": 3})]);

    let report = validator(store).validate().await.unwrap();
    assert!(report.passed());
    assert_eq!(report.violations(), 0);
    assert_eq!(report.schema, "fhir");
}

#[tokio::test]
async fn extracted_id_check_compares_against_split_part() {
    let store = Arc::new(MockDocumentStore::new());
    store.set_matviews(vec![
        "condition_summary".to_string(),
        "patient_demographics".to_string(),
    ]);
    store.set_count(2);
    for _ in 0..3 {
        store.queue_rows(vec![json!({"total": 1, "valid": 1})]);
    }

    validator(store.clone()).validate().await.unwrap();

    let executed = store.executed();
    let extracted = executed
        .iter()
        .find(|(sql, _)| sql.contains("split_part"))
        .expect("extracted-id check executed");
    assert!(extracted.0.contains("subject_id = split_part(subject_reference, '/', 2)"));
    assert!(extracted.0.contains("~ '^[A-Za-z]+/[A-Za-z0-9.-]{1,64}$'"));
}

#[tokio::test]
async fn views_without_materialization_are_skipped() {
    let store = Arc::new(MockDocumentStore::new());
    store.set_matviews(vec![]);

    let report = validator(store.clone()).validate().await.unwrap();
    assert!(report.checks.is_empty());
    assert!(report.passed());
    assert_eq!(store.executed_count(), 0);
}

#[tokio::test]
async fn refresher_creates_and_records_materialization() {
    let store = Arc::new(MockDocumentStore::new());
    let refresher = MatviewRefresher::new(
        store.clone(),
        SchemaCatalog::default(),
        test_registry(),
    );

    refresher.refresh("patient_demographics").await.unwrap();

    let executed = store.executed();
    assert!(
        executed
            .iter()
            .any(|(sql, _)| sql == "REFRESH fhir.patient_demographics")
    );
    // The recorded definition is the constraint-free row query
    assert!(
        executed
            .iter()
            .any(|(sql, _)| sql.contains("r.res_type = 'Patient'") && !sql.contains("LIMIT"))
    );
}

#[tokio::test]
async fn refresher_rejects_unknown_views() {
    let store = Arc::new(MockDocumentStore::new());
    let refresher = MatviewRefresher::new(
        store.clone(),
        SchemaCatalog::default(),
        test_registry(),
    );
    assert!(refresher.refresh("nope").await.is_err());
    assert_eq!(store.executed_count(), 0);
}

#[tokio::test]
async fn refresh_all_walks_the_registry() {
    let store = Arc::new(MockDocumentStore::new());
    let refresher = MatviewRefresher::new(
        store.clone(),
        SchemaCatalog::default(),
        test_registry(),
    );
    let refreshed = refresher.refresh_all().await.unwrap();
    assert_eq!(refreshed, 3);
}
