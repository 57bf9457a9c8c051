//! Serving layer tests: hybrid merge, precedence, degradation

mod common;

use common::{FailingSpeedBackend, MockDocumentStore, condition, patient, test_registry};
use octofhir_sof_engine::{
    BatchConfig, BatchRunner, MemorySpeedCache, ServingConfig, ServingLayer, SpeedLayer,
};
use octofhir_sof_model::{
    ResultSource, RowSource, SchemaCatalog, SearchConstraints,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn serving(store: Arc<MockDocumentStore>, speed: Option<SpeedLayer>) -> ServingLayer {
    let batch = BatchRunner::new(
        store,
        SchemaCatalog::default(),
        test_registry(),
        BatchConfig::default(),
    );
    ServingLayer::new(batch, speed, ServingConfig::default())
}

fn memory_speed_layer() -> (Arc<MemorySpeedCache>, SpeedLayer) {
    let backend = Arc::new(MemorySpeedCache::default());
    let layer = SpeedLayer::new(backend.clone(), SchemaCatalog::default());
    (backend, layer)
}

#[tokio::test]
async fn recent_document_appears_in_merged_output() {
    // Scenario: a Condition inserted into the speed layer minutes ago is
    // absent from the batch materialization but shows up in hybrid output.
    let store = Arc::new(MockDocumentStore::new());
    store.set_rows(vec![
        json!({"id": "c1", "code": "38341003", "subject_reference": "Patient/p1", "subject_id": "p1"}),
        json!({"id": "c2", "code": "73211009", "subject_reference": "Patient/p2", "subject_id": "p2"}),
    ]);

    let (_, speed) = memory_speed_layer();
    speed
        .put("Condition", "c3", condition("c3", "44054006", "Patient/p3"))
        .await
        .unwrap();

    let serving = serving(store, Some(speed));
    let result = serving
        .execute("condition_summary", &SearchConstraints::none(), 100)
        .await
        .unwrap();

    assert_eq!(result.row_count, 3, "merged count is batch count + 1");
    assert_eq!(result.source, ResultSource::Hybrid);
    assert!(!result.speed_skipped);

    let fresh = result
        .rows
        .iter()
        .find(|row| row.resource_id() == Some("c3"))
        .expect("speed-layer row present");
    assert_eq!(fresh.source, RowSource::Speed);
    assert_eq!(fresh.values["code"], json!("44054006"));
    assert_eq!(fresh.values["subject_id"], json!("p3"));

    let stats = serving.serving_statistics();
    assert_eq!(stats.batch_calls, 1);
    assert_eq!(stats.speed_calls, 1);
    assert_eq!(stats.merged_calls, 1);
    assert_eq!(stats.speed_skipped, 0);
}

#[tokio::test]
async fn speed_layer_wins_on_conflicting_resource_id() {
    let store = Arc::new(MockDocumentStore::new());
    store.set_rows(vec![json!({
        "id": "c1",
        "code": "38341003",
        "subject_reference": "Patient/p1",
        "subject_id": "p1"
    })]);

    let (_, speed) = memory_speed_layer();
    // Same condition, updated after the batch view was materialized
    speed
        .put("Condition", "c1", condition("c1", "73211009", "Patient/p9"))
        .await
        .unwrap();

    let serving = serving(store, Some(speed));
    let result = serving
        .execute("condition_summary", &SearchConstraints::none(), 100)
        .await
        .unwrap();

    assert_eq!(result.row_count, 1);
    let row = &result.rows[0];
    assert_eq!(row.source, RowSource::Merged);
    // Full-row replacement: every field comes from the speed-layer document
    assert_eq!(row.values["code"], json!("73211009"));
    assert_eq!(row.values["subject_reference"], json!("Patient/p9"));
    assert_eq!(row.values["subject_id"], json!("p9"));
}

#[tokio::test]
async fn unreachable_speed_layer_degrades_to_batch_only() {
    let store = Arc::new(MockDocumentStore::new());
    store.set_rows(vec![json!({
        "id": "c1",
        "code": "38341003",
        "subject_reference": "Patient/p1",
        "subject_id": "p1"
    })]);

    let speed = SpeedLayer::new(Arc::new(FailingSpeedBackend), SchemaCatalog::default());
    let serving = serving(store, Some(speed));

    let result = serving
        .execute("condition_summary", &SearchConstraints::none(), 100)
        .await
        .expect("outage must not fail the query");

    assert_eq!(result.row_count, 1);
    assert_eq!(result.source, ResultSource::Batch);
    assert!(result.speed_skipped);
    assert_eq!(result.rows[0].source, RowSource::Batch);
    assert_eq!(serving.serving_statistics().speed_skipped, 1);
}

#[tokio::test]
async fn speed_disabled_never_consults_the_cache() {
    let store = Arc::new(MockDocumentStore::new());
    store.set_rows(vec![json!({"id": "p1", "gender": "female", "birth_date": null})]);

    let (_, speed) = memory_speed_layer();
    speed
        .put("Patient", "p2", patient("p2", "female", &[("Doe", "official")]))
        .await
        .unwrap();

    let batch = BatchRunner::new(
        store,
        SchemaCatalog::default(),
        test_registry(),
        BatchConfig::default(),
    );
    let serving = ServingLayer::new(
        batch,
        Some(speed),
        ServingConfig {
            speed_enabled: false,
            ..ServingConfig::default()
        },
    );

    let result = serving
        .execute("patient_demographics", &SearchConstraints::none(), 100)
        .await
        .unwrap();
    assert_eq!(result.row_count, 1);
    assert_eq!(result.source, ResultSource::Batch);
    assert_eq!(serving.serving_statistics().speed_calls, 0);
}

#[tokio::test]
async fn merge_reapplies_row_limit() {
    let store = Arc::new(MockDocumentStore::new());
    store.set_rows(vec![
        json!({"id": "p1", "gender": "female", "birth_date": "1980-06-15"}),
        json!({"id": "p2", "gender": "female", "birth_date": "1981-06-15"}),
    ]);

    let (_, speed) = memory_speed_layer();
    speed
        .put("Patient", "p3", patient("p3", "female", &[("New", "official")]))
        .await
        .unwrap();

    let serving = serving(store, Some(speed));
    let result = serving
        .execute("patient_demographics", &SearchConstraints::none(), 2)
        .await
        .unwrap();
    assert_eq!(result.row_count, 2);
}

#[tokio::test]
async fn constraints_apply_to_both_layers() {
    let store = Arc::new(MockDocumentStore::new());
    store.set_rows(vec![json!({"id": "p1", "gender": "female", "birth_date": "1980-06-15"})]);

    let (_, speed) = memory_speed_layer();
    speed
        .put("Patient", "p2", patient("p2", "female", &[("A", "official")]))
        .await
        .unwrap();
    speed
        .put("Patient", "p3", patient("p3", "male", &[("B", "official")]))
        .await
        .unwrap();

    let serving = serving(store, Some(speed));
    let result = serving
        .execute(
            "patient_demographics",
            &SearchConstraints::from_pairs([("gender", "female")]),
            100,
        )
        .await
        .unwrap();

    // p3 is male and must be filtered by the speed layer's matcher
    assert_eq!(result.row_count, 2);
    assert!(result.rows.iter().all(|r| r.values["gender"] == json!("female")));
}

#[tokio::test]
async fn schema_and_count_pass_through() {
    let store = Arc::new(MockDocumentStore::new());
    store.set_count(5);
    let serving = serving(store, None);

    let schema = serving.schema("patient_demographics").unwrap();
    assert_eq!(
        schema.keys().map(String::as_str).collect::<Vec<_>>(),
        ["id", "gender", "birth_date"]
    );
    assert_eq!(
        serving
            .execute_count("patient_demographics", &SearchConstraints::none())
            .await
            .unwrap(),
        5
    );
}
