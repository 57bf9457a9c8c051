//! Speed-layer tests: TTL, recency watermark, constraint semantics, row shape

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{patient, test_registry};
use octofhir_sof_engine::{
    CachedDocument, MemorySpeedCache, SpeedCacheBackend, SpeedLayer,
};
use octofhir_sof_model::{SchemaCatalog, SearchConstraints};
use octofhir_sof_sql::{CompiledView, ViewCompiler};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn compiled(view_name: &str) -> CompiledView {
    let catalog = SchemaCatalog::default();
    let registry = test_registry();
    ViewCompiler::new(&catalog)
        .compile(&registry.get(view_name).unwrap())
        .unwrap()
}

fn layer(backend: Arc<MemorySpeedCache>) -> SpeedLayer {
    SpeedLayer::new(backend, SchemaCatalog::default())
}

fn long_ago() -> chrono::DateTime<Utc> {
    Utc::now() - ChronoDuration::days(30)
}

#[tokio::test]
async fn scan_returns_rows_in_batch_shape() {
    let speed = layer(Arc::new(MemorySpeedCache::default()));
    speed
        .put("Patient", "p1", patient("p1", "female", &[("Smith", "official")]))
        .await
        .unwrap();

    let rows = speed
        .scan_recent(
            &compiled("patient_demographics"),
            long_ago(),
            &SearchConstraints::none(),
            10,
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    let columns: Vec<&str> = rows[0].values.keys().map(String::as_str).collect();
    assert_eq!(columns, ["id", "gender", "birth_date"]);
    assert_eq!(rows[0].values["id"], json!("p1"));
    assert_eq!(rows[0].values["gender"], json!("female"));
}

#[tokio::test]
async fn two_element_name_array_yields_two_rows() {
    // A 2-element name array expands to exactly 2 rows that differ only in
    // the name columns.
    let speed = layer(Arc::new(MemorySpeedCache::default()));
    speed
        .put(
            "Patient",
            "p1",
            patient("p1", "female", &[("Smith", "official"), ("Smythe", "nickname")]),
        )
        .await
        .unwrap();

    let rows = speed
        .scan_recent(
            &compiled("patient_names"),
            long_ago(),
            &SearchConstraints::none(),
            10,
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].values["id"], rows[1].values["id"]);
    assert_eq!(rows[0].values["gender"], rows[1].values["gender"]);
    assert_eq!(rows[0].values["family"], json!("Smith"));
    assert_eq!(rows[0].values["name_use"], json!("official"));
    assert_eq!(rows[1].values["family"], json!("Smythe"));
    assert_eq!(rows[1].values["name_use"], json!("nickname"));
}

#[tokio::test]
async fn gender_constraint_filters_seeded_patients() {
    // 5 female / 5 male documents; {gender: female} returns exactly the 5
    // female rows.
    let speed = layer(Arc::new(MemorySpeedCache::default()));
    for i in 0..5 {
        speed
            .put(
                "Patient",
                &format!("f{i}"),
                patient(&format!("f{i}"), "female", &[("F", "official")]),
            )
            .await
            .unwrap();
        speed
            .put(
                "Patient",
                &format!("m{i}"),
                patient(&format!("m{i}"), "male", &[("M", "official")]),
            )
            .await
            .unwrap();
    }

    let rows = speed
        .scan_recent(
            &compiled("patient_demographics"),
            long_ago(),
            &SearchConstraints::from_pairs([("gender", "female")]),
            100,
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.values["gender"] == json!("female")));
}

#[tokio::test]
async fn documents_expire_after_ttl() {
    let speed = layer(Arc::new(MemorySpeedCache::new(Duration::from_millis(50))));
    speed
        .put("Patient", "p1", patient("p1", "female", &[("Smith", "official")]))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    let rows = speed
        .scan_recent(
            &compiled("patient_demographics"),
            long_ago(),
            &SearchConstraints::none(),
            10,
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn scan_respects_the_recency_watermark() {
    let backend = Arc::new(MemorySpeedCache::default());
    backend
        .put(CachedDocument {
            resource_type: "Patient".to_string(),
            id: "old".to_string(),
            body: patient("old", "female", &[("Past", "official")]),
            inserted_at: Utc::now() - ChronoDuration::hours(2),
        })
        .await
        .unwrap();
    backend
        .put(CachedDocument {
            resource_type: "Patient".to_string(),
            id: "new".to_string(),
            body: patient("new", "female", &[("Now", "official")]),
            inserted_at: Utc::now(),
        })
        .await
        .unwrap();

    let speed = layer(backend);
    let rows = speed
        .scan_recent(
            &compiled("patient_demographics"),
            Utc::now() - ChronoDuration::hours(1),
            &SearchConstraints::none(),
            10,
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values["id"], json!("new"));
}

#[tokio::test]
async fn upserts_are_idempotent() {
    let speed = layer(Arc::new(MemorySpeedCache::default()));
    speed
        .put("Patient", "p1", patient("p1", "female", &[("First", "official")]))
        .await
        .unwrap();
    speed
        .put("Patient", "p1", patient("p1", "female", &[("Second", "official")]))
        .await
        .unwrap();

    let rows = speed
        .scan_recent(
            &compiled("patient_names"),
            long_ago(),
            &SearchConstraints::none(),
            10,
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values["family"], json!("Second"));
}

#[tokio::test]
async fn unknown_constraint_is_a_compile_error_not_an_outage() {
    let speed = layer(Arc::new(MemorySpeedCache::default()));
    let err = speed
        .scan_recent(
            &compiled("patient_demographics"),
            long_ago(),
            &SearchConstraints::from_pairs([("shoe-size", "42")]),
            10,
        )
        .await
        .unwrap_err();
    assert!(err.is_compile_time());
    assert!(!err.is_cache_unavailable());
}

#[tokio::test]
async fn flush_drops_everything() {
    let speed = layer(Arc::new(MemorySpeedCache::default()));
    speed
        .put("Patient", "p1", patient("p1", "female", &[("Smith", "official")]))
        .await
        .unwrap();
    speed.flush().await.unwrap();

    let rows = speed
        .scan_recent(
            &compiled("patient_demographics"),
            long_ago(),
            &SearchConstraints::none(),
            10,
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}
