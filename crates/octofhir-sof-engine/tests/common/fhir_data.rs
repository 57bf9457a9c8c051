//! FHIR document fixtures and view definitions shared by the engine tests

use octofhir_sof_model::{ViewDefinition, ViewRegistry};
use serde_json::{Value, json};
use std::sync::Arc;

/// A Patient document with the given names as `(family, use)` pairs
pub fn patient(id: &str, gender: &str, names: &[(&str, &str)]) -> Value {
    let name_entries: Vec<Value> = names
        .iter()
        .map(|(family, use_)| json!({"family": family, "use": use_}))
        .collect();
    json!({
        "resourceType": "Patient",
        "id": id,
        "active": true,
        "gender": gender,
        "birthDate": "1980-06-15",
        "name": name_entries
    })
}

/// A Condition document referencing a patient
pub fn condition(id: &str, code: &str, subject: &str) -> Value {
    json!({
        "resourceType": "Condition",
        "id": id,
        "code": {
            "coding": [{"system": "http://snomed.info/sct", "code": code}]
        },
        "onsetDateTime": "2026-07-01",
        "subject": {"reference": subject}
    })
}

fn view(raw: &str) -> ViewDefinition {
    ViewDefinition::from_json(raw).unwrap()
}

/// Registry with the standard test views
pub fn test_registry() -> Arc<ViewRegistry> {
    let views = [
        view(
            r#"{
                "name": "patient_demographics",
                "resource": "Patient",
                "select": [{"column": [
                    {"name": "gender", "path": "gender"},
                    {"name": "birth_date", "path": "birthDate", "type": "date"}
                ]}]
            }"#,
        ),
        view(
            r#"{
                "name": "patient_names",
                "resource": "Patient",
                "select": [
                    {
                        "column": [{"name": "gender", "path": "gender"}],
                        "select": [
                            {
                                "forEach": "name",
                                "column": [
                                    {"name": "family", "path": "family"},
                                    {"name": "name_use", "path": "use"}
                                ]
                            }
                        ]
                    }
                ]
            }"#,
        ),
        view(
            r#"{
                "name": "condition_summary",
                "resource": "Condition",
                "select": [{"column": [
                    {"name": "code", "path": "code.coding.first().code"},
                    {"name": "subject_reference", "path": "subject.reference"}
                ]}]
            }"#,
        ),
    ];
    Arc::new(ViewRegistry::new(views).unwrap())
}
