//! Schema catalog
//!
//! Static mapping from a logical resource type to its physical storage
//! shape. All resource types share the same pair of tables — a resource
//! identity table and a document payload table joined on id and version —
//! plus auxiliary indexed-attribute tables kept for DDL completeness; the
//! catalog's per-type knowledge is which search constraints exist and where
//! in the document they point.

use crate::{ConstraintKind, SearchField};
use indexmap::IndexMap;
use octofhir_sof_diagnostics::{Result, SOF0101, SOF0105, SofError};

/// Physical table names for a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTables {
    /// Resource identity table (id, type, version, deletion marker)
    pub identity: String,
    /// Document payload table (JSONB body per version)
    pub payload: String,
    /// Auxiliary token-index table
    pub token_index: String,
    /// Auxiliary string-index table
    pub string_index: String,
    /// Auxiliary date-index table
    pub date_index: String,
}

/// Searchable fields of one resource type
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeDef {
    /// Constraint name → field definition
    pub search_fields: IndexMap<&'static str, SearchField>,
}

/// Static mapping from resource types to storage shape and search fields
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    schema: String,
    types: IndexMap<&'static str, ResourceTypeDef>,
}

impl SchemaCatalog {
    /// Create a catalog over the given database schema with the standard
    /// resource types
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            types: standard_types(),
        }
    }

    /// The database schema name
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Schema-qualified physical tables
    pub fn tables(&self) -> StorageTables {
        StorageTables {
            identity: format!("{}.resource", self.schema),
            payload: format!("{}.resource_body", self.schema),
            token_index: format!("{}.idx_token", self.schema),
            string_index: format!("{}.idx_string", self.schema),
            date_index: format!("{}.idx_date", self.schema),
        }
    }

    /// Known resource types
    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.keys().copied()
    }

    /// Look up a resource type, failing on unknown types
    pub fn resource_type(&self, resource: &str) -> Result<&ResourceTypeDef> {
        self.types
            .get(resource)
            .ok_or_else(|| SofError::compile(SOF0101, format!("unknown resource type '{resource}'")))
    }

    /// Look up a search field, failing on unknown constraint names
    pub fn search_field(&self, resource: &str, constraint: &str) -> Result<&SearchField> {
        self.resource_type(resource)?
            .search_fields
            .get(constraint)
            .ok_or_else(|| {
                SofError::compile(
                    SOF0105,
                    format!("unknown search constraint '{constraint}' for {resource}"),
                )
            })
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new("fhir")
    }
}

fn standard_types() -> IndexMap<&'static str, ResourceTypeDef> {
    use ConstraintKind::{Date, String, Token, TokenCoding};

    let mut types = IndexMap::new();

    types.insert(
        "Patient",
        ResourceTypeDef {
            search_fields: IndexMap::from([
                ("gender", SearchField::scalar(Token, vec!["gender"])),
                ("active", SearchField::scalar(Token, vec!["active"])),
                (
                    "name",
                    SearchField::collection(String, vec!["name", "family"], 0),
                ),
                (
                    "family",
                    SearchField::collection(String, vec!["name", "family"], 0),
                ),
                ("birthdate", SearchField::scalar(Date, vec!["birthDate"])),
            ]),
        },
    );

    types.insert(
        "Observation",
        ResourceTypeDef {
            search_fields: IndexMap::from([
                ("status", SearchField::scalar(Token, vec!["status"])),
                (
                    "code",
                    SearchField::collection(TokenCoding, vec!["code", "coding"], 1),
                ),
                (
                    "date",
                    SearchField::scalar(Date, vec!["effectiveDateTime"]),
                ),
                (
                    "subject",
                    SearchField::scalar(Token, vec!["subject", "reference"]),
                ),
                (
                    "patient",
                    SearchField::scalar(Token, vec!["subject", "reference"]),
                ),
            ]),
        },
    );

    types.insert(
        "Condition",
        ResourceTypeDef {
            search_fields: IndexMap::from([
                (
                    "code",
                    SearchField::collection(TokenCoding, vec!["code", "coding"], 1),
                ),
                (
                    "clinical-status",
                    SearchField::collection(TokenCoding, vec!["clinicalStatus", "coding"], 1),
                ),
                (
                    "onset-date",
                    SearchField::scalar(Date, vec!["onsetDateTime"]),
                ),
                (
                    "subject",
                    SearchField::scalar(Token, vec!["subject", "reference"]),
                ),
                (
                    "patient",
                    SearchField::scalar(Token, vec!["subject", "reference"]),
                ),
            ]),
        },
    );

    types.insert(
        "Encounter",
        ResourceTypeDef {
            search_fields: IndexMap::from([
                ("status", SearchField::scalar(Token, vec!["status"])),
                (
                    "class",
                    SearchField::scalar(Token, vec!["class", "code"]),
                ),
                ("date", SearchField::scalar(Date, vec!["period", "start"])),
                (
                    "subject",
                    SearchField::scalar(Token, vec!["subject", "reference"]),
                ),
            ]),
        },
    );

    types.insert(
        "MedicationRequest",
        ResourceTypeDef {
            search_fields: IndexMap::from([
                ("status", SearchField::scalar(Token, vec!["status"])),
                ("intent", SearchField::scalar(Token, vec!["intent"])),
                (
                    "authoredon",
                    SearchField::scalar(Date, vec!["authoredOn"]),
                ),
                (
                    "subject",
                    SearchField::scalar(Token, vec!["subject", "reference"]),
                ),
            ]),
        },
    );

    types.insert(
        "DiagnosticReport",
        ResourceTypeDef {
            search_fields: IndexMap::from([
                ("status", SearchField::scalar(Token, vec!["status"])),
                (
                    "code",
                    SearchField::collection(TokenCoding, vec!["code", "coding"], 1),
                ),
                (
                    "date",
                    SearchField::scalar(Date, vec!["effectiveDateTime"]),
                ),
                (
                    "subject",
                    SearchField::scalar(Token, vec!["subject", "reference"]),
                ),
            ]),
        },
    );

    types
}
