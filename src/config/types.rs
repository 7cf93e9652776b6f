//! Raw catalog types matching the entity catalog JSON (`catalog/entities.json`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column storage type. Drives the DDL type, the SQL cast on bind, request type checks and row decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Uuid,
    /// VARCHAR(255).
    String,
    Text,
    Integer,
    Timestamp,
}

impl ColumnType {
    pub fn pg_type(self) -> &'static str {
        match self {
            ColumnType::Uuid => "uuid",
            ColumnType::String => "varchar",
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Timestamp => "timestamptz",
        }
    }

    pub fn ddl_type(self) -> &'static str {
        match self {
            ColumnType::Uuid => "UUID",
            ColumnType::String => "VARCHAR(255)",
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Timestamp => "TIMESTAMPTZ",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Table-level UNIQUE constraint.
    #[serde(default)]
    pub unique: bool,
    /// Secondary index for foreign-key style lookups.
    #[serde(default)]
    pub index: bool,
    /// Stored as a bcrypt hash of the submitted value.
    #[serde(default)]
    pub hashed: bool,
}

fn default_true() -> bool {
    true
}

/// When a uniqueness rule is checked against existing rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueScope {
    Create,
    Always,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Overrides column nullability for the create requirement (e.g. a nullable FK that callers must supply).
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub unique: Option<UniqueScope>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Response for a many-lookup that matched no rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResult {
    #[default]
    EmptyList,
    NotFound,
}

/// Secondary-key lookup route.
///
/// Without `parent` the route is `/{path_segment}/{path}/{value}`;
/// with `parent` it is `/{parent}/{value}/{path}` (e.g. `/tournaments/{id}/participants`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookupConfig {
    pub path: String,
    pub column: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub on_empty: EmptyResult,
    /// Message for the 404 branch; defaults to "<Entity> not found".
    #[serde(default)]
    pub not_found_message: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteResponse {
    #[default]
    Message,
    NoContent,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Display name used in response messages ("Card not found").
    pub name: String,
    pub table: String,
    pub path_segment: String,
    #[serde(default = "default_operations")]
    pub operations: Vec<String>,
    #[serde(default)]
    pub delete_response: DeleteResponse,
    pub columns: Vec<ColumnConfig>,
    /// Column names that must never be exposed in API responses.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    #[serde(default)]
    pub lookups: Vec<LookupConfig>,
}

fn default_operations() -> Vec<String> {
    ["list", "create", "read", "update", "delete"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// The whole catalog: every entity lives in one schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub entities: Vec<EntityConfig>,
}

fn default_schema() -> String {
    "public".into()
}
