//! Resolved entity model: catalog validated and flattened for runtime use.

use crate::config::{Cardinality, ColumnType, DeleteResponse, EmptyResult, UniqueScope, ValidationRule};
use std::collections::HashMap;

pub const ID_COLUMN: &str = "id";
pub const CREATED_BY: &str = "created_by";
pub const UPDATED_BY: &str = "updated_by";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub type_: ColumnType,
    pub nullable: bool,
    /// Accepted from request bodies. False for id and timestamps.
    pub writable: bool,
    /// Must be present (and non-null) on create.
    pub required: bool,
    pub unique: bool,
    pub index: bool,
    pub hashed: bool,
    /// Never selected into responses.
    pub sensitive: bool,
}

impl ColumnInfo {
    /// Placeholder with cast so text and numeric params bind to the column type.
    pub fn placeholder(&self, n: usize) -> String {
        format!("${}::{}", n, self.type_.pg_type())
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedLookup {
    pub path: String,
    pub column: String,
    pub column_type: ColumnType,
    pub cardinality: Cardinality,
    pub on_empty: EmptyResult,
    pub not_found_message: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub columns: Vec<ColumnInfo>,
    pub operations: Vec<String>,
    pub delete_response: DeleteResponse,
    pub validation: HashMap<String, ValidationRule>,
    /// Lookups addressed as `/{path_segment}/{lookup}/{value}`, keyed by lookup path.
    pub lookups: HashMap<String, ResolvedLookup>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn allows(&self, operation: &str) -> bool {
        self.operations.iter().any(|o| o == operation)
    }

    pub fn not_found_message(&self) -> String {
        format!("{} not found", self.name)
    }

    pub fn deleted_message(&self) -> String {
        format!("{} deleted successfully", self.name)
    }

    /// Columns whose rule asks for a uniqueness check in the given phase.
    pub fn unique_rule(&self, column: &str, updating: bool) -> bool {
        match self.validation.get(column).and_then(|r| r.unique) {
            Some(UniqueScope::Always) => true,
            Some(UniqueScope::Create) => !updating,
            None => false,
        }
    }

    /// Column named by a Postgres constraint built by the table bootstrap (`<table>_<column>_unique`).
    pub fn column_for_constraint(&self, constraint: &str) -> Option<&str> {
        let rest = constraint.strip_prefix(self.table_name.as_str())?.strip_prefix('_')?;
        let name = rest.strip_suffix("_unique").unwrap_or(rest);
        self.column(name).map(|c| c.name.as_str())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
    /// (parent path segment, child path) -> (entity path segment, lookup).
    pub nested: HashMap<(String, String), (String, ResolvedLookup)>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }

    /// Nested collection under a parent resource, e.g. (`tournaments`, `participants`).
    pub fn nested_lookup(&self, parent: &str, child: &str) -> Option<(&ResolvedEntity, &ResolvedLookup)> {
        let (path, lookup) = self.nested.get(&(parent.to_string(), child.to_string()))?;
        Some((self.entity_by_path.get(path)?, lookup))
    }
}
