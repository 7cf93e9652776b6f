//! Catalog validation: referential integrity and route consistency.

use crate::config::resolved::{CREATED_AT, CREATED_BY, ID_COLUMN, UPDATED_AT, UPDATED_BY};
use crate::config::CatalogConfig;
use crate::error::ConfigError;
use std::collections::HashSet;

const OPERATIONS: &[&str] = &["list", "create", "read", "update", "delete"];
const MANAGED_COLUMNS: &[&str] = &[ID_COLUMN, CREATED_BY, UPDATED_BY, CREATED_AT, UPDATED_AT];

pub fn validate(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if !is_identifier(&catalog.schema) {
        return Err(ConfigError::Validation(format!("invalid schema name '{}'", catalog.schema)));
    }

    let path_segments: HashSet<&str> = catalog.entities.iter().map(|e| e.path_segment.as_str()).collect();
    if path_segments.len() != catalog.entities.len() {
        let mut seen = HashSet::new();
        for e in &catalog.entities {
            if !seen.insert(e.path_segment.as_str()) {
                return Err(ConfigError::DuplicatePathSegment(e.path_segment.clone()));
            }
        }
    }

    let mut tables = HashSet::new();
    let mut nested_routes = HashSet::new();
    for entity in &catalog.entities {
        if !is_identifier(&entity.table) {
            return Err(ConfigError::Validation(format!("invalid table name '{}'", entity.table)));
        }
        if !tables.insert(entity.table.as_str()) {
            return Err(ConfigError::Validation(format!("table '{}' registered twice", entity.table)));
        }

        let mut columns = HashSet::new();
        for c in &entity.columns {
            if !is_identifier(&c.name) {
                return Err(ConfigError::Validation(format!("invalid column name '{}.{}'", entity.table, c.name)));
            }
            if MANAGED_COLUMNS.contains(&c.name.as_str()) || !columns.insert(c.name.as_str()) {
                return Err(ConfigError::DuplicateColumn {
                    table: entity.table.clone(),
                    column: c.name.clone(),
                });
            }
        }
        let has_column = |name: &str| columns.contains(name) || MANAGED_COLUMNS.contains(&name);

        for op in &entity.operations {
            if !OPERATIONS.contains(&op.as_str()) {
                return Err(ConfigError::Validation(format!("unknown operation '{}' on {}", op, entity.path_segment)));
            }
        }
        for col in entity.validation.keys().chain(entity.sensitive_columns.iter()) {
            if !has_column(col) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", entity.table, col),
                });
            }
        }

        let mut lookup_paths = HashSet::new();
        for lookup in &entity.lookups {
            if !has_column(&lookup.column) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", entity.table, lookup.column),
                });
            }
            match &lookup.parent {
                Some(parent) => {
                    if !path_segments.contains(parent.as_str()) {
                        return Err(ConfigError::MissingReference {
                            kind: "resource",
                            id: parent.clone(),
                        });
                    }
                    if !nested_routes.insert((parent.as_str(), lookup.path.as_str())) {
                        return Err(ConfigError::Validation(format!(
                            "nested route /{}/{{id}}/{} declared twice",
                            parent, lookup.path
                        )));
                    }
                }
                None => {
                    if !lookup_paths.insert(lookup.path.as_str()) {
                        return Err(ConfigError::Validation(format!(
                            "lookup /{}/{} declared twice",
                            entity.path_segment, lookup.path
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Lowercase SQL identifier: letters, digits and underscores, not starting with a digit.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cardinality, ColumnConfig, ColumnType, EmptyResult, EntityConfig, LookupConfig};

    fn entity(path: &str, table: &str) -> EntityConfig {
        EntityConfig {
            name: "Thing".into(),
            table: table.into(),
            path_segment: path.into(),
            operations: vec!["list".into(), "read".into()],
            delete_response: Default::default(),
            columns: vec![ColumnConfig {
                name: "label".into(),
                type_: ColumnType::String,
                nullable: false,
                unique: false,
                index: false,
                hashed: false,
            }],
            sensitive_columns: vec![],
            validation: Default::default(),
            lookups: vec![],
        }
    }

    fn lookup(path: &str, column: &str, parent: Option<&str>) -> LookupConfig {
        LookupConfig {
            path: path.into(),
            column: column.into(),
            cardinality: Cardinality::Many,
            parent: parent.map(String::from),
            on_empty: EmptyResult::EmptyList,
            not_found_message: None,
        }
    }

    fn catalog(entities: Vec<EntityConfig>) -> CatalogConfig {
        CatalogConfig {
            schema: "public".into(),
            entities,
        }
    }

    #[test]
    fn accepts_minimal_catalog() {
        assert!(validate(&catalog(vec![entity("things", "things")])).is_ok());
    }

    #[test]
    fn rejects_duplicate_path_segment() {
        let err = validate(&catalog(vec![entity("things", "a"), entity("things", "b")])).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePathSegment(p) if p == "things"));
    }

    #[test]
    fn rejects_redeclared_managed_column() {
        let mut e = entity("things", "things");
        e.columns[0].name = "created_by".into();
        let err = validate(&catalog(vec![e])).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateColumn { column, .. } if column == "created_by"));
    }

    #[test]
    fn rejects_lookup_on_unknown_column() {
        let mut e = entity("things", "things");
        e.lookups.push(lookup("owner", "owner_id", None));
        let err = validate(&catalog(vec![e])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "column", .. }));
    }

    #[test]
    fn lookup_on_managed_column_is_allowed() {
        let mut e = entity("things", "things");
        e.lookups.push(lookup("author", "created_by", None));
        assert!(validate(&catalog(vec![e])).is_ok());
    }

    #[test]
    fn rejects_nested_lookup_with_unknown_parent() {
        let mut e = entity("things", "things");
        e.lookups.push(lookup("things", "label", Some("boxes")));
        let err = validate(&catalog(vec![e])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "resource", .. }));
    }

    #[test]
    fn rejects_unsafe_table_name() {
        let e = entity("things", "things; drop table x");
        assert!(matches!(validate(&catalog(vec![e])), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_unknown_operation() {
        let mut e = entity("things", "things");
        e.operations.push("purge".into());
        assert!(matches!(validate(&catalog(vec![e])), Err(ConfigError::Validation(_))));
    }
}
