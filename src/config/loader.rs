//! Load the entity catalog (built in or from a JSON file) and resolve it for runtime use.

use crate::config::resolved::{
    ColumnInfo, ResolvedEntity, ResolvedLookup, ResolvedModel, CREATED_AT, CREATED_BY, ID_COLUMN, UPDATED_AT,
    UPDATED_BY,
};
use crate::config::{validate, CatalogConfig, ColumnType, EntityConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/entities.json");

/// The tournament domain catalog compiled into the binary.
pub fn builtin_catalog() -> Result<CatalogConfig, ConfigError> {
    serde_json::from_str(BUILTIN_CATALOG).map_err(|e| ConfigError::Load(format!("built-in catalog: {}", e)))
}

pub async fn load_catalog_file(path: &Path) -> Result<CatalogConfig, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build resolved model from the catalog (validates first).
pub fn resolve(catalog: &CatalogConfig) -> Result<ResolvedModel, ConfigError> {
    validate(catalog)?;

    let mut entities = Vec::with_capacity(catalog.entities.len());
    let mut entity_by_path = HashMap::new();
    let mut nested = HashMap::new();

    for config in &catalog.entities {
        let columns = resolve_columns(config);
        let type_of: HashMap<&str, ColumnType> = columns.iter().map(|c| (c.name.as_str(), c.type_)).collect();

        let mut lookups = HashMap::new();
        for l in &config.lookups {
            let column_type = *type_of.get(l.column.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: "column",
                id: format!("{}.{}", config.table, l.column),
            })?;
            let lookup = ResolvedLookup {
                path: l.path.clone(),
                column: l.column.clone(),
                column_type,
                cardinality: l.cardinality,
                on_empty: l.on_empty,
                not_found_message: l
                    .not_found_message
                    .clone()
                    .unwrap_or_else(|| format!("{} not found", config.name)),
            };
            match &l.parent {
                Some(parent) => {
                    nested.insert(
                        (parent.clone(), l.path.clone()),
                        (config.path_segment.clone(), lookup),
                    );
                }
                None => {
                    lookups.insert(l.path.clone(), lookup);
                }
            }
        }

        let entity = ResolvedEntity {
            name: config.name.clone(),
            schema_name: catalog.schema.clone(),
            table_name: config.table.clone(),
            path_segment: config.path_segment.clone(),
            columns,
            operations: config.operations.clone(),
            delete_response: config.delete_response,
            validation: config.validation.clone(),
            lookups,
        };
        entity_by_path.insert(entity.path_segment.clone(), entity.clone());
        entities.push(entity);
    }

    tracing::debug!(entities = entities.len(), nested = nested.len(), "catalog resolved");
    Ok(ResolvedModel {
        entities,
        entity_by_path,
        nested,
    })
}

/// Catalog columns framed by the managed ones: id first, audit fields and timestamps last.
fn resolve_columns(config: &EntityConfig) -> Vec<ColumnInfo> {
    let sensitive: HashSet<&str> = config.sensitive_columns.iter().map(String::as_str).collect();
    let managed = |name: &str, type_: ColumnType, nullable: bool, writable: bool| ColumnInfo {
        name: name.to_string(),
        type_,
        nullable,
        writable,
        required: false,
        unique: false,
        index: false,
        hashed: false,
        sensitive: false,
    };

    let mut columns = vec![managed(ID_COLUMN, ColumnType::Uuid, false, false)];
    for c in &config.columns {
        let rule_required = config.validation.get(&c.name).and_then(|r| r.required);
        columns.push(ColumnInfo {
            name: c.name.clone(),
            type_: c.type_,
            nullable: c.nullable,
            writable: true,
            required: rule_required.unwrap_or(!c.nullable),
            unique: c.unique,
            index: c.index,
            hashed: c.hashed,
            sensitive: sensitive.contains(c.name.as_str()),
        });
    }
    columns.push(managed(CREATED_BY, ColumnType::String, true, true));
    columns.push(managed(UPDATED_BY, ColumnType::String, true, true));
    columns.push(managed(CREATED_AT, ColumnType::Timestamp, true, false));
    columns.push(managed(UPDATED_AT, ColumnType::Timestamp, true, false));
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cardinality, DeleteResponse, EmptyResult};

    fn model() -> ResolvedModel {
        resolve(&builtin_catalog().unwrap()).unwrap()
    }

    #[test]
    fn builtin_catalog_registers_every_entity() {
        let model = model();
        let mut paths: Vec<&str> = model.entities.iter().map(|e| e.path_segment.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(
            paths,
            vec![
                "bto-sessions",
                "cards",
                "coupon-histories",
                "moderators",
                "participants",
                "racers",
                "races",
                "teams",
                "tokens",
                "tournament-results",
                "tournaments",
                "users",
            ]
        );
    }

    #[test]
    fn managed_columns_frame_catalog_columns() {
        let model = model();
        let team = model.entity_by_path("teams").unwrap();
        let names: Vec<&str> = team.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["id", "team_name", "description", "image", "created_by", "updated_by", "created_at", "updated_at"]
        );
        assert!(!team.column("id").unwrap().writable);
        assert!(team.column("created_by").unwrap().writable);
        assert!(team.column("team_name").unwrap().required);
    }

    #[test]
    fn rule_can_require_nullable_column() {
        let model = model();
        let racer = model.entity_by_path("racers").unwrap();
        let user_id = racer.column("user_id").unwrap();
        assert!(user_id.nullable);
        assert!(user_id.required);
    }

    #[test]
    fn lookups_keep_their_empty_contract() {
        let model = model();
        let cards = model.entity_by_path("cards").unwrap();
        assert_eq!(cards.lookups["code"].cardinality, Cardinality::One);
        assert_eq!(cards.lookups["code"].not_found_message, "Card not found");
        assert_eq!(cards.lookups["racer"].on_empty, EmptyResult::EmptyList);

        let racers = model.entity_by_path("racers").unwrap();
        assert_eq!(racers.lookups["team"].on_empty, EmptyResult::NotFound);
        assert_eq!(racers.lookups["team"].not_found_message, "No racers found for the given team");
    }

    #[test]
    fn nested_lookup_resolves_to_child_entity() {
        let model = model();
        let (entity, lookup) = model.nested_lookup("tournaments", "participants").unwrap();
        assert_eq!(entity.path_segment, "participants");
        assert_eq!(lookup.column, "tournament_id");
        assert_eq!(lookup.column_type, ColumnType::Uuid);
        assert_eq!(lookup.on_empty, EmptyResult::NotFound);
        assert!(model.nested_lookup("tournaments", "unknown").is_none());
    }

    #[test]
    fn tournaments_delete_without_content() {
        let model = model();
        assert_eq!(model.entity_by_path("tournaments").unwrap().delete_response, DeleteResponse::NoContent);
        assert_eq!(model.entity_by_path("cards").unwrap().delete_response, DeleteResponse::Message);
    }

    #[test]
    fn user_password_is_hashed_and_hidden() {
        let model = model();
        let password = model.entity_by_path("users").unwrap().column("password").unwrap();
        assert!(password.hashed);
        assert!(password.sensitive);
    }

    #[test]
    fn constraint_names_map_back_to_columns() {
        let model = model();
        let teams = model.entity_by_path("teams").unwrap();
        assert_eq!(teams.column_for_constraint("teams_team_name_unique"), Some("team_name"));
        assert_eq!(teams.column_for_constraint("cards_card_code_unique"), None);
    }
}
