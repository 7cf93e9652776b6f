//! Entity CRUD handlers: list, create, read, update, delete, and secondary-key lookups.
//! One generic set of handlers serves every catalog entity; the entity is resolved by path segment.

use crate::config::{Cardinality, DeleteResponse, EmptyResult, ResolvedEntity, ResolvedLookup, CREATED_BY, UPDATED_BY};
use crate::error::AppError;
use crate::extractors::Actor;
use crate::response;
use crate::service::validation::parse_path_value;
use crate::service::{CrudService, Mode, RequestValidator, Validated};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Response,
    Json,
};
use serde_json::{Map, Value};
use uuid::Uuid;

const RESOURCE_NOT_FOUND: &str = "Resource not found";

fn resolve_entity<'a>(state: &'a AppState, path_segment: &str, operation: &str) -> Result<&'a ResolvedEntity, AppError> {
    let entity = state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(RESOURCE_NOT_FOUND.into()))?;
    if !entity.allows(operation) {
        return Err(AppError::MethodNotAllowed(format!("{} does not support {}", path_segment, operation)));
    }
    Ok(entity)
}

/// Ids that are not UUIDs cannot name a row: they take the entity's not-found branch.
fn parse_id(entity: &ResolvedEntity, id_str: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id_str).map_err(|_| AppError::NotFound(entity.not_found_message()))
}

fn body_to_map(body: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, AppError> {
    let Json(value) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Field rules, then uniqueness for the fields that passed. All violations are reported together.
async fn validate_request(
    state: &AppState,
    entity: &ResolvedEntity,
    body: &Map<String, Value>,
    mode: Mode,
    except_id: Option<Uuid>,
) -> Result<Validated, AppError> {
    let mut validated = RequestValidator::validate(entity, body, mode);
    let duplicates = CrudService::check_unique(&state.pool, entity, &validated, except_id).await?;
    validated.errors.merge(duplicates);
    std::mem::take(&mut validated.errors).into_result()?;
    Ok(validated)
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
) -> Result<Response, AppError> {
    let entity = resolve_entity(&state, &path_segment, "list")?;
    let rows = CrudService::list(&state.pool, entity).await?;
    Ok(response::ok(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    actor: Actor,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let entity = resolve_entity(&state, &path_segment, "create")?;
    let mut body = body_to_map(body)?;
    actor.stamp(&mut body, CREATED_BY);
    let validated = validate_request(&state, entity, &body, Mode::Create, None).await?;
    let row = CrudService::create(&state.pool, entity, validated.values).await?;
    Ok(response::created(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = resolve_entity(&state, &path_segment, "read")?;
    let id = parse_id(entity, &id_str)?;
    let row = CrudService::read(&state.pool, entity, id)
        .await?
        .ok_or_else(|| AppError::NotFound(entity.not_found_message()))?;
    Ok(response::ok(row))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    actor: Actor,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let entity = resolve_entity(&state, &path_segment, "update")?;
    let mut body = body_to_map(body)?;
    let id = parse_id(entity, &id_str)?;
    actor.stamp(&mut body, UPDATED_BY);
    let validated = validate_request(&state, entity, &body, Mode::Update, Some(id)).await?;
    let row = CrudService::update(&state.pool, entity, id, validated.values)
        .await?
        .ok_or_else(|| AppError::NotFound(entity.not_found_message()))?;
    Ok(response::ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = resolve_entity(&state, &path_segment, "delete")?;
    let id = parse_id(entity, &id_str)?;
    if !CrudService::delete(&state.pool, entity, id).await? {
        return Err(AppError::NotFound(entity.not_found_message()));
    }
    Ok(match entity.delete_response {
        DeleteResponse::Message => response::message(axum::http::StatusCode::OK, entity.deleted_message()),
        DeleteResponse::NoContent => response::no_content(),
    })
}

/// `GET /{resource}/{lookup}/{value}` (e.g. `/cards/code/C-1`) or
/// `GET /{parent}/{id}/{collection}` (e.g. `/tournaments/{id}/participants`).
pub async fn lookup(
    State(state): State<AppState>,
    Path((resource, segment, value)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let model = &state.model;
    let parent = model
        .entity_by_path(&resource)
        .ok_or_else(|| AppError::NotFound(RESOURCE_NOT_FOUND.into()))?;
    let (entity, lookup, raw) = match parent.lookups.get(&segment) {
        Some(lookup) => (parent, lookup, value.as_str()),
        None => {
            let (child, lookup) = model
                .nested_lookup(&resource, &value)
                .ok_or_else(|| AppError::NotFound(RESOURCE_NOT_FOUND.into()))?;
            (child, lookup, segment.as_str())
        }
    };
    if !entity.allows("read") {
        return Err(AppError::MethodNotAllowed(format!("{} does not support read", entity.path_segment)));
    }
    run_lookup(&state, entity, lookup, raw).await
}

async fn run_lookup(
    state: &AppState,
    entity: &ResolvedEntity,
    lookup: &ResolvedLookup,
    raw: &str,
) -> Result<Response, AppError> {
    let bind = parse_path_value(lookup.column_type, raw);
    match lookup.cardinality {
        Cardinality::One => {
            let row = match bind {
                Some(v) => CrudService::find_one_by(&state.pool, entity, &lookup.column, v).await?,
                None => None,
            };
            row.map(response::ok)
                .ok_or_else(|| AppError::NotFound(lookup.not_found_message.clone()))
        }
        Cardinality::Many => {
            let rows = match bind {
                Some(v) => CrudService::find_by(&state.pool, entity, &lookup.column, v).await?,
                None => Vec::new(),
            };
            if rows.is_empty() && lookup.on_empty == EmptyResult::NotFound {
                return Err(AppError::NotFound(lookup.not_found_message.clone()));
            }
            Ok(response::ok(rows))
        }
    }
}
