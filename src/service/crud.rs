//! Generic entity repository over PostgreSQL: one code path for every catalog entity.

use crate::config::{ColumnType, ResolvedEntity};
use crate::error::{AppError, FieldErrors};
use crate::service::validation::{label, required_message, unique_message, Validated};
use crate::sql::{delete, exists_with_value, insert, select_all, select_by_column, select_by_id, update, PgBindValue, QueryBuf};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::error::{DatabaseError, ErrorKind};
use sqlx::postgres::{PgArguments, PgDatabaseError, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

pub struct CrudService;

impl CrudService {
    /// Every row of the entity's table, oldest first.
    pub async fn list(pool: &PgPool, entity: &ResolvedEntity) -> Result<Vec<Value>, AppError> {
        let q = select_all(entity);
        Self::query_many(pool, entity, &q).await
    }

    /// Fetch one row by primary key.
    pub async fn read(pool: &PgPool, entity: &ResolvedEntity, id: Uuid) -> Result<Option<Value>, AppError> {
        let q = select_by_id(entity, id);
        Self::query_optional(pool, entity, &q).await
    }

    /// Rows whose `column` equals `value`.
    pub async fn find_by(
        pool: &PgPool,
        entity: &ResolvedEntity,
        column: &str,
        value: PgBindValue,
    ) -> Result<Vec<Value>, AppError> {
        let q = select_by_column(entity, column, value);
        Self::query_many(pool, entity, &q).await
    }

    /// First (oldest) row whose `column` equals `value`.
    pub async fn find_one_by(
        pool: &PgPool,
        entity: &ResolvedEntity,
        column: &str,
        value: PgBindValue,
    ) -> Result<Option<Value>, AppError> {
        Ok(Self::find_by(pool, entity, column, value).await?.into_iter().next())
    }

    /// Insert one row under a fresh server-generated id. Returns the created row.
    pub async fn create(
        pool: &PgPool,
        entity: &ResolvedEntity,
        values: Vec<(String, Value)>,
    ) -> Result<Value, AppError> {
        let id = Uuid::new_v4();
        let params = Self::bind_values(entity, values).await?;
        let q = insert(entity, id, &params);
        let row = Self::execute_returning_one(pool, entity, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        tracing::info!(entity = %entity.name, %id, "created");
        Ok(row)
    }

    /// Overwrite the supplied columns of one row. `None` when no row has that id.
    pub async fn update(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: Uuid,
        values: Vec<(String, Value)>,
    ) -> Result<Option<Value>, AppError> {
        let params = Self::bind_values(entity, values).await?;
        let q = update(entity, id, &params);
        let row = Self::execute_returning_one(pool, entity, &q).await?;
        if row.is_some() {
            tracing::info!(entity = %entity.name, %id, "updated");
        }
        Ok(row)
    }

    /// Hard delete by id. `false` when no row had that id.
    pub async fn delete(pool: &PgPool, entity: &ResolvedEntity, id: Uuid) -> Result<bool, AppError> {
        let q = delete(entity, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let deleted = bind_all(&q).fetch_optional(pool).await?.is_some();
        if deleted {
            tracing::info!(entity = %entity.name, %id, "deleted");
        }
        Ok(deleted)
    }

    /// Uniqueness rules for the validated values. Fields that already failed are skipped;
    /// on update the row being updated does not count as a duplicate.
    pub async fn check_unique(
        pool: &PgPool,
        entity: &ResolvedEntity,
        validated: &Validated,
        except_id: Option<Uuid>,
    ) -> Result<FieldErrors, AppError> {
        let mut errors = FieldErrors::new();
        for (column, value) in &validated.values {
            if value.is_null() || validated.errors.has(column) || !entity.unique_rule(column, except_id.is_some()) {
                continue;
            }
            let q = exists_with_value(entity, column, PgBindValue::from_json(value), except_id);
            tracing::debug!(sql = %q.sql, params = ?q.params, "query");
            let mut query = sqlx::query_scalar::<_, bool>(&q.sql);
            for p in &q.params {
                query = query.bind(p.clone());
            }
            if query.fetch_one(pool).await? {
                errors.add(column, unique_message(column));
            }
        }
        Ok(errors)
    }

    /// Typed bind values; hashed columns are bcrypt-hashed off the async runtime.
    async fn bind_values(
        entity: &ResolvedEntity,
        values: Vec<(String, Value)>,
    ) -> Result<Vec<(String, PgBindValue)>, AppError> {
        let mut out = Vec::with_capacity(values.len());
        for (name, value) in values {
            let Some(col) = entity.column(&name) else { continue };
            let bind = match (&value, col.type_) {
                (Value::String(s), _) if col.hashed => PgBindValue::String(hash_secret(s.clone()).await?),
                (Value::String(s), ColumnType::Uuid) => Uuid::parse_str(s)
                    .map(PgBindValue::Uuid)
                    .map_err(|_| AppError::Validation(FieldErrors::single(&name, format!("The {} field must be a valid UUID.", label(&name)))))?,
                _ => PgBindValue::from_json(&value),
            };
            out.push((name, bind));
        }
        Ok(out)
    }

    async fn query_many(pool: &PgPool, entity: &ResolvedEntity, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(q).fetch_all(pool).await?;
        rows.iter().map(|r| row_to_json(entity, r)).collect()
    }

    async fn query_optional(pool: &PgPool, entity: &ResolvedEntity, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(q).fetch_optional(pool).await?;
        row.map(|r| row_to_json(entity, &r)).transpose()
    }

    /// Like `query_optional`, for writes: constraint violations become field errors.
    async fn execute_returning_one(
        pool: &PgPool,
        entity: &ResolvedEntity,
        q: &QueryBuf,
    ) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(q)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_write_error(entity, e))?;
        row.map(|r| row_to_json(entity, &r)).transpose()
    }
}

fn bind_all(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

async fn hash_secret(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task: {}", e)))?
        .map_err(|e| AppError::Internal(format!("hashing: {}", e)))
}

/// Storage constraint violations that slipped past pre-validation (e.g. two concurrent creates
/// with the same unique value) are caller errors, not server errors.
fn map_write_error(entity: &ResolvedEntity, e: sqlx::Error) -> AppError {
    let violation = e.as_database_error().and_then(|db| violated_field(entity, db));
    match violation {
        Some((column, message)) => {
            tracing::debug!(entity = %entity.name, %column, error = %e, "constraint violation");
            AppError::Validation(FieldErrors::single(&column, message))
        }
        None => AppError::Db(e),
    }
}

fn violated_field(entity: &ResolvedEntity, db: &(dyn DatabaseError + 'static)) -> Option<(String, String)> {
    let constraint_column = || {
        db.constraint()
            .map(|c| entity.column_for_constraint(c).unwrap_or(c))
            .unwrap_or("record")
            .to_string()
    };
    match db.kind() {
        ErrorKind::UniqueViolation => {
            let column = constraint_column();
            let message = unique_message(&column);
            Some((column, message))
        }
        ErrorKind::NotNullViolation => {
            let column = db
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(PgDatabaseError::column)
                .unwrap_or("record")
                .to_string();
            let message = required_message(&column);
            Some((column, message))
        }
        ErrorKind::ForeignKeyViolation | ErrorKind::CheckViolation => {
            let column = constraint_column();
            let message = format!("The selected {} is invalid.", label(&column));
            Some((column, message))
        }
        _ => None,
    }
}

/// Decode a row by the catalog's column types. Sensitive columns are never selected, so never decoded.
fn row_to_json(entity: &ResolvedEntity, row: &PgRow) -> Result<Value, AppError> {
    let mut map = Map::new();
    for col in entity.columns.iter().filter(|c| !c.sensitive) {
        let name = col.name.as_str();
        let v = match col.type_ {
            ColumnType::Uuid => row
                .try_get::<Option<Uuid>, _>(name)?
                .map(|u| Value::String(u.to_string())),
            ColumnType::String | ColumnType::Text => row.try_get::<Option<String>, _>(name)?.map(Value::String),
            ColumnType::Integer => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
            ColumnType::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(name)?
                .map(|d| Value::String(d.to_rfc3339_opts(SecondsFormat::Micros, true))),
        };
        map.insert(name.to_string(), v.unwrap_or(Value::Null));
    }
    Ok(Value::Object(map))
}
