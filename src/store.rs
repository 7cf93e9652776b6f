//! Database bootstrap: create the database when missing and the catalog's tables when absent.
//! Idempotent; existing tables are never altered.

use crate::config::{ResolvedEntity, ResolvedModel, CREATED_AT, ID_COLUMN, UPDATED_AT};
use crate::error::{AppError, ConfigError};
use crate::sql::{qualified_table, quoted};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::Env {
            var: "DATABASE_URL",
            message: e.to_string(),
        })?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| ConfigError::Env {
            var: "DATABASE_URL",
            message: "no database path".into(),
        })?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let (db_name, query) = match path_and_query.split_once('?') {
        Some((name, query)) => (name.trim(), Some(query)),
        None => (path_and_query.trim(), None),
    };
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = match query {
        Some(q) => format!("{}postgres?{}", base, q),
        None => format!("{}postgres", base),
    };
    Ok((admin_url, db_name.to_string()))
}

/// CREATE SCHEMA / TABLE / INDEX IF NOT EXISTS for every catalog entity.
pub async fn ensure_tables(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    let mut schemas: Vec<&str> = model.entities.iter().map(|e| e.schema_name.as_str()).collect();
    schemas.sort_unstable();
    schemas.dedup();
    for schema in schemas {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)))
            .execute(pool)
            .await?;
    }
    for entity in &model.entities {
        for sql in table_ddl(entity) {
            tracing::debug!(sql = %sql, "ddl");
            sqlx::query(&sql).execute(pool).await?;
        }
    }
    tracing::info!(tables = model.entities.len(), "tables ready");
    Ok(())
}

/// CREATE TABLE followed by one CREATE INDEX per indexed column.
/// Unique constraints are named `<table>_<column>_unique` so violations map back to their column.
pub fn table_ddl(entity: &ResolvedEntity) -> Vec<String> {
    let mut col_defs = Vec::new();
    for c in &entity.columns {
        let mut def = format!("{} {}", quoted(&c.name), c.type_.ddl_type());
        if c.name == ID_COLUMN {
            def.push_str(" PRIMARY KEY");
        } else if c.name == CREATED_AT || c.name == UPDATED_AT {
            def.push_str(" NOT NULL DEFAULT NOW()");
        } else if !c.nullable {
            def.push_str(" NOT NULL");
        }
        col_defs.push(def);
    }
    for c in entity.columns.iter().filter(|c| c.unique) {
        col_defs.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            quoted(&format!("{}_{}_unique", entity.table_name, c.name)),
            quoted(&c.name)
        ));
    }

    let table = qualified_table(entity);
    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        table,
        col_defs.join(",\n  ")
    )];
    for c in entity.columns.iter().filter(|c| c.index) {
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quoted(&format!("{}_{}_index", entity.table_name, c.name)),
            table,
            quoted(&c.name)
        ));
    }
    statements
}
