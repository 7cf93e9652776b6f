//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a resolved entity.

use crate::config::{ResolvedEntity, ID_COLUMN, UPDATED_AT};
use crate::sql::PgBindValue;

/// Quote identifier for PostgreSQL (safe: only from the validated catalog).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(entity: &ResolvedEntity) -> String {
    format!("{}.{}", quoted(&entity.schema_name), quoted(&entity.table_name))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// Every non-sensitive column, in catalog order. Used for SELECT lists and RETURNING.
pub fn select_column_list(entity: &ResolvedEntity) -> String {
    entity
        .columns
        .iter()
        .filter(|c| !c.sensitive)
        .map(|c| quoted(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SELECT all rows, oldest first.
pub fn select_all(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} ORDER BY {}, {}",
        select_column_list(entity),
        qualified_table(entity),
        quoted("created_at"),
        quoted(ID_COLUMN)
    );
    q
}

/// SELECT by primary key.
pub fn select_by_id(entity: &ResolvedEntity, id: uuid::Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.into());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}",
        select_column_list(entity),
        qualified_table(entity),
        quoted(ID_COLUMN),
        n
    );
    q
}

/// SELECT rows where `column` equals `value`, oldest first. Caller ensures the column exists.
pub fn select_by_column(entity: &ResolvedEntity, column: &str, value: PgBindValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(value);
    let placeholder = entity
        .column(column)
        .map(|c| c.placeholder(n))
        .unwrap_or_else(|| format!("${}", n));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {} ORDER BY {}, {}",
        select_column_list(entity),
        qualified_table(entity),
        quoted(column),
        placeholder,
        quoted("created_at"),
        quoted(ID_COLUMN)
    );
    q
}

/// `SELECT EXISTS(...)` for a uniqueness check, optionally ignoring one row (the row being updated).
pub fn exists_with_value(
    entity: &ResolvedEntity,
    column: &str,
    value: PgBindValue,
    except_id: Option<uuid::Uuid>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(value);
    let placeholder = entity
        .column(column)
        .map(|c| c.placeholder(n))
        .unwrap_or_else(|| format!("${}", n));
    let mut sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = {}",
        qualified_table(entity),
        quoted(column),
        placeholder
    );
    if let Some(id) = except_id {
        let n = q.push_param(id.into());
        sql.push_str(&format!(" AND {} <> ${}", quoted(ID_COLUMN), n));
    }
    sql.push(')');
    q.sql = sql;
    q
}

/// INSERT with a server-generated id. Writable columns absent from `values` are stored as NULL;
/// timestamps come from the column defaults.
pub fn insert(entity: &ResolvedEntity, id: uuid::Uuid, values: &[(String, PgBindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = vec![quoted(ID_COLUMN)];
    let n = q.push_param(id.into());
    let mut placeholders = vec![format!("${}", n)];
    for c in entity.columns.iter().filter(|c| c.writable) {
        let Some((_, v)) = values.iter().find(|(k, _)| *k == c.name) else {
            continue;
        };
        let n = q.push_param(v.clone());
        cols.push(quoted(&c.name));
        placeholders.push(c.placeholder(n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        qualified_table(entity),
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(entity)
    );
    q
}

/// UPDATE by id: SET only the supplied writable columns and bump updated_at.
/// With nothing to set, degrades to a SELECT so an absent row still reads as None.
pub fn update(entity: &ResolvedEntity, id: uuid::Uuid, values: &[(String, PgBindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in entity.columns.iter().filter(|c| c.writable) {
        let Some((_, v)) = values.iter().find(|(k, _)| *k == c.name) else {
            continue;
        };
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(&c.name), c.placeholder(n)));
    }
    if sets.is_empty() {
        return select_by_id(entity, id);
    }
    sets.push(format!("{} = NOW()", quoted(UPDATED_AT)));
    let n = q.push_param(id.into());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        qualified_table(entity),
        sets.join(", "),
        quoted(ID_COLUMN),
        n,
        select_column_list(entity)
    );
    q
}

/// DELETE by id, returning the id so the caller can tell whether a row existed.
pub fn delete(entity: &ResolvedEntity, id: uuid::Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.into());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${} RETURNING {}",
        qualified_table(entity),
        quoted(ID_COLUMN),
        n,
        quoted(ID_COLUMN)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_catalog, resolve, ResolvedModel};

    fn model() -> ResolvedModel {
        resolve(&builtin_catalog().unwrap()).unwrap()
    }

    fn text(s: &str) -> PgBindValue {
        PgBindValue::String(s.into())
    }

    #[test]
    fn insert_binds_id_first_and_casts_by_type() {
        let model = model();
        let cards = model.entity_by_path("cards").unwrap();
        let q = insert(
            cards,
            uuid::Uuid::nil(),
            &[("coupon".into(), PgBindValue::I64(3)), ("card_code".into(), text("C-1"))],
        );
        assert_eq!(
            q.sql,
            "INSERT INTO \"public\".\"cards\" (\"id\", \"card_code\", \"coupon\") VALUES ($1, $2::varchar, $3::integer) \
             RETURNING \"id\", \"card_code\", \"racer_id\", \"coupon\", \"status\", \"created_by\", \"updated_by\", \"created_at\", \"updated_at\""
        );
        assert_eq!(q.params[0], PgBindValue::Uuid(uuid::Uuid::nil()));
        assert_eq!(q.params[1], text("C-1"));
        assert_eq!(q.params[2], PgBindValue::I64(3));
    }

    #[test]
    fn insert_ignores_managed_columns() {
        let model = model();
        let teams = model.entity_by_path("teams").unwrap();
        let q = insert(
            teams,
            uuid::Uuid::nil(),
            &[("team_name".into(), text("Falcons")), ("created_at".into(), text("yesterday"))],
        );
        let (columns, _) = q.sql.split_once("VALUES").unwrap();
        assert!(!columns.contains("created_at"));
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn update_sets_only_supplied_columns() {
        let model = model();
        let racers = model.entity_by_path("racers").unwrap();
        let q = update(racers, uuid::Uuid::nil(), &[("image".into(), PgBindValue::Null)]);
        assert_eq!(
            q.sql,
            "UPDATE \"public\".\"racers\" SET \"image\" = $1::varchar, \"updated_at\" = NOW() WHERE \"id\" = $2 \
             RETURNING \"id\", \"racer_name\", \"user_id\", \"team_id\", \"image\", \"created_by\", \"updated_by\", \"created_at\", \"updated_at\""
        );
        assert_eq!(q.params, vec![PgBindValue::Null, PgBindValue::Uuid(uuid::Uuid::nil())]);
    }

    #[test]
    fn empty_update_reads_the_row() {
        let model = model();
        let racers = model.entity_by_path("racers").unwrap();
        let q = update(racers, uuid::Uuid::nil(), &[]);
        assert!(q.sql.starts_with("SELECT "));
        assert!(q.sql.ends_with("WHERE \"id\" = $1"));
    }

    #[test]
    fn sensitive_columns_are_never_selected() {
        let model = model();
        let users = model.entity_by_path("users").unwrap();
        assert!(!select_all(users).sql.contains("\"password\""));
        let q = insert(users, uuid::Uuid::nil(), &[("password".into(), text("hash"))]);
        let (_, returning) = q.sql.split_once("RETURNING").unwrap();
        assert!(!returning.contains("password"));
    }

    #[test]
    fn lookup_casts_value_to_column_type() {
        let model = model();
        let racers = model.entity_by_path("racers").unwrap();
        let q = select_by_column(racers, "team_id", text("0b6c9c1e-4f1e-4f7a-9d52-3b0f7a5d2e11"));
        assert!(q.sql.contains("WHERE \"team_id\" = $1::uuid ORDER BY \"created_at\", \"id\""));
    }

    #[test]
    fn uniqueness_check_can_skip_current_row() {
        let model = model();
        let teams = model.entity_by_path("teams").unwrap();
        let q = exists_with_value(teams, "team_name", text("Falcons"), Some(uuid::Uuid::nil()));
        assert_eq!(
            q.sql,
            "SELECT EXISTS(SELECT 1 FROM \"public\".\"teams\" WHERE \"team_name\" = $1::varchar AND \"id\" <> $2)"
        );
        let q = exists_with_value(teams, "team_name", text("Falcons"), None);
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn delete_returns_id() {
        let model = model();
        let cards = model.entity_by_path("cards").unwrap();
        assert_eq!(
            delete(cards, uuid::Uuid::nil()).sql,
            "DELETE FROM \"public\".\"cards\" WHERE \"id\" = $1 RETURNING \"id\""
        );
    }
}
