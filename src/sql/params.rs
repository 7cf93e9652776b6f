//! Convert serde_json::Value to types that sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value that can be bound to a PostgreSQL query. Placeholders carry a cast to the column type,
/// so each variant declares its own wire type and Postgres converts from there.
/// Column types are uuid, text-like, integer and timestamp, so these variants cover every bind.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    I64(i64),
    String(String),
    Uuid(uuid::Uuid),
}

impl PgBindValue {
    /// Integers bind as `I64`; anything else non-null binds as its text form and relies on the cast.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgBindValue::I64(i),
                None => PgBindValue::String(n.to_string()),
            },
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => PgBindValue::String(v.to_string()),
        }
    }
}

impl From<uuid::Uuid> for PgBindValue {
    fn from(u: uuid::Uuid) -> Self {
        PgBindValue::Uuid(u)
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Null => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf),
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::String(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf),
            PgBindValue::Uuid(u) => <uuid::Uuid as Encode<Postgres>>::encode_by_ref(u, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null | PgBindValue::String(_) => <String as sqlx::Type<Postgres>>::type_info(),
            PgBindValue::I64(_) => <i64 as sqlx::Type<Postgres>>::type_info(),
            PgBindValue::Uuid(_) => <uuid::Uuid as sqlx::Type<Postgres>>::type_info(),
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_keep_integer_precision() {
        assert_eq!(PgBindValue::from_json(&json!(42)), PgBindValue::I64(42));
        assert_eq!(PgBindValue::from_json(&json!(1.5)), PgBindValue::String("1.5".into()));
        assert_eq!(PgBindValue::from_json(&json!(true)), PgBindValue::String("true".into()));
    }

    #[test]
    fn strings_stay_text() {
        let id = "0b6c9c1e-4f1e-4f7a-9d52-3b0f7a5d2e11";
        assert_eq!(PgBindValue::from_json(&json!(id)), PgBindValue::String(id.into()));
        assert_eq!(PgBindValue::from_json(&Value::Null), PgBindValue::Null);
    }

    #[test]
    fn declared_type_follows_variant() {
        let uuid = PgBindValue::Uuid(uuid::Uuid::nil());
        assert_eq!(uuid.produces().unwrap(), <uuid::Uuid as sqlx::Type<Postgres>>::type_info());
        assert_eq!(PgBindValue::I64(1).produces().unwrap(), <i64 as sqlx::Type<Postgres>>::type_info());
    }
}
