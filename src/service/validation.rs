//! Request validation from column types and catalog rules.

use crate::config::{ColumnInfo, ColumnType, ResolvedEntity, ValidationRule};
use crate::error::FieldErrors;
use crate::sql::PgBindValue;
use regex::Regex;
use serde_json::{Map, Value};

/// Implicit limit of `string` (VARCHAR(255)) columns.
const STRING_MAX: usize = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

/// Outcome of the synchronous rules: normalised writable values plus every violation found.
/// Uniqueness is checked afterwards against the database, only for fields listed in `values`.
#[derive(Debug, Default)]
pub struct Validated {
    pub values: Vec<(String, Value)>,
    pub errors: FieldErrors,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate body against the entity. On create every required column must be present;
    /// on update only supplied fields are checked. Keys that are not writable columns are dropped.
    pub fn validate(entity: &ResolvedEntity, body: &Map<String, Value>, mode: Mode) -> Validated {
        let default_rule = ValidationRule::default();
        let mut out = Validated::default();
        for col in entity.columns.iter().filter(|c| c.writable) {
            let rule = entity.validation.get(&col.name).unwrap_or(&default_rule);
            let value = match body.get(&col.name) {
                Some(Value::String(s)) if s.is_empty() => Some(Value::Null),
                other => other.cloned(),
            };
            let Some(value) = value else {
                if mode == Mode::Create && col.required {
                    out.errors.add(&col.name, required_message(&col.name));
                }
                continue;
            };
            if value.is_null() {
                if col.required || !col.nullable {
                    out.errors.add(&col.name, required_message(&col.name));
                } else {
                    out.values.push((col.name.clone(), Value::Null));
                }
                continue;
            }
            match validate_field(col, &value, rule) {
                Ok(normalised) => out.values.push((col.name.clone(), normalised)),
                Err(messages) => {
                    for m in messages {
                        out.errors.add(&col.name, m);
                    }
                }
            }
        }
        out
    }
}

/// Human label for messages: `team_name` -> `team name`.
pub fn label(col: &str) -> String {
    col.replace('_', " ")
}

pub fn required_message(col: &str) -> String {
    format!("The {} field is required.", label(col))
}

pub fn unique_message(col: &str) -> String {
    format!("The {} has already been taken.", label(col))
}

/// Type check then rule checks. Returns the value normalised for binding (e.g. "7" -> 7 for integers).
fn validate_field(col: &ColumnInfo, v: &Value, rule: &ValidationRule) -> Result<Value, Vec<String>> {
    let name = label(&col.name);
    let normalised = match col.type_ {
        ColumnType::String | ColumnType::Text => match v {
            // PostgreSQL text cannot hold NUL.
            Value::String(s) if s.contains('\0') => {
                return Err(vec![format!("The {} field must not contain null characters.", name)])
            }
            Value::String(_) => v.clone(),
            _ => return Err(vec![format!("The {} field must be a string.", name)]),
        },
        ColumnType::Integer => match as_i32(v) {
            Some(n) => Value::from(n),
            None => return Err(vec![format!("The {} field must be an integer.", name)]),
        },
        ColumnType::Uuid => match v.as_str().map(uuid::Uuid::parse_str) {
            Some(Ok(u)) => Value::String(u.to_string()),
            _ => return Err(vec![format!("The {} field must be a valid UUID.", name)]),
        },
        ColumnType::Timestamp => match v.as_str().map(chrono::DateTime::parse_from_rfc3339) {
            Some(Ok(_)) => v.clone(),
            _ => return Err(vec![format!("The {} field must be a valid date.", name)]),
        },
    };

    let mut errors = Vec::new();
    if let Some(s) = normalised.as_str() {
        let len = s.chars().count();
        let max = match (col.type_, rule.max_length) {
            (_, Some(max)) => Some(max as usize),
            (ColumnType::String, None) => Some(STRING_MAX),
            _ => None,
        };
        if let Some(max) = max {
            if len > max {
                errors.push(format!("The {} field must not be greater than {} characters.", name, max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                errors.push(format!("The {} field must be at least {} characters.", name, min));
            }
        }
        if let Some(ref pattern) = rule.pattern {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => errors.push(format!("The {} field format is invalid.", name)),
                Err(e) => {
                    tracing::warn!(column = %col.name, error = %e, "invalid validation pattern");
                    errors.push(format!("The {} field format is invalid.", name));
                }
            }
        }
    }
    if let Some(ref format) = rule.format {
        if let Some(message) = check_format(&name, &normalised, format) {
            errors.push(message);
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(&normalised, a)) {
            errors.push(format!("The selected {} is invalid.", name));
        }
    }
    if let Some(n) = normalised.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                errors.push(format!("The {} field must be at least {}.", name, min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                errors.push(format!("The {} field must not be greater than {}.", name, max));
            }
        }
    }

    if errors.is_empty() {
        Ok(normalised)
    } else {
        Err(errors)
    }
}

/// INTEGER columns accept JSON integers and numeric strings within i32 range.
fn as_i32(v: &Value) -> Option<i32> {
    match v {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(name: &str, v: &Value, format: &str) -> Option<String> {
    let s = v.as_str()?;
    match format.to_lowercase().as_str() {
        "email" => {
            let valid = match s.split_once('@') {
                Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
                None => false,
            };
            (!valid).then(|| format!("The {} field must be a valid email address.", name))
        }
        "uuid" => uuid::Uuid::parse_str(s)
            .is_err()
            .then(|| format!("The {} field must be a valid UUID.", name)),
        _ => None,
    }
}

/// Parse a path segment (id or lookup value) as a value of the column type.
/// `None` means no row can match, so callers answer with their not-found branch.
pub fn parse_path_value(type_: ColumnType, raw: &str) -> Option<PgBindValue> {
    match type_ {
        ColumnType::Uuid => uuid::Uuid::parse_str(raw).ok().map(PgBindValue::Uuid),
        ColumnType::Integer => raw.parse::<i32>().ok().map(|n| PgBindValue::I64(n.into())),
        ColumnType::String | ColumnType::Text if raw.contains('\0') => None,
        ColumnType::String | ColumnType::Text => Some(PgBindValue::String(raw.to_string())),
        ColumnType::Timestamp => chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|_| PgBindValue::String(raw.to_string())),
    }
}
