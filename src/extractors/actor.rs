//! Request-scoped actor taken from the `X-Actor-Id` header.
//!
//! Audit columns stay caller-supplied: the actor only fills `created_by` / `updated_by`
//! when the body leaves them out.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde_json::{Map, Value};

/// Header name for the acting user or system. Default: `X-Actor-Id`.
pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Actor(pub Option<String>);

impl Actor {
    /// Set `field` from the actor unless the body already carries it (even as null).
    pub fn stamp(&self, body: &mut Map<String, Value>, field: &str) {
        if let Some(actor) = &self.0 {
            if !body.contains_key(field) {
                body.insert(field.to_string(), Value::String(actor.clone()));
            }
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(Actor(value))
    }
}
