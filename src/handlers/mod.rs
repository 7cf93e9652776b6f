//! HTTP handlers for entity CRUD and secondary-key lookups.

pub mod entity;
pub use entity::*;
