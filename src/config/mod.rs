//! Entity catalog: raw JSON types, loading, validation and the resolved runtime model.

pub mod types;
pub mod loader;
pub mod validator;
pub mod resolved;

pub use types::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
