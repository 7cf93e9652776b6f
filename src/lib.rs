//! Tournament API: catalog-driven REST backend for racing tournaments on PostgreSQL.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{builtin_catalog, load_catalog_file, resolve, CatalogConfig, ResolvedEntity, ResolvedModel};
pub use error::{AppError, ConfigError, FieldErrors};
pub use routes::{app, common_routes, common_routes_with_ready, entity_routes};
pub use service::CrudService;
pub use settings::Settings;
pub use state::AppState;
pub use store::{ensure_database_exists, ensure_tables};
