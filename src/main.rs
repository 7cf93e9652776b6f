//! Server binary: reads settings, prepares the database, serves the catalog's entities under /api.

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tournament_api::{
    app, builtin_catalog, ensure_database_exists, ensure_tables, load_catalog_file, resolve, AppState, Settings,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tournament_api=info,tower_http=info")),
        )
        .init();

    let mut catalog = match &settings.catalog_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading entity catalog");
            load_catalog_file(path).await?
        }
        None => builtin_catalog()?,
    };
    catalog.schema = settings.database_schema.clone();
    let model = resolve(&catalog)?;

    ensure_database_exists(&settings.database_url).await?;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;
    ensure_tables(&pool, &model).await?;

    let resources: Vec<&str> = model.entities.iter().map(|e| e.path_segment.as_str()).collect();
    tracing::info!(resources = ?resources, "entity routes mounted under /api");

    let router = app(AppState::new(pool, model), settings.body_limit_bytes);
    let listener = TcpListener::bind(settings.bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
