//! Bookstore application library.
//!
//! Wires the author, book and user modules into the kernel registry, applies
//! their migrations and serves them over HTTP.

pub mod modules;
pub mod utils;

use anyhow::Context;
use axum::Router;
use bookstore_db::Database;
use bookstore_kernel::{InitCtx, ModuleRegistry, Settings};

/// A bootstrapped application: store connected, migrations applied, modules
/// initialized and started.
pub struct App {
    pub settings: Settings,
    pub db: Database,
    pub registry: ModuleRegistry,
}

async fn connect(settings: &Settings) -> anyhow::Result<Database> {
    Database::connect(
        &settings.database.url,
        settings.database.max_connections,
        settings.database.operation_timeout(),
    )
    .await
    .with_context(|| format!("failed to open database '{}'", settings.database.url))
}

fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);
    registry
}

/// Apply pending migrations of every module and return how many ran.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let db = connect(settings).await?;
    let applied = db
        .run_migrations(&registry().collect_migrations())
        .await
        .context("failed to apply migrations")?;
    db.close().await;
    Ok(applied)
}

pub async fn bootstrap(settings: Settings) -> anyhow::Result<App> {
    let db = connect(&settings).await?;
    let registry = registry();

    let applied = db
        .run_migrations(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, "migrations up to date");

    let ctx = InitCtx {
        settings: &settings,
        db: &db,
    };
    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    Ok(App {
        settings,
        db,
        registry,
    })
}

impl App {
    pub async fn router(&self) -> anyhow::Result<Router> {
        bookstore_http::build_router(&self.registry, &self.settings).await
    }

    /// Serve until Ctrl-C, then stop every module and close the store.
    pub async fn serve(self) -> anyhow::Result<()> {
        let served = bookstore_http::start_server(&self.registry, &self.settings).await;
        self.shutdown().await?;
        served
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.registry.stop_all().await?;
        self.db.close().await;
        Ok(())
    }
}

/// Bootstrap and serve.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "bookstore-api bootstrap starting"
    );
    let app = bootstrap(settings).await?;
    tracing::info!("bookstore-api bootstrap complete");
    app.serve().await
}
