//! Application bootstrap: telemetry, database, migrations, module lifecycle,
//! and the HTTP server.

use anyhow::Context;
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// Registry holding every project module.
pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);
    registry
}

/// Open the configured database and bring its schema up to date.
pub async fn connect_and_migrate(
    settings: &Settings,
    registry: &ModuleRegistry,
) -> anyhow::Result<Database> {
    let db = Database::connect(&settings.database.url, settings.database.max_connections)
        .await
        .with_context(|| format!("failed to open database '{}'", settings.database.url))?;

    let applied = db
        .run_migrations(&registry.collect_migrations())
        .await
        .context("failed to run migrations")?;
    tracing::info!(applied, "database schema up to date");

    Ok(db)
}

/// Run the API server until Ctrl-C.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    bookshelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "bookshelf bootstrap starting"
    );

    let registry = registry();
    let db = connect_and_migrate(settings, &registry).await?;
    let ctx = InitCtx {
        settings,
        db: &db,
    };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;
    tracing::info!("bookshelf bootstrap complete");

    let served = bookshelf_http::start_server(&registry, &ctx, shutdown_signal()).await;

    registry.stop_all().await?;
    db.close().await;
    served
}

/// Apply pending migrations and exit.
pub async fn migrate(settings: &Settings) -> anyhow::Result<()> {
    bookshelf_telemetry::init(&settings.telemetry)?;

    let registry = registry();
    let db = connect_and_migrate(settings, &registry).await?;
    db.close().await;
    Ok(())
}

/// Apply migrations and insert the sample data regardless of `database.seed`.
pub async fn seed(settings: &Settings) -> anyhow::Result<()> {
    bookshelf_telemetry::init(&settings.telemetry)?;

    let registry = registry();
    let db = connect_and_migrate(settings, &registry).await?;
    let inserted = modules::authors::seed(&db).await?;
    tracing::info!(inserted, "seed finished");
    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
