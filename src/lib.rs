//! readlog application library
//!
//! Reading records, their HTTP handlers and the wiring that turns settings
//! into a running service.

#![recursion_limit = "256"]

pub mod modules;
pub mod utils;

use anyhow::Context;
use readlog_db::Database;
use readlog_kernel::{settings::Settings, ModuleRegistry};

/// Everything a running service needs, assembled from settings.
pub struct App {
    pub db: Database,
    pub registry: ModuleRegistry,
}

impl App {
    /// Register every module on top of `db` and apply pending migrations.
    pub async fn assemble(db: Database, settings: &Settings) -> anyhow::Result<Self> {
        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, &db, settings);

        let applied = db
            .apply_migrations(&registry.collect_migrations())
            .await
            .context("failed to apply migrations")?;
        tracing::info!(applied, "schema up to date");

        Ok(Self { db, registry })
    }

    /// Open the configured database file and assemble on top of it.
    pub async fn open(settings: &Settings) -> anyhow::Result<Self> {
        let db = Database::open(&settings.database)
            .await
            .context("failed to open database")?;
        Self::assemble(db, settings).await
    }
}
