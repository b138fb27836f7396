use crate::blizzard::{BlizzardApi, Region};
use crate::cli::Args;
use crate::config::Config;
use crate::data::DbContext;
use crate::pipeline::{ImportSettings, Importer};
use crate::utils::fmt_duration;
use anyhow::Context;
use sqlx::ConnectOptions;
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Main application struct: a migrated database pool and an authenticated API client.
pub struct App {
    config: Config,
    db: DbContext,
    api: Arc<BlizzardApi>,
}

impl App {
    /// Connect to the database, apply migrations and acquire an API token.
    ///
    /// Any failure here is fatal for the run.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let slow_threshold = Duration::from_millis(500);

        let connect_options = sqlx::postgres::PgConnectOptions::from_str(&config.database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let max_connections = config.db_max_connections.max(1);
        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(max_connections)
            .acquire_slow_threshold(slow_threshold)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(60 * 2))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            max_connections,
            acquire_slow_threshold = fmt_duration(slow_threshold),
            "database pool established"
        );

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let api = BlizzardApi::connect(&config)
            .await
            .context("Failed to acquire Battle.net API token")?;

        Ok(Self {
            config,
            db: DbContext::new(db_pool),
            api: Arc::new(api),
        })
    }

    /// Run the catalog import (unless skipped) and every requested region.
    pub async fn run(self, args: &Args) -> ExitCode {
        let start = Instant::now();
        let regions: Vec<Region> = if args.regions.is_empty() {
            self.config.regions.clone()
        } else {
            args.regions.clone()
        };

        let importer = Importer::new(
            self.db.clone(),
            self.api.clone(),
            ImportSettings {
                group_size: self.config.group_size,
                max_per_bracket: self.config.max_per_bracket,
                stale_after: self.config.stale_threshold(),
            },
        );

        if args.skip_catalog {
            info!("Catalog import skipped");
        } else {
            importer.import_catalog(&regions).await;
        }

        let summaries = importer.run(&regions).await;
        for (region, summary) in &summaries {
            info!(
                region = %region,
                lists = summary.lists,
                found = summary.entrants_found,
                enriched = summary.entrants_enriched,
                committed = summary.commit.entrants,
                "Region summary"
            );
        }
        if summaries.iter().all(|(_, s)| s.entrants_found == 0) {
            warn!("Run finished without finding any entrants");
        }

        info!(duration = fmt_duration(start.elapsed()), "Import finished");
        self.db.pool().close().await;
        ExitCode::SUCCESS
    }
}
