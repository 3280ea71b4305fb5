// Database module - provides data access layer

use std::{str::FromStr, time::Duration};

use color_eyre::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

// Re-export models for convenience
pub mod models;
pub use models::*;

pub mod migrations;

// One file per entity, each adding an `impl Db` block
mod admin;
mod answer;
mod category;
mod import;
mod mistake;
mod operation_log;
mod question;
mod settings;
mod statistics;
mod user;

pub use answer::SubmitOutcome;
pub use category::{CategoryOutcome, DeleteCategoryOutcome};
pub use mistake::AddMistakeOutcome;
pub use settings::{BasicSettings, QuizSettings, SettingsGroup};

// Main database handle
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// Offset/limit pair derived from 1-based page parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub size: i64,
}

impl Page {
    pub fn new(page: i64, size: i64) -> Self {
        Self { page, size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.size
    }
}

impl Db {
    pub async fn new(url: impl AsRef<str>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url.as_ref())?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        // Verify connection
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await?;
        color_eyre::eyre::ensure!(one == 1, "connection check failed");

        migrations::run(&pool).await?;

        tracing::info!("database connection has been verified");

        Ok(Self { pool })
    }
}

/// `%keyword%` pattern for LIKE filters.
pub(crate) fn like_pattern(keyword: &str) -> String {
    format!("%{}%", keyword.trim())
}
