// Database connection and pool management
// An explicit session object: created once, handed to the repositories, closed at the end.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::infrastructure::config::DatabaseConfig;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS product (
        pid INTEGER PRIMARY KEY,
        pname TEXT NOT NULL UNIQUE,
        brand TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ingredient (
        iid INTEGER PRIMARY KEY,
        iname TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ingredient_product (
        pid INTEGER NOT NULL REFERENCES product (pid) ON DELETE CASCADE,
        iid INTEGER NOT NULL REFERENCES ingredient (iid) ON DELETE CASCADE,
        PRIMARY KEY (pid, iid)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conflicts (
        i1 INTEGER NOT NULL REFERENCES ingredient (iid) ON DELETE CASCADE,
        i2 INTEGER NOT NULL REFERENCES ingredient (iid) ON DELETE CASCADE,
        severity INTEGER NOT NULL CHECK (severity BETWEEN 1 AND 5),
        note TEXT NOT NULL DEFAULT '',
        UNIQUE (i1, i2)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ingredient_product_iid ON ingredient_product (iid)",
];

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, 5).await
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::with_max_connections(&config.url, config.max_connections).await
    }

    async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        if let Some(db_path) = database_file_path(database_url) {
            if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {:?}", parent))?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", database_url))?;

        info!("🗄️ Connected to {}", database_url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the product, ingredient, join and conflict tables if absent.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema")?;
        }
        debug!("Schema up to date");
        Ok(())
    }

    /// Wait for in-flight queries and release every connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// File path behind a `sqlite:` URL; `None` for in-memory databases.
fn database_file_path(database_url: &str) -> Option<&Path> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = path.split('?').next().unwrap_or(path);

    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(Path::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_file_path() {
        assert_eq!(
            database_file_path("sqlite:/tmp/a/ingredients.sqlite3"),
            Some(Path::new("/tmp/a/ingredients.sqlite3"))
        );
        assert_eq!(
            database_file_path("sqlite:///tmp/b.db?mode=rwc"),
            Some(Path::new("/tmp/b.db"))
        );
        assert_eq!(database_file_path("sqlite::memory:"), None);
    }

    #[tokio::test]
    async fn test_database_connection_creates_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");
        let database_url = format!("sqlite:{}", db_path.display());

        let db = DatabaseConnection::new(&database_url).await?;
        assert!(!db.pool().is_closed());
        assert!(db_path.exists());

        db.close().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_database_migration_is_repeatable() -> Result<()> {
        let temp_dir = tempdir()?;
        let database_url = format!("sqlite:{}", temp_dir.path().join("migrate.db").display());

        let db = DatabaseConnection::new(&database_url).await?;
        db.migrate().await?;
        db.migrate().await?;

        for table in ["product", "ingredient", "ingredient_product", "conflicts"] {
            let found = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
                .bind(table)
                .fetch_optional(db.pool())
                .await?;
            assert!(found.is_some(), "missing table {table}");
        }
        Ok(())
    }
}
