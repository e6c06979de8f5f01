//! Conflict Query Engine
//!
//! A conflict pair is live for a product selection when both of its
//! ingredients occur somewhere in the selection, not necessarily in the same
//! product.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::{ConflictDefinition, ConflictPair, Severity};

#[derive(Clone)]
pub struct ConflictQueryEngine {
    pool: SqlitePool,
}

impl ConflictQueryEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Conflict pairs whose two ingredients both occur across `product_ids`.
    ///
    /// Ordered by severity, most severe first. An empty selection yields an
    /// empty result without touching the database.
    pub async fn conflicts_for(&self, product_ids: &BTreeSet<String>) -> Result<Vec<ConflictPair>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            WITH selected AS (
                SELECT DISTINCT ip.iid
                FROM ingredient_product ip
                JOIN product p ON p.pid = ip.pid
                WHERE p.pname IN ("#,
        );
        let mut names = builder.separated(", ");
        for product_id in product_ids {
            names.push_bind(product_id.as_str());
        }
        names.push_unseparated(
            r#")
            )
            SELECT DISTINCT a.iname AS first, b.iname AS second, c.severity, c.note
            FROM conflicts c
            JOIN selected s1 ON s1.iid = c.i1
            JOIN selected s2 ON s2.iid = c.i2
            JOIN ingredient a ON a.iid = c.i1
            JOIN ingredient b ON b.iid = c.i2
            ORDER BY c.severity DESC, first ASC, second ASC
            "#,
        );

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to query conflicts")?;

        let conflicts = rows
            .into_iter()
            .map(|row| {
                Ok(ConflictPair {
                    first: row.try_get("first")?,
                    second: row.try_get("second")?,
                    severity: Severity::try_from(row.try_get::<i64, _>("severity")?)?,
                    note: row.try_get("note")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("{} conflicts for {} products", conflicts.len(), product_ids.len());
        Ok(conflicts)
    }

    /// Load conflict reference data. Both ingredients are created if unknown;
    /// a pair already present in either orientation is left untouched.
    ///
    /// Returns the number of newly inserted pairs.
    pub async fn import_definitions(&self, definitions: &[ConflictDefinition]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for definition in definitions {
            let first = definition.ingredient_a.trim();
            let second = definition.ingredient_b.trim();
            if first.is_empty() || second.is_empty() {
                anyhow::bail!("Conflict definition with a blank ingredient name: {:?}", definition);
            }

            for name in [first, second] {
                sqlx::query("INSERT OR IGNORE INTO ingredient (iname) VALUES (?)")
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
            }

            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO conflicts (i1, i2, severity, note)
                SELECT a.iid, b.iid, ?, ?
                FROM ingredient a, ingredient b
                WHERE a.iname = ? AND b.iname = ?
                  AND NOT EXISTS (
                      SELECT 1 FROM conflicts c WHERE c.i1 = b.iid AND c.i2 = a.iid
                  )
                "#,
            )
            .bind(i64::from(definition.severity))
            .bind(&definition.note)
            .bind(first)
            .bind(second)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert conflict {} / {}", first, second))?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        info!("⚗️ Imported {} new conflict pairs ({} definitions)", inserted, definitions.len());
        Ok(inserted)
    }

    /// Read a JSON array of conflict definitions and import it.
    pub async fn import_file(&self, path: &Path) -> Result<u64> {
        let definitions = read_definitions(path).await?;
        self.import_definitions(&definitions).await
    }
}

pub async fn read_definitions(path: &Path) -> Result<Vec<ConflictDefinition>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read conflict definitions from {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid conflict definitions in {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IngredientSet, IngredientStore};
    use crate::infrastructure::{DatabaseConnection, SqliteIngredientRepository};
    use tempfile::TempDir;

    async fn setup() -> Result<(TempDir, ConflictQueryEngine, SqliteIngredientRepository)> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite:{}", dir.path().join("conflicts.db").display());
        let db = DatabaseConnection::new(&url).await?;
        db.migrate().await?;
        Ok((
            dir,
            ConflictQueryEngine::new(db.pool().clone()),
            SqliteIngredientRepository::new(db.pool().clone()),
        ))
    }

    fn definition(a: &str, b: &str, severity: i64, note: &str) -> ConflictDefinition {
        ConflictDefinition {
            ingredient_a: a.to_string(),
            ingredient_b: b.to_string(),
            severity: Severity::new(severity).unwrap(),
            note: note.to_string(),
        }
    }

    fn selection(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_selection_is_empty() -> Result<()> {
        let (_dir, engine, _repo) = setup().await?;
        assert!(engine.conflicts_for(&BTreeSet::new()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_conflicts_ordered_by_severity() -> Result<()> {
        let (_dir, engine, repo) = setup().await?;
        let ingredients: IngredientSet = ["Retinol", "Benzoyl Peroxide", "Vitamin C"].into_iter().collect();
        repo.persist_product("combo-P9", &ingredients).await?;
        engine
            .import_definitions(&[
                definition("Retinol", "Vitamin C", 2, "may irritate"),
                definition("Benzoyl Peroxide", "Retinol", 4, "deactivates retinol"),
            ])
            .await?;

        let conflicts = engine.conflicts_for(&selection(&["combo-P9"])).await?;
        let pairs: Vec<_> = conflicts
            .iter()
            .map(|c| (c.first.as_str(), c.second.as_str(), c.severity.value()))
            .collect();
        assert_eq!(
            pairs,
            vec![("Benzoyl Peroxide", "Retinol", 4), ("Retinol", "Vitamin C", 2)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_import_is_idempotent_in_both_orientations() -> Result<()> {
        let (_dir, engine, _repo) = setup().await?;
        let first = engine
            .import_definitions(&[definition("Citric Acid", "Retinol", 5, "pH clash")])
            .await?;
        let again = engine
            .import_definitions(&[
                definition("Citric Acid", "Retinol", 5, "pH clash"),
                definition("Retinol", "Citric Acid", 3, "reversed"),
            ])
            .await?;

        assert_eq!(first, 1);
        assert_eq!(again, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_definition_is_rejected() -> Result<()> {
        let (_dir, engine, _repo) = setup().await?;
        assert!(engine.import_definitions(&[definition(" ", "Retinol", 1, "")]).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_read_definitions_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("conflicts.json");
        std::fs::write(
            &path,
            r#"[{"ingredient_a": "Citric Acid", "ingredient_b": "Retinol", "severity": 5}]"#,
        )?;

        let definitions = read_definitions(&path).await?;
        assert_eq!(definitions, vec![definition("Citric Acid", "Retinol", 5, "")]);

        std::fs::write(&path, r#"[{"ingredient_a": "A", "ingredient_b": "B", "severity": 9}]"#)?;
        assert!(read_definitions(&path).await.is_err());
        Ok(())
    }
}
