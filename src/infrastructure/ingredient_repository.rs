//! SQLite persistence for harvested products and ingredients
//!
//! Write side: the `IngredientStore` implementation used by the harvest.
//! Read side: the lookups the presentation layer issues against the same
//! tables (most-used ingredients, products per ingredient and the reverse).

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::domain::{IngredientSet, IngredientStore};

/// Ingredient with the number of products that list it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientUsage {
    pub name: String,
    pub product_count: i64,
}

/// Product row with its brand, if known
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub name: String,
    pub brand: Option<String>,
}

#[derive(Clone)]
pub struct SqliteIngredientRepository {
    pool: SqlitePool,
}

impl SqliteIngredientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ===============================
    // LOOKUPS
    // ===============================

    /// Ingredients ordered by how many products use them
    pub async fn top_ingredients(&self, limit: u32) -> Result<Vec<IngredientUsage>> {
        let rows = sqlx::query(
            r#"
            SELECT i.iname AS name, COUNT(*) AS product_count
            FROM ingredient_product ip
            JOIN ingredient i ON i.iid = ip.iid
            GROUP BY ip.iid
            ORDER BY product_count DESC, name ASC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to count ingredient usage")?;

        rows.into_iter()
            .map(|row| {
                Ok(IngredientUsage {
                    name: row.try_get("name")?,
                    product_count: row.try_get("product_count")?,
                })
            })
            .collect()
    }

    /// Products listing an ingredient matching the SQL `LIKE` pattern
    pub async fn products_with_ingredient(&self, pattern: &str) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.pname
            FROM ingredient_product ip
            JOIN product p ON p.pid = ip.pid
            JOIN ingredient i ON i.iid = ip.iid
            WHERE i.iname LIKE ?
            ORDER BY p.pname
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to look up products with ingredient {:?}", pattern))?;
        Ok(names)
    }

    /// Ingredients of products whose name matches the SQL `LIKE` pattern
    pub async fn ingredients_of_product(&self, pattern: &str) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT i.iname
            FROM ingredient_product ip
            JOIN product p ON p.pid = ip.pid
            JOIN ingredient i ON i.iid = ip.iid
            WHERE p.pname LIKE ?
            ORDER BY i.iname
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to look up ingredients of {:?}", pattern))?;
        Ok(names)
    }

    /// Products whose name contains `text`
    pub async fn search_products(&self, text: &str) -> Result<Vec<ProductSummary>> {
        let rows = sqlx::query(
            "SELECT pname, brand FROM product WHERE pname LIKE '%' || ? || '%' ORDER BY pname",
        )
        .bind(text)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to search products for {:?}", text))?;

        rows.into_iter()
            .map(|row| {
                Ok(ProductSummary {
                    name: row.try_get("pname")?,
                    brand: row.try_get("brand")?,
                })
            })
            .collect()
    }

    pub async fn product_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM product")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl IngredientStore for SqliteIngredientRepository {
    async fn upsert_products(&self, names: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for name in names {
            sqlx::query("INSERT OR IGNORE INTO product (pname) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert product {:?}", name))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_ingredients(&self, names: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for name in names {
            sqlx::query("INSERT OR IGNORE INTO ingredient (iname) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert ingredient {:?}", name))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn link(&self, product_name: &str, ingredient_name: &str) -> Result<()> {
        let pid = sqlx::query_scalar::<_, i64>("SELECT pid FROM product WHERE pname = ?")
            .bind(product_name)
            .fetch_optional(&self.pool)
            .await?
            .with_context(|| format!("Unknown product {:?}", product_name))?;
        let iid = sqlx::query_scalar::<_, i64>("SELECT iid FROM ingredient WHERE iname = ?")
            .bind(ingredient_name)
            .fetch_optional(&self.pool)
            .await?
            .with_context(|| format!("Unknown ingredient {:?}", ingredient_name))?;

        sqlx::query("INSERT OR IGNORE INTO ingredient_product (pid, iid) VALUES (?, ?)")
            .bind(pid)
            .bind(iid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_brand(&self, product_name: &str, brand: &str) -> Result<()> {
        sqlx::query("UPDATE product SET brand = ? WHERE pname = ?")
            .bind(brand)
            .bind(product_name)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to set brand of {:?}", product_name))?;
        Ok(())
    }

    /// One transaction per product, so an interrupted run never leaves a half-linked product.
    async fn persist_product(&self, product_name: &str, ingredients: &IngredientSet) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO product (pname) VALUES (?)")
            .bind(product_name)
            .execute(&mut *tx)
            .await?;

        for ingredient in ingredients.iter() {
            sqlx::query("INSERT OR IGNORE INTO ingredient (iname) VALUES (?)")
                .bind(ingredient)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO ingredient_product (pid, iid)
                SELECT p.pid, i.iid FROM product p, ingredient i
                WHERE p.pname = ? AND i.iname = ?
                "#,
            )
            .bind(product_name)
            .bind(ingredient)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .with_context(|| format!("Failed to persist product {:?}", product_name))?;
        debug!("Persisted {} with {} ingredients", product_name, ingredients.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProductIngredientMap;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use tempfile::TempDir;

    async fn repository() -> Result<(TempDir, SqliteIngredientRepository)> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite:{}", dir.path().join("repo.db").display());
        let db = DatabaseConnection::new(&url).await?;
        db.migrate().await?;
        Ok((dir, SqliteIngredientRepository::new(db.pool().clone())))
    }

    fn set(names: &[&str]) -> IngredientSet {
        names.iter().collect()
    }

    fn sample() -> ProductIngredientMap {
        let mut products = ProductIngredientMap::new();
        products.insert("night-cream-P1".to_string(), set(&["Water", "Glycerin", "Retinol"]));
        products.insert("day-serum-P2".to_string(), set(&["Water", "Citric Acid"]));
        products.insert("toner-P3".to_string(), set(&["Water", "Glycerin"]));
        products
    }

    #[tokio::test]
    async fn test_persist_all_is_idempotent() -> Result<()> {
        let (_dir, repo) = repository().await?;
        repo.persist_all(&sample()).await?;
        repo.persist_all(&sample()).await?;

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingredient_product")
            .fetch_one(&repo.pool)
            .await?;
        let ingredients: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingredient")
            .fetch_one(&repo.pool)
            .await?;

        assert_eq!(repo.product_count().await?, 3);
        assert_eq!(ingredients, 4);
        assert_eq!(links, 7);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_and_link() -> Result<()> {
        let (_dir, repo) = repository().await?;
        repo.upsert_products(&["P1".to_string(), "P1".to_string()]).await?;
        repo.upsert_ingredients(&["Water".to_string()]).await?;
        repo.link("P1", "Water").await?;
        repo.link("P1", "Water").await?;

        assert_eq!(repo.ingredients_of_product("P1").await?, vec!["Water"]);
        assert!(repo.link("P1", "Mercury").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_top_ingredients() -> Result<()> {
        let (_dir, repo) = repository().await?;
        repo.persist_all(&sample()).await?;

        let top = repo.top_ingredients(2).await?;
        assert_eq!(
            top,
            vec![
                IngredientUsage { name: "Water".to_string(), product_count: 3 },
                IngredientUsage { name: "Glycerin".to_string(), product_count: 2 },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_lookups() -> Result<()> {
        let (_dir, repo) = repository().await?;
        repo.persist_all(&sample()).await?;
        repo.set_brand("night-cream-P1", "fresh").await?;

        assert_eq!(
            repo.products_with_ingredient("Glyc%").await?,
            vec!["night-cream-P1", "toner-P3"]
        );
        assert_eq!(
            repo.ingredients_of_product("day-serum%").await?,
            vec!["Citric Acid", "Water"]
        );
        assert_eq!(
            repo.search_products("cream").await?,
            vec![ProductSummary {
                name: "night-cream-P1".to_string(),
                brand: Some("fresh".to_string()),
            }]
        );
        Ok(())
    }
}
