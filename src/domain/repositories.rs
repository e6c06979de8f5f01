//! Repository interfaces for harvested ingredient data
//!
//! The harvest pipeline hands its results to an `IngredientStore`; the
//! SQLite implementation lives in the infrastructure layer.

use anyhow::Result;
use async_trait::async_trait;

use super::product::{IngredientSet, ProductIngredientMap};

/// Persistence adapter for products, ingredients and their join relation.
///
/// Every operation is insert-or-ignore, so re-running a harvest never
/// creates duplicate rows or relations.
#[async_trait]
pub trait IngredientStore: Send + Sync {
    async fn upsert_products(&self, names: &[String]) -> Result<()>;
    async fn upsert_ingredients(&self, names: &[String]) -> Result<()>;
    async fn link(&self, product_name: &str, ingredient_name: &str) -> Result<()>;
    async fn set_brand(&self, product_name: &str, brand: &str) -> Result<()>;

    /// Store one product and all of its ingredient links.
    async fn persist_product(&self, product_name: &str, ingredients: &IngredientSet) -> Result<()> {
        self.upsert_products(&[product_name.to_string()]).await?;
        let names = ingredients.to_vec();
        self.upsert_ingredients(&names).await?;
        for ingredient in &names {
            self.link(product_name, ingredient).await?;
        }
        Ok(())
    }

    /// Wholesale hand-off of a finished harvest.
    async fn persist_all(&self, products: &ProductIngredientMap) -> Result<()> {
        for (product_name, ingredients) in products {
            self.persist_product(product_name, ingredients).await?;
        }
        Ok(())
    }
}
