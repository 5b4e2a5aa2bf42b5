//! Minimal catalog: enough to create, read and retire products.

use std::sync::Arc;

use common::ProductId;
use domain::{Money, NewVariant, Product};
use serde::{Deserialize, Serialize};
use store::{Cache, Store, Transaction};

use crate::error::{CommerceError, Result};

/// Input for a new catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub weight_grams: u32,
    /// Stock lives on the variants rather than on the product.
    #[serde(default)]
    pub has_variant: bool,
    /// Flat stock; ignored when `has_variant` is set.
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub variants: Vec<NewVariant>,
}

pub struct CatalogService<S: Store> {
    store: S,
    cache: Arc<dyn Cache>,
}

impl<S: Store> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: NewProduct) -> Result<Product> {
        let product = if input.has_variant {
            Product::with_variants(input.name, input.price, input.weight_grams, input.variants)?
        } else {
            Product::simple(input.name, input.price, input.weight_grams, input.stock)?
        };

        let mut tx = self.store.begin().await?;
        tx.insert_product(&product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, variants = product.variants().len(), "product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        let product = tx.get_product(id).await?;
        tx.commit().await?;
        product.ok_or(CommerceError::ProductNotFound(id))
    }

    /// Retires a product. Cart views that show it are dropped from the cache.
    #[tracing::instrument(skip(self))]
    pub async fn soft_delete_product(&self, id: ProductId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if !tx.soft_delete_product(id).await? {
            return Err(CommerceError::ProductNotFound(id));
        }
        tx.commit().await?;

        self.cache.delete_by_prefix("carts:").await;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}
