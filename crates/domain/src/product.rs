//! Catalog products and the stock pools they own.
//!
//! A product either carries a single stock counter or a set of (color, size)
//! variants that each carry their own. The choice is made once, when the
//! product is built, and every stock lookup goes through [`StockRef`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::{ProductId, VariantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// Points at exactly one stock pool: a simple product or one of a product's variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StockRef {
    Product(ProductId),
    Variant(VariantId),
}

impl std::fmt::Display for StockRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockRef::Product(id) => write!(f, "product:{id}"),
            StockRef::Variant(id) => write!(f, "variant:{id}"),
        }
    }
}

/// A purchasable (color, size) combination with its own stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub color: String,
    pub size: String,
    pub stock: u32,
}

impl ProductVariant {
    /// Human-readable label, e.g. `"Red / M"`.
    pub fn label(&self) -> String {
        format!("{} / {}", self.color, self.size)
    }
}

/// Input for a new variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVariant {
    pub color: String,
    pub size: String,
    pub stock: u32,
}

/// Where a product keeps its stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockPolicy {
    Simple { stock: u32 },
    Varianted { variants: Vec<ProductVariant> },
}

/// Errors raised by product construction and variant resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("product name must not be empty")]
    EmptyName,

    #[error("invalid price {price}: must be positive")]
    InvalidPrice { price: Money },

    #[error("a variant product needs at least one variant")]
    NoVariants,

    #[error("duplicate variant {color}/{size}")]
    DuplicateVariant { color: String, size: String },

    #[error("product {product_id} has variants; a variant must be selected")]
    VariantRequired { product_id: ProductId },

    #[error("variant {variant_id} does not belong to product {product_id}")]
    VariantMismatch {
        product_id: ProductId,
        variant_id: VariantId,
    },
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub weight_grams: u32,
    pub policy: StockPolicy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Builds a product with a single stock counter.
    pub fn simple(
        name: impl Into<String>,
        price: Money,
        weight_grams: u32,
        stock: u32,
    ) -> Result<Self, ProductError> {
        Self::build(name.into(), price, weight_grams, StockPolicy::Simple { stock })
    }

    /// Builds a product whose stock lives on its variants.
    ///
    /// Rejects an empty variant list and repeated (color, size) pairs.
    pub fn with_variants(
        name: impl Into<String>,
        price: Money,
        weight_grams: u32,
        variants: Vec<NewVariant>,
    ) -> Result<Self, ProductError> {
        if variants.is_empty() {
            return Err(ProductError::NoVariants);
        }

        let mut seen = HashSet::new();
        let mut built = Vec::with_capacity(variants.len());
        for v in variants {
            if !seen.insert((v.color.clone(), v.size.clone())) {
                return Err(ProductError::DuplicateVariant {
                    color: v.color,
                    size: v.size,
                });
            }
            built.push(ProductVariant {
                id: VariantId::new(),
                color: v.color,
                size: v.size,
                stock: v.stock,
            });
        }

        Self::build(
            name.into(),
            price,
            weight_grams,
            StockPolicy::Varianted { variants: built },
        )
    }

    fn build(
        name: String,
        price: Money,
        weight_grams: u32,
        policy: StockPolicy,
    ) -> Result<Self, ProductError> {
        if name.trim().is_empty() {
            return Err(ProductError::EmptyName);
        }
        if !price.is_positive() {
            return Err(ProductError::InvalidPrice { price });
        }
        let now = Utc::now();
        Ok(Self {
            id: ProductId::new(),
            name,
            price,
            weight_grams,
            policy,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns true if stock is tracked per variant.
    pub fn has_variants(&self) -> bool {
        matches!(self.policy, StockPolicy::Varianted { .. })
    }

    /// Returns the product's variants (empty for simple products).
    pub fn variants(&self) -> &[ProductVariant] {
        match &self.policy {
            StockPolicy::Simple { .. } => &[],
            StockPolicy::Varianted { variants } => variants,
        }
    }

    /// Looks up one of this product's variants.
    pub fn variant(&self, id: VariantId) -> Option<&ProductVariant> {
        self.variants().iter().find(|v| v.id == id)
    }

    /// Resolves the stock pool a cart line for this product draws from.
    pub fn stock_ref(&self, variant: Option<VariantId>) -> Result<StockRef, ProductError> {
        match (&self.policy, variant) {
            (StockPolicy::Simple { .. }, None) => Ok(StockRef::Product(self.id)),
            (StockPolicy::Varianted { .. }, None) => Err(ProductError::VariantRequired {
                product_id: self.id,
            }),
            (_, Some(variant_id)) => match self.variant(variant_id) {
                Some(v) => Ok(StockRef::Variant(v.id)),
                None => Err(ProductError::VariantMismatch {
                    product_id: self.id,
                    variant_id,
                }),
            },
        }
    }

    /// Current stock of a pool owned by this product.
    pub fn stock_of(&self, pool: StockRef) -> Option<u32> {
        match (&self.policy, pool) {
            (StockPolicy::Simple { stock }, StockRef::Product(id)) if id == self.id => Some(*stock),
            (StockPolicy::Varianted { variants }, StockRef::Variant(id)) => {
                variants.iter().find(|v| v.id == id).map(|v| v.stock)
            }
            _ => None,
        }
    }

    /// Mutable access to a pool owned by this product.
    pub fn stock_mut(&mut self, pool: StockRef) -> Option<&mut u32> {
        let own_id = self.id;
        match (&mut self.policy, pool) {
            (StockPolicy::Simple { stock }, StockRef::Product(id)) if id == own_id => Some(stock),
            (StockPolicy::Varianted { variants }, StockRef::Variant(id)) => variants
                .iter_mut()
                .find(|v| v.id == id)
                .map(|v| &mut v.stock),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt() -> Product {
        Product::with_variants(
            "Shirt",
            Money::from_units(100_000),
            200,
            vec![
                NewVariant {
                    color: "Red".into(),
                    size: "M".into(),
                    stock: 5,
                },
                NewVariant {
                    color: "Red".into(),
                    size: "L".into(),
                    stock: 0,
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn simple_product_resolves_to_its_own_pool() {
        let p = Product::simple("Mug", Money::from_units(50_000), 300, 10).unwrap();
        assert!(!p.has_variants());
        assert_eq!(p.stock_ref(None).unwrap(), StockRef::Product(p.id));
        assert_eq!(p.stock_of(StockRef::Product(p.id)), Some(10));
    }

    #[test]
    fn simple_product_rejects_a_variant() {
        let p = Product::simple("Mug", Money::from_units(50_000), 300, 10).unwrap();
        let stray = VariantId::new();
        assert_eq!(
            p.stock_ref(Some(stray)),
            Err(ProductError::VariantMismatch {
                product_id: p.id,
                variant_id: stray,
            })
        );
    }

    #[test]
    fn variant_product_requires_a_variant() {
        let p = shirt();
        assert_eq!(
            p.stock_ref(None),
            Err(ProductError::VariantRequired { product_id: p.id })
        );
    }

    #[test]
    fn variant_product_resolves_owned_variant() {
        let p = shirt();
        let v = p.variants()[0].id;
        assert_eq!(p.stock_ref(Some(v)).unwrap(), StockRef::Variant(v));
        assert_eq!(p.stock_of(StockRef::Variant(v)), Some(5));
    }

    #[test]
    fn variant_from_another_product_is_a_mismatch() {
        let p = shirt();
        let other = shirt();
        let foreign = other.variants()[0].id;
        assert!(matches!(
            p.stock_ref(Some(foreign)),
            Err(ProductError::VariantMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_color_size_is_rejected() {
        let result = Product::with_variants(
            "Shirt",
            Money::from_units(1),
            1,
            vec![
                NewVariant {
                    color: "Red".into(),
                    size: "M".into(),
                    stock: 1,
                },
                NewVariant {
                    color: "Red".into(),
                    size: "M".into(),
                    stock: 2,
                },
            ],
        );
        assert!(matches!(
            result,
            Err(ProductError::DuplicateVariant { .. })
        ));
    }

    #[test]
    fn empty_variant_list_is_rejected() {
        let result = Product::with_variants("Shirt", Money::from_units(1), 1, vec![]);
        assert_eq!(result, Err(ProductError::NoVariants));
    }

    #[test]
    fn invalid_name_and_price_are_rejected() {
        assert_eq!(
            Product::simple("  ", Money::from_units(1), 1, 1),
            Err(ProductError::EmptyName)
        );
        assert!(matches!(
            Product::simple("Mug", Money::zero(), 1, 1),
            Err(ProductError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn stock_mut_only_reaches_owned_pools() {
        let mut p = shirt();
        let v = p.variants()[1].id;
        *p.stock_mut(StockRef::Variant(v)).unwrap() += 3;
        assert_eq!(p.stock_of(StockRef::Variant(v)), Some(3));
        assert!(p.stock_mut(StockRef::Product(p.id)).is_none());
    }
}
