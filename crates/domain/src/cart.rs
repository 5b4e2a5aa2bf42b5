//! Shopping carts and the derived cart view.

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, ProductId, UserId, VariantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{Money, MoneyError};
use crate::order::PaymentSession;
use crate::product::{Product, StockRef};

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = i32::MAX as u32;

/// Share of the unit price charged up front at checkout.
pub const DOWN_PAYMENT_PERCENT: u32 = 30;

/// Down payment owed for one unit at `unit_price`.
pub fn down_payment(unit_price: Money) -> Money {
    unit_price.percent(DOWN_PAYMENT_PERCENT)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("invalid quantity {quantity}: must be at least 1")]
    InvalidQuantity { quantity: u32 },

    #[error("invalid quantity {quantity}: must be at most {max}")]
    QuantityTooLarge { quantity: u32, max: u32 },

    #[error("cart amount out of range: {0}")]
    Amount(#[from] MoneyError),

    #[error("cart already has a line for product {product_id}")]
    DuplicateLine { product_id: ProductId },

    #[error("unknown cart status: {0}")]
    UnknownStatus(String),
}

/// Lifecycle of a cart. Only `Active` carts are used by the pipeline today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    #[default]
    Active,
    Checkout,
    Abandoned,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Active => "active",
            CartStatus::Checkout => "checkout",
            CartStatus::Abandoned => "abandoned",
        }
    }
}

impl std::str::FromStr for CartStatus {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CartStatus::Active),
            "checkout" => Ok(CartStatus::Checkout),
            "abandoned" => Ok(CartStatus::Abandoned),
            other => Err(CartError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for CartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's cart. At most one exists per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub status: CartStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Opens a fresh active cart for a user.
    pub fn open(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(),
            user_id,
            status: CartStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One (product, variant) line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(
        cart_id: CartId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
        note: impl Into<String>,
    ) -> Result<Self, CartError> {
        ensure_quantity(quantity)?;
        let now = Utc::now();
        Ok(Self {
            id: CartItemId::new(),
            cart_id,
            product_id,
            variant_id,
            quantity,
            note: note.into(),
            created_at: now,
            updated_at: now,
        })
    }

    /// True if this line holds the given (product, variant) pair.
    pub fn matches(&self, product_id: ProductId, variant_id: Option<VariantId>) -> bool {
        self.product_id == product_id && self.variant_id == variant_id
    }

    /// Adds to the quantity of an existing line.
    pub fn increase(&mut self, by: u32) -> Result<(), CartError> {
        ensure_quantity(by)?;
        let quantity = self
            .quantity
            .checked_add(by)
            .ok_or(CartError::QuantityTooLarge {
                quantity: u32::MAX,
                max: MAX_LINE_QUANTITY,
            })?;
        ensure_quantity(quantity)?;
        self.quantity = quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Overwrites quantity, note and variant in place.
    pub fn overwrite(
        &mut self,
        quantity: u32,
        note: impl Into<String>,
        variant_id: Option<VariantId>,
    ) -> Result<(), CartError> {
        ensure_quantity(quantity)?;
        self.quantity = quantity;
        self.note = note.into();
        self.variant_id = variant_id;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn ensure_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 {
        return Err(CartError::InvalidQuantity { quantity });
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(CartError::QuantityTooLarge {
            quantity,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// The variant a line refers to, denormalised for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineVariant {
    pub id: VariantId,
    pub color: String,
    pub size: String,
}

/// A cart line joined with its product, priced at current catalog prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub variant: Option<LineVariant>,
    /// The product tracks stock per variant.
    pub requires_variant: bool,
    pub quantity: u32,
    pub unit_price: Money,
    pub weight_grams: u32,
    pub note: String,
    /// `unit_price × quantity`
    pub subtotal: Money,
    /// Down payment for a single unit.
    pub unit_down_payment: Money,
    /// `unit_down_payment × quantity`
    pub down_payment: Money,
}

impl CartLine {
    /// Joins a cart item with its product. A variant id the product no longer
    /// knows is dropped, leaving the line without a usable variant.
    ///
    /// Fails when the line amounts do not fit in [`Money`].
    pub fn from_item(item: &CartItem, product: &Product) -> Result<Self, CartError> {
        let variant = item
            .variant_id
            .and_then(|id| product.variant(id))
            .map(|v| LineVariant {
                id: v.id,
                color: v.color.clone(),
                size: v.size.clone(),
            });
        let unit_down_payment = down_payment(product.price);

        Ok(Self {
            item_id: item.id,
            product_id: product.id,
            product_name: product.name.clone(),
            variant,
            requires_variant: product.has_variants(),
            quantity: item.quantity,
            unit_price: product.price,
            weight_grams: product.weight_grams,
            note: item.note.clone(),
            subtotal: product.price.multiply(item.quantity)?,
            unit_down_payment,
            down_payment: unit_down_payment.multiply(item.quantity)?,
        })
    }

    /// Stock pool this line draws from, or `None` when a variant product has no variant selected.
    pub fn stock_ref(&self) -> Option<StockRef> {
        match (&self.variant, self.requires_variant) {
            (Some(v), _) => Some(StockRef::Variant(v.id)),
            (None, false) => Some(StockRef::Product(self.product_id)),
            (None, true) => None,
        }
    }

    pub fn total_weight_grams(&self) -> u64 {
        self.weight_grams as u64 * self.quantity as u64
    }
}

/// The priced contents of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub cart_id: CartId,
    pub lines: Vec<CartLine>,
    pub total_amount: Money,
    pub total_weight_grams: u64,
    /// Sum of line down payments.
    pub total_paid: Money,
}

impl CartSummary {
    pub fn new(cart_id: CartId, lines: Vec<CartLine>) -> Result<Self, CartError> {
        let total_amount = Money::try_sum(lines.iter().map(|l| l.subtotal))?;
        let total_weight_grams = lines.iter().map(CartLine::total_weight_grams).sum();
        let total_paid = Money::try_sum(lines.iter().map(|l| l.down_payment))?;
        Ok(Self {
            cart_id,
            lines,
            total_amount,
            total_weight_grams,
            total_paid,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines picked for checkout: all of them when `selected` is `None`,
    /// otherwise those whose item id is listed.
    pub fn select(&self, selected: Option<&[CartItemId]>) -> Vec<&CartLine> {
        match selected {
            None => self.lines.iter().collect(),
            Some(ids) => self
                .lines
                .iter()
                .filter(|l| ids.contains(&l.item_id))
                .collect(),
        }
    }
}

/// What `GET /carts` returns.
///
/// While the user has an order awaiting payment, the cart is hidden behind
/// that order's payment session so the client can resume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CartView {
    PendingPayment(PaymentSession),
    Items(CartSummary),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::NewVariant;

    fn mug() -> Product {
        Product::simple("Mug", Money::from_units(10_000), 300, 10).unwrap()
    }

    fn shirt() -> Product {
        Product::with_variants(
            "Shirt",
            Money::from_units(150_000),
            200,
            vec![NewVariant {
                color: "Blue".into(),
                size: "L".into(),
                stock: 5,
            }],
        )
        .unwrap()
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = CartItem::new(CartId::new(), ProductId::new(), None, 0, "").unwrap_err();
        assert_eq!(err, CartError::InvalidQuantity { quantity: 0 });
    }

    #[test]
    fn oversized_quantity_is_rejected() {
        let too_many = MAX_LINE_QUANTITY + 1;
        let err = CartItem::new(CartId::new(), ProductId::new(), None, too_many, "").unwrap_err();
        assert_eq!(
            err,
            CartError::QuantityTooLarge {
                quantity: too_many,
                max: MAX_LINE_QUANTITY,
            }
        );

        let mut item = CartItem::new(CartId::new(), ProductId::new(), None, 1, "").unwrap();
        assert!(item.overwrite(u32::MAX, "", None).is_err());
        assert!(item.increase(MAX_LINE_QUANTITY).is_err());
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn line_amount_overflow_is_an_error() {
        let pricey = Product::simple("Gold Bar", Money::from_units(50_000_000), 1_000, 5).unwrap();
        let item = CartItem::new(CartId::new(), pricey.id, None, 2_000_000_000, "").unwrap();
        assert!(matches!(
            CartLine::from_item(&item, &pricey),
            Err(CartError::Amount(MoneyError::OutOfRange(_)))
        ));
    }

    #[test]
    fn summary_total_overflow_is_an_error() {
        let cart_id = CartId::new();
        let pricey = Product::simple("Gold Bar", Money::from_units(50_000_000), 1_000, 5).unwrap();
        let big = CartItem::new(cart_id, pricey.id, None, 1_500_000_000, "").unwrap();
        let line = CartLine::from_item(&big, &pricey).unwrap();
        assert!(CartSummary::new(cart_id, vec![line.clone(), line]).is_err());
    }

    #[test]
    fn increase_merges_quantities() {
        let mut item = CartItem::new(CartId::new(), ProductId::new(), None, 1, "").unwrap();
        item.increase(2).unwrap();
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn overwrite_replaces_fields() {
        let mut item = CartItem::new(CartId::new(), ProductId::new(), None, 4, "old").unwrap();
        let v = VariantId::new();
        item.overwrite(2, "new", Some(v)).unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(item.note, "new");
        assert_eq!(item.variant_id, Some(v));
        assert!(item.overwrite(0, "", None).is_err());
    }

    #[test]
    fn line_prices_down_payment_per_unit() {
        let product = shirt();
        let variant = product.variants()[0].id;
        let item = CartItem::new(CartId::new(), product.id, Some(variant), 3, "gift").unwrap();
        let line = CartLine::from_item(&item, &product).unwrap();

        assert_eq!(line.subtotal, Money::from_units(450_000));
        assert_eq!(line.unit_down_payment, Money::from_units(45_000));
        assert_eq!(line.down_payment, Money::from_units(135_000));
        assert_eq!(line.stock_ref(), Some(StockRef::Variant(variant)));
        assert_eq!(line.variant.as_ref().unwrap().color, "Blue");
    }

    #[test]
    fn variant_line_without_variant_has_no_stock_ref() {
        let product = shirt();
        let item = CartItem::new(CartId::new(), product.id, None, 1, "").unwrap();
        let line = CartLine::from_item(&item, &product).unwrap();
        assert!(line.requires_variant);
        assert_eq!(line.stock_ref(), None);
    }

    #[test]
    fn summary_totals() {
        let cart_id = CartId::new();
        let mug = mug();
        let shirt = shirt();
        let lines = vec![
            CartLine::from_item(
                &CartItem::new(cart_id, mug.id, None, 2, "").unwrap(),
                &mug,
            )
            .unwrap(),
            CartLine::from_item(
                &CartItem::new(cart_id, shirt.id, Some(shirt.variants()[0].id), 1, "").unwrap(),
                &shirt,
            )
            .unwrap(),
        ];
        let summary = CartSummary::new(cart_id, lines).unwrap();

        assert_eq!(summary.total_amount, Money::from_units(170_000));
        assert_eq!(summary.total_weight_grams, 800);
        assert_eq!(summary.total_paid, Money::from_units(51_000));
    }

    #[test]
    fn select_filters_by_item_id() {
        let cart_id = CartId::new();
        let mug = mug();
        let a = CartItem::new(cart_id, mug.id, None, 1, "").unwrap();
        let summary =
            CartSummary::new(cart_id, vec![CartLine::from_item(&a, &mug).unwrap()]).unwrap();

        assert_eq!(summary.select(None).len(), 1);
        assert_eq!(summary.select(Some([a.id].as_slice())).len(), 1);
        assert!(summary.select(Some([CartItemId::new()].as_slice())).is_empty());
        assert!(summary.select(Some(&[][..])).is_empty());
    }

    #[test]
    fn cart_view_serializes_with_state_tag() {
        let view = CartView::PendingPayment(PaymentSession {
            token: "tok".into(),
            redirect_url: "https://pay.example/tok".into(),
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], "pending_payment");
        assert_eq!(json["token"], "tok");
        let back: CartView = serde_json::from_value(json).unwrap();
        assert_eq!(back, view);
    }
}
