//! Orders: an immutable snapshot of checked-out cart lines plus payment state.
//!
//! Items are captured once by [`Order::place`] and never change afterwards.
//! Only the payment fields, the workflow status and the payment session move.

pub mod state;

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, ProductId, UserId, VariantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::CartLine;
use crate::money::{Money, MoneyError};
use crate::product::StockRef;

pub use state::{OrderStatus, PaymentOutcome, PaymentStatus};

/// Errors raised by the order model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("no cart items selected for checkout")]
    NoItemsSelected,

    #[error("product {product_id} needs a variant selected before checkout")]
    VariantSelectionRequired { product_id: ProductId },

    #[error("unknown order status: {0}")]
    UnknownStatus(String),

    #[error("unknown payment status: {0}")]
    UnknownPaymentStatus(String),

    #[error("order amount out of range: {0}")]
    Amount(#[from] MoneyError),
}

/// Hosted payment page handed back by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub token: String,
    pub redirect_url: String,
}

/// A line of an order, frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_label: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub weight_grams: u32,
    pub note: String,
    /// `unit_price × quantity`
    pub subtotal: Money,
    /// Amount charged for this line at checkout.
    pub down_payment: Money,
    /// Down payment per unit; what the gateway sees as the line price.
    pub unit_down_payment: Money,
}

impl OrderItem {
    /// Stock pool to hand back if the order fails.
    pub fn stock_ref(&self) -> StockRef {
        match self.variant_id {
            Some(id) => StockRef::Variant(id),
            None => StockRef::Product(self.product_id),
        }
    }
}

/// Result of feeding a payment outcome into an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTransition {
    Applied {
        from: PaymentStatus,
        to: PaymentStatus,
        /// The order just failed; its stock must be released.
        release_stock: bool,
    },
    /// Failure on an order that already failed. Nothing to do.
    AlreadyFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub code: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub is_paid: bool,
    /// Sum of full line subtotals.
    pub total_amount: Money,
    pub total_weight_grams: u64,
    pub payment_session: Option<PaymentSession>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Snapshots the selected cart lines into a new pending order.
    pub fn place(user_id: UserId, lines: &[&CartLine], now: DateTime<Utc>) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoItemsSelected);
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            if line.stock_ref().is_none() {
                return Err(OrderError::VariantSelectionRequired {
                    product_id: line.product_id,
                });
            }
            items.push(OrderItem {
                id: OrderItemId::new(),
                product_id: line.product_id,
                variant_id: line.variant.as_ref().map(|v| v.id),
                product_name: line.product_name.clone(),
                variant_label: line
                    .variant
                    .as_ref()
                    .map(|v| format!("{} / {}", v.color, v.size)),
                quantity: line.quantity,
                unit_price: line.unit_price,
                weight_grams: line.weight_grams,
                note: line.note.clone(),
                subtotal: line.subtotal,
                down_payment: line.down_payment,
                unit_down_payment: line.unit_down_payment,
            });
        }

        let total_amount = Money::try_sum(items.iter().map(|i| i.subtotal))?;
        // gross_amount() sums these unchecked.
        Money::try_sum(items.iter().map(|i| i.down_payment))?;
        let total_weight_grams = lines.iter().map(|l| l.total_weight_grams()).sum();

        Ok(Self {
            id: OrderId::new(),
            code: generate_code(now),
            user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            is_paid: false,
            total_amount,
            total_weight_grams,
            payment_session: None,
            items,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn attach_session(&mut self, session: PaymentSession, now: DateTime<Utc>) {
        self.payment_session = Some(session);
        self.updated_at = now;
    }

    /// Moves the payment state to match a gateway outcome.
    ///
    /// The last processed outcome wins, except that a failure on an already
    /// failed order is ignored so its stock is never released twice.
    pub fn apply_payment_outcome(
        &mut self,
        outcome: PaymentOutcome,
        now: DateTime<Utc>,
    ) -> PaymentTransition {
        let from = self.payment_status;
        let to = outcome.target();

        if outcome == PaymentOutcome::Failed && from.has_released_stock() {
            return PaymentTransition::AlreadyFailed;
        }

        self.payment_status = to;
        self.is_paid = to.counts_as_paid();
        self.updated_at = now;

        PaymentTransition::Applied {
            from,
            to,
            release_stock: outcome == PaymentOutcome::Failed,
        }
    }

    /// Admin override of the workflow status.
    pub fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    /// Amount requested from the payment gateway: the sum of line down payments.
    pub fn gross_amount(&self) -> Money {
        self.items.iter().map(|i| i.down_payment).sum()
    }

    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

/// `ORD-<YYYYMMDD>-<8 hex digits>`
pub fn generate_code(now: DateTime<Utc>) -> String {
    format!("ORD-{}-{:08X}", now.format("%Y%m%d"), rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartItem, CartLine};
    use crate::product::{NewVariant, Product};
    use common::CartId;

    fn mug_line(quantity: u32) -> CartLine {
        let mug = Product::simple("Mug", Money::from_units(10_000), 300, 10).unwrap();
        let item = CartItem::new(CartId::new(), mug.id, None, quantity, "").unwrap();
        CartLine::from_item(&item, &mug).unwrap()
    }

    fn shirt_line(with_variant: bool) -> CartLine {
        let shirt = Product::with_variants(
            "Shirt",
            Money::from_units(150_000),
            200,
            vec![NewVariant {
                color: "Red".into(),
                size: "M".into(),
                stock: 5,
            }],
        )
        .unwrap();
        let variant = with_variant.then(|| shirt.variants()[0].id);
        let item = CartItem::new(CartId::new(), shirt.id, variant, 1, "").unwrap();
        CartLine::from_item(&item, &shirt).unwrap()
    }

    fn placed() -> Order {
        let line = mug_line(3);
        Order::place(UserId::new(), &[&line], Utc::now()).unwrap()
    }

    #[test]
    fn place_snapshots_lines() {
        let mug = mug_line(3);
        let shirt = shirt_line(true);
        let order = Order::place(UserId::new(), &[&mug, &shirt], Utc::now()).unwrap();

        assert_eq!(order.items.len(), 2);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(!order.is_paid);
        assert_eq!(order.total_amount, Money::from_units(180_000));
        // 3 × 3_000 + 45_000
        assert_eq!(order.gross_amount(), Money::from_units(54_000));
        assert_eq!(order.total_weight_grams, 1_100);
        assert_eq!(order.items[1].variant_label.as_deref(), Some("Red / M"));
        assert_eq!(order.total_quantity(), 4);
    }

    #[test]
    fn place_requires_lines() {
        assert_eq!(
            Order::place(UserId::new(), &[], Utc::now()),
            Err(OrderError::NoItemsSelected)
        );
    }

    #[test]
    fn place_requires_variant_for_variant_products() {
        let line = shirt_line(false);
        assert!(matches!(
            Order::place(UserId::new(), &[&line], Utc::now()),
            Err(OrderError::VariantSelectionRequired { .. })
        ));
    }

    #[test]
    fn item_stock_ref_follows_variant() {
        let order = placed();
        let item = &order.items[0];
        assert_eq!(item.stock_ref(), StockRef::Product(item.product_id));

        let shirt = shirt_line(true);
        let order = Order::place(UserId::new(), &[&shirt], Utc::now()).unwrap();
        let v = order.items[0].variant_id.unwrap();
        assert_eq!(order.items[0].stock_ref(), StockRef::Variant(v));
    }

    #[test]
    fn paid_sets_flag() {
        let mut order = placed();
        let t = order.apply_payment_outcome(PaymentOutcome::Paid, Utc::now());
        assert_eq!(
            t,
            PaymentTransition::Applied {
                from: PaymentStatus::Pending,
                to: PaymentStatus::Paid,
                release_stock: false,
            }
        );
        assert!(order.is_paid);
    }

    #[test]
    fn challenge_then_paid() {
        let mut order = placed();
        order.apply_payment_outcome(PaymentOutcome::Challenge, Utc::now());
        assert_eq!(order.payment_status, PaymentStatus::Challenge);
        assert!(order.is_paid);
        order.apply_payment_outcome(PaymentOutcome::Paid, Utc::now());
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.is_paid);
    }

    #[test]
    fn failure_after_paid_wins_and_releases() {
        let mut order = placed();
        order.apply_payment_outcome(PaymentOutcome::Paid, Utc::now());
        let t = order.apply_payment_outcome(PaymentOutcome::Failed, Utc::now());
        assert!(matches!(
            t,
            PaymentTransition::Applied {
                release_stock: true,
                ..
            }
        ));
        assert_eq!(order.payment_status, PaymentStatus::Failure);
        assert!(!order.is_paid);
    }

    #[test]
    fn repeated_failure_is_ignored() {
        let mut order = placed();
        order.apply_payment_outcome(PaymentOutcome::Failed, Utc::now());
        let before = order.updated_at;
        let t = order.apply_payment_outcome(PaymentOutcome::Failed, Utc::now());
        assert_eq!(t, PaymentTransition::AlreadyFailed);
        assert_eq!(order.updated_at, before);
    }

    #[test]
    fn set_status_is_unconditional() {
        let mut order = placed();
        order.apply_payment_outcome(PaymentOutcome::Failed, Utc::now());
        order.set_status(OrderStatus::Shipped, Utc::now());
        assert_eq!(order.status, OrderStatus::Shipped);
    }

    #[test]
    fn code_format() {
        let now = "2024-03-05T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let code = generate_code(now);
        assert!(code.starts_with("ORD-20240305-"));
        assert_eq!(code.len(), "ORD-20240305-".len() + 8);
    }
}
