//! Inventory ledger: the only code that changes stock.

use domain::StockRef;
use store::{StockChange, Transaction};

use crate::error::{CommerceError, Result};

/// Stock operations run inside the caller's transaction.
///
/// Reservations are atomic conditional decrements, so two transactions racing
/// for the last units cannot both succeed.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    pub fn new() -> Self {
        Self
    }

    /// Returns the available quantity of a pool.
    ///
    /// Fails with `StockNotFound` for a missing or soft-deleted pool and with
    /// `OutOfStock` when it holds nothing.
    pub async fn check_available<T: Transaction>(&self, tx: &mut T, stock: StockRef) -> Result<u32> {
        match tx.stock_level(stock).await? {
            None => Err(CommerceError::StockNotFound(stock)),
            Some(0) => Err(CommerceError::OutOfStock(stock)),
            Some(available) => Ok(available),
        }
    }

    /// Takes `quantity` units out of a pool. Returns what is left.
    pub async fn reserve<T: Transaction>(
        &self,
        tx: &mut T,
        stock: StockRef,
        quantity: u32,
    ) -> Result<u32> {
        match tx.decrement_stock(stock, quantity).await? {
            StockChange::Applied { remaining } => {
                metrics::counter!("inventory_reserved_units_total").increment(quantity as u64);
                tracing::debug!(%stock, quantity, remaining, "stock reserved");
                Ok(remaining)
            }
            StockChange::Insufficient { available } => Err(CommerceError::InsufficientStock {
                stock,
                requested: quantity,
                available,
            }),
            StockChange::Missing => Err(CommerceError::StockNotFound(stock)),
        }
    }

    /// Puts `quantity` units back into a pool. Returns the new level.
    ///
    /// There is no upper bound; callers guard against releasing twice.
    pub async fn release<T: Transaction>(
        &self,
        tx: &mut T,
        stock: StockRef,
        quantity: u32,
    ) -> Result<u32> {
        let level = tx
            .increment_stock(stock, quantity)
            .await?
            .ok_or(CommerceError::StockNotFound(stock))?;
        metrics::counter!("inventory_released_units_total").increment(quantity as u64);
        tracing::debug!(%stock, quantity, level, "stock released");
        Ok(level)
    }
}
