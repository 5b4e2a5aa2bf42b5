//! Cart service: per-user carts and the priced cart view.

use std::sync::Arc;
use std::time::Duration;

use common::{CartItemId, ProductId, UserId, VariantId};
use domain::{Cart, CartError, CartItem, CartLine, CartSummary, CartView};
use serde::{Deserialize, Serialize};
use store::cache::{get_json, set_json};
use store::{Cache, Store, Transaction};

use crate::error::{CommerceError, Result};
use crate::inventory::InventoryLedger;
use crate::keys;

/// Request to put a product (or one of its variants) into the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    #[serde(default)]
    pub note: String,
}

/// In-place edit of a cart line. Absent fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub quantity: u32,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    #[serde(default)]
    pub note: Option<String>,
}

pub struct CartService<S: Store> {
    store: S,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
    inventory: InventoryLedger,
}

impl<S: Store> Clone for CartService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: Arc::clone(&self.cache),
            cache_ttl: self.cache_ttl,
            inventory: self.inventory,
        }
    }
}

impl<S: Store> CartService<S> {
    pub fn new(store: S, cache: Arc<dyn Cache>, cache_ttl: Duration) -> Self {
        Self {
            store,
            cache,
            cache_ttl,
            inventory: InventoryLedger::new(),
        }
    }

    /// Adds a line to the user's cart, merging with an existing line for the
    /// same (product, variant).
    ///
    /// The cart is created on first use. Stock is checked against the merged
    /// line quantity, not just the increment.
    #[tracing::instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn add_item(&self, user_id: UserId, request: AddItem) -> Result<CartItem> {
        if request.quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity: 0 }.into());
        }

        let mut tx = self.store.begin().await?;
        let cart = tx.find_or_create_cart(user_id).await?;

        let product = tx
            .get_product(request.product_id)
            .await?
            .ok_or(CommerceError::ProductNotFound(request.product_id))?;
        let stock = product.stock_ref(request.variant_id)?;
        let available = self.inventory.check_available(&mut tx, stock).await?;

        let existing = tx
            .find_cart_line(cart.id, product.id, request.variant_id)
            .await?;
        let current = existing.as_ref().map_or(0, |item| item.quantity);
        let wanted = current.saturating_add(request.quantity);
        if wanted > available {
            return Err(CommerceError::InsufficientStock {
                stock,
                requested: wanted,
                available,
            });
        }

        let item = match existing {
            Some(mut item) => {
                item.increase(request.quantity)?;
                tx.update_cart_item(&item).await?;
                item
            }
            None => {
                let item = CartItem::new(
                    cart.id,
                    product.id,
                    request.variant_id,
                    request.quantity,
                    request.note,
                )?;
                tx.insert_cart_item(&item).await?;
                item
            }
        };
        load_summary(&mut tx, &cart).await?;
        tx.commit().await?;

        self.cache.delete(&keys::cart(user_id)).await;
        metrics::counter!("cart_items_added_total").increment(1);
        tracing::info!(%user_id, item_id = %item.id, quantity = item.quantity, "cart item added");
        Ok(item)
    }

    /// The user's cart, or the pending payment session if an order awaits payment.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView> {
        let key = keys::cart(user_id);
        if let Some(view) = get_json::<CartView>(self.cache.as_ref(), &key).await {
            return Ok(view);
        }

        let mut tx = self.store.begin().await?;
        let cart = tx
            .find_cart(user_id)
            .await?
            .ok_or(CommerceError::CartNotFound)?;

        let pending = tx
            .find_pending_payment_order(user_id)
            .await?
            .and_then(|order| order.payment_session);
        let view = match pending {
            Some(session) => CartView::PendingPayment(session),
            None => CartView::Items(load_summary(&mut tx, &cart).await?),
        };
        tx.commit().await?;

        set_json(self.cache.as_ref(), &key, &view, self.cache_ttl).await;
        Ok(view)
    }

    /// Overwrites a line in place. Stock is not re-checked here; checkout's
    /// reservation is the guard.
    #[tracing::instrument(skip(self, request))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        request: UpdateItem,
    ) -> Result<CartItem> {
        let mut tx = self.store.begin().await?;
        let cart = tx
            .find_cart(user_id)
            .await?
            .ok_or(CommerceError::CartNotFound)?;
        let mut item = tx
            .get_cart_item(cart.id, item_id)
            .await?
            .ok_or(CommerceError::CartItemNotFound(item_id))?;
        let product = tx
            .get_product(item.product_id)
            .await?
            .ok_or(CommerceError::ProductNotFound(item.product_id))?;

        let variant_id = request.variant_id.or(item.variant_id);
        product.stock_ref(variant_id)?;

        if variant_id != item.variant_id
            && let Some(other) = tx.find_cart_line(cart.id, product.id, variant_id).await?
            && other.id != item.id
        {
            return Err(CartError::DuplicateLine {
                product_id: product.id,
            }
            .into());
        }

        let note = request.note.unwrap_or_else(|| item.note.clone());
        item.overwrite(request.quantity, note, variant_id)?;
        tx.update_cart_item(&item).await?;
        // The cart must still price after the edit.
        load_summary(&mut tx, &cart).await?;
        tx.commit().await?;

        self.cache.delete(&keys::cart(user_id)).await;
        tracing::info!(%user_id, %item_id, quantity = item.quantity, "cart item updated");
        Ok(item)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, user_id: UserId, item_id: CartItemId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let cart = tx
            .find_cart(user_id)
            .await?
            .ok_or(CommerceError::CartNotFound)?;
        if tx.delete_cart_items(cart.id, &[item_id]).await? == 0 {
            return Err(CommerceError::CartItemNotFound(item_id));
        }
        tx.commit().await?;

        self.cache.delete(&keys::cart(user_id)).await;
        tracing::info!(%user_id, %item_id, "cart item removed");
        Ok(())
    }
}

/// Prices a cart's lines against the live catalog.
///
/// Lines whose product has been retired are left out.
pub(crate) async fn load_summary<T: Transaction>(tx: &mut T, cart: &Cart) -> Result<CartSummary> {
    let items = tx.list_cart_items(cart.id).await?;
    let mut lines = Vec::with_capacity(items.len());

    for item in &items {
        match tx.get_product(item.product_id).await? {
            Some(product) => lines.push(CartLine::from_item(item, &product)?),
            None => tracing::warn!(
                cart_id = %cart.id,
                item_id = %item.id,
                product_id = %item.product_id,
                "skipping cart line for deleted product"
            ),
        }
    }

    Ok(CartSummary::new(cart.id, lines)?)
}
