//! Checkout engine: turns a cart into a paid order in one transaction.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{CustomerId, Money};
use domain::{DELETED_ITEM_LABEL, DomainError, Order, OrderItem, Product, StoreSettings};
use serde::Serialize;
use storage::{StorageError, Store, Transaction};
use tokio::task::JoinHandle;

use crate::error::CheckoutError;
use crate::policy;
use crate::services::ReceiptDispatcher;
use crate::whatsapp;

/// A successful checkout.
#[derive(Debug, Serialize)]
pub struct CompletedPurchase {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Receipt notice for the confirmation page.
    pub notice: Option<&'static str>,
    /// Prefilled chat with the owner, when the store enables it.
    pub whatsapp_link: Option<String>,
    /// Background receipt delivery. Awaiting it is optional.
    #[serde(skip)]
    pub receipt_delivery: JoinHandle<()>,
}

/// Runs checkouts against a [`Store`].
///
/// Steps 1 to 7 of a checkout (lock cart, lock and check products, price,
/// policy gate, write order, decrement stock, clear cart) share one
/// transaction; the receipt goes out only after commit.
#[derive(Clone)]
pub struct CheckoutEngine<S> {
    store: S,
    receipts: Arc<ReceiptDispatcher>,
}

impl<S> CheckoutEngine<S>
where
    S: Store + Clone + 'static,
{
    /// Creates a new checkout engine.
    pub fn new(store: S, receipts: ReceiptDispatcher) -> Self {
        Self {
            store,
            receipts: Arc::new(receipts),
        }
    }

    /// Buys everything in the customer's cart.
    ///
    /// On any error nothing has been written: no order, no stock change, and
    /// the cart lines are still there.
    #[tracing::instrument(skip(self))]
    pub async fn complete_purchase(
        &self,
        customer_id: CustomerId,
    ) -> Result<CompletedPurchase, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let result = self.purchase(customer_id).await;
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        let (order, items, settings) = match result {
            Ok(purchase) => purchase,
            Err(err) => {
                metrics::counter!("checkout_rejected_total", "reason" => err.reason())
                    .increment(1);
                match &err {
                    CheckoutError::Storage(_) | CheckoutError::Domain(_) => {
                        tracing::error!(error = %err, "checkout failed")
                    }
                    _ => tracing::info!(reason = err.reason(), "checkout rejected"),
                }
                return Err(err);
            }
        };

        metrics::counter!("checkout_completed_total").increment(1);
        tracing::info!(
            order_id = %order.order_id,
            total_paid = %order.total_paid,
            lines = items.len(),
            "checkout completed"
        );

        let notice = self.receipts.notice(order.receipt_channel_used);
        let whatsapp_link = whatsapp::order_link(&settings, &order, &items);
        let receipt_delivery = self.spawn_receipt(order.clone(), items.clone());

        Ok(CompletedPurchase {
            order,
            items,
            notice,
            whatsapp_link,
            receipt_delivery,
        })
    }

    async fn purchase(
        &self,
        customer_id: CustomerId,
    ) -> Result<(Order, Vec<OrderItem>, StoreSettings), CheckoutError> {
        let mut tx = self.store.begin().await?;
        match purchase_in(tx.as_mut(), customer_id).await {
            Ok(purchase) => {
                tx.commit().await?;
                Ok(purchase)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "checkout rollback failed");
                }
                Err(err)
            }
        }
    }

    fn spawn_receipt(&self, order: Order, items: Vec<OrderItem>) -> JoinHandle<()> {
        let store = self.store.clone();
        let receipts = self.receipts.clone();
        tokio::spawn(async move {
            receipts.deliver(&store, &order, &items).await;
        })
    }
}

/// The transactional part of a checkout.
async fn purchase_in(
    tx: &mut dyn Transaction,
    customer_id: CustomerId,
) -> Result<(Order, Vec<OrderItem>, StoreSettings), CheckoutError> {
    let cart = tx
        .lock_cart(customer_id)
        .await?
        .ok_or(CheckoutError::EmptyCart)?;
    // Ordered by product id, so product locks are always taken in one order
    let lines = tx.list_items(cart.id).await?;
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut reserved: Vec<(Product, u32)> = Vec::with_capacity(lines.len());
    let mut total = Money::zero();
    for line in &lines {
        let product = match tx.lock_product(line.product_id).await {
            Ok(product) => product,
            Err(StorageError::NotFound { .. }) => {
                return Err(CheckoutError::InsufficientStock {
                    product_id: line.product_id,
                    product_name: DELETED_ITEM_LABEL.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        if !product.can_supply(line.quantity()) {
            return Err(CheckoutError::InsufficientStock {
                product_id: product.id,
                product_name: product.name,
            });
        }
        total = product
            .price
            .checked_multiply(line.quantity())
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or(DomainError::AmountTooLarge)?;
        reserved.push((product, line.quantity()));
    }

    let settings = policy::or_default(tx.load_settings().await);
    if !settings.allows(cart.fulfillment_method) {
        return Err(CheckoutError::FulfillmentUnavailable {
            method: cart.fulfillment_method,
        });
    }

    let order = Order::paid(&cart, &settings, total, Utc::now());
    tx.create_order(&order).await?;

    let mut items = Vec::with_capacity(reserved.len());
    for (mut product, quantity) in reserved {
        let item = OrderItem::capture(order.id, &product, quantity)?;
        tx.create_order_item(&item).await?;
        product.reserve(quantity)?;
        tx.save_product(&product).await?;
        items.push(item);
    }

    let checked_out: Vec<_> = lines.iter().map(|line| line.id).collect();
    tx.delete_all_items(cart.id, &checked_out).await?;
    Ok((order, items, settings))
}
