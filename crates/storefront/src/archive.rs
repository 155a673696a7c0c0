//! Customer order history and invoices.

use common::{CustomerId, Money, ProductId};
use domain::{Order, OrderNumber};
use serde::Serialize;
use storage::Store;

use crate::error::{Result, StorefrontError};

/// Completed orders of one customer, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderHistory {
    pub orders: Vec<Order>,
    pub total_spent: Money,
}

/// One invoice row, priced as captured at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceLine {
    pub name: String,
    pub product_id: Option<ProductId>,
    pub price: Money,
    pub quantity: u32,
    pub line_total: Money,
    /// False once the owner has deleted the product.
    pub still_listed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub order: Order,
    pub lines: Vec<InvoiceLine>,
}

/// Read-only view over a customer's past orders.
#[derive(Clone)]
pub struct OrderArchive<S> {
    store: S,
}

impl<S: Store> OrderArchive<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn history(&self, customer_id: CustomerId) -> Result<OrderHistory> {
        let orders = self.store.list_completed_orders(customer_id).await?;
        let total_spent = orders.iter().map(|order| order.total_paid).sum();
        Ok(OrderHistory {
            orders,
            total_spent,
        })
    }

    /// The invoice for one of the customer's orders.
    ///
    /// Another customer's order number reads as not found.
    #[tracing::instrument(skip(self))]
    pub async fn invoice(&self, customer_id: CustomerId, order_number: &str) -> Result<Invoice> {
        let number = OrderNumber::new(order_number);
        let order = self
            .store
            .find_customer_order(customer_id, &number)
            .await?
            .ok_or_else(|| StorefrontError::OrderNotFound(order_number.to_string()))?;
        let lines = self
            .store
            .list_order_items(order.id)
            .await?
            .into_iter()
            .map(|item| -> Result<InvoiceLine> {
                Ok(InvoiceLine {
                    name: item.display_name().into_owned(),
                    product_id: item.product_id,
                    price: item.price,
                    quantity: item.quantity,
                    line_total: item.line_total()?,
                    still_listed: !item.is_product_deleted(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Invoice { order, lines })
    }
}
