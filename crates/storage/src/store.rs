use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, CustomerId, Money, OrderId, ProductId};
use domain::{
    Cart, CartItem, CartLine, Customer, Order, OrderItem, OrderNumber, Product, PromoCode,
    StoreSettings,
};

use crate::Result;

/// Product rows.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Retrieves a product. Returns None if it doesn't exist.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists every product, newest first.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Inserts or replaces a product.
    ///
    /// Stock changes made through this method are not serialised with
    /// checkout; stock edits should go through [`Transaction::lock_product`].
    async fn save_product(&self, product: &Product) -> Result<()>;

    /// Deletes a product. Cart lines referencing it go with it; order lines
    /// keep their captured name and lose the reference.
    ///
    /// Returns true if a row was deleted.
    async fn delete_product(&self, id: ProductId) -> Result<bool>;
}

/// Carts and their lines.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the customer's cart, creating an empty one on first use.
    async fn get_or_create_cart(&self, customer_id: CustomerId) -> Result<Cart>;

    /// Returns the customer's cart without creating one.
    async fn find_cart(&self, customer_id: CustomerId) -> Result<Option<Cart>>;

    /// Persists the cart's fulfillment method and logistics note.
    async fn save_cart(&self, cart: &Cart) -> Result<()>;

    /// Lists the cart's lines ordered by product id.
    async fn list_items(&self, cart_id: CartId) -> Result<Vec<CartItem>>;

    /// Finds a line of this cart. Lines of other carts are never returned.
    async fn find_item(&self, cart_id: CartId, item_id: CartItemId) -> Result<Option<CartItem>>;

    /// Finds the line holding `product_id`, if any.
    async fn find_item_for_product(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>>;

    /// Inserts a new line.
    ///
    /// Fails with `Conflict` when the cart already holds the product.
    async fn insert_item(&self, item: &CartItem) -> Result<()>;

    /// Stores a new quantity on an existing line.
    async fn update_item_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<()>;

    /// Deletes a line. Returns true if a row was deleted.
    async fn delete_item(&self, item_id: CartItemId) -> Result<bool>;
}

/// The store settings row.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Loads the settings row, creating it with defaults if missing.
    async fn load_settings(&self) -> Result<StoreSettings>;

    /// Replaces the settings row.
    async fn save_settings(&self, settings: &StoreSettings) -> Result<()>;
}

/// Revenue and volume figures over orders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderStats {
    pub completed_count: u64,
    pub completed_total: Money,
    pub pending_count: u64,
}

/// Historical orders.
#[async_trait]
pub trait OrderArchiveStore: Send + Sync {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Finds an order by its customer-facing number, scoped to its owner.
    async fn find_customer_order(
        &self,
        customer_id: CustomerId,
        order_number: &OrderNumber,
    ) -> Result<Option<Order>>;

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// A customer's completed orders, newest first.
    async fn list_completed_orders(&self, customer_id: CustomerId) -> Result<Vec<Order>>;

    /// Most recent orders across all customers.
    async fn list_recent_orders(&self, limit: usize) -> Result<Vec<Order>>;

    /// Persists the completion flag and payment date of an order.
    async fn save_order_status(&self, order: &Order) -> Result<()>;

    /// Aggregates orders created at or after `since` (all orders if None).
    async fn order_stats(&self, since: Option<DateTime<Utc>>) -> Result<OrderStats>;

    /// Revenue of completed orders created in `[from, to)`.
    async fn completed_total_between(&self, from: DateTime<Utc>, to: DateTime<Utc>)
    -> Result<Money>;
}

/// Promo codes.
#[async_trait]
pub trait PromoStore: Send + Sync {
    /// Finds an active code, ignoring case.
    async fn find_active_promo(&self, code: &str) -> Result<Option<PromoCode>>;

    async fn save_promo(&self, promo: &PromoCode) -> Result<()>;
}

/// Customer accounts.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>>;

    async fn save_customer(&self, customer: &Customer) -> Result<()>;
}

/// An open unit of work holding row locks.
///
/// Nothing written through a transaction is visible to others until
/// [`Transaction::commit`]. Dropping an uncommitted transaction rolls it
/// back.
#[async_trait]
pub trait Transaction: Send {
    /// Locks and returns the customer's cart row.
    async fn lock_cart(&mut self, customer_id: CustomerId) -> Result<Option<Cart>>;

    /// Locks and lists the cart's lines ordered by product id. Quantity
    /// updates to these lines wait for the transaction to end.
    async fn list_items(&mut self, cart_id: CartId) -> Result<Vec<CartItem>>;

    /// Locks and returns a product row. Fails with `NotFound` if it is gone.
    async fn lock_product(&mut self, id: ProductId) -> Result<Product>;

    /// Writes a product previously locked in this transaction.
    async fn save_product(&mut self, product: &Product) -> Result<()>;

    /// Reads the settings row as seen by this transaction.
    async fn load_settings(&mut self) -> Result<StoreSettings>;

    async fn create_order(&mut self, order: &Order) -> Result<()>;

    async fn create_order_item(&mut self, item: &OrderItem) -> Result<()>;

    /// Deletes the checked-out `items` of the cart, returning how many were
    /// removed. Lines not in `items` are kept.
    async fn delete_all_items(&mut self, cart_id: CartId, items: &[CartItemId]) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// A complete storefront backend.
#[async_trait]
pub trait Store:
    CatalogStore + CartStore + SettingsStore + OrderArchiveStore + PromoStore + CustomerDirectory
{
    /// Opens a transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// Extension trait providing convenience reads.
#[async_trait]
pub trait StoreExt: CartStore + CatalogStore {
    /// Joins the cart's lines with their current product rows.
    ///
    /// Lines whose product has disappeared are skipped.
    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let items = self.list_items(cart_id).await?;
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            if let Some(product) = self.get_product(item.product_id).await? {
                lines.push(CartLine { item, product });
            }
        }
        Ok(lines)
    }
}

// Blanket implementation for every backend
impl<T: CartStore + CatalogStore + ?Sized> StoreExt for T {}
