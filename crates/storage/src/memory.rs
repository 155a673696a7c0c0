use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, CustomerId, Money, OrderId, ProductId};
use domain::{
    Cart, CartItem, Customer, Order, OrderItem, OrderNumber, Product, PromoCode, StoreSettings,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StorageError,
    store::{
        CartStore, CatalogStore, CustomerDirectory, OrderArchiveStore, OrderStats, PromoStore,
        SettingsStore, Store, Transaction,
    },
};

/// Every row held by the in-memory backend.
///
/// Comparable so tests can assert that a failed operation left the whole
/// store untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub products: BTreeMap<ProductId, Product>,
    pub customers: HashMap<CustomerId, Customer>,
    /// Keyed by owning customer.
    pub carts: HashMap<CustomerId, Cart>,
    pub cart_items: BTreeMap<CartItemId, CartItem>,
    pub settings: Option<StoreSettings>,
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
    pub promos: Vec<PromoCode>,
}

impl MemoryState {
    fn items_of(&self, cart_id: CartId) -> Vec<CartItem> {
        let mut items: Vec<_> = self
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.product_id);
        items
    }

    fn settings_or_default(&mut self) -> StoreSettings {
        self.settings.get_or_insert_with(StoreSettings::default).clone()
    }
}

#[derive(Debug, Default)]
struct Faults {
    settings: AtomicBool,
    commit: AtomicBool,
    order_items: AtomicBool,
}

impl Faults {
    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("{what} failed (injected)")));
        }
        Ok(())
    }
}

/// In-memory storefront backend for tests and database-less runs.
///
/// All access goes through one async mutex. A transaction holds that mutex
/// for its whole lifetime and writes to a staged copy of the state, which
/// replaces the live state only on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every row.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn order_item_count(&self) -> usize {
        self.state.lock().await.order_items.len()
    }

    /// Makes every settings read fail, as an unmigrated schema would.
    pub fn set_fail_settings(&self, fail: bool) {
        self.faults.settings.store(fail, Ordering::SeqCst);
    }

    /// Makes every transaction commit fail.
    pub fn set_fail_commit(&self, fail: bool) {
        self.faults.commit.store(fail, Ordering::SeqCst);
    }

    /// Makes every order line insert fail, after the order row is written.
    pub fn set_fail_order_items(&self, fail: bool) {
        self.faults.order_items.store(fail, Ordering::SeqCst);
    }

    /// Clears all rows. Fault flags are left as they are.
    pub async fn clear(&self) {
        *self.state.lock().await = MemoryState::default();
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let state = self.state.lock().await;
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        self.state
            .lock()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.products.remove(&id).is_none() {
            return Ok(false);
        }
        state.cart_items.retain(|_, item| item.product_id != id);
        for item in state
            .order_items
            .iter_mut()
            .filter(|item| item.product_id == Some(id))
        {
            item.product_id = None;
        }
        Ok(true)
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_or_create_cart(&self, customer_id: CustomerId) -> Result<Cart> {
        let mut state = self.state.lock().await;
        Ok(state
            .carts
            .entry(customer_id)
            .or_insert_with(|| Cart::new(customer_id))
            .clone())
    }

    async fn find_cart(&self, customer_id: CustomerId) -> Result<Option<Cart>> {
        Ok(self.state.lock().await.carts.get(&customer_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.state
            .lock()
            .await
            .carts
            .insert(cart.customer_id, cart.clone());
        Ok(())
    }

    async fn list_items(&self, cart_id: CartId) -> Result<Vec<CartItem>> {
        Ok(self.state.lock().await.items_of(cart_id))
    }

    async fn find_item(&self, cart_id: CartId, item_id: CartItemId) -> Result<Option<CartItem>> {
        let state = self.state.lock().await;
        Ok(state
            .cart_items
            .get(&item_id)
            .filter(|item| item.cart_id == cart_id)
            .cloned())
    }

    async fn find_item_for_product(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>> {
        let state = self.state.lock().await;
        Ok(state
            .cart_items
            .values()
            .find(|item| item.cart_id == cart_id && item.product_id == product_id)
            .cloned())
    }

    async fn insert_item(&self, item: &CartItem) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&item.product_id) {
            return Err(StorageError::not_found("product", item.product_id));
        }
        let duplicate = state
            .cart_items
            .values()
            .any(|existing| existing.cart_id == item.cart_id && existing.product_id == item.product_id);
        if duplicate {
            return Err(StorageError::Conflict(format!(
                "cart {} already holds product {}",
                item.cart_id, item.product_id
            )));
        }
        state.cart_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_item_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        let item = state
            .cart_items
            .remove(&item_id)
            .ok_or_else(|| StorageError::not_found("cart item", item_id))?;
        match item.clone().with_quantity(quantity) {
            Ok(updated) => {
                state.cart_items.insert(item_id, updated);
                Ok(())
            }
            Err(err) => {
                state.cart_items.insert(item_id, item);
                Err(err.into())
            }
        }
    }

    async fn delete_item(&self, item_id: CartItemId) -> Result<bool> {
        Ok(self.state.lock().await.cart_items.remove(&item_id).is_some())
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn load_settings(&self) -> Result<StoreSettings> {
        Faults::check(&self.faults.settings, "settings read")?;
        Ok(self.state.lock().await.settings_or_default())
    }

    async fn save_settings(&self, settings: &StoreSettings) -> Result<()> {
        self.state.lock().await.settings = Some(settings.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderArchiveStore for InMemoryStore {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|order| order.id == id).cloned())
    }

    async fn find_customer_order(
        &self,
        customer_id: CustomerId,
        order_number: &OrderNumber,
    ) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .find(|order| order.customer_id == customer_id && &order.order_id == order_number)
            .cloned())
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let state = self.state.lock().await;
        Ok(state
            .order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_completed_orders(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<_> = state
            .orders
            .iter()
            .filter(|order| order.customer_id == customer_id && order.is_completed)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_recent_orders(&self, limit: usize) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders = state.orders.clone();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit);
        Ok(orders)
    }

    async fn save_order_status(&self, order: &Order) -> Result<()> {
        let mut state = self.state.lock().await;
        let stored = state
            .orders
            .iter_mut()
            .find(|stored| stored.id == order.id)
            .ok_or_else(|| StorageError::not_found("order", order.id))?;
        stored.is_completed = order.is_completed;
        stored.payment_date = order.payment_date;
        Ok(())
    }

    async fn order_stats(&self, since: Option<DateTime<Utc>>) -> Result<OrderStats> {
        let state = self.state.lock().await;
        let mut stats = OrderStats::default();
        for order in state
            .orders
            .iter()
            .filter(|order| since.is_none_or(|since| order.created_at >= since))
        {
            if order.is_completed {
                stats.completed_count += 1;
                stats.completed_total += order.total_paid;
            } else {
                stats.pending_count += 1;
            }
        }
        Ok(stats)
    }

    async fn completed_total_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Money> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .filter(|order| order.is_completed && order.created_at >= from && order.created_at < to)
            .map(|order| order.total_paid)
            .sum())
    }
}

#[async_trait]
impl PromoStore for InMemoryStore {
    async fn find_active_promo(&self, code: &str) -> Result<Option<PromoCode>> {
        let state = self.state.lock().await;
        Ok(state
            .promos
            .iter()
            .find(|promo| promo.is_active && promo.matches(code))
            .cloned())
    }

    async fn save_promo(&self, promo: &PromoCode) -> Result<()> {
        let mut state = self.state.lock().await;
        match state
            .promos
            .iter_mut()
            .find(|existing| existing.matches(&promo.code))
        {
            Some(existing) => *existing = promo.clone(),
            None => state.promos.push(promo.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.state.lock().await.customers.get(&id).cloned())
    }

    async fn save_customer(&self, customer: &Customer) -> Result<()> {
        self.state
            .lock()
            .await
            .customers
            .insert(customer.id, customer.clone());
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            staged,
            faults: self.faults.clone(),
        }))
    }
}

/// A transaction over [`InMemoryStore`].
///
/// Holds the store mutex until it is committed, rolled back or dropped.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    faults: Arc<Faults>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn lock_cart(&mut self, customer_id: CustomerId) -> Result<Option<Cart>> {
        Ok(self.staged.carts.get(&customer_id).cloned())
    }

    async fn list_items(&mut self, cart_id: CartId) -> Result<Vec<CartItem>> {
        Ok(self.staged.items_of(cart_id))
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Product> {
        self.staged
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("product", id))
    }

    async fn save_product(&mut self, product: &Product) -> Result<()> {
        self.staged.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn load_settings(&mut self) -> Result<StoreSettings> {
        Faults::check(&self.faults.settings, "settings read")?;
        Ok(self.staged.settings_or_default())
    }

    async fn create_order(&mut self, order: &Order) -> Result<()> {
        if self
            .staged
            .orders
            .iter()
            .any(|existing| existing.order_id == order.order_id)
        {
            return Err(StorageError::Conflict(format!(
                "order number {} already taken",
                order.order_id
            )));
        }
        self.staged.orders.push(order.clone());
        Ok(())
    }

    async fn create_order_item(&mut self, item: &OrderItem) -> Result<()> {
        Faults::check(&self.faults.order_items, "order item insert")?;
        self.staged.order_items.push(item.clone());
        Ok(())
    }

    async fn delete_all_items(&mut self, cart_id: CartId, items: &[CartItemId]) -> Result<u64> {
        let before = self.staged.cart_items.len();
        self.staged
            .cart_items
            .retain(|id, item| item.cart_id != cart_id || !items.contains(id));
        Ok((before - self.staged.cart_items.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        Faults::check(&self.faults.commit, "commit")?;
        let MemoryTransaction {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
