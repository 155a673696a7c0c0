//! Cart mutations and the cart page.

use common::{CartItemId, CustomerId, Money, ProductId};
use domain::{Cart, CartItem, FulfillmentMethod, LineChange, PromoCode, total_of};
use serde::Serialize;
use storage::{StorageError, Store, StoreExt};

use crate::error::{Result, StorefrontError};
use crate::policy::StorePolicy;

/// Shown when a coupon code matches no active promo.
pub const INVALID_COUPON: &str = "Invalid Coupon Code";

/// What a cart mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CartOutcome {
    /// A new line was created with one unit.
    Added { item_id: CartItemId },
    /// The line now holds `quantity` units.
    Updated { item_id: CartItemId, quantity: u32 },
    /// The line is gone.
    Removed { item_id: CartItemId },
    /// Nothing changed: the line already holds all `available` units.
    StockLimit { item_id: CartItemId, available: u32 },
    /// The line did not exist; nothing to do.
    NoOp,
}

/// One row of the cart page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    pub in_stock: u32,
}

/// The cart page: lines at current prices plus an optional coupon quote.
///
/// The discount is a quote only; checkout charges `total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub cart: Cart,
    pub lines: Vec<CartLineView>,
    pub total: Money,
    pub discount: Money,
    pub grand_total: Money,
    pub applied_coupon: Option<String>,
    pub coupon_error: Option<&'static str>,
    pub fulfillment_options: Vec<FulfillmentMethod>,
    pub pre_purchase_instruction: String,
}

/// Add / increment / decrement / remove, plus fulfillment selection.
///
/// Each mutation is a small independent write that reads the product's
/// current stock at the moment it runs.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
    policy: StorePolicy<S>,
}

impl<S> CartService<S>
where
    S: Store + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            policy: StorePolicy::new(store.clone()),
            store,
        }
    }

    /// Puts one unit of a product in the cart, or one more if it is
    /// already there.
    #[tracing::instrument(skip(self))]
    pub async fn add(&self, customer_id: CustomerId, product_id: ProductId) -> Result<CartOutcome> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(StorefrontError::ProductNotFound(product_id))?;
        if !product.is_available() || product.is_out_of_stock() {
            return Err(StorefrontError::OutOfStock {
                product_id,
                name: product.name,
            });
        }

        let cart = self.store.get_or_create_cart(customer_id).await?;
        if self
            .store
            .find_item_for_product(cart.id, product_id)
            .await?
            .is_none()
        {
            let item = CartItem::new(cart.id, product_id);
            match self.store.insert_item(&item).await {
                Ok(()) => {
                    record("add");
                    return Ok(CartOutcome::Added { item_id: item.id });
                }
                // A concurrent add created the line first; treat as an increment
                Err(StorageError::Conflict(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }

        let Some(item) = self.store.find_item_for_product(cart.id, product_id).await? else {
            return Ok(CartOutcome::NoOp);
        };
        let change = item.increment(&product);
        self.apply(&item, change, "add").await
    }

    /// One more unit of an existing line, up to the product's stock.
    #[tracing::instrument(skip(self))]
    pub async fn increment(
        &self,
        customer_id: CustomerId,
        item_id: CartItemId,
    ) -> Result<CartOutcome> {
        let Some(item) = self.find_line(customer_id, item_id).await? else {
            return Ok(CartOutcome::NoOp);
        };
        let Some(product) = self.store.get_product(item.product_id).await? else {
            return Ok(CartOutcome::NoOp);
        };
        let change = item.increment(&product);
        self.apply(&item, change, "increment").await
    }

    /// One unit fewer; the last unit removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn decrement(
        &self,
        customer_id: CustomerId,
        item_id: CartItemId,
    ) -> Result<CartOutcome> {
        let Some(item) = self.find_line(customer_id, item_id).await? else {
            return Ok(CartOutcome::NoOp);
        };
        let change = item.decrement();
        self.apply(&item, change, "decrement").await
    }

    /// Removes a line whatever its quantity.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, customer_id: CustomerId, item_id: CartItemId) -> Result<CartOutcome> {
        let Some(item) = self.find_line(customer_id, item_id).await? else {
            return Ok(CartOutcome::NoOp);
        };
        self.apply(&item, LineChange::Delete, "remove").await
    }

    /// Records the customer's fulfillment choice, if the store currently
    /// offers that method.
    #[tracing::instrument(skip(self, note))]
    pub async fn choose_fulfillment(
        &self,
        customer_id: CustomerId,
        method: FulfillmentMethod,
        note: &str,
    ) -> Result<Cart> {
        self.policy.ensure_allowed(method).await?;
        let mut cart = self.store.get_or_create_cart(customer_id).await?;
        cart.set_logistics(method, note)?;
        self.store.save_cart(&cart).await?;
        record("fulfillment");
        Ok(cart)
    }

    /// Builds the cart page, quoting `coupon` if one is given.
    #[tracing::instrument(skip(self))]
    pub async fn view(&self, customer_id: CustomerId, coupon: Option<&str>) -> Result<CartView> {
        let cart = self.store.get_or_create_cart(customer_id).await?;
        let settings = self.policy.load().await;
        let lines = self
            .store
            .cart_lines(cart.id)
            .await?
            .into_iter()
            .map(|line| -> Result<CartLineView> {
                Ok(CartLineView {
                    item_id: line.item.id,
                    product_id: line.product.id,
                    line_total: line.line_total()?,
                    quantity: line.item.quantity(),
                    in_stock: line.product.quantity(),
                    unit_price: line.product.price,
                    name: line.product.name,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let total = total_of(lines.iter().map(|line| line.line_total))?;

        let (promo, coupon_error) = self.quote(coupon).await?;
        let discount = promo
            .as_ref()
            .map_or(Money::zero(), |promo| promo.discount_for(total));

        Ok(CartView {
            cart,
            lines,
            total,
            discount,
            grand_total: total - discount,
            applied_coupon: promo.map(|promo| promo.code),
            coupon_error,
            fulfillment_options: settings.enabled_methods(),
            pre_purchase_instruction: settings.pre_purchase_instruction,
        })
    }

    async fn quote(&self, coupon: Option<&str>) -> Result<(Option<PromoCode>, Option<&'static str>)> {
        let Some(code) = coupon.map(str::trim).filter(|code| !code.is_empty()) else {
            return Ok((None, None));
        };
        match self.store.find_active_promo(code).await? {
            Some(promo) => Ok((Some(promo), None)),
            None => Ok((None, Some(INVALID_COUPON))),
        }
    }

    async fn find_line(
        &self,
        customer_id: CustomerId,
        item_id: CartItemId,
    ) -> Result<Option<CartItem>> {
        let Some(cart) = self.store.find_cart(customer_id).await? else {
            return Ok(None);
        };
        Ok(self.store.find_item(cart.id, item_id).await?)
    }

    async fn apply(
        &self,
        item: &CartItem,
        change: LineChange,
        action: &'static str,
    ) -> Result<CartOutcome> {
        let outcome = match change {
            LineChange::Set(quantity) => {
                match self.store.update_item_quantity(item.id, quantity).await {
                    Ok(()) => {}
                    // Checked out or removed since it was read
                    Err(StorageError::NotFound { .. }) => return Ok(CartOutcome::NoOp),
                    Err(err) => return Err(err.into()),
                }
                CartOutcome::Updated {
                    item_id: item.id,
                    quantity,
                }
            }
            LineChange::Delete => {
                if !self.store.delete_item(item.id).await? {
                    return Ok(CartOutcome::NoOp);
                }
                CartOutcome::Removed { item_id: item.id }
            }
            LineChange::StockLimit { available } => {
                tracing::info!(item_id = %item.id, available, "cart line at stock limit");
                return Ok(CartOutcome::StockLimit {
                    item_id: item.id,
                    available,
                });
            }
        };
        record(action);
        Ok(outcome)
    }
}

fn record(action: &'static str) {
    metrics::counter!("cart_mutations_total", "action" => action).increment(1);
}
