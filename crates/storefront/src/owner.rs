//! Owner studio: catalog management, order completion and the dashboard.

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc};
use common::{Money, OrderId, ProductId};
use domain::{DomainError, Order, Product, ProductDraft, StoreSettings};
use serde::{Deserialize, Serialize};
use storage::{OrderStats, StorageError, Store};

use crate::error::{Result, StorefrontError};
use crate::policy::StorePolicy;

/// Length of the trailing sales window on the dashboard.
pub const SALES_WINDOW_DAYS: i64 = 30;

/// Number of orders listed under "recent orders".
pub const RECENT_ORDERS_LIMIT: usize = 10;

/// Calendar months in the sales breakdown, the current one included.
pub const MONTHLY_SALES_MONTHS: u32 = 6;

/// Price and availability, edited together from the product list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickEdit {
    pub price: Money,
    pub is_available: bool,
}

/// Completed-order revenue of one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySales {
    /// Such as "Mar 2026".
    pub month: String,
    pub total: Money,
}

/// Figures shown on the owner dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub active_products: usize,
    pub low_stock_products: usize,
    pub total_sales: Money,
    pub paid_orders: u64,
    pub pending_orders: u64,
    pub sales_window_days: i64,
    pub sales_window_total: Money,
    pub sales_window_orders: u64,
    pub recent_orders: Vec<Order>,
    /// Oldest month first.
    pub monthly_sales: Vec<MonthlySales>,
    /// False when the order figures could not be read and show zeros.
    pub analytics_available: bool,
}

struct Analytics {
    all_time: OrderStats,
    window: OrderStats,
    recent: Vec<Order>,
    monthly: Vec<MonthlySales>,
}

/// Owner-side operations.
///
/// Stock-changing edits lock the product row inside a transaction, so they
/// serialise with checkouts touching the same product.
#[derive(Clone)]
pub struct OwnerStudio<S> {
    store: S,
    policy: StorePolicy<S>,
}

impl<S> OwnerStudio<S>
where
    S: Store + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            policy: StorePolicy::new(store.clone()),
            store,
        }
    }

    /// Every product, newest first.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.store.list_products().await?)
    }

    #[tracing::instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        let product = Product::from_draft(draft)?;
        self.store.save_product(&product).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Replaces every editable field of a product.
    #[tracing::instrument(skip(self, draft))]
    pub async fn edit_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product> {
        self.edit_locked(id, move |product| product.apply_draft(draft))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn quick_edit(&self, id: ProductId, edit: QuickEdit) -> Result<Product> {
        self.edit_locked(id, move |product| {
            product.set_price(edit.price)?;
            product.set_available(edit.is_available);
            Ok(())
        })
        .await
    }

    /// Flips availability. A product without stock stays unavailable.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_availability(&self, id: ProductId) -> Result<Product> {
        self.edit_locked(id, |product| {
            product.set_available(!product.is_available());
            Ok(())
        })
        .await
    }

    /// Sets the stock level.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, id: ProductId, quantity: u32) -> Result<Product> {
        self.edit_locked(id, move |product| {
            product.set_quantity(quantity);
            Ok(())
        })
        .await
    }

    /// Deletes a product. Past order lines keep their captured name.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        if !self.store.delete_product(id).await? {
            return Err(StorefrontError::ProductNotFound(id));
        }
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Flips an order between completed and pending.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_order_status(&self, id: OrderId) -> Result<Order> {
        let mut order = self
            .store
            .get_order(id)
            .await?
            .ok_or_else(|| StorefrontError::OrderNotFound(id.to_string()))?;
        order.toggle_completion(Utc::now());
        self.store.save_order_status(&order).await?;
        tracing::info!(order_id = %order.order_id, completed = order.is_completed, "order status toggled");
        Ok(order)
    }

    /// Dashboard figures as of `now`.
    ///
    /// Order analytics that cannot be read show as zeros rather than
    /// failing the page.
    #[tracing::instrument(skip(self))]
    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardSummary> {
        let products = self.store.list_products().await?;
        let active_products = products.iter().filter(|p| p.is_available()).count();
        let low_stock_products = products.iter().filter(|p| p.is_low_stock()).count();

        let (analytics, analytics_available) = match self.analytics(now).await {
            Ok(analytics) => (analytics, true),
            Err(err) => {
                tracing::warn!(error = %err, "order analytics unavailable");
                (
                    Analytics {
                        all_time: OrderStats::default(),
                        window: OrderStats::default(),
                        recent: Vec::new(),
                        monthly: Vec::new(),
                    },
                    false,
                )
            }
        };

        Ok(DashboardSummary {
            active_products,
            low_stock_products,
            total_sales: analytics.all_time.completed_total,
            paid_orders: analytics.all_time.completed_count,
            pending_orders: analytics.all_time.pending_count,
            sales_window_days: SALES_WINDOW_DAYS,
            sales_window_total: analytics.window.completed_total,
            sales_window_orders: analytics.window.completed_count,
            recent_orders: analytics.recent,
            monthly_sales: analytics.monthly,
            analytics_available,
        })
    }

    /// Current settings, defaults if unreadable.
    pub async fn settings(&self) -> StoreSettings {
        self.policy.load().await
    }

    pub async fn update_settings(&self, settings: &StoreSettings) -> Result<StoreSettings> {
        self.policy.save(settings).await?;
        Ok(self.policy.load().await)
    }

    async fn analytics(&self, now: DateTime<Utc>) -> std::result::Result<Analytics, StorageError> {
        let since = now - Duration::days(SALES_WINDOW_DAYS);
        let mut monthly = Vec::with_capacity(MONTHLY_SALES_MONTHS as usize);
        for bounds in month_boundaries(now, MONTHLY_SALES_MONTHS).windows(2) {
            let (start, end) = (bounds[0], bounds[1]);
            monthly.push(MonthlySales {
                month: start.format("%b %Y").to_string(),
                total: self.store.completed_total_between(start, end).await?,
            });
        }
        Ok(Analytics {
            all_time: self.store.order_stats(None).await?,
            window: self.store.order_stats(Some(since)).await?,
            recent: self.store.list_recent_orders(RECENT_ORDERS_LIMIT).await?,
            monthly,
        })
    }

    async fn edit_locked<F>(&self, id: ProductId, edit: F) -> Result<Product>
    where
        F: FnOnce(&mut Product) -> std::result::Result<(), DomainError> + Send,
    {
        let mut tx = self.store.begin().await?;
        let mut product = match tx.lock_product(id).await {
            Ok(product) => product,
            Err(StorageError::NotFound { .. }) => {
                return Err(StorefrontError::ProductNotFound(id));
            }
            Err(err) => return Err(err.into()),
        };
        edit(&mut product)?;
        tx.save_product(&product).await?;
        tx.commit().await?;
        tracing::info!(
            product_id = %id,
            quantity = product.quantity(),
            available = product.is_available(),
            "product updated"
        );
        Ok(product)
    }
}

/// Start of each of the last `months` calendar months, oldest first, then the
/// start of the following month. Empty when the dates are out of range.
fn month_boundaries(now: DateTime<Utc>, months: u32) -> Vec<DateTime<Utc>> {
    let Some(oldest) = now
        .date_naive()
        .with_day(1)
        .and_then(|first| first.checked_sub_months(Months::new(months.saturating_sub(1))))
    else {
        return Vec::new();
    };
    (0..=months)
        .map_while(|step| oldest.checked_add_months(Months::new(step)))
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .collect()
}
