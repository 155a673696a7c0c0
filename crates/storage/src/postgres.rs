use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, CustomerId, Money, OrderId, OrderItemId, ProductId};
use domain::{
    Cart, CartItem, Customer, DomainError, Order, OrderItem, OrderNumber, Product, PromoCode,
    SETTINGS_ID, StoreSettings,
};
use rust_decimal::Decimal;
use sqlx::{
    PgConnection, PgPool, Postgres, Row,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::{
    Result, StorageError,
    store::{
        CartStore, CatalogStore, CustomerDirectory, OrderArchiveStore, OrderStats, PromoStore,
        SettingsStore, Store, Transaction,
    },
};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, original_price, quantity, is_available, created_at";

const CART_COLUMNS: &str = "id, customer_id, fulfillment_method, logistics_note, created_at";

const ORDER_COLUMNS: &str = "id, customer_id, order_id, total_paid, is_completed, payment_date, \
     fulfillment_method, logistics_note, receipt_channel_used, pre_purchase_instruction_snapshot, \
     created_at";

/// PostgreSQL-backed storefront store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        tracing::info!("Running storefront migrations");
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StorageError::Corrupt(format!("{column} = {value}")))
}

fn to_i32(value: u32, column: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StorageError::Corrupt(format!("{column} = {value}")))
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint))
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    let quantity = to_u32(row.try_get("quantity")?, "products.quantity")?;
    let mut product = Product::new(
        row.try_get::<String, _>("name")?,
        Money::new(row.try_get("price")?),
        quantity,
    )?
    .with_stock_state(quantity, row.try_get("is_available")?);
    product.id = ProductId::from_uuid(row.try_get::<Uuid, _>("id")?);
    product.description = row.try_get("description")?;
    product.original_price = row
        .try_get::<Option<Decimal>, _>("original_price")?
        .map(Money::new);
    product.created_at = row.try_get("created_at")?;
    Ok(product)
}

fn row_to_cart(row: &PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        fulfillment_method: row.try_get::<String, _>("fulfillment_method")?.parse()?,
        logistics_note: row.try_get("logistics_note")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<CartItem> {
    let mut item = CartItem::new(
        CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
        ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
    )
    .with_quantity(to_u32(row.try_get("quantity")?, "cart_items.quantity")?)?;
    item.id = CartItemId::from_uuid(row.try_get::<Uuid, _>("id")?);
    Ok(item)
}

fn row_to_settings(row: &PgRow) -> Result<StoreSettings> {
    Ok(StoreSettings {
        id: row.try_get("id")?,
        store_name: row.try_get("store_name")?,
        logo: row.try_get("logo")?,
        allow_pickup: row.try_get("allow_pickup")?,
        allow_waybill_delivery: row.try_get("allow_waybill_delivery")?,
        pre_purchase_instruction: row.try_get("pre_purchase_instruction")?,
        receipt_channel: row.try_get::<String, _>("receipt_channel")?.parse()?,
        owner_whatsapp_number: row.try_get("owner_whatsapp_number")?,
        whatsapp_message_template: row.try_get("whatsapp_message_template")?,
        auto_open_whatsapp_on_checkout: row.try_get("auto_open_whatsapp_on_checkout")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        order_id: OrderNumber::new(row.try_get::<String, _>("order_id")?),
        total_paid: Money::new(row.try_get("total_paid")?),
        is_completed: row.try_get("is_completed")?,
        payment_date: row.try_get::<Option<DateTime<Utc>>, _>("payment_date")?,
        fulfillment_method: row.try_get::<String, _>("fulfillment_method")?.parse()?,
        logistics_note: row.try_get("logistics_note")?,
        receipt_channel_used: row.try_get::<String, _>("receipt_channel_used")?.parse()?,
        pre_purchase_instruction_snapshot: row.try_get("pre_purchase_instruction_snapshot")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: row
            .try_get::<Option<Uuid>, _>("product_id")?
            .map(ProductId::from_uuid),
        product_name: row.try_get("product_name")?,
        price: Money::new(row.try_get("price")?),
        quantity: to_u32(row.try_get("quantity")?, "order_items.quantity")?,
    })
}

fn row_to_promo(row: &PgRow) -> Result<PromoCode> {
    Ok(PromoCode {
        code: row.try_get("code")?,
        discount_percentage: to_u32(
            row.try_get("discount_percentage")?,
            "promo_codes.discount_percentage",
        )?,
        is_active: row.try_get("is_active")?,
    })
}

async fn save_product_on(conn: &mut PgConnection, product: &Product) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO products (id, name, description, price, original_price, quantity, is_available, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            price = EXCLUDED.price,
            original_price = EXCLUDED.original_price,
            quantity = EXCLUDED.quantity,
            is_available = EXCLUDED.is_available
        "#,
    )
    .bind(product.id.as_uuid())
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price.amount())
    .bind(product.original_price.map(|price| price.amount()))
    .bind(to_i32(product.quantity(), "products.quantity")?)
    .bind(product.is_available())
    .bind(product.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Reads the settings row, inserting the defaults first if it is missing.
async fn load_settings_on(conn: &mut PgConnection) -> Result<StoreSettings> {
    let defaults = StoreSettings::default();
    sqlx::query(
        r#"
        INSERT INTO store_settings (
            id, store_name, logo, allow_pickup, allow_waybill_delivery, pre_purchase_instruction,
            receipt_channel, owner_whatsapp_number, whatsapp_message_template,
            auto_open_whatsapp_on_checkout
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(SETTINGS_ID)
    .bind(&defaults.store_name)
    .bind(&defaults.logo)
    .bind(defaults.allow_pickup)
    .bind(defaults.allow_waybill_delivery)
    .bind(&defaults.pre_purchase_instruction)
    .bind(defaults.receipt_channel.as_str())
    .bind(&defaults.owner_whatsapp_number)
    .bind(&defaults.whatsapp_message_template)
    .bind(defaults.auto_open_whatsapp_on_checkout)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query("SELECT * FROM store_settings WHERE id = $1")
        .bind(SETTINGS_ID)
        .fetch_one(&mut *conn)
        .await?;
    row_to_settings(&row)
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        save_product_on(&mut conn, product).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        // cart_items cascade, order_items.product_id is set to NULL
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn get_or_create_cart(&self, customer_id: CustomerId) -> Result<Cart> {
        let cart = Cart::new(customer_id);
        sqlx::query(
            r#"
            INSERT INTO carts (id, customer_id, fulfillment_method, logistics_note, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (customer_id) DO NOTHING
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(customer_id.as_uuid())
        .bind(cart.fulfillment_method.as_str())
        .bind(&cart.logistics_note)
        .bind(cart.created_at)
        .execute(&self.pool)
        .await?;

        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE customer_id = $1");
        let row = sqlx::query(&sql)
            .bind(customer_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        row_to_cart(&row)
    }

    async fn find_cart(&self, customer_id: CustomerId) -> Result<Option<Cart>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE customer_id = $1");
        let row = sqlx::query(&sql)
            .bind(customer_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_cart).transpose()
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, customer_id, fulfillment_method, logistics_note, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                fulfillment_method = EXCLUDED.fulfillment_method,
                logistics_note = EXCLUDED.logistics_note
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(cart.customer_id.as_uuid())
        .bind(cart.fulfillment_method.as_str())
        .bind(&cart.logistics_note)
        .bind(cart.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_items(&self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            "SELECT id, cart_id, product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY product_id",
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn find_item(&self, cart_id: CartId, item_id: CartItemId) -> Result<Option<CartItem>> {
        let row = sqlx::query(
            "SELECT id, cart_id, product_id, quantity FROM cart_items WHERE id = $1 AND cart_id = $2",
        )
        .bind(item_id.as_uuid())
        .bind(cart_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn find_item_for_product(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>> {
        let row = sqlx::query(
            "SELECT id, cart_id, product_id, quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn insert_item(&self, item: &CartItem) -> Result<()> {
        sqlx::query("INSERT INTO cart_items (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4)")
            .bind(item.id.as_uuid())
            .bind(item.cart_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(to_i32(item.quantity(), "cart_items.quantity")?)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, "unique_cart_product") {
                    return StorageError::Conflict(format!(
                        "cart {} already holds product {}",
                        item.cart_id, item.product_id
                    ));
                }
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return StorageError::not_found("product", item.product_id);
                }
                StorageError::Database(e)
            })?;
        Ok(())
    }

    async fn update_item_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity }.into());
        }
        let result = sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
            .bind(item_id.as_uuid())
            .bind(to_i32(quantity, "cart_items.quantity")?)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("cart item", item_id));
        }
        Ok(())
    }

    async fn delete_item(&self, item_id: CartItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(item_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn load_settings(&self) -> Result<StoreSettings> {
        let mut conn = self.pool.acquire().await?;
        load_settings_on(&mut conn).await
    }

    async fn save_settings(&self, settings: &StoreSettings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO store_settings (
                id, store_name, logo, allow_pickup, allow_waybill_delivery, pre_purchase_instruction,
                receipt_channel, owner_whatsapp_number, whatsapp_message_template,
                auto_open_whatsapp_on_checkout
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                store_name = EXCLUDED.store_name,
                logo = EXCLUDED.logo,
                allow_pickup = EXCLUDED.allow_pickup,
                allow_waybill_delivery = EXCLUDED.allow_waybill_delivery,
                pre_purchase_instruction = EXCLUDED.pre_purchase_instruction,
                receipt_channel = EXCLUDED.receipt_channel,
                owner_whatsapp_number = EXCLUDED.owner_whatsapp_number,
                whatsapp_message_template = EXCLUDED.whatsapp_message_template,
                auto_open_whatsapp_on_checkout = EXCLUDED.auto_open_whatsapp_on_checkout
            "#,
        )
        .bind(SETTINGS_ID)
        .bind(&settings.store_name)
        .bind(&settings.logo)
        .bind(settings.allow_pickup)
        .bind(settings.allow_waybill_delivery)
        .bind(&settings.pre_purchase_instruction)
        .bind(settings.receipt_channel.as_str())
        .bind(&settings.owner_whatsapp_number)
        .bind(&settings.whatsapp_message_template)
        .bind(settings.auto_open_whatsapp_on_checkout)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderArchiveStore for PgStore {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_customer_order(
        &self,
        customer_id: CustomerId,
        order_number: &OrderNumber,
    ) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 AND customer_id = $2");
        let row = sqlx::query(&sql)
            .bind(order_number.as_str())
            .bind(customer_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, price, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY seq
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_order_item).collect()
    }

    async fn list_completed_orders(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 AND is_completed ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(customer_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn list_recent_orders(&self, limit: usize) -> Result<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT $1");
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn save_order_status(&self, order: &Order) -> Result<()> {
        let result =
            sqlx::query("UPDATE orders SET is_completed = $2, payment_date = $3 WHERE id = $1")
                .bind(order.id.as_uuid())
                .bind(order.is_completed)
                .bind(order.payment_date)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("order", order.id));
        }
        Ok(())
    }

    async fn order_stats(&self, since: Option<DateTime<Utc>>) -> Result<OrderStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE is_completed) AS completed_count,
                COALESCE(SUM(total_paid) FILTER (WHERE is_completed), 0) AS completed_total,
                COUNT(*) FILTER (WHERE NOT is_completed) AS pending_count
            FROM orders
            WHERE $1::timestamptz IS NULL OR created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let count = |column: &str| -> Result<u64> {
            let value: i64 = row.try_get(column)?;
            u64::try_from(value).map_err(|_| StorageError::Corrupt(format!("{column} = {value}")))
        };
        Ok(OrderStats {
            completed_count: count("completed_count")?,
            completed_total: Money::new(row.try_get("completed_total")?),
            pending_count: count("pending_count")?,
        })
    }

    async fn completed_total_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Money> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_paid), 0)
            FROM orders
            WHERE is_completed AND created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::new(total))
    }
}

#[async_trait]
impl PromoStore for PgStore {
    async fn find_active_promo(&self, code: &str) -> Result<Option<PromoCode>> {
        let row = sqlx::query(
            "SELECT code, discount_percentage, is_active FROM promo_codes WHERE UPPER(code) = UPPER($1) AND is_active",
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_promo).transpose()
    }

    async fn save_promo(&self, promo: &PromoCode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO promo_codes (code, discount_percentage, is_active)
            VALUES ($1, $2, $3)
            ON CONFLICT ((UPPER(code))) DO UPDATE SET
                code = EXCLUDED.code,
                discount_percentage = EXCLUDED.discount_percentage,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&promo.code)
        .bind(to_i32(promo.discount_percentage, "promo_codes.discount_percentage")?)
        .bind(promo.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CustomerDirectory for PgStore {
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query("SELECT id, email, username FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(Customer {
                id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
                email: row.try_get("email")?,
                username: row.try_get("username")?,
            })),
            None => Ok(None),
        }
    }

    async fn save_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, email, username)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, username = EXCLUDED.username
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.email)
        .bind(&customer.username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// A PostgreSQL transaction. Row locks are taken with `SELECT ... FOR UPDATE`
/// and held until commit or rollback.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn lock_cart(&mut self, customer_id: CustomerId) -> Result<Option<Cart>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE customer_id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(customer_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_cart).transpose()
    }

    async fn list_items(&mut self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            "SELECT id, cart_id, product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY product_id FOR UPDATE",
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StorageError::not_found("product", id))?;
        row_to_product(&row)
    }

    async fn save_product(&mut self, product: &Product) -> Result<()> {
        save_product_on(&mut self.tx, product).await
    }

    async fn load_settings(&mut self) -> Result<StoreSettings> {
        // A savepoint keeps the outer transaction usable if the read fails
        let mut savepoint = sqlx::Connection::begin(&mut *self.tx).await?;
        let settings = load_settings_on(&mut savepoint).await?;
        savepoint.commit().await?;
        Ok(settings)
    }

    async fn create_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, order_id, total_paid, is_completed, payment_date,
                fulfillment_method, logistics_note, receipt_channel_used,
                pre_purchase_instruction_snapshot, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.order_id.as_str())
        .bind(order.total_paid.amount())
        .bind(order.is_completed)
        .bind(order.payment_date)
        .bind(order.fulfillment_method.as_str())
        .bind(&order.logistics_note)
        .bind(order.receipt_channel_used.as_str())
        .bind(&order.pre_purchase_instruction_snapshot)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "unique_order_number") {
                return StorageError::Conflict(format!(
                    "order number {} already taken",
                    order.order_id
                ));
            }
            StorageError::Database(e)
        })?;
        Ok(())
    }

    async fn create_order_item(&mut self, item: &OrderItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, product_name, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.map(|id| id.as_uuid()))
        .bind(&item.product_name)
        .bind(item.price.amount())
        .bind(to_i32(item.quantity, "order_items.quantity")?)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_all_items(&mut self, cart_id: CartId, items: &[CartItemId]) -> Result<u64> {
        let ids: Vec<Uuid> = items.iter().map(|id| id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = ANY($2)")
            .bind(cart_id.as_uuid())
            .bind(&ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
