//! Integration tests for checkout, cart mutations and store policy.

use common::{CustomerId, Money};
use domain::{
    Customer, DEFAULT_STORE_NAME, FulfillmentMethod, Product, ReceiptChannel, SETTINGS_ID,
    StoreSettings, total_of,
};
use futures_util::future::join_all;
use rust_decimal_macros::dec;
use storage::{CartStore, CatalogStore, CustomerDirectory, InMemoryStore, SettingsStore};
use storefront::{
    CartOutcome, CartService, CheckoutEngine, CheckoutError, DM_NOTICE, InMemoryMailer,
    ReceiptDispatcher, StorePolicy,
};

struct TestHarness {
    store: InMemoryStore,
    mailer: InMemoryMailer,
    engine: CheckoutEngine<InMemoryStore>,
    carts: CartService<InMemoryStore>,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let mailer = InMemoryMailer::new();
        let engine = CheckoutEngine::new(store.clone(), ReceiptDispatcher::new(mailer.clone()));
        let carts = CartService::new(store.clone());
        Self {
            store,
            mailer,
            engine,
            carts,
        }
    }

    async fn product(&self, name: &str, price: Money, stock: u32) -> Product {
        let product = Product::new(name, price, stock).unwrap();
        self.store.save_product(&product).await.unwrap();
        product
    }

    async fn customer(&self) -> CustomerId {
        let customer = Customer::new("buyer@example.com", "buyer");
        self.store.save_customer(&customer).await.unwrap();
        customer.id
    }

    /// Adds `quantity` units of `product` through the cart service.
    async fn fill(&self, customer_id: CustomerId, product: &Product, quantity: u32) {
        for _ in 0..quantity {
            self.carts.add(customer_id, product.id).await.unwrap();
        }
    }

    async fn stock_of(&self, product: &Product) -> u32 {
        self.store
            .get_product(product.id)
            .await
            .unwrap()
            .unwrap()
            .quantity()
    }

    async fn cart_quantities(&self, customer_id: CustomerId) -> Vec<u32> {
        let cart = self.store.get_or_create_cart(customer_id).await.unwrap();
        self.store
            .list_items(cart.id)
            .await
            .unwrap()
            .iter()
            .map(|item| item.quantity())
            .collect()
    }

    async fn set_settings(&self, settings: StoreSettings) {
        self.store.save_settings(&settings).await.unwrap();
    }
}

#[tokio::test]
async fn test_repeated_add_stabilises_at_stock() {
    let h = TestHarness::new();
    let product = h.product("Vintage Dress", Money::new(dec!(12500)), 2).await;
    let customer = h.customer().await;

    h.carts.add(customer, product.id).await.unwrap();
    h.carts.add(customer, product.id).await.unwrap();
    let third = h.carts.add(customer, product.id).await.unwrap();

    assert!(matches!(third, CartOutcome::StockLimit { available: 2, .. }));
    assert_eq!(h.cart_quantities(customer).await, vec![2]);
}

#[tokio::test]
async fn test_stock_sold_elsewhere_fails_checkout_and_keeps_cart() {
    let h = TestHarness::new();
    let mut product = h.product("Vintage Dress", Money::new(dec!(12500)), 1).await;
    let customer = h.customer().await;
    h.fill(customer, &product, 1).await;

    product.set_quantity(0);
    h.store.save_product(&product).await.unwrap();
    let before = h.store.snapshot().await;

    let err = h.engine.complete_purchase(customer).await.unwrap_err();

    match &err {
        CheckoutError::InsufficientStock {
            product_id,
            product_name,
        } => {
            assert_eq!(*product_id, product.id);
            assert_eq!(product_name, "Vintage Dress");
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "Vintage Dress no longer has enough stock. Please update your bag."
    );
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.cart_quantities(customer).await, vec![1]);
    assert_eq!(h.store.snapshot().await, before);
}

#[tokio::test]
async fn test_checkout_charges_current_price_and_decrements_stock() {
    let h = TestHarness::new();
    let product = h.product("Vintage Dress", Money::new(dec!(12500.00)), 3).await;
    let customer = h.customer().await;
    h.fill(customer, &product, 2).await;

    let purchase = h.engine.complete_purchase(customer).await.unwrap();

    assert_eq!(purchase.order.total_paid, Money::new(dec!(25000.00)));
    assert!(purchase.order.is_completed);
    assert!(purchase.order.payment_date.is_some());
    assert_eq!(purchase.items.len(), 1);
    assert_eq!(purchase.items[0].price, Money::new(dec!(12500)));
    assert_eq!(purchase.items[0].quantity, 2);
    assert_eq!(h.stock_of(&product).await, 1);
    assert!(h.cart_quantities(customer).await.is_empty());
    assert_eq!(h.store.order_count().await, 1);
    assert_eq!(h.store.order_item_count().await, 1);

    // The cart survives, empty, for the next purchase
    assert!(h.store.find_cart(customer).await.unwrap().is_some());
}

#[tokio::test]
async fn test_price_change_after_add_is_honoured() {
    let h = TestHarness::new();
    let mut product = h.product("Denim Jacket", Money::new(dec!(8000)), 5).await;
    let customer = h.customer().await;
    h.fill(customer, &product, 2).await;

    product.set_price(Money::new(dec!(6500.50))).unwrap();
    h.store.save_product(&product).await.unwrap();

    let purchase = h.engine.complete_purchase(customer).await.unwrap();
    assert_eq!(purchase.order.total_paid, Money::new(dec!(13001.00)));
}

#[tokio::test]
async fn test_totals_are_exact_decimals() {
    let h = TestHarness::new();
    let a = h.product("Ribbon", Money::new(dec!(0.10)), 10).await;
    let b = h.product("Button", Money::new(dec!(0.20)), 10).await;
    let c = h.product("Thread", Money::new(dec!(1999.99)), 10).await;
    let customer = h.customer().await;
    h.fill(customer, &a, 3).await;
    h.fill(customer, &b, 1).await;
    h.fill(customer, &c, 3).await;

    let purchase = h.engine.complete_purchase(customer).await.unwrap();

    assert_eq!(purchase.order.total_paid, Money::new(dec!(6000.47)));
    let summed = total_of(purchase.items.iter().map(|item| item.line_total().unwrap())).unwrap();
    assert_eq!(summed, purchase.order.total_paid);
}

#[tokio::test]
async fn test_empty_cart_is_rejected_without_writes() {
    let h = TestHarness::new();
    let customer = h.customer().await;
    h.store.get_or_create_cart(customer).await.unwrap();
    let before = h.store.snapshot().await;

    let err = h.engine.complete_purchase(customer).await.unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
    assert_eq!(err.to_string(), "Your bag is empty.");
    assert_eq!(h.store.snapshot().await, before);
}

#[tokio::test]
async fn test_disabled_waybill_fails_checkout_after_selection() {
    let h = TestHarness::new();
    let product = h.product("Vintage Dress", Money::new(dec!(12500)), 3).await;
    let customer = h.customer().await;
    h.fill(customer, &product, 1).await;
    h.carts
        .choose_fulfillment(customer, FulfillmentMethod::Waybill, "GIG Ikeja")
        .await
        .unwrap();

    h.set_settings(StoreSettings {
        allow_waybill_delivery: false,
        ..StoreSettings::default()
    })
    .await;
    let before = h.store.snapshot().await;

    let err = h.engine.complete_purchase(customer).await.unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::FulfillmentUnavailable {
            method: FulfillmentMethod::Waybill
        }
    ));
    assert_eq!(
        err.to_string(),
        "Waybill delivery is currently unavailable. Please choose another logistics option."
    );
    assert_eq!(h.store.snapshot().await, before);

    // Re-choosing an enabled method unblocks the purchase
    h.carts
        .choose_fulfillment(customer, FulfillmentMethod::Pickup, "")
        .await
        .unwrap();
    let purchase = h.engine.complete_purchase(customer).await.unwrap();
    assert_eq!(purchase.order.fulfillment_method, FulfillmentMethod::Pickup);
}

#[tokio::test]
async fn test_failure_mid_write_leaves_state_untouched() {
    let h = TestHarness::new();
    let a = h.product("Beret", Money::new(dec!(3000)), 4).await;
    let b = h.product("Loafers", Money::new(dec!(15000)), 2).await;
    let customer = h.customer().await;
    h.fill(customer, &a, 2).await;
    h.fill(customer, &b, 1).await;
    h.store.set_fail_order_items(true);
    let before = h.store.snapshot().await;

    let err = h.engine.complete_purchase(customer).await.unwrap_err();

    assert!(matches!(err, CheckoutError::Storage(_)));
    assert_eq!(h.store.snapshot().await, before);
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.stock_of(&a).await, 4);
    assert_eq!(h.stock_of(&b).await, 2);

    h.store.set_fail_order_items(false);
    h.engine.complete_purchase(customer).await.unwrap();
    assert_eq!(h.stock_of(&a).await, 2);
    assert_eq!(h.stock_of(&b).await, 1);
}

#[tokio::test]
async fn test_order_snapshots_policy_at_purchase() {
    let h = TestHarness::new();
    let product = h.product("Silk Scarf", Money::new(dec!(4500)), 2).await;
    let customer = h.customer().await;
    h.fill(customer, &product, 1).await;
    h.carts
        .choose_fulfillment(customer, FulfillmentMethod::Waybill, "  GIG Lekki  ")
        .await
        .unwrap();
    h.set_settings(StoreSettings {
        receipt_channel: ReceiptChannel::Dm,
        pre_purchase_instruction: "Transfer before pickup.".to_string(),
        ..StoreSettings::default()
    })
    .await;

    let purchase = h.engine.complete_purchase(customer).await.unwrap();

    let order = &purchase.order;
    assert_eq!(order.fulfillment_method, FulfillmentMethod::Waybill);
    assert_eq!(order.logistics_note, "GIG Lekki");
    assert_eq!(order.receipt_channel_used, ReceiptChannel::Dm);
    assert_eq!(
        order.pre_purchase_instruction_snapshot,
        "Transfer before pickup."
    );
    assert_eq!(purchase.notice, Some(DM_NOTICE));

    // Later policy edits do not rewrite history
    h.set_settings(StoreSettings::default()).await;
    let archived = storefront::OrderArchive::new(h.store.clone())
        .invoice(customer, order.order_id.as_str())
        .await
        .unwrap();
    assert_eq!(archived.order.receipt_channel_used, ReceiptChannel::Dm);
}

#[tokio::test]
async fn test_unreadable_settings_fall_back_to_defaults() {
    let h = TestHarness::new();
    h.store.set_fail_settings(true);

    let settings = StorePolicy::new(h.store.clone()).load().await;

    assert_eq!(settings.store_name, DEFAULT_STORE_NAME);
    assert_eq!(settings.id, SETTINGS_ID);

    // Checkout still works on the defaults
    let product = h.product("Beret", Money::new(dec!(3000)), 1).await;
    let customer = h.customer().await;
    h.fill(customer, &product, 1).await;
    let purchase = h.engine.complete_purchase(customer).await.unwrap();
    assert_eq!(purchase.order.receipt_channel_used, ReceiptChannel::Email);
}

#[tokio::test]
async fn test_decrement_of_single_unit_deletes_line() {
    let h = TestHarness::new();
    let product = h.product("Beret", Money::new(dec!(3000)), 5).await;
    let customer = h.customer().await;
    let CartOutcome::Added { item_id } = h.carts.add(customer, product.id).await.unwrap() else {
        panic!("expected a new line");
    };

    let outcome = h.carts.decrement(customer, item_id).await.unwrap();

    assert_eq!(outcome, CartOutcome::Removed { item_id });
    assert!(h.cart_quantities(customer).await.is_empty());
    assert_eq!(
        h.carts.decrement(customer, item_id).await.unwrap(),
        CartOutcome::NoOp
    );
}

#[tokio::test]
async fn test_stock_never_negative_across_mixed_operations() {
    let h = TestHarness::new();
    let product = h.product("Vintage Dress", Money::new(dec!(12500)), 3).await;
    let buyers = [h.customer().await, h.customer().await, h.customer().await];

    for buyer in buyers {
        h.fill(buyer, &product, 2).await;
        let stock = h.stock_of(&product).await;
        let quantities = h.cart_quantities(buyer).await;
        assert!(quantities.iter().all(|q| *q <= stock));
    }

    let mut completed = 0;
    for buyer in buyers {
        if h.engine.complete_purchase(buyer).await.is_ok() {
            completed += 1;
        }
    }

    assert_eq!(completed, 1);
    assert_eq!(h.stock_of(&product).await, 1);
    let stored = h.store.get_product(product.id).await.unwrap().unwrap();
    assert!(stored.is_available());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_oversell() {
    let h = TestHarness::new();
    let product = h.product("Last Handbag", Money::new(dec!(30000)), 1).await;
    let mut buyers = Vec::new();
    for _ in 0..8 {
        let buyer = h.customer().await;
        h.fill(buyer, &product, 1).await;
        buyers.push(buyer);
    }

    let results = join_all(
        buyers
            .iter()
            .map(|buyer| h.engine.complete_purchase(*buyer)),
    )
    .await;

    let successes = results.iter().filter(|result| result.is_ok()).count();
    let sold_out = results
        .iter()
        .filter(|result| matches!(result, Err(CheckoutError::InsufficientStock { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(sold_out, 7);
    assert_eq!(h.stock_of(&product).await, 0);
    assert_eq!(h.store.order_count().await, 1);
    let stored = h.store.get_product(product.id).await.unwrap().unwrap();
    assert!(!stored.is_available());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_double_submit_buys_once() {
    let h = TestHarness::new();
    let product = h.product("Wool Coat", Money::new(dec!(20000)), 5).await;
    let customer = h.customer().await;
    h.fill(customer, &product, 2).await;

    let (first, second) = tokio::join!(
        h.engine.complete_purchase(customer),
        h.engine.complete_purchase(customer)
    );

    let outcomes = [first.is_ok(), second.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let failure = if first.is_err() { first } else { second };
    assert!(matches!(failure, Err(CheckoutError::EmptyCart)));
    assert_eq!(h.stock_of(&product).await, 3);
}

#[tokio::test]
async fn test_email_receipt_sent_after_commit() {
    let h = TestHarness::new();
    let product = h.product("Vintage Dress", Money::new(dec!(12500)), 3).await;
    let customer = h.customer().await;
    h.fill(customer, &product, 1).await;

    let purchase = h.engine.complete_purchase(customer).await.unwrap();
    let order_id = purchase.order.order_id.clone();
    purchase.receipt_delivery.await.unwrap();

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "buyer@example.com");
    assert_eq!(sent[0].subject, format!("Order Confirmed - #{order_id}"));
}

#[tokio::test]
async fn test_receipt_failure_does_not_undo_order() {
    let h = TestHarness::new();
    let product = h.product("Vintage Dress", Money::new(dec!(12500)), 3).await;
    let customer = h.customer().await;
    h.fill(customer, &product, 1).await;
    h.mailer.set_fail_on_send(true);

    let purchase = h.engine.complete_purchase(customer).await.unwrap();
    purchase.receipt_delivery.await.unwrap();

    assert!(h.mailer.sent().is_empty());
    assert_eq!(h.store.order_count().await, 1);
    assert_eq!(h.stock_of(&product).await, 2);
}

#[tokio::test]
async fn test_whatsapp_link_when_number_configured() {
    let h = TestHarness::new();
    let product = h.product("Beret", Money::new(dec!(3000)), 3).await;
    let customer = h.customer().await;
    h.fill(customer, &product, 1).await;
    h.set_settings(StoreSettings {
        owner_whatsapp_number: "+234 801 234 5678".to_string(),
        receipt_channel: ReceiptChannel::None,
        ..StoreSettings::default()
    })
    .await;

    let purchase = h.engine.complete_purchase(customer).await.unwrap();

    let link = purchase.whatsapp_link.expect("link expected");
    assert!(link.starts_with("https://wa.me/2348012345678?text="));
    assert!(link.contains(purchase.order.order_id.as_str()));
    assert_eq!(purchase.notice, None);
}
