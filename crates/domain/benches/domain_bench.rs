use chrono::Utc;
use common::Money;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Cart, CartItem, CartLine, CustomerId, Order, OrderItem, Product, StoreSettings, total_of,
};
use rust_decimal_macros::dec;

fn cart_lines(count: usize) -> (Cart, Vec<CartLine>) {
    let cart = Cart::new(CustomerId::new());
    let lines = (0..count)
        .map(|i| {
            let product =
                Product::new(format!("Item {i}"), Money::new(dec!(1999.99)), 100).unwrap();
            let item = CartItem::new(cart.id, product.id).with_quantity(3).unwrap();
            CartLine { item, product }
        })
        .collect();
    (cart, lines)
}

fn bench_cart_total(c: &mut Criterion) {
    let (_, lines) = cart_lines(50);

    c.bench_function("domain/cart_total_50_lines", |b| {
        b.iter(|| total_of(lines.iter().map(|line| line.line_total().unwrap())));
    });
}

fn bench_order_capture(c: &mut Criterion) {
    let (cart, lines) = cart_lines(10);
    let settings = StoreSettings::default();

    c.bench_function("domain/order_capture_10_lines", |b| {
        b.iter(|| {
            let total = total_of(lines.iter().map(|line| line.line_total().unwrap())).unwrap();
            let order = Order::paid(&cart, &settings, total, Utc::now());
            let mut products: Vec<Product> = lines.iter().map(|l| l.product.clone()).collect();
            let items: Vec<OrderItem> = lines
                .iter()
                .zip(products.iter_mut())
                .map(|(line, product)| {
                    let item = OrderItem::capture(order.id, product, line.item.quantity()).unwrap();
                    product.reserve(line.item.quantity()).unwrap();
                    item
                })
                .collect();
            (order, items)
        });
    });
}

criterion_group!(benches, bench_cart_total, bench_order_capture);
criterion_main!(benches);
