//! WhatsApp hand-off after checkout.

use domain::{DEFAULT_WHATSAPP_TEMPLATE, Order, OrderItem, StoreSettings};

/// Renders the owner's message template for an order.
///
/// Unknown placeholders are left as they are. An empty template falls back
/// to the default one.
pub fn render_message(settings: &StoreSettings, order: &Order, items: &[OrderItem]) -> String {
    let template = if settings.whatsapp_message_template.trim().is_empty() {
        DEFAULT_WHATSAPP_TEMPLATE
    } else {
        settings.whatsapp_message_template.as_str()
    };

    template
        .replace("{{store_name}}", &settings.store_name)
        .replace("{{order_id}}", order.order_id.as_str())
        .replace("{{total_paid}}", &order.total_paid.to_string())
        .replace("{{fulfillment_method}}", order.fulfillment_method.label())
        .replace("{{logistics_note}}", &order.logistics_note)
        .replace("{{item_summary}}", &item_summary(items))
}

/// `Vintage Dress x2, Beret x1`
pub fn item_summary(items: &[OrderItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} x{}", item.display_name(), item.quantity))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Link that opens a chat with the owner, prefilled with the order message.
///
/// None when auto-open is off or no number is configured.
pub fn order_link(settings: &StoreSettings, order: &Order, items: &[OrderItem]) -> Option<String> {
    if !settings.auto_open_whatsapp_on_checkout {
        return None;
    }
    let number = settings.whatsapp_digits()?;
    let message = render_message(settings, order, items);
    Some(format!(
        "https://wa.me/{number}?text={}",
        urlencoding::encode(&message)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{CustomerId, Money};
    use domain::{Cart, FulfillmentMethod, Product};
    use rust_decimal_macros::dec;

    fn order_with_items() -> (Order, Vec<OrderItem>) {
        let mut cart = Cart::new(CustomerId::new());
        cart.set_logistics(FulfillmentMethod::Waybill, "GIG Ikeja").unwrap();
        let order = Order::paid(
            &cart,
            &StoreSettings::default(),
            Money::new(dec!(28000)),
            Utc::now(),
        );
        let dress = Product::new("Vintage Dress", Money::new(dec!(12500)), 5).unwrap();
        let beret = Product::new("Beret", Money::new(dec!(3000)), 5).unwrap();
        let items = vec![
            OrderItem::capture(order.id, &dress, 2).unwrap(),
            OrderItem::capture(order.id, &beret, 1).unwrap(),
        ];
        (order, items)
    }

    #[test]
    fn default_template_renders() {
        let (order, items) = order_with_items();
        let message = render_message(&StoreSettings::default(), &order, &items);
        assert_eq!(
            message,
            format!(
                "Hi ThriftElegance, I just completed order #{} for ₦28000.00.",
                order.order_id
            )
        );
    }

    #[test]
    fn all_placeholders_are_filled() {
        let (order, items) = order_with_items();
        let settings = StoreSettings {
            whatsapp_message_template:
                "{{fulfillment_method}} | {{logistics_note}} | {{item_summary}}".to_string(),
            ..StoreSettings::default()
        };
        assert_eq!(
            render_message(&settings, &order, &items),
            "Waybill delivery | GIG Ikeja | Vintage Dress x2, Beret x1"
        );
    }

    #[test]
    fn link_requires_number_and_auto_open() {
        let (order, items) = order_with_items();
        let mut settings = StoreSettings::default();
        assert_eq!(order_link(&settings, &order, &items), None);

        settings.owner_whatsapp_number = "+234 801 234 5678".to_string();
        let link = order_link(&settings, &order, &items).unwrap();
        assert!(link.starts_with("https://wa.me/2348012345678?text=Hi%20ThriftElegance"));

        settings.auto_open_whatsapp_on_checkout = false;
        assert_eq!(order_link(&settings, &order, &items), None);
    }
}
