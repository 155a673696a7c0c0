//! Receipt delivery, one strategy per receipt channel.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{Customer, DomainError, Order, OrderItem, ReceiptChannel};
use storage::CustomerDirectory;

use crate::error::NotificationError;
use crate::services::email::{EmailMessage, Mailer};

pub const DM_NOTICE: &str = "Receipt delivery is configured for direct message by the store owner.";

pub const SOCIAL_INBOX_NOTICE: &str =
    "Receipt delivery is configured for social media inbox by the store owner.";

/// Sends a receipt through one channel.
#[async_trait]
pub trait ReceiptSender: Send + Sync {
    fn channel(&self) -> ReceiptChannel;

    /// Message shown to the customer on the confirmation page.
    fn notice(&self) -> Option<&'static str> {
        None
    }

    async fn send(
        &self,
        order: &Order,
        items: &[OrderItem],
        customer: Option<&Customer>,
    ) -> Result<(), NotificationError>;
}

/// Emails an "Order Confirmed" receipt to the customer's address.
pub struct EmailReceipt<M> {
    mailer: M,
}

impl<M: Mailer> EmailReceipt<M> {
    pub fn new(mailer: M) -> Self {
        Self { mailer }
    }

    pub fn subject(order: &Order) -> String {
        format!("Order Confirmed - #{}", order.order_id)
    }

    pub fn body(
        order: &Order,
        items: &[OrderItem],
        customer: &Customer,
    ) -> Result<String, DomainError> {
        let mut body = format!(
            "Hi {},\n\nThank you for your order #{}.\n\n",
            customer.username, order.order_id
        );
        for item in items {
            let _ = writeln!(
                body,
                "- {} x{} @ ₦{} = ₦{}",
                item.display_name(),
                item.quantity,
                item.price,
                item.line_total()?
            );
        }
        let _ = writeln!(body, "\nTotal paid: ₦{}", order.total_paid);
        let _ = writeln!(body, "Fulfillment: {}", order.fulfillment_method.label());
        if !order.logistics_note.is_empty() {
            let _ = writeln!(body, "Logistics note: {}", order.logistics_note);
        }
        if !order.pre_purchase_instruction_snapshot.is_empty() {
            let _ = writeln!(body, "\n{}", order.pre_purchase_instruction_snapshot);
        }
        Ok(body)
    }
}

#[async_trait]
impl<M: Mailer> ReceiptSender for EmailReceipt<M> {
    fn channel(&self) -> ReceiptChannel {
        ReceiptChannel::Email
    }

    async fn send(
        &self,
        order: &Order,
        items: &[OrderItem],
        customer: Option<&Customer>,
    ) -> Result<(), NotificationError> {
        let customer = customer.ok_or(NotificationError::CustomerNotFound(order.customer_id))?;
        if customer.email.trim().is_empty() {
            return Err(NotificationError::MissingAddress(customer.id));
        }
        self.mailer
            .send(EmailMessage {
                to: customer.email.clone(),
                subject: Self::subject(order),
                body: Self::body(order, items, customer)?,
            })
            .await
    }
}

/// Direct-message receipts. The owner sends these by hand; the customer is
/// told to expect one.
pub struct DirectMessageReceipt;

#[async_trait]
impl ReceiptSender for DirectMessageReceipt {
    fn channel(&self) -> ReceiptChannel {
        ReceiptChannel::Dm
    }

    fn notice(&self) -> Option<&'static str> {
        Some(DM_NOTICE)
    }

    async fn send(
        &self,
        order: &Order,
        _items: &[OrderItem],
        _customer: Option<&Customer>,
    ) -> Result<(), NotificationError> {
        tracing::info!(order_id = %order.order_id, "receipt left to the owner's direct messages");
        Ok(())
    }
}

/// Social inbox receipts, handled by the owner like direct messages.
pub struct SocialInboxReceipt;

#[async_trait]
impl ReceiptSender for SocialInboxReceipt {
    fn channel(&self) -> ReceiptChannel {
        ReceiptChannel::SocialInbox
    }

    fn notice(&self) -> Option<&'static str> {
        Some(SOCIAL_INBOX_NOTICE)
    }

    async fn send(
        &self,
        order: &Order,
        _items: &[OrderItem],
        _customer: Option<&Customer>,
    ) -> Result<(), NotificationError> {
        tracing::info!(order_id = %order.order_id, "receipt left to the owner's social inbox");
        Ok(())
    }
}

/// No automatic receipt.
pub struct NoReceipt;

#[async_trait]
impl ReceiptSender for NoReceipt {
    fn channel(&self) -> ReceiptChannel {
        ReceiptChannel::None
    }

    async fn send(
        &self,
        _order: &Order,
        _items: &[OrderItem],
        _customer: Option<&Customer>,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Routes a receipt to the sender registered for its channel.
#[derive(Clone)]
pub struct ReceiptDispatcher {
    senders: HashMap<ReceiptChannel, Arc<dyn ReceiptSender>>,
}

impl ReceiptDispatcher {
    /// Creates a dispatcher with a sender for every channel.
    pub fn new<M: Mailer + 'static>(mailer: M) -> Self {
        Self {
            senders: HashMap::new(),
        }
        .with_sender(Arc::new(EmailReceipt::new(mailer)))
        .with_sender(Arc::new(DirectMessageReceipt))
        .with_sender(Arc::new(SocialInboxReceipt))
        .with_sender(Arc::new(NoReceipt))
    }

    /// Registers `sender` for its channel, replacing any previous one.
    pub fn with_sender(mut self, sender: Arc<dyn ReceiptSender>) -> Self {
        self.senders.insert(sender.channel(), sender);
        self
    }

    /// Customer-facing notice for `channel`.
    pub fn notice(&self, channel: ReceiptChannel) -> Option<&'static str> {
        self.senders.get(&channel).and_then(|sender| sender.notice())
    }

    /// Sends the receipt for `order` through the channel it recorded.
    pub async fn send_receipt<C>(
        &self,
        customers: &C,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), NotificationError>
    where
        C: CustomerDirectory + ?Sized,
    {
        let Some(sender) = self.senders.get(&order.receipt_channel_used) else {
            return Ok(());
        };
        let customer = customers.get_customer(order.customer_id).await?;
        sender.send(order, items, customer.as_ref()).await
    }

    /// Sends the receipt and swallows the outcome. Failures are logged and
    /// counted; they never reach the customer.
    #[tracing::instrument(skip_all, fields(order_id = %order.order_id, channel = %order.receipt_channel_used))]
    pub async fn deliver<C>(&self, customers: &C, order: &Order, items: &[OrderItem])
    where
        C: CustomerDirectory + ?Sized,
    {
        if let Err(err) = self.send_receipt(customers, order, items).await {
            tracing::warn!(error = %err, "receipt delivery failed");
            metrics::counter!(
                "receipt_delivery_failures_total",
                "channel" => order.receipt_channel_used.as_str()
            )
            .increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::email::InMemoryMailer;
    use chrono::Utc;
    use common::{CustomerId, Money};
    use domain::{Cart, Product, StoreSettings};
    use rust_decimal_macros::dec;
    use storage::InMemoryStore;

    fn order_for(customer_id: CustomerId, channel: ReceiptChannel) -> (Order, Vec<OrderItem>) {
        let settings = StoreSettings {
            receipt_channel: channel,
            ..StoreSettings::default()
        };
        let order = Order::paid(
            &Cart::new(customer_id),
            &settings,
            Money::new(dec!(12500)),
            Utc::now(),
        );
        let dress = Product::new("Vintage Dress", Money::new(dec!(12500)), 1).unwrap();
        let items = vec![OrderItem::capture(order.id, &dress, 1).unwrap()];
        (order, items)
    }

    #[tokio::test]
    async fn email_receipt_goes_to_customer() {
        let store = InMemoryStore::new();
        let customer = Customer::new("ada@example.com", "ada");
        store.save_customer(&customer).await.unwrap();
        let mailer = InMemoryMailer::new();
        let dispatcher = ReceiptDispatcher::new(mailer.clone());
        let (order, items) = order_for(customer.id, ReceiptChannel::Email);

        dispatcher.send_receipt(&store, &order, &items).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert_eq!(sent[0].subject, format!("Order Confirmed - #{}", order.order_id));
        assert!(sent[0].body.contains("Vintage Dress x1"));
        assert!(sent[0].body.contains("Total paid: ₦12500.00"));
    }

    #[tokio::test]
    async fn email_without_account_is_an_error() {
        let store = InMemoryStore::new();
        let dispatcher = ReceiptDispatcher::new(InMemoryMailer::new());
        let (order, items) = order_for(CustomerId::new(), ReceiptChannel::Email);

        let result = dispatcher.send_receipt(&store, &order, &items).await;
        assert!(matches!(result, Err(NotificationError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed_by_deliver() {
        let store = InMemoryStore::new();
        let customer = Customer::new("ada@example.com", "ada");
        store.save_customer(&customer).await.unwrap();
        let mailer = InMemoryMailer::new();
        mailer.set_fail_on_send(true);
        let dispatcher = ReceiptDispatcher::new(mailer.clone());
        let (order, items) = order_for(customer.id, ReceiptChannel::Email);

        dispatcher.deliver(&store, &order, &items).await;
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn manual_channels_only_notify() {
        let store = InMemoryStore::new();
        let mailer = InMemoryMailer::new();
        let dispatcher = ReceiptDispatcher::new(mailer.clone());

        for channel in [
            ReceiptChannel::Dm,
            ReceiptChannel::SocialInbox,
            ReceiptChannel::None,
        ] {
            let (order, items) = order_for(CustomerId::new(), channel);
            dispatcher.send_receipt(&store, &order, &items).await.unwrap();
        }
        assert!(mailer.sent().is_empty());

        assert_eq!(dispatcher.notice(ReceiptChannel::Dm), Some(DM_NOTICE));
        assert_eq!(
            dispatcher.notice(ReceiptChannel::SocialInbox),
            Some(SOCIAL_INBOX_NOTICE)
        );
        assert_eq!(dispatcher.notice(ReceiptChannel::Email), None);
        assert_eq!(dispatcher.notice(ReceiptChannel::None), None);
    }
}
