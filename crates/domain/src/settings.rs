//! Owner-controlled store settings (a single row).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cart::FulfillmentMethod;
use crate::error::DomainError;

/// Primary key of the one settings row.
pub const SETTINGS_ID: i32 = 1;

pub const DEFAULT_STORE_NAME: &str = "ThriftElegance";

pub const DEFAULT_WHATSAPP_TEMPLATE: &str =
    "Hi {{store_name}}, I just completed order #{{order_id}} for ₦{{total_paid}}.";

/// How purchase confirmation reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptChannel {
    #[default]
    Email,
    /// Direct message.
    Dm,
    SocialInbox,
    /// No automatic receipt.
    None,
}

impl ReceiptChannel {
    pub const ALL: [ReceiptChannel; 4] = [
        ReceiptChannel::Email,
        ReceiptChannel::Dm,
        ReceiptChannel::SocialInbox,
        ReceiptChannel::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptChannel::Email => "EMAIL",
            ReceiptChannel::Dm => "DM",
            ReceiptChannel::SocialInbox => "SOCIAL_INBOX",
            ReceiptChannel::None => "NONE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReceiptChannel::Email => "Email receipt",
            ReceiptChannel::Dm => "Send receipt to direct message",
            ReceiptChannel::SocialInbox => "Send receipt to social inbox",
            ReceiptChannel::None => "Do not send a receipt automatically",
        }
    }
}

impl std::fmt::Display for ReceiptChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReceiptChannel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReceiptChannel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == s)
            .ok_or_else(|| DomainError::UnknownReceiptChannel(s.to_string()))
    }
}

/// Store-wide configuration read by checkout.
///
/// `Default` is the in-memory fallback used when the persisted row cannot
/// be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub id: i32,
    pub store_name: String,
    pub logo: Option<String>,
    pub allow_pickup: bool,
    pub allow_waybill_delivery: bool,
    /// Copied into every order at purchase time.
    pub pre_purchase_instruction: String,
    pub receipt_channel: ReceiptChannel,
    /// International format without `+` or spaces, e.g. `2348012345678`.
    pub owner_whatsapp_number: String,
    pub whatsapp_message_template: String,
    pub auto_open_whatsapp_on_checkout: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            id: SETTINGS_ID,
            store_name: DEFAULT_STORE_NAME.to_string(),
            logo: None,
            allow_pickup: true,
            allow_waybill_delivery: true,
            pre_purchase_instruction: String::new(),
            receipt_channel: ReceiptChannel::default(),
            owner_whatsapp_number: String::new(),
            whatsapp_message_template: DEFAULT_WHATSAPP_TEMPLATE.to_string(),
            auto_open_whatsapp_on_checkout: true,
        }
    }
}

impl StoreSettings {
    /// True when the owner currently allows `method`.
    pub fn allows(&self, method: FulfillmentMethod) -> bool {
        match method {
            FulfillmentMethod::Pickup => self.allow_pickup,
            FulfillmentMethod::Waybill => self.allow_waybill_delivery,
        }
    }

    /// Methods a customer may currently pick. Empty if the owner disabled both.
    pub fn enabled_methods(&self) -> Vec<FulfillmentMethod> {
        FulfillmentMethod::ALL
            .into_iter()
            .filter(|method| self.allows(*method))
            .collect()
    }

    /// The owner's WhatsApp number reduced to digits, if one is configured.
    pub fn whatsapp_digits(&self) -> Option<String> {
        let digits: String = self
            .owner_whatsapp_number
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        (!digits.is_empty()).then_some(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_singleton_row_with_store_name() {
        let settings = StoreSettings::default();
        assert_eq!(settings.id, SETTINGS_ID);
        assert_eq!(settings.store_name, "ThriftElegance");
        assert!(settings.allow_pickup);
        assert!(settings.allow_waybill_delivery);
        assert_eq!(settings.receipt_channel, ReceiptChannel::Email);
    }

    #[test]
    fn allows_follows_flags() {
        let settings = StoreSettings {
            allow_waybill_delivery: false,
            ..StoreSettings::default()
        };
        assert!(settings.allows(FulfillmentMethod::Pickup));
        assert!(!settings.allows(FulfillmentMethod::Waybill));
        assert_eq!(settings.enabled_methods(), vec![FulfillmentMethod::Pickup]);
    }

    #[test]
    fn both_methods_may_be_disabled() {
        let settings = StoreSettings {
            allow_pickup: false,
            allow_waybill_delivery: false,
            ..StoreSettings::default()
        };
        assert!(settings.enabled_methods().is_empty());
    }

    #[test]
    fn receipt_channel_codes() {
        for channel in ReceiptChannel::ALL {
            assert_eq!(channel.as_str().parse::<ReceiptChannel>().unwrap(), channel);
        }
        let json = serde_json::to_string(&ReceiptChannel::SocialInbox).unwrap();
        assert_eq!(json, "\"SOCIAL_INBOX\"");
        assert!("SMS".parse::<ReceiptChannel>().is_err());
    }

    #[test]
    fn whatsapp_digits_strips_formatting() {
        let mut settings = StoreSettings::default();
        assert_eq!(settings.whatsapp_digits(), None);
        settings.owner_whatsapp_number = "+234 801 234 5678".to_string();
        assert_eq!(settings.whatsapp_digits().as_deref(), Some("2348012345678"));
    }
}
