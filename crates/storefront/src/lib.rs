//! Storefront application services.
//!
//! The checkout engine turns a cart into a paid order inside one storage
//! transaction. Around it sit the cart mutations, the store policy gate,
//! the order archive, the owner studio and post-checkout notifications
//! (receipts and the WhatsApp hand-off).

pub mod archive;
pub mod cart;
pub mod engine;
pub mod error;
pub mod owner;
pub mod policy;
pub mod services;
pub mod whatsapp;

pub use archive::{Invoice, InvoiceLine, OrderArchive, OrderHistory};
pub use cart::{CartLineView, CartOutcome, CartService, CartView, INVALID_COUPON};
pub use engine::{CheckoutEngine, CompletedPurchase};
pub use error::{CheckoutError, NotificationError, Result, StorefrontError};
pub use owner::{
    DashboardSummary, MONTHLY_SALES_MONTHS, MonthlySales, OwnerStudio, QuickEdit,
    RECENT_ORDERS_LIMIT, SALES_WINDOW_DAYS,
};
pub use policy::StorePolicy;
pub use services::{
    DM_NOTICE, InMemoryMailer, LogMailer, Mailer, ReceiptDispatcher, SOCIAL_INBOX_NOTICE,
};
