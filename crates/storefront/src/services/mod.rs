//! Outbound notification services used after checkout.

pub mod email;
pub mod receipt;

pub use email::{EmailMessage, InMemoryMailer, LogMailer, Mailer};
pub use receipt::{
    DM_NOTICE, DirectMessageReceipt, EmailReceipt, NoReceipt, ReceiptDispatcher, ReceiptSender,
    SOCIAL_INBOX_NOTICE, SocialInboxReceipt,
};
