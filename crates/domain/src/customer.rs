//! Customer accounts as seen by the storefront.

use common::CustomerId;
use serde::{Deserialize, Serialize};

/// The slice of a customer account the storefront needs. Authentication
/// lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    pub username: String,
}

impl Customer {
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new(),
            email: email.into(),
            username: username.into(),
        }
    }
}
