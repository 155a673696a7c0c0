//! Store policy: read-through access to the settings row.

use domain::{FulfillmentMethod, StoreSettings};
use storage::{SettingsStore, StorageError};

use crate::error::StorefrontError;

/// Reads store settings on every call so owner edits apply to the next
/// request. Never fails: an unreadable row yields the defaults.
#[derive(Clone)]
pub struct StorePolicy<S> {
    store: S,
}

impl<S: SettingsStore> StorePolicy<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current settings, or the defaults if they cannot be read.
    pub async fn load(&self) -> StoreSettings {
        or_default(self.store.load_settings().await)
    }

    /// Replaces the settings row.
    #[tracing::instrument(skip(self, settings), fields(store_name = %settings.store_name))]
    pub async fn save(&self, settings: &StoreSettings) -> Result<(), StorageError> {
        let settings = StoreSettings {
            id: domain::SETTINGS_ID,
            ..settings.clone()
        };
        self.store.save_settings(&settings).await?;
        tracing::info!("store settings updated");
        Ok(())
    }

    /// Fails unless `method` may be selected right now.
    pub async fn ensure_allowed(&self, method: FulfillmentMethod) -> Result<(), StorefrontError> {
        ensure_allowed(&self.load().await, method)
    }
}

/// Fails unless `settings` currently allow `method`.
pub fn ensure_allowed(
    settings: &StoreSettings,
    method: FulfillmentMethod,
) -> Result<(), StorefrontError> {
    if settings.allows(method) {
        Ok(())
    } else {
        Err(StorefrontError::FulfillmentUnavailable { method })
    }
}

/// Unwraps a settings read, substituting the defaults on failure.
pub(crate) fn or_default(result: Result<StoreSettings, StorageError>) -> StoreSettings {
    match result {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %err, "store settings unavailable, using defaults");
            metrics::counter!("store_settings_fallbacks_total").increment(1);
            StoreSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DEFAULT_STORE_NAME, SETTINGS_ID};
    use storage::InMemoryStore;

    #[tokio::test]
    async fn unreadable_settings_fall_back_to_defaults() {
        let store = InMemoryStore::new();
        store.set_fail_settings(true);
        let policy = StorePolicy::new(store);

        let settings = policy.load().await;
        assert_eq!(settings.id, SETTINGS_ID);
        assert_eq!(settings.store_name, DEFAULT_STORE_NAME);
    }

    #[tokio::test]
    async fn owner_edits_apply_on_next_read() {
        let store = InMemoryStore::new();
        let policy = StorePolicy::new(store.clone());
        assert!(policy.load().await.allow_pickup);

        let edited = StoreSettings {
            allow_pickup: false,
            ..policy.load().await
        };
        policy.save(&edited).await.unwrap();

        assert!(!policy.load().await.allow_pickup);
        assert!(matches!(
            policy.ensure_allowed(FulfillmentMethod::Pickup).await,
            Err(StorefrontError::FulfillmentUnavailable {
                method: FulfillmentMethod::Pickup
            })
        ));
        assert!(policy.ensure_allowed(FulfillmentMethod::Waybill).await.is_ok());
    }

    #[tokio::test]
    async fn save_pins_the_singleton_key() {
        let store = InMemoryStore::new();
        let policy = StorePolicy::new(store.clone());
        let stray = StoreSettings {
            id: 7,
            ..StoreSettings::default()
        };
        policy.save(&stray).await.unwrap();
        assert_eq!(policy.load().await.id, SETTINGS_ID);
    }
}
