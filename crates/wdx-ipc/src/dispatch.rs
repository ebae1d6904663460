//! Provider dispatcher (daemon side, §4.7).
//!
//! Routes incoming provider calls according to each provider's registered
//! [`CallMode`]: `concurrent` providers may run any number of calls in
//! parallel, `serialized` providers process one call at a time, in the
//! order they were issued.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
};

use tokio::sync::Mutex as AsyncMutex;

use crate::{ids::ObjectId, types::CallMode};

struct ProviderEntry {
    call_mode: CallMode,
    /// Held for the duration of a call when `call_mode` is `Serialized`,
    /// forcing the next call to wait for the previous one's future to
    /// resolve. Never touched in `Concurrent` mode.
    serialize_gate: AsyncMutex<()>,
}

/// Routes calls to registered providers under each one's call-mode policy.
#[derive(Default)]
pub struct ProviderDispatcher {
    providers: Mutex<HashMap<ObjectId, Arc<ProviderEntry>>>,
}

impl ProviderDispatcher {
    /// Register `provider_id` with `call_mode`. Re-registering an existing
    /// id replaces its policy (used on `reregister_providers`).
    pub fn register(&self, provider_id: ObjectId, call_mode: CallMode) {
        let entry = Arc::new(ProviderEntry { call_mode, serialize_gate: AsyncMutex::new(()) });
        self.providers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(provider_id, entry);
    }

    /// Drop a provider's registration. Any call already dispatched to it
    /// runs to completion.
    pub fn unregister(&self, provider_id: ObjectId) {
        self.providers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&provider_id);
    }

    /// Look up a provider's current call mode, if registered.
    #[must_use]
    pub fn call_mode_of(&self, provider_id: ObjectId) -> Option<CallMode> {
        self.providers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&provider_id)
            .map(|entry| entry.call_mode)
    }

    /// Run `call` against `provider_id` under its registered policy. A
    /// provider with no registration runs concurrently by default (nothing
    /// to serialize against).
    pub async fn dispatch<F, Fut, T>(&self, provider_id: ObjectId, call: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let entry =
            self.providers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(&provider_id).cloned();

        match entry {
            Some(entry) if entry.call_mode == CallMode::Serialized => {
                let _gate = entry.serialize_gate.lock().await;
                call().await
            }
            _ => call().await,
        }
    }
}
