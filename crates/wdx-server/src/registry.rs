//! Daemon-side state that outlives any single connection: the set of
//! registered devices, parameter providers, and file providers a registered
//! client has handed over (§3 "Provider registration record", "Device
//! record").
//!
//! A managed object id (and the [`Manager`](wdx_ipc::Manager) it was
//! allocated on) is only meaningful for the lifetime of one connection;
//! everything here is keyed by something that survives a reconnect instead
//! — a [`DeviceId`], a selector, or an assigned file id — so the HTTP
//! frontend and the provider dispatcher have something stable to route by.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use wdx_ipc::{CallMode, DeviceId, DeviceRegistration, ManagedObject, ObjectId, ParameterProviderProxy};

/// Everything recorded about one successfully registered file provider.
pub struct FileProviderEntry {
    /// The daemon-side callback handle calls are actually issued against.
    pub proxy: Arc<wdx_files::FileProviderProxy>,
    /// Parameter-instance path this provider serves, used to route a
    /// `POST /files?context=…` upload-id request to it.
    pub context: String,
    /// Dispatch policy this provider was registered under.
    pub call_mode: CallMode,
}

/// Registered parameter providers, devices, and file providers, shared by
/// every connection this daemon serves.
///
/// Mirrors `lockframe-server::registry::ConnectionRegistry` in shape (a
/// mutex-guarded map per resource kind) but keyed by domain identity rather
/// than connection id, since the whole point of this registry is to
/// survive the connection it was populated from.
#[derive(Default)]
pub struct DaemonRegistry {
    devices: Mutex<HashMap<DeviceId, DeviceRegistration>>,
    parameter_providers: Mutex<HashMap<ObjectId, Arc<ParameterProviderProxy>>>,
    file_providers: Mutex<HashMap<String, FileProviderEntry>>,
    next_file_id: Mutex<u64>,
}

impl DaemonRegistry {
    /// Record `devices`, replacing any existing entry with the same
    /// `(slot, collection_id)` identity.
    pub fn register_devices(&self, devices: Vec<DeviceRegistration>) {
        let mut table = self.devices.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for device in devices {
            table.insert(device.device_id(), device);
        }
    }

    /// Drop `ids` from the device registry.
    pub fn unregister_devices(&self, ids: &[DeviceId]) {
        let mut table = self.devices.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for id in ids {
            table.remove(id);
        }
    }

    /// Drop every device in `collection_id`.
    pub fn unregister_all_devices(&self, collection_id: u32) {
        let mut table = self.devices.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        table.retain(|id, _| id.collection_id != collection_id);
    }

    /// Number of devices currently registered, for diagnostics and tests.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Record `proxy` as the callback handle for parameter provider
    /// `provider_id`.
    pub fn register_parameter_provider(&self, provider_id: ObjectId, proxy: Arc<ParameterProviderProxy>) {
        self.parameter_providers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(provider_id, proxy);
    }

    /// Drop parameter provider `provider_id`.
    pub fn unregister_parameter_provider(&self, provider_id: ObjectId) {
        self.parameter_providers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&provider_id);
    }

    /// Look up the callback handle for parameter provider `provider_id`.
    #[must_use]
    pub fn parameter_provider(&self, provider_id: ObjectId) -> Option<Arc<ParameterProviderProxy>> {
        self.parameter_providers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(&provider_id).cloned()
    }

    /// Assign a fresh file id and record `proxy` as the backend serving it
    /// under `context`. Returns the newly assigned file id.
    pub fn register_file_provider(
        &self,
        proxy: Arc<wdx_files::FileProviderProxy>,
        context: String,
        call_mode: CallMode,
    ) -> String {
        let mut counter = self.next_file_id.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *counter += 1;
        let file_id = format!("file-{counter}");
        drop(counter);
        self.file_providers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(file_id.clone(), FileProviderEntry { proxy, context, call_mode });
        file_id
    }

    /// Re-register `file_id` against `proxy`, reusing the file id a prior
    /// connection was assigned instead of minting a new one (§4.6
    /// "Reregistration").
    pub fn reregister_file_provider(
        &self,
        file_id: String,
        proxy: Arc<wdx_files::FileProviderProxy>,
        context: String,
        call_mode: CallMode,
    ) {
        self.file_providers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(file_id, FileProviderEntry { proxy, context, call_mode });
    }

    /// Drop every file provider entry whose context is any of `contexts`.
    pub fn unregister_file_providers_by_context(&self, contexts: &[String]) {
        let mut table = self.file_providers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        table.retain(|_, entry| !contexts.contains(&entry.context));
    }

    /// Drop every file provider entry whose proxy object id is in `ids`,
    /// used when a client unregisters file providers by the ids it was
    /// handed during the three-step handshake rather than by file id.
    pub fn unregister_file_providers_by_object_id(&self, ids: &[ObjectId]) {
        let mut table = self.file_providers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        table.retain(|_, entry| !ids.contains(&entry.proxy.id()));
    }

    /// Look up the provider serving `file_id`, if any file provider has
    /// been assigned that id.
    #[must_use]
    pub fn file_provider_by_id(&self, file_id: &str) -> Option<Arc<wdx_files::FileProviderProxy>> {
        self.file_providers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(file_id)
            .map(|entry| Arc::clone(&entry.proxy))
    }

    /// Look up the provider serving `context`, used to route
    /// `POST /files?context=…`. Picks the entry whose registered context is
    /// the longest prefix of `context` (the most specific match).
    #[must_use]
    pub fn file_provider_by_context(&self, context: &str) -> Option<Arc<wdx_files::FileProviderProxy>> {
        let table = self.file_providers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        table
            .values()
            .filter(|entry| context == entry.context || context.starts_with(&format!("{}.", entry.context)))
            .max_by_key(|entry| entry.context.len())
            .map(|entry| Arc::clone(&entry.proxy))
    }
}
