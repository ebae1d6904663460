//! The object store: owns every managed object on one transport connection,
//! and the per-object call-reference counters that gate destruction.

use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex},
};

use async_trait::async_trait;

use crate::{
    error::{IpcError, Result},
    ids::{ObjectId, ObjectIdGenerator, BACKEND_OBJECT_ID},
};

/// An entity owned by an [`ObjectStore`] and addressable by a 32-bit id over
/// a transport: a proxy (forwards calls to a remote stub) or a stub
/// (decodes calls and invokes a local target).
#[async_trait]
pub trait ManagedObject: Send + Sync {
    /// This object's id within its store.
    fn id(&self) -> ObjectId;

    /// Handle a message addressed to this object. `body` is positioned past
    /// the `target_object_id` header the manager already consumed.
    async fn handle_message(&self, body: &[u8]) -> Result<()>;

    /// Called once for every object still in the store when its connection's
    /// transport is torn down (§5 Cancellation). Proxies holding outstanding
    /// calls should resolve them as dropped rather than leave callers
    /// waiting forever; objects with nothing in flight can ignore this.
    fn on_transport_closed(&self) {}
}

struct MetaInner {
    call_counter: u64,
    marked_to_destroy: bool,
}

/// Per-object destruction gate: tracks how many handlers are currently
/// dispatched to the object and blocks removal until that count reaches
/// zero.
///
/// Mirrors the original `object_meta` directly: a plain mutex + condition
/// variable pair rather than an async lock, since the critical sections are
/// a handful of integer operations and never span an `.await`.
pub struct ObjectMeta {
    inner: Mutex<MetaInner>,
    condvar: Condvar,
}

impl Default for ObjectMeta {
    fn default() -> Self {
        Self { inner: Mutex::new(MetaInner { call_counter: 0, marked_to_destroy: false }), condvar: Condvar::new() }
    }
}

impl ObjectMeta {
    /// Attempt to begin a call against this object: increments the call
    /// counter and returns a guard that decrements it again on drop. Fails
    /// if the object is already marked for destruction (checked twice, per
    /// the original implementation's comment, to avoid racing a destroying
    /// thread).
    fn try_begin_call(self: &Arc<Self>) -> Option<CountGuard> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.marked_to_destroy {
            return None;
        }
        inner.call_counter += 1;
        if inner.marked_to_destroy {
            inner.call_counter -= 1;
            return None;
        }
        drop(inner);
        Some(CountGuard { meta: Arc::clone(self) })
    }

    fn mark_and_wait_until_zero(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.marked_to_destroy = true;
        while inner.call_counter != 0 {
            inner = self.condvar.wait(inner).unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

/// RAII token representing one in-flight call against a managed object.
/// Dropping it decrements the object's call counter and, if it reaches
/// zero, wakes any thread waiting to destroy the object.
struct CountGuard {
    meta: Arc<ObjectMeta>,
}

impl Drop for CountGuard {
    fn drop(&mut self) {
        let mut inner = self.meta.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.call_counter -= 1;
        if inner.call_counter == 0 {
            self.meta.condvar.notify_all();
        }
    }
}

struct StoreEntry {
    object: Arc<dyn ManagedObject>,
    meta: Arc<ObjectMeta>,
}

/// Owns every managed object for one transport connection.
///
/// All operations lock a single internal mutex for the duration of the
/// container access only; the heavier per-object call accounting lives in
/// [`ObjectMeta`] so a long-running handler never blocks unrelated store
/// operations.
pub struct ObjectStore {
    connection_name: String,
    objects: Mutex<HashMap<ObjectId, StoreEntry>>,
    id_generator: ObjectIdGenerator,
}

impl ObjectStore {
    /// Create an empty store for a connection named `connection_name`.
    #[must_use]
    pub fn new(connection_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
            objects: Mutex::new(HashMap::new()),
            id_generator: ObjectIdGenerator::default(),
        }
    }

    /// Name of the connection this store belongs to.
    #[must_use]
    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    /// Hand out a fresh object id, never reused within this store's
    /// process.
    #[must_use]
    pub fn generate_object_id(&self) -> ObjectId {
        self.id_generator.generate()
    }

    /// Insert `object`. Fails if its id is already present.
    pub fn add(&self, object: Arc<dyn ManagedObject>) -> Result<()> {
        let id = object.id();
        let mut objects = self.objects.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if objects.contains_key(&id) {
            return Err(IpcError::Store(format!("duplicate id {id}")));
        }
        objects.insert(id, StoreEntry { object, meta: Arc::new(ObjectMeta::default()) });
        Ok(())
    }

    /// Look up the object addressed by `id`.
    pub fn get(&self, id: ObjectId) -> Result<Arc<dyn ManagedObject>> {
        let objects = self.objects.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        objects.get(&id).map(|entry| Arc::clone(&entry.object)).ok_or(IpcError::ObjectGone(id))
    }

    /// Look up the call-accounting metadata for `id`, if the object is
    /// still present.
    #[must_use]
    pub fn get_meta(&self, id: ObjectId) -> Option<Arc<ObjectMeta>> {
        let objects = self.objects.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        objects.get(&id).map(|entry| Arc::clone(&entry.meta))
    }

    /// Remove `id` immediately, without waiting for in-flight calls. Used
    /// when the caller has already established (e.g. via
    /// [`ObjectStore::remove_blocking`]) that it is safe to do so.
    pub fn remove(&self, id: ObjectId) {
        let mut objects = self.objects.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        objects.remove(&id);
    }

    /// Mark `id` for destruction, block until every in-flight call against
    /// it has completed, then remove it.
    ///
    /// Blocks the calling thread on a condition variable; callers on an
    /// async runtime should run this via `spawn_blocking`.
    pub fn remove_blocking(&self, id: ObjectId) {
        let meta = {
            let objects = self.objects.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            objects.get(&id).map(|entry| Arc::clone(&entry.meta))
        };
        if let Some(meta) = meta {
            meta.mark_and_wait_until_zero();
            self.remove(id);
        }
    }

    /// Remove every object matching `predicate`.
    pub fn remove_where(&self, predicate: impl Fn(&dyn ManagedObject) -> bool) {
        let mut objects = self.objects.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        objects.retain(|_, entry| !predicate(entry.object.as_ref()));
    }

    /// Whether any object other than the backend object (id `0`) exists.
    #[must_use]
    pub fn has_generated_objects(&self) -> bool {
        let objects = self.objects.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        objects.keys().any(|&id| id != BACKEND_OBJECT_ID)
    }

    /// Invoke `on_transport_closed` on every object currently in the store
    /// and clear every non-backend one, per §5 Cancellation: once the
    /// transport is gone nothing will ever reply to an in-flight call or
    /// address a generated object again.
    pub fn notify_transport_closed(&self) {
        let objects = self.objects.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for entry in objects.values() {
            entry.object.on_transport_closed();
        }
        drop(objects);
        self.remove_where(|obj| obj.id() != BACKEND_OBJECT_ID);
    }

    /// Return the first object matching `predicate`, if any.
    #[must_use]
    pub fn find(&self, predicate: impl Fn(&dyn ManagedObject) -> bool) -> Option<Arc<dyn ManagedObject>> {
        let objects = self.objects.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        objects.values().find(|entry| predicate(entry.object.as_ref())).map(|entry| Arc::clone(&entry.object))
    }

    /// Begin a call against `id`: returns `None` if the object is unknown
    /// or already marked for destruction. The returned guard must be held
    /// for the duration of the dispatched call.
    #[must_use]
    pub(crate) fn try_begin_call(&self, id: ObjectId) -> Option<(Arc<dyn ManagedObject>, impl Drop)> {
        let objects = self.objects.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = objects.get(&id)?;
        let guard = entry.meta.try_begin_call()?;
        Some((Arc::clone(&entry.object), guard))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Stub(ObjectId);

    #[async_trait]
    impl ManagedObject for Stub {
        fn id(&self) -> ObjectId {
            self.0
        }

        async fn handle_message(&self, _body: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    struct NotifyingStub {
        id: ObjectId,
        notified: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl ManagedObject for NotifyingStub {
        fn id(&self) -> ObjectId {
            self.id
        }

        async fn handle_message(&self, _body: &[u8]) -> Result<()> {
            Ok(())
        }

        fn on_transport_closed(&self) {
            self.notified.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn notify_transport_closed_calls_every_object_and_clears_generated_ones() {
        let store = ObjectStore::new("test");
        let notified = Arc::new(std::sync::atomic::AtomicBool::new(false));
        store.add(Arc::new(Stub(BACKEND_OBJECT_ID))).unwrap();
        let generated_id = store.generate_object_id();
        store.add(Arc::new(NotifyingStub { id: generated_id, notified: Arc::clone(&notified) })).unwrap();

        store.notify_transport_closed();

        assert!(notified.load(std::sync::atomic::Ordering::SeqCst));
        assert!(store.get(BACKEND_OBJECT_ID).is_ok(), "backend object survives a transport close");
        assert!(store.get(generated_id).is_err(), "generated objects are cleared");
    }

    #[test]
    fn duplicate_id_insert_fails() {
        let store = ObjectStore::new("test");
        store.add(Arc::new(Stub(1))).unwrap();
        let err = store.add(Arc::new(Stub(1))).unwrap_err();
        assert!(matches!(err, IpcError::Store(_)));
    }

    #[test]
    fn get_on_absent_id_fails() {
        let store = ObjectStore::new("test");
        let err = store.get(42).unwrap_err();
        assert!(matches!(err, IpcError::ObjectGone(42)));
    }

    #[test]
    fn has_generated_objects_ignores_backend_object() {
        let store = ObjectStore::new("test");
        store.add(Arc::new(Stub(BACKEND_OBJECT_ID))).unwrap();
        assert!(!store.has_generated_objects());
        store.add(Arc::new(Stub(store.generate_object_id()))).unwrap();
        assert!(store.has_generated_objects());
    }

    #[test]
    fn insert_then_remove_all_clears_generated_objects() {
        let store = ObjectStore::new("test");
        let ids: Vec<_> = (0..5).map(|_| store.generate_object_id()).collect();
        for id in &ids {
            store.add(Arc::new(Stub(*id))).unwrap();
        }
        for id in &ids {
            store.remove(*id);
        }
        assert!(!store.has_generated_objects());
    }

    #[test]
    fn remove_where_erases_matching_entries() {
        let store = ObjectStore::new("test");
        store.add(Arc::new(Stub(1))).unwrap();
        store.add(Arc::new(Stub(2))).unwrap();
        store.remove_where(|obj| obj.id() == 1);
        assert!(store.get(1).is_err());
        assert!(store.get(2).is_ok());
    }

    #[test]
    fn find_returns_first_match() {
        let store = ObjectStore::new("test");
        store.add(Arc::new(Stub(7))).unwrap();
        let found = store.find(|obj| obj.id() == 7);
        assert!(found.is_some());
        assert!(store.find(|obj| obj.id() == 99).is_none());
    }

    #[test]
    fn call_guard_increments_and_decrements_counter() {
        let store = ObjectStore::new("test");
        store.add(Arc::new(Stub(1))).unwrap();
        let meta = store.get_meta(1).unwrap();
        {
            let (_obj, _guard) = store.try_begin_call(1).unwrap();
            assert_eq!(meta.inner.lock().unwrap().call_counter, 1);
        }
        assert_eq!(meta.inner.lock().unwrap().call_counter, 0);
    }

    #[test]
    fn marked_for_destruction_rejects_new_calls() {
        let store = ObjectStore::new("test");
        store.add(Arc::new(Stub(1))).unwrap();
        let meta = store.get_meta(1).unwrap();
        meta.inner.lock().unwrap().marked_to_destroy = true;
        assert!(store.try_begin_call(1).is_none());
    }

    #[test]
    fn remove_blocking_waits_for_in_flight_call() {
        let store = Arc::new(ObjectStore::new("test"));
        store.add(Arc::new(Stub(1))).unwrap();
        let (_obj, guard) = store.try_begin_call(1).unwrap();

        let store_clone = Arc::clone(&store);
        let handle = std::thread::spawn(move || store_clone.remove_blocking(1));

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(store.get(1).is_ok(), "object must survive while a call is in flight");

        drop(guard);
        handle.join().unwrap();
        assert!(store.get(1).is_err());
    }
}
