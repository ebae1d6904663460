//! Managed object identifiers.

use std::sync::atomic::{AtomicU32, Ordering};

/// Identifies a managed object within a single transport connection.
pub type ObjectId = u32;

/// Reserved id of the backend object, on which the registration lifecycle
/// runs.
pub const BACKEND_OBJECT_ID: ObjectId = 0;

/// First id handed out by [`crate::ObjectStore::generate_object_id`]. Chosen
/// well above `0` so a stray off-by-one never collides with the backend
/// object.
pub const GENERATED_OBJECT_IDS_START: ObjectId = 1000;

/// Monotonically increasing id generator, shared by every connection's
/// object store within a process.
#[derive(Debug)]
pub struct ObjectIdGenerator {
    next: AtomicU32,
}

impl Default for ObjectIdGenerator {
    fn default() -> Self {
        Self { next: AtomicU32::new(GENERATED_OBJECT_IDS_START) }
    }
}

impl ObjectIdGenerator {
    /// Hand out a fresh id, never reused within this generator's lifetime.
    pub fn generate(&self) -> ObjectId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
