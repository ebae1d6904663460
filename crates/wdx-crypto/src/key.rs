//! Move-only, self-wiping AES-256 key material.

use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, Result};

/// Size in bytes of an AES-256 key.
pub const KEY_SIZE: usize = 32;

/// A 256-bit AES key.
///
/// `AesKey` never implements `Copy` or `Clone`: a key has exactly one owner
/// at a time. Its backing bytes are wrapped in [`Zeroizing`], which
/// overwrites them with zeroes before the memory is released, whether that
/// happens via an explicit [`AesKey::secure_clear`], a [`AesKey::rotate`],
/// or simply falling out of scope.
pub struct AesKey {
    bytes: Zeroizing<[u8; KEY_SIZE]>,
}

impl AesKey {
    /// Generate a fresh key from the platform RNG.
    ///
    /// # Errors
    /// Returns [`CryptoError::KeyGeneration`] if the RNG cannot be read.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|_| CryptoError::KeyGeneration)?;
        Ok(Self { bytes: Zeroizing::new(bytes) })
    }

    /// Wrap caller-supplied key bytes directly.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes: Zeroizing::new(bytes) }
    }

    /// Borrow the raw key bytes for use by the cipher.
    #[must_use]
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Overwrite the key material with zeroes in place.
    ///
    /// After this call the key is still a valid, usable `AesKey` — just one
    /// whose value is all zero bytes. Callers that want to discard a key
    /// entirely should simply drop it; `secure_clear` is for the case where
    /// the binding must be reused (its `Drop` impl will wipe it again,
    /// which is a harmless no-op on already-zeroed bytes).
    pub fn secure_clear(&mut self) {
        self.bytes.zeroize();
    }

    /// Replace this key with a freshly generated one, moving its current
    /// value into `old` (whatever `old` previously held is wiped first).
    ///
    /// Rust's borrow checker rejects `key.rotate(&mut key)`: two exclusive
    /// references to the same binding cannot coexist, so self-rotation
    /// (rotating a key into itself) is not an expressible call in safe
    /// code, and does not need separate handling here.
    ///
    /// # Errors
    /// Returns [`CryptoError::KeyGeneration`] if the replacement key could
    /// not be generated; `self` and `old` are left unchanged in that case.
    pub fn rotate(&mut self, old: &mut AesKey) -> Result<()> {
        let fresh = AesKey::generate()?;
        let previous_current = std::mem::replace(&mut self.bytes, fresh.bytes);
        old.bytes = previous_current;
        Ok(())
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesKey").field("bytes", &"<redacted>").finish()
    }
}
