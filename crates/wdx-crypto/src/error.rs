//! Error type for the AES-256-GCM sealed envelope primitive.

use thiserror::Error;

/// Failure modes of key handling and the sealed envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The platform RNG failed to produce key or IV material.
    #[error("failed to generate cryptographic key material")]
    KeyGeneration,
    /// A caller-supplied argument violates an envelope precondition (for
    /// example, empty plaintext, or a ciphertext shorter than IV + tag).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// GCM tag verification failed: the ciphertext was tampered with, or the
    /// wrong key was used.
    #[error("authentication failed: ciphertext could not be verified")]
    AuthFailure,
    /// An unexpected failure in the underlying cipher implementation.
    #[error("internal cryptographic failure")]
    Internal,
}

/// Convenience alias for fallible crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
