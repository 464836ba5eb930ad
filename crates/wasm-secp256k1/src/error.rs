//! Error types for the binding.
//!
//! Every failure an operation can report is an [`Error`]. Messages are tagged
//! with the [`Operation`] that produced them, e.g. `ECDH: Invalid public key`.

use std::fmt;
use thiserror::Error;
use wasm_secp256k1_runtime::WasmTrap;

/// Operation tag carried by operation-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GenerateSecretKey,
    ValidateSecretKey,
    DerivePublicKey,
    Sign,
    Verify,
    Recover,
    Ecdh,
    TweakSecretKeyAdd,
    TweakSecretKeyMul,
    TweakPublicKeyAdd,
    TweakPublicKeyMul,
    ReformatPublicKey,
    Sha256,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::GenerateSecretKey => "gen_sk",
            Operation::ValidateSecretKey => "valid_sk",
            Operation::DerivePublicKey => "sk_to_pk",
            Operation::Sign => "ECDSA sign",
            Operation::Verify => "ECDSA verify",
            Operation::Recover => "ECDSA recover",
            Operation::Ecdh => "ECDH",
            Operation::TweakSecretKeyAdd => "tweak_sk_add",
            Operation::TweakSecretKeyMul => "tweak_sk_mul",
            Operation::TweakPublicKeyAdd => "tweak_pk_add",
            Operation::TweakPublicKeyMul => "tweak_pk_mul",
            Operation::ReformatPublicKey => "reformat_pk",
            Operation::Sha256 => "SHA-256",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for binding operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Input rejections
    // =========================================================================
    /// Secret key has the wrong length, is zero, is not below the group
    /// order, or was rejected by the engine for this operation.
    #[error("{0}: Invalid private key")]
    InvalidSecretKey(Operation),

    /// Public key could not be parsed, or a tweak produced an invalid point.
    #[error("{0}: Invalid public key")]
    InvalidPublicKey(Operation),

    /// Compact signature bytes could not be parsed.
    #[error("{0}: Unparseable signature")]
    UnparseableSignature(Operation),

    /// Signature parsed but no public key could be recovered from it.
    #[error("{0}: Invalid signature")]
    InvalidSignature(Operation),

    /// Recovery id outside 0..=3.
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(i32),

    // =========================================================================
    // Context
    // =========================================================================
    /// The engine refused the randomization seed.
    #[error("Failed to randomize context")]
    RandomizationFailed,

    /// The host random source failed.
    #[error("random source failure: {0}")]
    Entropy(String),

    // =========================================================================
    // Guest faults
    // =========================================================================
    /// The guest trapped. The instance is poisoned afterwards.
    #[error(transparent)]
    Runtime(#[from] WasmTrap),

    /// An earlier guest fault left the instance unusable.
    #[error("instance is poisoned by an earlier guest fault")]
    Poisoned,

    /// The loaded module does not provide an optional capability.
    #[error("module does not support {0}")]
    Unsupported(&'static str),

    // =========================================================================
    // Loading
    // =========================================================================
    /// Module bytes could not be parsed, compiled, or instantiated.
    #[error("failed to load module: {0}")]
    Load(String),

    /// A required export is absent.
    #[error("module is missing required export `{0}`")]
    MissingExport(String),

    /// The module imports a function the runtime shim does not provide.
    #[error("module imports unsupported function `{module}.{name}`")]
    UnsupportedImport { module: String, name: String },
}

impl Error {
    /// Whether this error leaves the instance poisoned.
    pub fn is_fault(&self) -> bool {
        matches!(self, Error::Runtime(_))
    }
}

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, Error>;
