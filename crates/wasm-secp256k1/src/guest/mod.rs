//! The engine side of the boundary.
//!
//! A [`Guest`] is anything that exposes the libsecp256k1 C ABI over a linear
//! memory: entry points are called by logical [`Export`] with `i32`
//! arguments, and every buffer lives in guest memory.

pub mod wasm;

#[cfg(test)]
pub(crate) mod fake;

use wasm_secp256k1_runtime::{LinearMemory, WasmResult};

pub use wasm::WasmGuest;

/// Entry points the binding calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Export {
    Init,
    Malloc,
    ContextCreate,
    ContextRandomize,
    SeckeyVerify,
    PubkeyCreate,
    PubkeyParse,
    PubkeySerialize,
    SignatureParseCompact,
    Verify,
    SignRecoverable,
    RecoverableSignatureSerializeCompact,
    RecoverableSignatureParseCompact,
    Recover,
    Ecdh,
    SeckeyTweakAdd,
    SeckeyTweakMul,
    PubkeyTweakAdd,
    PubkeyTweakMul,
    Sha256Initialize,
    Sha256Write,
    Sha256Finalize,
}

impl Export {
    pub const ALL: [Export; 22] = [
        Export::Init,
        Export::Malloc,
        Export::ContextCreate,
        Export::ContextRandomize,
        Export::SeckeyVerify,
        Export::PubkeyCreate,
        Export::PubkeyParse,
        Export::PubkeySerialize,
        Export::SignatureParseCompact,
        Export::Verify,
        Export::SignRecoverable,
        Export::RecoverableSignatureSerializeCompact,
        Export::RecoverableSignatureParseCompact,
        Export::Recover,
        Export::Ecdh,
        Export::SeckeyTweakAdd,
        Export::SeckeyTweakMul,
        Export::PubkeyTweakAdd,
        Export::PubkeyTweakMul,
        Export::Sha256Initialize,
        Export::Sha256Write,
        Export::Sha256Finalize,
    ];

    /// Default (unminified) symbol name.
    pub fn symbol(self) -> &'static str {
        match self {
            Export::Init => "__wasm_call_ctors",
            Export::Malloc => "malloc",
            Export::ContextCreate => "secp256k1_context_create",
            Export::ContextRandomize => "secp256k1_context_randomize",
            Export::SeckeyVerify => "secp256k1_ec_seckey_verify",
            Export::PubkeyCreate => "secp256k1_ec_pubkey_create",
            Export::PubkeyParse => "secp256k1_ec_pubkey_parse",
            Export::PubkeySerialize => "secp256k1_ec_pubkey_serialize",
            Export::SignatureParseCompact => "secp256k1_ecdsa_signature_parse_compact",
            Export::Verify => "secp256k1_ecdsa_verify",
            Export::SignRecoverable => "secp256k1_ecdsa_sign_recoverable",
            Export::RecoverableSignatureSerializeCompact => {
                "secp256k1_ecdsa_recoverable_signature_serialize_compact"
            }
            Export::RecoverableSignatureParseCompact => {
                "secp256k1_ecdsa_recoverable_signature_parse_compact"
            }
            Export::Recover => "secp256k1_ecdsa_recover",
            Export::Ecdh => "secp256k1_ecdh",
            Export::SeckeyTweakAdd => "secp256k1_ec_seckey_tweak_add",
            Export::SeckeyTweakMul => "secp256k1_ec_seckey_tweak_mul",
            Export::PubkeyTweakAdd => "secp256k1_ec_pubkey_tweak_add",
            Export::PubkeyTweakMul => "secp256k1_ec_pubkey_tweak_mul",
            Export::Sha256Initialize => "secp256k1_sha256_initialize",
            Export::Sha256Write => "secp256k1_sha256_write",
            Export::Sha256Finalize => "secp256k1_sha256_finalize",
        }
    }

    /// Number of `i32` parameters.
    pub fn arity(self) -> usize {
        match self {
            Export::Init => 0,
            Export::Malloc | Export::ContextCreate | Export::Sha256Initialize => 1,
            Export::ContextRandomize | Export::SeckeyVerify | Export::Sha256Finalize => 2,
            Export::PubkeyCreate
            | Export::SignatureParseCompact
            | Export::SeckeyTweakAdd
            | Export::SeckeyTweakMul
            | Export::PubkeyTweakAdd
            | Export::PubkeyTweakMul
            | Export::Sha256Write => 3,
            Export::PubkeyParse
            | Export::Verify
            | Export::RecoverableSignatureSerializeCompact
            | Export::RecoverableSignatureParseCompact
            | Export::Recover => 4,
            Export::PubkeySerialize => 5,
            Export::SignRecoverable | Export::Ecdh => 6,
        }
    }

    /// Whether the entry point returns an `i32`. The others return nothing.
    pub fn has_result(self) -> bool {
        !matches!(
            self,
            Export::Init | Export::Sha256Initialize | Export::Sha256Write | Export::Sha256Finalize
        )
    }

    /// Optional exports may be absent; operations that need them report
    /// `Error::Unsupported`.
    pub fn is_optional(self) -> bool {
        matches!(
            self,
            Export::Sha256Initialize | Export::Sha256Write | Export::Sha256Finalize
        )
    }
}

/// An instantiated engine.
pub trait Guest {
    /// Call `export` with `args`. Returns the `i32` result, or 0 for
    /// entry points without one.
    fn invoke(&mut self, export: Export, args: &[i32]) -> WasmResult<i32>;

    /// View of the guest's memory as it is right now.
    fn memory(&mut self) -> LinearMemory<'_>;

    /// Whether `export` can be invoked.
    fn provides(&self, export: Export) -> bool {
        !export.is_optional()
    }
}

impl<G: Guest + ?Sized> Guest for Box<G> {
    fn invoke(&mut self, export: Export, args: &[i32]) -> WasmResult<i32> {
        (**self).invoke(export, args)
    }

    fn memory(&mut self) -> LinearMemory<'_> {
        (**self).memory()
    }

    fn provides(&self, export: Export) -> bool {
        (**self).provides(export)
    }
}
