//! The engine's `secp256k1_context`.

use rand::{CryptoRng, RngCore};
use wasm_secp256k1_runtime::{Pointer, WasmResult, WasmTrap};
use zeroize::Zeroizing;

use crate::arena::{self, Slot};
use crate::error::{Error, Result};
use crate::guest::{Export, Guest};
use crate::types::{flags, Status};

/// Pointer to the one context a binding creates. It is never destroyed or
/// recreated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContextHandle(Pointer);

impl ContextHandle {
    /// Create a context that can both sign and verify.
    pub fn create<G: Guest>(guest: &mut G) -> WasmResult<Self> {
        let ptr = Pointer::from_ret(guest.invoke(
            Export::ContextCreate,
            &[flags::CONTEXT_SIGN | flags::CONTEXT_VERIFY],
        )?);
        if ptr.is_null() {
            return Err(WasmTrap::Engine(
                "secp256k1_context_create returned NULL".to_string(),
            ));
        }
        tracing::debug!(context = %ptr, "context created");
        Ok(Self(ptr))
    }

    pub fn arg(self) -> i32 {
        self.0.as_arg()
    }

    /// Re-blind the context with a fresh 32-byte seed. The seed is wiped from
    /// both host and guest memory afterwards.
    pub fn randomize<G: Guest, R: RngCore + CryptoRng>(
        self,
        guest: &mut G,
        seed: Slot,
        rng: &mut R,
    ) -> Result<()> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        rng.try_fill_bytes(&mut bytes[..])
            .map_err(|e| Error::Entropy(e.to_string()))?;

        arena::put_bytes(&mut guest.memory(), &bytes[..], seed)?;
        let code = guest.invoke(Export::ContextRandomize, &[self.arg(), seed.arg()]);
        arena::wipe(&mut guest.memory(), seed)?;

        match Status::from_code(code?) {
            Status::Success => Ok(()),
            Status::Failure => Err(Error::RandomizationFailed),
        }
    }
}
