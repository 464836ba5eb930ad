//! Scoped ownership of the secret-key slot.

use std::ops::{Deref, DerefMut};

use wasm_secp256k1_runtime::{Pointer, WasmResult};

use super::Core;
use crate::arena;
use crate::guest::Guest;

/// Holds a secret key in guest memory. Dropping the scope wipes the slot,
/// whether the body returned, failed, or panicked.
pub(super) struct SecretKeyScope<'a, G: Guest> {
    core: &'a mut Core<G>,
}

impl<'a, G: Guest> SecretKeyScope<'a, G> {
    pub fn enter(core: &'a mut Core<G>, sk: &[u8; 32]) -> WasmResult<Self> {
        let scope = Self { core };
        let slot = scope.core.arena.secret_key;
        arena::put_bytes(&mut scope.core.guest.memory(), sk, slot)?;
        Ok(scope)
    }

    pub fn ptr(&self) -> Pointer {
        self.core.arena.secret_key.ptr
    }
}

impl<G: Guest> Deref for SecretKeyScope<'_, G> {
    type Target = Core<G>;

    fn deref(&self) -> &Core<G> {
        self.core
    }
}

impl<G: Guest> DerefMut for SecretKeyScope<'_, G> {
    fn deref_mut(&mut self) -> &mut Core<G> {
        self.core
    }
}

impl<G: Guest> Drop for SecretKeyScope<'_, G> {
    fn drop(&mut self) {
        let slot = self.core.arena.secret_key;
        if let Err(trap) = arena::wipe(&mut self.core.guest.memory(), slot) {
            tracing::error!(%trap, slot = %slot.ptr, "failed to wipe secret key slot");
        }
    }
}
