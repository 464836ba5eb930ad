//! Pointer arena: fixed guest regions allocated once and reused by every call.
//!
//! Nothing here is ever freed. Each slot has one purpose, and only
//! [`crate::binding`] writes the secret-key slot.

use wasm_secp256k1_runtime::{LinearMemory, Pointer, WasmResult, WasmTrap};
use zeroize::Zeroizing;

use crate::guest::{Export, Guest};
use crate::types::lens;

/// A region of guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    pub ptr: Pointer,
    pub size: u32,
}

impl Slot {
    pub fn arg(self) -> i32 {
        self.ptr.as_arg()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Arena {
    pub secret_key: Slot,
    pub entropy: Slot,
    pub seed: Slot,
    pub shared_secret: Slot,
    pub msg_hash: Slot,
    pub sig_scratch: Slot,
    pub pk_scratch: Slot,
    pub pk_lib: Slot,
    pub sig_lib: Slot,
    pub recoverable_sig_lib: Slot,
    pub recovery_id: Slot,
    pub length: Slot,
    pub sha256_state: Slot,
    pub sha256_chunk: Slot,
}

impl Arena {
    /// `malloc` every slot. A NULL return is out-of-memory.
    pub fn allocate<G: Guest>(guest: &mut G) -> WasmResult<Self> {
        let mut alloc = |size: u32| -> WasmResult<Slot> {
            let ptr = Pointer::from_ret(guest.invoke(Export::Malloc, &[size as i32])?);
            if ptr.is_null() {
                return Err(WasmTrap::OutOfMemory { requested: size });
            }
            Ok(Slot { ptr, size })
        };

        let arena = Arena {
            secret_key: alloc(lens::SECRET_KEY)?,
            entropy: alloc(lens::NONCE_ENTROPY)?,
            seed: alloc(lens::RANDOM_SEED)?,
            shared_secret: alloc(lens::ECDH_SHARED_SECRET)?,
            msg_hash: alloc(lens::MSG_HASH)?,
            sig_scratch: alloc(lens::SIGNATURE_COMPACT)?,
            pk_scratch: alloc(lens::PUBLIC_KEY_MAX)?,
            pk_lib: alloc(lens::PUBLIC_KEY_LIB)?,
            sig_lib: alloc(lens::SIGNATURE_LIB)?,
            recoverable_sig_lib: alloc(lens::RECOVERABLE_SIGNATURE_LIB)?,
            recovery_id: alloc(lens::WORD)?,
            length: alloc(lens::WORD)?,
            sha256_state: alloc(lens::SHA256_STATE)?,
            sha256_chunk: alloc(lens::SHA256_CHUNK)?,
        };
        tracing::debug!(
            secret_key = %arena.secret_key.ptr,
            sha256_chunk = %arena.sha256_chunk.ptr,
            "arena allocated"
        );
        Ok(arena)
    }
}

/// Copy `data` into `slot`, zero-padding the remainder. Data longer than the
/// slot is rejected before anything is written.
pub(crate) fn put_bytes(mem: &mut LinearMemory<'_>, data: &[u8], slot: Slot) -> WasmResult<()> {
    let size = slot.size as usize;
    if data.len() > size {
        return Err(WasmTrap::OutOfBounds);
    }
    let mut padded = Zeroizing::new(vec![0u8; size]);
    padded[..data.len()].copy_from_slice(data);
    mem.write(slot.ptr, &padded)
}

/// Zero the whole slot.
pub(crate) fn wipe(mem: &mut LinearMemory<'_>, slot: Slot) -> WasmResult<()> {
    mem.fill(slot.ptr, slot.size as usize, 0)
}
