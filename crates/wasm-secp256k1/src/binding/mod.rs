//! `Secp256k1`: the operation surface over one guest instance.
//!
//! Construction runs the guest's static constructors, allocates the arena and
//! creates the context. Every operation then goes through `run`,
//! which refuses to touch a guest that has faulted before.

mod ops;
mod scope;

use std::io::Read;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use wasm_secp256k1_runtime::{Pointer, WasmResult, WasmTrap};

use crate::arena::{self, Arena};
use crate::config::LoadOptions;
use crate::context::ContextHandle;
use crate::error::{Error, Operation, Result};
use crate::guest::{Export, Guest, WasmGuest};
use crate::types::{Format, Status};

use scope::SecretKeyScope;

/// secp256k1 operations backed by a guest engine.
///
/// One instance owns one guest, one arena and one context. Operations take
/// `&mut self`; wrap the instance in a mutex or build one per thread for
/// parallel use.
pub struct Secp256k1<G, R = OsRng> {
    core: Core<G>,
    rng: R,
    poisoned: bool,
}

/// Guest state the operations work on.
pub(crate) struct Core<G> {
    pub guest: G,
    pub arena: Arena,
    pub ctx: ContextHandle,
}

impl Secp256k1<WasmGuest, OsRng> {
    /// Instantiate a libsecp256k1 module with default options.
    pub fn load(wasm_bytes: &[u8]) -> Result<Self> {
        Self::load_with(wasm_bytes, &LoadOptions::default())
    }

    pub fn load_with(wasm_bytes: &[u8], options: &LoadOptions) -> Result<Self> {
        Self::new(WasmGuest::load(wasm_bytes, options)?)
    }

    /// Read a whole module from `reader` and instantiate it.
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| Error::Load(format!("reading module: {e}")))?;
        Self::load(&bytes)
    }
}

impl<G: Guest> Secp256k1<G, OsRng> {
    pub fn new(guest: G) -> Result<Self> {
        Self::with_rng(guest, OsRng)
    }
}

impl<G: Guest, R: RngCore + CryptoRng> Secp256k1<G, R> {
    /// Bind to `guest`, drawing seeds, nonces and keys from `rng`.
    pub fn with_rng(mut guest: G, rng: R) -> Result<Self> {
        guest.invoke(Export::Init, &[])?;
        let arena = Arena::allocate(&mut guest)?;
        let ctx = ContextHandle::create(&mut guest)?;
        Ok(Self {
            core: Core { guest, arena, ctx },
            rng,
            poisoned: false,
        })
    }

    pub fn guest(&self) -> &G {
        &self.core.guest
    }

    /// Direct access to the guest, e.g. to inspect its memory.
    pub fn guest_mut(&mut self) -> &mut G {
        &mut self.core.guest
    }

    pub fn into_guest(self) -> G {
        self.core.guest
    }

    /// Whether an earlier guest fault has disabled this instance.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Run one operation, poisoning the instance if the guest faults.
    fn run<T>(&mut self, body: impl FnOnce(&mut Core<G>, &mut R) -> Result<T>) -> Result<T> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        let result = body(&mut self.core, &mut self.rng);
        if let Err(err) = &result {
            if err.is_fault() {
                tracing::error!(error = %err, "guest fault, instance poisoned");
                self.poisoned = true;
            }
        }
        result
    }
}

impl<G: Guest> Core<G> {
    fn call(&mut self, export: Export, args: &[i32]) -> WasmResult<i32> {
        tracing::trace!(export = export.symbol(), ?args, "guest call");
        self.guest.invoke(export, args)
    }

    fn status(&mut self, export: Export, args: &[i32]) -> Result<Status> {
        Ok(Status::from_code(self.call(export, args)?))
    }

    fn put(&mut self, data: &[u8], slot: arena::Slot) -> Result<()> {
        Ok(arena::put_bytes(&mut self.guest.memory(), data, slot)?)
    }

    fn read_array<const N: usize>(&mut self, ptr: Pointer) -> Result<[u8; N]> {
        Ok(self.guest.memory().read_array::<N>(ptr)?)
    }

    fn randomize<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<()> {
        let seed = self.arena.seed;
        self.ctx.randomize(&mut self.guest, seed, rng)
    }

    /// Copy `sk` into the secret-key slot for the duration of `body`. The
    /// slot is wiped when `body` returns, fails, or unwinds.
    fn with_secret_key<T>(
        &mut self,
        sk: &[u8; 32],
        body: impl FnOnce(&mut Core<G>, Pointer) -> Result<T>,
    ) -> Result<T> {
        let mut scope = SecretKeyScope::enter(self, sk)?;
        let ptr = scope.ptr();
        body(&mut *scope, ptr)
    }

    fn seckey_verify(&mut self, sk: &[u8; 32]) -> Result<bool> {
        let ctx = self.ctx.arg();
        self.with_secret_key(sk, |core, sk_ptr| {
            Ok(core
                .status(Export::SeckeyVerify, &[ctx, sk_ptr.as_arg()])?
                .is_success())
        })
    }

    /// Parse `pk` into the engine public-key slot.
    fn parse_public_key(&mut self, op: Operation, pk: &[u8]) -> Result<()> {
        let (scratch, lib) = (self.arena.pk_scratch, self.arena.pk_lib);
        if pk.is_empty() || pk.len() > scratch.size as usize {
            return Err(Error::InvalidPublicKey(op));
        }
        self.put(pk, scratch)?;
        let status = self.status(
            Export::PubkeyParse,
            &[self.ctx.arg(), lib.arg(), scratch.arg(), pk.len() as i32],
        )?;
        match status {
            Status::Success => Ok(()),
            Status::Failure => Err(Error::InvalidPublicKey(op)),
        }
    }

    /// Serialize the engine public-key slot.
    fn serialize_public_key(&mut self, op: Operation, format: Format) -> Result<Vec<u8>> {
        let (scratch, lib, length) = (
            self.arena.pk_scratch,
            self.arena.pk_lib,
            self.arena.length,
        );
        self.guest
            .memory()
            .write_u32(length.ptr, format.serialized_len())?;
        let status = self.status(
            Export::PubkeySerialize,
            &[
                self.ctx.arg(),
                scratch.arg(),
                length.arg(),
                lib.arg(),
                format.flags(),
            ],
        )?;
        if !status.is_success() {
            return Err(Error::InvalidPublicKey(op));
        }

        let mem = self.guest.memory();
        let written = mem.read_u32(length.ptr)?;
        if written > scratch.size {
            return Err(WasmTrap::OutOfBounds.into());
        }
        Ok(mem.read(scratch.ptr, written as usize)?.to_vec())
    }
}

/// View `sk` as a 32-byte key or reject it for `op`.
fn secret_key(op: Operation, sk: &[u8]) -> Result<&[u8; 32]> {
    sk.try_into().map_err(|_| Error::InvalidSecretKey(op))
}
