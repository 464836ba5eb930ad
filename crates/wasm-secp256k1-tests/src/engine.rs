//! Host-side stand-in for a libsecp256k1 WebAssembly build.
//!
//! `ReferenceEngine` answers every export the binding drives, with the same
//! argument order, return codes and memory conventions as the compiled
//! library. Curve arithmetic is done with `k256`. Its heap lives in an
//! `IsolatedMemory` and its imports go through the binding's own
//! `RuntimeShim`, so illegal-argument aborts and heap exhaustion surface
//! exactly as they would from the real module.
//!
//! Opaque engine structs are laid out as follows:
//! - public key: the 64 bytes of the uncompressed encoding after its prefix
//! - signature: compact `r || s`
//! - recoverable signature: compact `r || s` followed by the recovery id

use std::collections::HashMap;

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier, RandomizedPrehashSigner};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, ProjectivePoint, PublicKey, Scalar, SecretKey};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use wasm_secp256k1::runtime::{
    HostImports, IsolatedMemory, LinearMemory, Pointer, RuntimeShim, WasmResult, PAGE_SIZE,
};
use wasm_secp256k1::{Export, Guest};

/// First heap address; everything below is the engine's own scratch.
pub const HEAP_BASE: u32 = 1024;

const IOVEC: Pointer = Pointer(16);
const NWRITTEN: Pointer = Pointer(24);
const MESSAGE: Pointer = Pointer(64);

const FLAGS_TYPE_MASK: i32 = 0xFF;
const FLAGS_TYPE_CONTEXT: i32 = 1;
const FLAGS_TYPE_COMPRESSION: i32 = 2;
const FLAGS_BIT_COMPRESSION: i32 = 1 << 8;

const CONTEXT_SIZE: u32 = 16;
const PUBKEY_LEN: usize = 64;
const RECOVERABLE_LEN: usize = 65;

pub struct ReferenceEngine {
    memory: Box<IsolatedMemory<1>>,
    shim: RuntimeShim,
    heap: u32,
    heap_limit: u32,
    abort_on: Option<Export>,
    hashers: HashMap<u32, Sha256>,
    /// Every export invoked, in order.
    pub calls: Vec<Export>,
    /// Every pointer passed where a secret key is expected.
    pub secret_key_ptrs: Vec<Pointer>,
    /// Every pointer passed as a randomization seed.
    pub seed_ptrs: Vec<Pointer>,
}

impl ReferenceEngine {
    pub fn new() -> Self {
        Self::with_shim(RuntimeShim::default())
    }

    pub fn with_shim(shim: RuntimeShim) -> Self {
        let memory = match IsolatedMemory::try_new(1) {
            Ok(memory) => Box::new(memory),
            Err(err) => panic!("one page always fits: {err}"),
        };
        Self {
            memory,
            shim,
            heap: HEAP_BASE,
            heap_limit: PAGE_SIZE as u32,
            abort_on: None,
            hashers: HashMap::new(),
            calls: Vec::new(),
            secret_key_ptrs: Vec::new(),
            seed_ptrs: Vec::new(),
        }
    }

    /// Cap the heap below the end of memory; `malloc` past it asks the host
    /// to resize.
    pub fn with_heap_limit(mut self, limit: u32) -> Self {
        self.heap_limit = limit;
        self
    }

    /// Treat any call to `export` as an illegal argument.
    pub fn abort_on(mut self, export: Export) -> Self {
        self.abort_on = Some(export);
        self
    }

    pub fn shim(&self) -> &RuntimeShim {
        &self.shim
    }

    pub fn memory_bytes(&self) -> &[u8] {
        self.memory.as_slice()
    }

    pub fn called(&self, export: Export) -> usize {
        self.calls.iter().filter(|e| **e == export).count()
    }

    fn malloc(&mut self, size: u32) -> WasmResult<i32> {
        let ptr = self.heap;
        let end = ptr.saturating_add(size);
        if end > self.heap_limit {
            // The binding's shim never grants more memory.
            return self.shim.resize_heap(size).map(|_| 0);
        }
        self.heap = (end + 7) & !7;
        Ok(ptr as i32)
    }

    /// The library's illegal-argument callback: report on stderr, then abort.
    fn illegal(&mut self, what: &str) -> WasmResult<i32> {
        let text = format!("[libsecp256k1] illegal argument: {what}");
        let mut mem = self.memory.view();
        mem.write(MESSAGE, text.as_bytes())?;
        mem.write_u32(IOVEC, MESSAGE.0)?;
        mem.write_u32(Pointer(IOVEC.0 + 4), text.len() as u32)?;
        self.shim.fd_write(&mut mem, 2, IOVEC, 1, NWRITTEN)?;
        self.shim.abort()?;
        Ok(0)
    }

    fn read<const N: usize>(&mut self, ptr: Pointer) -> WasmResult<[u8; N]> {
        self.memory.view().read_array::<N>(ptr)
    }

    fn write(&mut self, ptr: Pointer, data: &[u8]) -> WasmResult<()> {
        self.memory.view().write(ptr, data)
    }

    fn clear(&mut self, ptr: Pointer, len: usize) -> WasmResult<()> {
        self.memory.view().fill(ptr, len, 0)
    }

    fn load_pubkey(&mut self, ptr: Pointer) -> WasmResult<Option<PublicKey>> {
        let raw = self.read::<PUBKEY_LEN>(ptr)?;
        if raw.iter().all(|b| *b == 0) {
            self.illegal("!secp256k1_fe_is_zero(&ge->x)")?;
            return Ok(None);
        }
        let mut encoded = [0u8; PUBKEY_LEN + 1];
        encoded[0] = 0x04;
        encoded[1..].copy_from_slice(&raw);
        Ok(PublicKey::from_sec1_bytes(&encoded).ok())
    }

    fn store_pubkey(&mut self, ptr: Pointer, pk: &PublicKey) -> WasmResult<()> {
        let encoded = pk.to_encoded_point(false);
        self.write(ptr, &encoded.as_bytes()[1..])
    }

    fn secret_key_at(&mut self, ptr: Pointer) -> WasmResult<Option<SecretKey>> {
        self.secret_key_ptrs.push(ptr);
        let bytes = self.read::<32>(ptr)?;
        Ok(secret_key(&bytes))
    }

    fn dispatch(&mut self, export: Export, args: &[i32]) -> WasmResult<i32> {
        let int = |i: usize| args.get(i).copied().unwrap_or(0);
        let ptr = |i: usize| Pointer::from_ret(int(i));

        match export {
            Export::Init => Ok(0),
            Export::Malloc => self.malloc(int(0) as u32),
            Export::ContextCreate => {
                if int(0) & FLAGS_TYPE_MASK != FLAGS_TYPE_CONTEXT {
                    return self.illegal("Invalid flags");
                }
                let ctx = self.malloc(CONTEXT_SIZE)?;
                if ctx != 0 {
                    self.memory.view().write_u32(Pointer::from_ret(ctx), int(0) as u32)?;
                }
                Ok(ctx)
            }
            Export::ContextRandomize => {
                self.seed_ptrs.push(ptr(1));
                if !ptr(1).is_null() {
                    self.read::<32>(ptr(1))?;
                }
                Ok(1)
            }
            Export::SeckeyVerify => {
                if ptr(1).is_null() {
                    return self.illegal("seckey != NULL");
                }
                Ok(self.secret_key_at(ptr(1))?.is_some() as i32)
            }
            Export::PubkeyCreate => self.pubkey_create(ptr(1), ptr(2)),
            Export::PubkeyParse => self.pubkey_parse(ptr(1), ptr(2), int(3) as u32),
            Export::PubkeySerialize => self.pubkey_serialize(ptr(1), ptr(2), ptr(3), int(4)),
            Export::SignatureParseCompact => {
                if ptr(1).is_null() || ptr(2).is_null() {
                    return self.illegal("sig != NULL");
                }
                let input = self.read::<64>(ptr(2))?;
                match Signature::from_slice(&input) {
                    Ok(_) => self.write(ptr(1), &input)?,
                    Err(_) => {
                        self.clear(ptr(1), 64)?;
                        return Ok(0);
                    }
                }
                Ok(1)
            }
            Export::Verify => self.verify(ptr(1), ptr(2), ptr(3)),
            Export::SignRecoverable => {
                self.sign_recoverable(ptr(1), ptr(2), ptr(3), int(4), ptr(5))
            }
            Export::RecoverableSignatureSerializeCompact => {
                if ptr(1).is_null() || ptr(2).is_null() || ptr(3).is_null() {
                    return self.illegal("output64 != NULL");
                }
                let rsig = self.read::<RECOVERABLE_LEN>(ptr(3))?;
                self.write(ptr(1), &rsig[..64])?;
                self.memory.view().write_u32(ptr(2), u32::from(rsig[64]))?;
                Ok(1)
            }
            Export::RecoverableSignatureParseCompact => {
                if !(0..=3).contains(&int(3)) {
                    return self.illegal("recid >= 0 && recid <= 3");
                }
                if ptr(1).is_null() || ptr(2).is_null() {
                    return self.illegal("sig != NULL");
                }
                let input = self.read::<64>(ptr(2))?;
                if Signature::from_slice(&input).is_err() {
                    self.clear(ptr(1), RECOVERABLE_LEN)?;
                    return Ok(0);
                }
                self.write(ptr(1), &input)?;
                self.write(Pointer(ptr(1).0 + 64), &[int(3) as u8])?;
                Ok(1)
            }
            Export::Recover => self.recover(ptr(1), ptr(2), ptr(3)),
            Export::Ecdh => self.ecdh(ptr(1), ptr(2), ptr(3), int(4)),
            Export::SeckeyTweakAdd | Export::SeckeyTweakMul => {
                self.seckey_tweak(export == Export::SeckeyTweakAdd, ptr(1), ptr(2))
            }
            Export::PubkeyTweakAdd | Export::PubkeyTweakMul => {
                self.pubkey_tweak(export == Export::PubkeyTweakAdd, ptr(1), ptr(2))
            }
            Export::Sha256Initialize => {
                self.hashers.insert(ptr(0).0, Sha256::new());
                Ok(0)
            }
            Export::Sha256Write => {
                let data = self.memory.view().read(ptr(1), int(2) as usize)?.to_vec();
                self.hashers.entry(ptr(0).0).or_default().update(&data);
                Ok(0)
            }
            Export::Sha256Finalize => {
                let digest = self.hashers.remove(&ptr(0).0).unwrap_or_default().finalize();
                self.write(ptr(1), &digest)?;
                Ok(0)
            }
        }
    }

    fn pubkey_create(&mut self, pk: Pointer, sk: Pointer) -> WasmResult<i32> {
        if pk.is_null() || sk.is_null() {
            return self.illegal("pubkey != NULL");
        }
        self.clear(pk, PUBKEY_LEN)?;
        match self.secret_key_at(sk)? {
            Some(secret) => {
                self.store_pubkey(pk, &secret.public_key())?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn pubkey_parse(&mut self, pk: Pointer, input: Pointer, len: u32) -> WasmResult<i32> {
        if pk.is_null() || input.is_null() {
            return self.illegal("input != NULL");
        }
        self.clear(pk, PUBKEY_LEN)?;
        let bytes = self.memory.view().read(input, len as usize)?.to_vec();
        match parse_sec1(&bytes) {
            Some(parsed) => {
                self.store_pubkey(pk, &parsed)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn pubkey_serialize(
        &mut self,
        out: Pointer,
        outlen: Pointer,
        pk: Pointer,
        flags: i32,
    ) -> WasmResult<i32> {
        if out.is_null() || outlen.is_null() {
            return self.illegal("outputlen != NULL");
        }
        let capacity = self.memory.view().read_u32(outlen)?;
        let compressed = flags & FLAGS_BIT_COMPRESSION != 0;
        if capacity < if compressed { 33 } else { 65 } {
            return self.illegal("*outputlen >= ((flags & SECP256K1_FLAGS_BIT_COMPRESSION) ? 33u : 65u)");
        }
        if flags & FLAGS_TYPE_MASK != FLAGS_TYPE_COMPRESSION {
            return self.illegal("(flags & SECP256K1_FLAGS_TYPE_MASK) == SECP256K1_FLAGS_TYPE_COMPRESSION");
        }
        self.clear(out, capacity as usize)?;
        let Some(key) = self.load_pubkey(pk)? else {
            return Ok(0);
        };
        let encoded = key.to_encoded_point(compressed);
        self.write(out, encoded.as_bytes())?;
        self.memory.view().write_u32(outlen, encoded.len() as u32)?;
        Ok(1)
    }

    fn verify(&mut self, sig: Pointer, msg: Pointer, pk: Pointer) -> WasmResult<i32> {
        if sig.is_null() || msg.is_null() || pk.is_null() {
            return self.illegal("sig != NULL");
        }
        let raw = self.read::<64>(sig)?;
        let hash = self.read::<32>(msg)?;
        let Some(key) = self.load_pubkey(pk)? else {
            return Ok(0);
        };
        let Ok(signature) = Signature::from_slice(&raw) else {
            return Ok(0);
        };
        // Only lower-S signatures verify.
        if signature.normalize_s().is_some() {
            return Ok(0);
        }
        let verified = VerifyingKey::from(&key).verify_prehash(&hash, &signature);
        Ok(verified.is_ok() as i32)
    }

    fn sign_recoverable(
        &mut self,
        rsig: Pointer,
        msg: Pointer,
        sk: Pointer,
        noncefp: i32,
        ndata: Pointer,
    ) -> WasmResult<i32> {
        if rsig.is_null() || msg.is_null() || sk.is_null() {
            return self.illegal("signature != NULL");
        }
        if noncefp != 0 {
            return self.illegal("noncefp == NULL");
        }
        self.clear(rsig, RECOVERABLE_LEN)?;
        let hash = self.read::<32>(msg)?;
        let Some(secret) = self.secret_key_at(sk)? else {
            return Ok(0);
        };
        let key = SigningKey::from(&secret);

        let signed: Result<Signature, _> = if ndata.is_null() {
            key.sign_prehash(&hash)
        } else {
            let extra = self.read::<32>(ndata)?;
            key.sign_prehash_with_rng(&mut StdRng::from_seed(extra), &hash)
        };
        let Ok(signature) = signed else {
            return Ok(0);
        };
        let signature = signature.normalize_s().unwrap_or(signature);
        let Ok(recid) =
            RecoveryId::trial_recovery_from_prehash(key.verifying_key(), &hash, &signature)
        else {
            return Ok(0);
        };

        self.write(rsig, &signature.to_bytes())?;
        self.write(Pointer(rsig.0 + 64), &[recid.to_byte()])?;
        Ok(1)
    }

    fn recover(&mut self, pk: Pointer, rsig: Pointer, msg: Pointer) -> WasmResult<i32> {
        if pk.is_null() || rsig.is_null() || msg.is_null() {
            return self.illegal("pubkey != NULL");
        }
        self.clear(pk, PUBKEY_LEN)?;
        let raw = self.read::<RECOVERABLE_LEN>(rsig)?;
        let hash = self.read::<32>(msg)?;
        let Ok(signature) = Signature::from_slice(&raw[..64]) else {
            return Ok(0);
        };
        let Some(recid) = RecoveryId::from_byte(raw[64]) else {
            return Ok(0);
        };
        match VerifyingKey::recover_from_prehash(&hash, &signature, recid) {
            Ok(recovered) => {
                self.store_pubkey(pk, &PublicKey::from(&recovered))?;
                Ok(1)
            }
            Err(_) => Ok(0),
        }
    }

    fn ecdh(&mut self, out: Pointer, pk: Pointer, sk: Pointer, hashfp: i32) -> WasmResult<i32> {
        if out.is_null() || pk.is_null() || sk.is_null() {
            return self.illegal("output != NULL");
        }
        if hashfp != 0 {
            return self.illegal("hashfp == NULL");
        }
        let Some(point) = self.load_pubkey(pk)? else {
            return Ok(0);
        };
        let Some(secret) = self.secret_key_at(sk)? else {
            return Ok(0);
        };
        let shared = (ProjectivePoint::from(*point.as_affine()) * *secret.to_nonzero_scalar())
            .to_affine();
        let digest = Sha256::digest(shared.to_encoded_point(true).as_bytes());
        self.write(out, &digest)?;
        Ok(1)
    }

    /// On failure the key is zeroed in place, as the library does.
    fn seckey_tweak(&mut self, add: bool, sk: Pointer, tweak: Pointer) -> WasmResult<i32> {
        if sk.is_null() || tweak.is_null() {
            return self.illegal("seckey != NULL");
        }
        let tweak = self.read::<32>(tweak)?;
        let secret = self.secret_key_at(sk)?;
        let tweaked = match (secret, scalar(&tweak)) {
            (Some(secret), Some(t)) => {
                let s = *secret.to_nonzero_scalar();
                let result = if add { s + t } else { s * t };
                (!bool::from(result.is_zero())).then_some(result)
            }
            _ => None,
        };
        match tweaked {
            Some(result) => {
                self.write(sk, &result.to_repr())?;
                Ok(1)
            }
            None => {
                self.clear(sk, 32)?;
                Ok(0)
            }
        }
    }

    fn pubkey_tweak(&mut self, add: bool, pk: Pointer, tweak: Pointer) -> WasmResult<i32> {
        if pk.is_null() || tweak.is_null() {
            return self.illegal("pubkey != NULL");
        }
        let tweak = self.read::<32>(tweak)?;
        let Some(key) = self.load_pubkey(pk)? else {
            return Ok(0);
        };
        let point = ProjectivePoint::from(*key.as_affine());
        let tweaked = scalar(&tweak).and_then(|t| {
            if !add && bool::from(t.is_zero()) {
                return None;
            }
            let result = if add {
                point + ProjectivePoint::GENERATOR * t
            } else {
                point * t
            };
            PublicKey::from_affine(result.to_affine()).ok()
        });
        match tweaked {
            Some(result) => {
                self.store_pubkey(pk, &result)?;
                Ok(1)
            }
            None => {
                self.clear(pk, PUBKEY_LEN)?;
                Ok(0)
            }
        }
    }
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Guest for ReferenceEngine {
    fn invoke(&mut self, export: Export, args: &[i32]) -> WasmResult<i32> {
        assert_eq!(args.len(), export.arity(), "{}", export.symbol());
        self.calls.push(export);
        if self.abort_on == Some(export) {
            return self.illegal(export.symbol());
        }
        self.dispatch(export, args)
    }

    fn memory(&mut self) -> LinearMemory<'_> {
        self.memory.view()
    }

    fn provides(&self, _export: Export) -> bool {
        true
    }
}

/// The encodings `secp256k1_ec_pubkey_parse` takes: compressed, uncompressed
/// and hybrid. Hybrid keys must carry the parity of y in their tag.
fn parse_sec1(bytes: &[u8]) -> Option<PublicKey> {
    match (bytes.len(), *bytes.first()?) {
        (33, 0x02 | 0x03) | (65, 0x04) => PublicKey::from_sec1_bytes(bytes).ok(),
        (65, tag @ (0x06 | 0x07)) => {
            if bytes[64] & 1 != tag & 1 {
                return None;
            }
            let mut uncompressed = [0u8; 65];
            uncompressed.copy_from_slice(bytes);
            uncompressed[0] = 0x04;
            PublicKey::from_sec1_bytes(&uncompressed).ok()
        }
        _ => None,
    }
}

fn secret_key(bytes: &[u8; 32]) -> Option<SecretKey> {
    SecretKey::from_bytes(&FieldBytes::from(*bytes)).ok()
}

/// A scalar below the group order.
fn scalar(bytes: &[u8; 32]) -> Option<Scalar> {
    Option::from(Scalar::from_repr(FieldBytes::from(*bytes)))
}
