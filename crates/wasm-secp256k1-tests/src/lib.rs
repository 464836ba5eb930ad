//! Test support for wasm-secp256k1.
//!
//! [`ReferenceEngine`] stands in for a compiled libsecp256k1 module so the
//! whole binding can be exercised, known answers included, without a
//! `.wasm` artifact in the tree.

mod engine;
pub mod vectors;

pub use engine::{ReferenceEngine, HEAP_BASE};

use rand::rngs::StdRng;
use rand::SeedableRng;
use wasm_secp256k1::Secp256k1;

/// A binding over a fresh reference engine with a seeded rng.
pub fn binding(seed: u64) -> Secp256k1<ReferenceEngine, StdRng> {
    match Secp256k1::with_rng(ReferenceEngine::new(), StdRng::seed_from_u64(seed)) {
        Ok(secp) => secp,
        Err(err) => panic!("reference engine failed to start: {err}"),
    }
}

/// Decode a fixed-size hex constant.
pub fn hex_array<const N: usize>(s: &str) -> [u8; N] {
    let bytes = hex::decode(s).unwrap_or_else(|e| panic!("bad hex {s:?}: {e}"));
    <[u8; N]>::try_from(bytes.as_slice())
        .unwrap_or_else(|_| panic!("expected {N} bytes, got {}", bytes.len()))
}

pub fn hex_vec(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap_or_else(|e| panic!("bad hex {s:?}: {e}"))
}
