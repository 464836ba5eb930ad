//! wasm-secp256k1: secp256k1 through a sandboxed WebAssembly build of libsecp256k1.
//!
//! The elliptic-curve code never runs natively: a libsecp256k1 module is
//! instantiated with Wasmtime and driven through its C ABI. The binding
//! owns a small pointer arena inside guest memory, one randomized context,
//! and wipes the secret-key slot after every use.
//!
//! # Example
//! ```no_run
//! use wasm_secp256k1::{Format, Secp256k1};
//!
//! let wasm = std::fs::read("secp256k1.wasm").unwrap();
//! let mut secp = Secp256k1::load(&wasm).unwrap();
//!
//! let sk = secp.generate_secret_key().unwrap();
//! let pk = secp.derive_public_key(&sk, Format::Compressed).unwrap();
//! let hash = secp.sha256(b"hello").unwrap();
//! let sig = secp.sign(&sk, &hash, None).unwrap();
//! assert!(secp.verify(&sig.compact, &hash, &pk).unwrap());
//! ```

mod arena;
mod binding;
pub mod config;
mod context;
pub mod error;
pub mod guest;
pub mod parser;
pub mod types;

pub use binding::Secp256k1;
pub use config::{HostFunc, ImportNames, LoadOptions};
pub use error::{Error, Operation, Result};
pub use guest::{Export, Guest, WasmGuest};
pub use types::{Format, RecoverableSignature, RecoveryId, Status};

pub use wasm_secp256k1_runtime as runtime;
