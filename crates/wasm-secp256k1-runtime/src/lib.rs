//! `wasm-secp256k1-runtime`: Runtime support for the wasm-secp256k1 binding.
//!
//! This crate provides:
//! - `LinearMemory<'a>`, a bounds-checked view over a guest's linear memory
//! - `IsolatedMemory<const MAX_PAGES: usize>` for guests whose memory lives in the host
//! - `WasmTrap` / `WasmResult<T>` for guest faults
//! - `HostImports` and `RuntimeShim`, the minimal host services a libsecp256k1
//!   build needs to run outside of a full operating system

use core::fmt;

/// WebAssembly page size: 64 KiB per the Wasm specification.
pub const PAGE_SIZE: usize = 65536;

mod memory;
pub use memory::{IsolatedMemory, LinearMemory};

mod shim;
pub use shim::{Channel, HostImports, RuntimeShim, ERRNO_NOSYS, ERRNO_SPIPE};

/// An offset into guest linear memory.
///
/// Pointers are only meaningful inside the binding that obtained them; the
/// public operation surface never hands one out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pointer(pub u32);

impl Pointer {
    #[inline(always)]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Byte offset as a host index.
    #[inline(always)]
    pub fn offset(self) -> usize {
        self.0 as usize
    }

    /// The pointer as a Wasm `i32` argument.
    #[inline(always)]
    pub fn as_arg(self) -> i32 {
        self.0 as i32
    }

    /// Reinterpret a Wasm `i32` return value as a pointer.
    #[inline(always)]
    pub fn from_ret(value: i32) -> Self {
        Pointer(value as u32)
    }

    /// Pointer `delta` bytes further into memory, or `None` on overflow.
    #[inline]
    pub fn checked_add(self, delta: u32) -> Option<Pointer> {
        self.0.checked_add(delta).map(Pointer)
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Guest execution faults: no panics, no unwinding across the boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WasmTrap {
    /// Memory access out of bounds.
    #[error("guest memory access out of bounds")]
    OutOfBounds,
    /// The guest called `abort`; carries the last error-channel text.
    #[error("{0}")]
    Abort(String),
    /// The guest asked for more memory than the binding is willing to give.
    #[error("Out of memory (requested {requested} bytes)")]
    OutOfMemory { requested: u32 },
    /// The guest wrote to a file descriptor other than stdout/stderr.
    #[error("guest tried writing to non-open file descriptor: {0}")]
    InvalidDescriptor(i32),
    /// Any other trap raised by the execution engine (unreachable, stack overflow, ...).
    #[error("guest trapped: {0}")]
    Engine(String),
    /// The guest does not provide the named export.
    #[error("guest does not export `{0}`")]
    MissingExport(&'static str),
}

/// Result type for guest operations: `Result<T, WasmTrap>`.
pub type WasmResult<T> = Result<T, WasmTrap>;
