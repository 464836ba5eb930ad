//! Host services for a libsecp256k1 guest.
//!
//! An emscripten build of libsecp256k1 needs a handful of imports even though
//! it never touches the filesystem: `abort`, a bulk `memcpy`, the heap resize
//! hook, and the WASI `fd_*` calls behind `printf`. `HostImports` is the
//! capability trait the execution engine calls into; `RuntimeShim` is the
//! implementation the binding installs.

use crate::{LinearMemory, Pointer, WasmResult, WasmTrap};

/// WASI `ENOSYS`, returned by `fd_close`.
pub const ERRNO_NOSYS: i32 = 52;

/// WASI `ESPIPE`, returned by `fd_seek`.
pub const ERRNO_SPIPE: i32 = 70;

const UNKNOWN_ERROR: &str = "An unknown error occurred";

/// Imports a libsecp256k1 guest may call.
///
/// Every method that can fault returns `WasmResult`, so the engine unwinds
/// the guest with a trap instead of the host panicking.
pub trait HostImports {
    /// The guest gave up. Always returns `Err(WasmTrap::Abort(..))`.
    fn abort(&mut self) -> WasmResult<()>;

    /// Overlap-safe copy of `size` bytes from `src` to `dst`.
    fn memcpy(
        &mut self,
        mem: &mut LinearMemory<'_>,
        dst: Pointer,
        src: Pointer,
        size: u32,
    ) -> WasmResult<()>;

    /// `emscripten_resize_heap`.
    fn resize_heap(&mut self, requested: u32) -> WasmResult<i32>;

    /// WASI `fd_write`: gather `iovcnt` iovecs starting at `iov`, route the
    /// text by descriptor, store the byte count at `nwritten`.
    fn fd_write(
        &mut self,
        mem: &mut LinearMemory<'_>,
        fd: i32,
        iov: Pointer,
        iovcnt: i32,
        nwritten: Pointer,
    ) -> WasmResult<i32>;

    fn fd_close(&mut self, _fd: i32) -> i32 {
        ERRNO_NOSYS
    }

    fn fd_seek(&mut self, _fd: i32) -> i32 {
        ERRNO_SPIPE
    }
}

/// Output channel a guest descriptor maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// fd 1, logged at debug level.
    Debug,
    /// fd 2, logged at error level and kept for the next `abort`.
    Error,
}

impl Channel {
    pub fn from_fd(fd: i32) -> Option<Channel> {
        match fd {
            1 => Some(Channel::Debug),
            2 => Some(Channel::Error),
            _ => None,
        }
    }
}

/// The shim installed by the binding.
///
/// Holds the log tag and the most recent text the guest wrote to its error
/// channel. That text becomes the message of the next `abort`.
#[derive(Debug, Clone)]
pub struct RuntimeShim {
    tag: String,
    last_error: Option<String>,
}

impl RuntimeShim {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            last_error: None,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Last text written to the error channel, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn emit(&mut self, channel: Channel, text: String) {
        match channel {
            Channel::Debug => {
                tracing::debug!(target: "wasm_secp256k1::guest", tag = %self.tag, "{}", text);
            }
            Channel::Error => {
                tracing::error!(target: "wasm_secp256k1::guest", tag = %self.tag, "{}", text);
                self.last_error = Some(text);
            }
        }
    }
}

impl Default for RuntimeShim {
    fn default() -> Self {
        Self::new("wasm-secp256k1")
    }
}

impl HostImports for RuntimeShim {
    fn abort(&mut self) -> WasmResult<()> {
        let reason = match self.last_error.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => UNKNOWN_ERROR,
        };
        Err(WasmTrap::Abort(format!("{}: {}", self.tag, reason)))
    }

    fn memcpy(
        &mut self,
        mem: &mut LinearMemory<'_>,
        dst: Pointer,
        src: Pointer,
        size: u32,
    ) -> WasmResult<()> {
        mem.copy_within(dst, src, size as usize)
    }

    fn resize_heap(&mut self, requested: u32) -> WasmResult<i32> {
        tracing::error!(tag = %self.tag, requested, "guest heap exhausted");
        Err(WasmTrap::OutOfMemory { requested })
    }

    fn fd_write(
        &mut self,
        mem: &mut LinearMemory<'_>,
        fd: i32,
        iov: Pointer,
        iovcnt: i32,
        nwritten: Pointer,
    ) -> WasmResult<i32> {
        let channel = Channel::from_fd(fd).ok_or(WasmTrap::InvalidDescriptor(fd))?;

        let mut raw = Vec::new();
        let mut cursor = iov;
        for _ in 0..iovcnt.max(0) {
            let base = mem.read_u32(cursor)?;
            let len = mem.read_u32(cursor.checked_add(4).ok_or(WasmTrap::OutOfBounds)?)?;
            raw.extend_from_slice(mem.read(Pointer(base), len as usize)?);
            cursor = cursor.checked_add(8).ok_or(WasmTrap::OutOfBounds)?;
        }

        let written = raw.len() as u32;
        let text = String::from_utf8_lossy(&raw).replace('\0', "\n");
        self.emit(channel, text);

        mem.write_u32(nwritten, written)?;
        Ok(0)
    }
}
