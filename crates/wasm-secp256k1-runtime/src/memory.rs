//! Guest linear memory: `LinearMemory<'a>` and `IsolatedMemory<const MAX_PAGES: usize>`.
//!
//! `LinearMemory` is a short-lived view over whatever slice currently backs
//! the guest's memory. It is rebuilt for every host access, so a view can
//! never survive a reallocation of the underlying buffer: the borrow it holds
//! ends before the guest runs again.
//!
//! `IsolatedMemory` is the owned backing used by guests that execute inside
//! the host process. The backing array is `[[u8; PAGE_SIZE]; MAX_PAGES]`,
//! contiguous in memory, flattened with `as_flattened()`.
//!
//! All accessors use the **outline pattern**: thin wrappers delegate to
//! non-generic inner functions so only one copy of the bounds-checking logic
//! exists in the binary. No unwrap(), no indexing, no panic paths.

use crate::{Pointer, WasmResult, WasmTrap, PAGE_SIZE};

/// Bounds-checked byte and word view over guest memory.
pub struct LinearMemory<'a> {
    bytes: &'a mut [u8],
}

impl<'a> LinearMemory<'a> {
    /// Bind a view to the guest's current memory buffer.
    #[inline(always)]
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Size of the bound memory in bytes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read-only access to the whole bound region.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        self.bytes
    }

    /// Borrow `len` bytes starting at `ptr`.
    #[inline(always)]
    pub fn read(&self, ptr: Pointer, len: usize) -> WasmResult<&[u8]> {
        checked_slice(self.bytes, ptr.offset(), len)
    }

    /// Copy `N` bytes starting at `ptr` out of guest memory.
    #[inline(always)]
    pub fn read_array<const N: usize>(&self, ptr: Pointer) -> WasmResult<[u8; N]> {
        to_array(checked_slice(self.bytes, ptr.offset(), N)?)
    }

    /// Copy `data` into guest memory at `ptr`.
    #[inline(always)]
    pub fn write(&mut self, ptr: Pointer, data: &[u8]) -> WasmResult<()> {
        write_inner(self.bytes, ptr.offset(), data)
    }

    /// Set `len` bytes at `ptr` to `value`.
    #[inline(always)]
    pub fn fill(&mut self, ptr: Pointer, len: usize, value: u8) -> WasmResult<()> {
        fill_inner(self.bytes, ptr.offset(), len, value)
    }

    /// Load a little-endian 32-bit word.
    #[inline(always)]
    pub fn read_u32(&self, ptr: Pointer) -> WasmResult<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>(ptr)?))
    }

    /// Store a little-endian 32-bit word.
    #[inline(always)]
    pub fn write_u32(&mut self, ptr: Pointer, value: u32) -> WasmResult<()> {
        self.write(ptr, &value.to_le_bytes())
    }

    /// Copy `len` bytes from `src` to `dst`.
    ///
    /// Semantics match `memmove`: overlapping regions are handled correctly.
    /// Traps (`OutOfBounds`) if either region extends past the bound memory.
    #[inline(always)]
    pub fn copy_within(&mut self, dst: Pointer, src: Pointer, len: usize) -> WasmResult<()> {
        copy_within_inner(self.bytes, dst.offset(), src.offset(), len)
    }
}

/// Owned linear memory for an in-process guest.
///
/// `MAX_PAGES` is the compile-time size of the backing array. Only the
/// first `active_pages` are addressable.
pub struct IsolatedMemory<const MAX_PAGES: usize> {
    /// Backing storage: `MAX_PAGES` pages of `PAGE_SIZE` bytes each.
    pages: [[u8; PAGE_SIZE]; MAX_PAGES],
    /// Number of currently active pages. Accesses beyond
    /// `active_pages * PAGE_SIZE` are out-of-bounds traps.
    active_pages: usize,
}

impl<const MAX_PAGES: usize> IsolatedMemory<MAX_PAGES> {
    /// Create a new `IsolatedMemory` with `initial_pages` active.
    ///
    /// # Errors
    /// Returns `WasmTrap::OutOfMemory` if `initial_pages > MAX_PAGES`.
    #[inline(never)]
    pub fn try_new(initial_pages: usize) -> WasmResult<Self> {
        if initial_pages > MAX_PAGES {
            return Err(WasmTrap::OutOfMemory {
                requested: initial_pages.saturating_mul(PAGE_SIZE) as u32,
            });
        }
        Ok(Self {
            pages: [[0u8; PAGE_SIZE]; MAX_PAGES],
            active_pages: initial_pages,
        })
    }

    /// Current active size in bytes.
    #[inline(always)]
    pub fn active_size(&self) -> usize {
        self.active_pages * PAGE_SIZE
    }

    /// Read-only access to the active memory region.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.pages.as_flattened()[..self.active_size()]
    }

    /// Bind a `LinearMemory` view to the active region.
    #[inline(always)]
    pub fn view(&mut self) -> LinearMemory<'_> {
        let size = self.active_size();
        LinearMemory::new(&mut self.pages.as_flattened_mut()[..size])
    }
}

/// Bounds-check and return the sub-slice `memory[offset..offset+len]`.
/// Returns `Err(OutOfBounds)` on overflow or out-of-range; it never panics.
#[inline(always)]
fn checked_slice(memory: &[u8], offset: usize, len: usize) -> WasmResult<&[u8]> {
    let end = offset.checked_add(len).ok_or(WasmTrap::OutOfBounds)?;
    memory.get(offset..end).ok_or(WasmTrap::OutOfBounds)
}

/// Mutable variant of `checked_slice`.
#[inline(always)]
fn checked_slice_mut(memory: &mut [u8], offset: usize, len: usize) -> WasmResult<&mut [u8]> {
    let end = offset.checked_add(len).ok_or(WasmTrap::OutOfBounds)?;
    memory.get_mut(offset..end).ok_or(WasmTrap::OutOfBounds)
}

#[inline(always)]
fn to_array<const N: usize>(slice: &[u8]) -> WasmResult<[u8; N]> {
    slice.try_into().map_err(|_| WasmTrap::OutOfBounds)
}

// ── Non-generic inner functions (outline pattern) ────────────────────

#[inline(never)]
fn write_inner(memory: &mut [u8], offset: usize, data: &[u8]) -> WasmResult<()> {
    checked_slice_mut(memory, offset, data.len())?.copy_from_slice(data);
    Ok(())
}

#[inline(never)]
fn fill_inner(memory: &mut [u8], offset: usize, len: usize, value: u8) -> WasmResult<()> {
    checked_slice_mut(memory, offset, len)?.fill(value);
    Ok(())
}

#[inline(never)]
fn copy_within_inner(memory: &mut [u8], dst: usize, src: usize, len: usize) -> WasmResult<()> {
    let active = memory.len();
    if src.checked_add(len).map_or(true, |end| end > active)
        || dst.checked_add(len).map_or(true, |end| end > active)
    {
        return Err(WasmTrap::OutOfBounds);
    }
    memory.copy_within(src..src + len, dst);
    Ok(())
}
