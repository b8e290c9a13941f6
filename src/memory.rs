// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Validation of and access to buffers in memory shared with the non-secure world.

use core::{
    fmt::{self, Debug, Formatter},
    ops::Range,
    ptr,
};
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// The range of physical memory which the non-secure world may pass to the secure world.
#[derive(Clone, Eq, PartialEq)]
pub struct NsWindow {
    start: usize,
    end: usize,
}

impl NsWindow {
    /// Creates a new window covering the given address range.
    ///
    /// # Safety
    ///
    /// The whole range must be mapped, readable and writable from the secure world for the rest of
    /// the program, and must not overlap any memory owned by the secure world.
    pub const unsafe fn new(range: Range<usize>) -> Self {
        assert!(range.start <= range.end);
        Self {
            start: range.start,
            end: range.end,
        }
    }

    /// Returns the first address in the window.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Returns the address just past the end of the window.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Returns whether `[addr, addr + len)` lies entirely within the window.
    ///
    /// An empty range is always valid. The check never overflows, so a range which would wrap
    /// around the end of the address space is rejected.
    pub fn contains(&self, addr: usize, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        let size = self.end - self.start;
        let offset = addr.wrapping_sub(self.start);
        offset < size && len <= size - offset
    }

    /// Returns a shared buffer for `[addr, addr + len)` if it lies within the window.
    pub fn buffer(&self, addr: usize, len: usize) -> Option<SharedBuffer> {
        if self.contains(addr, len) {
            Some(SharedBuffer { addr, len })
        } else {
            None
        }
    }
}

impl Debug for NsWindow {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "NsWindow({:#x}..{:#x})", self.start, self.end)
    }
}

/// An access outside the bounds of a [`SharedBuffer`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OutOfBounds;

/// A buffer in non-secure memory, passed by the caller of an SMC.
///
/// The contents may be changed by the non-secure world at any time, so they are only ever copied
/// in and out with volatile accesses, never borrowed.
#[derive(Copy, Clone, Default, Eq, PartialEq)]
pub struct SharedBuffer {
    addr: usize,
    len: usize,
}

impl SharedBuffer {
    /// An empty buffer.
    pub const EMPTY: Self = Self { addr: 0, len: 0 };

    /// Returns the address of the start of the buffer, as passed by the caller.
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Returns the length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check(&self, offset: usize, count: usize) -> Result<(), OutOfBounds> {
        match offset.checked_add(count) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(OutOfBounds),
        }
    }

    /// Copies bytes starting at `offset` in the shared buffer into `out`.
    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) -> Result<(), OutOfBounds> {
        self.check(offset, out.len())?;
        for (i, byte) in out.iter_mut().enumerate() {
            // SAFETY: The buffer was validated to be within the non-secure window when it was
            // created, and we just checked that `offset + i` is within the buffer.
            *byte = unsafe { ptr::read_volatile((self.addr + offset + i) as *const u8) };
        }
        Ok(())
    }

    /// Copies `bytes` into the shared buffer starting at `offset`.
    pub fn write_bytes(&self, offset: usize, bytes: &[u8]) -> Result<(), OutOfBounds> {
        self.check(offset, bytes.len())?;
        for (i, byte) in bytes.iter().enumerate() {
            // SAFETY: The buffer was validated to be within the non-secure window when it was
            // created, and we just checked that `offset + i` is within the buffer.
            unsafe { ptr::write_volatile((self.addr + offset + i) as *mut u8, *byte) };
        }
        Ok(())
    }

    /// Reads a `T` from the shared buffer at the given offset.
    ///
    /// The value is copied out, so later changes by the non-secure world don't affect it.
    pub fn read<T: FromBytes + IntoBytes>(&self, offset: usize) -> Result<T, OutOfBounds> {
        let mut value = T::new_zeroed();
        self.read_bytes(offset, value.as_mut_bytes())?;
        Ok(value)
    }

    /// Writes `value` to the shared buffer at the given offset.
    pub fn write<T: IntoBytes + Immutable>(
        &self,
        offset: usize,
        value: &T,
    ) -> Result<(), OutOfBounds> {
        self.write_bytes(offset, value.as_bytes())
    }
}

impl Debug for SharedBuffer {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "SharedBuffer({:#x}, {:#x})", self.addr, self.len)
    }
}
