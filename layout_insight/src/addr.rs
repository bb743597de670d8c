// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raw addresses as they appear in dumps.

use core::fmt;

/// An address observed in (or computed over) inspected memory.
///
/// Addresses are plain integers: holding one does not keep anything alive and does not grant
/// access to the memory behind it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Addr(usize);

impl Addr {
    /// The null address.
    pub const NULL: Self = Self(0);

    /// Creates an address from its raw integer value.
    #[inline]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the address of `ptr`.
    ///
    /// The pointer's provenance is exposed so the address can later be turned back into a
    /// pointer with [`Addr::as_ptr`].
    #[inline]
    pub fn of<T: ?Sized>(ptr: *const T) -> Self {
        Self(ptr.cast::<u8>().expose_provenance())
    }

    /// Returns the raw integer backing this address.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns `true` for the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the address `bytes` past this one.
    #[inline]
    #[must_use]
    pub const fn offset(self, bytes: usize) -> Self {
        Self(self.0.wrapping_add(bytes))
    }

    /// Converts the address back into a pointer.
    ///
    /// Dereferencing the result is only meaningful if the address was produced from a live
    /// pointer whose provenance was exposed.
    #[inline]
    pub fn as_ptr<T>(self) -> *const T {
        core::ptr::with_exposed_provenance(self.0)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
