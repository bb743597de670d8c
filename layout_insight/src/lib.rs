// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `layout_insight`: raw-memory dumps of dynamic values and string maps.
//!
//! This crate reads the in-memory representation of a managed runtime's dynamic values and
//! associative containers *purely from offsets*. It does not ask the runtime anything; it assumes
//! the binary layout described in [`layout`] (versioned as [`LayoutVersion::V1`]) and prints what
//! it finds, one level at a time:
//!
//! - [`value::inspect_plain_value`]: value → type descriptor → operation table.
//! - [`value::inspect_bound_value`]: value → dispatch table → method-set type and concrete type.
//! - [`container::inspect_string_map`]: handle → control block → first bucket.
//! - [`field::read_fields`]: a sequential scan of primitive fields from a base address.
//!
//! Output goes to a [`DumpSink`]. [`TextSink`] renders text, [`RecordingSink`] keeps events for
//! assertions, and with the `std` feature `IoSink` writes to any `std::io::Write`.
//!
//! ## Faults, not errors
//!
//! The inspectors never validate what they read. A null layer reference panics; any other layout
//! mismatch is undefined behaviour. This is why every inspector is `unsafe`: the caller vouches
//! that the memory really has the assumed shape. Only the helper paths around inspection (parsing
//! field lists, walking a container into owned pairs, sink I/O) return typed errors.
//!
//! ## Example
//! ```
//! use layout_insight::field::read_text;
//! use layout_insight::layout::TextHeader;
//! use layout_insight::TextSink;
//!
//! let text = "hahahahah";
//! let header = TextHeader::borrowed(text);
//! let mut sink: TextSink = TextSink::default();
//! let pointers = read_text(&mut sink, &header);
//! assert_eq!(pointers[0].as_usize(), text.as_ptr() as usize);
//! assert!(sink.as_str().ends_with("[8] : 9\n"));
//! ```
//!
//! ## Features
//! - `std`: enables `IoSink` and the `print_*` helpers that write to standard output.

#![no_std]
#![allow(
    unsafe_code,
    reason = "the crate exists to reinterpret raw memory against an assumed layout"
)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod addr;
pub mod container;
pub mod dump;
pub mod field;
pub mod layout;
pub mod value;

pub use addr::Addr;
pub use dump::{DumpEvent, DumpSink, Level, RecordingSink, TextSink};
#[cfg(feature = "std")]
pub use dump::IoSink;
pub use layout::LayoutVersion;
pub use value::{InspectOptions, TagForm, TaggedValue};

#[cfg(feature = "std")]
mod stdout {
    use alloc::vec::Vec;

    use crate::addr::Addr;
    use crate::dump::IoSink;
    use crate::field::FieldKind;
    use crate::layout::MapHandle;

    /// Prints [`value::inspect_plain_value`](crate::value::inspect_plain_value) to standard
    /// output.
    ///
    /// # Safety
    ///
    /// See [`value::inspect_plain_value`](crate::value::inspect_plain_value).
    pub unsafe fn print_plain_value<V>(value: &V) -> std::io::Result<()> {
        let mut sink = IoSink::new(std::io::stdout().lock());
        // SAFETY: forwarded from the caller.
        unsafe { crate::value::inspect_plain_value(&mut sink, value) };
        sink.finish().map(drop)
    }

    /// Prints [`value::inspect_bound_value`](crate::value::inspect_bound_value) to standard
    /// output.
    ///
    /// # Safety
    ///
    /// See [`value::inspect_bound_value`](crate::value::inspect_bound_value).
    pub unsafe fn print_bound_value(addr: *const u8) -> std::io::Result<()> {
        let mut sink = IoSink::new(std::io::stdout().lock());
        // SAFETY: forwarded from the caller.
        unsafe { crate::value::inspect_bound_value(&mut sink, addr) };
        sink.finish().map(drop)
    }

    /// Prints [`container::inspect_string_map`](crate::container::inspect_string_map) to
    /// standard output.
    ///
    /// # Safety
    ///
    /// See [`container::inspect_string_map`](crate::container::inspect_string_map).
    pub unsafe fn print_string_map(handle: &MapHandle) -> std::io::Result<()> {
        let mut sink = IoSink::new(std::io::stdout().lock());
        // SAFETY: forwarded from the caller.
        unsafe { crate::container::inspect_string_map(&mut sink, handle) };
        sink.finish().map(drop)
    }

    /// Prints [`field::read_fields`](crate::field::read_fields) to standard output.
    ///
    /// # Safety
    ///
    /// See [`field::read_fields`](crate::field::read_fields).
    pub unsafe fn print_fields(base: *const u8, kinds: &[FieldKind]) -> std::io::Result<Vec<Addr>> {
        let mut sink = IoSink::new(std::io::stdout().lock());
        // SAFETY: forwarded from the caller.
        let captured = unsafe { crate::field::read_fields(&mut sink, base, kinds) };
        sink.finish().map(drop)?;
        Ok(captured)
    }
}

#[cfg(feature = "std")]
pub use stdout::{print_bound_value, print_fields, print_plain_value, print_string_map};
