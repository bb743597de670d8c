// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sequential primitive-field scanning.
//!
//! [`read_fields`] walks a cursor over raw memory, decoding one [`FieldKind`] at a time and
//! reporting every field to a [`DumpSink`]. No alignment padding is inserted between fields: the
//! kind list *is* the layout, including any padding the caller wants to skip over (as extra `U8`
//! or wider fields).

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::addr::Addr;
use crate::dump::DumpSink;
use crate::layout::{SliceHeader, TextHeader};

/// A primitive field shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Pointer-sized slot (8 bytes). The only kind whose value is captured.
    P64,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// A single character byte.
    C8,
}

impl FieldKind {
    /// Width of the field in bytes.
    #[must_use]
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::I8 | Self::U8 | Self::C8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 => 4,
            Self::P64 | Self::I64 | Self::U64 => 8,
        }
    }

    /// Short mnemonic (`"p64"`, `"i32"`, `"c8"`, ...).
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::P64 => "p64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::C8 => "c8",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for FieldKind {
    type Err = FieldKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "p64" => Self::P64,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "c8" => Self::C8,
            _ => {
                return Err(FieldKindError::Unknown {
                    mnemonic: s.into(),
                });
            }
        })
    }
}

/// A field-kind parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKindError {
    /// The mnemonic names no [`FieldKind`].
    Unknown {
        /// The offending mnemonic.
        mnemonic: Box<str>,
    },
    /// The list contained no mnemonics.
    Empty,
}

impl fmt::Display for FieldKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown { mnemonic } => write!(f, "unknown field kind: {mnemonic:?}"),
            Self::Empty => write!(f, "empty field kind list"),
        }
    }
}

impl core::error::Error for FieldKindError {}

/// Parses a comma-separated mnemonic list such as `"p64, i64, i64"`.
pub fn parse_field_kinds(list: &str) -> Result<Vec<FieldKind>, FieldKindError> {
    let kinds = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(FieldKind::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    if kinds.is_empty() {
        return Err(FieldKindError::Empty);
    }
    Ok(kinds)
}

/// A decoded field value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldValue {
    /// A pointer-sized slot.
    Ptr(Addr),
    /// A sign-extended integer.
    Signed(i64),
    /// A zero-extended integer.
    Unsigned(u64),
    /// A character byte.
    Char(u8),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ptr(addr) => write!(f, "{addr}"),
            Self::Signed(v) => write!(f, "{v}"),
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Char(c) => write!(f, "{}", char::from(*c)),
        }
    }
}

/// One field read by [`read_fields`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldLine {
    /// Cursor address of the field.
    pub addr: Addr,
    /// Width in bytes.
    pub width: usize,
    /// Decoded value.
    pub value: FieldValue,
}

impl fmt::Display for FieldLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] : {}", self.addr, self.width, self.value)
    }
}

/// Total width of a kind list in bytes.
#[must_use]
pub fn span(kinds: &[FieldKind]) -> usize {
    kinds.iter().map(|k| k.width()).sum()
}

/// Reads `kinds` sequentially starting at `base`, reporting each field to `sink`.
///
/// Returns the values of the [`FieldKind::P64`] fields in encounter order, so callers can chase
/// them afterwards.
///
/// # Safety
///
/// The `span(kinds)` bytes starting at `base` must be readable and initialized. Nothing is
/// checked: the kind list and base pointer are trusted to describe real memory.
pub unsafe fn read_fields<S: DumpSink + ?Sized>(
    sink: &mut S,
    base: *const u8,
    kinds: &[FieldKind],
) -> Vec<Addr> {
    let mut captured = Vec::new();
    let mut cursor = base;
    for &kind in kinds {
        // SAFETY: `cursor` stays inside the range the caller vouched for.
        let value = unsafe { decode(cursor, kind) };
        sink.field(&FieldLine {
            addr: Addr::of(cursor),
            width: kind.width(),
            value,
        });
        if let FieldValue::Ptr(addr) = value {
            captured.push(addr);
        }
        cursor = cursor.wrapping_add(kind.width());
    }
    captured
}

/// # Safety
///
/// `at` must be readable for `kind.width()` bytes.
unsafe fn decode(at: *const u8, kind: FieldKind) -> FieldValue {
    // SAFETY: forwarded from the caller; every read is unaligned.
    unsafe {
        match kind {
            FieldKind::P64 => FieldValue::Ptr(Addr::of(at.cast::<*const u8>().read_unaligned())),
            FieldKind::I8 => FieldValue::Signed(i64::from(at.cast::<i8>().read_unaligned())),
            FieldKind::I16 => FieldValue::Signed(i64::from(at.cast::<i16>().read_unaligned())),
            FieldKind::I32 => FieldValue::Signed(i64::from(at.cast::<i32>().read_unaligned())),
            FieldKind::I64 => FieldValue::Signed(at.cast::<i64>().read_unaligned()),
            FieldKind::U8 => FieldValue::Unsigned(u64::from(at.read_unaligned())),
            FieldKind::U16 => FieldValue::Unsigned(u64::from(at.cast::<u16>().read_unaligned())),
            FieldKind::U32 => FieldValue::Unsigned(u64::from(at.cast::<u32>().read_unaligned())),
            FieldKind::U64 => FieldValue::Unsigned(at.cast::<u64>().read_unaligned()),
            FieldKind::C8 => FieldValue::Char(at.read_unaligned()),
        }
    }
}

/// Field list of a text string header: `pointer, length`.
pub const TEXT_FIELDS: [FieldKind; 2] = [FieldKind::P64, FieldKind::I64];

/// Field list of four consecutive text string headers.
pub const TEXT_ARRAY4_FIELDS: [FieldKind; 8] = [
    FieldKind::P64,
    FieldKind::I64,
    FieldKind::P64,
    FieldKind::I64,
    FieldKind::P64,
    FieldKind::I64,
    FieldKind::P64,
    FieldKind::I64,
];

/// Field list of a sequence header: `pointer, length, capacity`.
pub const SLICE_FIELDS: [FieldKind; 3] = [FieldKind::P64, FieldKind::I64, FieldKind::I64];

/// Reads a text string header.
pub fn read_text<S: DumpSink + ?Sized>(sink: &mut S, text: &TextHeader) -> Vec<Addr> {
    // SAFETY: `TextHeader` is 16 bytes without padding, exactly `TEXT_FIELDS`.
    unsafe { read_fields(sink, core::ptr::from_ref(text).cast(), &TEXT_FIELDS) }
}

/// Reads an array of four text string headers.
pub fn read_text_array4<S: DumpSink + ?Sized>(sink: &mut S, texts: &[TextHeader; 4]) -> Vec<Addr> {
    // SAFETY: four packed `TextHeader`s cover exactly `TEXT_ARRAY4_FIELDS`.
    unsafe { read_fields(sink, core::ptr::from_ref(texts).cast(), &TEXT_ARRAY4_FIELDS) }
}

/// Reads a sequence header.
pub fn read_slice<S: DumpSink + ?Sized>(sink: &mut S, slice: &SliceHeader) -> Vec<Addr> {
    // SAFETY: `SliceHeader` is 24 bytes without padding, exactly `SLICE_FIELDS`.
    unsafe { read_fields(sink, core::ptr::from_ref(slice).cast(), &SLICE_FIELDS) }
}
