// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Seeded hashing and the operation tables built on it.

use layout_insight::layout::{OperationTable, TextHeader, WORD};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Seeded FNV-1a with a final avalanche, so the top byte is as well mixed as the low bits.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "the v1 layout is 64-bit, where usize and u64 agree"
)]
pub fn hash_bytes(bytes: &[u8], seed: usize) -> usize {
    let mut h = FNV_OFFSET ^ seed as u64;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h as usize
}

/// 32-bit hash of a type name, as stored in `TypeDescriptor::hash`.
#[must_use]
pub fn name_hash(name: &str) -> u32 {
    let [a, b, c, d, ..] = hash_bytes(name.as_bytes(), 0).to_le_bytes();
    u32::from_le_bytes([a, b, c, d])
}

/// Hashes the text header at `p`.
///
/// # Safety
///
/// `p` must point to a readable `TextHeader` whose bytes are readable.
pub unsafe extern "C" fn string_hash(p: *const u8, seed: usize) -> usize {
    // SAFETY: guaranteed by the caller.
    let bytes = unsafe { p.cast::<TextHeader>().read_unaligned().bytes() };
    hash_bytes(bytes, seed)
}

/// Compares the text headers at `a` and `b` by content.
///
/// # Safety
///
/// Both pointers must satisfy the contract of [`string_hash`].
pub unsafe extern "C" fn string_equal(a: *const u8, b: *const u8) -> bool {
    // SAFETY: guaranteed by the caller.
    unsafe {
        let a = a.cast::<TextHeader>().read_unaligned();
        let b = b.cast::<TextHeader>().read_unaligned();
        a.bytes() == b.bytes()
    }
}

/// Hashes the machine word at `p`.
///
/// # Safety
///
/// `p` must point to [`WORD`] readable bytes.
pub unsafe extern "C" fn word_hash(p: *const u8, seed: usize) -> usize {
    // SAFETY: guaranteed by the caller.
    let word = unsafe { p.cast::<[u8; WORD]>().read_unaligned() };
    hash_bytes(&word, seed)
}

/// Compares the machine words at `a` and `b`.
///
/// # Safety
///
/// Both pointers must satisfy the contract of [`word_hash`].
pub unsafe extern "C" fn word_equal(a: *const u8, b: *const u8) -> bool {
    // SAFETY: guaranteed by the caller.
    unsafe {
        a.cast::<[u8; WORD]>().read_unaligned() == b.cast::<[u8; WORD]>().read_unaligned()
    }
}

/// Hashes four consecutive text headers, threading the hash through each element.
///
/// # Safety
///
/// `p` must point to four readable text headers, each satisfying [`string_hash`].
pub unsafe extern "C" fn text_array4_hash(p: *const u8, seed: usize) -> usize {
    let texts = p.cast::<TextHeader>();
    let mut h = seed;
    for i in 0..4 {
        // SAFETY: guaranteed by the caller; `i` stays inside the array.
        h = unsafe { string_hash(texts.add(i).cast(), h) };
    }
    h
}

/// Compares two arrays of four text headers element by element.
///
/// # Safety
///
/// Both pointers must satisfy the contract of [`text_array4_hash`].
pub unsafe extern "C" fn text_array4_equal(a: *const u8, b: *const u8) -> bool {
    let (a, b) = (a.cast::<TextHeader>(), b.cast::<TextHeader>());
    // SAFETY: guaranteed by the caller; `i` stays inside both arrays.
    (0..4).all(|i| unsafe { string_equal(a.add(i).cast(), b.add(i).cast()) })
}

/// Operations for text values.
pub static STRING_OPS: OperationTable = OperationTable {
    hash: Some(string_hash),
    equal: Some(string_equal),
};

/// Operations for word-sized integers.
pub static WORD_OPS: OperationTable = OperationTable {
    hash: Some(word_hash),
    equal: Some(word_equal),
};

/// Operations for four-element text arrays.
pub static TEXT_ARRAY4_OPS: OperationTable = OperationTable {
    hash: Some(text_array4_hash),
    equal: Some(text_array4_equal),
};

/// Operations for types that cannot be hashed or compared.
pub static NOEQ_OPS: OperationTable = OperationTable {
    hash: None,
    equal: None,
};
