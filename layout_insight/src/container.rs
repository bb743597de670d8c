// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reinterpretation of string-keyed, string-valued containers.
//!
//! [`inspect_string_map`] is a snapshot of three levels: the handle, its control block and the
//! *first* bucket of the bucket array. It does not follow overflow chains, does not look at the
//! old bucket array of a growing container and does not reassemble key/value pairs.
//!
//! [`collect_string_map`] is the full walk: every bucket and every overflow chain, decoded into
//! owned pairs.

use alloc::string::String;
use core::fmt;
use core::mem::size_of;
use core::ptr;

use hashbrown::HashMap;

use crate::addr::Addr;
use crate::dump::{DumpSink, Level};
use crate::layout::{
    BUCKET_SLOTS, ControlBlock, MIN_TOP_HASH, MapHandle, StringBucket, TOP_HASH_EMPTY_ONE,
    TextHeader,
};
use crate::value::{InspectOptions, peel};

impl MapHandle {
    /// Peels the control block.
    ///
    /// # Safety
    ///
    /// `control` must point to a live control block.
    ///
    /// # Panics
    ///
    /// Panics if `control` is null.
    pub unsafe fn control_block(&self) -> &ControlBlock {
        // SAFETY: forwarded from the caller.
        unsafe { peel(self.control, "control block") }
    }
}

impl ControlBlock {
    /// Peels the first bucket of the bucket array as a string bucket.
    ///
    /// # Safety
    ///
    /// `buckets` must point to a live array of string buckets.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is null.
    pub unsafe fn first_string_bucket(&self) -> &StringBucket {
        // SAFETY: forwarded from the caller.
        unsafe { peel(self.buckets.cast::<StringBucket>(), "bucket array") }
    }
}

impl TextHeader {
    /// Returns the bytes this header points at.
    ///
    /// Headers with a non-positive length decode to the empty slice without touching `data`.
    ///
    /// # Safety
    ///
    /// For a positive length, `data` must be readable for `len` bytes during `'a`.
    pub unsafe fn bytes<'a>(&self) -> &'a [u8] {
        match usize::try_from(self.len) {
            Ok(0) | Err(_) => &[],
            // SAFETY: forwarded from the caller.
            Ok(len) => unsafe { core::slice::from_raw_parts(self.data, len) },
        }
    }
}

/// Returns `true` if `top_hash` marks an occupied slot.
#[must_use]
#[inline]
pub const fn is_occupied(top_hash: u8) -> bool {
    top_hash >= MIN_TOP_HASH
}

/// Returns `true` if `top_hash` marks an empty slot (either empty marker).
#[must_use]
#[inline]
pub const fn is_empty_slot(top_hash: u8) -> bool {
    top_hash <= TOP_HASH_EMPTY_ONE
}

/// Text that renders as a quoted string when it is valid UTF-8 and as bytes otherwise.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Text<'a>(pub &'a [u8]);

impl Text<'_> {
    /// Returns the text, replacing invalid UTF-8.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.0).into_owned()
    }
}

impl fmt::Debug for Text<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(self.0) {
            Ok(s) => fmt::Debug::fmt(s, f),
            Err(_) => fmt::Debug::fmt(self.0, f),
        }
    }
}

/// One occupied slot of a bucket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slot<'a> {
    /// Slot index within the bucket.
    pub index: usize,
    /// Cached top byte of the key hash.
    pub top_hash: u8,
    /// Key text.
    pub key: Text<'a>,
    /// Value text.
    pub value: Text<'a>,
}

/// A string bucket with its key and value text decoded.
///
/// `Debug` renders the fixed bucket shape: top hashes, eight keys, eight values and the overflow
/// link.
#[derive(Copy, Clone)]
pub struct BucketView<'a> {
    tophash: [u8; BUCKET_SLOTS],
    keys: [Text<'a>; BUCKET_SLOTS],
    values: [Text<'a>; BUCKET_SLOTS],
    overflow: *const StringBucket,
}

impl<'a> BucketView<'a> {
    /// Decodes `bucket`.
    ///
    /// # Safety
    ///
    /// Every key and value header with a positive length must point to live text for `'a`.
    pub unsafe fn new(bucket: &StringBucket) -> Self {
        // SAFETY: forwarded from the caller.
        let keys = bucket.keys.map(|k| Text(unsafe { k.bytes() }));
        // SAFETY: forwarded from the caller.
        let values = bucket.values.map(|v| Text(unsafe { v.bytes() }));
        Self {
            tophash: bucket.tophash,
            keys,
            values,
            overflow: bucket.overflow,
        }
    }

    /// Returns the occupied slots in slot order.
    pub fn slots(&self) -> impl Iterator<Item = Slot<'a>> + '_ {
        (0..BUCKET_SLOTS)
            .filter(|&i| is_occupied(self.tophash[i]))
            .map(|i| Slot {
                index: i,
                top_hash: self.tophash[i],
                key: self.keys[i],
                value: self.values[i],
            })
    }

    /// Returns the top-hash bytes.
    #[must_use]
    pub fn tophash(&self) -> [u8; BUCKET_SLOTS] {
        self.tophash
    }

    /// Returns the next bucket of the overflow chain.
    #[must_use]
    pub fn overflow(&self) -> *const StringBucket {
        self.overflow
    }
}

impl fmt::Debug for BucketView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringBucket")
            .field("tophash", &self.tophash)
            .field("keys", &self.keys)
            .field("values", &self.values)
            .field("overflow", &self.overflow)
            .finish()
    }
}

/// Dumps a string-keyed, string-valued container.
///
/// Prints three levels: the handle, its control block, and the first bucket.
///
/// # Safety
///
/// `handle` must reference a live control block whose bucket array holds live string buckets.
///
/// # Panics
///
/// Panics if the control block or bucket array reference is null (an empty container has no
/// bucket array).
pub unsafe fn inspect_string_map<S: DumpSink + ?Sized>(sink: &mut S, handle: &MapHandle) {
    // SAFETY: forwarded from the caller.
    unsafe { inspect_string_map_with(sink, handle, InspectOptions::FULL) };
}

/// [`inspect_string_map`] with explicit options.
///
/// # Safety
///
/// See [`inspect_string_map`].
///
/// # Panics
///
/// See [`inspect_string_map`].
pub unsafe fn inspect_string_map_with<S: DumpSink + ?Sized>(
    sink: &mut S,
    handle: &MapHandle,
    options: InspectOptions,
) {
    let origin = Addr::of(ptr::from_ref(handle));
    sink.banner("a string map", origin);
    sink.level(&Level::new(1, origin, size_of::<MapHandle>(), None, handle));
    if !options.reaches(2) {
        return;
    }
    // SAFETY: forwarded from the caller.
    let control = unsafe { handle.control_block() };
    sink.level(&Level::new(
        2,
        Addr::of(handle.control),
        size_of::<ControlBlock>(),
        Some("control"),
        control,
    ));
    if !options.reaches(3) {
        return;
    }
    // SAFETY: forwarded from the caller.
    let bucket = unsafe { BucketView::new(control.first_string_bucket()) };
    sink.level(&Level::new(
        3,
        Addr::of(control.buckets),
        size_of::<StringBucket>(),
        Some("control.buckets[0]"),
        &bucket,
    ));
}

/// A container walk error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalkError {
    /// The container is mid-growth; entries may still live in the old bucket array.
    Growing {
        /// Evacuation progress counter.
        nevacuate: usize,
    },
    /// The walk found a different number of entries than the control block counts.
    CountMismatch {
        /// Live count from the control block.
        expected: isize,
        /// Distinct keys found.
        found: usize,
    },
}

impl fmt::Display for WalkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Growing { nevacuate } => {
                write!(f, "container is growing (nevacuate={nevacuate})")
            }
            Self::CountMismatch { expected, found } => {
                write!(f, "count mismatch: expected={expected} found={found}")
            }
        }
    }
}

impl core::error::Error for WalkError {}

/// Walks every bucket and overflow chain and returns the logical key/value pairs.
///
/// Invalid UTF-8 is replaced. A container without a bucket array is empty.
///
/// # Safety
///
/// `handle` must reference a live control block whose bucket array and overflow chains hold
/// live string buckets.
///
/// # Panics
///
/// Panics if the control block reference is null.
pub unsafe fn collect_string_map(handle: &MapHandle) -> Result<HashMap<String, String>, WalkError> {
    // SAFETY: forwarded from the caller.
    let control = unsafe { handle.control_block() };
    if control.is_growing() {
        return Err(WalkError::Growing {
            nevacuate: control.nevacuate,
        });
    }

    let mut pairs = HashMap::with_capacity(usize::try_from(control.count).unwrap_or(0));
    if !control.buckets.is_null() {
        let base = control.buckets.cast::<StringBucket>();
        for index in 0..control.bucket_count() {
            let mut next = base.wrapping_add(index);
            while !next.is_null() {
                // SAFETY: forwarded from the caller.
                let bucket = unsafe { BucketView::new(&*next) };
                for slot in bucket.slots() {
                    pairs.insert(slot.key.to_string_lossy(), slot.value.to_string_lossy());
                }
                next = bucket.overflow();
            }
        }
    }

    if usize::try_from(control.count).ok() != Some(pairs.len()) {
        return Err(WalkError::CountMismatch {
            expected: control.count,
            found: pairs.len(),
        });
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::dump::{DumpEvent, RecordingSink};
    use crate::layout::TOP_HASH_EMPTY_REST;
    use std::vec::Vec;

    fn control(buckets: *const StringBucket, count: isize) -> ControlBlock {
        ControlBlock {
            count,
            flags: 0,
            log2_buckets: 0,
            noverflow: 0,
            hash0: 0x5eed,
            buckets: buckets.cast(),
            oldbuckets: ptr::null(),
            nevacuate: 0,
            extra: ptr::null(),
        }
    }

    #[test]
    fn first_bucket_decodes_occupied_slots() {
        let (k, v) = ("name", "a");
        let mut bucket = StringBucket::EMPTY;
        bucket.tophash[2] = 0x9c;
        bucket.keys[2] = TextHeader::borrowed(k);
        bucket.values[2] = TextHeader::borrowed(v);
        let control = control(&raw const bucket, 1);
        let handle = MapHandle {
            control: &raw const control,
        };

        let mut sink = RecordingSink::new();
        // SAFETY: all headers borrow live literals.
        unsafe { inspect_string_map(&mut sink, &handle) };

        let levels: Vec<_> = sink
            .events()
            .iter()
            .filter_map(|e| match e {
                DumpEvent::Level {
                    index,
                    size,
                    content,
                    ..
                } => Some((*index, *size, content.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(levels.len(), 3);
        assert_eq!((levels[0].0, levels[0].1), (1, 8));
        assert_eq!((levels[1].0, levels[1].1), (2, 48));
        assert_eq!((levels[2].0, levels[2].1), (3, 272));
        assert!(
            levels[2]
                .2
                .contains(r#"keys: ["", "", "name", "", "", "", "", ""]"#),
            "bucket keys rendered as text: {}",
            levels[2].2
        );

        // SAFETY: as above.
        let view = unsafe { BucketView::new(&bucket) };
        let slots: Vec<_> = view.slots().collect();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].index, 2);
        assert_eq!(slots[0].key, Text(b"name"));
        assert_eq!(view.tophash()[0], TOP_HASH_EMPTY_REST);
    }

    #[test]
    fn collect_follows_overflow_chains() {
        let mut tail = StringBucket::EMPTY;
        tail.tophash[0] = MIN_TOP_HASH;
        tail.keys[0] = TextHeader::borrowed("k2");
        tail.values[0] = TextHeader::borrowed("v2");
        let mut head = StringBucket::EMPTY;
        head.tophash[7] = 0xff;
        head.keys[7] = TextHeader::borrowed("k1");
        head.values[7] = TextHeader::borrowed("v1");
        head.overflow = &raw const tail;
        let control = control(&raw const head, 2);
        let handle = MapHandle {
            control: &raw const control,
        };

        // SAFETY: the chain and its text are live locals.
        let pairs = unsafe { collect_string_map(&handle) }.unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs.get("k1").map(String::as_str), Some("v1"));
        assert_eq!(pairs.get("k2").map(String::as_str), Some("v2"));
    }

    #[test]
    fn collect_rejects_growing_and_miscounted_containers() {
        let bucket = StringBucket::EMPTY;
        let mut growing = control(&raw const bucket, 0);
        growing.oldbuckets = (&raw const bucket).cast();
        growing.nevacuate = 3;
        let handle = MapHandle {
            control: &raw const growing,
        };
        // SAFETY: live locals.
        assert_eq!(
            unsafe { collect_string_map(&handle) },
            Err(WalkError::Growing { nevacuate: 3 })
        );

        let miscounted = control(&raw const bucket, 4);
        let handle = MapHandle {
            control: &raw const miscounted,
        };
        // SAFETY: live locals.
        assert_eq!(
            unsafe { collect_string_map(&handle) },
            Err(WalkError::CountMismatch {
                expected: 4,
                found: 0
            })
        );
    }

    #[test]
    fn empty_container_collects_to_nothing() {
        let control = control(ptr::null(), 0);
        let handle = MapHandle {
            control: &raw const control,
        };
        // SAFETY: no bucket array to read.
        let pairs = unsafe { collect_string_map(&handle) }.unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    #[should_panic(expected = "null bucket array reference")]
    fn empty_container_has_no_first_bucket() {
        let control = control(ptr::null(), 0);
        let handle = MapHandle {
            control: &raw const control,
        };
        let mut sink = RecordingSink::new();
        // SAFETY: the only bad reference is null.
        unsafe { inspect_string_map(&mut sink, &handle) };
    }

    #[test]
    #[should_panic(expected = "null control block reference")]
    fn null_control_block_is_a_fault() {
        let handle = MapHandle {
            control: ptr::null(),
        };
        let mut sink = RecordingSink::new();
        // SAFETY: the only bad reference is null.
        unsafe { inspect_string_map(&mut sink, &handle) };
    }

    #[test]
    fn slot_markers() {
        assert!(is_empty_slot(TOP_HASH_EMPTY_REST));
        assert!(is_empty_slot(TOP_HASH_EMPTY_ONE));
        assert!(!is_occupied(MIN_TOP_HASH - 1));
        assert!(is_occupied(MIN_TOP_HASH));
    }
}
