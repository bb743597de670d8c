// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A model runtime for exercising `layout_insight`.
//!
//! The inspectors assume memory that a managed runtime laid out. This crate plays that runtime:
//! [`ModelHeap`] owns every allocation it hands out and builds type descriptors, operation
//! tables, dispatch tables, dynamic values, text and slice headers, and string maps whose bucket
//! placement follows the v1 hashing rules (seeded hash, low bits pick the bucket, the top byte is
//! the slot's top hash).
//!
//! Everything returned by the heap holds raw pointers into it. Keep the heap alive for as long as
//! those values are inspected.
//!
//! ## Example
//! ```
//! use layout_insight::value::inspect_plain_value;
//! use layout_insight::RecordingSink;
//! use layout_insight_conformance::ModelHeap;
//!
//! let mut heap = ModelHeap::new();
//! let typ = heap.string_type()?;
//! let payload = heap.text("hahahahah");
//! let value = heap.plain_value(typ, payload)?;
//!
//! let mut sink = RecordingSink::new();
//! // SAFETY: `value` was laid out by `heap`, which is still alive.
//! unsafe { inspect_plain_value(&mut sink, &value) };
//! assert_eq!(sink.levels().count(), 3);
//! # Ok::<(), layout_insight_conformance::ModelError>(())
//! ```

#![allow(
    unsafe_code,
    reason = "the model runtime hands out raw pointers into memory it owns"
)]

mod hash;
mod heap;
mod map;

pub use hash::{
    NOEQ_OPS, STRING_OPS, TEXT_ARRAY4_OPS, WORD_OPS, hash_bytes, name_hash, string_equal,
    string_hash, text_array4_equal, text_array4_hash, word_equal, word_hash,
};
pub use heap::{DEFAULT_SEED, DispatchRef, MethodFn, ModelError, ModelHeap, TypeRef, TypeSpec};
pub use map::{
    LOAD_FACTOR_DEN, LOAD_FACTOR_NUM, MAX_LOG2_BUCKETS, MapShape, log2_buckets_for,
    over_load_factor, top_hash,
};
