// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! String maps laid out the way the v1 runtime places entries.
//!
//! Placement rules:
//! - the key's seeded hash (seed = the control block's `hash0`) picks bucket `hash & (2^B - 1)`,
//! - the slot's top hash is the hash's top byte, bumped past the reserved markers,
//! - a full bucket chains to an overflow bucket,
//! - `B` is the smallest value keeping the average load at or under 6.5 entries per bucket.

use core::iter;
use core::ptr;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use layout_insight::container::is_empty_slot;
use layout_insight::layout::{
    BUCKET_SLOTS, ControlBlock, MIN_TOP_HASH, MapHandle, StringBucket, TOP_HASH_EVACUATED_EMPTY,
    TOP_HASH_EVACUATED_X, TOP_HASH_EVACUATED_Y, TextHeader,
};

use crate::hash::hash_bytes;
use crate::heap::{ModelError, ModelHeap};

/// Load factor numerator: 6.5 entries per bucket.
pub const LOAD_FACTOR_NUM: usize = 13;
/// Load factor denominator.
pub const LOAD_FACTOR_DEN: usize = 2;
/// Largest bucket array the model lays out.
pub const MAX_LOG2_BUCKETS: u8 = 24;

/// Reports whether `count` entries overload `2^log2_buckets` buckets.
#[must_use]
pub fn over_load_factor(count: usize, log2_buckets: u8) -> bool {
    let buckets = 1_usize
        .checked_shl(u32::from(log2_buckets))
        .unwrap_or(usize::MAX);
    count > BUCKET_SLOTS && count > LOAD_FACTOR_NUM.saturating_mul(buckets / LOAD_FACTOR_DEN)
}

/// Smallest `log2` bucket count that holds `count` entries.
#[must_use]
pub fn log2_buckets_for(count: usize) -> u8 {
    let mut log2_buckets = 0;
    while over_load_factor(count, log2_buckets) {
        log2_buckets += 1;
    }
    log2_buckets
}

/// Top-hash byte stored for a key with `hash`.
#[must_use]
pub fn top_hash(hash: usize) -> u8 {
    let top = hash.to_be_bytes()[0];
    if top < MIN_TOP_HASH {
        top + MIN_TOP_HASH
    } else {
        top
    }
}

/// Optional shape overrides for [`ModelHeap::string_map_with`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MapShape {
    /// Lower bound on `B`.
    pub min_log2_buckets: u8,
    /// Lay the map out mid-growth, with this many old buckets already evacuated.
    pub growing: Option<usize>,
}

struct Chain {
    head: StringBucket,
    overflow: Vec<StringBucket>,
}

impl Chain {
    fn new() -> Self {
        Self {
            head: StringBucket::EMPTY,
            overflow: Vec::new(),
        }
    }

    fn buckets_mut(&mut self) -> impl Iterator<Item = &mut StringBucket> {
        iter::once(&mut self.head).chain(self.overflow.iter_mut())
    }

    fn insert(&mut self, top: u8, key: TextHeader, value: TextHeader) {
        for bucket in self.buckets_mut() {
            if let Some(slot) = bucket.tophash.iter().position(|&t| is_empty_slot(t)) {
                fill(bucket, slot, top, key, value);
                return;
            }
        }
        let mut fresh = StringBucket::EMPTY;
        fill(&mut fresh, 0, top, key, value);
        self.overflow.push(fresh);
    }

    fn mark_evacuated_empties(&mut self) {
        for bucket in self.buckets_mut() {
            for top in &mut bucket.tophash {
                if is_empty_slot(*top) {
                    *top = TOP_HASH_EVACUATED_EMPTY;
                }
            }
        }
    }
}

fn fill(bucket: &mut StringBucket, slot: usize, top: u8, key: TextHeader, value: TextHeader) {
    bucket.tophash[slot] = top;
    bucket.keys[slot] = key;
    bucket.values[slot] = value;
}

/// Keeps the first position of each key and its last value.
fn dedup<'a>(entries: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(entries.len());
    let mut out: Vec<(&str, &str)> = Vec::with_capacity(entries.len());
    for &(key, value) in entries {
        match positions.entry(key) {
            Entry::Occupied(seen) => out[*seen.get()].1 = value,
            Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push((key, value));
            }
        }
    }
    out
}

impl ModelHeap {
    /// Lays out a string map holding `entries`. Later duplicates overwrite earlier values.
    ///
    /// An empty map has no bucket array, matching a freshly created runtime map.
    pub fn string_map(&mut self, entries: &[(&str, &str)]) -> Result<MapHandle, ModelError> {
        self.string_map_with(entries, MapShape::default())
    }

    /// Lays out a string map holding `entries` with the given shape overrides.
    pub fn string_map_with(
        &mut self,
        entries: &[(&str, &str)],
        shape: MapShape,
    ) -> Result<MapHandle, ModelError> {
        let entries = dedup(entries);
        let mut log2_buckets = log2_buckets_for(entries.len()).max(shape.min_log2_buckets);
        if shape.growing.is_some() {
            log2_buckets = log2_buckets.max(1);
        }
        if log2_buckets > MAX_LOG2_BUCKETS {
            return Err(ModelError::TooManyBuckets {
                log2_buckets,
                max: MAX_LOG2_BUCKETS,
            });
        }

        let hash0 = self.next_map_seed();
        let seed = hash0 as usize;
        let (buckets, oldbuckets, nevacuate, overflow) = match shape.growing {
            None if entries.is_empty() && log2_buckets == 0 => (ptr::null(), ptr::null(), 0, 0),
            None => {
                let chains = self.chains(log2_buckets, seed, &entries, |_| true, 0);
                let (buckets, overflow) = self.materialize(chains);
                (buckets, ptr::null(), 0, overflow)
            }
            Some(nevacuate) => {
                let old_log2 = log2_buckets - 1;
                let old_buckets = 1_usize << old_log2;
                if nevacuate >= old_buckets {
                    return Err(ModelError::NevacuateOutOfRange {
                        nevacuate,
                        old_buckets,
                    });
                }
                let old_mask = old_buckets - 1;
                let fresh = self.chains(
                    log2_buckets,
                    seed,
                    &entries,
                    |hash| hash & old_mask < nevacuate,
                    0,
                );
                let old = self.chains(old_log2, seed, &entries, |_| true, nevacuate);
                let (buckets, fresh_overflow) = self.materialize(fresh);
                let (oldbuckets, old_overflow) = self.materialize(old);
                (
                    buckets,
                    oldbuckets,
                    nevacuate,
                    fresh_overflow + old_overflow,
                )
            }
        };

        let noverflow = u16::try_from(overflow)
            .map_err(|_| ModelError::TooManyOverflowBuckets { count: overflow })?;
        let control = self.keep(ControlBlock {
            count: entries.len().cast_signed(),
            flags: 0,
            log2_buckets,
            noverflow,
            hash0,
            buckets: buckets.cast(),
            oldbuckets: oldbuckets.cast(),
            nevacuate,
            extra: ptr::null(),
        });
        Ok(MapHandle { control })
    }

    /// Places `entries` into `2^log2_buckets` chains.
    ///
    /// Chains below `evacuated_below` are laid out as already evacuated: their slots keep only
    /// the evacuation marker saying which half of the grown array received the entry.
    fn chains(
        &mut self,
        log2_buckets: u8,
        seed: usize,
        entries: &[(&str, &str)],
        include: impl Fn(usize) -> bool,
        evacuated_below: usize,
    ) -> Vec<Chain> {
        let count = 1_usize << log2_buckets;
        let mask = count - 1;
        let mut chains: Vec<Chain> = (0..count).map(|_| Chain::new()).collect();
        for &(key, value) in entries {
            let hash = hash_bytes(key.as_bytes(), seed);
            if !include(hash) {
                continue;
            }
            let index = hash & mask;
            if index < evacuated_below {
                let marker = if hash & count == 0 {
                    TOP_HASH_EVACUATED_X
                } else {
                    TOP_HASH_EVACUATED_Y
                };
                chains[index].insert(marker, TextHeader::EMPTY, TextHeader::EMPTY);
            } else {
                let (key, value) = (self.text(key), self.text(value));
                chains[index].insert(top_hash(hash), key, value);
            }
        }
        for chain in chains.iter_mut().take(evacuated_below) {
            chain.mark_evacuated_empties();
        }
        chains
    }

    /// Moves `chains` into the heap, linking overflow buckets. Returns the bucket array and the
    /// number of overflow buckets.
    fn materialize(&mut self, chains: Vec<Chain>) -> (*const StringBucket, usize) {
        let mut overflow = 0;
        let mut heads = Vec::with_capacity(chains.len());
        for chain in chains {
            overflow += chain.overflow.len();
            let mut next: *const StringBucket = ptr::null();
            for mut bucket in chain.overflow.into_iter().rev() {
                bucket.overflow = next;
                next = self.keep(bucket);
            }
            let mut head = chain.head;
            head.overflow = next;
            heads.push(head);
        }
        (self.keep_slice(heads.into_boxed_slice()), overflow)
    }
}
