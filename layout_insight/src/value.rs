// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reinterpretation of dynamic values.
//!
//! A dynamic value is two words. Which two words depends on whether the value carries a method
//! set: see [`TaggedValue`]. The inspectors here overlay those words onto the layout records and
//! peel one reference at a time, reporting each layer to a [`DumpSink`]:
//!
//! ```text
//! PlainValue ─typ─▶ TypeDescriptor ─ops─▶ OperationTable
//! BoundValue ─table─▶ DispatchTable ─interface─▶ TypeDescriptor
//!                                   ─concrete──▶ TypeDescriptor
//! ```
//!
//! ## Faults
//!
//! Peeling a null reference panics with the name of the layer. Any other wrong address is
//! undefined behaviour: the inspectors show what memory holds under the assumed layout and do
//! not try to detect when the assumption is false.

use core::mem::size_of;
use core::ptr;

use crate::addr::Addr;
use crate::dump::{DumpSink, Level};
use crate::layout::{BoundValue, DispatchTable, OperationTable, PlainValue, TypeDescriptor};

/// Size of the two-word image of a dynamic value.
pub const TAGGED_VALUE_BYTES: usize = 16;

/// How far an inspection expands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InspectOptions {
    /// Deepest level to print; level 1 is the value or handle itself.
    ///
    /// Level 1 is always printed, so `0` behaves like `1`.
    pub max_level: u8,
}

impl InspectOptions {
    /// Full expansion (three levels).
    pub const FULL: Self = Self { max_level: 3 };

    /// Expansion down to `max_level`.
    #[inline]
    pub const fn to_level(max_level: u8) -> Self {
        Self { max_level }
    }

    #[inline]
    pub(crate) const fn reaches(self, level: u8) -> bool {
        level <= self.max_level
    }
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self::FULL
    }
}

/// Which of the two shapes to read a dynamic value as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TagForm {
    /// `(type descriptor, payload)`.
    Plain,
    /// `(dispatch table, payload)`.
    Bound,
}

/// A dynamic value, overlaid on its two-word image.
#[derive(Copy, Clone, Debug)]
pub enum TaggedValue {
    /// A value without a method set.
    Plain(PlainValue),
    /// A value with a fixed method set.
    Bound(BoundValue),
}

impl TaggedValue {
    /// Overlays the [`TAGGED_VALUE_BYTES`] bytes at `region` as `form`.
    ///
    /// # Safety
    ///
    /// `region` must be readable for [`TAGGED_VALUE_BYTES`] bytes.
    #[must_use]
    pub unsafe fn overlay(region: *const u8, form: TagForm) -> Self {
        // SAFETY: both shapes are exactly two words; reads are unaligned.
        unsafe {
            match form {
                TagForm::Plain => Self::Plain(region.cast::<PlainValue>().read_unaligned()),
                TagForm::Bound => Self::Bound(region.cast::<BoundValue>().read_unaligned()),
            }
        }
    }

    /// Returns the payload pointer.
    #[must_use]
    pub fn word(&self) -> *const u8 {
        match self {
            Self::Plain(v) => v.word,
            Self::Bound(v) => v.word,
        }
    }

    /// Returns the concrete type of the payload.
    ///
    /// # Safety
    ///
    /// For the bound form, the dispatch table must be live.
    ///
    /// # Panics
    ///
    /// Panics if the bound form's dispatch table reference is null.
    #[must_use]
    pub unsafe fn concrete_type(&self) -> *const TypeDescriptor {
        match self {
            Self::Plain(v) => v.typ,
            // SAFETY: forwarded from the caller.
            Self::Bound(v) => unsafe { v.dispatch_table() }.concrete,
        }
    }
}

/// Borrows the record behind a layer reference.
///
/// # Safety
///
/// A non-null `ptr` must point to a live, aligned `T` for `'a`.
///
/// # Panics
///
/// Panics if `ptr` is null.
pub(crate) unsafe fn peel<'a, T>(ptr: *const T, layer: &str) -> &'a T {
    assert!(!ptr.is_null(), "null {layer} reference");
    // SAFETY: non-null, and the caller vouches for the rest.
    unsafe { &*ptr }
}

impl PlainValue {
    /// Peels the type descriptor.
    ///
    /// # Safety
    ///
    /// `typ` must point to a live descriptor.
    ///
    /// # Panics
    ///
    /// Panics if `typ` is null.
    pub unsafe fn type_descriptor(&self) -> &TypeDescriptor {
        // SAFETY: forwarded from the caller.
        unsafe { peel(self.typ, "type descriptor") }
    }
}

impl TypeDescriptor {
    /// Peels the operation table.
    ///
    /// # Safety
    ///
    /// `ops` must point to a live operation table.
    ///
    /// # Panics
    ///
    /// Panics if `ops` is null.
    pub unsafe fn operations(&self) -> &OperationTable {
        // SAFETY: forwarded from the caller.
        unsafe { peel(self.ops, "operation table") }
    }
}

impl BoundValue {
    /// Peels the dispatch table.
    ///
    /// # Safety
    ///
    /// `table` must point to a live dispatch table.
    ///
    /// # Panics
    ///
    /// Panics if `table` is null.
    pub unsafe fn dispatch_table(&self) -> &DispatchTable {
        // SAFETY: forwarded from the caller.
        unsafe { peel(self.table, "dispatch table") }
    }
}

impl DispatchTable {
    /// Peels the method-set type.
    ///
    /// # Safety
    ///
    /// `interface` must point to a live descriptor.
    ///
    /// # Panics
    ///
    /// Panics if `interface` is null.
    pub unsafe fn interface_type(&self) -> &TypeDescriptor {
        // SAFETY: forwarded from the caller.
        unsafe { peel(self.interface, "interface type") }
    }

    /// Peels the concrete type.
    ///
    /// # Safety
    ///
    /// `concrete` must point to a live descriptor.
    ///
    /// # Panics
    ///
    /// Panics if `concrete` is null.
    pub unsafe fn concrete_type(&self) -> &TypeDescriptor {
        // SAFETY: forwarded from the caller.
        unsafe { peel(self.concrete, "concrete type") }
    }

    /// Returns the first `count` method slots.
    ///
    /// # Safety
    ///
    /// The table must really have `count` slots; all but the first live past the fixed record.
    pub unsafe fn method_slots(&self, count: usize) -> &[*const u8] {
        // SAFETY: forwarded from the caller.
        unsafe { core::slice::from_raw_parts(self.fun.as_ptr(), count) }
    }
}

/// Dumps a dynamic value read as `(type descriptor, payload)`.
///
/// Prints three levels: the value itself, its type descriptor and the descriptor's operation
/// table.
///
/// # Safety
///
/// `value`'s two words must really be a plain dynamic value in the assumed layout, with live
/// type descriptor and operation table.
///
/// # Panics
///
/// Panics if the type descriptor or operation table reference is null.
pub unsafe fn inspect_plain_value<S, V>(sink: &mut S, value: &V)
where
    S: DumpSink + ?Sized,
{
    // SAFETY: forwarded from the caller.
    unsafe { inspect_plain_value_with(sink, value, InspectOptions::FULL) };
}

/// [`inspect_plain_value`] with explicit options.
///
/// # Safety
///
/// See [`inspect_plain_value`].
///
/// # Panics
///
/// See [`inspect_plain_value`].
pub unsafe fn inspect_plain_value_with<S, V>(sink: &mut S, value: &V, options: InspectOptions)
where
    S: DumpSink + ?Sized,
{
    const { assert!(size_of::<V>() == TAGGED_VALUE_BYTES, "not a two-word value") };
    let origin = ptr::from_ref(value).cast::<u8>();
    sink.banner("a plain value", Addr::of(origin));
    // SAFETY: `value` is a live 16-byte object.
    let tagged = unsafe { TaggedValue::overlay(origin, TagForm::Plain) };
    // SAFETY: forwarded from the caller.
    unsafe { expand(sink, Addr::of(origin), &tagged, options) };
}

/// Dumps the dynamic value at `addr`, read as `(dispatch table, payload)`.
///
/// Prints the value, its dispatch table, then the table's method-set type and concrete type
/// (both at level 3).
///
/// # Safety
///
/// `addr` must point to a bound dynamic value in the assumed layout, with a live dispatch table
/// and live type descriptors.
///
/// # Panics
///
/// Panics if the dispatch table or either type reference is null.
pub unsafe fn inspect_bound_value<S: DumpSink + ?Sized>(sink: &mut S, addr: *const u8) {
    // SAFETY: forwarded from the caller.
    unsafe { inspect_bound_value_with(sink, addr, InspectOptions::FULL) };
}

/// [`inspect_bound_value`] with explicit options.
///
/// # Safety
///
/// See [`inspect_bound_value`].
///
/// # Panics
///
/// See [`inspect_bound_value`].
pub unsafe fn inspect_bound_value_with<S: DumpSink + ?Sized>(
    sink: &mut S,
    addr: *const u8,
    options: InspectOptions,
) {
    sink.banner("a bound value", Addr::of(addr));
    // SAFETY: forwarded from the caller.
    unsafe {
        let tagged = TaggedValue::overlay(addr, TagForm::Bound);
        expand(sink, Addr::of(addr), &tagged, options);
    }
}

/// Prints `tagged` (found at `origin`) and the layers below it.
///
/// # Safety
///
/// Every non-null reference reached within `options.max_level` must be live.
unsafe fn expand<S: DumpSink + ?Sized>(
    sink: &mut S,
    origin: Addr,
    tagged: &TaggedValue,
    options: InspectOptions,
) {
    match tagged {
        TaggedValue::Plain(plain) => {
            sink.level(&Level::new(1, origin, size_of::<PlainValue>(), None, plain));
            if !options.reaches(2) {
                return;
            }
            // SAFETY: forwarded from the caller.
            let typ = unsafe { plain.type_descriptor() };
            sink.level(&Level::new(
                2,
                Addr::of(plain.typ),
                size_of::<TypeDescriptor>(),
                Some("type"),
                typ,
            ));
            if !options.reaches(3) {
                return;
            }
            // SAFETY: forwarded from the caller.
            let ops = unsafe { typ.operations() };
            sink.level(&Level::new(
                3,
                Addr::of(typ.ops),
                size_of::<OperationTable>(),
                Some("type.ops"),
                ops,
            ));
        }
        TaggedValue::Bound(bound) => {
            sink.level(&Level::new(1, origin, size_of::<BoundValue>(), None, bound));
            if !options.reaches(2) {
                return;
            }
            // SAFETY: forwarded from the caller.
            let table = unsafe { bound.dispatch_table() };
            sink.level(&Level::new(
                2,
                Addr::of(bound.table),
                size_of::<DispatchTable>(),
                Some("table"),
                table,
            ));
            if !options.reaches(3) {
                return;
            }
            // SAFETY: forwarded from the caller.
            let (interface, concrete) = unsafe { (table.interface_type(), table.concrete_type()) };
            sink.level(&Level::new(
                3,
                Addr::of(table.interface),
                size_of::<TypeDescriptor>(),
                Some("table.interface"),
                interface,
            ));
            sink.level(&Level::new(
                3,
                Addr::of(table.concrete),
                size_of::<TypeDescriptor>(),
                Some("table.concrete"),
                concrete,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::dump::{DumpEvent, RecordingSink, TextSink};
    use crate::layout::{Kind, TypeFlags};
    use std::vec::Vec;

    unsafe extern "C" fn word_hash(p: *const u8, seed: usize) -> usize {
        // SAFETY: only called on word-sized objects in these tests.
        unsafe { p.cast::<usize>().read_unaligned() ^ seed }
    }

    unsafe extern "C" fn word_equal(a: *const u8, b: *const u8) -> bool {
        // SAFETY: see `word_hash`.
        unsafe { a.cast::<usize>().read_unaligned() == b.cast::<usize>().read_unaligned() }
    }

    static WORD_OPS: OperationTable = OperationTable {
        hash: Some(word_hash),
        equal: Some(word_equal),
    };

    fn word_type(ops: *const OperationTable) -> TypeDescriptor {
        TypeDescriptor {
            size: 8,
            ptrdata: 0,
            hash: 0x1234,
            tflag: TypeFlags::NAMED,
            align: 8,
            field_align: 8,
            kind: Kind::Uint64 as u8,
            ops,
            gcdata: ptr::null(),
            name_off: 16,
            ptr_to_this: 0,
        }
    }

    fn level_shapes(sink: &RecordingSink) -> Vec<(u8, usize, Option<&'static str>)> {
        sink.events()
            .iter()
            .filter_map(|e| match e {
                DumpEvent::Level {
                    index, size, label, ..
                } => Some((*index, *size, *label)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn overlay_reads_both_words() {
        let typ = word_type(&raw const WORD_OPS);
        let payload = 42_u64;
        let plain = PlainValue {
            typ: &raw const typ,
            word: (&raw const payload).cast(),
        };
        // SAFETY: `plain` is two words.
        let tagged = unsafe { TaggedValue::overlay((&raw const plain).cast(), TagForm::Plain) };
        assert_eq!(tagged.word(), plain.word);
        // SAFETY: plain form never dereferences.
        assert_eq!(unsafe { tagged.concrete_type() }, plain.typ);
    }

    #[test]
    fn plain_value_prints_three_levels() {
        let typ = word_type(&raw const WORD_OPS);
        let payload = 42_u64;
        let plain = PlainValue {
            typ: &raw const typ,
            word: (&raw const payload).cast(),
        };

        let mut sink = RecordingSink::new();
        // SAFETY: every reference in `plain` is live.
        unsafe { inspect_plain_value(&mut sink, &plain) };

        assert_eq!(
            level_shapes(&sink),
            [
                (1, 16, None),
                (2, 48, Some("type")),
                (3, 16, Some("type.ops")),
            ]
        );
        let DumpEvent::Level { addr, .. } = &sink.events()[2] else {
            panic!("third event should be the type level");
        };
        assert_eq!(*addr, Addr::of(&raw const typ));
    }

    #[test]
    fn options_cut_expansion_short() {
        let typ = word_type(ptr::null());
        let payload = 1_u64;
        let plain = PlainValue {
            typ: &raw const typ,
            word: (&raw const payload).cast(),
        };

        let mut sink = RecordingSink::new();
        // SAFETY: level 3 (the null ops table) is never reached.
        unsafe { inspect_plain_value_with(&mut sink, &plain, InspectOptions::to_level(2)) };
        assert_eq!(level_shapes(&sink), [(1, 16, None), (2, 48, Some("type"))]);
    }

    #[test]
    fn level_one_is_always_printed() {
        let plain = PlainValue {
            typ: ptr::null(),
            word: ptr::null(),
        };
        for max_level in [0, 1] {
            let mut sink = RecordingSink::new();
            // SAFETY: the null type descriptor is never peeled.
            unsafe { inspect_plain_value_with(&mut sink, &plain, InspectOptions::to_level(max_level)) };
            assert_eq!(level_shapes(&sink), [(1, 16, None)], "max_level={max_level}");
        }
    }

    #[test]
    #[should_panic(expected = "null type descriptor reference")]
    fn null_type_descriptor_is_a_fault() {
        let payload = 7_u64;
        let plain = PlainValue {
            typ: ptr::null(),
            word: (&raw const payload).cast(),
        };
        let mut sink = RecordingSink::new();
        // SAFETY: the only bad reference is null, which faults before any read.
        unsafe { inspect_plain_value(&mut sink, &plain) };
    }

    #[test]
    #[should_panic(expected = "null operation table reference")]
    fn null_operation_table_is_a_fault() {
        let typ = word_type(ptr::null());
        let plain = PlainValue {
            typ: &raw const typ,
            word: ptr::null(),
        };
        let mut sink = RecordingSink::new();
        // SAFETY: the only bad reference is null, which faults before any read.
        unsafe { inspect_plain_value(&mut sink, &plain) };
    }

    #[test]
    fn bound_value_prints_both_types() {
        let interface = word_type(ptr::null());
        let concrete = word_type(&raw const WORD_OPS);
        let table = DispatchTable {
            interface: &raw const interface,
            concrete: &raw const concrete,
            hash: concrete.hash,
            pad: [0; 4],
            fun: [word_hash as *const u8],
        };
        let payload = 3_u64;
        let bound = BoundValue {
            table: &raw const table,
            word: (&raw const payload).cast(),
        };

        let mut sink = RecordingSink::new();
        // SAFETY: every reference in `bound` is live.
        unsafe { inspect_bound_value(&mut sink, (&raw const bound).cast()) };

        assert_eq!(
            level_shapes(&sink),
            [
                (1, 16, None),
                (2, 32, Some("table")),
                (3, 48, Some("table.interface")),
                (3, 48, Some("table.concrete")),
            ]
        );
        // SAFETY: the table has one slot.
        let slots = unsafe { table.method_slots(1) };
        assert_eq!(slots, &[word_hash as *const u8]);
    }

    #[test]
    #[should_panic(expected = "null interface type reference")]
    fn null_interface_type_is_a_fault() {
        let concrete = word_type(&raw const WORD_OPS);
        let table = DispatchTable {
            interface: ptr::null(),
            concrete: &raw const concrete,
            hash: concrete.hash,
            pad: [0; 4],
            fun: [ptr::null()],
        };
        let bound = BoundValue {
            table: &raw const table,
            word: ptr::null(),
        };
        let mut sink = RecordingSink::new();
        // SAFETY: every non-null reference is live; the null one faults.
        unsafe { inspect_bound_value(&mut sink, (&raw const bound).cast()) };
    }

    #[test]
    #[should_panic(expected = "null concrete type reference")]
    fn null_concrete_type_is_a_fault() {
        let interface = word_type(ptr::null());
        let table = DispatchTable {
            interface: &raw const interface,
            concrete: ptr::null(),
            hash: 0,
            pad: [0; 4],
            fun: [ptr::null()],
        };
        // SAFETY: the only bad reference is null.
        let _ = unsafe { table.concrete_type() };
    }

    #[test]
    fn repeated_inspection_is_identical() {
        let typ = word_type(&raw const WORD_OPS);
        let payload = 5_u64;
        let plain = PlainValue {
            typ: &raw const typ,
            word: (&raw const payload).cast(),
        };

        let mut first: TextSink = TextSink::default();
        let mut second: TextSink = TextSink::default();
        // SAFETY: every reference in `plain` is live.
        unsafe {
            inspect_plain_value(&mut first, &plain);
            inspect_plain_value(&mut second, &plain);
        }
        assert_eq!(first.as_str(), second.as_str());
        assert_eq!(first.lines().count(), 4, "banner plus three levels");
    }
}
