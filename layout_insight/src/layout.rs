// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The assumed binary layout of the inspected runtime.
//!
//! Every record here is `#[repr(C)]` and mirrors one structure of the runtime byte for byte. The
//! layout is a *contract*, not something discovered at run time: if the runtime changes a field
//! order or width, every consumer of this module reads garbage. For that reason the contract is
//! versioned ([`LayoutVersion`]) and also spelled out as plain data in the `V1_*` tables, which
//! the tests check against the struct definitions.
//!
//! ## Ownership
//!
//! All pointers in these records are borrowed views into memory owned by the runtime. Nothing in
//! this crate frees or writes through them, and none of the records implement `Drop`.
//!
//! ## Layout v1 (64-bit)
//!
//! | Record | Size |
//! |---|---|
//! | [`TypeDescriptor`] | 48 |
//! | [`OperationTable`] | 16 |
//! | [`PlainValue`] / [`BoundValue`] | 16 |
//! | [`DispatchTable`] | 32 (one method slot) |
//! | [`MapHandle`] | 8 |
//! | [`ControlBlock`] | 48 |
//! | [`ControlExtra`] | 24 |
//! | [`TextHeader`] / [`SliceHeader`] | 16 / 24 |
//! | [`StringBucket`] | 272 |

use core::fmt;

/// Version of the layout contract.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum LayoutVersion {
    /// 64-bit layout with an operation-table pointer in the type descriptor and 8-slot buckets.
    V1,
}

impl LayoutVersion {
    /// The layout this crate reads.
    pub const CURRENT: Self = Self::V1;

    /// Returns the field tables of every record in this layout.
    #[must_use]
    pub const fn records(self) -> &'static [RecordLayout] {
        match self {
            Self::V1 => V1_RECORDS,
        }
    }
}

/// Size of a pointer-sized slot.
pub const WORD: usize = 8;

/// Number of key/value slots per bucket.
pub const BUCKET_SLOTS: usize = 8;

/// Top-hash marker: this slot and every later slot (including overflow buckets) is empty.
pub const TOP_HASH_EMPTY_REST: u8 = 0;
/// Top-hash marker: this slot is empty.
pub const TOP_HASH_EMPTY_ONE: u8 = 1;
/// Top-hash marker: the entry was evacuated to the first half of the grown table.
pub const TOP_HASH_EVACUATED_X: u8 = 2;
/// Top-hash marker: the entry was evacuated to the second half of the grown table.
pub const TOP_HASH_EVACUATED_Y: u8 = 3;
/// Top-hash marker: the slot was empty and its bucket has been evacuated.
pub const TOP_HASH_EVACUATED_EMPTY: u8 = 4;
/// Smallest top hash of an occupied slot; real hashes below this are bumped up.
pub const MIN_TOP_HASH: u8 = 5;

/// Hash function of an [`OperationTable`]: `(object, seed) -> hash`.
pub type HashFn = unsafe extern "C" fn(*const u8, usize) -> usize;

/// Equality function of an [`OperationTable`]: `(a, b) -> a == b`.
pub type EqualFn = unsafe extern "C" fn(*const u8, *const u8) -> bool;

/// Extra type information flags stored in [`TypeDescriptor::tflag`].
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypeFlags(pub u8);

impl TypeFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The descriptor is followed by uncommon (method) data.
    pub const UNCOMMON: Self = Self(1 << 0);
    /// The name string carries an extra leading `*`.
    pub const EXTRA_STAR: Self = Self(1 << 1);
    /// The type has a name.
    pub const NAMED: Self = Self(1 << 2);

    /// Returns `true` if every bit in `other` is set.
    #[must_use]
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns the union of both flag sets.
    #[must_use]
    #[inline]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Mask selecting the [`Kind`] bits of [`TypeDescriptor::kind`].
pub const KIND_MASK: u8 = (1 << 5) - 1;
/// Kind bit: values of this type are stored directly in the payload word.
pub const KIND_DIRECT_IFACE: u8 = 1 << 5;
/// Kind bit: the GC data is a program rather than a bitmap.
pub const KIND_GC_PROG: u8 = 1 << 6;

/// Kind tag of a runtime type (low bits of [`TypeDescriptor::kind`]).
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs, reason = "variant names are the kinds themselves")]
pub enum Kind {
    Invalid = 0,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Array,
    Chan,
    Func,
    Interface,
    Map,
    Ptr,
    Slice,
    String,
    Struct,
    UnsafePointer,
}

impl Kind {
    const ALL: [Self; 27] = [
        Self::Invalid,
        Self::Bool,
        Self::Int,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Uint,
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
        Self::Uint64,
        Self::Uintptr,
        Self::Float32,
        Self::Float64,
        Self::Complex64,
        Self::Complex128,
        Self::Array,
        Self::Chan,
        Self::Func,
        Self::Interface,
        Self::Map,
        Self::Ptr,
        Self::Slice,
        Self::String,
        Self::Struct,
        Self::UnsafePointer,
    ];

    /// Decodes the kind bits of a raw `kind` byte; unknown tags decode to `None`.
    #[must_use]
    pub fn from_bits(raw: u8) -> Option<Self> {
        Self::ALL.get(usize::from(raw & KIND_MASK)).copied()
    }
}

/// Per-type metadata record.
///
/// Invariant of well-formed descriptors: `ptrdata <= size`.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct TypeDescriptor {
    /// Size of a value of this type in bytes.
    pub size: usize,
    /// Number of leading bytes that may hold pointers.
    pub ptrdata: usize,
    /// Precomputed type hash.
    pub hash: u32,
    /// Extra type information flags.
    pub tflag: TypeFlags,
    /// Alignment of a variable of this type.
    pub align: u8,
    /// Alignment of a struct field of this type.
    pub field_align: u8,
    /// Kind tag plus the [`KIND_DIRECT_IFACE`] / [`KIND_GC_PROG`] bits.
    pub kind: u8,
    /// Hash/equality operations; may be null for non-comparable types.
    pub ops: *const OperationTable,
    /// Out-of-band GC data.
    pub gcdata: *const u8,
    /// Encoded offset of the type's name string.
    pub name_off: i32,
    /// Encoded offset of the pointer-to-this type, or zero.
    pub ptr_to_this: i32,
}

impl TypeDescriptor {
    /// Returns the decoded kind tag.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> Option<Kind> {
        Kind::from_bits(self.kind)
    }

    /// Returns `true` if values are stored directly in the payload word.
    #[must_use]
    #[inline]
    pub const fn is_direct_iface(&self) -> bool {
        (self.kind & KIND_DIRECT_IFACE) != 0
    }
}

/// Per-type hash and equality functions used by containers keyed on the type.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct OperationTable {
    /// Hashes the object at the pointer with the given seed.
    pub hash: Option<HashFn>,
    /// Compares the objects at both pointers.
    pub equal: Option<EqualFn>,
}

/// A dynamic value without a method set: `(type descriptor, payload)`.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct PlainValue {
    /// Type of the payload.
    pub typ: *const TypeDescriptor,
    /// Payload pointer, borrowed from the value's owner.
    pub word: *const u8,
}

/// Method-lookup table binding one concrete type to one method set.
///
/// The runtime allocates as many method slots as the method set has; only the first is part of
/// the fixed record, the rest follow it in memory.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct DispatchTable {
    /// The method-set (interface) type.
    pub interface: *const TypeDescriptor,
    /// The concrete type implementing it.
    pub concrete: *const TypeDescriptor,
    /// Copy of `concrete.hash`.
    pub hash: u32,
    /// Padding.
    pub pad: [u8; 4],
    /// Method slots, in method-set order.
    pub fun: [*const u8; 1],
}

/// A dynamic value with a fixed method set: `(dispatch table, payload)`.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct BoundValue {
    /// Dispatch table of the concrete type.
    pub table: *const DispatchTable,
    /// Payload pointer, borrowed from the value's owner.
    pub word: *const u8,
}

/// A text string header: `(bytes, length)`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextHeader {
    /// First byte, or null for some empty strings.
    pub data: *const u8,
    /// Length in bytes.
    pub len: isize,
}

impl TextHeader {
    /// An empty header with a null data pointer.
    pub const EMPTY: Self = Self {
        data: core::ptr::null(),
        len: 0,
    };

    /// Builds a header viewing `text`.
    ///
    /// The header borrows nothing: it is only valid while `text` is.
    #[must_use]
    pub fn borrowed(text: &str) -> Self {
        Self {
            data: text.as_ptr(),
            len: isize::try_from(text.len()).unwrap_or(isize::MAX),
        }
    }
}

/// A sequence header: `(first element, length, capacity)`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SliceHeader {
    /// First element.
    pub data: *const u8,
    /// Number of live elements.
    pub len: isize,
    /// Number of allocated elements.
    pub cap: isize,
}

/// Handle of an associative container: a single pointer to its control block.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct MapHandle {
    /// The container's control block.
    pub control: *const ControlBlock,
}

/// Metadata header of an associative container.
///
/// While `oldbuckets` is non-null the container is growing and buckets below `nevacuate` have
/// been migrated out of the old array.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct ControlBlock {
    /// Number of live entries.
    pub count: isize,
    /// Iterator/writer state flags.
    pub flags: u8,
    /// Log2 of the number of buckets.
    pub log2_buckets: u8,
    /// Approximate number of overflow buckets.
    pub noverflow: u16,
    /// Hash seed.
    pub hash0: u32,
    /// Bucket array of `2^log2_buckets` buckets; may be null while empty.
    pub buckets: *const u8,
    /// Previous, half-sized bucket array during growth.
    pub oldbuckets: *const u8,
    /// Evacuation progress counter.
    pub nevacuate: usize,
    /// Optional extension block.
    pub extra: *const ControlExtra,
}

impl ControlBlock {
    /// Returns the number of buckets in the bucket array.
    #[must_use]
    #[inline]
    pub fn bucket_count(&self) -> usize {
        1_usize
            .checked_shl(u32::from(self.log2_buckets))
            .unwrap_or(0)
    }

    /// Returns `true` while an old bucket array is still attached.
    #[must_use]
    #[inline]
    pub fn is_growing(&self) -> bool {
        !self.oldbuckets.is_null()
    }
}

/// Fields a container only carries when it needs them.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct ControlExtra {
    /// Overflow buckets of the current bucket array.
    pub overflow: *const u8,
    /// Overflow buckets of the old bucket array.
    pub old_overflow: *const u8,
    /// Next free preallocated overflow bucket.
    pub next_overflow: *const u8,
}

/// Bucket of a string-keyed, string-valued container.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct StringBucket {
    /// Top byte of each slot's key hash, or a marker below [`MIN_TOP_HASH`].
    pub tophash: [u8; BUCKET_SLOTS],
    /// Keys, one per slot.
    pub keys: [TextHeader; BUCKET_SLOTS],
    /// Values, one per slot.
    pub values: [TextHeader; BUCKET_SLOTS],
    /// Next bucket in this slot's overflow chain.
    pub overflow: *const StringBucket,
}

impl StringBucket {
    /// A bucket with every slot empty.
    pub const EMPTY: Self = Self {
        tophash: [TOP_HASH_EMPTY_REST; BUCKET_SLOTS],
        keys: [TextHeader::EMPTY; BUCKET_SLOTS],
        values: [TextHeader::EMPTY; BUCKET_SLOTS],
        overflow: core::ptr::null(),
    };
}

/// One field of a [`RecordLayout`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    /// Field name.
    pub name: &'static str,
    /// Byte offset from the start of the record.
    pub offset: usize,
    /// Width in bytes.
    pub width: usize,
}

/// A record of the layout contract, as plain data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    /// Record name.
    pub name: &'static str,
    /// Total size in bytes.
    pub size: usize,
    /// Fields in memory order.
    pub fields: &'static [FieldLayout],
}

impl RecordLayout {
    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for RecordLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {{", self.name, self.size)?;
        for (i, field) in self.fields.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{}@{}:{}", field.name, field.offset, field.width)?;
        }
        write!(f, " }}")
    }
}

const fn field(name: &'static str, offset: usize, width: usize) -> FieldLayout {
    FieldLayout {
        name,
        offset,
        width,
    }
}

/// [`TypeDescriptor`] in layout v1.
pub const V1_TYPE_DESCRIPTOR: RecordLayout = RecordLayout {
    name: "TypeDescriptor",
    size: 48,
    fields: &[
        field("size", 0, 8),
        field("ptrdata", 8, 8),
        field("hash", 16, 4),
        field("tflag", 20, 1),
        field("align", 21, 1),
        field("field_align", 22, 1),
        field("kind", 23, 1),
        field("ops", 24, 8),
        field("gcdata", 32, 8),
        field("name_off", 40, 4),
        field("ptr_to_this", 44, 4),
    ],
};

/// [`OperationTable`] in layout v1.
pub const V1_OPERATION_TABLE: RecordLayout = RecordLayout {
    name: "OperationTable",
    size: 16,
    fields: &[field("hash", 0, 8), field("equal", 8, 8)],
};

/// [`PlainValue`] in layout v1.
pub const V1_PLAIN_VALUE: RecordLayout = RecordLayout {
    name: "PlainValue",
    size: 16,
    fields: &[field("typ", 0, 8), field("word", 8, 8)],
};

/// [`DispatchTable`] in layout v1.
pub const V1_DISPATCH_TABLE: RecordLayout = RecordLayout {
    name: "DispatchTable",
    size: 32,
    fields: &[
        field("interface", 0, 8),
        field("concrete", 8, 8),
        field("hash", 16, 4),
        field("pad", 20, 4),
        field("fun", 24, 8),
    ],
};

/// [`BoundValue`] in layout v1.
pub const V1_BOUND_VALUE: RecordLayout = RecordLayout {
    name: "BoundValue",
    size: 16,
    fields: &[field("table", 0, 8), field("word", 8, 8)],
};

/// [`TextHeader`] in layout v1.
pub const V1_TEXT_HEADER: RecordLayout = RecordLayout {
    name: "TextHeader",
    size: 16,
    fields: &[field("data", 0, 8), field("len", 8, 8)],
};

/// [`SliceHeader`] in layout v1.
pub const V1_SLICE_HEADER: RecordLayout = RecordLayout {
    name: "SliceHeader",
    size: 24,
    fields: &[field("data", 0, 8), field("len", 8, 8), field("cap", 16, 8)],
};

/// [`MapHandle`] in layout v1.
pub const V1_MAP_HANDLE: RecordLayout = RecordLayout {
    name: "MapHandle",
    size: 8,
    fields: &[field("control", 0, 8)],
};

/// [`ControlBlock`] in layout v1.
pub const V1_CONTROL_BLOCK: RecordLayout = RecordLayout {
    name: "ControlBlock",
    size: 48,
    fields: &[
        field("count", 0, 8),
        field("flags", 8, 1),
        field("log2_buckets", 9, 1),
        field("noverflow", 10, 2),
        field("hash0", 12, 4),
        field("buckets", 16, 8),
        field("oldbuckets", 24, 8),
        field("nevacuate", 32, 8),
        field("extra", 40, 8),
    ],
};

/// [`ControlExtra`] in layout v1.
pub const V1_CONTROL_EXTRA: RecordLayout = RecordLayout {
    name: "ControlExtra",
    size: 24,
    fields: &[
        field("overflow", 0, 8),
        field("old_overflow", 8, 8),
        field("next_overflow", 16, 8),
    ],
};

/// [`StringBucket`] in layout v1.
pub const V1_STRING_BUCKET: RecordLayout = RecordLayout {
    name: "StringBucket",
    size: 272,
    fields: &[
        field("tophash", 0, 8),
        field("keys", 8, 128),
        field("values", 136, 128),
        field("overflow", 264, 8),
    ],
};

const V1_RECORDS: &[RecordLayout] = &[
    V1_TYPE_DESCRIPTOR,
    V1_OPERATION_TABLE,
    V1_PLAIN_VALUE,
    V1_DISPATCH_TABLE,
    V1_BOUND_VALUE,
    V1_TEXT_HEADER,
    V1_SLICE_HEADER,
    V1_MAP_HANDLE,
    V1_CONTROL_BLOCK,
    V1_CONTROL_EXTRA,
    V1_STRING_BUCKET,
];

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(size_of::<TypeDescriptor>() == V1_TYPE_DESCRIPTOR.size);
    assert!(size_of::<OperationTable>() == V1_OPERATION_TABLE.size);
    assert!(size_of::<PlainValue>() == V1_PLAIN_VALUE.size);
    assert!(size_of::<DispatchTable>() == V1_DISPATCH_TABLE.size);
    assert!(size_of::<BoundValue>() == V1_BOUND_VALUE.size);
    assert!(size_of::<MapHandle>() == V1_MAP_HANDLE.size);
    assert!(size_of::<ControlBlock>() == V1_CONTROL_BLOCK.size);
    assert!(size_of::<StringBucket>() == V1_STRING_BUCKET.size);
};
