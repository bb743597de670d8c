// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::any::Any;
use core::fmt;
use core::ptr;

use layout_insight::layout::{
    BoundValue, DispatchTable, KIND_DIRECT_IFACE, Kind, OperationTable, PlainValue, SliceHeader,
    TextHeader, TypeDescriptor, TypeFlags, WORD,
};

use crate::hash::{NOEQ_OPS, STRING_OPS, TEXT_ARRAY4_OPS, WORD_OPS, name_hash};

/// Seed used by [`ModelHeap::new`].
pub const DEFAULT_SEED: u32 = 0x5eed_1a70;

/// A method slot entry in a dispatch table.
pub type MethodFn = unsafe extern "C" fn(*const u8);

/// Errors raised while laying out model values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelError {
    /// A payload's size differs from its type descriptor's `size`.
    PayloadSize {
        /// Size recorded in the descriptor.
        expected: usize,
        /// Size of the payload handed in.
        found: usize,
    },
    /// The pointer words of a type reach past its size.
    PointerDataExceedsSize {
        /// Bytes up to and including the last pointer word.
        ptrdata: usize,
        /// Size of a value of the type.
        size: usize,
    },
    /// Type names no longer fit an `i32` offset.
    NameSectionFull,
    /// A requested bucket array would exceed `2^max` buckets.
    TooManyBuckets {
        /// The requested `log2` bucket count.
        log2_buckets: u8,
        /// Largest supported `log2` bucket count.
        max: u8,
    },
    /// More overflow buckets than the control block's counter can hold.
    TooManyOverflowBuckets {
        /// Overflow buckets needed.
        count: usize,
    },
    /// A mid-growth map was asked to have evacuated more old buckets than it has.
    NevacuateOutOfRange {
        /// Requested evacuation progress.
        nevacuate: usize,
        /// Number of buckets in the old array.
        old_buckets: usize,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadSize { expected, found } => {
                write!(f, "payload is {found} bytes, type describes {expected}")
            }
            Self::PointerDataExceedsSize { ptrdata, size } => {
                write!(f, "pointer data spans {ptrdata} bytes of a {size}-byte type")
            }
            Self::NameSectionFull => write!(f, "type name section is full"),
            Self::TooManyBuckets { log2_buckets, max } => {
                write!(f, "2^{log2_buckets} buckets requested, at most 2^{max} supported")
            }
            Self::TooManyOverflowBuckets { count } => {
                write!(f, "{count} overflow buckets do not fit the control block counter")
            }
            Self::NevacuateOutOfRange {
                nevacuate,
                old_buckets,
            } => write!(
                f,
                "evacuation progress {nevacuate} exceeds {old_buckets} old buckets"
            ),
        }
    }
}

impl core::error::Error for ModelError {}

/// Handle to a type descriptor owned by a [`ModelHeap`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeRef {
    ptr: *const TypeDescriptor,
    size: usize,
    hash: u32,
}

impl TypeRef {
    /// Returns the descriptor's address.
    #[must_use]
    #[inline]
    pub fn as_ptr(self) -> *const TypeDescriptor {
        self.ptr
    }

    /// Returns the descriptor's `size`.
    #[must_use]
    #[inline]
    pub fn size(self) -> usize {
        self.size
    }

    /// Returns the descriptor's `hash`.
    #[must_use]
    #[inline]
    pub fn hash(self) -> u32 {
        self.hash
    }
}

/// Handle to a dispatch table owned by a [`ModelHeap`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DispatchRef {
    ptr: *const DispatchTable,
    concrete: TypeRef,
}

impl DispatchRef {
    /// Returns the table's address.
    #[must_use]
    #[inline]
    pub fn as_ptr(self) -> *const DispatchTable {
        self.ptr
    }

    /// Returns the concrete type the table dispatches to.
    #[must_use]
    #[inline]
    pub fn concrete(self) -> TypeRef {
        self.concrete
    }
}

/// Shape of a type descriptor to build.
#[derive(Copy, Clone, Debug)]
pub struct TypeSpec {
    /// Kind tag.
    pub kind: Kind,
    /// Size of a value in bytes.
    pub size: usize,
    /// Alignment of a value in bytes.
    pub align: u8,
    /// Bit `i` set when word `i` of a value holds a pointer.
    pub pointer_words: u64,
    /// Values are stored directly in the payload word.
    pub direct_iface: bool,
    /// Hash and equality operations.
    pub ops: &'static OperationTable,
}

impl TypeSpec {
    /// A word-aligned, pointer-free type.
    #[must_use]
    pub const fn new(kind: Kind, size: usize, ops: &'static OperationTable) -> Self {
        Self {
            kind,
            size,
            align: 8,
            pointer_words: 0,
            direct_iface: false,
            ops,
        }
    }

    /// Marks the words holding pointers.
    #[must_use]
    pub const fn with_pointers(mut self, pointer_words: u64) -> Self {
        self.pointer_words = pointer_words;
        self
    }

    /// Bytes up to and including the last pointer word.
    #[must_use]
    pub const fn ptrdata(&self) -> usize {
        (u64::BITS - self.pointer_words.leading_zeros()) as usize * WORD
    }
}

#[repr(C)]
struct WideDispatchTable<const N: usize> {
    interface: *const TypeDescriptor,
    concrete: *const TypeDescriptor,
    hash: u32,
    pad: [u8; 4],
    fun: [*const u8; N],
}

/// Owner of every allocation the model runtime hands out.
///
/// Allocations are never freed or moved before the heap is dropped, so the raw pointers inside
/// returned values stay valid for the heap's lifetime.
pub struct ModelHeap {
    blocks: Vec<Box<dyn Any>>,
    names: Vec<u8>,
    seed: u32,
    maps: u32,
}

impl fmt::Debug for ModelHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHeap")
            .field("blocks", &self.blocks.len())
            .field("name_bytes", &self.names.len())
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl Default for ModelHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelHeap {
    /// Creates an empty heap seeded with [`DEFAULT_SEED`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Creates an empty heap whose maps derive their hash seeds from `seed`.
    #[must_use]
    pub fn with_seed(seed: u32) -> Self {
        Self {
            blocks: Vec::new(),
            // Offset 0 means "unnamed".
            names: vec![0],
            seed,
            maps: 0,
        }
    }

    /// Number of allocations owned so far.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn keep<T: 'static>(&mut self, value: T) -> *const T {
        let block = Box::new(value);
        let ptr = ptr::from_ref::<T>(&block);
        self.blocks.push(block);
        ptr
    }

    pub(crate) fn keep_slice<T: 'static>(&mut self, items: Box<[T]>) -> *const T {
        let data = items.as_ptr();
        self.blocks.push(Box::new(items));
        data
    }

    pub(crate) fn keep_bytes(&mut self, bytes: &[u8]) -> *const u8 {
        self.keep_slice(Box::from(bytes))
    }

    pub(crate) fn next_map_seed(&mut self) -> u32 {
        self.maps = self.maps.wrapping_add(1);
        self.seed ^ self.maps.wrapping_mul(0x9e37_79b9)
    }

    /// Copies `text` into the heap and returns its header. Empty text has a null data pointer.
    pub fn text(&mut self, text: &str) -> TextHeader {
        if text.is_empty() {
            return TextHeader::EMPTY;
        }
        TextHeader {
            data: self.keep_bytes(text.as_bytes()),
            len: text.len().cast_signed(),
        }
    }

    /// Copies four texts into the heap.
    pub fn text_array4(&mut self, texts: [&str; 4]) -> [TextHeader; 4] {
        texts.map(|text| self.text(text))
    }

    /// Copies `items` into a heap buffer with room for at least `cap` elements.
    pub fn slice<T: Copy + 'static>(&mut self, items: &[T], cap: usize) -> SliceHeader {
        let mut buf = Vec::with_capacity(cap.max(items.len()));
        buf.extend_from_slice(items);
        let header = SliceHeader {
            data: buf.as_ptr().cast(),
            len: buf.len().cast_signed(),
            cap: buf.capacity().cast_signed(),
        };
        self.blocks.push(Box::new(buf));
        header
    }

    /// Builds a type descriptor named `name` (empty for unnamed types).
    pub fn type_descriptor(&mut self, name: &str, spec: TypeSpec) -> Result<TypeRef, ModelError> {
        let ptrdata = spec.ptrdata();
        if ptrdata > spec.size {
            return Err(ModelError::PointerDataExceedsSize {
                ptrdata,
                size: spec.size,
            });
        }
        let (tflag, name_off) = if name.is_empty() {
            (TypeFlags::NONE, 0)
        } else {
            let off = i32::try_from(self.names.len()).map_err(|_| ModelError::NameSectionFull)?;
            self.names.extend_from_slice(name.as_bytes());
            self.names.push(0);
            (TypeFlags::NAMED, off)
        };
        let gcdata = if spec.pointer_words == 0 {
            ptr::null()
        } else {
            self.keep_bytes(&spec.pointer_words.to_le_bytes())
        };
        let mut kind = spec.kind as u8;
        if spec.direct_iface {
            kind |= KIND_DIRECT_IFACE;
        }
        let hash = name_hash(name);
        let ptr = self.keep(TypeDescriptor {
            size: spec.size,
            ptrdata,
            hash,
            tflag,
            align: spec.align,
            field_align: spec.align,
            kind,
            ops: ptr::from_ref(spec.ops),
            gcdata,
            name_off,
            ptr_to_this: 0,
        });
        Ok(TypeRef {
            ptr,
            size: spec.size,
            hash,
        })
    }

    /// Resolves a descriptor's `name_off` against this heap's name section.
    #[must_use]
    pub fn type_name(&self, name_off: i32) -> Option<&str> {
        let start = usize::try_from(name_off).ok().filter(|&off| off > 0)?;
        let rest = self.names.get(start..)?;
        let end = rest.iter().position(|&b| b == 0)?;
        core::str::from_utf8(&rest[..end]).ok()
    }

    /// `string`: one text header.
    pub fn string_type(&mut self) -> Result<TypeRef, ModelError> {
        self.type_descriptor(
            "string",
            TypeSpec::new(Kind::String, 16, &STRING_OPS).with_pointers(0b1),
        )
    }

    /// `int`: one machine word.
    pub fn int_type(&mut self) -> Result<TypeRef, ModelError> {
        self.type_descriptor("int", TypeSpec::new(Kind::Int, WORD, &WORD_OPS))
    }

    /// `[4]string`: four text headers.
    pub fn text_array4_type(&mut self) -> Result<TypeRef, ModelError> {
        self.type_descriptor(
            "[4]string",
            TypeSpec::new(Kind::Array, 64, &TEXT_ARRAY4_OPS).with_pointers(0b0101_0101),
        )
    }

    /// `[]string`: a slice header. Slices cannot be hashed or compared.
    pub fn text_slice_type(&mut self) -> Result<TypeRef, ModelError> {
        self.type_descriptor(
            "[]string",
            TypeSpec::new(Kind::Slice, 24, &NOEQ_OPS).with_pointers(0b1),
        )
    }

    /// A method-set type named `name`.
    pub fn interface_type(&mut self, name: &str) -> Result<TypeRef, ModelError> {
        self.type_descriptor(
            name,
            TypeSpec::new(Kind::Interface, 16, &NOEQ_OPS).with_pointers(0b11),
        )
    }

    /// A struct type named `name`.
    pub fn struct_type(
        &mut self,
        name: &str,
        size: usize,
        pointer_words: u64,
    ) -> Result<TypeRef, ModelError> {
        self.type_descriptor(
            name,
            TypeSpec::new(Kind::Struct, size, &NOEQ_OPS).with_pointers(pointer_words),
        )
    }

    /// Boxes `payload` and pairs it with `typ`.
    pub fn plain_value<T: 'static>(
        &mut self,
        typ: TypeRef,
        payload: T,
    ) -> Result<PlainValue, ModelError> {
        check_payload::<T>(typ)?;
        Ok(PlainValue {
            typ: typ.as_ptr(),
            word: self.keep(payload).cast(),
        })
    }

    /// Builds a dispatch table binding `concrete` to the method set `interface`.
    ///
    /// Tables always have at least one method slot.
    pub fn dispatch_table<const N: usize>(
        &mut self,
        interface: TypeRef,
        concrete: TypeRef,
        methods: [MethodFn; N],
    ) -> DispatchRef {
        const { assert!(N >= 1, "a dispatch table has at least one method slot") };
        let table = self.keep(WideDispatchTable {
            interface: interface.as_ptr(),
            concrete: concrete.as_ptr(),
            hash: concrete.hash(),
            pad: [0; 4],
            fun: methods.map(|method| method as *const u8),
        });
        DispatchRef {
            ptr: table.cast(),
            concrete,
        }
    }

    /// Boxes `payload` and pairs it with `table`.
    pub fn bound_value<T: 'static>(
        &mut self,
        table: DispatchRef,
        payload: T,
    ) -> Result<BoundValue, ModelError> {
        check_payload::<T>(table.concrete())?;
        Ok(BoundValue {
            table: table.as_ptr(),
            word: self.keep(payload).cast(),
        })
    }
}

fn check_payload<T>(typ: TypeRef) -> Result<(), ModelError> {
    let found = size_of::<T>();
    if found == typ.size() {
        Ok(())
    } else {
        Err(ModelError::PayloadSize {
            expected: typ.size(),
            found,
        })
    }
}
