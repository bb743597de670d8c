// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Field reader checks against text, array and slice headers laid out by the model heap.

#![allow(unsafe_code, reason = "tests read model memory through raw pointers")]

use layout_insight::field::{
    FieldKind, FieldValue, parse_field_kinds, read_fields, read_slice, read_text,
    read_text_array4,
};
use layout_insight::layout::TextHeader;
use layout_insight::{Addr, RecordingSink, TextSink};
use layout_insight_conformance::ModelHeap;

#[test]
fn text_pointer_is_first_byte_and_length_follows() {
    let mut heap = ModelHeap::new();
    let header = heap.text("hahahahah");

    let mut sink = RecordingSink::new();
    let pointers = read_text(&mut sink, &header);

    assert_eq!(pointers, vec![Addr::of(header.data)]);
    let fields: Vec<_> = sink.fields().copied().collect();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].value, FieldValue::Ptr(Addr::of(header.data)));
    assert_eq!(fields[1].value, FieldValue::Signed(9));
    assert_eq!(fields[1].addr, fields[0].addr.offset(8));

    // SAFETY: the heap is alive and owns the text.
    assert_eq!(unsafe { header.bytes() }, b"hahahahah");
}

#[test]
fn text_array_captures_four_distinct_pointers() {
    let mut heap = ModelHeap::new();
    let texts = heap.text_array4(["1", "bb", "tt", "kk"]);

    let mut sink = RecordingSink::new();
    let pointers = read_text_array4(&mut sink, &texts);

    assert_eq!(pointers.len(), 4);
    for (i, p) in pointers.iter().enumerate() {
        assert_eq!(*p, Addr::of(texts[i].data));
        assert!(
            pointers[i + 1..].iter().all(|q| q != p),
            "pointer {i} is distinct"
        );
    }
    let lengths: Vec<_> = sink
        .fields()
        .filter_map(|line| match line.value {
            FieldValue::Signed(len) => Some(len),
            _ => None,
        })
        .collect();
    assert_eq!(lengths, vec![1, 2, 2, 2]);
}

#[test]
fn slice_pointer_is_first_element() {
    let mut heap = ModelHeap::new();
    let items = heap.text_array4(["1", "bb", "tt", "kk"]);
    let slice = heap.slice(&items, 4);

    let mut sink = RecordingSink::new();
    let pointers = read_slice(&mut sink, &slice);
    assert_eq!(pointers, vec![Addr::of(slice.data)]);

    let words: Vec<_> = sink.fields().map(|line| line.value).collect();
    let [_, FieldValue::Signed(len), FieldValue::Signed(cap)] = words[..] else {
        panic!("unexpected slice fields: {words:?}");
    };
    assert_eq!(len, 4);
    assert!(len <= cap, "len {len} exceeds cap {cap}");

    // The first element is the first text header of the backing array.
    // SAFETY: the heap is alive and owns the backing array.
    let first = unsafe { slice.data.cast::<TextHeader>().read() };
    assert_eq!(first, items[0]);
    let mut text = RecordingSink::new();
    assert_eq!(read_text(&mut text, &first), vec![Addr::of(items[0].data)]);
}

#[test]
fn empty_text_has_null_pointer() {
    let mut heap = ModelHeap::new();
    let header = heap.text("");
    let mut sink: TextSink = TextSink::default();
    let pointers = read_text(&mut sink, &header);
    assert_eq!(pointers, vec![Addr::NULL]);
    assert!(sink.as_str().ends_with("[8] : 0\n"), "{}", sink.as_str());
}

#[test]
fn parsed_field_list_reads_a_record() {
    #[repr(C)]
    struct Record {
        tag: u8,
        spare: u8,
        flags: i16,
        count: u32,
        next: *const u8,
    }

    let target = 7_u64;
    let record = Record {
        tag: b'R',
        spare: 0,
        flags: -2,
        count: 40,
        next: (&raw const target).cast(),
    };
    let kinds = parse_field_kinds("c8, u8, i16, u32, p64").unwrap();
    assert_eq!(kinds[0], FieldKind::C8);

    let mut sink = RecordingSink::new();
    // SAFETY: `kinds` spans exactly the 16 bytes of `record`.
    let pointers = unsafe { read_fields(&mut sink, (&raw const record).cast(), &kinds) };

    assert_eq!(pointers, vec![Addr::of(record.next)]);
    let values: Vec<_> = sink.fields().map(|line| line.value).collect();
    assert_eq!(values[0], FieldValue::Char(b'R'));
    assert_eq!(values[2], FieldValue::Signed(-2));
    assert_eq!(values[3], FieldValue::Unsigned(40));
    assert_eq!(
        sink.fields().map(|line| line.width).collect::<Vec<_>>(),
        vec![1, 1, 2, 4, 8]
    );
    let _ = (record.tag, record.spare, record.flags, record.count);
}
