// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plain and bound value dumps over values laid out by the model heap.

#![allow(unsafe_code, reason = "tests inspect model memory through raw pointers")]

use core::ptr;

use layout_insight::layout::{BoundValue, OperationTable, TextHeader, TypeDescriptor};
use layout_insight::value::{
    inspect_bound_value, inspect_plain_value, inspect_plain_value_with,
};
use layout_insight::{Addr, DumpEvent, InspectOptions, RecordingSink, TagForm, TaggedValue, TextSink};
use layout_insight_conformance::{MethodFn, ModelHeap, NOEQ_OPS, STRING_OPS, TEXT_ARRAY4_OPS};

#[repr(C)]
#[derive(Copy, Clone)]
struct Person {
    name: TextHeader,
    age: i64,
    spouse: i64,
}

extern "C" fn show_name(_this: *const u8) {}

extern "C" fn show_spouse(_this: *const u8) {}

type LevelKey = (u8, Addr, usize, Option<&'static str>);

fn level_keys(sink: &RecordingSink) -> Vec<LevelKey> {
    sink.levels()
        .filter_map(|event| match event {
            DumpEvent::Level {
                index,
                addr,
                size,
                label,
                ..
            } => Some((*index, *addr, *size, *label)),
            _ => None,
        })
        .collect()
}

fn level_contents(sink: &RecordingSink) -> Vec<&str> {
    sink.levels()
        .filter_map(|event| match event {
            DumpEvent::Level { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn plain_text_value_expands_three_levels() {
    let mut heap = ModelHeap::new();
    let typ = heap.string_type().unwrap();
    let payload = heap.text("hahahahah");
    let value = heap.plain_value(typ, payload).unwrap();

    let mut sink = RecordingSink::new();
    // SAFETY: the heap is alive and laid out `value`.
    unsafe { inspect_plain_value(&mut sink, &value) };

    assert_eq!(
        sink.events()[0],
        DumpEvent::Banner {
            what: "a plain value".into(),
            addr: Addr::of(&raw const value),
        }
    );
    assert_eq!(
        level_keys(&sink),
        vec![
            (1, Addr::of(&raw const value), 16, None),
            (2, Addr::of(typ.as_ptr()), 48, Some("type")),
            (3, Addr::of(ptr::from_ref(&STRING_OPS)), 16, Some("type.ops")),
        ]
    );
    let contents = level_contents(&sink);
    assert!(contents[1].contains("size: 16"), "{}", contents[1]);
    assert!(contents[1].contains("kind: 24"), "{}", contents[1]);
}

#[test]
fn plain_array_value_reports_array_descriptor() {
    let mut heap = ModelHeap::new();
    let typ = heap.text_array4_type().unwrap();
    let payload = heap.text_array4(["1", "bb", "tt", "kk"]);
    let value = heap.plain_value(typ, payload).unwrap();

    let mut sink = RecordingSink::new();
    // SAFETY: the heap is alive and laid out `value`.
    unsafe { inspect_plain_value(&mut sink, &value) };

    let keys = level_keys(&sink);
    assert_eq!(keys[2].1, Addr::of(ptr::from_ref(&TEXT_ARRAY4_OPS)));
    let contents = level_contents(&sink);
    assert!(contents[1].contains("size: 64"), "{}", contents[1]);
    assert!(contents[1].contains("ptrdata: 56"), "{}", contents[1]);
    assert!(contents[1].contains("kind: 17"), "{}", contents[1]);

    // The payload word points at the copied array.
    // SAFETY: `value` is a live two-word value.
    let tagged = unsafe { TaggedValue::overlay((&raw const value).cast(), TagForm::Plain) };
    // SAFETY: the payload word points at the boxed `[TextHeader; 4]`.
    let array = unsafe { tagged.word().cast::<[TextHeader; 4]>().read() };
    assert_eq!(array, payload);
}

#[test]
fn uncomparable_value_has_empty_operation_table() {
    let mut heap = ModelHeap::new();
    let typ = heap.text_slice_type().unwrap();
    let items = heap.text_array4(["1", "bb", "tt", "kk"]);
    let payload = heap.slice(&items, 4);
    let value = heap.plain_value(typ, payload).unwrap();

    let mut sink = RecordingSink::new();
    // SAFETY: the heap is alive and laid out `value`.
    unsafe { inspect_plain_value(&mut sink, &value) };

    let keys = level_keys(&sink);
    assert_eq!(keys[2].1, Addr::of(ptr::from_ref(&NOEQ_OPS)));
    assert_eq!(
        level_contents(&sink)[2],
        format!("{:?}", OperationTable { hash: None, equal: None })
    );
}

#[test]
fn plain_value_depth_can_be_limited() {
    let mut heap = ModelHeap::new();
    let typ = heap.int_type().unwrap();
    let value = heap.plain_value(typ, 20_i64).unwrap();

    for (max_level, expected) in [(1, 1), (2, 2), (3, 3), (9, 3)] {
        let mut sink = RecordingSink::new();
        // SAFETY: the heap is alive and laid out `value`.
        unsafe { inspect_plain_value_with(&mut sink, &value, InspectOptions::to_level(max_level)) };
        assert_eq!(sink.levels().count(), expected, "max_level={max_level}");
    }
}

#[test]
fn bound_values_expand_both_types() {
    let mut heap = ModelHeap::new();
    let people = heap.interface_type("people").unwrap();
    let man = heap.struct_type("man", 32, 0b1).unwrap();
    let woman = heap.struct_type("woman", 32, 0b1).unwrap();
    let man_table = heap.dispatch_table(people, man, [show_name as MethodFn]);
    let woman_table = heap.dispatch_table(
        people,
        woman,
        [show_name as MethodFn, show_spouse as MethodFn],
    );

    let xiaoming = Person {
        name: heap.text("xiaoming"),
        age: 20,
        spouse: 0,
    };
    let xiaohong = Person {
        name: heap.text("xiaohong"),
        age: 19,
        spouse: 2,
    };
    let p1 = heap.bound_value(man_table, xiaoming).unwrap();
    let p2 = heap.bound_value(woman_table, xiaohong).unwrap();

    for (value, table, concrete) in [(&p1, man_table, man), (&p2, woman_table, woman)] {
        let origin = ptr::from_ref::<BoundValue>(value);
        let mut sink = RecordingSink::new();
        // SAFETY: the heap is alive and laid out `value`.
        unsafe { inspect_bound_value(&mut sink, origin.cast()) };

        assert_eq!(
            level_keys(&sink),
            vec![
                (1, Addr::of(origin), 16, None),
                (2, Addr::of(table.as_ptr()), 32, Some("table")),
                (3, Addr::of(people.as_ptr()), 48, Some("table.interface")),
                (3, Addr::of(concrete.as_ptr()), 48, Some("table.concrete")),
            ]
        );

        // SAFETY: the heap is alive and laid out `value`.
        let dispatch = unsafe { value.dispatch_table() };
        assert_eq!(dispatch.hash, concrete.hash());
        // SAFETY: the concrete descriptor is live.
        let desc: &TypeDescriptor = unsafe { dispatch.concrete_type() };
        assert_eq!(desc.size, size_of::<Person>());
    }

    // SAFETY: the woman table was built with two method slots.
    let slots = unsafe { p2.dispatch_table().method_slots(2) };
    assert!(slots.iter().all(|slot| !slot.is_null()), "both slots filled");
    assert_eq!(slots[0], show_name as *const u8);

    // SAFETY: the payload word points at the boxed `Person`.
    let person = unsafe { p2.word.cast::<Person>().read() };
    assert_eq!((person.age, person.spouse), (19, 2));
    // SAFETY: the heap owns the name text.
    assert_eq!(unsafe { person.name.bytes() }, b"xiaohong");
}

#[test]
fn dumps_are_idempotent() {
    let mut heap = ModelHeap::new();
    let typ = heap.string_type().unwrap();
    let payload = heap.text("hahahahah");
    let value = heap.plain_value(typ, payload).unwrap();

    let render = || {
        let mut sink: TextSink = TextSink::default();
        // SAFETY: the heap is alive and laid out `value`.
        unsafe { inspect_plain_value(&mut sink, &value) };
        sink.finish().unwrap()
    };
    let first = render();
    assert_eq!(first, render());
    assert_eq!(first.lines().count(), 4);
    assert!(
        first.starts_with("**** Insight a plain value from address : 0x"),
        "{first}"
    );
}

#[test]
#[should_panic(expected = "null dispatch table reference")]
fn null_dispatch_table_panics() {
    let value = BoundValue {
        table: ptr::null(),
        word: ptr::null(),
    };
    let mut sink = RecordingSink::new();
    // SAFETY: the only reference is null, which is reported by panic.
    unsafe { inspect_bound_value(&mut sink, (&raw const value).cast()) };
}
