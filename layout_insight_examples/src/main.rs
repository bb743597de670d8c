// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dumps a set of sample values laid out by the model runtime.
//!
//! Usage: `layout_insight_examples [text|array|slice|record|plain|bound|map|all]` (default `all`).
//!
//! Dumps go to standard output. The same dumps are logged as `tracing` events on standard error
//! (default filter `layout_insight=debug`; `RUST_LOG=layout_insight=trace` adds field lines).

#![allow(
    unsafe_code,
    reason = "the demo inspects memory laid out by the model runtime"
)]

use std::error::Error;
use std::io::{self, Write as _};

use layout_insight::container::collect_string_map;
use layout_insight::field::{FieldLine, parse_field_kinds, read_slice, read_text, read_text_array4};
use layout_insight::layout::{BoundValue, TextHeader};
use layout_insight::value::inspect_bound_value;
use layout_insight::{Addr, DumpSink, IoSink, Level};
use layout_insight_conformance::{MethodFn, ModelHeap};
use layout_insight_profiling::TracingDumpSink;

#[repr(C)]
#[derive(Copy, Clone)]
#[allow(dead_code, reason = "fields are only read through raw memory")]
struct Person {
    name: TextHeader,
    age: i64,
    spouse: i64,
}

extern "C" fn show_name(_this: *const u8) {}

extern "C" fn show_spouse(_this: *const u8) {}

const SAMPLE_MAP: [(&str, &str); 9] = [
    ("name", "lishaopeng"),
    ("age", "1000"),
    ("in3", "hhdddh"),
    ("in31", "hhddh2"),
    ("in32", "hhddh3"),
    ("in33", "hhddh4"),
    ("in34", "hhddh5"),
    ("in35", "hhddh6"),
    ("in356", "hhddh7"),
];

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("layout_insight=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Sends every event to both sinks.
struct Both<'a, A, B>(&'a mut A, &'a mut B);

impl<A: DumpSink, B: DumpSink> DumpSink for Both<'_, A, B> {
    fn banner(&mut self, what: &str, addr: Addr) {
        self.0.banner(what, addr);
        self.1.banner(what, addr);
    }

    fn level(&mut self, level: &Level<'_>) {
        self.0.level(level);
        self.1.level(level);
    }

    fn field(&mut self, line: &FieldLine) {
        self.0.field(line);
        self.1.field(line);
    }
}

/// Opens a banner for `what` at `origin`, then lets `read` run the field reader.
fn dump_fields(
    what: &str,
    origin: Addr,
    read: impl FnOnce(&mut dyn DumpSink) -> Vec<Addr>,
) -> io::Result<()> {
    let mut out = IoSink::new(io::stdout().lock());
    let mut tracer = TracingDumpSink::new();
    let mut sink = Both(&mut out, &mut tracer);
    sink.banner(what, origin);
    let pointers = read(&mut sink);
    tracing::info!(what, pointers = ?pointers, "captured");
    out.finish().map(drop)
}

fn dump_text(heap: &mut ModelHeap) -> Result<(), Box<dyn Error>> {
    let text = heap.text("hahahahah");
    dump_fields("a text header", Addr::of(&raw const text), |sink| {
        read_text(sink, &text)
    })?;
    Ok(())
}

fn dump_array(heap: &mut ModelHeap) -> Result<(), Box<dyn Error>> {
    let texts = heap.text_array4(["1", "bb", "tt", "kk"]);
    dump_fields("a text array", Addr::of(&raw const texts), |sink| {
        read_text_array4(sink, &texts)
    })?;
    Ok(())
}

fn dump_slice(heap: &mut ModelHeap) -> Result<(), Box<dyn Error>> {
    let items = heap.text_array4(["1", "bb", "tt", "kk"]);
    let slice = heap.slice(&items, items.len());
    dump_fields("a slice header", Addr::of(&raw const slice), |sink| {
        read_slice(sink, &slice)
    })?;
    Ok(())
}

fn dump_record(heap: &mut ModelHeap) -> Result<(), Box<dyn Error>> {
    let person = Person {
        name: heap.text("xiaoming"),
        age: 20,
        spouse: 0,
    };
    let kinds = parse_field_kinds("p64, i64, i64, i64")?;
    println!("**** Fields of a person at {} ****", Addr::of(&raw const person));
    // SAFETY: the four words of `kinds` span exactly the 32 bytes of `person`.
    let pointers = unsafe { layout_insight::print_fields((&raw const person).cast(), &kinds) }?;
    tracing::info!(what = "a person", pointers = ?pointers, "captured");
    Ok(())
}

fn dump_plain(heap: &mut ModelHeap) -> Result<(), Box<dyn Error>> {
    let typ = heap.text_array4_type()?;
    let payload = heap.text_array4(["1", "bb", "tt", "kk"]);
    let value = heap.plain_value(typ, payload)?;
    // SAFETY: `heap` laid out `value` and outlives the dump.
    unsafe { layout_insight::print_plain_value(&value) }?;
    Ok(())
}

fn dump_bound(heap: &mut ModelHeap) -> Result<(), Box<dyn Error>> {
    let people = heap.interface_type("people")?;
    let man = heap.struct_type("man", size_of::<Person>(), 0b1)?;
    let woman = heap.struct_type("woman", size_of::<Person>(), 0b1)?;
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
    let p1 = heap.bound_value(man_table, xiaoming)?;
    let p2 = heap.bound_value(woman_table, xiaohong)?;

    let mut tracer = TracingDumpSink::new();
    for value in [&p1, &p2] {
        let addr = std::ptr::from_ref::<BoundValue>(value).cast();
        // SAFETY: `heap` laid out `value` and outlives the dump.
        unsafe { layout_insight::print_bound_value(addr) }?;
        // SAFETY: as above.
        unsafe { inspect_bound_value(&mut tracer, addr) };
    }
    Ok(())
}

fn dump_map(heap: &mut ModelHeap) -> Result<(), Box<dyn Error>> {
    let map = heap.string_map(&SAMPLE_MAP)?;
    // SAFETY: `heap` laid out `map` and outlives the dump.
    unsafe { layout_insight::print_string_map(&map) }?;

    // SAFETY: as above.
    let mut pairs: Vec<_> = unsafe { collect_string_map(&map) }?.into_iter().collect();
    pairs.sort();
    let mut stdout = io::stdout().lock();
    for (key, value) in pairs {
        writeln!(stdout, "{key:?} => {value:?}")?;
    }
    Ok(())
}

type Demo = fn(&mut ModelHeap) -> Result<(), Box<dyn Error>>;

const DEMOS: [(&str, Demo); 7] = [
    ("text", dump_text),
    ("array", dump_array),
    ("slice", dump_slice),
    ("record", dump_record),
    ("plain", dump_plain),
    ("bound", dump_bound),
    ("map", dump_map),
];

fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing();

    let which = std::env::args().nth(1).unwrap_or_else(|| "all".into());
    let mut heap = ModelHeap::new();
    let mut ran = 0;
    for (name, demo) in DEMOS {
        if which == "all" || which == name {
            tracing::info!(demo = name, "running");
            demo(&mut heap)?;
            ran += 1;
        }
    }
    if ran == 0 {
        return Err(format!("unknown demo {which:?}").into());
    }
    tracing::info!(demos = ran, allocations = heap.allocations(), "done");
    Ok(())
}
