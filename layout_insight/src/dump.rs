// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dump output.
//!
//! Every inspector reports through a [`DumpSink`]. A dump is a sequence of three kinds of events:
//! - a **banner** opening one inspection call,
//! - **levels**, one per reinterpreted structure (`address, byte size, content`),
//! - **field lines**, one per primitive field read by the field reader.
//!
//! Formatting and transport are left to the sink. [`TextSink`] renders the canonical text form,
//! [`RecordingSink`] keeps owned events for assertions, and the `layout_insight_profiling` crate
//! adapts the same events to Tracy and `tracing`.
//!
//! ## Text form
//!
//! ```text
//! **** Insight a plain value from address : 0x7ffc2a10 ****
//! Level1(addr=0x7ffc2a10,size=16) : PlainValue { typ: 0x55d0c0, word: 0x55d100 }
//! Level2(addr=0x55d0c0,size=48) : type=TypeDescriptor { size: 64, .. }
//! 0x55d100[8] : 0x55d200
//! ```

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::addr::Addr;
use crate::field::FieldLine;

/// Receives dump events.
///
/// Implementations must not fail the inspection: sinks that can fail latch their first error and
/// report it from their own accessor.
pub trait DumpSink {
    /// Called once at the start of an inspection of `what` at `addr`.
    fn banner(&mut self, what: &str, addr: Addr);

    /// Called for each reinterpreted structure.
    fn level(&mut self, level: &Level<'_>);

    /// Called for each primitive field read by the field reader.
    fn field(&mut self, line: &FieldLine);
}

impl<S: DumpSink + ?Sized> DumpSink for &mut S {
    fn banner(&mut self, what: &str, addr: Addr) {
        (**self).banner(what, addr);
    }

    fn level(&mut self, level: &Level<'_>) {
        (**self).level(level);
    }

    fn field(&mut self, line: &FieldLine) {
        (**self).field(line);
    }
}

/// One reinterpreted structure.
#[derive(Copy, Clone, Debug)]
pub struct Level<'a> {
    /// 1-based expansion depth.
    pub index: u8,
    /// Where the structure lives.
    pub addr: Addr,
    /// Size of the structure in the assumed layout.
    pub size: usize,
    /// How the structure was reached from the previous level (e.g. `type.ops`).
    pub label: Option<&'static str>,
    /// The structure itself.
    pub content: &'a dyn fmt::Debug,
}

impl<'a> Level<'a> {
    /// Creates a level record.
    #[inline]
    pub fn new(
        index: u8,
        addr: Addr,
        size: usize,
        label: Option<&'static str>,
        content: &'a dyn fmt::Debug,
    ) -> Self {
        Self {
            index,
            addr,
            size,
            label,
            content,
        }
    }
}

impl fmt::Display for Level<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Level{}(addr={},size={}) : ",
            self.index, self.addr, self.size
        )?;
        if let Some(label) = self.label {
            write!(f, "{label}=")?;
        }
        write!(f, "{:?}", self.content)
    }
}

/// The line opening one inspection call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Banner<'a> {
    /// What is being inspected.
    pub what: &'a str,
    /// Where it lives.
    pub addr: Addr,
}

impl fmt::Display for Banner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "**** Insight {} from address : {} ****", self.what, self.addr)
    }
}

/// Renders dump events as text lines into a [`fmt::Write`].
///
/// Write errors are latched: the first one stops further output and is returned by
/// [`TextSink::finish`].
#[derive(Debug, Default)]
pub struct TextSink<W = String> {
    out: W,
    failed: bool,
}

impl<W: fmt::Write> TextSink<W> {
    /// Creates a sink writing into `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    /// Returns the writer.
    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Consumes the sink and returns the writer, or the latched write error.
    pub fn finish(self) -> Result<W, fmt::Error> {
        if self.failed {
            Err(fmt::Error)
        } else {
            Ok(self.out)
        }
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if self.failed {
            return;
        }
        if self.out.write_fmt(args).is_err() || self.out.write_char('\n').is_err() {
            self.failed = true;
        }
    }
}

impl TextSink<String> {
    /// Returns the text written so far.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Returns the written lines.
    pub fn lines(&self) -> core::str::Lines<'_> {
        self.out.lines()
    }

    /// Discards the text written so far.
    pub fn clear(&mut self) {
        self.out.clear();
    }
}

impl<W: fmt::Write> DumpSink for TextSink<W> {
    fn banner(&mut self, what: &str, addr: Addr) {
        self.line(format_args!("{}", Banner { what, addr }));
    }

    fn level(&mut self, level: &Level<'_>) {
        self.line(format_args!("{level}"));
    }

    fn field(&mut self, line: &FieldLine) {
        self.line(format_args!("{line}"));
    }
}

/// An owned dump event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DumpEvent {
    /// See [`DumpSink::banner`].
    Banner {
        /// What was inspected.
        what: String,
        /// Where it lives.
        addr: Addr,
    },
    /// See [`DumpSink::level`].
    Level {
        /// 1-based expansion depth.
        index: u8,
        /// Where the structure lives.
        addr: Addr,
        /// Size of the structure in the assumed layout.
        size: usize,
        /// Edge label.
        label: Option<&'static str>,
        /// `Debug` rendering of the structure.
        content: String,
    },
    /// See [`DumpSink::field`].
    Field(FieldLine),
}

/// Append-only log of dump events.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    events: Vec<DumpEvent>,
}

impl RecordingSink {
    /// Creates an empty log.
    #[inline]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Returns all events in order.
    #[inline]
    pub fn events(&self) -> &[DumpEvent] {
        &self.events
    }

    /// Returns the level events in order.
    pub fn levels(&self) -> impl Iterator<Item = &DumpEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, DumpEvent::Level { .. }))
    }

    /// Returns the field lines in order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldLine> {
        self.events.iter().filter_map(|e| match e {
            DumpEvent::Field(line) => Some(line),
            _ => None,
        })
    }

    /// Drops every recorded event.
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Consumes the log and returns the events.
    #[inline]
    pub fn into_vec(self) -> Vec<DumpEvent> {
        self.events
    }
}

impl DumpSink for RecordingSink {
    fn banner(&mut self, what: &str, addr: Addr) {
        self.events.push(DumpEvent::Banner {
            what: what.into(),
            addr,
        });
    }

    fn level(&mut self, level: &Level<'_>) {
        self.events.push(DumpEvent::Level {
            index: level.index,
            addr: level.addr,
            size: level.size,
            label: level.label,
            content: format!("{:?}", level.content),
        });
    }

    fn field(&mut self, line: &FieldLine) {
        self.events.push(DumpEvent::Field(*line));
    }
}

/// Renders dump events as text lines into a [`std::io::Write`].
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct IoSink<W> {
    out: W,
    error: Option<std::io::Error>,
}

#[cfg(feature = "std")]
impl<W: std::io::Write> IoSink<W> {
    /// Creates a sink writing into `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self { out, error: None }
    }

    /// Flushes the writer and returns it, or the first I/O error.
    pub fn finish(mut self) -> std::io::Result<W> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self
            .out
            .write_fmt(args)
            .and_then(|()| self.out.write_all(b"\n"))
        {
            self.error = Some(err);
        }
    }
}

#[cfg(feature = "std")]
impl<W: std::io::Write> DumpSink for IoSink<W> {
    fn banner(&mut self, what: &str, addr: Addr) {
        self.line(format_args!("{}", Banner { what, addr }));
    }

    fn level(&mut self, level: &Level<'_>) {
        self.line(format_args!("{level}"));
    }

    fn field(&mut self, line: &FieldLine) {
        self.line(format_args!("{line}"));
    }
}
