// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use layout_insight::field::FieldLine;
use layout_insight::{Addr, DumpSink, Level};

/// Target of banner and level events.
pub const LEVEL_TARGET: &str = "layout_insight::dump";

/// Target of field-line events.
pub const FIELD_TARGET: &str = "layout_insight::field";

/// A [`DumpSink`] that reports dumps as `tracing` events.
///
/// Banners and levels are `DEBUG` events on [`LEVEL_TARGET`]; field lines are `TRACE` events on
/// [`FIELD_TARGET`], so a filter such as `layout_insight::dump=debug` keeps the structure and
/// drops the byte-level noise.
#[derive(Debug, Default)]
pub struct TracingDumpSink;

impl TracingDumpSink {
    /// Creates a sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DumpSink for TracingDumpSink {
    fn banner(&mut self, what: &str, addr: Addr) {
        tracing::debug!(target: LEVEL_TARGET, what, addr = %addr, "insight");
    }

    fn level(&mut self, level: &Level<'_>) {
        tracing::debug!(
            target: LEVEL_TARGET,
            index = level.index,
            addr = %level.addr,
            size = level.size,
            label = level.label.unwrap_or(""),
            content = ?level.content,
            "level"
        );
    }

    fn field(&mut self, line: &FieldLine) {
        tracing::trace!(
            target: FIELD_TARGET,
            addr = %line.addr,
            width = line.width,
            value = %line.value,
            "field"
        );
    }
}
