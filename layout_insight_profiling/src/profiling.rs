// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use layout_insight::field::FieldLine;
use layout_insight::{Addr, DumpSink, Level};

type BackendGuard = tracy_client::Span;

struct Zone {
    // Keep the label alive for backends that may borrow it.
    label: String,
    guard: Option<BackendGuard>,
    lines: usize,
}

/// A [`DumpSink`] that emits Tracy zones via `tracy-client`.
///
/// Each banner closes the previous inspection's zone and opens a new one. Without a running
/// Tracy client, lines are dropped and only counted.
#[derive(Default)]
pub struct ProfilingDumpSink {
    zone: Option<Zone>,
    inspections: usize,
}

impl ProfilingDumpSink {
    /// Creates a sink with no open zone.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of inspections started so far.
    #[must_use]
    pub fn inspections(&self) -> usize {
        self.inspections
    }

    /// Lines reported within the current inspection.
    #[must_use]
    pub fn lines_in_zone(&self) -> usize {
        self.zone.as_ref().map_or(0, |zone| zone.lines)
    }

    /// Closes the current zone, if any.
    pub fn close(&mut self) {
        if let Some(zone) = self.zone.take() {
            let Zone {
                label: _label,
                guard: _guard,
                ..
            } = zone;
            let _ = (_label, _guard);
        }
    }

    fn start_zone(&self, label: &str) -> Option<BackendGuard> {
        let client = tracy_client::Client::running()?;
        Some(client.span_alloc(
            Some(label),
            "layout_insight.inspect",
            "layout_insight",
            0,
            0,
        ))
    }

    fn emit(&mut self, text: &str) {
        let Some(zone) = self.zone.as_mut() else {
            if let Some(client) = tracy_client::Client::running() {
                client.message(text, 0);
            }
            return;
        };
        zone.lines += 1;
        if let Some(guard) = &zone.guard {
            guard.emit_text(text);
        }
    }
}

impl DumpSink for ProfilingDumpSink {
    fn banner(&mut self, what: &str, addr: Addr) {
        self.close();
        let label = format!("insight:{what}@{addr}");
        let guard = self.start_zone(&label);
        self.zone = Some(Zone {
            label,
            guard,
            lines: 0,
        });
        self.inspections += 1;
    }

    fn level(&mut self, level: &Level<'_>) {
        self.emit(&level.to_string());
    }

    fn field(&mut self, line: &FieldLine) {
        self.emit(&line.to_string());
    }
}

impl std::fmt::Debug for ProfilingDumpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilingDumpSink")
            .field("zone", &self.zone.as_ref().map(|zone| zone.label.as_str()))
            .field("inspections", &self.inspections)
            .finish()
    }
}
