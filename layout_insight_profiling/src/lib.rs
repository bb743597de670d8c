// Copyright 2026 the Layout Insight Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Profiling and tracing adapters for `layout_insight`.
//!
//! This crate is `std`-only and keeps `layout_insight` itself free of observability
//! dependencies. Both sinks implement [`DumpSink`](layout_insight::DumpSink):
//!
//! - [`ProfilingDumpSink`] opens one Tracy zone per inspection and attaches every level and field
//!   line to it as zone text.
//! - [`TracingDumpSink`] emits `tracing` events: banners and levels at `DEBUG`, field lines at
//!   `TRACE`.
//!
//! ## Example
//! ```ignore
//! use layout_insight::value::inspect_plain_value;
//! use layout_insight_profiling::TracingDumpSink;
//!
//! let mut sink = TracingDumpSink::new();
//! unsafe { inspect_plain_value(&mut sink, &value) };
//! ```

mod profiling;
mod tracing_sink;

pub use profiling::ProfilingDumpSink;
pub use tracing_sink::{FIELD_TARGET, LEVEL_TARGET, TracingDumpSink};
