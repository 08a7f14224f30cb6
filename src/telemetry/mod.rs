// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Measurement primitives and log setup.
//!
//! - **Descriptors**: what an instrumented operation is called and where it is attributed
//! - **Spans**: one timed call, closed exactly once, emitting through the sink
//! - **Logging**: `tracing-subscriber` setup for the binary and tests, with
//!   optional OTLP span export behind the `otel` feature
//!
//! Every [`MeasurementSpan`] is also a `tracing` span named `instrumented_call`,
//! so log lines emitted inside a wrapped call carry its operation and span id.

mod attributes;
mod descriptor;
mod init;
mod otlp;
mod span;
mod span_id;

pub use attributes::{AttributeValue, Attributes};
pub use descriptor::{callable_identifier, CallKind, OperationDescriptor};
pub use init::{init_logging, LoggingConfig, LoggingGuard};
pub use otlp::{endpoint_or_default, OtlpConfig, DEFAULT_OTLP_ENDPOINT, ENV_OTLP_ENDPOINT};
pub use span::{FinishedSpan, MeasurementSpan, SpanStatus, ERROR_MESSAGE, ERROR_TYPE};
pub use span_id::SpanId;
