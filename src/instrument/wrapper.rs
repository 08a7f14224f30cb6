// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The call instrumentation wrapper.

use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, Instrument};

use super::extract::{
    AgentInputAttributes, AgentOutputAttributes, Extract, NoAttributes, ToolInputAttributes,
    ToolOutputAttributes,
};
use super::outcome::{Failure, Outcome};
use crate::sink::{self, Sink};
use crate::telemetry::{
    callable_identifier, Attributes, CallKind, MeasurementSpan, OperationDescriptor, SpanStatus,
};

/// Operation name used for agent entry points.
pub const AGENT_OPERATION: &str = "agent_call";

/// Measures calls taking `A` and succeeding with `T`.
///
/// Holds the descriptor and extractors but not the callable, so the same
/// instrumentation can wrap a closure per call. See [`Instrumented`] for the
/// owning form.
pub struct Instrumentation<A: ?Sized, T: ?Sized> {
    descriptor: OperationDescriptor,
    kind: CallKind,
    sink: Option<Arc<Sink>>,
    input: Box<dyn Extract<A>>,
    output: Box<dyn Extract<T>>,
}

impl<A: ?Sized, T: ?Sized> Instrumentation<A, T> {
    /// Instrumentation without extractors, reporting to the global sink.
    pub fn new(descriptor: OperationDescriptor, kind: CallKind) -> Self {
        Self {
            descriptor,
            kind,
            sink: None,
            input: Box::new(NoAttributes),
            output: Box::new(NoAttributes),
        }
    }

    pub fn with_input_extractor(mut self, extractor: impl Extract<A> + 'static) -> Self {
        self.input = Box::new(extractor);
        self
    }

    pub fn with_output_extractor(mut self, extractor: impl Extract<T> + 'static) -> Self {
        self.output = Box::new(extractor);
        self
    }

    /// Report to `sink` instead of the global sink.
    pub fn with_sink(mut self, sink: Arc<Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    fn sink(&self) -> Arc<Sink> {
        self.sink.clone().unwrap_or_else(sink::global)
    }

    /// Open a span for a call with `args`, applying descriptor tags and
    /// input extraction.
    pub fn open(&self, args: &A) -> MeasurementSpan {
        let mut span = MeasurementSpan::start(&self.descriptor, self.kind, self.sink());
        for (key, value) in self.descriptor.tags() {
            span.set_attribute(key.clone(), value.as_str());
        }
        match self.input.extract(args) {
            Ok(attributes) => span.extend_attributes(attributes),
            Err(e) => debug!(
                operation = %self.descriptor.name(),
                error = %e,
                "Input attribute extraction failed"
            ),
        }
        span
    }

    /// Close `span` according to `result`.
    pub fn finish<R>(&self, span: &mut MeasurementSpan, result: &R)
    where
        R: Outcome<Success = T> + ?Sized,
    {
        self.finish_with(span, result.success(), result.failure());
    }

    fn finish_with(
        &self,
        span: &mut MeasurementSpan,
        success: Option<&T>,
        failure: Option<Failure>,
    ) {
        if let Some(failure) = failure {
            span.close(SpanStatus::Error, failure.into_attributes());
            return;
        }

        let attributes = match success.map(|value| self.output.extract(value)) {
            Some(Ok(attributes)) => attributes,
            Some(Err(e)) => {
                debug!(
                    operation = %self.descriptor.name(),
                    error = %e,
                    "Output attribute extraction failed"
                );
                Attributes::new()
            }
            None => Attributes::new(),
        };
        span.close(SpanStatus::Success, attributes);
    }

    /// Run a synchronous call inside a span.
    pub fn call<F, R>(&self, args: A, f: F) -> R
    where
        A: Sized,
        F: FnOnce(A) -> R,
        R: Outcome<Success = T>,
    {
        let mut span = self.open(&args);
        let result = {
            let _entered = span.enter();
            f(args)
        };
        self.finish(&mut span, &result);
        result
    }

    /// Run a synchronous call on borrowed arguments inside a span.
    pub fn call_ref<'a, F, R>(&self, args: &'a A, f: F) -> R
    where
        F: FnOnce(&'a A) -> R,
        R: Outcome<Success = T>,
    {
        let mut span = self.open(args);
        let result = {
            let _entered = span.enter();
            f(args)
        };
        self.finish(&mut span, &result);
        result
    }

    /// Await an asynchronous call inside a span.
    ///
    /// If the returned future is dropped before completion, the span closes
    /// with status error and `error.type = "cancelled"`.
    pub async fn call_async<F, Fut, R>(&self, args: A, f: F) -> R
    where
        A: Sized,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = R>,
        R: Outcome<Success = T>,
    {
        let mut span = self.open(&args);
        let result = f(args).instrument(span.tracing_span().clone()).await;
        self.finish(&mut span, &result);
        result
    }

    /// Await an asynchronous call on borrowed arguments inside a span.
    pub async fn call_async_ref<'a, F, Fut, R>(&self, args: &'a A, f: F) -> R
    where
        F: FnOnce(&'a A) -> Fut,
        Fut: Future<Output = R>,
        R: Outcome<Success = T>,
    {
        let mut span = self.open(args);
        let result = f(args).instrument(span.tracing_span().clone()).await;
        self.finish(&mut span, &result);
        result
    }

    /// Run a call whose return value of any type always counts as success.
    pub fn call_value<F>(&self, args: A, f: F) -> T
    where
        A: Sized,
        T: Sized,
        F: FnOnce(A) -> T,
    {
        let mut span = self.open(&args);
        let value = {
            let _entered = span.enter();
            f(args)
        };
        self.finish_with(&mut span, Some(&value), None);
        value
    }

    /// Await a call whose output of any type always counts as success.
    pub async fn call_async_value<F, Fut>(&self, args: A, f: F) -> T
    where
        A: Sized,
        T: Sized,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut span = self.open(&args);
        let value = f(args).instrument(span.tracing_span().clone()).await;
        self.finish_with(&mut span, Some(&value), None);
        value
    }

    /// Run a fallible call whose error type only implements `Debug`.
    pub fn call_fallible<F, E>(&self, args: A, f: F) -> Result<T, E>
    where
        A: Sized,
        T: Sized,
        E: Debug,
        F: FnOnce(A) -> Result<T, E>,
    {
        let mut span = self.open(&args);
        let result = {
            let _entered = span.enter();
            f(args)
        };
        self.finish_fallible(&mut span, &result);
        result
    }

    /// Await a fallible call whose error type only implements `Debug`.
    pub async fn call_async_fallible<F, Fut, E>(&self, args: A, f: F) -> Result<T, E>
    where
        A: Sized,
        T: Sized,
        E: Debug,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut span = self.open(&args);
        let result = f(args).instrument(span.tracing_span().clone()).await;
        self.finish_fallible(&mut span, &result);
        result
    }

    fn finish_fallible<E: Debug>(&self, span: &mut MeasurementSpan, result: &Result<T, E>)
    where
        T: Sized,
    {
        match result {
            Ok(value) => self.finish_with(span, Some(value), None),
            Err(e) => self.finish_with(span, None, Some(Failure::from_debug(e))),
        }
    }
}

impl<A: ?Sized, T: ?Sized> fmt::Debug for Instrumentation<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("descriptor", &self.descriptor)
            .field("kind", &self.kind)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

/// A callable wrapped with instrumentation.
///
/// Calls take the same argument and return the same value as the wrapped
/// callable. Functions of several arguments take them as a tuple.
///
/// ```rust,ignore
/// fn add((a, b): (i64, i64)) -> i64 {
///     a + b
/// }
///
/// let add = Instrumented::new(add, OperationDescriptor::new("tool.add"), CallKind::Tool);
/// assert_eq!(add.call((2, 3)), 5);
/// ```
pub struct Instrumented<F, A, T: ?Sized> {
    inner: F,
    instrumentation: Instrumentation<A, T>,
}

impl<F, A, T: ?Sized> Instrumented<F, A, T> {
    /// Wrap `inner`. Without an explicit resource, the descriptor takes the
    /// callable's own name (closures keep the operation name).
    pub fn new(inner: F, descriptor: OperationDescriptor, kind: CallKind) -> Self {
        let descriptor = descriptor.or_resource(callable_identifier::<F>());
        Self {
            inner,
            instrumentation: Instrumentation::new(descriptor, kind),
        }
    }

    pub fn with_input_extractor(mut self, extractor: impl Extract<A> + 'static) -> Self {
        self.instrumentation = self.instrumentation.with_input_extractor(extractor);
        self
    }

    pub fn with_output_extractor(mut self, extractor: impl Extract<T> + 'static) -> Self {
        self.instrumentation = self.instrumentation.with_output_extractor(extractor);
        self
    }

    pub fn with_sink(mut self, sink: Arc<Sink>) -> Self {
        self.instrumentation = self.instrumentation.with_sink(sink);
        self
    }

    pub fn descriptor(&self) -> &OperationDescriptor {
        self.instrumentation.descriptor()
    }

    pub fn instrumentation(&self) -> &Instrumentation<A, T> {
        &self.instrumentation
    }

    /// The wrapped callable.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn into_inner(self) -> F {
        self.inner
    }

    /// Call a synchronous callable.
    pub fn call<R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
        R: Outcome<Success = T>,
    {
        self.instrumentation.call(args, &self.inner)
    }

    /// Call an asynchronous callable and await its result.
    pub async fn call_async<Fut, R>(&self, args: A) -> R
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = R>,
        R: Outcome<Success = T>,
    {
        self.instrumentation.call_async(args, &self.inner).await
    }

    /// Call a synchronous callable returning any type; never a failure.
    pub fn call_value(&self, args: A) -> T
    where
        F: Fn(A) -> T,
        T: Sized,
    {
        self.instrumentation.call_value(args, &self.inner)
    }

    /// Call an asynchronous callable returning any type; never a failure.
    pub async fn call_async_value<Fut>(&self, args: A) -> T
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = T>,
        T: Sized,
    {
        self.instrumentation.call_async_value(args, &self.inner).await
    }

    /// Call a synchronous callable whose error only implements `Debug`.
    pub fn call_fallible<E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        T: Sized,
        E: Debug,
    {
        self.instrumentation.call_fallible(args, &self.inner)
    }

    /// Call an asynchronous callable whose error only implements `Debug`.
    pub async fn call_async_fallible<Fut, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Sized,
        E: Debug,
    {
        self.instrumentation.call_async_fallible(args, &self.inner).await
    }
}

impl<F, A, T: ?Sized> fmt::Debug for Instrumented<F, A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumented")
            .field("instrumentation", &self.instrumentation)
            .finish_non_exhaustive()
    }
}

/// Wrap an agent entry point as `agent_call` with the default agent extractors.
pub fn instrument_agent_call<F, A, T>(f: F) -> Instrumented<F, A, T>
where
    A: Serialize,
    T: Serialize + ?Sized,
{
    Instrumented::new(f, OperationDescriptor::new(AGENT_OPERATION), CallKind::Agent)
        .with_input_extractor(AgentInputAttributes)
        .with_output_extractor(AgentOutputAttributes)
}

/// Wrap a tool as `tool.<name>` with the default tool extractors.
pub fn instrument_tool<F, A, T>(name: &str, f: F) -> Instrumented<F, A, T>
where
    A: Serialize,
    T: Serialize + ?Sized,
{
    Instrumented::new(f, tool_descriptor(name), CallKind::Tool)
        .with_input_extractor(ToolInputAttributes)
        .with_output_extractor(ToolOutputAttributes)
}

/// Descriptor for a tool named `name`: operation `tool.<name>`, resource `<name>`.
pub fn tool_descriptor(name: &str) -> OperationDescriptor {
    OperationDescriptor::new(format!("tool.{name}")).with_resource(name)
}
