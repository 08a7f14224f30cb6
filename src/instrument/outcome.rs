// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Classifying call results as success or failure.

use std::fmt::{Debug, Display};

use crate::telemetry::{Attributes, ERROR_MESSAGE, ERROR_TYPE};

/// Description of a failed call, recorded on the span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Type name of the error, e.g. `ToolError` or `io::Error`.
    pub kind: String,
    /// The error's `Display` output, or `Debug` for errors without one.
    pub message: String,
}

impl Failure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Build from any displayable error, naming it after its type.
    pub fn from_error<E: Display + ?Sized>(error: &E) -> Self {
        Self::new(error_type_name::<E>(), error.to_string())
    }

    /// Build from an error that only implements `Debug`.
    pub fn from_debug<E: Debug + ?Sized>(error: &E) -> Self {
        Self::new(error_type_name::<E>(), format!("{error:?}"))
    }

    /// `error.type` and `error.message` attributes.
    pub fn into_attributes(self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(ERROR_TYPE.to_string(), self.kind.into());
        attributes.insert(ERROR_MESSAGE.to_string(), self.message.into());
        attributes
    }
}

/// Last path segment of a type name, without generic parameters.
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Name recorded as `error.type` for errors of type `E`.
///
/// Smart pointers are looked through (`Box<MyError>` is `MyError`) and trait
/// objects keep a `dyn` prefix. A bare `Error` keeps its module so that
/// `std::io::Error` and `anyhow::Error` stay distinguishable.
pub fn error_type_name<E: ?Sized>() -> String {
    describe_error_type(std::any::type_name::<E>())
}

const POINTERS: &[&str] = &["Box", "Arc", "Rc"];

fn describe_error_type(full: &str) -> String {
    let mut name = full.trim();
    while let Some(open) = name.find('<') {
        let outer = &name[..open];
        let pointer = outer.rsplit("::").next().unwrap_or(outer);
        if !POINTERS.contains(&pointer) || !name.ends_with('>') {
            break;
        }
        name = first_generic_argument(&name[open + 1..name.len() - 1]);
    }

    let (is_dyn, name) = match name.strip_prefix("dyn ") {
        Some(rest) => (true, rest.split(" + ").next().unwrap_or(rest)),
        None => (false, name),
    };

    let base = name.split('<').next().unwrap_or(name);
    let segments: Vec<&str> = base.split("::").collect();
    let last = segments.last().copied().unwrap_or(base);

    let label = if is_dyn || last != "Error" {
        last.to_string()
    } else {
        // `std::io::error::Error` -> `io::Error`
        match segments
            .iter()
            .rev()
            .skip(1)
            .find(|segment| !segment.eq_ignore_ascii_case(last))
        {
            Some(module) => format!("{module}::{last}"),
            None => last.to_string(),
        }
    };

    if is_dyn {
        format!("dyn {label}")
    } else {
        label
    }
}

/// The first top-level argument of a generic list such as `T, A`.
fn first_generic_argument(arguments: &str) -> &str {
    let mut depth = 0usize;
    for (i, c) in arguments.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return arguments[..i].trim(),
            _ => {}
        }
    }
    arguments.trim()
}

/// The result of a wrapped call, viewed as success or failure.
///
/// `Result` fails on `Err`; plain values always succeed.
pub trait Outcome {
    /// The value handed to output extraction on success.
    type Success: ?Sized;

    fn success(&self) -> Option<&Self::Success>;

    fn failure(&self) -> Option<Failure>;
}

impl<T, E: Display> Outcome for Result<T, E> {
    type Success = T;

    fn success(&self) -> Option<&T> {
        self.as_ref().ok()
    }

    fn failure(&self) -> Option<Failure> {
        self.as_ref().err().map(Failure::from_error)
    }
}

macro_rules! always_success {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Outcome for $ty {
                type Success = $ty;

                fn success(&self) -> Option<&$ty> {
                    Some(self)
                }

                fn failure(&self) -> Option<Failure> {
                    None
                }
            }
        )*
    };
}

always_success!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
    serde_json::Value,
);

impl<T> Outcome for Option<T> {
    type Success = Option<T>;

    fn success(&self) -> Option<&Option<T>> {
        Some(self)
    }

    fn failure(&self) -> Option<Failure> {
        None
    }
}

impl<T> Outcome for Vec<T> {
    type Success = Vec<T>;

    fn success(&self) -> Option<&Vec<T>> {
        Some(self)
    }

    fn failure(&self) -> Option<Failure> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;

    #[test]
    fn test_result_ok_is_success() {
        let result: Result<i32, ToolError> = Ok(5);
        assert_eq!(result.success(), Some(&5));
        assert!(result.failure().is_none());
    }

    #[test]
    fn test_result_err_is_failure() {
        let result: Result<i32, ToolError> =
            Err(ToolError::ExecutionFailed("division by zero".to_string()));
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, "ToolError");
        assert!(failure.message.contains("division by zero"));
        assert!(result.success().is_none());
    }

    #[test]
    fn test_plain_values_succeed() {
        assert!(5i32.failure().is_none());
        assert_eq!("done".to_string().success().map(String::as_str), Some("done"));
        assert!(serde_json::json!({"status": "error"}).failure().is_none());
        assert!(None::<u8>.failure().is_none());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<std::io::Error>(), "Error");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
        assert_eq!(short_type_name::<ToolError>(), "ToolError");
    }

    #[test]
    fn test_error_type_name() {
        assert_eq!(error_type_name::<ToolError>(), "ToolError");
        assert_eq!(error_type_name::<std::io::Error>(), "io::Error");
        assert_eq!(error_type_name::<anyhow::Error>(), "anyhow::Error");
        assert_eq!(error_type_name::<Box<ToolError>>(), "ToolError");
        assert_eq!(
            error_type_name::<std::sync::Arc<std::io::Error>>(),
            "io::Error"
        );
        assert_eq!(
            error_type_name::<Box<dyn std::error::Error + Send + Sync>>(),
            "dyn Error"
        );
    }

    #[test]
    fn test_describe_error_type() {
        assert_eq!(describe_error_type("serde_json::error::Error"), "serde_json::Error");
        assert_eq!(describe_error_type("app::ParseError<u8>"), "ParseError");
        assert_eq!(
            describe_error_type("alloc::boxed::Box<app::TimeoutError, alloc::alloc::Global>"),
            "TimeoutError"
        );
        assert_eq!(describe_error_type("alloc::rc::Rc<dyn app::Failure>"), "dyn Failure");
        assert_eq!(describe_error_type("Error"), "Error");
    }

    #[test]
    fn test_boxed_error_failure() {
        let result: Result<i64, Box<dyn std::error::Error + Send + Sync>> =
            Err("division by zero".into());
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, "dyn Error");
        assert_eq!(failure.message, "division by zero");
    }

    #[test]
    fn test_io_error_failure() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such index",
        ));
        assert_eq!(result.failure().unwrap().kind, "io::Error");
    }

    #[test]
    fn test_failure_from_debug() {
        #[derive(Debug)]
        struct Refused {
            code: u16,
        }
        let failure = Failure::from_debug(&Refused { code: 403 });
        assert_eq!(failure.kind, "Refused");
        assert_eq!(failure.message, "Refused { code: 403 }");
    }

    #[test]
    fn test_failure_attributes() {
        let attributes = Failure::new("ValueError", "bad input").into_attributes();
        assert_eq!(
            attributes.get(ERROR_TYPE).and_then(|v| v.as_str()),
            Some("ValueError")
        );
        assert_eq!(
            attributes.get(ERROR_MESSAGE).and_then(|v| v.as_str()),
            Some("bad input")
        );
    }
}
