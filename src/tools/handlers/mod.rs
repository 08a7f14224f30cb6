// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Built-in tool implementations.

mod calculator;

pub use calculator::{evaluate, CalculatorTool, Number, MAX_NESTING};
