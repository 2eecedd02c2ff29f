// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Evaluation of aggregate functions.
//!
//! An [`AggregateFunction`] is an [`AggregateExpr`](crate::AggregateExpr)
//! planned against an input relation and bound to an [`AggMode`]. It keeps
//! the running state of each group in an [`AggEvalContext`] it creates, and
//! folds rows into that state one at a time.
//!
//! Aggregation can be split: shards fold their raw rows in
//! [`AggMode::Partial1`] and emit partial results as rows, which a later
//! stage merges in [`AggMode::Partial2`] or [`AggMode::Final`]. The
//! [`GroupedAggregator`] drives a list of functions over grouped rows in any
//! mode, and [`two_phase`] runs a full split aggregation over shards.

mod combine;
mod context;
mod driver;
mod function;
mod mode;

pub use context::{AggEvalContext, DistinctChecker};
pub use driver::{two_phase, two_phase_from_config, GroupedAggregator};
pub use function::AggregateFunction;
pub use mode::AggMode;
