// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Scalar expressions and the aggregate functions evaluated over them.

#![warn(missing_debug_implementations)]

mod aggregate;
mod relation;
mod scalar;
mod statement;

pub mod dyncfgs;

pub use aggregate::{
    two_phase, two_phase_from_config, AggEvalContext, AggMode, AggregateFunction,
    DistinctChecker, GroupedAggregator,
};
pub use dyncfgs::all_dyncfgs;
pub use relation::func::AggregateFunc;
pub use relation::AggregateExpr;
pub use scalar::func::{self, BinaryFunc, UnaryFunc};
pub use scalar::{EvalError, ScalarExpr};
pub use statement::StatementContext;
