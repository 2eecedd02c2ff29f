// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::cmp::{self, Ordering};

use serde::{Deserialize, Serialize};
use tally_ore::cast::CastLossy;
use tally_repr::adt::decimal::{Decimal, MAX_DECIMAL_SCALE};
use tally_repr::{ColumnType, Datum, RelationType, Row};
use tracing::{debug, trace};

use crate::aggregate::combine;
use crate::aggregate::{AggEvalContext, AggMode, DistinctChecker};
use crate::relation::func::AggregateFunc;
use crate::scalar::func::DIV_PRECISION_INCREMENT;
use crate::{AggregateExpr, EvalError, ScalarExpr, StatementContext};

static NULL: Datum = Datum::Null;

/// One aggregate call, planned against an input relation and bound to an
/// evaluation mode.
///
/// An `AggregateFunction` holds no evaluation state: all of it lives in the
/// [`AggEvalContext`]s the function creates, one per group. The function
/// itself is immutable after construction, so a clone is a fully independent
/// copy that can be handed to another worker.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AggregateFunction {
    func: AggregateFunc,
    args: Vec<ScalarExpr>,
    distinct: bool,
    mode: AggMode,
    arg_types: Vec<ColumnType>,
    input_arity: usize,
}

impl AggregateFunction {
    /// Plans `expr` in the given mode against rows of `input_type`.
    ///
    /// In the merge modes, `input_type` is still the type of the raw rows the
    /// arguments were written against: the argument types determine the
    /// result type in every mode.
    ///
    /// Fails if `expr` has the wrong number of arguments for its kind, if an
    /// argument references a column `input_type` lacks, or if a `DISTINCT`
    /// aggregate is planned in any mode but [`AggMode::Complete`].
    pub fn new(
        expr: AggregateExpr,
        mode: AggMode,
        input_type: &RelationType,
    ) -> Result<Self, EvalError> {
        let AggregateExpr {
            func,
            args,
            distinct,
        } = expr;
        func.check_arity(args.len())?;
        if distinct && mode != AggMode::Complete {
            return Err(EvalError::DistinctInMergeMode(func.name().to_owned()));
        }
        for arg in &args {
            arg.check_columns(input_type.arity())?;
        }
        let arg_types = args.iter().map(|arg| arg.typ(input_type)).collect();
        debug!(%func, %mode, distinct, args = args.len(), "planned aggregate function");
        Ok(AggregateFunction {
            func,
            args,
            distinct,
            mode,
            arg_types,
            input_arity: input_type.arity(),
        })
    }

    /// Returns a copy of this function bound to a different mode.
    pub fn with_mode(&self, mode: AggMode) -> Result<Self, EvalError> {
        if self.distinct && mode != AggMode::Complete {
            return Err(EvalError::DistinctInMergeMode(self.func.name().to_owned()));
        }
        Ok(AggregateFunction {
            mode,
            ..self.clone()
        })
    }

    pub fn func(&self) -> &AggregateFunc {
        &self.func
    }

    pub fn args(&self) -> &[ScalarExpr] {
        &self.args
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn mode(&self) -> AggMode {
        self.mode
    }

    /// The type of the final result. Depends only on the kind and the
    /// planned argument types, never on the rows seen.
    pub fn result_type(&self) -> ColumnType {
        self.func.output_type(&self.arg_types)
    }

    /// The types of the columns [`AggregateFunction::get_partial_result`]
    /// produces.
    pub fn partial_result_types(&self) -> Vec<ColumnType> {
        self.func.partial_types(&self.arg_types)
    }

    pub fn partial_arity(&self) -> usize {
        self.func.partial_arity()
    }

    /// The types of the columns this function contributes to an output row
    /// in its mode.
    pub fn output_types(&self) -> Vec<ColumnType> {
        if self.mode.produces_partial() {
            self.partial_result_types()
        } else {
            vec![self.result_type()]
        }
    }

    /// Creates a context for a new group, already holding the kind's
    /// identity.
    pub fn create_context(&self) -> AggEvalContext {
        trace!(func = %self.func, "creating evaluation context");
        let value = match self.func {
            AggregateFunc::Count => Datum::Null,
            _ => self.func.identity(),
        };
        AggEvalContext {
            value,
            count: 0,
            buffer: None,
            truncated: false,
            got_first_row: false,
            distinct: self.distinct.then(DistinctChecker::default),
        }
    }

    /// Returns `ctx` to the state of a fresh context.
    pub fn reset_context(&self, ctx: &mut AggEvalContext) {
        *ctx = self.create_context();
    }

    /// The result of the aggregate over a group with no rows.
    pub fn default_value(&self) -> Datum {
        self.func.identity()
    }

    /// The final result of the aggregate over a group holding a single row
    /// of all nulls, as produced by an outer join that found no match.
    ///
    /// Returns `None` if evaluating the arguments against that row fails.
    /// Arguments that all evaluate to null yield [`default_value`]; otherwise
    /// the row is aggregated like any other, so `COUNT(*)` and `COUNT(1)`
    /// yield 1, `BIT_AND(7)` yields 7, and `COUNT(#0, 1)` skips the row and
    /// yields 0.
    ///
    /// [`default_value`]: AggregateFunction::default_value
    pub fn default_value_for_null_row(&self) -> Option<Datum> {
        let nulls = Row::nulls(self.input_arity);
        let values = self
            .args
            .iter()
            .map(|arg| arg.eval(&nulls))
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        if !values.is_empty() && values.iter().all(Datum::is_null) {
            return Some(self.default_value());
        }
        let sc = StatementContext::strict();
        let mut ctx = self.create_context();
        self.update_raw(&mut ctx, &sc, &nulls).ok()?;
        self.get_result(&ctx, &sc).ok()
    }

    /// Folds one input row into `ctx`.
    ///
    /// In [`AggMode::Complete`] and [`AggMode::Partial1`], `row` is a raw
    /// row and this is [`AggregateFunction::update_raw`]. In the merge modes,
    /// `row` is this function's slice of a partial-result row and this is
    /// [`AggregateFunction::merge`].
    pub fn update(
        &self,
        ctx: &mut AggEvalContext,
        sc: &StatementContext,
        row: &[Datum],
    ) -> Result<(), EvalError> {
        if self.mode.consumes_raw_rows() {
            self.update_raw(ctx, sc, row)
        } else {
            self.merge(ctx, sc, row)
        }
    }

    /// Evaluates the arguments against a raw row and folds them into `ctx`.
    ///
    /// Rows with a null argument are skipped by every kind but `FIRST_ROW`.
    /// A `DISTINCT` aggregate also skips argument tuples it has already seen.
    pub fn update_raw(
        &self,
        ctx: &mut AggEvalContext,
        sc: &StatementContext,
        row: &[Datum],
    ) -> Result<(), EvalError> {
        self.func.check_arity(self.args.len())?;
        let values = self
            .args
            .iter()
            .map(|arg| arg.eval(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EvalError::Argument {
                func: self.func.name().to_owned(),
                source: Box::new(e),
            })?;
        if self.func.ignores_nulls() && values.iter().any(Datum::is_null) {
            return Ok(());
        }
        if let Some(checker) = ctx.distinct.as_mut() {
            if !checker.insert(&values) {
                return Ok(());
            }
        }
        self.accumulate(ctx, sc, &values)
    }

    /// Folds another context's partial result into `ctx`.
    ///
    /// `partial` must hold exactly the columns
    /// [`AggregateFunction::get_partial_result`] produces, in order.
    pub fn merge(
        &self,
        ctx: &mut AggEvalContext,
        sc: &StatementContext,
        partial: &[Datum],
    ) -> Result<(), EvalError> {
        let expected = self.partial_arity();
        if partial.len() != expected {
            return Err(EvalError::WrongPartialArity {
                func: self.func.name().to_owned(),
                expected,
                got: partial.len(),
            });
        }
        match &self.func {
            AggregateFunc::Count => {
                let n = combine::partial_count(&partial[0], sc)?;
                ctx.count = combine::count(ctx.count, n, sc)?;
            }
            AggregateFunc::Avg => {
                let n = combine::partial_count(&partial[0], sc)?;
                ctx.count = combine::count(ctx.count, n, sc)?;
                ctx.value = combine::sum(&ctx.value, &partial[1], sc)?;
            }
            _ => self.combine_value(ctx, sc, &partial[0])?,
        }
        Ok(())
    }

    /// Folds the already evaluated, already filtered arguments of one raw
    /// row into `ctx`.
    fn accumulate(
        &self,
        ctx: &mut AggEvalContext,
        sc: &StatementContext,
        values: &[Datum],
    ) -> Result<(), EvalError> {
        let first = values.first().unwrap_or(&NULL);
        match &self.func {
            AggregateFunc::Count => ctx.count = combine::count(ctx.count, 1, sc)?,
            AggregateFunc::Avg => {
                ctx.value = combine::sum(&ctx.value, first, sc)?;
                ctx.count = combine::count(ctx.count, 1, sc)?;
            }
            AggregateFunc::GroupConcat { .. } => {
                let piece: String = values.iter().filter_map(Datum::to_text).collect();
                self.combine_value(ctx, sc, &Datum::from(piece))?;
            }
            _ => self.combine_value(ctx, sc, first)?,
        }
        Ok(())
    }

    /// Folds a single value into `ctx` for the kinds whose raw input and
    /// partial state have the same shape.
    fn combine_value(
        &self,
        ctx: &mut AggEvalContext,
        sc: &StatementContext,
        value: &Datum,
    ) -> Result<(), EvalError> {
        match &self.func {
            AggregateFunc::Sum => ctx.value = combine::sum(&ctx.value, value, sc)?,
            AggregateFunc::Max => {
                if combine::replaces(&ctx.value, value, Ordering::Greater)? {
                    ctx.value = value.clone();
                }
            }
            AggregateFunc::Min => {
                if combine::replaces(&ctx.value, value, Ordering::Less)? {
                    ctx.value = value.clone();
                }
            }
            AggregateFunc::BitAnd | AggregateFunc::BitOr | AggregateFunc::BitXor => {
                if !value.is_null() {
                    let acc = self.bits(ctx);
                    let bits = combine::bits(value, sc)?;
                    ctx.value = Datum::UInt64(match self.func {
                        AggregateFunc::BitAnd => acc & bits,
                        AggregateFunc::BitOr => acc | bits,
                        _ => acc ^ bits,
                    });
                }
            }
            AggregateFunc::GroupConcat { separator, max_len } => {
                if let Some(piece) = value.to_text() {
                    combine::concat(ctx, &piece, separator, *max_len, sc);
                }
            }
            AggregateFunc::FirstRow => {
                if !ctx.got_first_row {
                    ctx.value = value.clone();
                    ctx.got_first_row = true;
                }
            }
            AggregateFunc::Count | AggregateFunc::Avg => {
                unreachable!("{} does not fold single values", self.func)
            }
        }
        Ok(())
    }

    /// The running bits of a bitwise aggregate. A context that never held
    /// any reads as the identity.
    fn bits(&self, ctx: &AggEvalContext) -> u64 {
        match (&ctx.value, self.func.identity()) {
            (Datum::UInt64(bits), _) => *bits,
            (_, Datum::UInt64(identity)) => identity,
            _ => 0,
        }
    }

    /// The final result for the group `ctx` tracks.
    ///
    /// Does not modify `ctx`, so it may be called any number of times. Only
    /// `AVG`'s division can overflow, which `sc` either reports or turns into
    /// a saturated result and a warning.
    pub fn get_result(
        &self,
        ctx: &AggEvalContext,
        sc: &StatementContext,
    ) -> Result<Datum, EvalError> {
        Ok(match &self.func {
            AggregateFunc::Count => Datum::Int64(ctx.count),
            AggregateFunc::Avg => return self.average(ctx, sc),
            AggregateFunc::BitAnd | AggregateFunc::BitOr | AggregateFunc::BitXor => {
                Datum::UInt64(self.bits(ctx))
            }
            AggregateFunc::GroupConcat { .. } => Datum::from(ctx.buffer.clone()),
            AggregateFunc::Sum
            | AggregateFunc::Max
            | AggregateFunc::Min
            | AggregateFunc::FirstRow => ctx.value.clone(),
        })
    }

    fn average(&self, ctx: &AggEvalContext, sc: &StatementContext) -> Result<Datum, EvalError> {
        if ctx.count == 0 {
            return Ok(Datum::Null);
        }
        match &ctx.value {
            Datum::Null => Ok(Datum::Null),
            Datum::Decimal(sum) => {
                match sum.checked_div_int(ctx.count, DIV_PRECISION_INCREMENT) {
                    Some(avg) => Ok(Datum::from(avg)),
                    None => {
                        sc.handle_overflow(EvalError::NumericFieldOverflow)?;
                        let scale = cmp::min(
                            sum.scale().saturating_add(DIV_PRECISION_INCREMENT),
                            MAX_DECIMAL_SCALE,
                        );
                        let bound = if sum.is_negative() {
                            Decimal::min_value(scale)
                        } else {
                            Decimal::max_value(scale)
                        };
                        Ok(Datum::from(bound))
                    }
                }
            }
            sum => Ok(Datum::from(sum.to_f64().value / f64::cast_lossy(ctx.count))),
        }
    }

    /// The partial result for the group `ctx` tracks, to be fed to
    /// [`AggregateFunction::merge`] by a later stage.
    ///
    /// `AVG` produces `[count, sum]`; every other kind produces one column.
    pub fn get_partial_result(&self, ctx: &AggEvalContext) -> Vec<Datum> {
        match &self.func {
            AggregateFunc::Count => vec![Datum::Int64(ctx.count)],
            AggregateFunc::Avg => vec![Datum::Int64(ctx.count), ctx.value.clone()],
            AggregateFunc::BitAnd | AggregateFunc::BitOr | AggregateFunc::BitXor => {
                vec![Datum::UInt64(self.bits(ctx))]
            }
            AggregateFunc::GroupConcat { .. } => vec![Datum::from(ctx.buffer.clone())],
            AggregateFunc::Sum
            | AggregateFunc::Max
            | AggregateFunc::Min
            | AggregateFunc::FirstRow => vec![ctx.value.clone()],
        }
    }
}
