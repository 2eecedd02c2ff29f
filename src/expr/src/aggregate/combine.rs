// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The operators aggregate kinds fold values with.
//!
//! Each operator is associative and commutative, with the kind's identity as
//! its neutral element, so that partial states built on different shards can
//! be combined in any grouping. Overflow and string coercion go through the
//! statement's policy.

use std::cmp::Ordering;

use tally_repr::Datum;

use crate::aggregate::AggEvalContext;
use crate::{EvalError, StatementContext};

/// Adds `input` to a `SUM` or `AVG` accumulator.
///
/// Integers and decimals add exactly as decimals. Once a float or a string
/// is involved, the sum continues as a float.
pub(crate) fn sum(acc: &Datum, input: &Datum, sc: &StatementContext) -> Result<Datum, EvalError> {
    if input.is_null() {
        return Ok(acc.clone());
    }
    if input.is_exact_numeric() && matches!(acc, Datum::Null | Datum::Decimal(_)) {
        let a = acc.to_decimal().value;
        let b = input.to_decimal().value;
        match a.checked_add(b) {
            Some(d) => Ok(Datum::from(d)),
            None => {
                sc.handle_overflow(EvalError::NumericFieldOverflow)?;
                Ok(Datum::from(a.saturating_add(b)))
            }
        }
    } else {
        let a = acc.to_f64().value;
        let b = sc.convert(input.to_f64())?;
        let sum = a + b;
        if sum.is_finite() {
            Ok(Datum::from(sum))
        } else {
            sc.handle_overflow(EvalError::NumericFieldOverflow)?;
            Ok(Datum::from(f64::MAX.copysign(sum)))
        }
    }
}

/// Adds `n` to a row count.
pub(crate) fn count(acc: i64, n: i64, sc: &StatementContext) -> Result<i64, EvalError> {
    match acc.checked_add(n) {
        Some(c) => Ok(c),
        None => {
            sc.handle_overflow(EvalError::IntegerOutOfRange)?;
            Ok(if n < 0 { i64::MIN } else { i64::MAX })
        }
    }
}

/// Reads a row count out of a partial result.
pub(crate) fn partial_count(d: &Datum, sc: &StatementContext) -> Result<i64, EvalError> {
    match d {
        Datum::Null => Ok(0),
        Datum::Int64(i) => Ok(*i),
        other => {
            let d = sc.convert(other.to_decimal())?;
            i64::try_from(d.round_to_i128()).map_err(|_| EvalError::IntegerOutOfRange)
        }
    }
}

/// Converts `input` to the bits a bitwise aggregate folds.
pub(crate) fn bits(input: &Datum, sc: &StatementContext) -> Result<u64, EvalError> {
    sc.convert(input.to_u64_bits())
}

/// Reports whether `input` should replace the current extreme `acc`, where
/// `keep` is [`Ordering::Greater`] for `MAX` and [`Ordering::Less`] for
/// `MIN`. Nulls never replace anything.
pub(crate) fn replaces(acc: &Datum, input: &Datum, keep: Ordering) -> Result<bool, EvalError> {
    if input.is_null() {
        return Ok(false);
    }
    if acc.is_null() {
        return Ok(true);
    }
    let ordering = input
        .sql_cmp(acc)
        .ok_or_else(|| EvalError::IncomparableTypes {
            left: input.scalar_type(),
            right: acc.scalar_type(),
        })?;
    Ok(ordering == keep)
}

/// Appends `piece` to a `GROUP_CONCAT` buffer, cutting the buffer at
/// `max_len` bytes. Once cut, the buffer ignores further pieces.
pub(crate) fn concat(
    ctx: &mut AggEvalContext,
    piece: &str,
    separator: &str,
    max_len: usize,
    sc: &StatementContext,
) {
    if ctx.truncated {
        return;
    }
    let first = ctx.buffer.is_none();
    let buffer = ctx.buffer.get_or_insert_with(String::new);
    if !first {
        buffer.push_str(separator);
    }
    buffer.push_str(piece);
    if buffer.len() > max_len {
        let mut end = max_len;
        while !buffer.is_char_boundary(end) {
            end -= 1;
        }
        buffer.truncate(end);
        ctx.truncated = true;
        sc.append_warning(EvalError::GroupConcatTruncated { max_len });
    }
}
