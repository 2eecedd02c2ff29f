// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::cmp;
use std::fmt;

use serde::{Deserialize, Serialize};
use tally_repr::adt::decimal::{Decimal, MAX_DECIMAL_SCALE};
use tally_repr::{ColumnType, Conversion, Datum, NumericIssue, ScalarType};

use crate::scalar::{EvalError, ScalarExpr};

/// Extra fractional digits produced by `/` over exact operands.
pub const DIV_PRECISION_INCREMENT: u8 = 4;

/// Converts a lenient numeric conversion into a strict one.
///
/// Scalar functions have no statement context to record warnings in, so
/// anything short of an exact conversion is an error.
fn strict<T>(conversion: Conversion<T>) -> Result<T, EvalError> {
    match conversion.issue {
        None => Ok(conversion.value),
        Some(NumericIssue::Overflow) => Err(EvalError::NumericFieldOverflow),
        Some(NumericIssue::Truncated(s)) => Err(EvalError::Truncated(s)),
    }
}

/// Reports whether a datum counts as true in a condition: non-null and
/// numerically non-zero.
pub(crate) fn is_true(d: &Datum) -> bool {
    !d.is_null() && d.to_f64().value != 0.0
}

/// The numeric class an arithmetic operator works in, from narrowest to
/// widest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NumericClass {
    Int64,
    UInt64,
    Decimal,
    Float64,
}

impl NumericClass {
    fn of_datum(d: &Datum) -> NumericClass {
        match d {
            Datum::Int64(_) | Datum::Null => NumericClass::Int64,
            Datum::UInt64(_) => NumericClass::UInt64,
            Datum::Decimal(_) => NumericClass::Decimal,
            Datum::Float64(_) | Datum::String(_) => NumericClass::Float64,
        }
    }

    fn of_type(t: &ScalarType) -> NumericClass {
        match t {
            ScalarType::Int64 | ScalarType::Null => NumericClass::Int64,
            ScalarType::UInt64 => NumericClass::UInt64,
            ScalarType::Decimal { .. } => NumericClass::Decimal,
            ScalarType::Float64 | ScalarType::String => NumericClass::Float64,
        }
    }
}

fn finite(f: f64) -> Result<Datum, EvalError> {
    if f.is_finite() {
        Ok(Datum::from(f))
    } else {
        Err(EvalError::NumericFieldOverflow)
    }
}

fn to_i128(d: &Datum) -> i128 {
    match d {
        Datum::Int64(i) => i128::from(*i),
        Datum::UInt64(u) => i128::from(*u),
        _ => 0,
    }
}

fn integer_result(i: Option<i128>, unsigned: bool) -> Result<Datum, EvalError> {
    let i = i.ok_or(EvalError::IntegerOutOfRange)?;
    if unsigned {
        u64::try_from(i)
            .map(Datum::from)
            .map_err(|_| EvalError::IntegerOutOfRange)
    } else {
        i64::try_from(i)
            .map(Datum::from)
            .map_err(|_| EvalError::IntegerOutOfRange)
    }
}

fn decimal_result(d: Option<Decimal>) -> Result<Datum, EvalError> {
    d.map(Datum::from).ok_or(EvalError::NumericFieldOverflow)
}

fn add(a: &Datum, b: &Datum) -> Result<Datum, EvalError> {
    match cmp::max(NumericClass::of_datum(a), NumericClass::of_datum(b)) {
        NumericClass::Float64 => finite(strict(a.to_f64())? + strict(b.to_f64())?),
        NumericClass::Decimal => {
            decimal_result(strict(a.to_decimal())?.checked_add(strict(b.to_decimal())?))
        }
        class => integer_result(
            to_i128(a).checked_add(to_i128(b)),
            class == NumericClass::UInt64,
        ),
    }
}

fn sub(a: &Datum, b: &Datum) -> Result<Datum, EvalError> {
    match cmp::max(NumericClass::of_datum(a), NumericClass::of_datum(b)) {
        NumericClass::Float64 => finite(strict(a.to_f64())? - strict(b.to_f64())?),
        NumericClass::Decimal => {
            decimal_result(strict(a.to_decimal())?.checked_add(strict(b.to_decimal())?.negate()))
        }
        class => integer_result(
            to_i128(a).checked_sub(to_i128(b)),
            class == NumericClass::UInt64,
        ),
    }
}

fn mul(a: &Datum, b: &Datum) -> Result<Datum, EvalError> {
    match cmp::max(NumericClass::of_datum(a), NumericClass::of_datum(b)) {
        NumericClass::Float64 => finite(strict(a.to_f64())? * strict(b.to_f64())?),
        NumericClass::Decimal => {
            decimal_result(strict(a.to_decimal())?.checked_mul(strict(b.to_decimal())?))
        }
        class => integer_result(
            to_i128(a).checked_mul(to_i128(b)),
            class == NumericClass::UInt64,
        ),
    }
}

fn div(a: &Datum, b: &Datum) -> Result<Datum, EvalError> {
    match cmp::max(NumericClass::of_datum(a), NumericClass::of_datum(b)) {
        NumericClass::Float64 => {
            let divisor = strict(b.to_f64())?;
            if divisor == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            finite(strict(a.to_f64())? / divisor)
        }
        _ => {
            let divisor = strict(b.to_decimal())?;
            if divisor.significand() == 0 {
                return Err(EvalError::DivisionByZero);
            }
            decimal_result(strict(a.to_decimal())?.checked_div(divisor, DIV_PRECISION_INCREMENT))
        }
    }
}

fn neg(a: &Datum) -> Result<Datum, EvalError> {
    match a {
        Datum::Int64(i) => i.checked_neg().map(Datum::from).ok_or(EvalError::IntegerOutOfRange),
        Datum::UInt64(u) => integer_result(Some(-i128::from(*u)), false),
        Datum::Decimal(d) => Ok(Datum::from(d.negate())),
        _ => finite(-strict(a.to_f64())?),
    }
}

#[derive(Ord, PartialOrd, Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum UnaryFunc {
    IsNull,
    Neg,
    CastToFloat64,
    CastToString,
}

impl UnaryFunc {
    pub fn eval(&self, datums: &[Datum], a: &ScalarExpr) -> Result<Datum, EvalError> {
        let a = a.eval(datums)?;
        match self {
            UnaryFunc::IsNull => Ok(Datum::Int64(i64::from(a.is_null()))),
            _ if a.is_null() => Ok(Datum::Null),
            UnaryFunc::Neg => neg(&a),
            UnaryFunc::CastToFloat64 => strict(a.to_f64()).map(Datum::from),
            UnaryFunc::CastToString => Ok(Datum::from(a.to_text())),
        }
    }

    pub fn output_type(&self, input_type: ColumnType) -> ColumnType {
        match self {
            UnaryFunc::IsNull => ColumnType::new(ScalarType::Int64),
            UnaryFunc::Neg => match input_type.scalar_type {
                ScalarType::UInt64 => ColumnType::new(ScalarType::Int64),
                ScalarType::String => ColumnType::new(ScalarType::Float64),
                _ => ColumnType::new(input_type.scalar_type),
            }
            .nullable(input_type.nullable),
            UnaryFunc::CastToFloat64 => {
                ColumnType::new(ScalarType::Float64).nullable(input_type.nullable)
            }
            UnaryFunc::CastToString => {
                ColumnType::new(ScalarType::String).nullable(input_type.nullable)
            }
        }
    }

    pub(crate) fn fmt_call(&self, f: &mut fmt::Formatter, expr: &ScalarExpr) -> fmt::Result {
        match self {
            UnaryFunc::IsNull => write!(f, "isnull({})", expr),
            UnaryFunc::Neg => write!(f, "-{}", expr),
            UnaryFunc::CastToFloat64 => write!(f, "cast({} as double)", expr),
            UnaryFunc::CastToString => write!(f, "cast({} as char)", expr),
        }
    }
}

#[derive(Ord, PartialOrd, Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum BinaryFunc {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
}

impl BinaryFunc {
    pub fn eval(
        &self,
        datums: &[Datum],
        a: &ScalarExpr,
        b: &ScalarExpr,
    ) -> Result<Datum, EvalError> {
        let a = a.eval(datums)?;
        let b = b.eval(datums)?;
        if a.is_null() || b.is_null() {
            return Ok(Datum::Null);
        }
        match self {
            BinaryFunc::Add => add(&a, &b),
            BinaryFunc::Sub => sub(&a, &b),
            BinaryFunc::Mul => mul(&a, &b),
            BinaryFunc::Div => div(&a, &b),
            BinaryFunc::Concat => {
                let mut s = a.to_text().unwrap_or_default();
                s.push_str(&b.to_text().unwrap_or_default());
                Ok(Datum::from(s))
            }
        }
    }

    pub fn output_type(&self, input1_type: ColumnType, input2_type: ColumnType) -> ColumnType {
        let nullable = input1_type.nullable || input2_type.nullable;
        let (t1, t2) = (&input1_type.scalar_type, &input2_type.scalar_type);
        let class = cmp::max(NumericClass::of_type(t1), NumericClass::of_type(t2));
        let (s1, s2) = (t1.decimal_scale(), t2.decimal_scale());
        let scalar_type = match (self, class) {
            (BinaryFunc::Concat, _) => ScalarType::String,
            (_, NumericClass::Float64) => ScalarType::Float64,
            (BinaryFunc::Div, _) => ScalarType::decimal_with_scale(cmp::min(
                s1 + DIV_PRECISION_INCREMENT,
                MAX_DECIMAL_SCALE,
            )),
            (BinaryFunc::Mul, NumericClass::Decimal) => {
                ScalarType::decimal_with_scale(cmp::min(s1 + s2, MAX_DECIMAL_SCALE))
            }
            (_, NumericClass::Decimal) => ScalarType::decimal_with_scale(cmp::max(s1, s2)),
            (_, NumericClass::UInt64) => ScalarType::UInt64,
            (_, NumericClass::Int64) => ScalarType::Int64,
        };
        ColumnType::new(scalar_type).nullable(nullable)
    }
}

impl fmt::Display for BinaryFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BinaryFunc::Add => f.write_str("+"),
            BinaryFunc::Sub => f.write_str("-"),
            BinaryFunc::Mul => f.write_str("*"),
            BinaryFunc::Div => f.write_str("/"),
            BinaryFunc::Concat => f.write_str("||"),
        }
    }
}
