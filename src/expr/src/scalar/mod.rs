// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use serde::{Deserialize, Serialize};
use tally_repr::{ColumnType, Datum, RelationType, ScalarType};

use crate::aggregate::AggMode;

use self::func::{BinaryFunc, UnaryFunc};

pub mod func;

#[derive(Ord, PartialOrd, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum ScalarExpr {
    /// A column of the input row
    Column(usize),
    /// A literal value.
    ///
    /// A literal may hold an error, which is raised when the literal is
    /// evaluated. This is how constant folding defers errors to runtime.
    Literal(Result<Datum, EvalError>, ColumnType),
    /// A function call that takes one expression as an argument.
    CallUnary {
        func: UnaryFunc,
        expr: Box<ScalarExpr>,
    },
    /// A function call that takes two expressions as arguments.
    CallBinary {
        func: BinaryFunc,
        expr1: Box<ScalarExpr>,
        expr2: Box<ScalarExpr>,
    },
    /// Conditionally evaluated expressions.
    ///
    /// `then` is evaluated only if `cond` is true, and `els` only if it is
    /// false or null.
    If {
        cond: Box<ScalarExpr>,
        then: Box<ScalarExpr>,
        els: Box<ScalarExpr>,
    },
}

impl ScalarExpr {
    pub fn columns(is: &[usize]) -> Vec<ScalarExpr> {
        is.iter().map(|i| ScalarExpr::Column(*i)).collect()
    }

    pub fn column(column: usize) -> Self {
        ScalarExpr::Column(column)
    }

    pub fn literal(res: Result<Datum, EvalError>, typ: ColumnType) -> Self {
        ScalarExpr::Literal(res, typ)
    }

    pub fn literal_ok(datum: Datum, typ: ColumnType) -> Self {
        ScalarExpr::literal(Ok(datum), typ)
    }

    pub fn literal_null(typ: ColumnType) -> Self {
        ScalarExpr::literal_ok(Datum::Null, typ.nullable(true))
    }

    pub fn call_unary(self, func: UnaryFunc) -> Self {
        ScalarExpr::CallUnary {
            func,
            expr: Box::new(self),
        }
    }

    pub fn call_binary(self, other: Self, func: BinaryFunc) -> Self {
        ScalarExpr::CallBinary {
            func,
            expr1: Box::new(self),
            expr2: Box::new(other),
        }
    }

    pub fn if_then_else(self, t: Self, f: Self) -> Self {
        ScalarExpr::If {
            cond: Box::new(self),
            then: Box::new(t),
            els: Box::new(f),
        }
    }

    /// If self is a literal, return it.
    pub fn as_literal(&self) -> Option<&Result<Datum, EvalError>> {
        match self {
            ScalarExpr::Literal(res, _) => Some(res),
            _ => None,
        }
    }

    pub fn is_literal_null(&self) -> bool {
        matches!(self.as_literal(), Some(Ok(Datum::Null)))
    }

    /// Calls `f` on each direct child.
    pub fn visit_children<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a ScalarExpr),
    {
        match self {
            ScalarExpr::Column(_) | ScalarExpr::Literal(_, _) => (),
            ScalarExpr::CallUnary { expr, .. } => f(expr),
            ScalarExpr::CallBinary { expr1, expr2, .. } => {
                f(expr1);
                f(expr2);
            }
            ScalarExpr::If { cond, then, els } => {
                f(cond);
                f(then);
                f(els);
            }
        }
    }

    /// Returns the largest column index referenced, if any.
    pub fn max_column(&self) -> Option<usize> {
        let mut max = match self {
            ScalarExpr::Column(i) => Some(*i),
            _ => None,
        };
        self.visit_children(|e| max = max.max(e.max_column()));
        max
    }

    /// Checks that every referenced column exists in a relation of the given
    /// arity.
    pub fn check_columns(&self, arity: usize) -> Result<(), EvalError> {
        match self.max_column() {
            Some(index) if index >= arity => Err(EvalError::ColumnOutOfBounds { index, arity }),
            _ => Ok(()),
        }
    }

    /// The type of this expression when evaluated against rows of
    /// `relation_type`.
    ///
    /// # Panics
    ///
    /// Panics if the expression references a column that does not exist. Use
    /// [`ScalarExpr::check_columns`] first when the expression is untrusted.
    pub fn typ(&self, relation_type: &RelationType) -> ColumnType {
        match self {
            ScalarExpr::Column(i) => relation_type.column_types[*i].clone(),
            ScalarExpr::Literal(_, typ) => typ.clone(),
            ScalarExpr::CallUnary { expr, func } => func.output_type(expr.typ(relation_type)),
            ScalarExpr::CallBinary { expr1, expr2, func } => {
                func.output_type(expr1.typ(relation_type), expr2.typ(relation_type))
            }
            ScalarExpr::If { cond: _, then, els } => {
                let then_type = then.typ(relation_type);
                let else_type = els.typ(relation_type);
                let nullable = then_type.nullable || else_type.nullable;
                if then_type.scalar_type == ScalarType::Null {
                    else_type.nullable(true)
                } else {
                    then_type.nullable(nullable)
                }
            }
        }
    }

    pub fn eval(&self, datums: &[Datum]) -> Result<Datum, EvalError> {
        match self {
            ScalarExpr::Column(index) => {
                datums
                    .get(*index)
                    .cloned()
                    .ok_or(EvalError::ColumnOutOfBounds {
                        index: *index,
                        arity: datums.len(),
                    })
            }
            ScalarExpr::Literal(res, _column_type) => res.clone(),
            ScalarExpr::CallUnary { func, expr } => func.eval(datums, expr),
            ScalarExpr::CallBinary { func, expr1, expr2 } => func.eval(datums, expr1, expr2),
            ScalarExpr::If { cond, then, els } => {
                if func::is_true(&cond.eval(datums)?) {
                    then.eval(datums)
                } else {
                    els.eval(datums)
                }
            }
        }
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScalarExpr::Column(i) => write!(f, "#{}", i),
            ScalarExpr::Literal(Ok(datum), _) => write!(f, "{}", datum),
            ScalarExpr::Literal(Err(e), _) => write!(f, "error({:?})", e.to_string()),
            ScalarExpr::CallUnary { func, expr } => func.fmt_call(f, expr),
            ScalarExpr::CallBinary { func, expr1, expr2 } => {
                write!(f, "({} {} {})", expr1, func, expr2)
            }
            ScalarExpr::If { cond, then, els } => write!(f, "if({}, {}, {})", cond, then, els),
        }
    }
}

#[derive(
    Ord, PartialOrd, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash, thiserror::Error,
)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("numeric field overflow")]
    NumericFieldOverflow,
    #[error("integer out of range")]
    IntegerOutOfRange,
    #[error("truncated incorrect numeric value: '{0}'")]
    Truncated(String),
    #[error("result of group_concat() was cut to {max_len} bytes")]
    GroupConcatTruncated { max_len: usize },
    #[error("cannot compare {left} with {right}")]
    IncomparableTypes { left: ScalarType, right: ScalarType },
    #[error("{func} expects {expected} arguments, got {got}")]
    WrongArgumentCount {
        func: String,
        expected: String,
        got: usize,
    },
    #[error("partial result for {func} has {got} columns, expected {expected}")]
    WrongPartialArity {
        func: String,
        expected: usize,
        got: usize,
    },
    #[error("{0}(DISTINCT ...) cannot be split into partial and final phases")]
    DistinctInMergeMode(String),
    #[error("{func} is planned in {got} mode, but the aggregation runs in {expected} mode")]
    ModeMismatch {
        func: String,
        expected: AggMode,
        got: AggMode,
    },
    #[error("argument of {func}: {source}")]
    Argument {
        func: String,
        source: Box<EvalError>,
    },
    #[error("column #{index} out of bounds for a row of {arity} columns")]
    ColumnOutOfBounds { index: usize, arity: usize },
}
