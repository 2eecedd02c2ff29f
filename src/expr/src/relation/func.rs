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
use tally_dyncfg::ConfigSet;
use tally_repr::adt::decimal::MAX_DECIMAL_SCALE;
use tally_repr::{ColumnType, Datum, ScalarType};

use crate::dyncfgs::GROUP_CONCAT_MAX_LEN;
use crate::scalar::func::DIV_PRECISION_INCREMENT;
use crate::EvalError;

/// The display width MySQL reports for 64-bit integer results.
pub const BIGINT_DISPLAY_WIDTH: u32 = 21;

/// The separator `GROUP_CONCAT` uses when none is given.
pub const DEFAULT_GROUP_CONCAT_SEPARATOR: &str = ",";

/// The kinds of aggregate function.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Hash)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Max,
    Min,
    BitAnd,
    BitOr,
    BitXor,
    /// Concatenates the arguments of each row, and the rows with
    /// `separator`, cutting the result at `max_len` bytes.
    GroupConcat {
        separator: String,
        max_len: usize,
    },
    /// Keeps the value of the first row seen, whether or not it is null.
    FirstRow,
}

impl AggregateFunc {
    /// A `GROUP_CONCAT` with the given separator and length cap.
    pub fn group_concat(separator: impl Into<String>, max_len: usize) -> AggregateFunc {
        AggregateFunc::GroupConcat {
            separator: separator.into(),
            max_len,
        }
    }

    /// A `GROUP_CONCAT` with the default separator, capped at the current
    /// value of [`GROUP_CONCAT_MAX_LEN`].
    pub fn default_group_concat(configs: &ConfigSet) -> AggregateFunc {
        AggregateFunc::group_concat(
            DEFAULT_GROUP_CONCAT_SEPARATOR,
            GROUP_CONCAT_MAX_LEN.get(configs),
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Max => "max",
            AggregateFunc::Min => "min",
            AggregateFunc::BitAnd => "bit_and",
            AggregateFunc::BitOr => "bit_or",
            AggregateFunc::BitXor => "bit_xor",
            AggregateFunc::GroupConcat { .. } => "group_concat",
            AggregateFunc::FirstRow => "firstrow",
        }
    }

    /// Checks that the function can be called with `got` arguments.
    ///
    /// `COUNT` takes any number, zero meaning `COUNT(*)`. `GROUP_CONCAT`
    /// takes at least one. Everything else takes exactly one.
    pub fn check_arity(&self, got: usize) -> Result<(), EvalError> {
        let expected = match self {
            AggregateFunc::Count => return Ok(()),
            AggregateFunc::GroupConcat { .. } if got >= 1 => return Ok(()),
            AggregateFunc::GroupConcat { .. } => "at least 1",
            _ if got == 1 => return Ok(()),
            _ => "1",
        };
        Err(EvalError::WrongArgumentCount {
            func: self.name().to_owned(),
            expected: expected.to_owned(),
            got,
        })
    }

    /// The value of the aggregate over a group with no rows.
    ///
    /// This is also the value a fresh evaluation context starts from, so
    /// combining it with any value leaves that value unchanged.
    pub fn identity(&self) -> Datum {
        match self {
            AggregateFunc::Count => Datum::Int64(0),
            AggregateFunc::BitAnd => Datum::UInt64(u64::MAX),
            AggregateFunc::BitOr | AggregateFunc::BitXor => Datum::UInt64(0),
            AggregateFunc::Sum
            | AggregateFunc::Avg
            | AggregateFunc::Max
            | AggregateFunc::Min
            | AggregateFunc::GroupConcat { .. }
            | AggregateFunc::FirstRow => Datum::Null,
        }
    }

    /// Reports whether rows with a null argument are skipped. Only
    /// `FIRST_ROW` looks at nulls.
    pub fn ignores_nulls(&self) -> bool {
        !matches!(self, AggregateFunc::FirstRow)
    }

    fn sum_type(input_type: &ScalarType) -> ScalarType {
        if input_type.is_exact_numeric() {
            ScalarType::decimal_with_scale(input_type.decimal_scale())
        } else {
            ScalarType::Float64
        }
    }

    /// The type of the final result, given the types of the arguments.
    pub fn output_type(&self, arg_types: &[ColumnType]) -> ColumnType {
        let first = arg_types
            .first()
            .map(|t| t.scalar_type.clone())
            .unwrap_or(ScalarType::Null);
        match self {
            AggregateFunc::Count => ColumnType::new(ScalarType::Int64)
                .display_width(BIGINT_DISPLAY_WIDTH)
                .nullable(false),
            AggregateFunc::Sum => ColumnType::new(Self::sum_type(&first)).nullable(true),
            AggregateFunc::Avg => {
                let scalar_type = if first.is_exact_numeric() {
                    ScalarType::decimal_with_scale(cmp::min(
                        first.decimal_scale() + DIV_PRECISION_INCREMENT,
                        MAX_DECIMAL_SCALE,
                    ))
                } else {
                    ScalarType::Float64
                };
                ColumnType::new(scalar_type).nullable(true)
            }
            AggregateFunc::BitAnd | AggregateFunc::BitOr | AggregateFunc::BitXor => {
                ColumnType::new(ScalarType::UInt64)
                    .display_width(BIGINT_DISPLAY_WIDTH)
                    .binary(true)
                    .nullable(false)
            }
            AggregateFunc::GroupConcat { .. } => ColumnType::new(ScalarType::String).nullable(true),
            AggregateFunc::Max | AggregateFunc::Min | AggregateFunc::FirstRow => arg_types
                .first()
                .cloned()
                .unwrap_or_else(|| ColumnType::new(ScalarType::Null))
                .nullable(true),
        }
    }

    /// The types of the partial result, in the order
    /// [`AggregateFunction::get_partial_result`](crate::AggregateFunction::get_partial_result)
    /// produces them.
    pub fn partial_types(&self, arg_types: &[ColumnType]) -> Vec<ColumnType> {
        match self {
            AggregateFunc::Avg => {
                let first = arg_types
                    .first()
                    .map(|t| t.scalar_type.clone())
                    .unwrap_or(ScalarType::Null);
                vec![
                    AggregateFunc::Count.output_type(&[]),
                    ColumnType::new(Self::sum_type(&first)).nullable(true),
                ]
            }
            _ => vec![self.output_type(arg_types)],
        }
    }

    /// The number of columns in the partial result.
    pub fn partial_arity(&self) -> usize {
        match self {
            AggregateFunc::Avg => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
