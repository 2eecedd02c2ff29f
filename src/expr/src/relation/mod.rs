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
use tally_ore::str::separated;
use tally_repr::{ColumnType, RelationType};

use crate::ScalarExpr;

use self::func::AggregateFunc;

pub mod func;

/// Describes an aggregation expression.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Hash)]
pub struct AggregateExpr {
    /// Names the aggregation function.
    pub func: AggregateFunc,
    /// An expression which extracts from each row the input to `func`.
    pub args: Vec<ScalarExpr>,
    /// Should the aggregation be applied only to distinct results in each
    /// group.
    pub distinct: bool,
}

impl AggregateExpr {
    pub fn new(func: AggregateFunc, args: Vec<ScalarExpr>) -> Self {
        AggregateExpr {
            func,
            args,
            distinct: false,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Computes the type of this `AggregateExpr`.
    pub fn typ(&self, relation_type: &RelationType) -> ColumnType {
        let arg_types: Vec<_> = self.args.iter().map(|e| e.typ(relation_type)).collect();
        self.func.output_type(&arg_types)
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.func)?;
        if self.distinct {
            f.write_str("distinct ")?;
        }
        if self.args.is_empty() && self.func == AggregateFunc::Count {
            f.write_str("*")?;
        } else {
            write!(f, "{}", separated(", ", &self.args))?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use tally_repr::{Datum, ScalarType};

    use super::*;

    #[test]
    fn display() {
        let count = AggregateExpr::new(AggregateFunc::Count, vec![]);
        assert_eq!(count.to_string(), "count(*)");
        let concat = AggregateExpr::new(
            AggregateFunc::group_concat("-", 1024),
            vec![
                ScalarExpr::column(0),
                ScalarExpr::literal_ok(Datum::from("x"), ColumnType::new(ScalarType::String)),
            ],
        )
        .distinct();
        assert_eq!(concat.to_string(), "group_concat(distinct #0, \"x\")");
    }
}
