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

/// Where an aggregate function sits in a (possibly split) aggregation.
///
/// A single-node aggregation runs in `Complete` mode. A distributed one runs
/// `Partial1` on each shard and `Final` over the shards' partial results,
/// optionally with `Partial2` stages in between.
///
/// | mode       | consumes     | produces      |
/// |------------|--------------|---------------|
/// | `Complete` | raw rows     | final result  |
/// | `Partial1` | raw rows     | partial state |
/// | `Partial2` | partial rows | partial state |
/// | `Final`    | partial rows | final result  |
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AggMode {
    Complete,
    Partial1,
    Partial2,
    Final,
}

impl AggMode {
    /// Reports whether input rows are raw rows that the argument expressions
    /// are evaluated against, as opposed to partial results.
    pub fn consumes_raw_rows(&self) -> bool {
        matches!(self, AggMode::Complete | AggMode::Partial1)
    }

    /// Reports whether the output is partial state for a later merge, as
    /// opposed to the final result.
    pub fn produces_partial(&self) -> bool {
        matches!(self, AggMode::Partial1 | AggMode::Partial2)
    }
}

impl fmt::Display for AggMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            AggMode::Complete => "complete",
            AggMode::Partial1 => "partial1",
            AggMode::Partial2 => "partial2",
            AggMode::Final => "final",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol() {
        assert!(AggMode::Complete.consumes_raw_rows() && !AggMode::Complete.produces_partial());
        assert!(AggMode::Partial1.consumes_raw_rows() && AggMode::Partial1.produces_partial());
        assert!(!AggMode::Partial2.consumes_raw_rows() && AggMode::Partial2.produces_partial());
        assert!(!AggMode::Final.consumes_raw_rows() && !AggMode::Final.produces_partial());
        assert_eq!(AggMode::Partial2.to_string(), "partial2");
        assert_eq!(serde_json::to_string(&AggMode::Final).unwrap(), "\"final\"");
    }
}
