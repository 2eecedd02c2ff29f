// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use tally_repr::{Datum, Row};

/// The running state of one aggregate function over one group.
///
/// Which fields are meaningful depends on the function's kind. Contexts are
/// owned by exactly one group and are never shared between workers; partial
/// state travels between workers as rows instead.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggEvalContext {
    /// The running accumulator: the sum for `SUM` and `AVG`, the bits for
    /// the bitwise kinds, the current extreme for `MAX` and `MIN`, and the
    /// kept value for `FIRST_ROW`.
    pub value: Datum,
    /// Rows counted so far, for `COUNT` and `AVG`.
    pub count: i64,
    /// The concatenation so far, for `GROUP_CONCAT`. `None` until the first
    /// non-null row.
    pub buffer: Option<String>,
    /// Whether `buffer` has been cut at the length limit.
    pub truncated: bool,
    /// Whether `FIRST_ROW` has seen its row.
    pub got_first_row: bool,
    /// The argument tuples seen so far, for `DISTINCT` aggregates.
    pub distinct: Option<DistinctChecker>,
}

/// Remembers which argument tuples a `DISTINCT` aggregate has already seen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DistinctChecker {
    seen: BTreeSet<Row>,
}

impl DistinctChecker {
    /// Records `values` and reports whether they were new.
    pub fn insert(&mut self, values: &[Datum]) -> bool {
        if self.seen.contains(values) {
            return false;
        }
        self.seen.insert(Row::pack_slice(values))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
