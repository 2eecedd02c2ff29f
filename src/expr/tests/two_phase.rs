// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use proptest::prelude::*;
use tally_expr::{
    two_phase, AggMode, AggregateExpr, AggregateFunc, AggregateFunction, GroupedAggregator,
    ScalarExpr, StatementContext,
};
use tally_repr::adt::decimal::Decimal;
use tally_repr::{ColumnType, Datum, RelationType, Row, ScalarType};

/// `[key i64, v i64?, d decimal(38, 2)?, f double?, s varchar?]`
fn input_type() -> RelationType {
    RelationType::new(vec![
        ColumnType::new(ScalarType::Int64),
        ColumnType::new(ScalarType::Int64).nullable(true),
        ColumnType::new(ScalarType::decimal_with_scale(2)).nullable(true),
        ColumnType::new(ScalarType::Float64).nullable(true),
        ColumnType::new(ScalarType::String).nullable(true),
    ])
}

fn aggregates() -> Vec<AggregateExpr> {
    let col = |i| vec![ScalarExpr::column(i)];
    vec![
        AggregateExpr::new(AggregateFunc::Count, vec![]),
        AggregateExpr::new(AggregateFunc::Count, col(1)),
        AggregateExpr::new(AggregateFunc::Sum, col(1)),
        AggregateExpr::new(AggregateFunc::Avg, col(1)),
        AggregateExpr::new(AggregateFunc::BitAnd, col(1)),
        AggregateExpr::new(AggregateFunc::BitOr, col(1)),
        AggregateExpr::new(AggregateFunc::BitXor, col(1)),
        AggregateExpr::new(AggregateFunc::Sum, col(2)),
        AggregateExpr::new(AggregateFunc::Avg, col(2)),
        AggregateExpr::new(AggregateFunc::Max, col(2)),
        AggregateExpr::new(AggregateFunc::Min, col(2)),
        AggregateExpr::new(AggregateFunc::Sum, col(3)),
        AggregateExpr::new(AggregateFunc::Avg, col(3)),
        AggregateExpr::new(AggregateFunc::Max, col(3)),
        AggregateExpr::new(AggregateFunc::Min, col(3)),
        AggregateExpr::new(AggregateFunc::Max, col(4)),
        AggregateExpr::new(AggregateFunc::Min, col(4)),
        AggregateExpr::new(AggregateFunc::group_concat("|", 12), col(4)),
        AggregateExpr::new(
            AggregateFunc::group_concat(",", 1 << 20),
            vec![ScalarExpr::column(4), ScalarExpr::column(1)],
        ),
        AggregateExpr::new(AggregateFunc::FirstRow, col(1)),
        AggregateExpr::new(AggregateFunc::FirstRow, col(4)),
    ]
}

fn planned(mode: AggMode) -> Vec<AggregateFunction> {
    aggregates()
        .into_iter()
        .map(|e| AggregateFunction::new(e, mode, &input_type()).unwrap())
        .collect()
}

fn aggregate<'a>(
    key: Vec<ScalarExpr>,
    mode: AggMode,
    rows: impl IntoIterator<Item = &'a Row>,
) -> Vec<Row> {
    let sc = Arc::new(StatementContext::strict());
    let mut agg = GroupedAggregator::new(key, planned(mode), mode, sc).unwrap();
    agg.extend(rows).unwrap();
    agg.finish().unwrap()
}

/// Pre-aggregates each shard, merges the partial rows of the shards before
/// and after `mid` separately, then finishes the two merged halves.
fn three_stage(key: &[ScalarExpr], shards: &[Vec<Row>], mid: usize) -> Vec<Row> {
    let key_columns: Vec<usize> = (0..key.len()).collect();
    let merge_key = || ScalarExpr::columns(&key_columns);
    let partials: Vec<Vec<Row>> = shards
        .iter()
        .map(|shard| aggregate(key.to_vec(), AggMode::Partial1, shard))
        .collect();
    let (left, right) = partials.split_at(mid);
    let merged: Vec<Vec<Row>> = [left, right]
        .into_iter()
        .map(|half| aggregate(merge_key(), AggMode::Partial2, half.iter().flatten()))
        .collect();
    aggregate(merge_key(), AggMode::Final, merged.iter().flatten())
}

prop_compose! {
    fn arb_row()(
        k in 0i64..3,
        v in prop::option::of(-1000i64..1000),
        d in prop::option::of(-100_000i64..100_000),
        f in prop::option::of(-4000i32..4000),
        s in prop::option::of("[a-c]{0,3}"),
    ) -> Row {
        // Quarter steps keep float sums exact in any order.
        Row::pack([
            Datum::Int64(k),
            Datum::from(v),
            Datum::from(d.map(|d| Decimal::new(i128::from(d), 2).unwrap())),
            Datum::from(f.map(|f| f64::from(f) / 4.0)),
            Datum::from(s),
        ])
    }
}

/// Cuts `rows` into contiguous shards at the given points.
fn shard(rows: &[Row], cuts: &[prop::sample::Index]) -> Vec<Vec<Row>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c.index(rows.len() + 1)).collect();
    points.sort_unstable();
    let mut shards = vec![];
    let mut start = 0;
    for point in points {
        shards.push(rows[start..point].to_vec());
        start = point;
    }
    shards.push(rows[start..].to_vec());
    shards
}

proptest! {
    #[test]
    fn two_phase_equals_complete(
        rows in prop::collection::vec(arb_row(), 0..48),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
        parallelism in 0usize..3,
    ) {
        let shards = shard(&rows, &cuts);
        let sc = Arc::new(StatementContext::strict());
        for key in [vec![], vec![ScalarExpr::column(0)]] {
            let split = two_phase(&key, &aggregates(), &input_type(), &shards, &sc, parallelism)
                .unwrap();
            prop_assert_eq!(split, aggregate(key, AggMode::Complete, &rows));
        }
    }

    #[test]
    fn merging_partials_twice_equals_complete(
        rows in prop::collection::vec(arb_row(), 0..48),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
        mid in any::<prop::sample::Index>(),
    ) {
        let shards = shard(&rows, &cuts);
        let mid = mid.index(shards.len() + 1);
        for key in [vec![], vec![ScalarExpr::column(0)]] {
            prop_assert_eq!(
                three_stage(&key, &shards, mid),
                aggregate(key, AggMode::Complete, &rows)
            );
        }
    }
}
