// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Grouped aggregation over rows, in one phase or split across shards.

use std::collections::BTreeMap;
use std::sync::Arc;

use itertools::Itertools;
use rayon::prelude::*;
use tally_dyncfg::ConfigSet;
use tally_repr::{Datum, RelationType, Row, RowPacker};
use tracing::{debug, warn};

use crate::aggregate::{AggEvalContext, AggMode, AggregateFunction};
use crate::dyncfgs::AGGREGATE_PARALLELISM;
use crate::{AggregateExpr, EvalError, ScalarExpr, StatementContext};

/// Groups rows by a key and folds each group through a list of aggregate
/// functions that share one mode.
///
/// In the raw modes the key is evaluated from each input row. In the merge
/// modes each input row is `[key..., partial slices...]`, as produced by a
/// partial-mode `GroupedAggregator`, and the key is its first
/// `group_key.len()` columns.
#[derive(Debug)]
pub struct GroupedAggregator {
    group_key: Vec<ScalarExpr>,
    aggregates: Vec<AggregateFunction>,
    mode: AggMode,
    sc: Arc<StatementContext>,
    groups: BTreeMap<Row, Vec<AggEvalContext>>,
}

impl GroupedAggregator {
    pub fn new(
        group_key: Vec<ScalarExpr>,
        aggregates: Vec<AggregateFunction>,
        mode: AggMode,
        sc: Arc<StatementContext>,
    ) -> Result<Self, EvalError> {
        if let Some(f) = aggregates.iter().find(|f| f.mode() != mode) {
            return Err(EvalError::ModeMismatch {
                func: f.func().name().to_owned(),
                expected: mode,
                got: f.mode(),
            });
        }
        Ok(GroupedAggregator {
            group_key,
            aggregates,
            mode,
            sc,
            groups: BTreeMap::new(),
        })
    }

    /// The width of a merge-mode input row.
    fn merge_arity(&self) -> usize {
        self.group_key.len()
            + self
                .aggregates
                .iter()
                .map(AggregateFunction::partial_arity)
                .sum::<usize>()
    }

    pub fn push(&mut self, row: &[Datum]) -> Result<(), EvalError> {
        let key = if self.mode.consumes_raw_rows() {
            let mut packer = RowPacker::new();
            for expr in &self.group_key {
                packer.push(expr.eval(row)?);
            }
            packer.finish_and_reuse()
        } else {
            let expected = self.merge_arity();
            if row.len() != expected {
                return Err(EvalError::WrongPartialArity {
                    func: "grouped aggregate".into(),
                    expected,
                    got: row.len(),
                });
            }
            Row::pack_slice(&row[..self.group_key.len()])
        };

        let aggregates = &self.aggregates;
        let contexts = self
            .groups
            .entry(key)
            .or_insert_with(|| aggregates.iter().map(|f| f.create_context()).collect());

        if self.mode.consumes_raw_rows() {
            for (f, ctx) in aggregates.iter().zip_eq(contexts.iter_mut()) {
                f.update_raw(ctx, &self.sc, row)?;
            }
        } else {
            let mut offset = self.group_key.len();
            for (f, ctx) in aggregates.iter().zip_eq(contexts.iter_mut()) {
                let end = offset + f.partial_arity();
                f.merge(ctx, &self.sc, &row[offset..end])?;
                offset = end;
            }
        }
        Ok(())
    }

    pub fn extend<I>(&mut self, rows: I) -> Result<(), EvalError>
    where
        I: IntoIterator,
        I::Item: AsRef<[Datum]>,
    {
        for row in rows {
            self.push(row.as_ref())?;
        }
        Ok(())
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Emits one row per group, in key order: the key columns followed by
    /// each function's final result, or its partial result in the partial
    /// modes.
    ///
    /// A scalar aggregation (one without a key) that saw no rows still
    /// produces one row of default values in the final modes.
    #[tracing::instrument(level = "debug", skip_all, fields(mode = %self.mode))]
    pub fn finish(self) -> Result<Vec<Row>, EvalError> {
        debug!(groups = self.groups.len(), "finishing aggregation");
        if self.group_key.is_empty() && self.groups.is_empty() && !self.mode.produces_partial() {
            return Ok(vec![Row::pack(
                self.aggregates.iter().map(AggregateFunction::default_value),
            )]);
        }
        let mut packer = RowPacker::new();
        let mut rows = Vec::with_capacity(self.groups.len());
        for (key, contexts) in self.groups {
            packer.extend(key.into_datums());
            for (f, ctx) in self.aggregates.iter().zip_eq(&contexts) {
                if self.mode.produces_partial() {
                    packer.extend(f.get_partial_result(ctx));
                } else {
                    packer.push(f.get_result(ctx, &self.sc)?);
                }
            }
            rows.push(packer.finish_and_reuse());
        }
        Ok(rows)
    }
}

/// Aggregates rows spread over several shards in two phases: each shard is
/// pre-aggregated in [`AggMode::Partial1`] in parallel, then the partial
/// rows are merged in [`AggMode::Final`].
///
/// The result equals a [`AggMode::Complete`] aggregation over all shards'
/// rows, in shard order. `parallelism` bounds the number of threads used for
/// the partial phase; 0 uses rayon's global pool.
#[tracing::instrument(level = "debug", skip_all, fields(shards = shards.len()))]
pub fn two_phase(
    group_key: &[ScalarExpr],
    aggregates: &[AggregateExpr],
    input_type: &RelationType,
    shards: &[Vec<Row>],
    sc: &Arc<StatementContext>,
    parallelism: usize,
) -> Result<Vec<Row>, EvalError> {
    let partial_funcs = aggregates
        .iter()
        .map(|expr| AggregateFunction::new(expr.clone(), AggMode::Partial1, input_type))
        .collect::<Result<Vec<_>, _>>()?;
    let final_funcs = partial_funcs
        .iter()
        .map(|f| f.with_mode(AggMode::Final))
        .collect::<Result<Vec<_>, _>>()?;

    let partials = in_pool(parallelism, || {
        shards
            .par_iter()
            .map(|shard| {
                let mut agg = GroupedAggregator::new(
                    group_key.to_vec(),
                    partial_funcs.clone(),
                    AggMode::Partial1,
                    Arc::clone(sc),
                )?;
                agg.extend(shard)?;
                agg.finish()
            })
            .collect::<Result<Vec<_>, EvalError>>()
    })?;

    let key_columns = (0..group_key.len()).collect_vec();
    let mut agg = GroupedAggregator::new(
        ScalarExpr::columns(&key_columns),
        final_funcs,
        AggMode::Final,
        Arc::clone(sc),
    )?;
    agg.extend(partials.iter().flatten())?;
    agg.finish()
}

/// Like [`two_phase`], with the partial phase's parallelism read from
/// [`AGGREGATE_PARALLELISM`].
pub fn two_phase_from_config(
    group_key: &[ScalarExpr],
    aggregates: &[AggregateExpr],
    input_type: &RelationType,
    shards: &[Vec<Row>],
    sc: &Arc<StatementContext>,
    configs: &ConfigSet,
) -> Result<Vec<Row>, EvalError> {
    let parallelism = AGGREGATE_PARALLELISM.get(configs);
    two_phase(group_key, aggregates, input_type, shards, sc, parallelism)
}

fn in_pool<F, R>(parallelism: usize, f: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    if parallelism == 0 {
        return f();
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism)
        .build()
    {
        Ok(pool) => pool.install(f),
        Err(e) => {
            warn!(parallelism, "falling back to the global thread pool: {e}");
            f()
        }
    }
}

#[cfg(test)]
mod tests {
    use tally_repr::{ColumnType, ScalarType};

    use crate::relation::func::AggregateFunc;

    use super::*;

    fn input() -> RelationType {
        RelationType::new(vec![
            ColumnType::new(ScalarType::Int64),
            ColumnType::new(ScalarType::UInt64).nullable(true),
        ])
    }

    fn exprs() -> Vec<AggregateExpr> {
        vec![
            AggregateExpr::new(AggregateFunc::BitAnd, vec![ScalarExpr::column(1)]),
            AggregateExpr::new(AggregateFunc::Count, vec![]),
            AggregateExpr::new(AggregateFunc::Avg, vec![ScalarExpr::column(1)]),
        ]
    }

    fn funcs(mode: AggMode) -> Vec<AggregateFunction> {
        exprs()
            .into_iter()
            .map(|e| AggregateFunction::new(e, mode, &input()).unwrap())
            .collect()
    }

    fn row(k: i64, v: Option<u64>) -> Row {
        Row::pack([Datum::Int64(k), Datum::from(v)])
    }

    #[test]
    fn groups_in_key_order() {
        let sc = Arc::new(StatementContext::strict());
        let mut agg = GroupedAggregator::new(
            vec![ScalarExpr::column(0)],
            funcs(AggMode::Complete),
            AggMode::Complete,
            sc,
        )
        .unwrap();
        agg.extend([row(2, Some(6)), row(1, Some(3)), row(2, None), row(2, Some(12))])
            .unwrap();
        assert_eq!(agg.group_count(), 2);
        let rows = agg.finish().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][..3], &[Datum::Int64(1), Datum::UInt64(3), Datum::Int64(1)]);
        assert_eq!(&rows[1][..3], &[Datum::Int64(2), Datum::UInt64(4), Datum::Int64(3)]);
        assert_eq!(rows[1][3].to_text().unwrap(), "9.0000");
    }

    #[test]
    fn scalar_aggregation_defaults() {
        let sc = Arc::new(StatementContext::strict());
        let agg =
            GroupedAggregator::new(vec![], funcs(AggMode::Final), AggMode::Final, Arc::clone(&sc))
                .unwrap();
        assert_eq!(
            agg.finish().unwrap(),
            vec![Row::pack([Datum::UInt64(u64::MAX), Datum::Int64(0), Datum::Null])]
        );

        let agg = GroupedAggregator::new(vec![], funcs(AggMode::Partial1), AggMode::Partial1, sc)
            .unwrap();
        assert!(agg.finish().unwrap().is_empty());
    }

    #[test]
    fn partial_rows_carry_key_and_slices() {
        let sc = Arc::new(StatementContext::strict());
        let mut agg = GroupedAggregator::new(
            vec![ScalarExpr::column(0)],
            funcs(AggMode::Partial1),
            AggMode::Partial1,
            Arc::clone(&sc),
        )
        .unwrap();
        agg.push(&row(5, Some(7))).unwrap();
        let rows = agg.finish().unwrap();
        assert_eq!(rows.len(), 1);
        // Key, BIT_AND, COUNT, and AVG's count and sum.
        assert_eq!(rows[0].len(), 5);

        let mut fin = GroupedAggregator::new(
            vec![ScalarExpr::column(0)],
            funcs(AggMode::Final),
            AggMode::Final,
            sc,
        )
        .unwrap();
        assert_eq!(
            fin.push(&rows[0][..4]),
            Err(EvalError::WrongPartialArity {
                func: "grouped aggregate".into(),
                expected: 5,
                got: 4,
            })
        );
        fin.extend(&rows).unwrap();
        let out = fin.finish().unwrap();
        assert_eq!(&out[0][..3], &[Datum::Int64(5), Datum::UInt64(7), Datum::Int64(1)]);
    }

    #[test]
    fn modes_must_agree() {
        let sc = Arc::new(StatementContext::strict());
        let mut mixed = funcs(AggMode::Final);
        mixed.push(
            AggregateFunction::new(exprs().remove(0), AggMode::Partial1, &input()).unwrap(),
        );
        assert_eq!(
            GroupedAggregator::new(vec![], mixed, AggMode::Final, sc).unwrap_err(),
            EvalError::ModeMismatch {
                func: "bit_and".into(),
                expected: AggMode::Final,
                got: AggMode::Partial1,
            }
        );
    }

    #[test]
    fn two_phase_matches_complete() {
        let sc = Arc::new(StatementContext::strict());
        let shards = vec![
            vec![row(1, Some(6)), row(2, Some(1))],
            vec![],
            vec![row(1, None), row(1, Some(12)), row(2, Some(3))],
        ];
        let key = vec![ScalarExpr::column(0)];
        let split = two_phase(&key, &exprs(), &input(), &shards, &sc, 2).unwrap();

        let mut complete =
            GroupedAggregator::new(key, funcs(AggMode::Complete), AggMode::Complete, sc).unwrap();
        complete.extend(shards.iter().flatten()).unwrap();
        assert_eq!(split, complete.finish().unwrap());
    }

    #[test]
    fn two_phase_reads_parallelism_from_config() {
        let configs = crate::all_dyncfgs(ConfigSet::default());
        let mut updates = tally_dyncfg::ConfigUpdates::default();
        updates.add_dynamic(
            AGGREGATE_PARALLELISM.name(),
            tally_dyncfg::ConfigValue::Usize(3),
        );
        updates.apply(&configs);
        assert_eq!(AGGREGATE_PARALLELISM.get(&configs), 3);

        let sc = Arc::new(StatementContext::from_config(&configs));
        let shards = vec![vec![row(1, Some(6))], vec![row(1, Some(3)), row(2, None)]];
        let key = vec![ScalarExpr::column(0)];
        assert_eq!(
            two_phase_from_config(&key, &exprs(), &input(), &shards, &sc, &configs),
            two_phase(&key, &exprs(), &input(), &shards, &sc, 0)
        );
    }

    #[test]
    fn two_phase_scalar_over_no_rows() {
        let sc = Arc::new(StatementContext::strict());
        let rows = two_phase(&[], &exprs(), &input(), &[vec![], vec![]], &sc, 0).unwrap();
        assert_eq!(
            rows,
            vec![Row::pack([Datum::UInt64(u64::MAX), Datum::Int64(0), Datum::Null])]
        );
    }

    #[test]
    fn two_phase_rejects_distinct() {
        let sc = Arc::new(StatementContext::strict());
        let exprs = vec![AggregateExpr::new(AggregateFunc::Count, vec![ScalarExpr::column(1)]).distinct()];
        assert_eq!(
            two_phase(&[], &exprs, &input(), &[], &sc, 0),
            Err(EvalError::DistinctInMergeMode("count".into()))
        );
    }
}
