// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Dynamic configuration for expression evaluation.

use tally_dyncfg::{Config, ConfigSet};

/// Whether numeric overflow during aggregation saturates with a warning
/// instead of failing the statement.
pub const SQL_OVERFLOW_AS_WARNING: Config<bool> = Config::new(
    "sql_overflow_as_warning",
    false,
    "Record numeric overflow as a warning and saturate instead of failing.",
);

/// Whether non-numeric strings fed to numeric aggregates are coerced with a
/// warning instead of failing the statement.
pub const SQL_TRUNCATE_AS_WARNING: Config<bool> = Config::new(
    "sql_truncate_as_warning",
    false,
    "Coerce non-numeric strings to their numeric prefix with a warning instead of failing.",
);

/// The maximum length in bytes of a `GROUP_CONCAT` result.
pub const GROUP_CONCAT_MAX_LEN: Config<usize> = Config::new(
    "group_concat_max_len",
    1024,
    "The maximum length in bytes of a GROUP_CONCAT result.",
);

/// The number of threads two-phase aggregation uses for its partial phase.
pub const AGGREGATE_PARALLELISM: Config<usize> = Config::new(
    "aggregate_parallelism",
    0,
    "Threads for the partial phase of two-phase aggregation; 0 uses the global pool.",
);

/// Adds the full set of all expr `Config`s.
pub fn all_dyncfgs(configs: ConfigSet) -> ConfigSet {
    configs
        .add(&SQL_OVERFLOW_AS_WARNING)
        .add(&SQL_TRUNCATE_AS_WARNING)
        .add(&GROUP_CONCAT_MAX_LEN)
        .add(&AGGREGATE_PARALLELISM)
}
