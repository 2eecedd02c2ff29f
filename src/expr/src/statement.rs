// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-statement evaluation policy and warnings.

use std::sync::Mutex;

use tally_dyncfg::ConfigSet;
use tally_repr::{Conversion, NumericIssue};
use tracing::warn;

use crate::dyncfgs::{SQL_OVERFLOW_AS_WARNING, SQL_TRUNCATE_AS_WARNING};
use crate::EvalError;

/// The state one statement's evaluation shares across all of its workers.
///
/// The policy flags are fixed when the statement starts. Warnings are
/// append-only; the order in which concurrent workers record them is not
/// specified.
#[derive(Debug, Default)]
pub struct StatementContext {
    /// Record numeric overflow as a warning and saturate, instead of failing.
    pub overflow_as_warning: bool,
    /// Record non-numeric strings as a warning and use their numeric prefix,
    /// instead of failing.
    pub truncate_as_warning: bool,
    warnings: Mutex<Vec<EvalError>>,
}

impl StatementContext {
    /// A context that turns every overflow and truncation into an error.
    pub fn strict() -> Self {
        StatementContext::default()
    }

    /// A context that records every overflow and truncation as a warning.
    pub fn lenient() -> Self {
        StatementContext {
            overflow_as_warning: true,
            truncate_as_warning: true,
            warnings: Mutex::default(),
        }
    }

    /// Builds a context from the current values of the evaluation configs.
    pub fn from_config(configs: &ConfigSet) -> Self {
        StatementContext {
            overflow_as_warning: SQL_OVERFLOW_AS_WARNING.get(configs),
            truncate_as_warning: SQL_TRUNCATE_AS_WARNING.get(configs),
            warnings: Mutex::default(),
        }
    }

    pub fn append_warning(&self, warning: EvalError) {
        warn!(%warning, "recorded evaluation warning");
        self.warnings
            .lock()
            .expect("lock poisoned")
            .push(warning);
    }

    /// A snapshot of the warnings recorded so far.
    pub fn warnings(&self) -> Vec<EvalError> {
        self.warnings.lock().expect("lock poisoned").clone()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.lock().expect("lock poisoned").len()
    }

    /// Applies the statement's policy to a detected overflow: either records
    /// `err` as a warning, letting the caller saturate, or returns it.
    pub fn handle_overflow(&self, err: EvalError) -> Result<(), EvalError> {
        if self.overflow_as_warning {
            self.append_warning(err);
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Applies the statement's policy to a lenient numeric conversion.
    pub fn convert<T>(&self, conversion: Conversion<T>) -> Result<T, EvalError> {
        match conversion.issue {
            None => {}
            Some(NumericIssue::Overflow) => self.handle_overflow(EvalError::NumericFieldOverflow)?,
            Some(NumericIssue::Truncated(s)) => {
                let err = EvalError::Truncated(s);
                if self.truncate_as_warning {
                    self.append_warning(err);
                } else {
                    return Err(err);
                }
            }
        }
        Ok(conversion.value)
    }
}
