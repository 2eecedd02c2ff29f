// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository, or online at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tracing utilities.
//!
//! This module contains application tracing utilities built on top of the
//! [`tracing`] library. The key export is the **[`configure`]** function,
//! which configures the `tracing` crate with sensible defaults and should be
//! called once during initialization of every binary or test harness that
//! wants to see log output.

use std::io::{self, IsTerminal};
use std::str::FromStr;

use anyhow::Context;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::format::{format, Writer};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Configures the stderr log.
#[derive(Debug, Clone)]
pub struct StderrLogConfig {
    /// An optional prefix for each stderr log line.
    pub prefix: Option<String>,
    /// A filter which determines which events are emitted to the log.
    pub filter: Targets,
}

impl StderrLogConfig {
    /// Builds a config from a filter directive string like
    /// `"info,tally_expr=debug"`.
    pub fn from_directives(directives: &str) -> Result<Self, anyhow::Error> {
        let filter = Targets::from_str(directives)
            .with_context(|| format!("parsing log filter {:?}", directives))?;
        Ok(StderrLogConfig {
            prefix: None,
            filter,
        })
    }
}

impl Default for StderrLogConfig {
    fn default() -> Self {
        StderrLogConfig {
            prefix: None,
            filter: Targets::new().with_default(Level::INFO),
        }
    }
}

/// Installs a global subscriber that writes events to stderr.
///
/// Returns an error if a global subscriber has already been installed, which
/// commonly happens when several tests in one process call this function.
pub fn configure(config: StderrLogConfig) -> Result<(), anyhow::Error> {
    let stderr_log_layer = fmt::layer()
        .event_format(PrefixFormat {
            inner: format(),
            prefix: config.prefix,
        })
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_filter(config.filter);

    tracing_subscriber::registry()
        .with(stderr_log_layer)
        .try_init()
        .context("installing global tracing subscriber")?;
    Ok(())
}

/// Returns the level of a specific target from a [`Targets`].
pub fn target_level(targets: &Targets, target: &str) -> Level {
    if targets.would_enable(target, &Level::TRACE) {
        Level::TRACE
    } else if targets.would_enable(target, &Level::DEBUG) {
        Level::DEBUG
    } else if targets.would_enable(target, &Level::INFO) {
        Level::INFO
    } else if targets.would_enable(target, &Level::WARN) {
        Level::WARN
    } else {
        Level::ERROR
    }
}

/// A wrapper around a [`FormatEvent`] that adds an optional prefix to each
/// event.
#[derive(Debug)]
pub struct PrefixFormat<F> {
    inner: F,
    prefix: Option<String>,
}

impl<F, C, N> FormatEvent<C, N> for PrefixFormat<F>
where
    C: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<C, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, C, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(writer, "{}: ", prefix)?;
        }
        self.inner.format_event(ctx, writer, event)
    }
}
