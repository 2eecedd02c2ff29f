// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Fundamental data representation.
//!
//! This module contains the types for representing data in tally that do not
//! depend on any other tally crates: the [`Datum`] scalar, the [`Row`] that
//! bundles datums together, and the types that describe them.

#![warn(missing_debug_implementations)]

mod relation;
mod row;
mod scalar;

pub mod adt;
pub mod strconv;

pub use relation::{ColumnType, RelationType};
pub use row::{Row, RowPacker};
pub use scalar::{Conversion, Datum, NumericIssue, ScalarType};
