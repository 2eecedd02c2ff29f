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

use crate::ScalarType;

/// The type of a [`Datum`](crate::Datum).
///
/// [`ColumnType`] bundles information about the scalar type of a datum (e.g.,
/// Int64 or String) with additional attributes, like its nullability and the
/// display metadata a client needs to render it.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Hash)]
pub struct ColumnType {
    /// The underlying scalar type (e.g., Int64 or String) of this column.
    pub scalar_type: ScalarType,
    /// Whether this datum can be null.
    pub nullable: bool,
    /// The maximum number of characters needed to display a value, if known.
    pub display_width: Option<u32>,
    /// Whether values use the binary collation and character set.
    pub binary: bool,
}

impl ColumnType {
    /// Constructs a new non-nullable `ColumnType` with the specified
    /// [`ScalarType`] as its underlying type. If desired, the other
    /// properties can be set with the builder methods of the same name.
    pub fn new(scalar_type: ScalarType) -> Self {
        ColumnType {
            nullable: matches!(scalar_type, ScalarType::Null),
            scalar_type,
            display_width: None,
            binary: false,
        }
    }

    /// Consumes this `ColumnType` and returns a new `ColumnType` with its
    /// nullability set to the specified boolean.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Consumes this `ColumnType` and returns a new `ColumnType` with the
    /// given display width.
    pub fn display_width(mut self, width: u32) -> Self {
        self.display_width = Some(width);
        self
    }

    /// Consumes this `ColumnType` and returns a new `ColumnType` that uses
    /// the binary collation.
    pub fn binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    /// Reports whether the column holds unsigned values.
    pub fn is_unsigned(&self) -> bool {
        self.scalar_type.is_unsigned()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.scalar_type)?;
        if let Some(width) = self.display_width {
            write!(f, "({})", width)?;
        }
        if self.binary {
            f.write_str(" binary")?;
        }
        if !self.nullable {
            f.write_str(" not null")?;
        }
        Ok(())
    }
}

/// The type for a relation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct RelationType {
    /// The type for each column, in order.
    pub column_types: Vec<ColumnType>,
}

impl RelationType {
    /// Creates a relation type representing the relation with no columns.
    pub fn empty() -> Self {
        RelationType::new(vec![])
    }

    /// Creates a new instance from specified column types.
    pub fn new(column_types: Vec<ColumnType>) -> Self {
        RelationType { column_types }
    }

    /// The number of columns.
    pub fn arity(&self) -> usize {
        self.column_types.len()
    }

    /// Appends a column of the given type.
    pub fn with_column(mut self, column_type: ColumnType) -> Self {
        self.column_types.push(column_type);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let typ = ColumnType::new(ScalarType::UInt64)
            .display_width(21)
            .binary(true);
        assert_eq!(typ.to_string(), "bigint unsigned(21) binary not null");
        assert!(typ.is_unsigned());
        assert_eq!(
            ColumnType::new(ScalarType::String).nullable(true).to_string(),
            "varchar"
        );
    }

    #[test]
    fn null_type_is_nullable() {
        assert!(ColumnType::new(ScalarType::Null).nullable);
        assert!(!ColumnType::new(ScalarType::Int64).nullable);
    }
}
