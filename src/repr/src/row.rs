// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::borrow::Borrow;
use std::fmt;
use std::mem;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use tally_ore::str::separated;

use crate::Datum;

/// An ordered sequence of [`Datum`]s.
///
/// Rows dereference to `[Datum]`, so they can be indexed and sliced directly.
/// They are orderable and hashable, which lets them key the group map of an
/// aggregation.
#[derive(Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Row {
    datums: Vec<Datum>,
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Row{{{}}}", separated(", ", self.datums.iter()))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({})", separated(", ", self.datums.iter()))
    }
}

impl Row {
    /// Packs the datums yielded by `iter` into a row.
    pub fn pack<I, D>(iter: I) -> Row
    where
        I: IntoIterator<Item = D>,
        D: Into<Datum>,
    {
        Row {
            datums: iter.into_iter().map(Into::into).collect(),
        }
    }

    /// Packs a slice of datums into a row.
    pub fn pack_slice(datums: &[Datum]) -> Row {
        Row {
            datums: datums.to_vec(),
        }
    }

    /// Returns a row of `arity` nulls.
    pub fn nulls(arity: usize) -> Row {
        Row {
            datums: vec![Datum::Null; arity],
        }
    }

    /// Returns the first datum of the row.
    ///
    /// # Panics
    ///
    /// Panics if the row is empty.
    pub fn unpack_first(&self) -> &Datum {
        &self.datums[0]
    }

    /// Consumes the row, returning its datums.
    pub fn into_datums(self) -> Vec<Datum> {
        self.datums
    }
}

impl Deref for Row {
    type Target = [Datum];

    fn deref(&self) -> &[Datum] {
        &self.datums
    }
}

// Rows order and hash exactly like their datum slices, which lets a set of
// rows be probed with a borrowed slice.
impl Borrow<[Datum]> for Row {
    fn borrow(&self) -> &[Datum] {
        &self.datums
    }
}

impl AsRef<[Datum]> for Row {
    fn as_ref(&self) -> &[Datum] {
        &self.datums
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Datum;
    type IntoIter = std::slice::Iter<'a, Datum>;

    fn into_iter(self) -> Self::IntoIter {
        self.datums.iter()
    }
}

impl From<Vec<Datum>> for Row {
    fn from(datums: Vec<Datum>) -> Row {
        Row { datums }
    }
}

/// Incrementally builds [`Row`]s, reusing one allocation for the datums in
/// flight.
#[derive(Debug, Default)]
pub struct RowPacker {
    datums: Vec<Datum>,
}

impl RowPacker {
    /// Constructs a new, empty packer.
    pub fn new() -> Self {
        RowPacker::default()
    }

    /// Appends a datum to the row under construction.
    pub fn push(&mut self, datum: Datum) {
        self.datums.push(datum);
    }

    /// Appends each datum yielded by `iter` to the row under construction.
    pub fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = Datum>,
    {
        self.datums.extend(iter);
    }

    /// Finishes the row under construction and leaves the packer empty and
    /// ready for the next row.
    pub fn finish_and_reuse(&mut self) -> Row {
        let capacity = self.datums.len();
        let datums = mem::replace(&mut self.datums, Vec::with_capacity(capacity));
        Row { datums }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packer_reuse() {
        let mut packer = RowPacker::new();
        packer.push(Datum::Int64(1));
        packer.extend([Datum::Null, Datum::from("a")]);
        let first = packer.finish_and_reuse();
        assert_eq!(first.len(), 3);
        assert_eq!(first.to_string(), "(1, null, \"a\")");

        packer.push(Datum::UInt64(2));
        let second = packer.finish_and_reuse();
        assert_eq!(&*second, &[Datum::UInt64(2)]);
        assert_eq!(second.unpack_first(), &Datum::UInt64(2));
    }

    #[test]
    fn nulls() {
        let row = Row::nulls(2);
        assert!(row.iter().all(Datum::is_null));
        assert_eq!(Row::nulls(0), Row::default());
    }
}
