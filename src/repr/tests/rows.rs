// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::cmp::Ordering;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use tally_repr::adt::decimal::Decimal;
use tally_repr::{Datum, Row};

/// A type similar to [`Datum`] that can be proptest-generated.
#[derive(Debug, PartialEq, Clone, Arbitrary)]
enum PropertizedDatum {
    Null,
    Int64(i64),
    UInt64(u64),
    Float64(#[proptest(strategy = "-1e12f64..1e12")] f64),
    Decimal(
        #[proptest(strategy = "-1_000_000_000i64..1_000_000_000")] i64,
        #[proptest(strategy = "0u8..6")] u8,
    ),
    String(String),
}

impl From<&PropertizedDatum> for Datum {
    fn from(pd: &PropertizedDatum) -> Datum {
        match pd {
            PropertizedDatum::Null => Datum::Null,
            PropertizedDatum::Int64(i) => Datum::from(*i),
            PropertizedDatum::UInt64(u) => Datum::from(*u),
            PropertizedDatum::Float64(f) => Datum::from(*f),
            PropertizedDatum::Decimal(significand, scale) => Datum::from(
                Decimal::new(i128::from(*significand), *scale).expect("in range"),
            ),
            PropertizedDatum::String(s) => Datum::from(s.as_str()),
        }
    }
}

fn numeric() -> impl Strategy<Value = Datum> {
    prop_oneof![
        any::<i64>().prop_map(Datum::from),
        any::<u64>().prop_map(Datum::from),
        (-1_000_000i64..1_000_000, 0u8..4).prop_map(|(s, scale)| {
            Datum::from(Decimal::new(i128::from(s), scale).expect("in range"))
        }),
    ]
}

proptest! {
    #[test]
    fn row_ordering_is_lexicographic(
        a in prop::collection::vec(any::<PropertizedDatum>(), 0..8),
        b in prop::collection::vec(any::<PropertizedDatum>(), 0..8),
    ) {
        let a: Vec<Datum> = a.iter().map(Datum::from).collect();
        let b: Vec<Datum> = b.iter().map(Datum::from).collect();
        let expected = a.cmp(&b);
        prop_assert_eq!(Row::pack(a).cmp(&Row::pack(b)), expected);
    }

    #[test]
    fn rows_survive_serialization(datums in prop::collection::vec(any::<PropertizedDatum>(), 0..16)) {
        let row = Row::pack(datums.iter().map(Datum::from));
        let encoded = serde_json::to_string(&row).unwrap();
        let decoded: Row = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(decoded, row);
    }

    #[test]
    fn exact_numeric_comparison_is_antisymmetric(a in numeric(), b in numeric()) {
        let ab = a.sql_cmp(&b).unwrap();
        let ba = b.sql_cmp(&a).unwrap();
        prop_assert_eq!(ab, ba.reverse());
        if ab == Ordering::Equal {
            prop_assert_eq!(a.to_decimal().value.cmp_value(&b.to_decimal().value), Ordering::Equal);
        }
    }
}
