// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::cmp::Ordering;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tally_ore::cast::{CastLossy, ReinterpretCast};

use crate::adt::decimal::{Decimal, MAX_DECIMAL_PRECISION, MAX_DECIMAL_SCALE};
use crate::strconv::{self, ParsedNumber};
use crate::ColumnType;

/// A literal value.
///
/// Datums are always constant and owned. The derived `Ord` is structural and
/// is suitable for keying maps and sets; SQL comparison semantics, which
/// compare numbers across variants, are provided by [`Datum::sql_cmp`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datum {
    /// An unknown value.
    #[default]
    Null,
    /// A 64-bit signed integer.
    Int64(i64),
    /// A 64-bit unsigned integer.
    UInt64(u64),
    /// A 64-bit floating point number.
    Float64(OrderedFloat<f64>),
    /// An exact decimal number.
    Decimal(Decimal),
    /// A sequence of Unicode codepoints encoded as UTF-8.
    String(String),
}

/// Something that went wrong while converting a [`Datum`] to a number.
///
/// These are not errors by themselves: whether they abort the statement or
/// merely produce a warning is up to the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NumericIssue {
    /// The value did not fit and was clamped to the nearest bound.
    Overflow,
    /// The named string was not entirely numeric; only its prefix was used.
    Truncated(String),
}

/// The result of a lenient numeric conversion: a usable value, plus the issue
/// encountered along the way, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversion<T> {
    /// The converted, possibly clamped, value.
    pub value: T,
    /// What went wrong, if anything.
    pub issue: Option<NumericIssue>,
}

impl<T> Conversion<T> {
    fn exact(value: T) -> Self {
        Conversion { value, issue: None }
    }

    fn with_issue(value: T, issue: NumericIssue) -> Self {
        Conversion {
            value,
            issue: Some(issue),
        }
    }

    /// Maps the value while keeping the issue.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Conversion<U> {
        Conversion {
            value: f(self.value),
            issue: self.issue,
        }
    }
}

/// Rounds a float to an integer and returns its `u64` bit pattern, clamping
/// values outside the range of `i64`/`u64`.
#[allow(clippy::as_conversions)]
fn f64_to_u64_bits(f: f64) -> Conversion<u64> {
    let rounded = f.round();
    if rounded.is_nan() {
        return Conversion::with_issue(0, NumericIssue::Overflow);
    }
    if rounded >= 0.0 {
        // `u64::MAX as f64` rounds up to 2^64, hence the strict comparison.
        if rounded >= f64::cast_lossy(u64::MAX) {
            Conversion::with_issue(u64::MAX, NumericIssue::Overflow)
        } else {
            Conversion::exact(rounded as u64)
        }
    } else if rounded < f64::cast_lossy(i64::MIN) {
        Conversion::with_issue(u64::reinterpret_cast(i64::MIN), NumericIssue::Overflow)
    } else {
        Conversion::exact(u64::reinterpret_cast(rounded as i64))
    }
}

/// Returns the `u64` bit pattern of an integer, clamping values outside the
/// range of `i64`/`u64`.
fn i128_to_u64_bits(i: i128) -> Conversion<u64> {
    if let Ok(u) = u64::try_from(i) {
        Conversion::exact(u)
    } else if let Ok(s) = i64::try_from(i) {
        Conversion::exact(u64::reinterpret_cast(s))
    } else if i > 0 {
        Conversion::with_issue(u64::MAX, NumericIssue::Overflow)
    } else {
        Conversion::with_issue(u64::reinterpret_cast(i64::MIN), NumericIssue::Overflow)
    }
}

impl Datum {
    /// Reports whether this datum is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Unwraps the `i64` value within this datum.
    ///
    /// # Panics
    ///
    /// Panics if the datum is not [`Datum::Int64`].
    pub fn unwrap_int64(&self) -> i64 {
        match self {
            Datum::Int64(i) => *i,
            _ => panic!("Datum::unwrap_int64 called on {:?}", self),
        }
    }

    /// Unwraps the `u64` value within this datum.
    ///
    /// # Panics
    ///
    /// Panics if the datum is not [`Datum::UInt64`].
    pub fn unwrap_uint64(&self) -> u64 {
        match self {
            Datum::UInt64(u) => *u,
            _ => panic!("Datum::unwrap_uint64 called on {:?}", self),
        }
    }

    /// Unwraps the `f64` value within this datum.
    ///
    /// # Panics
    ///
    /// Panics if the datum is not [`Datum::Float64`].
    pub fn unwrap_float64(&self) -> f64 {
        match self {
            Datum::Float64(f) => f.into_inner(),
            _ => panic!("Datum::unwrap_float64 called on {:?}", self),
        }
    }

    /// Unwraps the decimal value within this datum.
    ///
    /// # Panics
    ///
    /// Panics if the datum is not [`Datum::Decimal`].
    pub fn unwrap_decimal(&self) -> Decimal {
        match self {
            Datum::Decimal(d) => *d,
            _ => panic!("Datum::unwrap_decimal called on {:?}", self),
        }
    }

    /// Unwraps the string value within this datum.
    ///
    /// # Panics
    ///
    /// Panics if the datum is not [`Datum::String`].
    pub fn unwrap_str(&self) -> &str {
        match self {
            Datum::String(s) => s,
            _ => panic!("Datum::unwrap_str called on {:?}", self),
        }
    }

    /// The fundamental type of this datum. Decimals report their own scale at
    /// the maximum precision.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Datum::Null => ScalarType::Null,
            Datum::Int64(_) => ScalarType::Int64,
            Datum::UInt64(_) => ScalarType::UInt64,
            Datum::Float64(_) => ScalarType::Float64,
            Datum::Decimal(d) => ScalarType::decimal_with_scale(d.scale()),
            Datum::String(_) => ScalarType::String,
        }
    }

    /// Renders this datum the way it appears when converted to a string, or
    /// `None` if it is null. Unlike `Display`, strings are not quoted.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Datum::Null => None,
            Datum::Int64(i) => Some(i.to_string()),
            Datum::UInt64(u) => Some(u.to_string()),
            Datum::Float64(f) => Some(f.to_string()),
            Datum::Decimal(d) => Some(d.to_string()),
            Datum::String(s) => Some(s.clone()),
        }
    }

    /// Reports whether this datum is an integer or an exact decimal.
    pub fn is_exact_numeric(&self) -> bool {
        matches!(self, Datum::Int64(_) | Datum::UInt64(_) | Datum::Decimal(_))
    }

    /// Converts this datum to the 64 bits a bitwise operator works on.
    ///
    /// Signed integers keep their two's complement bit pattern, so `-1`
    /// becomes all ones. Floats and decimals round half away from zero first.
    /// Strings are parsed leniently. Null converts to zero; callers are
    /// expected to have elided it already.
    pub fn to_u64_bits(&self) -> Conversion<u64> {
        match self {
            Datum::Null => Conversion::exact(0),
            Datum::UInt64(u) => Conversion::exact(*u),
            Datum::Int64(i) => Conversion::exact(u64::reinterpret_cast(*i)),
            Datum::Float64(f) => f64_to_u64_bits(f.into_inner()),
            Datum::Decimal(d) => i128_to_u64_bits(d.round_to_i128()),
            Datum::String(s) => {
                let parsed = strconv::parse_number_prefix(s);
                let converted = match parsed.value {
                    ParsedNumber::Integer(i) => i128_to_u64_bits(i),
                    ParsedNumber::Float(f) => f64_to_u64_bits(f),
                };
                if parsed.truncated {
                    Conversion::with_issue(converted.value, NumericIssue::Truncated(s.clone()))
                } else {
                    converted
                }
            }
        }
    }

    /// Converts this datum to a float. Null converts to zero.
    pub fn to_f64(&self) -> Conversion<f64> {
        match self {
            Datum::Null => Conversion::exact(0.0),
            Datum::Int64(i) => Conversion::exact(f64::cast_lossy(*i)),
            Datum::UInt64(u) => Conversion::exact(f64::cast_lossy(*u)),
            Datum::Float64(f) => Conversion::exact(f.into_inner()),
            Datum::Decimal(d) => Conversion::exact(d.to_f64()),
            Datum::String(s) => {
                let parsed = strconv::parse_number_prefix(s);
                let value = match parsed.value {
                    ParsedNumber::Integer(i) => f64::cast_lossy(i),
                    ParsedNumber::Float(f) => f,
                };
                if parsed.truncated {
                    Conversion::with_issue(value, NumericIssue::Truncated(s.clone()))
                } else {
                    Conversion::exact(value)
                }
            }
        }
    }

    /// Converts this datum to an exact decimal. Null converts to zero.
    ///
    /// Floats and strings go through their shortest decimal representation and
    /// are clamped if they exceed [`MAX_DECIMAL_PRECISION`] digits.
    pub fn to_decimal(&self) -> Conversion<Decimal> {
        match self {
            Datum::Null => Conversion::exact(Decimal::zero(0)),
            Datum::Int64(i) => Conversion::exact(Decimal::from(*i)),
            Datum::UInt64(u) => Conversion::exact(Decimal::from(*u)),
            Datum::Decimal(d) => Conversion::exact(*d),
            Datum::Float64(f) => float_to_decimal(f.into_inner()),
            Datum::String(s) => {
                let parsed = strconv::parse_number_prefix(s);
                let converted = match parsed.value {
                    ParsedNumber::Integer(i) => match Decimal::new(i, 0) {
                        Some(d) => Conversion::exact(d),
                        None if i < 0 => {
                            Conversion::with_issue(Decimal::min_value(0), NumericIssue::Overflow)
                        }
                        None => {
                            Conversion::with_issue(Decimal::max_value(0), NumericIssue::Overflow)
                        }
                    },
                    ParsedNumber::Float(f) => float_to_decimal(f),
                };
                if parsed.truncated {
                    Conversion::with_issue(converted.value, NumericIssue::Truncated(s.clone()))
                } else {
                    converted
                }
            }
        }
    }

    /// Compares two datums with SQL semantics.
    ///
    /// Numbers compare by value across the integer, float, and decimal
    /// variants; strings compare bytewise. Null sorts before everything.
    /// Returns `None` if the datums are not comparable, e.g. a string and a
    /// number.
    pub fn sql_cmp(&self, other: &Datum) -> Option<Ordering> {
        match (self, other) {
            (Datum::Null, Datum::Null) => Some(Ordering::Equal),
            (Datum::Null, _) => Some(Ordering::Less),
            (_, Datum::Null) => Some(Ordering::Greater),
            (Datum::Int64(a), Datum::Int64(b)) => Some(a.cmp(b)),
            (Datum::UInt64(a), Datum::UInt64(b)) => Some(a.cmp(b)),
            (Datum::Int64(a), Datum::UInt64(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Datum::UInt64(a), Datum::Int64(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Datum::Float64(a), Datum::Float64(b)) => Some(a.cmp(b)),
            (Datum::Decimal(a), Datum::Decimal(b)) => Some(a.cmp_value(b)),
            (Datum::Decimal(a), Datum::Int64(_) | Datum::UInt64(_)) => {
                Some(a.cmp_value(&other.to_decimal().value))
            }
            (Datum::Int64(_) | Datum::UInt64(_), Datum::Decimal(b)) => {
                Some(self.to_decimal().value.cmp_value(b))
            }
            (Datum::Float64(a), Datum::Int64(_) | Datum::UInt64(_) | Datum::Decimal(_)) => {
                Some(a.cmp(&OrderedFloat(other.to_f64().value)))
            }
            (Datum::Int64(_) | Datum::UInt64(_) | Datum::Decimal(_), Datum::Float64(b)) => {
                Some(OrderedFloat(self.to_f64().value).cmp(b))
            }
            (Datum::String(a), Datum::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Datum::String(_), _) | (_, Datum::String(_)) => None,
        }
    }

    /// Reports whether this datum is an instance of the specified column type.
    pub fn is_instance_of(&self, column_type: &ColumnType) -> bool {
        match (self, &column_type.scalar_type) {
            (Datum::Null, _) => column_type.nullable,
            (Datum::Int64(_), ScalarType::Int64) => true,
            (Datum::UInt64(_), ScalarType::UInt64) => true,
            (Datum::Float64(_), ScalarType::Float64) => true,
            (Datum::Decimal(d), ScalarType::Decimal { scale, .. }) => d.scale() == *scale,
            (Datum::String(_), ScalarType::String) => true,
            _ => false,
        }
    }
}

fn float_to_decimal(f: f64) -> Conversion<Decimal> {
    if !f.is_finite() {
        return Conversion::with_issue(Decimal::zero(0), NumericIssue::Overflow);
    }
    // Digits beyond the maximum scale are noise from the binary
    // representation; drop them before parsing.
    let mut s = f.to_string();
    if let Some((int, frac)) = s.split_once('.') {
        let max_scale = usize::from(MAX_DECIMAL_SCALE);
        if frac.len() > max_scale {
            s = format!("{}.{}", int, &frac[..max_scale]);
        }
    }
    match s.parse::<Decimal>() {
        Ok(d) => Conversion::exact(d),
        // Too many digits: clamp, keeping the sign.
        Err(_) if f < 0.0 => Conversion::with_issue(Decimal::min_value(0), NumericIssue::Overflow),
        Err(_) => Conversion::with_issue(Decimal::max_value(0), NumericIssue::Overflow),
    }
}

impl From<i64> for Datum {
    fn from(i: i64) -> Datum {
        Datum::Int64(i)
    }
}

impl From<u64> for Datum {
    fn from(u: u64) -> Datum {
        Datum::UInt64(u)
    }
}

impl From<f64> for Datum {
    fn from(f: f64) -> Datum {
        Datum::Float64(OrderedFloat(f))
    }
}

impl From<OrderedFloat<f64>> for Datum {
    fn from(f: OrderedFloat<f64>) -> Datum {
        Datum::Float64(f)
    }
}

impl From<Decimal> for Datum {
    fn from(d: Decimal) -> Datum {
        Datum::Decimal(d)
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Datum {
        Datum::String(s)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Datum {
        Datum::String(s.to_owned())
    }
}

impl<T> From<Option<T>> for Datum
where
    Datum: From<T>,
{
    fn from(o: Option<T>) -> Datum {
        match o {
            Some(d) => d.into(),
            None => Datum::Null,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Datum::Null => f.write_str("null"),
            Datum::Int64(num) => write!(f, "{}", num),
            Datum::UInt64(num) => write!(f, "{}", num),
            Datum::Float64(num) => write!(f, "{}", num),
            Datum::Decimal(d) => write!(f, "{}", d),
            Datum::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    if c == '"' {
                        f.write_str("\\\"")?;
                    } else {
                        write!(f, "{}", c)?;
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

/// The fundamental type of a [`Datum`].
///
/// A fundamental type is what is typically thought of as a type, like "Int64"
/// or "String." The full [`ColumnType`] struct bundles additional information,
/// like nullability and display width, that must also be considered part of a
/// datum's type.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// The type of a datum that can only be null.
    ///
    /// This is uncommon. Most [`Datum::Null`]s appear with a different type.
    Null,
    Int64,
    UInt64,
    Float64,
    /// An exact decimal number with a specified precision and scale. The
    /// precision constrains the total number of digits in the number, while
    /// the scale specifies the number of digits after the decimal point.
    Decimal {
        precision: u8,
        scale: u8,
    },
    String,
}

impl ScalarType {
    /// A decimal type with the maximum precision and the given scale.
    pub fn decimal_with_scale(scale: u8) -> ScalarType {
        ScalarType::Decimal {
            precision: MAX_DECIMAL_PRECISION,
            scale,
        }
    }

    /// Reports whether values of this type are integers.
    pub fn is_integer(&self) -> bool {
        matches!(self, ScalarType::Int64 | ScalarType::UInt64)
    }

    /// Reports whether values of this type are integers or exact decimals.
    pub fn is_exact_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Decimal { .. }
        )
    }

    /// The scale of this type when viewed as a decimal: its own scale for
    /// decimals, zero for everything else.
    pub fn decimal_scale(&self) -> u8 {
        match self {
            ScalarType::Decimal { scale, .. } => *scale,
            _ => 0,
        }
    }

    /// Reports whether this type holds unsigned values.
    pub fn is_unsigned(&self) -> bool {
        matches!(self, ScalarType::UInt64)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScalarType::Null => f.write_str("null"),
            ScalarType::Int64 => f.write_str("bigint"),
            ScalarType::UInt64 => f.write_str("bigint unsigned"),
            ScalarType::Float64 => f.write_str("double"),
            ScalarType::Decimal { precision, scale } => {
                write!(f, "decimal({}, {})", precision, scale)
            }
            ScalarType::String => f.write_str("varchar"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Datum {
        Datum::Decimal(s.parse().unwrap())
    }

    #[test]
    fn u64_bits() {
        assert_eq!(Datum::Int64(-1).to_u64_bits().value, u64::MAX);
        assert_eq!(Datum::UInt64(12).to_u64_bits().value, 12);
        assert_eq!(Datum::from(6.5).to_u64_bits().value, 7);
        assert_eq!(Datum::from(-1.4).to_u64_bits().value, u64::MAX);
        assert_eq!(dec("2.5").to_u64_bits().value, 3);

        let huge = Datum::from(1e30).to_u64_bits();
        assert_eq!(huge.value, u64::MAX);
        assert_eq!(huge.issue, Some(NumericIssue::Overflow));

        let s = Datum::from("12abc").to_u64_bits();
        assert_eq!(s.value, 12);
        assert_eq!(s.issue, Some(NumericIssue::Truncated("12abc".into())));
        assert_eq!(Datum::from("-1").to_u64_bits(), Conversion::exact(u64::MAX));
    }

    #[test]
    fn floats_and_decimals() {
        assert_eq!(Datum::from("2.5").to_f64(), Conversion::exact(2.5));
        assert_eq!(Datum::UInt64(3).to_decimal().value.to_string(), "3");
        assert_eq!(Datum::from(0.5).to_decimal().value.to_string(), "0.5");
        assert_eq!(
            Datum::from(1e300).to_decimal().issue,
            Some(NumericIssue::Overflow)
        );
    }

    #[test]
    fn sql_cmp() {
        assert_eq!(
            Datum::Int64(-1).sql_cmp(&Datum::UInt64(u64::MAX)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Datum::UInt64(5).sql_cmp(&Datum::Int64(5)),
            Some(Ordering::Equal)
        );
        assert_eq!(dec("1.50").sql_cmp(&Datum::Int64(1)), Some(Ordering::Greater));
        assert_eq!(Datum::from(2.5).sql_cmp(&dec("2.50")), Some(Ordering::Equal));
        assert_eq!(Datum::from("b").sql_cmp(&Datum::from("ab")), Some(Ordering::Greater));
        assert_eq!(Datum::Null.sql_cmp(&Datum::Int64(0)), Some(Ordering::Less));
        assert_eq!(Datum::from("1").sql_cmp(&Datum::Int64(1)), None);
    }

    #[test]
    fn instance_of() {
        let uint = ColumnType::new(ScalarType::UInt64);
        assert!(Datum::UInt64(1).is_instance_of(&uint));
        assert!(!Datum::Int64(1).is_instance_of(&uint));
        assert!(!Datum::Null.is_instance_of(&uint));
        assert!(Datum::Null.is_instance_of(&uint.nullable(true)));
        assert!(dec("1.25").is_instance_of(&ColumnType::new(ScalarType::decimal_with_scale(2))));
    }

    #[test]
    fn text() {
        assert_eq!(Datum::Null.to_text(), None);
        assert_eq!(Datum::from("a\"b").to_text().as_deref(), Some("a\"b"));
        assert_eq!(Datum::Int64(-3).to_text().as_deref(), Some("-3"));
        assert_eq!(dec("1.50").to_text().as_deref(), Some("1.50"));
        assert_eq!(dec("1.50").scalar_type(), ScalarType::decimal_with_scale(2));
    }

    #[test]
    fn display() {
        assert_eq!(Datum::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Datum::Null.to_string(), "null");
        assert_eq!(dec("-0.50").to_string(), "-0.50");
    }
}
