// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Exact fixed-point decimal numbers.
//!
//! A [`Decimal`] is a 128-bit significand paired with a scale, i.e. the value
//! `significand * 10^-scale`. At most [`MAX_DECIMAL_PRECISION`] digits may be
//! stored; every fallible operation reports overflow by returning `None` so
//! that callers can apply their own overflow policy.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tally_ore::cast::CastLossy;

/// The maximum number of digits a [`Decimal`] may hold.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// The maximum scale a [`Decimal`] may have.
pub const MAX_DECIMAL_SCALE: u8 = 30;

/// An exact decimal number.
///
/// Equality and ordering as derived are structural: `1.0` and `1.00` are
/// different values under `==`. Use [`Decimal::cmp_value`] for numeric
/// comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Decimal {
    significand: i128,
    scale: u8,
}

/// Returns `10^exp`, or `None` if it does not fit in an `i128`.
fn pow10(exp: u8) -> Option<i128> {
    10i128.checked_pow(u32::from(exp))
}

/// The exclusive bound on the magnitude of a significand.
fn significand_bound() -> i128 {
    pow10(MAX_DECIMAL_PRECISION).expect("10^38 fits in i128")
}

/// Divides `n` by `d`, rounding half away from zero.
fn div_round(n: i128, d: i128) -> Option<i128> {
    let q = n.checked_div(d)?;
    let r = n.checked_rem(d)?;
    // Compare 2|r| against |d| without overflowing.
    let twice_r = r.unsigned_abs().checked_mul(2)?;
    if twice_r >= d.unsigned_abs() {
        if (n < 0) != (d < 0) {
            q.checked_sub(1)
        } else {
            q.checked_add(1)
        }
    } else {
        Some(q)
    }
}

impl Decimal {
    /// Constructs a decimal from its parts.
    ///
    /// Returns `None` if the significand has more than
    /// [`MAX_DECIMAL_PRECISION`] digits or the scale exceeds
    /// [`MAX_DECIMAL_SCALE`].
    pub fn new(significand: i128, scale: u8) -> Option<Decimal> {
        if scale > MAX_DECIMAL_SCALE || significand.unsigned_abs() >= significand_bound().unsigned_abs()
        {
            return None;
        }
        Some(Decimal { significand, scale })
    }

    /// The zero value at the given scale.
    pub fn zero(scale: u8) -> Decimal {
        Decimal {
            significand: 0,
            scale: scale.min(MAX_DECIMAL_SCALE),
        }
    }

    /// The largest representable value at the given scale.
    pub fn max_value(scale: u8) -> Decimal {
        Decimal {
            significand: significand_bound() - 1,
            scale: scale.min(MAX_DECIMAL_SCALE),
        }
    }

    /// The smallest representable value at the given scale.
    pub fn min_value(scale: u8) -> Decimal {
        Decimal {
            significand: -(significand_bound() - 1),
            scale: scale.min(MAX_DECIMAL_SCALE),
        }
    }

    /// The raw significand.
    pub fn significand(&self) -> i128 {
        self.significand
    }

    /// The number of digits after the decimal point.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Reports whether the value is negative.
    pub fn is_negative(&self) -> bool {
        self.significand < 0
    }

    /// Returns the same value expressed at `scale`, rounding half away from
    /// zero when digits are dropped.
    pub fn rescale(self, scale: u8) -> Option<Decimal> {
        match scale.cmp(&self.scale) {
            Ordering::Equal => Some(self),
            Ordering::Greater => {
                let factor = pow10(scale - self.scale)?;
                Decimal::new(self.significand.checked_mul(factor)?, scale)
            }
            Ordering::Less => {
                let factor = pow10(self.scale - scale)?;
                Decimal::new(div_round(self.significand, factor)?, scale)
            }
        }
    }

    /// Adds two decimals, producing a result at the larger of the two scales.
    pub fn checked_add(self, other: Decimal) -> Option<Decimal> {
        let scale = self.scale.max(other.scale);
        let a = self.rescale(scale)?;
        let b = other.rescale(scale)?;
        Decimal::new(a.significand.checked_add(b.significand)?, scale)
    }

    /// Like [`Decimal::checked_add`], but clamps to the representable range
    /// instead of failing.
    pub fn saturating_add(self, other: Decimal) -> Decimal {
        let scale = self.scale.max(other.scale);
        match self.checked_add(other) {
            Some(d) => d,
            None if self.is_negative() => Decimal::min_value(scale),
            None => Decimal::max_value(scale),
        }
    }

    /// Negates the value. Never fails: the representable range is symmetric.
    pub fn negate(self) -> Decimal {
        Decimal {
            significand: -self.significand,
            scale: self.scale,
        }
    }

    /// Multiplies two decimals. The result's scale is the sum of the scales,
    /// capped at [`MAX_DECIMAL_SCALE`].
    pub fn checked_mul(self, other: Decimal) -> Option<Decimal> {
        let significand = self.significand.checked_mul(other.significand)?;
        let scale = self.scale.checked_add(other.scale)?;
        if scale <= MAX_DECIMAL_SCALE {
            return Decimal::new(significand, scale);
        }
        let factor = pow10(scale - MAX_DECIMAL_SCALE)?;
        Decimal::new(div_round(significand, factor)?, MAX_DECIMAL_SCALE)
    }

    /// Divides by another decimal, producing a result with `extra_scale` more
    /// fractional digits than `self`.
    ///
    /// Returns `None` on division by zero or overflow.
    pub fn checked_div(self, divisor: Decimal, extra_scale: u8) -> Option<Decimal> {
        if divisor.significand == 0 {
            return None;
        }
        let scale = self.scale.checked_add(extra_scale)?.min(MAX_DECIMAL_SCALE);
        // self / divisor = (a / 10^sa) / (b / 10^sb); scaling the numerator
        // by 10^(scale - sa + sb) leaves the quotient at `scale`.
        let shift = (scale - self.scale).checked_add(divisor.scale)?;
        let numerator = self.significand.checked_mul(pow10(shift)?)?;
        Decimal::new(div_round(numerator, divisor.significand)?, scale)
    }

    /// Divides by an integer, producing a result with `extra_scale` more
    /// fractional digits than `self`.
    ///
    /// Returns `None` on division by zero or overflow.
    pub fn checked_div_int(self, divisor: i64, extra_scale: u8) -> Option<Decimal> {
        self.checked_div(Decimal::from(divisor), extra_scale)
    }

    /// Rounds to an integer, half away from zero.
    pub fn round_to_i128(self) -> i128 {
        match pow10(self.scale) {
            Some(factor) => div_round(self.significand, factor).unwrap_or(0),
            None => 0,
        }
    }

    /// Converts to the nearest `f64`.
    pub fn to_f64(self) -> f64 {
        // Going through the string form avoids compounding rounding errors
        // from dividing by a power of ten.
        self.to_string()
            .parse()
            .unwrap_or_else(|_| f64::cast_lossy(self.significand))
    }

    /// Compares two decimals by numeric value, regardless of scale.
    pub fn cmp_value(&self, other: &Decimal) -> Ordering {
        let scale = self.scale.max(other.scale);
        match (self.rescale(scale), other.rescale(scale)) {
            (Some(a), Some(b)) => a.significand.cmp(&b.significand),
            _ => self.to_f64().total_cmp(&other.to_f64()),
        }
    }
}

impl From<i64> for Decimal {
    fn from(i: i64) -> Decimal {
        Decimal {
            significand: i128::from(i),
            scale: 0,
        }
    }
}

impl From<u64> for Decimal {
    fn from(u: u64) -> Decimal {
        Decimal {
            significand: i128::from(u),
            scale: 0,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let digits = self.significand.unsigned_abs().to_string();
        if self.is_negative() {
            f.write_str("-")?;
        }
        let scale = usize::from(self.scale);
        if scale == 0 {
            return f.write_str(&digits);
        }
        if digits.len() <= scale {
            write!(f, "0.{}{}", "0".repeat(scale - digits.len()), digits)
        } else {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{}.{}", int, frac)
        }
    }
}

/// An error that occurs when parsing a [`Decimal`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDecimalError(String);

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid decimal literal: {:?}", self.0)
    }
}

impl Error for ParseDecimalError {}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    /// Parses `[+-]digits[.digits]`.
    fn from_str(s: &str) -> Result<Decimal, ParseDecimalError> {
        let err = || ParseDecimalError(s.to_owned());
        let trimmed = s.trim();
        let (negative, body) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (int, frac) = body.split_once('.').unwrap_or((body, ""));
        if int.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let scale = u8::try_from(frac.len()).map_err(|_| err())?;
        let mut significand: i128 = 0;
        for b in int.bytes().chain(frac.bytes()) {
            significand = significand
                .checked_mul(10)
                .and_then(|s| s.checked_add(i128::from(b - b'0')))
                .ok_or_else(err)?;
        }
        if negative {
            significand = -significand;
        }
        Decimal::new(significand, scale).ok_or_else(err)
    }
}
