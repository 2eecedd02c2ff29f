// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Lenient conversion of strings to numbers.
//!
//! Aggregates like `SUM` and `BIT_AND` accept string arguments and coerce
//! them the way MySQL does: leading whitespace is skipped, the longest numeric
//! prefix is used, and anything left over marks the conversion as truncated.
//! A string with no numeric prefix at all converts to zero, also truncated.

/// A number parsed out of a string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedNumber {
    /// The prefix was an integer literal that fits in an `i128`.
    Integer(i128),
    /// The prefix had a fraction or exponent, or was too large for an
    /// integer.
    Float(f64),
}

/// The outcome of [`parse_number_prefix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberPrefix {
    /// The parsed value.
    pub value: ParsedNumber,
    /// Whether any input beyond trailing whitespace was ignored.
    pub truncated: bool,
}

/// Returns the length of the longest prefix of `s` that looks like a float
/// literal: `[+-]digits[.digits][(e|E)[+-]digits]`.
fn float_prefix_len(s: &[u8]) -> usize {
    let mut i = 0;
    if matches!(s.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < s.len() && s[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < s.len() && s[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < s.len() && s[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }
    if i < s.len() && matches!(s[i], b'e' | b'E') {
        let mut j = i + 1;
        if matches!(s.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while j < s.len() && s[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

/// Parses the longest numeric prefix of `s`.
pub fn parse_number_prefix(s: &str) -> NumberPrefix {
    let trimmed = s.trim_start();
    let len = float_prefix_len(trimmed.as_bytes());
    let (prefix, rest) = trimmed.split_at(len);
    let truncated = !rest.trim().is_empty() || len == 0;
    let value = if let Ok(i) = prefix.parse::<i128>() {
        ParsedNumber::Integer(i)
    } else if let Ok(f) = prefix.parse::<f64>() {
        ParsedNumber::Float(f)
    } else {
        ParsedNumber::Integer(0)
    };
    NumberPrefix { value, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> (ParsedNumber, bool) {
        let p = parse_number_prefix(s);
        (p.value, p.truncated)
    }

    #[test]
    fn clean_numbers() {
        assert_eq!(parse("42"), (ParsedNumber::Integer(42), false));
        assert_eq!(parse("  -7 "), (ParsedNumber::Integer(-7), false));
        assert_eq!(parse("1.5"), (ParsedNumber::Float(1.5), false));
        assert_eq!(parse("2e3"), (ParsedNumber::Float(2000.0), false));
        assert_eq!(parse(".25"), (ParsedNumber::Float(0.25), false));
        assert_eq!(
            parse("18446744073709551615"),
            (ParsedNumber::Integer(i128::from(u64::MAX)), false)
        );
    }

    #[test]
    fn truncated_numbers() {
        assert_eq!(parse("12abc"), (ParsedNumber::Integer(12), true));
        assert_eq!(parse("3.5.1"), (ParsedNumber::Float(3.5), true));
        assert_eq!(parse("1e"), (ParsedNumber::Integer(1), true));
        assert_eq!(parse("abc"), (ParsedNumber::Integer(0), true));
        assert_eq!(parse(""), (ParsedNumber::Integer(0), true));
        assert_eq!(parse("-"), (ParsedNumber::Integer(0), true));
    }
}
