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

//! Cast utilities.

/// A trait for safe, simple, and infallible casts.
///
/// `CastFrom` is like [`std::convert::From`], but it is implemented for some
/// platform-specific casts that are missing from the standard library. For
/// example, there is no `From<u64> for usize` implementation, because Rust may
/// someday support platforms where usize is smaller than 64 bits. Since we
/// don't care about such platforms, we are happy to provide a `CastFrom<u64>
/// for usize` implementation.
///
/// `CastFrom` should be preferred to the `as` operator, since the `as` operator
/// will silently truncate if the target type is smaller than the source type.
pub trait CastFrom<T> {
    /// Performs the cast.
    fn cast_from(from: T) -> Self;
}

macro_rules! cast_from {
    ($from:ty, $to:ty) => {
        impl CastFrom<$from> for $to {
            #[allow(clippy::as_conversions)]
            fn cast_from(from: $from) -> $to {
                from as $to
            }
        }
    };
}

#[cfg(target_pointer_width = "64")]
cast_from!(u64, usize);

cast_from!(usize, u64);

/// A trait for reinterpreting the bits of a value as another type of the same
/// width.
///
/// Two's complement makes this a lossless round trip: `-1i64` reinterprets as
/// `u64::MAX` and back again.
pub trait ReinterpretCast<T> {
    /// Performs the reinterpretation.
    fn reinterpret_cast(from: T) -> Self;
}

macro_rules! reinterpret_cast {
    ($from:ty, $to:ty) => {
        impl ReinterpretCast<$from> for $to {
            #[allow(clippy::as_conversions)]
            fn reinterpret_cast(from: $from) -> $to {
                from as $to
            }
        }
    };
}

reinterpret_cast!(i64, u64);
reinterpret_cast!(u64, i64);

/// A trait for casts that may lose precision, like integer to float.
///
/// Use this only where the loss is the documented SQL behavior, e.g. summing
/// integers into a floating point accumulator.
pub trait CastLossy<T> {
    /// Performs the cast.
    fn cast_lossy(from: T) -> Self;
}

macro_rules! cast_lossy {
    ($from:ty, $to:ty) => {
        impl CastLossy<$from> for $to {
            #[allow(clippy::as_conversions)]
            fn cast_lossy(from: $from) -> $to {
                from as $to
            }
        }
    };
}

cast_lossy!(i64, f64);
cast_lossy!(u64, f64);
cast_lossy!(i128, f64);

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn reinterpret_negative() {
        assert_eq!(u64::reinterpret_cast(-1i64), u64::MAX);
        assert_eq!(i64::reinterpret_cast(u64::MAX), -1);
        assert_eq!(u64::reinterpret_cast(i64::MIN), 1 << 63);
    }

    proptest! {
        #[test]
        fn reinterpret_roundtrips(i in any::<i64>()) {
            prop_assert_eq!(i64::reinterpret_cast(u64::reinterpret_cast(i)), i);
        }
    }
}
