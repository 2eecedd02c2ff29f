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

//! String utilities.

use std::fmt;

/// Creates a type whose [`fmt::Display`] implementation outputs each item in
/// `iter` separated by `separator`.
pub fn separated<'a, I>(separator: &'a str, iter: I) -> Separated<'a, I>
where
    I: IntoIterator + Clone,
    I::Item: fmt::Display,
{
    Separated { separator, iter }
}

/// Displays an iterator of items separated by a string.
///
/// See [`separated`].
#[derive(Debug)]
pub struct Separated<'a, I> {
    separator: &'a str,
    iter: I,
}

impl<'a, I> fmt::Display for Separated<'a, I>
where
    I: IntoIterator + Clone,
    I::Item: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, item) in self.iter.clone().into_iter().enumerate() {
            if i != 0 {
                f.write_str(self.separator)?;
            }
            item.fmt(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separated_display() {
        assert_eq!(separated(", ", &[1, 2, 3]).to_string(), "1, 2, 3");
        assert_eq!(separated("\n", Vec::<u8>::new()).to_string(), "");
        assert_eq!(separated("|", ["a"]).to_string(), "a");
    }
}
