// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Dynamically updatable configuration.
//!
//! Basic usage:
//! - A type-safe static `Config` is defined near where it is used.
//! - All interesting `Config`s are registered to a `ConfigSet`. The values
//!   within a `ConfigSet` are shared, though multiple `ConfigSet`s may be
//!   created and each are completely independent (i.e. one in each unit
//!   test).
//! - A `ConfigSet` is plumbed around as necessary and may be used to get or
//!   set the value of `Config`.
//!
//! ```
//! # use tally_dyncfg::{Config, ConfigSet};
//! const FOO: Config<bool> = Config::new("foo", false, "description of foo");
//! fn bar(cfg: &ConfigSet) {
//!     assert_eq!(FOO.get(&cfg), false);
//! }
//! fn main() {
//!     let cfg = ConfigSet::default().add(&FOO);
//!     bar(&cfg);
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

/// A handle to a dynamically updatable configuration value.
///
/// This represents a strongly-typed named config of type `T`. It may be
/// registered to a set of such configs with [ConfigSet::add] and then later
/// used to retrieve the latest value at any time with [Self::get].
///
/// The supported types are [bool] and [usize].
#[derive(Clone, Debug)]
pub struct Config<T: ConfigType> {
    name: &'static str,
    desc: &'static str,
    default: T::Default,
}

impl<T: ConfigType> Config<T> {
    /// Constructs a handle for a config of type `T`.
    ///
    /// It is best practice, but not strictly required, for the name to be
    /// globally unique within a process.
    pub const fn new(name: &'static str, default: T::Default, desc: &'static str) -> Self {
        Config {
            name,
            default,
            desc,
        }
    }

    /// The name of this config.
    pub fn name(&self) -> &str {
        self.name
    }

    /// The description of this config.
    pub fn desc(&self) -> &str {
        self.desc
    }

    /// The default value of this config.
    pub fn default(&self) -> &T::Default {
        &self.default
    }

    /// Returns the latest value of this config within the given set.
    ///
    /// Panics if this config was not previously registered to the set.
    pub fn get(&self, set: &ConfigSet) -> T {
        T::get(T::shared(self, set).expect("config should be registered to set"))
    }

    /// Returns the shared value of this config in the given set.
    ///
    /// This allows users to amortize the name lookup with
    /// `Self::get_from_shared`.
    pub fn shared(&self, set: &ConfigSet) -> Arc<T::Shared> {
        Arc::clone(T::shared(self, set).expect("config should be registered to set"))
    }

    /// [Self::get] except from a previously looked up shared value returned by
    /// [Self::shared].
    pub fn get_from_shared(&self, shared: &T::Shared) -> T {
        T::get(shared)
    }
}

/// A type usable as a [Config].
pub trait ConfigType: Sized {
    /// A const-compatible type suitable for use as the default value of configs
    /// of this type.
    type Default: Into<Self> + Clone;
    /// A value of this type, sharable between config value updaters and config
    /// value retrievers.
    type Shared;

    /// Extracts the sharable value for a config of this type from a set.
    ///
    /// External users likely want [Config::shared] instead.
    fn shared<'a>(config: &Config<Self>, vals: &'a ConfigSet) -> Option<&'a Arc<Self::Shared>>;

    /// Converts this type to its type-erased enum equivalent.
    fn to_val(val: &Self) -> ConfigVal;

    /// Retrieves the current config value of this type from a value of its
    /// corresponding sharable type.
    fn get(x: &Self::Shared) -> Self;

    /// Updates the sharable value for a config of this type to the given value.
    fn set(x: &Self::Shared, val: Self);
}

/// An set of [Config]s with values independent of other [ConfigSet]s (even if
/// they contain the same configs).
#[derive(Clone, Default)]
pub struct ConfigSet {
    configs: BTreeMap<String, ConfigEntry>,
}

impl ConfigSet {
    /// Adds the given config to this set, taking and returning `Self` to allow
    /// for easy chaining.
    ///
    /// Panics if a config with the same name has previously been registered to
    /// this set.
    pub fn add<T: ConfigType>(mut self, config: &Config<T>) -> Self {
        let config = ConfigEntry {
            name: config.name,
            desc: config.desc,
            default: T::to_val(&Into::<T>::into(config.default.clone())),
            val: T::to_val(&Into::<T>::into(config.default.clone())),
        };
        if let Some(prev) = self.configs.insert(config.name.to_owned(), config) {
            panic!("{} registered twice", prev.name);
        }
        self
    }

    /// Returns the configs currently registered to this set.
    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.configs.values()
    }
}

/// An entry for a config in a [ConfigSet].
#[derive(Clone, Debug)]
pub struct ConfigEntry {
    name: &'static str,
    desc: &'static str,
    default: ConfigVal,
    val: ConfigVal,
}

impl ConfigEntry {
    /// The name of this config.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The description of this config.
    pub fn desc(&self) -> &'static str {
        self.desc
    }

    /// The default value of this config.
    ///
    /// This value is never updated.
    pub fn default(&self) -> &ConfigVal {
        &self.default
    }

    /// The sharable value of this config in the set.
    pub fn val(&self) -> &ConfigVal {
        &self.val
    }
}

/// A type-erased [ConfigType::Shared] for when set of different types are
/// stored in a collection.
#[derive(Clone, Debug)]
pub enum ConfigVal {
    /// A `bool` shared value.
    Bool(Arc<AtomicBool>),
    /// A `usize` shared value.
    Usize(Arc<AtomicU64>),
}

impl ConfigVal {
    /// Returns a snapshot of the current value, detached from the set.
    pub fn snapshot(&self) -> ConfigValue {
        match self {
            ConfigVal::Bool(x) => ConfigValue::Bool(bool::get(x)),
            ConfigVal::Usize(x) => ConfigValue::Usize(usize::get(x)),
        }
    }
}

/// A plain, serializable config value.
///
/// This is what travels between processes in [ConfigUpdates].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigValue {
    /// A `bool` value.
    Bool(bool),
    /// A `usize` value.
    Usize(usize),
}

/// A batch of value updates to [Config]s in a [ConfigSet].
///
/// This may be sent across processes to apply the same value updates, but may
/// not be durably written down.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdates {
    updates: BTreeMap<String, ConfigValue>,
}

impl ConfigUpdates {
    /// Adds the current value of the given config to this set of updates.
    ///
    /// If a value of the same config has previously been added to these
    /// updates, replaces it.
    pub fn add(&mut self, config: &ConfigEntry) {
        self.updates
            .insert(config.name.to_owned(), config.val.snapshot());
    }

    /// Adds a value for the named config, replacing any previous value.
    pub fn add_dynamic(&mut self, name: &str, val: ConfigValue) {
        self.updates.insert(name.to_owned(), val);
    }

    /// Adds the entries in `other` to `self`, with `other` taking precedence.
    pub fn extend(&mut self, other: Self) {
        self.updates.extend(other.updates)
    }

    /// Applies these config updates to the given [ConfigSet].
    ///
    /// This doesn't need to be the same set that the value updates were added
    /// from.
    ///
    /// The value updates for any configs unknown by the given set are skipped.
    /// Ditto for config type mismatches. Both are logged.
    pub fn apply(&self, set: &ConfigSet) {
        for (name, val) in self.updates.iter() {
            let Some(config) = set.configs.get(name) else {
                error!("config update {} {:?} not known set: {:?}", name, val, set);
                continue;
            };
            match (val, &config.val) {
                (ConfigValue::Bool(src), ConfigVal::Bool(dst)) => bool::set(dst, *src),
                (ConfigValue::Usize(src), ConfigVal::Usize(dst)) => usize::set(dst, *src),
                (src, dst) => error!(
                    "config update {} type mismatch: {:?} vs {:?}",
                    name, src, dst
                ),
            }
        }
    }
}

mod impls {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering::SeqCst};
    use std::sync::Arc;

    use tally_ore::cast::CastFrom;

    use crate::{Config, ConfigSet, ConfigType, ConfigVal};

    impl ConfigType for bool {
        type Default = bool;
        type Shared = AtomicBool;

        fn shared<'a>(config: &Config<Self>, vals: &'a ConfigSet) -> Option<&'a Arc<Self::Shared>> {
            let entry = vals.configs.get(config.name)?;
            match entry.val() {
                ConfigVal::Bool(x) => Some(x),
                x => panic!("expected bool value got {:?}", x),
            }
        }
        fn to_val(val: &Self) -> ConfigVal {
            ConfigVal::Bool(Arc::new((*val).into()))
        }
        fn set(x: &Self::Shared, val: Self) {
            x.store(val, SeqCst);
        }
        fn get(x: &Self::Shared) -> Self {
            x.load(SeqCst)
        }
    }

    impl ConfigType for usize {
        type Default = usize;
        type Shared = AtomicU64;

        fn shared<'a>(config: &Config<Self>, vals: &'a ConfigSet) -> Option<&'a Arc<Self::Shared>> {
            let entry = vals.configs.get(config.name)?;
            match entry.val() {
                ConfigVal::Usize(x) => Some(x),
                x => panic!("expected usize value got {:?}", x),
            }
        }
        fn to_val(val: &Self) -> ConfigVal {
            ConfigVal::Usize(Arc::new(u64::cast_from(*val).into()))
        }
        fn set(x: &Self::Shared, val: Self) {
            x.store(u64::cast_from(val), SeqCst);
        }
        fn get(x: &Self::Shared) -> Self {
            usize::cast_from(x.load(SeqCst))
        }
    }

    impl std::fmt::Debug for ConfigSet {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let ConfigSet { configs } = self;
            f.debug_map()
                .entries(configs.iter().map(|(name, val)| (name, val.val())))
                .finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOL: Config<bool> = Config::new("bool", true, "");
    const USIZE: Config<usize> = Config::new("usize", 1024, "");

    #[test]
    fn all_types() {
        let configs = ConfigSet::default().add(&BOOL).add(&USIZE);
        assert_eq!(BOOL.get(&configs), true);
        assert_eq!(USIZE.get(&configs), 1024);

        let mut updates = ConfigUpdates::default();
        updates.add_dynamic(BOOL.name(), ConfigValue::Bool(false));
        updates.add_dynamic(USIZE.name(), ConfigValue::Usize(2));
        updates.apply(&configs);
        assert_eq!(BOOL.get(&configs), false);
        assert_eq!(USIZE.get(&configs), 2);
    }

    #[test]
    fn config_set() {
        let c0 = ConfigSet::default().add(&USIZE);
        assert_eq!(USIZE.get(&c0), 1024);
        ConfigUpdates {
            updates: [(USIZE.name().to_owned(), ConfigValue::Usize(2))].into(),
        }
        .apply(&c0);
        assert_eq!(USIZE.get(&c0), 2);

        // Each ConfigSet is independent, even if they contain the same set of
        // configs.
        let c1 = ConfigSet::default().add(&USIZE);
        assert_eq!(USIZE.get(&c1), 1024);

        // Clones of a ConfigSet share values.
        let c0_clone = c0.clone();
        ConfigUpdates {
            updates: [(USIZE.name().to_owned(), ConfigValue::Usize(3))].into(),
        }
        .apply(&c0_clone);
        assert_eq!(USIZE.get(&c0), 3);
    }

    #[test]
    fn config_updates_propagate() {
        let src = ConfigSet::default().add(&BOOL).add(&USIZE);
        let dst = ConfigSet::default().add(&BOOL).add(&USIZE);
        ConfigUpdates {
            updates: [(BOOL.name().to_owned(), ConfigValue::Bool(false))].into(),
        }
        .apply(&src);

        let mut updates = ConfigUpdates::default();
        for entry in src.entries() {
            updates.add(entry);
        }
        // Updates survive a serialization round trip across processes.
        let encoded = serde_json::to_string(&updates).unwrap();
        let decoded: ConfigUpdates = serde_json::from_str(&encoded).unwrap();
        decoded.apply(&dst);
        assert_eq!(BOOL.get(&dst), false);
        assert_eq!(USIZE.get(&dst), 1024);
    }

    #[test]
    fn unknown_and_mismatched_updates_are_skipped() {
        let configs = ConfigSet::default().add(&BOOL);
        let mut updates = ConfigUpdates::default();
        updates.add_dynamic("nope", ConfigValue::Bool(false));
        updates.add_dynamic(BOOL.name(), ConfigValue::Usize(0));
        updates.apply(&configs);
        assert_eq!(BOOL.get(&configs), true);
    }

    #[test]
    #[should_panic(expected = "bool registered twice")]
    fn duplicate_registration() {
        let _ = ConfigSet::default().add(&BOOL).add(&BOOL);
    }
}
