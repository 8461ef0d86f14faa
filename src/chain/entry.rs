// Copyright 2021 Datafuse Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::chain::Found;
use crate::version::CacheEntryVersion;
use crate::version::Version;

/// The answer to one lookup of a key, with its validity window.
///
/// Built per lookup and not cached. Only the two maximum versions may be
/// filled in after construction, once the caller knows the visibility window
/// of the reading transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmuCacheValue<V> {
    value: Option<V>,
    creation_version: Version,
    maximum_valid_version: Option<Version>,
    maximum_transaction_version: Option<Version>,
    most_recent: bool,
}

impl<V> GmuCacheValue<V> {
    /// A lookup that found no write of the key.
    pub fn not_found() -> Self {
        Self {
            value: None,
            creation_version: Version::NonExisting,
            maximum_valid_version: None,
            maximum_transaction_version: None,
            most_recent: true,
        }
    }

    /// `value` is `None` for a tombstone.
    pub fn new(
        value: Option<V>,
        creation_version: CacheEntryVersion,
        valid_until: Option<CacheEntryVersion>,
    ) -> Self {
        Self {
            value,
            creation_version: Version::CacheEntry(creation_version),
            maximum_valid_version: valid_until.map(Version::CacheEntry),
            maximum_transaction_version: None,
            most_recent: valid_until.is_none(),
        }
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<V> {
        self.value
    }

    pub fn is_removed(&self) -> bool {
        self.value.is_none() && !self.creation_version.is_non_existing()
    }

    pub fn is_not_found(&self) -> bool {
        self.creation_version.is_non_existing()
    }

    pub fn creation_version(&self) -> &Version {
        &self.creation_version
    }

    /// Exclusive upper bound of the validity of this value.
    pub fn maximum_valid_version(&self) -> Option<&Version> {
        self.maximum_valid_version.as_ref()
    }

    /// The largest snapshot the reading transaction has to consider from now on.
    pub fn maximum_transaction_version(&self) -> Option<&Version> {
        self.maximum_transaction_version.as_ref()
    }

    pub fn is_most_recent(&self) -> bool {
        self.most_recent
    }

    pub fn set_maximum_valid_version(&mut self, version: Version) {
        self.maximum_valid_version = Some(version);
    }

    pub fn set_maximum_transaction_version(&mut self, version: Version) {
        self.maximum_transaction_version = Some(version);
    }
}

impl<V: Clone> From<Found<'_, V>> for GmuCacheValue<V> {
    fn from(found: Found<'_, V>) -> Self {
        GmuCacheValue::new(
            found.body.value.clone(),
            found.body.version,
            found.valid_until,
        )
    }
}

/// A [`GmuCacheValue`] together with its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmuCacheEntry<K, V> {
    key: K,
    value: GmuCacheValue<V>,
}

impl<K, V> GmuCacheEntry<K, V> {
    pub fn new(key: K, value: GmuCacheValue<V>) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &GmuCacheValue<V> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut GmuCacheValue<V> {
        &mut self.value
    }

    pub fn into_parts(self) -> (K, GmuCacheValue<V>) {
        (self.key, self.value)
    }
}
