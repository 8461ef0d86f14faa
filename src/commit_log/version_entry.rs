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

use std::collections::BTreeSet;
use std::fmt;

use crate::errors::VersionError;
use crate::version::CacheEntryVersion;
use crate::version::Version;

/// The keys written by one committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffectedKeys<K> {
    /// Every key, e.g. the seed entry or a state transfer.
    All,
    Keys(BTreeSet<K>),
}

impl<K: Ord> AffectedKeys<K> {
    pub fn keys(keys: impl IntoIterator<Item = K>) -> Self {
        AffectedKeys::Keys(keys.into_iter().collect())
    }

    pub fn contains(&self, key: &K) -> bool {
        match self {
            AffectedKeys::All => true,
            AffectedKeys::Keys(keys) => keys.contains(key),
        }
    }
}

impl<K: fmt::Debug> fmt::Display for AffectedKeys<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffectedKeys::All => write!(f, "ALL"),
            AffectedKeys::Keys(keys) => write!(f, "{:?}", keys),
        }
    }
}

/// One committed transaction as seen by the local commit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry<K> {
    version: Version,
    sub_version: i32,
    write_version: CacheEntryVersion,
    affected_keys: AffectedKeys<K>,
}

impl<K> VersionEntry<K> {
    /// Build an entry for a commit version.
    ///
    /// Only the cluster-scalar commit versions can be logged.
    pub fn new(
        version: Version,
        sub_version: i32,
        affected_keys: AffectedKeys<K>,
    ) -> Result<Self, VersionError> {
        let Some(write_version) = version.to_cache_entry(sub_version) else {
            return Err(VersionError::Unexpected {
                expected: "commit",
                found: version.kind(),
            });
        };

        Ok(Self {
            version,
            sub_version,
            write_version,
            affected_keys,
        })
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn sub_version(&self) -> i32 {
        self.sub_version
    }

    /// The version every key of this commit is written with.
    pub fn write_version(&self) -> CacheEntryVersion {
        self.write_version
    }

    pub fn affected_keys(&self) -> &AffectedKeys<K> {
        &self.affected_keys
    }

    pub fn view_id(&self) -> u64 {
        self.write_version.view_id
    }

    /// Whether this entry is at or before `bound` in commit history.
    ///
    /// `NonExisting` is an unbounded bound here. Read and cache-entry bounds
    /// are compared against the write version of this entry.
    pub(crate) fn is_before_or_equal(&self, bound: &Version) -> Result<bool, VersionError> {
        match bound {
            Version::NonExisting => Ok(true),
            Version::Replicated(_) | Version::Distributed(_) => {
                self.version.is_before_or_equal(bound)
            }
            Version::CacheEntry(_) | Version::Read(_) => {
                Version::CacheEntry(self.write_version).is_before_or_equal(bound)
            }
        }
    }
}

impl<K: fmt::Debug> fmt::Display for VersionEntry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.write_version, self.affected_keys)
    }
}
