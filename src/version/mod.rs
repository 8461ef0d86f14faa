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

//! Version stamps.
//!
//! A [`Version`] is a closed set of stamp variants. Only some pairs of variants
//! can be ordered against each other; comparing any other pair is a programming
//! error reported as [`VersionError::Incomparable`]:
//!
//! | left \ right  | CacheEntry | Read | Replicated | Distributed |
//! |---------------|------------|------|------------|-------------|
//! | CacheEntry    | yes        | yes  |            |             |
//! | Read          | yes        |      |            |             |
//! | Replicated    |            |      | yes        | yes         |
//! | Distributed   |            |      | yes        | yes         |
//!
//! `NonExisting` is before everything when on the left and after everything
//! when on the right.

mod address;
mod cache_entry_version;
mod cluster_snapshot;
mod read_version;
mod scalar_version;

use std::cmp::Ordering;
use std::fmt;

pub use address::Address;
pub use cache_entry_version::CacheEntryVersion;
pub use cluster_snapshot::ClusterSnapshot;
pub use read_version::ReadVersion;
use scalar_version::compare_scalar;
pub use scalar_version::DistributedVersion;
pub use scalar_version::ReplicatedVersion;
use serde::Deserialize;
use serde::Serialize;

use crate::errors::VersionError;

/// Result of comparing two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Before,
    Equal,
    After,
}

impl Comparison {
    pub fn reverse(self) -> Self {
        match self {
            Comparison::Before => Comparison::After,
            Comparison::Equal => Comparison::Equal,
            Comparison::After => Comparison::Before,
        }
    }

    pub fn is_before_or_equal(self) -> bool {
        !matches!(self, Comparison::After)
    }

    pub fn is_after_or_equal(self) -> bool {
        !matches!(self, Comparison::Before)
    }
}

impl From<Ordering> for Comparison {
    fn from(o: Ordering) -> Self {
        match o {
            Ordering::Less => Comparison::Before,
            Ordering::Equal => Comparison::Equal,
            Ordering::Greater => Comparison::After,
        }
    }
}

/// The variant of a [`Version`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionKind {
    NonExisting,
    CacheEntry,
    Read,
    Replicated,
    Distributed,
}

impl fmt::Display for VersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionKind::NonExisting => "NonExisting",
            VersionKind::CacheEntry => "CacheEntry",
            VersionKind::Read => "Read",
            VersionKind::Replicated => "Replicated",
            VersionKind::Distributed => "Distributed",
        };
        write!(f, "{}", s)
    }
}

/// A comparable point in commit history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Version {
    /// The version of an absent or uninitialized key.
    NonExisting,
    CacheEntry(CacheEntryVersion),
    Read(ReadVersion),
    Replicated(ReplicatedVersion),
    Distributed(DistributedVersion),
}

impl Version {
    pub fn cache_entry(view_id: u64, value: i64, sub_version: i32) -> Self {
        Version::CacheEntry(CacheEntryVersion::new(view_id, value, sub_version))
    }

    pub fn read(view_id: u64, value: i64) -> Self {
        Version::Read(ReadVersion::new(view_id, value))
    }

    pub fn replicated(view_id: u64, value: i64) -> Self {
        Version::Replicated(ReplicatedVersion::new(view_id, value))
    }

    pub fn distributed(view_id: u64, value: i64) -> Self {
        Version::Distributed(DistributedVersion::new(view_id, value))
    }

    pub fn kind(&self) -> VersionKind {
        match self {
            Version::NonExisting => VersionKind::NonExisting,
            Version::CacheEntry(_) => VersionKind::CacheEntry,
            Version::Read(_) => VersionKind::Read,
            Version::Replicated(_) => VersionKind::Replicated,
            Version::Distributed(_) => VersionKind::Distributed,
        }
    }

    pub fn is_non_existing(&self) -> bool {
        matches!(self, Version::NonExisting)
    }

    /// Whether this is one of the cluster-scalar commit versions.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Version::Replicated(_) | Version::Distributed(_))
    }

    pub fn view_id(&self) -> Option<u64> {
        match self {
            Version::NonExisting => None,
            Version::CacheEntry(v) => Some(v.view_id),
            Version::Read(v) => Some(v.view_id),
            Version::Replicated(v) => Some(v.view_id),
            Version::Distributed(v) => Some(v.view_id),
        }
    }

    /// The commit counter carried by this version.
    pub fn value(&self) -> Option<i64> {
        match self {
            Version::NonExisting => None,
            Version::CacheEntry(v) => Some(v.value),
            Version::Read(v) => Some(v.value),
            Version::Replicated(v) => Some(v.value),
            Version::Distributed(v) => Some(v.value),
        }
    }

    /// `(value, view_id)` of a scalar version.
    fn scalar(&self) -> Option<(i64, u64)> {
        match self {
            Version::Replicated(v) => Some((v.value, v.view_id)),
            Version::Distributed(v) => Some((v.value, v.view_id)),
            _ => None,
        }
    }

    /// Project a scalar commit version onto the write of one commit-log entry.
    pub fn to_cache_entry(&self, sub_version: i32) -> Option<CacheEntryVersion> {
        self.scalar()
            .map(|(value, view_id)| CacheEntryVersion::new(view_id, value, sub_version))
    }

    /// Three-way comparison of `self` against `other`.
    pub fn compare(&self, other: &Version) -> Result<Comparison, VersionError> {
        let res = match (self, other) {
            (Version::NonExisting, Version::NonExisting) => Comparison::Equal,
            (Version::NonExisting, _) => Comparison::Before,
            (_, Version::NonExisting) => Comparison::After,

            (Version::CacheEntry(a), Version::CacheEntry(b)) => a.compare(b),
            (Version::CacheEntry(a), Version::Read(r)) => r.compare_entry(a),
            (Version::Read(r), Version::CacheEntry(b)) => r.compare_entry(b).reverse(),

            // Replicated and Distributed, in any combination.
            (l, r) => match (l.scalar(), r.scalar()) {
                (Some(a), Some(b)) => compare_scalar(a, b),
                _ => return Err(incomparable(l, r)),
            },
        };
        Ok(res)
    }

    pub fn is_before_or_equal(&self, other: &Version) -> Result<bool, VersionError> {
        Ok(self.compare(other)?.is_before_or_equal())
    }

    pub fn is_after_or_equal(&self, other: &Version) -> Result<bool, VersionError> {
        Ok(self.compare(other)?.is_after_or_equal())
    }
}

fn incomparable(left: &Version, right: &Version) -> VersionError {
    VersionError::Incomparable {
        left: left.kind(),
        right: right.kind(),
    }
}

impl From<CacheEntryVersion> for Version {
    fn from(v: CacheEntryVersion) -> Self {
        Version::CacheEntry(v)
    }
}

impl From<ReadVersion> for Version {
    fn from(v: ReadVersion) -> Self {
        Version::Read(v)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::NonExisting => write!(f, "NON_EXISTING"),
            Version::CacheEntry(v) => write!(f, "{}", v),
            Version::Read(v) => write!(f, "{}", v),
            Version::Replicated(v) => write!(f, "{}", v),
            Version::Distributed(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Vec<Version>> {
        vec![
            vec![
                Version::cache_entry(1, 1, 0),
                Version::cache_entry(1, 1, 1),
                Version::cache_entry(2, 2, 0),
                Version::cache_entry(1, 3, 0),
            ],
            vec![
                Version::replicated(1, 1),
                Version::replicated(2, 1),
                Version::distributed(1, 2),
                Version::replicated(1, 3),
                Version::distributed(3, 3),
            ],
        ]
    }

    #[test]
    fn test_antisymmetric_and_transitive() -> anyhow::Result<()> {
        for group in samples() {
            for a in &group {
                for b in &group {
                    assert_eq!(a.compare(b)?, b.compare(a)?.reverse(), "{} vs {}", a, b);

                    for c in &group {
                        if a.compare(b)? == Comparison::Before
                            && b.compare(c)? == Comparison::Before
                        {
                            assert_eq!(a.compare(c)?, Comparison::Before);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_non_existing() -> anyhow::Result<()> {
        for group in samples() {
            for x in group {
                assert_eq!(Version::NonExisting.compare(&x)?, Comparison::Before);
                assert_eq!(x.compare(&Version::NonExisting)?, Comparison::After);
            }
        }
        assert_eq!(
            Version::NonExisting.compare(&Version::read(1, 3))?,
            Comparison::Before
        );
        assert_eq!(
            Version::NonExisting.compare(&Version::NonExisting)?,
            Comparison::Equal
        );
        Ok(())
    }

    #[test]
    fn test_scalar_ties_broken_by_view_id() -> anyhow::Result<()> {
        let a = Version::replicated(1, 7);
        let b = Version::distributed(2, 7);
        assert_eq!(a.compare(&b)?, Comparison::Before);
        assert_eq!(a.compare(&Version::replicated(1, 7))?, Comparison::Equal);
        Ok(())
    }

    #[test]
    fn test_cache_entry_against_read() -> anyhow::Result<()> {
        let mut read = ReadVersion::new(1, 5);
        read.add_not_visible(4, 1);
        let read = Version::Read(read);

        assert_eq!(
            Version::cache_entry(1, 4, 0).compare(&read)?,
            Comparison::Before
        );
        assert_eq!(
            Version::cache_entry(1, 4, 1).compare(&read)?,
            Comparison::After
        );
        assert_eq!(
            read.compare(&Version::cache_entry(1, 6, 0))?,
            Comparison::Before
        );
        assert_eq!(
            read.compare(&Version::cache_entry(1, 5, 3))?,
            Comparison::Equal
        );
        Ok(())
    }

    #[test]
    fn test_incomparable_pairs() {
        let pairs = vec![
            (Version::cache_entry(1, 1, 0), Version::replicated(1, 1)),
            (Version::replicated(1, 1), Version::read(1, 1)),
            (Version::read(1, 1), Version::read(1, 2)),
            (Version::distributed(1, 1), Version::cache_entry(1, 1, 0)),
        ];

        for (a, b) in pairs {
            let res = a.compare(&b);
            assert_eq!(
                res,
                Err(VersionError::Incomparable {
                    left: a.kind(),
                    right: b.kind(),
                })
            );
        }
    }

    #[test]
    fn test_to_cache_entry() {
        assert_eq!(
            Version::replicated(2, 9).to_cache_entry(3),
            Some(CacheEntryVersion::new(2, 9, 3))
        );
        assert_eq!(Version::read(2, 9).to_cache_entry(0), None);
    }
}
