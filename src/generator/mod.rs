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

//! Creation, merging and projection of version stamps.
//!
//! A generator is chosen by [`CacheMode`](crate::config::CacheMode): a replicated
//! cache stamps commits with [`Version::Replicated`], a distributed one with
//! [`Version::Distributed`]. Every version passed in must be stamped with a view
//! whose [`ClusterSnapshot`](crate::version::ClusterSnapshot) is cached in
//! [`VersionGenerator::cluster_snapshots`].

mod cluster_snapshots;
mod distributed;
mod replicated;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub use cluster_snapshots::ClusterSnapshots;
pub use distributed::DistributedVersionGenerator;
pub use replicated::ReplicatedVersionGenerator;

use crate::config::CacheMode;
use crate::errors::VersionError;
use crate::version::Address;
use crate::version::CacheEntryVersion;
use crate::version::ClusterSnapshot;
use crate::version::Comparison;
use crate::version::ReadVersion;
use crate::version::Version;

/// Build the generator for a cache mode.
pub fn for_cache_mode(mode: CacheMode, initial: ClusterSnapshot) -> Arc<dyn VersionGenerator> {
    match mode {
        CacheMode::Replicated => Arc::new(ReplicatedVersionGenerator::new(initial)),
        CacheMode::Distributed => Arc::new(DistributedVersionGenerator::new(initial)),
    }
}

pub trait VersionGenerator
where Self: fmt::Debug + Send + Sync
{
    fn cluster_snapshots(&self) -> &ClusterSnapshots;

    /// Build a commit version of the variant this generator produces.
    fn scalar(&self, view_id: u64, value: i64) -> Version;

    /// The single commit version agreed by all owners of a transaction's writes.
    ///
    /// `prepare_version` is the merge of every owner's prepare version.
    fn calculate_commit_version(
        &self,
        prepare_version: &Version,
        affected_owners: &[Address],
    ) -> Result<Version, VersionError>;

    /// Check that every node index a transaction read from exists in `view_id`.
    fn check_read_from(
        &self,
        view_id: u64,
        already_read_from: &BTreeSet<usize>,
    ) -> Result<(), VersionError> {
        let snapshot = self.cluster_snapshots().get(view_id)?;
        for index in already_read_from {
            if snapshot.get(*index).is_none() {
                return Err(VersionError::UnknownMemberIndex {
                    view_id,
                    index: *index,
                });
            }
        }
        Ok(())
    }

    fn current_view_id(&self) -> u64 {
        self.cluster_snapshots().current_view_id()
    }

    fn non_existing(&self) -> Version {
        Version::NonExisting
    }

    /// The version of the first write to a key.
    fn generate_new(&self) -> CacheEntryVersion {
        CacheEntryVersion::new(self.current_view_id(), 1, 0)
    }

    /// The next version after `version`, in the current view.
    fn increment_version(&self, version: &Version) -> Result<Version, VersionError> {
        let (value, _) = project(self.cluster_snapshots(), version, "existing")?;
        let current = self.current_view_id();
        let next = value.checked_add(1).ok_or(VersionError::Overflow(value))?;

        let res = match version {
            Version::CacheEntry(_) => Version::cache_entry(current, next, 0),
            _ => self.scalar(current, next),
        };
        Ok(res)
    }

    /// Restamp `base` with the current view, so it is never older than `base`.
    fn updated_version(&self, base: &Version) -> Result<Version, VersionError> {
        let Some(view_id) = base.view_id() else {
            return Ok(Version::NonExisting);
        };
        self.cluster_snapshots().check_known(view_id)?;
        let view_id = view_id.max(self.current_view_id());

        let res = match base {
            Version::NonExisting => Version::NonExisting,
            Version::CacheEntry(c) => Version::cache_entry(view_id, c.value, c.sub_version),
            Version::Read(r) => Version::Read(ReadVersion {
                view_id,
                ..r.clone()
            }),
            Version::Replicated(v) => self.scalar(view_id, v.value),
            Version::Distributed(v) => self.scalar(view_id, v.value),
        };
        Ok(res)
    }

    /// A version that is after or equal to every input.
    fn merge_and_max(&self, versions: &[Version]) -> Result<Version, VersionError> {
        merge(versions, Extreme::Max, self.cluster_snapshots(), |view_id, value| {
            self.scalar(view_id, value)
        })
    }

    /// A version that is before or equal to every input.
    fn merge_and_min(&self, versions: &[Version]) -> Result<Version, VersionError> {
        merge(versions, Extreme::Min, self.cluster_snapshots(), |view_id, value| {
            self.scalar(view_id, value)
        })
    }

    /// The newest version a new read of a transaction may observe.
    ///
    /// `None` means unbounded: the transaction has not read from any member yet
    /// and its first read fixes the snapshot.
    fn calculate_max_version_to_read(
        &self,
        transaction_version: &Version,
        already_read_from: &BTreeSet<usize>,
    ) -> Result<Option<Version>, VersionError> {
        if already_read_from.is_empty() {
            return Ok(None);
        }
        let Some(view_id) = transaction_version.view_id() else {
            return Ok(None);
        };
        self.check_read_from(view_id, already_read_from)?;

        let res = match transaction_version {
            Version::Read(_) | Version::CacheEntry(_) => transaction_version.clone(),
            _ => {
                let (value, view_id) =
                    project(self.cluster_snapshots(), transaction_version, "existing")?;
                self.scalar(view_id, value)
            }
        };
        Ok(Some(res))
    }

    /// The version the serving member must have applied before answering a read.
    ///
    /// `None` means the member may answer right away.
    fn calculate_min_version_to_read(
        &self,
        transaction_version: &Version,
        already_read_from: &BTreeSet<usize>,
    ) -> Result<Option<Version>, VersionError> {
        if already_read_from.is_empty() {
            return Ok(None);
        }
        let Some(view_id) = transaction_version.view_id() else {
            return Ok(None);
        };
        self.check_read_from(view_id, already_read_from)?;

        let (value, view_id) = project(self.cluster_snapshots(), transaction_version, "existing")?;
        Ok(Some(self.scalar(view_id, value)))
    }

    /// Project a version onto the write of one key.
    fn convert_version_to_write(
        &self,
        version: &Version,
        sub_version: i32,
    ) -> Result<CacheEntryVersion, VersionError> {
        let (value, view_id) = project(self.cluster_snapshots(), version, "existing")?;
        Ok(CacheEntryVersion::new(view_id, value, sub_version))
    }

    /// Project a version onto a snapshot bound.
    ///
    /// `NonExisting` becomes a bound every committed write is visible to.
    fn convert_version_to_read(&self, version: &Version) -> Result<ReadVersion, VersionError> {
        match version {
            Version::NonExisting => Ok(ReadVersion::unbounded(self.current_view_id())),
            Version::Read(r) => {
                self.cluster_snapshots().check_known(r.view_id)?;
                Ok(r.clone())
            }
            _ => {
                let (value, view_id) = project(self.cluster_snapshots(), version, "existing")?;
                Ok(ReadVersion::new(view_id, value))
            }
        }
    }
}

/// `(value, view_id)` of any existing version whose view is known.
fn project(
    snapshots: &ClusterSnapshots,
    version: &Version,
    expected: &'static str,
) -> Result<(i64, u64), VersionError> {
    match (version.value(), version.view_id()) {
        (Some(value), Some(view_id)) => {
            snapshots.check_known(view_id)?;
            Ok((value, view_id))
        }
        _ => Err(VersionError::Unexpected {
            expected,
            found: version.kind(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extreme {
    Max,
    Min,
}

impl Extreme {
    /// Whether `candidate` should replace `current` as the running extreme.
    fn prefers(self, c: Comparison) -> bool {
        match self {
            Extreme::Max => c == Comparison::After,
            Extreme::Min => c == Comparison::Before,
        }
    }
}

/// Fold versions into their maximum or minimum.
///
/// `NonExisting` inputs are ignored. Inputs of one kind keep that kind: read
/// versions merge their exclusion sets, cache-entry versions pick one of the
/// inputs. Mixed inputs are projected onto `(value, view_id)` and rebuilt as a
/// commit version with `scalar`.
fn merge(
    versions: &[Version],
    extreme: Extreme,
    snapshots: &ClusterSnapshots,
    scalar: impl Fn(u64, i64) -> Version,
) -> Result<Version, VersionError> {
    let present = versions
        .iter()
        .filter(|v| !v.is_non_existing())
        .collect::<Vec<_>>();

    let Some(first) = present.first() else {
        return Ok(Version::NonExisting);
    };

    for v in present.iter() {
        if let Some(view_id) = v.view_id() {
            snapshots.check_known(view_id)?;
        }
    }

    if present.iter().all(|v| matches!(v, Version::Read(_))) {
        let mut merged: Option<ReadVersion> = None;
        for v in present.iter() {
            let Version::Read(r) = v else {
                continue;
            };
            merged = Some(match merged {
                None => r.clone(),
                Some(mut m) => {
                    let position = match extreme {
                        Extreme::Max => m.position().max(r.position()),
                        Extreme::Min => m.position().min(r.position()),
                    };
                    m.set_position(position);
                    m.view_id = m.view_id.max(r.view_id);
                    m.not_visible.extend(r.not_visible.iter().copied());
                    m
                }
            });
        }
        return Ok(merged.map(Version::Read).unwrap_or(Version::NonExisting));
    }

    if present.iter().all(|v| matches!(v, Version::CacheEntry(_))) {
        let mut best = *first;
        for v in present.iter().skip(1) {
            if extreme.prefers(v.compare(best)?) {
                best = *v;
            }
        }
        return Ok(best.clone());
    }

    let mut best: Option<(i64, u64)> = None;
    for v in present.iter() {
        let p = project(snapshots, v, "existing")?;
        best = Some(match best {
            None => p,
            Some(b) => match extreme {
                Extreme::Max => b.max(p),
                Extreme::Min => b.min(p),
            },
        });
    }

    match best {
        Some((value, view_id)) => Ok(scalar(view_id, value)),
        None => Ok(Version::NonExisting),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn generator() -> ReplicatedVersionGenerator {
        let g = ReplicatedVersionGenerator::new(ClusterSnapshot::new(1, vec![
            Address::new("a"),
            Address::new("b"),
        ]));
        g.cluster_snapshots()
            .add(ClusterSnapshot::new(2, vec![Address::new("a")]));
        g
    }

    #[test]
    fn test_merge_laws_on_scalars() -> anyhow::Result<()> {
        let g = generator();
        let inputs = vec![
            Version::replicated(1, 3),
            Version::replicated(2, 1),
            Version::distributed(1, 7),
            Version::replicated(2, 7),
        ];

        let max = g.merge_and_max(&inputs)?;
        let min = g.merge_and_min(&inputs)?;
        assert_eq!(max, Version::replicated(2, 7));
        assert_eq!(min, Version::replicated(2, 1));

        for v in &inputs {
            assert!(max.is_after_or_equal(v)?);
            assert!(min.is_before_or_equal(v)?);
        }

        // idempotent
        assert_eq!(g.merge_and_max(&[max.clone(), max.clone()])?, max);

        // commutative
        let mut reversed = inputs.clone();
        reversed.reverse();
        assert_eq!(g.merge_and_max(&reversed)?, max);
        assert_eq!(g.merge_and_min(&reversed)?, min);
        Ok(())
    }

    #[test]
    fn test_merge_cache_entries_keeps_kind() -> anyhow::Result<()> {
        let g = generator();
        let inputs = vec![
            Version::cache_entry(1, 4, 0),
            Version::cache_entry(1, 4, 2),
            Version::cache_entry(2, 2, 5),
        ];

        assert_eq!(g.merge_and_max(&inputs)?, Version::cache_entry(1, 4, 2));
        assert_eq!(g.merge_and_min(&inputs)?, Version::cache_entry(2, 2, 5));
        Ok(())
    }

    #[test]
    fn test_merge_read_versions_unions_exclusions() -> anyhow::Result<()> {
        let g = generator();
        let mut a = ReadVersion::new(1, 5);
        a.add_not_visible(5, 1);
        let mut b = ReadVersion::new(2, 8);
        b.add_not_visible(7, 0);

        let max = g.merge_and_max(&[Version::Read(a.clone()), Version::Read(b.clone())])?;
        let mut want = ReadVersion::new(2, 8);
        want.add_not_visible(5, 1);
        want.add_not_visible(7, 0);
        assert_eq!(max, Version::Read(want));

        let min = g.merge_and_min(&[Version::Read(a), Version::Read(b)])?;
        assert_eq!(min.value(), Some(5));
        Ok(())
    }

    #[test]
    fn test_merge_pinned_read_versions() -> anyhow::Result<()> {
        let g = generator();
        let a = Version::Read(ReadVersion::pinned(1, 5, 0));
        let b = Version::Read(ReadVersion::pinned(2, 5, 1));
        let c = Version::Read(ReadVersion::new(1, 5));

        assert_eq!(g.merge_and_max(&[a.clone(), b.clone()])?, Version::Read(ReadVersion::pinned(2, 5, 1)));
        assert_eq!(g.merge_and_min(&[a.clone(), b])?, Version::Read(ReadVersion::pinned(2, 5, 0)));
        assert_eq!(g.merge_and_max(&[a.clone(), c.clone()])?, Version::Read(ReadVersion::new(1, 5)));
        assert_eq!(g.merge_and_min(&[a, c])?, Version::Read(ReadVersion::pinned(1, 5, 0)));
        Ok(())
    }

    #[test]
    fn test_merge_ignores_non_existing() -> anyhow::Result<()> {
        let g = generator();
        assert_eq!(g.merge_and_max(&[])?, Version::NonExisting);
        assert_eq!(
            g.merge_and_max(&[Version::NonExisting, Version::NonExisting])?,
            Version::NonExisting
        );
        assert_eq!(
            g.merge_and_min(&[Version::NonExisting, Version::replicated(1, 4)])?,
            Version::replicated(1, 4)
        );
        Ok(())
    }

    #[test]
    fn test_merge_unknown_view_is_fatal() {
        let g = generator();
        let res = g.merge_and_max(&[Version::replicated(1, 1), Version::replicated(9, 1)]);
        assert_eq!(res, Err(VersionError::UnknownViewId(9)));
    }

    #[test]
    fn test_updated_version() -> anyhow::Result<()> {
        let g = generator();

        let updated = g.updated_version(&Version::replicated(1, 4))?;
        assert_eq!(updated, Version::replicated(2, 4));
        assert!(updated.is_after_or_equal(&Version::replicated(1, 4))?);

        assert_eq!(
            g.updated_version(&Version::NonExisting)?,
            Version::NonExisting
        );
        Ok(())
    }

    #[test]
    fn test_increment_version() -> anyhow::Result<()> {
        let g = generator();
        assert_eq!(
            g.increment_version(&Version::replicated(1, 4))?,
            Version::replicated(2, 5)
        );
        assert_eq!(
            g.increment_version(&Version::cache_entry(1, 4, 3))?,
            Version::cache_entry(2, 5, 0)
        );
        assert!(g.increment_version(&Version::NonExisting).is_err());
        assert_eq!(
            g.increment_version(&Version::replicated(1, i64::MAX)),
            Err(VersionError::Overflow(i64::MAX))
        );
        Ok(())
    }

    #[test]
    fn test_convert() -> anyhow::Result<()> {
        let g = generator();

        assert_eq!(
            g.convert_version_to_write(&Version::replicated(1, 4), 2)?,
            CacheEntryVersion::new(1, 4, 2)
        );
        assert_eq!(
            g.convert_version_to_read(&Version::replicated(1, 4))?,
            ReadVersion::new(1, 4)
        );
        assert_eq!(
            g.convert_version_to_read(&Version::NonExisting)?,
            ReadVersion::unbounded(2)
        );
        assert_eq!(
            g.convert_version_to_write(&Version::NonExisting, 0),
            Err(VersionError::Unexpected {
                expected: "existing",
                found: crate::version::VersionKind::NonExisting,
            })
        );
        Ok(())
    }

    #[test]
    fn test_read_window() -> anyhow::Result<()> {
        let g = generator();
        let tx = Version::replicated(1, 6);

        let none = BTreeSet::new();
        assert_eq!(g.calculate_max_version_to_read(&tx, &none)?, None);
        assert_eq!(g.calculate_min_version_to_read(&tx, &none)?, None);

        let read_from = BTreeSet::from([0]);
        assert_eq!(
            g.calculate_max_version_to_read(&tx, &read_from)?,
            Some(Version::replicated(1, 6))
        );
        assert_eq!(
            g.calculate_min_version_to_read(&tx, &read_from)?,
            Some(Version::replicated(1, 6))
        );

        let mut read = ReadVersion::new(1, 6);
        read.add_not_visible(6, 1);
        assert_eq!(
            g.calculate_max_version_to_read(&Version::Read(read.clone()), &read_from)?,
            Some(Version::Read(read))
        );

        let out_of_range = BTreeSet::from([5]);
        assert_eq!(
            g.calculate_max_version_to_read(&tx, &out_of_range),
            Err(VersionError::UnknownMemberIndex {
                view_id: 1,
                index: 5
            })
        );
        Ok(())
    }
}
