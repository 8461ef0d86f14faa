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

use log::debug;

use crate::errors::VersionError;
use crate::generator::ClusterSnapshots;
use crate::generator::VersionGenerator;
use crate::version::Address;
use crate::version::ClusterSnapshot;
use crate::version::Version;

/// Version generator of a distributed (partially replicated) cache.
///
/// A commit is agreed by exactly the members owning the keys it writes; each of
/// them must be a member of the current view.
#[derive(Debug)]
pub struct DistributedVersionGenerator {
    snapshots: ClusterSnapshots,
}

impl DistributedVersionGenerator {
    pub fn new(initial: ClusterSnapshot) -> Self {
        Self {
            snapshots: ClusterSnapshots::new(initial),
        }
    }
}

impl VersionGenerator for DistributedVersionGenerator {
    fn cluster_snapshots(&self) -> &ClusterSnapshots {
        &self.snapshots
    }

    fn scalar(&self, view_id: u64, value: i64) -> Version {
        Version::distributed(view_id, value)
    }

    fn calculate_commit_version(
        &self,
        prepare_version: &Version,
        affected_owners: &[Address],
    ) -> Result<Version, VersionError> {
        let (Some(value), Some(view_id)) = (prepare_version.value(), prepare_version.view_id())
        else {
            return Err(VersionError::Unexpected {
                expected: "prepare",
                found: prepare_version.kind(),
            });
        };
        self.snapshots.check_known(view_id)?;

        if affected_owners.is_empty() {
            return Err(VersionError::NoAffectedOwners);
        }

        let current = self.snapshots.current()?;
        let mut indexes = Vec::with_capacity(affected_owners.len());
        for owner in affected_owners {
            let Some(index) = current.index(owner) else {
                return Err(VersionError::UnknownMember {
                    view_id: current.view_id(),
                    member: owner.to_string(),
                });
            };
            indexes.push(index);
        }

        debug!(
            "commit version {} agreed by owners {:?} in view {}",
            value,
            indexes,
            current.view_id()
        );
        Ok(self.scalar(current.view_id(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> DistributedVersionGenerator {
        DistributedVersionGenerator::new(ClusterSnapshot::new(2, vec![
            Address::new("a"),
            Address::new("b"),
            Address::new("c"),
        ]))
    }

    #[test]
    fn test_commit_version() -> anyhow::Result<()> {
        let g = generator();
        let v = g.calculate_commit_version(&Version::distributed(2, 11), &[
            Address::new("a"),
            Address::new("c"),
        ])?;
        assert_eq!(v, Version::distributed(2, 11));
        Ok(())
    }

    #[test]
    fn test_commit_version_is_stamped_with_current_view() -> anyhow::Result<()> {
        let g = generator();
        g.cluster_snapshots()
            .add(ClusterSnapshot::new(3, vec![Address::new("a"), Address::new("b")]));

        let v = g.calculate_commit_version(&Version::distributed(2, 11), &[Address::new("b")])?;
        assert_eq!(v, Version::distributed(3, 11));
        Ok(())
    }

    #[test]
    fn test_commit_version_owner_checks() {
        let g = generator();

        assert_eq!(
            g.calculate_commit_version(&Version::distributed(2, 1), &[]),
            Err(VersionError::NoAffectedOwners)
        );
        assert_eq!(
            g.calculate_commit_version(&Version::distributed(2, 1), &[Address::new("x")]),
            Err(VersionError::UnknownMember {
                view_id: 2,
                member: "x".to_string(),
            })
        );
    }

    #[test]
    fn test_generates_distributed_versions() -> anyhow::Result<()> {
        let g = generator();
        let merged = g.merge_and_max(&[Version::replicated(2, 3), Version::cache_entry(2, 5, 1)])?;
        assert_eq!(merged, Version::distributed(2, 5));
        Ok(())
    }
}
