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

use crate::errors::VersionError;
use crate::generator::ClusterSnapshots;
use crate::generator::VersionGenerator;
use crate::version::Address;
use crate::version::ClusterSnapshot;
use crate::version::Version;

/// Version generator of a fully replicated cache.
///
/// Every member owns every key, so the commit version does not depend on which
/// members a transaction wrote to.
#[derive(Debug)]
pub struct ReplicatedVersionGenerator {
    snapshots: ClusterSnapshots,
}

impl ReplicatedVersionGenerator {
    pub fn new(initial: ClusterSnapshot) -> Self {
        Self {
            snapshots: ClusterSnapshots::new(initial),
        }
    }
}

impl VersionGenerator for ReplicatedVersionGenerator {
    fn cluster_snapshots(&self) -> &ClusterSnapshots {
        &self.snapshots
    }

    fn scalar(&self, view_id: u64, value: i64) -> Version {
        Version::replicated(view_id, value)
    }

    fn calculate_commit_version(
        &self,
        prepare_version: &Version,
        _affected_owners: &[Address],
    ) -> Result<Version, VersionError> {
        let (Some(value), Some(view_id)) = (prepare_version.value(), prepare_version.view_id())
        else {
            return Err(VersionError::Unexpected {
                expected: "prepare",
                found: prepare_version.kind(),
            });
        };
        self.snapshots.check_known(view_id)?;

        Ok(self.scalar(self.current_view_id(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_version_ignores_owners() -> anyhow::Result<()> {
        let g = ReplicatedVersionGenerator::new(ClusterSnapshot::new(4, vec![Address::new("a")]));

        let v = g.calculate_commit_version(&Version::replicated(4, 9), &[])?;
        assert_eq!(v, Version::replicated(4, 9));

        let v = g.calculate_commit_version(&Version::replicated(4, 9), &[Address::new("zz")])?;
        assert_eq!(v, Version::replicated(4, 9));
        Ok(())
    }

    #[test]
    fn test_commit_version_needs_a_prepare_version() {
        let g = ReplicatedVersionGenerator::new(ClusterSnapshot::new(4, vec![Address::new("a")]));
        assert!(g.calculate_commit_version(&Version::NonExisting, &[]).is_err());
        assert_eq!(
            g.calculate_commit_version(&Version::replicated(5, 1), &[]),
            Err(VersionError::UnknownViewId(5))
        );
    }
}
