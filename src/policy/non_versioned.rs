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

use crate::config::VersioningScheme;
use crate::errors::VersionError;
use crate::policy::CommitContext;
use crate::policy::CommitContextPolicy;
use crate::policy::CommitDecision;
use crate::policy::CommitEntry;
use crate::policy::OwnershipGate;

/// Entries are stored without a version.
#[derive(Debug, Clone)]
pub struct NonVersionedPolicy {
    gate: OwnershipGate,
}

impl NonVersionedPolicy {
    pub fn new(gate: OwnershipGate) -> Self {
        Self { gate }
    }
}

impl<K> CommitContextPolicy<K> for NonVersionedPolicy {
    fn scheme(&self) -> VersioningScheme {
        VersioningScheme::None
    }

    fn decide(
        &self,
        entry: &CommitEntry<K>,
        ctx: &CommitContext<'_, K>,
    ) -> Result<CommitDecision, VersionError> {
        Ok(CommitDecision {
            version: None,
            apply: self.gate.check(entry, ctx.locality),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::policy::Apply;
    use crate::version::Version;

    #[test]
    fn test_decide() -> anyhow::Result<()> {
        let policy = NonVersionedPolicy::new(OwnershipGate::new(false));
        let remote = |_: &u64| false;
        let ctx: CommitContext<'_, u64> = CommitContext {
            transaction_version: &Version::replicated(1, 3),
            updated_versions: &BTreeMap::new(),
            locality: &remote,
        };

        let d = policy.decide(&CommitEntry::write(1, None), &ctx)?;
        assert_eq!(d, CommitDecision {
            version: None,
            apply: Apply::Rollback,
        });

        let d = policy.decide(&CommitEntry::remove(1, None), &ctx)?;
        assert_eq!(d.version, None);
        assert!(d.apply_locally());
        Ok(())
    }
}
