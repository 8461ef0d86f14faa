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

use std::sync::Arc;

use crate::config::VersioningScheme;
use crate::errors::VersionError;
use crate::generator::VersionGenerator;
use crate::policy::CommitContext;
use crate::policy::CommitContextPolicy;
use crate::policy::CommitDecision;
use crate::policy::CommitEntry;
use crate::policy::OwnershipGate;
use crate::version::Version;

/// Versions are assigned at apply time, for commits delivered in total order.
///
/// A new key gets the first version; an existing key the increment of its
/// prior version.
#[derive(Debug, Clone)]
pub struct TotalOrderVersionedPolicy {
    gate: OwnershipGate,
    generator: Arc<dyn VersionGenerator>,
}

impl TotalOrderVersionedPolicy {
    pub fn new(gate: OwnershipGate, generator: Arc<dyn VersionGenerator>) -> Self {
        Self { gate, generator }
    }
}

impl<K> CommitContextPolicy<K> for TotalOrderVersionedPolicy {
    fn scheme(&self) -> VersioningScheme {
        VersioningScheme::TotalOrder
    }

    fn decide(
        &self,
        entry: &CommitEntry<K>,
        ctx: &CommitContext<'_, K>,
    ) -> Result<CommitDecision, VersionError> {
        let apply = self.gate.check(entry, ctx.locality);

        let version = match &entry.prior_version {
            None | Some(Version::NonExisting) => Version::CacheEntry(self.generator.generate_new()),
            Some(prior) => self.generator.increment_version(prior)?,
        };

        Ok(CommitDecision {
            version: Some(version),
            apply,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::policy::tests::generator;
    use crate::policy::AllLocal;

    #[test]
    fn test_decide() -> anyhow::Result<()> {
        let policy = TotalOrderVersionedPolicy::new(OwnershipGate::new(false), generator());
        let ctx: CommitContext<'_, &str> = CommitContext {
            transaction_version: &Version::NonExisting,
            updated_versions: &BTreeMap::new(),
            locality: &AllLocal,
        };

        let d = policy.decide(&CommitEntry::write("a", None), &ctx)?;
        assert_eq!(d.version, Some(Version::cache_entry(1, 1, 0)));

        let prior = Some(Version::cache_entry(1, 4, 2));
        let d = policy.decide(&CommitEntry::write("a", prior), &ctx)?;
        assert_eq!(d.version, Some(Version::cache_entry(1, 5, 0)));
        Ok(())
    }
}
