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

//! Commit context policies.
//!
//! A policy decides, for every entry changed by a committing transaction, the
//! version the entry is stored with and whether it is applied on this node.
//! The policy is chosen once from [`VersioningScheme`] and handed to the engine.

mod gmu;
mod locality;
mod non_versioned;
mod total_order;
mod versioned;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use gmu::GmuPolicy;
pub use locality::AllLocal;
pub use locality::Locality;
pub use non_versioned::NonVersionedPolicy;
pub use total_order::TotalOrderVersionedPolicy;
pub use versioned::VersionedPolicy;

use crate::config::GmuConfig;
use crate::config::VersioningScheme;
use crate::errors::VersionError;
use crate::generator::VersionGenerator;
use crate::version::Version;

/// One entry changed by a committing transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry<K> {
    pub key: K,

    /// The transaction removed the key.
    pub removed: bool,

    /// Version of the key before the transaction, `None` for a new key.
    pub prior_version: Option<Version>,
}

impl<K> CommitEntry<K> {
    pub fn write(key: K, prior_version: Option<Version>) -> Self {
        Self {
            key,
            removed: false,
            prior_version,
        }
    }

    pub fn remove(key: K, prior_version: Option<Version>) -> Self {
        Self {
            key,
            removed: true,
            prior_version,
        }
    }
}

/// What a committing transaction brings to every policy decision.
pub struct CommitContext<'a, K> {
    /// The agreed commit version of the transaction.
    pub transaction_version: &'a Version,

    /// Versions precomputed by the write-skew check, by key.
    pub updated_versions: &'a BTreeMap<K, Version>,

    pub locality: &'a dyn Locality<K>,
}

/// How an entry is applied on this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apply {
    /// This node owns the key, or the key is removed.
    Owner,

    /// The key is owned elsewhere; keep an expiring local copy.
    ShadowCopy,

    /// The key is owned elsewhere and no local copy is kept.
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDecision {
    /// `None` for unversioned entries.
    pub version: Option<Version>,
    pub apply: Apply,
}

impl CommitDecision {
    pub fn apply_locally(&self) -> bool {
        !matches!(self.apply, Apply::Rollback)
    }
}

pub trait CommitContextPolicy<K>
where Self: fmt::Debug + Send + Sync
{
    fn scheme(&self) -> VersioningScheme;

    fn decide(
        &self,
        entry: &CommitEntry<K>,
        ctx: &CommitContext<'_, K>,
    ) -> Result<CommitDecision, VersionError>;
}

/// The ownership gate shared by every policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipGate {
    pub l1_enabled: bool,
}

impl OwnershipGate {
    pub fn new(l1_enabled: bool) -> Self {
        Self { l1_enabled }
    }

    pub fn check<K>(&self, entry: &CommitEntry<K>, locality: &dyn Locality<K>) -> Apply {
        if locality.is_local(&entry.key) || entry.removed {
            Apply::Owner
        } else if self.l1_enabled {
            Apply::ShadowCopy
        } else {
            Apply::Rollback
        }
    }
}

/// Build the policy of the configured versioning scheme.
pub fn for_scheme<K>(
    config: &GmuConfig,
    generator: Arc<dyn VersionGenerator>,
) -> Arc<dyn CommitContextPolicy<K>>
where K: Ord + fmt::Debug + 'static {
    let gate = OwnershipGate::new(config.l1_enabled);
    match config.versioning {
        VersioningScheme::None => Arc::new(NonVersionedPolicy::new(gate)),
        VersioningScheme::Simple => Arc::new(VersionedPolicy::new(gate)),
        VersioningScheme::TotalOrder => Arc::new(TotalOrderVersionedPolicy::new(gate, generator)),
        VersioningScheme::Gmu => Arc::new(GmuPolicy::new(gate)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::generator::ReplicatedVersionGenerator;
    use crate::version::Address;
    use crate::version::ClusterSnapshot;

    pub(crate) fn generator() -> Arc<dyn VersionGenerator> {
        Arc::new(ReplicatedVersionGenerator::new(ClusterSnapshot::new(1, vec![
            Address::new("a"),
        ])))
    }

    #[test]
    fn test_gate() {
        let only_a = |k: &&str| *k == "a";

        let gate = OwnershipGate::new(false);
        assert_eq!(gate.check(&CommitEntry::write("a", None), &only_a), Apply::Owner);
        assert_eq!(gate.check(&CommitEntry::write("b", None), &only_a), Apply::Rollback);
        assert_eq!(gate.check(&CommitEntry::remove("b", None), &only_a), Apply::Owner);

        let gate = OwnershipGate::new(true);
        assert_eq!(gate.check(&CommitEntry::write("b", None), &only_a), Apply::ShadowCopy);
    }

    #[test]
    fn test_for_scheme() {
        for scheme in [
            VersioningScheme::None,
            VersioningScheme::Simple,
            VersioningScheme::TotalOrder,
            VersioningScheme::Gmu,
        ] {
            let config = GmuConfig::new()
                .with_versioning(scheme)
                .with_l1(true, Duration::from_secs(1));
            let policy = for_scheme::<String>(&config, generator());
            assert_eq!(policy.scheme(), scheme);
        }
    }

    #[test]
    fn test_apply_locally() {
        let d = CommitDecision {
            version: None,
            apply: Apply::ShadowCopy,
        };
        assert!(d.apply_locally());

        let d = CommitDecision {
            version: None,
            apply: Apply::Rollback,
        };
        assert!(!d.apply_locally());
    }
}
