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

//! The multiversion engine of one node.
//!
//! [`GmuEngine`] ties the commit log, the per-key chains and the commit policy
//! together. Commit batches are applied under a single apply lock: the chains
//! are written first and the batch is appended to the commit log last, so a
//! snapshot that includes a commit version never misses one of its writes.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use log::debug;
use log::info;
use parking_lot::Mutex;

use crate::chain::DataContainer;
use crate::chain::GmuCacheValue;
use crate::chain::VersionBody;
use crate::commit_log;
use crate::commit_log::AffectedKeys;
use crate::commit_log::CommitLog;
use crate::commit_log::VersionEntry;
use crate::config::GmuConfig;
use crate::errors::TxError;
use crate::errors::VersionError;
use crate::generator;
use crate::generator::VersionGenerator;
use crate::keys::GmuKey;
use crate::keys::GmuValue;
use crate::policy;
use crate::policy::Apply;
use crate::policy::CommitContext;
use crate::policy::CommitContextPolicy;
use crate::policy::CommitEntry;
use crate::policy::Locality;
use crate::transaction::SnapshotRegistry;
use crate::transaction::Transaction;
use crate::util;
use crate::version::Address;
use crate::version::CacheEntryVersion;
use crate::version::ClusterSnapshot;
use crate::version::Version;

/// One key written by a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyWrite<K, V> {
    pub entry: CommitEntry<K>,

    /// `None` removes the key.
    pub value: Option<V>,
}

impl<K, V> KeyWrite<K, V> {
    pub fn put(key: K, value: V) -> Self {
        Self {
            entry: CommitEntry::write(key, None),
            value: Some(value),
        }
    }

    pub fn remove(key: K) -> Self {
        Self {
            entry: CommitEntry::remove(key, None),
            value: None,
        }
    }
}

/// A transaction delivered for local application, in final commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedTransaction<K, V> {
    /// The agreed commit version.
    pub version: Version,

    pub writes: Vec<KeyWrite<K, V>>,

    /// Versions precomputed by the write-skew check, for the simple scheme.
    pub updated_versions: BTreeMap<K, Version>,
}

impl<K, V> CommittedTransaction<K, V> {
    pub fn new(version: Version, writes: Vec<KeyWrite<K, V>>) -> Self {
        Self {
            version,
            writes,
            updated_versions: BTreeMap::new(),
        }
    }

    pub fn with_updated_versions(mut self, updated_versions: BTreeMap<K, Version>) -> Self {
        self.updated_versions = updated_versions;
        self
    }
}

pub struct GmuEngine<K, V> {
    config: GmuConfig,
    local: Address,
    generator: Arc<dyn VersionGenerator>,
    commit_log: CommitLog<K>,
    data: DataContainer<K, V>,
    policy: Arc<dyn CommitContextPolicy<K>>,
    locality: Arc<dyn Locality<K>>,
    registry: Arc<SnapshotRegistry>,
    apply_lock: Mutex<()>,
}

impl<K, V> fmt::Debug for GmuEngine<K, V>
where
    K: GmuKey,
    V: GmuValue,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmuEngine")
            .field("config", &self.config)
            .field("local", &self.local)
            .field("policy", &self.policy)
            .field("commit_log", &self.commit_log)
            .finish()
    }
}

impl<K, V> GmuEngine<K, V>
where
    K: GmuKey,
    V: GmuValue,
{
    /// Create the engine of member `local`.
    ///
    /// The generator and the commit policy follow `config`. The commit log is
    /// started only when multiversion snapshots are enabled.
    pub fn new(
        config: GmuConfig,
        local: Address,
        initial: ClusterSnapshot,
        locality: Arc<dyn Locality<K>>,
    ) -> Self {
        let generator = generator::for_cache_mode(config.cache_mode, initial);
        let policy = policy::for_scheme(&config, generator.clone());
        let commit_log = CommitLog::new(generator.clone());

        if config.gmu_enabled() {
            commit_log.start();
        }

        info!(
            "gmu engine created on {}: versioning={:?} cache_mode={:?} l1={}",
            local, config.versioning, config.cache_mode, config.l1_enabled
        );

        Self {
            config,
            local,
            generator,
            commit_log,
            data: DataContainer::new(),
            policy,
            locality,
            registry: Arc::new(SnapshotRegistry::new()),
            apply_lock: Mutex::new(()),
        }
    }

    /// Replace the commit policy chosen from the configuration.
    pub fn with_policy(mut self, policy: Arc<dyn CommitContextPolicy<K>>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &GmuConfig {
        &self.config
    }

    pub fn generator(&self) -> &Arc<dyn VersionGenerator> {
        &self.generator
    }

    pub fn commit_log(&self) -> &CommitLog<K> {
        &self.commit_log
    }

    pub fn data(&self) -> &DataContainer<K, V> {
        &self.data
    }

    pub fn registry(&self) -> &Arc<SnapshotRegistry> {
        &self.registry
    }

    fn check_enabled(&self) -> Result<(), TxError> {
        if self.config.gmu_enabled() {
            Ok(())
        } else {
            Err(TxError::EngineDisabled {
                scheme: self.config.versioning,
            })
        }
    }

    /// Index of this member in the current view.
    fn local_index(&self) -> Result<usize, VersionError> {
        let current = self.generator.cluster_snapshots().current()?;
        current
            .index(&self.local)
            .ok_or_else(|| VersionError::UnknownMember {
                view_id: current.view_id(),
                member: self.local.to_string(),
            })
    }

    /// A snapshot bound taken from the local commit log.
    pub fn begin_snapshot(&self) -> Result<Version, TxError> {
        self.check_enabled()?;
        let current = self.commit_log.get_current_version()?;
        let read = self.commit_log.get_read_version(&current)?;
        Ok(Version::Read(read))
    }

    /// Start a transaction on this member.
    ///
    /// Its snapshot is registered until the transaction is dropped, so garbage
    /// collection keeps every version it may read.
    pub fn begin_transaction(&self) -> Result<Transaction<K>, TxError> {
        self.check_enabled()?;
        let local_index = self.local_index()?;

        // The pinned bound is registered, so gc keeps exactly what it reads.
        let (id, snapshot) = self.registry.register(|| self.begin_snapshot())?;

        debug!("begin transaction {} at {}", id, snapshot);
        Ok(Transaction::new(
            id,
            snapshot,
            BTreeSet::from([local_index]),
            self.registry.clone(),
        ))
    }

    /// Serve a read of `key` for a transaction with snapshot `snapshot`.
    ///
    /// If the transaction has read from other members already, this member
    /// first waits, at most for the synchronous replication timeout, until it
    /// has applied the snapshot. Otherwise this read fixes the snapshot at the
    /// most recent local version.
    pub fn read(
        &self,
        key: &K,
        snapshot: &Version,
        already_read_from: &BTreeSet<usize>,
    ) -> Result<GmuCacheValue<V>, TxError> {
        self.check_enabled()?;

        let min = self
            .generator
            .calculate_min_version_to_read(snapshot, already_read_from)?;
        if let Some(min) = min {
            let timeout = self.config.sync_replication_timeout;
            if !self.commit_log.wait_for_version(&min, Some(timeout))? {
                return Err(TxError::VersionNotAvailable {
                    requested: min,
                    reason: format!("not applied locally within {:?}", timeout),
                });
            }
        }

        let max = self
            .generator
            .calculate_max_version_to_read(snapshot, already_read_from)?;
        let bound = match max {
            Some(max) => max,
            None => self.commit_log.get_available_version_less_than(None)?,
        };

        let as_of = Version::Read(self.commit_log.get_read_version(&bound)?);
        let (_, mut value) = self.data.get(key, &as_of)?.into_parts();

        debug!(
            "read {:?} as of {}: found={}",
            key,
            as_of,
            !value.is_not_found()
        );
        value.set_maximum_transaction_version(as_of);
        Ok(value)
    }

    /// Read `key` locally within `tx` and record the read.
    pub fn read_in(&self, tx: &mut Transaction<K>, key: &K) -> Result<Option<V>, TxError> {
        let value = self.read(key, tx.version(), tx.already_read_from())?;

        tx.record_read(
            key.clone(),
            self.local_index()?,
            value.maximum_transaction_version(),
            self.generator.as_ref(),
        )?;
        Ok(value.into_value())
    }

    /// Check that no key of `read_set` was overwritten after `prepare_version`.
    pub fn validate(&self, prepare_version: &Version, read_set: &BTreeSet<K>) -> Result<(), TxError> {
        self.check_enabled()?;

        let snapshot = Version::Read(self.commit_log.get_read_version(prepare_version)?);
        for key in read_set {
            self.data.validate_key(key, &snapshot)?;
        }
        Ok(())
    }

    /// This member's vote for the commit version of a preparing transaction.
    ///
    /// It is after every version committed locally so far.
    pub fn prepare_version(&self) -> Result<Version, TxError> {
        self.check_enabled()?;
        let most_recent = self.commit_log.most_recent_version()?;
        Ok(self.generator.increment_version(&most_recent)?)
    }

    /// Agree on the commit version from the merged prepare votes.
    pub fn commit(&self, merged_prepare: &Version, owners: &[Address]) -> Result<Version, TxError> {
        self.check_enabled()?;
        let version = self.generator.calculate_commit_version(merged_prepare, owners)?;
        debug!("agreed commit version {} for owners {:?}", version, owners);
        Ok(version)
    }

    /// Apply a single-key commit.
    ///
    /// The prior version of the key is taken from the local chain.
    pub fn apply_commit(&self, key: K, value: Option<V>, agreed: &Version) -> Result<(), TxError> {
        let prior = self
            .data
            .get_most_recent(&key)
            .map(|e| e.value().creation_version().clone());

        let entry = match value {
            Some(_) => CommitEntry::write(key, prior),
            None => CommitEntry::remove(key, prior),
        };

        let tx = CommittedTransaction::new(agreed.clone(), vec![KeyWrite { entry, value }]);
        self.apply_batch(vec![tx])
    }

    /// Apply committed transactions in the given order.
    ///
    /// With multiversion snapshots enabled the whole batch is checked against
    /// the commit log first; an out of order batch is rejected before any
    /// chain is written.
    pub fn apply_batch(&self, batch: Vec<CommittedTransaction<K, V>>) -> Result<(), TxError> {
        let _guard = self.apply_lock.lock();

        let entries = if self.config.gmu_enabled() {
            let entries = self.build_log_entries(&batch)?;
            self.commit_log.check_batch(&entries)?;
            Some(entries)
        } else {
            None
        };

        for (i, tx) in batch.into_iter().enumerate() {
            let sub_version = entries
                .as_ref()
                .and_then(|es| es.get(i))
                .map(|e| e.sub_version())
                .unwrap_or_default();
            self.apply_transaction(tx, sub_version)?;
        }

        if let Some(entries) = entries {
            self.commit_log.insert_new_committed_versions(entries)?;
        }
        Ok(())
    }

    /// Assign sub-versions: transactions that write the same value get increasing ones.
    fn build_log_entries(
        &self,
        batch: &[CommittedTransaction<K, V>],
    ) -> Result<Vec<VersionEntry<K>>, TxError> {
        let mut entries: Vec<VersionEntry<K>> = Vec::with_capacity(batch.len());

        for tx in batch {
            let sub_version = match entries.last() {
                Some(prev) => commit_log::next_sub_version_after(prev, &tx.version),
                None => self.commit_log.next_sub_version(&tx.version)?,
            };

            let keys = AffectedKeys::keys(tx.writes.iter().map(|w| w.entry.key.clone()));
            entries.push(VersionEntry::new(tx.version.clone(), sub_version, keys)?);
        }
        Ok(entries)
    }

    fn apply_transaction(&self, tx: CommittedTransaction<K, V>, sub_version: i32) -> Result<(), TxError> {
        let ctx = CommitContext {
            transaction_version: &tx.version,
            updated_versions: &tx.updated_versions,
            locality: self.locality.as_ref(),
        };

        for write in tx.writes.iter() {
            let decision = self.policy.decide(&write.entry, &ctx)?;
            if !decision.apply_locally() {
                debug!("roll back {:?}: not owned locally", write.entry.key);
                continue;
            }

            let expires_at_ms = match decision.apply {
                Apply::ShadowCopy => {
                    Some(util::expire_at(util::now_ms(), self.config.l1_lifespan))
                }
                Apply::Owner | Apply::Rollback => None,
            };

            let key = write.entry.key.clone();
            let version = match &decision.version {
                Some(version) => write_version(version, sub_version)?,
                None => CacheEntryVersion::new(self.generator.current_view_id(), 0, 0),
            };
            let body = VersionBody {
                version,
                value: write.value.clone(),
                expires_at_ms,
            };

            // Only multiversion snapshots read history; other schemes keep one version.
            if self.config.gmu_enabled() && decision.version.is_some() {
                self.data.put(key, body)?;
            } else {
                self.data.put_unversioned(key, body);
            }
        }
        Ok(())
    }

    /// The oldest commit version a running transaction of this member may read.
    ///
    /// The most recent version if no transaction is running.
    pub fn local_minimum_version(&self) -> Result<Version, TxError> {
        self.check_enabled()?;

        let min = self.registry.with_active(|active| {
            let active = active.into_iter().cloned().collect::<Vec<_>>();
            if active.is_empty() {
                self.commit_log.most_recent_version().map_err(TxError::from)
            } else {
                self.generator.merge_and_min(&active).map_err(TxError::from)
            }
        })?;
        Ok(min)
    }

    /// The oldest view a retained version or running transaction refers to.
    pub fn local_minimum_view_id(&self) -> Result<u64, TxError> {
        self.check_enabled()?;

        let log_min = self.commit_log.calculate_minimum_view_id()?;
        let tx_min = self
            .registry
            .with_active(|active| active.iter().filter_map(|v| v.view_id()).min());

        Ok(tx_min.map_or(log_min, |t| t.min(log_min)))
    }

    /// Discard history no snapshot at or after `cutoff` can read.
    ///
    /// Returns the number of chain bodies removed.
    pub fn gc(&self, cutoff: &Version) -> Result<usize, TxError> {
        self.check_enabled()?;

        let read = self.commit_log.get_read_version(cutoff)?;
        let kept = self.commit_log.gc_older_versions(cutoff)?;
        let removed = self.data.gc(&Version::Read(read))?;

        info!(
            "gc to {}: oldest retained commit {:?}, removed {} versions",
            cutoff,
            kept.map(|v| v.to_string()),
            removed
        );
        Ok(removed)
    }

    /// Drop local shadow copies whose lifespan has ended.
    pub fn expire_shadow_copies(&self, now_ms: u64) -> usize {
        self.data.expire(now_ms)
    }

    /// Install the cluster snapshot of a new view.
    pub fn view_changed(&self, snapshot: ClusterSnapshot) {
        self.generator.cluster_snapshots().add(snapshot);
    }
}

/// The version a chain body is stored with.
fn write_version(version: &Version, sub_version: i32) -> Result<CacheEntryVersion, VersionError> {
    match version {
        Version::CacheEntry(c) => Ok(*c),
        Version::Replicated(_) | Version::Distributed(_) => {
            version
                .to_cache_entry(sub_version)
                .ok_or(VersionError::Unexpected {
                    expected: "commit",
                    found: version.kind(),
                })
        }
        Version::NonExisting | Version::Read(_) => Err(VersionError::Unexpected {
            expected: "commit",
            found: version.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::VersioningScheme;
    use crate::errors::CommitLogError;
    use crate::policy::AllLocal;
    use crate::version::ReadVersion;

    fn engine(config: GmuConfig) -> GmuEngine<String, String> {
        let snapshot = ClusterSnapshot::new(1, vec![Address::new("a"), Address::new("b")]);
        GmuEngine::new(config, Address::new("a"), snapshot, Arc::new(AllLocal))
    }

    #[test]
    fn test_disabled_engine() {
        let e = engine(GmuConfig::new().with_versioning(VersioningScheme::Simple));
        let disabled = TxError::EngineDisabled {
            scheme: VersioningScheme::Simple,
        };

        assert_eq!(e.begin_snapshot(), Err(disabled.clone()));
        assert_eq!(e.begin_transaction().map(|_| ()), Err(disabled.clone()));
        assert_eq!(
            e.validate(&Version::read(1, 1), &BTreeSet::new()),
            Err(disabled.clone())
        );
        assert_eq!(e.prepare_version(), Err(disabled));
        assert!(!e.commit_log().is_started());
    }

    #[test]
    fn test_prepare_and_commit() -> anyhow::Result<()> {
        let e = engine(GmuConfig::new());

        let prepare = e.prepare_version()?;
        assert_eq!(prepare, Version::replicated(1, 1));

        let agreed = e.commit(&prepare, &[Address::new("a")])?;
        assert_eq!(agreed, Version::replicated(1, 1));

        e.apply_commit(s("k"), Some(s("v1")), &agreed)?;
        assert_eq!(e.prepare_version()?, Version::replicated(1, 2));
        Ok(())
    }

    #[test]
    fn test_same_version_batch_gets_sub_versions() -> anyhow::Result<()> {
        let e = engine(GmuConfig::new());
        let v = Version::replicated(1, 1);

        e.apply_batch(vec![
            CommittedTransaction::new(v.clone(), vec![KeyWrite::put(s("a"), s("a1"))]),
            CommittedTransaction::new(v.clone(), vec![KeyWrite::put(s("b"), s("b1"))]),
        ])?;
        e.apply_commit(s("a"), Some(s("a2")), &v)?;

        let mut dump = Vec::new();
        e.commit_log().dump(&mut dump)?;
        assert_eq!(
            String::from_utf8(dump)?,
            [
                "CacheEntry(0.0, view=1)=ALL",
                "CacheEntry(1.0, view=1)={\"a\"}",
                "CacheEntry(1.1, view=1)={\"b\"}",
                "CacheEntry(1.2, view=1)={\"a\"}",
                "",
            ]
            .join("\n")
        );

        let a = e.data().get_most_recent(&s("a")).unwrap();
        assert_eq!(a.value().creation_version(), &Version::cache_entry(1, 1, 2));
        Ok(())
    }

    #[test]
    fn test_out_of_order_batch_writes_nothing() -> anyhow::Result<()> {
        let e = engine(GmuConfig::new());
        e.apply_commit(s("a"), Some(s("a2")), &Version::replicated(1, 2))?;

        let res = e.apply_commit(s("b"), Some(s("b1")), &Version::replicated(1, 1));
        assert!(matches!(
            res,
            Err(TxError::CommitLog(CommitLogError::NonIncremental { .. }))
        ));
        assert!(!e.data().contains_key(&s("b")));
        Ok(())
    }

    #[test]
    fn test_read_waits_for_snapshot() -> anyhow::Result<()> {
        let config = GmuConfig::new().with_sync_replication_timeout(Duration::from_millis(10));
        let e = engine(config);

        // A remote transaction that already read version 3 elsewhere.
        let res = e.read(&s("k"), &Version::replicated(1, 3), &BTreeSet::from([1]));
        assert!(matches!(res, Err(TxError::VersionNotAvailable { .. })));

        for v in 1..=3 {
            e.apply_commit(s("k"), Some(format!("v{}", v)), &Version::replicated(1, v))?;
        }
        let got = e.read(&s("k"), &Version::replicated(1, 2), &BTreeSet::from([1]))?;
        assert_eq!(got.value(), Some(&s("v2")));
        assert_eq!(
            got.maximum_valid_version(),
            Some(&Version::cache_entry(1, 3, 0))
        );
        Ok(())
    }

    #[test]
    fn test_first_read_fixes_snapshot() -> anyhow::Result<()> {
        let e = engine(GmuConfig::new());
        e.apply_commit(s("k"), Some(s("v1")), &Version::replicated(1, 1))?;

        let got = e.read(&s("k"), &Version::NonExisting, &BTreeSet::new())?;
        assert_eq!(got.value(), Some(&s("v1")));
        assert_eq!(
            got.maximum_transaction_version(),
            Some(&Version::Read(ReadVersion::pinned(1, 1, 0)))
        );
        Ok(())
    }

    #[test]
    fn test_validate() -> anyhow::Result<()> {
        let e = engine(GmuConfig::new());
        e.apply_commit(s("k"), Some(s("v1")), &Version::replicated(1, 1))?;

        let mut tx = e.begin_transaction()?;
        assert_eq!(e.read_in(&mut tx, &s("k"))?, Some(s("v1")));
        e.validate(tx.version(), tx.read_set())?;

        e.apply_commit(s("k"), Some(s("v2")), &Version::replicated(1, 2))?;
        let res = e.validate(tx.version(), tx.read_set());
        assert_eq!(
            res,
            Err(TxError::ValidationConflict {
                key: s("\"k\"")
            })
        );
        assert!(res.unwrap_err().is_abort());
        Ok(())
    }

    #[test]
    fn test_local_minimum() -> anyhow::Result<()> {
        let e = engine(GmuConfig::new());
        e.apply_commit(s("k"), Some(s("v1")), &Version::replicated(1, 1))?;
        assert_eq!(e.local_minimum_version()?, Version::replicated(1, 1));

        let tx = e.begin_transaction()?;
        e.apply_commit(s("k"), Some(s("v2")), &Version::replicated(1, 2))?;
        assert_eq!(
            e.local_minimum_version()?,
            Version::Read(ReadVersion::pinned(1, 1, 0))
        );
        assert_eq!(e.local_minimum_view_id()?, 1);

        drop(tx);
        assert_eq!(e.local_minimum_version()?, Version::replicated(1, 2));
        Ok(())
    }

    #[test]
    fn test_shadow_copies() -> anyhow::Result<()> {
        let config = GmuConfig::new().with_l1(true, Duration::from_secs(60));
        let snapshot = ClusterSnapshot::new(1, vec![Address::new("a"), Address::new("b")]);
        let only_a = |k: &String| k.starts_with('a');
        let e: GmuEngine<String, String> =
            GmuEngine::new(config, Address::new("a"), snapshot, Arc::new(only_a));

        e.apply_commit(s("a1"), Some(s("x")), &Version::replicated(1, 1))?;
        e.apply_commit(s("b1"), Some(s("y")), &Version::replicated(1, 2))?;

        assert_eq!(e.expire_shadow_copies(util::now_ms()), 0);
        assert_eq!(e.expire_shadow_copies(util::now_ms() + 120_000), 1);
        assert!(e.data().contains_key(&s("a1")));
        assert!(!e.data().contains_key(&s("b1")));
        Ok(())
    }

    #[test]
    fn test_rollback_of_remote_keys() -> anyhow::Result<()> {
        let snapshot = ClusterSnapshot::new(1, vec![Address::new("a"), Address::new("b")]);
        let nothing = |_: &String| false;
        let e: GmuEngine<String, String> =
            GmuEngine::new(GmuConfig::new(), Address::new("a"), snapshot, Arc::new(nothing));

        e.apply_commit(s("k"), Some(s("x")), &Version::replicated(1, 1))?;
        assert!(!e.data().contains_key(&s("k")));
        assert_eq!(e.commit_log().len(), 2);
        Ok(())
    }

    #[test]
    fn test_single_version_schemes() -> anyhow::Result<()> {
        let e = engine(GmuConfig::new().with_versioning(VersioningScheme::TotalOrder));
        e.apply_commit(s("k"), Some(s("v1")), &Version::NonExisting)?;
        e.apply_commit(s("k"), Some(s("v2")), &Version::NonExisting)?;

        for v in 3..=100 {
            e.apply_commit(s("k"), Some(format!("v{}", v)), &Version::NonExisting)?;
        }

        let k = e.data().get_most_recent(&s("k")).unwrap();
        assert_eq!(k.value().value(), Some(&s("v100")));
        assert_eq!(k.value().creation_version(), &Version::cache_entry(1, 100, 0));
        assert_eq!(e.data().version_count(&s("k")), 1);

        let e = engine(GmuConfig::new().with_versioning(VersioningScheme::None));
        e.apply_commit(s("k"), Some(s("v1")), &Version::NonExisting)?;
        e.apply_commit(s("k"), Some(s("v2")), &Version::NonExisting)?;
        assert_eq!(
            e.data().get_most_recent(&s("k")).unwrap().value().value(),
            Some(&s("v2"))
        );
        assert_eq!(e.data().version_count(&s("k")), 1);
        Ok(())
    }

    #[test]
    fn test_view_changed() -> anyhow::Result<()> {
        let e = engine(GmuConfig::new());
        e.view_changed(ClusterSnapshot::new(2, vec![Address::new("a")]));

        assert_eq!(
            e.begin_snapshot()?,
            Version::Read(ReadVersion::pinned(2, 0, 0))
        );
        assert_eq!(e.prepare_version()?, Version::replicated(2, 1));
        Ok(())
    }

    fn s(x: impl ToString) -> String {
        x.to_string()
    }
}
