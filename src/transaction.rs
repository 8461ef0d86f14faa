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

//! Snapshot state of running transactions.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::errors::VersionError;
use crate::generator::VersionGenerator;
use crate::version::Version;

/// The snapshots of all transactions running on this node.
///
/// Garbage collection must keep every version any of them may still read.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,

    /// The commit version each transaction started from, by id.
    active: BTreeMap<u64, Version>,
}

impl SnapshotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the snapshot produced by `begin`.
    ///
    /// `begin` runs under the registry lock, so a concurrent
    /// [`SnapshotRegistry::with_active`] never misses a snapshot that is
    /// older than what it reads afterwards.
    pub fn register<E>(
        &self,
        begin: impl FnOnce() -> Result<Version, E>,
    ) -> Result<(u64, Version), E> {
        let mut inner = self.inner.lock();
        let version = begin()?;

        let id = inner.next_id;
        inner.next_id += 1;
        inner.active.insert(id, version.clone());

        debug!("register snapshot {}: {}", id, version);
        Ok((id, version))
    }

    pub fn deregister(&self, id: u64) {
        let removed = self.inner.lock().active.remove(&id);
        if removed.is_some() {
            debug!("deregister snapshot {}", id);
        }
    }

    /// Run `f` on the versions of all registered snapshots, under the lock.
    pub fn with_active<T>(&self, f: impl FnOnce(Vec<&Version>) -> T) -> T {
        let inner = self.inner.lock();
        f(inner.active.values().collect())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A running transaction.
///
/// Deregisters its snapshot when dropped.
#[derive(Debug)]
pub struct Transaction<K> {
    id: u64,
    version: Version,
    read_set: BTreeSet<K>,
    already_read_from: BTreeSet<usize>,
    registry: Arc<SnapshotRegistry>,
}

impl<K> Transaction<K>
where K: Ord
{
    pub(crate) fn new(
        id: u64,
        version: Version,
        already_read_from: BTreeSet<usize>,
        registry: Arc<SnapshotRegistry>,
    ) -> Self {
        Self {
            id,
            version,
            read_set: BTreeSet::new(),
            already_read_from,
            registry,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The snapshot bound of this transaction.
    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn read_set(&self) -> &BTreeSet<K> {
        &self.read_set
    }

    /// Indexes of the members this transaction has read from.
    pub fn already_read_from(&self) -> &BTreeSet<usize> {
        &self.already_read_from
    }

    /// Record a read of `key` served by member `node_index`.
    ///
    /// `observed` is the maximum transaction version returned with the value;
    /// the snapshot bound is raised to include it.
    pub fn record_read(
        &mut self,
        key: K,
        node_index: usize,
        observed: Option<&Version>,
        generator: &dyn VersionGenerator,
    ) -> Result<(), VersionError> {
        self.read_set.insert(key);
        self.already_read_from.insert(node_index);

        if let Some(observed) = observed {
            self.version = generator.merge_and_max(&[self.version.clone(), observed.clone()])?;
        }
        Ok(())
    }
}

impl<K> Drop for Transaction<K> {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TxError;
    use crate::generator::ReplicatedVersionGenerator;
    use crate::version::Address;
    use crate::version::ClusterSnapshot;
    use crate::version::ReadVersion;

    #[test]
    fn test_register_and_drop() -> anyhow::Result<()> {
        let registry = Arc::new(SnapshotRegistry::new());

        let (id, v) = registry.register(|| Ok::<_, TxError>(Version::replicated(1, 3)))?;
        let tx = Transaction::<String>::new(id, v, BTreeSet::new(), registry.clone());

        let (id2, _) = registry.register(|| Ok::<_, TxError>(Version::replicated(1, 5)))?;
        assert_ne!(id, id2);
        assert_eq!(registry.len(), 2);

        registry.with_active(|versions| {
            assert_eq!(versions, vec![
                &Version::replicated(1, 3),
                &Version::replicated(1, 5)
            ]);
        });

        drop(tx);
        assert_eq!(registry.len(), 1);
        registry.deregister(id2);
        assert!(registry.is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_begin_is_not_registered() {
        let registry = SnapshotRegistry::new();
        let res = registry.register(|| Err(TxError::ValidationConflict { key: "k".into() }));
        assert!(res.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_record_read() -> anyhow::Result<()> {
        let g = ReplicatedVersionGenerator::new(ClusterSnapshot::new(1, vec![
            Address::new("a"),
            Address::new("b"),
        ]));
        let registry = Arc::new(SnapshotRegistry::new());

        let mut tx = Transaction::new(
            0,
            Version::read(1, 4),
            BTreeSet::from([0]),
            registry,
        );

        let mut observed = ReadVersion::new(1, 4);
        observed.add_not_visible(4, 1);
        tx.record_read("k", 1, Some(&Version::Read(observed.clone())), &g)?;
        tx.record_read("j", 0, None, &g)?;

        assert_eq!(tx.version(), &Version::Read(observed));
        assert_eq!(tx.read_set(), &BTreeSet::from(["j", "k"]));
        assert_eq!(tx.already_read_from(), &BTreeSet::from([0, 1]));
        Ok(())
    }
}
