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

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use parking_lot::RwLock;

use crate::chain::is_visible;
use crate::chain::GmuCacheEntry;
use crate::chain::GmuCacheValue;
use crate::chain::InsertOutcome;
use crate::chain::VersionBody;
use crate::chain::VersionChain;
use crate::errors::ChainInsertError;
use crate::errors::TxError;
use crate::errors::VersionError;
use crate::keys::GmuKey;
use crate::keys::GmuValue;
use crate::version::Version;

type SharedChain<V> = Arc<Mutex<VersionChain<V>>>;

/// All chains of a node, by key.
///
/// The map lock is held only to find or create a chain; each chain has its own
/// lock, so access to one key does not block access to another.
#[derive(Debug)]
pub struct DataContainer<K, V> {
    chains: RwLock<BTreeMap<K, SharedChain<V>>>,
}

impl<K, V> Default for DataContainer<K, V>
where
    K: GmuKey,
    V: GmuValue,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> DataContainer<K, V>
where
    K: GmuKey,
    V: GmuValue,
{
    pub fn new() -> Self {
        Self {
            chains: RwLock::new(BTreeMap::new()),
        }
    }

    fn chain(&self, key: &K) -> Option<SharedChain<V>> {
        self.chains.read().get(key).cloned()
    }

    fn chain_or_create(&self, key: K) -> SharedChain<V> {
        if let Some(chain) = self.chain(&key) {
            return chain;
        }
        self.chains.write().entry(key).or_default().clone()
    }

    /// Look up the value of `key` visible at `as_of`.
    ///
    /// If the visible write has been garbage collected the lookup fails with
    /// [`TxError::VersionNotAvailable`] instead of reporting the key as absent.
    pub fn get(&self, key: &K, as_of: &Version) -> Result<GmuCacheEntry<K, V>, TxError> {
        let Some(chain) = self.chain(key) else {
            return Ok(GmuCacheEntry::new(key.clone(), GmuCacheValue::not_found()));
        };

        let chain = chain.lock();
        let value = match chain.find(as_of)? {
            Some(found) => GmuCacheValue::from(found),
            None if chain.is_trimmed() => {
                return Err(TxError::VersionNotAvailable {
                    requested: as_of.clone(),
                    reason: format!("history of key {:?} has been garbage collected", key),
                });
            }
            None => GmuCacheValue::not_found(),
        };

        Ok(GmuCacheEntry::new(key.clone(), value))
    }

    pub fn get_most_recent(&self, key: &K) -> Option<GmuCacheEntry<K, V>> {
        let chain = self.chain(key)?;
        let chain = chain.lock();
        let body = chain.most_recent()?;

        let value = GmuCacheValue::new(body.value.clone(), body.version, None);
        Some(GmuCacheEntry::new(key.clone(), value))
    }

    pub fn put(&self, key: K, body: VersionBody<V>) -> Result<InsertOutcome, ChainInsertError> {
        debug!("put {:?} at {}", key, body.version);
        let chain = self.chain_or_create(key);
        let mut chain = chain.lock();
        chain.insert(body)
    }

    /// Store `body` as the only version of `key`.
    pub fn put_unversioned(&self, key: K, body: VersionBody<V>) {
        debug!("put unversioned {:?}", key);
        let chain = self.chain_or_create(key);
        chain.lock().replace(body);
    }

    /// Check that the most recent write of `key` is visible to `snapshot`.
    pub fn validate_key(&self, key: &K, snapshot: &Version) -> Result<(), TxError> {
        let Some(chain) = self.chain(key) else {
            return Ok(());
        };
        let chain = chain.lock();
        let Some(head) = chain.most_recent() else {
            return Ok(());
        };

        if is_visible(&head.version, snapshot)? {
            Ok(())
        } else {
            debug!(
                "validation conflict: {:?} head {} is not visible to {}",
                key, head.version, snapshot
            );
            Err(TxError::ValidationConflict {
                key: format!("{:?}", key),
            })
        }
    }

    /// Garbage collect every chain. Returns the number of removed bodies.
    pub fn gc(&self, min: &Version) -> Result<usize, VersionError> {
        let chains = self.chains
            .read()
            .values()
            .cloned()
            .collect::<Vec<_>>();

        let mut removed = 0;
        for chain in chains {
            removed += chain.lock().gc(min)?;
        }
        Ok(removed)
    }

    /// Drop expired bodies, and chains left empty.
    pub fn expire(&self, now_ms: u64) -> usize {
        let mut chains = self.chains.write();

        let mut removed = 0;
        chains.retain(|key, chain| {
            let mut chain = chain.lock();
            let n = chain.expire(now_ms);
            if n > 0 {
                debug!("expired {} versions of {:?}", n, key);
            }
            removed += n;
            !chain.is_empty()
        });
        removed
    }

    /// Number of versions retained for `key`.
    pub fn version_count(&self, key: &K) -> usize {
        self.chain(key).map_or(0, |chain| chain.lock().len())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.chains.read().contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.chains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
