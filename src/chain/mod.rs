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

//! Per-key multiversion chains.

mod container;
mod entry;
mod version_body;

use std::cmp::Reverse;
use std::collections::BTreeMap;

pub use container::DataContainer;
pub use entry::GmuCacheEntry;
pub use entry::GmuCacheValue;
use log::debug;
pub use version_body::VersionBody;

use crate::errors::ChainInsertError;
use crate::errors::VersionError;
use crate::version::CacheEntryVersion;
use crate::version::Version;
use crate::version::VersionKind;

/// Result of inserting a body into a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The body is newer than every body in the chain.
    NewHead,

    /// A body with the same version existed and its payload was replaced.
    Reincarnated,
}

/// A body found by [`VersionChain::find`] and the end of its validity interval.
#[derive(Debug, PartialEq, Eq)]
pub struct Found<'a, V> {
    pub body: &'a VersionBody<V>,

    /// Version of the next newer body, `None` if `body` is the most recent.
    pub valid_until: Option<CacheEntryVersion>,
}

/// Historical values of one key.
#[derive(Debug, Clone)]
pub struct VersionChain<V> {
    /// Keep the most recent body at the top of the map.
    bodies: BTreeMap<Reverse<(i64, i32)>, VersionBody<V>>,

    /// Whether history has been removed by [`VersionChain::gc`].
    trimmed: bool,
}

impl<V> Default for VersionChain<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> VersionChain<V> {
    pub fn new() -> Self {
        Self {
            bodies: BTreeMap::new(),
            trimmed: false,
        }
    }

    pub fn most_recent(&self) -> Option<&VersionBody<V>> {
        self.bodies.values().next()
    }

    /// Bodies, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &VersionBody<V>> {
        self.bodies.values()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn is_trimmed(&self) -> bool {
        self.trimmed
    }

    /// Add a write to the chain.
    ///
    /// A write with the version of the current head replaces the head's
    /// payload. A write older than the head is rejected.
    pub fn insert(&mut self, body: VersionBody<V>) -> Result<InsertOutcome, ChainInsertError> {
        let key = Reverse(body.version.order_key());

        let Some(head) = self.most_recent() else {
            self.bodies.insert(key, body);
            return Ok(InsertOutcome::NewHead);
        };

        let head = head.version;
        if body.version.order_key() > head.order_key() {
            self.bodies.insert(key, body);
            Ok(InsertOutcome::NewHead)
        } else if body.version.order_key() == head.order_key() {
            debug!("reincarnate {}", body.version);
            self.bodies.insert(key, body);
            Ok(InsertOutcome::Reincarnated)
        } else {
            Err(ChainInsertError::OutOfOrder {
                head,
                current: body.version,
            })
        }
    }

    /// Drop every body and start over with `body`.
    ///
    /// Used by the single-version schemes, which keep no history.
    pub fn replace(&mut self, body: VersionBody<V>) {
        self.bodies.clear();
        self.bodies.insert(Reverse(body.version.order_key()), body);
    }

    /// The newest body visible at `as_of`.
    ///
    /// `as_of` is a read or cache-entry version. `NonExisting` means no bound
    /// and returns the most recent body.
    pub fn find(&self, as_of: &Version) -> Result<Option<Found<'_, V>>, VersionError> {
        let mut newer = None;
        for body in self.bodies.values() {
            if is_visible(&body.version, as_of)? {
                return Ok(Some(Found {
                    body,
                    valid_until: newer,
                }));
            }
            newer = Some(body.version);
        }
        Ok(None)
    }

    /// Remove bodies that were superseded at or before `min`.
    ///
    /// The most recent body is always kept. Returns the number of removed bodies.
    pub fn gc(&mut self, min: &Version) -> Result<usize, VersionError> {
        if min.is_non_existing() {
            return Ok(0);
        }

        let mut cut = None;
        let mut newer: Option<CacheEntryVersion> = None;
        for (key, body) in self.bodies.iter() {
            if let Some(valid_until) = newer {
                if is_visible(&valid_until, min)? {
                    cut = Some(*key);
                    break;
                }
            }
            newer = Some(body.version);
        }

        let Some(cut) = cut else {
            return Ok(0);
        };

        let removed = self.bodies.split_off(&cut).len();
        self.trimmed = true;
        Ok(removed)
    }

    /// Remove bodies whose expiry time is at or before `now_ms`.
    ///
    /// Unlike [`VersionChain::gc`] this may leave the chain empty.
    pub fn expire(&mut self, now_ms: u64) -> usize {
        let before = self.bodies.len();
        self.bodies.retain(|_, body| !body.is_expired(now_ms));
        before - self.bodies.len()
    }
}

fn is_visible(version: &CacheEntryVersion, as_of: &Version) -> Result<bool, VersionError> {
    match as_of {
        Version::NonExisting => Ok(true),
        Version::Read(r) => Ok(r.is_visible(version)),
        Version::CacheEntry(c) => Ok(version.compare(c).is_before_or_equal()),
        Version::Replicated(_) | Version::Distributed(_) => Err(VersionError::Incomparable {
            left: VersionKind::CacheEntry,
            right: as_of.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::version::ReadVersion;

    fn ce(value: i64) -> CacheEntryVersion {
        CacheEntryVersion::new(1, value, 0)
    }

    /// Chain `[v1, v2, v3]` with values `[A, B, C]`.
    fn abc() -> VersionChain<String> {
        let mut c = VersionChain::new();
        c.insert(VersionBody::new(ce(1), s("A"))).unwrap();
        c.insert(VersionBody::new(ce(2), s("B"))).unwrap();
        c.insert(VersionBody::new(ce(3), s("C"))).unwrap();
        c
    }

    #[test]
    fn test_insert_outcomes() {
        let mut c = abc();
        assert_eq!(c.most_recent().and_then(|b| b.value.clone()), Some(s("C")));

        let res = c.insert(VersionBody::new(ce(3), s("C2")));
        assert_eq!(res, Ok(InsertOutcome::Reincarnated));
        assert_eq!(c.len(), 3);
        assert_eq!(c.most_recent().and_then(|b| b.value.clone()), Some(s("C2")));

        let res = c.insert(VersionBody::new(ce(2), s("late")));
        assert_eq!(
            res,
            Err(ChainInsertError::OutOfOrder {
                head: ce(3),
                current: ce(2),
            })
        );

        let res = c.insert(VersionBody::tombstone(CacheEntryVersion::new(1, 3, 1)));
        assert_eq!(res, Ok(InsertOutcome::NewHead));
        assert!(c.most_recent().map(|b| b.is_tombstone()).unwrap_or_default());
    }

    #[test]
    fn test_find_as_of() -> anyhow::Result<()> {
        let c = abc();

        let found = c.find(&Version::CacheEntry(ce(2)))?.unwrap();
        assert_eq!(found.body.value, Some(s("B")));
        assert_eq!(found.valid_until, Some(ce(3)));

        let found = c.find(&Version::read(1, 1))?.unwrap();
        assert_eq!(found.body.value, Some(s("A")));
        assert_eq!(found.valid_until, Some(ce(2)));

        let found = c.find(&Version::NonExisting)?.unwrap();
        assert_eq!(found.body.value, Some(s("C")));
        assert_eq!(found.valid_until, None);

        assert_eq!(c.find(&Version::read(1, 0))?, None);
        Ok(())
    }

    #[test]
    fn test_find_honors_exclusions() -> anyhow::Result<()> {
        let c = abc();
        let mut read = ReadVersion::new(1, 3);
        read.add_not_visible(3, 0);

        let found = c.find(&Version::Read(read))?.unwrap();
        assert_eq!(found.body.value, Some(s("B")));
        assert_eq!(found.valid_until, Some(ce(3)));
        Ok(())
    }

    #[test]
    fn test_find_with_commit_version_is_an_error() {
        let c = abc();
        assert_eq!(
            c.find(&Version::replicated(1, 2)),
            Err(VersionError::Incomparable {
                left: VersionKind::CacheEntry,
                right: VersionKind::Replicated,
            })
        );
    }

    #[test]
    fn test_gc() -> anyhow::Result<()> {
        let mut c = abc();
        assert_eq!(c.gc(&Version::NonExisting)?, 0);
        assert_eq!(c.gc(&Version::CacheEntry(ce(1)))?, 0);
        assert!(!c.is_trimmed());

        // v2 is still visible to a snapshot pinned at v2.
        assert_eq!(c.gc(&Version::CacheEntry(ce(2)))?, 1);
        assert_eq!(c.len(), 2);
        assert!(c.is_trimmed());

        assert_eq!(c.gc(&Version::CacheEntry(ce(3)))?, 1);
        assert_eq!(c.len(), 1);

        assert_eq!(c.gc(&Version::read(1, i64::MAX))?, 0);
        assert_eq!(c.len(), 1);
        Ok(())
    }

    #[test]
    fn test_gc_collapses_to_one() -> anyhow::Result<()> {
        let mut c = abc();
        assert_eq!(c.gc(&Version::read(1, 3))?, 2);
        assert_eq!(c.iter().map(|b| b.version).collect::<Vec<_>>(), vec![ce(3)]);
        Ok(())
    }

    #[test]
    fn test_expire() {
        let mut c = VersionChain::new();
        c.insert(VersionBody::new(ce(1), s("A")).with_expiry(Some(100)))
            .unwrap();
        c.insert(VersionBody::new(ce(2), s("B")).with_expiry(Some(200)))
            .unwrap();

        assert_eq!(c.expire(99), 0);
        assert_eq!(c.expire(100), 1);
        assert_eq!(c.expire(300), 1);
        assert!(c.is_empty());
    }

    #[test]
    fn test_replace() {
        let mut c = abc();
        c.replace(VersionBody::new(ce(0), s("X")));
        assert_eq!(c.len(), 1);
        assert_eq!(c.most_recent().and_then(|b| b.value.clone()), Some(s("X")));
    }

    fn s(x: impl ToString) -> String {
        x.to_string()
    }
}
