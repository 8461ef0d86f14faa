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

//! The per-node chronology of committed versions.
//!
//! Entries live in an arena ordered oldest first and addressed by a
//! monotonically increasing sequence number. Garbage collection only advances
//! the first retained sequence number; an entry is never removed from the
//! middle of the log.

mod version_entry;

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use log::debug;
use log::info;
use log::warn;
use parking_lot::Condvar;
use parking_lot::Mutex;
pub use version_entry::AffectedKeys;
pub use version_entry::VersionEntry;

use crate::errors::CommitLogError;
use crate::errors::VersionError;
use crate::generator::VersionGenerator;
use crate::version::Comparison;
use crate::version::ReadVersion;
use crate::version::Version;

#[derive(Debug)]
struct LogState<K> {
    /// Oldest first. The last entry is the current head.
    entries: VecDeque<VersionEntry<K>>,

    /// Sequence number of `entries[0]`.
    first_seq: u64,

    /// Max over every head ever inserted, never decreases.
    most_recent: Version,
}

impl<K> LogState<K> {
    fn head(&self) -> Result<&VersionEntry<K>, CommitLogError> {
        self.entries.back().ok_or(CommitLogError::NotStarted)
    }

    fn satisfies(&self, target: &Version) -> Result<bool, VersionError> {
        let Some(head) = self.entries.back() else {
            return Ok(target.is_non_existing());
        };

        match target {
            Version::NonExisting => Ok(true),
            Version::CacheEntry(_) | Version::Read(_) => {
                Version::CacheEntry(head.write_version()).is_after_or_equal(target)
            }
            Version::Replicated(_) | Version::Distributed(_) => {
                self.most_recent.is_after_or_equal(target)
            }
        }
    }
}

/// Local total order of committed versions, with blocking visibility waits.
///
/// A single mutex guards the log. Every insert wakes all waiters; each waiter
/// re-checks its own target.
pub struct CommitLog<K> {
    generator: Arc<dyn VersionGenerator>,
    state: Mutex<LogState<K>>,
    changed: Condvar,
}

impl<K> fmt::Debug for CommitLog<K>
where K: fmt::Debug
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitLog")
            .field("state", &self.state)
            .finish()
    }
}

impl<K> CommitLog<K>
where K: fmt::Debug
{
    pub fn new(generator: Arc<dyn VersionGenerator>) -> Self {
        Self {
            generator,
            state: Mutex::new(LogState {
                entries: VecDeque::new(),
                first_seq: 0,
                most_recent: Version::NonExisting,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn generator(&self) -> &Arc<dyn VersionGenerator> {
        &self.generator
    }

    /// Seed the log with version `0` of the current view, affecting every key.
    ///
    /// Starting an already started log does nothing.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if !state.entries.is_empty() {
            return;
        }

        let seed = self.generator.scalar(self.generator.current_view_id(), 0);
        let entry = match VersionEntry::new(seed.clone(), 0, AffectedKeys::All) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("generator produced a non-commit seed version: {}", e);
                return;
            }
        };
        info!("commit log started at {}", entry.version());
        state.entries.push_back(entry);
        state.most_recent = seed;

        self.changed.notify_all();
    }

    pub fn is_started(&self) -> bool {
        !self.state.lock().entries.is_empty()
    }

    /// A snapshot bound a new transaction may start from.
    pub fn get_current_version(&self) -> Result<Version, CommitLogError> {
        let most_recent = {
            let state = self.state.lock();
            state.head()?;
            state.most_recent.clone()
        };
        Ok(self.generator.updated_version(&most_recent)?)
    }

    /// The max over every committed version inserted so far.
    pub fn most_recent_version(&self) -> Result<Version, CommitLogError> {
        let state = self.state.lock();
        state.head()?;
        Ok(state.most_recent.clone())
    }

    /// The version of the oldest retained entry.
    pub fn get_oldest_version(&self) -> Result<Version, CommitLogError> {
        let state = self.state.lock();
        state
            .entries
            .front()
            .map(|e| e.version().clone())
            .ok_or(CommitLogError::NotStarted)
    }

    /// Pick a definite commit version to answer a remote read with.
    ///
    /// A missing or `NonExisting` bound means the most recent version. A commit
    /// version is definite already and is returned as is. For a read or
    /// cache-entry bound, the max over every retained entry at or before the
    /// bound is returned, `NonExisting` if there is none.
    pub fn get_available_version_less_than(
        &self,
        bound: Option<&Version>,
    ) -> Result<Version, CommitLogError> {
        let bound = match bound {
            None | Some(Version::NonExisting) => return self.most_recent_version(),
            Some(v) if v.is_scalar() => return Ok(v.clone()),
            Some(v) => v,
        };

        let candidates = {
            let state = self.state.lock();
            let mut candidates = Vec::new();
            for entry in state.entries.iter() {
                if entry.is_before_or_equal(bound)? {
                    candidates.push(entry.version().clone());
                }
            }
            candidates
        };

        let res = self.generator.merge_and_max(&candidates)?;
        debug!(
            "available version less than {}: {} out of {} candidates",
            bound,
            res,
            candidates.len()
        );
        Ok(res)
    }

    /// Build the snapshot bound of a reader at `bound`.
    ///
    /// Every retained write that is newer in the log than the newest entry at
    /// or before `bound`, but whose value the bound would admit, is excluded.
    /// If that entry carries the bound's own value, the bound is pinned to its
    /// sub-version, so writes logged later with the same value stay invisible.
    pub fn get_read_version(&self, bound: &Version) -> Result<ReadVersion, CommitLogError> {
        let mut read = self.generator.convert_version_to_read(bound)?;

        let state = self.state.lock();
        let mut floor = None;
        for entry in state.entries.iter().rev() {
            if entry.is_before_or_equal(bound)? {
                floor = Some(entry.write_version());
                break;
            }
            let w = entry.write_version();
            if w.value <= read.value {
                read.add_not_visible(w.value, w.sub_version);
            }
        }

        if let Some(floor) = floor {
            if read.max_sub_version.is_none() && floor.value == read.value {
                read.max_sub_version = Some(floor.sub_version);
            }
        }

        debug!("read version for {}: {}", bound, read);
        Ok(read)
    }

    /// The sub-version a new entry with `version` has to be logged with.
    ///
    /// Writes are ordered by value then sub-version, so an entry that carries
    /// the value of the head entry, in any view, goes right after it.
    pub fn next_sub_version(&self, version: &Version) -> Result<i32, CommitLogError> {
        let state = self.state.lock();
        let head = state.head()?;
        Ok(next_sub_version_after(head, version))
    }

    /// Check that `batch` could be appended, without appending it.
    pub fn check_batch(&self, batch: &[VersionEntry<K>]) -> Result<(), CommitLogError> {
        let state = self.state.lock();
        self.check_incremental(&state, batch)?;
        Ok(())
    }

    /// Append a batch of committed versions, oldest first, and wake all waiters.
    ///
    /// The batch must already be in commit order: every entry must be after the
    /// previous one, or equal to it with a greater sub-version. An out of order
    /// batch is rejected as a whole.
    pub fn insert_new_committed_versions(
        &self,
        batch: Vec<VersionEntry<K>>,
    ) -> Result<(), CommitLogError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock();
        let most_recent = self.check_incremental(&state, &batch)?;

        for entry in batch {
            debug!("commit log insert: {}", entry);
            state.entries.push_back(entry);
        }
        state.most_recent = most_recent;

        self.changed.notify_all();
        Ok(())
    }

    /// Returns the most recent version after appending `batch`.
    fn check_incremental(
        &self,
        state: &LogState<K>,
        batch: &[VersionEntry<K>],
    ) -> Result<Version, CommitLogError> {
        let mut last = state.head()?;

        for entry in batch {
            let ok = match entry.version().compare(last.version())? {
                Comparison::After => true,
                Comparison::Equal => entry.sub_version() > last.sub_version(),
                Comparison::Before => false,
            } && entry.write_version().order_key() > last.write_version().order_key();

            if !ok {
                return Err(CommitLogError::NonIncremental {
                    last: last.version().clone(),
                    last_sub: last.sub_version(),
                    current: entry.version().clone(),
                    current_sub: entry.sub_version(),
                });
            }
            last = entry;
        }

        let mut versions = Vec::with_capacity(batch.len() + 1);
        versions.push(state.most_recent.clone());
        versions.extend(batch.iter().map(|e| e.version().clone()));
        Ok(self.generator.merge_and_max(&versions)?)
    }

    /// Block until `target` is visible locally or `timeout` elapses.
    ///
    /// `None` waits forever. Returns whether `target` became visible.
    pub fn wait_for_version(
        &self,
        target: &Version,
        timeout: Option<Duration>,
    ) -> Result<bool, CommitLogError> {
        // A deadline too far away to represent is no deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.state.lock();

        loop {
            if state.satisfies(target)? {
                return Ok(true);
            }

            match deadline {
                None => self.changed.wait(&mut state),
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out()
                        && !state.satisfies(target)?
                    {
                        warn!(
                            "timed out waiting for version {}, head: {:?}",
                            target,
                            state.entries.back().map(|e| e.write_version())
                        );
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// Remove entries that no snapshot at or after `min` can reach.
    ///
    /// The newest entry of the oldest run at or before `min` is kept as the new
    /// oldest entry. Returns its version, or `None` if no entry is eligible.
    pub fn gc_older_versions(&self, min: &Version) -> Result<Option<Version>, CommitLogError> {
        let mut state = self.state.lock();
        state.head()?;

        if min.is_non_existing() {
            return Ok(None);
        }

        let mut eligible = 0;
        for entry in state.entries.iter() {
            if !entry.is_before_or_equal(min)? {
                break;
            }
            eligible += 1;
        }

        if eligible == 0 {
            return Ok(None);
        }

        let removed = eligible - 1;
        state.entries.drain(..removed);
        state.first_seq += removed as u64;

        let kept = state.entries.front().map(|e| e.version().clone());
        if removed > 0 {
            info!(
                "commit log gc: removed {} entries older than {}, oldest is now {:?}",
                removed,
                min,
                kept.as_ref().map(|v| v.to_string())
            );
        }
        Ok(kept)
    }

    /// The min view id over every retained entry.
    pub fn calculate_minimum_view_id(&self) -> Result<u64, CommitLogError> {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .map(|e| e.view_id())
            .min()
            .ok_or(CommitLogError::NotStarted)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence numbers of the retained entries.
    pub fn seq_range(&self) -> Range<u64> {
        let state = self.state.lock();
        state.first_seq..state.first_seq + state.entries.len() as u64
    }

    /// Write one line per retained entry, oldest first.
    pub fn dump(&self, mut w: impl Write) -> io::Result<()> {
        let lines = {
            let state = self.state.lock();
            state
                .entries
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
        };

        for line in lines {
            writeln!(w, "{}", line)?;
        }
        w.flush()
    }

    pub fn dump_to_path(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let f = File::create(path.as_ref())?;
        self.dump(BufWriter::new(f))?;
        info!("commit log dumped to {}", path.as_ref().display());
        Ok(())
    }
}

/// The sub-version of an entry with `version` logged right after `prev`.
pub(crate) fn next_sub_version_after<K>(prev: &VersionEntry<K>, version: &Version) -> i32 {
    if version.value() == Some(prev.write_version().value) {
        prev.sub_version() + 1
    } else {
        0
    }
}
