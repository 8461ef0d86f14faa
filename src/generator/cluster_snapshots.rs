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

use log::info;
use parking_lot::RwLock;

use crate::errors::VersionError;
use crate::version::ClusterSnapshot;

/// Locally cached cluster snapshots, by view id.
///
/// The newest view is the current one. A snapshot is dropped only by
/// [`ClusterSnapshots::gc`], once no retained version refers to its view.
#[derive(Debug)]
pub struct ClusterSnapshots {
    views: RwLock<BTreeMap<u64, Arc<ClusterSnapshot>>>,
}

impl ClusterSnapshots {
    pub fn new(initial: ClusterSnapshot) -> Self {
        let mut views = BTreeMap::new();
        views.insert(initial.view_id(), Arc::new(initial));
        Self {
            views: RwLock::new(views),
        }
    }

    /// Install the snapshot of a new membership view.
    pub fn add(&self, snapshot: ClusterSnapshot) {
        info!(
            "add cluster snapshot: view_id={} members={:?}",
            snapshot.view_id(),
            snapshot.members()
        );
        self.views.write().insert(snapshot.view_id(), Arc::new(snapshot));
    }

    pub fn get(&self, view_id: u64) -> Result<Arc<ClusterSnapshot>, VersionError> {
        self.views
            .read()
            .get(&view_id)
            .cloned()
            .ok_or(VersionError::UnknownViewId(view_id))
    }

    pub fn check_known(&self, view_id: u64) -> Result<(), VersionError> {
        if self.views.read().contains_key(&view_id) {
            Ok(())
        } else {
            Err(VersionError::UnknownViewId(view_id))
        }
    }

    pub fn current_view_id(&self) -> u64 {
        self.views
            .read()
            .keys()
            .next_back()
            .copied()
            .unwrap_or_default()
    }

    pub fn current(&self) -> Result<Arc<ClusterSnapshot>, VersionError> {
        self.get(self.current_view_id())
    }

    pub fn view_ids(&self) -> Vec<u64> {
        self.views.read().keys().copied().collect()
    }

    /// Remove snapshots of views older than `min_view_id`.
    ///
    /// The current view is always kept. Returns the number of removed snapshots.
    pub fn gc(&self, min_view_id: u64) -> usize {
        let mut views = self.views.write();

        let current = views.keys().next_back().copied().unwrap_or_default();
        let keep_from = min_view_id.min(current);

        let kept = views.split_off(&keep_from);
        let removed = views.len();
        *views = kept;

        if removed > 0 {
            info!(
                "removed {} cluster snapshots older than view {}",
                removed, keep_from
            );
        }
        removed
    }
}
