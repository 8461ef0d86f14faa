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

//! Configuration of the multiversion core.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// How committed entries are versioned.
///
/// Only [`VersioningScheme::Gmu`] enables multiversion snapshots. The other
/// schemes keep a single live version per key and only select a commit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersioningScheme {
    /// No version is attached to committed entries.
    None,
    /// Versions are computed by a write-skew check before commit.
    Simple,
    /// Versions are assigned when a totally ordered commit is applied.
    TotalOrder,
    /// Generalized multiversion snapshots.
    Gmu,
}

/// How keys are placed on the cluster members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheMode {
    /// Every member holds every key.
    Replicated,
    /// Every key is held by a subset of the members.
    Distributed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmuConfig {
    pub versioning: VersioningScheme,

    pub cache_mode: CacheMode,

    /// Keep a local shadow copy of committed keys this member does not own.
    pub l1_enabled: bool,

    /// How long a shadow copy lives.
    pub l1_lifespan: Duration,

    /// Upper bound of how long a read waits for this member to catch up with
    /// the version a transaction requires.
    pub sync_replication_timeout: Duration,

    /// Period of the garbage collection rounds. `None` runs them only on demand.
    pub gc_interval: Option<Duration>,
}

impl Default for GmuConfig {
    fn default() -> Self {
        Self {
            versioning: VersioningScheme::Gmu,
            cache_mode: CacheMode::Replicated,
            l1_enabled: false,
            l1_lifespan: Duration::from_secs(600),
            sync_replication_timeout: Duration::from_secs(15),
            gc_interval: Some(Duration::from_secs(60)),
        }
    }
}

impl GmuConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versioning(mut self, versioning: VersioningScheme) -> Self {
        self.versioning = versioning;
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn with_l1(mut self, enabled: bool, lifespan: Duration) -> Self {
        self.l1_enabled = enabled;
        self.l1_lifespan = lifespan;
        self
    }

    pub fn with_sync_replication_timeout(mut self, timeout: Duration) -> Self {
        self.sync_replication_timeout = timeout;
        self
    }

    pub fn with_gc_interval(mut self, interval: Option<Duration>) -> Self {
        self.gc_interval = interval;
        self
    }

    pub fn gmu_enabled(&self) -> bool {
        self.versioning == VersioningScheme::Gmu
    }
}
