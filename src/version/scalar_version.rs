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

//! Cluster-scalar commit versions.
//!
//! Both variants are a per-view commit counter. A replicated cache stamps its
//! commits with [`ReplicatedVersion`], a distributed (partially replicated) cache
//! with [`DistributedVersion`]. They are ordered by `value`, then by `view_id`.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::version::Comparison;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicatedVersion {
    pub view_id: u64,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributedVersion {
    pub view_id: u64,
    pub value: i64,
}

impl ReplicatedVersion {
    pub fn new(view_id: u64, value: i64) -> Self {
        Self { view_id, value }
    }
}

impl DistributedVersion {
    pub fn new(view_id: u64, value: i64) -> Self {
        Self { view_id, value }
    }
}

/// Compare two `(value, view_id)` pairs of scalar versions.
pub(crate) fn compare_scalar(left: (i64, u64), right: (i64, u64)) -> Comparison {
    Comparison::from(left.cmp(&right))
}

impl fmt::Display for ReplicatedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Replicated({}, view={})", self.value, self.view_id)
    }
}

impl fmt::Display for DistributedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Distributed({}, view={})", self.value, self.view_id)
    }
}
