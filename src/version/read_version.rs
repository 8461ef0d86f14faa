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

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::version::CacheEntryVersion;
use crate::version::Comparison;

/// The snapshot bound of a reading transaction.
///
/// A write `(value, sub_version)` is visible to it iff `value <= self.value` and
/// the pair is not listed in `not_visible`. The exclusion set holds writes that
/// carry a small enough value but were committed locally after the point the
/// snapshot was taken at.
///
/// A bound taken from the commit log is pinned to the sub-version of the entry
/// it was taken at: writes with the same value and a greater sub-version are
/// committed after it and are never visible, even if they are logged after the
/// exclusion set was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadVersion {
    pub view_id: u64,
    pub value: i64,
    #[serde(default)]
    pub max_sub_version: Option<i32>,
    pub not_visible: BTreeSet<(i64, i32)>,
}

impl ReadVersion {
    pub fn new(view_id: u64, value: i64) -> Self {
        Self {
            view_id,
            value,
            max_sub_version: None,
            not_visible: BTreeSet::new(),
        }
    }

    /// A bound that admits writes up to `(value, max_sub_version)`.
    pub fn pinned(view_id: u64, value: i64, max_sub_version: i32) -> Self {
        Self {
            max_sub_version: Some(max_sub_version),
            ..Self::new(view_id, value)
        }
    }

    /// A bound that every committed write is visible to.
    pub fn unbounded(view_id: u64) -> Self {
        Self::new(view_id, i64::MAX)
    }

    pub fn add_not_visible(&mut self, value: i64, sub_version: i32) {
        self.not_visible.insert((value, sub_version));
    }

    /// The newest `(value, sub_version)` this bound admits, before exclusions.
    pub(crate) fn position(&self) -> (i64, i32) {
        (self.value, self.max_sub_version.unwrap_or(i32::MAX))
    }

    pub(crate) fn set_position(&mut self, (value, sub_version): (i64, i32)) {
        self.value = value;
        self.max_sub_version = (sub_version != i32::MAX).then_some(sub_version);
    }

    pub fn is_visible(&self, entry: &CacheEntryVersion) -> bool {
        entry.order_key() <= self.position() && !self.not_visible.contains(&entry.order_key())
    }

    /// Compare a write against this bound, with the write on the left.
    pub(crate) fn compare_entry(&self, entry: &CacheEntryVersion) -> Comparison {
        if self.not_visible.contains(&entry.order_key()) || entry.order_key() > self.position() {
            return Comparison::After;
        }
        Comparison::from(entry.value.cmp(&self.value))
    }
}

impl fmt::Display for ReadVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_sub_version {
            Some(sub) => write!(f, "Read({}.{}, view={}", self.value, sub, self.view_id)?,
            None => write!(f, "Read({}, view={}", self.value, self.view_id)?,
        }
        if !self.not_visible.is_empty() {
            write!(f, ", not_visible=[")?;
            for (i, (v, s)) in self.not_visible.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}.{}", v, s)?;
            }
            write!(f, "]")?;
        }
        write!(f, ")")
    }
}
