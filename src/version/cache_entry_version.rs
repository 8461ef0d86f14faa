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

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::version::Comparison;

/// Identifies one committed write to one key.
///
/// Ordered by `(value, sub_version)`. `view_id` records the membership view the
/// write was committed under and does not take part in the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheEntryVersion {
    pub view_id: u64,
    pub value: i64,
    pub sub_version: i32,
}

impl CacheEntryVersion {
    pub fn new(view_id: u64, value: i64, sub_version: i32) -> Self {
        Self {
            view_id,
            value,
            sub_version,
        }
    }

    /// The position of this write in a per-key chain.
    pub fn order_key(&self) -> (i64, i32) {
        (self.value, self.sub_version)
    }

    pub fn compare(&self, other: &CacheEntryVersion) -> Comparison {
        Comparison::from(self.order_key().cmp(&other.order_key()))
    }
}

impl fmt::Display for CacheEntryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheEntry({}.{}, view={})",
            self.value, self.sub_version, self.view_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_ignores_view_id() {
        let a = CacheEntryVersion::new(1, 5, 0);
        let b = CacheEntryVersion::new(9, 5, 0);
        assert_eq!(a.compare(&b), Comparison::Equal);
    }

    #[test]
    fn test_compare_sub_version() {
        let a = CacheEntryVersion::new(1, 5, 0);
        let b = CacheEntryVersion::new(1, 5, 1);
        let c = CacheEntryVersion::new(1, 6, 0);

        assert_eq!(a.compare(&b), Comparison::Before);
        assert_eq!(b.compare(&a), Comparison::After);
        assert_eq!(b.compare(&c), Comparison::Before);
    }
}
