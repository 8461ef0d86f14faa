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

use serde::Deserialize;
use serde::Serialize;

use crate::version::Address;

/// An immutable, indexed list of the members of one membership view.
///
/// Version stamps refer to members by their index in the snapshot of the view
/// they were computed under, so a snapshot must stay cached for as long as any
/// version stamped with its `view_id` is alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    view_id: u64,
    members: Vec<Address>,
}

impl ClusterSnapshot {
    /// Build a snapshot; duplicated addresses keep their first position.
    pub fn new(view_id: u64, members: impl IntoIterator<Item = Address>) -> Self {
        let mut unique: Vec<Address> = Vec::new();
        for m in members {
            if !unique.contains(&m) {
                unique.push(m);
            }
        }

        Self {
            view_id,
            members: unique,
        }
    }

    pub fn view_id(&self) -> u64 {
        self.view_id
    }

    /// Return the index of `addr` in this view, if it is a member.
    pub fn index(&self, addr: &Address) -> Option<usize> {
        self.members.iter().position(|m| m == addr)
    }

    pub fn get(&self, index: usize) -> Option<&Address> {
        self.members.get(index)
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.index(addr).is_some()
    }

    pub fn members(&self) -> &[Address] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(names: &[&str]) -> Vec<Address> {
        names.iter().map(|n| Address::new(n)).collect()
    }

    #[test]
    fn test_index_and_get() {
        let snapshot = ClusterSnapshot::new(3, addrs(&["a", "b", "c"]));

        assert_eq!(snapshot.view_id(), 3);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.index(&Address::new("b")), Some(1));
        assert_eq!(snapshot.index(&Address::new("x")), None);
        assert_eq!(snapshot.get(2), Some(&Address::new("c")));
        assert_eq!(snapshot.get(3), None);
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let snapshot = ClusterSnapshot::new(1, addrs(&["a", "b", "a", "c"]));

        assert_eq!(snapshot.members(), addrs(&["a", "b", "c"]).as_slice());
        assert_eq!(snapshot.index(&Address::new("c")), Some(2));
    }

    #[test]
    fn test_empty() {
        let snapshot = ClusterSnapshot::new(0, vec![]);
        assert!(snapshot.is_empty());
        assert!(!snapshot.contains(&Address::new("a")));
    }
}
