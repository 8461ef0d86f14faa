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

use log::info;

use crate::engine::GmuEngine;
use crate::errors::TxError;
use crate::errors::VersionError;
use crate::keys::GmuKey;
use crate::keys::GmuValue;
use crate::version::Version;

/// The node-side of the garbage collection protocol.
pub trait GcParticipant
where Self: Send + Sync
{
    /// Value of the oldest commit version this member still needs.
    fn minimum_version(&self) -> Result<i64, TxError>;

    /// The oldest view id this member still needs.
    fn minimum_view_id(&self) -> Result<u64, TxError>;

    /// Discard history older than commit value `cutoff`.
    fn gc_versions(&self, cutoff: i64) -> Result<usize, TxError>;

    /// Discard cluster snapshots of views older than `min_view_id`.
    fn gc_view_ids(&self, min_view_id: u64) -> usize;
}

impl<K, V> GcParticipant for GmuEngine<K, V>
where
    K: GmuKey,
    V: GmuValue,
{
    fn minimum_version(&self) -> Result<i64, TxError> {
        let min = self.local_minimum_version()?;
        let value = min.value().ok_or(VersionError::Unexpected {
            expected: "commit",
            found: min.kind(),
        })?;
        Ok(value)
    }

    fn minimum_view_id(&self) -> Result<u64, TxError> {
        self.local_minimum_view_id()
    }

    /// The cutoff is stamped with the oldest known view, which makes it the
    /// oldest commit version with value `cutoff`.
    ///
    /// A member whose answer to the query got lost still receives the cutoff,
    /// so it is clamped to what running transactions of this member read.
    fn gc_versions(&self, cutoff: i64) -> Result<usize, TxError> {
        let snapshots = self.generator().cluster_snapshots();
        let oldest_view = snapshots.view_ids().first().copied();
        let view_id = oldest_view.unwrap_or_else(|| snapshots.current_view_id());

        let requested = self.generator().scalar(view_id, cutoff);
        let requested = self.commit_log().get_read_version(&requested)?;
        let local = self.commit_log().get_read_version(&self.local_minimum_version()?)?;

        if local.position() < requested.position() {
            info!("gc: cutoff {} clamped to local minimum {}", requested, local);
        }

        let bound = self
            .generator()
            .merge_and_min(&[Version::Read(requested), Version::Read(local)])?;
        self.gc(&bound)
    }

    fn gc_view_ids(&self, min_view_id: u64) -> usize {
        self.generator().cluster_snapshots().gc(min_view_id)
    }
}
