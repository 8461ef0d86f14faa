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

use crate::config::VersioningScheme;
use crate::errors::VersionError;
use crate::policy::CommitContext;
use crate::policy::CommitContextPolicy;
use crate::policy::CommitDecision;
use crate::policy::CommitEntry;
use crate::policy::OwnershipGate;

/// Entries are stored with the agreed commit version of the transaction.
#[derive(Debug, Clone)]
pub struct GmuPolicy {
    gate: OwnershipGate,
}

impl GmuPolicy {
    pub fn new(gate: OwnershipGate) -> Self {
        Self { gate }
    }
}

impl<K> CommitContextPolicy<K> for GmuPolicy {
    fn scheme(&self) -> VersioningScheme {
        VersioningScheme::Gmu
    }

    fn decide(
        &self,
        entry: &CommitEntry<K>,
        ctx: &CommitContext<'_, K>,
    ) -> Result<CommitDecision, VersionError> {
        Ok(CommitDecision {
            version: Some(ctx.transaction_version.clone()),
            apply: self.gate.check(entry, ctx.locality),
        })
    }
}
