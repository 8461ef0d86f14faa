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

//! Errors of the multiversion core.
//!
//! [`TxError::ValidationConflict`] and [`TxError::VersionNotAvailable`] abort the
//! transaction and may be retried by the caller. Everything else is an internal
//! invariant violation or a misconfiguration.

use crate::config::VersioningScheme;
use crate::version::CacheEntryVersion;
use crate::version::Version;
use crate::version::VersionKind;

/// Errors of the version algebra. All of them are fatal.
#[derive(Clone, PartialEq, Eq, thiserror::Error, Debug)]
pub enum VersionError {
    #[error("Incomparable: a {left} version can not be compared with a {right} version")]
    Incomparable {
        left: VersionKind,
        right: VersionKind,
    },

    /// The cluster snapshot of a view is not cached locally.
    #[error("UnknownViewId: no cluster snapshot for view id {0}")]
    UnknownViewId(u64),

    #[error("UnknownMember: {member} is not a member of view {view_id}")]
    UnknownMember { view_id: u64, member: String },

    #[error("UnknownMemberIndex: index {index} is out of range in view {view_id}")]
    UnknownMemberIndex { view_id: u64, index: usize },

    #[error("NoAffectedOwners: a distributed commit version needs at least one owner")]
    NoAffectedOwners,

    /// The write-skew check did not precompute a version for a written key.
    #[error("NoUpdatedVersion: no precomputed version for key {key}")]
    NoUpdatedVersion { key: String },

    #[error("Unexpected: expected a {expected} version, found {found}")]
    Unexpected {
        expected: &'static str,
        found: VersionKind,
    },

    #[error("Overflow: version {0} can not be incremented")]
    Overflow(i64),
}

/// Errors of the per-node commit log.
#[derive(Clone, PartialEq, Eq, thiserror::Error, Debug)]
pub enum CommitLogError {
    #[error("NotStarted: the commit log has not been seeded with a first version")]
    NotStarted,

    /// Committed versions must be inserted in commit order.
    ///
    /// Equal versions are only allowed with a strictly greater sub-version.
    #[error("NonIncremental: current={current}.{current_sub} > last={last}.{last_sub} does not hold")]
    NonIncremental {
        last: Version,
        last_sub: i32,
        current: Version,
        current_sub: i32,
    },

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Errors of inserting into a per-key version chain.
#[derive(Clone, PartialEq, Eq, thiserror::Error, Debug)]
pub enum ChainInsertError {
    /// The incoming write is older than the most recent write of the key.
    #[error("OutOfOrder: current={current} is older than head={head}")]
    OutOfOrder {
        head: CacheEntryVersion,
        current: CacheEntryVersion,
    },
}

/// Errors surfaced to a transaction.
#[derive(Clone, PartialEq, Eq, thiserror::Error, Debug)]
pub enum TxError {
    /// A key in the read set was overwritten after the snapshot was taken.
    #[error("ValidationConflict: key {key} was overwritten by a newer commit")]
    ValidationConflict { key: String },

    /// No value satisfying the requested version window could be produced.
    #[error("VersionNotAvailable: {reason}, requested: {requested}")]
    VersionNotAvailable { requested: Version, reason: String },

    #[error("EngineDisabled: multiversion snapshots are not enabled with versioning scheme {scheme:?}")]
    EngineDisabled { scheme: VersioningScheme },

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    CommitLog(#[from] CommitLogError),

    #[error(transparent)]
    ChainInsert(#[from] ChainInsertError),
}

impl TxError {
    /// Whether the transaction should be aborted and may be retried.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            TxError::ValidationConflict { .. } | TxError::VersionNotAvailable { .. }
        )
    }
}

/// Errors of the garbage collection protocol.
#[derive(Clone, PartialEq, Eq, thiserror::Error, Debug)]
pub enum GcError {
    #[error("UnexpectedReply: {command} was answered with {reply}")]
    UnexpectedReply { command: String, reply: String },

    #[error(transparent)]
    Engine(#[from] TxError),
}

impl From<VersionError> for GcError {
    fn from(e: VersionError) -> Self {
        GcError::Engine(TxError::Version(e))
    }
}

impl From<CommitLogError> for GcError {
    fn from(e: CommitLogError) -> Self {
        GcError::Engine(TxError::CommitLog(e))
    }
}
