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

use crate::errors::GcError;

/// Control messages of the garbage collection protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GcCommand {
    /// Ask for the oldest commit version the member still needs.
    GetVersion,

    /// Ask for the oldest view id the member still needs.
    GetViewId,

    /// Drop cluster snapshots of views older than the payload.
    SetViewId(u64),

    /// Drop history no snapshot at or after the payload can read.
    SetVersion(i64),
}

impl fmt::Display for GcCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcCommand::GetVersion => write!(f, "GET_VERSION"),
            GcCommand::GetViewId => write!(f, "GET_VIEW_ID"),
            GcCommand::SetViewId(v) => write!(f, "SET_VIEW_ID({})", v),
            GcCommand::SetVersion(v) => write!(f, "SET_VERSION({})", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GcReply {
    Version(i64),
    ViewId(u64),
    Done,
}

impl fmt::Display for GcReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcReply::Version(v) => write!(f, "Version({})", v),
            GcReply::ViewId(v) => write!(f, "ViewId({})", v),
            GcReply::Done => write!(f, "Done"),
        }
    }
}

impl GcReply {
    pub fn into_version(self, command: GcCommand) -> Result<i64, GcError> {
        match self {
            GcReply::Version(v) => Ok(v),
            other => Err(unexpected(command, other)),
        }
    }

    pub fn into_view_id(self, command: GcCommand) -> Result<u64, GcError> {
        match self {
            GcReply::ViewId(v) => Ok(v),
            other => Err(unexpected(command, other)),
        }
    }
}

fn unexpected(command: GcCommand, reply: GcReply) -> GcError {
    GcError::UnexpectedReply {
        command: command.to_string(),
        reply: reply.to_string(),
    }
}
