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

use std::io;

use crate::gc::GcCommand;
use crate::gc::GcReply;
use crate::version::Address;

/// Request/reply primitive the garbage collector talks to other members with.
#[async_trait::async_trait]
pub trait GcTransport
where Self: Send + Sync
{
    /// Members of the current view, this member included.
    fn members(&self) -> Vec<Address>;

    /// Send `command` to `member` and wait for its reply.
    ///
    /// An error means the member did not answer, e.g. it left the view or timed out.
    async fn send(&self, member: &Address, command: GcCommand) -> Result<GcReply, io::Error>;
}
