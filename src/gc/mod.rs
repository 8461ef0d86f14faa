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

//! Cluster-wide garbage collection of history.
//!
//! A coordinator asks every member for the oldest version (or view id) it
//! still needs, takes the minimum over the answers and broadcasts it as the
//! cutoff. Members that do not answer are left out of the minimum and logged.
//! If other members exist and none of them answered, the round is skipped.

mod command;
mod participant;
mod transport;

use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

pub use command::GcCommand;
pub use command::GcReply;
use futures::future::select;
use futures::future::Either;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use log::info;
use log::warn;
pub use participant::GcParticipant;
pub use transport::GcTransport;

use crate::config::GmuConfig;
use crate::errors::GcError;
use crate::version::Address;

/// Answer a garbage collection command on a member.
pub fn handle(participant: &dyn GcParticipant, command: GcCommand) -> Result<GcReply, GcError> {
    let reply = match command {
        GcCommand::GetVersion => GcReply::Version(participant.minimum_version()?),
        GcCommand::GetViewId => GcReply::ViewId(participant.minimum_view_id()?),
        GcCommand::SetViewId(min_view_id) => {
            participant.gc_view_ids(min_view_id);
            GcReply::Done
        }
        GcCommand::SetVersion(cutoff) => {
            participant.gc_versions(cutoff)?;
            GcReply::Done
        }
    };
    Ok(reply)
}

pub struct GarbageCollector {
    local: Address,
    /// Period of the rounds driven by `run_periodically`, `None` disables them.
    interval: Option<Duration>,
    participant: Arc<dyn GcParticipant>,
    transport: Arc<dyn GcTransport>,
}

impl GarbageCollector {
    pub fn new(
        config: &GmuConfig,
        local: Address,
        participant: Arc<dyn GcParticipant>,
        transport: Arc<dyn GcTransport>,
    ) -> Self {
        Self {
            local,
            interval: config.gc_interval,
            participant,
            transport,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Answer a command sent by the coordinator.
    pub fn handle(&self, command: GcCommand) -> Result<GcReply, GcError> {
        handle(self.participant.as_ref(), command)
    }

    fn remote_members(&self) -> Vec<Address> {
        self.transport
            .members()
            .into_iter()
            .filter(|m| m != &self.local)
            .collect()
    }

    /// Send `command` to every member in `members`, concurrently.
    ///
    /// Returns the replies received; failures are logged and left out.
    async fn fan_out(&self, members: Vec<Address>, command: GcCommand) -> Vec<(Address, GcReply)> {
        let mut pending = members
            .into_iter()
            .map(|member| async move {
                let res = self.transport.send(&member, command).await;
                (member, res)
            })
            .collect::<FuturesUnordered<_>>();

        let mut replies = Vec::new();
        while let Some((member, res)) = pending.next().await {
            match res {
                Ok(reply) => replies.push((member, reply)),
                Err(e) => warn!("gc: {} did not answer {}: {}", member, command, e),
            }
        }
        replies
    }

    /// Query every member with `command`, and reduce the answers to their min.
    ///
    /// Returns `None` if the round has to be skipped.
    async fn collect_minimum<T>(
        &self,
        command: GcCommand,
        local: T,
        extract: impl Fn(GcReply, GcCommand) -> Result<T, GcError>,
    ) -> Option<T>
    where
        T: Ord + Copy + fmt::Display,
    {
        let remote = self.remote_members();
        let asked = remote.len();
        let replies = self.fan_out(remote, command).await;

        let mut min = local;
        let mut answered = 0;
        for (member, reply) in replies {
            match extract(reply, command) {
                Ok(v) => {
                    min = min.min(v);
                    answered += 1;
                }
                Err(e) => warn!("gc: ignore reply of {}: {}", member, e),
            }
        }

        if asked > 0 && answered == 0 {
            warn!(
                "gc: none of {} members answered {}, skip this round",
                asked, command
            );
            return None;
        }

        if answered < asked {
            warn!(
                "gc: {} of {} members answered {}, local={} min={}",
                answered, asked, command, local, min
            );
        }
        Some(min)
    }

    /// Broadcast `command` and apply it locally.
    async fn broadcast(&self, command: GcCommand) -> Result<(), GcError> {
        self.handle(command)?;

        let remote = self.remote_members();
        let asked = remote.len();
        let replies = self.fan_out(remote, command).await;
        if replies.len() < asked {
            warn!(
                "gc: {} of {} members acknowledged {}",
                replies.len(),
                asked,
                command
            );
        }
        Ok(())
    }

    /// Run one round of version garbage collection as the coordinator.
    ///
    /// Returns the cutoff that was applied, `None` if the round was skipped.
    pub async fn run_version_gc(&self) -> Result<Option<i64>, GcError> {
        let local = self.participant.minimum_version()?;
        let Some(cutoff) = self
            .collect_minimum(GcCommand::GetVersion, local, GcReply::into_version)
            .await
        else {
            return Ok(None);
        };

        info!("gc: version cutoff {}", cutoff);
        self.broadcast(GcCommand::SetVersion(cutoff)).await?;
        Ok(Some(cutoff))
    }

    /// Run one round of view id garbage collection as the coordinator.
    pub async fn run_view_id_gc(&self) -> Result<Option<u64>, GcError> {
        let local = self.participant.minimum_view_id()?;
        let Some(min_view_id) = self
            .collect_minimum(GcCommand::GetViewId, local, GcReply::into_view_id)
            .await
        else {
            return Ok(None);
        };

        info!("gc: view id cutoff {}", min_view_id);
        self.broadcast(GcCommand::SetViewId(min_view_id)).await?;
        Ok(Some(min_view_id))
    }

    /// Run both rounds once every configured interval, until `shutdown` completes.
    ///
    /// Returns at once if no interval is configured. Not tied to a runtime:
    /// `sleep` is e.g. `tokio::time::sleep`.
    pub async fn run_periodically<S, Fut>(&self, mut sleep: S, shutdown: impl Future<Output = ()>)
    where
        S: FnMut(Duration) -> Fut,
        Fut: Future<Output = ()>,
    {
        let Some(interval) = self.interval else {
            info!("gc: no interval configured on {}, periodic rounds disabled", self.local);
            return;
        };

        let mut shutdown = pin!(shutdown);

        loop {
            let tick = pin!(sleep(interval));
            if let Either::Left(_) = select(shutdown.as_mut(), tick).await {
                info!("gc: stopped on {}", self.local);
                return;
            }

            if let Err(e) = self.run_version_gc().await {
                warn!("gc: version round failed: {}", e);
            }
            if let Err(e) = self.run_view_id_gc().await {
                warn!("gc: view id round failed: {}", e);
            }
        }
    }
}
