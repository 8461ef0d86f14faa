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

//! # GMU MVCC
//!
//! The multiversion concurrency control core of a partitioned, replicated
//! in-memory key-value store.
//!
//! Every member keeps a commit log of the versions it has applied and a chain
//! of versions per key. A transaction reads from a snapshot bound that is
//! consistent across the members it reads from, and is validated against the
//! versions committed after it at prepare time.
//!
//! ## Core Components
//!
//! - [`Version`]: the version stamps and their partial order.
//! - [`VersionGenerator`]: version arithmetic of the configured cache mode.
//! - [`CommitLog`]: the ordered log of committed versions of a member.
//! - [`DataContainer`]: per-key version chains.
//! - [`GmuEngine`]: ties the above together for one member.
//! - [`GarbageCollector`]: cluster-wide history garbage collection.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use gmu_mvcc::policy::AllLocal;
//! use gmu_mvcc::Address;
//! use gmu_mvcc::ClusterSnapshot;
//! use gmu_mvcc::GmuConfig;
//! use gmu_mvcc::GmuEngine;
//!
//! fn main() -> Result<(), gmu_mvcc::TxError> {
//!     let view = ClusterSnapshot::new(1, vec![Address::new("a")]);
//!     let engine: GmuEngine<String, String> =
//!         GmuEngine::new(GmuConfig::new(), Address::new("a"), view, Arc::new(AllLocal));
//!
//!     let prepare = engine.prepare_version()?;
//!     let agreed = engine.commit(&prepare, &[Address::new("a")])?;
//!     engine.apply_commit("k".to_string(), Some("v".to_string()), &agreed)?;
//!
//!     let mut tx = engine.begin_transaction()?;
//!     let v = engine.read_in(&mut tx, &"k".to_string())?;
//!     assert_eq!(v, Some("v".to_string()));
//!     Ok(())
//! }
//! ```

pub mod chain;
pub mod commit_log;
pub mod config;
pub mod engine;
pub mod errors;
pub mod gc;
pub mod generator;
pub mod keys;
pub mod policy;
pub mod transaction;
pub mod version;

mod util;


pub use crate::chain::DataContainer;
pub use crate::chain::GmuCacheEntry;
pub use crate::chain::GmuCacheValue;
pub use crate::commit_log::CommitLog;
pub use crate::config::CacheMode;
pub use crate::config::GmuConfig;
pub use crate::config::VersioningScheme;
pub use crate::engine::GmuEngine;
pub use crate::errors::TxError;
pub use crate::errors::VersionError;
pub use crate::gc::GarbageCollector;
pub use crate::generator::VersionGenerator;
pub use crate::keys::GmuKey;
pub use crate::keys::GmuValue;
pub use crate::transaction::Transaction;
pub use crate::util::now_ms;
pub use crate::version::Address;
pub use crate::version::CacheEntryVersion;
pub use crate::version::ClusterSnapshot;
pub use crate::version::ReadVersion;
pub use crate::version::Version;
