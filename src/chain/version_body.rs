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

use crate::version::CacheEntryVersion;

/// One historical value of a key.
///
/// A `None` value is a tombstone left by a removal. The end of the validity
/// interval is not stored: it is the version of the next newer body of the
/// same chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionBody<V> {
    pub version: CacheEntryVersion,
    pub value: Option<V>,

    /// Absolute expiry time in unix milliseconds, for shadow copies of
    /// entries owned elsewhere.
    pub expires_at_ms: Option<u64>,
}

impl<V> VersionBody<V> {
    pub fn new(version: CacheEntryVersion, value: V) -> Self {
        Self {
            version,
            value: Some(value),
            expires_at_ms: None,
        }
    }

    pub fn tombstone(version: CacheEntryVersion) -> Self {
        Self {
            version,
            value: None,
            expires_at_ms: None,
        }
    }

    pub fn with_expiry(mut self, expires_at_ms: Option<u64>) -> Self {
        self.expires_at_ms = expires_at_ms;
        self
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|t| t <= now_ms)
    }
}
