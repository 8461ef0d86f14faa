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

/// Trait for types that can be used as cache keys.
///
/// Keys are ordered so that affected-key sets and the chain index iterate
/// deterministically, and are shared across worker threads.
///
/// Implemented for every type meeting the bounds, e.g. `String` or `u64`.
pub trait GmuKey
where Self: Clone + Ord + fmt::Debug + Send + Sync + 'static
{
}

impl<K> GmuKey for K where K: Clone + Ord + fmt::Debug + Send + Sync + 'static {}

/// Trait for types that can be stored as versioned cache values.
///
/// A value is cloned out of its chain on every read, so it should be cheap to
/// clone, e.g. an `Arc` or a small buffer.
pub trait GmuValue: fmt::Debug + Clone + Send + Sync + 'static {}

impl<V> GmuValue for V where V: fmt::Debug + Clone + Send + Sync + 'static {}
