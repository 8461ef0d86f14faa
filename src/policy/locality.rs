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

/// Tells whether this node owns a key.
///
/// Supplied by the data placement layer. A closure `Fn(&K) -> bool` is a
/// locality.
pub trait Locality<K>
where Self: Send + Sync
{
    fn is_local(&self, key: &K) -> bool;
}

impl<K, F> Locality<K> for F
where F: Fn(&K) -> bool + Send + Sync
{
    fn is_local(&self, key: &K) -> bool {
        self(key)
    }
}

/// Every key is owned locally, as in a fully replicated cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllLocal;

impl<K> Locality<K> for AllLocal {
    fn is_local(&self, _key: &K) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_locality() {
        let even = |k: &u64| k % 2 == 0;
        assert!(even.is_local(&2));
        assert!(!even.is_local(&3));
        assert!(Locality::<u64>::is_local(&AllLocal, &3));
    }
}
