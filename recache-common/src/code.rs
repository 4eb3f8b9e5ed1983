// Copyright 2026 recache Project Authors
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

use std::{fmt::Debug, hash::Hash, sync::Arc};

/// Key trait for the cache.
///
/// Keys are cloned into the recency history, so they should be cheap to clone
/// (e.g. short strings, integers or `Arc<str>`).
pub trait Key: Send + Sync + 'static + Hash + Eq + PartialEq + Clone + Debug {}
impl<T: Send + Sync + 'static + Hash + Eq + PartialEq + Clone + Debug> Key for T {}

/// The capability the cache requires from a stored value.
///
/// The cache never interprets the value; it only reads the key to index the entry and the size to charge it
/// against the capacity.
pub trait Entry: Send + Sync + 'static {
    /// Associated key type.
    type Key: Key;

    /// A stable key, unique per logical item.
    fn key(&self) -> &Self::Key;

    /// The cost charged against the cache capacity.
    fn size(&self) -> usize;
}

impl<T> Entry for Arc<T>
where
    T: Entry,
{
    type Key = T::Key;

    fn key(&self) -> &Self::Key {
        self.as_ref().key()
    }

    fn size(&self) -> usize {
        self.as_ref().size()
    }
}

impl<T> Entry for Box<T>
where
    T: Entry,
{
    type Key = T::Key;

    fn key(&self) -> &Self::Key {
        self.as_ref().key()
    }

    fn size(&self) -> usize {
        self.as_ref().size()
    }
}
