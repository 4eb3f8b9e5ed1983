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

use std::{
    hash::{BuildHasher, Hash},
    sync::Arc,
};

use equivalent::Equivalent;
use hashbrown::{hash_map::Entry as HashMapEntry, HashMap};
use recache_common::code::Entry;

use crate::slab::Token;

/// A stored entry and the token of its occurrence in the recency history.
///
/// The token is a non-owning back reference: the table never patches history links itself.
#[derive(Debug)]
pub struct Record<E> {
    pub entry: Arc<E>,
    pub token: Token,
}

/// Mapping from key to stored record.
pub struct EntryTable<E, S>
where
    E: Entry,
{
    map: HashMap<E::Key, Record<E>, S>,
}

impl<E, S> EntryTable<E, S>
where
    E: Entry,
    S: BuildHasher,
{
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            map: HashMap::with_hasher(hash_builder),
        }
    }

    /// Store `entry` under its key.
    ///
    /// For a new key, `track` is called to create its occurrence and `None` is returned. For a resident key, the
    /// entry is replaced in place, the occurrence is reused, and the previous entry is returned with that token.
    pub fn insert_or_overwrite(
        &mut self,
        entry: Arc<E>,
        track: impl FnOnce(&E::Key) -> Token,
    ) -> Option<(Arc<E>, Token)> {
        match self.map.entry(entry.key().clone()) {
            HashMapEntry::Occupied(mut o) => {
                let record = o.get_mut();
                let old = std::mem::replace(&mut record.entry, entry);
                Some((old, record.token))
            }
            HashMapEntry::Vacant(v) => {
                let token = track(v.key());
                v.insert(Record { entry, token });
                None
            }
        }
    }

    pub fn lookup<Q>(&self, key: &Q) -> Option<&Record<E>>
    where
        Q: Hash + Equivalent<E::Key> + ?Sized,
    {
        self.map.get(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<Record<E>>
    where
        Q: Hash + Equivalent<E::Key> + ?Sized,
    {
        self.map.remove(key)
    }

    /// Remove the record of `key` only if it still owns the occurrence of `token`.
    pub fn remove_if_token(&mut self, key: &E::Key, token: Token) -> Option<Record<E>> {
        match self.map.get(key) {
            Some(record) if record.token == token => self.map.remove(key),
            _ => None,
        }
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Record<E>> + '_ {
        self.map.drain().map(|(_, record)| record)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record<E>> {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
