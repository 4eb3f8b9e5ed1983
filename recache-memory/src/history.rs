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

use recache_common::{strict_assert, strict_assert_eq};

use crate::slab::{Slab, Token};

/// One tracked appearance of a key in the recency order.
#[derive(Debug)]
struct Occurrence<K> {
    key: K,

    /// The neighbour closer to the head.
    newer: Option<Token>,
    /// The neighbour closer to the tail.
    older: Option<Token>,
}

/// Recency-ordered history of occurrences.
///
/// The most recent occurrence is the head, the least recent one is the tail. A new occurrence joins the history at
/// the head, a recurrence moves an old occurrence back to the head, and forgetting pops the tail. All of them are
/// O(1).
///
/// Occurrences live in a generational slab and are addressed by [`Token`]s. A token of an occurrence that has been
/// forgotten is stale and every operation taking it is a no-op.
#[derive(Debug)]
pub struct RecencyHistory<K> {
    slab: Slab<Occurrence<K>>,
    head: Option<Token>,
    tail: Option<Token>,
}

impl<K> Default for RecencyHistory<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> RecencyHistory<K> {
    /// Create an empty history.
    pub const fn new() -> Self {
        Self {
            slab: Slab::new(),
            head: None,
            tail: None,
        }
    }

    /// Create an empty history with room for `capacity` occurrences.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slab: Slab::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    /// Push a new occurrence of `key` to the head.
    ///
    /// The returned token is the only way to promote or detach this occurrence later.
    pub fn track(&mut self, key: K) -> Token {
        let token = self.slab.insert(Occurrence {
            key,
            newer: None,
            older: None,
        });
        self.link_head(token);
        token
    }

    /// Promote the occurrence of `token` back to the head.
    ///
    /// No-op if the occurrence is already the head or if the token is stale.
    pub fn recur(&mut self, token: Token) {
        if self.head == Some(token) || !self.slab.contains(token) {
            return;
        }
        self.unlink(token);
        self.link_head(token);
    }

    /// Pop the oldest occurrence and return its key.
    pub fn forget(&mut self) -> Option<K> {
        self.pop().map(|(_, key)| key)
    }

    /// Pop the oldest occurrence and return its token and key.
    pub fn pop(&mut self) -> Option<(Token, K)> {
        let token = self.tail?;
        self.detach(token).map(|key| (token, key))
    }

    /// Remove the occurrence of `token` wherever it is.
    ///
    /// Returns `None` if the token is stale.
    pub fn detach(&mut self, token: Token) -> Option<K> {
        if !self.slab.contains(token) {
            return None;
        }
        self.unlink(token);
        self.slab.remove(token).map(|occurrence| occurrence.key)
    }

    /// Peek the latest and the oldest keys.
    pub fn bookends(&self) -> (Option<&K>, Option<&K>) {
        let key = |token: Option<Token>| token.and_then(|token| self.slab.get(token)).map(|o| &o.key);
        (key(self.head), key(self.tail))
    }

    /// Iterate the `n` latest keys, the most recent first.
    pub fn latest(&self, n: usize) -> Latest<'_, K> {
        Latest {
            history: self,
            token: self.head,
            remaining: n,
        }
    }

    /// Key of the occurrence of `token`, if the token is not stale.
    pub fn get(&self, token: Token) -> Option<&K> {
        self.slab.get(token).map(|occurrence| &occurrence.key)
    }

    /// Returns `true` if the token refers to a live occurrence.
    pub fn contains(&self, token: Token) -> bool {
        self.slab.contains(token)
    }

    /// Count of live occurrences.
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    /// Returns `true` if the history has no occurrence.
    pub fn is_empty(&self) -> bool {
        strict_assert_eq!(self.head.is_none(), self.tail.is_none());
        self.head.is_none()
    }

    /// Forget every occurrence. All issued tokens become stale.
    pub fn clear(&mut self) {
        self.slab.clear();
        self.head = None;
        self.tail = None;
    }

    fn link_head(&mut self, token: Token) {
        strict_assert!(self.slab.contains(token));
        let head = self.head;

        if let Some(occurrence) = self.slab.get_mut(token) {
            occurrence.newer = None;
            occurrence.older = head;
        }

        match head.and_then(|head| self.slab.get_mut(head)) {
            Some(old) => old.newer = Some(token),
            None => self.tail = Some(token),
        }

        self.head = Some(token);
    }

    /// Patch the neighbours of `token` so that they skip it, and move the bookends if needed.
    fn unlink(&mut self, token: Token) {
        let Some(occurrence) = self.slab.get_mut(token) else {
            return;
        };
        let (newer, older) = (occurrence.newer.take(), occurrence.older.take());

        match newer.and_then(|newer| self.slab.get_mut(newer)) {
            Some(n) => n.older = older,
            None => {
                strict_assert_eq!(self.head, Some(token));
                self.head = older;
            }
        }

        match older.and_then(|older| self.slab.get_mut(older)) {
            Some(o) => o.newer = newer,
            None => {
                strict_assert_eq!(self.tail, Some(token));
                self.tail = newer;
            }
        }
    }
}

/// Lazy iterator over the latest keys of a [`RecencyHistory`].
#[derive(Debug)]
pub struct Latest<'a, K> {
    history: &'a RecencyHistory<K>,
    token: Option<Token>,
    remaining: usize,
}

impl<'a, K> Iterator for Latest<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let occurrence = self.history.slab.get(self.token?)?;
        self.token = occurrence.older;
        self.remaining -= 1;
        Some(&occurrence.key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = self.remaining.min(self.history.len());
        (0, Some(upper))
    }
}
