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

//! A generational slab arena.
//!
//! Every slot carries a generation that is bumped whenever the slot is vacated. A [`Token`] remembers the
//! generation it was issued with, so a token that outlived its value never resolves, even after the slot has been
//! reused by another value.

/// Stable address of a value inside a [`Slab`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    index: u32,
    generation: u32,
}

impl Token {
    /// Slot index of the token.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Generation of the slot at the time the token was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone)]
enum Entry<T> {
    Vacant(Option<u32>),
    Occupied(T),
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    entry: Entry<T>,
}

/// Arena of values addressed by generational [`Token`]s.
#[derive(Debug)]
pub struct Slab<T> {
    slots: Vec<Slot<T>>,
    len: usize,
    /// Head of the vacant slot free list.
    next: Option<u32>,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            len: 0,
            next: None,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            len: 0,
            next: None,
        }
    }

    pub fn insert(&mut self, val: T) -> Token {
        self.len += 1;

        match self.next {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                self.next = match slot.entry {
                    Entry::Vacant(next) => next,
                    Entry::Occupied(_) => unreachable!("free list points to an occupied slot"),
                };
                slot.entry = Entry::Occupied(val);
                Token {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).expect("slab must NOT exceed `u32::MAX` slots.");
                self.slots.push(Slot {
                    generation: 0,
                    entry: Entry::Occupied(val),
                });
                Token { index, generation: 0 }
            }
        }
    }

    pub fn remove(&mut self, token: Token) -> Option<T> {
        let slot = self.slots.get_mut(token.index())?;
        if slot.generation != token.generation || matches!(slot.entry, Entry::Vacant(_)) {
            return None;
        }

        let entry = std::mem::replace(&mut slot.entry, Entry::Vacant(self.next));
        slot.generation = slot.generation.wrapping_add(1);
        self.next = Some(token.index);
        self.len -= 1;

        match entry {
            Entry::Occupied(val) => Some(val),
            Entry::Vacant(_) => unreachable!(),
        }
    }

    pub fn get(&self, token: Token) -> Option<&T> {
        match self.slots.get(token.index()) {
            Some(Slot {
                generation,
                entry: Entry::Occupied(val),
            }) if *generation == token.generation => Some(val),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut T> {
        match self.slots.get_mut(token.index()) {
            Some(Slot {
                generation,
                entry: Entry::Occupied(val),
            }) if *generation == token.generation => Some(val),
            _ => None,
        }
    }

    pub fn contains(&self, token: Token) -> bool {
        self.get(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vacate every slot. Tokens issued before the clear never resolve again.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Entry::Occupied(_) = slot.entry {
                slot.generation = slot.generation.wrapping_add(1);
                slot.entry = Entry::Vacant(self.next);
                self.next = Some(index as u32);
            }
        }
        self.len = 0;
    }
}
