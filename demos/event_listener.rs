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

//! Observe entries leaving the cache.

use std::sync::Arc;

use recache::{Cache, CacheBuilder, Entry, Event, EventListener};

#[derive(Debug)]
struct Order {
    id: u64,
    items: usize,
}

impl Entry for Order {
    type Key = u64;

    fn key(&self) -> &u64 {
        &self.id
    }

    fn size(&self) -> usize {
        self.items
    }
}

struct EchoEventListener;

impl EventListener for EchoEventListener {
    type Entry = Order;

    fn on_leave(&self, reason: Event, entry: &Self::Entry) {
        println!("Order [id = {}] [items = {}] left the cache: {reason:?}.", entry.id, entry.items);
    }
}

fn main() -> anyhow::Result<()> {
    let cache: Cache<Order> = CacheBuilder::new(2)
        .with_event_listener(Arc::new(EchoEventListener))
        .build()?;

    cache.insert(Order { id: 1, items: 1 });
    cache.insert(Order { id: 2, items: 1 });
    cache.insert(Order { id: 2, items: 1 });
    cache.insert(Order { id: 3, items: 1 });
    cache.remove(&3u64);
    cache.settle();

    Ok(())
}
