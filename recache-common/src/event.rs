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

use crate::code::Entry;

/// The reason an entry leaves the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Evicted by a trim pass because the cache exceeded its capacity.
    Evict,
    /// Replaced by a newer entry with the same key.
    Replace,
    /// Explicitly removed.
    Remove,
    /// Dropped by a cache clear.
    Clear,
}

/// Observer of entries leaving the cache.
///
/// Listeners are called out of any lock critical section. Eviction events are delivered on the background
/// bookkeeping thread, so a listener must not block on the cache it observes.
///
/// A listener may read, insert into or remove from the observed cache: none of these wait for the bookkeeping
/// thread. It must not call `settle`, `settled` or `verify` on the observed cache. Those wait for the bookkeeping
/// thread, which is the thread running the listener, and never return.
pub trait EventListener: Send + Sync + 'static {
    /// Associated entry type.
    type Entry: Entry;

    /// Called when an entry leaves the cache with the reason.
    #[expect(unused_variables)]
    fn on_leave(&self, reason: Event, entry: &Self::Entry) {}
}
