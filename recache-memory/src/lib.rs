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

//! Size-bounded concurrent in-memory cache with least-recently-used eviction.
//!
//! Entries are indexed by a hash table behind a read-write lock, while their recency order is kept by a
//! [`RecencyHistory`] behind its own lock. Promotions on lookup and eviction on insert are applied by a background
//! bookkeeping worker, so neither `get` nor `insert` waits for them.

mod cache;
mod coordinator;
mod error;
mod history;
mod slab;
mod table;
mod worker;

#[cfg(test)]
mod test_utils;

mod prelude;
pub use prelude::*;
