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

use std::fmt::Debug;

use metrics::{counter, gauge, Counter, Gauge};

/// Metrics of a cache instance.
///
/// All handles are registered against the global `metrics` recorder when the cache is built. Without an
/// installed recorder they are no-ops.
#[derive(Clone)]
pub struct Metrics {
    /// Successful inserts of new keys.
    pub memory_insert: Counter,
    /// Successful overwrites of resident keys.
    pub memory_replace: Counter,
    /// Lookup hits.
    pub memory_hit: Counter,
    /// Lookup misses.
    pub memory_miss: Counter,
    /// Explicit removes.
    pub memory_remove: Counter,
    /// Entries evicted by trim passes.
    pub memory_evict: Counter,

    /// Promotions applied to the recency history.
    pub memory_promote: Counter,
    /// Finished trim passes.
    pub memory_trim: Counter,
    /// Trim passes that ran out of history while still over capacity.
    pub memory_trim_exhausted: Counter,

    /// Resident usage.
    pub memory_usage: Gauge,
}

impl Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

impl Metrics {
    /// Register the metrics of the cache named `name`.
    pub fn new(name: &str) -> Self {
        let memory_insert = counter!("recache_memory_op_total", "name" => name.to_string(), "op" => "insert");
        let memory_replace = counter!("recache_memory_op_total", "name" => name.to_string(), "op" => "replace");
        let memory_hit = counter!("recache_memory_op_total", "name" => name.to_string(), "op" => "hit");
        let memory_miss = counter!("recache_memory_op_total", "name" => name.to_string(), "op" => "miss");
        let memory_remove = counter!("recache_memory_op_total", "name" => name.to_string(), "op" => "remove");
        let memory_evict = counter!("recache_memory_op_total", "name" => name.to_string(), "op" => "evict");

        let memory_promote = counter!("recache_memory_bookkeeping_total", "name" => name.to_string(), "op" => "promote");
        let memory_trim = counter!("recache_memory_bookkeeping_total", "name" => name.to_string(), "op" => "trim");
        let memory_trim_exhausted =
            counter!("recache_memory_bookkeeping_total", "name" => name.to_string(), "op" => "trim_exhausted");

        let memory_usage = gauge!("recache_memory_usage", "name" => name.to_string());

        Self {
            memory_insert,
            memory_replace,
            memory_hit,
            memory_miss,
            memory_remove,
            memory_evict,
            memory_promote,
            memory_trim,
            memory_trim_exhausted,
            memory_usage,
        }
    }

    /// Metrics that record nothing regardless of the installed recorder.
    pub fn noop() -> Self {
        Self {
            memory_insert: Counter::noop(),
            memory_replace: Counter::noop(),
            memory_hit: Counter::noop(),
            memory_miss: Counter::noop(),
            memory_remove: Counter::noop(),
            memory_evict: Counter::noop(),
            memory_promote: Counter::noop(),
            memory_trim: Counter::noop(),
            memory_trim_exhausted: Counter::noop(),
            memory_usage: Gauge::noop(),
        }
    }
}
