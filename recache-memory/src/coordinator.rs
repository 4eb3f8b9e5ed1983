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
    hash::BuildHasher,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::{Mutex, RwLock};
use recache_common::{code::Entry, metrics::Metrics};

use crate::{history::RecencyHistory, table::EntryTable};

/// Single-slot gate for trim passes, and the trim pass itself.
///
/// At most one pass is in flight at any time. Triggers that lose the claim are dropped, not queued: the pass in
/// flight re-checks usage before it finishes.
#[derive(Debug)]
pub struct EvictionCoordinator {
    capacity: usize,
    in_flight: AtomicBool,
}

/// Outcome of [`EvictionCoordinator::trim`].
#[derive(Debug)]
pub struct Trimmed<E> {
    /// Evicted entries, the least recent first.
    pub evicted: Vec<Arc<E>>,
    /// Passes run, including re-claims.
    pub passes: usize,
    /// `true` if the history ran out while usage was still above capacity.
    pub exhausted: bool,
}

impl<E> Default for Trimmed<E> {
    fn default() -> Self {
        Self {
            evicted: vec![],
            passes: 0,
            exhausted: false,
        }
    }
}

impl EvictionCoordinator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Claim the slot if `usage` exceeds capacity and no pass is in flight.
    ///
    /// Usage updates and the slot use sequentially consistent ordering, so a trigger that loses the claim is always
    /// observed by the re-check of the pass in flight.
    pub fn try_claim(&self, usage: usize) -> bool {
        usage > self.capacity
            && self
                .in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    pub fn release(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Evict from the tail of `history` until `usage` fits capacity. The caller must hold the claim.
    ///
    /// The claim is released when the method returns. If usage went back above capacity while the last pass was
    /// finishing, the slot is claimed again and trimming continues.
    ///
    /// The two locks are never held at the same time.
    pub fn trim<E, S>(
        &self,
        table: &RwLock<EntryTable<E, S>>,
        history: &Mutex<RecencyHistory<E::Key>>,
        usage: &AtomicUsize,
        metrics: &Metrics,
    ) -> Trimmed<E>
    where
        E: Entry,
        S: BuildHasher,
    {
        let mut trimmed = Trimmed::default();

        loop {
            trimmed.passes += 1;
            trimmed.exhausted = self.pass(table, history, usage, metrics, &mut trimmed.evicted);
            self.release();

            if trimmed.exhausted || !self.try_claim(usage.load(Ordering::SeqCst)) {
                break;
            }
            tracing::trace!("[coordinator]: usage grew during the pass, continue trimming");
        }

        metrics.memory_trim.increment(trimmed.passes as u64);
        trimmed
    }

    /// Returns `true` if the history is exhausted while usage is still above capacity.
    fn pass<E, S>(
        &self,
        table: &RwLock<EntryTable<E, S>>,
        history: &Mutex<RecencyHistory<E::Key>>,
        usage: &AtomicUsize,
        metrics: &Metrics,
        evicted: &mut Vec<Arc<E>>,
    ) -> bool
    where
        E: Entry,
        S: BuildHasher,
    {
        while usage.load(Ordering::SeqCst) > self.capacity {
            let popped = history.lock().pop();
            let Some((token, key)) = popped else {
                let usage = usage.load(Ordering::SeqCst);
                tracing::warn!(
                    usage,
                    capacity = self.capacity,
                    "[coordinator]: history exhausted while usage is still above capacity"
                );
                metrics.memory_trim_exhausted.increment(1);
                return true;
            };

            let mut table = table.write();
            // The key may have been removed, or re-inserted with a newer occurrence, after the pop.
            let Some(record) = table.remove_if_token(&key, token) else {
                tracing::trace!(?key, "[coordinator]: skip popped key without a matching record");
                continue;
            };
            let size = record.entry.size();
            usage.fetch_sub(size, Ordering::SeqCst);
            // Usage only changes under the table write lock, so the gauge sees mutations in order.
            metrics.memory_usage.set(usage.load(Ordering::SeqCst) as f64);
            drop(table);

            metrics.memory_evict.increment(1);
            tracing::trace!(?key, size, "[coordinator]: evict");

            evicted.push(record.entry);
        }
        false
    }
}
