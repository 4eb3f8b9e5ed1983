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
    fmt::Debug,
    hash::{BuildHasher, Hash},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use ahash::RandomState;
use equivalent::Equivalent;
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use recache_common::{
    code::Entry,
    event::{Event, EventListener},
    metrics::Metrics,
    strict_assert,
};
use serde::{Deserialize, Serialize};

use crate::{
    coordinator::EvictionCoordinator,
    error::{Error, Result},
    history::RecencyHistory,
    table::EntryTable,
    worker::{self, Dispatcher},
};

const DEFAULT_NAME: &str = "recache";
const DEFAULT_BATCH_CAPACITY: usize = 4096;

/// State shared by the cache handles and the bookkeeping worker.
pub(crate) struct Shared<E, S>
where
    E: Entry,
{
    pub(crate) name: String,

    /// Lock order: `table` before `history` whenever both are held.
    pub(crate) table: RwLock<EntryTable<E, S>>,
    pub(crate) history: Mutex<RecencyHistory<E::Key>>,
    /// Only mutated while holding the `table` write lock.
    pub(crate) usage: AtomicUsize,

    pub(crate) coordinator: EvictionCoordinator,
    pub(crate) event_listener: Option<Arc<dyn EventListener<Entry = E>>>,
    pub(crate) metrics: Arc<Metrics>,
}

impl<E, S> Shared<E, S>
where
    E: Entry,
    S: BuildHasher + Send + Sync + 'static,
{
    /// Run trim passes. The caller must hold the coordinator claim.
    pub(crate) fn trim(&self) {
        let trimmed = self
            .coordinator
            .trim(&self.table, &self.history, &self.usage, &self.metrics);

        tracing::debug!(
            name = %self.name,
            evicted = trimmed.evicted.len(),
            passes = trimmed.passes,
            usage = self.usage.load(Ordering::SeqCst),
            "[cache]: trim finished"
        );

        if let Some(listener) = self.event_listener.as_ref() {
            for entry in trimmed.evicted.iter() {
                listener.on_leave(Event::Evict, entry);
            }
        }
    }

    /// Publish the current usage. Called under the table write lock.
    fn sync_usage_gauge(&self) {
        self.metrics.memory_usage.set(self.usage.load(Ordering::SeqCst) as f64);
    }

    fn notify(&self, reason: Event, entry: &E) {
        if let Some(listener) = self.event_listener.as_ref() {
            listener.on_leave(reason, entry);
        }
    }
}

/// Serializable configuration of a [`Cache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Name of the cache, used as the metrics label.
    #[serde(default = "CacheConfig::default_name")]
    pub name: String,
    /// Maximum resident usage.
    pub capacity: usize,
    /// Maximum number of consecutive promotions applied under one history lock acquisition.
    #[serde(default = "CacheConfig::default_batch_capacity")]
    pub batch_capacity: usize,
}

impl CacheConfig {
    fn default_name() -> String {
        DEFAULT_NAME.to_string()
    }

    fn default_batch_capacity() -> usize {
        DEFAULT_BATCH_CAPACITY
    }
}

/// Builder of a [`Cache`].
pub struct CacheBuilder<E, S = RandomState>
where
    E: Entry,
    S: BuildHasher + Send + Sync + 'static,
{
    name: String,
    capacity: usize,
    batch_capacity: usize,
    event_listener: Option<Arc<dyn EventListener<Entry = E>>>,
    hash_builder: S,
}

impl<E> CacheBuilder<E, RandomState>
where
    E: Entry,
{
    /// Create a cache builder with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            capacity,
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            event_listener: None,
            hash_builder: RandomState::default(),
        }
    }
}

impl<E> From<CacheConfig> for CacheBuilder<E, RandomState>
where
    E: Entry,
{
    fn from(config: CacheConfig) -> Self {
        CacheBuilder::new(config.capacity)
            .with_name(config.name)
            .with_batch_capacity(config.batch_capacity)
    }
}

impl<E, S> CacheBuilder<E, S>
where
    E: Entry,
    S: BuildHasher + Send + Sync + 'static,
{
    /// Set the name of the cache. The name labels the metrics of the cache.
    ///
    /// The default value is "recache".
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the maximum number of consecutive promotions the bookkeeping worker applies under one history lock
    /// acquisition.
    ///
    /// A smaller batch lets inserts of new keys interleave with a long promotion backlog more often. Promotions are
    /// never dropped regardless of the batch size.
    ///
    /// The default value is 4096.
    pub fn with_batch_capacity(mut self, batch_capacity: usize) -> Self {
        self.batch_capacity = batch_capacity;
        self
    }

    /// Set the event listener of the cache.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Entry = E>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Set the hash builder of the cache.
    pub fn with_hash_builder<OS>(self, hash_builder: OS) -> CacheBuilder<E, OS>
    where
        OS: BuildHasher + Send + Sync + 'static,
    {
        CacheBuilder {
            name: self.name,
            capacity: self.capacity,
            batch_capacity: self.batch_capacity,
            event_listener: self.event_listener,
            hash_builder,
        }
    }

    /// Build the cache and spawn its bookkeeping worker.
    pub fn build(self) -> Result<Cache<E, S>> {
        if self.capacity == 0 {
            return Err(Error::ConfigError("capacity must be positive".to_string()));
        }
        if self.batch_capacity == 0 {
            return Err(Error::ConfigError("batch capacity must be positive".to_string()));
        }

        let metrics = Arc::new(Metrics::new(&self.name));
        let shared = Arc::new(Shared {
            name: self.name,
            table: RwLock::new(EntryTable::with_hasher(self.hash_builder)),
            history: Mutex::new(RecencyHistory::new()),
            usage: AtomicUsize::new(0),
            coordinator: EvictionCoordinator::new(self.capacity),
            event_listener: self.event_listener,
            metrics,
        });
        let dispatcher = worker::spawn(shared.clone(), self.batch_capacity)?;

        tracing::debug!(name = %shared.name, capacity = self.capacity, "[cache]: built");

        Ok(Cache { shared, dispatcher })
    }
}

/// Size-bounded concurrent cache with least-recently-used eviction.
///
/// Lookups and inserts never wait for recency bookkeeping: promotions and trims are applied by a background
/// worker in dispatch order. [`Cache::settle`] waits until everything dispatched before it has been applied.
///
/// The handle is cheap to clone. The worker exits when the last handle is dropped.
pub struct Cache<E, S = RandomState>
where
    E: Entry,
    S: BuildHasher + Send + Sync + 'static,
{
    shared: Arc<Shared<E, S>>,
    dispatcher: Dispatcher,
}

impl<E, S> Clone for Cache<E, S>
where
    E: Entry,
    S: BuildHasher + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<E, S> Debug for Cache<E, S>
where
    E: Entry,
    S: BuildHasher + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.shared.name)
            .field("capacity", &self.capacity())
            .field("usage", &self.usage())
            .field("trimming", &self.shared.coordinator.is_in_flight())
            .finish()
    }
}

impl<E> Cache<E, RandomState>
where
    E: Entry,
{
    /// Create a cache with the given capacity and default options.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, or if the bookkeeping worker cannot be spawned.
    pub fn new(capacity: usize) -> Self {
        match CacheBuilder::new(capacity).build() {
            Ok(cache) => cache,
            Err(e) => panic!("failed to create cache: {e}"),
        }
    }

    /// Create a cache builder with the given capacity.
    pub fn builder(capacity: usize) -> CacheBuilder<E, RandomState> {
        CacheBuilder::new(capacity)
    }
}

impl<E, S> Cache<E, S>
where
    E: Entry,
    S: BuildHasher + Send + Sync + 'static,
{
    /// Insert an entry, replacing the resident entry with the same key.
    ///
    /// Returns the inserted entry. Eviction, if needed, happens in the background.
    pub fn insert(&self, entry: E) -> Arc<E> {
        self.insert_arc(Arc::new(entry))
    }

    /// Insert a shared entry, replacing the resident entry with the same key.
    pub fn insert_arc(&self, entry: Arc<E>) -> Arc<E> {
        let size = entry.size();

        let mut table = self.shared.table.write();
        let replaced = table.insert_or_overwrite(entry.clone(), |key| self.shared.history.lock().track(key.clone()));
        let usage = match replaced.as_ref() {
            Some((old, _)) => {
                let old = old.size();
                if size >= old {
                    self.shared.usage.fetch_add(size - old, Ordering::SeqCst) + (size - old)
                } else {
                    self.shared.usage.fetch_sub(old - size, Ordering::SeqCst) - (old - size)
                }
            }
            None => self.shared.usage.fetch_add(size, Ordering::SeqCst) + size,
        };
        self.shared.sync_usage_gauge();
        drop(table);

        tracing::trace!(key = ?entry.key(), size, usage, replace = replaced.is_some(), "[cache]: insert");

        match replaced {
            Some((old, token)) => {
                self.shared.metrics.memory_replace.increment(1);
                self.dispatcher.promote(token);
                self.shared.notify(Event::Replace, &old);
            }
            None => self.shared.metrics.memory_insert.increment(1),
        }

        if self.shared.coordinator.try_claim(usage) && !self.dispatcher.trim() {
            self.shared.coordinator.release();
            tracing::warn!(name = %self.shared.name, usage, "[cache]: bookkeeping worker is gone, drop trim");
        }

        entry
    }

    /// Get the entry of `key` and dispatch its promotion.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<E>>
    where
        Q: Hash + Equivalent<E::Key> + ?Sized,
    {
        let found = self
            .shared
            .table
            .read()
            .lookup(key)
            .map(|record| (record.entry.clone(), record.token));

        match found {
            Some((entry, token)) => {
                self.shared.metrics.memory_hit.increment(1);
                self.dispatcher.promote(token);
                Some(entry)
            }
            None => {
                self.shared.metrics.memory_miss.increment(1);
                None
            }
        }
    }

    /// Returns `true` if the cache holds `key`. Does not promote it.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: Hash + Equivalent<E::Key> + ?Sized,
    {
        self.shared.table.read().lookup(key).is_some()
    }

    /// Remove the entry of `key` and return it.
    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<E>>
    where
        Q: Hash + Equivalent<E::Key> + ?Sized,
    {
        let mut table = self.shared.table.write();
        let record = table.remove(key)?;
        self.shared.history.lock().detach(record.token);
        let size = record.entry.size();
        let usage = self.shared.usage.fetch_sub(size, Ordering::SeqCst) - size;
        self.shared.sync_usage_gauge();
        drop(table);

        tracing::trace!(key = ?record.entry.key(), size, usage, "[cache]: remove");
        self.shared.metrics.memory_remove.increment(1);
        self.shared.notify(Event::Remove, &record.entry);

        Some(record.entry)
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut table = self.shared.table.write();
        let records = table.drain().collect_vec();
        let mut history = self.shared.history.lock();
        // A trim pass may hold popped occurrences whose records it has not removed yet.
        strict_assert!(history.len() <= records.len());
        history.clear();
        drop(history);
        self.shared.usage.store(0, Ordering::SeqCst);
        self.shared.sync_usage_gauge();
        drop(table);

        tracing::debug!(name = %self.shared.name, cleared = records.len(), "[cache]: clear");
        for record in records {
            self.shared.notify(Event::Clear, &record.entry);
        }
    }

    /// Resident usage: the sum of the sizes of the resident entries.
    pub fn usage(&self) -> usize {
        self.shared.usage.load(Ordering::SeqCst)
    }

    /// Capacity of the cache.
    pub fn capacity(&self) -> usize {
        self.shared.coordinator.capacity()
    }

    /// Name of the cache.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Count of resident entries.
    pub fn len(&self) -> usize {
        self.shared.table.read().len()
    }

    /// Returns `true` if the cache holds no entry.
    pub fn is_empty(&self) -> bool {
        self.shared.table.read().is_empty()
    }

    /// Keys of the `n` most recently touched entries, the most recent first.
    ///
    /// Promotions still in the bookkeeping queue are not reflected.
    pub fn latest(&self, n: usize) -> Vec<E::Key> {
        self.shared.history.lock().latest(n).cloned().collect_vec()
    }

    /// Keys of the most and the least recently touched entries.
    pub fn bookends(&self) -> (Option<E::Key>, Option<E::Key>) {
        let history = self.shared.history.lock();
        let (latest, oldest) = history.bookends();
        (latest.cloned(), oldest.cloned())
    }

    /// Block until every promotion and trim dispatched before the call has been applied.
    pub fn settle(&self) {
        self.dispatcher.settle()
    }

    /// Async version of [`Cache::settle`].
    pub async fn settled(&self) {
        self.dispatcher.settled().await
    }

    /// Settle the cache and check its bookkeeping.
    ///
    /// The result is only meaningful while no other handle mutates the cache.
    pub fn verify(&self) -> Result<()> {
        self.settle();

        let table = self.shared.table.read();
        let history = self.shared.history.lock();
        let usage = self.shared.usage.load(Ordering::SeqCst);
        let capacity = self.capacity();

        let mut errs = vec![];

        let resident = table.records().map(|record| record.entry.size()).sum::<usize>();
        if usage != resident {
            errs.push(Error::Invariant(format!(
                "usage {usage} does not match resident size {resident}"
            )));
        }
        if usage > capacity {
            errs.push(Error::Invariant(format!(
                "settled usage {usage} exceeds capacity {capacity}"
            )));
        }
        if history.len() != table.len() {
            errs.push(Error::Invariant(format!(
                "{} occurrences tracked for {} entries",
                history.len(),
                table.len()
            )));
        }
        let linked = history.latest(usize::MAX).count();
        if linked != history.len() {
            errs.push(Error::Invariant(format!(
                "{linked} occurrences linked out of {}",
                history.len()
            )));
        }
        for record in table.records() {
            if history.get(record.token) != Some(record.entry.key()) {
                errs.push(Error::Invariant(format!(
                    "entry {:?} does not own its occurrence",
                    record.entry.key()
                )));
            }
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(Error::multiple(errs))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;
    use crate::test_utils::{GaugeRecorder, RecordingListener, TestEntry};

    fn cache(capacity: usize) -> Cache<TestEntry> {
        Cache::new(capacity)
    }

    fn latest(cache: &Cache<TestEntry>) -> Vec<String> {
        cache.latest(usize::MAX)
    }

    #[test_log::test]
    fn test_evict_least_recent() {
        let cache = cache(32);
        for i in 1..=8 {
            cache.insert(TestEntry::new(i.to_string(), 4));
        }
        assert_eq!(cache.usage(), 32);

        assert_eq!(cache.get("1").unwrap().size, 4);
        cache.settle();

        cache.insert(TestEntry::new("9", 4));
        cache.settle();

        assert!(!cache.contains("2"));
        assert!(cache.get("2").is_none());
        assert_eq!(cache.usage(), 32);
        assert_eq!(cache.len(), 8);
        assert!(cache.get("1").is_some());
        cache.verify().unwrap();
    }

    #[test_log::test]
    fn test_overwrite_applies_delta() {
        let listener = RecordingListener::<TestEntry>::default();
        let cache = CacheBuilder::<TestEntry>::new(100)
            .with_event_listener(Arc::new(listener.clone()))
            .build()
            .unwrap();

        cache.insert(TestEntry::new("a", 10));
        cache.insert(TestEntry::new("a", 30));
        assert_eq!(cache.usage(), 30);
        cache.insert(TestEntry::new("a", 5));
        assert_eq!(cache.usage(), 5);

        assert_eq!(cache.len(), 1);
        assert_eq!(latest(&cache), vec!["a".to_string()]);
        assert_eq!(cache.get("a").unwrap().size, 5);
        assert_eq!(
            listener.events().clone(),
            vec![
                (Event::Replace, TestEntry::new("a", 10)),
                (Event::Replace, TestEntry::new("a", 30)),
            ]
        );
        cache.verify().unwrap();
    }

    #[test_log::test]
    fn test_overwrite_promotes() {
        let cache = cache(12);
        for key in ["a", "b", "c"] {
            cache.insert(TestEntry::new(key, 4));
        }
        cache.insert(TestEntry::new("a", 4));
        cache.settle();
        assert_eq!(latest(&cache), vec!["a", "c", "b"]);

        cache.insert(TestEntry::new("d", 4));
        cache.settle();
        assert!(!cache.contains("b"));
        assert_eq!(latest(&cache), vec!["d", "a", "c"]);
    }

    #[test_log::test]
    fn test_overwrite_growth_triggers_trim() {
        let cache = cache(12);
        for key in ["a", "b", "c"] {
            cache.insert(TestEntry::new(key, 4));
        }
        cache.insert(TestEntry::new("c", 10));
        cache.settle();

        assert_eq!(latest(&cache), vec!["c"]);
        assert_eq!(cache.usage(), 10);
        cache.verify().unwrap();
    }

    #[test_log::test]
    fn test_get_recency() {
        let cache = cache(100);
        for key in ["a", "b", "c"] {
            cache.insert(TestEntry::new(key, 1));
        }

        assert!(cache.get("z").is_none());
        cache.settle();
        assert_eq!(latest(&cache), vec!["c", "b", "a"]);
        assert_eq!(cache.usage(), 3);

        // Touching the latest entry twice keeps the order.
        cache.get("c");
        cache.get("c");
        cache.settle();
        assert_eq!(latest(&cache), vec!["c", "b", "a"]);

        cache.get("a");
        cache.settle();
        assert_eq!(latest(&cache), vec!["a", "c", "b"]);
        assert_eq!(cache.bookends(), (Some("a".to_string()), Some("b".to_string())));
        assert_eq!(cache.latest(2), vec!["a", "c"]);
    }

    #[test_log::test]
    fn test_remove() {
        let listener = RecordingListener::<TestEntry>::default();
        let cache = CacheBuilder::<TestEntry>::new(100)
            .with_event_listener(Arc::new(listener.clone()))
            .build()
            .unwrap();
        for key in ["a", "b", "c"] {
            cache.insert(TestEntry::new(key, 2));
        }

        assert_eq!(cache.remove("b").unwrap().size, 2);
        assert!(cache.remove("b").is_none());
        assert_eq!(cache.usage(), 4);
        assert_eq!(latest(&cache), vec!["c", "a"]);

        // Re-inserting a removed key tracks exactly one occurrence.
        cache.insert(TestEntry::new("b", 2));
        cache.insert(TestEntry::new("b", 2));
        cache.settle();
        assert_eq!(latest(&cache), vec!["b", "c", "a"]);
        assert_eq!(
            listener.events().clone(),
            vec![
                (Event::Remove, TestEntry::new("b", 2)),
                (Event::Replace, TestEntry::new("b", 2)),
            ]
        );
        cache.verify().unwrap();
    }

    #[test_log::test]
    fn test_clear() {
        let listener = RecordingListener::<TestEntry>::default();
        let cache = CacheBuilder::<TestEntry>::new(100)
            .with_event_listener(Arc::new(listener.clone()))
            .build()
            .unwrap();
        for i in 0..10 {
            cache.insert(TestEntry::new(i.to_string(), 3));
        }
        // Promotions of cleared entries become stale.
        cache.get("3");

        cache.clear();
        cache.settle();

        assert!(cache.is_empty());
        assert_eq!(cache.usage(), 0);
        assert_eq!(cache.bookends(), (None, None));
        assert_eq!(listener.events().len(), 10);
        assert!(listener.events().iter().all(|(event, _)| *event == Event::Clear));

        cache.insert(TestEntry::new("3", 3));
        assert_eq!(latest(&cache), vec!["3"]);
        cache.verify().unwrap();
    }

    #[test_log::test]
    fn test_evict_events() {
        let listener = RecordingListener::<TestEntry>::default();
        let cache = CacheBuilder::<TestEntry>::new(8)
            .with_event_listener(Arc::new(listener.clone()))
            .build()
            .unwrap();
        for key in ["a", "b", "c"] {
            cache.insert(TestEntry::new(key, 4));
        }
        cache.settle();

        assert_eq!(listener.events().clone(), vec![(Event::Evict, TestEntry::new("a", 4))]);
    }

    #[test_log::test]
    fn test_oversized_entry() {
        let cache = cache(8);
        cache.insert(TestEntry::new("a", 4));
        cache.insert(TestEntry::new("huge", 16));
        cache.settle();

        assert!(cache.is_empty());
        assert_eq!(cache.usage(), 0);
        cache.verify().unwrap();
    }

    #[test]
    fn test_config_error() {
        let err = CacheBuilder::<TestEntry>::new(0).build().unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = CacheBuilder::<TestEntry>::new(8)
            .with_batch_capacity(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_panics() {
        let _ = Cache::<TestEntry>::new(0);
    }

    #[test]
    fn test_config() {
        let config: CacheConfig = serde_json::from_str(r#"{ "capacity": 64 }"#).unwrap();
        assert_eq!(
            config,
            CacheConfig {
                name: "recache".to_string(),
                capacity: 64,
                batch_capacity: 4096,
            }
        );

        let config: CacheConfig =
            serde_json::from_str(r#"{ "name": "users", "capacity": 64, "batch_capacity": 16 }"#).unwrap();
        let cache = CacheBuilder::<TestEntry>::from(config).build().unwrap();
        assert_eq!(cache.name(), "users");
        assert_eq!(cache.capacity(), 64);
    }

    fn burst_get_order(cache: Cache<TestEntry>) {
        const THREADS: usize = 4;
        const KEYS: usize = 4000;

        for i in 0..THREADS * KEYS {
            cache.insert(TestEntry::new(i.to_string(), 1));
        }
        cache.settle();

        // Every get of the burst lands in the history, in per-thread dispatch order.
        std::thread::scope(|s| {
            for id in 0..THREADS {
                let cache = &cache;
                s.spawn(move || {
                    for i in id * KEYS..(id + 1) * KEYS {
                        assert!(cache.get(&i.to_string()).is_some());
                    }
                });
            }
        });
        cache.settle();

        let latest = latest(&cache);
        assert_eq!(latest.len(), THREADS * KEYS);
        for id in 0..THREADS {
            let order = latest
                .iter()
                .filter_map(|key| key.parse::<usize>().ok())
                .filter(|i| i / KEYS == id)
                .collect_vec();
            let expected = (id * KEYS..(id + 1) * KEYS).rev().collect_vec();
            assert_eq!(order, expected);
        }
        cache.verify().unwrap();
    }

    #[test_log::test]
    fn test_burst_get_order() {
        let cache = CacheBuilder::<TestEntry>::new(usize::MAX).build().unwrap();

        for i in 0..10_000 {
            cache.insert(TestEntry::new(i.to_string(), 1));
        }
        cache.settle();
        for i in 0..10_000 {
            cache.get(&i.to_string());
        }
        cache.settle();

        let expected = (0..10_000).rev().map(|i| i.to_string()).collect_vec();
        assert_eq!(latest(&cache), expected);
    }

    #[test_log::test]
    fn test_burst_get_order_concurrent() {
        burst_get_order(CacheBuilder::new(usize::MAX).build().unwrap());
        burst_get_order(CacheBuilder::new(usize::MAX).with_batch_capacity(1).build().unwrap());
    }

    #[test_log::test]
    fn test_burst_touch_survives_trim() {
        let cache = CacheBuilder::<TestEntry>::new(1000).with_batch_capacity(7).build().unwrap();
        for i in 0..1000 {
            cache.insert(TestEntry::new(i.to_string(), 1));
        }
        cache.settle();

        for i in 0..500 {
            cache.get(&i.to_string());
        }
        cache.insert(TestEntry::new("new", 1));
        cache.settle();

        assert!(!cache.contains("500"));
        assert_eq!(cache.usage(), 1000);
        for i in (0..500).chain(501..1000) {
            assert!(cache.contains(&i.to_string()), "{i} was evicted");
        }
        assert!(cache.contains("new"));
        cache.verify().unwrap();
    }

    #[test_log::test]
    fn test_listener_inserts_into_observed_cache() {
        #[derive(Default)]
        struct Spill {
            cache: Mutex<Option<Cache<TestEntry>>>,
            spilled: AtomicUsize,
        }

        impl EventListener for Spill {
            type Entry = TestEntry;

            fn on_leave(&self, reason: Event, entry: &TestEntry) {
                if reason != Event::Evict || entry.key.starts_with("spill-") {
                    return;
                }
                if let Some(cache) = self.cache.lock().as_ref() {
                    cache.insert(TestEntry::new(format!("spill-{}", entry.key), entry.size));
                    self.spilled.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let spill = Arc::new(Spill::default());
        let cache = CacheBuilder::<TestEntry>::new(16)
            .with_event_listener(spill.clone())
            .build()
            .unwrap();
        *spill.cache.lock() = Some(cache.clone());

        for i in 0..64 {
            cache.insert(TestEntry::new(i.to_string(), 2));
        }
        // Spills enqueue further trims from the bookkeeping thread. Settle until none happens meanwhile.
        loop {
            let spilled = spill.spilled.load(Ordering::SeqCst);
            cache.settle();
            if spill.spilled.load(Ordering::SeqCst) == spilled {
                break;
            }
        }

        assert!(spill.spilled.load(Ordering::SeqCst) > 0);
        assert!(cache.usage() <= 16);
        cache.verify().unwrap();

        spill.cache.lock().take();
    }

    #[test_log::test]
    fn test_usage_gauge_follows_usage() {
        let recorder = GaugeRecorder::default();
        let cache = metrics::with_local_recorder(&recorder, || {
            CacheBuilder::<TestEntry>::new(64).with_name("gauge").build().unwrap()
        });

        std::thread::scope(|s| {
            for id in 0..8 {
                let cache = &cache;
                s.spawn(move || {
                    let mut rng = SmallRng::seed_from_u64(id);
                    for _ in 0..2000 {
                        let key = rng.random_range(0..100).to_string();
                        if rng.random_bool(0.2) {
                            cache.remove(&key);
                        } else {
                            cache.insert(TestEntry::new(key, rng.random_range(1..8)));
                        }
                    }
                });
            }
        });
        cache.settle();

        assert_eq!(recorder.value(), cache.usage() as f64);
        cache.verify().unwrap();

        cache.clear();
        assert_eq!(recorder.value(), 0.0);
    }

    #[test_log::test]
    fn test_concurrent_insert_trims_once() {
        let cache = cache(30);
        std::thread::scope(|s| {
            for id in 0..8 {
                let cache = &cache;
                s.spawn(move || cache.insert(TestEntry::new(id.to_string(), 4)));
            }
        });
        cache.settle();

        assert_eq!(cache.usage(), 28);
        assert_eq!(cache.len(), 7);
        cache.verify().unwrap();
    }

    #[test_log::test]
    fn test_concurrent() {
        const THREADS: usize = 8;
        const KEYS: usize = 2000;

        let cache = CacheBuilder::<TestEntry>::new(1000).with_name("concurrent").build().unwrap();

        let handles = (0..THREADS)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let mut rng = SmallRng::seed_from_u64(t as u64);
                    for i in 0..KEYS {
                        cache.insert(TestEntry::new(format!("{t}-{i}"), 1));
                        let key = format!("{}-{}", rng.random_range(0..THREADS), rng.random_range(0..KEYS));
                        if let Some(entry) = cache.get(&key) {
                            assert_eq!(entry.key, key);
                        }
                    }
                })
            })
            .collect_vec();
        for handle in handles {
            handle.join().unwrap();
        }

        cache.verify().unwrap();
        assert_eq!(cache.usage(), 1000);
        assert_eq!(cache.len(), 1000);
    }

    #[test_log::test]
    fn test_random_ops_match_lru_model() {
        const CAPACITY: usize = 32;

        let mut rng = SmallRng::seed_from_u64(114514);
        let cache = cache(CAPACITY);
        let mut model: VecDeque<(String, usize)> = VecDeque::new();

        for _ in 0..5000 {
            let key = rng.random_range(0..16u32).to_string();
            match rng.random_range(0..10u32) {
                0..5 => {
                    let size = rng.random_range(1..=8);
                    cache.insert(TestEntry::new(key.clone(), size));

                    if let Some(pos) = model.iter().position(|(k, _)| *k == key) {
                        model.remove(pos);
                    }
                    model.push_front((key, size));
                    while model.iter().map(|(_, size)| size).sum::<usize>() > CAPACITY {
                        model.pop_back();
                    }
                }
                5..9 => {
                    let hit = cache.get(&key).is_some();
                    let pos = model.iter().position(|(k, _)| *k == key);
                    assert_eq!(hit, pos.is_some());
                    if let Some(pos) = pos {
                        let touched = model.remove(pos).unwrap();
                        model.push_front(touched);
                    }
                }
                _ => {
                    let removed = cache.remove(&key).map(|entry| entry.size);
                    let pos = model.iter().position(|(k, _)| *k == key);
                    assert_eq!(removed, pos.and_then(|pos| model.remove(pos)).map(|(_, size)| size));
                }
            }
            cache.settle();

            assert_eq!(latest(&cache), model.iter().map(|(k, _)| k.clone()).collect_vec());
            assert_eq!(cache.usage(), model.iter().map(|(_, size)| size).sum::<usize>());
        }

        cache.verify().unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_settled() {
        let cache = cache(10);
        for i in 0..20 {
            cache.insert(TestEntry::new(i.to_string(), 1));
        }
        cache.settled().await;

        assert_eq!(cache.usage(), 10);
        assert_eq!(cache.bookends(), (Some("19".to_string()), Some("10".to_string())));
    }

    #[test]
    fn test_worker_exits_with_last_handle() {
        let cache = cache(10);
        let clone = cache.clone();
        let shared = Arc::downgrade(&cache.shared);

        drop(cache);
        clone.insert(TestEntry::new("a", 1));
        clone.settle();
        drop(clone);

        // The worker drops its reference once the queue is closed.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while shared.upgrade().is_some() {
            assert!(std::time::Instant::now() < deadline);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}
