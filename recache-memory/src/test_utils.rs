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

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use parking_lot::{Mutex, MutexGuard};
use recache_common::{
    code::Entry,
    event::{Event, EventListener},
};

/// Entry with a string key and an explicit size, for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEntry {
    pub key: String,
    pub size: usize,
}

impl TestEntry {
    pub fn new(key: impl Into<String>, size: usize) -> Self {
        Self { key: key.into(), size }
    }
}

impl Entry for TestEntry {
    type Key = String;

    fn key(&self) -> &String {
        &self.key
    }

    fn size(&self) -> usize {
        self.size
    }
}

/// Event listener that records every leave event, for tests.
#[derive(Debug)]
pub struct RecordingListener<E> {
    events: Arc<Mutex<Vec<(Event, E)>>>,
}

impl<E> Clone for RecordingListener<E> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<E> Default for RecordingListener<E> {
    fn default() -> Self {
        Self {
            events: Default::default(),
        }
    }
}

impl<E> RecordingListener<E> {
    pub fn events(&self) -> MutexGuard<'_, Vec<(Event, E)>> {
        self.events.lock()
    }
}

impl<E> EventListener for RecordingListener<E>
where
    E: Entry + Clone,
{
    type Entry = E;

    fn on_leave(&self, reason: Event, entry: &Self::Entry) {
        self.events.lock().push((reason, entry.clone()));
    }
}

/// Metrics recorder that keeps the last value set on any gauge, for tests.
///
/// Counters and histograms record nothing.
#[derive(Debug, Default, Clone)]
pub struct GaugeRecorder {
    gauge: Arc<AtomicU64>,
}

impl GaugeRecorder {
    pub fn value(&self) -> f64 {
        f64::from_bits(self.gauge.load(Ordering::SeqCst))
    }
}

impl Recorder for GaugeRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
        Counter::noop()
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.gauge.clone())
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
