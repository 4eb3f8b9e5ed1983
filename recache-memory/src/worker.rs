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

use std::{hash::BuildHasher, sync::Arc};

use recache_common::code::Entry;

use crate::{cache::Shared, error::Result, slab::Token};

/// Bookkeeping work applied by the worker thread in queue order.
#[derive(Debug)]
pub enum Task {
    /// Promote an occurrence back to the head of the history.
    Recur(Token),
    /// Run trim passes. Only dispatched by the holder of the coordinator claim.
    Trim,
    /// Barrier. Acknowledged once every task queued before it has been applied.
    Settle(flume::Sender<()>),
}

/// Sending half of the bookkeeping queue.
///
/// The queue is unbounded, so dispatching never blocks and never loses a task. The worker exits when every
/// dispatcher is dropped.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: flume::Sender<Task>,
}

impl Dispatcher {
    /// Dispatch a promotion.
    pub fn promote(&self, token: Token) {
        if self.tx.send(Task::Recur(token)).is_err() {
            tracing::warn!(?token, "[bookkeeper]: worker is gone, drop promotion");
        }
    }

    /// Dispatch a trim.
    ///
    /// Returns `false` if the worker is gone.
    pub fn trim(&self) -> bool {
        self.tx.send(Task::Trim).is_ok()
    }

    /// Block until every task dispatched before the call has been applied.
    ///
    /// Must not be called on the bookkeeping thread.
    pub fn settle(&self) {
        let Some(rx) = self.barrier() else {
            return;
        };
        let _ = rx.recv();
    }

    /// Async version of [`Dispatcher::settle`].
    pub async fn settled(&self) {
        let Some(rx) = self.barrier() else {
            return;
        };
        let _ = rx.recv_async().await;
    }

    fn barrier(&self) -> Option<flume::Receiver<()>> {
        let (tx, rx) = flume::bounded(1);
        if self.tx.send(Task::Settle(tx)).is_err() {
            tracing::warn!("[bookkeeper]: worker is gone, nothing to settle");
            return None;
        }
        Some(rx)
    }
}

/// Spawn the bookkeeping worker of `shared`.
///
/// The worker applies at most `batch_capacity` consecutive promotions per history lock acquisition.
pub(crate) fn spawn<E, S>(shared: Arc<Shared<E, S>>, batch_capacity: usize) -> Result<Dispatcher>
where
    E: Entry,
    S: BuildHasher + Send + Sync + 'static,
{
    let (tx, rx) = flume::unbounded();

    let bookkeeper = Bookkeeper {
        shared,
        rx,
        batch_capacity,
    };
    std::thread::Builder::new()
        .name("recache-bookkeeper".to_string())
        .spawn(move || bookkeeper.run())?;

    Ok(Dispatcher { tx })
}

/// [`Bookkeeper`] receives tasks and applies them in its own thread.
struct Bookkeeper<E, S>
where
    E: Entry,
{
    shared: Arc<Shared<E, S>>,
    rx: flume::Receiver<Task>,
    batch_capacity: usize,
}

impl<E, S> Bookkeeper<E, S>
where
    E: Entry,
    S: BuildHasher + Send + Sync + 'static,
{
    /// Run the bookkeeper.
    fn run(self) {
        tracing::debug!(name = %self.shared.name, "[bookkeeper]: start");

        while let Ok(task) = self.rx.recv() {
            let tasks = self.rx.drain();

            // Consecutive promotions share one history lock, up to `batch_capacity` of them.
            let mut history = None;
            let mut batched = 0;
            for task in std::iter::once(task).chain(tasks) {
                match task {
                    Task::Recur(token) => {
                        if batched == self.batch_capacity {
                            drop(history.take());
                            batched = 0;
                        }
                        history.get_or_insert_with(|| self.shared.history.lock()).recur(token);
                        batched += 1;
                        self.shared.metrics.memory_promote.increment(1);
                    }
                    Task::Trim => {
                        drop(history.take());
                        batched = 0;
                        self.shared.trim();
                    }
                    Task::Settle(tx) => {
                        drop(history.take());
                        batched = 0;
                        let _ = tx.send(());
                    }
                }
            }
        }

        tracing::debug!(name = %self.shared.name, "[bookkeeper]: stop");
    }
}
