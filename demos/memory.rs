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

//! Basic usage of the cache, with bookkeeping logs printed to stderr.
//!
//! Run with `--features deadlock` to watch the cache locks with the `parking_lot` deadlock detector.

use recache::{Cache, Entry};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug)]
struct Page {
    url: String,
    body: String,
}

impl Entry for Page {
    type Key = String;

    fn key(&self) -> &String {
        &self.url
    }

    fn size(&self) -> usize {
        self.body.len()
    }
}

fn page(url: &str, body: &str) -> Page {
    Page {
        url: url.to_string(),
        body: body.to_string(),
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    #[cfg(feature = "deadlock")]
    {
        std::thread::spawn(move || loop {
            std::thread::sleep(std::time::Duration::from_secs(1));
            let deadlocks = parking_lot::deadlock::check_deadlock();
            if deadlocks.is_empty() {
                continue;
            }

            eprintln!("{} deadlocks detected", deadlocks.len());
            for (i, threads) in deadlocks.iter().enumerate() {
                eprintln!("Deadlock #{i}");
                for t in threads {
                    eprintln!("Thread Id {:#?}", t.thread_id());
                    eprintln!("{:#?}", t.backtrace());
                }
            }
            panic!("deadlock detected");
        });
    }

    let cache = Cache::new(16);

    cache.insert(page("/a", "hello"));
    cache.insert(page("/b", "world"));
    let a = cache.get("/a").unwrap();
    assert_eq!(a.body, "hello");

    // "/b" is the least recently used entry once the promotion of "/a" is applied.
    cache.settle();
    cache.insert(page("/c", "recache!"));
    cache.settle();

    assert!(cache.get("/b").is_none());
    assert_eq!(cache.usage(), 13);
    println!("{cache:?}: {:?}", cache.latest(usize::MAX));
}
