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

//! Build a cache from a serialized configuration and wait for its bookkeeping asynchronously.

use recache::{Cache, CacheBuilder, CacheConfig, Entry};

struct Chunk {
    id: u32,
    len: usize,
}

impl Entry for Chunk {
    type Key = u32;

    fn key(&self) -> &u32 {
        &self.id
    }

    fn size(&self) -> usize {
        self.len
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config: CacheConfig = serde_json::from_str(
        r#"{
            "name": "chunks",
            "capacity": 4096,
            "batch_capacity": 256
        }"#,
    )?;
    let cache: Cache<Chunk> = CacheBuilder::from(config).build()?;

    for id in 0..64 {
        cache.insert(Chunk { id, len: 128 });
    }
    cache.settled().await;

    tracing::info!(usage = cache.usage(), len = cache.len(), "chunks cached");
    assert_eq!(cache.usage(), 4096);
    assert_eq!(cache.latest(1), vec![63]);

    Ok(())
}
