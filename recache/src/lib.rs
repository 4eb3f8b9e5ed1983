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

//! recache - size-bounded concurrent LRU cache for Rust.
//!
//! ```
//! use recache::{Cache, Entry};
//!
//! struct Page {
//!     url: String,
//!     body: Vec<u8>,
//! }
//!
//! impl Entry for Page {
//!     type Key = String;
//!
//!     fn key(&self) -> &String {
//!         &self.url
//!     }
//!
//!     fn size(&self) -> usize {
//!         self.body.len()
//!     }
//! }
//!
//! let cache = Cache::new(1024);
//! cache.insert(Page {
//!     url: "/index".to_string(),
//!     body: vec![0; 512],
//! });
//! assert_eq!(cache.get("/index").unwrap().body.len(), 512);
//! assert_eq!(cache.usage(), 512);
//! ```

pub use recache_common as common;
pub use recache_memory as memory;

mod prelude;
pub use prelude::*;
