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

//! Look up composite keys without allocating them.

use equivalent::Equivalent;
use recache::{Cache, Entry};

#[derive(Hash, PartialEq, Eq)]
pub struct Pair<A, B>(pub A, pub B);

impl<'a, A: ?Sized, B: ?Sized, C, D> Equivalent<(C, D)> for Pair<&'a A, &'a B>
where
    A: Equivalent<C>,
    B: Equivalent<D>,
{
    fn equivalent(&self, key: &(C, D)) -> bool {
        self.0.equivalent(&key.0) && self.1.equivalent(&key.1)
    }
}

struct Translation {
    key: (String, String),
    text: String,
}

impl Entry for Translation {
    type Key = (String, String);

    fn key(&self) -> &Self::Key {
        &self.key
    }

    fn size(&self) -> usize {
        self.text.len()
    }
}

fn main() {
    let cache = Cache::new(1024);

    cache.insert(Translation {
        key: ("en".to_string(), "hello".to_string()),
        text: "bonjour".to_string(),
    });
    // With `Equivalent`, `Pair(&str, &str)` can be used to look up `(String, String)`.
    let e = cache.get(&Pair("en", "hello")).unwrap();

    assert_eq!(e.text, "bonjour");
}
