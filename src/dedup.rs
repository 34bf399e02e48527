use std::collections::HashMap;
use std::future::Future;

use sha2::{Digest as _, Sha256};

pub fn content_hash(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<V> {
    pub value: V,
    pub hit: bool,
}

#[derive(Debug, Clone)]
pub struct ContentHashCache<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for ContentHashCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V: Clone> ContentHashCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &str) -> Option<&V> {
        self.entries.get(hash)
    }

    pub fn insert(&mut self, hash: impl Into<String>, value: V) -> Option<V> {
        self.entries.insert(hash.into(), value)
    }

    /// A failed `make` caches nothing.
    pub async fn get_or_try_insert_with<F, Fut>(
        &mut self,
        hash: &str,
        make: F,
    ) -> anyhow::Result<Lookup<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        if let Some(value) = self.entries.get(hash) {
            return Ok(Lookup {
                value: value.clone(),
                hit: true,
            });
        }
        let value = make().await?;
        self.entries.insert(hash.to_owned(), value.clone());
        Ok(Lookup { value, hit: false })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
