// Copyright (c) 2026 mediacache contributors
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

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::object::CacheObject;
use super::transport::RangeTransport;
use crate::common::types::{AnyResult, CacheKey};

/// The process-wide table of live cache objects, keyed by resource.
///
/// `get` holds the registry lock across object creation (including the
/// pre-allocation syscall), so two concurrent lookups for the same key
/// never race to create two supervisors for the same resource — the
/// second caller simply observes the first's object once it's inserted.
pub struct Cache {
    dir: PathBuf,
    objects: Mutex<HashMap<CacheKey, Arc<CacheObject>>>,
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cache object for `key`, creating and registering one via
    /// `transport` if none exists yet.
    pub async fn get(&self, key: CacheKey, transport: Arc<dyn RangeTransport>) -> AnyResult<Arc<CacheObject>> {
        let mut objects = self.objects.lock().await;
        if let Some(object) = objects.get(&key) {
            return Ok(object.clone());
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let object = CacheObject::spawn(&key, &self.dir, transport).await?;
        objects.insert(key, object.clone());
        Ok(object)
    }

    /// Removes `key`'s cache object, signalling its supervisor to tear
    /// down. Pending reads against it will observe `ObjectRemoved`.
    pub async fn remove(&self, key: &CacheKey) {
        let mut objects = self.objects.lock().await;
        if let Some(object) = objects.remove(key) {
            object.quit().await;
            info!(key = %key, "removed cache object");
        }
    }

    pub async fn keys(&self) -> Vec<CacheKey> {
        self.objects.lock().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    /// Tears down every live object. Used on shutdown.
    pub async fn close(&self) {
        let mut objects = self.objects.lock().await;
        for (_, object) in objects.drain() {
            object.quit().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::transport::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;

    struct FakeTransport {
        length: u64,
        data: Vec<u8>,
    }

    #[async_trait]
    impl RangeTransport for FakeTransport {
        fn length(&self) -> u64 {
            self.length
        }

        async fn open(&self, start: u64, length: u64) -> AnyResult<ByteStream> {
            let end = (start + length) as usize;
            let slice = self.data[start as usize..end].to_vec();
            Ok(Box::pin(stream::iter(vec![Ok(Bytes::from(slice))])))
        }
    }

    #[tokio::test]
    async fn get_deduplicates_concurrent_creation() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(Cache::new(dir.path().to_path_buf()));
        let data = vec![1u8; 4096];

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let data = data.clone();
            handles.push(tokio::spawn(async move {
                let transport: Arc<dyn RangeTransport> = Arc::new(FakeTransport {
                    length: data.len() as u64,
                    data,
                });
                cache.get(CacheKey::from("shared"), transport).await.unwrap()
            }));
        }

        let mut objects = Vec::new();
        for h in handles {
            objects.push(h.await.unwrap());
        }
        for pair in objects.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn remove_evicts_and_signals_removal() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().to_path_buf());
        let transport: Arc<dyn RangeTransport> = Arc::new(FakeTransport {
            length: 10,
            data: vec![0u8; 10],
        });
        let key = CacheKey::from("evict-me");
        cache.get(key.clone(), transport).await.unwrap();
        assert_eq!(cache.len().await, 1);

        cache.remove(&key).await;
        assert_eq!(cache.len().await, 0);
    }
}
