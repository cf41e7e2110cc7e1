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

pub mod http;
pub mod plugin;

pub use plugin::{Media, RangeCacheSource, Request};

/// Coordinates all registered site adapters, tried in registration order.
pub struct SourceManager {
    sources: Vec<Box<dyn RangeCacheSource>>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Registers `source` last in the resolution order.
    pub fn register(&mut self, source: Box<dyn RangeCacheSource>) {
        self.sources.push(source);
    }

    /// Resolves `identifier` by trying every adapter's cheap `can_handle`
    /// first, then falling back to network-confirming `confirm`.
    pub async fn resolve(&self, identifier: &str) -> crate::common::types::AnyResult<Request> {
        for source in &self.sources {
            if source.can_handle(identifier) {
                tracing::debug!(source = source.name(), identifier, "resolved by cheap match");
                return source.resolve(identifier).await;
            }
        }

        for source in &self.sources {
            if source.confirm(identifier).await {
                tracing::debug!(source = source.name(), identifier, "resolved by confirm");
                return source.resolve(identifier).await;
            }
        }

        Err(format!("no source could resolve: {identifier}").into())
    }
}

impl Default for SourceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct AlwaysMatches;

    #[async_trait]
    impl RangeCacheSource for AlwaysMatches {
        fn name(&self) -> &str {
            "always"
        }
        fn can_handle(&self, _identifier: &str) -> bool {
            true
        }
        async fn resolve(&self, identifier: &str) -> crate::common::types::AnyResult<Request> {
            Ok(Request {
                title: identifier.to_string(),
                filename: identifier.to_string(),
                media: vec![],
            })
        }
    }

    struct NeverMatches;

    #[async_trait]
    impl RangeCacheSource for NeverMatches {
        fn name(&self) -> &str {
            "never"
        }
        fn can_handle(&self, _identifier: &str) -> bool {
            false
        }
        async fn resolve(&self, identifier: &str) -> crate::common::types::AnyResult<Request> {
            Ok(Request {
                title: identifier.to_string(),
                filename: identifier.to_string(),
                media: vec![],
            })
        }
    }

    #[tokio::test]
    async fn first_registered_match_wins() {
        let mut manager = SourceManager::new();
        manager.register(Box::new(NeverMatches));
        manager.register(Box::new(AlwaysMatches));

        let request = manager.resolve("anything").await.unwrap();
        assert_eq!(request.title, "anything");
    }

    #[tokio::test]
    async fn no_match_is_an_error() {
        let mut manager = SourceManager::new();
        manager.register(Box::new(NeverMatches));
        assert!(manager.resolve("anything").await.is_err());
    }
}
