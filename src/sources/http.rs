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

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::plugin::{Media, RangeCacheSource, Request};
use crate::cache::HttpRangeTransport;
use crate::common::types::AnyResult;

/// Generic passthrough resolver: treats any `http(s)://` identifier as a
/// single directly fetchable resource. The resolver of last resort —
/// registered after every site-specific adapter.
pub struct HttpSource {
    user_agent: Option<String>,
    local_address: Option<IpAddr>,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(user_agent: Option<String>, local_address: Option<IpAddr>, timeout: Duration) -> Self {
        Self {
            user_agent,
            local_address,
            timeout,
        }
    }
}

#[async_trait]
impl RangeCacheSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    fn can_handle(&self, identifier: &str) -> bool {
        identifier.starts_with("http://") || identifier.starts_with("https://")
    }

    async fn resolve(&self, identifier: &str) -> AnyResult<Request> {
        let transport = HttpRangeTransport::new(
            identifier,
            self.user_agent.as_deref(),
            self.local_address,
            self.timeout,
        )
        .await?;
        let size = transport.length();

        let filename = identifier
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("resource")
            .to_string();

        Ok(Request {
            title: filename.clone(),
            filename,
            media: vec![Media {
                uid: identifier.to_string(),
                size,
                mime_type: "application/octet-stream".to_string(),
                transport: Arc::new(transport),
            }],
        })
    }
}
