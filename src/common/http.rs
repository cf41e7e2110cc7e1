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
use std::time::Duration;

use reqwest::{Client, Error};

/// Builds the shared `reqwest` client used by range transports and site
/// resolvers alike, so every outbound request carries a consistent identity.
pub struct HttpClient;

impl HttpClient {
    pub const USER_AGENT: &'static str = "Mozilla/5.0 (compatible; mediacache/0.1.0)";

    pub fn build(
        user_agent: Option<&str>,
        local_address: Option<IpAddr>,
        timeout: Duration,
    ) -> Result<Client, Error> {
        let mut builder = Client::builder()
            .user_agent(user_agent.unwrap_or(Self::USER_AGENT))
            .timeout(timeout);

        if let Some(addr) = local_address {
            builder = builder.local_address(addr);
        }

        builder.build()
    }

    pub fn new() -> Result<Client, Error> {
        Self::build(None, None, Duration::from_secs(10))
    }
}
