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

use std::net::SocketAddr;
use std::time::Duration;

use mediacache::cache::Cache;
use mediacache::common::types::AnyResult;
use mediacache::server::AppState;
use mediacache::sources::{SourceManager, http::HttpSource};
use tracing::info;

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = mediacache::configs::Config::load().await?;

    mediacache::common::logger::init(&config);

    info!("mediacache starting...");

    let local_address = config
        .network
        .local_address
        .as_deref()
        .and_then(|addr| addr.parse().ok());
    let timeout = Duration::from_secs(config.network.request_timeout_secs);

    let mut source_manager = SourceManager::new();
    source_manager.register(Box::new(HttpSource::new(
        config.network.user_agent.clone(),
        local_address,
        timeout,
    )));

    let cache = Cache::new(config.cache.directory.clone());
    let shared_state = AppState::new(cache, source_manager, config.clone());

    let app = mediacache::server::proxy::router()
        .with_state(shared_state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let ip: std::net::IpAddr = config.server.host.parse()?;
    let address = SocketAddr::from((ip, config.server.port));
    info!("mediacache listening on {}", address);

    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
