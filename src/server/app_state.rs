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

use std::sync::Arc;

use crate::cache::Cache;
use crate::configs::Config;
use crate::sources::SourceManager;

/// Top-level application state shared across every request handler.
pub struct AppState {
    pub cache: Cache,
    pub source_manager: SourceManager,
    pub config: Config,
}

impl AppState {
    pub fn new(cache: Cache, source_manager: SourceManager, config: Config) -> Arc<Self> {
        Arc::new(Self {
            cache,
            source_manager,
            config,
        })
    }
}
