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

pub mod bitmap;
pub mod object;
pub mod preallocate;
pub mod reader;
pub mod registry;
pub mod transport;
pub mod worker;

pub use object::CacheObject;
pub use reader::CachedReader;
pub use registry::Cache;
pub use transport::{ByteStream, HttpRangeTransport, RangeTransport};

/// Fixed size of every chunk but (possibly) the last, in bytes.
pub const CHUNK_SIZE: u64 = 512 * 1024;

/// `ceil(length / CHUNK_SIZE)`, the number of chunks a resource of this
/// length is divided into. Used uniformly everywhere a chunk index is
/// bounded — there is no special-casing of the last chunk's index, only of
/// its length (see [`worker::run`]).
pub fn num_chunks(length: u64) -> u64 {
    length.div_ceil(CHUNK_SIZE)
}
