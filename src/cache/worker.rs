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

use std::os::unix::fs::FileExt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use super::CHUNK_SIZE;
use super::bitmap::{CLAIMED, ChunkBitmap, DONE, EMPTY};
use super::transport::RangeTransport;
use crate::common::types::AnyResult;

/// Everything a download worker needs, shared with the supervisor and every
/// other concurrently running worker.
pub struct WorkerContext {
    pub bitmap: Arc<ChunkBitmap>,
    pub transport: Arc<dyn RangeTransport>,
    pub file: Arc<std::fs::File>,
    pub chunk_done_tx: mpsc::Sender<u64>,
    pub worker_exit_tx: mpsc::Sender<()>,
    pub num_chunks: u64,
    pub length: u64,
}

/// Downloads chunks `[start, end)` — where `end` is the first chunk that is
/// not `EMPTY` when probed, or `num_chunks` if none is — and writes each to
/// its file offset as it arrives. The caller guarantees chunk `start` is
/// already `CLAIMED` by this worker.
pub async fn run(ctx: Arc<WorkerContext>, start: u64) {
    run_inner(&ctx, start).await;
    let _ = ctx.worker_exit_tx.send(()).await;
}

async fn run_inner(ctx: &WorkerContext, start: u64) {
    let mut end = start + 1;
    while end < ctx.num_chunks && ctx.bitmap.get(end) == EMPTY {
        end += 1;
    }

    let range_len = (end - start) * CHUNK_SIZE;
    let range_len = range_len.min(ctx.length - start * CHUNK_SIZE);

    let stream = match ctx.transport.open(start * CHUNK_SIZE, range_len).await {
        Ok(stream) => stream,
        Err(_) => {
            ctx.bitmap.set(start, EMPTY);
            return;
        }
    };

    let mut reader = StreamReader::new(stream);
    let mut chunk = start;

    while chunk < end {
        if chunk != start && !ctx.bitmap.compare_and_set(chunk, EMPTY, CLAIMED) {
            // Superseded: another worker already claimed (and will finish)
            // this chunk. The bytes we'd produce would race a concurrent
            // writer, so stop without releasing anything.
            return;
        }

        let want = chunk_len(chunk, ctx.num_chunks, ctx.length) as usize;
        let data = match reader.read_exact(want).await {
            Ok(data) => data,
            Err(_) => {
                ctx.bitmap.set(chunk, EMPTY);
                return;
            }
        };

        let offset = chunk * CHUNK_SIZE;
        let file = ctx.file.clone();
        let write_result =
            tokio::task::spawn_blocking(move || file.write_at(&data, offset)).await;
        match write_result {
            Ok(Ok(_)) => {}
            _ => {
                ctx.bitmap.set(chunk, EMPTY);
                return;
            }
        }

        ctx.bitmap.set(chunk, DONE);
        if ctx.chunk_done_tx.send(chunk).await.is_err() {
            // Supervisor is gone (quit); nothing more to do.
            return;
        }

        chunk += 1;
    }
}

fn chunk_len(index: u64, num_chunks: u64, length: u64) -> u64 {
    if index == num_chunks - 1 {
        let rem = length % CHUNK_SIZE;
        if rem == 0 { CHUNK_SIZE } else { rem }
    } else {
        CHUNK_SIZE
    }
}

/// Adapts a [`super::transport::ByteStream`] (arbitrarily-chunked `Bytes`
/// frames) into fixed-size reads, carrying any excess from one frame over
/// to the next `read_exact` call.
struct StreamReader {
    stream: super::transport::ByteStream,
    leftover: bytes::Bytes,
}

impl StreamReader {
    fn new(stream: super::transport::ByteStream) -> Self {
        Self {
            stream,
            leftover: bytes::Bytes::new(),
        }
    }

    /// Reads exactly `want` bytes. A short read (stream ends before `want`
    /// bytes arrive) is an error — only the final chunk of the resource is
    /// allowed to be short, and the caller already sized `want` accordingly
    /// for it.
    async fn read_exact(&mut self, want: usize) -> AnyResult<Vec<u8>> {
        let mut out = Vec::with_capacity(want);

        if !self.leftover.is_empty() {
            let take = self.leftover.len().min(want);
            out.extend_from_slice(&self.leftover[..take]);
            self.leftover = self.leftover.slice(take..);
        }

        while out.len() < want {
            match self.stream.next().await {
                Some(Ok(bytes)) => {
                    let need = want - out.len();
                    if bytes.len() <= need {
                        out.extend_from_slice(&bytes);
                    } else {
                        out.extend_from_slice(&bytes[..need]);
                        self.leftover = bytes.slice(need..);
                    }
                }
                Some(Err(e)) => return Err(Box::new(e)),
                None => return Err("short read from range transport".into()),
            }
        }

        Ok(out)
    }
}
