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
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::bitmap::{CLAIMED, ChunkBitmap, DONE, EMPTY};
use super::preallocate::preallocate;
use super::transport::RangeTransport;
use super::worker::{self, WorkerContext};
use super::{CHUNK_SIZE, num_chunks};
use crate::common::errors::CacheError;
use crate::common::types::AnyResult;

/// A reader's request that chunks `[start_chunk, end_chunk]` become `DONE`.
/// The supervisor promises to deliver exactly one reply.
struct ReadRequest {
    start_chunk: u64,
    end_chunk: u64,
    reply: oneshot::Sender<Result<(), CacheError>>,
}

/// A shared handle to a per-resource supervisor ("object"). Cheap to clone;
/// every `CachedReader` holds one of these and talks to the supervisor's
/// control loop through its channels.
pub struct CacheObject {
    pub(crate) file: Arc<std::fs::File>,
    pub(crate) length: u64,
    pub(crate) num_chunks: u64,
    request_tx: mpsc::Sender<ReadRequest>,
    quit_tx: mpsc::Sender<()>,
    // Approximate count of DONE chunks, maintained for observability only —
    // never consulted for correctness, which always goes through the bitmap.
    done_hint: Arc<AtomicU64>,
}

impl CacheObject {
    /// Opens a pre-allocated, unlinked backing file for `transport`'s
    /// resource under `dir`, and spawns the supervisor control loop.
    pub async fn spawn(
        key: &str,
        dir: &Path,
        transport: Arc<dyn RangeTransport>,
    ) -> AnyResult<Arc<Self>> {
        let length = transport.length();
        let path = dir.join(key);

        let file = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .truncate(true)
                    .open(&path)?;
                preallocate(&file, length as i64)?;
                // Unlinking immediately makes the file anonymous: the
                // descriptor keeps the data alive, but nothing on disk
                // references it, so a crash never leaves a stale cache
                // file behind.
                std::fs::remove_file(&path)?;
                Ok(file)
            })
            .await??
        };

        let file = Arc::new(file);
        let n = num_chunks(length);
        let bitmap = Arc::new(ChunkBitmap::new(n));

        let (request_tx, request_rx) = mpsc::channel(1);
        let (quit_tx, quit_rx) = mpsc::channel(1);
        let (chunk_done_tx, chunk_done_rx) = mpsc::channel(1);
        let (worker_exit_tx, worker_exit_rx) = mpsc::channel(1);

        let ctx = Arc::new(WorkerContext {
            bitmap: bitmap.clone(),
            transport,
            file: file.clone(),
            chunk_done_tx,
            worker_exit_tx,
            num_chunks: n,
            length,
        });

        // Claim and start the first worker before the control loop exists,
        // matching the original task-master's synchronous startup. A
        // zero-length resource has no chunks to claim at all.
        let running = if n > 0 {
            let claimed = bitmap.compare_and_set(0, EMPTY, CLAIMED);
            debug_assert!(claimed, "chunk 0 must be claimable on a fresh bitmap");
            tokio::spawn(worker::run(ctx.clone(), 0));
            1
        } else {
            0
        };

        let done_hint = Arc::new(AtomicU64::new(0));

        let supervisor = Supervisor {
            bitmap,
            file: file.clone(),
            length,
            num_chunks: n,
            ctx,
            request_rx,
            quit_rx,
            chunk_done_rx,
            worker_exit_rx,
            pending: Vec::new(),
            running,
            done_hint: done_hint.clone(),
        };
        tokio::spawn(supervisor.run());

        Ok(Arc::new(Self {
            file,
            length,
            num_chunks: n,
            request_tx,
            quit_tx,
            done_hint,
        }))
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Approximate fraction of chunks currently `DONE`, for metrics/logging
    /// only.
    pub fn progress(&self) -> f64 {
        if self.num_chunks == 0 {
            return 1.0;
        }
        self.done_hint.load(Ordering::Relaxed) as f64 / self.num_chunks as f64
    }

    /// Asks the supervisor whether every chunk covering `[start, end)`
    /// (byte offsets) is `DONE`, blocking until it is (or the object is
    /// removed).
    pub async fn ready(&self, start: u64, end: u64) -> Result<(), CacheError> {
        if start >= end {
            return Ok(());
        }
        let start_chunk = start / CHUNK_SIZE;
        let end_chunk = (end - 1) / CHUNK_SIZE;

        let (reply, rx) = oneshot::channel();
        let req = ReadRequest {
            start_chunk,
            end_chunk,
            reply,
        };

        if self.request_tx.send(req).await.is_err() {
            return Err(CacheError::ObjectRemoved);
        }

        rx.await.unwrap_or(Err(CacheError::ObjectRemoved))
    }

    pub(crate) fn read_at_blocking(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    /// Signals the supervisor to tear down: close the backing file, reply
    /// `ObjectRemoved` to every pending request, and stop.
    pub async fn quit(&self) {
        let _ = self.quit_tx.send(()).await;
    }
}

struct Supervisor {
    bitmap: Arc<ChunkBitmap>,
    file: Arc<std::fs::File>,
    length: u64,
    num_chunks: u64,
    ctx: Arc<WorkerContext>,
    request_rx: mpsc::Receiver<ReadRequest>,
    quit_rx: mpsc::Receiver<()>,
    chunk_done_rx: mpsc::Receiver<u64>,
    worker_exit_rx: mpsc::Receiver<()>,
    pending: Vec<ReadRequest>,
    running: u32,
    done_hint: Arc<AtomicU64>,
}

impl Supervisor {
    async fn run(mut self) {
        let completed = if self.running > 0 {
            self.downloading_loop().await
        } else {
            true
        };
        if completed {
            self.complete_loop().await;
        }
    }

    /// Runs until every chunk is `DONE` or a quit signal arrives. Returns
    /// `true` if it exited because downloading genuinely completed, `false`
    /// if it exited because of `quit` — in which case `run` must NOT fall
    /// through to `complete_loop`, since the object has been torn down and
    /// every later `ready()` call must see `ObjectRemoved`.
    async fn downloading_loop(&mut self) -> bool {
        loop {
            tokio::select! {
                biased;

                Some(()) = self.quit_rx.recv() => {
                    self.teardown().await;
                    return false;
                }
                Some(req) = self.request_rx.recv() => {
                    self.handle_request(req);
                }
                Some(chunk) = self.chunk_done_rx.recv() => {
                    self.done_hint.fetch_add(1, Ordering::Relaxed);
                    self.handle_chunk_done(chunk);
                }
                Some(()) = self.worker_exit_rx.recv() => {
                    if self.handle_worker_exit().await {
                        return true;
                    }
                }
                else => return false,
            }
        }
    }

    fn handle_request(&mut self, req: ReadRequest) {
        for i in req.start_chunk..=req.end_chunk {
            if self.bitmap.compare_and_set(i, EMPTY, CLAIMED) {
                tokio::spawn(worker::run(self.ctx.clone(), i));
                self.running += 1;
                self.pending.push(req);
                return;
            } else if self.bitmap.get(i) == CLAIMED {
                self.pending.push(req);
                return;
            }
        }
        // Every chunk in range was already DONE.
        let _ = req.reply.send(Ok(()));
    }

    fn handle_chunk_done(&mut self, chunk: u64) {
        let mut i = 0;
        while i < self.pending.len() {
            let covers = self.pending[i].start_chunk <= chunk && chunk <= self.pending[i].end_chunk;
            let satisfied = covers
                && (self.pending[i].start_chunk..=self.pending[i].end_chunk)
                    .all(|j| self.bitmap.get(j) == DONE);
            if satisfied {
                let req = self.pending.swap_remove(i);
                let _ = req.reply.send(Ok(()));
            } else {
                i += 1;
            }
        }
    }

    /// Returns `true` if the object transitioned to *complete* and the
    /// downloading loop should stop.
    async fn handle_worker_exit(&mut self) -> bool {
        self.running -= 1;
        if self.running == 0 {
            if let Some(next) = self.bitmap.first_empty() {
                let claimed = self.bitmap.compare_and_set(next, EMPTY, CLAIMED);
                debug_assert!(claimed);
                tokio::spawn(worker::run(self.ctx.clone(), next));
                self.running = 1;
            }
        }
        if self.running == 0 {
            debug_assert!(self.bitmap.all_done());
            for req in self.pending.drain(..) {
                let _ = req.reply.send(Ok(()));
            }
            return true;
        }
        false
    }

    async fn teardown(&mut self) {
        for req in self.pending.drain(..) {
            let _ = req.reply.send(Err(CacheError::ObjectRemoved));
        }
        warn!("cache object removed mid-download");
    }

    async fn complete_loop(mut self) {
        loop {
            tokio::select! {
                biased;

                Some(()) = self.quit_rx.recv() => {
                    debug!("cache object closed after completion");
                    return;
                }
                Some(req) = self.request_rx.recv() => {
                    let _ = req.reply.send(Ok(()));
                }
                else => return,
            }
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
            let s = stream::iter(vec![Ok(Bytes::from(slice))]);
            Ok(Box::pin(s))
        }
    }

    fn data_of(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn s1_sequential_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = data_of(1024);
        let transport = Arc::new(FakeTransport {
            length: 1024,
            data: data.clone(),
        });

        let obj = CacheObject::spawn("s1", dir.path(), transport).await.unwrap();
        obj.ready(0, 1024).await.unwrap();

        let mut buf = vec![0u8; 1024];
        let n = obj.read_at_blocking(&mut buf, 0).unwrap();
        assert_eq!(n, 1024);
        assert_eq!(buf, data);
    }

    #[tokio::test]
    async fn s2_out_of_order_read() {
        let dir = tempfile::tempdir().unwrap();
        let len = 2 * 1024 * 1024;
        let data = data_of(len);
        let transport = Arc::new(FakeTransport {
            length: len as u64,
            data: data.clone(),
        });

        let obj = CacheObject::spawn("s2", dir.path(), transport).await.unwrap();

        let obj_a = obj.clone();
        let obj_b = obj.clone();
        let (ra, rb) = tokio::join!(
            async move {
                obj_a.ready(1024 * 1024, 1024 * 1024 + 4).await.unwrap();
                let mut buf = [0u8; 4];
                obj_a.read_at_blocking(&mut buf, 1024 * 1024).unwrap();
                buf
            },
            async move {
                obj_b.ready(0, 4).await.unwrap();
                let mut buf = [0u8; 4];
                obj_b.read_at_blocking(&mut buf, 0).unwrap();
                buf
            }
        );

        assert_eq!(ra, data[1024 * 1024..1024 * 1024 + 4]);
        assert_eq!(rb, data[0..4]);
    }

    #[tokio::test]
    async fn s3_removal_mid_stream_fails_gating() {
        let dir = tempfile::tempdir().unwrap();
        let len = 4 * 1024 * 1024;
        let data = data_of(len);
        let transport = Arc::new(FakeTransport {
            length: len as u64,
            data,
        });

        let obj = CacheObject::spawn("s3", dir.path(), transport).await.unwrap();
        obj.quit().await;

        // Give the supervisor a moment to process the quit before asserting.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let result = obj.ready(0, 4).await;
        assert!(matches!(result, Err(CacheError::ObjectRemoved)));
    }

    #[tokio::test]
    async fn s6_uncovered_region_completes_independently() {
        let dir = tempfile::tempdir().unwrap();
        let len = 3 * CHUNK_SIZE as usize;
        let data = data_of(len);
        let transport = Arc::new(FakeTransport {
            length: len as u64,
            data: data.clone(),
        });

        let obj = CacheObject::spawn("s6", dir.path(), transport).await.unwrap();
        let start = 2 * CHUNK_SIZE;
        obj.ready(start, start + 4).await.unwrap();

        let mut buf = [0u8; 4];
        obj.read_at_blocking(&mut buf, start).unwrap();
        assert_eq!(buf, data[start as usize..start as usize + 4]);
    }
}
