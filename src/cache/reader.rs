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

use std::io::SeekFrom;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::object::CacheObject;
use crate::common::errors::CacheError;

/// Bytes moved per `write_to` iteration. Small enough to give a reader
/// waiting on the front of the file quick turnaround, large enough to avoid
/// a syscall per kilobyte.
const WRITE_STEP: u64 = 32 * 1024;

/// A seekable, async reader over a [`CacheObject`]'s backing file. Each
/// read blocks only until the bytes it needs are `DONE`, never until the
/// whole resource is.
pub struct CachedReader {
    object: Arc<CacheObject>,
    pos: u64,
}

impl CachedReader {
    pub fn new(object: Arc<CacheObject>) -> Self {
        Self { object, pos: 0 }
    }

    pub fn len(&self) -> u64 {
        self.object.length()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Repositions the cursor. `SeekFrom::End` resolves against the
    /// resource's known total length, so seeking to the end of a file that
    /// is still downloading works without waiting for completion.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, CacheError> {
        let base = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(p) => self.pos as i64 + p,
            SeekFrom::End(p) => self.object.length() as i64 + p,
        };
        if base < 0 {
            self.pos = 0;
            return Err(CacheError::NegativeOffset);
        }
        self.pos = base as u64;
        Ok(self.pos)
    }

    /// Reads into `buf` starting at the cursor, advancing it by the number
    /// of bytes read. Returns `0` at end of file.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, CacheError> {
        let n = self.read_at(self.pos, buf).await?;
        self.pos += n as u64;
        Ok(n)
    }

    /// Reads into `buf` starting at `offset`, without touching the cursor.
    /// Blocks until every chunk covering the requested window is `DONE`.
    pub async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, CacheError> {
        let length = self.object.length();
        if offset >= length || buf.is_empty() {
            return Ok(0);
        }

        let end = (offset + buf.len() as u64).min(length);
        self.object.ready(offset, end).await?;

        let want = (end - offset) as usize;
        let n = self.object.read_at_blocking(&mut buf[..want], offset)?;
        Ok(n)
    }

    /// Streams `[start, end)` to `writer` in fixed-size steps, waiting for
    /// each step's chunks to become ready before the positional read and
    /// write. Used by the proxy to serve a response body without holding
    /// the whole range in memory.
    pub async fn write_to<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        start: u64,
        end: u64,
    ) -> Result<u64, CacheError> {
        let end = end.min(self.object.length());
        let mut offset = start;
        let mut total = 0u64;
        let mut buf = vec![0u8; WRITE_STEP as usize];

        while offset < end {
            let want = WRITE_STEP.min(end - offset) as usize;
            let n = self.read_at(offset, &mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            offset += n as u64;
            total += n as u64;
        }

        Ok(total)
    }

    /// Reads `[start, end)` into a single buffer. A thin convenience over
    /// `read_at` for callers (the proxy) that need the whole range at once
    /// rather than streamed to a sink.
    pub async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>, CacheError> {
        let end = end.min(self.object.length());
        if start >= end {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; (end - start) as usize];
        let n = self.read_at(start, &mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::transport::ByteStream;
    use crate::common::types::AnyResult;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;

    struct FakeTransport {
        length: u64,
        data: Vec<u8>,
    }

    #[async_trait]
    impl super::super::transport::RangeTransport for FakeTransport {
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
    async fn seek_from_end_resolves_against_known_length() {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let transport = Arc::new(FakeTransport {
            length: data.len() as u64,
            data: data.clone(),
        });
        let obj = CacheObject::spawn("seek", dir.path(), transport)
            .await
            .unwrap();
        let mut reader = CachedReader::new(obj);

        let pos = reader.seek(SeekFrom::End(-10)).unwrap();
        assert_eq!(pos, 1990);

        let mut buf = [0u8; 10];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(n, 10);
        assert_eq!(buf, data[1990..2000]);
    }

    #[tokio::test]
    async fn negative_seek_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data = vec![0u8; 100];
        let transport = Arc::new(FakeTransport {
            length: data.len() as u64,
            data,
        });
        let obj = CacheObject::spawn("neg", dir.path(), transport)
            .await
            .unwrap();
        let mut reader = CachedReader::new(obj);
        let err = reader.seek(SeekFrom::Current(-1)).unwrap_err();
        assert!(matches!(err, CacheError::NegativeOffset));
        assert_eq!(reader.position(), 0);
    }

    #[tokio::test]
    async fn negative_seek_from_nonzero_position_resets_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let data = vec![0u8; 100];
        let transport = Arc::new(FakeTransport {
            length: data.len() as u64,
            data,
        });
        let obj = CacheObject::spawn("neg-nonzero", dir.path(), transport)
            .await
            .unwrap();
        let mut reader = CachedReader::new(obj);
        reader.seek(SeekFrom::Start(50)).unwrap();
        let err = reader.seek(SeekFrom::End(-1000)).unwrap_err();
        assert!(matches!(err, CacheError::NegativeOffset));
        assert_eq!(reader.position(), 0);
    }

    #[tokio::test]
    async fn write_to_streams_full_range() {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 256) as u8).collect();
        let transport = Arc::new(FakeTransport {
            length: data.len() as u64,
            data: data.clone(),
        });
        let obj = CacheObject::spawn("wt", dir.path(), transport)
            .await
            .unwrap();
        let reader = CachedReader::new(obj);

        let mut out = Vec::new();
        let n = reader.write_to(&mut out, 0, data.len() as u64).await.unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(out, data);
    }
}
