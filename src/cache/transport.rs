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
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::common::types::AnyResult;

/// A byte stream covering some contiguous range of a resource, as produced
/// by [`RangeTransport::open`].
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// The external collaborator the range-cache core downloads through. Given
/// a URL, exposes a fixed resource length known up front and a factory that
/// produces a byte stream covering an arbitrary `[start, start+length)`
/// window of it.
#[async_trait]
pub trait RangeTransport: Send + Sync {
    /// Exact byte length of the resource.
    fn length(&self) -> u64;

    /// Produces a byte stream covering `[start, start+length)`. The caller
    /// (a download worker) always passes `length = (end - start) * chunk
    /// size`, truncated to the resource length — never a raw difference
    /// that could go negative.
    async fn open(&self, start: u64, length: u64) -> AnyResult<ByteStream>;
}

/// HTTP range transport over `reqwest`, using `Range: bytes=a-b` requests.
pub struct HttpRangeTransport {
    client: reqwest::Client,
    url: String,
    length: u64,
}

impl HttpRangeTransport {
    /// Resolves the resource's length via `HEAD` (falling back to a
    /// zero-length ranged `GET` when the server rejects `HEAD`) and returns
    /// a transport ready to serve `open` calls.
    pub async fn new(
        url: impl Into<String>,
        user_agent: Option<&str>,
        local_address: Option<IpAddr>,
        timeout: Duration,
    ) -> AnyResult<Self> {
        let url = url.into();
        let client = crate::common::http::HttpClient::build(user_agent, local_address, timeout)?;

        let length = Self::resolve_length(&client, &url).await?;

        Ok(Self {
            client,
            url,
            length,
        })
    }

    async fn resolve_length(client: &reqwest::Client, url: &str) -> AnyResult<u64> {
        let head = client.head(url).send().await;
        if let Ok(resp) = head {
            if resp.status().is_success() {
                if let Some(len) = resp.content_length() {
                    return Ok(len);
                }
            }
        }

        // Some servers reject HEAD; probe with a minimal ranged GET instead.
        let resp = client
            .get(url)
            .header("Range", "bytes=0-0")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(format!("range probe failed ({}): {url}", resp.status()).into());
        }
        if let Some(range_len) = parse_content_range_total(&resp) {
            return Ok(range_len);
        }
        resp.content_length()
            .ok_or_else(|| "could not determine resource length".into())
    }
}

fn parse_content_range_total(resp: &reqwest::Response) -> Option<u64> {
    let header = resp.headers().get(reqwest::header::CONTENT_RANGE)?;
    let text = header.to_str().ok()?;
    text.rsplit('/').next()?.parse().ok()
}

#[async_trait]
impl RangeTransport for HttpRangeTransport {
    fn length(&self) -> u64 {
        self.length
    }

    async fn open(&self, start: u64, length: u64) -> AnyResult<ByteStream> {
        let end = (start + length).saturating_sub(1).max(start);
        let resp = self
            .client
            .get(&self.url)
            .header("Range", format!("bytes={start}-{end}"))
            .send()
            .await?;

        if !(resp.status().as_u16() == 206 || resp.status().is_success()) {
            return Err(format!("range fetch failed ({}): {}", resp.status(), self.url).into());
        }

        let stream = resp
            .bytes_stream()
            .map(|r| r.map_err(|e| std::io::Error::other(e.to_string())));

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn resolves_length_from_head() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("HEAD", "/video.bin")
            .with_status(200)
            .with_header("content-length", "4096")
            .create_async()
            .await;

        let url = format!("{}/video.bin", server.url());
        let transport = HttpRangeTransport::new(url, None, None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(transport.length(), 4096);
    }

    #[tokio::test]
    async fn falls_back_to_ranged_get_when_head_unsupported() {
        let mut server = mockito::Server::new_async().await;
        let _head_mock = server.mock("HEAD", "/video.bin").with_status(405).create_async().await;
        let _get_mock = server
            .mock("GET", "/video.bin")
            .match_header("range", "bytes=0-0")
            .with_status(206)
            .with_header("content-range", "bytes 0-0/9000")
            .with_body([0u8])
            .create_async()
            .await;

        let url = format!("{}/video.bin", server.url());
        let transport = HttpRangeTransport::new(url, None, None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(transport.length(), 9000);
    }

    #[tokio::test]
    async fn open_sends_range_header_and_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let _head_mock = server
            .mock("HEAD", "/video.bin")
            .with_status(200)
            .with_header("content-length", "10")
            .create_async()
            .await;
        let _range_mock = server
            .mock("GET", "/video.bin")
            .match_header("range", "bytes=2-5")
            .with_status(206)
            .with_body(b"abcd".to_vec())
            .create_async()
            .await;

        let url = format!("{}/video.bin", server.url());
        let transport = HttpRangeTransport::new(url, Some("test-agent/1.0"), None, Duration::from_secs(5))
            .await
            .unwrap();

        let mut stream = transport.open(2, 4).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"abcd");
    }
}
