//! HTTP transport abstraction for testability.
//!
//! Every network call the loader makes goes through [`HttpTransport`], so the
//! index client and the downloader can be exercised against in-memory mocks.

use std::io::{Read, Write};
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::StatusCode;
use thiserror::Error;

use crate::download::DownloadRange;

/// Default timeout for the index fetch and HEAD requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Timeout for establishing a connection. The only bound on a streamed GET.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffer size for streaming response bodies (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Progress callback for streamed downloads: `(bytes_so_far, total_if_known)`.
pub type ProgressFn<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// Errors raised by an [`HttpTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The server answered with an unexpected status code.
    #[error("unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    /// HEAD response carried no `Content-Length` header.
    #[error("no Content-Length in response from {url}")]
    MissingContentLength { url: String },

    /// `Content-Length` was present but not a number.
    #[error("invalid Content-Length '{value}' from {url}")]
    InvalidContentLength { url: String, value: String },

    /// A ranged response did not cover exactly the requested bytes.
    #[error("range {start}-{end} from {url} returned {received} bytes")]
    ShortRange {
        url: String,
        start: u64,
        end: u64,
        received: u64,
    },

    /// Request timed out.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Writing the response body failed.
    #[error("failed to write response body: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for the HTTP operations the loader needs.
///
/// Implementations must be shareable across the ranged-download workers.
pub trait HttpTransport: Send + Sync {
    /// GET a resource and return its body. Non-success statuses are errors.
    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    /// HEAD a resource and return its numeric `Content-Length`.
    fn content_length(&self, url: &str) -> Result<u64, TransportError>;

    /// GET an inclusive byte range into `sink`, bounded by `timeout`.
    ///
    /// Returns the number of bytes written. Only a `206 Partial Content`
    /// response is accepted.
    fn get_range(
        &self,
        url: &str,
        range: DownloadRange,
        timeout: Duration,
        sink: &mut dyn Write,
    ) -> Result<u64, TransportError>;

    /// Stream a whole resource into `sink`, reporting progress as bytes arrive.
    fn get_streamed(
        &self,
        url: &str,
        sink: &mut dyn Write,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, TransportError>;
}

/// Blocking `reqwest` implementation of [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with the default request timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom timeout for index and HEAD requests.
    ///
    /// Ranged requests carry their own per-chunk timeout. Streamed downloads
    /// have no overall deadline, only [`CONNECT_TIMEOUT`].
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("cefloader/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, timeout })
    }

    fn get_request(&self, url: &str) -> RequestBuilder {
        self.client.get(url).timeout(self.timeout)
    }

    fn head_request(&self, url: &str) -> RequestBuilder {
        self.client.head(url).timeout(self.timeout)
    }

    fn range_request(&self, url: &str, range: DownloadRange, timeout: Duration) -> RequestBuilder {
        self.client
            .get(url)
            .timeout(timeout)
            .header(RANGE, range.header_value())
    }

    fn streamed_request(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    fn send(
        &self,
        url: &str,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        request.send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                    timeout_secs: timeout.as_secs(),
                }
            } else {
                TransportError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }

    /// Copy a response body into `sink`, calling `on_chunk` with the running total.
    fn copy_body(
        &self,
        url: &str,
        mut response: Response,
        sink: &mut dyn Write,
        mut on_chunk: impl FnMut(u64),
    ) -> Result<u64, TransportError> {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| TransportError::Request {
                    url: url.to_string(),
                    reason: format!("read error: {}", e),
                })?;

            if bytes_read == 0 {
                break;
            }

            sink.write_all(&buffer[..bytes_read])?;
            written += bytes_read as u64;
            on_chunk(written);
        }

        sink.flush()?;
        Ok(written)
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.send(url, self.get_request(url), self.timeout)?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                reason: format!("failed to read response: {}", e),
            })
    }

    fn content_length(&self, url: &str) -> Result<u64, TransportError> {
        let response = self.send(url, self.head_request(url), self.timeout)?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let value = response
            .headers()
            .get(CONTENT_LENGTH)
            .ok_or_else(|| TransportError::MissingContentLength {
                url: url.to_string(),
            })?;

        let text = value.to_str().unwrap_or_default();
        text.trim()
            .parse::<u64>()
            .map_err(|_| TransportError::InvalidContentLength {
                url: url.to_string(),
                value: text.to_string(),
            })
    }

    fn get_range(
        &self,
        url: &str,
        range: DownloadRange,
        timeout: Duration,
        sink: &mut dyn Write,
    ) -> Result<u64, TransportError> {
        let response = self.send(url, self.range_request(url, range, timeout), timeout)?;

        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let received = self.copy_body(url, response, sink, |_| {})?;
        if received != range.byte_count() {
            return Err(TransportError::ShortRange {
                url: url.to_string(),
                start: range.start,
                end: range.end,
                received,
            });
        }

        Ok(received)
    }

    fn get_streamed(
        &self,
        url: &str,
        sink: &mut dyn Write,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, TransportError> {
        let response = self.send(url, self.streamed_request(url), CONNECT_TIMEOUT)?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length();
        self.copy_body(url, response, sink, |written| on_progress(written, total))
    }
}
