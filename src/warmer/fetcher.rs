//! HTTP fetcher implementation
//!
//! This module handles the HTTP side of warming:
//! - Building the default header set (user agent, encodings, marker header)
//! - Building the HTTP client
//! - Issuing one GET per item and classifying the result

use crate::state::ItemStatus;
use crate::storage::Resolution;
use crate::WarmerError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::time::{Duration, Instant};

/// Header sent with every request so origins can recognise warm traffic
pub const MARKER_HEADER: &str = "x-cache-warmer";

/// User agent used when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("CacheWarmer/", env!("CARGO_PKG_VERSION"));

/// Upper bound on stored error messages, in bytes
pub const MAX_ERROR_LEN: usize = 1024;

const MAX_REDIRECTS: usize = 10;

/// Result of fetching one URL
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Response with a 2xx or 3xx status, body read to completion
    Success { status_code: u16, duration: Duration },

    /// Response with any other status
    HttpStatus { status_code: u16, duration: Duration },

    /// Connection, DNS, TLS, redirect, body or timeout failure
    Transport {
        /// Status line, if one was received before the failure
        status_code: Option<u16>,
        error: String,
        duration: Duration,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success { status_code, .. } | Self::HttpStatus { status_code, .. } => {
                Some(*status_code)
            }
            Self::Transport { status_code, .. } => *status_code,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Success { duration, .. }
            | Self::HttpStatus { duration, .. }
            | Self::Transport { duration, .. } => *duration,
        }
    }

    /// Message stored in `last_error`; `None` on success
    pub fn last_error(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::HttpStatus { status_code, .. } => Some(format!("HTTP {}", status_code)),
            Self::Transport { error, .. } => Some(truncate_error(error, MAX_ERROR_LEN)),
        }
    }

    /// Converts the outcome into the terminal write for its queue item
    pub fn to_resolution(&self) -> Resolution {
        Resolution {
            status: if self.is_success() {
                ItemStatus::Done
            } else {
                ItemStatus::Failed
            },
            response_code: self.status_code(),
            duration_ms: self.duration().as_secs_f64() * 1000.0,
            last_error: self.last_error(),
        }
    }
}

/// Returns true for status codes that count as a warmed page
pub fn is_success_status(status_code: u16) -> bool {
    (200..400).contains(&status_code)
}

/// Builds the header set sent with every request
///
/// Defaults are `User-Agent`, `Accept-Encoding: gzip, deflate` and the
/// marker header. Caller headers are applied afterwards and replace a
/// default with the same (case-insensitive) name.
///
/// # Errors
///
/// Returns `WarmerError::InvalidHeader` if a name or value is not valid HTTP.
pub fn build_headers(
    user_agent: &str,
    extra: &[(String, String)],
) -> Result<HeaderMap, WarmerError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, header_value("User-Agent", user_agent)?);
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
    headers.insert(
        HeaderName::from_static(MARKER_HEADER),
        HeaderValue::from_static("1"),
    );

    for (name, value) in extra {
        let header_name =
            HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| WarmerError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        headers.insert(header_name, header_value(name, value.trim())?);
    }

    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, WarmerError> {
    HeaderValue::from_str(value).map_err(|e| WarmerError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Builds an HTTP client that sends `headers` on every request
///
/// Redirects are followed (up to 10 hops). Timeouts are applied per request
/// by [`fetch_url`], not here.
pub fn build_http_client(headers: HeaderMap) -> Result<Client, reqwest::Error> {
    Client::builder()
        .default_headers(headers)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
}

/// Fetches a URL and classifies the result
///
/// The body is read to completion so the origin finishes rendering the page.
/// `timeout` covers the whole exchange, body included. Never returns an
/// error: every failure is a [`FetchOutcome::Transport`] or
/// [`FetchOutcome::HttpStatus`].
pub async fn fetch_url(client: &Client, url: &str, timeout: Duration) -> FetchOutcome {
    let started = Instant::now();

    let response = match client.get(url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            return FetchOutcome::Transport {
                status_code: e.status().map(|s| s.as_u16()),
                error: describe_error(&e, timeout),
                duration: started.elapsed(),
            }
        }
    };

    let status_code = response.status().as_u16();

    if let Err(e) = response.bytes().await {
        return FetchOutcome::Transport {
            status_code: Some(status_code),
            error: describe_error(&e, timeout),
            duration: started.elapsed(),
        };
    }

    let duration = started.elapsed();
    if is_success_status(status_code) {
        FetchOutcome::Success {
            status_code,
            duration,
        }
    } else {
        FetchOutcome::HttpStatus {
            status_code,
            duration,
        }
    }
}

/// Renders a reqwest error with its source chain
fn describe_error(error: &reqwest::Error, timeout: Duration) -> String {
    if error.is_timeout() {
        return format!("timed out after {} ms", timeout.as_millis());
    }

    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Cuts `message` to at most `max_len` bytes on a char boundary
pub fn truncate_error(message: &str, max_len: usize) -> String {
    if message.len() <= max_len {
        return message.to_string();
    }

    let mut end = max_len;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
