//! Raw transport response and the decoders callers apply to it.
//!
//! The executor never reads the body. Decoding is the caller's step:
//! [`Response::bytes`], [`Response::text`], [`Response::text_with_charset`],
//! [`Response::json`], [`Response::jsonp`] and [`Response::html`] each
//! consume the response.

use std::fmt;
use std::sync::LazyLock;

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use regex::bytes::Regex;
use scraper::Html;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::request::BoxError;

/// Streaming response body.
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Leading junk, then the first `[`/`{` through the last `]`/`}`, then trailing junk.
#[allow(clippy::expect_used)]
static JSONP_PAYLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\[{]*([\[{][\s\S]*[\]}])[^\]}]*$").expect("JSONP regex is valid") // Static pattern, safe to panic
});

/// Errors produced while decoding a response body.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read response body: {0}")]
    Body(#[source] BoxError),

    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no JSON payload found in response body")]
    NoJsonPayload,

    #[error("unknown character set {label:?}")]
    UnknownCharset { label: String },
}

/// A response whose body has not been read yet.
pub struct Response {
    inner: http::Response<ResponseBody>,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.inner.status())
            .field("headers", self.inner.headers())
            .finish_non_exhaustive()
    }
}

impl Response {
    /// Wraps a transport response.
    #[must_use]
    pub fn new(inner: http::Response<ResponseBody>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns the underlying `http::Response` with its body stream.
    #[must_use]
    pub fn into_inner(self) -> http::Response<ResponseBody> {
        self.inner
    }

    /// Reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Body`] if the stream fails, including when the
    /// connection's transfer deadline passes mid-body.
    pub async fn bytes(self) -> Result<Bytes, DecodeError> {
        let collected = self
            .inner
            .into_body()
            .collect()
            .await
            .map_err(DecodeError::Body)?;
        Ok(collected.to_bytes())
    }

    /// Reads the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Body`] or [`DecodeError::Utf8`].
    pub async fn text(self) -> Result<String, DecodeError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Reads the body and transcodes it from the character set named by
    /// `label` (e.g. `gbk`, `shift_jis`, `windows-1252`).
    ///
    /// Malformed sequences become U+FFFD. A byte order mark overrides `label`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownCharset`] before reading anything if
    /// `label` names no known encoding, or [`DecodeError::Body`].
    pub async fn text_with_charset(self, label: &str) -> Result<String, DecodeError> {
        let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            DecodeError::UnknownCharset {
                label: label.to_string(),
            }
        })?;
        let bytes = self.bytes().await?;
        let (text, _, _) = encoding.decode(&bytes);
        Ok(text.into_owned())
    }

    /// Reads the body and parses it as an HTML document.
    ///
    /// The body is decoded with the `charset` parameter of the
    /// `content-type` header, falling back to UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Body`]. Parsing itself never fails.
    pub async fn html(self) -> Result<Html, DecodeError> {
        let encoding = declared_charset(self.headers()).unwrap_or(UTF_8);
        let bytes = self.bytes().await?;
        let (text, _, _) = encoding.decode(&bytes);
        Ok(Html::parse_document(&text))
    }

    /// Reads the body and deserializes it as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Body`] or [`DecodeError::Json`].
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, DecodeError> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Reads a body that wraps a JSON document (e.g. a JSONP callback) and
    /// parses the embedded payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::NoJsonPayload`] if no bracketed span is found,
    /// or [`DecodeError::Json`] if the span is not valid JSON.
    pub async fn jsonp(self) -> Result<serde_json::Value, DecodeError> {
        let bytes = self.bytes().await?;
        extract_embedded_json(&bytes)
    }
}

fn declared_charset(headers: &HeaderMap) -> Option<&'static Encoding> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Encoding::for_label(value.trim().trim_matches('"').as_bytes())
    })
}

/// Extracts and parses the JSON payload embedded in `body`.
///
/// # Errors
///
/// See [`Response::jsonp`].
pub fn extract_embedded_json(body: &[u8]) -> Result<serde_json::Value, DecodeError> {
    let payload = JSONP_PAYLOAD
        .captures(body)
        .and_then(|captures| captures.get(1))
        .ok_or(DecodeError::NoJsonPayload)?;
    Ok(serde_json::from_slice(payload.as_bytes())?)
}
