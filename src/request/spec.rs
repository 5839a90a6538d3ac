//! Request description built through chained configuration calls.
//!
//! A [`RequestSpec`] is plain data until it is executed. Nothing is validated
//! while building: malformed targets, bad methods or headers, body encoding
//! failures and degenerate timing settings are all reported when the spec is
//! turned into a [`PreparedRequest`] at the start of
//! [`Executor::execute`](super::Executor::execute).

use std::fmt;

use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_TYPE, HOST};
use http::uri::PathAndQuery;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;
use tracing::warn;
use url::{Host, Position, Url};

use super::config::RequestConfig;
use super::error::{InvalidRequestReason, RequestError};

/// Media type sent with form-encoded bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Media type sent with JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// How the body bytes were produced. Determines the default content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyEncoding {
    Form,
    Json,
    /// Caller-encoded bytes with an explicit media type.
    Raw(String),
}

impl BodyEncoding {
    /// Returns the media type matching this encoding.
    #[must_use]
    pub fn content_type(&self) -> &str {
        match self {
            Self::Form => FORM_CONTENT_TYPE,
            Self::Json => JSON_CONTENT_TYPE,
            Self::Raw(content_type) => content_type,
        }
    }
}

#[derive(Debug, Clone)]
struct Body {
    encoding: BodyEncoding,
    bytes: Bytes,
}

/// Description of one pending request.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use batchfetch_core::request::{Executor, RequestSpec};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let spec = RequestSpec::post("https://example.com/api/tasks")
///     .with_form([("name", "report"), ("priority", "2")])
///     .with_headers([("X-Trace", "abc123")])
///     .with_retry(5, Duration::from_millis(500));
///
/// let response = Executor::new().execute(spec).await?;
/// println!("status: {}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RequestSpec {
    target: String,
    method: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<Body>,
    body_error: Option<String>,
    config: RequestConfig,
}

impl RequestSpec {
    /// Creates a spec with default timing: 10s connect, 15s transfer,
    /// 3 attempts, 3s between attempts.
    pub fn new(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            body_error: None,
            config: RequestConfig::default(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(target, "GET")
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(target, "POST")
    }

    /// Sets a URL-encoded form body and the matching content type.
    ///
    /// Replaces any body set earlier, including a failed JSON body.
    #[must_use]
    pub fn with_form<I, K, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(values)
            .finish();
        self.with_encoded_body(BodyEncoding::Form, Bytes::from(encoded))
    }

    /// Serializes `value` as a JSON body and sets the matching content type.
    ///
    /// A serialization failure is logged and remembered; executing the spec
    /// then fails with [`InvalidRequestReason::BodyEncoding`] instead of
    /// sending a request without its body.
    #[must_use]
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(encoded) => self.with_encoded_body(BodyEncoding::Json, Bytes::from(encoded)),
            Err(e) => {
                warn!(url = %self.target, error = %e, "failed to encode JSON body");
                self.set_header(CONTENT_TYPE.as_str(), JSON_CONTENT_TYPE);
                self.body = None;
                self.body_error = Some(e.to_string());
                self
            }
        }
    }

    /// Sets an already-encoded body with an explicit media type.
    #[must_use]
    pub fn with_body(self, bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.with_encoded_body(BodyEncoding::Raw(content_type.into()), bytes.into())
    }

    /// Merges headers into the spec, overwriting existing names (case-insensitive).
    #[must_use]
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.set_header(name, value);
        }
        self
    }

    /// Appends query parameters to the target.
    #[must_use]
    pub fn with_query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Overwrites the attempt count and the pause between failed attempts.
    ///
    /// A count of zero is kept as given and rejected when the spec executes.
    #[must_use]
    pub fn with_retry(mut self, count: u32, delay: std::time::Duration) -> Self {
        self.config.retry_limit = count;
        self.config.retry_delay = delay;
        self
    }

    /// Overwrites the connect timeout and the transfer deadline.
    #[must_use]
    pub fn with_timeouts(
        mut self,
        connect: std::time::Duration,
        transfer: std::time::Duration,
    ) -> Self {
        self.config.connect_timeout = connect;
        self.config.transfer_timeout = transfer;
        self
    }

    /// Replaces all timing and retry settings at once.
    #[must_use]
    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Returns the caller-supplied header value for `name`, if any.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the body encoding and bytes, if a body is set.
    #[must_use]
    pub fn body(&self) -> Option<(&BodyEncoding, &Bytes)> {
        self.body.as_ref().map(|body| (&body.encoding, &body.bytes))
    }

    /// Executes the spec with a default [`Executor`](super::Executor), which
    /// shares one process-wide [`HttpTransport`](super::HttpTransport).
    ///
    /// # Errors
    ///
    /// See [`Executor::execute`](super::Executor::execute).
    pub async fn send(self) -> Result<crate::response::Response, RequestError> {
        super::Executor::new().execute(self).await
    }

    fn with_encoded_body(mut self, encoding: BodyEncoding, bytes: Bytes) -> Self {
        self.set_header(CONTENT_TYPE.as_str(), encoding.content_type().to_string());
        self.body = Some(Body { encoding, bytes });
        self.body_error = None;
        self
    }

    fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Translates the spec into a transport request, validating everything.
    pub(crate) fn prepare(&self) -> Result<PreparedRequest, RequestError> {
        let invalid = |reason: InvalidRequestReason| RequestError::invalid(self.target.clone(), reason);

        if let Some(message) = &self.body_error {
            return Err(invalid(InvalidRequestReason::BodyEncoding {
                message: message.clone(),
            }));
        }
        if self.config.retry_limit == 0 {
            return Err(invalid(InvalidRequestReason::ZeroRetryLimit));
        }
        if self.config.connect_timeout.is_zero() {
            return Err(invalid(InvalidRequestReason::ZeroTimeout { which: "connect" }));
        }
        if self.config.transfer_timeout.is_zero() {
            return Err(invalid(InvalidRequestReason::ZeroTimeout { which: "transfer" }));
        }

        let trimmed = self.target.trim();
        if trimmed.is_empty() {
            return Err(invalid(InvalidRequestReason::EmptyTarget));
        }
        let mut url = Url::parse(trimmed).map_err(|e| invalid(e.into()))?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        let target = Target::from_url(url).map_err(invalid)?;

        let method_name = self.method.trim().to_ascii_uppercase();
        let method = Method::from_bytes(method_name.as_bytes()).map_err(|_| {
            invalid(InvalidRequestReason::InvalidMethod {
                method: self.method.clone(),
            })
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let invalid_header = || {
                invalid(InvalidRequestReason::InvalidHeader { name: name.clone() })
            };
            let header_name =
                HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid_header())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid_header())?;
            headers.insert(header_name, header_value);
        }

        if let Some(body) = &self.body
            && !headers.contains_key(CONTENT_TYPE)
        {
            let value = HeaderValue::from_str(body.encoding.content_type()).map_err(|_| {
                invalid(InvalidRequestReason::InvalidHeader {
                    name: CONTENT_TYPE.to_string(),
                })
            })?;
            headers.insert(CONTENT_TYPE, value);
        }
        if !headers.contains_key(CONNECTION) {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }
        if !headers.contains_key(HOST) {
            let value = HeaderValue::from_str(&target.host_header()).map_err(|_| {
                invalid(InvalidRequestReason::InvalidHeader {
                    name: HOST.to_string(),
                })
            })?;
            headers.insert(HOST, value);
        }

        let path_and_query: PathAndQuery = target.origin_form().parse().map_err(
            |e: http::uri::InvalidUri| {
                invalid(InvalidRequestReason::InvalidRequestTarget {
                    message: e.to_string(),
                })
            },
        )?;

        Ok(PreparedRequest {
            target,
            method,
            request_uri: Uri::from(path_and_query),
            headers,
            body: self
                .body
                .as_ref()
                .map(|body| body.bytes.clone())
                .unwrap_or_default(),
        })
    }
}

/// Scheme of a validated target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// A validated absolute target address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Target {
    fn from_url(url: Url) -> Result<Self, InvalidRequestReason> {
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(InvalidRequestReason::UnsupportedScheme {
                    scheme: other.to_string(),
                });
            }
        };
        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(InvalidRequestReason::MissingHost),
        };
        let port = url
            .port_or_known_default()
            .ok_or(InvalidRequestReason::MissingHost)?;

        Ok(Self {
            url,
            scheme,
            host,
            port,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host name or IP address, without IPv6 brackets.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    fn host_header(&self) -> String {
        let host = self.url.host_str().unwrap_or(&self.host);
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Path plus query, as sent on the request line.
    fn origin_form(&self) -> &str {
        &self.url[Position::BeforePath..Position::AfterQuery]
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}

/// A request ready to be written to a connection.
///
/// Produced once per execution and shared by every attempt.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub target: Target,
    pub method: Method,
    /// Origin-form request target (`/path?query`).
    pub request_uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PreparedRequest {
    /// Builds a fresh `http::Request` for one attempt.
    #[must_use]
    pub fn to_http(&self) -> http::Request<Bytes> {
        let mut request = http::Request::new(self.body.clone());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.request_uri.clone();
        *request.headers_mut() = self.headers.clone();
        request
    }
}
