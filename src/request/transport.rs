//! Transport seam and the default HTTP/1.1 transport.
//!
//! An attempt is two phases: [`Transport::connect`] establishes a fresh
//! connection, then [`Connection::send`] writes the request and reads the
//! response head. Between the two the executor calls
//! [`Connection::set_deadline`] with an absolute instant; every read and
//! write on the connection after that point, including reads of the response
//! body after `execute` has returned, fails once the instant has passed.
//!
//! [`HttpTransport`] opens one TCP connection per attempt and never pools.
//! TLS handshakes for `https` targets happen inside `send`, so they run under
//! the transfer deadline rather than the connect timeout.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::{Instant, Sleep};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::{debug, instrument};

use super::error::{AttemptError, BoxError};
use super::spec::{PreparedRequest, Scheme, Target};
use crate::response::Response;

/// Opens connections to targets.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes a new connection to `target`.
    ///
    /// Implementations should give up after `connect_timeout`; the executor
    /// enforces the same bound independently.
    async fn connect(
        &self,
        target: &Target,
        connect_timeout: Duration,
    ) -> Result<Box<dyn Connection>, AttemptError>;
}

/// One established connection, used for exactly one request.
#[async_trait]
pub trait Connection: Send {
    /// Sets the absolute instant after which all I/O on this connection fails.
    fn set_deadline(&mut self, deadline: Instant);

    /// Writes `request` and returns the response with its body unread.
    async fn send(&mut self, request: &PreparedRequest) -> Result<Response, AttemptError>;
}

/// Default transport: TCP, optional rustls, hyper HTTP/1.1.
#[derive(Clone)]
pub struct HttpTransport {
    tls: TlsConnector,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Creates a transport trusting the bundled webpki root certificates.
    ///
    /// # Panics
    ///
    /// Panics if the ring crypto provider rejects its own default protocol
    /// versions. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .expect("ring provider supports the default protocol versions")
            .with_root_certificates(roots)
            .with_no_client_auth();

        Self::with_tls_config(Arc::new(config))
    }

    /// Creates a transport with a caller-supplied TLS configuration
    /// (custom roots, client certificates).
    #[must_use]
    pub fn with_tls_config(config: Arc<ClientConfig>) -> Self {
        Self {
            tls: TlsConnector::from(config),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self, target), fields(host = %target.host(), port = target.port()))]
    async fn connect(
        &self,
        target: &Target,
        connect_timeout: Duration,
    ) -> Result<Box<dyn Connection>, AttemptError> {
        let stream = tokio::time::timeout(
            connect_timeout,
            TcpStream::connect((target.host(), target.port())),
        )
        .await
        .map_err(|_| AttemptError::ConnectTimeout {
            timeout: connect_timeout,
        })?
        .map_err(AttemptError::Connect)?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }

        Ok(Box::new(HttpConnection {
            stream: Some(DeadlineStream::new(stream)),
            tls: self.tls.clone(),
        }))
    }
}

struct HttpConnection {
    stream: Option<DeadlineStream<TcpStream>>,
    tls: TlsConnector,
}

#[async_trait]
impl Connection for HttpConnection {
    fn set_deadline(&mut self, deadline: Instant) {
        if let Some(stream) = self.stream.as_mut() {
            stream.set_deadline(deadline);
        }
    }

    async fn send(&mut self, request: &PreparedRequest) -> Result<Response, AttemptError> {
        let stream = self
            .stream
            .take()
            .ok_or_else(|| AttemptError::transport("connection was already used"))?;

        let io = match request.target.scheme() {
            Scheme::Http => MaybeTlsStream::Plain(stream),
            Scheme::Https => {
                let server_name = ServerName::try_from(request.target.host().to_string())
                    .map_err(AttemptError::transport)?;
                let tls = self
                    .tls
                    .connect(server_name, stream)
                    .await
                    .map_err(AttemptError::transport)?;
                MaybeTlsStream::Tls(Box::new(tls))
            }
        };

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(io))
            .await
            .map_err(AttemptError::transport)?;

        // Drives the socket until the response body is consumed or dropped.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "connection closed with error");
            }
        });

        let response = sender
            .send_request(request.to_http().map(Full::<Bytes>::new))
            .await
            .map_err(AttemptError::transport)?;

        Ok(Response::new(response.map(|body| {
            body.map_err(|e| -> BoxError { Box::new(e) })
                .boxed_unsync()
        })))
    }
}

/// Byte stream that fails all I/O with `TimedOut` once its deadline passes.
///
/// The deadline is a single absolute instant; progress on the stream does
/// not extend it.
pub(crate) struct DeadlineStream<S> {
    inner: S,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl<S> DeadlineStream<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            deadline: None,
        }
    }

    pub(crate) fn set_deadline(&mut self, deadline: Instant) {
        if let Some(sleep) = self.deadline.as_mut() {
            sleep.as_mut().reset(deadline);
        } else {
            self.deadline = Some(Box::pin(tokio::time::sleep_until(deadline)));
        }
    }

    fn check_deadline(&mut self, cx: &mut Context<'_>) -> io::Result<()> {
        if let Some(sleep) = self.deadline.as_mut()
            && sleep.as_mut().poll(cx).is_ready()
        {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "transfer deadline exceeded",
            ));
        }
        Ok(())
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for DeadlineStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(e) = this.check_deadline(cx) {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for DeadlineStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Err(e) = this.check_deadline(cx) {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(e) = this.check_deadline(cx) {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

enum MaybeTlsStream {
    Plain(DeadlineStream<TcpStream>),
    Tls(Box<TlsStream<DeadlineStream<TcpStream>>>),
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}
