//! Proxied HTTP transport
//!
//! A [`Transport`] performs one complete round trip to the probe URL through
//! the proxy it was built for. Timing is the prober's job; the transport only
//! has to make sure the response is fully drained before it returns.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client, Proxy, Url, Version};
use tracing::debug;

/// One round trip through a fixed egress point
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and drain the response. Returns only once the body is
    /// consumed (or the attempt failed).
    async fn round_trip(&self, url: &Url) -> Result<(), TransportError>;

    /// Same request as [`Transport::round_trip`], also reporting the HTTP
    /// version the connection settled on when the transport knows it
    async fn warm_up(&self, url: &Url) -> Result<Option<Version>, TransportError> {
        self.round_trip(url).await.map(|()| None)
    }

    /// Release pooled connections. Must tolerate in-flight round trips and
    /// repeated calls.
    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Transport failure reasons
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Could not build the client (bad proxy, TLS backend)
    Build(String),
    /// Connection to the proxy or upstream failed
    Connect(String),
    /// Request exceeded the client timeout
    Timeout,
    /// Anything else reported by the HTTP stack
    Protocol(String),
    /// Handle was closed during shutdown
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build(e) => write!(f, "failed to build client: {}", e),
            Self::Connect(e) => write!(f, "connect failed: {}", e),
            Self::Timeout => write!(f, "request timed out"),
            Self::Protocol(e) => write!(f, "request failed: {}", e),
            Self::Closed => write!(f, "transport closed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_builder() {
            Self::Build(e.to_string())
        } else {
            Self::Protocol(e.to_string())
        }
    }
}

/// HTTP client bound to a single proxy
pub struct HttpTransport {
    client: Client,
    proxy: Url,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Client with redirects disabled and an overall request timeout
    pub fn new(proxy: &Url, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .proxy(Proxy::all(proxy.as_str())?)
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .pool_max_idle_per_host(20)
            .build()?;

        Ok(Self {
            client,
            proxy: proxy.clone(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn proxy(&self) -> &Url {
        &self.proxy
    }

    async fn fetch(&self, url: &Url) -> Result<Version, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let response = self.client.get(url.clone()).send().await?;
        let version = response.version();
        // Timer stops only after the body is consumed
        response.bytes().await?;
        Ok(version)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(&self, url: &Url) -> Result<(), TransportError> {
        self.fetch(url).await.map(|_| ())
    }

    async fn warm_up(&self, url: &Url) -> Result<Option<Version>, TransportError> {
        self.fetch(url).await.map(Some)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // Idle pooled connections go away with the last client clone;
            // in-flight requests keep their own handle until they finish.
            debug!("Closed transport via {}", self.proxy);
        }
        Ok(())
    }
}
