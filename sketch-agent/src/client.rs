//! Transport to the generation service.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use url::Url;

use crate::error::AgentError;
use crate::request::GenerationRequest;

/// Raw response body chunks, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, AgentError>>;

/// Path appended when the endpoint is given as a bare host.
pub const DEFAULT_GENERATE_PATH: &str = "/api/generate";

/// Sends one generation request and hands back its streaming body.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Open a streaming generation call.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the service answers
    /// with a failure status.
    async fn generate(&self, request: &GenerationRequest) -> Result<ByteStream, AgentError>;
}

#[async_trait]
impl<C: GenerationClient + ?Sized> GenerationClient for Arc<C> {
    async fn generate(&self, request: &GenerationRequest) -> Result<ByteStream, AgentError> {
        (**self).generate(request).await
    }
}

/// Identifies this client to the service.
#[derive(Clone, Debug)]
pub struct ClientDescriptor {
    /// Client name used in the user agent.
    pub name: String,
    /// Client version string.
    pub version: String,
}

impl Default for ClientDescriptor {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// HTTP implementation of [`GenerationClient`].
#[derive(Clone)]
pub struct HttpGenerationClient {
    inner: Arc<InnerClient>,
}

struct InnerClient {
    http: Client,
    endpoint: Url,
}

impl HttpGenerationClient {
    /// Create a client for the given endpoint.
    ///
    /// `base_url` may be the generate endpoint itself or just the host, in
    /// which case [`DEFAULT_GENERATE_PATH`] is appended.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidUrl`] if the URL is malformed.
    /// Returns [`AgentError::Http`] if the HTTP client fails to build.
    pub fn new(base_url: impl AsRef<str>, descriptor: ClientDescriptor) -> Result<Self, AgentError> {
        let mut url =
            Url::parse(base_url.as_ref()).map_err(|e| AgentError::InvalidUrl(e.to_string()))?;

        if url.path().is_empty() || url.path() == "/" {
            url.set_path(DEFAULT_GENERATE_PATH);
        }

        let ClientDescriptor { name, version } = descriptor;

        let http = Client::builder()
            .user_agent(format!("{name}/{version} (saorsa-sketch)"))
            .build()?;

        Ok(Self {
            inner: Arc::new(InnerClient {
                http,
                endpoint: url,
            }),
        })
    }

    /// Resolved endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<ByteStream, AgentError> {
        tracing::debug!(
            "POST {} ({:?}, {} strokes)",
            self.inner.endpoint,
            request.mode,
            request.strokes.len()
        );

        let response = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            };
            return Err(AgentError::Upstream {
                status: Some(status.as_u16()),
                message,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(AgentError::from))
            .boxed())
    }
}
