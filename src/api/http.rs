//! `reqwest`-backed transport.

use std::fmt;
use std::time::Duration;

use crate::config::{ConvergeConfig, Service};

use super::{ApiError, ApiFuture, ApiRequest, ApiResponse, Method, Transport};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport that sends authenticated JSON requests to a fixed endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    /// Creates a transport for `endpoint`, authenticating with `api_key` as a
    /// bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| ApiError::Transport {
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        })
    }

    /// Creates a transport for `service` from the session configuration.
    ///
    /// # Errors
    ///
    /// See [`HttpTransport::new`].
    pub fn from_config(config: &ConvergeConfig, service: Service) -> Result<Self, ApiError> {
        Self::new(config.endpoint_for(service), config.api_key.as_str())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> ApiFuture<'_, ApiResponse> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(http_method(request.method), self.url(&request.path))
                .bearer_auth(&self.api_key)
                .query(&request.query);
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|err| ApiError::Transport {
                message: err.to_string(),
            })?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|err| ApiError::Transport {
                    message: err.to_string(),
                })?;

            Ok(ApiResponse {
                status,
                body: body.to_vec(),
            })
        })
    }
}
