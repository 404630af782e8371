//! JSON over HTTP.
//!
//! [`HttpService`] executes [`HttpEndpoint`] descriptions and decodes the
//! JSON response into a typed value.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use fuoco::http::{HttpConfig, HttpEndpoint, HttpMethod, HttpService};
//! # use url::Url;
//! struct Releases;
//!
//! impl HttpEndpoint for Releases {
//!     fn base_url(&self) -> Url {
//!         Url::parse("https://api.example.com").unwrap()
//!     }
//!
//!     fn path(&self) -> String {
//!         "v1/releases".to_string()
//!     }
//!
//!     fn method(&self) -> HttpMethod {
//!         HttpMethod::Get
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let service = HttpService::new(HttpConfig::default())?;
//! let releases: Vec<serde_json::Value> = service.request_many(&Releases).await?;
//! # Ok(())
//! # }
//! ```

mod endpoint;


pub use self::endpoint::{HttpEndpoint, HttpMethod};

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during HTTP service calls.
#[derive(Error, Debug)]
pub enum HttpServiceError {
    /// The endpoint does not describe a usable URL or header.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// The server answered with a non-2xx status.
    #[error("HTTP error with status code: {status}")]
    HttpError { status: u16 },
    /// The response body did not match the expected type.
    #[error("Failed to decode response: {0}")]
    DecodingError(#[source] serde_json::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest_middleware::Error),
    /// Wrapper for `reqwest::Error`.
    #[error("Network error: {0}")]
    RequestError(#[from] reqwest::Error),
}

/// Timeouts and retries for [`HttpService`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Maximum time to wait for data on an open connection.
    pub request_timeout: Duration,
    /// Maximum time for a whole request, including the body.
    pub resource_timeout: Duration,
    /// Retries for transient failures, with exponential backoff.
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            resource_timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

/// Client for JSON HTTP endpoints.
#[derive(Clone)]
pub struct HttpService {
    client: ClientWithMiddleware,
}

impl HttpService {
    pub fn new(config: HttpConfig) -> Result<Self, HttpServiceError> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);

        let inner = Client::builder()
            .read_timeout(config.request_timeout)
            .timeout(config.resource_timeout)
            .build()?;

        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }

    /// Creates a service on top of an existing client (e.g. one with extra middleware).
    pub fn with_client(client: ClientWithMiddleware) -> Self {
        Self { client }
    }

    /// Executes `endpoint` and decodes the response body as `T`.
    pub async fn request<T, E>(&self, endpoint: &E) -> Result<T, HttpServiceError>
    where
        T: DeserializeOwned,
        E: HttpEndpoint + ?Sized,
    {
        let url = endpoint.url()?;
        let method = endpoint.method();
        debug!(method = method.as_str(), url = %url, "http request");

        let mut request = self.client.request(method.into(), url);
        for (name, value) in endpoint.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HttpServiceError::InvalidUrl(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(&value).map_err(|e| {
                HttpServiceError::InvalidUrl(format!("header value {}: {}", value, e))
            })?;
            request = request.header(name, value);
        }
        if let Some(body) = endpoint.body() {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), "http response");

        if !status.is_success() {
            return Err(HttpServiceError::HttpError {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(error = %e, body = %String::from_utf8_lossy(&bytes), "http decode error");
            HttpServiceError::DecodingError(e)
        })
    }

    /// Executes `endpoint` and decodes the response body as a JSON array of `T`.
    pub async fn request_many<T, E>(&self, endpoint: &E) -> Result<Vec<T>, HttpServiceError>
    where
        T: DeserializeOwned,
        E: HttpEndpoint + ?Sized,
    {
        self.request(endpoint).await
    }
}
