use http::Extensions;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::sync::Arc;
use tokio::sync::OnceCell;
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

type AuthType = Authenticator<HttpsConnector<HttpConnector>>;

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/datastore",
];

/// Attaches an OAuth2 bearer token obtained from a service account to every request.
///
/// The authenticator is built lazily on first use and shared between clones.
#[derive(Clone)]
pub struct AuthMiddleware {
    pub(crate) key: ServiceAccountKey,
    authenticator: Arc<OnceCell<AuthType>>,
}

impl AuthMiddleware {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            authenticator: Arc::new(OnceCell::new()),
        }
    }

    /// The project the service account belongs to, if the key names one.
    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    async fn get_token(&self) -> Result<String, anyhow::Error> {
        let auth = self
            .authenticator
            .get_or_try_init(|| async {
                ServiceAccountAuthenticator::builder(self.key.clone())
                    .build()
                    .await
            })
            .await?;

        let token = auth.token(SCOPES).await?;

        Ok(token
            .token()
            .ok_or_else(|| anyhow::anyhow!("No token found"))?
            .to_string())
    }
}

#[async_trait::async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let token = self.get_token().await.map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!(
                "Failed to get auth token: {}",
                e
            ))
        })?;

        let value = header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!("Invalid auth token: {}", e))
        })?;
        req.headers_mut().insert(header::AUTHORIZATION, value);

        next.run(req, extensions).await
    }
}
