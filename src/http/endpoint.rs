use super::HttpServiceError;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Description of one JSON HTTP call.
///
/// Only `base_url`, `path` and `method` are required; JSON content type,
/// no query parameters and no body are the defaults.
pub trait HttpEndpoint: Send + Sync {
    fn base_url(&self) -> Url;

    /// Path appended to the base URL, e.g. `v1/users`.
    fn path(&self) -> String;

    fn method(&self) -> HttpMethod;

    fn headers(&self) -> Vec<(String, String)> {
        vec![("Content-Type".to_string(), "application/json".to_string())]
    }

    fn query_parameters(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn body(&self) -> Option<serde_json::Value> {
        None
    }

    /// The full request URL: `path` segments appended to `base_url`, then
    /// the query parameters.
    fn url(&self) -> Result<Url, HttpServiceError> {
        let mut url = self.base_url();
        let url_string = url.to_string();
        url.path_segments_mut()
            .map_err(|_| HttpServiceError::InvalidUrl(url_string))?
            .pop_if_empty()
            .extend(self.path().split('/').filter(|s| !s.is_empty()));

        let parameters = self.query_parameters();
        if !parameters.is_empty() {
            url.query_pairs_mut().extend_pairs(parameters);
        }

        Ok(url)
    }
}
