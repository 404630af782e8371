pub mod middleware;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
}

impl ApiErrorResponse {
    pub fn display_message(&self) -> String {
        match &self.error.status {
            Some(status) => format!(
                "{} (code: {}, status: {})",
                self.error.message, self.error.code, status
            ),
            None => format!("{} (code: {})", self.error.message, self.error.code),
        }
    }
}

/// Reads a failed response body into a printable message, falling back to the
/// HTTP status when the body is not the standard Google API error envelope.
pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> String {
    let status = response.status();
    match response.json::<ApiErrorResponse>().await {
        Ok(error_resp) => format!("{}: {}", default_msg, error_resp.display_message()),
        Err(_) => format!("{}: {}", default_msg, status),
    }
}
