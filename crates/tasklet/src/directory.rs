//! Remote directory boundary.
//!
//! The dispatch core treats remote I/O as opaque: one call, text out, or a
//! failure. This module is that boundary - a trait the core schedules
//! against, an HTTP implementation of it, and the display formatting the
//! fetched payloads go through.

use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The resource does not exist. Distinct from transport failure so
    /// callers can treat "no such record" as data, not as an outage.
    #[error("resource not found")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(String),
}

/// One unit of remote I/O: fetch the resource at `path` (relative to the
/// client's base) and return its text. Potentially slow, potentially
/// failing; the scheduler layers know nothing about the transport behind it.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn get(&self, path: &str) -> Result<String, ClientError>;
}

/// HTTP implementation of the directory boundary.
pub struct HttpDirectoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDirectoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create HTTP client");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn get(&self, path: &str) -> Result<String, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "fetching remote record");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }
        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}

/// Pretty-print a JSON payload for display. Accepts any JSON shape - object,
/// array, or primitive.
pub fn pretty(text: &str) -> Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    serde_json::to_string_pretty(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_returns_body_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/employee/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"1"}"#))
            .mount(&server)
            .await;

        let client = HttpDirectoryClient::new(server.uri());
        let body = client.get("/employee/1").await.unwrap();
        assert_eq!(body, r#"{"id":"1"}"#);
    }

    #[tokio::test]
    async fn get_with_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/course"))
            .and(query_param("empId", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let client = HttpDirectoryClient::new(server.uri());
        assert_eq!(client.get("/course?empId=7").await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/employee/999"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpDirectoryClient::new(server.uri());
        let err = client.get("/employee/999").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound));
    }

    #[tokio::test]
    async fn server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/employee/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpDirectoryClient::new(server.uri());
        let err = client.get("/employee/1").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = HttpDirectoryClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn pretty_formats_objects_and_arrays() {
        assert_eq!(
            pretty(r#"{"a":1}"#).unwrap(),
            "{\n  \"a\": 1\n}"
        );
        assert_eq!(pretty("[1,2]").unwrap(), "[\n  1,\n  2\n]");
        assert_eq!(pretty("3").unwrap(), "3");
    }

    #[test]
    fn pretty_rejects_invalid_json() {
        assert!(pretty("not json").is_err());
    }
}
