use async_trait::async_trait;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::ShellError;
use crate::capabilities::{REQUEST_ID_HEADER, TIMEOUT_HEADER};
use crate::REQUEST_TIMEOUT;

/// Executes one request to completion. Failures come back as
/// `HttpResult::Err`, never as a panic, so the core always sees an answer.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> HttpResult;
}

fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// The budget the core asked for, or the default when it sent none.
fn timeout_of(request: &HttpRequest) -> Duration {
    header(request, TIMEOUT_HEADER)
        .and_then(|ms| ms.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map_or(REQUEST_TIMEOUT, Duration::from_millis)
}

#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new() -> Result<Self, ShellError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ajali-shared/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ShellError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &HttpRequest) -> Result<reqwest::RequestBuilder, crux_http::HttpError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| crux_http::HttpError::Io(format!("method {}: {e}", request.method)))?;
        let mut builder = self
            .client
            .request(method, request.url.as_str())
            .timeout(timeout_of(request));
        for h in request.headers.iter().filter(|h| !h.name.eq_ignore_ascii_case(TIMEOUT_HEADER)) {
            builder = builder.header(h.name.as_str(), h.value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        Ok(builder)
    }

    fn map_error(error: &reqwest::Error) -> crux_http::HttpError {
        if error.is_timeout() {
            crux_http::HttpError::Timeout
        } else {
            crux_http::HttpError::Io(error.to_string())
        }
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, crux_http::HttpError> {
        let response = self.build(request)?.send().await.map_err(|e| Self::map_error(&e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| Self::map_error(&e))?;
        Ok(HttpResponse::status(status).body(body.to_vec()).build())
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        let started = Instant::now();
        let request_id = header(&request, REQUEST_ID_HEADER).unwrap_or_default().to_string();
        let outcome = self.send(&request).await;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(response) => {
                debug!(request_id, status = response.status, duration_ms, "http response");
                HttpResult::Ok(response)
            }
            Err(e) => {
                warn!(request_id, url = %request.url, error = %e, duration_ms, "http request failed");
                HttpResult::Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crux_http::protocol::HttpHeader;

    fn request(headers: &[(&str, &str)]) -> HttpRequest {
        HttpRequest {
            method: "GET".into(),
            url: "http://127.0.0.1:5000/api/v1/incidents".into(),
            headers: headers
                .iter()
                .map(|(name, value)| HttpHeader {
                    name: (*name).to_string(),
                    value: (*value).to_string(),
                })
                .collect(),
            body: Vec::new(),
        }
    }

    #[test]
    fn test_timeout_comes_from_the_core() {
        assert_eq!(timeout_of(&request(&[("x-request-timeout-ms", "120000")])), Duration::from_secs(120));
        assert_eq!(timeout_of(&request(&[(TIMEOUT_HEADER, "0")])), REQUEST_TIMEOUT);
        assert_eq!(timeout_of(&request(&[(TIMEOUT_HEADER, "soon")])), REQUEST_TIMEOUT);
        assert_eq!(timeout_of(&request(&[])), REQUEST_TIMEOUT);
    }

    #[test]
    fn test_request_id_lookup_ignores_case() {
        let req = request(&[("x-request-id", "abc-123")]);
        assert_eq!(header(&req, REQUEST_ID_HEADER), Some("abc-123"));
        assert_eq!(header(&req, "Authorization"), None);
    }
}
