use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use thiserror::Error;
use url::{Host, Url};

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_REQUEST_BODY_SIZE: usize = 50 * 1024 * 1024;
pub const MAX_RESPONSE_BODY_SIZE: usize = 20 * 1024 * 1024;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MAX_TIMEOUT_MS: u64 = 300_000;
pub const MAX_HEADER_VALUE_LENGTH: usize = 8192;
pub const MAX_MULTIPART_PARTS: usize = 16;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Echoed by the backend's access log; lets a shell correlate retries.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
/// Time budget for the shell's transport, in milliseconds.
pub const TIMEOUT_HEADER: &str = "X-Request-Timeout-Ms";

/// Headers the shell's HTTP stack owns; callers may not set them.
const RESERVED_HEADERS: [&str; 4] = ["host", "content-length", "transfer-encoding", "connection"];

/// Whether requests may target loopback and private-range hosts.
///
/// A locally run backend lives on `127.0.0.1`, so development shells need
/// `AllowPrivate`; deployed builds should use `PublicOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UrlPolicy {
    #[default]
    PublicOnly,
    AllowPrivate,
}

/// Loopback, RFC 1918, link-local, unique-local and `.local`-style names.
pub fn is_private_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => {
            let name = name.to_ascii_lowercase();
            name == "localhost"
                || [".localhost", ".local", ".internal"]
                    .iter()
                    .any(|suffix| name.ends_with(suffix))
        }
        Host::Ipv4(ip) => private_v4(*ip),
        Host::Ipv6(ip) => private_v6(ip),
    }
}

fn private_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn private_v6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return private_v4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback() || ip.is_unspecified() || first & 0xfe00 == 0xfc00 || first & 0xffc0 == 0xfe80
}

/// An absolute http(s) URL that passed the request policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl {
    url: String,
    scheme: String,
    host: String,
}

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        Self::with_policy(url, UrlPolicy::PublicOnly)
    }

    pub fn with_policy(url: impl Into<String>, policy: UrlPolicy) -> Result<Self, HttpError> {
        let raw = url.into();
        let invalid = |reason: String| HttpError::InvalidUrl {
            url: shorten(&raw),
            reason,
        };

        if raw.trim().is_empty() {
            return Err(invalid("empty URL".into()));
        }
        if raw.len() > MAX_URL_LENGTH {
            return Err(invalid(format!("longer than {MAX_URL_LENGTH} bytes")));
        }

        let parsed = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
        }
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(invalid("embedded credentials".into()));
        }
        let Some(host) = parsed.host() else {
            return Err(invalid("no host".into()));
        };
        if policy == UrlPolicy::PublicOnly && is_private_host(&host) {
            return Err(HttpError::PrivateNetworkBlocked {
                url: shorten(&raw),
                host: host.to_string(),
            });
        }

        Ok(Self {
            scheme: parsed.scheme().to_string(),
            host: host.to_string().to_ascii_lowercase(),
            url: parsed.into(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path plus query, e.g. `/api/v1/incidents/4?x=1`.
    pub fn path_and_query(&self) -> String {
        let Ok(parsed) = Url::parse(&self.url) else {
            return String::new();
        };
        match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_string(),
        }
    }
}

fn shorten(url: &str) -> String {
    const KEEP: usize = 96;
    match url.char_indices().nth(KEEP) {
        Some((cut, _)) => format!("{}...", &url[..cut]),
        None => url.to_string(),
    }
}

/// Ordered, case-insensitive header list. Setting a name twice replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HttpHeaders {
    entries: Vec<(String, String)>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HttpError> {
        let name = name.into();
        let value = value.into();
        let bad = |reason: &str| HttpError::InvalidHeader {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err(bad("name must be non-empty ASCII letters, digits, '-' or '_'"));
        }
        if value.len() > MAX_HEADER_VALUE_LENGTH {
            return Err(bad("value too long"));
        }
        if value.contains(['\r', '\n', '\0']) {
            return Err(bad("value contains a control character"));
        }

        self.entries.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.entries.push((name, value));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// The backend reads bodies only on writes.
    pub fn has_request_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

/// One file field of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartPart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Request payload. Multipart bodies stay structured until `encode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HttpBody {
    Bytes { data: Vec<u8> },
    Multipart { parts: Vec<MultipartPart> },
}

impl HttpBody {
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes { data } => data.len(),
            Self::Multipart { parts } => parts.iter().map(|p| p.data.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes { data } => Some(data),
            Self::Multipart { .. } => None,
        }
    }

    /// Wire bytes, plus the `Content-Type` a multipart body must travel with.
    pub fn encode(&self) -> (Option<String>, Vec<u8>) {
        match self {
            Self::Bytes { data } => (None, data.clone()),
            Self::Multipart { parts } => {
                let boundary = format!("ajali-{}", uuid::Uuid::new_v4().simple());
                let mut out = Vec::with_capacity(self.len() + parts.len() * 160);
                for part in parts {
                    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            quoted(&part.field),
                            quoted(&part.file_name)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
                    out.extend_from_slice(&part.data);
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
                (Some(format!("multipart/form-data; boundary={boundary}")), out)
            }
        }
    }
}

fn quoted(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n'))
        .map(|c| if c == '"' { '\'' } else { c })
        .collect()
}

/// A request the core wants sent. Every request gets a fresh id that
/// travels as `X-Request-Id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    method: HttpMethod,
    url: ValidatedUrl,
    headers: HttpHeaders,
    body: Option<HttpBody>,
    timeout_ms: u64,
    request_id: String,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: ValidatedUrl) -> Self {
        Self {
            method,
            url,
            headers: HttpHeaders::new(),
            body: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn get(url: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(HttpMethod::Get, ValidatedUrl::new(url)?))
    }

    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, HttpError> {
        let name = name.into();
        if RESERVED_HEADERS.iter().any(|r| r.eq_ignore_ascii_case(&name)) {
            return Err(HttpError::InvalidHeader {
                name,
                reason: "set by the transport".into(),
            });
        }
        self.headers.insert(name, value)?;
        Ok(self)
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, HttpError> {
        let data = serde_json::to_vec(value).map_err(|e| HttpError::Encoding {
            message: e.to_string(),
        })?;
        self.check_body(data.len())?;
        self.headers.insert("Content-Type", JSON_CONTENT_TYPE)?;
        self.body = Some(HttpBody::Bytes { data });
        Ok(self)
    }

    /// Attaches a multipart form. The shell sets the boundary header.
    pub fn with_multipart(mut self, parts: Vec<MultipartPart>) -> Result<Self, HttpError> {
        if !(1..=MAX_MULTIPART_PARTS).contains(&parts.len()) {
            return Err(HttpError::InvalidRequest {
                reason: format!("{} multipart parts, expected 1 to {MAX_MULTIPART_PARTS}", parts.len()),
            });
        }
        self.check_body(parts.iter().map(|p| p.data.len()).sum())?;
        self.body = Some(HttpBody::Multipart { parts });
        Ok(self)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, HttpError> {
        self.with_timeout_ms(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Result<Self, HttpError> {
        if !(1..=MAX_TIMEOUT_MS).contains(&timeout_ms) {
            return Err(HttpError::InvalidRequest {
                reason: format!("timeout {timeout_ms}ms outside 1..={MAX_TIMEOUT_MS}ms"),
            });
        }
        self.timeout_ms = timeout_ms;
        Ok(self)
    }

    fn check_body(&self, size: usize) -> Result<(), HttpError> {
        if !self.method.has_request_body() {
            return Err(HttpError::InvalidRequest {
                reason: format!("{} does not take a body", self.method.as_str()),
            });
        }
        if size > MAX_REQUEST_BODY_SIZE {
            return Err(HttpError::BodyTooLarge {
                size,
                max: MAX_REQUEST_BODY_SIZE,
            });
        }
        Ok(())
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &ValidatedUrl {
        &self.url
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn body(&self) -> Option<&HttpBody> {
        self.body.as_ref()
    }

    /// Parses a JSON body back out; used by shells and tests that inspect payloads.
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.body
            .as_ref()
            .and_then(HttpBody::as_bytes)
            .and_then(|b| serde_json::from_slice(b).ok())
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn max_response_size(&self) -> usize {
        MAX_RESPONSE_BODY_SIZE
    }
}

/// Failures before a status code exists. Non-2xx responses are not errors
/// at this layer; handlers read the status themselves.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("bad URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{url} points at private host {host}")]
    PrivateNetworkBlocked { url: String, host: String },

    #[error("bad header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("request body is {size} bytes, limit {max}")]
    BodyTooLarge { size: usize, max: usize },

    #[error("response body is {size} bytes, limit {max}")]
    ResponseTooLarge { size: usize, max: usize },

    #[error("bad request: {reason}")]
    InvalidRequest { reason: String },

    #[error("could not encode body: {message}")]
    Encoding { message: String },

    #[error("cannot reach {host}: {message}")]
    ConnectionError { host: String, message: String },

    #[error("no response within {timeout_ms}ms")]
    Timeout { timeout_ms: u64, request_id: String },

    #[error("request cancelled")]
    Cancelled { request_id: String },

    #[error("unreadable response: {reason}")]
    InvalidResponse { reason: String, request_id: String },
}

/// The backend reports failures under `msg`, `message` or `error`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: HttpHeaders,
    body: Vec<u8>,
    request_id: String,
    duration_ms: u64,
}

impl HttpResponse {
    pub fn new(
        status: u16,
        headers: HttpHeaders,
        body: Vec<u8>,
        request_id: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            request_id,
            duration_ms,
        }
    }

    /// Builds a response with a JSON body; shells and tests use this for canned replies.
    pub fn json_response(status: u16, value: &serde_json::Value) -> Self {
        let mut headers = HttpHeaders::new();
        let _ = headers.insert("Content-Type", JSON_CONTENT_TYPE);
        Self::new(
            status,
            headers,
            serde_json::to_vec(value).unwrap_or_default(),
            uuid::Uuid::new_v4().to_string(),
            0,
        )
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::InvalidResponse {
            reason: format!("status {}: {e}", self.status),
            request_id: self.request_id.clone(),
        })
    }

    /// Server-supplied message from a JSON body, whichever key it used.
    pub fn server_message(&self) -> Option<String> {
        let body: ErrorBody = serde_json::from_slice(&self.body).ok()?;
        [body.msg, body.message, body.error]
            .into_iter()
            .flatten()
            .find(|m| !m.trim().is_empty())
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

pub type HttpResult = Result<HttpResponse, HttpError>;
