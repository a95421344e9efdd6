//! Side effects go out through Crux capabilities. Handlers build typed
//! `HttpRequest`s and `KvOperation`s; the helpers on `Capabilities` hand
//! them to `crux_http`/`crux_kv` and turn each outcome back into the
//! `Event` named by its reply.

mod http;
mod kv;

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::trace;

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

pub use self::http::{
    is_private_host, HttpBody, HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse,
    HttpResult, MultipartPart, UrlPolicy, ValidatedUrl, DEFAULT_TIMEOUT_MS, MAX_TIMEOUT_MS,
    REQUEST_ID_HEADER, TIMEOUT_HEADER,
};
pub use self::kv::{
    KeyNamespace, KvError, KvKey, KvOperation, KvOutput, KvResult, KvValue, StorageErrorCode,
    TypedKvStore, MAX_VALUE_SIZE,
};

use crate::api::{IncidentScope, IncidentUpdate};
use crate::app::App;
use crate::event::Event;
use crate::model::{IncidentId, IncidentStatus, MediaId, Role, UserId};
use crate::rewards::LeaderboardQuery;

/// Which event an HTTP result resolves into, with the context the
/// handler needs to interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum HttpReply {
    CurrentUser,
    Login,
    Signup,
    ForgotPassword,
    ResetPassword,
    ChangePassword,
    Incidents { scope: IncidentScope },
    IncidentDetail { id: IncidentId },
    Comments { id: IncidentId },
    CreateIncident,
    UpdateIncident { id: IncidentId, changes: IncidentUpdate },
    DeleteIncident { id: IncidentId },
    Comment { id: IncidentId },
    MediaUpload { incident_id: IncidentId, file_name: String },
    MediaList { incident_id: IncidentId },
    MediaDelete { incident_id: IncidentId, media_id: MediaId },
    StatusChange { id: IncidentId, status: IncidentStatus },
    AwardPoints { id: IncidentId },
    Points,
    Leaderboard { query: LeaderboardQuery },
    Redeem { reward_id: u32 },
    Users,
    PromoteUser { id: UserId },
    RoleChange { id: UserId, role: Role },
    DeleteUser { id: UserId },
}

impl HttpReply {
    #[must_use]
    pub fn into_event(self, result: HttpResult) -> Event {
        let result = Box::new(result);
        match self {
            Self::CurrentUser => Event::CurrentUserResponse(result),
            Self::Login => Event::LoginResponse(result),
            Self::Signup => Event::SignupResponse(result),
            Self::ForgotPassword => Event::ForgotPasswordResponse(result),
            Self::ResetPassword => Event::ResetPasswordResponse(result),
            Self::ChangePassword => Event::ChangePasswordResponse(result),
            Self::Incidents { scope } => Event::IncidentsResponse { scope, result },
            Self::IncidentDetail { id } => Event::IncidentDetailResponse { id, result },
            Self::Comments { id } => Event::CommentsResponse { id, result },
            Self::CreateIncident => Event::CreateIncidentResponse(result),
            Self::UpdateIncident { id, changes } => Event::UpdateIncidentResponse {
                id,
                changes,
                result,
            },
            Self::DeleteIncident { id } => Event::DeleteIncidentResponse { id, result },
            Self::Comment { id } => Event::CommentResponse { id, result },
            Self::MediaUpload {
                incident_id,
                file_name,
            } => Event::MediaUploadResponse {
                incident_id,
                file_name,
                result,
            },
            Self::MediaList { incident_id } => Event::MediaListResponse {
                incident_id,
                result,
            },
            Self::MediaDelete {
                incident_id,
                media_id,
            } => Event::MediaDeleteResponse {
                incident_id,
                media_id,
                result,
            },
            Self::StatusChange { id, status } => Event::StatusChangeResponse { id, status, result },
            Self::AwardPoints { id } => Event::AwardPointsResponse { id, result },
            Self::Points => Event::PointsResponse(result),
            Self::Leaderboard { query } => Event::LeaderboardResponse { query, result },
            Self::Redeem { reward_id } => Event::RedeemResponse { reward_id, result },
            Self::Users => Event::UsersResponse(result),
            Self::PromoteUser { id } => Event::PromoteUserResponse { id, result },
            Self::RoleChange { id, role } => Event::RoleChangeResponse { id, role, result },
            Self::DeleteUser { id } => Event::DeleteUserResponse { id, result },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KvReply {
    LoadToken,
    PersistToken,
    ClearToken,
    LoadSettings,
    PersistSettings,
}

impl KvReply {
    #[must_use]
    pub fn into_event(self, result: KvResult) -> Event {
        let result = Box::new(result);
        match self {
            Self::LoadToken => Event::StoredTokenLoaded(result),
            Self::PersistToken => Event::TokenPersisted(result),
            Self::ClearToken => Event::TokenCleared(result),
            Self::LoadSettings => Event::SettingsLoaded(result),
            Self::PersistSettings => Event::SettingsPersisted(result),
        }
    }
}

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub key_value: KeyValue<Event>,
    pub render: Render<Event>,
}

impl Capabilities {
    /// Sends `request`; the outcome comes back as the event `reply` names.
    pub fn send_http(&self, request: HttpRequest, reply: HttpReply) {
        let url = request.url().as_str();
        let mut builder = match request.method() {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => self.http.post(url),
            HttpMethod::Put => self.http.put(url),
            HttpMethod::Patch => self.http.patch(url),
            HttpMethod::Delete => self.http.delete(url),
        };
        builder = builder
            .header(REQUEST_ID_HEADER, request.request_id())
            .header(TIMEOUT_HEADER, request.timeout_ms().to_string().as_str());
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            let (content_type, bytes) = body.encode();
            if let Some(content_type) = content_type {
                builder = builder.header("Content-Type", content_type.as_str());
            }
            builder = builder.body(bytes);
        }

        let sent = Sent::from(&request);
        builder.send(move |result| reply.into_event(sent.settle(result)));
    }

    pub fn execute_kv(&self, operation: KvOperation, reply: KvReply) {
        trace!(key = %operation.key().raw(), ?reply, "kv operation");
        match operation {
            KvOperation::Get { key } => self.key_value.get(key.raw(), move |result| {
                let output = result
                    .map_err(kv_failure)
                    .and_then(|stored| stored.map(KvValue::new).transpose())
                    .map(|value| KvOutput::Value { value });
                reply.into_event(output)
            }),
            KvOperation::Set { key, value } => self.key_value.set(key.raw(), value, move |result| {
                reply.into_event(result.map(|_| KvOutput::Written).map_err(kv_failure))
            }),
            KvOperation::Delete { key } => self.key_value.delete(key.raw(), move |result| {
                let output = result.map(|previous| KvOutput::Deleted {
                    existed: previous.is_some(),
                });
                reply.into_event(output.map_err(kv_failure))
            }),
            KvOperation::Exists { key } => self.key_value.exists(key.raw(), move |result| {
                reply.into_event(result.map(|exists| KvOutput::Exists { exists }).map_err(kv_failure))
            }),
        }
    }
}

fn kv_failure(error: impl Display) -> KvError {
    KvError::storage(StorageErrorCode::IoError, error.to_string())
}

/// What a response callback needs from the request it answers.
#[derive(Debug, Clone)]
struct Sent {
    request_id: String,
    host: String,
    timeout_ms: u64,
    max_response_size: usize,
}

impl From<&HttpRequest> for Sent {
    fn from(request: &HttpRequest) -> Self {
        Self {
            request_id: request.request_id().to_string(),
            host: request.url().host().to_string(),
            timeout_ms: request.timeout_ms(),
            max_response_size: request.max_response_size(),
        }
    }
}

impl Sent {
    /// Every status the server answered with becomes an `HttpResponse`,
    /// whether crux reported it as a response or as `HttpError::Http`.
    fn settle(self, result: Result<crux_http::Response<Vec<u8>>, crux_http::HttpError>) -> HttpResult {
        let (status, body) = match result {
            Ok(mut response) => (u16::from(response.status()), response.take_body().unwrap_or_default()),
            Err(crux_http::HttpError::Http { code, body, .. }) => (u16::from(code), body.unwrap_or_default()),
            Err(crux_http::HttpError::Timeout) => {
                return Err(HttpError::Timeout {
                    timeout_ms: self.timeout_ms,
                    request_id: self.request_id,
                })
            }
            Err(other) => {
                return Err(HttpError::ConnectionError {
                    host: self.host,
                    message: other.to_string(),
                })
            }
        };

        if body.len() > self.max_response_size {
            return Err(HttpError::ResponseTooLarge {
                size: body.len(),
                max: self.max_response_size,
            });
        }
        trace!(request_id = %self.request_id, status, "http response");
        Ok(HttpResponse::new(status, HttpHeaders::new(), body, self.request_id, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IncidentId, IncidentStatus};

    fn sent() -> Sent {
        Sent {
            request_id: "req-1".into(),
            host: "127.0.0.1".into(),
            timeout_ms: 30_000,
            max_response_size: 64,
        }
    }

    #[test]
    fn test_error_status_still_reaches_handler() {
        let result = sent().settle(Err(crux_http::HttpError::Http {
            code: crux_http::http::StatusCode::Unauthorized,
            message: "Unauthorized".into(),
            body: Some(br#"{"msg": "Token has expired"}"#.to_vec()),
        }));
        let response = result.unwrap();
        assert_eq!(response.status(), 401);
        assert_eq!(response.request_id(), "req-1");
        assert_eq!(response.server_message().as_deref(), Some("Token has expired"));
    }

    #[test]
    fn test_transport_failures_keep_context() {
        assert_eq!(
            sent().settle(Err(crux_http::HttpError::Timeout)),
            Err(HttpError::Timeout {
                timeout_ms: 30_000,
                request_id: "req-1".into(),
            })
        );
        let oversized = sent().settle(Err(crux_http::HttpError::Http {
            code: crux_http::http::StatusCode::InternalServerError,
            message: "Internal Server Error".into(),
            body: Some(vec![b'x'; 65]),
        }));
        assert_eq!(oversized, Err(HttpError::ResponseTooLarge { size: 65, max: 64 }));
    }

    #[test]
    fn test_reply_carries_request_context() {
        let reply = HttpReply::StatusChange {
            id: IncidentId::new("4"),
            status: IncidentStatus::Approved,
        };
        let event = reply.into_event(Err(HttpError::Cancelled {
            request_id: "r".into(),
        }));
        assert!(matches!(
            event,
            Event::StatusChangeResponse { ref id, status: IncidentStatus::Approved, .. } if id.as_str() == "4"
        ));
    }

    #[test]
    fn test_kv_reply_names_event() {
        let event = KvReply::ClearToken.into_event(Ok(KvOutput::Deleted { existed: true }));
        assert!(matches!(event, Event::TokenCleared(_)));
        let failed = KvReply::LoadSettings.into_event(Err(kv_failure("disk unplugged")));
        assert!(matches!(
            failed,
            Event::SettingsLoaded(ref result) if matches!(**result, Err(KvError::Storage { code: StorageErrorCode::IoError, .. }))
        ));
    }
}
