//! REST contract of the Ajali backend: paths, payloads and a request
//! builder that applies base URL, bearer auth and timeouts.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::capabilities::{
    HttpError, HttpMethod, HttpRequest, MultipartPart, UrlPolicy, ValidatedUrl,
};
use crate::model::{IncidentId, MediaId, Model, Role, Severity, User};
use crate::{ValidationError, MIN_PASSWORD_LENGTH, UPLOAD_TIMEOUT};

pub mod endpoints {
    use crate::model::{IncidentId, MediaId, UserId};

    pub const LOGIN: &str = "/auth/login";
    pub const SIGNUP: &str = "/auth/signup";
    pub const ME: &str = "/auth/me";
    pub const CHANGE_PASSWORD: &str = "/auth/change-password";
    pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";
    pub const INCIDENTS: &str = "/incidents";
    pub const MY_INCIDENTS: &str = "/incidents/mine";
    pub const POINTS: &str = "/users/points";
    pub const REDEEM: &str = "/users/redeem";
    pub const LEADERBOARD: &str = "/users/leaderboard";
    pub const USERS: &str = "/users";

    pub fn reset_password(token: &str) -> String {
        format!("/auth/reset-password/{token}")
    }

    pub fn promote_user(id: &UserId) -> String {
        format!("/auth/users/{id}/promote")
    }

    pub fn incident(id: &IncidentId) -> String {
        format!("/incidents/{id}")
    }

    pub fn incident_status(id: &IncidentId) -> String {
        format!("/incidents/{id}/status")
    }

    pub fn award_points(id: &IncidentId) -> String {
        format!("/incidents/{id}/award-points")
    }

    pub fn comments(id: &IncidentId) -> String {
        format!("/incidents/{id}/comments")
    }

    pub fn media_upload(incident_id: &IncidentId) -> String {
        format!("/media/{incident_id}/upload")
    }

    pub fn incident_media(incident_id: &IncidentId) -> String {
        format!("/media/incident/{incident_id}")
    }

    pub fn media(id: &MediaId) -> String {
        format!("/media/{id}")
    }

    pub fn user(id: &UserId) -> String {
        format!("/users/{id}")
    }

    pub fn user_role(id: &UserId) -> String {
        format!("/admin/users/{id}/role")
    }
}

/// Which incident list a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentScope {
    All,
    Mine,
}

impl IncidentScope {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::All => endpoints::INCIDENTS,
            Self::Mine => endpoints::MY_INCIDENTS,
        }
    }
}

// --- Auth payloads ---

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: SecretString,
    pub user: User,
}

/// `/auth/me` answers with the user, sometimes wrapped under `user`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CurrentUserResponse {
    Wrapped { user: User },
    Bare(User),
}

impl CurrentUserResponse {
    #[must_use]
    pub fn into_user(self) -> User {
        match self {
            Self::Wrapped { user } | Self::Bare(user) => user,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

#[derive(Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub new_password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

/// Light shape check; the backend has the final word.
#[must_use]
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

pub fn validate_login(email: &str, password: &SecretString) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "Email" });
    }
    if !is_plausible_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    if password.expose_secret().is_empty() {
        return Err(ValidationError::MissingField { field: "Password" });
    }
    Ok(())
}

pub fn validate_new_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

pub fn validate_signup(name: &str, email: &str, password: &SecretString) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "Name" });
    }
    if email.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "Email" });
    }
    if !is_plausible_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    validate_new_password(password.expose_secret())
}

pub fn validate_password_change(
    current: &SecretString,
    new: &SecretString,
    confirm: &SecretString,
) -> Result<(), ValidationError> {
    if current.expose_secret().is_empty() {
        return Err(ValidationError::MissingField {
            field: "Current password",
        });
    }
    if new.expose_secret() != confirm.expose_secret() {
        return Err(ValidationError::PasswordMismatch);
    }
    validate_new_password(new.expose_secret())
}

// --- Incident payloads ---

/// Report form contents as submitted by the citizen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IncidentDraft {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub category: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl IncidentDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "Title" });
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "Description",
            });
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "Category" });
        }
        validate_coordinates(self.latitude, self.longitude)
    }

    /// Trimmed copy; blank location becomes absent.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            location: self
                .location
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            category: self.category.trim().to_string(),
            severity: self.severity,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

fn validate_coordinates(lat: Option<f64>, lng: Option<f64>) -> Result<(), ValidationError> {
    match (lat, lng) {
        (Some(lat), Some(lng))
            if !lat.is_finite()
                || !lng.is_finite()
                || !(-90.0..=90.0).contains(&lat)
                || !(-180.0..=180.0).contains(&lng) =>
        {
            Err(ValidationError::CoordinatesOutOfRange { lat, lng })
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CreateIncidentResponse {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub incident_id: Option<IncidentId>,
    #[serde(default)]
    pub id: Option<IncidentId>,
}

impl CreateIncidentResponse {
    pub fn new_id(&self) -> Option<&IncidentId> {
        self.incident_id.as_ref().or(self.id.as_ref())
    }
}

/// Edit payload: only the fields that changed are sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IncidentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl IncidentUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ValidationError::MissingField { field: "Title" });
        }
        if self.description.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return Err(ValidationError::MissingField {
                field: "Description",
            });
        }
        validate_coordinates(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdateRequest<'a> {
    pub status: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaUploadResponse {
    #[serde(default)]
    pub media_id: Option<MediaId>,
    #[serde(default)]
    pub file_url: Option<String>,
}

// --- Rewards and admin payloads ---

/// The backend reads `reward`; older clients sent only `reward_id`.
#[derive(Debug, Clone, Serialize)]
pub struct RedeemRequest<'a> {
    pub reward: &'a str,
    pub reward_id: u32,
    pub points: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedeemResponse {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub points_remaining: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleChangeRequest {
    pub role: Role,
}

// --- Request builder ---

/// Builds requests against the configured backend for the current session.
pub struct ApiClient<'a> {
    base_url: &'a str,
    token: Option<&'a SecretString>,
    timeout_ms: u64,
    policy: UrlPolicy,
}

impl<'a> ApiClient<'a> {
    #[must_use]
    pub fn new(base_url: &'a str, token: Option<&'a SecretString>, timeout_ms: u64, policy: UrlPolicy) -> Self {
        Self {
            base_url,
            token,
            timeout_ms,
            policy,
        }
    }

    #[must_use]
    pub fn from_model(model: &'a Model) -> Self {
        Self::new(
            &model.config.api_base_url,
            model.token.as_ref(),
            model.config.request_timeout_ms,
            model.config.url_policy(),
        )
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: HttpMethod, path: &str) -> Result<HttpRequest, HttpError> {
        self.request_at(method, self.url(path))
    }

    fn request_at(&self, method: HttpMethod, url: String) -> Result<HttpRequest, HttpError> {
        let url = ValidatedUrl::with_policy(url, self.policy)?;
        let mut request = HttpRequest::new(method, url)
            .with_timeout_ms(self.timeout_ms)?
            .with_header("Accept", "application/json")?;
        if let Some(token) = self.token {
            request = request.with_header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            )?;
        }
        Ok(request)
    }

    pub fn get(&self, path: &str) -> Result<HttpRequest, HttpError> {
        self.request(HttpMethod::Get, path)
    }

    pub fn delete(&self, path: &str) -> Result<HttpRequest, HttpError> {
        self.request(HttpMethod::Delete, path)
    }

    pub fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<HttpRequest, HttpError> {
        self.request(HttpMethod::Post, path)?.with_json(body)
    }

    pub fn put_json<T: Serialize>(&self, path: &str, body: &T) -> Result<HttpRequest, HttpError> {
        self.request(HttpMethod::Put, path)?.with_json(body)
    }

    pub fn patch_json<T: Serialize>(&self, path: &str, body: &T) -> Result<HttpRequest, HttpError> {
        self.request(HttpMethod::Patch, path)?.with_json(body)
    }

    /// Body-less PATCH, as used by award-points.
    pub fn patch(&self, path: &str) -> Result<HttpRequest, HttpError> {
        self.request(HttpMethod::Patch, path)
    }

    pub fn put(&self, path: &str) -> Result<HttpRequest, HttpError> {
        self.request(HttpMethod::Put, path)
    }

    /// Single-file multipart upload under the `file` field.
    pub fn upload(&self, path: &str, part: MultipartPart) -> Result<HttpRequest, HttpError> {
        self.request(HttpMethod::Post, path)?
            .with_timeout(UPLOAD_TIMEOUT)?
            .with_multipart(vec![part])
    }

    pub fn leaderboard(&self, timeframe: &str, top: u32) -> Result<HttpRequest, HttpError> {
        let mut url = url::Url::parse(&self.url(endpoints::LEADERBOARD)).map_err(|e| {
            HttpError::InvalidUrl {
                url: self.url(endpoints::LEADERBOARD),
                reason: e.to_string(),
            }
        })?;
        url.query_pairs_mut()
            .append_pair("timeframe", timeframe)
            .append_pair("top", &top.to_string());
        self.request_at(HttpMethod::Get, url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::HttpBody;
    use crate::model::UserId;
    use serde_json::json;

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn test_url_join_handles_slashes() {
        let client = ApiClient::new("http://127.0.0.1:5000/api/v1/", None, 30_000, UrlPolicy::AllowPrivate);
        assert_eq!(client.url("/incidents"), "http://127.0.0.1:5000/api/v1/incidents");
        assert_eq!(client.url("incidents"), "http://127.0.0.1:5000/api/v1/incidents");
    }

    #[test]
    fn test_bearer_header_and_timeout() {
        let token = secret("abc.def");
        let client = ApiClient::new("https://api.ajali.app/api/v1", Some(&token), 15_000, UrlPolicy::PublicOnly);
        let request = client.get(endpoints::ME).unwrap();
        assert_eq!(request.headers().get("Authorization"), Some("Bearer abc.def"));
        assert_eq!(request.timeout_ms(), 15_000);
        assert_eq!(request.url().as_str(), "https://api.ajali.app/api/v1/auth/me");
    }

    #[test]
    fn test_private_backend_needs_policy() {
        let client = ApiClient::new("http://127.0.0.1:5000/api/v1", None, 30_000, UrlPolicy::PublicOnly);
        assert!(matches!(
            client.get(endpoints::INCIDENTS),
            Err(HttpError::PrivateNetworkBlocked { .. })
        ));
    }

    #[test]
    fn test_upload_uses_multipart_and_long_timeout() {
        let client = ApiClient::new("https://api.ajali.app/api/v1", None, 30_000, UrlPolicy::PublicOnly);
        let part = MultipartPart {
            field: "file".into(),
            file_name: "crash.jpg".into(),
            content_type: "image/jpeg".into(),
            data: vec![1, 2, 3],
        };
        let request = client
            .upload(&endpoints::media_upload(&IncidentId::new("12")), part)
            .unwrap();
        assert_eq!(request.timeout_ms(), 120_000);
        assert!(matches!(request.body(), Some(HttpBody::Multipart { parts }) if parts[0].field == "file"));
        assert_eq!(request.url().as_str(), "https://api.ajali.app/api/v1/media/12/upload");
    }

    #[test]
    fn test_leaderboard_query() {
        let client = ApiClient::new("https://api.ajali.app/api/v1", None, 30_000, UrlPolicy::PublicOnly);
        let request = client.leaderboard("week", 10).unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.ajali.app/api/v1/users/leaderboard?timeframe=week&top=10"
        );
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = IncidentDraft {
            title: "Crash".into(),
            description: "Two matatus".into(),
            category: "Traffic Accident".into(),
            ..IncidentDraft::default()
        };
        assert!(draft.validate().is_ok());

        draft.category = "  ".into();
        assert_eq!(
            draft.validate(),
            Err(ValidationError::MissingField { field: "Category" })
        );

        draft.category = "Crime".into();
        draft.latitude = Some(120.0);
        draft.longitude = Some(36.0);
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::CoordinatesOutOfRange { .. })
        ));
    }

    #[test]
    fn test_draft_serializes_backend_shape() {
        let draft = IncidentDraft {
            title: " Fire ".into(),
            description: "Market".into(),
            location: Some("   ".into()),
            category: "Fire Emergency".into(),
            severity: Severity::High,
            latitude: Some(-1.28),
            longitude: Some(36.82),
        }
        .normalized();
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(
            value,
            json!({
                "title": "Fire",
                "description": "Market",
                "category": "Fire Emergency",
                "severity": "high",
                "latitude": -1.28,
                "longitude": 36.82
            })
        );
    }

    #[test]
    fn test_create_response_id_keys() {
        let legacy: CreateIncidentResponse =
            serde_json::from_value(json!({"msg": "Incident created", "incident_id": 31})).unwrap();
        assert_eq!(legacy.new_id(), Some(&IncidentId::new("31")));
        let plain: CreateIncidentResponse = serde_json::from_value(json!({"id": "32"})).unwrap();
        assert_eq!(plain.new_id(), Some(&IncidentId::new("32")));
        let neither: CreateIncidentResponse = serde_json::from_value(json!({"msg": "ok"})).unwrap();
        assert!(neither.new_id().is_none());
    }

    #[test]
    fn test_update_only_sends_changes() {
        let update = IncidentUpdate {
            title: Some("New title".into()),
            ..IncidentUpdate::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"title": "New title"}));
        assert!(IncidentUpdate::default().is_empty());
    }

    #[test]
    fn test_password_rules() {
        assert_eq!(
            validate_signup("Amina", "amina@example.com", &secret("12345")),
            Err(ValidationError::PasswordTooShort { min: 6 })
        );
        assert_eq!(
            validate_signup("Amina", "amina-at-example", &secret("123456")),
            Err(ValidationError::InvalidEmail)
        );
        assert!(validate_signup("Amina", "amina@example.com", &secret("123456")).is_ok());
        assert_eq!(
            validate_password_change(&secret("old"), &secret("abcdef"), &secret("abcdeg")),
            Err(ValidationError::PasswordMismatch)
        );
        assert!(validate_password_change(&secret("old"), &secret("abcdef"), &secret("abcdef")).is_ok());
    }

    #[test]
    fn test_login_response_parses_token() {
        let response: LoginResponse = serde_json::from_value(json!({
            "access_token": "jwt",
            "refresh_token": "ignored",
            "user": {"id": 1, "name": "Amina", "email": "a@b.co", "role": "user", "points": 0}
        }))
        .unwrap();
        assert_eq!(response.access_token.expose_secret(), "jwt");
        assert_eq!(response.user.id, UserId::new("1"));
        assert!(!format!("{response:?}").contains("jwt"));
    }
}
