//! Ajali shared core: incident reporting, moderation, rewards and map
//! state as a platform-independent state machine.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod dashboard;
pub mod event;
pub mod filter;
pub mod map;
pub mod media;
pub mod model;
pub mod rewards;
pub mod view;
pub mod workflow;

#[cfg(all(feature = "shell", not(target_arch = "wasm32")))]
pub mod shell;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::AppConfig;
pub use event::Event;
pub use model::Model;
pub use view::ViewModel;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
pub const MAX_MEDIA_BYTES: u64 = 10 * 1024 * 1024;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const DEFAULT_MAP_CENTER: (f64, f64) = (-1.2921, 36.8219);
pub const PLACEHOLDER_JITTER_DEG: f64 = 0.05;
pub const DEFAULT_MAP_ZOOM: u8 = 12;
pub const RECENT_ACTIVITY_LIMIT: usize = 10;
pub const DEFAULT_LEADERBOARD_SIZE: u32 = 10;
pub const DESCRIPTION_PREVIEW_LENGTH: usize = 80;

/// Broad failure classes. Each maps to a stable code the UI can key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    Deserialization,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Deserialization => "BAD_RESPONSE",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "SERVER_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Whether sending the same request again can succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Internal
        )
    }

    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

/// An error shown in the banner. `message` is what the user reads;
/// `detail` and `context` only reach the logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Text safe to show the user. Server-provided messages pass through;
    /// transport failures get fixed wording.
    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Network error. Please check your connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Deserialization => {
                "The server sent an unexpected response. Please try again.".into()
            }
            ErrorKind::Internal | ErrorKind::Unknown if self.message.is_empty() => {
                "An unexpected error occurred. Please try again.".into()
            }
            _ => self.message.clone(),
        }
    }

    /// Error for a non-success response. The server's `msg`, `message`
    /// or `error` field wins over `fallback`.
    #[must_use]
    pub fn from_response(response: &capabilities::HttpResponse, fallback: &str) -> Self {
        let status = response.status();
        let message = response.server_message().unwrap_or_else(|| fallback.to_string());
        Self::new(ErrorKind::from_status(status), message)
            .with_context("http_status", status.to_string())
            .with_context("request_id", response.request_id())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// Client-side form and input checks, run before any request is sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("{file_name}: only images and videos can be attached")]
    UnsupportedMediaType { file_name: String, mime_type: String },

    #[error("{file_name}: file is larger than {max_mb} MB")]
    FileTooLarge {
        file_name: String,
        size_bytes: u64,
        max_mb: u64,
    },

    #[error("Insufficient points to redeem this reward")]
    InsufficientPoints { required: u32, available: u32 },

    #[error("Coordinates ({lat}, {lng}) are out of range")]
    CoordinatesOutOfRange { lat: f64, lng: f64 },
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        let error = AppError::new(ErrorKind::Validation, e.to_string());
        match e {
            ValidationError::MissingField { field } => error.with_context("field", field),
            _ => error,
        }
    }
}

/// Coarse relative age for list rows and comments, e.g. "5m ago".
#[must_use]
pub fn format_time_ago(timestamp_ms: u64, now_ms: u64) -> String {
    const DAY: u64 = 86_400;
    const UNITS: [(u64, &str); 6] = [
        (365 * DAY, "y"),
        (30 * DAY, "mo"),
        (7 * DAY, "w"),
        (DAY, "d"),
        (3_600, "h"),
        (60, "m"),
    ];

    if timestamp_ms > now_ms {
        let ahead = if timestamp_ms - now_ms < 60_000 { "Just now" } else { "Upcoming" };
        return ahead.into();
    }

    let secs = (now_ms - timestamp_ms) / 1000;
    if secs < 5 {
        return "Just now".into();
    }
    UNITS
        .iter()
        .find(|(size, _)| secs >= *size)
        .map_or_else(|| format!("{secs}s ago"), |(size, unit)| format!("{}{unit} ago", secs / size))
}

#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Shortens text on a char boundary, appending an ellipsis when cut.
#[must_use]
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            created_at_ms: get_current_time_ms(),
            duration_ms: kind.default_duration_ms(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > self.duration_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub code: String,
    pub can_retry: bool,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            code: e.code().to_string(),
            can_retry: e.kind.is_retryable(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}
