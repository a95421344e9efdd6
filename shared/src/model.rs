use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::{rngs::StdRng, SeedableRng};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::api::IncidentUpdate;
use crate::capabilities::{KeyNamespace, TypedKvStore};
use crate::config::AppConfig;
use crate::dashboard::Page;
use crate::filter::{DateRange, IncidentFilter};
use crate::map::MapMarker;
use crate::media::{RejectedFile, SelectedFile, UploadBatch};
use crate::rewards::LeaderboardQuery;
use crate::{get_current_time_ms, AppError, ToastKind, ToastMessage};

// --- Typed IDs ---
//
// The backend emits integer ids; older endpoints and tests send strings.
// Both normalise to the decimal string form.

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Unsigned(n) => n.to_string(),
            RawId::Signed(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
            }
        }
    };
}

typed_id!(IncidentId);
typed_id!(UserId);
typed_id!(CommentId);
typed_id!(MediaId);

// --- Labels ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "urgent" => Some(Self::Critical),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    /// High and critical reports count towards the "critical" dashboard tile.
    #[must_use]
    pub const fn is_urgent(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or_else(|| {
            warn!(severity = %value, "unknown severity, treating as medium");
            Self::Medium
        })
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum IncidentStatus {
    #[default]
    Pending,
    Investigating,
    Approved,
    InProgress,
    Resolved,
    Rejected,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 6] = [
        Self::Pending,
        Self::Investigating,
        Self::Approved,
        Self::InProgress,
        Self::Resolved,
        Self::Rejected,
    ];

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "reported" => Some(Self::Pending),
            "investigating" | "under_investigation" => Some(Self::Investigating),
            "approved" => Some(Self::Approved),
            "in_progress" | "in-progress" | "in progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Investigating => "investigating",
            Self::Approved => "approved",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }
}

impl From<String> for IncidentStatus {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or_else(|| {
            warn!(status = %value, "unknown incident status, treating as pending");
            Self::Pending
        })
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "citizen" => Some(Self::User),
            "moderator" => Some(Self::Moderator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or_else(|| {
            warn!(role = %value, "unknown role, treating as user");
            Self::User
        })
    }
}

// --- Lenient scalars ---

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Float(f64),
    Text(String),
}

impl RawNumber {
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            RawNumber::Float(f) => *f,
            RawNumber::Text(s) => s.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Parses the timestamp shapes the backend has emitted over time:
/// RFC 3339, RFC 2822 (Flask's default JSON encoding), and naive ISO.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// --- Entities ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    pub id: Option<MediaId>,
    pub file_url: String,
    pub file_type: Option<String>,
    pub filename: Option<String>,
}

impl MediaItem {
    /// Video when the declared type says so, otherwise by file extension.
    #[must_use]
    pub fn is_video(&self) -> bool {
        if let Some(kind) = &self.file_type {
            return kind.starts_with("video");
        }
        let name = self.filename.as_deref().unwrap_or(&self.file_url).to_ascii_lowercase();
        [".mp4", ".mov", ".avi", ".webm"].iter().any(|ext| name.ends_with(ext))
    }
}

#[derive(Deserialize)]
struct RawMediaItem {
    #[serde(default)]
    id: Option<MediaId>,
    #[serde(default)]
    file_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    file_type: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

impl<'de> Deserialize<'de> for MediaItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawMediaItem::deserialize(deserializer)?;
        Ok(Self {
            id: raw.id,
            file_url: raw.file_url.or(raw.url).unwrap_or_default(),
            file_type: non_empty(raw.file_type),
            filename: non_empty(raw.filename),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    pub id: IncidentId,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub created_by: Option<UserId>,
    pub reporter_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub media: Vec<MediaItem>,
    pub casualty_count: Option<u32>,
    pub responder_count: Option<u32>,
}

/// Wire shape: every field optional, with the key variants seen in the wild.
#[derive(Deserialize)]
struct RawIncident {
    id: IncidentId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    latitude: Option<RawNumber>,
    #[serde(default)]
    lat: Option<RawNumber>,
    #[serde(default)]
    longitude: Option<RawNumber>,
    #[serde(default)]
    lng: Option<RawNumber>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    incident_type: Option<String>,
    #[serde(default)]
    severity: Option<Severity>,
    #[serde(default)]
    status: Option<IncidentStatus>,
    #[serde(default)]
    created_by: Option<UserId>,
    #[serde(default)]
    user_id: Option<UserId>,
    #[serde(default)]
    reporter_name: Option<String>,
    #[serde(default)]
    reporter: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    media: Option<Vec<MediaItem>>,
    #[serde(default)]
    casualty_count: Option<u32>,
    #[serde(default)]
    responder_count: Option<u32>,
}

impl<'de> Deserialize<'de> for Incident {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawIncident::deserialize(deserializer)?;
        Ok(Self {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            location: non_empty(raw.location),
            latitude: raw.latitude.or(raw.lat).as_ref().and_then(RawNumber::as_f64),
            longitude: raw.longitude.or(raw.lng).as_ref().and_then(RawNumber::as_f64),
            category: non_empty(raw.category)
                .or_else(|| non_empty(raw.incident_type))
                .unwrap_or_default(),
            severity: raw.severity.unwrap_or_default(),
            status: raw.status.unwrap_or_default(),
            created_by: raw.created_by.or(raw.user_id),
            reporter_name: non_empty(raw.reporter_name).or_else(|| non_empty(raw.reporter)),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            media: raw.media.unwrap_or_default(),
            casualty_count: raw.casualty_count,
            responder_count: raw.responder_count,
        })
    }
}

impl Incident {
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) =>
            {
                Some((lat, lng))
            }
            _ => None,
        }
    }

    /// Free-text location, falling back to the coordinates.
    #[must_use]
    pub fn location_label(&self) -> String {
        match (&self.location, self.coordinates()) {
            (Some(text), _) => text.clone(),
            (None, Some((lat, lng))) => format!("{lat:.4}, {lng:.4}"),
            (None, None) => "Unknown location".to_string(),
        }
    }

    #[must_use]
    pub fn is_reported_by(&self, user_id: &UserId) -> bool {
        self.created_by.as_ref() == Some(user_id)
    }

    pub fn apply_update(&mut self, update: &IncidentUpdate) {
        if let Some(title) = &update.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &update.description {
            self.description.clone_from(description);
        }
        if let Some(location) = &update.location {
            self.location = non_empty(Some(location.clone()));
        }
        if let Some(category) = &update.category {
            self.category.clone_from(category);
        }
        if let Some(severity) = update.severity {
            self.severity = severity;
        }
        if let Some(latitude) = update.latitude {
            self.latitude = Some(latitude);
        }
        if let Some(longitude) = update.longitude {
            self.longitude = Some(longitude);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub points: u32,
    pub location: Option<String>,
}

#[derive(Deserialize)]
struct RawUser {
    id: UserId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    points: Option<u32>,
    #[serde(default)]
    location: Option<String>,
}

impl<'de> Deserialize<'de> for User {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawUser::deserialize(deserializer)?;
        Ok(Self {
            id: raw.id,
            name: non_empty(raw.name)
                .or_else(|| non_empty(raw.username))
                .unwrap_or_default(),
            email: raw.email.unwrap_or_default(),
            phone: non_empty(raw.phone),
            role: raw.role.unwrap_or_default(),
            points: raw.points.unwrap_or(0),
            location: non_empty(raw.location),
        })
    }
}

impl User {
    /// Display name, or the email's local part when no name was given.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.email.split('@').next().unwrap_or_default()
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: Option<CommentId>,
    pub incident_id: Option<IncidentId>,
    pub author: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawComment {
    #[serde(default)]
    id: Option<CommentId>,
    #[serde(default)]
    incident_id: Option<IncidentId>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
}

impl<'de> Deserialize<'de> for Comment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawComment::deserialize(deserializer)?;
        Ok(Self {
            id: raw.id,
            incident_id: raw.incident_id,
            author: non_empty(raw.author)
                .or_else(|| non_empty(raw.user_name))
                .or_else(|| non_empty(raw.username))
                .unwrap_or_else(|| "Anonymous".to_string()),
            text: raw.text.or(raw.content).unwrap_or_default(),
            created_at: raw.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: UserId,
    #[serde(alias = "username")]
    pub name: String,
    #[serde(default)]
    pub points: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointsSummary {
    pub points: u32,
    pub available_points: u32,
    pub rank: Option<u32>,
}

#[derive(Deserialize)]
struct RawPointsSummary {
    #[serde(default, alias = "total_points")]
    points: u32,
    #[serde(default)]
    available_points: Option<u32>,
    #[serde(default)]
    rank: Option<u32>,
}

impl<'de> Deserialize<'de> for PointsSummary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawPointsSummary::deserialize(deserializer)?;
        Ok(Self {
            points: raw.points,
            available_points: raw.available_points.unwrap_or(raw.points),
            rank: raw.rank,
        })
    }
}

/// List endpoints answer with a bare array or wrap it under `data` / `items`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Bare(Vec<T>),
    Data { data: Vec<T> },
    Items { items: Vec<T> },
}

impl<T> ListEnvelope<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListEnvelope::Bare(v) | ListEnvelope::Data { data: v } | ListEnvelope::Items { items: v } => v,
        }
    }
}

/// Single-item endpoints answer with the object or wrap it under `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ItemEnvelope<T> {
    Data { data: T },
    Bare(T),
}

impl<T> ItemEnvelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            ItemEnvelope::Data { data: v } | ItemEnvelope::Bare(v) => v,
        }
    }
}

// --- Application state ---

/// UI preferences kept across launches in the settings namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserSettings {
    #[serde(default)]
    pub leaderboard: LeaderboardQuery,
    #[serde(default)]
    pub date_range: DateRange,
}

impl UserSettings {
    pub const KEY: &'static str = "preferences";

    #[must_use]
    pub const fn store() -> TypedKvStore<Self> {
        TypedKvStore::new(KeyNamespace::Settings)
    }

    #[must_use]
    pub fn from_model(model: &Model) -> Self {
        Self {
            leaderboard: model.leaderboard_query,
            date_range: model.filter.date_range,
        }
    }

    pub fn apply(self, model: &mut Model) {
        model.leaderboard_query = self.leaderboard;
        model.filter.date_range = self.date_range;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    #[default]
    Loading,
    Unauthenticated,
    Authenticating,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthScreen {
    #[default]
    Login,
    Signup,
    ForgotPassword,
}

pub struct Model {
    pub config: AppConfig,
    pub state: AppState,
    pub auth_screen: AuthScreen,
    pub auth_notice: Option<String>,
    pub token: Option<SecretString>,
    pub user: Option<User>,
    pub page: Page,

    pub incidents: Vec<Incident>,
    pub incidents_loading: bool,
    pub filter: IncidentFilter,

    pub selected_incident: Option<IncidentId>,
    pub incident_detail: Option<Incident>,
    pub comments: Vec<Comment>,
    pub detail_loading: bool,

    pub staged_media: Vec<SelectedFile>,
    pub rejected_media: Vec<RejectedFile>,
    pub upload_batches: HashMap<IncidentId, UploadBatch>,
    pub is_submitting: bool,

    pub points: Option<PointsSummary>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub leaderboard_query: LeaderboardQuery,
    pub users: Vec<User>,
    pub map_markers: Vec<MapMarker>,

    pub is_loading: bool,
    pub active_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
    pub view_timestamp_ms: u64,
    pub rng: StdRng,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("state", &self.state)
            .field("page", &self.page)
            .field("token_present", &self.token.is_some())
            .field("user_id", &self.user.as_ref().map(|u| &u.id))
            .field("incidents", &self.incidents.len())
            .field("selected_incident", &self.selected_incident)
            .field("upload_batches", &self.upload_batches.len())
            .field("active_error", &self.active_error)
            .finish_non_exhaustive()
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl Model {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: AppState::Loading,
            auth_screen: AuthScreen::Login,
            auth_notice: None,
            token: None,
            user: None,
            page: Page::default(),
            incidents: Vec::new(),
            incidents_loading: false,
            filter: IncidentFilter::default(),
            selected_incident: None,
            incident_detail: None,
            comments: Vec::new(),
            detail_loading: false,
            staged_media: Vec::new(),
            rejected_media: Vec::new(),
            upload_batches: HashMap::new(),
            is_submitting: false,
            points: None,
            leaderboard: Vec::new(),
            leaderboard_query: LeaderboardQuery::default(),
            users: Vec::new(),
            map_markers: Vec::new(),
            is_loading: false,
            active_error: None,
            active_toast: None,
            view_timestamp_ms: get_current_time_ms(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic placeholder jitter for tests and replays.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn update_timestamp(&mut self) {
        self.view_timestamp_ms = get_current_time_ms();
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_toast = Some(ToastMessage::new(message, kind));
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role().is_some_and(Role::is_admin)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    /// Drops everything tied to the signed-in user.
    pub fn clear_session(&mut self) {
        self.state = AppState::Unauthenticated;
        self.auth_screen = AuthScreen::Login;
        self.token = None;
        self.user = None;
        self.page = Page::default();
        self.incidents.clear();
        self.incidents_loading = false;
        self.filter = IncidentFilter::default();
        self.close_detail();
        self.staged_media.clear();
        self.rejected_media.clear();
        self.upload_batches.clear();
        self.is_submitting = false;
        self.points = None;
        self.leaderboard.clear();
        self.users.clear();
        self.map_markers.clear();
        self.is_loading = false;
    }

    pub fn close_detail(&mut self) {
        self.selected_incident = None;
        self.incident_detail = None;
        self.comments.clear();
        self.detail_loading = false;
    }

    #[must_use]
    pub fn is_selected(&self, id: &IncidentId) -> bool {
        self.selected_incident.as_ref() == Some(id)
    }

    /// Applies `patch` to the incident in the list and in the open detail.
    pub fn patch_incident(&mut self, id: &IncidentId, mut patch: impl FnMut(&mut Incident)) -> bool {
        let mut found = false;
        if let Some(incident) = self.incidents.iter_mut().find(|i| &i.id == id) {
            patch(incident);
            found = true;
        }
        if let Some(detail) = self.incident_detail.as_mut().filter(|d| &d.id == id) {
            patch(detail);
            found = true;
        }
        found
    }

    pub fn remove_incident(&mut self, id: &IncidentId) {
        self.incidents.retain(|i| &i.id != id);
        self.map_markers.retain(|m| &m.incident_id != id);
        if self.is_selected(id) {
            self.close_detail();
        }
    }
}
