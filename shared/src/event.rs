use secrecy::SecretString;

use crate::api::{IncidentDraft, IncidentScope, IncidentUpdate};
use crate::capabilities::{HttpResult, KvResult};
use crate::config::AppConfig;
use crate::dashboard::Page;
use crate::filter::FilterChange;
use crate::media::SelectedFile;
use crate::model::{AuthScreen, IncidentId, IncidentStatus, MediaId, Role, UserId};
use crate::rewards::LeaderboardQuery;

#[derive(Debug, Clone)]
pub enum Event {
    Noop,

    /// Replaces the model's config; shells send it before `AppStarted`.
    Configure(Box<AppConfig>),
    AppStarted,
    StoredTokenLoaded(Box<KvResult>),
    CurrentUserResponse(Box<HttpResult>),
    TokenPersisted(Box<KvResult>),
    TokenCleared(Box<KvResult>),
    SettingsLoaded(Box<KvResult>),
    SettingsPersisted(Box<KvResult>),

    ShowAuthScreen(AuthScreen),
    LoginRequested {
        email: String,
        password: SecretString,
    },
    LoginResponse(Box<HttpResult>),
    SignupRequested {
        name: String,
        email: String,
        phone: Option<String>,
        password: SecretString,
    },
    SignupResponse(Box<HttpResult>),
    ForgotPasswordRequested {
        email: String,
    },
    ForgotPasswordResponse(Box<HttpResult>),
    ResetPasswordRequested {
        token: String,
        new_password: SecretString,
    },
    ResetPasswordResponse(Box<HttpResult>),
    ChangePasswordRequested {
        current_password: SecretString,
        new_password: SecretString,
        confirm_password: SecretString,
    },
    ChangePasswordResponse(Box<HttpResult>),
    LogoutRequested,

    Navigate(Page),

    RefreshIncidents,
    IncidentsResponse {
        scope: IncidentScope,
        result: Box<HttpResult>,
    },
    FilterChanged(FilterChange),
    ClearFilters,

    IncidentSelected {
        id: IncidentId,
    },
    IncidentDeselected,
    IncidentDetailResponse {
        id: IncidentId,
        result: Box<HttpResult>,
    },
    CommentsResponse {
        id: IncidentId,
        result: Box<HttpResult>,
    },

    ReportSubmitted(IncidentDraft),
    CreateIncidentResponse(Box<HttpResult>),
    IncidentEdited {
        id: IncidentId,
        changes: IncidentUpdate,
    },
    UpdateIncidentResponse {
        id: IncidentId,
        changes: IncidentUpdate,
        result: Box<HttpResult>,
    },
    DeleteIncidentRequested {
        id: IncidentId,
    },
    DeleteIncidentResponse {
        id: IncidentId,
        result: Box<HttpResult>,
    },
    CommentSubmitted {
        id: IncidentId,
        text: String,
    },
    CommentResponse {
        id: IncidentId,
        result: Box<HttpResult>,
    },

    MediaSelected {
        files: Vec<SelectedFile>,
    },
    MediaRemoved {
        index: usize,
    },
    /// Uploads the staged files to an incident that already exists.
    MediaUploadRequested {
        incident_id: IncidentId,
    },
    MediaUploadResponse {
        incident_id: IncidentId,
        file_name: String,
        result: Box<HttpResult>,
    },
    MediaListRequested {
        incident_id: IncidentId,
    },
    MediaListResponse {
        incident_id: IncidentId,
        result: Box<HttpResult>,
    },
    MediaDeleteRequested {
        incident_id: IncidentId,
        media_id: MediaId,
    },
    MediaDeleteResponse {
        incident_id: IncidentId,
        media_id: MediaId,
        result: Box<HttpResult>,
    },

    StatusChangeRequested {
        id: IncidentId,
        status: IncidentStatus,
    },
    StatusChangeResponse {
        id: IncidentId,
        status: IncidentStatus,
        result: Box<HttpResult>,
    },
    AwardPointsRequested {
        id: IncidentId,
    },
    AwardPointsResponse {
        id: IncidentId,
        result: Box<HttpResult>,
    },

    RefreshPoints,
    PointsResponse(Box<HttpResult>),
    LeaderboardQueryChanged(LeaderboardQuery),
    LeaderboardResponse {
        query: LeaderboardQuery,
        result: Box<HttpResult>,
    },
    RedeemRequested {
        reward_id: u32,
    },
    RedeemResponse {
        reward_id: u32,
        result: Box<HttpResult>,
    },

    RefreshUsers,
    UsersResponse(Box<HttpResult>),
    PromoteUserRequested {
        id: UserId,
    },
    PromoteUserResponse {
        id: UserId,
        result: Box<HttpResult>,
    },
    RoleChangeRequested {
        id: UserId,
        role: Role,
    },
    RoleChangeResponse {
        id: UserId,
        role: Role,
        result: Box<HttpResult>,
    },
    DeleteUserRequested {
        id: UserId,
    },
    DeleteUserResponse {
        id: UserId,
        result: Box<HttpResult>,
    },

    DismissError,
    DismissToast,
    TimerTick,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Configure(_) => "configure",
            Self::AppStarted => "app_started",
            Self::StoredTokenLoaded(_) => "stored_token_loaded",
            Self::CurrentUserResponse(_) => "current_user_response",
            Self::TokenPersisted(_) => "token_persisted",
            Self::TokenCleared(_) => "token_cleared",
            Self::SettingsLoaded(_) => "settings_loaded",
            Self::SettingsPersisted(_) => "settings_persisted",
            Self::ShowAuthScreen(_) => "show_auth_screen",
            Self::LoginRequested { .. } => "login_requested",
            Self::LoginResponse(_) => "login_response",
            Self::SignupRequested { .. } => "signup_requested",
            Self::SignupResponse(_) => "signup_response",
            Self::ForgotPasswordRequested { .. } => "forgot_password_requested",
            Self::ForgotPasswordResponse(_) => "forgot_password_response",
            Self::ResetPasswordRequested { .. } => "reset_password_requested",
            Self::ResetPasswordResponse(_) => "reset_password_response",
            Self::ChangePasswordRequested { .. } => "change_password_requested",
            Self::ChangePasswordResponse(_) => "change_password_response",
            Self::LogoutRequested => "logout_requested",
            Self::Navigate(_) => "navigate",
            Self::RefreshIncidents => "refresh_incidents",
            Self::IncidentsResponse { .. } => "incidents_response",
            Self::FilterChanged(_) => "filter_changed",
            Self::ClearFilters => "clear_filters",
            Self::IncidentSelected { .. } => "incident_selected",
            Self::IncidentDeselected => "incident_deselected",
            Self::IncidentDetailResponse { .. } => "incident_detail_response",
            Self::CommentsResponse { .. } => "comments_response",
            Self::ReportSubmitted(_) => "report_submitted",
            Self::CreateIncidentResponse(_) => "create_incident_response",
            Self::IncidentEdited { .. } => "incident_edited",
            Self::UpdateIncidentResponse { .. } => "update_incident_response",
            Self::DeleteIncidentRequested { .. } => "delete_incident_requested",
            Self::DeleteIncidentResponse { .. } => "delete_incident_response",
            Self::CommentSubmitted { .. } => "comment_submitted",
            Self::CommentResponse { .. } => "comment_response",
            Self::MediaSelected { .. } => "media_selected",
            Self::MediaRemoved { .. } => "media_removed",
            Self::MediaUploadRequested { .. } => "media_upload_requested",
            Self::MediaUploadResponse { .. } => "media_upload_response",
            Self::MediaListRequested { .. } => "media_list_requested",
            Self::MediaListResponse { .. } => "media_list_response",
            Self::MediaDeleteRequested { .. } => "media_delete_requested",
            Self::MediaDeleteResponse { .. } => "media_delete_response",
            Self::StatusChangeRequested { .. } => "status_change_requested",
            Self::StatusChangeResponse { .. } => "status_change_response",
            Self::AwardPointsRequested { .. } => "award_points_requested",
            Self::AwardPointsResponse { .. } => "award_points_response",
            Self::RefreshPoints => "refresh_points",
            Self::PointsResponse(_) => "points_response",
            Self::LeaderboardQueryChanged(_) => "leaderboard_query_changed",
            Self::LeaderboardResponse { .. } => "leaderboard_response",
            Self::RedeemRequested { .. } => "redeem_requested",
            Self::RedeemResponse { .. } => "redeem_response",
            Self::RefreshUsers => "refresh_users",
            Self::UsersResponse(_) => "users_response",
            Self::PromoteUserRequested { .. } => "promote_user_requested",
            Self::PromoteUserResponse { .. } => "promote_user_response",
            Self::RoleChangeRequested { .. } => "role_change_requested",
            Self::RoleChangeResponse { .. } => "role_change_response",
            Self::DeleteUserRequested { .. } => "delete_user_requested",
            Self::DeleteUserResponse { .. } => "delete_user_response",
            Self::DismissError => "dismiss_error",
            Self::DismissToast => "dismiss_toast",
            Self::TimerTick => "timer_tick",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::ShowAuthScreen(_)
                | Self::LoginRequested { .. }
                | Self::SignupRequested { .. }
                | Self::ForgotPasswordRequested { .. }
                | Self::ResetPasswordRequested { .. }
                | Self::ChangePasswordRequested { .. }
                | Self::LogoutRequested
                | Self::Navigate(_)
                | Self::RefreshIncidents
                | Self::FilterChanged(_)
                | Self::ClearFilters
                | Self::IncidentSelected { .. }
                | Self::IncidentDeselected
                | Self::ReportSubmitted(_)
                | Self::IncidentEdited { .. }
                | Self::DeleteIncidentRequested { .. }
                | Self::CommentSubmitted { .. }
                | Self::MediaSelected { .. }
                | Self::MediaRemoved { .. }
                | Self::MediaUploadRequested { .. }
                | Self::MediaListRequested { .. }
                | Self::MediaDeleteRequested { .. }
                | Self::StatusChangeRequested { .. }
                | Self::AwardPointsRequested { .. }
                | Self::RefreshPoints
                | Self::LeaderboardQueryChanged(_)
                | Self::RedeemRequested { .. }
                | Self::RefreshUsers
                | Self::PromoteUserRequested { .. }
                | Self::RoleChangeRequested { .. }
                | Self::DeleteUserRequested { .. }
                | Self::DismissError
                | Self::DismissToast
        )
    }
}
