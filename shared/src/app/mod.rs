//! Event handling. `App::update` is the only place the model changes;
//! every request it makes leaves as an `Effect`.

mod admin;
mod auth;
mod incidents;
mod media;
mod rewards;

use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::capabilities::{
    Capabilities, HttpError, HttpReply, HttpRequest, HttpResponse, HttpResult, KvOperation, KvReply,
    KvResult,
};
use crate::dashboard::Page;
use crate::event::Event;
use crate::model::{AppState, Model, UserSettings};
use crate::view::ViewModel;
use crate::{AppError, ErrorKind, ValidationError};

pub(crate) const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";
pub(crate) const TOKEN_KEY: &str = "token";

#[derive(Debug, Default, Clone, Copy)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        model.update_timestamp();

        let event_name = event.name();
        debug!(event = event_name, "update");
        if event.is_user_initiated() {
            info!(event = event_name, "user action");
        }

        match event {
            Event::Noop => {}

            Event::Configure(config) => {
                debug!(base_url = %config.api_base_url, "configured");
                model.config = *config;
            }
            Event::AppStarted => Self::start(model, caps),
            Event::StoredTokenLoaded(result) => Self::handle_stored_token(*result, model, caps),
            Event::CurrentUserResponse(result) => Self::handle_current_user_response(*result, model, caps),
            Event::TokenPersisted(result) => Self::log_kv_result("persist_token", &result),
            Event::TokenCleared(result) => Self::log_kv_result("clear_token", &result),
            Event::SettingsLoaded(result) => Self::handle_settings_loaded(*result, model, caps),
            Event::SettingsPersisted(result) => Self::log_kv_result("persist_settings", &result),

            Event::ShowAuthScreen(screen) => {
                model.auth_screen = screen;
                model.auth_notice = None;
                model.clear_error();
                caps.render.render();
            }
            Event::LoginRequested { email, password } => Self::login(&email, &password, model, caps),
            Event::LoginResponse(result) => Self::handle_login_response(*result, model, caps),
            Event::SignupRequested {
                name,
                email,
                phone,
                password,
            } => Self::signup(name, email, phone, &password, model, caps),
            Event::SignupResponse(result) => Self::handle_signup_response(*result, model, caps),
            Event::ForgotPasswordRequested { email } => Self::forgot_password(&email, model, caps),
            Event::ForgotPasswordResponse(result) => {
                Self::handle_forgot_password_response(*result, model, caps);
            }
            Event::ResetPasswordRequested {
                token,
                new_password,
            } => Self::reset_password(&token, &new_password, model, caps),
            Event::ResetPasswordResponse(result) => {
                Self::handle_reset_password_response(*result, model, caps);
            }
            Event::ChangePasswordRequested {
                current_password,
                new_password,
                confirm_password,
            } => Self::change_password(
                &current_password,
                &new_password,
                &confirm_password,
                model,
                caps,
            ),
            Event::ChangePasswordResponse(result) => {
                Self::handle_change_password_response(*result, model, caps);
            }
            Event::LogoutRequested => Self::logout(model, caps),

            Event::Navigate(page) => Self::navigate(page, model, caps),

            Event::RefreshIncidents => {
                if Self::require_session(model, caps) {
                    Self::send_incidents_request(model, caps);
                    caps.render.render();
                }
            }
            Event::IncidentsResponse { scope, result } => {
                Self::handle_incidents_response(scope, *result, model, caps);
            }
            Event::FilterChanged(change) => {
                let before = model.filter.date_range;
                model.filter.apply_change(change);
                if model.filter.date_range != before {
                    Self::persist_settings(model, caps);
                }
                caps.render.render();
            }
            Event::ClearFilters => {
                let had_range = model.filter.date_range != crate::filter::DateRange::All;
                model.filter = crate::filter::IncidentFilter::default();
                if had_range {
                    Self::persist_settings(model, caps);
                }
                caps.render.render();
            }

            Event::IncidentSelected { id } => Self::select_incident(id, model, caps),
            Event::IncidentDeselected => {
                model.close_detail();
                if model.page == Page::IncidentDetail {
                    model.page = Page::Incidents;
                }
                caps.render.render();
            }
            Event::IncidentDetailResponse { id, result } => {
                Self::handle_incident_detail_response(&id, *result, model, caps);
            }
            Event::CommentsResponse { id, result } => {
                Self::handle_comments_response(&id, *result, model, caps);
            }

            Event::ReportSubmitted(draft) => Self::submit_report(&draft, model, caps),
            Event::CreateIncidentResponse(result) => {
                Self::handle_create_incident_response(*result, model, caps);
            }
            Event::IncidentEdited { id, changes } => Self::edit_incident(id, changes, model, caps),
            Event::UpdateIncidentResponse {
                id,
                changes,
                result,
            } => Self::handle_update_incident_response(&id, &changes, *result, model, caps),
            Event::DeleteIncidentRequested { id } => Self::delete_incident(id, model, caps),
            Event::DeleteIncidentResponse { id, result } => {
                Self::handle_delete_incident_response(&id, *result, model, caps);
            }
            Event::CommentSubmitted { id, text } => Self::submit_comment(id, &text, model, caps),
            Event::CommentResponse { id, result } => {
                Self::handle_comment_response(&id, *result, model, caps);
            }

            Event::MediaSelected { files } => Self::select_media(files, model, caps),
            Event::MediaRemoved { index } => {
                if index < model.staged_media.len() {
                    let removed = model.staged_media.remove(index);
                    debug!(file = %removed.name, "unstaged media");
                }
                caps.render.render();
            }
            Event::MediaUploadRequested { incident_id } => {
                Self::upload_to_incident(incident_id, model, caps);
            }
            Event::MediaUploadResponse {
                incident_id,
                file_name,
                result,
            } => Self::handle_media_upload_response(&incident_id, &file_name, *result, model, caps),
            Event::MediaListRequested { incident_id } => {
                if Self::require_session(model, caps) {
                    Self::send_media_list_request(&incident_id, model, caps);
                }
            }
            Event::MediaListResponse {
                incident_id,
                result,
            } => Self::handle_media_list_response(&incident_id, *result, model, caps),
            Event::MediaDeleteRequested {
                incident_id,
                media_id,
            } => Self::delete_media(incident_id, media_id, model, caps),
            Event::MediaDeleteResponse {
                incident_id,
                media_id,
                result,
            } => Self::handle_media_delete_response(&incident_id, &media_id, *result, model, caps),

            Event::StatusChangeRequested { id, status } => {
                Self::change_status(id, status, model, caps);
            }
            Event::StatusChangeResponse { id, status, result } => {
                Self::handle_status_change_response(&id, status, *result, model, caps);
            }
            Event::AwardPointsRequested { id } => {
                if Self::require_admin(model, caps) {
                    Self::send_award_points_request(id, model, caps);
                }
            }
            Event::AwardPointsResponse { id, result } => {
                Self::handle_award_points_response(&id, *result, model, caps);
            }

            Event::RefreshPoints => {
                if Self::require_session(model, caps) {
                    Self::send_points_request(model, caps);
                }
            }
            Event::PointsResponse(result) => Self::handle_points_response(*result, model, caps),
            Event::LeaderboardQueryChanged(query) => {
                model.leaderboard_query = query;
                Self::persist_settings(model, caps);
                if model.is_authenticated() {
                    Self::send_leaderboard_request(model, caps);
                }
                caps.render.render();
            }
            Event::LeaderboardResponse { query, result } => {
                Self::handle_leaderboard_response(query, *result, model, caps);
            }
            Event::RedeemRequested { reward_id } => Self::redeem(reward_id, model, caps),
            Event::RedeemResponse { reward_id, result } => {
                Self::handle_redeem_response(reward_id, *result, model, caps);
            }

            Event::RefreshUsers => {
                if Self::require_admin(model, caps) {
                    Self::send_users_request(model, caps);
                }
            }
            Event::UsersResponse(result) => Self::handle_users_response(*result, model, caps),
            Event::PromoteUserRequested { id } => Self::promote_user(id, model, caps),
            Event::PromoteUserResponse { id, result } => {
                Self::handle_promote_user_response(&id, *result, model, caps);
            }
            Event::RoleChangeRequested { id, role } => Self::change_role(id, role, model, caps),
            Event::RoleChangeResponse { id, role, result } => {
                Self::handle_role_change_response(&id, role, *result, model, caps);
            }
            Event::DeleteUserRequested { id } => Self::delete_user(id, model, caps),
            Event::DeleteUserResponse { id, result } => {
                Self::handle_delete_user_response(&id, *result, model, caps);
            }

            Event::DismissError => {
                model.clear_error();
                caps.render.render();
            }
            Event::DismissToast => {
                model.clear_toast();
                caps.render.render();
            }
            Event::TimerTick => {
                let expired = model
                    .active_toast
                    .as_ref()
                    .is_some_and(|t| t.is_expired(model.view_timestamp_ms));
                if expired {
                    model.clear_toast();
                    caps.render.render();
                }
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        crate::view::build(model)
    }
}

impl App {
    fn start(model: &mut Model, caps: &Capabilities) {
        model.state = AppState::Loading;
        match KvOperation::get(crate::capabilities::KeyNamespace::Session, TOKEN_KEY) {
            Ok(op) => caps.execute_kv(op, KvReply::LoadToken),
            Err(e) => {
                error!(error = %e, "token key rejected");
                model.state = AppState::Unauthenticated;
            }
        }
        match UserSettings::store().get_op(UserSettings::KEY) {
            Ok(op) => caps.execute_kv(op, KvReply::LoadSettings),
            Err(e) => warn!(error = %e, "settings key rejected"),
        }
        caps.render.render();
    }

    fn handle_settings_loaded(result: KvResult, model: &mut Model, caps: &Capabilities) {
        let parsed = result.and_then(|output| UserSettings::store().parse_value(output));
        match parsed {
            Ok(Some(settings)) => {
                settings.apply(model);
                caps.render.render();
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "stored settings unreadable, using defaults"),
        }
    }

    fn persist_settings(model: &Model, caps: &Capabilities) {
        match UserSettings::store().set_op(UserSettings::KEY, &UserSettings::from_model(model)) {
            Ok(op) => caps.execute_kv(op, KvReply::PersistSettings),
            Err(e) => warn!(error = %e, "settings not persisted"),
        }
    }

    fn log_kv_result(operation: &str, result: &KvResult) {
        match result {
            Ok(_) => debug!(operation, "kv operation completed"),
            Err(e) => warn!(operation, error = %e, "kv operation failed"),
        }
    }

    fn navigate(page: Page, model: &mut Model, caps: &Capabilities) {
        if !Self::require_session(model, caps) {
            return;
        }
        if page.requires_admin() && !model.is_admin() {
            warn!(page = ?page, "non-admin navigation to admin page refused");
            model.set_error(AppError::new(
                ErrorKind::Authorization,
                "You do not have permission to view this page",
            ));
            caps.render.render();
            return;
        }

        let page = if page == Page::IncidentDetail && model.selected_incident.is_none() {
            Page::Incidents
        } else {
            page
        };
        if page != Page::IncidentDetail {
            model.close_detail();
        }
        model.page = page;
        model.clear_error();
        Self::enter_page(model, caps);
        caps.render.render();
    }

    /// Issues the fetches the current page needs.
    fn enter_page(model: &mut Model, caps: &Capabilities) {
        match model.page {
            Page::Incidents => {
                Self::send_incidents_request(model, caps);
                if !model.is_admin() {
                    Self::send_points_request(model, caps);
                }
            }
            Page::Map | Page::Analytics => Self::send_incidents_request(model, caps),
            Page::Rewards | Page::Profile => Self::send_points_request(model, caps),
            Page::Leaderboard => Self::send_leaderboard_request(model, caps),
            Page::AdminUsers => Self::send_users_request(model, caps),
            Page::IncidentDetail | Page::Report => {}
        }
    }

    // --- Shared plumbing ---

    /// Emits `request` if it could be built; otherwise records why not.
    fn dispatch(
        request: Result<HttpRequest, HttpError>,
        reply: HttpReply,
        model: &mut Model,
        caps: &Capabilities,
    ) -> bool {
        match request {
            Ok(request) => {
                debug!(
                    method = request.method().as_str(),
                    url = request.url().as_str(),
                    request_id = request.request_id(),
                    "http request"
                );
                caps.send_http(request, reply);
                true
            }
            Err(e) => {
                error!(error = %e, "request could not be built");
                model.set_error(Self::handle_http_error(&e));
                false
            }
        }
    }

    fn handle_http_error(error: &HttpError) -> AppError {
        match error {
            HttpError::ConnectionError { host, message } => {
                AppError::new(ErrorKind::Network, "Network error")
                    .with_detail(message.clone())
                    .with_context("host", host.clone())
            }
            HttpError::Timeout {
                timeout_ms,
                request_id,
            } => AppError::new(ErrorKind::Timeout, "Request timed out")
                .with_context("timeout_ms", timeout_ms.to_string())
                .with_context("request_id", request_id.clone()),
            HttpError::Cancelled { request_id } => AppError::new(ErrorKind::Unknown, "Request cancelled")
                .with_context("request_id", request_id.clone()),
            HttpError::InvalidResponse { reason, request_id } => {
                AppError::new(ErrorKind::Deserialization, "Unexpected response from server")
                    .with_detail(reason.clone())
                    .with_context("request_id", request_id.clone())
            }
            HttpError::InvalidUrl { .. } | HttpError::PrivateNetworkBlocked { .. } => {
                AppError::new(ErrorKind::InvalidState, "The server address is not allowed")
                    .with_detail(error.to_string())
            }
            other => AppError::new(ErrorKind::Internal, "Request failed").with_detail(other.to_string()),
        }
    }

    /// Body of a 2xx response that failed to parse.
    fn parse_error(response: &HttpResponse, error: &HttpError) -> AppError {
        AppError::new(ErrorKind::Deserialization, "Unexpected response from server")
            .with_detail(error.to_string())
            .with_context("request_id", response.request_id())
    }

    /// True when a 401 on an authenticated call ended the session.
    fn session_expired(response: &HttpResponse, model: &mut Model, caps: &Capabilities) -> bool {
        if response.status() != 401 || model.token.is_none() {
            return false;
        }
        warn!(request_id = response.request_id(), "session rejected by server");
        model.clear_session();
        model.auth_notice = Some(SESSION_EXPIRED.to_string());
        Self::clear_stored_token(caps);
        caps.render.render();
        true
    }

    /// Non-2xx handling shared by most responses.
    fn reject(response: &HttpResponse, fallback: &str, model: &mut Model, caps: &Capabilities) {
        if Self::session_expired(response, model, caps) {
            return;
        }
        warn!(
            status = response.status(),
            request_id = response.request_id(),
            "request rejected"
        );
        model.set_error(AppError::from_response(response, fallback));
        caps.render.render();
    }

    /// Transport failures shared by most responses.
    fn fail(error: &HttpError, model: &mut Model, caps: &Capabilities) {
        warn!(error = %error, "request failed");
        model.set_error(Self::handle_http_error(error));
        caps.render.render();
    }

    fn settle(result: HttpResult, fallback: &str, model: &mut Model, caps: &Capabilities) -> Option<HttpResponse> {
        match result {
            Ok(response) if response.is_success() => Some(response),
            Ok(response) => {
                Self::reject(&response, fallback, model, caps);
                None
            }
            Err(e) => {
                Self::fail(&e, model, caps);
                None
            }
        }
    }

    fn invalid(error: ValidationError, model: &mut Model, caps: &Capabilities) {
        debug!(error = %error, "input rejected");
        model.set_error(error.into());
        caps.render.render();
    }

    fn require_session(model: &mut Model, caps: &Capabilities) -> bool {
        if model.is_authenticated() {
            return true;
        }
        warn!("action requires a signed-in user");
        model.set_error(AppError::new(ErrorKind::Authentication, "Please sign in to continue"));
        caps.render.render();
        false
    }

    fn require_admin(model: &mut Model, caps: &Capabilities) -> bool {
        if !Self::require_session(model, caps) {
            return false;
        }
        if model.is_admin() {
            return true;
        }
        warn!("admin action refused");
        model.set_error(AppError::new(ErrorKind::Authorization, "Admin access required"));
        caps.render.render();
        false
    }

    fn clear_stored_token(caps: &Capabilities) {
        match KvOperation::delete(crate::capabilities::KeyNamespace::Session, TOKEN_KEY) {
            Ok(op) => caps.execute_kv(op, KvReply::ClearToken),
            Err(e) => error!(error = %e, "token key rejected"),
        }
    }

    fn client(model: &Model) -> ApiClient<'_> {
        ApiClient::from_model(model)
    }
}
