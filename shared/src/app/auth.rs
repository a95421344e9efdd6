use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use super::{App, TOKEN_KEY};
use crate::api::{
    endpoints, validate_login, validate_new_password, validate_password_change, validate_signup,
    ChangePasswordRequest, CurrentUserResponse, ForgotPasswordRequest, LoginRequest, LoginResponse,
    ResetPasswordRequest, SignupRequest,
};
use crate::capabilities::{
    Capabilities, HttpReply, HttpResult, KeyNamespace, KvOperation, KvOutput, KvReply, KvResult,
};
use crate::dashboard::Page;
use crate::model::{AppState, AuthScreen, Model};
use crate::{ToastKind, ValidationError};

const SIGNUP_SUCCEEDED: &str = "User registered successfully";
const RESET_LINK_SENT: &str = "If an account exists for that email, a reset link has been sent.";
const PASSWORD_RESET: &str = "Password reset successfully. Please sign in.";
const PASSWORD_CHANGED: &str = "Password changed successfully";

impl App {
    pub(super) fn handle_stored_token(result: KvResult, model: &mut Model, caps: &Capabilities) {
        let token = match result {
            Ok(KvOutput::Value { value: Some(value) }) => String::from_utf8(value.data().to_vec())
                .ok()
                .filter(|t| !t.trim().is_empty()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "stored token unreadable");
                None
            }
        };

        match token {
            Some(token) => {
                debug!("validating stored session");
                model.token = Some(SecretString::new(token));
                let request = Self::client(model).get(endpoints::ME);
                if !Self::dispatch(request, HttpReply::CurrentUser, model, caps) {
                    model.clear_session();
                }
            }
            None => model.state = AppState::Unauthenticated,
        }
        caps.render.render();
    }

    pub(super) fn handle_current_user_response(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        let user = match result {
            Ok(response) if response.is_success() => match response.json::<CurrentUserResponse>() {
                Ok(body) => Some(body.into_user()),
                Err(e) => {
                    warn!(error = %e, "current user response unreadable");
                    None
                }
            },
            Ok(response) => {
                info!(status = response.status(), "stored session rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "could not validate stored session");
                None
            }
        };

        match user {
            Some(user) => {
                info!(user_id = %user.id, role = user.role.as_str(), "session restored");
                model.user = Some(user);
                Self::enter_dashboard(model, caps);
            }
            None => {
                model.clear_session();
                Self::clear_stored_token(caps);
            }
        }
        caps.render.render();
    }

    pub(super) fn login(email: &str, password: &SecretString, model: &mut Model, caps: &Capabilities) {
        if let Err(e) = validate_login(email, password) {
            Self::invalid(e, model, caps);
            return;
        }
        model.clear_error();
        model.auth_notice = None;
        model.state = AppState::Authenticating;

        let body = LoginRequest {
            email: email.trim(),
            password: password.expose_secret(),
        };
        let request = Self::client(model).post_json(endpoints::LOGIN, &body);
        if !Self::dispatch(request, HttpReply::Login, model, caps) {
            model.state = AppState::Unauthenticated;
        }
        caps.render.render();
    }

    pub(super) fn handle_login_response(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        model.state = AppState::Unauthenticated;
        let Some(response) = Self::settle(result, "Login failed", model, caps) else {
            return;
        };

        match response.json::<LoginResponse>() {
            Ok(login) => {
                let persist = KvOperation::set(
                    KeyNamespace::Session,
                    TOKEN_KEY,
                    login.access_token.expose_secret().as_bytes().to_vec(),
                );
                match persist {
                    Ok(op) => caps.execute_kv(op, KvReply::PersistToken),
                    Err(e) => warn!(error = %e, "token not persisted"),
                }
                info!(user_id = %login.user.id, role = login.user.role.as_str(), "signed in");
                model.token = Some(login.access_token);
                model.user = Some(login.user);
                model.auth_notice = None;
                Self::enter_dashboard(model, caps);
            }
            Err(e) => model.set_error(Self::parse_error(&response, &e)),
        }
        caps.render.render();
    }

    fn enter_dashboard(model: &mut Model, caps: &Capabilities) {
        model.state = AppState::Ready;
        model.page = Page::Incidents;
        model.clear_error();
        Self::enter_page(model, caps);
    }

    pub(super) fn signup(
        name: String,
        email: String,
        phone: Option<String>,
        password: &SecretString,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if let Err(e) = validate_signup(&name, &email, password) {
            Self::invalid(e, model, caps);
            return;
        }
        model.clear_error();
        model.is_loading = true;

        let body = SignupRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            phone: phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            password: password.expose_secret().clone(),
        };
        let request = Self::client(model).post_json(endpoints::SIGNUP, &body);
        if !Self::dispatch(request, HttpReply::Signup, model, caps) {
            model.is_loading = false;
        }
        caps.render.render();
    }

    pub(super) fn handle_signup_response(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        model.is_loading = false;
        let Some(response) = Self::settle(result, "Registration failed", model, caps) else {
            return;
        };
        let message = response
            .server_message()
            .unwrap_or_else(|| SIGNUP_SUCCEEDED.to_string());
        model.auth_screen = AuthScreen::Login;
        model.auth_notice = Some(message.clone());
        model.show_toast(message, ToastKind::Success);
        caps.render.render();
    }

    pub(super) fn forgot_password(email: &str, model: &mut Model, caps: &Capabilities) {
        let email = email.trim();
        if email.is_empty() {
            Self::invalid(ValidationError::MissingField { field: "Email" }, model, caps);
            return;
        }
        if !crate::api::is_plausible_email(email) {
            Self::invalid(ValidationError::InvalidEmail, model, caps);
            return;
        }
        model.clear_error();
        model.is_loading = true;
        let request = Self::client(model).post_json(endpoints::FORGOT_PASSWORD, &ForgotPasswordRequest { email });
        if !Self::dispatch(request, HttpReply::ForgotPassword, model, caps) {
            model.is_loading = false;
        }
        caps.render.render();
    }

    pub(super) fn handle_forgot_password_response(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        model.is_loading = false;
        let Some(response) = Self::settle(result, "Failed to send reset email", model, caps) else {
            return;
        };
        model.auth_notice = Some(
            response
                .server_message()
                .unwrap_or_else(|| RESET_LINK_SENT.to_string()),
        );
        caps.render.render();
    }

    pub(super) fn reset_password(
        token: &str,
        new_password: &SecretString,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let token = token.trim();
        if token.is_empty() {
            Self::invalid(ValidationError::MissingField { field: "Reset token" }, model, caps);
            return;
        }
        if let Err(e) = validate_new_password(new_password.expose_secret()) {
            Self::invalid(e, model, caps);
            return;
        }
        model.clear_error();
        model.is_loading = true;
        let body = ResetPasswordRequest {
            new_password: new_password.expose_secret(),
        };
        let request = Self::client(model).post_json(&endpoints::reset_password(token), &body);
        if !Self::dispatch(request, HttpReply::ResetPassword, model, caps) {
            model.is_loading = false;
        }
        caps.render.render();
    }

    pub(super) fn handle_reset_password_response(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        model.is_loading = false;
        let Some(response) = Self::settle(result, "Failed to reset password", model, caps) else {
            return;
        };
        model.auth_screen = AuthScreen::Login;
        model.auth_notice = Some(
            response
                .server_message()
                .unwrap_or_else(|| PASSWORD_RESET.to_string()),
        );
        caps.render.render();
    }

    pub(super) fn change_password(
        current: &SecretString,
        new: &SecretString,
        confirm: &SecretString,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if !Self::require_session(model, caps) {
            return;
        }
        if let Err(e) = validate_password_change(current, new, confirm) {
            Self::invalid(e, model, caps);
            return;
        }
        model.clear_error();
        model.is_loading = true;
        let body = ChangePasswordRequest {
            current_password: current.expose_secret().clone(),
            new_password: new.expose_secret().clone(),
            confirm_new_password: confirm.expose_secret().clone(),
        };
        let request = Self::client(model).put_json(endpoints::CHANGE_PASSWORD, &body);
        if !Self::dispatch(request, HttpReply::ChangePassword, model, caps) {
            model.is_loading = false;
        }
        caps.render.render();
    }

    pub(super) fn handle_change_password_response(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        model.is_loading = false;
        let Some(response) = Self::settle(result, "Failed to change password", model, caps) else {
            return;
        };
        let message = response
            .server_message()
            .unwrap_or_else(|| PASSWORD_CHANGED.to_string());
        model.show_toast(message, ToastKind::Success);
        caps.render.render();
    }

    pub(super) fn logout(model: &mut Model, caps: &Capabilities) {
        info!(user_id = ?model.user_id().map(ToString::to_string), "signing out");
        model.clear_session();
        model.auth_notice = None;
        model.clear_error();
        model.clear_toast();
        Self::clear_stored_token(caps);
        caps.render.render();
    }
}
