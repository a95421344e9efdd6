use tracing::{info, warn};

use super::App;
use crate::api::{endpoints, RoleChangeRequest};
use crate::capabilities::{Capabilities, HttpReply, HttpResult};
use crate::dashboard::Page;
use crate::model::{ListEnvelope, Model, Role, User, UserId};
use crate::{AppError, ErrorKind, ToastKind};

const CANNOT_DELETE_SELF: &str = "You cannot delete your own account";

impl App {
    pub(super) fn send_users_request(model: &mut Model, caps: &Capabilities) {
        let request = Self::client(model).get(endpoints::USERS);
        Self::dispatch(request, HttpReply::Users, model, caps);
    }

    pub(super) fn handle_users_response(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        let Some(response) = Self::settle(result, "Failed to load users", model, caps) else {
            return;
        };
        match response.json::<ListEnvelope<User>>() {
            Ok(list) => model.users = list.into_vec(),
            Err(e) => model.set_error(Self::parse_error(&response, &e)),
        }
        caps.render.render();
    }

    pub(super) fn promote_user(id: UserId, model: &mut Model, caps: &Capabilities) {
        if !Self::require_admin(model, caps) {
            return;
        }
        let request = Self::client(model).put(&endpoints::promote_user(&id));
        Self::dispatch(request, HttpReply::PromoteUser { id }, model, caps);
        caps.render.render();
    }

    pub(super) fn handle_promote_user_response(
        id: &UserId,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if Self::settle(result, "Failed to promote user", model, caps).is_none() {
            return;
        }
        info!(user_id = %id, "user promoted");
        Self::set_user_role(id, Role::Admin, model, caps);
        model.show_toast("User promoted to admin", ToastKind::Success);
        caps.render.render();
    }

    pub(super) fn change_role(id: UserId, role: Role, model: &mut Model, caps: &Capabilities) {
        if !Self::require_admin(model, caps) {
            return;
        }
        let request = Self::client(model).patch_json(&endpoints::user_role(&id), &RoleChangeRequest { role });
        Self::dispatch(request, HttpReply::RoleChange { id, role }, model, caps);
        caps.render.render();
    }

    pub(super) fn handle_role_change_response(
        id: &UserId,
        role: Role,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if Self::settle(result, "Failed to update role", model, caps).is_none() {
            return;
        }
        info!(user_id = %id, role = role.as_str(), "role changed");
        Self::set_user_role(id, role, model, caps);
        model.show_toast(format!("Role updated to {}", role.as_str()), ToastKind::Success);
        caps.render.render();
    }

    /// Updates the directory entry and, when it is the signed-in user, the
    /// session too. A user who loses admin leaves the admin pages.
    fn set_user_role(id: &UserId, role: Role, model: &mut Model, caps: &Capabilities) {
        if let Some(user) = model.users.iter_mut().find(|u| &u.id == id) {
            user.role = role;
        }
        let Some(user) = model.user.as_mut().filter(|u| &u.id == id) else {
            return;
        };
        user.role = role;
        if model.page.requires_admin() && !model.is_admin() {
            info!(user_id = %id, "own admin role revoked, leaving admin page");
            model.page = Page::Incidents;
            Self::enter_page(model, caps);
        }
    }

    pub(super) fn delete_user(id: UserId, model: &mut Model, caps: &Capabilities) {
        if !Self::require_admin(model, caps) {
            return;
        }
        if model.user_id() == Some(&id) {
            warn!(user_id = %id, "admin tried to delete own account");
            model.set_error(AppError::new(ErrorKind::InvalidState, CANNOT_DELETE_SELF));
            caps.render.render();
            return;
        }
        let request = Self::client(model).delete(&endpoints::user(&id));
        Self::dispatch(request, HttpReply::DeleteUser { id }, model, caps);
        caps.render.render();
    }

    pub(super) fn handle_delete_user_response(
        id: &UserId,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if Self::settle(result, "Failed to delete user", model, caps).is_none() {
            return;
        }
        info!(user_id = %id, "user deleted");
        model.users.retain(|u| &u.id != id);
        model.show_toast("User deleted", ToastKind::Success);
        caps.render.render();
    }
}
