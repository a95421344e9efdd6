use tracing::{debug, info, warn};

use super::App;
use crate::api::{
    endpoints, CommentRequest, CreateIncidentResponse, IncidentDraft, IncidentScope, IncidentUpdate,
    StatusUpdateRequest,
};
use crate::capabilities::{Capabilities, HttpReply, HttpResult};
use crate::dashboard::Page;
use crate::map;
use crate::model::{Comment, Incident, IncidentId, IncidentStatus, ItemEnvelope, ListEnvelope, Model};
use crate::workflow::{self, STATUS_UPDATE_FAILED, STATUS_UPDATE_OFFLINE};
use crate::{AppError, ErrorKind, ToastKind, ValidationError};

const DELETE_FAILED: &str = "Failed to delete report. Please try again.";

impl App {
    pub(super) fn send_incidents_request(model: &mut Model, caps: &Capabilities) {
        let scope = if model.is_admin() {
            IncidentScope::All
        } else {
            IncidentScope::Mine
        };
        model.incidents_loading = true;
        let request = Self::client(model).get(scope.path());
        if !Self::dispatch(request, HttpReply::Incidents { scope }, model, caps) {
            model.incidents_loading = false;
        }
    }

    pub(super) fn handle_incidents_response(
        scope: IncidentScope,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        model.incidents_loading = false;
        let Some(response) = Self::settle(result, "Failed to load incidents", model, caps) else {
            return;
        };
        match response.json::<ListEnvelope<Incident>>() {
            Ok(list) => {
                model.incidents = list.into_vec();
                debug!(scope = ?scope, count = model.incidents.len(), "incidents loaded");
                Self::refresh_map(model);
            }
            Err(e) => model.set_error(Self::parse_error(&response, &e)),
        }
        caps.render.render();
    }

    fn refresh_map(model: &mut Model) {
        model.map_markers = map::refresh_markers(&model.map_markers, &model.incidents, &mut model.rng);
    }

    // --- Detail ---

    pub(super) fn select_incident(id: IncidentId, model: &mut Model, caps: &Capabilities) {
        if !Self::require_session(model, caps) {
            return;
        }
        model.close_detail();
        model.incident_detail = model.incidents.iter().find(|i| i.id == id).cloned();
        model.selected_incident = Some(id.clone());
        model.detail_loading = true;
        model.page = Page::IncidentDetail;

        let detail = Self::client(model).get(&endpoints::incident(&id));
        Self::dispatch(detail, HttpReply::IncidentDetail { id: id.clone() }, model, caps);
        let comments = Self::client(model).get(&endpoints::comments(&id));
        Self::dispatch(comments, HttpReply::Comments { id }, model, caps);
        caps.render.render();
    }

    pub(super) fn handle_incident_detail_response(
        id: &IncidentId,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if !model.is_selected(id) {
            debug!(incident_id = %id, "dropping detail for deselected incident");
            return;
        }
        model.detail_loading = false;
        let Some(response) = Self::settle(result, "Failed to load incident details", model, caps) else {
            return;
        };
        match response.json::<ItemEnvelope<Incident>>() {
            Ok(envelope) => {
                let incident = envelope.into_inner();
                if let Some(slot) = model.incidents.iter_mut().find(|i| i.id == incident.id) {
                    *slot = incident.clone();
                }
                model.incident_detail = Some(incident);
            }
            Err(e) => model.set_error(Self::parse_error(&response, &e)),
        }
        caps.render.render();
    }

    pub(super) fn handle_comments_response(
        id: &IncidentId,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if !model.is_selected(id) {
            debug!(incident_id = %id, "dropping comments for deselected incident");
            return;
        }
        match result {
            Ok(response) if response.is_success() => match response.json::<ListEnvelope<Comment>>() {
                Ok(list) => model.comments = list.into_vec(),
                Err(e) => warn!(incident_id = %id, error = %e, "comments unreadable"),
            },
            Ok(response) => {
                if Self::session_expired(&response, model, caps) {
                    return;
                }
                warn!(incident_id = %id, status = response.status(), "comments unavailable");
            }
            Err(e) => warn!(incident_id = %id, error = %e, "comments request failed"),
        }
        caps.render.render();
    }

    // --- Create / edit / delete ---

    pub(super) fn submit_report(draft: &IncidentDraft, model: &mut Model, caps: &Capabilities) {
        if !Self::require_session(model, caps) {
            return;
        }
        if model.is_submitting {
            debug!("report already submitting");
            return;
        }
        if let Err(e) = draft.validate() {
            Self::invalid(e, model, caps);
            return;
        }
        model.clear_error();
        model.is_submitting = true;
        let request = Self::client(model).post_json(endpoints::INCIDENTS, &draft.normalized());
        if !Self::dispatch(request, HttpReply::CreateIncident, model, caps) {
            model.is_submitting = false;
        }
        caps.render.render();
    }

    pub(super) fn handle_create_incident_response(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        model.is_submitting = false;
        let Some(response) = Self::settle(result, "Failed to submit report", model, caps) else {
            return;
        };
        let created = response
            .json::<CreateIncidentResponse>()
            .unwrap_or_else(|e| {
                warn!(error = %e, "create response unreadable");
                CreateIncidentResponse::default()
            });

        let staged = std::mem::take(&mut model.staged_media);
        model.rejected_media.clear();
        match created.new_id() {
            Some(id) => {
                info!(incident_id = %id, attachments = staged.len(), "incident created");
                // An upload batch that settles at once replaces this toast with its summary.
                model.show_toast(
                    created
                        .msg
                        .clone()
                        .unwrap_or_else(|| "Incident reported successfully".to_string()),
                    ToastKind::Success,
                );
                if !staged.is_empty() {
                    Self::start_uploads(id.clone(), staged, model, caps);
                }
            }
            None if !staged.is_empty() => {
                warn!(dropped = staged.len(), "no incident id in create response, attachments dropped");
                model.show_toast(
                    "Report submitted, but attachments could not be uploaded",
                    ToastKind::Warning,
                );
            }
            None => model.show_toast("Incident reported successfully", ToastKind::Success),
        }

        model.close_detail();
        model.page = Page::Incidents;
        Self::send_incidents_request(model, caps);
        caps.render.render();
    }

    pub(super) fn edit_incident(id: IncidentId, changes: IncidentUpdate, model: &mut Model, caps: &Capabilities) {
        if !Self::require_session(model, caps) {
            return;
        }
        if changes.is_empty() {
            debug!(incident_id = %id, "edit without changes ignored");
            return;
        }
        if let Err(e) = changes.validate() {
            Self::invalid(e, model, caps);
            return;
        }
        model.clear_error();
        let request = Self::client(model).put_json(&endpoints::incident(&id), &changes);
        Self::dispatch(request, HttpReply::UpdateIncident { id, changes }, model, caps);
        caps.render.render();
    }

    pub(super) fn handle_update_incident_response(
        id: &IncidentId,
        changes: &IncidentUpdate,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if Self::settle(result, "Failed to update incident", model, caps).is_none() {
            return;
        }
        if !model.patch_incident(id, |incident| incident.apply_update(changes)) {
            debug!(incident_id = %id, "updated incident not in local state");
        }
        Self::refresh_map(model);
        model.show_toast("Incident updated successfully", ToastKind::Success);
        caps.render.render();
    }

    pub(super) fn delete_incident(id: IncidentId, model: &mut Model, caps: &Capabilities) {
        if !Self::require_session(model, caps) {
            return;
        }
        let request = Self::client(model).delete(&endpoints::incident(&id));
        Self::dispatch(request, HttpReply::DeleteIncident { id }, model, caps);
        caps.render.render();
    }

    pub(super) fn handle_delete_incident_response(
        id: &IncidentId,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        match result {
            Ok(response) if response.is_success() => {
                info!(incident_id = %id, "incident deleted");
                model.remove_incident(id);
                if model.page == Page::IncidentDetail && model.selected_incident.is_none() {
                    model.page = Page::Incidents;
                }
                model.show_toast("Report deleted", ToastKind::Success);
            }
            Ok(response) => {
                if Self::session_expired(&response, model, caps) {
                    return;
                }
                warn!(incident_id = %id, status = response.status(), "delete rejected");
                model.set_error(
                    AppError::new(ErrorKind::from_status(response.status()), DELETE_FAILED)
                        .with_context("incident_id", id.to_string()),
                );
            }
            Err(e) => Self::fail(&e, model, caps),
        }
        caps.render.render();
    }

    // --- Comments ---

    pub(super) fn submit_comment(id: IncidentId, text: &str, model: &mut Model, caps: &Capabilities) {
        if !Self::require_session(model, caps) {
            return;
        }
        let text = text.trim();
        if text.is_empty() {
            Self::invalid(ValidationError::MissingField { field: "Comment" }, model, caps);
            return;
        }
        let request = Self::client(model).post_json(&endpoints::comments(&id), &CommentRequest { text });
        Self::dispatch(request, HttpReply::Comment { id }, model, caps);
        caps.render.render();
    }

    pub(super) fn handle_comment_response(
        id: &IncidentId,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let Some(response) = Self::settle(result, "Failed to post comment", model, caps) else {
            return;
        };
        if !model.is_selected(id) {
            return;
        }
        match response.json::<ItemEnvelope<Comment>>() {
            Ok(envelope) => model.comments.push(envelope.into_inner()),
            Err(e) => {
                debug!(error = %e, "comment echo unreadable, reloading comments");
                let request = Self::client(model).get(&endpoints::comments(id));
                Self::dispatch(request, HttpReply::Comments { id: id.clone() }, model, caps);
            }
        }
        caps.render.render();
    }

    // --- Status workflow ---

    pub(super) fn change_status(
        id: IncidentId,
        status: IncidentStatus,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if !Self::require_admin(model, caps) {
            return;
        }
        let body = StatusUpdateRequest {
            status: status.as_str(),
        };
        let request = Self::client(model).patch_json(&endpoints::incident_status(&id), &body);
        Self::dispatch(request, HttpReply::StatusChange { id, status }, model, caps);
        caps.render.render();
    }

    pub(super) fn handle_status_change_response(
        id: &IncidentId,
        status: IncidentStatus,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        match result {
            Ok(response) if response.is_success() => {
                info!(incident_id = %id, status = status.as_str(), "status changed");
                model.patch_incident(id, |incident| incident.status = status);
                Self::refresh_map(model);
                model.show_toast(
                    format!("Status updated to {}", workflow::label(status)),
                    ToastKind::Success,
                );
                if workflow::awards_points(status) {
                    Self::send_award_points_request(id.clone(), model, caps);
                }
            }
            Ok(response) => {
                if Self::session_expired(&response, model, caps) {
                    return;
                }
                warn!(incident_id = %id, status = response.status(), "status change rejected");
                model.set_error(AppError::new(
                    ErrorKind::from_status(response.status()),
                    STATUS_UPDATE_FAILED,
                ));
            }
            Err(e) => {
                warn!(incident_id = %id, error = %e, "status change failed");
                model.show_toast(STATUS_UPDATE_OFFLINE, ToastKind::Error);
            }
        }
        caps.render.render();
    }

    pub(super) fn send_award_points_request(id: IncidentId, model: &mut Model, caps: &Capabilities) {
        let request = Self::client(model).patch(&endpoints::award_points(&id));
        Self::dispatch(request, HttpReply::AwardPoints { id }, model, caps);
    }

    pub(super) fn handle_award_points_response(
        id: &IncidentId,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let Some(response) = Self::settle(result, "Failed to award points", model, caps) else {
            return;
        };
        info!(incident_id = %id, "points awarded");
        model.show_toast(
            response
                .server_message()
                .unwrap_or_else(|| "Points awarded to reporter".to_string()),
            ToastKind::Success,
        );
        caps.render.render();
    }
}
