use tracing::{debug, info, warn};

use super::App;
use crate::api::{endpoints, MediaUploadResponse};
use crate::capabilities::{Capabilities, HttpReply, HttpResult};
use crate::media::{partition_selection, SelectedFile, UploadBatch};
use crate::model::{IncidentId, ListEnvelope, MediaId, MediaItem, Model};
use crate::ToastKind;

const UPLOAD_FAILED: &str = "Failed to upload media";
const UPLOAD_OFFLINE: &str = "Network error. Please try again.";

impl App {
    pub(super) fn select_media(files: Vec<SelectedFile>, model: &mut Model, caps: &Capabilities) {
        let (accepted, rejected) = partition_selection(files);
        for file in &rejected {
            debug!(file = %file.name, reason = %file.reason, "attachment rejected");
        }
        model.staged_media.extend(accepted);
        model.rejected_media = rejected;
        caps.render.render();
    }

    /// Sends the staged files to an incident that was reported earlier.
    pub(super) fn upload_to_incident(incident_id: IncidentId, model: &mut Model, caps: &Capabilities) {
        if !Self::require_session(model, caps) {
            return;
        }
        if model.staged_media.is_empty() {
            debug!(incident_id = %incident_id, "nothing staged to upload");
            return;
        }
        let files = std::mem::take(&mut model.staged_media);
        model.rejected_media.clear();
        info!(incident_id = %incident_id, attachments = files.len(), "uploading to existing incident");
        Self::start_uploads(incident_id, files, model, caps);
        caps.render.render();
    }

    /// One request per file; a batch per incident collects the outcomes.
    pub(super) fn start_uploads(
        incident_id: IncidentId,
        files: Vec<SelectedFile>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        model
            .upload_batches
            .entry(incident_id.clone())
            .and_modify(|batch| batch.extend(names.clone()))
            .or_insert_with(|| UploadBatch::new(incident_id.clone(), names));

        let path = endpoints::media_upload(&incident_id);
        for file in files {
            let request = Self::client(model).upload(&path, file.to_part());
            match request {
                Ok(request) => {
                    debug!(
                        incident_id = %incident_id,
                        file = %file.name,
                        bytes = file.size(),
                        "uploading attachment"
                    );
                    caps.send_http(
                        request,
                        HttpReply::MediaUpload {
                            incident_id: incident_id.clone(),
                            file_name: file.name,
                        },
                    );
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "upload request could not be built");
                    if let Some(batch) = model.upload_batches.get_mut(&incident_id) {
                        batch.record_failure(&file.name, e.to_string());
                    }
                }
            }
        }
        Self::finish_batch_if_settled(&incident_id, model, caps);
    }

    pub(super) fn handle_media_upload_response(
        incident_id: &IncidentId,
        file_name: &str,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let outcome = match result {
            Ok(response) if response.is_success() => {
                if let Ok(uploaded) = response.json::<MediaUploadResponse>() {
                    debug!(
                        file = file_name,
                        media_id = ?uploaded.media_id.as_ref().map(ToString::to_string),
                        "attachment stored"
                    );
                }
                Ok(())
            }
            Ok(response) => {
                if Self::session_expired(&response, model, caps) {
                    return;
                }
                Err(response
                    .server_message()
                    .unwrap_or_else(|| UPLOAD_FAILED.to_string()))
            }
            Err(e) => {
                warn!(file = file_name, error = %e, "upload failed");
                Err(UPLOAD_OFFLINE.to_string())
            }
        };

        let Some(batch) = model.upload_batches.get_mut(incident_id) else {
            warn!(incident_id = %incident_id, file = file_name, "upload result without a batch");
            return;
        };
        let recorded = match outcome {
            Ok(()) => batch.record_success(file_name),
            Err(message) => batch.record_failure(file_name, message),
        };
        if !recorded {
            warn!(incident_id = %incident_id, file = file_name, "upload result for unknown file");
        }
        Self::finish_batch_if_settled(incident_id, model, caps);
        caps.render.render();
    }

    fn finish_batch_if_settled(incident_id: &IncidentId, model: &mut Model, caps: &Capabilities) {
        let settled = model
            .upload_batches
            .get(incident_id)
            .is_some_and(UploadBatch::is_settled);
        if !settled {
            return;
        }
        let Some(batch) = model.upload_batches.remove(incident_id) else {
            return;
        };
        info!(
            incident_id = %incident_id,
            succeeded = batch.succeeded.len(),
            failed = batch.failed.len(),
            "uploads settled"
        );
        model.show_toast(batch.summary(), batch.toast_kind());
        if model.is_selected(incident_id) {
            Self::send_media_list_request(incident_id, model, caps);
        }
        caps.render.render();
    }

    pub(super) fn send_media_list_request(incident_id: &IncidentId, model: &mut Model, caps: &Capabilities) {
        let request = Self::client(model).get(&endpoints::incident_media(incident_id));
        Self::dispatch(
            request,
            HttpReply::MediaList {
                incident_id: incident_id.clone(),
            },
            model,
            caps,
        );
    }

    pub(super) fn handle_media_list_response(
        incident_id: &IncidentId,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if !model.is_selected(incident_id) {
            debug!(incident_id = %incident_id, "dropping media list for deselected incident");
            return;
        }
        let Some(response) = Self::settle(result, "Failed to load media", model, caps) else {
            return;
        };
        match response.json::<ListEnvelope<MediaItem>>() {
            Ok(list) => {
                let media = list.into_vec();
                model.patch_incident(incident_id, |incident| incident.media.clone_from(&media));
            }
            Err(e) => model.set_error(Self::parse_error(&response, &e)),
        }
        caps.render.render();
    }

    pub(super) fn delete_media(
        incident_id: IncidentId,
        media_id: MediaId,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if !Self::require_session(model, caps) {
            return;
        }
        let request = Self::client(model).delete(&endpoints::media(&media_id));
        Self::dispatch(
            request,
            HttpReply::MediaDelete {
                incident_id,
                media_id,
            },
            model,
            caps,
        );
        caps.render.render();
    }

    pub(super) fn handle_media_delete_response(
        incident_id: &IncidentId,
        media_id: &MediaId,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if Self::settle(result, "Failed to delete media", model, caps).is_none() {
            return;
        }
        model.patch_incident(incident_id, |incident| {
            incident.media.retain(|m| m.id.as_ref() != Some(media_id));
        });
        model.show_toast("Media deleted", ToastKind::Success);
        caps.render.render();
    }
}
