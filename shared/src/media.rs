//! Evidence attachments: client-side checks and per-incident upload
//! bookkeeping. Each file is its own request; nothing is retried.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::MultipartPart;
use crate::model::IncidentId;
use crate::{ToastKind, ValidationError, MAX_MEDIA_BYTES};

pub const UPLOAD_FIELD: &str = "file";

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "heic"];
const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mov", "avi", "webm", "mkv"];

/// A file picked by the user, as handed over by the shell.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub data: Vec<u8>,
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

impl SelectedFile {
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: data.len() as u64,
            data,
        }
    }

    /// Declared MIME type, or one guessed from the extension.
    #[must_use]
    pub fn effective_mime_type(&self) -> String {
        let declared = self.mime_type.trim();
        if !declared.is_empty() && declared != "application/octet-stream" {
            return declared.to_ascii_lowercase();
        }
        let ext = self
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            let subtype = if ext == "jpg" { "jpeg" } else { ext.as_str() };
            format!("image/{subtype}")
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            match ext.as_str() {
                "mov" => "video/quicktime".to_string(),
                "avi" => "video/x-msvideo".to_string(),
                "mkv" => "video/x-matroska".to_string(),
                other => format!("video/{other}"),
            }
        } else {
            declared.to_string()
        }
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size_bytes.max(self.data.len() as u64)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mime = self.effective_mime_type();
        if !(mime.starts_with("image/") || mime.starts_with("video/")) {
            return Err(ValidationError::UnsupportedMediaType {
                file_name: self.name.clone(),
                mime_type: mime,
            });
        }
        if self.size() > MAX_MEDIA_BYTES {
            return Err(ValidationError::FileTooLarge {
                file_name: self.name.clone(),
                size_bytes: self.size(),
                max_mb: MAX_MEDIA_BYTES / (1024 * 1024),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn to_part(&self) -> MultipartPart {
        MultipartPart {
            field: UPLOAD_FIELD.to_string(),
            file_name: self.name.clone(),
            content_type: self.effective_mime_type(),
            data: self.data.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedFile {
    pub name: String,
    pub reason: String,
}

/// Splits a selection into acceptable files and rejections.
#[must_use]
pub fn partition_selection(files: Vec<SelectedFile>) -> (Vec<SelectedFile>, Vec<RejectedFile>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for file in files {
        match file.validate() {
            Ok(()) => accepted.push(file),
            Err(e) => rejected.push(RejectedFile {
                name: file.name,
                reason: e.to_string(),
            }),
        }
    }
    (accepted, rejected)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpload {
    pub file_name: String,
    pub message: String,
}

/// Uploads in flight for one incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBatch {
    pub incident_id: IncidentId,
    pub pending: Vec<String>,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedUpload>,
}

impl UploadBatch {
    #[must_use]
    pub fn new(incident_id: IncidentId, file_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            incident_id,
            pending: file_names.into_iter().collect(),
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Adds more files to a batch that is still running.
    pub fn extend(&mut self, file_names: impl IntoIterator<Item = String>) {
        self.pending.extend(file_names);
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.pending.len() + self.succeeded.len() + self.failed.len()
    }

    fn take_pending(&mut self, file_name: &str) -> bool {
        match self.pending.iter().position(|n| n == file_name) {
            Some(pos) => {
                self.pending.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Returns false when the file was not part of this batch.
    pub fn record_success(&mut self, file_name: &str) -> bool {
        if !self.take_pending(file_name) {
            return false;
        }
        self.succeeded.push(file_name.to_string());
        true
    }

    pub fn record_failure(&mut self, file_name: &str, message: impl Into<String>) -> bool {
        if !self.take_pending(file_name) {
            return false;
        }
        self.failed.push(FailedUpload {
            file_name: file_name.to_string(),
            message: message.into(),
        });
        true
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!("Uploaded {} of {} file(s)", self.succeeded.len(), self.total())
    }

    #[must_use]
    pub fn toast_kind(&self) -> ToastKind {
        match (self.succeeded.is_empty(), self.failed.is_empty()) {
            (_, true) => ToastKind::Success,
            (true, false) => ToastKind::Error,
            (false, false) => ToastKind::Warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str, len: usize) -> SelectedFile {
        SelectedFile::new(name, mime, vec![0u8; len])
    }

    #[test]
    fn test_accepts_images_and_videos() {
        assert!(file("crash.jpg", "image/jpeg", 10).validate().is_ok());
        assert!(file("clip.mov", "video/quicktime", 10).validate().is_ok());
        assert!(file("scan.png", "", 10).validate().is_ok());
        assert!(matches!(
            file("notes.pdf", "application/pdf", 10).validate(),
            Err(ValidationError::UnsupportedMediaType { .. })
        ));
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let mut at_limit = file("a.jpg", "image/jpeg", 0);
        at_limit.size_bytes = MAX_MEDIA_BYTES;
        assert!(at_limit.validate().is_ok());

        let mut over = file("b.jpg", "image/jpeg", 0);
        over.size_bytes = MAX_MEDIA_BYTES + 1;
        let err = over.validate().unwrap_err();
        assert_eq!(err.to_string(), "b.jpg: file is larger than 10 MB");
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(file("x.JPG", "", 1).effective_mime_type(), "image/jpeg");
        assert_eq!(
            file("x.mov", "application/octet-stream", 1).effective_mime_type(),
            "video/quicktime"
        );
        assert_eq!(file("x.txt", "", 1).effective_mime_type(), "");
    }

    #[test]
    fn test_partition_keeps_valid_files() {
        let (accepted, rejected) = partition_selection(vec![
            file("a.jpg", "image/jpeg", 5),
            file("b.exe", "application/x-msdownload", 5),
            file("c.mp4", "video/mp4", 5),
        ]);
        assert_eq!(accepted.len(), 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].name, "b.exe");
    }

    #[test]
    fn test_part_uses_file_field() {
        let part = file("a.png", "image/png", 3).to_part();
        assert_eq!(part.field, "file");
        assert_eq!(part.data.len(), 3);
    }

    #[test]
    fn test_debug_omits_bytes() {
        let debug = format!("{:?}", file("a.png", "image/png", 4));
        assert!(debug.contains("a.png"));
        assert!(!debug.contains("[0, 0, 0, 0]"));
    }

    #[test]
    fn test_batch_summary() {
        let mut batch = UploadBatch::new(
            IncidentId::new("9"),
            vec!["a.jpg".to_string(), "b.jpg".to_string(), "c.mp4".to_string()],
        );
        assert!(batch.record_success("a.jpg"));
        assert!(batch.record_failure("b.jpg", "File type not allowed"));
        assert!(!batch.record_success("zzz.jpg"));
        assert!(!batch.is_settled());
        assert!(batch.record_success("c.mp4"));
        assert!(batch.is_settled());
        assert_eq!(batch.summary(), "Uploaded 2 of 3 file(s)");
        assert_eq!(batch.toast_kind(), ToastKind::Warning);
    }

    #[test]
    fn test_duplicate_names_tracked_separately() {
        let mut batch = UploadBatch::new(
            IncidentId::new("1"),
            vec!["photo.jpg".to_string(), "photo.jpg".to_string()],
        );
        assert!(batch.record_success("photo.jpg"));
        assert!(!batch.is_settled());
        assert!(batch.record_failure("photo.jpg", "boom"));
        assert!(batch.is_settled());
        assert_eq!(batch.toast_kind(), ToastKind::Warning);
    }
}
