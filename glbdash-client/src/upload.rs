//! Upload validation and submission
//!
//! A file is checked against the accepted extensions (or the GLB MIME type)
//! and the size limit before anything is sent. The draft then tracks a busy
//! flag so that at most one submission is in flight at a time.

use std::collections::BTreeMap;
use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use strum::{Display, IntoStaticStr};

use glbdash_core::{
    Category, DashboardConfig, Error, ModelRecord, Result, BYTES_PER_MB, GLB_MIME_TYPE,
};

use crate::http::{ApiClient, ApiEnvelope, ApiRequest};

/// A file chosen for upload
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    /// MIME type as declared by whoever picked the file
    pub mime: Option<String>,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk; `.glb` files are declared as `model/gltf-binary`.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a file path: {}", path.display()),
            )))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let mut file = Self::new(name, None, bytes);
        if file.extension().as_deref() == Some(".glb") {
            file.mime = Some(GLB_MIME_TYPE.to_string());
        }
        Ok(file)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased extension including the dot, e.g. `".glb"`
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        Some(format!(".{}", ext.to_lowercase()))
    }

    /// Model name suggested by the file name
    pub fn suggested_name(&self) -> String {
        self.name.replacen(".glb", "", 1)
    }
}

/// Accepted extensions and size limit
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub accepted_extensions: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}

impl UploadPolicy {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            accepted_extensions: config
                .accepted_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            max_bytes: config.max_upload_bytes,
        }
    }

    pub fn max_mb(&self) -> f64 {
        self.max_bytes as f64 / BYTES_PER_MB as f64
    }

    /// Check type first, then size.
    pub fn validate(&self, file: &SelectedFile) -> Result<()> {
        let extension_ok = file
            .extension()
            .is_some_and(|ext| self.accepted_extensions.iter().any(|a| *a == ext));
        let mime_ok = file.mime.as_deref() == Some(GLB_MIME_TYPE);
        if !extension_ok && !mime_ok {
            return Err(Error::InvalidFileType {
                file_name: file.name.clone(),
            });
        }

        if file.size() > self.max_bytes {
            return Err(Error::FileTooLarge {
                size: file.size(),
                max_mb: self.max_mb(),
            });
        }
        Ok(())
    }
}

/// Form fields that can carry a validation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum DraftField {
    File,
    Name,
}

/// Upload form state, alive while the upload form is open
#[derive(Debug, Clone, Default)]
pub struct UploadDraft {
    file: Option<SelectedFile>,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub tags_text: String,
    errors: BTreeMap<DraftField, String>,
    busy: bool,
}

impl UploadDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn errors(&self) -> &BTreeMap<DraftField, String> {
        &self.errors
    }

    pub fn error(&self, field: DraftField) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether the submit action should be enabled
    pub fn can_submit(&self) -> bool {
        !self.busy && self.file.is_some()
    }

    /// Tags typed as comma-separated text
    pub fn tags(&self) -> Vec<String> {
        self.tags_text
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Validate and take `file`; fills an empty name from the file name.
    ///
    /// On failure the message is recorded under [`DraftField::File`] and the
    /// current file is kept.
    pub fn select_file(&mut self, file: SelectedFile, policy: &UploadPolicy) -> Result<()> {
        self.errors.clear();

        if let Err(e) = policy.validate(&file) {
            tracing::debug!(file = %file.name, error = %e, "file rejected");
            self.errors.insert(DraftField::File, e.to_string());
            return Err(e);
        }

        if self.name.is_empty() {
            self.name = file.suggested_name();
        }
        tracing::debug!(file = %file.name, size = file.size(), "file selected");
        self.file = Some(file);
        Ok(())
    }

    pub fn remove_file(&mut self) {
        self.file = None;
    }

    /// Mark the draft busy and hand out the request to send.
    ///
    /// Returns `None` while another submission is in flight, or when a
    /// required field is missing (recorded as a field error).
    pub fn begin_submit(&mut self) -> Option<PendingUpload> {
        if self.busy {
            tracing::debug!("upload already in flight, ignoring submit");
            return None;
        }
        let Some(file) = self.file.clone() else {
            self.errors
                .insert(DraftField::File, "Please select a GLB file to upload.".to_string());
            return None;
        };
        if self.name.trim().is_empty() {
            self.errors
                .insert(DraftField::Name, "Model name is required.".to_string());
            return None;
        }

        self.busy = true;
        Some(PendingUpload {
            file,
            name: self.name.clone(),
            description: self.description.clone(),
        })
    }

    /// Clear the busy flag; form state is kept either way.
    pub fn finish_submit(&mut self, result: &Result<UploadReceipt>) {
        self.busy = false;
        if let Err(e) = result {
            tracing::warn!(error = %e, "upload failed");
        }
    }

    /// Submit and wait for the backend. `Ok(None)` means nothing was sent.
    pub async fn submit(&mut self, client: &ApiClient) -> Result<Option<UploadReceipt>> {
        let Some(pending) = self.begin_submit() else {
            return Ok(None);
        };
        let result = pending.send(client).await;
        self.finish_submit(&result);
        result.map(Some)
    }
}

/// A submission handed out by [`UploadDraft::begin_submit`]
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub file: SelectedFile,
    pub name: String,
    pub description: String,
}

impl PendingUpload {
    fn form(&self) -> Result<Form> {
        let mime = self.file.mime.as_deref().unwrap_or(GLB_MIME_TYPE);
        let part = Part::bytes(self.file.bytes.to_vec())
            .file_name(self.file.name.clone())
            .mime_str(mime)
            .map_err(|e| Error::network(format!("invalid MIME type {:?}: {}", mime, e)))?;
        Ok(Form::new()
            .part("model", part)
            .text("name", self.name.clone())
            .text("description", self.description.clone()))
    }

    /// POST the multipart body to `/upload`
    pub async fn send(self, client: &ApiClient) -> Result<UploadReceipt> {
        let request = ApiRequest::post("/upload").multipart(self.form()?);
        let envelope: ApiEnvelope<ModelRecord> = client.request(request).await?;
        let record = envelope.into_result("Upload failed")?;
        tracing::info!(name = %self.name, size = self.file.size(), "model uploaded");
        Ok(UploadReceipt { record })
    }
}

/// Successful upload; the backend may echo the stored record
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub record: Option<ModelRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glb(name: &str, size: usize) -> SelectedFile {
        SelectedFile::new(name, Some(GLB_MIME_TYPE.to_string()), vec![0u8; size])
    }

    fn policy_mb(max_mb: u64) -> UploadPolicy {
        UploadPolicy {
            accepted_extensions: vec![".glb".to_string()],
            max_bytes: max_mb * BYTES_PER_MB,
        }
    }

    #[test]
    fn test_chair_glb_is_accepted_and_names_the_draft() {
        let mut draft = UploadDraft::new();
        let file = glb("chair.glb", (2.1 * BYTES_PER_MB as f64) as usize);
        draft.select_file(file, &policy_mb(100)).unwrap();

        assert_eq!(draft.name, "chair");
        assert!(draft.errors().is_empty());
        assert!(draft.can_submit());
    }

    #[test]
    fn test_obj_file_is_invalid_type() {
        let mut draft = UploadDraft::new();
        let file = SelectedFile::new("chair.obj", Some("text/plain".to_string()), vec![0u8; 10]);
        let err = draft.select_file(file, &policy_mb(100)).unwrap_err();

        assert!(matches!(err, Error::InvalidFileType { .. }));
        assert_eq!(
            draft.error(DraftField::File),
            Some("Only GLB files are allowed. Please select a .glb file.")
        );
        assert!(draft.file().is_none());
        assert!(draft.name.is_empty());
    }

    #[test]
    fn test_invalid_type_regardless_of_size() {
        let policy = policy_mb(1);
        for name in ["model.gltf", "model.fbx", "model", "archive.glb.zip"] {
            let file = SelectedFile::new(name, None, vec![0u8; 4 * BYTES_PER_MB as usize]);
            assert!(matches!(
                policy.validate(&file),
                Err(Error::InvalidFileType { .. })
            ));
        }
    }

    #[test]
    fn test_glb_mime_accepted_without_extension() {
        let file = glb("scan_0042", 128);
        assert!(policy_mb(1).validate(&file).is_ok());
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let file = SelectedFile::new("CHAIR.GLB", None, vec![0u8; 16]);
        let mut draft = UploadDraft::new();
        draft.select_file(file, &policy_mb(1)).unwrap();
        // only the lowercase suffix is stripped from the suggested name
        assert_eq!(draft.name, "CHAIR.GLB");
    }

    #[test]
    fn test_too_large_states_limit() {
        let policy = policy_mb(2);
        let file = glb("big.glb", 2 * BYTES_PER_MB as usize + 1);
        let err = policy.validate(&file).unwrap_err();
        assert_eq!(err.to_string(), "File is too large. Maximum size is 2MB");

        let exact = glb("edge.glb", 2 * BYTES_PER_MB as usize);
        assert!(policy.validate(&exact).is_ok());
    }

    #[test]
    fn test_existing_name_is_not_overwritten() {
        let mut draft = UploadDraft::new();
        draft.name = "Office chair".to_string();
        draft.select_file(glb("chair.glb", 10), &policy_mb(1)).unwrap();
        assert_eq!(draft.name, "Office chair");
    }

    #[test]
    fn test_suffix_strip_is_single_occurrence() {
        assert_eq!(glb("a.glb.glb", 1).suggested_name(), "a.glb");
        assert_eq!(glb("x.glbz.glb", 1).suggested_name(), "xz.glb");
    }

    #[test]
    fn test_rejected_file_keeps_previous_selection() {
        let mut draft = UploadDraft::new();
        draft.select_file(glb("chair.glb", 10), &policy_mb(1)).unwrap();
        let _ = draft.select_file(SelectedFile::new("table.obj", None, vec![1u8]), &policy_mb(1));
        assert_eq!(draft.file().map(|f| f.name.as_str()), Some("chair.glb"));
        assert!(draft.error(DraftField::File).is_some());
    }

    #[test]
    fn test_second_submit_while_busy_is_noop() {
        let mut draft = UploadDraft::new();
        draft.select_file(glb("chair.glb", 10), &policy_mb(1)).unwrap();

        let pending = draft.begin_submit().expect("first submit");
        assert_eq!(pending.name, "chair");
        assert!(draft.is_busy());
        assert!(!draft.can_submit());
        assert!(draft.begin_submit().is_none());

        draft.finish_submit(&Err(Error::network("boom")));
        assert!(!draft.is_busy());
        assert_eq!(draft.name, "chair");
        assert!(draft.file().is_some());
        assert!(draft.begin_submit().is_some());
    }

    #[test]
    fn test_submit_requires_file_and_name() {
        let mut draft = UploadDraft::new();
        assert!(draft.begin_submit().is_none());
        assert!(draft.error(DraftField::File).is_some());

        draft.select_file(glb("chair.glb", 10), &policy_mb(1)).unwrap();
        draft.name = "   ".to_string();
        assert!(draft.begin_submit().is_none());
        assert!(draft.error(DraftField::Name).is_some());
        assert!(!draft.is_busy());
    }

    #[test]
    fn test_empty_draft_reports_only_file() {
        let mut draft = UploadDraft::new();
        assert!(draft.begin_submit().is_none());
        let fields: Vec<String> = draft.errors().keys().map(|f| f.to_string()).collect();
        assert_eq!(fields, vec!["file"]);
    }

    #[test]
    fn test_tags_parse_from_text() {
        let draft = UploadDraft {
            tags_text: " chair, wood ,,office ".to_string(),
            ..Default::default()
        };
        assert_eq!(draft.tags(), vec!["chair", "wood", "office"]);
    }

    #[test]
    fn test_remove_file_keeps_fields() {
        let mut draft = UploadDraft::new();
        draft.select_file(glb("chair.glb", 10), &policy_mb(1)).unwrap();
        draft.description = "A chair".to_string();
        draft.remove_file();
        assert!(draft.file().is_none());
        assert_eq!(draft.name, "chair");
        assert_eq!(draft.description, "A chair");
    }
}
