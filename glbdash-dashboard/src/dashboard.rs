//! Selection, upload and delete flows over the model collection

use glbdash_client::{delete_model, ApiClient, ModelCollection, UploadDraft, UploadPolicy, UploadReceipt};
use glbdash_core::{DashboardConfig, ModelFilters, ModelRecord, Result};
use glbdash_gpu::GpuResources;
use glbdash_viewer::{LoadTicket, ViewerSession};

pub const DELETE_CONFIRM_TITLE: &str = "Are you sure?";
pub const DELETE_CONFIRM_TEXT: &str = "This model will be permanently deleted.";

/// Asks the user to approve a destructive action
pub trait Confirm {
    fn confirm(&mut self, title: &str, text: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str, &str) -> bool,
{
    fn confirm(&mut self, title: &str, text: &str) -> bool {
        self(title, text)
    }
}

/// Result of a delete request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The user declined; nothing was sent
    Declined,
    Deleted,
}

/// The selected model and the URL its asset is fetched from
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub record: ModelRecord,
    pub asset_url: String,
}

/// Dashboard state: collection, selected model and the open upload form
pub struct Dashboard {
    collection: ModelCollection,
    policy: UploadPolicy,
    selected: Option<Selection>,
    upload: Option<UploadDraft>,
}

impl Dashboard {
    pub fn new(client: ApiClient, policy: UploadPolicy) -> Self {
        Self {
            collection: ModelCollection::new(client),
            policy,
            selected: None,
            upload: None,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        Ok(Self::new(ApiClient::new(config)?, UploadPolicy::from_config(config)))
    }

    pub fn client(&self) -> &ApiClient {
        self.collection.client()
    }

    pub fn collection(&self) -> &ModelCollection {
        &self.collection
    }

    pub fn models(&self) -> &[ModelRecord] {
        self.collection.models()
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub async fn refresh(&mut self) -> Result<&[ModelRecord]> {
        self.collection.refresh().await
    }

    /// Merge filter changes, re-fetching when they differ
    pub async fn apply_filters(&mut self, changes: &ModelFilters) -> Result<bool> {
        self.collection.update_filters(changes).await
    }

    /// Select a model from the current list by identifier
    pub fn select_model(&mut self, id: &str) -> Option<&Selection> {
        let record = self.collection.find(id)?.clone();
        self.select(record)
    }

    /// Select `record` and derive its viewer asset URL
    pub fn select(&mut self, record: ModelRecord) -> Option<&Selection> {
        let asset_url = self.client().file_url(&record.file_id);
        tracing::debug!(model_id = %record.id, %asset_url, "model selected");
        self.selected = Some(Selection { record, asset_url });
        self.selected.as_ref()
    }

    pub fn selected(&self) -> Option<&Selection> {
        self.selected.as_ref()
    }

    pub fn selected_asset_url(&self) -> Option<&str> {
        self.selected.as_ref().map(|s| s.asset_url.as_str())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Point `viewer` at the selected model's asset, or clear it
    pub fn sync_viewer<R: GpuResources>(&self, viewer: &mut ViewerSession<R>) -> Option<LoadTicket> {
        viewer.set_url(self.selected_asset_url().map(str::to_string))
    }

    /// Open the upload form, creating a fresh draft if it was closed
    pub fn open_upload(&mut self) -> &mut UploadDraft {
        self.upload.get_or_insert_with(UploadDraft::new)
    }

    /// Close the upload form, discarding the draft
    pub fn close_upload(&mut self) {
        self.upload = None;
    }

    pub fn is_upload_open(&self) -> bool {
        self.upload.is_some()
    }

    pub fn draft(&self) -> Option<&UploadDraft> {
        self.upload.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut UploadDraft> {
        self.upload.as_mut()
    }

    /// Submit the open draft.
    ///
    /// On success the draft is discarded and the collection refreshed; a
    /// failed refresh is left in [`ModelCollection::error`]. On failure the
    /// draft stays open with everything the user entered. `Ok(None)` means
    /// nothing was sent.
    pub async fn submit_upload(&mut self) -> Result<Option<UploadReceipt>> {
        let Some(draft) = self.upload.as_mut() else {
            return Ok(None);
        };
        let Some(receipt) = draft.submit(self.collection.client()).await? else {
            return Ok(None);
        };

        self.upload = None;
        if let Err(e) = self.collection.refresh().await {
            tracing::warn!(error = %e, "refresh after upload failed");
        }
        Ok(Some(receipt))
    }

    /// Delete a model after confirmation.
    ///
    /// Declining sends nothing. Deleting the selected model clears the
    /// selection, and the collection is refreshed afterwards.
    pub async fn delete_model(&mut self, id: &str, confirm: &mut impl Confirm) -> Result<DeleteOutcome> {
        if !confirm.confirm(DELETE_CONFIRM_TITLE, DELETE_CONFIRM_TEXT) {
            tracing::debug!(model_id = %id, "delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        delete_model(self.collection.client(), id).await?;
        if self.selected.as_ref().is_some_and(|s| s.record.id == id) {
            self.selected = None;
        }
        if let Err(e) = self.collection.refresh().await {
            tracing::warn!(error = %e, "refresh after delete failed");
        }
        Ok(DeleteOutcome::Deleted)
    }
}
