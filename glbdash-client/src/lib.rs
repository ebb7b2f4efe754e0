//! Backend access for glbdash
//!
//! This crate talks to the model-library backend over HTTP:
//! - [`ApiClient`]: single-attempt requests with normalized errors
//! - [`ModelCollection`]: filtered model listing with refresh
//! - [`UploadDraft`]: client-side validation and multipart upload

pub mod http;
pub mod models;
pub mod upload;

pub use http::{ApiClient, ApiEnvelope, ApiRequest, RequestBody};
pub use models::{delete_model, list_models, ModelCollection, ModelQuery};
pub use upload::{DraftField, PendingUpload, SelectedFile, UploadDraft, UploadPolicy, UploadReceipt};
