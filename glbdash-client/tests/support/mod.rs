//! In-process model-library backend used by the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Multipart, Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use glbdash_core::{Category, ModelRecord};
use serde_json::json;
use tokio::net::TcpListener;

/// A multipart field as received by the backend
#[derive(Debug, Clone)]
pub struct ReceivedField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct BackendState {
    pub models: Vec<ModelRecord>,
    pub list_queries: Vec<String>,
    pub uploads: Vec<Vec<ReceivedField>>,
    pub deletes: Vec<String>,
    pub fail_uploads: bool,
    pub fail_lists: bool,
}

pub type SharedState = Arc<Mutex<BackendState>>;

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: SharedState,
}

impl MockBackend {
    pub async fn start(models: Vec<ModelRecord>) -> Self {
        let state: SharedState = Arc::new(Mutex::new(BackendState {
            models,
            ..Default::default()
        }));

        let app = Router::new()
            .route("/api/models", get(list_models))
            .route("/api/models/:id", delete(delete_model))
            .route("/api/upload", post(upload))
            .route("/api/upload/file/:file_id", get(file))
            .route("/api/broken", get(broken))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }
}

pub fn record(id: &str, name: &str, category: Category, tags: &[&str]) -> ModelRecord {
    let ts = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
    ModelRecord {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        category,
        file_size: 1024,
        file_id: format!("file-{}", id),
        original_name: format!("{}.glb", name),
        upload_date: ts,
        updated_at: ts,
    }
}

async fn list_models(State(state): State<SharedState>, RawQuery(query): RawQuery) -> Response {
    let mut state = state.lock().unwrap();
    let query = query.unwrap_or_default();
    state.list_queries.push(query.clone());
    if state.fail_lists {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": "Database offline" })),
        )
            .into_response();
    }

    let pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| (k.to_string(), v.replace('+', " ")))
        .collect();

    let models: Vec<&ModelRecord> = state
        .models
        .iter()
        .filter(|m| {
            pairs.iter().all(|(k, v)| match k.as_str() {
                "tag" => m.has_tag(v),
                "category" => m.category.to_string() == *v,
                _ => true,
            })
        })
        .collect();
    Json(json!({ "success": true, "data": models })).into_response()
}

async fn delete_model(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    state.deletes.push(id.clone());
    let before = state.models.len();
    state.models.retain(|m| m.id != id);
    if state.models.len() == before {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Model not found" })),
        )
            .into_response();
    }
    Json(json!({ "success": true })).into_response()
}

async fn upload(State(state): State<SharedState>, mut multipart: Multipart) -> Response {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap().to_vec();
        fields.push(ReceivedField {
            name,
            file_name,
            content_type,
            data,
        });
    }

    let mut state = state.lock().unwrap();
    state.uploads.push(fields.clone());
    if state.fail_uploads {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Disk quota exceeded" })),
        )
            .into_response();
    }

    let text = |key: &str| {
        fields
            .iter()
            .find(|f| f.name == key)
            .map(|f| String::from_utf8_lossy(&f.data).to_string())
            .unwrap_or_default()
    };
    let id = format!("m{}", state.models.len() + 1);
    let mut stored = record(&id, &text("name"), Category::Other, &[]);
    stored.description = Some(text("description"));
    state.models.push(stored.clone());
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": stored })),
    )
        .into_response()
}

async fn file(Path(file_id): Path<String>) -> Response {
    if file_id == "missing" {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    format!("glb:{}", file_id).into_response()
}

async fn broken() -> Response {
    StatusCode::BAD_GATEWAY.into_response()
}
