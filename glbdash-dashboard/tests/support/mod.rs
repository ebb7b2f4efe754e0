//! Minimal model-library backend for dashboard flows.

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

#[derive(Debug, Default)]
pub struct Library {
    pub models: Vec<ModelRecord>,
    pub list_calls: usize,
    pub deletes: Vec<String>,
    pub uploaded_names: Vec<String>,
}

pub type Shared = Arc<Mutex<Library>>;

pub struct Backend {
    pub addr: SocketAddr,
    pub library: Shared,
}

impl Backend {
    pub async fn start(models: Vec<ModelRecord>) -> Self {
        let library: Shared = Arc::new(Mutex::new(Library {
            models,
            ..Default::default()
        }));
        let app = Router::new()
            .route("/api/models", get(list))
            .route("/api/models/:id", delete(remove))
            .route("/api/upload", post(upload))
            .with_state(library.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, library }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn library(&self) -> std::sync::MutexGuard<'_, Library> {
        self.library.lock().unwrap()
    }
}

pub fn record(id: &str, name: &str, category: Category) -> ModelRecord {
    let ts = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
    ModelRecord {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        tags: Vec::new(),
        category,
        file_size: 2048,
        file_id: format!("file-{}", id),
        original_name: format!("{}.glb", name),
        upload_date: ts,
        updated_at: ts,
    }
}

async fn list(State(library): State<Shared>, RawQuery(query): RawQuery) -> Response {
    let mut library = library.lock().unwrap();
    library.list_calls += 1;
    let category = query
        .unwrap_or_default()
        .split('&')
        .find_map(|pair| pair.strip_prefix("category=").map(str::to_string));
    let models: Vec<&ModelRecord> = library
        .models
        .iter()
        .filter(|m| category.as_deref().map_or(true, |c| m.category.to_string() == c))
        .collect();
    Json(json!({ "success": true, "data": models })).into_response()
}

async fn remove(State(library): State<Shared>, Path(id): Path<String>) -> Response {
    let mut library = library.lock().unwrap();
    library.deletes.push(id.clone());
    library.models.retain(|m| m.id != id);
    Json(json!({ "success": true })).into_response()
}

async fn upload(State(library): State<Shared>, mut multipart: Multipart) -> Response {
    let mut name = String::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let field_name = field.name().unwrap_or_default().to_string();
        let data = field.bytes().await.unwrap();
        if field_name == "name" {
            name = String::from_utf8_lossy(&data).to_string();
        }
    }

    let mut library = library.lock().unwrap();
    library.uploaded_names.push(name.clone());
    let stored = record(&format!("m{}", library.models.len() + 1), &name, Category::Other);
    library.models.push(stored.clone());
    (StatusCode::CREATED, Json(json!({ "success": true, "data": stored }))).into_response()
}
