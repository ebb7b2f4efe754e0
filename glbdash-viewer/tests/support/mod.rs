//! Asset server and GPU stand-in for the viewer integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use glbdash_core::Result;
use glbdash_gpu::{GpuResources, MaterialData, SceneNode};
use tokio::net::TcpListener;

/// A one-triangle GLB with a single red material
pub fn triangle_glb() -> Vec<u8> {
    let json = r#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],
        "nodes":[{"name":"triangle","mesh":0}],
        "meshes":[{"primitives":[{"attributes":{"POSITION":0},"indices":1,"material":0}]}],
        "materials":[{"pbrMetallicRoughness":{"baseColorFactor":[1,0,0,1]}}],
        "buffers":[{"byteLength":42}],
        "bufferViews":[{"buffer":0,"byteOffset":0,"byteLength":36},{"buffer":0,"byteOffset":36,"byteLength":6}],
        "accessors":[
          {"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]},
          {"bufferView":1,"componentType":5123,"count":3,"type":"SCALAR"}]}"#;

    let mut bin: Vec<u8> = [[0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        .iter()
        .flatten()
        .flat_map(|f| f.to_le_bytes())
        .collect();
    for index in [0u16, 1, 2] {
        bin.extend_from_slice(&index.to_le_bytes());
    }
    pad(&mut bin, 0);
    let mut json = json.as_bytes().to_vec();
    pad(&mut json, b' ');

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}

fn pad(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}

/// Serves `/api/upload/file/:id`: `corrupt` returns non-GLB bytes,
/// `missing` a 404, `flaky` a 503 on its first request only, anything else
/// the triangle asset.
pub async fn start_asset_server() -> SocketAddr {
    let flaky_hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/api/upload/file/:file_id", get(file))
        .with_state(flaky_hits);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn file(State(flaky_hits): State<Arc<AtomicUsize>>, Path(file_id): Path<String>) -> axum::response::Response {
    match file_id.as_str() {
        "flaky" if flaky_hits.fetch_add(1, Ordering::SeqCst) == 0 => (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(serde_json::json!({ "success": false, "error": "Storage unavailable" })),
        )
            .into_response(),
        "missing" => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({ "success": false, "error": "File not found" })),
        )
            .into_response(),
        "corrupt" => b"not a binary gltf".to_vec().into_response(),
        _ => triangle_glb().into_response(),
    }
}

/// Resource backend that hands out numbered handles and records releases
#[derive(Debug, Default)]
pub struct HandleCounter {
    next: u32,
    pub live: Vec<u32>,
    pub released: Vec<u32>,
}

impl HandleCounter {
    fn issue(&mut self) -> u32 {
        self.next += 1;
        self.live.push(self.next);
        self.next
    }

    fn give_back(&mut self, handle: u32) {
        assert!(!self.released.contains(&handle), "handle {handle} released twice");
        self.live.retain(|h| *h != handle);
        self.released.push(handle);
    }
}

impl GpuResources for HandleCounter {
    type Geometry = u32;
    type Material = u32;

    fn upload_geometry(&mut self, _node: &SceneNode) -> Result<u32> {
        Ok(self.issue())
    }

    fn upload_material(&mut self, _material: &MaterialData) -> Result<u32> {
        Ok(self.issue())
    }

    fn release_geometry(&mut self, geometry: u32) {
        self.give_back(geometry);
    }

    fn release_material(&mut self, material: u32) {
        self.give_back(material);
    }
}
