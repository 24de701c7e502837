#![allow(dead_code)]

use std::{
    io::Cursor,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{get, post},
};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use tempfile::TempDir;

use wardrobe_ai::{config::AppConfig, server, state::AppState};

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn files_in(&self, dir: &str) -> Vec<String> {
        match std::fs::read_dir(self.dir.path().join(dir)) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub async fn spawn_server() -> TestServer {
    spawn_server_with(|_| {}).await
}

pub async fn spawn_server_with(configure: impl FnOnce(&mut AppConfig)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::local(dir.path().to_path_buf());
    configure(&mut config);
    let state = Arc::new(AppState::new(config));
    state.prepare_dirs().await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = server::router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    TestServer { addr, state, dir }
}

pub fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn tiny_png(color: [u8; 3]) -> Vec<u8> {
    png(4, 4, color)
}

/// What the fake Space answers to every prediction.
#[derive(Clone)]
pub enum SpaceReply {
    Image(Vec<u8>),
    Error(&'static str),
}

/// Requests the fake Space received, in arrival order.
#[derive(Clone, Default)]
pub struct SpaceLog {
    pub uploads: Arc<Mutex<Vec<String>>>,
    pub calls: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
}

impl SpaceLog {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct FakeSpace {
    reply: SpaceReply,
    log: SpaceLog,
}

const API_PREFIX: &str = "/gradio_api";
const RESULT_FILE: &str = "result.png";

/// Serves the subset of the Gradio HTTP API the try-on services use:
/// config discovery, uploads, queued calls with an SSE result and file
/// downloads. Returns the root URL to use as a literal Space name.
pub async fn spawn_space(reply: SpaceReply) -> (String, SpaceLog) {
    let log = SpaceLog::default();
    let fake = FakeSpace { reply, log: log.clone() };

    let router = Router::new()
        .route("/config", get(|| async { Json(json!({ "api_prefix": API_PREFIX })) }))
        .route("/gradio_api/upload", post(upload))
        .route("/gradio_api/call/{api}", post(queue))
        .route("/gradio_api/call/{api}/{event_id}", get(stream))
        .route("/gradio_api/file=result.png", get(result_file))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), log)
}

async fn upload(State(fake): State<FakeSpace>, mut multipart: Multipart) -> Json<Vec<String>> {
    let mut paths = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.file_name().unwrap_or("blob").to_string();
        let bytes = field.bytes().await.unwrap();
        assert!(!bytes.is_empty());
        fake.log.uploads.lock().unwrap().push(name.clone());
        paths.push(format!("/tmp/gradio/{name}"));
    }
    Json(paths)
}

async fn queue(
    State(fake): State<FakeSpace>,
    Path(api): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let data = body["data"].as_array().cloned().unwrap_or_default();
    fake.log.calls.lock().unwrap().push((api, data));
    Json(json!({ "event_id": "evt-1" }))
}

async fn stream(State(fake): State<FakeSpace>, Path((_api, event_id)): Path<(String, String)>) -> String {
    assert_eq!(event_id, "evt-1");
    match fake.reply {
        SpaceReply::Image(_) => format!(
            "event: generating\ndata: null\n\nevent: complete\ndata: [{{\"path\": \"{RESULT_FILE}\", \"url\": null}}, null]\n\n"
        ),
        SpaceReply::Error(message) => format!("event: error\ndata: \"{message}\"\n\n"),
    }
}

async fn result_file(State(fake): State<FakeSpace>) -> Vec<u8> {
    match fake.reply {
        SpaceReply::Image(bytes) => bytes,
        SpaceReply::Error(_) => Vec::new(),
    }
}
