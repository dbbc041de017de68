use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use idpro::gemini::{GeminiError, GenerationClient};
use idpro::models::{InlineImage, PhotoStyle};
use idpro::routes::AppState;

pub fn png_bytes(color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(6, 8, Rgb(color));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Generation client whose calls block until the test releases them.
///
/// Calls for a held source image wait on their own gate instead and always fail, so
/// their outcome is distinguishable from calls made for any other image.
pub struct GatedClient {
    gates: HashMap<PhotoStyle, Arc<Semaphore>>,
    failing: Mutex<HashSet<PhotoStyle>>,
    held: Mutex<HashMap<String, Arc<Semaphore>>>,
    held_returned: AtomicUsize,
}

impl GatedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gates: PhotoStyle::ALL.iter().map(|s| (*s, Arc::new(Semaphore::new(0)))).collect(),
            failing: Mutex::new(HashSet::new()),
            held: Mutex::new(HashMap::new()),
            held_returned: AtomicUsize::new(0),
        })
    }

    /// Hold every call made for this source payload until [`GatedClient::release_held`].
    pub fn hold(&self, source_data: &str) {
        self.held.lock().insert(source_data.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release_held(&self, source_data: &str) {
        if let Some(gate) = self.held.lock().get(source_data) {
            gate.add_permits(PhotoStyle::ALL.len());
        }
    }

    /// Number of held calls that have returned their failure.
    pub fn held_returned(&self) -> usize {
        self.held_returned.load(Ordering::SeqCst)
    }

    pub fn fail(&self, style: PhotoStyle) {
        self.failing.lock().insert(style);
    }

    pub fn succeed(&self, style: PhotoStyle) {
        self.failing.lock().remove(&style);
    }

    /// Let one pending (or future) call for `style` complete.
    pub fn release(&self, style: PhotoStyle) {
        self.gates[&style].add_permits(1);
    }

    pub fn release_all(&self) {
        for style in PhotoStyle::ALL {
            self.release(style);
        }
    }
}

#[async_trait]
impl GenerationClient for GatedClient {
    async fn generate(&self, source: &InlineImage, style: PhotoStyle) -> Result<InlineImage, GeminiError> {
        let held = self.held.lock().get(&source.data).cloned();
        if let Some(gate) = held {
            gate.acquire().await.expect("gate closed").forget();
            self.held_returned.fetch_add(1, Ordering::SeqCst);
            return Err(GeminiError::Http(format!("status=500 body=stale {}", style.slug())));
        }
        self.gates[&style].acquire().await.expect("gate closed").forget();
        if self.failing.lock().contains(&style) {
            return Err(GeminiError::Http("status=500 body=internal".into()));
        }
        Ok(InlineImage {
            mime_type: "image/png".into(),
            data: STANDARD.encode(png_bytes([style.index() as u8 * 40, 100, 200])),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub client: Arc<GatedClient>,
}

impl TestApp {
    pub fn new() -> Self {
        let client = GatedClient::new();
        let router = idpro::app(AppState::new(client.clone()));
        Self { router, client }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    pub async fn json(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let (status, _, body) = self.send(req).await;
        let value = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
        (status, value)
    }

    pub async fn create_session(&self) -> String {
        let (status, view) = self.json("POST", "/api/sessions").await;
        assert_eq!(status, StatusCode::CREATED);
        view["id"].as_str().unwrap().to_string()
    }

    pub async fn upload(&self, id: &str, content_type: &str, bytes: Vec<u8>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("PUT")
            .uri(format!("/api/sessions/{id}/image"))
            .header("content-type", content_type)
            .body(Body::from(bytes))
            .unwrap();
        let (status, _, body) = self.send(req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// Poll the session view until `done` holds.
    pub async fn wait_for(&self, id: &str, done: impl Fn(&Value) -> bool) -> Value {
        let poll = async {
            loop {
                let (_, view) = self.json("GET", &format!("/api/sessions/{id}")).await;
                if done(&view) {
                    return view;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), poll).await.expect("session never reached expected state")
    }
}

pub fn statuses(view: &Value) -> Vec<String> {
    view["cards"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["status"].as_str().unwrap().to_string())
        .collect()
}
