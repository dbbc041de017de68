use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use image::{ImageFormat, Rgb, RgbImage};
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, error};

use crate::codec;
use crate::config::Config;
use crate::models::{InlineImage, PhotoStyle};

pub const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Other: {0}")] Other(String),
}

/// External image-generation collaborator.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produce a styled variant of `source`.
    async fn generate(&self, source: &InlineImage, style: PhotoStyle) -> Result<InlineImage, GeminiError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        let total = s.chars().count();
                        if total > 100 {
                            let head: String = s.chars().take(50).collect();
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", head, total - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.clone(),
            model: config.model.clone(),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.api_key == DEMO_KEY
    }

    pub fn build_prompt(style: PhotoStyle) -> String {
        let cfg = style.config();
        format!(
            "Transform this portrait into a professional {name} photo. \
            Replace the background with a {bg} background. \
            Dress the person in {attire}. \
            {description} \
            Keep the person's face, identity and features exactly the same. \
            Center and align the face, head and shoulders framing, even studio lighting, photorealistic, no text or watermarks.",
            name = style.name(),
            bg = cfg.background,
            attire = cfg.attire,
            description = cfg.description,
        )
    }

    async fn perform_api_call(&self, source: &InlineImage, prompt: &str) -> Result<InlineImage, GeminiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));

        let request_body = json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": source.mime_type, "data": source.data}},
                    {"text": prompt}
                ]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "temperature": 0.4,
                "topP": 0.95,
                "topK": 64,
                "candidateCount": 1
            }
        });

        let mut logged_body = request_body.clone();
        truncate_base64_in_json(&mut logged_body);
        info!("📤 Request body: {}", serde_json::to_string(&logged_body).unwrap_or_default());

        let response = self.client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GeminiError::Http(format!("status={} body={}", status, error_body)));
        }

        let response_text = response.text().await
            .map_err(|e| GeminiError::Other(e.to_string()))?;

        let image = image_from_response(&response_text)?;
        info!("🖼️ Extracted {} image from API response: {}", image.mime_type, image.preview());
        Ok(image)
    }

    /// Solid-colour portrait placeholder tinted by the style's background.
    fn generate_placeholder_image(&self, style: PhotoStyle) -> Result<InlineImage, GeminiError> {
        let background = match style {
            PhotoStyle::Passport => Rgb([255, 255, 255]),
            PhotoStyle::Visa => Rgb([236, 236, 236]),
            PhotoStyle::IdCard => Rgb([173, 216, 230]),
            PhotoStyle::Cv => Rgb([200, 204, 210]),
        };
        let silhouette = Rgb([30, 41, 59]);

        // 3:4 portrait with a head-and-shoulders shape
        let (w, h) = (300u32, 400u32);
        let img = RgbImage::from_fn(w, h, |x, y| {
            let (cx, cy) = (w as f32 / 2.0, h as f32 * 0.38);
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            let head = (dx * dx) / (60.0 * 60.0) + (dy * dy) / (75.0 * 75.0) <= 1.0;
            let sy = y as f32 - h as f32;
            let shoulders = (dx * dx) / (130.0 * 130.0) + (sy * sy) / (120.0 * 120.0) <= 1.0;
            if head || shoulders { silhouette } else { background }
        });

        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| GeminiError::Other(e.to_string()))?;
        Ok(InlineImage {
            mime_type: "image/png".to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(buf.into_inner()),
        })
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, source: &InlineImage, style: PhotoStyle) -> Result<InlineImage, GeminiError> {
        if self.is_demo() {
            info!("Using demo mode - no real images generated");
            let delay = rand::thread_rng().gen_range(400..2000);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let placeholder = self.generate_placeholder_image(style)?;
            info!("📦 Generated placeholder image for '{}': {}", style, placeholder.preview());
            return Ok(placeholder);
        }

        let prompt = Self::build_prompt(style);
        info!("🎯 Generating '{}' with prompt: {}", style, prompt.chars().take(100).collect::<String>());
        let result = self.perform_api_call(source, &prompt).await;
        match &result {
            Ok(image) => info!("✅ Successfully generated '{}' image: {}", style, image.preview()),
            Err(e) => error!("❌ Failed to generate '{}' image: {}", style, e),
        }
        result
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

// Text and any other part kinds land in `Other` and are skipped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Other(serde_json::Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

fn extract_first_image(resp: &GeminiResponse) -> Option<InlineImage> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                return Some(InlineImage {
                    mime_type: inline_data.mime_type.clone(),
                    data: inline_data.data.clone(),
                });
            }
        }
    }
    None
}

/// Parse a `generateContent` body into a verified image.
///
/// The payload must be valid base64 of a recognisable image; its sniffed format wins
/// over the declared MIME type.
fn image_from_response(response_text: &str) -> Result<InlineImage, GeminiError> {
    let parsed: GeminiResponse = serde_json::from_str(response_text)
        .map_err(|e| GeminiError::Other(format!("parse error: {}", e)))?;

    if let Some(reason) = parsed.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
        return Err(GeminiError::Other(format!("prompt blocked: {}", reason)));
    }

    let Some(image) = extract_first_image(&parsed) else {
        let mut value = serde_json::from_str::<serde_json::Value>(response_text).unwrap_or_default();
        truncate_base64_in_json(&mut value);
        info!("⚠️ No image data found in API response: {}", value);
        return Err(GeminiError::Other("no image data in response".into()));
    };

    codec::verify(&image).map_err(|e| {
        error!("❌ Unusable image payload ({}): {}", image.mime_type, image.preview());
        GeminiError::Other(format!("invalid image payload: {}", e))
    })
}
