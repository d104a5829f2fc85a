use std::fs;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clawra_contracts::{
    AspectRatio, EditRequest, GenerationRequest, GenerationResult, OutputFormat, ProviderId,
    ProviderIdentity,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{
    finish, materialize_base64, non_empty_str, response_json_or_error, ImageEditor, ImageProvider,
    Transport,
};
use crate::config::ProviderSettings;
use crate::error::{ClawraError, Result};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Gemini native image generation via `generateContent`.
///
/// Images come back as base64 `inlineData` parts, so every result is
/// materialized to disk before it is returned.
pub struct GoogleProvider {
    transport: Transport,
}

impl GoogleProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(settings, GEMINI_API_BASE)?,
        })
    }

    fn generation_config(ratio: AspectRatio) -> Value {
        let mut config = Map::new();
        config.insert("responseModalities".to_string(), json!(["IMAGE"]));
        if let Some(ratio) = supported_ratio(ratio) {
            config.insert("imageConfig".to_string(), json!({ "aspectRatio": ratio }));
        }
        Value::Object(config)
    }

    fn call(&self, parts: Vec<Value>, ratio: AspectRatio, format: OutputFormat) -> Result<GenerationResult> {
        let identity = self.identity();
        let api_key = self.transport.api_key(identity)?;
        let endpoint = self
            .transport
            .endpoint(&format!("models/{GEMINI_IMAGE_MODEL}:generateContent"));
        let payload = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": Self::generation_config(ratio),
        });
        debug!(endpoint = %endpoint, "gemini request");
        let response = self
            .transport
            .http
            .post(&endpoint)
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()?;
        let response_payload = response_json_or_error(identity, response)?;

        let mut images = Vec::new();
        for data in inline_image_data(&response_payload) {
            images.push(materialize_base64(
                identity,
                data,
                format,
                &self.transport.output_dir,
            )?);
        }
        finish(identity, images, None)
    }

    fn fetch_source(&self, reference: &str) -> Result<Vec<u8>> {
        let failed = |reason: String| ClawraError::SourceImageFetchFailed {
            source_ref: reference.to_string(),
            reason,
        };
        if !is_remote(reference) {
            return fs::read(reference).map_err(|err| failed(err.to_string()));
        }
        let response = self
            .transport
            .http
            .get(reference)
            .send()
            .map_err(|err| failed(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status.as_u16())));
        }
        let bytes = response.bytes().map_err(|err| failed(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl ImageProvider for GoogleProvider {
    fn identity(&self) -> &'static ProviderIdentity {
        ProviderId::Google.identity()
    }

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.call(
            vec![json!({ "text": request.prompt() })],
            request.aspect_ratio(),
            request.output_format(),
        )
    }

    fn editor(&self) -> Option<&dyn ImageEditor> {
        Some(self)
    }
}

impl ImageEditor for GoogleProvider {
    fn edit(&self, request: &EditRequest) -> Result<GenerationResult> {
        self.transport.api_key(self.identity())?;
        let source = self.fetch_source(request.image_url())?;
        let parts = vec![
            json!({ "text": request.prompt() }),
            json!({
                "inlineData": {
                    "mimeType": mime_for_reference(request.image_url()),
                    "data": BASE64.encode(source),
                }
            }),
        ];
        self.call(parts, request.aspect_ratio(), request.output_format())
    }
}

/// Ratios Gemini's `imageConfig` accepts; the rest are left to the model.
fn supported_ratio(ratio: AspectRatio) -> Option<&'static str> {
    match ratio {
        AspectRatio::Square
        | AspectRatio::Tall2x3
        | AspectRatio::Wide3x2
        | AspectRatio::Tall3x4
        | AspectRatio::Wide4x3
        | AspectRatio::Tall9x16
        | AspectRatio::Wide16x9 => Some(ratio.as_str()),
        _ => None,
    }
}

fn inline_image_data(payload: &Value) -> Vec<&str> {
    let mut out = Vec::new();
    let candidates = payload
        .get("candidates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for part in parts {
            let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
            if let Some(data) = non_empty_str(inline.and_then(|inline| inline.get("data"))) {
                out.push(data);
            }
        }
    }
    out
}

fn is_remote(reference: &str) -> bool {
    let lowered = reference.trim().to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

fn mime_for_reference(reference: &str) -> &'static str {
    let without_query = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    let file_name = without_query.rsplit('/').next().unwrap_or(without_query);
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}
