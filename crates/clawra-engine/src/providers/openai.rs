use clawra_contracts::{AspectRatio, GenerationRequest, GenerationResult, ProviderId, ProviderIdentity};
use serde_json::{json, Value};
use tracing::debug;

use super::{finish, images_from_data_array, non_empty_str, response_json_or_error, ImageProvider, Transport};
use crate::config::ProviderSettings;
use crate::error::Result;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const OPENAI_IMAGE_MODEL: &str = "gpt-image-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePreset {
    Landscape,
    Portrait,
    Square,
}

impl SizePreset {
    pub fn as_str(self) -> &'static str {
        match self {
            SizePreset::Landscape => "1536x1024",
            SizePreset::Portrait => "1024x1536",
            SizePreset::Square => "1024x1024",
        }
    }
}

/// Buckets a ratio into one of the three sizes gpt-image-1 accepts.
/// 4:3 is close enough to square that it stays there.
pub fn size_for_ratio(ratio: AspectRatio) -> SizePreset {
    match ratio {
        AspectRatio::Wide2x1
        | AspectRatio::Wide20x9
        | AspectRatio::Wide19_5x9
        | AspectRatio::Wide16x9
        | AspectRatio::Wide3x2 => SizePreset::Landscape,
        AspectRatio::Tall2x3
        | AspectRatio::Tall3x4
        | AspectRatio::Tall9x16
        | AspectRatio::Tall9x19_5
        | AspectRatio::Tall9x20
        | AspectRatio::Tall1x2 => SizePreset::Portrait,
        AspectRatio::Wide4x3 | AspectRatio::Square => SizePreset::Square,
    }
}

/// OpenAI Images API. Generation only; no edit capability is exposed.
pub struct OpenAiProvider {
    transport: Transport,
}

impl OpenAiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(settings, OPENAI_API_BASE)?,
        })
    }
}

impl ImageProvider for OpenAiProvider {
    fn identity(&self) -> &'static ProviderIdentity {
        ProviderId::Openai.identity()
    }

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let identity = self.identity();
        let api_key = self.transport.api_key(identity)?;
        let endpoint = self.transport.endpoint("images/generations");
        let payload = json!({
            "model": OPENAI_IMAGE_MODEL,
            "prompt": request.prompt(),
            "n": request.num_images(),
            "size": size_for_ratio(request.aspect_ratio()).as_str(),
            "output_format": request.output_format().as_str(),
        });
        debug!(endpoint = %endpoint, "openai request");
        let response = self
            .transport
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()?;
        let response_payload = response_json_or_error(identity, response)?;

        let images = images_from_data_array(
            identity,
            &response_payload,
            request.output_format(),
            &self.transport.output_dir,
        )?;
        let revised_prompt = response_payload
            .get("data")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|row| non_empty_str(row.get("revised_prompt")))
            .map(str::to_string);
        finish(identity, images, revised_prompt)
    }
}
