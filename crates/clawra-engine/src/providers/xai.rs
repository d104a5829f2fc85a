use clawra_contracts::{
    EditRequest, GenerationRequest, GenerationResult, OutputFormat, ProviderId, ProviderIdentity,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{finish, images_from_data_array, response_json_or_error, ImageEditor, ImageProvider, Transport};
use crate::config::ProviderSettings;
use crate::error::Result;

const XAI_API_BASE: &str = "https://api.x.ai/v1";
const XAI_IMAGE_MODEL: &str = "grok-imagine-image";

/// Direct x.ai Images API. Edits reuse the generation route with an
/// `image_url` field.
pub struct XaiProvider {
    transport: Transport,
}

impl XaiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(settings, XAI_API_BASE)?,
        })
    }

    fn post(&self, payload: Map<String, Value>, format: OutputFormat) -> Result<GenerationResult> {
        let identity = self.identity();
        let api_key = self.transport.api_key(identity)?;
        let endpoint = self.transport.endpoint("images/generations");
        debug!(endpoint = %endpoint, "xai request");
        let response = self
            .transport
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&Value::Object(payload))
            .send()?;
        let response_payload = response_json_or_error(identity, response)?;
        let images =
            images_from_data_array(identity, &response_payload, format, &self.transport.output_dir)?;
        finish(identity, images, None)
    }

    fn base_payload(request: &GenerationRequest) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("model".to_string(), json!(XAI_IMAGE_MODEL));
        payload.insert("prompt".to_string(), json!(request.prompt()));
        payload.insert("n".to_string(), json!(request.num_images()));
        payload.insert(
            "aspect_ratio".to_string(),
            json!(request.aspect_ratio().as_str()),
        );
        payload
    }
}

impl ImageProvider for XaiProvider {
    fn identity(&self) -> &'static ProviderIdentity {
        ProviderId::Xai.identity()
    }

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.post(Self::base_payload(request), request.output_format())
    }

    fn editor(&self) -> Option<&dyn ImageEditor> {
        Some(self)
    }
}

impl ImageEditor for XaiProvider {
    fn edit(&self, request: &EditRequest) -> Result<GenerationResult> {
        let mut payload = Self::base_payload(request.base());
        payload.insert("image_url".to_string(), json!(request.image_url()));
        self.post(payload, request.output_format())
    }
}
