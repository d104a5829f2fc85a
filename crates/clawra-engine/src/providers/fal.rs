use clawra_contracts::{
    EditRequest, GeneratedImage, GenerationRequest, GenerationResult, ProviderId, ProviderIdentity,
};
use reqwest::header::AUTHORIZATION;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    finish, non_empty_str, response_json_or_error, value_as_u32, ImageEditor, ImageProvider,
    Transport,
};
use crate::config::ProviderSettings;
use crate::error::Result;

const FAL_API_BASE: &str = "https://fal.run";
const FAL_MODEL_PATH: &str = "xai/grok-imagine-image";

/// Grok Imagine through fal.ai's synchronous run endpoint.
pub struct FalProvider {
    transport: Transport,
}

impl FalProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(settings, FAL_API_BASE)?,
        })
    }

    fn post(&self, path: &str, payload: &Value) -> Result<Value> {
        let identity = self.identity();
        let api_key = self.transport.api_key(identity)?;
        let endpoint = self.transport.endpoint(path);
        debug!(endpoint = %endpoint, "fal request");
        let response = self
            .transport
            .http
            .post(&endpoint)
            .header(AUTHORIZATION, format!("Key {api_key}"))
            .json(payload)
            .send()?;
        response_json_or_error(identity, response)
    }

    fn normalize(&self, payload: &Value) -> Result<GenerationResult> {
        let images = payload
            .get("images")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| {
                        let url = non_empty_str(row.get("url"))?;
                        Some(GeneratedImage {
                            url: url.to_string(),
                            width: value_as_u32(row.get("width")),
                            height: value_as_u32(row.get("height")),
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let revised_prompt = non_empty_str(payload.get("revised_prompt")).map(str::to_string);
        finish(self.identity(), images, revised_prompt)
    }
}

impl ImageProvider for FalProvider {
    fn identity(&self) -> &'static ProviderIdentity {
        ProviderId::Fal.identity()
    }

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let payload = json!({
            "prompt": request.prompt(),
            "num_images": request.num_images(),
            "aspect_ratio": request.aspect_ratio().as_str(),
            "output_format": request.output_format().as_str(),
        });
        let response = self.post(FAL_MODEL_PATH, &payload)?;
        self.normalize(&response)
    }

    fn editor(&self) -> Option<&dyn ImageEditor> {
        Some(self)
    }
}

impl ImageEditor for FalProvider {
    fn edit(&self, request: &EditRequest) -> Result<GenerationResult> {
        let payload = json!({
            "image_url": request.image_url(),
            "prompt": request.prompt(),
            "num_images": request.num_images(),
            "output_format": request.output_format().as_str(),
        });
        let response = self.post(&format!("{FAL_MODEL_PATH}/edit"), &payload)?;
        self.normalize(&response)
    }
}

#[cfg(test)]
mod tests {
    use clawra_contracts::{AspectRatio, EditRequest, GenerationRequest, ProviderId};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use super::FalProvider;
    use crate::config::RuntimeConfig;
    use crate::error::ClawraError;
    use crate::providers::ImageProvider;

    fn provider(server: &MockServer, key: Option<&str>, out: &std::path::Path) -> FalProvider {
        let mut config = RuntimeConfig::default().with_api_base(ProviderId::Fal, server.base_url());
        config.output_dir = out.to_path_buf();
        if let Some(key) = key {
            config = config.with_credential(ProviderId::Fal, key);
        }
        FalProvider::new(config.provider_settings(ProviderId::Fal)).unwrap()
    }

    #[test]
    fn missing_key_fails_before_any_request() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({}));
        });
        let err = provider(&server, None, temp.path())
            .generate(&GenerationRequest::new("boat")?)
            .unwrap_err();
        match err {
            ClawraError::MissingCredential { var, key_url } => {
                assert_eq!(var, "FAL_KEY");
                assert_eq!(key_url, "https://fal.ai/dashboard/keys");
            }
            other => panic!("unexpected error: {other}"),
        }
        mock.assert_hits(0);
        Ok(())
    }

    #[test]
    fn urls_pass_through_unchanged() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/xai/grok-imagine-image")
                .header("authorization", "Key fal-key")
                .json_body(json!({
                    "prompt": "A cyberpunk city",
                    "num_images": 1,
                    "aspect_ratio": "16:9",
                    "output_format": "jpeg",
                }));
            then.status(200).json_body(json!({
                "images": [{ "url": "https://x/1.jpg", "width": 512, "height": 512 }],
                "revised_prompt": "A neon cyberpunk city",
            }));
        });
        let request = GenerationRequest::new("A cyberpunk city")?
            .with_aspect_ratio(AspectRatio::Wide16x9);
        let result = provider(&server, Some("fal-key"), temp.path()).generate(&request)?;

        mock.assert();
        assert_eq!(result.images().len(), 1);
        assert_eq!(result.primary().url, "https://x/1.jpg");
        assert_eq!(result.primary().width, Some(512));
        assert_eq!(result.revised_prompt(), Some("A neon cyberpunk city"));
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn error_status_carries_body() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/xai/grok-imagine-image");
            then.status(500).body("upstream exploded");
        });
        let err = provider(&server, Some("fal-key"), temp.path())
            .generate(&GenerationRequest::new("boat")?)
            .unwrap_err();
        match err {
            ClawraError::ProviderRequestFailed { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[test]
    fn empty_image_list_is_rejected() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({ "images": [] }));
        });
        let err = provider(&server, Some("fal-key"), temp.path())
            .generate(&GenerationRequest::new("boat")?)
            .unwrap_err();
        assert!(matches!(err, ClawraError::EmptyProviderResponse { .. }));
        Ok(())
    }

    #[test]
    fn edit_posts_image_url_to_edit_route() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let server = MockServer::start();
        // Exact body match: edits carry no aspect_ratio.
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/xai/grok-imagine-image/edit")
                .json_body(json!({
                    "image_url": "https://x/src.png",
                    "prompt": "add a hat",
                    "num_images": 1,
                    "output_format": "jpeg",
                }));
            then.status(200)
                .json_body(json!({ "images": [{ "url": "https://x/edited.jpg" }] }));
        });
        let fal = provider(&server, Some("fal-key"), temp.path());
        let request = EditRequest::new(GenerationRequest::new("add a hat")?, "https://x/src.png")?;
        let result = fal.editor().expect("fal edits").edit(&request)?;

        mock.assert();
        assert_eq!(result.primary().url, "https://x/edited.jpg");
        Ok(())
    }
}
