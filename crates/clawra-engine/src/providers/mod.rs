mod fal;
mod google;
mod openai;
mod xai;

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clawra_contracts::{
    EditRequest, GeneratedImage, GenerationRequest, GenerationResult, OutputFormat, ProviderId,
    ProviderIdentity,
};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::error::{ClawraError, Result};

pub use fal::FalProvider;
pub use google::GoogleProvider;
pub use openai::{size_for_ratio, OpenAiProvider, SizePreset};
pub use xai::XaiProvider;

/// One vendor's text-to-image endpoint, normalized.
pub trait ImageProvider: Send + Sync {
    fn identity(&self) -> &'static ProviderIdentity;

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult>;

    /// Edit capability, when the vendor has one.
    fn editor(&self) -> Option<&dyn ImageEditor> {
        None
    }

    fn name(&self) -> &'static str {
        self.identity().display_name
    }
}

pub trait ImageEditor: Send + Sync {
    fn edit(&self, request: &EditRequest) -> Result<GenerationResult>;
}

pub fn build_provider(id: ProviderId, settings: ProviderSettings) -> Result<Box<dyn ImageProvider>> {
    Ok(match id {
        ProviderId::Fal => Box::new(FalProvider::new(settings)?),
        ProviderId::Openai => Box::new(OpenAiProvider::new(settings)?),
        ProviderId::Google => Box::new(GoogleProvider::new(settings)?),
        ProviderId::Xai => Box::new(XaiProvider::new(settings)?),
    })
}

/// Connection state shared by every adapter.
struct Transport {
    api_base: String,
    api_key: Option<String>,
    output_dir: PathBuf,
    http: HttpClient,
}

impl Transport {
    fn new(settings: ProviderSettings, default_base: &str) -> Result<Self> {
        let api_base = settings
            .api_base
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| default_base.to_string());
        Ok(Self {
            api_base,
            api_key: settings.api_key,
            output_dir: settings.output_dir,
            http: http_client(settings.timeout)?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn api_key(&self, identity: &ProviderIdentity) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ClawraError::MissingCredential {
                var: identity.credential_var,
                key_url: identity.key_url,
            })
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<HttpClient> {
    Ok(HttpClient::builder().timeout(timeout).build()?)
}

fn response_json_or_error(identity: &ProviderIdentity, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|err| format!("<unreadable response body: {err}>"));
        return Err(ClawraError::ProviderRequestFailed {
            provider: identity.display_name.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    let body = response.text()?;
    serde_json::from_str(&body).map_err(|err| ClawraError::InvalidResponse {
        provider: identity.display_name.to_string(),
        reason: format!("invalid JSON payload: {err}"),
    })
}

fn finish(
    identity: &ProviderIdentity,
    images: Vec<GeneratedImage>,
    revised_prompt: Option<String>,
) -> Result<GenerationResult> {
    GenerationResult::from_images(images, revised_prompt).ok_or_else(|| {
        ClawraError::EmptyProviderResponse {
            provider: identity.display_name.to_string(),
        }
    })
}

/// Decodes inline image bytes into a uniquely named file and returns its
/// path as the image url.
fn materialize_base64(
    identity: &ProviderIdentity,
    data: &str,
    format: OutputFormat,
    output_dir: &Path,
) -> Result<GeneratedImage> {
    let bytes = BASE64
        .decode(data.trim())
        .map_err(|err| ClawraError::InvalidResponse {
            provider: identity.display_name.to_string(),
            reason: format!("invalid base64 image data: {err}"),
        })?;
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(temp_image_name(identity.id, format));
    fs::write(&path, &bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "materialized inline image");

    let (width, height) = match probe_dimensions(&bytes) {
        Some((width, height)) => (Some(width), Some(height)),
        None => (None, None),
    };
    Ok(GeneratedImage {
        url: path.to_string_lossy().into_owned(),
        width,
        height,
    })
}

fn temp_image_name(id: ProviderId, format: OutputFormat) -> String {
    let stamp = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| chrono::Utc::now().timestamp_micros() * 1_000);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "clawra-{}-{}-{}.{}",
        id.as_str(),
        stamp,
        &suffix[..12],
        format.extension()
    )
}

fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Normalizes an OpenAI-style `data[]` array whose items carry either a
/// `url` or a `b64_json` payload.
fn images_from_data_array(
    identity: &ProviderIdentity,
    payload: &Value,
    format: OutputFormat,
    output_dir: &Path,
) -> Result<Vec<GeneratedImage>> {
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut images = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(url) = non_empty_str(row.get("url")) {
            images.push(GeneratedImage::from_url(url));
            continue;
        }
        if let Some(data) = non_empty_str(row.get("b64_json")) {
            images.push(materialize_base64(identity, data, format, output_dir)?);
            continue;
        }
        return Err(ClawraError::InvalidResponse {
            provider: identity.display_name.to_string(),
            reason: "response item contained neither url nor b64_json".to_string(),
        });
    }
    Ok(images)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn value_as_u32(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use base64::Engine as _;
    use clawra_contracts::{OutputFormat, ProviderId};
    use serde_json::json;

    use super::{build_provider, images_from_data_array, materialize_base64, temp_image_name, BASE64};
    use crate::config::RuntimeConfig;
    use crate::error::ClawraError;

    #[test]
    fn temp_names_are_unique_and_carry_extension() {
        let first = temp_image_name(ProviderId::Google, OutputFormat::Png);
        let second = temp_image_name(ProviderId::Google, OutputFormat::Png);
        assert_ne!(first, second);
        assert!(first.starts_with("clawra-google-"));
        assert!(first.ends_with(".png"));
    }

    #[test]
    fn materialized_file_matches_decoded_bytes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let raw = b"not really a jpeg".to_vec();
        let identity = ProviderId::Openai.identity();
        let image = materialize_base64(identity, &BASE64.encode(&raw), OutputFormat::Jpeg, temp.path())?;
        assert_eq!(fs::read(&image.url)?, raw);
        assert!(image.url.ends_with(".jpeg"));
        assert_eq!(image.width, None);
        Ok(())
    }

    #[test]
    fn invalid_base64_is_an_invalid_response() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let err = materialize_base64(
            ProviderId::Openai.identity(),
            "***",
            OutputFormat::Jpeg,
            temp.path(),
        )
        .unwrap_err();
        assert!(matches!(err, ClawraError::InvalidResponse { .. }));
        Ok(())
    }

    #[test]
    fn data_array_rejects_items_without_image() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let payload = json!({ "data": [{ "revised_prompt": "x" }] });
        let err = images_from_data_array(
            ProviderId::Openai.identity(),
            &payload,
            OutputFormat::Png,
            temp.path(),
        )
        .unwrap_err();
        assert!(matches!(err, ClawraError::InvalidResponse { .. }));
        Ok(())
    }

    #[test]
    fn only_openai_lacks_edit_capability() -> anyhow::Result<()> {
        let config = RuntimeConfig::default();
        for id in ProviderId::ALL {
            let provider = build_provider(id, config.provider_settings(id))?;
            assert_eq!(provider.identity().id, id);
            assert_eq!(provider.editor().is_some(), id != ProviderId::Openai);
        }
        Ok(())
    }
}
