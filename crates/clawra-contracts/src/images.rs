use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "2:1")]
    Wide2x1,
    #[serde(rename = "20:9")]
    Wide20x9,
    #[serde(rename = "19.5:9")]
    Wide19_5x9,
    #[serde(rename = "16:9")]
    Wide16x9,
    #[serde(rename = "4:3")]
    Wide4x3,
    #[serde(rename = "3:2")]
    Wide3x2,
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "2:3")]
    Tall2x3,
    #[serde(rename = "3:4")]
    Tall3x4,
    #[serde(rename = "9:16")]
    Tall9x16,
    #[serde(rename = "9:19.5")]
    Tall9x19_5,
    #[serde(rename = "9:20")]
    Tall9x20,
    #[serde(rename = "1:2")]
    Tall1x2,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 13] = [
        AspectRatio::Wide2x1,
        AspectRatio::Wide20x9,
        AspectRatio::Wide19_5x9,
        AspectRatio::Wide16x9,
        AspectRatio::Wide4x3,
        AspectRatio::Wide3x2,
        AspectRatio::Square,
        AspectRatio::Tall2x3,
        AspectRatio::Tall3x4,
        AspectRatio::Tall9x16,
        AspectRatio::Tall9x19_5,
        AspectRatio::Tall9x20,
        AspectRatio::Tall1x2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Wide2x1 => "2:1",
            AspectRatio::Wide20x9 => "20:9",
            AspectRatio::Wide19_5x9 => "19.5:9",
            AspectRatio::Wide16x9 => "16:9",
            AspectRatio::Wide4x3 => "4:3",
            AspectRatio::Wide3x2 => "3:2",
            AspectRatio::Square => "1:1",
            AspectRatio::Tall2x3 => "2:3",
            AspectRatio::Tall3x4 => "3:4",
            AspectRatio::Tall9x16 => "9:16",
            AspectRatio::Tall9x19_5 => "9:19.5",
            AspectRatio::Tall9x20 => "9:20",
            AspectRatio::Tall1x2 => "1:2",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == trimmed)
            .ok_or_else(|| {
                let valid = AspectRatio::ALL
                    .iter()
                    .map(|ratio| ratio.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Unknown aspect ratio '{trimmed}'. Supported ratios: {valid}")
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut lowered = raw.trim().to_ascii_lowercase();
        if let Some(value) = lowered.strip_prefix("image/") {
            lowered = value.to_string();
        }
        match lowered.as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::Webp),
            _ => Err(format!(
                "Unknown output format '{}'. Supported formats: jpeg, png, webp",
                raw.trim()
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RequestError(pub String);

/// Text-to-image request handed to a provider.
///
/// The prompt is non-empty and `num_images` is at least 1; both are
/// enforced by the constructor and builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    num_images: u32,
    aspect_ratio: AspectRatio,
    output_format: OutputFormat,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Result<Self, RequestError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(RequestError("prompt must not be empty".to_string()));
        }
        Ok(Self {
            prompt,
            num_images: 1,
            aspect_ratio: AspectRatio::default(),
            output_format: OutputFormat::default(),
        })
    }

    pub fn with_num_images(mut self, num_images: u32) -> Result<Self, RequestError> {
        if num_images == 0 {
            return Err(RequestError("image count must be at least 1".to_string()));
        }
        self.num_images = num_images;
        Ok(self)
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = output_format;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn num_images(&self) -> u32 {
        self.num_images
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }
}

/// A generation request plus the source image to transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    base: GenerationRequest,
    image_url: String,
}

impl EditRequest {
    pub fn new(base: GenerationRequest, image_url: impl Into<String>) -> Result<Self, RequestError> {
        let image_url = image_url.into();
        if image_url.trim().is_empty() {
            return Err(RequestError("source image url must not be empty".to_string()));
        }
        Ok(Self { base, image_url })
    }

    pub fn base(&self) -> &GenerationRequest {
        &self.base
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn prompt(&self) -> &str {
        self.base.prompt()
    }

    pub fn num_images(&self) -> u32 {
        self.base.num_images()
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.base.aspect_ratio()
    }

    pub fn output_format(&self) -> OutputFormat {
        self.base.output_format()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Remote URL or local file path.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl GeneratedImage {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    images: Vec<GeneratedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revised_prompt: Option<String>,
}

impl GenerationResult {
    /// Returns `None` when `images` is empty.
    pub fn from_images(images: Vec<GeneratedImage>, revised_prompt: Option<String>) -> Option<Self> {
        if images.is_empty() {
            return None;
        }
        let revised_prompt = revised_prompt
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Some(Self {
            images,
            revised_prompt,
        })
    }

    pub fn images(&self) -> &[GeneratedImage] {
        &self.images
    }

    pub fn primary(&self) -> &GeneratedImage {
        &self.images[0]
    }

    pub fn revised_prompt(&self) -> Option<&str> {
        self.revised_prompt.as_deref()
    }
}
