use serde::Serialize;

pub const DEFAULT_CAPTION: &str = "Generated with Clawra";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMessage {
    pub channel: String,
    pub caption: String,
    pub media_reference: String,
}

impl DeliveryMessage {
    pub fn new(
        channel: impl Into<String>,
        caption: impl Into<String>,
        media_reference: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            caption: caption.into(),
            media_reference: media_reference.into(),
        }
    }
}

/// Wire shape posted to the agent gateway's `/message` route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayMessage {
    pub action: String,
    pub channel: String,
    pub message: String,
    pub media: String,
}

impl From<&DeliveryMessage> for GatewayMessage {
    fn from(message: &DeliveryMessage) -> Self {
        Self {
            action: "send".to_string(),
            channel: message.channel.clone(),
            message: message.caption.clone(),
            media: message.media_reference.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub success: bool,
    pub image_url: String,
    pub channel: String,
    pub prompt: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}
