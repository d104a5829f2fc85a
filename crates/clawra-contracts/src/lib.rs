pub mod delivery;
pub mod images;
pub mod providers;

pub use delivery::{DeliveryMessage, DeliveryOutcome, GatewayMessage, DEFAULT_CAPTION};
pub use images::{
    AspectRatio, EditRequest, GeneratedImage, GenerationRequest, GenerationResult, OutputFormat,
    RequestError,
};
pub use providers::{ProviderId, ProviderIdentity, DEFAULT_PROVIDER};
