//! Engine error types.
//!
//! Every failure is fatal to the current invocation; nothing here is
//! retried. Variants carry the detail the CLI prints to the user.

use clawra_contracts::RequestError;

#[derive(Debug, thiserror::Error)]
pub enum ClawraError {
    #[error("{var} environment variable not set. Get your key from {key_url}")]
    MissingCredential {
        var: &'static str,
        key_url: &'static str,
    },

    #[error("Unknown image provider: \"{name}\". Supported providers: {}", valid.join(", "))]
    UnknownProvider { name: String, valid: Vec<String> },

    #[error("{provider} request failed ({status}): {body}")]
    ProviderRequestFailed {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} returned no image data in the response")]
    EmptyProviderResponse { provider: String },

    #[error("Failed to fetch reference image {source_ref}: {reason}")]
    SourceImageFetchFailed { source_ref: String, reason: String },

    #[error("delivery failed: {reason}")]
    DeliveryFailed { reason: String },

    #[error("{provider} does not support image editing")]
    EditUnsupported { provider: String },

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("{provider} returned an unusable response: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClawraError>;
