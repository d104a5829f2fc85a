pub mod config;
pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod registry;

pub use config::RuntimeConfig;
pub use dispatcher::{Deliver, DeliveryMode, MessageDispatcher};
pub use error::{ClawraError, Result};
pub use orchestrator::{edit_image, generate_image, Generated, Orchestrator, SendOptions};
pub use providers::{build_provider, ImageEditor, ImageProvider};
pub use registry::ProviderRegistry;
