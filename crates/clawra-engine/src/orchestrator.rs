use clawra_contracts::{
    AspectRatio, DeliveryMessage, DeliveryOutcome, EditRequest, GenerationRequest,
    GenerationResult, OutputFormat, RequestError, DEFAULT_CAPTION,
};
use tracing::info;

use crate::dispatcher::Deliver;
use crate::error::{ClawraError, Result};
use crate::registry::ProviderRegistry;

/// Optional knobs for a prompt-to-channel run. Unset fields take the
/// defaults: caption `Generated with Clawra`, square, jpeg, configured
/// provider.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub caption: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
    pub output_format: Option<OutputFormat>,
    pub provider: Option<String>,
}

impl SendOptions {
    fn caption(&self) -> &str {
        self.caption
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CAPTION)
    }

    fn request(&self, prompt: &str) -> Result<GenerationRequest> {
        Ok(GenerationRequest::new(prompt)?
            .with_aspect_ratio(self.aspect_ratio.unwrap_or_default())
            .with_output_format(self.output_format.unwrap_or_default()))
    }
}

/// A normalized result together with the adapter that produced it.
#[derive(Debug, Clone)]
pub struct Generated {
    pub provider: &'static str,
    pub result: GenerationResult,
}

pub fn generate_image(
    registry: &ProviderRegistry<'_>,
    provider: Option<&str>,
    request: &GenerationRequest,
) -> Result<Generated> {
    let adapter = registry.resolve(provider)?;
    info!(provider = adapter.name(), "generating image");
    info!(prompt = request.prompt(), aspect_ratio = %request.aspect_ratio(), "request");
    let result = adapter.generate(request)?;
    Ok(Generated {
        provider: adapter.name(),
        result,
    })
}

pub fn edit_image(
    registry: &ProviderRegistry<'_>,
    provider: Option<&str>,
    request: &EditRequest,
) -> Result<Generated> {
    let adapter = registry.resolve(provider)?;
    let Some(editor) = adapter.editor() else {
        return Err(ClawraError::EditUnsupported {
            provider: adapter.name().to_string(),
        });
    };
    info!(provider = adapter.name(), source = request.image_url(), "editing image");
    let result = editor.edit(request)?;
    Ok(Generated {
        provider: adapter.name(),
        result,
    })
}

/// Prompt → provider → first image → channel, strictly in that order.
/// Nothing is delivered unless generation succeeded.
pub struct Orchestrator<'a> {
    registry: ProviderRegistry<'a>,
    dispatcher: &'a dyn Deliver,
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: ProviderRegistry<'a>, dispatcher: &'a dyn Deliver) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    pub fn generate_and_deliver(
        &self,
        prompt: &str,
        channel: &str,
        options: &SendOptions,
    ) -> Result<DeliveryOutcome> {
        require_channel(channel)?;
        let request = options.request(prompt)?;
        let generated = generate_image(&self.registry, options.provider.as_deref(), &request)?;
        self.deliver(prompt, channel, options.caption(), generated)
    }

    pub fn edit_and_deliver(
        &self,
        prompt: &str,
        image_url: &str,
        channel: &str,
        options: &SendOptions,
    ) -> Result<DeliveryOutcome> {
        require_channel(channel)?;
        let request = EditRequest::new(options.request(prompt)?, image_url)?;
        let generated = edit_image(&self.registry, options.provider.as_deref(), &request)?;
        self.deliver(prompt, channel, options.caption(), generated)
    }

    fn deliver(
        &self,
        prompt: &str,
        channel: &str,
        caption: &str,
        generated: Generated,
    ) -> Result<DeliveryOutcome> {
        let image_url = generated.result.primary().url.clone();
        info!(image = %image_url, "image generated");
        if let Some(revised) = generated.result.revised_prompt() {
            info!(revised_prompt = revised, "provider revised the prompt");
        }

        info!(channel, "sending to channel");
        self.dispatcher
            .deliver(&DeliveryMessage::new(channel, caption, image_url.as_str()))?;
        info!(channel, "done");

        Ok(DeliveryOutcome {
            success: true,
            image_url,
            channel: channel.to_string(),
            prompt: prompt.to_string(),
            provider: generated.provider.to_string(),
            revised_prompt: generated.result.revised_prompt().map(str::to_string),
        })
    }
}

fn require_channel(channel: &str) -> Result<()> {
    if channel.trim().is_empty() {
        return Err(RequestError("channel must not be empty".to_string()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use clawra_contracts::{AspectRatio, DeliveryMessage, ProviderId};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use super::{Orchestrator, SendOptions};
    use crate::config::RuntimeConfig;
    use crate::dispatcher::Deliver;
    use crate::error::{ClawraError, Result};
    use crate::registry::ProviderRegistry;

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: RefCell<Vec<DeliveryMessage>>,
    }

    impl Deliver for RecordingDispatcher {
        fn deliver(&self, message: &DeliveryMessage) -> Result<()> {
            self.sent.borrow_mut().push(message.clone());
            Ok(())
        }
    }

    fn config_for(id: ProviderId, server: &MockServer) -> RuntimeConfig {
        RuntimeConfig::default()
            .with_api_base(id, server.base_url())
            .with_credential(id, "test-key")
    }

    fn fal_options() -> SendOptions {
        SendOptions {
            provider: Some("fal".to_string()),
            ..SendOptions::default()
        }
    }

    #[test]
    fn generates_then_delivers_once() -> anyhow::Result<()> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/xai/grok-imagine-image")
                .json_body(json!({
                    "prompt": "A cyberpunk city",
                    "num_images": 1,
                    "aspect_ratio": "1:1",
                    "output_format": "jpeg",
                }));
            then.status(200).json_body(json!({
                "images": [{ "url": "https://x/1.jpg", "width": 512, "height": 512 }]
            }));
        });
        let config = config_for(ProviderId::Fal, &server);
        let dispatcher = RecordingDispatcher::default();
        let orchestrator = Orchestrator::new(ProviderRegistry::new(&config), &dispatcher);

        let outcome = orchestrator.generate_and_deliver("A cyberpunk city", "#art", &fal_options())?;

        mock.assert();
        assert!(outcome.success);
        assert_eq!(outcome.image_url, "https://x/1.jpg");
        assert_eq!(outcome.channel, "#art");
        assert_eq!(outcome.prompt, "A cyberpunk city");
        assert_eq!(outcome.provider, "fal.ai (Grok Imagine)");
        assert_eq!(outcome.revised_prompt, None);

        let sent = dispatcher.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].media_reference, "https://x/1.jpg");
        assert_eq!(sent[0].caption, "Generated with Clawra");
        assert_eq!(sent[0].channel, "#art");
        Ok(())
    }

    #[test]
    fn vendor_failure_never_reaches_dispatcher() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(500).body("internal error");
        });
        let config = config_for(ProviderId::Fal, &server);
        let dispatcher = RecordingDispatcher::default();
        let orchestrator = Orchestrator::new(ProviderRegistry::new(&config), &dispatcher);

        let err = orchestrator
            .generate_and_deliver("A cyberpunk city", "#art", &fal_options())
            .unwrap_err();

        assert!(matches!(
            err,
            ClawraError::ProviderRequestFailed { status: 500, ref body, .. } if body == "internal error"
        ));
        assert!(dispatcher.sent.borrow().is_empty());
    }

    #[test]
    fn unknown_provider_never_reaches_vendor_or_dispatcher() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({}));
        });
        let config = config_for(ProviderId::Fal, &server);
        let dispatcher = RecordingDispatcher::default();
        let orchestrator = Orchestrator::new(ProviderRegistry::new(&config), &dispatcher);
        let options = SendOptions {
            provider: Some("bogus".to_string()),
            ..SendOptions::default()
        };

        let err = orchestrator
            .generate_and_deliver("boat", "#art", &options)
            .unwrap_err();
        assert!(matches!(err, ClawraError::UnknownProvider { .. }));
        mock.assert_hits(0);
        assert!(dispatcher.sent.borrow().is_empty());
    }

    #[test]
    fn options_flow_into_request_and_caption() -> anyhow::Result<()> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/images/generations")
                .body_includes("\"aspect_ratio\":\"9:16\"");
            then.status(200)
                .json_body(json!({ "data": [{ "url": "https://imgen.x.ai/1.jpg" }] }));
        });
        let mut config = config_for(ProviderId::Xai, &server);
        config.default_provider = Some("xai".to_string());
        let dispatcher = RecordingDispatcher::default();
        let orchestrator = Orchestrator::new(ProviderRegistry::new(&config), &dispatcher);
        let options = SendOptions {
            caption: Some("Check this!".to_string()),
            aspect_ratio: Some(AspectRatio::Tall9x16),
            ..SendOptions::default()
        };

        let outcome = orchestrator.generate_and_deliver("A sunset", "@me", &options)?;

        mock.assert();
        assert_eq!(outcome.provider, "x.ai (Grok Imagine Direct)");
        assert_eq!(dispatcher.sent.borrow()[0].caption, "Check this!");
        Ok(())
    }

    #[test]
    fn edit_on_generation_only_provider_is_rejected_up_front() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({}));
        });
        let config = config_for(ProviderId::Openai, &server);
        let dispatcher = RecordingDispatcher::default();
        let orchestrator = Orchestrator::new(ProviderRegistry::new(&config), &dispatcher);
        let options = SendOptions {
            provider: Some("openai".to_string()),
            ..SendOptions::default()
        };

        let err = orchestrator
            .edit_and_deliver("add a hat", "https://x/me.jpg", "#art", &options)
            .unwrap_err();
        assert!(matches!(err, ClawraError::EditUnsupported { .. }));
        mock.assert_hits(0);
        assert!(dispatcher.sent.borrow().is_empty());
    }

    #[test]
    fn edit_delivers_edited_image() -> anyhow::Result<()> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/xai/grok-imagine-image/edit");
            then.status(200).json_body(json!({
                "images": [{ "url": "https://x/edited.jpg" }],
                "revised_prompt": "hat on",
            }));
        });
        let config = config_for(ProviderId::Fal, &server);
        let dispatcher = RecordingDispatcher::default();
        let orchestrator = Orchestrator::new(ProviderRegistry::new(&config), &dispatcher);

        let outcome =
            orchestrator.edit_and_deliver("add a hat", "https://x/me.jpg", "#art", &fal_options())?;
        mock.assert();
        assert_eq!(outcome.image_url, "https://x/edited.jpg");
        assert_eq!(outcome.revised_prompt.as_deref(), Some("hat on"));
        assert_eq!(dispatcher.sent.borrow().len(), 1);
        Ok(())
    }

    #[test]
    fn blank_channel_is_invalid() {
        let config = RuntimeConfig::default();
        let dispatcher = RecordingDispatcher::default();
        let orchestrator = Orchestrator::new(ProviderRegistry::new(&config), &dispatcher);
        let err = orchestrator
            .generate_and_deliver("boat", " ", &SendOptions::default())
            .unwrap_err();
        assert!(matches!(err, ClawraError::InvalidRequest(_)));
    }
}
