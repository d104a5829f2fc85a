//! Hands a generated image to the external agent for posting.
//!
//! Two mutually exclusive transports: the agent's CLI as a subprocess, or
//! an HTTP POST to its local gateway. Neither retries.

use std::process::Command;

use clawra_contracts::{DeliveryMessage, GatewayMessage};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::config::{GatewaySettings, RuntimeConfig};
use crate::error::{ClawraError, Result};
use crate::providers::http_client;

pub trait Deliver {
    fn deliver(&self, message: &DeliveryMessage) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    #[default]
    Subprocess,
    Gateway,
}

#[derive(Debug, Clone)]
pub struct MessageDispatcher {
    command: Vec<String>,
    gateway: GatewaySettings,
    mode: DeliveryMode,
}

impl MessageDispatcher {
    pub fn new(config: &RuntimeConfig, mode: DeliveryMode) -> Self {
        Self {
            command: config.delivery_command.clone(),
            gateway: config.gateway.clone(),
            mode,
        }
    }

    pub fn deliver_with(&self, message: &DeliveryMessage, use_subprocess: bool) -> Result<()> {
        if use_subprocess {
            self.send_via_subprocess(message)
        } else {
            self.send_via_gateway(message)
        }
    }

    fn send_via_subprocess(&self, message: &DeliveryMessage) -> Result<()> {
        let Some((program, leading)) = self.command.split_first() else {
            return Err(ClawraError::DeliveryFailed {
                reason: "no delivery command configured".to_string(),
            });
        };
        debug!(program = %program, channel = %message.channel, "delivering via subprocess");
        let output = Command::new(program)
            .args(leading)
            .args([
                "--action",
                "send",
                "--channel",
                message.channel.as_str(),
                "--message",
                message.caption.as_str(),
                "--media",
                message.media_reference.as_str(),
            ])
            .output()
            .map_err(|err| ClawraError::DeliveryFailed {
                reason: format!("failed to launch {program}: {err}"),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClawraError::DeliveryFailed {
                reason: format!("{program} exited with {}: {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }

    fn send_via_gateway(&self, message: &DeliveryMessage) -> Result<()> {
        let endpoint = format!("{}/message", self.gateway.base_url.trim_end_matches('/'));
        debug!(endpoint = %endpoint, channel = %message.channel, "delivering via gateway");
        let failed = |reason: String| ClawraError::DeliveryFailed { reason };

        let http = http_client(self.gateway.timeout)
            .map_err(|err| failed(format!("failed to build gateway client: {err}")))?;
        let mut request = http
            .post(&endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&GatewayMessage::from(message));
        if let Some(token) = self.gateway.token.as_deref() {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|err| failed(format!("gateway request to {endpoint} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .map_err(|err| failed(format!("gateway returned {status} with unreadable body: {err}")))?;
            return Err(failed(format!(
                "gateway returned {}: {body}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

impl Deliver for MessageDispatcher {
    fn deliver(&self, message: &DeliveryMessage) -> Result<()> {
        self.deliver_with(message, self.mode == DeliveryMode::Subprocess)
    }
}

#[cfg(test)]
mod tests {
    use clawra_contracts::DeliveryMessage;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use super::{Deliver, DeliveryMode, MessageDispatcher};
    use crate::config::RuntimeConfig;
    use crate::error::ClawraError;

    fn message() -> DeliveryMessage {
        DeliveryMessage::new("#art", "Generated with Clawra", "https://x/1.jpg")
    }

    fn gateway_config(server: &MockServer, token: Option<&str>) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.gateway.base_url = server.base_url().to_string();
        config.gateway.token = token.map(str::to_string);
        config
    }

    #[test]
    fn gateway_posts_send_action_with_bearer() -> anyhow::Result<()> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/message")
                .header("authorization", "Bearer gw-token")
                .json_body(json!({
                    "action": "send",
                    "channel": "#art",
                    "message": "Generated with Clawra",
                    "media": "https://x/1.jpg",
                }));
            then.status(200).json_body(json!({ "ok": true }));
        });
        let config = gateway_config(&server, Some("gw-token"));
        MessageDispatcher::new(&config, DeliveryMode::Gateway).deliver(&message())?;

        mock.assert();
        Ok(())
    }

    #[test]
    fn gateway_without_token_sends_no_authorization() -> anyhow::Result<()> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/message")
                .header_missing("authorization");
            then.status(200).json_body(json!({}));
        });
        let config = gateway_config(&server, None);
        MessageDispatcher::new(&config, DeliveryMode::Gateway).deliver(&message())?;
        mock.assert();
        Ok(())
    }

    #[test]
    fn gateway_error_status_is_delivery_failure() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/message");
            then.status(502).body("channel offline");
        });
        let config = gateway_config(&server, None);
        let err = MessageDispatcher::new(&config, DeliveryMode::Gateway)
            .deliver(&message())
            .unwrap_err();
        match err {
            ClawraError::DeliveryFailed { reason } => {
                assert!(reason.contains("502"));
                assert!(reason.contains("channel offline"));
            }
            other => panic!("unexpected error: {other}"),
        }
        mock.assert_hits(1);
    }

    #[test]
    fn unusable_gateway_url_is_delivery_failure() {
        let mut config = RuntimeConfig::default();
        config.gateway.base_url = "not a url".to_string();
        let err = MessageDispatcher::new(&config, DeliveryMode::Gateway)
            .deliver(&message())
            .unwrap_err();
        assert!(matches!(err, ClawraError::DeliveryFailed { ref reason } if reason.contains("gateway request")));
    }

    #[test]
    fn missing_program_is_delivery_failure() {
        let mut config = RuntimeConfig::default();
        config.delivery_command = vec!["clawra-test-no-such-program".to_string()];
        let err = MessageDispatcher::new(&config, DeliveryMode::Subprocess)
            .deliver(&message())
            .unwrap_err();
        assert!(matches!(err, ClawraError::DeliveryFailed { ref reason } if reason.contains("failed to launch")));
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_receives_flags_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = temp.path().join("args.txt");
        let mut config = RuntimeConfig::default();
        config.delivery_command = vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("printf '%s\\n' \"$@\" > '{}'", log.display()),
            "openclaw".to_string(),
        ];
        MessageDispatcher::new(&config, DeliveryMode::Subprocess).deliver(&message())?;

        let args = std::fs::read_to_string(&log)?;
        assert_eq!(
            args.lines().collect::<Vec<_>>(),
            vec![
                "--action",
                "send",
                "--channel",
                "#art",
                "--message",
                "Generated with Clawra",
                "--media",
                "https://x/1.jpg",
            ]
        );
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_delivery_failure() {
        let mut config = RuntimeConfig::default();
        config.delivery_command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'unknown channel' >&2; exit 3".to_string(),
            "openclaw".to_string(),
        ];
        let err = MessageDispatcher::new(&config, DeliveryMode::Subprocess)
            .deliver_with(&message(), true)
            .unwrap_err();
        assert!(matches!(err, ClawraError::DeliveryFailed { ref reason } if reason.contains("unknown channel")));
    }
}
