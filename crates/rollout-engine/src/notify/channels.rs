//! Built-in notification channels.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use serde_json::json;

use super::{MailChannel, TextChannel};

/// Prints each message on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleChannel;

impl TextChannel for ConsoleChannel {
    fn publish(&self, text: &str) -> anyhow::Result<()> {
        println!("{text}");
        Ok(())
    }
}

/// Emits subject and body as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

impl MailChannel for LogChannel {
    fn publish(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(%subject, %body, "feature flag notification");
        Ok(())
    }
}

/// Posts messages to a Slack incoming webhook as a single mrkdwn section.
pub struct SlackChannel {
    webhook_url: String,
    channel: String,
    username: String,
    client: reqwest::blocking::Client,
}

impl SlackChannel {
    pub const DEFAULT_USERNAME: &'static str = "rollout";

    pub fn new(webhook_url: &str, channel: &str, username: Option<&str>) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("building slack http client")?;
        Ok(Self {
            webhook_url: webhook_url.to_string(),
            channel: channel.to_string(),
            username: username.unwrap_or(Self::DEFAULT_USERNAME).to_string(),
            client,
        })
    }

    /// Webhook payload for `text`.
    pub fn payload(&self, text: &str) -> serde_json::Value {
        json!({
            "channel": self.channel,
            "username": self.username,
            "blocks": [
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": text }
                }
            ]
        })
    }
}

impl TextChannel for SlackChannel {
    fn publish(&self, text: &str) -> anyhow::Result<()> {
        self.client
            .post(&self.webhook_url)
            .json(&self.payload(text))
            .send()
            .context("posting to slack webhook")?
            .error_for_status()
            .context("slack webhook rejected the message")?;
        Ok(())
    }
}

/// One message captured by a [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Present when the message went through the subject+body capability.
    pub subject: Option<String>,
    pub text: String,
}

/// Keeps every published message in memory. Clones share the same log,
/// so a handle can be registered with a notifier and inspected later.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    log: Arc<Mutex<Vec<Published>>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Published> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }

    fn push(&self, message: Published) -> anyhow::Result<()> {
        self.log
            .lock()
            .map_err(|e| anyhow::anyhow!("recording channel poisoned: {e}"))?
            .push(message);
        Ok(())
    }
}

impl TextChannel for RecordingChannel {
    fn publish(&self, text: &str) -> anyhow::Result<()> {
        self.push(Published {
            subject: None,
            text: text.to_string(),
        })
    }
}

impl MailChannel for RecordingChannel {
    fn publish(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        self.push(Published {
            subject: Some(subject.to_string()),
            text: body.to_string(),
        })
    }
}
