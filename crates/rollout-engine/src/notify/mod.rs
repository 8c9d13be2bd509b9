//! Notifications for flag lifecycle events.
//!
//! Channels come in two capabilities: text-only ([`TextChannel`]) and
//! subject plus body ([`MailChannel`]). A [`Notifier`] keeps one channel
//! list for status changes (activate/deactivate) and one for degrade
//! events, and renders each event in the shape the channel accepts.
//!
//! Publishing is best-effort: a failing channel is logged and skipped,
//! and never changes the result of the engine operation that triggered it.

pub mod channels;

use std::sync::Arc;

use tracing::warn;

pub use channels::{ConsoleChannel, LogChannel, Published, RecordingChannel, SlackChannel};

/// A channel that accepts a single text message.
pub trait TextChannel: Send + Sync {
    fn publish(&self, text: &str) -> anyhow::Result<()>;
}

/// A channel that accepts a subject line and a body.
pub trait MailChannel: Send + Sync {
    fn publish(&self, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// A configured channel, tagged by the publish capability it offers.
#[derive(Clone)]
pub enum Channel {
    Text(Arc<dyn TextChannel>),
    Mail(Arc<dyn MailChannel>),
}

impl Channel {
    pub fn text(channel: impl TextChannel + 'static) -> Self {
        Self::Text(Arc::new(channel))
    }

    pub fn mail(channel: impl MailChannel + 'static) -> Self {
        Self::Mail(Arc::new(channel))
    }

    fn deliver(&self, event: &Event) -> anyhow::Result<()> {
        let text = event.text();
        match self {
            Self::Text(c) => c.publish(&text),
            Self::Mail(c) => c.publish(event.subject(), &text),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Mail(_) => "mail",
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Channel").field(&self.kind()).finish()
    }
}

/// A flag lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Activated { name: String, percentage: u8 },
    Deactivated { name: String },
    Degraded { name: String, requests: u64, errors: u64 },
}

impl Event {
    pub fn feature(&self) -> &str {
        match self {
            Self::Activated { name, .. }
            | Self::Deactivated { name }
            | Self::Degraded { name, .. } => name,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::Activated { .. } => "Feature flag has been activated!",
            Self::Deactivated { .. } => "Feature flag has been deactivated!",
            Self::Degraded { .. } => "Feature flag has been automatically deactivated!",
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::Activated { name, percentage } => {
                format!("Feature flag '{name}' has been activated with percentage {percentage}!")
            }
            Self::Deactivated { name } => {
                format!("Feature flag '{name}' has been deactivated and deleted!")
            }
            Self::Degraded {
                name,
                requests,
                errors,
            } => format!(
                "Feature flag '{name}' has been degraded after {requests} requests and {errors} errors"
            ),
        }
    }

    fn is_degrade(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Fans events out to the configured channels.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    status_change: Vec<Channel>,
    degrade: Vec<Channel>,
}

impl Notifier {
    pub fn new(status_change: Vec<Channel>, degrade: Vec<Channel>) -> Self {
        Self {
            status_change,
            degrade,
        }
    }

    pub fn on_status_change(mut self, channel: Channel) -> Self {
        self.status_change.push(channel);
        self
    }

    pub fn on_degrade(mut self, channel: Channel) -> Self {
        self.degrade.push(channel);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status_change.is_empty() && self.degrade.is_empty()
    }

    /// Publish `event` to every channel subscribed to its kind.
    pub fn notify(&self, event: &Event) {
        let channels = if event.is_degrade() {
            &self.degrade
        } else {
            &self.status_change
        };

        for channel in channels {
            if let Err(e) = channel.deliver(event) {
                warn!(
                    feature = %event.feature(),
                    channel = channel.kind(),
                    error = %e,
                    "notification publish failed"
                );
            }
        }
    }
}
