//! rollout.toml configuration.
//!
//! ```toml
//! [store]
//! path = "/var/lib/rollout/flags.redb"
//!
//! [keys]
//! prefix = "rollout"
//! legacy_prefix = "feature"
//!
//! [cache]
//! expires_in_secs = 300
//!
//! [degrade]
//! min = 100
//! threshold = 0.1
//!
//! [legacy]
//! auto_migrate = true
//!
//! [[notifications.status_change]]
//! kind = "console"
//!
//! [[notifications.degrade]]
//! kind = "slack"
//! webhook_url = "https://hooks.slack.com/services/..."
//! channel = "#releases"
//! ```
//!
//! Every section is optional. A missing section leaves the matching
//! engine feature disabled.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rollout_store::{KeyValueStore, MemoryStore, RedbStore};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::degrade::DegradeConfig;
use crate::engine::Rollout;
use crate::error::{RolloutError, RolloutResult};
use crate::keys::KeySpace;
use crate::notify::{Channel, ConsoleChannel, LogChannel, Notifier, SlackChannel};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    pub store: StoreConfig,
    pub keys: KeySpace,
    pub cache: Option<CacheSection>,
    pub degrade: Option<DegradeSection>,
    pub legacy: Option<LegacySection>,
    pub counters: Option<CountersSection>,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// redb file. Without one the engine runs on an in-memory store.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_secs")]
    pub expires_in_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DegradeSection {
    pub min: Option<u64>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacySection {
    #[serde(default)]
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountersSection {
    /// Use compare-and-swap for counter updates.
    #[serde(default)]
    pub atomic: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub status_change: Vec<ChannelConfig>,
    pub degrade: Vec<ChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelConfig {
    Console,
    Log,
    Slack {
        webhook_url: Option<String>,
        channel: Option<String>,
        username: Option<String>,
    },
}

fn default_cache_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    5
}

impl DegradeSection {
    pub fn to_config(&self) -> DegradeConfig {
        let defaults = DegradeConfig::default();
        DegradeConfig {
            min: self.min.unwrap_or(defaults.min),
            threshold: self.threshold.unwrap_or(defaults.threshold),
        }
    }
}

impl ChannelConfig {
    fn build(&self) -> RolloutResult<Channel> {
        match self {
            Self::Console => Ok(Channel::text(ConsoleChannel)),
            Self::Log => Ok(Channel::mail(LogChannel)),
            Self::Slack {
                webhook_url,
                channel,
                username,
            } => {
                let url = webhook_url
                    .as_deref()
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| {
                        RolloutError::Configuration("slack channel needs a webhook_url".into())
                    })?;
                let slack = SlackChannel::new(
                    url,
                    channel.as_deref().unwrap_or_default(),
                    username.as_deref(),
                )
                .map_err(|e| RolloutError::Configuration(format!("{e:#}")))?;
                Ok(Channel::text(slack))
            }
        }
    }
}

impl NotificationsConfig {
    pub fn build(&self) -> RolloutResult<Notifier> {
        let status_change = self
            .status_change
            .iter()
            .map(ChannelConfig::build)
            .collect::<RolloutResult<Vec<_>>>()?;
        let degrade = self
            .degrade
            .iter()
            .map(ChannelConfig::build)
            .collect::<RolloutResult<Vec<_>>>()?;
        Ok(Notifier::new(status_change, degrade))
    }
}

impl RolloutConfig {
    pub fn from_file(path: &Path) -> RolloutResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RolloutError::Configuration(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> RolloutResult<Self> {
        toml::from_str(content).map_err(|e| RolloutError::Configuration(e.to_string()))
    }

    pub fn to_toml_string(&self) -> RolloutResult<String> {
        toml::to_string_pretty(self).map_err(|e| RolloutError::Configuration(e.to_string()))
    }

    /// Open the configured store: redb when a path is set, memory otherwise.
    pub fn open_store(&self) -> RolloutResult<Arc<dyn KeyValueStore>> {
        match &self.store.path {
            Some(path) => Ok(Arc::new(RedbStore::open(path)?)),
            None => Ok(Arc::new(MemoryStore::new())),
        }
    }

    /// Assemble an engine on `store`. Invalid degrade thresholds and
    /// unusable notification channels are rejected here, before any flag
    /// is touched.
    pub fn build(&self, store: Arc<dyn KeyValueStore>) -> RolloutResult<Rollout> {
        let usable = |p: &str| !p.is_empty() && !p.contains(':');
        if !usable(&self.keys.prefix)
            || !usable(&self.keys.legacy_prefix)
            || self.keys.prefix == self.keys.legacy_prefix
        {
            return Err(RolloutError::Configuration(format!(
                "key prefixes must be non-empty, distinct and free of ':', got {:?} and {:?}",
                self.keys.prefix, self.keys.legacy_prefix
            )));
        }

        let mut rollout = Rollout::with_shared_store(store).with_keyspace(self.keys.clone());

        if let Some(cache) = &self.cache {
            rollout = rollout.with_cache(CacheConfig::with_ttl(Duration::from_secs(
                cache.expires_in_secs,
            )));
        }
        if let Some(degrade) = &self.degrade {
            let config = degrade.to_config();
            config.validate()?;
            rollout = rollout.with_degrade(config);
        }
        if let Some(legacy) = &self.legacy {
            rollout = rollout.with_legacy_compatibility(legacy.auto_migrate);
        }
        if let Some(counters) = self.counters.as_ref().filter(|c| c.atomic) {
            rollout = rollout.with_atomic_counters(counters.max_retries);
        }

        let notifier = self.notifications.build()?;
        if !notifier.is_empty() {
            rollout = rollout.with_notifications(notifier);
        }
        Ok(rollout)
    }
}
