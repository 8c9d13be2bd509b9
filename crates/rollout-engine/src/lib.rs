//! rollout-engine — percentage-based feature flags that switch themselves
//! off when the code they guard keeps failing.
//!
//! # Components
//!
//! - **`feature`**: the persisted flag record and its JSON encoding
//! - **`bucket`**: stable CRC32 bucketing of determinators
//! - **`cache`**: TTL cache used as a fallback when the store fails
//! - **`legacy`**: reader for the old `|`-delimited encoding
//! - **`degrade`**: error-rate gate that forces failing flags off
//! - **`notify`**: lifecycle notifications over pluggable channels
//! - **`engine`**: the [`Rollout`] orchestrator
//! - **`config`**: `rollout.toml` loading
//!
//! # Example
//!
//! ```
//! use rollout_engine::{DegradeConfig, Rollout};
//! use rollout_store::MemoryStore;
//!
//! let rollout = Rollout::new(MemoryStore::new()).with_degrade(DegradeConfig::default());
//! rollout.activate_percentage("new-search", 100).unwrap();
//!
//! let hits = rollout
//!     .with_feature_flag("new-search", Some("user-42"), || Ok::<_, std::io::Error>(3))
//!     .unwrap();
//! assert_eq!(hits, Some(3));
//! ```

pub mod bucket;
pub mod cache;
pub mod config;
pub mod degrade;
pub mod engine;
pub mod error;
pub mod feature;
pub mod keys;
pub mod legacy;
pub mod notify;

pub use cache::{CacheConfig, FeatureCache};
pub use config::RolloutConfig;
pub use degrade::{DegradeConfig, DegradeController, DegradeVerdict};
pub use engine::{CounterMode, MigrateOptions, MigratedFlag, MigrationReport, Rollout};
pub use error::{GuardError, RolloutError, RolloutResult};
pub use feature::{Feature, FeatureSummary};
pub use keys::KeySpace;
pub use notify::{Channel, Event, MailChannel, Notifier, TextChannel};
