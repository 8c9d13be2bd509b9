pub mod flags;
pub mod migrate;

use std::path::{Path, PathBuf};

use anyhow::Context;
use rollout_engine::{Rollout, RolloutConfig};

/// Store file used when neither `--db` nor `[store].path` names one.
pub const DEFAULT_DB: &str = "rollout.redb";

/// Build the engine from an optional config file. The CLI always runs on a
/// redb file: `--db`, then `[store].path`, then [`DEFAULT_DB`].
pub fn open(config: Option<&Path>, db: Option<PathBuf>) -> anyhow::Result<Rollout> {
    let mut config = match config {
        Some(path) => RolloutConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RolloutConfig::default(),
    };
    config.store.path = Some(db_path(&config, db));

    let store = config.open_store().context("opening flag store")?;
    Ok(config.build(store)?)
}

fn db_path(config: &RolloutConfig, db: Option<PathBuf>) -> PathBuf {
    db.or_else(|| config.store.path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB))
}
