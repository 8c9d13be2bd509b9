//! Rollout: the feature-flag engine.
//!
//! Every operation is a synchronous exchange with the backing store on the
//! caller's thread. Reads go to the store first; the cache is only a
//! fallback for store failures. Counter updates are read-modify-write and
//! last-writer-wins unless [`Rollout::with_atomic_counters`] is set.

use std::sync::Arc;

use chrono::Utc;
use rollout_store::KeyValueStore;
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, FeatureCache};
use crate::degrade::{DegradeConfig, DegradeController};
use crate::error::{GuardError, RolloutError, RolloutResult};
use crate::feature::{Feature, FeatureSummary};
use crate::keys::KeySpace;
use crate::legacy;
use crate::notify::{Event, Notifier};

/// How usage counters are written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterMode {
    /// Write the whole record read earlier. Concurrent increments can be lost.
    #[default]
    LastWriterWins,
    /// Re-read and compare-and-swap, retrying up to `max_retries` times.
    CompareAndSwap { max_retries: u32 },
}

#[derive(Debug, Clone, Copy)]
enum Counter {
    Request,
    Error,
}

/// Options for [`Rollout::migrate_legacy_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateOptions {
    /// Leave flags that already have a current-format record untouched.
    pub skip_existing: bool,
}

/// One legacy record written in the current format.
#[derive(Debug, Clone, PartialEq)]
pub struct MigratedFlag {
    pub name: String,
    /// Key the legacy record was read from.
    pub legacy_key: String,
    /// Key the current-format record was written to.
    pub key: String,
    /// Raw legacy value, lossily decoded as UTF-8.
    pub legacy_value: String,
    /// Encoded current-format value that was written.
    pub value: String,
    pub percentage: u8,
}

/// Outcome of a legacy migration run, in store enumeration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Flags written in the current format during this run.
    pub migrated: Vec<MigratedFlag>,
    /// Flags left alone because a current-format record already existed.
    pub skipped: Vec<String>,
}

/// The feature-flag engine.
///
/// `Rollout` is `Send + Sync`; share it behind an `Arc` to use it from
/// several threads.
pub struct Rollout {
    store: Arc<dyn KeyValueStore>,
    keys: KeySpace,
    cache: Option<FeatureCache>,
    degrade: DegradeController,
    /// `Some(auto_migrate)` when legacy records are consulted.
    legacy: Option<bool>,
    notifier: Notifier,
    counters: CounterMode,
}

impl Rollout {
    /// Engine over `store` with every optional feature disabled.
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self::with_shared_store(Arc::new(store))
    }

    /// Like [`Rollout::new`], for a store already behind an `Arc`.
    pub fn with_shared_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            keys: KeySpace::default(),
            cache: None,
            degrade: DegradeController::default(),
            legacy: None,
            notifier: Notifier::default(),
            counters: CounterMode::default(),
        }
    }

    /// Keep a TTL cache of feature reads to fall back on when the store fails.
    pub fn with_cache(mut self, config: CacheConfig) -> Self {
        self.cache = Some(FeatureCache::new(config));
        self
    }

    /// Track requests and errors for every flag, degrading past `defaults`.
    pub fn with_degrade(mut self, defaults: DegradeConfig) -> Self {
        self.degrade = DegradeController::new(Some(defaults));
        self
    }

    /// Publish lifecycle events through `notifier`.
    pub fn with_notifications(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Consult the legacy namespace when a flag has no current record.
    /// With `auto_migrate`, a legacy hit is re-activated in the current format.
    pub fn with_legacy_compatibility(mut self, auto_migrate: bool) -> Self {
        self.legacy = Some(auto_migrate);
        self
    }

    /// Store records under custom current and legacy prefixes.
    pub fn with_keyspace(mut self, keys: KeySpace) -> Self {
        self.keys = keys;
        self
    }

    /// Write counters with compare-and-swap instead of blind overwrites.
    pub fn with_atomic_counters(mut self, max_retries: u32) -> Self {
        self.counters = CounterMode::CompareAndSwap { max_retries };
        self
    }

    /// Key layout in use.
    pub fn keyspace(&self) -> &KeySpace {
        &self.keys
    }

    /// The fallback cache, when enabled.
    pub fn cache(&self) -> Option<&FeatureCache> {
        self.cache.as_ref()
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Store a fresh record for `name`, replacing any previous one.
    ///
    /// Counters restart at zero. `degrade` attaches per-flag thresholds.
    pub fn activate(
        &self,
        name: &str,
        percentage: u32,
        degrade: Option<DegradeConfig>,
    ) -> RolloutResult<()> {
        let percentage = u8::try_from(percentage)
            .ok()
            .filter(|p| *p <= crate::bucket::MAX_PERCENTAGE)
            .ok_or(RolloutError::InvalidPercentage(percentage))?;
        if let Some(config) = &degrade {
            config.validate()?;
        }

        let feature = Feature::new(name, percentage, degrade);
        self.save(&feature)?;
        info!(feature = %name, percentage, degrade = ?degrade, "feature activated");

        if let Some(cache) = &self.cache {
            cache.put(name, feature);
        }
        self.notifier.notify(&Event::Activated {
            name: name.to_string(),
            percentage,
        });
        Ok(())
    }

    /// Activate `name` for `percentage` percent of determinators, without a
    /// per-flag degrade config.
    pub fn activate_percentage(&self, name: &str, percentage: u32) -> RolloutResult<()> {
        self.activate(name, percentage, None)
    }

    /// Activate `name` for everyone.
    pub fn activate_fully(&self, name: &str) -> RolloutResult<()> {
        self.activate(name, 100, None)
    }

    /// Delete the record for `name`. Returns whether one existed.
    pub fn deactivate(&self, name: &str) -> RolloutResult<bool> {
        let removed = self.store.delete(&self.keys.key(name))? > 0;
        if let Some(cache) = &self.cache {
            cache.remove(name);
        }
        info!(feature = %name, removed, "feature deactivated");

        self.notifier.notify(&Event::Deactivated {
            name: name.to_string(),
        });
        Ok(removed)
    }

    // ── Evaluation ─────────────────────────────────────────────────

    /// Whether `name` is active for `determinator`.
    ///
    /// A missing flag is inactive. When the flag is active and tracked for
    /// degrade, its request counter is bumped; failing to persist that
    /// bump does not change the answer.
    pub fn is_active(&self, name: &str, determinator: Option<&str>) -> RolloutResult<bool> {
        let feature = match self.feature(name)? {
            Some(feature) => feature,
            None => match self.legacy_feature(name)? {
                Some(feature) => feature,
                None => return Ok(false),
            },
        };

        let active = feature.is_active(determinator);
        debug!(feature = %name, percentage = feature.percentage, active, "feature evaluated");

        if active && self.degrade.tracks(&feature) {
            if let Err(e) = self.bump(feature, Counter::Request) {
                warn!(feature = %name, error = %e, "failed to record request");
            }
        }
        Ok(active)
    }

    /// Run `block` only if `name` is active for `determinator`.
    ///
    /// Returns `Ok(None)` when the flag is off. If the block fails, the
    /// error is counted against the flag (possibly degrading it) and then
    /// handed back unchanged as [`GuardError::Caller`]. Failure to evaluate
    /// the flag is [`GuardError::Engine`] and is never counted.
    pub fn with_feature_flag<T, E, F>(
        &self,
        name: &str,
        determinator: Option<&str>,
        block: F,
    ) -> Result<Option<T>, GuardError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.is_active(name, determinator).map_err(GuardError::Engine)? {
            return Ok(None);
        }

        match block() {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.record_failure(name);
                Err(GuardError::Caller(e))
            }
        }
    }

    /// Current-format record for `name`.
    ///
    /// Reads the store; on a store failure, serves an unexpired cache entry
    /// if there is one, otherwise fails with `StoreUnavailable`.
    pub fn feature(&self, name: &str) -> RolloutResult<Option<Feature>> {
        let key = self.keys.key(name);
        match self.store.get(&key) {
            Ok(Some(raw)) => {
                let feature = Feature::decode(name, &key, &raw)?;
                if let Some(cache) = &self.cache {
                    cache.put(name, feature.clone());
                }
                Ok(Some(feature))
            }
            Ok(None) => {
                if let Some(cache) = &self.cache {
                    cache.remove(name);
                }
                Ok(None)
            }
            Err(e) => match self.cache.as_ref().and_then(|c| c.get(name)) {
                Some(cached) => {
                    warn!(feature = %name, error = %e, "store read failed, serving cached feature");
                    Ok(Some(cached))
                }
                None => Err(RolloutError::StoreUnavailable(e)),
            },
        }
    }

    /// Every current-format flag, in store enumeration order.
    ///
    /// Records that vanish between the scan and the read are skipped, as
    /// are records that fail to decode.
    pub fn features(&self) -> RolloutResult<Vec<FeatureSummary>> {
        let keys = self.store.keys_with_prefix(&self.keys.scan_prefix())?;
        let mut summaries = Vec::with_capacity(keys.len());
        for key in &keys {
            let Some(name) = self.keys.name_of(key) else {
                continue;
            };
            let Some(raw) = self.store.get(key)? else {
                continue;
            };
            match Feature::decode(name, key, &raw) {
                Ok(feature) => summaries.push(feature.summary()),
                Err(e) => warn!(%key, error = %e, "skipping unreadable flag record"),
            }
        }
        Ok(summaries)
    }

    /// Drop every cached entry. No-op without a cache.
    pub fn clean_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    // ── Legacy migration ───────────────────────────────────────────

    /// Rewrite every legacy record in the current format.
    ///
    /// Existing current-format records are overwritten and their counters
    /// reset; flags with a positive percentage are announced as activated
    /// again on every run.
    pub fn migrate_legacy(&self) -> RolloutResult<MigrationReport> {
        self.migrate_legacy_with(MigrateOptions::default())
    }

    /// [`Rollout::migrate_legacy`] with explicit options.
    pub fn migrate_legacy_with(&self, options: MigrateOptions) -> RolloutResult<MigrationReport> {
        let legacy_keys = self.store.keys_with_prefix(&self.keys.legacy_scan_prefix())?;
        let mut report = MigrationReport::default();

        for legacy_key in &legacy_keys {
            let Some(name) = self.keys.legacy_name_of(legacy_key) else {
                continue;
            };
            let Some(raw) = self.store.get(legacy_key)? else {
                continue;
            };

            let key = self.keys.key(name);
            if options.skip_existing && self.store.get(&key)?.is_some() {
                debug!(%legacy_key, %key, "current record exists, skipping");
                report.skipped.push(name.to_string());
                continue;
            }

            let feature = legacy::translate(name, &raw);
            let value = feature.encode();
            self.store.set(&key, &value)?;

            let migrated = MigratedFlag {
                name: name.to_string(),
                legacy_key: legacy_key.clone(),
                key,
                legacy_value: String::from_utf8_lossy(&raw).into_owned(),
                value: String::from_utf8_lossy(&value).into_owned(),
                percentage: feature.percentage,
            };
            info!(
                legacy_key = %migrated.legacy_key,
                key = %migrated.key,
                legacy_value = %migrated.legacy_value,
                value = %migrated.value,
                "migrated legacy flag"
            );

            if let Some(cache) = &self.cache {
                cache.put(name, feature);
            }
            if migrated.percentage > 0 {
                self.notifier.notify(&Event::Activated {
                    name: name.to_string(),
                    percentage: migrated.percentage,
                });
            }
            report.migrated.push(migrated);
        }

        info!(
            migrated = report.migrated.len(),
            skipped = report.skipped.len(),
            "legacy migration finished"
        );
        Ok(report)
    }

    // ── Internals ──────────────────────────────────────────────────

    fn save(&self, feature: &Feature) -> RolloutResult<()> {
        self.store
            .set(&self.keys.key(&feature.name), &feature.encode())?;
        Ok(())
    }

    fn legacy_feature(&self, name: &str) -> RolloutResult<Option<Feature>> {
        let Some(auto_migrate) = self.legacy else {
            return Ok(None);
        };
        let Some(feature) = legacy::fetch(self.store.as_ref(), &self.keys, name)? else {
            return Ok(None);
        };

        if auto_migrate {
            if let Err(e) = self.activate(name, u32::from(feature.percentage), None) {
                warn!(feature = %name, error = %e, "auto-migration of legacy flag failed");
            }
        }
        Ok(Some(feature))
    }

    /// Count a failed guarded call and degrade the flag if it crossed its
    /// threshold. Problems here are logged; the caller's error wins.
    fn record_failure(&self, name: &str) {
        let feature = match self.feature(name) {
            Ok(Some(feature)) => feature,
            Ok(None) => return,
            Err(e) => {
                warn!(feature = %name, error = %e, "cannot record guarded failure");
                return;
            }
        };
        if !self.degrade.tracks(&feature) || feature.degraded {
            return;
        }

        let feature = match self.bump(feature, Counter::Error) {
            Ok(Some(feature)) => feature,
            Ok(None) => return,
            Err(e) => {
                warn!(feature = %name, error = %e, "failed to record error");
                return;
            }
        };

        if self.degrade.should_degrade(&feature) {
            if let Err(e) = self.degrade_feature(feature) {
                warn!(feature = %name, error = %e, "failed to persist degrade");
            }
        }
    }

    /// Force `feature` off. `feature` must be the record as last written.
    ///
    /// With atomic counters the degraded record only replaces that exact
    /// value, so a concurrent deactivate or counter update wins.
    fn degrade_feature(&self, mut feature: Feature) -> RolloutResult<()> {
        let previous = feature.encode();
        feature.mark_degraded(Utc::now());

        match self.counters {
            CounterMode::LastWriterWins => self.save(&feature)?,
            CounterMode::CompareAndSwap { .. } => {
                let key = self.keys.key(&feature.name);
                if !self
                    .store
                    .compare_and_swap(&key, Some(previous.as_slice()), &feature.encode())?
                {
                    debug!(%key, "record changed before degrade, leaving it alone");
                    return Ok(());
                }
            }
        }
        warn!(
            feature = %feature.name,
            requests = feature.requests,
            errors = feature.errors,
            "feature degraded"
        );

        let event = Event::Degraded {
            name: feature.name.clone(),
            requests: feature.requests,
            errors: feature.errors,
        };
        if let Some(cache) = &self.cache {
            let name = feature.name.clone();
            cache.put(&name, feature);
        }
        self.notifier.notify(&event);
        Ok(())
    }

    /// Increment one counter and persist it.
    ///
    /// Returns the written record, or `None` when nothing was written: the
    /// record vanished or compare-and-swap kept losing.
    fn bump(&self, mut feature: Feature, counter: Counter) -> RolloutResult<Option<Feature>> {
        let apply = |f: &mut Feature| match counter {
            Counter::Request => f.add_request(),
            Counter::Error => f.add_error(),
        };

        let CounterMode::CompareAndSwap { max_retries } = self.counters else {
            apply(&mut feature);
            self.save(&feature)?;
            return Ok(Some(feature));
        };

        let key = self.keys.key(&feature.name);
        for attempt in 0..=max_retries {
            let Some(raw) = self.store.get(&key)? else {
                debug!(%key, "record deleted, counter not written");
                return Ok(None);
            };
            let mut current = Feature::decode(&feature.name, &key, &raw)?;
            apply(&mut current);
            if self
                .store
                .compare_and_swap(&key, Some(raw.as_slice()), &current.encode())?
            {
                return Ok(Some(current));
            }
            debug!(%key, attempt, "counter update raced, retrying");
        }

        warn!(%key, max_retries, "counter update gave up after contention");
        Ok(None)
    }
}
