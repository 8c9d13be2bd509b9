//! Legacy adapter for the old `|`-delimited flag encoding.
//!
//! Old records look like `"<percentage>|<users>|<groups>|<extra>"`. Only the
//! percentage survives translation; the targeting segments are dropped and
//! counters start at zero. The adapter reads the legacy namespace only and
//! never touches the cache.

use rollout_store::{KeyValueStore, StoreResult};

use crate::bucket::MAX_PERCENTAGE;
use crate::feature::Feature;
use crate::keys::KeySpace;

/// Percentage carried by a legacy value.
///
/// Reads the leading digits of the first segment. A segment without
/// leading digits reads as 0; values above 100 are clamped.
pub fn parse_percentage(raw: &str) -> u8 {
    let first = raw.split('|').next().unwrap_or_default().trim_start();
    let digits: String = first.chars().take_while(char::is_ascii_digit).collect();
    match digits.parse::<u64>() {
        Ok(p) => p.min(u64::from(MAX_PERCENTAGE)) as u8,
        Err(_) if digits.is_empty() => 0,
        // Too many digits to fit: far above 100.
        Err(_) => MAX_PERCENTAGE,
    }
}

/// Translate a legacy value into a current-format feature.
pub fn translate(name: &str, raw: &[u8]) -> Feature {
    let text = String::from_utf8_lossy(raw);
    Feature::new(name, parse_percentage(&text), None)
}

/// Read `name` from the legacy namespace.
pub fn fetch(
    store: &dyn KeyValueStore,
    keys: &KeySpace,
    name: &str,
) -> StoreResult<Option<Feature>> {
    let key = keys.legacy_key(name);
    let feature = store.get(&key)?.map(|raw| translate(name, &raw));
    tracing::debug!(%key, found = feature.is_some(), "legacy lookup");
    Ok(feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_store::MemoryStore;

    #[test]
    fn parses_first_segment() {
        assert_eq!(parse_percentage("100|||{ 'random': 'data' }"), 100);
        assert_eq!(parse_percentage("50|user1#user2||{}"), 50);
        assert_eq!(parse_percentage("25||group22|{}"), 25);
        assert_eq!(parse_percentage("30|user1|general|{}"), 30);
        assert_eq!(parse_percentage("0"), 0);
    }

    #[test]
    fn lenient_parsing() {
        assert_eq!(parse_percentage(""), 0);
        assert_eq!(parse_percentage("abc|x"), 0);
        assert_eq!(parse_percentage("42abc|x"), 42);
        assert_eq!(parse_percentage("250|"), 100);
        assert_eq!(parse_percentage("99999999999999999999999|"), 100);
    }

    #[test]
    fn translate_zeroes_counters() {
        let f = translate("old", b"75|u1|g1|{}");
        assert_eq!(f.name, "old");
        assert_eq!(f.percentage, 75);
        assert_eq!((f.requests, f.errors), (0, 0));
        assert!(f.degrade.is_none());
    }

    #[test]
    fn fetch_reads_only_legacy_namespace() {
        let store = MemoryStore::new();
        let keys = KeySpace::default();
        store.set("rollout:current", br#"{"percentage":100}"#).unwrap();
        store.set("feature:old", b"100|||{}").unwrap();

        assert!(fetch(&store, &keys, "current").unwrap().is_none());
        assert_eq!(fetch(&store, &keys, "old").unwrap().unwrap().percentage, 100);
    }

    #[test]
    fn fetch_propagates_store_failure() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(fetch(&store, &KeySpace::default(), "old").is_err());
    }
}
