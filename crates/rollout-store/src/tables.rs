//! redb table definitions for the persistent flag store.

use redb::TableDefinition;

/// Raw flag records keyed by their namespaced key (`{prefix}:{name}`).
///
/// Current-format and legacy-format records share this table; the prefix
/// in the key tells them apart.
pub const FLAGS: TableDefinition<&str, &[u8]> = TableDefinition::new("flags");
