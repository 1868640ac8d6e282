//! Canonical JSON encoding of node metadata.

use serde_json::{Map, Value};

use crate::coordination::NodeStat;

/// Number of metadata keys written by [`encode_stat`].
pub const STAT_FIELD_COUNT: usize = 11;

/// Writes the metadata keys of `stat` into `existing`, or into a new map.
///
/// Keys already present in `existing` are kept unless they collide with a
/// metadata key, in which case the metadata value wins.
#[must_use]
pub fn encode_stat(existing: Option<Map<String, Value>>, stat: &NodeStat) -> Map<String, Value> {
    let mut map = existing.unwrap_or_else(|| Map::with_capacity(STAT_FIELD_COUNT));
    map.insert("czxid".to_owned(), stat.czxid.into());
    map.insert("mzxid".to_owned(), stat.mzxid.into());
    map.insert("ctime".to_owned(), stat.ctime.into());
    map.insert("mtime".to_owned(), stat.mtime.into());
    map.insert("version".to_owned(), stat.version.into());
    map.insert("cversion".to_owned(), stat.cversion.into());
    map.insert("aversion".to_owned(), stat.aversion.into());
    map.insert("ephemeral_owner".to_owned(), stat.ephemeral_owner.into());
    map.insert("data_length".to_owned(), stat.data_length.into());
    map.insert("num_children".to_owned(), stat.num_children.into());
    map.insert("pzxid".to_owned(), stat.pzxid.into());
    map
}
