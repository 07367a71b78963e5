use std::collections::BTreeMap;
use std::fmt;

use crate::common_tags::CommonTags;
use crate::error::StatsError;

/// Longest tag value accepted by exporters.
pub const MAX_TAG_VALUE_LENGTH: usize = 255;

/// A named metric dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagKey(&'static str);

impl TagKey {
    pub const fn new(name: &'static str) -> Self {
        TagKey(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const TAG_KEY_CLIENT_ID: TagKey = TagKey::new("client_id");
pub const TAG_KEY_DATABASE: TagKey = TagKey::new("database");
pub const TAG_KEY_INSTANCE: TagKey = TagKey::new("instance_id");
pub const TAG_KEY_LIB_VERSION: TagKey = TagKey::new("library_version");
pub const TAG_KEY_TYPE: TagKey = TagKey::new("type");
pub const TAG_KEY_METHOD: TagKey = TagKey::new("grpc_client_method");

/// Tag keys shared by every session-pool view.
pub const COMMON_TAG_KEYS: &[TagKey] = &[
    TAG_KEY_CLIENT_ID,
    TAG_KEY_DATABASE,
    TAG_KEY_INSTANCE,
    TAG_KEY_LIB_VERSION,
];

pub const COMMON_AND_TYPE_TAG_KEYS: &[TagKey] = &[
    TAG_KEY_CLIENT_ID,
    TAG_KEY_DATABASE,
    TAG_KEY_INSTANCE,
    TAG_KEY_LIB_VERSION,
    TAG_KEY_TYPE,
];

pub const COMMON_AND_METHOD_TAG_KEYS: &[TagKey] = &[
    TAG_KEY_CLIENT_ID,
    TAG_KEY_DATABASE,
    TAG_KEY_INSTANCE,
    TAG_KEY_LIB_VERSION,
    TAG_KEY_METHOD,
];

// Values of TAG_KEY_TYPE for the num_sessions_in_pool breakdown.
pub const TYPE_NUM_IN_USE_SESSIONS: &str = "num_in_use_sessions";
pub const TYPE_NUM_BEING_PREPARED: &str = "num_sessions_being_prepared";
pub const TYPE_NUM_READ_SESSIONS: &str = "num_read_sessions";
pub const TYPE_NUM_WRITE_SESSIONS: &str = "num_write_prepared_sessions";

/// A set of tags carried alongside a recording.
///
/// A `TagMap` is a plain value: deriving a new context is a `clone` followed by
/// `insert`/`upsert` calls, so the caller's context is never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagMap {
    tags: BTreeMap<TagKey, String>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any value already present.
    pub fn upsert(&mut self, key: TagKey, value: impl Into<String>) -> Result<(), StatsError> {
        let value = validate_value(key, value.into())?;
        self.tags.insert(key, value);
        Ok(())
    }

    /// Set `key` to `value` only if `key` has no value yet.
    pub fn insert(&mut self, key: TagKey, value: impl Into<String>) -> Result<(), StatsError> {
        let value = validate_value(key, value.into())?;
        self.tags.entry(key).or_insert(value);
        Ok(())
    }

    pub fn get(&self, key: TagKey) -> Option<&str> {
        self.tags.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagKey, &str)> {
        self.tags.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Derive a new map from this one with the common tags upserted.
    pub fn with_common_tags(&self, common: &CommonTags) -> Result<TagMap, StatsError> {
        let mut tags = self.clone();
        tags.upsert(TAG_KEY_CLIENT_ID, common.client_id.as_str())?;
        tags.upsert(TAG_KEY_DATABASE, common.database.as_str())?;
        tags.upsert(TAG_KEY_INSTANCE, common.instance.as_str())?;
        tags.upsert(TAG_KEY_LIB_VERSION, common.lib_version.as_str())?;
        Ok(tags)
    }

    /// Keep only the tags whose key is in `keys`.
    pub fn project(&self, keys: &[TagKey]) -> TagMap {
        TagMap {
            tags: self
                .tags
                .iter()
                .filter(|(key, _)| keys.contains(key))
                .map(|(key, value)| (*key, value.clone()))
                .collect(),
        }
    }

    /// Render the tags restricted to `keys` as metric labels.
    pub fn labels(&self, keys: &[TagKey]) -> Vec<(&'static str, String)> {
        self.project(keys)
            .tags
            .into_iter()
            .map(|(key, value)| (key.name(), value))
            .collect()
    }
}

fn validate_value(key: TagKey, value: String) -> Result<String, StatsError> {
    let printable = value.bytes().all(|b| (b' '..=b'~').contains(&b));

    if !printable || value.len() > MAX_TAG_VALUE_LENGTH {
        return Err(StatsError::InvalidTagValue {
            key: key.name(),
            value,
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_overwrites_existing_value() {
        let mut tags = TagMap::new();
        tags.upsert(TAG_KEY_DATABASE, "first").unwrap();
        tags.upsert(TAG_KEY_DATABASE, "second").unwrap();

        assert_eq!(tags.get(TAG_KEY_DATABASE), Some("second"));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_insert_keeps_existing_value() {
        let mut tags = TagMap::new();
        tags.insert(TAG_KEY_METHOD, "Read").unwrap();
        tags.insert(TAG_KEY_METHOD, "ExecuteSql").unwrap();

        assert_eq!(tags.get(TAG_KEY_METHOD), Some("Read"));
    }

    #[test]
    fn test_rejects_non_printable_and_long_values() {
        let mut tags = TagMap::new();

        match tags.upsert(TAG_KEY_CLIENT_ID, "client\n1") {
            Err(StatsError::InvalidTagValue { key, .. }) => assert_eq!(key, "client_id"),
            other => panic!("Expected InvalidTagValue, got {:?}", other),
        };

        let long = "a".repeat(MAX_TAG_VALUE_LENGTH + 1);
        assert!(tags.insert(TAG_KEY_CLIENT_ID, long).is_err());
        assert!(tags
            .insert(TAG_KEY_CLIENT_ID, "a".repeat(MAX_TAG_VALUE_LENGTH))
            .is_ok());
    }

    #[test]
    fn test_labels_only_include_requested_keys() {
        let mut tags = TagMap::new();
        tags.upsert(TAG_KEY_CLIENT_ID, "client-1").unwrap();
        tags.upsert(TAG_KEY_METHOD, "Read").unwrap();

        assert_eq!(
            tags.labels(COMMON_TAG_KEYS),
            vec![("client_id", "client-1".to_owned())]
        );
        assert_eq!(tags.labels(COMMON_AND_METHOD_TAG_KEYS).len(), 2);
    }
}
