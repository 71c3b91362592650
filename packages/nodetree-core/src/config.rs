//! Store and codec configuration.
//!
//! ```
//! use nodetree_core::{StoreConfig, TreeEncoding};
//!
//! let config = StoreConfig::default();
//! assert_eq!(config.max_indexed_nodes, 8196);
//! assert!(!config.auto_reconstruct);
//!
//! let config = StoreConfig {
//!     max_pending: Some(10_000),
//!     pending_ttl_secs: Some(300),
//!     default_encoding: TreeEncoding::Nested,
//!     ..Default::default()
//! };
//! assert_eq!(config.max_pending, Some(10_000));
//! ```

use serde::{Deserialize, Serialize};

/// How one tree is laid out on the wire.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEncoding {
    /// Root plus one `descendants` array ordered by depth, then child order.
    #[default]
    Flat,
    /// Recursive `children` arrays.
    Nested,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Rebuild every root's index after each enqueue and reconstruction attempt.
    #[serde(default)]
    pub auto_reconstruct: bool,

    /// Quickmap capacity; registering past it evicts the oldest non-root entry.
    #[serde(default = "default_max_indexed_nodes")]
    pub max_indexed_nodes: usize,

    /// Reconstruction queue bound (None = unbounded). Overflow drops the oldest item.
    #[serde(default)]
    pub max_pending: Option<usize>,

    /// Age after which a pending item is dropped at the next attempt (None = never).
    #[serde(default)]
    pub pending_ttl_secs: Option<u64>,

    /// Encoding of trees without an explicit per-tree mode.
    #[serde(default)]
    pub default_encoding: TreeEncoding,

    /// Store actor mailbox bound.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_max_indexed_nodes() -> usize { 8196 }
fn default_mailbox_capacity() -> usize { 1024 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            auto_reconstruct: false,
            max_indexed_nodes: default_max_indexed_nodes(),
            max_pending: None,
            pending_ttl_secs: None,
            default_encoding: TreeEncoding::Flat,
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

/// Per-call knobs for [`crate::CollectionCodec`].
#[derive(Debug, Clone, Deserialize)]
pub struct EncodeOptions {
    /// Overrides every tree's own encoding mode for this collection.
    #[serde(default)]
    pub force_encoding: Option<TreeEncoding>,
    #[serde(default)]
    pub with_node_info: bool,
    #[serde(default)]
    pub with_root_info: bool,
    #[serde(default = "default_with_digest")]
    pub with_digest: bool,
    #[serde(default)]
    pub pretty: bool,
}

fn default_with_digest() -> bool { true }

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            force_encoding: None,
            with_node_info: false,
            with_root_info: false,
            with_digest: default_with_digest(),
            pretty: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_matches_default() {
        let parsed: StoreConfig = serde_json::from_str("{}").unwrap();
        let default = StoreConfig::default();
        assert_eq!(parsed.auto_reconstruct, default.auto_reconstruct);
        assert_eq!(parsed.max_indexed_nodes, default.max_indexed_nodes);
        assert_eq!(parsed.max_pending, default.max_pending);
        assert_eq!(parsed.pending_ttl_secs, default.pending_ttl_secs);
        assert_eq!(parsed.default_encoding, default.default_encoding);
        assert_eq!(parsed.mailbox_capacity, default.mailbox_capacity);
    }

    #[test]
    fn parses_overrides() {
        let parsed: StoreConfig = serde_json::from_str(
            r#"{"auto_reconstruct": true, "max_pending": 5, "default_encoding": "nested"}"#,
        )
        .unwrap();
        assert!(parsed.auto_reconstruct);
        assert_eq!(parsed.max_pending, Some(5));
        assert_eq!(parsed.default_encoding, TreeEncoding::Nested);
        assert_eq!(parsed.max_indexed_nodes, 8196);
    }

    #[test]
    fn encode_options_default_to_digest_only() {
        let parsed: EncodeOptions = serde_json::from_str(r#"{"force_encoding": "flat"}"#).unwrap();
        assert_eq!(parsed.force_encoding, Some(TreeEncoding::Flat));
        assert!(parsed.with_digest);
        assert!(!parsed.with_node_info);
    }
}
