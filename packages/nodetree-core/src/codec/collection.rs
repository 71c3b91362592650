use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::wire::{WireCollection, TREE_NODE_TYPE_KEY};
use crate::config::EncodeOptions;
use crate::digest::{SubtreeSummary, TreeDigest};
use crate::error::{Error, Result};
use crate::registry::TreeFactory;
use crate::stores::{ForestEntry, TreeStores};

/// Result of [`CollectionCodec::decode`].
#[derive(Clone, Debug)]
pub struct DecodedForest {
    /// Decoded trees in encoded order, then one alias per resolved duplicate id.
    pub entries: Vec<ForestEntry>,
    pub encoded_digest: Option<TreeDigest>,
    /// `None` when the document carried no digest.
    pub digest_matches: Option<bool>,
}

impl DecodedForest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Encodes and decodes forests of independently submitted trees.
#[derive(Clone, Debug, Default)]
pub struct CollectionCodec {
    pub options: EncodeOptions,
}

impl CollectionCodec {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// Serializes `forest`. Entries that sit inside another entry's subtree (or
    /// repeat an earlier entry) are written as `duplicateRootIds` only.
    #[tracing::instrument(level = "debug", skip_all, fields(entries = forest.len()))]
    pub fn encode(&self, stores: &TreeStores, forest: &[ForestEntry]) -> Result<Vec<u8>> {
        let registry = stores.registry();
        let factories = forest
            .iter()
            .map(|entry| {
                registry
                    .resolve(&entry.type_key)
                    .ok_or_else(|| Error::UnknownNodeType(entry.type_key.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut true_roots: Vec<(&ForestEntry, &Arc<dyn TreeFactory>)> = Vec::new();
        let mut duplicate_ids = Vec::new();
        for (i, (entry, factory)) in forest.iter().zip(&factories).enumerate() {
            let duplicate = forest.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.type_key == entry.type_key
                    && (factory.is_descendant(stores, entry.handle, other.handle)
                        || (other.handle == entry.handle && j < i))
            });
            if duplicate {
                duplicate_ids.push(factory.encoded_id(stores, entry.handle)?);
            } else {
                true_roots.push((entry, factory));
            }
        }

        let mut collection = Vec::with_capacity(true_roots.len());
        let mut summaries: Vec<SubtreeSummary> = Vec::new();
        for (entry, factory) in &true_roots {
            let encoding = self
                .options
                .force_encoding
                .unwrap_or_else(|| factory.tree_encoding(stores, entry.handle));
            collection.push(factory.encode_tree(stores, entry.handle, encoding, &self.options)?);
            if self.options.with_digest {
                summaries.push(factory.summarize(stores, entry.handle)?);
            }
        }

        let info = self
            .options
            .with_digest
            .then(|| TreeDigest::from_summaries(&summaries, duplicate_ids.len()));
        debug!(
            trees = collection.len(),
            duplicates = duplicate_ids.len(),
            "encoded forest"
        );
        let document = WireCollection {
            collection,
            duplicate_root_ids: (!duplicate_ids.is_empty()).then_some(duplicate_ids),
            info,
        };
        let bytes = if self.options.pretty {
            serde_json::to_vec_pretty(&document)?
        } else {
            serde_json::to_vec(&document)?
        };
        Ok(bytes)
    }

    /// Rebuilds a forest into `stores`.
    ///
    /// Trees decoded before a failing entry stay in their stores. A digest
    /// mismatch is logged, never returned as an error.
    #[tracing::instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
    pub fn decode(&self, stores: &mut TreeStores, bytes: &[u8]) -> Result<DecodedForest> {
        let document: WireCollection = serde_json::from_slice(bytes)
            .map_err(|e| Error::MalformedEncoding(format!("forest document: {e}")))?;
        let registry = stores.registry().clone();

        let mut entries = Vec::with_capacity(document.collection.len());
        let mut factories: Vec<Arc<dyn TreeFactory>> = Vec::new();
        for tree in &document.collection {
            let type_key = tree
                .get(TREE_NODE_TYPE_KEY)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::MalformedEncoding(format!("tree entry without {TREE_NODE_TYPE_KEY}"))
                })?;
            let factory = registry
                .resolve(type_key)
                .ok_or_else(|| Error::UnknownNodeType(type_key.to_string()))?;
            let handle = factory
                .decode_tree(stores, tree)
                .map_err(|e| Error::delegate(type_key, e))?;
            entries.push(ForestEntry {
                type_key: type_key.to_string(),
                handle,
            });
            factories.push(factory);
        }
        let trees = entries.len();

        let mut aliases = 0;
        for id in document.duplicate_root_ids.iter().flatten() {
            let mut found = None;
            for (entry, factory) in entries[..trees].iter().zip(&factories) {
                if let Some(handle) = factory.find_by_encoded_id(stores, entry.handle, id)? {
                    found = Some(ForestEntry {
                        type_key: entry.type_key.clone(),
                        handle,
                    });
                    break;
                }
            }
            match found {
                Some(alias) => {
                    entries.push(alias);
                    aliases += 1;
                }
                None => warn!(id = %id, "duplicate root id not found in any decoded tree"),
            }
        }

        let digest_matches = match &document.info {
            Some(encoded) => {
                let summaries = entries[..trees]
                    .iter()
                    .zip(&factories)
                    .map(|(entry, factory)| factory.summarize(stores, entry.handle))
                    .collect::<Result<Vec<_>>>()?;
                let recomputed = TreeDigest::from_summaries(&summaries, aliases);
                let matches = recomputed == *encoded;
                if !matches {
                    warn!(
                        encoded = ?encoded,
                        recomputed = ?recomputed,
                        "decoded forest does not match its digest"
                    );
                }
                Some(matches)
            }
            None => None,
        };
        debug!(trees, aliases, "decoded forest");
        Ok(DecodedForest {
            entries,
            encoded_digest: document.info,
            digest_matches,
        })
    }
}
