//! Address-override table loading.
//!
//! The table is a JSON object of base58 address strings:
//!
//! ```json
//! {
//!     "original_address_1": "override_address_1",
//!     "original_address_2": "override_address_2"
//! }
//! ```
//!
//! Every malformed entry fails the whole load, with one exception: an
//! entry whose source equals its destination is dropped with a warning,
//! since it is redundant rather than dangerous. Duplicate keys resolve to
//! the last occurrence (standard JSON object semantics).

use std::collections::BTreeMap;
use std::path::Path;

use hongbao_types::Address;

use crate::{ResolveError, Result};

/// A validated holder → override-destination table.
#[derive(Clone, Debug, Default)]
pub struct AddressMapping {
    entries: BTreeMap<Address, Address>,
}

impl AddressMapping {
    /// An empty table (no overrides).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from already-validated pairs. Later pairs overwrite
    /// earlier ones with the same source.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Address, Address)>) -> Self {
        Self {
            entries: pairs.into_iter().collect(),
        }
    }

    /// Load and validate the table from a JSON file.
    ///
    /// # Errors
    ///
    /// Any I/O, JSON, or address-validation failure is fatal; see
    /// [`ResolveError`]. A source-equals-destination entry is dropped with
    /// a warning instead.
    pub fn load(path: &Path) -> Result<Self> {
        let display_path = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: display_path.clone(),
            source,
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| ResolveError::Json {
                path: display_path.clone(),
                source,
            })?;
        let object = value.as_object().ok_or(ResolveError::NotAnObject {
            path: display_path.clone(),
        })?;

        let mut entries = BTreeMap::new();
        for (key, value) in object {
            let destination = value
                .as_str()
                .ok_or_else(|| ResolveError::MalformedEntry { key: key.clone() })?;
            let source = key.trim();
            let destination = destination.trim();

            if source.is_empty() || destination.is_empty() {
                return Err(ResolveError::EmptyAddress {
                    source_address: source.to_string(),
                    destination: destination.to_string(),
                });
            }
            if source == destination {
                tracing::warn!(
                    address = source,
                    "mapping has identical source and destination, skipping"
                );
                continue;
            }

            let source: Address = source.parse().map_err(ResolveError::InvalidSource)?;
            let destination: Address =
                destination.parse().map_err(ResolveError::InvalidDestination)?;
            entries.insert(source, destination);
        }

        tracing::info!(
            count = entries.len(),
            path = %display_path,
            "loaded address mapping"
        );
        for (source, destination) in &entries {
            tracing::info!(%source, %destination, "mapping entry");
        }

        Ok(Self { entries })
    }

    /// Look up the override destination for a holder, if any.
    pub fn get(&self, holder: &Address) -> Option<&Address> {
        self.entries.get(holder)
    }

    /// Number of override entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over (source, destination) pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Address)> {
        self.entries.iter()
    }
}
