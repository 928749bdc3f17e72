//! # hongbao-resolve
//!
//! Recipient resolution: an optional address-override table maps a holder
//! to an alternate payout destination (e.g. consolidating several holders'
//! payouts into one wallet).
//!
//! ## Modules
//!
//! - [`mapping`] — loading and validating the override table
//! - [`resolve`] — applying the table to a holder list

pub mod mapping;
pub mod resolve;

pub use mapping::AddressMapping;
pub use resolve::{resolve, ResolvedRecipient, Resolution};

/// Error types for mapping-table loading.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The mapping file could not be read.
    #[error("cannot read mapping file '{path}': {source}")]
    Io {
        /// The configured path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The mapping file is not valid JSON.
    #[error("invalid JSON in mapping file '{path}': {source}")]
    Json {
        /// The configured path.
        path: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The mapping file does not contain a JSON object.
    #[error("mapping file '{path}' must contain a JSON object")]
    NotAnObject {
        /// The configured path.
        path: String,
    },

    /// A mapping value is not a string.
    #[error("mapping entry for '{key}' must be a string address")]
    MalformedEntry {
        /// The offending key.
        key: String,
    },

    /// A mapping entry has an empty source or destination.
    #[error("mapping entry has an empty address: '{source_address}' -> '{destination}'")]
    EmptyAddress {
        /// Source side as written.
        source_address: String,
        /// Destination side as written.
        destination: String,
    },

    /// A mapping source is not a valid address.
    #[error("invalid source address in mapping: {0}")]
    InvalidSource(#[source] hongbao_types::TypesError),

    /// A mapping destination is not a valid address.
    #[error("invalid destination address in mapping: {0}")]
    InvalidDestination(#[source] hongbao_types::TypesError),
}

/// Convenience result type for resolution.
pub type Result<T> = std::result::Result<T, ResolveError>;
