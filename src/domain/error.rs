//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent addressing mistakes and malformed configuration.
/// Expected absence (a key the user never set) is never an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("path must contain at least one key")]
    EmptyPath,

    #[error("path index {index} out of bounds for path of length {len}")]
    PathIndexOutOfBounds { index: usize, len: usize },

    #[error("path of length 1 has no parent: {0}")]
    RootHasNoParent(String),

    #[error("unknown version: {0}")]
    UnknownVersion(String),

    #[error("no version after {0} in the catalog")]
    VersionOverflow(String),

    #[error("versions {left} and {right} belong to different catalogs")]
    CatalogMismatch { left: String, right: String },

    #[error("version catalog is empty")]
    EmptyCatalog,

    #[error("duplicate version in catalog: {0}")]
    DuplicateVersion(String),

    #[error("invalid relocations for version {version}: {reason}")]
    InvalidRelocations { version: String, reason: String },

    #[error("block is not a section: {0}")]
    NotASection(String),

    #[error("block is not part of the document")]
    DetachedNode,

    #[error("cannot place a block inside itself")]
    CyclicPlacement,

    #[error("only comment, directive and indicator blocks belong in header or footer")]
    NotMetadata,
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
