//! Domain layer: document tree, versions and relocation
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod comment;
pub mod document;
pub mod error;
pub mod merger;
pub mod path;
pub mod relocator;
pub mod tree_display;
pub mod version;

pub use comment::{CommentKind, CommentLine, Comments, NodeRole, Position};
pub use document::{Block, BlockKind, Document, Indicator, NodeId, Placement};
pub use error::{DomainError, DomainResult};
pub use merger::{merge, MergeOptions, MergeReport};
pub use path::{Key, KeyFormat, Path, DEFAULT_SEPARATOR};
pub use relocator::{RelocationReport, Relocations, Relocator, VersionRelocations};
pub use tree_display::ToTree;
pub use version::{Pattern, Segment, Version, VersionCatalog};
