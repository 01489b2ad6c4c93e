//! # treescope
//!
//! Incremental viewer core for live nested key-value data.
//!
//! treescope keeps an external display synchronized with a mutating tree
//! without tearing the display down between updates. Each update diffs the
//! new snapshot against the previous one, walks the delta through a
//! persistent association tree (one node and one display handle per live
//! key, at every depth), then recomputes sibling ordering and cascading
//! visibility for the parts that changed.
//!
//! ## Pipeline
//!
//! ```text
//! snapshot → diff → reconcile (association tree + surface calls)
//!          → ordering pass → visibility passes
//! ```
//!
//! Everything runs synchronously, single-threaded, to completion per
//! [`Viewer::update`](viewer::Viewer::update) call. Display handles are
//! opaque: the core only talks to a [`DisplaySurface`](surface::DisplaySurface)
//! collaborator and keeps its own bookkeeping of which node owns which
//! handle.
//!
//! ## Modules
//!
//! - [`value`] - the fixed value domain (`Key`, `Value`, `ValueKind`)
//! - [`diff`] - structural diff/patch over value trees
//! - [`format`] - display text for keys and values
//! - [`tree`] - the association-tree arena
//! - [`reconcile`] - the delta walk and node/handle lifecycle
//! - [`order`] - deterministic sibling ordering
//! - [`visibility`] - key filters, pinning, empty-container hiding
//! - [`surface`] - the display surface seam
//! - [`config`] - option merging and validation
//! - [`viewer`] - the facade tying the pipeline together

pub mod config;
pub mod diff;
pub mod format;
pub mod order;
pub mod reconcile;
pub mod surface;
pub mod tree;
pub mod value;
pub mod viewer;
pub mod visibility;

pub use config::{ConfigError, FilterCommit, KindTable, Size, ViewerConfig};
pub use diff::{apply_delta, diff, Delta, DeltaEntry};
pub use format::{coerce_key, format_key, format_number, format_value, FormatOptions};
pub use surface::{
    DisplaySurface, HandleId, HandleSpec, RecordingSurface, RefreshProps, Rgba, SurfaceError,
};
pub use tree::{AssocNode, AssocTree, NodeFlags, NodeId};
pub use value::{Key, Table, Value, ValueKind};
pub use viewer::Viewer;
pub use visibility::FilterState;
