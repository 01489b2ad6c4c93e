//! Display surface seam.
//!
//! The viewer core never draws. It asks a [`DisplaySurface`] collaborator to
//! create, refresh, and destroy opaque display handles, and keeps its own
//! bookkeeping of which association node owns which handle. Handle internals
//! are the surface's business.
//!
//! [`RecordingSurface`] is a headless implementation that records every call;
//! the test suite runs against it, and embedders can use it for snapshotting.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::value::ValueKind;

// =============================================================================
// Color
// =============================================================================

/// RGBA color with 8-bit channels. Integer channels, exact comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Create a new RGBA color.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const GRAY: Self = Self::rgb(128, 128, 128);

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Opaque identifier for a display handle, issued by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

/// Everything the surface needs to build a new handle.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleSpec {
    /// Formatted key text.
    pub key_text: String,
    /// Kind of the value behind the node.
    pub kind: ValueKind,
    /// Nesting depth (top-level associations are depth 0).
    pub depth: u16,
    /// Whether the node is a container; the surface may register
    /// expand/collapse affordances once the node proves non-empty.
    pub container: bool,
    /// Initial expansion state, from config.
    pub expanded: bool,
}

/// Full display state pushed on refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshProps {
    pub key_text: String,
    pub value_text: String,
    pub kind_color: Rgba,
    pub expandable: bool,
    /// Indentation steps, proportional to depth.
    pub indent: u16,
    /// Sibling layout priority from the ordering pass.
    pub layout_order: i64,
    pub visible: bool,
}

/// Surface-side failures. Destruction failures are swallowed by the caller;
/// cleanup is best-effort.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("display handle {0:?} is already gone")]
    HandleGone(HandleId),
    #[error("surface backend error: {0}")]
    Backend(String),
}

/// The consumed display collaborator.
pub trait DisplaySurface {
    /// Create a display handle for a freshly observed node.
    fn create_handle(&mut self, spec: &HandleSpec) -> HandleId;

    /// Destroy a handle. Must tolerate being called on an already-destroyed
    /// handle; the core treats any error as best-effort cleanup noise.
    fn destroy_handle(&mut self, handle: HandleId) -> Result<(), SurfaceError>;

    /// Push fresh display state for a handle.
    fn refresh(&mut self, handle: HandleId, props: &RefreshProps);
}

// =============================================================================
// Recording surface
// =============================================================================

/// Headless surface that records every call it receives.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    next_id: u64,
    /// Handles created and not yet destroyed.
    live: BTreeMap<HandleId, HandleSpec>,
    /// Creation log, in call order.
    pub created: Vec<(HandleId, HandleSpec)>,
    /// Destruction log, in call order.
    pub destroyed: Vec<HandleId>,
    /// Refresh log, in call order.
    pub refreshes: Vec<(HandleId, RefreshProps)>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles currently alive.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, handle: HandleId) -> bool {
        self.live.contains_key(&handle)
    }

    /// Refresh calls received by one handle.
    pub fn refresh_count(&self, handle: HandleId) -> usize {
        self.refreshes.iter().filter(|(h, _)| *h == handle).count()
    }

    /// The most recent props pushed to a handle.
    pub fn last_props(&self, handle: HandleId) -> Option<&RefreshProps> {
        self.refreshes
            .iter()
            .rev()
            .find(|(h, _)| *h == handle)
            .map(|(_, p)| p)
    }

    /// The handle most recently created for a key text.
    pub fn handle_for_key(&self, key_text: &str) -> Option<HandleId> {
        self.created
            .iter()
            .rev()
            .find(|(_, spec)| spec.key_text == key_text)
            .map(|(h, _)| *h)
    }
}

impl DisplaySurface for RecordingSurface {
    fn create_handle(&mut self, spec: &HandleSpec) -> HandleId {
        let id = HandleId(self.next_id);
        self.next_id += 1;
        self.live.insert(id, spec.clone());
        self.created.push((id, spec.clone()));
        id
    }

    fn destroy_handle(&mut self, handle: HandleId) -> Result<(), SurfaceError> {
        self.destroyed.push(handle);
        match self.live.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(SurfaceError::HandleGone(handle)),
        }
    }

    fn refresh(&mut self, handle: HandleId, props: &RefreshProps) {
        self.refreshes.push((handle, props.clone()));
    }
}

// =============================================================================
// Tests
// =============================================================================
