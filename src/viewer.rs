//! Viewer facade - construction, updates, and filter edits.
//!
//! One [`Viewer`] owns the association tree, the last snapshot, and the
//! display surface. Each [`Viewer::update`] runs a full synchronous cycle:
//! diff against the previous snapshot, reconcile, ordering pass, visibility
//! pass. Filter and exclusion edits re-run only the visibility pass, either
//! per edit or on commit, per config.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::config::{ConfigError, FilterCommit, ViewerConfig};
use crate::diff::diff;
use crate::order::ordering_pass;
use crate::reconcile::reconcile;
use crate::surface::DisplaySurface;
use crate::tree::AssocTree;
use crate::value::{Key, Table, Value};
use crate::visibility::{visibility_pass, visibility_pass_all, FilterState};

// =============================================================================
// Viewer
// =============================================================================

/// A live view over a mutating nested key-value structure.
pub struct Viewer<S: DisplaySurface> {
    surface: S,
    tree: AssocTree,
    snapshot: Table,
    config: ViewerConfig,
    filters: FilterState,
    staged_filter: Option<String>,
    staged_exclusions: Option<String>,
}

impl<S: DisplaySurface> Viewer<S> {
    /// Build a viewer over `initial`, with caller options deep-merged over
    /// the documented defaults. Configuration problems are hard errors; the
    /// viewer is not created.
    pub fn create(
        surface: S,
        initial: &Value,
        options: Option<&Value>,
    ) -> Result<Self, ConfigError> {
        let config = ViewerConfig::from_options(options)?;
        let mut viewer = Self {
            surface,
            tree: AssocTree::new(),
            snapshot: Table::new(),
            config,
            filters: FilterState::default(),
            staged_filter: None,
            staged_exclusions: None,
        };
        viewer.update(initial);
        Ok(viewer)
    }

    /// Replace the tracked snapshot and run one reconciliation cycle.
    ///
    /// Never fails for values of the fixed domain; a non-container argument
    /// is normalized into a single-entry table.
    pub fn update(&mut self, data: &Value) {
        let new = normalize(data);
        let delta = diff(&new, &self.snapshot);
        self.snapshot = new;
        if delta.is_empty() {
            return;
        }

        let mut touched = FxHashSet::default();
        let root = self.tree.root();
        reconcile(
            &mut self.tree,
            &mut self.surface,
            &self.config,
            root,
            &delta,
            0,
            &mut touched,
        );
        ordering_pass(&mut self.tree, &mut self.surface, &self.config, &touched);
        visibility_pass(
            &mut self.tree,
            &mut self.surface,
            &self.config,
            &self.filters,
            &touched,
        );
    }

    // =========================================================================
    // Filter input
    // =========================================================================

    /// Filter text changed on the input surface.
    pub fn edit_filter(&mut self, text: &str) {
        match self.config.filter_commit {
            FilterCommit::EveryEdit => {
                self.filters.set_filter_text(text);
                self.rerun_visibility();
            }
            FilterCommit::OnCommit => self.staged_filter = Some(text.to_string()),
        }
    }

    /// Exclusion text changed on the input surface.
    pub fn edit_exclusions(&mut self, text: &str) {
        match self.config.filter_commit {
            FilterCommit::EveryEdit => {
                self.filters.set_exclusion_text(text);
                self.rerun_visibility();
            }
            FilterCommit::OnCommit => self.staged_exclusions = Some(text.to_string()),
        }
    }

    /// Apply staged filter/exclusion edits (input-commit mode).
    pub fn commit_filters(&mut self) {
        let mut dirty = false;
        if let Some(text) = self.staged_filter.take() {
            self.filters.set_filter_text(&text);
            dirty = true;
        }
        if let Some(text) = self.staged_exclusions.take() {
            self.filters.set_exclusion_text(&text);
            dirty = true;
        }
        if dirty {
            self.rerun_visibility();
        }
    }

    fn rerun_visibility(&mut self) {
        visibility_pass_all(
            &mut self.tree,
            &mut self.surface,
            &self.config,
            &self.filters,
        );
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Title text for the embedding surface, decorated per config.
    pub fn title(&self) -> String {
        if self.config.decorate_title {
            format!("[ {} ]", self.config.title)
        } else {
            self.config.title.clone()
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// The last snapshot the viewer reconciled against.
    pub fn snapshot(&self) -> &Table {
        &self.snapshot
    }

    /// Live association count, the root excluded.
    pub fn association_count(&self) -> usize {
        self.tree.len().saturating_sub(1)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

/// Updates take containers; anything else becomes a one-entry table so the
/// cycle can proceed (best-effort recovery, never a failure).
fn normalize(data: &Value) -> Table {
    match data {
        Value::Table(t) => t.clone(),
        other => {
            debug!(kind = other.kind().name(), "non-container update, wrapping");
            [(Key::text("value"), other.clone())].into_iter().collect()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
