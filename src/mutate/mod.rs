//! Declarative record mutation
//!
//! This module is the core of the tool: it takes a structured log record
//! plus a compiled list of mutation actions and returns the mutated
//! record. Actions are declared per kind with a small parameter block
//! and always run in a fixed order, so configurations compose the same
//! way no matter how they are written down.
//!
//! # Action kinds
//!
//! ```text
//! rename      old -> new field moves
//! update      re-template a field that already exists
//! replace     re-template a field, creating it when absent
//! convert     string/integer/float/boolean/datetime coercion
//! parse       inflate embedded JSON strings into structure
//! gsub        regex substitution, static or per-record dynamic
//! uppercase   case-fold fields up
//! lowercase   case-fold fields down
//! strip       trim surrounding whitespace
//! remove      delete fields
//! split       string -> sequence on a separator
//! join        sequence -> string with a separator
//! merge       fold source fields into a destination
//! ```
//!
//! # Evaluation order
//!
//! Kinds evaluate in the order listed above regardless of configuration
//! order; several actions of the same kind keep their relative order.
//! A failure inside one action is logged and the remaining actions still
//! run, so a malformed field never swallows a record.
//!
//! # Example
//!
//! ```text
//! [[mutate]]
//! type = "rename"
//! fields = { "status" = "http.status" }
//!
//! [[mutate]]
//! type = "convert"
//! fields = { "http.status" = "integer" }
//! ```

pub mod action;
pub mod convert;
pub mod error;
pub mod expand;
mod handlers;

pub use action::{Action, ActionKind, GsubPattern, GsubSpec, ParseFormat};
pub use convert::ConvertType;
pub use error::{ActionError, MutateConfigError};
pub use expand::expand_patterns;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::event::MutateEvent;

/// The fixed evaluation order. Kinds absent from a configuration are
/// simply skipped.
pub const MUTATE_ORDER: [ActionKind; 13] = [
    ActionKind::Rename,
    ActionKind::Update,
    ActionKind::Replace,
    ActionKind::Convert,
    ActionKind::Parse,
    ActionKind::Gsub,
    ActionKind::Uppercase,
    ActionKind::Lowercase,
    ActionKind::Strip,
    ActionKind::Remove,
    ActionKind::Split,
    ActionKind::Join,
    ActionKind::Merge,
];

/// Engine-level toggles that sit outside any single action.
#[derive(Debug, Clone, Copy)]
pub struct MutateOptions {
    /// Dotted keys address nested structure when true; verbatim flat
    /// keys otherwise.
    pub expand_nesting: bool,
    /// Run the empty-pruning pass after the actions.
    pub prune_empty: bool,
}

impl Default for MutateOptions {
    fn default() -> Self {
        Self {
            expand_nesting: true,
            prune_empty: true,
        }
    }
}

/// Counters accumulated across `apply_with` calls, for host-side
/// reporting.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Records pushed through the pipeline.
    pub records: usize,
    /// Actions that aborted with a logged error.
    pub failed_actions: usize,
    /// Records that pruned away to nothing.
    pub emptied_records: usize,
    /// Aborted action counts keyed by kind name.
    pub failures_by_kind: BTreeMap<&'static str, usize>,
}

/// A compiled, immutable mutation pipeline. Construction buckets the
/// actions into `MUTATE_ORDER`; configuration order only breaks ties
/// between actions of the same kind. Immutability after setup is what
/// makes sharing one pipeline across worker threads safe.
#[derive(Debug, Clone)]
pub struct MutatePipeline {
    actions: Vec<Action>,
    options: MutateOptions,
}

impl MutatePipeline {
    pub fn new(mut actions: Vec<Action>, options: MutateOptions) -> Self {
        actions.sort_by_key(|action| order_rank(action.kind()));
        Self { actions, options }
    }

    /// The compiled actions in evaluation order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn options(&self) -> MutateOptions {
        self.options
    }

    /// Mutates one record. The record always comes back, possibly only
    /// partially mutated; action failures are logged, never raised.
    pub fn apply(&self, record: Map<String, Value>, time: i64, tag: &str) -> Map<String, Value> {
        self.apply_with(record, time, tag, &mut RunStats::default())
    }

    /// Like `apply`, also accumulating counters into `stats`.
    pub fn apply_with(
        &self,
        record: Map<String, Value>,
        time: i64,
        tag: &str,
        stats: &mut RunStats,
    ) -> Map<String, Value> {
        let mut event = MutateEvent::new(record, self.options.expand_nesting);
        event.event_time = time;
        event.event_tag = tag.to_string();

        stats.records += 1;
        for action in &self.actions {
            if let Err(error) = action.apply(&mut event) {
                let kind = action.kind().name();
                log::warn!("failed to apply {kind} action: {error}");
                stats.failed_actions += 1;
                *stats.failures_by_kind.entry(kind).or_insert(0) += 1;
            }
        }

        if self.options.prune_empty {
            event.prune();
        }

        let record = event.into_record();
        if self.options.prune_empty && record.is_empty() {
            stats.emptied_records += 1;
        }
        record
    }
}

fn order_rank(kind: ActionKind) -> usize {
    MUTATE_ORDER
        .iter()
        .position(|candidate| *candidate == kind)
        .unwrap_or(MUTATE_ORDER.len())
}
