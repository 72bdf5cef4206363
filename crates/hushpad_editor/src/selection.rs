//! Selection tracking: which top-level block holds the caret, and which
//! inline formats wrap it.

use crate::rate_limit::{Admission, Throttle};
use crate::surface::{DocumentTree, InlineFormat, NodeKind};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::trace;

/// Ancestor walks stop after this many hops.
const MAX_ANCESTOR_DEPTH: usize = 256;

/// Derived selection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSnapshot {
    /// Ordinal of the top-level block containing the caret. `None` when the
    /// caret is outside the root or not inside a recognized block.
    pub active_block_index: Option<usize>,
    /// Inline formats between the caret and its block.
    pub formatting: BTreeSet<InlineFormat>,
}

impl SelectionSnapshot {
    pub fn has_format(&self, format: InlineFormat) -> bool {
        self.formatting.contains(&format)
    }
}

/// Counters for how recomputations were triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub events: u64,
    pub immediate_runs: u64,
    pub trailing_runs: u64,
}

impl TrackerStats {
    pub fn total_runs(&self) -> u64 {
        self.immediate_runs + self.trailing_runs
    }
}

/// Walk from the selection anchor up to the root.
///
/// Formats are only reported when a block index was found.
pub fn resolve_selection<T: DocumentTree + ?Sized>(tree: &T) -> SelectionSnapshot {
    let mut snapshot = SelectionSnapshot::default();
    let (Some(root), Some(mut node)) = (tree.root(), tree.selection_anchor()) else {
        return snapshot;
    };

    let mut formatting = BTreeSet::new();
    for _ in 0..MAX_ANCESTOR_DEPTH {
        match tree.kind(node) {
            NodeKind::Root => return snapshot,
            NodeKind::Inline(format) => {
                formatting.insert(format);
            }
            _ => {}
        }
        // A detached or stale node never reaches the root.
        let Some(parent) = tree.parent(node) else {
            return snapshot;
        };
        if parent == root {
            if matches!(tree.kind(node), NodeKind::Block(_)) {
                snapshot.active_block_index = tree.sibling_index(node);
                if snapshot.active_block_index.is_some() {
                    snapshot.formatting = formatting;
                }
            }
            return snapshot;
        }
        node = parent;
    }
    snapshot
}

/// Throttled selection recomputation with subscriber fan-out.
///
/// Every recomputation reads the live tree, so a trailing run reflects the
/// selection at the time it fires rather than the event that queued it.
#[derive(Debug)]
pub struct SelectionTracker {
    throttle: Throttle,
    last: Option<SelectionSnapshot>,
    subscribers: Vec<Sender<SelectionSnapshot>>,
    stats: TrackerStats,
}

impl SelectionTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            throttle: Throttle::new(interval),
            last: None,
            subscribers: Vec::new(),
            stats: TrackerStats::default(),
        }
    }

    /// Receive every published snapshot, in order.
    pub fn subscribe(&mut self) -> Receiver<SelectionSnapshot> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn last_snapshot(&self) -> Option<&SelectionSnapshot> {
        self.last.as_ref()
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    pub fn has_pending(&self) -> bool {
        self.throttle.has_trailing()
    }

    /// Handle one selection-change notification.
    ///
    /// # Returns
    /// The fresh snapshot when recomputed immediately, `None` when deferred.
    pub fn on_selection_event<T: DocumentTree + ?Sized>(
        &mut self,
        tree: &T,
        now: Instant,
    ) -> Option<SelectionSnapshot> {
        self.stats.events += 1;
        match self.throttle.admit(now) {
            Admission::Immediate => {
                self.stats.immediate_runs += 1;
                Some(self.recompute(tree))
            }
            Admission::Deferred => None,
        }
    }

    /// Frame hook: runs the coalesced trailing recomputation when due.
    pub fn on_frame<T: DocumentTree + ?Sized>(
        &mut self,
        tree: &T,
        now: Instant,
    ) -> Option<SelectionSnapshot> {
        if !self.throttle.poll_trailing(now) {
            return None;
        }
        self.stats.trailing_runs += 1;
        Some(self.recompute(tree))
    }

    /// Recompute immediately, outside the throttle.
    pub fn refresh<T: DocumentTree + ?Sized>(&mut self, tree: &T) -> SelectionSnapshot {
        self.recompute(tree)
    }

    /// The cached snapshot no longer matches the tree (re-render).
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    /// Drop a pending trailing run. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        self.throttle.cancel();
    }

    /// Cancel and forget history, e.g. after a new document is mounted.
    pub fn reset(&mut self) {
        self.throttle.reset();
        self.last = None;
    }

    fn recompute<T: DocumentTree + ?Sized>(&mut self, tree: &T) -> SelectionSnapshot {
        let snapshot = resolve_selection(tree);
        trace!(
            active_block_index = ?snapshot.active_block_index,
            formats = snapshot.formatting.len(),
            "selection recomputed"
        );
        self.subscribers
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
        self.last = Some(snapshot.clone());
        snapshot
    }
}
