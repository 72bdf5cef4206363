//! Focus-mode dimming through a single positional style rule.
//!
//! Block nodes are re-created on every keystroke, so marking "the active
//! paragraph" on a node would be lost at the next render. Instead one rule
//! scoped to the root container dims every top-level child except the one at
//! the active ordinal position. Re-renders never disturb it.

use crate::surface::{StyleHost, StyleSlot};
use tracing::{debug, warn};

/// Positional dimming rule: every top-level block is dimmed except the one at
/// `active_index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionalRule {
    pub dimmed_opacity: f32,
    /// `None` when no block is known yet; nothing is dimmed then.
    pub active_index: Option<usize>,
}

impl PositionalRule {
    pub fn new(dimmed_opacity: f32, active_index: Option<usize>) -> Self {
        Self {
            dimmed_opacity,
            active_index,
        }
    }

    /// Effective opacity for the block at `index`.
    pub fn opacity_for(&self, index: usize) -> f32 {
        match self.active_index {
            Some(active) if active == index => 1.0,
            Some(_) => self.dimmed_opacity,
            None => 1.0,
        }
    }

    /// Render as a stylesheet scoped to `root_selector`.
    ///
    /// Positions are 1-based in CSS, so index `n` becomes `nth-child(n + 1)`.
    pub fn to_css(&self, root_selector: &str) -> String {
        let Some(active) = self.active_index else {
            return String::new();
        };
        format!(
            "{root} > * {{ opacity: {dim}; transition: opacity 0.2s ease; }}\n\
             {root} > *:nth-child({nth}) {{ opacity: 1; }}\n",
            root = root_selector,
            dim = self.dimmed_opacity,
            nth = active + 1,
        )
    }
}

/// Keeps the one owned style rule in sync with the active block index.
#[derive(Debug)]
pub struct FocusSynchronizer {
    dimmed_opacity: f32,
    enabled: bool,
    slot: Option<StyleSlot>,
    /// Index encoded in the installed rule.
    applied_index: Option<usize>,
    /// Most recent index reported by selection tracking.
    latest_index: Option<usize>,
    mutations: u64,
}

impl FocusSynchronizer {
    pub fn new(dimmed_opacity: f32) -> Self {
        Self {
            dimmed_opacity,
            enabled: false,
            slot: None,
            applied_index: None,
            latest_index: None,
            mutations: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_rule(&self) -> bool {
        self.slot.is_some()
    }

    pub fn latest_index(&self) -> Option<usize> {
        self.latest_index
    }

    /// Count of install/replace/release calls made against the host.
    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    pub fn current_rule(&self) -> PositionalRule {
        PositionalRule::new(self.dimmed_opacity, self.latest_index)
    }

    /// Turn dimming on. The rule is installed lazily here, never at startup.
    pub fn enable<H: StyleHost + ?Sized>(&mut self, host: &mut H) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.sync(host);
    }

    /// Turn dimming off and release the rule. Safe to call repeatedly.
    pub fn disable<H: StyleHost + ?Sized>(&mut self, host: &mut H) {
        self.enabled = false;
        self.release(host);
    }

    /// React to a new active block index.
    ///
    /// `None` means the selection is outside any block; the previous focus is
    /// kept. An unchanged index performs no style work.
    pub fn on_block_index_changed<H: StyleHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: Option<usize>,
    ) {
        let Some(index) = index else {
            return;
        };
        self.latest_index = Some(index);
        if self.enabled {
            self.sync(host);
        }
    }

    /// Forget the active index, e.g. when a different document is mounted.
    pub fn clear_index<H: StyleHost + ?Sized>(&mut self, host: &mut H) {
        self.latest_index = None;
        if self.enabled {
            self.sync(host);
        }
    }

    /// Release host resources while keeping the mode flag.
    pub fn teardown<H: StyleHost + ?Sized>(&mut self, host: &mut H) {
        self.release(host);
    }

    fn release<H: StyleHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(slot) = self.slot.take() {
            host.release_rule(slot);
            self.mutations += 1;
            debug!(slot = slot.0, "focus rule released");
        }
        self.applied_index = None;
    }

    fn sync<H: StyleHost + ?Sized>(&mut self, host: &mut H) {
        let rule = self.current_rule();
        match self.slot {
            None => match host.install_rule(&rule) {
                Ok(slot) => {
                    self.slot = Some(slot);
                    self.applied_index = rule.active_index;
                    self.mutations += 1;
                    debug!(slot = slot.0, active_index = ?rule.active_index, "focus rule installed");
                }
                Err(err) => {
                    // Retried on the next index change.
                    warn!(error = %err, "focus rule install failed");
                }
            },
            Some(slot) => {
                if self.applied_index == rule.active_index {
                    return;
                }
                match host.replace_rule(slot, &rule) {
                    Ok(()) => {
                        self.applied_index = rule.active_index;
                        self.mutations += 1;
                    }
                    Err(err) => {
                        warn!(error = %err, slot = slot.0, "focus rule update failed");
                    }
                }
            }
        }
    }
}
