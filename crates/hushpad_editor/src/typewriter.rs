//! Typewriter scrolling: keep the caret vertically centered.
//!
//! Small drifts animate toward the target a fixed fraction per frame; large
//! jumps (line breaks, paste, navigation) snap immediately. Every animation
//! carries a cancellation token and a hard deadline, so no sequence of
//! retargets can keep one alive forever.

use crate::surface::{CursorRect, ScrollViewport};
use hushpad_core::constants::DEFAULT_TYPEWRITER_MAX_DURATION_MS;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Tuning for the centering behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypewriterConfig {
    /// Offsets smaller than this are left alone.
    pub deadband_px: f32,
    /// Caret movement beyond this between observations is a jump.
    pub jump_threshold_px: f32,
    /// Share of the remaining distance closed per frame.
    pub step_fraction: f32,
    /// Remaining distance at which the animation snaps and stops.
    pub settle_epsilon_px: f32,
    /// Viewport movement beyond this that we did not cause counts as a
    /// manual scroll.
    pub manual_scroll_tolerance_px: f32,
    pub max_duration: Duration,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            deadband_px: 2.0,
            jump_threshold_px: 30.0,
            step_fraction: 0.25,
            settle_epsilon_px: 0.5,
            manual_scroll_tolerance_px: 1.0,
            max_duration: Duration::from_millis(DEFAULT_TYPEWRITER_MAX_DURATION_MS),
        }
    }
}

/// How the caller wants the viewport to follow a caret move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMode {
    Smooth,
    Instant,
}

/// Shared cancellation flag for one animation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why an animation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Converged,
    DeadlineReached,
    Cancelled,
    ManualScroll,
    Unmeasurable,
}

/// Result of one animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Finished(Termination),
}

/// One in-flight scroll animation.
#[derive(Debug, Clone)]
pub struct ScrollAnimation {
    target: f32,
    started_at: Instant,
    deadline: Instant,
    token: CancelToken,
    last_applied: Option<f32>,
    steps: u32,
}

impl ScrollAnimation {
    pub fn new(target: f32, now: Instant, max_duration: Duration) -> Self {
        Self {
            target,
            started_at: now,
            deadline: now + max_duration,
            token: CancelToken::new(),
            last_applied: None,
            steps: 0,
        }
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Move the target without touching the deadline.
    pub fn retarget(&mut self, target: f32) {
        self.target = target;
    }

    /// Advance one frame.
    pub fn step<V: ScrollViewport + ?Sized>(
        &mut self,
        viewport: &mut V,
        config: &TypewriterConfig,
        now: Instant,
    ) -> StepOutcome {
        if self.token.is_cancelled() {
            return StepOutcome::Finished(Termination::Cancelled);
        }
        if now >= self.deadline {
            return StepOutcome::Finished(Termination::DeadlineReached);
        }
        let Some(metrics) = viewport.viewport_metrics().filter(|m| m.is_measurable()) else {
            return StepOutcome::Finished(Termination::Unmeasurable);
        };
        if let Some(last) = self.last_applied {
            if (metrics.scroll_top - last).abs() > config.manual_scroll_tolerance_px {
                return StepOutcome::Finished(Termination::ManualScroll);
            }
        }

        let target = metrics.clamp_scroll(self.target);
        let remaining = target - metrics.scroll_top;
        if remaining.abs() < config.settle_epsilon_px {
            viewport.set_scroll_top(target);
            return StepOutcome::Finished(Termination::Converged);
        }

        let next = metrics.scroll_top + remaining * config.step_fraction;
        viewport.set_scroll_top(next);
        self.last_applied = Some(next);
        self.steps += 1;
        StepOutcome::Continue
    }
}

/// Public view of the centering state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollTarget {
    pub desired_offset: Option<f32>,
    /// Caret midpoint in document coordinates.
    pub last_observed_cursor_y: Option<f32>,
    pub animating: bool,
    pub animation_started_at: Option<Instant>,
}

/// What a caret move did to the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollAction {
    /// Typewriter mode is off or geometry was unusable.
    Ignored,
    /// Caret already centered within the dead-band.
    Centered,
    Jumped { offset: f32 },
    Animating { target: f32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypewriterStats {
    pub jumps: u64,
    pub animations_started: u64,
    pub animation_steps: u64,
}

/// Drives the viewport so the caret stays at its vertical center.
#[derive(Debug)]
pub struct TypewriterController {
    config: TypewriterConfig,
    enabled: bool,
    last_cursor_y: Option<f32>,
    desired_offset: Option<f32>,
    animation: Option<ScrollAnimation>,
    last_termination: Option<Termination>,
    stats: TypewriterStats,
}

impl TypewriterController {
    pub fn new(config: TypewriterConfig) -> Self {
        Self {
            config,
            enabled: false,
            last_cursor_y: None,
            desired_offset: None,
            animation: None,
            last_termination: None,
            stats: TypewriterStats::default(),
        }
    }

    pub fn config(&self) -> &TypewriterConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn animation(&self) -> Option<&ScrollAnimation> {
        self.animation.as_ref()
    }

    pub fn last_termination(&self) -> Option<Termination> {
        self.last_termination
    }

    pub fn stats(&self) -> TypewriterStats {
        self.stats
    }

    pub fn scroll_target(&self) -> ScrollTarget {
        ScrollTarget {
            desired_offset: self.desired_offset,
            last_observed_cursor_y: self.last_cursor_y,
            animating: self.animation.is_some(),
            animation_started_at: self.animation.as_ref().map(|a| a.started_at),
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Turn centering off, cancelling any animation.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.reset();
    }

    /// Cancel the running animation, if any. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        self.finish(Termination::Cancelled);
    }

    /// Cancel and forget the previous caret position.
    pub fn reset(&mut self) {
        self.cancel();
        self.last_cursor_y = None;
        self.desired_offset = None;
    }

    /// The user scrolled by hand; stop fighting them.
    pub fn on_user_scroll(&mut self) {
        self.finish(Termination::ManualScroll);
    }

    /// React to new caret geometry.
    ///
    /// The first observation after enabling or a reset has no previous
    /// position and is treated as a jump.
    pub fn on_cursor_moved<V: ScrollViewport + ?Sized>(
        &mut self,
        viewport: &mut V,
        rect: Option<CursorRect>,
        mode: ScrollMode,
        now: Instant,
    ) -> ScrollAction {
        if !self.enabled {
            return ScrollAction::Ignored;
        }
        let Some(rect) = rect.filter(CursorRect::is_measurable) else {
            return ScrollAction::Ignored;
        };
        let Some(metrics) = viewport.viewport_metrics().filter(|m| m.is_measurable()) else {
            return ScrollAction::Ignored;
        };

        let cursor_y = rect.center_y();
        // Compare in document space so our own scrolling is not a caret move.
        let document_y = cursor_y + metrics.scroll_top;
        let moved = self.last_cursor_y.map(|last| (document_y - last).abs());
        self.last_cursor_y = Some(document_y);

        let offset = cursor_y - metrics.center_y();
        if offset.abs() < self.config.deadband_px {
            return ScrollAction::Centered;
        }

        let desired = metrics.clamp_scroll(metrics.scroll_top + offset);
        self.desired_offset = Some(desired);

        let is_jump = mode == ScrollMode::Instant
            || moved.map_or(true, |distance| distance > self.config.jump_threshold_px);
        if is_jump {
            self.cancel();
            viewport.set_scroll_top(desired);
            self.stats.jumps += 1;
            debug!(offset = desired, "typewriter jump");
            return ScrollAction::Jumped { offset: desired };
        }

        let remaining = (desired - metrics.scroll_top).abs();
        match self.animation.as_mut() {
            Some(animation) if !animation.token.is_cancelled() => animation.retarget(desired),
            // Pinned at an edge of the scroll range: nothing to animate.
            _ if remaining < self.config.settle_epsilon_px => return ScrollAction::Centered,
            _ => {
                self.animation = Some(ScrollAnimation::new(
                    desired,
                    now,
                    self.config.max_duration,
                ));
                self.stats.animations_started += 1;
                trace!(target_offset = desired, "typewriter animation started");
            }
        }
        ScrollAction::Animating { target: desired }
    }

    /// Frame hook: advance the running animation.
    ///
    /// # Returns
    /// The termination reason when the animation stopped on this frame.
    pub fn on_frame<V: ScrollViewport + ?Sized>(
        &mut self,
        viewport: &mut V,
        now: Instant,
    ) -> Option<Termination> {
        let animation = self.animation.as_mut()?;
        match animation.step(viewport, &self.config, now) {
            StepOutcome::Continue => {
                self.stats.animation_steps += 1;
                None
            }
            StepOutcome::Finished(reason) => {
                self.finish(reason);
                Some(reason)
            }
        }
    }

    fn finish(&mut self, reason: Termination) {
        if let Some(animation) = self.animation.take() {
            animation.token.cancel();
            self.last_termination = Some(reason);
            trace!(?reason, steps = animation.steps, "typewriter animation finished");
        }
    }
}
