//! Buffer-state tracker: decides whether the authoritative buffers need a
//! full-image or viewport-limited recompute.
//!
//! Interactive edits (slider ticks, matte nudges, lasso commits) only
//! recompute the visible viewport to keep input latency low — the buffers
//! then hold stale data outside it.  Any view change that can expose those
//! pixels (panning, zooming out) must trigger a full recompute
//! *synchronously, before the next paint*; deferring it even one frame shows
//! missing data.

use crate::engine::ViewRect;

/// Whether the authoritative buffers are valid image-wide or only inside the
/// last requested viewport rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BufferState {
    #[default]
    Full,
    Partial,
}

#[derive(Default)]
pub struct BufferStateTracker {
    state: BufferState,
    /// Viewport recorded at the last partial recompute.
    valid_rect: Option<ViewRect>,
}

impl BufferStateTracker {
    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn valid_rect(&self) -> Option<ViewRect> {
        self.valid_rect
    }

    /// A viewport-scoped recompute just ran: buffers are only guaranteed
    /// inside `viewport` now.
    pub fn mark_partial(&mut self, viewport: ViewRect) {
        self.state = BufferState::Partial;
        self.valid_rect = Some(viewport);
    }

    /// A full-image recompute completed.
    pub fn mark_full(&mut self) {
        self.state = BufferState::Full;
        self.valid_rect = None;
    }

    /// The view changed; `current` is the new visible rect.  Returns `true`
    /// when the caller must run a full recompute *now*, in this same event
    /// turn: the buffers are Partial and the new view reaches outside the
    /// region they are valid for.  Anchored zoom-in stays inside the valid
    /// rect and never triggers; panning and zooming out do.
    #[must_use]
    pub fn note_view(&mut self, current: ViewRect) -> bool {
        match (self.state, &self.valid_rect) {
            (BufferState::Partial, Some(valid)) => !valid.contains(&current),
            _ => false,
        }
    }
}
