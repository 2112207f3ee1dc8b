//! Bounded undo: mode-tagged snapshots of the editable mask buffers.
//!
//! One shared stack across modes, FIFO eviction from the oldest end.  A
//! snapshot is taken *before* a destructive edit commits, so popping always
//! restores the state immediately preceding the most recent edit.

use std::collections::VecDeque;

use crate::engine::{ComputeEngine, MaskTarget};
use crate::log_warn;

pub const DEFAULT_UNDO_LIMIT: usize = 3;
const MIN_UNDO_LIMIT: usize = 3;
const MAX_UNDO_LIMIT: usize = 10;

struct UndoSnapshot {
    mode: MaskTarget,
    data: Vec<u8>,
}

pub struct UndoManager {
    stack: VecDeque<UndoSnapshot>,
    limit: usize,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self {
            stack: VecDeque::new(),
            limit: DEFAULT_UNDO_LIMIT,
        }
    }
}

impl UndoManager {
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Set the capacity (clamped to a usable range) and trim oldest-first
    /// immediately if the stack now exceeds it.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.clamp(MIN_UNDO_LIMIT, MAX_UNDO_LIMIT);
        while self.stack.len() > self.limit {
            self.stack.pop_front();
        }
    }

    /// Snapshot the live mask for `mode`.  No-op when the engine has no
    /// buffer for it (not ready).
    pub fn push(&mut self, mode: MaskTarget, engine: &dyn ComputeEngine) {
        let Some(data) = engine.mask_snapshot(mode) else {
            return;
        };
        self.stack.push_back(UndoSnapshot { mode, data });
        while self.stack.len() > self.limit {
            self.stack.pop_front();
        }
    }

    /// Restore the most recent snapshot into the live buffer and return its
    /// mode so the caller knows which view to refresh.  Empty stack → None.
    pub fn pop(&mut self, engine: &mut dyn ComputeEngine) -> Option<MaskTarget> {
        let snap = self.stack.pop_back()?;
        if let Err(e) = engine.restore_mask(snap.mode, &snap.data) {
            log_warn!("undo restore failed: {e}");
            return None;
        }
        Some(snap.mode)
    }

    /// Drop the newest snapshot without restoring it — used when the edit it
    /// guarded never landed.
    pub fn discard_last(&mut self) {
        self.stack.pop_back();
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }
}
