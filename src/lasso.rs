//! Lasso capture: the freehand/polygon mask-painting state machine.
//!
//! The capture is agnostic to what a stroke *means* — the caller decides the
//! add/subtract semantics per editing mode and supplies `erase`.  Finalizing
//! yields a [`FillRequest`]; the caller snapshots the target mask for undo
//! *before* handing the request to the compute engine.

use egui::Pos2;

use crate::engine::MaskTarget;

/// Minimum image-space displacement before a freehand move commits a new
/// point.  Bounds path density and keeps zero-length segments out of the
/// rasterizer.
pub const MIN_SEGMENT_DIST: f32 = 2.0;

/// Minimum committed points for a fill; anything smaller is discarded.
const MIN_FILL_POINTS: usize = 3;

/// A finished polygon ready for the engine's fill operation.
#[derive(Clone, Debug)]
pub struct FillRequest {
    pub points: Vec<Pos2>,
    pub value: u8,
    pub subtract: bool,
    pub target: MaskTarget,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Drawing,
}

#[derive(Default)]
pub struct LassoCapture {
    phase: Phase,
    points: Vec<Pos2>,
    last: Pos2,
    subtract: bool,
    polygon_mode: bool,
    target: MaskTarget,
    /// Rubber-band endpoint shown while in polygon sub-mode.
    preview_cursor: Option<Pos2>,
}

impl LassoCapture {
    pub fn is_drawing(&self) -> bool {
        self.phase == Phase::Drawing
    }

    pub fn is_polygon_mode(&self) -> bool {
        self.polygon_mode
    }

    pub fn is_subtract(&self) -> bool {
        self.subtract
    }

    pub fn target(&self) -> MaskTarget {
        self.target
    }

    /// Committed path so far.
    pub fn points(&self) -> &[Pos2] {
        &self.points
    }

    /// Rubber-band endpoint, if the preview should stay open toward it.
    pub fn preview_cursor(&self) -> Option<Pos2> {
        self.preview_cursor
    }

    /// Begin a session at `point` (image coordinates).  Holding the modifier
    /// starts directly in polygon sub-mode.
    pub fn start(&mut self, point: Pos2, erase: bool, target: MaskTarget, alt_held: bool) {
        self.phase = Phase::Drawing;
        self.subtract = erase;
        self.target = target;
        self.polygon_mode = alt_held;
        self.points.clear();
        self.points.push(point);
        self.last = point;
        self.preview_cursor = None;
    }

    /// Pointer moved.  Polygon sub-mode only updates the rubber-band
    /// preview; freehand commits the point once it clears the anti-jitter
    /// threshold.
    pub fn movement(&mut self, point: Pos2, alt_held: bool) {
        if self.phase != Phase::Drawing {
            return;
        }
        if alt_held {
            self.polygon_mode = true;
            self.preview_cursor = Some(point);
            return;
        }
        if self.last.distance(point) > MIN_SEGMENT_DIST {
            self.points.push(point);
            self.last = point;
            self.preview_cursor = None;
        }
    }

    /// Pointer released.  Returns `true` when the session finished (freehand
    /// confirm); in polygon sub-mode the release commits a vertex and the
    /// session continues.
    pub fn up(&mut self, point: Pos2, alt_held: bool) -> bool {
        if self.phase != Phase::Drawing {
            return false;
        }
        if alt_held {
            self.points.push(point);
            self.last = point;
            self.preview_cursor = Some(point);
            return false;
        }
        true
    }

    /// Finalize: Drawing→Idle.  Returns the fill request when the committed
    /// path has at least three vertices; degenerate paths are silently
    /// dropped.
    pub fn end(&mut self) -> Option<FillRequest> {
        if self.phase != Phase::Drawing {
            return None;
        }
        self.phase = Phase::Idle;
        self.preview_cursor = None;
        let points = std::mem::take(&mut self.points);
        if points.len() < MIN_FILL_POINTS {
            return None;
        }
        Some(FillRequest {
            points,
            value: 255,
            subtract: self.subtract,
            target: self.target,
        })
    }

    /// Abort without committing anything (pointer capture lost, Escape, …).
    pub fn cancel(&mut self) {
        self.phase = Phase::Idle;
        self.points.clear();
        self.preview_cursor = None;
    }
}
