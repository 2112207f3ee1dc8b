//! Viewport transform: pan/zoom state and the screen↔image affine map.
//!
//! Screen coordinates are canvas-local (origin at the canvas top-left); the
//! map is `screen = image * scale + pan`.  The type is a pure value — it
//! registers no callbacks.  The orchestrator observes pan/scale changes and
//! notifies the buffer-state tracker itself.

use egui::{Pos2, Vec2, pos2};

use crate::engine::ViewRect;

/// Zoom clamp range and wheel step.
pub const MIN_SCALE: f32 = 0.05;
pub const MAX_SCALE: f32 = 50.0;
const ZOOM_STEP: f32 = 0.1;

#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub scale: f32,
    pub pan: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

impl Viewport {
    /// Map a canvas-local screen point to image coordinates.
    pub fn screen_to_image(&self, p: Pos2) -> Pos2 {
        pos2((p.x - self.pan.x) / self.scale, (p.y - self.pan.y) / self.scale)
    }

    /// Map an image point to canvas-local screen coordinates.
    pub fn image_to_screen(&self, p: Pos2) -> Pos2 {
        pos2(p.x * self.scale + self.pan.x, p.y * self.scale + self.pan.y)
    }

    /// Zoom by one wheel step, keeping the image point under `anchor` fixed
    /// on screen.  `delta_sign` is +1 to zoom in, -1 to zoom out.
    pub fn zoom_at(&mut self, anchor: Pos2, delta_sign: f32) {
        let new_scale = (self.scale * (1.0 + delta_sign.signum() * ZOOM_STEP))
            .clamp(MIN_SCALE, MAX_SCALE);
        let img = self.screen_to_image(anchor);
        self.pan = Vec2::new(anchor.x - img.x * new_scale, anchor.y - img.y * new_scale);
        self.scale = new_scale;
    }

    /// Pan by a screen-space delta.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Exact 100% fit (no margin): largest scale at which the whole image is
    /// visible, centered.
    pub fn fit_to_screen(&mut self, img_w: u32, img_h: u32, can_w: f32, can_h: f32) {
        if img_w == 0 || img_h == 0 || can_w <= 0.0 || can_h <= 0.0 {
            return;
        }
        let scale_w = can_w / img_w as f32;
        let scale_h = can_h / img_h as f32;
        self.scale = scale_w.min(scale_h).clamp(MIN_SCALE, MAX_SCALE);
        self.pan = Vec2::new(
            (can_w - img_w as f32 * self.scale) / 2.0,
            (can_h - img_h as f32 * self.scale) / 2.0,
        );
    }

    /// Reset to identity (used by whole-app reset).
    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.pan = Vec2::ZERO;
    }

    /// The visible region in integer image coordinates: inverse-map the
    /// canvas corners and take the enclosing rect (floor origin, ceil span).
    pub fn viewport_rect(&self, can_w: f32, can_h: f32) -> ViewRect {
        let tl = self.screen_to_image(pos2(0.0, 0.0));
        let br = self.screen_to_image(pos2(can_w, can_h));
        ViewRect {
            x: tl.x.floor() as i32,
            y: tl.y.floor() as i32,
            w: (br.x - tl.x).ceil().max(0.0) as u32,
            h: (br.y - tl.y).ceil().max(0.0) as u32,
        }
    }
}
