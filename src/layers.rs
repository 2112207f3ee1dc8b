//! Layer model: everything the compositor draws on a frame.
//!
//! Raster slots are replaced wholesale (`Arc` swap) and never mutated in
//! place, so the renderer sees either the old or the new raster, never a
//! torn one.  Each replacement bumps a generation counter; the renderer uses
//! it to re-upload textures only for slots that actually changed.

use std::sync::Arc;

use egui::Pos2;
use image::RgbaImage;

use crate::engine::MatteMargins;

/// An immutable raster plus its upload generation.
#[derive(Clone)]
pub struct RasterLayer {
    pub image: Arc<RgbaImage>,
    pub generation: u64,
}

/// Rectangle in image space.  Width/height may be negative mid-drag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl ImageRect {
    /// Flip negative spans so origin is the top-left corner.
    pub fn normalized(&self) -> Self {
        let (x, w) = if self.w < 0.0 { (self.x + self.w, -self.w) } else { (self.x, self.w) };
        let (y, h) = if self.h < 0.0 { (self.y + self.h, -self.h) } else { (self.y, self.h) };
        Self { x, y, w, h }
    }

    pub fn is_degenerate(&self) -> bool {
        self.w == 0.0 || self.h == 0.0
    }
}

/// Live lasso feedback: the committed path, the stroke meaning, and an
/// optional rubber-band endpoint (polygon sub-mode preview).
#[derive(Clone, Debug, Default)]
pub struct LassoOverlay {
    pub points: Vec<Pos2>,
    pub subtract: bool,
    pub cursor: Option<Pos2>,
}

/// Radius cursor indicator, image-space.
#[derive(Clone, Copy, Debug, Default)]
pub struct CursorIndicator {
    pub pos: Pos2,
    pub radius: f32,
    pub visible: bool,
}

/// Before/after comparison split.
#[derive(Clone, Copy, Debug)]
pub struct SplitView {
    pub enabled: bool,
    /// Divider position as a fraction of the canvas width, 0..=1.
    pub fraction: f32,
}

impl Default for SplitView {
    fn default() -> Self {
        Self { enabled: false, fraction: 0.5 }
    }
}

#[derive(Default)]
pub struct LayerModel {
    base: Option<RasterLayer>,
    overlay: Option<RasterLayer>,
    comparison: Option<RasterLayer>,
    /// Semi-transparent guide raster with an image-space position.
    solid_source: Option<(RasterLayer, Pos2)>,
    pub garbage_matte: Option<MatteMargins>,
    pub drag_rect: Option<ImageRect>,
    pub lasso: Option<LassoOverlay>,
    pub cursor: CursorIndicator,
    pub split: SplitView,
    next_generation: u64,
}

impl LayerModel {
    fn wrap(&mut self, image: Arc<RgbaImage>) -> RasterLayer {
        self.next_generation += 1;
        RasterLayer { image, generation: self.next_generation }
    }

    pub fn set_base(&mut self, image: Option<Arc<RgbaImage>>) {
        self.base = image.map(|i| self.wrap(i));
    }

    pub fn set_overlay(&mut self, image: Option<Arc<RgbaImage>>) {
        self.overlay = image.map(|i| self.wrap(i));
    }

    pub fn set_comparison(&mut self, image: Option<Arc<RgbaImage>>) {
        self.comparison = image.map(|i| self.wrap(i));
    }

    pub fn set_solid_source(&mut self, image: Option<(Arc<RgbaImage>, Pos2)>) {
        self.solid_source = image.map(|(i, p)| (self.wrap(i), p));
    }

    /// Move the guide layer without re-uploading its texture.
    pub fn set_solid_source_pos(&mut self, pos: Pos2) {
        if let Some((_, p)) = self.solid_source.as_mut() {
            *p = pos;
        }
    }

    pub fn base(&self) -> Option<&RasterLayer> {
        self.base.as_ref()
    }

    pub fn overlay(&self) -> Option<&RasterLayer> {
        self.overlay.as_ref()
    }

    pub fn comparison(&self) -> Option<&RasterLayer> {
        self.comparison.as_ref()
    }

    pub fn solid_source(&self) -> Option<(&RasterLayer, Pos2)> {
        self.solid_source.as_ref().map(|(l, p)| (l, *p))
    }

    /// Dimensions of the base raster, if any.
    pub fn base_size(&self) -> Option<(u32, u32)> {
        self.base.as_ref().map(|l| (l.image.width(), l.image.height()))
    }

    /// Drop everything (whole-app reset).
    pub fn clear(&mut self) {
        self.base = None;
        self.overlay = None;
        self.comparison = None;
        self.solid_source = None;
        self.garbage_matte = None;
        self.drag_rect = None;
        self.lasso = None;
        self.cursor = CursorIndicator::default();
        self.split = SplitView::default();
    }
}
