//! Mode controller: orchestrates the viewport, layer model, buffer-state
//! tracker, lasso capture and undo stack around the compute engine.
//!
//! All editor state lives in one explicit [`EditorContext`] rather than
//! scattered flags, and every operation runs to completion within the event
//! turn that triggered it — a forced full recompute always finishes before
//! the paint that follows.

use std::path::Path;
use std::sync::Arc;

use egui::{PointerButton, Pos2, Vec2, pos2};
use image::{Rgba, RgbaImage};

use crate::engine::{
    BufferSlot, ComputeEngine, EngineError, MaskTarget, MatteMargins, MatteParams, RecomputeScope,
    SolidParams, ViewRect,
};
use crate::history::UndoManager;
use crate::lasso::LassoCapture;
use crate::layers::{ImageRect, LassoOverlay, LayerModel};
use crate::render::SPLIT_HANDLE_RADIUS;
use crate::tracker::{BufferState, BufferStateTracker};
use crate::viewport::Viewport;
use crate::{log_err, log_info};

// ============================================================================
// EDITOR STATE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EditorMode {
    #[default]
    Basic,
    Trash,
    Solid,
}

/// Mutually exclusive sub-modes.  Entering one cleanly exits the previous.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SubMode {
    #[default]
    None,
    /// Arrow-key alignment nudging (Trash).  Runs on offset previews and
    /// viewport-limited alpha recomputes; exit forces a full recompute.
    AlignmentAdjust,
    /// Drag a rectangle that becomes the garbage-matte margins.
    MatteRectEdit,
    /// Position the staged solid-source raster (Solid).
    SourcePlacement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backdrop {
    Checker,
    Color([u8; 3]),
}

impl Default for Backdrop {
    fn default() -> Self {
        Backdrop::Checker
    }
}

/// Solid-mode visualization toggles.
#[derive(Clone, Copy, Debug)]
pub struct SolidVis {
    pub pen: bool,
    pub solid: bool,
}

impl Default for SolidVis {
    fn default() -> Self {
        Self { pen: false, solid: true }
    }
}

/// The whole of the editor's mutable flag state, in one place.
#[derive(Default)]
pub struct EditorContext {
    pub mode: EditorMode,
    pub sub_mode: SubMode,
    /// One-time first-entry side effects, reset per loaded-image session.
    pub entered_trash: bool,
    pub entered_solid: bool,
    pub trash_overlay: bool,
    pub solid_vis: SolidVis,
    pub backdrop: Backdrop,
    /// Backdrop saved while the quick-preview key is held.
    pub quick_backdrop: Option<Backdrop>,
    pub params: MatteParams,
    pub solid_params: SolidParams,
    pub speed_priority: bool,
    pub trash_anti_alias: bool,
    pub solid_anti_alias: bool,
    pub base_filename: String,
}

/// Display/offset state saved on entering alignment adjustment.
struct AlignBackup {
    offset: (i32, i32),
    soft_alpha: bool,
    trash_overlay: bool,
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct ModeController {
    pub ctx: EditorContext,
    pub viewport: Viewport,
    pub layers: LayerModel,
    tracker: BufferStateTracker,
    lasso: LassoCapture,
    history: UndoManager,
    engine: Box<dyn ComputeEngine>,
    /// The raw before-image, kept for the comparison split.
    comparison_source: Option<Arc<RgbaImage>>,
    canvas_size: Vec2,
    /// Alignment offset mirror (authoritative value lives in the engine).
    offset: (i32, i32),
    /// Offset computed at load time, restorable via alignment cancel.
    auto_offset: (i32, i32),
    align_backup: Option<AlignBackup>,
    solid_source_pos: Pos2,
    dragging_splitter: bool,
    dragging_matte: bool,
    matte_start: Option<Pos2>,
}

impl ModeController {
    pub fn new(engine: Box<dyn ComputeEngine>) -> Self {
        Self {
            ctx: EditorContext::default(),
            viewport: Viewport::default(),
            layers: LayerModel::default(),
            tracker: BufferStateTracker::default(),
            lasso: LassoCapture::default(),
            history: UndoManager::default(),
            engine,
            comparison_source: None,
            canvas_size: Vec2::new(1.0, 1.0),
            offset: (0, 0),
            auto_offset: (0, 0),
            align_backup: None,
            solid_source_pos: pos2(0.0, 0.0),
            dragging_splitter: false,
            dragging_matte: false,
            matte_start: None,
        }
    }

    // ---- accessors ---------------------------------------------------------

    pub fn engine(&self) -> &dyn ComputeEngine {
        self.engine.as_ref()
    }

    pub fn buffer_state(&self) -> BufferState {
        self.tracker.state()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.len()
    }

    pub fn set_undo_limit(&mut self, limit: usize) {
        self.history.set_limit(limit);
    }

    pub fn undo_limit(&self) -> usize {
        self.history.limit()
    }

    pub fn alignment_offset(&self) -> (i32, i32) {
        self.offset
    }

    pub fn is_lasso_drawing(&self) -> bool {
        self.lasso.is_drawing()
    }

    /// Alignment translation for the compositor: visible only while nudging,
    /// afterwards the recomputed buffers already contain the shift.
    pub fn render_offset(&self) -> Vec2 {
        if self.ctx.sub_mode == SubMode::AlignmentAdjust {
            Vec2::new(self.offset.0 as f32, self.offset.1 as f32)
        } else {
            Vec2::ZERO
        }
    }

    /// Record the canvas size for viewport-rect derivation; called once per
    /// frame before input handling.
    pub fn set_canvas_size(&mut self, size: Vec2) {
        if size.x > 0.0 && size.y > 0.0 {
            self.canvas_size = size;
        }
    }

    fn view_rect(&self) -> ViewRect {
        self.viewport.viewport_rect(self.canvas_size.x, self.canvas_size.y)
    }

    // ---- image loading / reset ---------------------------------------------

    /// Load the source pair.  Keeps a copy of the before-image for the
    /// comparison split, syncs the auto-alignment offset, and fits the view.
    pub fn load_images(
        &mut self,
        black: RgbaImage,
        white: RgbaImage,
        auto_align: bool,
        filename: &Path,
    ) -> Result<(), EngineError> {
        let before = Arc::new(black.clone());
        self.engine.load_images(black, white, auto_align)?;
        self.offset = self.engine.alignment_offset();
        self.auto_offset = self.offset;
        self.ctx.base_filename = filename
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        self.comparison_source = Some(before.clone());
        self.layers.set_comparison(Some(before));
        self.history.clear();

        let (w, h) = self.engine.dimensions();
        self.viewport
            .fit_to_screen(w, h, self.canvas_size.x, self.canvas_size.y);
        self.tracker.mark_full();
        log_info!(
            "loaded image pair {}x{} ({}), auto offset ({}, {})",
            w,
            h,
            self.ctx.base_filename,
            self.offset.0,
            self.offset.1
        );
        self.update_main_view();
        Ok(())
    }

    /// Whole-app reset: images, masks, undo, offsets, flags and view.
    pub fn reset_all(&mut self) {
        self.lasso.cancel();
        self.engine.reset();
        self.layers.clear();
        self.history.clear();
        self.comparison_source = None;
        self.viewport.reset();
        self.tracker = BufferStateTracker::default();
        self.offset = (0, 0);
        self.auto_offset = (0, 0);
        self.align_backup = None;
        self.ctx = EditorContext::default();
        log_info!("editor reset");
    }

    // ---- viewport navigation -----------------------------------------------

    pub fn wheel_zoom(&mut self, anchor: Pos2, delta_sign: f32) {
        self.viewport.zoom_at(anchor, delta_sign);
        self.note_view_changed();
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.viewport.pan_by(delta);
        self.note_view_changed();
    }

    pub fn fit_to_screen(&mut self) {
        let Some((w, h)) = self.image_dims() else { return };
        self.viewport
            .fit_to_screen(w, h, self.canvas_size.x, self.canvas_size.y);
        self.note_view_changed();
    }

    fn image_dims(&self) -> Option<(u32, u32)> {
        if self.engine.has_images() {
            Some(self.engine.dimensions())
        } else {
            None
        }
    }

    /// Ask the tracker whether this view change exposes uncomputed pixels;
    /// if so, run the full recompute *now*, before the upcoming paint.
    fn note_view_changed(&mut self) {
        let rect = self.view_rect();
        if self.tracker.note_view(rect) {
            self.full_recompute_now();
        }
    }

    fn full_recompute_now(&mut self) {
        if !self.engine.has_images() {
            return;
        }
        match self
            .engine
            .recompute(RecomputeScope::FullImage, &self.ctx.params)
        {
            Ok(()) => {
                self.tracker.mark_full();
                self.update_main_view();
            }
            // Keep the prior state: falsely marking Full would hide the
            // stale region forever.
            Err(e) => log_err!("full recompute failed: {e}"),
        }
    }

    /// A destructive or parameter edit happened: recompute the visible
    /// viewport only, then mark the buffers Partial.
    fn mark_edit(&mut self) {
        if !self.engine.has_images() {
            return;
        }
        let rect = self.view_rect();
        match self
            .engine
            .recompute(RecomputeScope::Viewport(rect), &self.ctx.params)
        {
            Ok(()) => self.tracker.mark_partial(rect),
            Err(e) => log_err!("viewport recompute failed: {e}"),
        }
        self.update_main_view();
    }

    // ---- parameter edits ---------------------------------------------------

    pub fn set_threshold(&mut self, value: u8) {
        self.ctx.params.threshold = value;
        self.mark_edit();
    }

    pub fn set_matte_margins(&mut self, matte: MatteMargins) {
        self.ctx.params.matte = matte;
        self.ctx.solid_params.matte = matte;
        if self.ctx.mode == EditorMode::Trash {
            self.layers.garbage_matte = Some(matte);
        }
        self.mark_edit();
    }

    pub fn set_soft_alpha(&mut self, soft: bool) {
        self.ctx.params.soft_alpha = soft;
        self.mark_edit();
    }

    pub fn set_trash_overlay(&mut self, on: bool) {
        self.ctx.trash_overlay = on;
        self.update_main_view();
    }

    pub fn set_solid_vis(&mut self, vis: SolidVis) {
        self.ctx.solid_vis = vis;
        self.update_main_view();
    }

    pub fn set_solid_level(&mut self, level: u8) {
        self.ctx.solid_params.level = level;
        if self.engine.has_images() {
            if let Err(e) = self.engine.update_solid_params(&self.ctx.solid_params) {
                log_err!("solid param update failed: {e}");
            }
            self.update_main_view();
        }
    }

    /// Reset the trash mask back to the plain extraction.
    pub fn reset_trash(&mut self) {
        if !self.engine.has_images() {
            return;
        }
        if let Err(e) = self.engine.reset_trash_mode() {
            log_err!("trash reset failed: {e}");
            return;
        }
        // A reset invalidates everything previously computed partially.
        self.full_recompute_now();
    }

    /// Clear the solid coverage mask.
    pub fn reset_solid(&mut self) {
        if !self.engine.has_images() {
            return;
        }
        if let Err(e) = self.engine.reset_solid_mode() {
            log_err!("solid reset failed: {e}");
            return;
        }
        self.update_main_view();
    }

    pub fn set_comparison(&mut self, enabled: bool) {
        self.layers.split.enabled = enabled;
        if enabled {
            self.layers.set_comparison(self.comparison_source.clone());
        }
        self.update_main_view();
    }

    // ---- mode switching ----------------------------------------------------

    pub fn switch_mode(&mut self, new_mode: EditorMode) {
        if new_mode == self.ctx.mode {
            return;
        }
        // A live sub-mode cannot survive its mode; cancel it first.
        if self.ctx.sub_mode != SubMode::None {
            self.exit_sub_mode(false);
        }
        // Leaving Trash folds the transient edits into the base buffer so
        // the mode switch never loses them.
        if self.ctx.mode == EditorMode::Trash && self.engine.has_images() {
            if let Err(e) = self.engine.finalize_trash_mode(&self.ctx.params) {
                log_err!("finalize on mode switch failed: {e}");
            }
        }
        self.ctx.mode = new_mode;
        log_info!("mode -> {:?}", new_mode);

        // Matte rectangles render in Trash only; the margins themselves
        // persist across modes.
        self.layers.garbage_matte = (new_mode == EditorMode::Trash
            && !self.ctx.params.matte.is_zero())
        .then_some(self.ctx.params.matte);

        if !self.engine.has_images() {
            return;
        }

        if new_mode == EditorMode::Solid {
            // Re-push solid params so region-limited buffers from an older
            // garbage-matte configuration are cleared before first use.
            if let Err(e) = self.engine.update_solid_params(&self.ctx.solid_params) {
                log_err!("solid param refresh failed: {e}");
            }
        }

        match new_mode {
            EditorMode::Trash if !self.ctx.entered_trash => {
                self.ctx.entered_trash = true;
                self.ctx.backdrop = Backdrop::Color([0, 0, 0]);
                self.ctx.params.soft_alpha = false;
                self.ctx.trash_overlay = false;
                if let Err(e) = self.engine.init_trash_mode() {
                    log_err!("trash init failed: {e}");
                }
            }
            EditorMode::Solid if !self.ctx.entered_solid => {
                self.ctx.entered_solid = true;
                self.ctx.backdrop = Backdrop::Checker;
                self.layers.split.enabled = false;
                self.ctx.solid_vis = SolidVis::default();
            }
            _ => {}
        }
        self.update_main_view();
    }

    // ---- sub-modes ---------------------------------------------------------

    pub fn enter_sub_mode(&mut self, sub: SubMode) {
        if self.ctx.sub_mode == sub {
            return;
        }
        if self.ctx.sub_mode != SubMode::None {
            self.exit_sub_mode(false);
        }
        match sub {
            SubMode::AlignmentAdjust => {
                if self.ctx.mode != EditorMode::Trash {
                    return;
                }
                self.align_backup = Some(AlignBackup {
                    offset: self.offset,
                    soft_alpha: self.ctx.params.soft_alpha,
                    trash_overlay: self.ctx.trash_overlay,
                });
                // Alignment is judged on the soft alpha, without overlays.
                self.ctx.params.soft_alpha = true;
                self.ctx.trash_overlay = false;
                self.ctx.sub_mode = sub;
                self.update_main_view();
            }
            SubMode::MatteRectEdit => {
                self.layers.drag_rect = None;
                self.ctx.sub_mode = sub;
            }
            SubMode::SourcePlacement | SubMode::None => {
                self.ctx.sub_mode = sub;
            }
        }
        log_info!("sub-mode -> {:?}", self.ctx.sub_mode);
    }

    /// Stage a solid-source raster and enter placement.  The guide layer is
    /// a red-tinted copy so the operator sees coverage, not content.
    pub fn begin_source_placement(&mut self, source: RgbaImage) -> Result<(), EngineError> {
        let (iw, ih) = self.engine.dimensions();
        let x = (iw as i32 - source.width() as i32) / 2;
        let y = (ih as i32 - source.height() as i32) / 2;
        let guide = red_guide(&source);
        self.engine.load_solid_source(source, x, y)?;
        self.solid_source_pos = pos2(x as f32, y as f32);
        self.layers
            .set_solid_source(Some((Arc::new(guide), self.solid_source_pos)));
        self.switch_mode(EditorMode::Solid);
        self.enter_sub_mode(SubMode::SourcePlacement);
        self.update_main_view();
        Ok(())
    }

    /// Leave the active sub-mode.  `commit` decides between the destructive
    /// confirm step and the cancel path that restores prior parameters.
    pub fn exit_sub_mode(&mut self, commit: bool) {
        let sub = self.ctx.sub_mode;
        self.ctx.sub_mode = SubMode::None;
        match sub {
            SubMode::None => {}
            SubMode::AlignmentAdjust => {
                if let Some(backup) = self.align_backup.take() {
                    if commit {
                        let (x, y) = self.offset;
                        if let Err(e) = self.engine.confirm_alignment_offset(x, y) {
                            log_err!("alignment confirm failed: {e}");
                        } else if let Err(e) = self.engine.init_trash_mode() {
                            log_err!("trash re-init after alignment failed: {e}");
                        }
                    } else {
                        self.offset = backup.offset;
                        self.engine.set_alignment_offset(backup.offset.0, backup.offset.1);
                    }
                    self.ctx.params.soft_alpha = backup.soft_alpha;
                    self.ctx.trash_overlay = backup.trash_overlay;
                }
                // The sub-mode ran on offset previews and viewport-limited
                // alpha; leaving it must resynchronize the whole image.
                self.full_recompute_now();
            }
            SubMode::MatteRectEdit => {
                if commit
                    && let Some(rect) = self.layers.drag_rect
                    && !rect.is_degenerate()
                {
                    self.apply_matte_from_rect(rect);
                }
                self.layers.drag_rect = None;
                self.dragging_matte = false;
                self.matte_start = None;
            }
            SubMode::SourcePlacement => {
                if commit {
                    if let Err(e) = self.engine.commit_solid_source() {
                        log_err!("solid source commit failed: {e}");
                    } else {
                        self.mark_edit();
                    }
                } else {
                    self.engine.discard_solid_source();
                }
                self.layers.set_solid_source(None);
                self.update_main_view();
            }
        }
    }

    /// Convert a dragged rectangle into garbage-matte margins.
    fn apply_matte_from_rect(&mut self, rect: ImageRect) {
        let Some((iw, ih)) = self.image_dims() else { return };
        let (iw, ih) = (iw as f32, ih as f32);
        let r = rect.normalized();
        let x = r.x.clamp(0.0, iw);
        let y = r.y.clamp(0.0, ih);
        let w = r.w.min(iw - x);
        let h = r.h.min(ih - y);
        let matte = MatteMargins {
            top: y.floor() as u32,
            left: x.floor() as u32,
            bottom: (ih - (y + h)).floor().max(0.0) as u32,
            right: (iw - (x + w)).floor().max(0.0) as u32,
        };
        self.set_matte_margins(matte);
    }

    // ---- pointer routing ---------------------------------------------------

    /// Priority: splitter > pan (handled by the shell) > matte drag > lasso.
    /// `pos` is canvas-local screen coordinates.
    pub fn pointer_down(
        &mut self,
        pos: Pos2,
        button: PointerButton,
        alt_held: bool,
        z_held: bool,
    ) {
        if self.layers.split.enabled {
            let split_x = self.canvas_size.x * self.layers.split.fraction;
            if (pos.x - split_x).abs() < SPLIT_HANDLE_RADIUS {
                self.dragging_splitter = true;
                return;
            }
        }

        if self.ctx.sub_mode == SubMode::SourcePlacement {
            return;
        }

        let img = self.viewport.screen_to_image(pos);

        if self.ctx.sub_mode == SubMode::MatteRectEdit {
            if button != PointerButton::Primary {
                return;
            }
            self.dragging_matte = true;
            self.matte_start = Some(img);
            self.layers.drag_rect = Some(ImageRect { x: img.x, y: img.y, w: 0.0, h: 0.0 });
            return;
        }

        // Lasso start
        let target = match self.ctx.mode {
            EditorMode::Trash => MaskTarget::Trash,
            EditorMode::Solid => MaskTarget::Solid,
            EditorMode::Basic => return,
        };
        if self.layers.split.enabled && !z_held {
            return;
        }
        if self.ctx.sub_mode != SubMode::None || self.lasso.is_drawing() {
            return;
        }
        let erase = match button {
            // Trash: primary carves the mask, secondary restores.
            PointerButton::Primary => target == MaskTarget::Trash,
            // Solid: primary fills, secondary removes.
            PointerButton::Secondary => target == MaskTarget::Solid,
            _ => return,
        };
        self.lasso.start(img, erase, target, alt_held);
        self.sync_lasso_overlay();
    }

    pub fn pointer_move(&mut self, pos: Pos2, alt_held: bool) {
        if self.dragging_splitter {
            self.layers.split.fraction = (pos.x / self.canvas_size.x).clamp(0.0, 1.0);
            return;
        }
        if self.ctx.sub_mode == SubMode::SourcePlacement {
            return;
        }
        let img = self.viewport.screen_to_image(pos);
        if self.lasso.is_drawing() {
            self.lasso.movement(img, alt_held);
            self.sync_lasso_overlay();
            return;
        }
        if self.dragging_matte
            && let Some(start) = self.matte_start
        {
            self.layers.drag_rect = Some(ImageRect {
                x: start.x,
                y: start.y,
                w: img.x - start.x,
                h: img.y - start.y,
            });
        }
    }

    pub fn pointer_up(&mut self, pos: Pos2, alt_held: bool) {
        self.dragging_splitter = false;
        self.dragging_matte = false;
        if self.lasso.is_drawing() {
            let img = self.viewport.screen_to_image(pos);
            let finished = self.lasso.up(img, alt_held);
            self.sync_lasso_overlay();
            if finished {
                self.finalize_lasso();
            }
        }
    }

    /// Pointer capture lost: abort any in-flight capture without committing.
    pub fn pointer_leave(&mut self) {
        self.dragging_splitter = false;
        self.dragging_matte = false;
        if self.lasso.is_drawing() {
            self.lasso.cancel();
            self.sync_lasso_overlay();
        }
        self.layers.cursor.visible = false;
    }

    /// Releasing the polygon modifier finalizes a polygon-mode session.
    pub fn alt_released(&mut self) {
        if self.lasso.is_drawing() && self.lasso.is_polygon_mode() {
            self.finalize_lasso();
        }
    }

    fn finalize_lasso(&mut self) {
        let request = self.lasso.end();
        self.sync_lasso_overlay();
        let Some(req) = request else { return };
        // Snapshot strictly before the mutating fill.
        self.history.push(req.target, self.engine.as_ref());
        let anti_alias = match req.target {
            MaskTarget::Trash => self.ctx.trash_anti_alias,
            MaskTarget::Solid => self.ctx.solid_anti_alias,
        };
        let points: Vec<(f32, f32)> = req.points.iter().map(|p| (p.x, p.y)).collect();
        match self.engine.fill_polygon(
            &points,
            req.value,
            req.subtract,
            anti_alias,
            req.target,
        ) {
            Ok(()) => {
                log_info!(
                    "lasso fill: {} points, target {:?}, subtract {}",
                    points.len(),
                    req.target,
                    req.subtract
                );
                self.mark_edit();
            }
            Err(e) => {
                // The edit never landed; drop the snapshot taken for it.
                self.history.discard_last();
                log_err!("lasso fill failed: {e}");
            }
        }
    }

    fn sync_lasso_overlay(&mut self) {
        self.layers.lasso = self.lasso.is_drawing().then(|| LassoOverlay {
            points: self.lasso.points().to_vec(),
            subtract: self.lasso.is_subtract(),
            cursor: self.lasso.preview_cursor(),
        });
    }

    // ---- keyboard ----------------------------------------------------------

    /// Arrow-key nudge; `dx`/`dy` are -1/0/1, shift scales the step.
    pub fn arrow_key(&mut self, dx: i32, dy: i32, shift: bool) {
        let step = if shift { 10 } else { 1 };
        match self.ctx.sub_mode {
            SubMode::AlignmentAdjust => {
                self.offset.0 += dx * step;
                self.offset.1 += dy * step;
                let rect = self.view_rect();
                match self.engine.alignment_preview(
                    self.offset.0,
                    self.offset.1,
                    &self.ctx.params,
                    RecomputeScope::Viewport(rect),
                    self.ctx.speed_priority,
                ) {
                    Ok(()) => self.tracker.mark_partial(rect),
                    Err(e) => log_err!("alignment preview failed: {e}"),
                }
                self.update_main_view();
            }
            SubMode::SourcePlacement => {
                self.engine.move_solid_source(dx * step, dy * step);
                self.solid_source_pos += Vec2::new((dx * step) as f32, (dy * step) as f32);
                self.layers.set_solid_source_pos(self.solid_source_pos);
            }
            _ => {}
        }
    }

    /// Restore the offset the engine estimated at load time (alignment
    /// adjustment only).
    pub fn reset_to_auto_align(&mut self) {
        if self.ctx.sub_mode != SubMode::AlignmentAdjust {
            return;
        }
        self.offset = self.auto_offset;
        self.engine.set_alignment_offset(self.offset.0, self.offset.1);
        let rect = self.view_rect();
        match self.engine.alignment_preview(
            self.offset.0,
            self.offset.1,
            &self.ctx.params,
            RecomputeScope::Viewport(rect),
            self.ctx.speed_priority,
        ) {
            Ok(()) => self.tracker.mark_partial(rect),
            Err(e) => log_err!("auto-align restore failed: {e}"),
        }
        self.update_main_view();
    }

    pub fn enter_key(&mut self) {
        if self.ctx.sub_mode != SubMode::None {
            self.exit_sub_mode(true);
        }
    }

    pub fn escape_key(&mut self) {
        if self.ctx.sub_mode != SubMode::None {
            self.exit_sub_mode(false);
        } else if self.lasso.is_drawing() {
            self.lasso.cancel();
            self.sync_lasso_overlay();
        }
    }

    /// Run a solid fill shot over the current mask.
    pub fn solid_shot(&mut self) {
        if self.ctx.mode != EditorMode::Solid || !self.engine.has_images() {
            return;
        }
        self.history.push(MaskTarget::Solid, self.engine.as_ref());
        match self.engine.execute_solid_shot() {
            Ok(()) => self.mark_edit(),
            Err(e) => {
                self.history.discard_last();
                log_err!("solid shot failed: {e}");
            }
        }
    }

    pub fn undo(&mut self) {
        match self.history.pop(self.engine.as_mut()) {
            Some(MaskTarget::Trash) => self.mark_edit(),
            Some(MaskTarget::Solid) => {
                self.tracker.mark_partial(self.view_rect());
                self.update_main_view();
            }
            None => {}
        }
    }

    /// Quick backdrop preview: toggle checker⇄color while the key is held.
    pub fn quick_backdrop_press(&mut self) {
        if self.ctx.sub_mode != SubMode::None || self.ctx.quick_backdrop.is_some() {
            return;
        }
        self.ctx.quick_backdrop = Some(self.ctx.backdrop);
        self.ctx.backdrop = match self.ctx.backdrop {
            Backdrop::Checker => Backdrop::Color([0, 0, 0]),
            Backdrop::Color(_) => Backdrop::Checker,
        };
    }

    pub fn quick_backdrop_release(&mut self) {
        if let Some(saved) = self.ctx.quick_backdrop.take() {
            self.ctx.backdrop = saved;
        }
    }

    // ---- display -----------------------------------------------------------

    /// Pull fresh raster copies from the engine into the layer model, per
    /// the current mode and sub-mode.
    pub fn update_main_view(&mut self) {
        if !self.engine.has_images() {
            self.layers.set_base(None);
            self.layers.set_overlay(None);
            return;
        }
        let ctx = &self.ctx;
        let (img, overlay) = match ctx.mode {
            EditorMode::Basic => {
                let slot = if ctx.entered_trash {
                    BufferSlot::AlphaApplied
                } else {
                    BufferSlot::Basic
                };
                (self.engine.buffer(slot), None)
            }
            EditorMode::Trash => {
                if ctx.sub_mode == SubMode::AlignmentAdjust {
                    (self.engine.buffer(BufferSlot::Soft), None)
                } else if ctx.params.soft_alpha {
                    // Soft display: the overlay toggle *replaces* the matte
                    // with the applied view.
                    let slot = if ctx.trash_overlay {
                        BufferSlot::AlphaApplied
                    } else {
                        BufferSlot::Soft
                    };
                    (self.engine.buffer(slot), None)
                } else {
                    // Hard display: the overlay toggle draws on top.
                    let over = ctx
                        .trash_overlay
                        .then(|| self.engine.buffer(BufferSlot::AlphaApplied))
                        .flatten();
                    (self.engine.buffer(BufferSlot::Hard), over)
                }
            }
            EditorMode::Solid => {
                let slot = if ctx.sub_mode == SubMode::SourcePlacement || !ctx.solid_vis.pen {
                    BufferSlot::SolidIntegrated
                } else {
                    BufferSlot::SolidPreview
                };
                let over = (ctx.sub_mode != SubMode::SourcePlacement && ctx.solid_vis.solid)
                    .then(|| self.engine.buffer(BufferSlot::SolidOverlay))
                    .flatten();
                (self.engine.buffer(slot), over)
            }
        };
        self.layers.set_base(img.map(Arc::new));
        self.layers.set_overlay(overlay.map(Arc::new));
    }

    // ---- export ------------------------------------------------------------

    pub fn export(&mut self, mode: crate::engine::ExportMode) -> Option<crate::engine::ExportResult> {
        if !self.engine.has_images() {
            return None;
        }
        // Exports read the straight-RGB buffers; fold trash edits first.
        if self.ctx.entered_trash
            && let Err(e) = self.engine.finalize_trash_mode(&self.ctx.params)
        {
            log_err!("finalize before export failed: {e}");
            return None;
        }
        let background = match self.ctx.backdrop {
            Backdrop::Color(rgb) => Some(rgb),
            Backdrop::Checker => None,
        };
        let base = self.ctx.base_filename.clone();
        match self.engine.export(mode, background, &base) {
            Ok(result) => {
                self.update_main_view();
                Some(result)
            }
            Err(e) => {
                log_err!("export failed: {e}");
                None
            }
        }
    }
}

/// Red-tinted copy of a raster: coverage stays, content becomes a uniform
/// guide color.
fn red_guide(src: &RgbaImage) -> RgbaImage {
    let mut out = src.clone();
    for p in out.pixels_mut() {
        *p = Rgba([255, 0, 0, p[3]]);
    }
    out
}
