//! The eframe shell: panels, canvas, and the adaptation of platform events
//! into controller intents.
//!
//! All editing logic lives in [`crate::controller::ModeController`]; this
//! module only reads egui input state, converts pointer positions to
//! canvas-local coordinates, and forwards intents.

use std::path::PathBuf;

use eframe::egui;
use egui::{Color32, PointerButton, Rect, Vec2, pos2};
use image::RgbaImage;

use crate::controller::{Backdrop, EditorMode, ModeController, SubMode};
use crate::engine::{ExportMode, MatteMargins};
use crate::matting::DiffEngine;
use crate::render::CompositingRenderer;
use crate::settings::AppSettings;
use crate::tracker::BufferState;
use crate::{log_err, log_info};

const CHECKER_CELL: f32 = 12.0;
const CHECKER_DARK: Color32 = Color32::from_gray(60);
const CHECKER_LIGHT: Color32 = Color32::from_gray(90);

pub struct MatteFEApp {
    controller: ModeController,
    renderer: CompositingRenderer,
    settings: AppSettings,
    /// First half of the pair, held until the second arrives.
    staged_black: Option<(RgbaImage, PathBuf)>,
    staged_white: Option<RgbaImage>,
    status: String,
    space_down: bool,
    z_down: bool,
    prev_alt: bool,
}

impl MatteFEApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        let settings = AppSettings::load();
        let mut controller = ModeController::new(Box::new(DiffEngine::default()));
        controller.set_undo_limit(settings.undo_limit);
        controller.ctx.speed_priority = settings.speed_priority;
        controller.ctx.trash_anti_alias = settings.trash_anti_alias;
        controller.ctx.solid_anti_alias = settings.solid_anti_alias;
        Self {
            controller,
            renderer: CompositingRenderer::default(),
            settings,
            staged_black: None,
            staged_white: None,
            status: "Load a black-backed and a white-backed image to begin.".to_string(),
            space_down: false,
            z_down: false,
            prev_alt: false,
        }
    }

    // ---- image loading -----------------------------------------------------

    fn pick_image(&mut self, which: &str) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg"])
            .pick_file()
        else {
            return;
        };
        let img = match image::open(&path) {
            Ok(i) => i.into_rgba8(),
            Err(e) => {
                self.status = format!("Could not open {}: {e}", path.display());
                log_err!("image open failed: {e}");
                return;
            }
        };
        match which {
            "black" => self.staged_black = Some((img, path)),
            _ => self.staged_white = Some(img),
        }
        self.try_load_pair();
    }

    fn try_load_pair(&mut self) {
        if self.staged_black.is_none() || self.staged_white.is_none() {
            self.status = "Waiting for the second image of the pair…".to_string();
            return;
        }
        let (black, path) = self.staged_black.take().unwrap();
        let white = self.staged_white.take().unwrap();
        match self
            .controller
            .load_images(black, white, self.settings.auto_align, &path)
        {
            Ok(()) => {
                self.renderer.clear_cache();
                self.status = "Image pair loaded.".to_string();
            }
            Err(e) => {
                self.status = format!("Load failed: {e}");
                log_err!("pair load failed: {e}");
            }
        }
    }

    fn pick_solid_source(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg"])
            .pick_file()
        else {
            return;
        };
        match image::open(&path) {
            Ok(img) => {
                if let Err(e) = self.controller.begin_source_placement(img.into_rgba8()) {
                    self.status = format!("Solid source failed: {e}");
                } else {
                    self.status =
                        "Position the source with arrow keys; Enter commits, Esc cancels."
                            .to_string();
                }
            }
            Err(e) => self.status = format!("Could not open {}: {e}", path.display()),
        }
    }

    fn run_export(&mut self, mode: ExportMode) {
        let Some(result) = self.controller.export(mode) else {
            self.status = "Nothing to export.".to_string();
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(&result.filename)
            .add_filter("PNG", &["png"])
            .save_file()
        else {
            return;
        };
        match std::fs::write(&path, &result.bytes) {
            Ok(()) => {
                self.status = format!("Exported {}", path.display());
                log_info!("exported {} ({} bytes)", path.display(), result.bytes.len());
            }
            Err(e) => {
                self.status = format!("Write failed: {e}");
                log_err!("export write failed: {e}");
            }
        }
    }

    // ---- keyboard ----------------------------------------------------------

    fn handle_keys(&mut self, ctx: &egui::Context) {
        self.space_down = ctx.input(|i| i.key_down(egui::Key::Space));
        self.z_down = ctx.input(|i| i.key_down(egui::Key::Z) && !i.modifiers.ctrl);

        // Text fields get priority over editor shortcuts.
        if ctx.wants_keyboard_input() {
            return;
        }
        let (arrows, shift, enter, escape, undo, shot, quick_on, quick_off, alt_now) = ctx
            .input(|i| {
                let mut arrows = (0i32, 0i32);
                if i.key_pressed(egui::Key::ArrowLeft) {
                    arrows.0 -= 1;
                }
                if i.key_pressed(egui::Key::ArrowRight) {
                    arrows.0 += 1;
                }
                if i.key_pressed(egui::Key::ArrowUp) {
                    arrows.1 -= 1;
                }
                if i.key_pressed(egui::Key::ArrowDown) {
                    arrows.1 += 1;
                }
                (
                    arrows,
                    i.modifiers.shift,
                    i.key_pressed(egui::Key::Enter),
                    i.key_pressed(egui::Key::Escape),
                    i.modifiers.ctrl && i.key_pressed(egui::Key::Z),
                    i.key_pressed(egui::Key::F),
                    i.key_pressed(egui::Key::A),
                    i.key_released(egui::Key::A),
                    i.modifiers.alt,
                )
            });

        if arrows != (0, 0) {
            self.controller.arrow_key(arrows.0, arrows.1, shift);
        }
        if enter {
            self.controller.enter_key();
        }
        if escape {
            self.controller.escape_key();
        }
        if undo {
            self.controller.undo();
        }
        if shot {
            self.controller.solid_shot();
        }
        if quick_on {
            self.controller.quick_backdrop_press();
        }
        if quick_off {
            self.controller.quick_backdrop_release();
        }
        // Releasing the polygon modifier finalizes a polygon lasso.
        if self.prev_alt && !alt_now {
            self.controller.alt_released();
        }
        self.prev_alt = alt_now;
    }

    // ---- canvas ------------------------------------------------------------

    fn show_canvas(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        let sense = egui::Sense::click_and_drag().union(egui::Sense::hover());
        let (response, painter) = ui.allocate_painter(available, sense);
        let canvas_rect = response.rect;
        self.controller.set_canvas_size(canvas_rect.size());

        self.draw_backdrop(&painter, canvas_rect);

        // Wheel zoom, anchored at the pointer.
        let mut zoom_amount = 0.0;
        ui.ctx().input_mut(|i| {
            if i.scroll_delta.y.abs() > 0.1
                && i.pointer.hover_pos().is_some_and(|p| canvas_rect.contains(p))
            {
                zoom_amount = i.scroll_delta.y;
                i.scroll_delta.y = 0.0;
            }
        });
        if zoom_amount != 0.0
            && let Some(pos) = ui.ctx().input(|i| i.pointer.hover_pos())
        {
            let local = pos - canvas_rect.min.to_vec2();
            self.controller.wheel_zoom(local, zoom_amount.signum());
        }

        // Panning: middle-drag, or space + primary-drag.
        let panning = response.dragged_by(PointerButton::Middle)
            || (self.space_down && response.dragged_by(PointerButton::Primary));
        if panning {
            self.controller.pan_by(response.drag_delta());
        }

        // Fit to screen: middle double-click, or secondary click with space.
        let secondary_fit = self.space_down
            && ui.ctx().input(|i| i.pointer.button_pressed(PointerButton::Secondary));
        if response.double_clicked_by(PointerButton::Middle) || secondary_fit {
            self.controller.fit_to_screen();
        }

        // Pointer intents (skipped entirely while panning).
        if !panning {
            let (pressed, released, latest, moved, alt) = ui.ctx().input(|i| {
                let mut pressed = None;
                let mut released = false;
                for b in [PointerButton::Primary, PointerButton::Secondary] {
                    if i.pointer.button_pressed(b) {
                        pressed = Some(b);
                    }
                    if i.pointer.button_released(b) {
                        released = true;
                    }
                }
                (
                    pressed,
                    released,
                    i.pointer.latest_pos(),
                    i.pointer.delta() != Vec2::ZERO,
                    i.modifiers.alt,
                )
            });

            match latest {
                Some(pos) => {
                    let local = pos - canvas_rect.min.to_vec2();
                    if let Some(button) = pressed
                        && canvas_rect.contains(pos)
                        && !self.space_down
                    {
                        self.controller.pointer_down(local, button, alt, self.z_down);
                    }
                    if moved {
                        self.controller.pointer_move(local, alt);
                    }
                    if released {
                        self.controller.pointer_up(local, alt);
                    }
                }
                None => self.controller.pointer_leave(),
            }
        }

        self.renderer.paint(
            ui.ctx(),
            &painter,
            canvas_rect,
            &self.controller.viewport,
            &self.controller.layers,
            self.controller.render_offset(),
        );
    }

    fn draw_backdrop(&self, painter: &egui::Painter, canvas_rect: Rect) {
        match self.controller.ctx.backdrop {
            Backdrop::Color([r, g, b]) => {
                painter.rect_filled(canvas_rect, 0.0, Color32::from_rgb(r, g, b));
            }
            Backdrop::Checker => {
                painter.rect_filled(canvas_rect, 0.0, CHECKER_DARK);
                // Checker only needs to cover the image's screen footprint.
                let area = match self.controller.layers.base_size() {
                    Some((w, h)) => {
                        let vp = &self.controller.viewport;
                        let min = canvas_rect.min + vp.image_to_screen(pos2(0.0, 0.0)).to_vec2();
                        let max = canvas_rect.min
                            + vp.image_to_screen(pos2(w as f32, h as f32)).to_vec2();
                        Rect::from_min_max(min, max).intersect(canvas_rect)
                    }
                    None => return,
                };
                if area.width() <= 0.0 || area.height() <= 0.0 {
                    return;
                }
                let cols = (area.width() / CHECKER_CELL).ceil() as i32;
                let rows = (area.height() / CHECKER_CELL).ceil() as i32;
                for cy in 0..rows {
                    for cx in 0..cols {
                        if (cx + cy) % 2 == 0 {
                            continue;
                        }
                        let min = pos2(
                            area.min.x + cx as f32 * CHECKER_CELL,
                            area.min.y + cy as f32 * CHECKER_CELL,
                        );
                        let cell = Rect::from_min_size(min, Vec2::splat(CHECKER_CELL))
                            .intersect(area);
                        painter.rect_filled(cell, 0.0, CHECKER_LIGHT);
                    }
                }
            }
        }
    }

    // ---- panels ------------------------------------------------------------

    fn show_side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("MatteFE");
        ui.separator();

        // Mode tabs
        ui.horizontal(|ui| {
            for (label, mode) in [
                ("Basic", EditorMode::Basic),
                ("Trash", EditorMode::Trash),
                ("Solid", EditorMode::Solid),
            ] {
                if ui
                    .selectable_label(self.controller.ctx.mode == mode, label)
                    .clicked()
                {
                    self.controller.switch_mode(mode);
                }
            }
        });
        ui.separator();

        match self.controller.ctx.mode {
            EditorMode::Basic => self.basic_panel(ui),
            EditorMode::Trash => self.trash_panel(ui),
            EditorMode::Solid => self.solid_panel(ui),
        }

        ui.separator();
        let mut comparison = self.controller.layers.split.enabled;
        if ui.checkbox(&mut comparison, "Before/after comparison").changed() {
            self.controller.set_comparison(comparison);
        }
        if ui.button("Undo (Ctrl+Z)").clicked() {
            self.controller.undo();
        }
        if ui.button("Fit to screen").clicked() {
            self.controller.fit_to_screen();
        }
        if ui.button("Reset everything").clicked() {
            self.controller.reset_all();
            self.renderer.clear_cache();
            self.staged_black = None;
            self.staged_white = None;
            self.status = "Editor reset.".to_string();
        }

        ui.separator();
        ui.collapsing("Settings", |ui| {
            let mut limit = self.controller.undo_limit();
            if ui
                .add(egui::Slider::new(&mut limit, 3..=10).text("Undo steps"))
                .changed()
            {
                self.controller.set_undo_limit(limit);
                self.settings.undo_limit = limit;
                self.settings.save();
            }
            if ui
                .checkbox(&mut self.settings.speed_priority, "Speed priority preview")
                .changed()
            {
                self.controller.ctx.speed_priority = self.settings.speed_priority;
                self.settings.save();
            }
            if ui
                .checkbox(&mut self.settings.auto_align, "Auto-align on load")
                .changed()
            {
                self.settings.save();
            }
        });
    }

    fn basic_panel(&mut self, ui: &mut egui::Ui) {
        if ui.button("Load black-backed image…").clicked() {
            self.pick_image("black");
        }
        if ui.button("Load white-backed image…").clicked() {
            self.pick_image("white");
        }
        let (ox, oy) = self.controller.alignment_offset();
        ui.label(format!("Alignment offset: ({ox}, {oy})"));
        ui.separator();
        if ui.button("Export extraction (PNG)").clicked() {
            self.run_export(ExportMode::Basic);
        }
    }

    fn trash_panel(&mut self, ui: &mut egui::Ui) {
        let in_align = self.controller.ctx.sub_mode == SubMode::AlignmentAdjust;
        let in_matte = self.controller.ctx.sub_mode == SubMode::MatteRectEdit;

        let mut threshold = self.controller.ctx.params.threshold;
        if ui
            .add(egui::Slider::new(&mut threshold, 0..=50).text("Threshold"))
            .changed()
        {
            self.controller.set_threshold(threshold);
        }

        let mut soft = self.controller.ctx.params.soft_alpha;
        if ui.checkbox(&mut soft, "Soft alpha display").changed() {
            self.controller.set_soft_alpha(soft);
        }
        let mut overlay = self.controller.ctx.trash_overlay;
        if ui.checkbox(&mut overlay, "Show applied preview").changed() {
            self.controller.set_trash_overlay(overlay);
        }
        if ui
            .checkbox(&mut self.controller.ctx.trash_anti_alias, "Anti-alias lasso")
            .changed()
        {
            self.settings.trash_anti_alias = self.controller.ctx.trash_anti_alias;
            self.settings.save();
        }

        ui.separator();
        if ui
            .selectable_label(in_align, "Adjust alignment (arrows, Enter/Esc)")
            .clicked()
        {
            if in_align {
                self.controller.exit_sub_mode(true);
            } else {
                self.controller.enter_sub_mode(SubMode::AlignmentAdjust);
            }
        }
        if in_align && ui.button("Restore auto alignment").clicked() {
            self.controller.reset_to_auto_align();
        }
        if ui
            .selectable_label(in_matte, "Edit garbage matte (drag, Enter)")
            .clicked()
        {
            if in_matte {
                self.controller.exit_sub_mode(true);
            } else {
                self.controller.enter_sub_mode(SubMode::MatteRectEdit);
            }
        }

        // Numeric matte margins
        let matte = self.controller.ctx.params.matte;
        let mut vals = [matte.top, matte.bottom, matte.left, matte.right];
        let mut changed = false;
        ui.horizontal(|ui| {
            for (label, v) in ["T", "B", "L", "R"].iter().zip(vals.iter_mut()) {
                ui.label(*label);
                changed |= ui.add(egui::DragValue::new(v).speed(1)).changed();
            }
        });
        if changed {
            self.controller.set_matte_margins(MatteMargins {
                top: vals[0],
                bottom: vals[1],
                left: vals[2],
                right: vals[3],
            });
        }

        ui.separator();
        if ui.button("Reset trash edits").clicked() {
            self.controller.reset_trash();
        }
        if ui.button("Export matte (binary)").clicked() {
            self.run_export(ExportMode::TrashHard);
        }
        if ui.button("Export matte (alpha)").clicked() {
            self.run_export(ExportMode::TrashAlpha);
        }
    }

    fn solid_panel(&mut self, ui: &mut egui::Ui) {
        let mut level = self.controller.ctx.solid_params.level;
        if ui
            .add(egui::Slider::new(&mut level, 0..=255).text("Solid level"))
            .changed()
        {
            self.controller.set_solid_level(level);
        }

        let mut vis = self.controller.ctx.solid_vis;
        let mut vis_changed = false;
        vis_changed |= ui.checkbox(&mut vis.pen, "Composite preview").changed();
        vis_changed |= ui.checkbox(&mut vis.solid, "Show solid coverage").changed();
        if vis_changed {
            self.controller.set_solid_vis(vis);
        }
        if ui
            .checkbox(&mut self.controller.ctx.solid_anti_alias, "Anti-alias lasso")
            .changed()
        {
            self.settings.solid_anti_alias = self.controller.ctx.solid_anti_alias;
            self.settings.save();
        }

        ui.separator();
        if ui.button("Fill shot (F)").clicked() {
            self.controller.solid_shot();
        }
        if ui.button("Load solid source…").clicked() {
            self.pick_solid_source();
        }
        if ui.button("Reset solid").clicked() {
            self.controller.reset_solid();
        }
        ui.separator();
        if ui.button("Export solid (PNG)").clicked() {
            self.run_export(ExportMode::Solid);
        }
    }

    fn show_status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(format!("Zoom {:.0}%", self.controller.viewport.scale * 100.0));
            ui.separator();
            let state = match self.controller.buffer_state() {
                BufferState::Full => "full",
                BufferState::Partial => "viewport",
            };
            ui.label(format!("Buffers: {state}"));
            ui.separator();
            ui.label(format!("Undo depth: {}", self.controller.undo_depth()));
            ui.separator();
            ui.label(&self.status);
        });
    }
}

impl eframe::App for MatteFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        egui::SidePanel::left("controls")
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.show_side_panel(ui));
            });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            self.show_status_bar(ui);
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                self.show_canvas(ui);
            });
    }
}
