//! End-to-end editing scenario against the built-in engine: load a pair,
//! edit, navigate, align, lasso, undo, export.

use egui::{PointerButton, Vec2, pos2};
use image::{Rgba, RgbaImage};
use mattefe::controller::{EditorMode, ModeController, SubMode};
use mattefe::engine::{BufferSlot, ComputeEngine, ExportMode};
use mattefe::matting::DiffEngine;
use mattefe::tracker::BufferState;

fn subject_pair() -> (RgbaImage, RgbaImage) {
    let subject = Rgba([180, 120, 40, 255]);
    let mut black = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
    let mut white = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
    for y in 30..70 {
        for x in 30..70 {
            black.put_pixel(x, y, subject);
            white.put_pixel(x, y, subject);
        }
    }
    (black, white)
}

fn loaded_controller() -> ModeController {
    let mut c = ModeController::new(Box::new(DiffEngine::default()));
    c.set_canvas_size(Vec2::new(100.0, 100.0));
    let (black, white) = subject_pair();
    c.load_images(black, white, true, std::path::Path::new("pair.png"))
        .expect("pair loads");
    c
}

#[test]
fn full_editing_pass() {
    let mut c = loaded_controller();

    // Loading leaves the buffers authoritative image-wide.
    assert_eq!(c.buffer_state(), BufferState::Full);
    assert_eq!(c.engine().dimensions(), (100, 100));
    // The canvas matches the image, so the fit is exactly 1:1, centered.
    assert_eq!(c.viewport.scale, 1.0);
    assert_eq!(c.viewport.pan, Vec2::ZERO);

    // A slider edit only recomputes the viewport.
    c.switch_mode(EditorMode::Trash);
    c.set_threshold(12);
    assert_eq!(c.buffer_state(), BufferState::Partial);

    // Panning exposes uncovered pixels: the recompute runs inside the call,
    // so no paint can ever observe stale Partial data.
    c.pan_by(Vec2::new(50.0, 0.0));
    assert_eq!(c.buffer_state(), BufferState::Full);

    // Carve the subject's corner with a freehand lasso.
    c.pan_by(Vec2::new(-50.0, 0.0));
    c.pointer_down(pos2(35.0, 35.0), PointerButton::Primary, false, false);
    c.pointer_move(pos2(65.0, 35.0), false);
    c.pointer_move(pos2(65.0, 65.0), false);
    c.pointer_up(pos2(65.0, 65.0), false);
    assert_eq!(c.buffer_state(), BufferState::Partial);
    let applied = c.engine().buffer(BufferSlot::AlphaApplied).unwrap();
    assert_eq!(applied.get_pixel(60, 40)[3], 0, "inside the carved triangle");
    assert_eq!(applied.get_pixel(40, 60)[3], 255, "outside it");

    // Undo restores the snapshot taken before the fill.
    assert_eq!(c.undo_depth(), 1);
    c.undo();
    let applied = c.engine().buffer(BufferSlot::AlphaApplied).unwrap();
    assert_eq!(applied.get_pixel(60, 40)[3], 255);
    assert_eq!(c.undo_depth(), 0);

    // Alignment adjustment: nudges preview with a visible render offset,
    // confirm folds the offset into the buffers and drops the translation.
    c.enter_sub_mode(SubMode::AlignmentAdjust);
    for _ in 0..5 {
        c.arrow_key(1, 0, false);
    }
    for _ in 0..3 {
        c.arrow_key(0, -1, false);
    }
    assert_eq!(c.alignment_offset(), (5, -3));
    assert_eq!(c.render_offset(), Vec2::new(5.0, -3.0));
    assert_eq!(c.buffer_state(), BufferState::Partial);
    c.enter_key();
    assert_eq!(c.ctx.sub_mode, SubMode::None);
    assert_eq!(c.buffer_state(), BufferState::Full);
    // Post-confirm the compositor draws untranslated; the shift now lives in
    // the recomputed pixels.  Matte rectangles were never offset at all.
    assert_eq!(c.render_offset(), Vec2::ZERO);
    assert_eq!(c.engine().alignment_offset(), (5, -3));

    // Export produces a PNG named after the loaded pair.
    let result = c.export(ExportMode::Basic).expect("export succeeds");
    assert_eq!(&result.bytes[..4], &[0x89, b'P', b'N', b'G']);
    assert_eq!(result.filename, "pair_basic.png");
}

#[test]
fn garbage_matte_masks_bands_after_edit() {
    let mut c = loaded_controller();
    c.switch_mode(EditorMode::Trash);
    c.enter_sub_mode(SubMode::MatteRectEdit);
    c.pointer_down(pos2(20.0, 25.0), PointerButton::Primary, false, false);
    c.pointer_move(pos2(80.0, 75.0), false);
    c.pointer_up(pos2(80.0, 75.0), false);
    c.enter_key();

    let m = c.ctx.params.matte;
    assert_eq!((m.top, m.bottom, m.left, m.right), (25, 25, 20, 20));
    assert!(c.layers.garbage_matte.is_some());

    // The matte bands are transparent in the recomputed extraction.
    let basic = c.engine().buffer(BufferSlot::Basic).unwrap();
    assert_eq!(basic.get_pixel(50, 10)[3], 0, "top band");
    assert_eq!(basic.get_pixel(50, 50)[3], 255, "kept interior");
}

#[test]
fn solid_flow_shot_and_reset() {
    let mut c = loaded_controller();
    c.switch_mode(EditorMode::Solid);
    c.solid_shot();
    let solid = c.engine().buffer(BufferSlot::SolidIntegrated).unwrap();
    assert_eq!(solid.get_pixel(50, 50)[3], 255);

    // A solid shot is undoable like any destructive edit.
    assert_eq!(c.undo_depth(), 1);
    c.undo();
    assert_eq!(c.undo_depth(), 0);

    c.solid_shot();
    c.reset_solid();
    let overlay = c.engine().buffer(BufferSlot::SolidOverlay).unwrap();
    assert!(overlay.pixels().all(|p| p[3] == 0), "coverage cleared");
}

#[test]
fn reset_clears_the_whole_session() {
    let mut c = loaded_controller();
    c.switch_mode(EditorMode::Trash);
    c.set_threshold(9);
    c.reset_all();
    assert!(!c.engine().has_images());
    assert_eq!(c.ctx.mode, EditorMode::Basic);
    assert!(!c.ctx.entered_trash);
    assert_eq!(c.viewport.scale, 1.0);
    assert_eq!(c.viewport.pan, Vec2::ZERO);
    assert_eq!(c.buffer_state(), BufferState::Full);
    assert_eq!(c.undo_depth(), 0);
}

#[test]
fn mode_switch_preserves_trash_edits_in_basic_view() {
    let mut c = loaded_controller();
    c.switch_mode(EditorMode::Trash);
    // Carve a triangle, then leave the mode: the finalize step folds the
    // edit into the base buffer, so Basic shows it too.
    c.pointer_down(pos2(35.0, 35.0), PointerButton::Primary, false, false);
    c.pointer_move(pos2(65.0, 35.0), false);
    c.pointer_move(pos2(65.0, 65.0), false);
    c.pointer_up(pos2(65.0, 65.0), false);
    c.switch_mode(EditorMode::Basic);
    // With the trash session live, Basic displays the applied view.
    let applied = c.engine().buffer(BufferSlot::AlphaApplied).unwrap();
    assert_eq!(applied.get_pixel(60, 40)[3], 0);
}
