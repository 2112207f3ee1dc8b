//! Mode/sub-mode orchestration: transition side effects, alignment flow,
//! matte-rect editing and undo routing.

mod common;

use common::{Call, MockEngine, count_calls};
use egui::{PointerButton, Vec2, pos2};
use mattefe::controller::{EditorMode, ModeController, SubMode};
use mattefe::engine::{MaskTarget, RecomputeScope};
use mattefe::tracker::BufferState;

fn controller() -> (ModeController, common::CallLog) {
    let (engine, log) = MockEngine::new(100, 100);
    let mut c = ModeController::new(Box::new(engine));
    c.set_canvas_size(Vec2::new(100.0, 100.0));
    (c, log)
}

#[test]
fn leaving_trash_finalizes_edits() {
    let (mut c, log) = controller();
    c.switch_mode(EditorMode::Trash);
    assert!(!log.borrow().iter().any(|c| matches!(c, Call::FinalizeTrash)));
    c.switch_mode(EditorMode::Basic);
    assert!(log.borrow().iter().any(|c| matches!(c, Call::FinalizeTrash)));
}

#[test]
fn trash_first_entry_initializes_once() {
    let (mut c, log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.switch_mode(EditorMode::Basic);
    c.switch_mode(EditorMode::Trash);
    assert_eq!(count_calls(&log, |c| matches!(c, Call::InitTrash)), 1);
}

#[test]
fn entering_solid_refreshes_params_every_time() {
    let (mut c, log) = controller();
    c.switch_mode(EditorMode::Solid);
    c.switch_mode(EditorMode::Basic);
    c.switch_mode(EditorMode::Solid);
    assert_eq!(count_calls(&log, |c| matches!(c, Call::UpdateSolidParams)), 2);
}

#[test]
fn sub_modes_are_mutually_exclusive() {
    let (mut c, _log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.enter_sub_mode(SubMode::AlignmentAdjust);
    assert_eq!(c.ctx.sub_mode, SubMode::AlignmentAdjust);
    c.enter_sub_mode(SubMode::MatteRectEdit);
    assert_eq!(c.ctx.sub_mode, SubMode::MatteRectEdit);
}

#[test]
fn alignment_nudges_preview_viewport_then_confirm_goes_full() {
    let (mut c, log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.enter_sub_mode(SubMode::AlignmentAdjust);
    log.borrow_mut().clear();

    for _ in 0..5 {
        c.arrow_key(1, 0, false);
    }
    for _ in 0..3 {
        c.arrow_key(0, -1, false);
    }
    assert_eq!(c.alignment_offset(), (5, -3));
    assert_eq!(c.buffer_state(), BufferState::Partial);
    assert_eq!(
        count_calls(&log, |c| matches!(
            c,
            Call::AlignPreview { scope: RecomputeScope::Viewport(_), .. }
        )),
        8
    );

    c.enter_key();
    assert_eq!(c.ctx.sub_mode, SubMode::None);
    assert_eq!(c.buffer_state(), BufferState::Full);
    let calls = log.borrow();
    assert!(calls.iter().any(|c| matches!(c, Call::ConfirmOffset(5, -3))));
    // Confirm re-initializes the trash buffers from the shifted extraction.
    assert!(calls.iter().any(|c| matches!(c, Call::InitTrash)));
    assert!(
        calls
            .iter()
            .any(|c| matches!(c, Call::Recompute(RecomputeScope::FullImage)))
    );
}

#[test]
fn alignment_shift_steps_by_ten() {
    let (mut c, _log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.enter_sub_mode(SubMode::AlignmentAdjust);
    c.arrow_key(1, 0, true);
    assert_eq!(c.alignment_offset(), (10, 0));
}

#[test]
fn alignment_cancel_restores_offset() {
    let (mut c, log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.enter_sub_mode(SubMode::AlignmentAdjust);
    c.arrow_key(1, 0, false);
    assert_eq!(c.alignment_offset(), (1, 0));
    c.escape_key();
    assert_eq!(c.alignment_offset(), (0, 0));
    assert!(!log.borrow().iter().any(|c| matches!(c, Call::ConfirmOffset(..))));
    // The cancel path still resynchronizes the whole image.
    assert_eq!(c.buffer_state(), BufferState::Full);
}

#[test]
fn alignment_display_params_are_restored() {
    let (mut c, _log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.set_trash_overlay(true);
    c.enter_sub_mode(SubMode::AlignmentAdjust);
    // Alignment forces the soft view without overlays.
    assert!(c.ctx.params.soft_alpha);
    assert!(!c.ctx.trash_overlay);
    c.enter_key();
    assert!(!c.ctx.params.soft_alpha);
    assert!(c.ctx.trash_overlay);
}

#[test]
fn matte_rect_drag_becomes_margins() {
    let (mut c, _log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.enter_sub_mode(SubMode::MatteRectEdit);
    c.pointer_down(pos2(10.0, 20.0), PointerButton::Primary, false, false);
    c.pointer_move(pos2(90.0, 80.0), false);
    c.pointer_up(pos2(90.0, 80.0), false);
    c.enter_key();

    let m = c.ctx.params.matte;
    assert_eq!((m.top, m.bottom, m.left, m.right), (20, 20, 10, 10));
    assert_eq!(c.ctx.sub_mode, SubMode::None);
    assert!(c.layers.drag_rect.is_none());
    assert_eq!(c.buffer_state(), BufferState::Partial);
}

#[test]
fn matte_rect_handles_inverted_drag() {
    let (mut c, _log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.enter_sub_mode(SubMode::MatteRectEdit);
    // Drag up-left: negative spans must normalize.
    c.pointer_down(pos2(90.0, 80.0), PointerButton::Primary, false, false);
    c.pointer_move(pos2(10.0, 20.0), false);
    c.pointer_up(pos2(10.0, 20.0), false);
    c.enter_key();
    let m = c.ctx.params.matte;
    assert_eq!((m.top, m.bottom, m.left, m.right), (20, 20, 10, 10));
}

#[test]
fn zero_area_matte_rect_is_discarded() {
    let (mut c, _log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.enter_sub_mode(SubMode::MatteRectEdit);
    c.pointer_down(pos2(10.0, 20.0), PointerButton::Primary, false, false);
    c.pointer_up(pos2(10.0, 20.0), false);
    c.enter_key();
    assert!(c.ctx.params.matte.is_zero());
}

#[test]
fn undo_routes_to_restored_mode() {
    let (mut c, log) = controller();
    c.switch_mode(EditorMode::Trash);
    // Carve something so there is a snapshot to pop.
    c.pointer_down(pos2(10.0, 10.0), PointerButton::Primary, false, false);
    c.pointer_move(pos2(40.0, 10.0), false);
    c.pointer_move(pos2(40.0, 40.0), false);
    c.pointer_up(pos2(40.0, 40.0), false);
    log.borrow_mut().clear();

    c.undo();
    let calls = log.borrow();
    assert!(calls.iter().any(|c| matches!(c, Call::Restore(MaskTarget::Trash))));
    drop(calls);
    assert_eq!(c.buffer_state(), BufferState::Partial);

    // An empty stack undo is a silent no-op.
    log.borrow_mut().clear();
    c.undo();
    assert!(!log.borrow().iter().any(|c| matches!(c, Call::Restore(_))));
}

#[test]
fn source_placement_commits_on_enter_cancels_on_escape() {
    let (mut c, log) = controller();
    c.begin_source_placement(image::RgbaImage::new(10, 10)).unwrap();
    assert_eq!(c.ctx.mode, EditorMode::Solid);
    assert_eq!(c.ctx.sub_mode, SubMode::SourcePlacement);
    assert!(c.layers.solid_source().is_some());
    c.enter_key();
    assert!(log.borrow().iter().any(|c| matches!(c, Call::CommitSource)));
    assert!(c.layers.solid_source().is_none());

    c.begin_source_placement(image::RgbaImage::new(10, 10)).unwrap();
    c.escape_key();
    assert!(log.borrow().iter().any(|c| matches!(c, Call::DiscardSource)));
}

#[test]
fn splitter_drag_wins_over_lasso() {
    let (mut c, log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.set_comparison(true);
    // A press on the divider (fraction 0.5 of a 100px canvas) grabs it.
    c.pointer_down(pos2(52.0, 40.0), PointerButton::Primary, false, true);
    c.pointer_move(pos2(70.0, 40.0), false);
    assert!((c.layers.split.fraction - 0.7).abs() < 1e-4);
    c.pointer_up(pos2(70.0, 40.0), false);
    assert!(!log.borrow().iter().any(|c| matches!(c, Call::Fill { .. })));
}

#[test]
fn comparison_mode_blocks_lasso_without_zkey() {
    let (mut c, _log) = controller();
    c.switch_mode(EditorMode::Trash);
    c.set_comparison(true);
    c.pointer_down(pos2(90.0, 90.0), PointerButton::Primary, false, false);
    assert!(!c.is_lasso_drawing());
    // With the bypass key held, painting through the split is allowed.
    c.pointer_down(pos2(90.0, 90.0), PointerButton::Primary, false, true);
    assert!(c.is_lasso_drawing());
}

#[test]
fn export_finalizes_trash_first() {
    let (mut c, log) = controller();
    c.switch_mode(EditorMode::Trash);
    log.borrow_mut().clear();
    let result = c.export(mattefe::engine::ExportMode::Basic).unwrap();
    let calls = log.borrow();
    let fin = calls.iter().position(|c| matches!(c, Call::FinalizeTrash)).unwrap();
    let exp = calls
        .iter()
        .position(|c| matches!(c, Call::Export(mattefe::engine::ExportMode::Basic)))
        .unwrap();
    assert!(fin < exp);
    assert!(result.filename.ends_with("_basic.png"));
}
