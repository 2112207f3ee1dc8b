//! Undo manager: FIFO bounds, reverse-order restore, and per-mode write-back.

mod common;

use common::MockEngine;
use mattefe::engine::{ComputeEngine, MaskTarget};
use mattefe::history::UndoManager;

/// Fill the live trash mask with a marker value, snapshot it, repeat.
#[test]
fn bounded_fifo_keeps_most_recent() {
    let (mut engine, _log) = MockEngine::new(4, 4);
    let mut undo = UndoManager::default();
    undo.set_limit(3);

    for marker in 1..=5u8 {
        engine.trash_mask.fill(marker);
        undo.push(MaskTarget::Trash, &engine);
    }
    assert_eq!(undo.len(), 3);

    // Pops restore 5, 4, 3 in reverse push order.
    for expected in [5u8, 4, 3] {
        let restored = undo.pop(&mut engine);
        assert_eq!(restored, Some(MaskTarget::Trash));
        assert!(engine.trash_mask.iter().all(|&v| v == expected));
    }
    // A fourth pop is a no-op returning none.
    assert_eq!(undo.pop(&mut engine), None);
    assert!(engine.trash_mask.iter().all(|&v| v == 3));
}

#[test]
fn write_back_targets_the_snapshot_mode() {
    let (mut engine, _log) = MockEngine::new(4, 4);
    let mut undo = UndoManager::default();

    engine.trash_mask.fill(11);
    undo.push(MaskTarget::Trash, &engine);
    engine.solid_mask.fill(22);
    undo.push(MaskTarget::Solid, &engine);

    // Mutate both live buffers past the snapshots.
    engine.trash_mask.fill(99);
    engine.solid_mask.fill(99);

    // First pop restores the solid state, leaving trash untouched.
    assert_eq!(undo.pop(&mut engine), Some(MaskTarget::Solid));
    assert!(engine.solid_mask.iter().all(|&v| v == 22));
    assert!(engine.trash_mask.iter().all(|&v| v == 99));

    // Second pop restores trash.
    assert_eq!(undo.pop(&mut engine), Some(MaskTarget::Trash));
    assert!(engine.trash_mask.iter().all(|&v| v == 11));
    assert!(engine.solid_mask.iter().all(|&v| v == 22));
}

#[test]
fn limit_is_clamped_to_usable_range() {
    let mut undo = UndoManager::default();
    undo.set_limit(0);
    assert_eq!(undo.limit(), 3);
    undo.set_limit(99);
    assert_eq!(undo.limit(), 10);
    undo.set_limit(7);
    assert_eq!(undo.limit(), 7);
}

#[test]
fn shrinking_limit_trims_oldest_first() {
    let (mut engine, _log) = MockEngine::new(4, 4);
    let mut undo = UndoManager::default();
    undo.set_limit(10);
    for marker in 1..=6u8 {
        engine.trash_mask.fill(marker);
        undo.push(MaskTarget::Trash, &engine);
    }
    undo.set_limit(3);
    assert_eq!(undo.len(), 3);
    // Survivors are the three most recent.
    assert_eq!(undo.pop(&mut engine), Some(MaskTarget::Trash));
    assert!(engine.trash_mask.iter().all(|&v| v == 6));
}

#[test]
fn push_without_buffers_is_a_noop() {
    let (mut engine, _log) = MockEngine::new(4, 4);
    engine.reset();
    let mut undo = UndoManager::default();
    undo.push(MaskTarget::Trash, &engine);
    assert!(undo.is_empty());
}

#[test]
fn discard_last_drops_newest() {
    let (mut engine, _log) = MockEngine::new(4, 4);
    let mut undo = UndoManager::default();
    engine.trash_mask.fill(1);
    undo.push(MaskTarget::Trash, &engine);
    engine.trash_mask.fill(2);
    undo.push(MaskTarget::Trash, &engine);
    undo.discard_last();
    engine.trash_mask.fill(9);
    assert_eq!(undo.pop(&mut engine), Some(MaskTarget::Trash));
    assert!(engine.trash_mask.iter().all(|&v| v == 1));
}
