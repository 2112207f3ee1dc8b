//! Shared test support: a scripted compute engine that records every call
//! crossing the engine boundary, so tests can assert call order and scope.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use image::RgbaImage;
use mattefe::engine::{
    BufferSlot, ComputeEngine, EngineError, ExportMode, ExportResult, MaskTarget, MatteParams,
    RecomputeScope, SolidParams,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Recompute(RecomputeScope),
    Fill { points: usize, subtract: bool, target: MaskTarget },
    Snapshot(MaskTarget),
    Restore(MaskTarget),
    AlignPreview { x: i32, y: i32, scope: RecomputeScope },
    ConfirmOffset(i32, i32),
    InitTrash,
    FinalizeTrash,
    ResetTrash,
    UpdateSolidParams,
    SolidShot,
    ResetSolid,
    CommitSource,
    DiscardSource,
    Export(ExportMode),
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

pub struct MockEngine {
    width: u32,
    height: u32,
    loaded: bool,
    offset: (i32, i32),
    pub trash_mask: Vec<u8>,
    pub solid_mask: Vec<u8>,
    pub log: CallLog,
    /// When set, every recompute request fails (engine-failure path tests).
    pub fail_recompute: Rc<Cell<bool>>,
    /// When set, only full-image recomputes fail.
    pub fail_full: Rc<Cell<bool>>,
}

impl MockEngine {
    pub fn new(width: u32, height: u32) -> (Self, CallLog) {
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let n = (width * height) as usize;
        let engine = Self {
            width,
            height,
            loaded: true,
            offset: (0, 0),
            trash_mask: vec![255; n],
            solid_mask: vec![0; n],
            log: log.clone(),
            fail_recompute: Rc::new(Cell::new(false)),
            fail_full: Rc::new(Cell::new(false)),
        };
        (engine, log)
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }
}

impl ComputeEngine for MockEngine {
    fn has_images(&self) -> bool {
        self.loaded
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn load_images(
        &mut self,
        black: RgbaImage,
        _white: RgbaImage,
        _auto_align: bool,
    ) -> Result<(), EngineError> {
        self.width = black.width();
        self.height = black.height();
        let n = (self.width * self.height) as usize;
        self.trash_mask = vec![255; n];
        self.solid_mask = vec![0; n];
        self.loaded = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.loaded = false;
        self.trash_mask.clear();
        self.solid_mask.clear();
    }

    fn recompute(
        &mut self,
        scope: RecomputeScope,
        _params: &MatteParams,
    ) -> Result<(), EngineError> {
        self.record(Call::Recompute(scope));
        if self.fail_recompute.get()
            || (scope == RecomputeScope::FullImage && self.fail_full.get())
        {
            return Err(EngineError::NotReady);
        }
        Ok(())
    }

    fn buffer(&self, _slot: BufferSlot) -> Option<RgbaImage> {
        self.loaded
            .then(|| RgbaImage::new(self.width, self.height))
    }

    fn mask_snapshot(&self, target: MaskTarget) -> Option<Vec<u8>> {
        self.record(Call::Snapshot(target));
        if !self.loaded {
            return None;
        }
        Some(match target {
            MaskTarget::Trash => self.trash_mask.clone(),
            MaskTarget::Solid => self.solid_mask.clone(),
        })
    }

    fn restore_mask(&mut self, target: MaskTarget, data: &[u8]) -> Result<(), EngineError> {
        self.record(Call::Restore(target));
        let mask = match target {
            MaskTarget::Trash => &mut self.trash_mask,
            MaskTarget::Solid => &mut self.solid_mask,
        };
        if data.len() != mask.len() {
            return Err(EngineError::BadMaskLength { expected: mask.len(), got: data.len() });
        }
        mask.copy_from_slice(data);
        Ok(())
    }

    fn fill_polygon(
        &mut self,
        points: &[(f32, f32)],
        _value: u8,
        subtract: bool,
        _anti_alias: bool,
        target: MaskTarget,
    ) -> Result<(), EngineError> {
        self.record(Call::Fill { points: points.len(), subtract, target });
        Ok(())
    }

    fn alignment_offset(&self) -> (i32, i32) {
        self.offset
    }

    fn set_alignment_offset(&mut self, x: i32, y: i32) {
        self.offset = (x, y);
    }

    fn alignment_preview(
        &mut self,
        x: i32,
        y: i32,
        _params: &MatteParams,
        scope: RecomputeScope,
        _speed_priority: bool,
    ) -> Result<(), EngineError> {
        self.offset = (x, y);
        self.record(Call::AlignPreview { x, y, scope });
        Ok(())
    }

    fn confirm_alignment_offset(&mut self, x: i32, y: i32) -> Result<(), EngineError> {
        self.offset = (x, y);
        self.record(Call::ConfirmOffset(x, y));
        Ok(())
    }

    fn init_trash_mode(&mut self) -> Result<(), EngineError> {
        self.record(Call::InitTrash);
        Ok(())
    }

    fn finalize_trash_mode(&mut self, _params: &MatteParams) -> Result<(), EngineError> {
        self.record(Call::FinalizeTrash);
        Ok(())
    }

    fn reset_trash_mode(&mut self) -> Result<(), EngineError> {
        self.record(Call::ResetTrash);
        Ok(())
    }

    fn update_solid_params(&mut self, _params: &SolidParams) -> Result<(), EngineError> {
        self.record(Call::UpdateSolidParams);
        Ok(())
    }

    fn execute_solid_shot(&mut self) -> Result<(), EngineError> {
        self.record(Call::SolidShot);
        Ok(())
    }

    fn reset_solid_mode(&mut self) -> Result<(), EngineError> {
        self.record(Call::ResetSolid);
        Ok(())
    }

    fn load_solid_source(
        &mut self,
        _source: RgbaImage,
        _x: i32,
        _y: i32,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn move_solid_source(&mut self, _dx: i32, _dy: i32) {}

    fn commit_solid_source(&mut self) -> Result<(), EngineError> {
        self.record(Call::CommitSource);
        Ok(())
    }

    fn discard_solid_source(&mut self) {
        self.record(Call::DiscardSource);
    }

    fn export(
        &mut self,
        mode: ExportMode,
        _background: Option<[u8; 3]>,
        base_filename: &str,
    ) -> Result<ExportResult, EngineError> {
        self.record(Call::Export(mode));
        Ok(ExportResult {
            bytes: vec![0x89, b'P', b'N', b'G'],
            filename: format!("{}_{}.png", base_filename, mode.suffix()),
        })
    }
}

/// Count calls matching a predicate.
pub fn count_calls(log: &CallLog, pred: impl Fn(&Call) -> bool) -> usize {
    log.borrow().iter().filter(|c| pred(c)).count()
}
