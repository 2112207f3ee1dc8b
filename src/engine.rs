//! Compute-engine boundary: the contract between the editor core and the
//! pixel-level matting engine.
//!
//! The engine exclusively owns the authoritative mask/raster buffers.  Every
//! read across this boundary returns an **owned copy** — the engine's backing
//! memory may be reallocated between calls, so no live aliases are ever
//! handed out.

use image::RgbaImage;

// ============================================================================
// GEOMETRY & PARAMETER TYPES
// ============================================================================

/// Integer rectangle in image-space coordinates.  Derived from the current
/// viewport and used to scope recomputes to the visible region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ViewRect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl ViewRect {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// True when `other` lies entirely inside this rect.
    pub fn contains(&self, other: &ViewRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.w as i32 <= self.x + self.w as i32
            && other.y + other.h as i32 <= self.y + self.h as i32
    }

    /// Clamp to an image of the given dimensions.  Empty if fully outside.
    pub fn clamped(&self, img_w: u32, img_h: u32) -> Self {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + self.w as i32).min(img_w as i32);
        let y1 = (self.y + self.h as i32).min(img_h as i32);
        if x1 <= x0 || y1 <= y0 {
            return Self::default();
        }
        Self {
            x: x0,
            y: y0,
            w: (x1 - x0) as u32,
            h: (y1 - y0) as u32,
        }
    }
}

/// Fixed margin rectangle outside which content is forced fully transparent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatteMargins {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl MatteMargins {
    pub fn is_zero(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }

    /// Whether the pixel lies inside any matte band.
    pub fn covers(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        y < self.top
            || y >= h.saturating_sub(self.bottom)
            || x < self.left
            || x >= w.saturating_sub(self.right)
    }
}

/// How the per-pixel difference between the two source images is collapsed
/// to a single value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CalcMode {
    Max,
    #[default]
    Avg,
    Luminance,
}

/// Parameters for the trash-mode matte recompute.
#[derive(Clone, Copy, Debug)]
pub struct MatteParams {
    /// Differences at or below this count as identical (subject) pixels.
    pub threshold: u8,
    pub calc_mode: CalcMode,
    /// Soft (continuous) vs. hard (binary) alpha display.
    pub soft_alpha: bool,
    pub matte: MatteMargins,
}

impl Default for MatteParams {
    fn default() -> Self {
        Self {
            threshold: 5,
            calc_mode: CalcMode::Avg,
            soft_alpha: false,
            matte: MatteMargins::default(),
        }
    }
}

/// Parameters for the solid-mode fill pass.
#[derive(Clone, Copy, Debug)]
pub struct SolidParams {
    /// Opacity level written by a fill shot.
    pub level: u8,
    /// Soft-matte value above which a pixel counts as an edge.
    pub edge_threshold: u8,
    pub aa_threshold: u8,
    pub matte: MatteMargins,
}

impl Default for SolidParams {
    fn default() -> Self {
        Self {
            level: 255,
            edge_threshold: 64,
            aa_threshold: 128,
            matte: MatteMargins::default(),
        }
    }
}

// ============================================================================
// ENGINE REQUEST / RESULT TYPES
// ============================================================================

/// Scope of a recompute request.  `FullImage` re-derives every pixel;
/// `Viewport` is only guaranteed correct inside the given rect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecomputeScope {
    FullImage,
    Viewport(ViewRect),
}

/// Displayable raster slots the engine can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    /// Plain difference extraction, no trash edits applied.
    Basic,
    /// Extraction with the trash mask folded in (straight RGB).
    AlphaApplied,
    /// Continuous-alpha matte view.
    Soft,
    /// Binary matte view.
    Hard,
    /// Solid mode base composite.
    SolidIntegrated,
    /// Solid mode composite including the pen/solid layers.
    SolidPreview,
    /// Green visualization of the solid mask (drawn as an overlay).
    SolidOverlay,
}

/// Which editable single-channel mask an operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MaskTarget {
    #[default]
    Trash,
    Solid,
}

/// Export flavors, mirroring the per-mode export buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportMode {
    Basic,
    TrashHard,
    TrashAlpha,
    Solid,
}

impl ExportMode {
    pub fn suffix(&self) -> &'static str {
        match self {
            ExportMode::Basic => "basic",
            ExportMode::TrashHard => "trash",
            ExportMode::TrashAlpha => "alpha",
            ExportMode::Solid => "solid",
        }
    }
}

/// Encoded export output.
pub struct ExportResult {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Failures crossing the engine boundary.  Expected "nothing to do" cases
/// (no images loaded, empty undo stack, degenerate polygons) are sentinels,
/// not errors — these variants are for genuinely failed requests.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no source images are loaded")]
    NotReady,
    #[error("source images are {0}x{1} but got {2}x{3}")]
    SizeMismatch(u32, u32, u32, u32),
    #[error("mask buffer length {got} does not match {expected}")]
    BadMaskLength { expected: usize, got: usize },
    #[error("export encoding failed: {0}")]
    Encode(String),
}

// ============================================================================
// THE ENGINE TRAIT
// ============================================================================

/// The pixel-computation collaborator.  All methods are synchronous: a full
/// recompute blocks the calling turn by design, so the paint that follows it
/// never observes stale data.
pub trait ComputeEngine {
    /// True once a same-size image pair is loaded.
    fn has_images(&self) -> bool;

    /// Image dimensions, (0, 0) when not ready.
    fn dimensions(&self) -> (u32, u32);

    /// Load the source pair and derive the initial extraction.  When
    /// `auto_align` is set the engine may compute an initial alignment
    /// offset, readable via [`Self::alignment_offset`].
    fn load_images(
        &mut self,
        black: RgbaImage,
        white: RgbaImage,
        auto_align: bool,
    ) -> Result<(), EngineError>;

    /// Drop all images, masks and derived state.
    fn reset(&mut self);

    /// Re-derive the trash-mode buffers.  `Viewport` scope only guarantees
    /// correctness inside the rect — the caller tracks that via its buffer
    /// state machine.
    fn recompute(&mut self, scope: RecomputeScope, params: &MatteParams)
    -> Result<(), EngineError>;

    /// Owned copy of a displayable raster, or None when not ready.
    fn buffer(&self, slot: BufferSlot) -> Option<RgbaImage>;

    /// Owned copy of the single-channel mask for `target` (width*height
    /// bytes), or None when not ready.
    fn mask_snapshot(&self, target: MaskTarget) -> Option<Vec<u8>>;

    /// Write a snapshot back into the live mask buffer.
    fn restore_mask(&mut self, target: MaskTarget, data: &[u8]) -> Result<(), EngineError>;

    /// Rasterize a closed polygon into the target mask.  `subtract` clears
    /// coverage instead of writing `value`; `anti_alias` smooths edges.
    /// Points are image-space coordinates.
    fn fill_polygon(
        &mut self,
        points: &[(f32, f32)],
        value: u8,
        subtract: bool,
        anti_alias: bool,
        target: MaskTarget,
    ) -> Result<(), EngineError>;

    // ---- alignment ---------------------------------------------------------

    /// Current alignment offset applied to the white source.
    fn alignment_offset(&self) -> (i32, i32);

    /// Store the offset without recomputing (preview bookkeeping).
    fn set_alignment_offset(&mut self, x: i32, y: i32);

    /// Fast alpha-only preview recompute for alignment nudging, optionally
    /// limited to a viewport rect.  `speed_priority` may trade quality for
    /// latency.
    fn alignment_preview(
        &mut self,
        x: i32,
        y: i32,
        params: &MatteParams,
        scope: RecomputeScope,
        speed_priority: bool,
    ) -> Result<(), EngineError>;

    /// Commit the offset: full recompute including export-relevant derived
    /// buffers (straight RGB).
    fn confirm_alignment_offset(&mut self, x: i32, y: i32) -> Result<(), EngineError>;

    // ---- trash mode --------------------------------------------------------

    /// (Re-)initialize the trash mask from the current extraction.
    fn init_trash_mode(&mut self) -> Result<(), EngineError>;

    /// Fold transient trash edits into the authoritative base buffer so that
    /// leaving the mode never loses them.
    fn finalize_trash_mode(&mut self, params: &MatteParams) -> Result<(), EngineError>;

    /// Reset trash-mode state (mask cleared back to the extraction).
    fn reset_trash_mode(&mut self) -> Result<(), EngineError>;

    // ---- solid mode --------------------------------------------------------

    /// Push solid parameters; also clears stale region-limited buffers from
    /// a previous garbage-matte configuration.
    fn update_solid_params(&mut self, params: &SolidParams) -> Result<(), EngineError>;

    /// Run the solid fill shot over the current mask.
    fn execute_solid_shot(&mut self) -> Result<(), EngineError>;

    fn reset_solid_mode(&mut self) -> Result<(), EngineError>;

    /// Stage a solid-source raster at the given image position.
    fn load_solid_source(&mut self, source: RgbaImage, x: i32, y: i32)
    -> Result<(), EngineError>;

    /// Nudge the staged solid source.
    fn move_solid_source(&mut self, dx: i32, dy: i32);

    /// Commit the staged source into the solid buffers.
    fn commit_solid_source(&mut self) -> Result<(), EngineError>;

    /// Discard the staged source without committing.
    fn discard_solid_source(&mut self);

    // ---- export ------------------------------------------------------------

    /// Encode the requested composite as PNG bytes plus a derived filename.
    fn export(
        &mut self,
        mode: ExportMode,
        background: Option<[u8; 3]>,
        base_filename: &str,
    ) -> Result<ExportResult, EngineError>;
}
