//! Built-in difference-matting engine.
//!
//! A deliberately small [`ComputeEngine`] implementation so the application
//! runs end-to-end: per-pixel difference thresholding between the two source
//! shots, an even-odd scanline polygon fill with optional edge anti-aliasing,
//! garbage-matte clearing, and PNG export.  The production-grade fill
//! heuristics live behind the trait, not in it.

use std::io::Cursor;

use image::{ImageOutputFormat, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::engine::{
    BufferSlot, CalcMode, ComputeEngine, EngineError, ExportMode, ExportResult, MaskTarget,
    MatteParams, RecomputeScope, SolidParams, ViewRect,
};

/// Alpha at or above this counts as opaque in the binary (hard) view.
const HARD_CUTOFF: u8 = 128;

pub struct DiffEngine {
    width: u32,
    height: u32,
    black: Option<RgbaImage>,
    white: Option<RgbaImage>,
    offset: (i32, i32),
    /// Continuous extraction alpha, one byte per pixel.  Matte bands are
    /// baked in by `recompute`.
    alpha0: Vec<u8>,
    /// Trash mask: 255 = keep, 0 = carved away.
    trash_mask: Vec<u8>,
    /// Solid coverage mask.
    solid_mask: Vec<u8>,
    /// Straight alpha baked at finalize time, used for export.
    applied: Vec<u8>,
    staged_source: Option<(RgbaImage, i32, i32)>,
    solid_params: SolidParams,
    params: MatteParams,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            black: None,
            white: None,
            offset: (0, 0),
            alpha0: Vec::new(),
            trash_mask: Vec::new(),
            solid_mask: Vec::new(),
            applied: Vec::new(),
            staged_source: None,
            solid_params: SolidParams::default(),
            params: MatteParams::default(),
        }
    }
}

impl DiffEngine {
    fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    fn ready(&self) -> bool {
        self.black.is_some() && self.white.is_some() && self.width > 0
    }

    /// Difference between the black-backed shot and the offset-shifted
    /// white-backed shot, collapsed per `calc_mode`.
    fn difference(&self, x: u32, y: u32) -> u8 {
        let black = self.black.as_ref().unwrap();
        let white = self.white.as_ref().unwrap();
        let b = black.get_pixel(x, y);
        let wx = x as i32 - self.offset.0;
        let wy = y as i32 - self.offset.1;
        if wx < 0 || wy < 0 || wx >= self.width as i32 || wy >= self.height as i32 {
            return 0;
        }
        let w = white.get_pixel(wx as u32, wy as u32);
        let dr = b[0].abs_diff(w[0]) as u32;
        let dg = b[1].abs_diff(w[1]) as u32;
        let db = b[2].abs_diff(w[2]) as u32;
        let d = match self.params.calc_mode {
            CalcMode::Max => dr.max(dg).max(db),
            CalcMode::Avg => (dr + dg + db) / 3,
            CalcMode::Luminance => {
                let lum = |p: &Rgba<u8>| {
                    (p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000
                };
                lum(b).abs_diff(lum(w))
            }
        };
        d.min(255) as u8
    }

    /// Extraction alpha for one pixel: identical shots → opaque subject,
    /// strongly differing shots → backdrop.
    fn extract_alpha(&self, x: u32, y: u32) -> u8 {
        let d = self.difference(x, y);
        if d <= self.params.threshold {
            255
        } else {
            255 - d
        }
    }

    fn recompute_rect(&mut self, rect: ViewRect) {
        let rect = rect.clamped(self.width, self.height);
        if rect.is_empty() {
            return;
        }
        let matte = self.params.matte;
        for y in rect.y as u32..rect.y as u32 + rect.h {
            for x in rect.x as u32..rect.x as u32 + rect.w {
                let idx = (y * self.width + x) as usize;
                self.alpha0[idx] = if matte.covers(x, y, self.width, self.height) {
                    0
                } else {
                    self.extract_alpha(x, y)
                };
            }
        }
    }

    fn recompute_full(&mut self) {
        let width = self.width;
        let height = self.height;
        let matte = self.params.matte;
        // Rows are independent — fan the extraction out across cores.
        let rows: Vec<Vec<u8>> = (0..height)
            .into_par_iter()
            .map(|y| {
                (0..width)
                    .map(|x| {
                        if matte.covers(x, y, width, height) {
                            0
                        } else {
                            self.extract_alpha(x, y)
                        }
                    })
                    .collect()
            })
            .collect();
        for (y, row) in rows.into_iter().enumerate() {
            let start = y * width as usize;
            self.alpha0[start..start + width as usize].copy_from_slice(&row);
        }
    }

    /// Extraction alpha with the trash mask folded in.
    fn effective_alpha(&self, idx: usize) -> u8 {
        self.alpha0[idx].min(self.trash_mask[idx])
    }

    fn compose(&self, alpha_of: impl Fn(usize) -> u8) -> RgbaImage {
        let black = self.black.as_ref().unwrap();
        let mut out = RgbaImage::new(self.width, self.height);
        for (i, (src, dst)) in black.pixels().zip(out.pixels_mut()).enumerate() {
            *dst = Rgba([src[0], src[1], src[2], alpha_of(i)]);
        }
        out
    }

    /// Single-channel visualization: value rendered as opaque grayscale.
    fn grayscale(&self, value_of: impl Fn(usize) -> u8) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        for (i, dst) in out.pixels_mut().enumerate() {
            let v = value_of(i);
            *dst = Rgba([v, v, v, 255]);
        }
        out
    }

    fn mask_for(&self, target: MaskTarget) -> &[u8] {
        match target {
            MaskTarget::Trash => &self.trash_mask,
            MaskTarget::Solid => &self.solid_mask,
        }
    }

    fn mask_for_mut(&mut self, target: MaskTarget) -> &mut Vec<u8> {
        match target {
            MaskTarget::Trash => &mut self.trash_mask,
            MaskTarget::Solid => &mut self.solid_mask,
        }
    }
}

impl ComputeEngine for DiffEngine {
    fn has_images(&self) -> bool {
        self.ready()
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn load_images(
        &mut self,
        black: RgbaImage,
        white: RgbaImage,
        _auto_align: bool,
    ) -> Result<(), EngineError> {
        if black.dimensions() != white.dimensions() {
            let (w1, h1) = black.dimensions();
            let (w2, h2) = white.dimensions();
            return Err(EngineError::SizeMismatch(w1, h1, w2, h2));
        }
        self.width = black.width();
        self.height = black.height();
        self.black = Some(black);
        self.white = Some(white);
        // This engine performs no offset estimation; alignment starts neutral.
        self.offset = (0, 0);
        let n = self.pixel_count();
        self.alpha0 = vec![0; n];
        self.trash_mask = vec![255; n];
        self.solid_mask = vec![0; n];
        self.recompute_full();
        self.applied = self.alpha0.clone();
        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn recompute(
        &mut self,
        scope: RecomputeScope,
        params: &MatteParams,
    ) -> Result<(), EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        self.params = *params;
        match scope {
            RecomputeScope::FullImage => self.recompute_full(),
            RecomputeScope::Viewport(rect) => self.recompute_rect(rect),
        }
        Ok(())
    }

    fn buffer(&self, slot: BufferSlot) -> Option<RgbaImage> {
        if !self.ready() {
            return None;
        }
        let img = match slot {
            BufferSlot::Basic => self.compose(|i| self.alpha0[i]),
            BufferSlot::AlphaApplied => self.compose(|i| self.effective_alpha(i)),
            BufferSlot::Soft => self.grayscale(|i| self.effective_alpha(i)),
            BufferSlot::Hard => self.grayscale(|i| {
                if self.effective_alpha(i) >= HARD_CUTOFF { 255 } else { 0 }
            }),
            BufferSlot::SolidIntegrated | BufferSlot::SolidPreview => {
                self.compose(|i| self.effective_alpha(i).max(self.solid_mask[i]))
            }
            BufferSlot::SolidOverlay => {
                let mut out = RgbaImage::new(self.width, self.height);
                for (i, dst) in out.pixels_mut().enumerate() {
                    let v = self.solid_mask[i];
                    *dst = Rgba([0, 255, 0, v / 2]);
                }
                out
            }
        };
        Some(img)
    }

    fn mask_snapshot(&self, target: MaskTarget) -> Option<Vec<u8>> {
        if !self.ready() {
            return None;
        }
        Some(self.mask_for(target).to_vec())
    }

    fn restore_mask(&mut self, target: MaskTarget, data: &[u8]) -> Result<(), EngineError> {
        let expected = self.pixel_count();
        if data.len() != expected {
            return Err(EngineError::BadMaskLength { expected, got: data.len() });
        }
        self.mask_for_mut(target).copy_from_slice(data);
        Ok(())
    }

    fn fill_polygon(
        &mut self,
        points: &[(f32, f32)],
        value: u8,
        subtract: bool,
        anti_alias: bool,
        target: MaskTarget,
    ) -> Result<(), EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        if points.len() < 3 {
            return Ok(());
        }
        let width = self.width;
        let height = self.height;
        let write = if subtract { 0u8 } else { value };

        let y_min = points.iter().map(|p| p.1).fold(f32::MAX, f32::min).floor().max(0.0) as u32;
        let y_max = points
            .iter()
            .map(|p| p.1)
            .fold(f32::MIN, f32::max)
            .ceil()
            .min(height as f32) as u32;

        let mask = match target {
            MaskTarget::Trash => &mut self.trash_mask,
            MaskTarget::Solid => &mut self.solid_mask,
        };

        for y in y_min..y_max {
            let yc = y as f32 + 0.5;
            // Even-odd intersections of the row center with the polygon.
            let mut xs: Vec<f32> = Vec::new();
            for i in 0..points.len() {
                let (x0, y0) = points[i];
                let (x1, y1) = points[(i + 1) % points.len()];
                if (y0 <= yc && yc < y1) || (y1 <= yc && yc < y0) {
                    xs.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
                }
            }
            xs.sort_by(|a, b| a.total_cmp(b));
            for span in xs.chunks_exact(2) {
                let (xa, xb) = (span[0], span[1]);
                let px0 = xa.floor().max(0.0) as u32;
                let px1 = (xb.ceil() as i64).clamp(0, width as i64) as u32;
                for x in px0..px1 {
                    let center = x as f32 + 0.5;
                    let idx = (y * width + x) as usize;
                    if anti_alias {
                        // Coverage of the pixel's 1px footprint by the span.
                        let cover = (xb.min(x as f32 + 1.0) - xa.max(x as f32)).clamp(0.0, 1.0);
                        if cover <= 0.0 {
                            continue;
                        }
                        let old = mask[idx] as f32;
                        mask[idx] = (old + (write as f32 - old) * cover).round() as u8;
                    } else if center >= xa && center < xb {
                        mask[idx] = write;
                    }
                }
            }
        }
        Ok(())
    }

    // ---- alignment ---------------------------------------------------------

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
        params: &MatteParams,
        scope: RecomputeScope,
        _speed_priority: bool,
    ) -> Result<(), EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        self.offset = (x, y);
        self.recompute(scope, params)
    }

    fn confirm_alignment_offset(&mut self, x: i32, y: i32) -> Result<(), EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        self.offset = (x, y);
        self.recompute_full();
        self.applied = self.alpha0.clone();
        Ok(())
    }

    // ---- trash mode --------------------------------------------------------

    fn init_trash_mode(&mut self) -> Result<(), EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        self.trash_mask.fill(255);
        Ok(())
    }

    fn finalize_trash_mode(&mut self, params: &MatteParams) -> Result<(), EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        self.params = *params;
        self.applied = (0..self.pixel_count()).map(|i| self.effective_alpha(i)).collect();
        Ok(())
    }

    fn reset_trash_mode(&mut self) -> Result<(), EngineError> {
        self.init_trash_mode()
    }

    // ---- solid mode --------------------------------------------------------

    fn update_solid_params(&mut self, params: &SolidParams) -> Result<(), EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        self.solid_params = *params;
        // Clear coverage inside the matte bands so stale fills from an older
        // matte configuration cannot leak into later composites.
        let matte = params.matte;
        let width = self.width;
        let height = self.height;
        for y in 0..height {
            for x in 0..width {
                if matte.covers(x, y, width, height) {
                    self.solid_mask[(y * width + x) as usize] = 0;
                }
            }
        }
        Ok(())
    }

    fn execute_solid_shot(&mut self) -> Result<(), EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        let level = self.solid_params.level;
        let threshold = self.solid_params.aa_threshold;
        for i in 0..self.pixel_count() {
            if self.effective_alpha(i) >= threshold {
                self.solid_mask[i] = self.solid_mask[i].max(level);
            }
        }
        Ok(())
    }

    fn reset_solid_mode(&mut self) -> Result<(), EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        self.solid_mask.fill(0);
        Ok(())
    }

    fn load_solid_source(
        &mut self,
        source: RgbaImage,
        x: i32,
        y: i32,
    ) -> Result<(), EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        self.staged_source = Some((source, x, y));
        Ok(())
    }

    fn move_solid_source(&mut self, dx: i32, dy: i32) {
        if let Some((_, x, y)) = self.staged_source.as_mut() {
            *x += dx;
            *y += dy;
        }
    }

    fn commit_solid_source(&mut self) -> Result<(), EngineError> {
        let Some((source, ox, oy)) = self.staged_source.take() else {
            return Ok(());
        };
        let width = self.width as i32;
        let height = self.height as i32;
        for (sx, sy, p) in source.enumerate_pixels() {
            let x = ox + sx as i32;
            let y = oy + sy as i32;
            if x < 0 || y < 0 || x >= width || y >= height || p[3] == 0 {
                continue;
            }
            let idx = (y * width + x) as usize;
            self.solid_mask[idx] = self.solid_mask[idx].max(p[3]);
        }
        Ok(())
    }

    fn discard_solid_source(&mut self) {
        self.staged_source = None;
    }

    // ---- export ------------------------------------------------------------

    fn export(
        &mut self,
        mode: ExportMode,
        background: Option<[u8; 3]>,
        base_filename: &str,
    ) -> Result<ExportResult, EngineError> {
        if !self.ready() {
            return Err(EngineError::NotReady);
        }
        let mut img = match mode {
            ExportMode::Basic => self.compose(|i| self.applied[i]),
            ExportMode::TrashAlpha => self.compose(|i| self.effective_alpha(i)),
            ExportMode::TrashHard => self.compose(|i| {
                if self.effective_alpha(i) >= HARD_CUTOFF { 255 } else { 0 }
            }),
            ExportMode::Solid => {
                self.compose(|i| self.effective_alpha(i).max(self.solid_mask[i]))
            }
        };
        if let Some([r, g, b]) = background {
            for p in img.pixels_mut() {
                let a = p[3] as u32;
                let blend = |fg: u8, bg: u8| ((fg as u32 * a + bg as u32 * (255 - a)) / 255) as u8;
                *p = Rgba([blend(p[0], r), blend(p[1], g), blend(p[2], b), 255]);
            }
        }
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .map_err(|e| EngineError::Encode(e.to_string()))?;
        Ok(ExportResult {
            bytes,
            filename: format!("{}_{}.png", base_filename, mode.suffix()),
        })
    }
}
