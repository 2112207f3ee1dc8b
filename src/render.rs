//! Compositing renderer: draws the layer model through the viewport
//! transform onto an egui painter, one composited frame per paint pass.
//!
//! The renderer never mutates the layer model.  Textures are cached per
//! raster-slot generation, so a slot that did not change between frames is
//! not re-uploaded.

use egui::{
    Color32, ColorImage, Painter, Pos2, Rect, Shape, Stroke, TextureFilter, TextureHandle,
    TextureOptions, Vec2, pos2,
};
use egui::epaint::PathShape;

use crate::layers::{LayerModel, RasterLayer};
use crate::log_warn;
use crate::viewport::Viewport;

/// Above this zoom the texture switches to nearest-neighbour sampling so
/// individual pixels stay crisp.
const SMOOTHING_CUTOFF: f32 = 4.0;

/// Splitter hit radius / handle size, screen px.
pub const SPLIT_HANDLE_RADIUS: f32 = 15.0;

const LASSO_ADD_FILL: Color32 = Color32::from_rgba_premultiplied(128, 25, 25, 128);
const LASSO_ADD_STROKE: Color32 = Color32::from_rgba_premultiplied(204, 40, 40, 204);
const LASSO_SUB_FILL: Color32 = Color32::from_rgba_premultiplied(0, 50, 128, 128);
const LASSO_SUB_STROKE: Color32 = Color32::from_rgba_premultiplied(0, 80, 204, 204);

type TexSlot = Option<(u64, TextureHandle)>;

#[derive(Default)]
pub struct CompositingRenderer {
    base_tex: TexSlot,
    overlay_tex: TexSlot,
    comparison_tex: TexSlot,
    solid_source_tex: TexSlot,
}

impl CompositingRenderer {
    /// Drop all cached textures (image reload / whole-app reset).
    pub fn clear_cache(&mut self) {
        self.base_tex = None;
        self.overlay_tex = None;
        self.comparison_tex = None;
        self.solid_source_tex = None;
    }

    /// Composite one frame.  `offset` is the alignment offset in image
    /// units; it applies to the base/overlay/solid-source content but not to
    /// the comparison raster or the garbage-matte rectangles.
    pub fn paint(
        &mut self,
        ctx: &egui::Context,
        painter: &Painter,
        canvas_rect: Rect,
        viewport: &Viewport,
        layers: &LayerModel,
        offset: Vec2,
    ) {
        let options = texture_options(viewport.scale);
        let split_x = if layers.split.enabled {
            canvas_rect.min.x + canvas_rect.width() * layers.split.fraction.clamp(0.0, 1.0)
        } else {
            canvas_rect.min.x
        };

        // Canvas-local image→screen mapping.
        let to_screen =
            |p: Pos2| -> Pos2 { canvas_rect.min + viewport.image_to_screen(p).to_vec2() };

        // --- 1. Left side: comparison (before) raster, no alignment offset
        if layers.split.enabled
            && let Some(layer) = layers.comparison()
        {
            let clip = Rect::from_min_max(canvas_rect.min, pos2(split_x, canvas_rect.max.y));
            let left = painter.with_clip_rect(clip);
            if let Some(tex) = sync_texture(ctx, &mut self.comparison_tex, layer, options, "comparison")
            {
                draw_raster(&left, &tex, to_screen(pos2(0.0, 0.0)), layer, viewport.scale, Color32::WHITE);
            }
        }

        // --- 2. Right side (or whole canvas): edited content
        let right_clip = if layers.split.enabled {
            Rect::from_min_max(pos2(split_x, canvas_rect.min.y), canvas_rect.max)
        } else {
            canvas_rect
        };
        let right = painter.with_clip_rect(right_clip);

        let offset_origin = to_screen(pos2(offset.x, offset.y));
        if let Some(layer) = layers.base()
            && let Some(tex) = sync_texture(ctx, &mut self.base_tex, layer, options, "base")
        {
            draw_raster(&right, &tex, offset_origin, layer, viewport.scale, Color32::WHITE);
        }

        // --- 3. Solid-source guide raster, semi-transparent, offset frame
        if let Some((layer, pos)) = layers.solid_source()
            && let Some(tex) =
                sync_texture(ctx, &mut self.solid_source_tex, layer, options, "solid_source")
        {
            let origin = to_screen(pos2(offset.x + pos.x, offset.y + pos.y));
            let tint = Color32::from_rgba_unmultiplied(255, 255, 255, 128);
            draw_raster(&right, &tex, origin, layer, viewport.scale, tint);
        }

        // --- 4. Overlay raster, same frame as the base it annotates
        if let Some(layer) = layers.overlay()
            && let Some(tex) = sync_texture(ctx, &mut self.overlay_tex, layer, options, "overlay")
        {
            draw_raster(&right, &tex, offset_origin, layer, viewport.scale, Color32::WHITE);
        }

        // --- 5. Garbage matte, true image coordinates (offset undone)
        if let Some(matte) = layers.garbage_matte
            && let Some((iw, ih)) = layers.base_size()
        {
            let (iw, ih) = (iw as f32, ih as f32);
            let band = |x0: f32, y0: f32, x1: f32, y1: f32| {
                Rect::from_min_max(to_screen(pos2(x0, y0)), to_screen(pos2(x1, y1)))
            };
            let mut bands = Vec::new();
            if matte.top > 0 {
                bands.push(band(0.0, 0.0, iw, matte.top as f32));
            }
            if matte.bottom > 0 {
                bands.push(band(0.0, ih - matte.bottom as f32, iw, ih));
            }
            if matte.left > 0 {
                bands.push(band(0.0, 0.0, matte.left as f32, ih));
            }
            if matte.right > 0 {
                bands.push(band(iw - matte.right as f32, 0.0, iw, ih));
            }
            let tint = Color32::from_rgba_unmultiplied(255, 50, 50, 76);
            for rect in &bands {
                right.rect_filled(*rect, 0.0, Color32::BLACK);
            }
            for rect in &bands {
                right.rect_filled(*rect, 0.0, tint);
            }
        }

        // --- 6. Interactive feedback
        if let Some(rect) = layers.drag_rect {
            let r = rect.normalized();
            let min = to_screen(pos2(r.x, r.y));
            let max = to_screen(pos2(r.x + r.w, r.y + r.h));
            let stroke = Stroke::new(2.0, Color32::from_rgb(0, 255, 0));
            let corners = [min, pos2(max.x, min.y), max, pos2(min.x, max.y), min];
            for pair in corners.windows(2) {
                for shape in Shape::dashed_line(pair, stroke, 5.0, 5.0) {
                    right.add(shape);
                }
            }
        }

        if let Some(lasso) = &layers.lasso
            && !lasso.points.is_empty()
        {
            let mut points: Vec<Pos2> = lasso.points.iter().map(|p| to_screen(*p)).collect();
            let closed = match lasso.cursor {
                Some(c) => {
                    points.push(to_screen(c));
                    false
                }
                None => true,
            };
            let (fill, stroke_color) = if lasso.subtract {
                (LASSO_SUB_FILL, LASSO_SUB_STROKE)
            } else {
                (LASSO_ADD_FILL, LASSO_ADD_STROKE)
            };
            right.add(Shape::Path(PathShape {
                points,
                closed,
                fill,
                stroke: Stroke::new(2.0, stroke_color),
            }));
        }

        if layers.cursor.visible && layers.cursor.radius > 0.0 {
            let center = to_screen(layers.cursor.pos);
            let radius = layers.cursor.radius * viewport.scale;
            right.circle_filled(center, radius, Color32::from_rgba_unmultiplied(100, 200, 255, 76));
            right.circle_stroke(
                center,
                radius,
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(255, 255, 255, 204)),
            );
        }

        // --- 7. Split divider + grab handle, raw screen space, on top
        if layers.split.enabled {
            painter.line_segment(
                [pos2(split_x, canvas_rect.min.y), pos2(split_x, canvas_rect.max.y)],
                Stroke::new(2.0, Color32::WHITE),
            );
            let cy = canvas_rect.center().y;
            painter.circle_filled(pos2(split_x, cy), SPLIT_HANDLE_RADIUS, Color32::WHITE);
            let arrow = |dir: f32| {
                Shape::convex_polygon(
                    vec![
                        pos2(split_x + dir * 5.0, cy),
                        pos2(split_x + dir * 2.0, cy - 4.0),
                        pos2(split_x + dir * 2.0, cy + 4.0),
                    ],
                    Color32::from_gray(51),
                    Stroke::NONE,
                )
            };
            painter.add(arrow(-1.0));
            painter.add(arrow(1.0));
        }
    }
}

fn texture_options(scale: f32) -> TextureOptions {
    if scale < SMOOTHING_CUTOFF {
        TextureOptions {
            magnification: TextureFilter::Linear,
            minification: TextureFilter::Linear,
            ..Default::default()
        }
    } else {
        TextureOptions {
            magnification: TextureFilter::Nearest,
            minification: TextureFilter::Linear,
            ..Default::default()
        }
    }
}

/// Upload the raster for this slot if its generation changed.  A raster
/// whose byte length disagrees with its dimensions is a stale view — skip it
/// with a diagnostic rather than crashing the paint.
fn sync_texture(
    ctx: &egui::Context,
    cache: &mut TexSlot,
    layer: &RasterLayer,
    options: TextureOptions,
    name: &str,
) -> Option<TextureHandle> {
    if let Some((generation, tex)) = cache
        && *generation == layer.generation
    {
        return Some(tex.clone());
    }

    let (w, h) = (layer.image.width() as usize, layer.image.height() as usize);
    let raw = layer.image.as_raw();
    if raw.len() != w * h * 4 {
        log_warn!(
            "skipping {name} layer: buffer is {} bytes for {w}x{h}",
            raw.len()
        );
        return None;
    }
    let color_image = ColorImage::from_rgba_unmultiplied([w, h], raw);
    let tex = match cache.take() {
        Some((_, mut tex)) => {
            tex.set(color_image, options);
            tex
        }
        None => ctx.load_texture(format!("mattefe_{name}"), color_image, options),
    };
    *cache = Some((layer.generation, tex.clone()));
    Some(tex)
}

/// Draw a raster with its top-left at `origin`, scaled by the viewport.
fn draw_raster(
    painter: &Painter,
    tex: &TextureHandle,
    origin: Pos2,
    layer: &RasterLayer,
    scale: f32,
    tint: Color32,
) {
    let size = Vec2::new(
        layer.image.width() as f32 * scale,
        layer.image.height() as f32 * scale,
    );
    let rect = Rect::from_min_size(origin, size);
    let uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
    painter.image(tex.id(), rect, uv, tint);
}
