use crate::error::SvgGlyphError;
use crate::paint::{ClipOutline, ColorLine, CompositeMode, Extend, PaintSink};
use crate::path::DrawSink;
use crate::types::{Color, Transform};
use tiny_skia::{
    BlendMode, FillRule, FilterQuality, GradientStop, LinearGradient, Mask, Paint, Path,
    PathBuilder, Pixmap, PixmapPaint, Point, RadialGradient, Rect, Shader, SpreadMode,
};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

/// Paint sink rasterizing into a premultiplied RGBA pixmap.
///
/// Clips are coverage masks, each one the intersection of its parent with the new outline.
/// Groups render into a fresh layer that is composited down when popped.
pub struct RasterSink<'f> {
    width: u32,
    height: u32,
    layers: Vec<Pixmap>,
    transforms: Vec<Transform>,
    // `None` entries mean "unclipped".
    clips: Vec<Option<Mask>>,
    glyphs: Option<&'f Face<'f>>,
}

impl<'f> RasterSink<'f> {
    /// Transparent `width × height` target. `device` maps glyph space to pixels.
    pub fn new(width: u32, height: u32, device: Transform) -> Result<Self, SvgGlyphError> {
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            SvgGlyphError::InvalidConfiguration(format!(
                "invalid raster size {}x{}",
                width, height
            ))
        })?;
        Ok(Self {
            width,
            height,
            layers: vec![pixmap],
            transforms: vec![device],
            clips: Vec::new(),
            glyphs: None,
        })
    }

    /// Outlines for `push_clip_glyph`. Without a face, glyph clips leave the clip unchanged.
    pub fn with_glyph_outlines(mut self, face: &'f Face<'f>) -> Self {
        self.glyphs = Some(face);
        self
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.layers[0]
    }

    /// Premultiplied RGBA of one pixel of the base layer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let p = self.layers[0].pixel(x, y)?;
        Some([p.red(), p.green(), p.blue(), p.alpha()])
    }

    /// Flattens any groups left open and returns the base layer.
    pub fn into_pixmap(mut self) -> Pixmap {
        while self.layers.len() > 1 {
            self.pop_group(CompositeMode::SrcOver, 1.0);
        }
        self.layers.swap_remove(0)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, SvgGlyphError> {
        self.layers[0]
            .encode_png()
            .map_err(|e| SvgGlyphError::InvalidConfiguration(format!("png encode failed: {e}")))
    }

    fn ctm(&self) -> Transform {
        self.transforms.last().copied().unwrap_or_default()
    }

    fn mask(&self) -> Option<&Mask> {
        self.clips.last().and_then(Option::as_ref)
    }

    fn push_clip_outline(&mut self, path: Option<Path>) {
        let transform = to_sk_transform(self.ctm());
        let parent = self.mask().cloned();
        let mask = match (path, parent) {
            (Some(path), Some(mut mask)) => {
                mask.intersect_path(&path, FillRule::Winding, true, transform);
                Some(mask)
            }
            (Some(path), None) => Mask::new(self.width, self.height).map(|mut mask| {
                mask.fill_path(&path, FillRule::Winding, true, transform);
                mask
            }),
            // Empty outline: nothing survives.
            (None, _) => Mask::new(self.width, self.height),
        };
        self.clips.push(mask);
    }

    fn fill_clip(&mut self, paint: &Paint<'_>) {
        let Some(rect) = Rect::from_xywh(0.0, 0.0, self.width as f32, self.height as f32) else {
            return;
        };
        let mask = self.clips.last().and_then(Option::as_ref);
        if let Some(layer) = self.layers.last_mut() {
            layer.fill_rect(rect, paint, tiny_skia::Transform::identity(), mask);
        }
    }

    fn fill_shader(&mut self, shader: Option<Shader<'_>>) {
        let Some(shader) = shader else {
            return;
        };
        let mut paint = Paint::default();
        paint.shader = shader;
        paint.anti_alias = true;
        self.fill_clip(&paint);
    }
}

impl PaintSink for RasterSink<'_> {
    fn push_transform(&mut self, transform: Transform) {
        let ctm = self.ctm().mul(transform);
        self.transforms.push(ctm);
    }

    fn pop_transform(&mut self) {
        if self.transforms.len() > 1 {
            self.transforms.pop();
        }
    }

    fn push_clip_glyph(&mut self, glyph: u32) {
        let Some(face) = self.glyphs else {
            let unchanged = self.mask().cloned();
            self.clips.push(unchanged);
            return;
        };
        let mut builder = SkiaPathSink::default();
        let outlined = u16::try_from(glyph)
            .ok()
            .and_then(|id| face.outline_glyph(GlyphId(id), &mut builder));
        let path = outlined.and_then(|_| builder.finish());
        self.push_clip_outline(path);
    }

    fn push_clip_rectangle(&mut self, xmin: f32, ymin: f32, xmax: f32, ymax: f32) {
        let path = Rect::from_ltrb(xmin, ymin, xmax, ymax).map(PathBuilder::from_rect);
        self.push_clip_outline(path);
    }

    fn push_clip_path(&mut self, outline: &dyn ClipOutline) {
        let mut builder = SkiaPathSink::default();
        outline.emit(&mut builder);
        self.push_clip_outline(builder.finish());
    }

    fn pop_clip(&mut self) {
        self.clips.pop();
    }

    fn solid_color(&mut self, color: Color) {
        let mut paint = Paint::default();
        paint.set_color(to_sk_color(color));
        paint.anti_alias = true;
        self.fill_clip(&paint);
    }

    fn linear_gradient(
        &mut self,
        line: &dyn ColorLine,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    ) {
        // The color line runs from p0 to p1 projected onto the normal of p0→p2.
        let (nx, ny) = (y2 - y0, -(x2 - x0));
        let len2 = nx * nx + ny * ny;
        let (ex, ey) = if len2 > f32::EPSILON {
            let t = ((x1 - x0) * nx + (y1 - y0) * ny) / len2;
            (x0 + nx * t, y0 + ny * t)
        } else {
            (x1, y1)
        };
        let shader = LinearGradient::new(
            Point::from_xy(x0, y0),
            Point::from_xy(ex, ey),
            gradient_stops(line),
            spread_mode(line.extend()),
            to_sk_transform(self.ctm()),
        );
        self.fill_shader(shader);
    }

    fn radial_gradient(
        &mut self,
        line: &dyn ColorLine,
        x0: f32,
        y0: f32,
        _r0: f32,
        x1: f32,
        y1: f32,
        r1: f32,
    ) {
        // Two-point conical with a zero focal radius.
        let shader = RadialGradient::new(
            Point::from_xy(x0, y0),
            Point::from_xy(x1, y1),
            r1.max(0.0001),
            gradient_stops(line),
            spread_mode(line.extend()),
            to_sk_transform(self.ctm()),
        );
        self.fill_shader(shader);
    }

    fn push_group(&mut self) {
        match Pixmap::new(self.width, self.height) {
            Some(layer) => self.layers.push(layer),
            None => {
                if let Some(top) = self.layers.last().cloned() {
                    self.layers.push(top);
                }
            }
        }
    }

    fn pop_group(&mut self, mode: CompositeMode, opacity: f32) {
        if self.layers.len() < 2 {
            return;
        }
        let Some(layer) = self.layers.pop() else {
            return;
        };
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0),
            blend_mode: blend_mode(mode),
            quality: FilterQuality::Nearest,
        };
        if let Some(below) = self.layers.last_mut() {
            below.draw_pixmap(
                0,
                0,
                layer.as_ref(),
                &paint,
                tiny_skia::Transform::identity(),
                None,
            );
        }
    }
}

/// Collects `DrawSink` and glyph outline callbacks into a tiny-skia path.
#[derive(Default)]
struct SkiaPathSink {
    builder: PathBuilder,
}

impl SkiaPathSink {
    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl DrawSink for SkiaPathSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x, y);
    }

    fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.builder.quad_to(cx, cy, x, y);
    }

    fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        self.builder.cubic_to(c1x, c1y, c2x, c2y, x, y);
    }

    fn close_path(&mut self) {
        self.builder.close();
    }
}

impl OutlineBuilder for SkiaPathSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn gradient_stops(line: &dyn ColorLine) -> Vec<GradientStop> {
    let stops = line.collect_stops();
    if stops.is_empty() {
        return vec![GradientStop::new(0.0, to_sk_color(Color::TRANSPARENT))];
    }
    stops
        .iter()
        .map(|stop| GradientStop::new(stop.offset.clamp(0.0, 1.0), to_sk_color(stop.color)))
        .collect()
}

fn spread_mode(extend: Extend) -> SpreadMode {
    match extend {
        Extend::Pad => SpreadMode::Pad,
        Extend::Repeat => SpreadMode::Repeat,
        Extend::Reflect => SpreadMode::Reflect,
    }
}

fn blend_mode(mode: CompositeMode) -> BlendMode {
    match mode {
        CompositeMode::Clear => BlendMode::Clear,
        CompositeMode::Src => BlendMode::Source,
        CompositeMode::Dest => BlendMode::Destination,
        CompositeMode::SrcOver => BlendMode::SourceOver,
        CompositeMode::DestOver => BlendMode::DestinationOver,
        CompositeMode::SrcIn => BlendMode::SourceIn,
        CompositeMode::DestIn => BlendMode::DestinationIn,
        CompositeMode::SrcOut => BlendMode::SourceOut,
        CompositeMode::DestOut => BlendMode::DestinationOut,
        CompositeMode::Multiply => BlendMode::Multiply,
        CompositeMode::Screen => BlendMode::Screen,
    }
}

fn to_sk_transform(t: Transform) -> tiny_skia::Transform {
    tiny_skia::Transform::from_row(t.xx, t.yx, t.xy, t.yy, t.dx, t.dy)
}

fn to_sk_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba(
        color.r.clamp(0.0, 1.0),
        color.g.clamp(0.0, 1.0),
        color.b.clamp(0.0, 1.0),
        color.a.clamp(0.0, 1.0),
    )
    .unwrap_or(tiny_skia::Color::BLACK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::{ColorStop, StopList};
    use crate::render::{GlyphRequest, render_glyph};

    fn sink(size: u32) -> RasterSink<'static> {
        RasterSink::new(size, size, Transform::identity()).expect("raster target")
    }

    #[test]
    fn rejects_empty_targets() {
        assert!(RasterSink::new(0, 10, Transform::identity()).is_err());
    }

    #[test]
    fn solid_fill_respects_the_clip_rectangle() {
        let mut raster = sink(8);
        raster.push_clip_rectangle(0.0, 0.0, 4.0, 8.0);
        raster.solid_color(Color::rgb(1.0, 0.0, 0.0));
        raster.pop_clip();
        assert_eq!(raster.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(raster.pixel(6, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn nested_clips_intersect_under_the_current_transform() {
        let mut raster = sink(8);
        raster.push_transform(Transform::translate(4.0, 0.0));
        raster.push_clip_rectangle(0.0, 0.0, 4.0, 8.0);
        raster.pop_transform();
        raster.push_clip_rectangle(0.0, 0.0, 8.0, 4.0);
        raster.solid_color(Color::rgb(0.0, 0.0, 1.0));
        raster.pop_clip();
        raster.pop_clip();
        assert_eq!(raster.pixel(5, 1), Some([0, 0, 255, 255]));
        assert_eq!(raster.pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(raster.pixel(5, 6), Some([0, 0, 0, 0]));
    }

    #[test]
    fn group_opacity_is_applied_on_pop() {
        let mut raster = sink(4);
        raster.push_group();
        raster.solid_color(Color::rgb(0.0, 0.0, 1.0));
        raster.pop_group(CompositeMode::SrcOver, 0.5);
        let [_, _, b, a] = raster.pixel(2, 2).expect("pixel");
        assert!((i32::from(a) - 128).abs() <= 1);
        assert_eq!(a, b);
    }

    #[test]
    fn linear_gradient_runs_from_the_first_to_the_last_stop() {
        let mut raster = sink(16);
        let line = StopList {
            extend: Extend::Pad,
            stops: vec![
                ColorStop {
                    offset: 0.0,
                    color: Color::rgb(1.0, 0.0, 0.0),
                },
                ColorStop {
                    offset: 1.0,
                    color: Color::rgb(0.0, 0.0, 1.0),
                },
            ],
        };
        raster.linear_gradient(&line, 0.0, 0.0, 16.0, 0.0, 0.0, 16.0);
        let left = raster.pixel(0, 8).expect("left");
        let right = raster.pixel(15, 8).expect("right");
        assert!(left[0] > 200 && left[2] < 40);
        assert!(right[2] > 200 && right[0] < 40);
    }

    #[test]
    fn rasterizes_a_rendered_glyph() {
        let doc = r##"<svg><path id="glyph5" d="M0 0 L16 0 L16 16 Z" fill="#00ff00"/></svg>"##;
        let mut raster = sink(16);
        render_glyph(
            &mut raster,
            &GlyphRequest {
                doc: doc.as_bytes(),
                glyph: 5,
                cache: None,
                foreground: Color::BLACK,
                palette: &[],
                root_transform: None,
                flip_y: false,
                debug: None,
                perf: None,
            },
        )
        .expect("glyph 5");
        assert_eq!(raster.pixel(12, 3), Some([0, 255, 0, 255]));
        assert_eq!(raster.pixel(3, 12), Some([0, 0, 0, 0]));
        assert_eq!(raster.into_pixmap().width(), 16);
    }

    #[test]
    fn glyph_clips_without_outlines_leave_the_clip_alone() {
        let mut raster = sink(4);
        raster.push_clip_glyph(3);
        raster.solid_color(Color::BLACK);
        raster.pop_clip();
        assert_eq!(raster.pixel(0, 0), Some([0, 0, 0, 255]));
    }
}
