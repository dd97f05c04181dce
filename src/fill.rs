use crate::color::parse_color;
use crate::debug::GlyphLog;
use crate::defs::{DefsRegistry, GradientKind, GradientStop, MergedGradient};
use crate::paint::{ColorLine, ColorStop, Extend, PaintSink};
use crate::span::Span;
use crate::style::{paint_fallback, parse_id_ref};
use crate::types::{Color, Extents, Transform};

/// What a fill needs besides the paint value itself.
#[derive(Clone, Copy)]
pub(crate) struct FillContext<'r, 'a> {
    pub defs: &'r DefsRegistry<'a>,
    pub palette: &'r [Color],
    pub log: GlyphLog<'r>,
}

/// Stops of a resolved gradient, adjusted for the use site on demand.
struct GradientColorLine<'g> {
    stops: &'g [GradientStop],
    extend: Extend,
    alpha_scale: f32,
    current_color: Color,
}

impl ColorLine for GradientColorLine<'_> {
    fn extend(&self) -> Extend {
        self.extend
    }

    fn stop_count(&self) -> usize {
        self.stops.len()
    }

    fn color_stops(&self, start: usize, out: &mut [ColorStop]) -> usize {
        let available = self.stops.get(start..).unwrap_or(&[]);
        let n = available.len().min(out.len());
        for (slot, stop) in out.iter_mut().zip(available) {
            let color = if stop.is_current_color {
                self.current_color.scale_alpha(stop.color.a)
            } else {
                stop.color
            };
            *slot = ColorStop {
                offset: stop.offset,
                color: color.scale_alpha(self.alpha_scale),
            };
        }
        n
    }
}

/// Paints the current clip with `fill`: a color, or `url(#id) [fallback]` naming a gradient.
/// `bbox` is the painted shape's extents, used by bounding-box gradient units.
pub(crate) fn emit_fill(
    sink: &mut dyn PaintSink,
    ctx: &FillContext<'_, '_>,
    fill: Span<'_>,
    fill_opacity: f32,
    bbox: Option<&Extents>,
    current_color: Color,
) {
    let fill = fill.trim();
    if fill.starts_with_ignore_ascii_case("url(") {
        let fallback = paint_fallback(fill);
        let painted = parse_id_ref(fill)
            .and_then(|id| ctx.defs.resolve_gradient(id.as_bytes(), ctx.log))
            .filter(|gradient| !gradient.stops.is_empty())
            .is_some_and(|gradient| {
                paint_gradient(sink, &gradient, fill_opacity, bbox, current_color)
            });
        if !painted {
            if let Some(fallback) = fallback {
                emit_fill(sink, ctx, fallback, fill_opacity, bbox, current_color);
            }
        }
        return;
    }

    if let Some(color) = parse_color(fill, current_color, ctx.palette) {
        sink.solid_color(color.scale_alpha(fill_opacity));
    }
}

/// Returns false, having emitted nothing, when the gradient cannot paint.
fn paint_gradient(
    sink: &mut dyn PaintSink,
    gradient: &MergedGradient<'_>,
    fill_opacity: f32,
    bbox: Option<&Extents>,
    current_color: Color,
) -> bool {
    let attrs = &gradient.attrs;
    let (cx, cy) = (attrs.cx.unwrap_or(0.5), attrs.cy.unwrap_or(0.5));
    let r = attrs.r.unwrap_or(0.5);
    if gradient.kind == GradientKind::Radial && !(r.is_finite() && r > 0.0) {
        return false;
    }

    let line = GradientColorLine {
        stops: gradient.stops,
        extend: attrs.spread.unwrap_or_default(),
        alpha_scale: fill_opacity.clamp(0.0, 1.0),
        current_color,
    };

    let bbox_transform = match bbox {
        Some(bbox) if !attrs.user_space_units.unwrap_or(false) => unit_space(bbox),
        _ => None,
    };
    let pushes = [bbox_transform, attrs.transform];
    for transform in pushes.iter().flatten() {
        sink.push_transform(*transform);
    }

    match gradient.kind {
        GradientKind::Linear => {
            let (x1, y1) = (attrs.x1.unwrap_or(0.0), attrs.y1.unwrap_or(0.0));
            let (x2, y2) = (attrs.x2.unwrap_or(1.0), attrs.y2.unwrap_or(0.0));
            // p0→p2 is p0→p1 turned a quarter, so color lines run perpendicular to p0→p1.
            sink.linear_gradient(&line, x1, y1, x2, y2, x1 - (y2 - y1), y1 + (x2 - x1));
        }
        GradientKind::Radial => {
            let fx = attrs.fx.unwrap_or(cx);
            let fy = attrs.fy.unwrap_or(cy);
            let fr = attrs
                .fr
                .filter(|fr| fr.is_finite() && *fr >= 0.0)
                .unwrap_or(0.0)
                .min(r);
            sink.radial_gradient(&line, fx, fy, fr, cx, cy, r);
        }
    }

    for _ in pushes.iter().flatten() {
        sink.pop_transform();
    }
    true
}

fn unit_space(bbox: &Extents) -> Option<Transform> {
    let (w, h) = (bbox.width(), bbox.height());
    (!bbox.is_empty() && w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0)
        .then(|| bbox.unit_transform())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, Command};
    use crate::defs::{DefsSource, collect_defs};

    const DOC: &str = r##"<svg><defs>
        <linearGradient id="lin" x1="0" x2="1">
          <stop offset="0" stop-color="red"/>
          <stop offset="1" stop-color="currentColor" stop-opacity="0.5"/>
        </linearGradient>
        <radialGradient id="rad" gradientUnits="userSpaceOnUse" cx="5" cy="6" r="4" fr="9" spreadMethod="repeat">
          <stop offset="0"/>
        </radialGradient>
        <radialGradient id="flat" r="0"><stop offset="0"/></radialGradient>
        <linearGradient id="empty"/>
    </defs></svg>"##;

    fn paint(fill: &str, opacity: f32, bbox: Option<Extents>) -> Vec<Command> {
        let defs = collect_defs(&DefsSource {
            doc: DOC.as_bytes(),
            cache: None,
            foreground: Color::BLACK,
            palette: &[],
            log: GlyphLog::default(),
        });
        let ctx = FillContext {
            defs: &defs,
            palette: &[],
            log: GlyphLog::default(),
        };
        let mut canvas = Canvas::new();
        emit_fill(
            &mut canvas,
            &ctx,
            Span::from(fill),
            opacity,
            bbox.as_ref(),
            Color::rgb(0.0, 1.0, 0.0),
        );
        assert!(canvas.is_balanced());
        canvas.finish()
    }

    fn bbox(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Extents {
        Extents {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    #[test]
    fn solid_colors_take_fill_opacity() {
        let ops = paint("#ff0000", 0.5, None);
        assert_eq!(ops, vec![Command::SolidColor(Color::rgba(1.0, 0.0, 0.0, 0.5))]);
        assert_eq!(
            paint("currentColor", 1.0, None),
            vec![Command::SolidColor(Color::rgb(0.0, 1.0, 0.0))]
        );
        assert!(paint("none", 1.0, None).is_empty());
    }

    #[test]
    fn bbox_units_wrap_the_gradient_in_the_unit_transform() {
        let ops = paint("url(#lin)", 1.0, Some(bbox(10.0, 20.0, 30.0, 60.0)));
        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops[0],
            Command::PushTransform(Transform::new(20.0, 0.0, 0.0, 40.0, 10.0, 20.0))
        );
        match &ops[1] {
            Command::LinearGradient {
                stops, p0, p1, p2, ..
            } => {
                assert_eq!(*p0, (0.0, 0.0));
                assert_eq!(*p1, (1.0, 0.0));
                assert_eq!(*p2, (0.0, 1.0));
                assert_eq!(stops[0].color, Color::rgb(1.0, 0.0, 0.0));
                assert_eq!(stops[1].color, Color::rgba(0.0, 1.0, 0.0, 0.5));
            }
            other => panic!("expected a linear gradient, got {other:?}"),
        }
        assert_eq!(ops[2], Command::PopTransform);
    }

    #[test]
    fn degenerate_bbox_skips_the_unit_transform() {
        let ops = paint("url(#lin)", 1.0, Some(bbox(0.0, 0.0, 10.0, 0.0)));
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn radial_focus_radius_is_capped_by_the_outer_radius() {
        let ops = paint("url(#rad)", 0.5, Some(bbox(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            Command::RadialGradient {
                extend,
                stops,
                c0,
                c1,
            } => {
                assert_eq!(*extend, Extend::Repeat);
                assert_eq!(*c0, (5.0, 6.0, 4.0));
                assert_eq!(*c1, (5.0, 6.0, 4.0));
                assert_eq!(stops[0].color, Color::rgba(0.0, 0.0, 0.0, 0.5));
            }
            other => panic!("expected a radial gradient, got {other:?}"),
        }
    }

    #[test]
    fn unusable_references_fall_back() {
        assert_eq!(
            paint("url(#missing) blue", 1.0, None),
            vec![Command::SolidColor(Color::rgb(0.0, 0.0, 1.0))]
        );
        assert_eq!(
            paint("url(#empty) #000", 1.0, None),
            vec![Command::SolidColor(Color::BLACK)]
        );
        assert_eq!(
            paint("url(#flat) #000", 1.0, None),
            vec![Command::SolidColor(Color::BLACK)]
        );
        assert!(paint("url(#missing)", 1.0, None).is_empty());
    }
}
