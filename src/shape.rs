use crate::number::{NumberCursor, parse_float};
use crate::path::{BoundsSink, DrawSink, emit_path_data};
use crate::span::Span;
use crate::style::{StyleProps, pick};
use crate::types::Extents;
use crate::xml::{ElementKind, XmlCursor};

const CIRCLE_K: f32 = 0.5522847498;

/// Geometry of one basic shape element, borrowed from the document where possible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Shape<'a> {
    Path(Span<'a>),
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        rx: f32,
        ry: f32,
    },
    Ellipse {
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    Poly {
        points: Span<'a>,
        closed: bool,
    },
}

/// Reads the shape at the cursor's current tag. `None` for non-shapes and for geometry that
/// cannot paint anything.
pub(crate) fn parse_shape<'a>(cursor: &XmlCursor<'a>, props: &StyleProps<'a>) -> Option<Shape<'a>> {
    let num = |style: Option<Span<'a>>, name: &str| {
        pick(style, cursor, name).map(parse_float).unwrap_or(0.0)
    };

    match cursor.kind() {
        ElementKind::Path => {
            let d = pick(props.d, cursor, "d")?;
            (!d.trim().is_empty()).then_some(Shape::Path(d))
        }
        ElementKind::Rect => {
            let w = num(props.width, "width");
            let h = num(props.height, "height");
            if w <= 0.0 || h <= 0.0 {
                return None;
            }
            let rx = num(props.rx, "rx");
            let ry = num(props.ry, "ry");
            if rx < 0.0 || ry < 0.0 {
                return None;
            }
            Some(Shape::Rect {
                x: num(props.x, "x"),
                y: num(props.y, "y"),
                w,
                h,
                rx,
                ry,
            })
        }
        ElementKind::Circle => {
            let r = num(props.r, "r");
            if r <= 0.0 {
                return None;
            }
            Some(Shape::Ellipse {
                cx: num(props.cx, "cx"),
                cy: num(props.cy, "cy"),
                rx: r,
                ry: r,
            })
        }
        ElementKind::Ellipse => {
            let rx = num(props.rx, "rx");
            let ry = num(props.ry, "ry");
            if rx <= 0.0 || ry <= 0.0 {
                return None;
            }
            Some(Shape::Ellipse {
                cx: num(props.cx, "cx"),
                cy: num(props.cy, "cy"),
                rx,
                ry,
            })
        }
        ElementKind::Line => Some(Shape::Line {
            x1: num(props.x1, "x1"),
            y1: num(props.y1, "y1"),
            x2: num(props.x2, "x2"),
            y2: num(props.y2, "y2"),
        }),
        kind @ (ElementKind::Polyline | ElementKind::Polygon) => {
            let points = pick(props.points, cursor, "points")?;
            (!points.trim().is_empty()).then_some(Shape::Poly {
                points,
                closed: kind == ElementKind::Polygon,
            })
        }
        _ => None,
    }
}

impl Shape<'_> {
    pub fn emit(&self, sink: &mut dyn DrawSink) {
        match *self {
            Shape::Path(d) => emit_path_data(d, sink),
            Shape::Rect { x, y, w, h, rx, ry } => emit_rect(sink, x, y, w, h, rx, ry),
            Shape::Ellipse { cx, cy, rx, ry } => emit_ellipse(sink, cx, cy, rx, ry),
            Shape::Line { x1, y1, x2, y2 } => {
                sink.move_to(x1, y1);
                sink.line_to(x2, y2);
            }
            Shape::Poly { points, closed } => emit_points(sink, points, closed),
        }
    }

    /// Control-point extents in the shape's own coordinates.
    pub fn bbox(&self) -> Extents {
        let mut bounds = BoundsSink::default();
        self.emit(&mut bounds);
        bounds.extents
    }
}

fn emit_rect(sink: &mut dyn DrawSink, x: f32, y: f32, w: f32, h: f32, rx: f32, ry: f32) {
    if rx <= 0.0 && ry <= 0.0 {
        sink.move_to(x, y);
        sink.line_to(x + w, y);
        sink.line_to(x + w, y + h);
        sink.line_to(x, y + h);
        sink.close_path();
        return;
    }

    // A single radius applies to both axes.
    let rx = if rx <= 0.0 { ry } else { rx }.min(w / 2.0);
    let ry = if ry <= 0.0 { rx } else { ry }.min(h / 2.0);
    let kx = rx * CIRCLE_K;
    let ky = ry * CIRCLE_K;

    sink.move_to(x + rx, y);
    sink.line_to(x + w - rx, y);
    sink.cubic_to(x + w - rx + kx, y, x + w, y + ry - ky, x + w, y + ry);
    sink.line_to(x + w, y + h - ry);
    sink.cubic_to(x + w, y + h - ry + ky, x + w - rx + kx, y + h, x + w - rx, y + h);
    sink.line_to(x + rx, y + h);
    sink.cubic_to(x + rx - kx, y + h, x, y + h - ry + ky, x, y + h - ry);
    sink.line_to(x, y + ry);
    sink.cubic_to(x, y + ry - ky, x + rx - kx, y, x + rx, y);
    sink.close_path();
}

fn emit_ellipse(sink: &mut dyn DrawSink, cx: f32, cy: f32, rx: f32, ry: f32) {
    let kx = rx * CIRCLE_K;
    let ky = ry * CIRCLE_K;
    sink.move_to(cx + rx, cy);
    sink.cubic_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);
    sink.cubic_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);
    sink.cubic_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);
    sink.cubic_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);
    sink.close_path();
}

fn emit_points(sink: &mut dyn DrawSink, points: Span<'_>, closed: bool) {
    let mut cursor = NumberCursor::new(points);
    let mut first = true;
    while let Some((x, y)) = cursor.next_pair() {
        if first {
            sink.move_to(x, y);
            first = false;
        } else {
            sink.line_to(x, y);
        }
    }
    if closed && !first {
        sink.close_path();
    }
}
