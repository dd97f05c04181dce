use crate::number::{parse_length, parse_viewbox};
use crate::span::Span;
use crate::style::{StyleProps, pick};
use crate::types::Transform;
use crate::xml::{ElementKind, XmlCursor};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ViewBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewBox {
    pub fn of(cursor: &XmlCursor<'_>) -> Option<ViewBox> {
        let (x, y, width, height) = parse_viewbox(cursor.attr("viewBox")?)?;
        Some(ViewBox {
            x,
            y,
            width,
            height,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Min,
    Mid,
    Max,
}

impl Align {
    fn offset(self, leftover: f32) -> f32 {
        if leftover <= 0.0 {
            return 0.0;
        }
        match self {
            Align::Min => 0.0,
            Align::Mid => leftover * 0.5,
            Align::Max => leftover,
        }
    }
}

/// Parsed `preserveAspectRatio`. `None` alignment means non-uniform scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AspectRatio {
    align: Option<(Align, Align)>,
    slice: bool,
}

fn parse_aspect_ratio(value: Option<Span<'_>>) -> AspectRatio {
    let mut value = value.unwrap_or_default().trim();
    if value.starts_with_ignore_ascii_case("defer") {
        value = value.skip(5).trim();
    }
    if value.is_empty() {
        value = Span::from("xMidYMid meet");
    }

    let bytes = value.as_bytes();
    let split = bytes
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let align = Span::new(&bytes[..split]);
    let mode = Span::new(&bytes[split..]).trim();

    if value.starts_with_ignore_ascii_case("none") {
        return AspectRatio {
            align: None,
            slice: false,
        };
    }
    if !align.starts_with_ignore_ascii_case("x") {
        return AspectRatio {
            align: Some((Align::Mid, Align::Mid)),
            slice: false,
        };
    }

    let axis = |min: &str, max: &str, part: Span<'_>| {
        if part.starts_with_ignore_ascii_case(min) {
            Align::Min
        } else if part.starts_with_ignore_ascii_case(max) {
            Align::Max
        } else {
            Align::Mid
        }
    };
    AspectRatio {
        align: Some((axis("xMin", "xMax", align), axis("YMin", "YMax", align.skip(4)))),
        slice: mode.starts_with_ignore_ascii_case("slice"),
    }
}

/// Maps `viewbox` onto a `width × height` viewport. `None` when either box is empty.
pub(crate) fn viewbox_transform(
    width: f32,
    height: f32,
    viewbox: ViewBox,
    preserve_aspect_ratio: Option<Span<'_>>,
) -> Option<Transform> {
    if !(width > 0.0 && height > 0.0 && viewbox.width > 0.0 && viewbox.height > 0.0) {
        return None;
    }
    let sx = width / viewbox.width;
    let sy = height / viewbox.height;
    let aspect = parse_aspect_ratio(preserve_aspect_ratio);

    let Some((align_x, align_y)) = aspect.align else {
        return Some(Transform::new(sx, 0.0, 0.0, sy, -viewbox.x * sx, -viewbox.y * sy));
    };
    let s = if aspect.slice { sx.max(sy) } else { sx.min(sy) };
    let dx = align_x.offset(width - viewbox.width * s) - viewbox.x * s;
    let dy = align_y.offset(height - viewbox.height * s) - viewbox.y * s;
    Some(Transform::new(s, 0.0, 0.0, s, dx, dy))
}

/// Viewport mapping for an `<svg>` or `<symbol>` referenced by `<use>`: sized by the use's
/// `width`/`height`, else the target's own, else its viewBox.
pub(crate) fn use_target_transform(
    use_width: f32,
    use_height: f32,
    target: &XmlCursor<'_>,
) -> Option<Transform> {
    if !matches!(target.kind(), ElementKind::Svg | ElementKind::Symbol) {
        return None;
    }
    let props = StyleProps::of(target);
    let mut width = use_width;
    let mut height = use_height;
    if width <= 0.0 {
        width = pick(props.width, target, "width").map_or(0.0, parse_length);
    }
    if height <= 0.0 {
        height = pick(props.height, target, "height").map_or(0.0, parse_length);
    }
    let viewbox = ViewBox::of(target)?;
    if !(width > 0.0 && height > 0.0) {
        width = viewbox.width;
        height = viewbox.height;
    }
    viewbox_transform(width, height, viewbox, target.attr("preserveAspectRatio"))
}
