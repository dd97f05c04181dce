use crate::defs::{ClipShape, DefsRegistry};
use crate::paint::{ClipOutline, PaintSink};
use crate::path::{DrawSink, TransformedSink};
use crate::shape::Shape;
use crate::span::Span;
use crate::style::parse_id_ref;
use crate::types::{Extents, Transform};

impl ClipOutline for Shape<'_> {
    fn emit(&self, sink: &mut dyn DrawSink) {
        Shape::emit(self, sink);
    }
}

struct ClipPathOutline<'c, 'a> {
    shapes: &'c [ClipShape<'a>],
    /// Bounding-box mapping and the `<clipPath>`'s own transform.
    prefix: Transform,
}

impl ClipOutline for ClipPathOutline<'_, '_> {
    fn emit(&self, sink: &mut dyn DrawSink) {
        for entry in self.shapes {
            let mut mapped = TransformedSink {
                inner: &mut *sink,
                transform: self.prefix.mul(entry.transform),
            };
            entry.shape.emit(&mut mapped);
        }
    }
}

/// Pushes the clip named by a `clip-path` value (`url(#id)` or `#id`). Returns whether a clip
/// was pushed; the caller pops it. Bounding-box clips need a non-degenerate `bbox`.
pub(crate) fn push_clip_path_ref(
    sink: &mut dyn PaintSink,
    defs: &DefsRegistry<'_>,
    value: Option<Span<'_>>,
    bbox: Option<&Extents>,
) -> bool {
    let Some(value) = value.map(Span::trim) else {
        return false;
    };
    if value.is_empty() || value.is_none() {
        return false;
    }
    let Some((clip, shapes)) = parse_id_ref(value).and_then(|id| defs.clip_path(id.as_bytes()))
    else {
        return false;
    };

    let mut prefix = Transform::identity();
    if clip.bbox_units {
        match bbox {
            Some(bbox) if !bbox.is_empty() && bbox.width() > 0.0 && bbox.height() > 0.0 => {
                prefix = bbox.unit_transform();
            }
            _ => return false,
        }
    }
    if let Some(transform) = clip.transform {
        prefix = prefix.mul(transform);
    }

    sink.push_clip_path(&ClipPathOutline { shapes, prefix });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, Command, PathSegment};
    use crate::debug::GlyphLog;
    use crate::defs::{DefsSource, collect_defs};
    use crate::types::Color;

    const DOC: &str = r#"<svg>
        <clipPath id="user" transform="translate(1,1)"><rect x="1" width="2" height="2"/></clipPath>
        <clipPath id="box" clipPathUnits="objectBoundingBox"><rect width="0.5" height="1"/></clipPath>
    </svg>"#;

    fn push(value: &str, bbox: Option<Extents>) -> Vec<Command> {
        let defs = collect_defs(&DefsSource {
            doc: DOC.as_bytes(),
            cache: None,
            foreground: Color::BLACK,
            palette: &[],
            log: GlyphLog::default(),
        });
        let mut canvas = Canvas::new();
        if push_clip_path_ref(&mut canvas, &defs, Some(Span::from(value)), bbox.as_ref()) {
            canvas.pop_clip();
        }
        canvas.finish()
    }

    #[test]
    fn user_space_clip_applies_its_own_transform() {
        let ops = push("url(#user)", None);
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            Command::PushClipPath(segments) => {
                assert_eq!(segments[0], PathSegment::MoveTo(2.0, 1.0));
                assert_eq!(segments[1], PathSegment::LineTo(4.0, 1.0));
            }
            other => panic!("expected a clip path, got {other:?}"),
        }
    }

    #[test]
    fn bbox_clips_need_a_usable_bbox() {
        assert!(push("#box", None).is_empty());
        let flat = Extents {
            xmin: 0.0,
            ymin: 0.0,
            xmax: 0.0,
            ymax: 10.0,
        };
        assert!(push("#box", Some(flat)).is_empty());

        let bbox = Extents {
            xmin: 10.0,
            ymin: 10.0,
            xmax: 30.0,
            ymax: 20.0,
        };
        let ops = push("url('#box')", Some(bbox));
        match &ops[0] {
            Command::PushClipPath(segments) => {
                assert_eq!(segments[0], PathSegment::MoveTo(10.0, 10.0));
                assert_eq!(segments[1], PathSegment::LineTo(20.0, 10.0));
                assert_eq!(segments[2], PathSegment::LineTo(20.0, 20.0));
            }
            other => panic!("expected a clip path, got {other:?}"),
        }
    }

    #[test]
    fn unknown_or_disabled_references_push_nothing() {
        assert!(push("none", None).is_empty());
        assert!(push("url(#nope)", None).is_empty());
        assert!(push("", None).is_empty());
    }
}
