use crate::cache::locate_id;
use crate::debug::EventValue;
use crate::number::parse_length;
use crate::paint::PaintSink;
use crate::render::Renderer;
use crate::style::{ElementStyle, StyleProps, parse_id_ref, pick};
use crate::types::Transform;
use crate::viewport::use_target_transform;
use crate::xml::{ElementKind, Token, XmlCursor};

impl<'r, 'a> Renderer<'r, 'a> {
    /// Renders the element a `<use>` points at, offset by the use's `x`/`y`. A `<symbol>`
    /// target renders only through this path; an `<svg>` or `<symbol>` target is sized by the
    /// use's `width`/`height`.
    pub(crate) fn render_use(
        &mut self,
        cursor: &XmlCursor<'a>,
        style: &ElementStyle<'a>,
        props: &StyleProps<'a>,
    ) {
        let Some(id) = cursor.href().and_then(parse_id_ref) else {
            return;
        };
        let Some(start) = locate_id(self.doc, self.cache, id) else {
            self.log.event(
                "svg.use.unresolved",
                &[("target", EventValue::Bytes(id.as_bytes()))],
            );
            return;
        };

        let decycler = self.use_decycler;
        let mut node = decycler.node();
        if !node.visit(start) {
            self.stats.use_cycles += 1;
            self.log.event(
                "svg.use.cycle",
                &[
                    ("context", EventValue::Str("render")),
                    ("target", EventValue::Bytes(id.as_bytes())),
                ],
            );
            return;
        }

        let mut target = XmlCursor::at(self.doc, start, self.doc.len());
        let tok = target.next();
        if !matches!(tok, Token::OpenTag | Token::SelfCloseTag) {
            return;
        }
        let target_kind = target.kind();

        let length = |value: Option<_>| value.map_or(0.0, parse_length);
        let x = length(pick(props.x, cursor, "x"));
        let y = length(pick(props.y, cursor, "y"));
        let width = length(pick(props.width, cursor, "width"));
        let height = length(pick(props.height, cursor, "height"));

        let offset = (x != 0.0 || y != 0.0).then(|| Transform::translate(x, y));
        let viewport = use_target_transform(width, height, &target);

        let frame = self.begin_element(style);
        for transform in [offset, viewport].iter().flatten() {
            self.sink.push_transform(*transform);
        }

        let saved = (self.suppress_viewbox_once, self.allow_symbol_once);
        if viewport.is_some() {
            self.suppress_viewbox_once = true;
        }
        if target_kind == ElementKind::Symbol {
            self.allow_symbol_once = true;
        }

        let mut cascade = style.cascade;
        cascade.opacity = 1.0;
        self.render_element(&mut target, tok, &cascade);

        (self.suppress_viewbox_once, self.allow_symbol_once) = saved;
        for _ in [offset, viewport].iter().flatten() {
            self.sink.pop_transform();
        }
        self.end_element(style, frame);
    }
}

#[cfg(test)]
mod tests {
    use crate::canvas::{Canvas, Command};
    use crate::metrics::RenderStats;
    use crate::render::{GlyphRequest, render_glyph};
    use crate::types::{Color, Transform};

    fn render(doc: &str, glyph: u32) -> (Vec<Command>, RenderStats) {
        let mut canvas = Canvas::new();
        let stats = render_glyph(
            &mut canvas,
            &GlyphRequest {
                doc: doc.as_bytes(),
                glyph,
                cache: None,
                foreground: Color::BLACK,
                palette: &[],
                root_transform: None,
                flip_y: false,
                debug: None,
                perf: None,
            },
        )
        .expect("glyph renders");
        assert!(canvas.is_balanced());
        (canvas.finish(), stats)
    }

    fn solid_count(ops: &[Command]) -> usize {
        ops.iter()
            .filter(|op| matches!(op, Command::SolidColor(_)))
            .count()
    }

    #[test]
    fn use_offsets_its_target() {
        let doc = r##"<svg><defs><rect id="r" width="1" height="1"/></defs>
            <g id="glyph1"><use href="#r" x="3" y="4"/><use xlink:href="#r"/></g></svg>"##;
        let (ops, _) = render(doc, 1);
        assert_eq!(solid_count(&ops), 2);
        assert_eq!(ops[0], Command::PushTransform(Transform::translate(3.0, 4.0)));
    }

    #[test]
    fn self_references_stop_at_the_cycle() {
        let doc = r##"<g id="glyph2"><rect width="1" height="1"/><use href="#glyph2"/></g>"##;
        let (ops, stats) = render(doc, 2);
        assert_eq!(stats.use_cycles, 1);
        assert_eq!(solid_count(&ops), 2);
    }

    #[test]
    fn mutual_references_terminate() {
        let doc = r##"<svg>
            <g id="a"><rect width="1" height="1"/><use href="#b"/></g>
            <g id="b"><use href="#a"/></g>
            <use id="glyph3" href="#a"/>
        </svg>"##;
        let (_, stats) = render(doc, 3);
        assert!(stats.use_cycles >= 1);
        assert!(stats.shapes < 64);
    }

    #[test]
    fn symbols_render_only_through_use() {
        let doc = r##"<svg>
            <symbol id="s" viewBox="0 0 10 10"><rect width="10" height="10" fill="#0000ff"/></symbol>
            <g id="glyph4"><use href="#s" width="20" height="20"/></g>
            <g id="glyph5"><symbol viewBox="0 0 1 1"><rect width="1" height="1"/></symbol></g>
        </svg>"##;
        let (ops, _) = render(doc, 4);
        assert_eq!(solid_count(&ops), 1);
        assert_eq!(
            ops[0],
            Command::PushTransform(Transform::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0))
        );
        // The symbol's own viewBox is not applied a second time.
        let pushes = ops
            .iter()
            .filter(|op| matches!(op, Command::PushTransform(_)))
            .count();
        assert_eq!(pushes, 1);

        let (ops, _) = render(doc, 5);
        assert_eq!(solid_count(&ops), 0);
    }

    #[test]
    fn svg_targets_drop_their_own_viewbox_once() {
        let doc = r##"<svg>
            <svg id="inner" width="40" height="40" viewBox="0 0 10 10">
              <svg width="10" height="10" viewBox="0 0 5 5"><rect width="1" height="1"/></svg>
            </svg>
            <use id="glyph8" href="#inner" width="20" height="20"/>
        </svg>"##;
        let (ops, _) = render(doc, 8);
        let pushes: Vec<&Command> = ops
            .iter()
            .filter(|op| matches!(op, Command::PushTransform(_)))
            .collect();
        let scale_two = Command::PushTransform(Transform::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0));
        // The use viewport replaces the target's 4x mapping; the nested svg keeps its own.
        assert_eq!(pushes, vec![&scale_two, &scale_two]);
        assert_eq!(solid_count(&ops), 1);
    }

    #[test]
    fn use_opacity_groups_the_referenced_content() {
        let doc = r##"<svg><path id="p" d="M0 0H1V1Z"/><use id="glyph6" href="#p" opacity="0.25"/></svg>"##;
        let (ops, _) = render(doc, 6);
        assert_eq!(ops[0], Command::PushGroup);
        assert_eq!(
            ops.iter()
                .filter(|op| matches!(op, Command::PushGroup))
                .count(),
            1
        );
    }

    #[test]
    fn dangling_references_render_nothing() {
        let doc = r##"<g id="glyph7"><use href="#nowhere"/><use/></g>"##;
        let (ops, stats) = render(doc, 7);
        assert!(ops.is_empty());
        assert_eq!(stats.use_cycles, 0);
    }
}
