use crate::cache::DocCache;
use crate::clip::push_clip_path_ref;
use crate::debug::{DebugLogger, EventValue, GlyphLog};
use crate::decycler::Decycler;
use crate::defs::{DefsRegistry, DefsSource, collect_defs};
use crate::error::SvgGlyphError;
use crate::fill::{FillContext, emit_fill};
use crate::metrics::RenderStats;
use crate::number::parse_length;
use crate::paint::{ClipOutline, ColorLine, CompositeMode, PaintSink};
use crate::perf::{PerfLogger, SpanTimer};
use crate::shape::{Shape, parse_shape};
use crate::span::Span;
use crate::style::{Cascade, ElementStyle, StyleProps, pick, resolve_element_style};
use crate::transform::parse_transform;
use crate::types::{Color, Transform};
use crate::viewport::{ViewBox, viewbox_transform};
use crate::xml::{ElementKind, Token, XmlCursor, scan_for_id};

pub(crate) const MAX_RENDER_DEPTH: usize = 32;

/// Font space is y-up, SVG is y-down.
pub(crate) const FLIP_Y: Transform = Transform::new(1.0, 0.0, 0.0, -1.0, 0.0, 0.0);

/// Everything one glyph render reads.
pub(crate) struct GlyphRequest<'a, 'c> {
    pub doc: &'a [u8],
    pub glyph: u32,
    pub cache: Option<&'c DocCache>,
    pub foreground: Color,
    pub palette: &'c [Color],
    pub root_transform: Option<Transform>,
    pub flip_y: bool,
    pub debug: Option<&'c DebugLogger>,
    pub perf: Option<&'c PerfLogger>,
}

/// Forwards to the backend while counting paints and open stack frames.
pub(crate) struct TrackedSink<'s> {
    inner: &'s mut dyn PaintSink,
    transforms: usize,
    clips: usize,
    groups: usize,
    paint_calls: usize,
}

impl<'s> TrackedSink<'s> {
    fn new(inner: &'s mut dyn PaintSink) -> Self {
        Self {
            inner,
            transforms: 0,
            clips: 0,
            groups: 0,
            paint_calls: 0,
        }
    }

    fn depths(&self) -> (usize, usize, usize) {
        (self.transforms, self.clips, self.groups)
    }
}

impl PaintSink for TrackedSink<'_> {
    fn push_transform(&mut self, transform: Transform) {
        self.transforms += 1;
        self.inner.push_transform(transform);
    }

    fn pop_transform(&mut self) {
        self.transforms = self.transforms.saturating_sub(1);
        self.inner.pop_transform();
    }

    fn push_clip_glyph(&mut self, glyph: u32) {
        self.clips += 1;
        self.inner.push_clip_glyph(glyph);
    }

    fn push_clip_rectangle(&mut self, xmin: f32, ymin: f32, xmax: f32, ymax: f32) {
        self.clips += 1;
        self.inner.push_clip_rectangle(xmin, ymin, xmax, ymax);
    }

    fn push_clip_path(&mut self, outline: &dyn ClipOutline) {
        self.clips += 1;
        self.inner.push_clip_path(outline);
    }

    fn pop_clip(&mut self) {
        self.clips = self.clips.saturating_sub(1);
        self.inner.pop_clip();
    }

    fn solid_color(&mut self, color: Color) {
        self.paint_calls += 1;
        self.inner.solid_color(color);
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
        self.paint_calls += 1;
        self.inner.linear_gradient(line, x0, y0, x1, y1, x2, y2);
    }

    fn radial_gradient(
        &mut self,
        line: &dyn ColorLine,
        x0: f32,
        y0: f32,
        r0: f32,
        x1: f32,
        y1: f32,
        r1: f32,
    ) {
        self.paint_calls += 1;
        self.inner.radial_gradient(line, x0, y0, r0, x1, y1, r1);
    }

    fn push_group(&mut self) {
        self.groups += 1;
        self.inner.push_group();
    }

    fn pop_group(&mut self, mode: CompositeMode, opacity: f32) {
        self.groups = self.groups.saturating_sub(1);
        self.inner.pop_group(mode, opacity);
    }
}

/// Recursive element renderer for one glyph.
pub(crate) struct Renderer<'r, 'a> {
    pub(crate) doc: &'a [u8],
    pub(crate) cache: Option<&'r DocCache>,
    defs: &'r DefsRegistry<'a>,
    palette: &'r [Color],
    pub(crate) log: GlyphLog<'r>,
    pub(crate) sink: TrackedSink<'r>,
    pub(crate) use_decycler: &'r Decycler,
    depth: usize,
    pub(crate) suppress_viewbox_once: bool,
    pub(crate) allow_symbol_once: bool,
    pub(crate) stats: RenderStats,
}

impl<'r, 'a> Renderer<'r, 'a> {
    /// Renders the element the cursor sits on (just read as `tok`) and consumes its subtree.
    pub(crate) fn render_element(
        &mut self,
        cursor: &mut XmlCursor<'a>,
        tok: Token,
        inherited: &Cascade<'a>,
    ) {
        let open = tok == Token::OpenTag;
        self.stats.elements += 1;
        // Everything at the limit is dropped, leaf shapes included.
        if self.depth >= MAX_RENDER_DEPTH {
            self.stats.depth_limit_hits += 1;
            self.log.event(
                "svg.depth_limit",
                &[
                    ("tag", EventValue::Bytes(cursor.tag_name().as_bytes())),
                    ("offset", EventValue::Int(cursor.tag_start() as i64)),
                ],
            );
            if open {
                cursor.skip_subtree();
            }
            return;
        }

        let entry_depths = self.sink.depths();
        self.depth += 1;

        let props = StyleProps::of(cursor);
        let style = resolve_element_style(cursor, &props, inherited, self.palette);
        let kind = cursor.kind();
        let blocked_symbol = kind == ElementKind::Symbol && !self.allow_symbol_once;

        if style.is_hidden() || blocked_symbol {
            if open {
                cursor.skip_subtree();
            }
        } else if kind.is_container() {
            if kind == ElementKind::Symbol {
                self.allow_symbol_once = false;
            }
            self.render_container(cursor, open, &style, &props);
        } else {
            if kind.is_shape() {
                if let Some(shape) = parse_shape(cursor, &props) {
                    self.render_shape(&shape, &style);
                }
            } else if kind == ElementKind::Use {
                self.render_use(cursor, &style, &props);
            }
            if open {
                cursor.skip_subtree();
            }
        }

        self.depth -= 1;
        debug_assert_eq!(self.sink.depths(), entry_depths, "unbalanced paint stack");
    }

    pub(crate) fn begin_element(&mut self, style: &ElementStyle<'a>) -> (bool, bool) {
        let group = style.cascade.opacity < 1.0;
        if group {
            self.sink.push_group();
        }
        let transform = style.transform.map(parse_transform);
        if let Some(transform) = transform {
            self.sink.push_transform(transform);
        }
        (group, transform.is_some())
    }

    pub(crate) fn end_element(&mut self, style: &ElementStyle<'a>, (group, transform): (bool, bool)) {
        if transform {
            self.sink.pop_transform();
        }
        if group {
            self.sink
                .pop_group(CompositeMode::SrcOver, style.cascade.opacity);
        }
    }

    fn render_container(
        &mut self,
        cursor: &mut XmlCursor<'a>,
        open: bool,
        style: &ElementStyle<'a>,
        props: &StyleProps<'a>,
    ) {
        let kind = cursor.kind();
        let mut svg_translate = None;
        let mut viewbox = None;
        if matches!(kind, ElementKind::Svg | ElementKind::Symbol) {
            if kind == ElementKind::Svg {
                let x = pick(props.x, cursor, "x").map_or(0.0, parse_length);
                let y = pick(props.y, cursor, "y").map_or(0.0, parse_length);
                if x != 0.0 || y != 0.0 {
                    svg_translate = Some(Transform::translate(x, y));
                }
            }
            if let Some(vb) = ViewBox::of(cursor) {
                let mapped = if kind == ElementKind::Svg {
                    let mut width = pick(props.width, cursor, "width").map_or(0.0, parse_length);
                    let mut height =
                        pick(props.height, cursor, "height").map_or(0.0, parse_length);
                    if !(width > 0.0 && height > 0.0) {
                        width = vb.width;
                        height = vb.height;
                    }
                    viewbox_transform(width, height, vb, cursor.attr("preserveAspectRatio"))
                } else {
                    None
                };
                viewbox = mapped.or(Some(Transform::translate(-vb.x, -vb.y)));
            }
        }
        if self.suppress_viewbox_once {
            viewbox = None;
            self.suppress_viewbox_once = false;
        }

        let frame = self.begin_element(style);
        for transform in [svg_translate, viewbox].iter().flatten() {
            self.sink.push_transform(*transform);
        }
        let clipped = push_clip_path_ref(&mut self.sink, self.defs, style.cascade.clip_path, None);

        if open {
            loop {
                let tok = cursor.next();
                match tok {
                    Token::Eof | Token::CloseTag => break,
                    Token::OpenTag | Token::SelfCloseTag => {
                        self.render_element(cursor, tok, &style.cascade)
                    }
                    Token::Text => {}
                }
            }
        }

        if clipped {
            self.sink.pop_clip();
        }
        for _ in [svg_translate, viewbox].iter().flatten() {
            self.sink.pop_transform();
        }
        self.end_element(style, frame);
    }

    fn render_shape(&mut self, shape: &Shape<'a>, style: &ElementStyle<'a>) {
        self.stats.shapes += 1;
        let frame = self.begin_element(style);

        let bbox = shape.bbox();
        let clipped =
            push_clip_path_ref(&mut self.sink, self.defs, style.cascade.clip_path, Some(&bbox));
        self.sink.push_clip_path(shape);

        let state = &style.cascade;
        match state.fill {
            None => self.sink.solid_color(Color::BLACK.scale_alpha(state.fill_opacity)),
            Some(fill) => {
                let ctx = FillContext {
                    defs: self.defs,
                    palette: self.palette,
                    log: self.log,
                };
                emit_fill(
                    &mut self.sink,
                    &ctx,
                    fill,
                    state.fill_opacity,
                    Some(&bbox),
                    state.color,
                );
            }
        }

        self.sink.pop_clip();
        if clipped {
            self.sink.pop_clip();
        }
        self.end_element(style, frame);
    }
}

/// Locates `glyph<N>` in the document and renders it. Fails only when the glyph has no
/// element; everything inside the element degrades silently.
pub(crate) fn render_glyph(
    sink: &mut dyn PaintSink,
    request: &GlyphRequest<'_, '_>,
) -> Result<RenderStats, SvgGlyphError> {
    let _timer = SpanTimer::start(request.perf, "svg.render_glyph", Some(request.glyph));
    let log = GlyphLog::new(request.debug, Some(request.glyph));
    let doc = request.doc;

    let defs = {
        let _timer = SpanTimer::start(request.perf, "svg.defs.collect", Some(request.glyph));
        collect_defs(&DefsSource {
            doc,
            cache: request.cache,
            foreground: request.foreground,
            palette: request.palette,
            log,
        })
    };

    let mut cache_hit = false;
    let start = match request
        .cache
        .and_then(|cache| cache.glyph_span(request.glyph))
        .filter(|span| span.start < span.end && span.end <= doc.len())
    {
        Some(span) => {
            cache_hit = true;
            Some(span.start)
        }
        None => {
            log.event(
                "svg.cache.fallback",
                &[("cached", EventValue::Int(i64::from(request.cache.is_some())))],
            );
            let id = format!("glyph{}", request.glyph);
            scan_for_id(doc, Span::from(id.as_str()))
        }
    };

    let mut cursor = XmlCursor::at(doc, start.unwrap_or(doc.len()), doc.len());
    let tok = cursor.next();
    if start.is_none() || !matches!(tok, Token::OpenTag | Token::SelfCloseTag) {
        log.event("svg.glyph.missing", &[]);
        return Err(SvgGlyphError::GlyphNotFound(request.glyph));
    }

    let use_decycler = Decycler::new();
    let mut renderer = Renderer {
        doc,
        cache: request.cache,
        defs: &defs,
        palette: request.palette,
        log,
        sink: TrackedSink::new(sink),
        use_decycler: &use_decycler,
        depth: 0,
        suppress_viewbox_once: false,
        allow_symbol_once: false,
        stats: RenderStats {
            glyph: request.glyph,
            cache_hit,
            ..RenderStats::default()
        },
    };

    let roots = [
        request.root_transform,
        request.flip_y.then_some(FLIP_Y),
    ];
    for transform in roots.iter().flatten() {
        renderer.sink.push_transform(*transform);
    }
    renderer.render_element(&mut cursor, tok, &Cascade::initial(request.foreground));
    for _ in roots.iter().flatten() {
        renderer.sink.pop_transform();
    }

    let mut stats = renderer.stats;
    stats.paint_calls = renderer.sink.paint_calls;
    if let Some(perf) = request.perf {
        perf.log_counts(
            "svg.render_glyph",
            Some(request.glyph),
            &[
                ("elements", stats.elements as u64),
                ("shapes", stats.shapes as u64),
                ("paint_calls", stats.paint_calls as u64),
            ],
        );
    }
    Ok(stats)
}
