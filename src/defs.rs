use std::collections::HashMap;
use std::ops::Range;

use crate::cache::{DocCache, locate_id};
use crate::color::parse_color;
use crate::debug::{EventValue, GlyphLog};
use crate::decycler::Decycler;
use crate::number::{parse_float_clamped01, parse_length, parse_number_or_percent};
use crate::paint::Extend;
use crate::shape::{Shape, parse_shape};
use crate::span::Span;
use crate::style::{StyleProps, hides_itself, parse_id_ref, pick};
use crate::transform::parse_transform;
use crate::types::{Color, Transform};
use crate::xml::{ElementKind, Token, XmlCursor};

const MAX_GRADIENT_STOPS: usize = 1024;
const MAX_HREF_HOPS: usize = 1024;
const MAX_CLIP_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GradientKind {
    Linear,
    Radial,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GradientStop {
    pub offset: f32,
    /// For `currentColor` stops only the alpha (stop-opacity) is meaningful.
    pub color: Color,
    pub is_current_color: bool,
}

/// Gradient attributes as declared on one element. `None` means "not declared here", so a
/// referencing gradient can tell what to take from its `href` target.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct GradientAttrs {
    pub spread: Option<Extend>,
    pub user_space_units: Option<bool>,
    pub transform: Option<Transform>,
    pub x1: Option<f32>,
    pub y1: Option<f32>,
    pub x2: Option<f32>,
    pub y2: Option<f32>,
    pub cx: Option<f32>,
    pub cy: Option<f32>,
    pub r: Option<f32>,
    pub fx: Option<f32>,
    pub fy: Option<f32>,
    pub fr: Option<f32>,
}

impl GradientAttrs {
    /// `nearer`'s declarations win; everything it leaves out comes from `self`.
    fn overlay(self, nearer: &GradientAttrs) -> GradientAttrs {
        GradientAttrs {
            spread: nearer.spread.or(self.spread),
            user_space_units: nearer.user_space_units.or(self.user_space_units),
            transform: nearer.transform.or(self.transform),
            x1: nearer.x1.or(self.x1),
            y1: nearer.y1.or(self.y1),
            x2: nearer.x2.or(self.x2),
            y2: nearer.y2.or(self.y2),
            cx: nearer.cx.or(self.cx),
            cy: nearer.cy.or(self.cy),
            r: nearer.r.or(self.r),
            fx: nearer.fx.or(self.fx),
            fy: nearer.fy.or(self.fy),
            fr: nearer.fr.or(self.fr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradientDef {
    pub kind: GradientKind,
    pub stops: Vec<GradientStop>,
    pub attrs: GradientAttrs,
    pub href: Option<Box<[u8]>>,
}

/// A gradient with its `href` chain folded in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MergedGradient<'r> {
    pub kind: GradientKind,
    pub stops: &'r [GradientStop],
    pub attrs: GradientAttrs,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ClipShape<'a> {
    pub shape: Shape<'a>,
    /// Accumulated transform from the `<clipPath>` element down to the shape.
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClipPathDef {
    pub shapes: Range<usize>,
    pub transform: Option<Transform>,
    pub bbox_units: bool,
}

/// Gradients and clip paths of one document, keyed by owned ids. The first definition of an
/// id wins.
#[derive(Debug, Default)]
pub(crate) struct DefsRegistry<'a> {
    gradients: Vec<GradientDef>,
    gradient_ids: HashMap<Box<[u8]>, usize>,
    clip_paths: Vec<ClipPathDef>,
    clip_ids: HashMap<Box<[u8]>, usize>,
    clip_shapes: Vec<ClipShape<'a>>,
}

impl<'a> DefsRegistry<'a> {
    pub fn gradient_count(&self) -> usize {
        self.gradients.len()
    }

    pub fn clip_path_count(&self) -> usize {
        self.clip_paths.len()
    }

    pub fn gradient(&self, id: &[u8]) -> Option<&GradientDef> {
        self.gradient_ids.get(id).map(|&i| &self.gradients[i])
    }

    pub fn clip_path(&self, id: &[u8]) -> Option<(&ClipPathDef, &[ClipShape<'a>])> {
        let clip = &self.clip_paths[*self.clip_ids.get(id)?];
        Some((clip, &self.clip_shapes[clip.shapes.clone()]))
    }

    fn add_gradient(&mut self, id: Span<'_>, def: GradientDef) {
        if id.is_empty() || self.gradient_ids.contains_key(id.as_bytes()) {
            return;
        }
        self.gradient_ids.insert(id.as_bytes().into(), self.gradients.len());
        self.gradients.push(def);
    }

    fn add_clip_path(&mut self, id: Span<'_>, def: ClipPathDef) {
        if id.is_empty() || self.clip_ids.contains_key(id.as_bytes()) {
            return;
        }
        self.clip_ids.insert(id.as_bytes().into(), self.clip_paths.len());
        self.clip_paths.push(def);
    }

    fn href_target(&self, index: usize) -> Option<usize> {
        let href = self.gradients[index].href.as_deref()?;
        self.gradient_ids.get(href).copied()
    }

    /// Follows `href` from the gradient named `id`, nearest definition first. Each attribute
    /// comes from the nearest definition declaring it; stops come whole from the nearest
    /// definition that has any. A trailing pointer advancing at half speed catches loops
    /// without remembering the chain.
    pub fn resolve_gradient(&self, id: &[u8], log: GlyphLog<'_>) -> Option<MergedGradient<'_>> {
        let first = *self.gradient_ids.get(id)?;
        let nearest = &self.gradients[first];
        let mut merged = MergedGradient {
            kind: nearest.kind,
            stops: &nearest.stops,
            attrs: nearest.attrs,
        };

        let mut current = first;
        let mut trailing = first;
        for hop in 1..MAX_HREF_HOPS {
            let Some(next) = self.href_target(current) else {
                break;
            };
            if hop % 2 == 0 {
                if let Some(t) = self.href_target(trailing) {
                    trailing = t;
                }
            }
            if next == trailing {
                let href = self.gradients[current].href.as_deref().unwrap_or_default();
                log.event("svg.gradient.href_cycle", &[("id", EventValue::Bytes(href))]);
                break;
            }
            let def = &self.gradients[next];
            if merged.stops.is_empty() {
                merged.stops = &def.stops;
            }
            merged.attrs = def.attrs.overlay(&merged.attrs);
            current = next;
        }
        Some(merged)
    }
}

/// Inputs shared by everything that reads definitions out of one document.
#[derive(Clone, Copy)]
pub(crate) struct DefsSource<'a, 'c> {
    pub doc: &'a [u8],
    pub cache: Option<&'c DocCache>,
    pub foreground: Color,
    pub palette: &'c [Color],
    pub log: GlyphLog<'c>,
}

/// Scans the whole document for gradients and clip paths, wherever they appear.
pub(crate) fn collect_defs<'a>(source: &DefsSource<'a, '_>) -> DefsRegistry<'a> {
    let mut registry = DefsRegistry::default();
    let mut cursor = XmlCursor::new(source.doc);
    loop {
        let tok = cursor.next();
        match tok {
            Token::Eof => break,
            Token::OpenTag | Token::SelfCloseTag => match cursor.kind() {
                ElementKind::LinearGradient => {
                    read_gradient(&mut registry, &mut cursor, tok, GradientKind::Linear, source)
                }
                ElementKind::RadialGradient => {
                    read_gradient(&mut registry, &mut cursor, tok, GradientKind::Radial, source)
                }
                ElementKind::ClipPath => read_clip_path(&mut registry, &mut cursor, tok, source),
                _ => {}
            },
            _ => {}
        }
    }
    registry
}

fn read_gradient<'a>(
    registry: &mut DefsRegistry<'a>,
    cursor: &mut XmlCursor<'a>,
    tok: Token,
    kind: GradientKind,
    source: &DefsSource<'a, '_>,
) {
    let props = StyleProps::of(cursor);
    let id = cursor.attr("id").unwrap_or_default();
    let number = |style: Option<Span<'a>>, name: &str| {
        pick(style, cursor, name).and_then(parse_number_or_percent)
    };

    let mut attrs = GradientAttrs {
        spread: pick(props.spread_method, cursor, "spreadMethod").and_then(|v| {
            match v.trim().as_bytes() {
                b"pad" => Some(Extend::Pad),
                b"reflect" => Some(Extend::Reflect),
                b"repeat" => Some(Extend::Repeat),
                _ => None,
            }
        }),
        user_space_units: pick(props.gradient_units, cursor, "gradientUnits").and_then(|v| {
            match v.trim().as_bytes() {
                b"userSpaceOnUse" => Some(true),
                b"objectBoundingBox" => Some(false),
                _ => None,
            }
        }),
        transform: pick(props.gradient_transform, cursor, "gradientTransform")
            .filter(|v| !v.trim().is_empty())
            .map(parse_transform),
        ..GradientAttrs::default()
    };
    match kind {
        GradientKind::Linear => {
            attrs.x1 = number(props.x1, "x1");
            attrs.y1 = number(props.y1, "y1");
            attrs.x2 = number(props.x2, "x2");
            attrs.y2 = number(props.y2, "y2");
        }
        GradientKind::Radial => {
            attrs.cx = number(props.cx, "cx");
            attrs.cy = number(props.cy, "cy");
            attrs.r = number(props.r, "r");
            attrs.fx = number(props.fx, "fx");
            attrs.fy = number(props.fy, "fy");
            attrs.fr = number(props.fr, "fr");
        }
    }
    let href = cursor
        .href()
        .and_then(parse_id_ref)
        .map(|id| Box::<[u8]>::from(id.as_bytes()));

    let mut stops = Vec::new();
    if tok == Token::OpenTag {
        let mut depth = 1usize;
        while depth > 0 {
            match cursor.next() {
                Token::Eof => break,
                Token::CloseTag => depth -= 1,
                child @ (Token::OpenTag | Token::SelfCloseTag) => {
                    if cursor.kind() == ElementKind::Stop && stops.len() < MAX_GRADIENT_STOPS {
                        let previous = stops.last().map_or(0.0, |s: &GradientStop| s.offset);
                        if let Some(stop) = read_stop(cursor, previous, source) {
                            stops.push(stop);
                        }
                    }
                    if child == Token::OpenTag {
                        depth += 1;
                    }
                }
                _ => {}
            }
        }
    }

    registry.add_gradient(
        id,
        GradientDef {
            kind,
            stops,
            attrs,
            href,
        },
    );
}

fn read_stop(
    cursor: &XmlCursor<'_>,
    previous_offset: f32,
    source: &DefsSource<'_, '_>,
) -> Option<GradientStop> {
    let props = StyleProps::of(cursor);
    if hides_itself(cursor, &props) {
        return None;
    }
    let offset = pick(props.offset, cursor, "offset")
        .and_then(parse_number_or_percent)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
        .max(previous_offset);

    let mut color = Color::BLACK;
    let mut is_current_color = false;
    if let Some(value) = pick(props.stop_color, cursor, "stop-color").map(Span::trim) {
        if value.eq_ignore_ascii_case("currentColor") {
            is_current_color = true;
        } else if !value.is_empty() && !value.is_inherit() {
            color = parse_color(value, source.foreground, source.palette)
                .unwrap_or(Color::TRANSPARENT);
        }
    }
    if let Some(value) = pick(props.stop_opacity, cursor, "stop-opacity") {
        if !value.trim().is_empty() && !value.is_inherit() {
            color = color.scale_alpha(parse_float_clamped01(value));
        }
    }

    Some(GradientStop {
        offset,
        color,
        is_current_color,
    })
}

fn read_clip_path<'a>(
    registry: &mut DefsRegistry<'a>,
    cursor: &mut XmlCursor<'a>,
    tok: Token,
    source: &DefsSource<'a, '_>,
) {
    let props = StyleProps::of(cursor);
    let id = cursor.attr("id").unwrap_or_default();
    let bbox_units = cursor
        .attr("clipPathUnits")
        .is_some_and(|v| v.trim().eq_str("objectBoundingBox"));
    let transform = element_transform(cursor, &props);

    let first = registry.clip_shapes.len();
    if tok == Token::OpenTag {
        let decycler = Decycler::new();
        let mut walk = ClipWalk {
            shapes: &mut registry.clip_shapes,
            source,
            decycler: &decycler,
        };
        walk.children(cursor, Transform::identity(), 1);
    }
    let shapes = first..registry.clip_shapes.len();

    registry.add_clip_path(
        id,
        ClipPathDef {
            shapes,
            transform,
            bbox_units,
        },
    );
}

fn element_transform<'a>(cursor: &XmlCursor<'a>, props: &StyleProps<'a>) -> Option<Transform> {
    pick(props.transform, cursor, "transform")
        .filter(|v| !v.trim().is_empty() && !v.is_none() && !v.is_inherit())
        .map(parse_transform)
}

/// Flattens the content of one `<clipPath>` into shapes with absolute transforms.
struct ClipWalk<'w, 'a, 's> {
    shapes: &'w mut Vec<ClipShape<'a>>,
    source: &'w DefsSource<'a, 's>,
    decycler: &'w Decycler,
}

impl<'a> ClipWalk<'_, 'a, '_> {
    /// Consumes children up to the parent's close tag.
    fn children(&mut self, cursor: &mut XmlCursor<'a>, parent: Transform, depth: usize) {
        loop {
            let tok = cursor.next();
            match tok {
                Token::Eof | Token::CloseTag => return,
                Token::OpenTag | Token::SelfCloseTag => {
                    self.element(cursor, tok, parent, depth);
                }
                Token::Text => {}
            }
        }
    }

    /// Handles the element the cursor sits on, consuming its subtree when it is open.
    fn element(&mut self, cursor: &mut XmlCursor<'a>, tok: Token, parent: Transform, depth: usize) {
        let props = StyleProps::of(cursor);
        let kind = cursor.kind();
        let skipped = matches!(
            kind,
            ElementKind::Defs
                | ElementKind::Symbol
                | ElementKind::ClipPath
                | ElementKind::LinearGradient
                | ElementKind::RadialGradient
        );
        if skipped || depth >= MAX_CLIP_DEPTH || hides_itself(cursor, &props) {
            if tok == Token::OpenTag {
                cursor.skip_subtree();
            }
            return;
        }

        let effective = match element_transform(cursor, &props) {
            Some(local) => parent.mul(local),
            None => parent,
        };

        if kind == ElementKind::Use {
            self.use_reference(cursor, &props, effective, depth);
        } else if let Some(shape) = parse_shape(cursor, &props) {
            self.shapes.push(ClipShape {
                shape,
                transform: effective,
            });
        } else if tok == Token::OpenTag && !kind.is_shape() {
            self.children(cursor, effective, depth + 1);
            return;
        }
        if tok == Token::OpenTag {
            cursor.skip_subtree();
        }
    }

    fn use_reference(
        &mut self,
        cursor: &XmlCursor<'a>,
        props: &StyleProps<'a>,
        effective: Transform,
        depth: usize,
    ) {
        let source = self.source;
        let Some(id) = cursor.href().and_then(parse_id_ref) else {
            return;
        };
        let Some(start) = locate_id(source.doc, source.cache, id) else {
            return;
        };
        let decycler = self.decycler;
        let mut node = decycler.node();
        if !node.visit(start) {
            source.log.event(
                "svg.use.cycle",
                &[
                    ("context", EventValue::Str("clip")),
                    ("target", EventValue::Bytes(id.as_bytes())),
                ],
            );
            return;
        }

        let x = pick(props.x, cursor, "x").map_or(0.0, parse_length);
        let y = pick(props.y, cursor, "y").map_or(0.0, parse_length);
        let mut transform = effective;
        if x != 0.0 || y != 0.0 {
            transform = transform.mul(Transform::translate(x, y));
        }

        let mut target = XmlCursor::at(source.doc, start, source.doc.len());
        let tok = target.next();
        if matches!(tok, Token::OpenTag | Token::SelfCloseTag) {
            self.element(&mut target, tok, transform, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::tests::{Recorder, Seg};

    fn collect(doc: &str) -> DefsRegistry<'_> {
        collect_defs(&DefsSource {
            doc: doc.as_bytes(),
            cache: None,
            foreground: Color::BLACK,
            palette: &[],
            log: GlyphLog::default(),
        })
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn href_chain_takes_stops_and_spread_from_target_and_transform_from_referrer() {
        let doc = r##"<svg><defs>
            <linearGradient id="G0" spreadMethod="reflect" x2="0.5">
              <stop offset="0" stop-color="red"/>
              <stop offset="1" stop-color="blue"/>
            </linearGradient>
            <linearGradient id="G1" href="#G0" gradientTransform="translate(3,4)"/>
        </defs></svg>"##;
        let defs = collect(doc);
        assert_eq!(defs.gradient_count(), 2);
        let merged = defs
            .resolve_gradient(b"G1", GlyphLog::default())
            .expect("G1 resolves");
        assert_eq!(merged.kind, GradientKind::Linear);
        assert_eq!(merged.stops.len(), 2);
        assert_eq!(merged.stops[0].color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(merged.stops[1].color, Color::rgb(0.0, 0.0, 1.0));
        assert_eq!(merged.attrs.spread, Some(Extend::Reflect));
        assert_eq!(merged.attrs.transform, Some(Transform::translate(3.0, 4.0)));
        assert_eq!(merged.attrs.x2, Some(0.5));
    }

    #[test]
    fn nearer_stops_replace_inherited_ones_whole() {
        let doc = r##"<svg>
            <radialGradient id="base" r="0.25"><stop offset="0"/><stop offset="1"/></radialGradient>
            <linearGradient id="top" xlink:href="#base"><stop offset="0.5" stop-color="#0f0"/></linearGradient>
        </svg>"##;
        let defs = collect(doc);
        let merged = defs
            .resolve_gradient(b"top", GlyphLog::default())
            .expect("top resolves");
        assert_eq!(merged.kind, GradientKind::Linear);
        assert_eq!(merged.stops.len(), 1);
        assert!(close(merged.stops[0].offset, 0.5));
        assert_eq!(merged.attrs.r, Some(0.25));
    }

    #[test]
    fn stops_are_clamped_monotonic_and_skip_hidden_ones() {
        let doc = r#"<linearGradient id="g">
            <stop offset="40%" stop-color="currentColor" stop-opacity="0.5"/>
            <stop offset="0.2" style="stop-color:#ff0000;stop-opacity:2"/>
            <stop offset="0.9" style="display:none"/>
            <stop offset="7" visibility="hidden"/>
            <stop offset="7" stop-color="none"></stop>
            <stop offset="1" stop-color="inherit"/>
        </linearGradient>"#;
        let defs = collect(doc);
        let stops = &defs.gradient(b"g").expect("g").stops;
        assert_eq!(stops.len(), 4);
        assert!(close(stops[0].offset, 0.4));
        assert!(stops[0].is_current_color);
        assert!(close(stops[0].color.a, 0.5));
        assert!(close(stops[1].offset, 0.4));
        assert_eq!(stops[1].color, Color::rgb(1.0, 0.0, 0.0));
        assert!(close(stops[2].offset, 1.0));
        assert_eq!(stops[2].color, Color::TRANSPARENT);
        assert_eq!(stops[3].color, Color::BLACK);
    }

    #[test]
    fn href_cycles_terminate() {
        let doc = r##"<svg>
            <linearGradient id="a" href="#b" x1="0.1"/>
            <linearGradient id="b" href="#a"><stop offset="0"/></linearGradient>
        </svg>"##;
        let defs = collect(doc);
        let merged = defs.resolve_gradient(b"a", GlyphLog::default()).expect("a");
        assert_eq!(merged.stops.len(), 1);
        assert_eq!(merged.attrs.x1, Some(0.1));
        assert!(defs.resolve_gradient(b"missing", GlyphLog::default()).is_none());
    }

    #[test]
    fn first_definition_of_an_id_wins() {
        let doc = r#"<svg>
            <linearGradient id="dup" x1="1"/>
            <linearGradient id="dup" x1="2"/>
            <clipPath id="dup"><rect width="1" height="1"/></clipPath>
            <clipPath id="dup"><rect width="2" height="2"/><rect width="3" height="3"/></clipPath>
            <linearGradient x1="3"/>
        </svg>"#;
        let defs = collect(doc);
        assert_eq!(defs.gradient_count(), 1);
        assert_eq!(defs.clip_path_count(), 1);
        assert_eq!(defs.gradient(b"dup").expect("dup").attrs.x1, Some(1.0));
        let (clip, shapes) = defs.clip_path(b"dup").expect("clip");
        assert_eq!(shapes.len(), 1);
        assert_eq!(clip.shapes, 0..1);
    }

    #[test]
    fn clip_paths_flatten_groups_and_uses_with_absolute_transforms() {
        let doc = r##"<svg>
            <defs><rect id="unit" width="1" height="1" transform="scale(2)"/></defs>
            <clipPath id="c" clipPathUnits="objectBoundingBox" transform="scale(3)">
              <g transform="translate(10,0)">
                <circle r="1"/>
                <g style="display:none"><rect width="5" height="5"/></g>
                <use href="#unit" x="1" y="2"/>
              </g>
              <defs><rect width="9" height="9"/></defs>
              <rect width="0" height="4"/>
            </clipPath>
        </svg>"##;
        let defs = collect(doc);
        let (clip, shapes) = defs.clip_path(b"c").expect("clip c");
        assert!(clip.bbox_units);
        assert_eq!(clip.transform, Some(Transform::scale(3.0, 3.0)));
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].transform, Transform::translate(10.0, 0.0));
        assert!(matches!(shapes[0].shape, Shape::Ellipse { .. }));
        assert_eq!(
            shapes[1].transform,
            Transform::new(2.0, 0.0, 0.0, 2.0, 11.0, 2.0)
        );

        let mut rec = Recorder::default();
        shapes[1].shape.emit(&mut rec);
        assert_eq!(rec.segs[0], Seg::Move(0.0, 0.0));
    }

    #[test]
    fn clip_use_offsets_may_come_from_style() {
        let doc = r##"<svg>
            <defs><rect id="unit" width="1" height="1"/></defs>
            <clipPath id="c"><use href="#unit" x="9" y="9" style="x: 1; y: 2"/></clipPath>
        </svg>"##;
        let defs = collect(doc);
        let (_, shapes) = defs.clip_path(b"c").expect("clip c");
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].transform, Transform::translate(1.0, 2.0));
    }

    #[test]
    fn clip_use_through_containers_stops_at_cycles() {
        let doc = r##"<svg>
            <g id="loop"><rect width="1" height="1"/><use href="#loop"/></g>
            <clipPath id="c"><use href="#loop"/></clipPath>
        </svg>"##;
        let defs = collect(doc);
        let (_, shapes) = defs.clip_path(b"c").expect("clip c");
        assert_eq!(shapes.len(), 1);
    }
}
