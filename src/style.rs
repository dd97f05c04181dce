use crate::color::parse_color;
use crate::number::parse_float_clamped01;
use crate::span::Span;
use crate::types::Color;
use crate::xml::XmlCursor;

/// Declarations from an element's `style` attribute, one slot per recognized property.
/// A declared-but-empty value is still `Some` and still overrides the attribute.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StyleProps<'a> {
    pub fill: Option<Span<'a>>,
    pub fill_opacity: Option<Span<'a>>,
    pub opacity: Option<Span<'a>>,
    pub transform: Option<Span<'a>>,
    pub clip_path: Option<Span<'a>>,
    pub display: Option<Span<'a>>,
    pub color: Option<Span<'a>>,
    pub visibility: Option<Span<'a>>,
    pub offset: Option<Span<'a>>,
    pub stop_color: Option<Span<'a>>,
    pub stop_opacity: Option<Span<'a>>,
    pub spread_method: Option<Span<'a>>,
    pub gradient_units: Option<Span<'a>>,
    pub gradient_transform: Option<Span<'a>>,
    pub x: Option<Span<'a>>,
    pub y: Option<Span<'a>>,
    pub width: Option<Span<'a>>,
    pub height: Option<Span<'a>>,
    pub cx: Option<Span<'a>>,
    pub cy: Option<Span<'a>>,
    pub r: Option<Span<'a>>,
    pub rx: Option<Span<'a>>,
    pub ry: Option<Span<'a>>,
    pub fx: Option<Span<'a>>,
    pub fy: Option<Span<'a>>,
    pub fr: Option<Span<'a>>,
    pub x1: Option<Span<'a>>,
    pub y1: Option<Span<'a>>,
    pub x2: Option<Span<'a>>,
    pub y2: Option<Span<'a>>,
    pub points: Option<Span<'a>>,
    pub d: Option<Span<'a>>,
}

impl<'a> StyleProps<'a> {
    pub fn of(cursor: &XmlCursor<'a>) -> Self {
        Self::parse(cursor.attr("style"))
    }

    /// Single pass over `name: value;` pairs; later declarations win.
    pub fn parse(style: Option<Span<'a>>) -> Self {
        let mut out = Self::default();
        let Some(style) = style else {
            return out;
        };
        for decl in style.as_bytes().split(|&b| b == b';') {
            let Some(colon) = decl.iter().position(|&b| b == b':') else {
                continue;
            };
            let name = Span::new(&decl[..colon]).trim();
            let value = Span::new(&decl[colon + 1..]).trim();
            if name.is_empty() {
                continue;
            }
            if let Some(slot) = out.slot(name) {
                *slot = Some(value);
            }
        }
        out
    }

    fn slot(&mut self, name: Span<'_>) -> Option<&mut Option<Span<'a>>> {
        let is = |candidate: &str| name.eq_ignore_ascii_case(candidate);
        let slot = if is("fill") {
            &mut self.fill
        } else if is("fill-opacity") {
            &mut self.fill_opacity
        } else if is("opacity") {
            &mut self.opacity
        } else if is("transform") {
            &mut self.transform
        } else if is("clip-path") {
            &mut self.clip_path
        } else if is("display") {
            &mut self.display
        } else if is("color") {
            &mut self.color
        } else if is("visibility") {
            &mut self.visibility
        } else if is("offset") {
            &mut self.offset
        } else if is("stop-color") {
            &mut self.stop_color
        } else if is("stop-opacity") {
            &mut self.stop_opacity
        } else if is("spreadMethod") || is("spread-method") {
            &mut self.spread_method
        } else if is("gradientUnits") || is("gradient-units") {
            &mut self.gradient_units
        } else if is("gradientTransform") || is("gradient-transform") {
            &mut self.gradient_transform
        } else {
            match name.as_bytes().to_ascii_lowercase().as_slice() {
                b"x" => &mut self.x,
                b"y" => &mut self.y,
                b"width" => &mut self.width,
                b"height" => &mut self.height,
                b"cx" => &mut self.cx,
                b"cy" => &mut self.cy,
                b"r" => &mut self.r,
                b"rx" => &mut self.rx,
                b"ry" => &mut self.ry,
                b"fx" => &mut self.fx,
                b"fy" => &mut self.fy,
                b"fr" => &mut self.fr,
                b"x1" => &mut self.x1,
                b"y1" => &mut self.y1,
                b"x2" => &mut self.x2,
                b"y2" => &mut self.y2,
                b"points" => &mut self.points,
                b"d" => &mut self.d,
                _ => return None,
            }
        };
        Some(slot)
    }
}

/// Style declaration when present, else the presentation attribute.
pub(crate) fn pick<'a>(
    style: Option<Span<'a>>,
    cursor: &XmlCursor<'a>,
    attr: &str,
) -> Option<Span<'a>> {
    style.or_else(|| cursor.attr(attr))
}

/// Inherited paint state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cascade<'a> {
    pub fill: Option<Span<'a>>,
    pub fill_opacity: f32,
    /// Group opacity declared on the current element; never inherited past it.
    pub opacity: f32,
    pub clip_path: Option<Span<'a>>,
    pub color: Color,
    pub visible: bool,
}

impl<'a> Cascade<'a> {
    pub fn initial(foreground: Color) -> Self {
        Self {
            fill: None,
            fill_opacity: 1.0,
            opacity: 1.0,
            clip_path: None,
            color: foreground,
            visible: true,
        }
    }
}

/// Result of applying one element's declarations on top of its parent's cascade.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ElementStyle<'a> {
    pub cascade: Cascade<'a>,
    pub transform: Option<Span<'a>>,
    pub display_none: bool,
}

impl ElementStyle<'_> {
    pub fn is_hidden(&self) -> bool {
        self.display_none || !self.cascade.visible
    }
}

pub(crate) fn resolve_element_style<'a>(
    cursor: &XmlCursor<'a>,
    props: &StyleProps<'a>,
    inherited: &Cascade<'a>,
    palette: &[Color],
) -> ElementStyle<'a> {
    let fill = pick(props.fill, cursor, "fill");
    let fill_opacity = pick(props.fill_opacity, cursor, "fill-opacity");
    let opacity = pick(props.opacity, cursor, "opacity");
    let transform = pick(props.transform, cursor, "transform");
    let clip_path = pick(props.clip_path, cursor, "clip-path");
    let display = pick(props.display, cursor, "display");
    let color = pick(props.color, cursor, "color");
    let visibility = pick(props.visibility, cursor, "visibility");

    let mut state = *inherited;
    state.fill = match fill {
        Some(v) if !v.is_inherit() => Some(v),
        _ => inherited.fill,
    };
    state.fill_opacity = match fill_opacity {
        Some(v) if !v.is_empty() && !v.is_inherit() => parse_float_clamped01(v),
        _ => inherited.fill_opacity,
    };
    state.opacity = match opacity {
        Some(v) if v.is_inherit() => inherited.opacity,
        Some(v) if !v.is_empty() && !v.is_none() => parse_float_clamped01(v),
        _ => 1.0,
    };
    state.clip_path = match clip_path {
        Some(v) if !v.is_inherit() => Some(v),
        _ => inherited.clip_path,
    };
    if let Some(v) = color.map(Span::trim) {
        if !v.is_empty() && !v.is_inherit() {
            // `color: none` resolves to transparent.
            state.color = parse_color(v, inherited.color, palette).unwrap_or(Color::TRANSPARENT);
        }
    }
    if let Some(v) = visibility.map(Span::trim) {
        if !v.is_empty() && !v.is_inherit() {
            state.visible =
                !(v.eq_ignore_ascii_case("hidden") || v.eq_ignore_ascii_case("collapse"));
        }
    }

    let transform = transform.filter(|t| !t.is_empty() && !t.is_inherit() && !t.is_none());
    let display_none = display.is_some_and(Span::is_none);

    ElementStyle {
        cascade: state,
        transform,
        display_none,
    }
}

/// `display:none` or `visibility:hidden|collapse` declared on the element itself.
pub(crate) fn hides_itself<'a>(cursor: &XmlCursor<'a>, props: &StyleProps<'a>) -> bool {
    let display = pick(props.display, cursor, "display");
    let visibility = pick(props.visibility, cursor, "visibility").map(Span::trim);
    display.is_some_and(Span::is_none)
        || visibility.is_some_and(|v| {
            v.eq_ignore_ascii_case("hidden") || v.eq_ignore_ascii_case("collapse")
        })
}

/// Extracts the local id from `#id` or `url(#id)` (optionally quoted).
pub(crate) fn parse_id_ref(value: Span<'_>) -> Option<Span<'_>> {
    let value = value.trim();
    let bytes = value.as_bytes();
    if let Some(rest) = bytes.strip_prefix(b"#") {
        return (!rest.is_empty()).then(|| Span::new(rest));
    }
    if !value.starts_with_ignore_ascii_case("url(") {
        return None;
    }

    let inner = &bytes[4..];
    let mut quote: Option<u8> = None;
    let mut close = None;
    for (i, &b) in inner.iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b')' => {
                close = Some(i);
                break;
            }
            None => {}
        }
    }
    let mut id = inner[..close?].trim_ascii();
    if id.len() >= 2
        && ((id[0] == b'\'' && id[id.len() - 1] == b'\'')
            || (id[0] == b'"' && id[id.len() - 1] == b'"'))
    {
        id = id[1..id.len() - 1].trim_ascii();
    }
    let id = id.strip_prefix(b"#").unwrap_or(id);
    (!id.is_empty()).then(|| Span::new(id))
}

/// Text following the closing `)` of a `url(...)` paint, trimmed.
pub(crate) fn paint_fallback(value: Span<'_>) -> Option<Span<'_>> {
    let bytes = value.as_bytes();
    let close = bytes.iter().position(|&b| b == b')')?;
    let rest = Span::new(&bytes[close + 1..]).trim();
    (!rest.is_empty()).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::Token;

    fn open(doc: &str) -> XmlCursor<'_> {
        let mut cursor = XmlCursor::new(doc.as_bytes());
        let tok = cursor.next();
        assert!(matches!(tok, Token::OpenTag | Token::SelfCloseTag));
        cursor
    }

    #[test]
    fn style_declarations_are_case_insensitive_and_trimmed() {
        let props = StyleProps::parse(Some(Span::from(
            " FILL : red ;stop-color:#00f; Gradient-Units: userSpaceOnUse;bogus;;x:3",
        )));
        assert_eq!(props.fill, Some(Span::from("red")));
        assert_eq!(props.stop_color, Some(Span::from("#00f")));
        assert_eq!(props.gradient_units, Some(Span::from("userSpaceOnUse")));
        assert_eq!(props.x, Some(Span::from("3")));
        assert_eq!(props.opacity, None);
    }

    #[test]
    fn style_beats_attribute_even_when_empty() {
        let cursor = open(r#"<rect fill="blue" style="fill:" width="3"/>"#);
        let props = StyleProps::of(&cursor);
        assert_eq!(pick(props.fill, &cursor, "fill"), Some(Span::EMPTY));
        assert_eq!(pick(props.width, &cursor, "width"), Some(Span::from("3")));
    }

    #[test]
    fn cascade_inherits_and_consumes_opacity() {
        let parent = open(r#"<g fill="red" fill-opacity="0.5" opacity="0.25" color="blue">"#);
        let props = StyleProps::of(&parent);
        let root = Cascade::initial(Color::BLACK);
        let g = resolve_element_style(&parent, &props, &root, &[]);
        assert_eq!(g.cascade.opacity, 0.25);
        assert_eq!(g.cascade.fill_opacity, 0.5);
        assert_eq!(g.cascade.color, Color::rgb(0.0, 0.0, 1.0));

        let child = open(r#"<path fill="inherit" d="M0 0"/>"#);
        let c = resolve_element_style(&child, &StyleProps::of(&child), &g.cascade, &[]);
        assert_eq!(c.cascade.fill, Some(Span::from("red")));
        assert_eq!(c.cascade.fill_opacity, 0.5);
        assert_eq!(c.cascade.opacity, 1.0);

        let explicit = open(r#"<path opacity="inherit"/>"#);
        let e = resolve_element_style(&explicit, &StyleProps::of(&explicit), &g.cascade, &[]);
        assert_eq!(e.cascade.opacity, 0.25);
    }

    #[test]
    fn hidden_elements_and_visibility_inheritance() {
        let root = Cascade::initial(Color::BLACK);
        let none = open(r#"<g style="display:none">"#);
        assert!(resolve_element_style(&none, &StyleProps::of(&none), &root, &[]).is_hidden());

        let hidden = open(r#"<g visibility="collapse">"#);
        let h = resolve_element_style(&hidden, &StyleProps::of(&hidden), &root, &[]);
        assert!(h.is_hidden());

        let shown = open(r#"<path visibility="visible"/>"#);
        let s = resolve_element_style(&shown, &StyleProps::of(&shown), &h.cascade, &[]);
        assert!(!s.is_hidden());

        let plain = open(r#"<path/>"#);
        let p = resolve_element_style(&plain, &StyleProps::of(&plain), &h.cascade, &[]);
        assert!(p.is_hidden());
    }

    #[test]
    fn transform_none_and_inherit_are_dropped() {
        let root = Cascade::initial(Color::BLACK);
        let t = open(r#"<g transform="none">"#);
        assert!(resolve_element_style(&t, &StyleProps::of(&t), &root, &[])
            .transform
            .is_none());
        let t = open(r#"<g style="transform: scale(2)" transform="scale(3)">"#);
        assert_eq!(
            resolve_element_style(&t, &StyleProps::of(&t), &root, &[]).transform,
            Some(Span::from("scale(2)"))
        );
    }

    #[test]
    fn id_references() {
        assert_eq!(parse_id_ref(Span::from("#a")), Some(Span::from("a")));
        assert_eq!(parse_id_ref(Span::from("url(#grad)")), Some(Span::from("grad")));
        assert_eq!(
            parse_id_ref(Span::from("URL( '#g 1' ) red")),
            Some(Span::from("g 1"))
        );
        assert_eq!(parse_id_ref(Span::from("url(#)")), None);
        assert_eq!(parse_id_ref(Span::from("red")), None);
        assert_eq!(parse_id_ref(Span::from("url(#x")), None);
        assert_eq!(paint_fallback(Span::from("url(#x) red")), Some(Span::from("red")));
        assert_eq!(paint_fallback(Span::from("url(#x)")), None);
    }
}
