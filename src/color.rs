use lightningcss::traits::Parse;
use lightningcss::values::color::{CssColor, SRGB};

use crate::span::Span;
use crate::types::Color;

/// Resolves an SVG color value. `None` means the value paints nothing (`none`,
/// `transparent` or empty); anything unparseable falls back to opaque black.
pub(crate) fn parse_color(value: Span<'_>, current: Color, palette: &[Color]) -> Option<Color> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return None;
    }
    if value.eq_ignore_ascii_case("transparent") {
        return None;
    }
    if value.eq_ignore_ascii_case("currentColor") {
        return Some(current);
    }
    if value.starts_with_ignore_ascii_case("var(") {
        return parse_palette_var(value, current, palette);
    }

    let Ok(text) = std::str::from_utf8(value.as_bytes()) else {
        return Some(Color::BLACK);
    };
    match CssColor::parse_string(text) {
        Ok(CssColor::CurrentColor) => Some(current),
        Ok(css) => Some(css_color_to_color(&css).unwrap_or(Color::BLACK)),
        Err(_) => Some(Color::BLACK),
    }
}

/// `var(--colorN)` picks palette entry N; `var(--colorN, fallback)` resolves the fallback when
/// the entry is missing. Without either the current color is used.
fn parse_palette_var(value: Span<'_>, current: Color, palette: &[Color]) -> Option<Color> {
    let bytes = value.as_bytes();
    let inner = &bytes[4..];
    let inner = match inner.iter().rposition(|&b| b == b')') {
        Some(close) => &inner[..close],
        None => inner,
    };
    let (name, fallback) = match inner.iter().position(|&b| b == b',') {
        Some(comma) => (&inner[..comma], Some(&inner[comma + 1..])),
        None => (inner, None),
    };

    let name = name.trim_ascii();
    if let Some(digits) = name.strip_prefix(b"--color") {
        if !digits.is_empty() && digits.iter().all(u8::is_ascii_digit) {
            let index = std::str::from_utf8(digits)
                .ok()
                .and_then(|d| d.parse::<usize>().ok());
            if let Some(color) = index.and_then(|i| palette.get(i)) {
                return Some(*color);
            }
        }
    }

    match fallback {
        Some(fallback) => parse_color(Span::new(fallback), current, palette),
        None => Some(current),
    }
}

fn css_color_to_color(color: &CssColor) -> Option<Color> {
    if let CssColor::RGBA(rgba) = color {
        return Some(Color::rgba(
            rgba.red as f32 / 255.0,
            rgba.green as f32 / 255.0,
            rgba.blue as f32 / 255.0,
            (rgba.alpha as f32 / 255.0).clamp(0.0, 1.0),
        ));
    }
    if let Ok(srgb) = SRGB::try_from(color) {
        return Some(Color::rgba(
            srgb.r.clamp(0.0, 1.0),
            srgb.g.clamp(0.0, 1.0),
            srgb.b.clamp(0.0, 1.0),
            srgb.alpha.clamp(0.0, 1.0),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: &str) -> Option<Color> {
        parse_color(Span::from(value), Color::rgb(0.0, 1.0, 0.0), &[])
    }

    #[test]
    fn keywords_resolve_without_css_parser() {
        assert_eq!(parse("none"), None);
        assert_eq!(parse(" Transparent "), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("currentcolor"), Some(Color::rgb(0.0, 1.0, 0.0)));
    }

    #[test]
    fn hex_named_and_functional_colors() {
        assert_eq!(parse("#f00").map(Color::to_rgba8), Some([255, 0, 0, 255]));
        assert_eq!(parse("#0000ff").map(Color::to_rgba8), Some([0, 0, 255, 255]));
        assert_eq!(parse("red").map(Color::to_rgba8), Some([255, 0, 0, 255]));
        assert_eq!(
            parse("rgb(0, 128, 255)").map(Color::to_rgba8),
            Some([0, 128, 255, 255])
        );
        let hsl = parse("hsl(120, 100%, 50%)").expect("expected hsl color");
        assert_eq!(hsl.to_rgba8(), [0, 255, 0, 255]);
    }

    #[test]
    fn unknown_colors_default_to_black() {
        assert_eq!(parse("notacolor"), Some(Color::BLACK));
        assert_eq!(parse("#12"), Some(Color::BLACK));
    }

    #[test]
    fn palette_variables_and_fallbacks() {
        let palette = [Color::rgb(1.0, 0.0, 0.0), Color::rgb(0.0, 0.0, 1.0)];
        let current = Color::BLACK;
        let pick = |v: &str| parse_color(Span::from(v), current, &palette);
        assert_eq!(pick("var(--color1)"), Some(Color::rgb(0.0, 0.0, 1.0)));
        assert_eq!(pick("var( --color0 , #fff)"), Some(Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(
            pick("var(--color7, #00ff00)").map(Color::to_rgba8),
            Some([0, 255, 0, 255])
        );
        assert_eq!(pick("var(--color7)"), Some(current));
        assert_eq!(pick("var(--color7, none)"), None);
    }
}
