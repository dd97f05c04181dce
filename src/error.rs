use std::fmt;

#[derive(Debug)]
pub enum SvgGlyphError {
    /// No element with `id="glyph<N>"` in the document, or no SVG document covers the glyph.
    GlyphNotFound(u32),
    /// The font could not be parsed or carries no usable `SVG ` table.
    Font(String),
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl fmt::Display for SvgGlyphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvgGlyphError::GlyphNotFound(glyph) => {
                write!(f, "glyph {} has no SVG description", glyph)
            }
            SvgGlyphError::Font(message) => write!(f, "font error: {}", message),
            SvgGlyphError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            SvgGlyphError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for SvgGlyphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SvgGlyphError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SvgGlyphError {
    fn from(value: std::io::Error) -> Self {
        SvgGlyphError::Io(value)
    }
}
