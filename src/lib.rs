mod cache;
mod canvas;
mod clip;
mod color;
mod debug;
mod decycler;
mod defs;
mod error;
mod fill;
mod font;
mod metrics;
mod number;
mod paint;
mod path;
mod perf;
mod raster;
mod render;
mod shape;
mod span;
mod style;
mod transform;
mod types;
mod use_element;
mod viewport;
mod xml;

pub use cache::{CacheBuildError, DefsEntry, DocCache, DocCacheSlots};
pub use canvas::{Canvas, Command, PathSegment};
pub use debug::DebugLogger;
pub use error::SvgGlyphError;
pub use font::SvgFont;
pub use metrics::{BatchStats, RenderStats};
pub use paint::{ClipOutline, ColorLine, ColorStop, CompositeMode, Extend, PaintSink, StopList};
pub use path::DrawSink;
pub use perf::PerfLogger;
pub use raster::RasterSink;
pub use types::{Color, Extents, Transform};

use render::{GlyphRequest, render_glyph};
use std::sync::Arc;

/// Renders glyphs from OpenType SVG documents into a [`PaintSink`].
///
/// Cheap to clone; the optional loggers are shared.
#[derive(Clone)]
pub struct SvgGlyphRenderer {
    foreground: Color,
    palette: Vec<Color>,
    flip_y: Option<bool>,
    root_transform: Option<Transform>,
    debug: Option<Arc<DebugLogger>>,
    perf: Option<Arc<PerfLogger>>,
}

#[derive(Clone)]
pub struct SvgGlyphRendererBuilder {
    foreground: Color,
    palette: Vec<Color>,
    flip_y: Option<bool>,
    root_transform: Option<Transform>,
    debug_path: Option<std::path::PathBuf>,
    perf_path: Option<std::path::PathBuf>,
}

impl Default for SvgGlyphRenderer {
    fn default() -> Self {
        Self {
            foreground: Color::BLACK,
            palette: Vec::new(),
            flip_y: None,
            root_transform: None,
            debug: None,
            perf: None,
        }
    }
}

impl SvgGlyphRenderer {
    pub fn builder() -> SvgGlyphRendererBuilder {
        SvgGlyphRendererBuilder::new()
    }

    pub fn foreground(&self) -> Color {
        self.foreground
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    /// Renders `glyph` from a standalone SVG document, locating it by linear scan.
    pub fn render_document(
        &self,
        doc: &[u8],
        glyph: u32,
        sink: &mut dyn PaintSink,
    ) -> Result<RenderStats, SvgGlyphError> {
        self.render_with(doc, glyph, None, &self.palette, false, sink)
    }

    /// Like [`render_document`](Self::render_document), with ids and glyph spans taken from a
    /// prebuilt cache of the same document.
    pub fn render_document_cached(
        &self,
        doc: &[u8],
        glyph: u32,
        cache: &DocCache,
        sink: &mut dyn PaintSink,
    ) -> Result<RenderStats, SvgGlyphError> {
        self.render_with(doc, glyph, Some(cache), &self.palette, false, sink)
    }

    /// Writes the debug counter summary and flushes both logs.
    pub fn emit_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
        if let Some(perf) = self.perf.as_deref() {
            perf.flush();
        }
    }

    pub(crate) fn debug(&self) -> Option<&DebugLogger> {
        self.debug.as_deref()
    }

    pub(crate) fn perf(&self) -> Option<&PerfLogger> {
        self.perf.as_deref()
    }

    pub(crate) fn render_with(
        &self,
        doc: &[u8],
        glyph: u32,
        cache: Option<&DocCache>,
        palette: &[Color],
        flip_by_default: bool,
        sink: &mut dyn PaintSink,
    ) -> Result<RenderStats, SvgGlyphError> {
        render_glyph(
            sink,
            &GlyphRequest {
                doc,
                glyph,
                cache,
                foreground: self.foreground,
                palette,
                root_transform: self.root_transform,
                flip_y: self.flip_y.unwrap_or(flip_by_default),
                debug: self.debug(),
                perf: self.perf(),
            },
        )
    }
}

impl Default for SvgGlyphRendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SvgGlyphRendererBuilder {
    pub fn new() -> Self {
        Self {
            foreground: Color::BLACK,
            palette: Vec::new(),
            flip_y: None,
            root_transform: None,
            debug_path: None,
            perf_path: None,
        }
    }

    /// Initial `currentColor`.
    pub fn foreground(mut self, color: Color) -> Self {
        self.foreground = color;
        self
    }

    /// Colors for `var(--colorN)`. For [`SvgFont`] this replaces the font's CPAL palette.
    pub fn palette(mut self, palette: Vec<Color>) -> Self {
        self.palette = palette;
        self
    }

    // Wraps every glyph in (1,0,0,-1,0,0). Off for raw documents and on for fonts unless set.
    pub fn flip_y(mut self, enabled: bool) -> Self {
        self.flip_y = Some(enabled);
        self
    }

    /// Pushed before the flip, outermost.
    pub fn root_transform(mut self, transform: Transform) -> Self {
        self.root_transform = Some(transform);
        self
    }

    pub fn debug_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<SvgGlyphRenderer, SvgGlyphError> {
        let channels = [
            self.foreground.r,
            self.foreground.g,
            self.foreground.b,
            self.foreground.a,
        ];
        if channels.iter().any(|c| !c.is_finite()) {
            return Err(SvgGlyphError::InvalidConfiguration(
                "foreground color must be finite".to_string(),
            ));
        }
        if let Some(t) = self.root_transform {
            if [t.xx, t.yx, t.xy, t.yy, t.dx, t.dy]
                .iter()
                .any(|v| !v.is_finite())
            {
                return Err(SvgGlyphError::InvalidConfiguration(
                    "root_transform must be finite".to_string(),
                ));
            }
        }
        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };
        let perf = if let Some(path) = self.perf_path {
            Some(Arc::new(PerfLogger::new(path)?))
        } else {
            None
        };
        Ok(SvgGlyphRenderer {
            foreground: self.foreground,
            palette: self.palette,
            flip_y: self.flip_y,
            root_transform: self.root_transform,
            debug,
            perf,
        })
    }
}
