use crate::SvgGlyphRenderer;
use crate::cache::DocCacheSlots;
use crate::debug::EventValue;
use crate::error::SvgGlyphError;
use crate::metrics::{BatchStats, RenderStats};
use crate::paint::PaintSink;
use crate::types::Color;
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Glyph range covered by one document of the `SVG ` table, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DocumentRange {
    start_glyph: u32,
    end_glyph: u32,
}

/// A font carrying an OpenType `SVG ` table, with one lazily built cache per document.
pub struct SvgFont {
    data: Vec<u8>,
    face_index: u32,
    documents: Vec<DocumentRange>,
    palette: Vec<Color>,
    units_per_em: u16,
    slots: DocCacheSlots,
    renderer: SvgGlyphRenderer,
}

impl SvgFont {
    pub fn from_file(
        path: impl AsRef<Path>,
        renderer: SvgGlyphRenderer,
    ) -> Result<Self, SvgGlyphError> {
        let data = fs::read(path)?;
        Self::from_bytes(data, 0, renderer)
    }

    /// Parses the face at `face_index`. The renderer's palette, when non-empty, replaces the
    /// font's first CPAL palette.
    pub fn from_bytes(
        data: Vec<u8>,
        face_index: u32,
        renderer: SvgGlyphRenderer,
    ) -> Result<Self, SvgGlyphError> {
        let face = ttf_parser::Face::parse(&data, face_index)
            .map_err(|err| SvgGlyphError::Font(format!("font parse failed: {err}")))?;
        let svg = face
            .tables()
            .svg
            .ok_or_else(|| SvgGlyphError::Font("font has no SVG table".to_string()))?;

        let list = svg.documents;
        let documents: Vec<DocumentRange> = (0..list.len())
            .filter_map(|index| list.get(index))
            .map(|doc| DocumentRange {
                start_glyph: u32::from(doc.start_glyph_id.0),
                end_glyph: u32::from(doc.end_glyph_id.0),
            })
            .collect();

        let palette = if renderer.palette().is_empty() {
            font_palette(&face)
        } else {
            renderer.palette().to_vec()
        };
        let units_per_em = face.units_per_em();

        Ok(Self {
            slots: DocCacheSlots::new(documents.len()),
            data,
            face_index,
            documents,
            palette,
            units_per_em,
            renderer,
        })
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Index of the first document whose glyph range covers `glyph`.
    pub fn document_for_glyph(&self, glyph: u32) -> Option<usize> {
        self.documents
            .iter()
            .position(|range| (range.start_glyph..=range.end_glyph).contains(&glyph))
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Renders one glyph in font units, y-up unless the renderer turned the flip off.
    pub fn render_glyph(
        &self,
        glyph: u32,
        sink: &mut dyn PaintSink,
    ) -> Result<RenderStats, SvgGlyphError> {
        let index = self
            .document_for_glyph(glyph)
            .ok_or(SvgGlyphError::GlyphNotFound(glyph))?;
        let range = self.documents[index];
        let face = ttf_parser::Face::parse(&self.data, self.face_index)
            .map_err(|err| SvgGlyphError::Font(format!("font parse failed: {err}")))?;
        let doc = face
            .tables()
            .svg
            .and_then(|svg| u16::try_from(index).ok().and_then(|i| svg.documents.get(i)))
            .map(|doc| doc.data)
            .ok_or(SvgGlyphError::GlyphNotFound(glyph))?;

        if doc.starts_with(&[0x1f, 0x8b]) {
            if let Some(logger) = self.renderer.debug() {
                logger.event(
                    "svg.document.compressed",
                    Some(glyph),
                    &[("document", EventValue::Int(index as i64))],
                );
            }
            return Err(SvgGlyphError::GlyphNotFound(glyph));
        }

        let cache = self.slots.get_or_build(
            index,
            doc,
            (range.start_glyph, range.end_glyph),
            self.renderer.debug(),
            self.renderer.perf(),
        );
        self.renderer
            .render_with(doc, glyph, cache, &self.palette, true, sink)
    }

    /// Renders `glyphs` in parallel, each into a sink from `make_sink`. Sinks come back in
    /// input order; glyphs without an SVG description are listed in `missing`.
    pub fn render_glyphs<S, F>(&self, glyphs: &[u32], make_sink: F) -> (Vec<(u32, S)>, BatchStats)
    where
        S: PaintSink + Send,
        F: Fn(u32) -> S + Sync,
    {
        let start = Instant::now();
        let rendered: Vec<(u32, S, Result<RenderStats, SvgGlyphError>)> = glyphs
            .par_iter()
            .map(|&glyph| {
                let mut sink = make_sink(glyph);
                let result = self.render_glyph(glyph, &mut sink);
                (glyph, sink, result)
            })
            .collect();

        let mut stats = BatchStats::default();
        let mut sinks = Vec::with_capacity(rendered.len());
        for (glyph, sink, result) in rendered {
            match result {
                Ok(glyph_stats) => stats.glyphs.push(glyph_stats),
                Err(_) => stats.missing.push(glyph),
            }
            sinks.push((glyph, sink));
        }
        stats.total_render_ms = start.elapsed().as_secs_f64() * 1000.0;
        if let Some(perf) = self.renderer.perf() {
            perf.log_span_ms("svg.render_glyphs", None, stats.total_render_ms);
            perf.log_counts(
                "svg.render_glyphs",
                None,
                &[
                    ("glyphs", stats.glyphs.len() as u64),
                    ("missing", stats.missing.len() as u64),
                    ("paint_calls", stats.paint_calls() as u64),
                ],
            );
        }
        (sinks, stats)
    }
}

fn font_palette(face: &ttf_parser::Face<'_>) -> Vec<Color> {
    let Some(cpal) = face
        .raw_face()
        .table(ttf_parser::Tag::from_bytes(b"CPAL"))
        .and_then(ttf_parser::cpal::Table::parse)
    else {
        return Vec::new();
    };
    let mut palette = Vec::new();
    for entry in 0..=u16::MAX {
        let Some(c) = cpal.get(0, entry) else {
            break;
        };
        palette.push(Color::from_rgba8(c.red, c.green, c.blue, c.alpha));
    }
    palette
}
