/// Counters gathered while rendering one glyph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub glyph: u32,
    /// Number of elements visited by the renderer, including skipped ones.
    pub elements: usize,
    pub shapes: usize,
    pub paint_calls: usize,
    pub use_cycles: usize,
    pub depth_limit_hits: usize,
    /// The glyph was located through the document cache rather than a linear scan.
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub glyphs: Vec<RenderStats>,
    pub missing: Vec<u32>,
    pub total_render_ms: f64,
}

impl BatchStats {
    pub fn paint_calls(&self) -> usize {
        self.glyphs.iter().map(|g| g.paint_calls).sum()
    }
}
