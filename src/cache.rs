use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

use crate::debug::{DebugLogger, EventValue};
use crate::perf::{PerfLogger, SpanTimer};
use crate::span::Span;
use crate::xml::{ElementKind, Token, XmlCursor, scan_for_id};

const MAX_ELEMENT_DEPTH: usize = 128;
const NO_SPAN: (u32, u32) = (u32::MAX, u32::MAX);
/// OpenType glyph ids are 16-bit.
const MAX_GLYPH_RANGE: usize = 1 << 16;

/// Why a document could not be indexed. Callers fall back to linear scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBuildError {
    InvalidGlyphRange,
    GlyphRangeTooLarge,
    DocumentTooLarge,
    TooDeep,
    UnterminatedMarkup,
}

impl CacheBuildError {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheBuildError::InvalidGlyphRange => "invalid_glyph_range",
            CacheBuildError::GlyphRangeTooLarge => "glyph_range_too_large",
            CacheBuildError::DocumentTooLarge => "document_too_large",
            CacheBuildError::TooDeep => "too_deep",
            CacheBuildError::UnterminatedMarkup => "unterminated_markup",
        }
    }
}

/// Byte-span index of one SVG document: where each `glyph<N>` element and each `id` lives,
/// plus the id'd elements nested inside `<defs>`. Offsets are `[start, end)` into the document
/// the cache was built from; the cache does not hold the document itself.
#[derive(Debug)]
pub struct DocCache {
    start_glyph: u32,
    end_glyph: u32,
    glyph_spans: Vec<(u32, u32)>,
    ids: HashMap<Box<[u8]>, (u32, u32)>,
    defs_entries: Vec<DefsEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefsEntry {
    pub id: Box<[u8]>,
    pub span: Range<usize>,
}

struct OpenElement<'a> {
    start: usize,
    id: Option<&'a [u8]>,
    in_defs: bool,
    is_defs: bool,
}

impl DocCache {
    pub fn build(doc: &[u8], start_glyph: u32, end_glyph: u32) -> Result<Self, CacheBuildError> {
        if end_glyph < start_glyph || start_glyph == u32::MAX {
            return Err(CacheBuildError::InvalidGlyphRange);
        }
        if doc.len() >= u32::MAX as usize {
            return Err(CacheBuildError::DocumentTooLarge);
        }
        let glyph_count = (end_glyph - start_glyph) as usize + 1;
        if glyph_count > MAX_GLYPH_RANGE {
            return Err(CacheBuildError::GlyphRangeTooLarge);
        }
        let mut glyph_spans = Vec::new();
        glyph_spans
            .try_reserve_exact(glyph_count)
            .map_err(|_| CacheBuildError::GlyphRangeTooLarge)?;
        glyph_spans.resize(glyph_count, NO_SPAN);
        let mut cache = DocCache {
            start_glyph,
            end_glyph,
            glyph_spans,
            ids: HashMap::new(),
            defs_entries: Vec::new(),
        };

        let mut stack: Vec<OpenElement<'_>> = Vec::with_capacity(16);
        let mut defs_depth = 0usize;
        let mut cursor = XmlCursor::new(doc);

        loop {
            match cursor.next() {
                Token::Eof => break,
                Token::Text => {}
                Token::CloseTag => {
                    let Some(open) = stack.pop() else {
                        continue;
                    };
                    cache.record(&open, cursor.position());
                    if open.is_defs {
                        defs_depth = defs_depth.saturating_sub(1);
                    }
                }
                tok @ (Token::OpenTag | Token::SelfCloseTag) => {
                    let is_defs = cursor.kind() == ElementKind::Defs;
                    let open = OpenElement {
                        start: cursor.tag_start(),
                        id: cursor
                            .attr("id")
                            .map(Span::as_bytes)
                            .filter(|id| !id.is_empty()),
                        in_defs: defs_depth > 0,
                        is_defs,
                    };
                    if tok == Token::SelfCloseTag {
                        cache.record(&open, cursor.position());
                        continue;
                    }
                    if stack.len() >= MAX_ELEMENT_DEPTH {
                        return Err(CacheBuildError::TooDeep);
                    }
                    if is_defs {
                        defs_depth += 1;
                    }
                    stack.push(open);
                }
            }
        }
        if cursor.truncated() {
            return Err(CacheBuildError::UnterminatedMarkup);
        }
        Ok(cache)
    }

    fn record(&mut self, open: &OpenElement<'_>, end: usize) {
        let Some(id) = open.id else {
            return;
        };
        let span = (open.start as u32, end as u32);

        // Entries are recorded at close time, so a nested duplicate closes before its
        // ancestor; keep whichever starts first.
        match self.ids.get_mut(id) {
            Some(existing) if existing.0 <= span.0 => {}
            Some(existing) => *existing = span,
            None => {
                self.ids.insert(id.into(), span);
            }
        }

        if open.in_defs {
            self.defs_entries.push(DefsEntry {
                id: id.into(),
                span: open.start..end,
            });
        }

        if let Some(glyph) = parse_glyph_id(id) {
            if (self.start_glyph..=self.end_glyph).contains(&glyph) {
                let slot = &mut self.glyph_spans[(glyph - self.start_glyph) as usize];
                if *slot == NO_SPAN || slot.0 > span.0 {
                    *slot = span;
                }
            }
        }
    }

    pub fn glyph_range(&self) -> (u32, u32) {
        (self.start_glyph, self.end_glyph)
    }

    pub fn glyph_span(&self, glyph: u32) -> Option<Range<usize>> {
        if glyph < self.start_glyph || glyph > self.end_glyph {
            return None;
        }
        let span = self.glyph_spans[(glyph - self.start_glyph) as usize];
        (span != NO_SPAN).then(|| span.0 as usize..span.1 as usize)
    }

    pub fn find_id(&self, id: &[u8]) -> Option<Range<usize>> {
        if id.is_empty() {
            return None;
        }
        self.ids.get(id).map(|&(s, e)| s as usize..e as usize)
    }

    /// Id'd elements nested anywhere inside a `<defs>`, in closing order.
    pub fn defs_entries(&self) -> &[DefsEntry] {
        &self.defs_entries
    }

    pub fn id_count(&self) -> usize {
        self.ids.len()
    }
}

/// `glyph<digits>` → glyph id. Overflowing values are not glyph ids.
pub(crate) fn parse_glyph_id(id: &[u8]) -> Option<u32> {
    let digits = id.strip_prefix(b"glyph")?;
    if digits.is_empty() {
        return None;
    }
    let mut gid: u32 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        gid = gid.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
    }
    Some(gid)
}

/// Start offset of the element with `id`: the cache's span when it has one, else a linear
/// scan of the document.
pub(crate) fn locate_id(doc: &[u8], cache: Option<&DocCache>, id: Span<'_>) -> Option<usize> {
    if let Some(span) = cache.and_then(|c| c.find_id(id.as_bytes())) {
        if span.start < span.end && span.end <= doc.len() {
            return Some(span.start);
        }
    }
    scan_for_id(doc, id)
}

/// One publish-once cache slot per SVG document of a font.
#[derive(Debug, Default)]
pub struct DocCacheSlots {
    slots: Box<[OnceLock<Option<DocCache>>]>,
}

impl DocCacheSlots {
    pub fn new(document_count: usize) -> Self {
        Self {
            slots: (0..document_count).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the published cache for `index`, building one if none is published yet.
    /// Concurrent builders race; the first to publish wins and the rest drop their own
    /// candidate. A failed build is published too, so it is not retried.
    pub fn get_or_build(
        &self,
        index: usize,
        doc: &[u8],
        glyph_range: (u32, u32),
        debug: Option<&DebugLogger>,
        perf: Option<&PerfLogger>,
    ) -> Option<&DocCache> {
        let slot = self.slots.get(index)?;
        if let Some(published) = slot.get() {
            return published.as_ref();
        }

        let candidate = {
            let _timer = SpanTimer::start(perf, "svg.cache.build", None);
            DocCache::build(doc, glyph_range.0, glyph_range.1)
        };
        if let Some(debug) = debug {
            match &candidate {
                Ok(cache) => debug.event(
                    "svg.cache.build",
                    None,
                    &[
                        ("document", EventValue::Int(index as i64)),
                        ("ids", EventValue::Int(cache.id_count() as i64)),
                        ("defs_entries", EventValue::Int(cache.defs_entries().len() as i64)),
                    ],
                ),
                Err(err) => debug.event(
                    "svg.cache.build",
                    None,
                    &[
                        ("document", EventValue::Int(index as i64)),
                        ("error", EventValue::Str(err.as_str())),
                    ],
                ),
            }
        }

        // A losing candidate is dropped inside `set`'s Err.
        let _ = slot.set(candidate.ok());
        slot.get().and_then(Option::as_ref)
    }
}
