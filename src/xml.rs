use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    OpenTag,
    CloseTag,
    SelfCloseTag,
    Text,
    Eof,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Attr<'a> {
    pub name: Span<'a>,
    pub value: Span<'a>,
}

/// Element tags the renderer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementKind {
    Svg,
    G,
    Symbol,
    Defs,
    Use,
    Path,
    Rect,
    Circle,
    Ellipse,
    Line,
    Polyline,
    Polygon,
    LinearGradient,
    RadialGradient,
    ClipPath,
    Stop,
    Unsupported,
}

impl ElementKind {
    pub fn from_tag(tag: Span<'_>) -> Self {
        match tag.as_bytes() {
            b"svg" => ElementKind::Svg,
            b"g" => ElementKind::G,
            b"symbol" => ElementKind::Symbol,
            b"defs" => ElementKind::Defs,
            b"use" => ElementKind::Use,
            b"path" => ElementKind::Path,
            b"rect" => ElementKind::Rect,
            b"circle" => ElementKind::Circle,
            b"ellipse" => ElementKind::Ellipse,
            b"line" => ElementKind::Line,
            b"polyline" => ElementKind::Polyline,
            b"polygon" => ElementKind::Polygon,
            b"linearGradient" => ElementKind::LinearGradient,
            b"radialGradient" => ElementKind::RadialGradient,
            b"clipPath" => ElementKind::ClipPath,
            b"stop" => ElementKind::Stop,
            _ => ElementKind::Unsupported,
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, ElementKind::Svg | ElementKind::G | ElementKind::Symbol)
    }

    pub fn is_shape(self) -> bool {
        matches!(
            self,
            ElementKind::Path
                | ElementKind::Rect
                | ElementKind::Circle
                | ElementKind::Ellipse
                | ElementKind::Line
                | ElementKind::Polyline
                | ElementKind::Polygon
        )
    }
}

/// Forward-only tokenizer over `doc[start..end]`. Offsets reported by the cursor are
/// relative to the whole document so spans found by one cursor can seed another.
pub(crate) struct XmlCursor<'a> {
    doc: &'a [u8],
    pos: usize,
    end: usize,
    tag_start: usize,
    tag_name: Span<'a>,
    text: Span<'a>,
    attrs: Vec<Attr<'a>>,
    self_closing: bool,
    truncated: bool,
}

fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

impl<'a> XmlCursor<'a> {
    pub fn new(doc: &'a [u8]) -> Self {
        Self::at(doc, 0, doc.len())
    }

    pub fn at(doc: &'a [u8], start: usize, end: usize) -> Self {
        let end = end.min(doc.len());
        Self {
            doc,
            pos: start.min(end),
            end,
            tag_start: start.min(end),
            tag_name: Span::default(),
            text: Span::default(),
            attrs: Vec::new(),
            self_closing: false,
            truncated: false,
        }
    }

    pub fn doc(&self) -> &'a [u8] {
        self.doc
    }

    pub fn tag_name(&self) -> Span<'a> {
        self.tag_name
    }

    pub fn kind(&self) -> ElementKind {
        ElementKind::from_tag(self.tag_name)
    }

    /// Document offset of the `<` that began the current tag.
    pub fn tag_start(&self) -> usize {
        self.tag_start
    }

    /// Document offset just past the current token.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn text(&self) -> Span<'a> {
        self.text
    }

    /// True once the cursor stopped at unterminated markup rather than the end of input.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn attrs(&self) -> &[Attr<'a>] {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<Span<'a>> {
        self.attrs
            .iter()
            .find(|attr| attr.name.eq_str(name))
            .map(|attr| attr.value)
    }

    /// `href`, falling back to `xlink:href`.
    pub fn href(&self) -> Option<Span<'a>> {
        self.attr("href").or_else(|| self.attr("xlink:href"))
    }

    fn eof(&mut self) -> Token {
        self.truncated = true;
        self.pos = self.end;
        self.attrs.clear();
        Token::Eof
    }

    fn read_name(&mut self) -> Span<'a> {
        let start = self.pos;
        while self.pos < self.end {
            let b = self.doc[self.pos];
            if is_ws(b) || b == b'>' || b == b'/' || b == b'=' {
                break;
            }
            self.pos += 1;
        }
        Span::new(&self.doc[start..self.pos])
    }

    fn skip_ws(&mut self) {
        while self.pos < self.end && is_ws(self.doc[self.pos]) {
            self.pos += 1;
        }
    }

    /// Returns false when a quoted value runs off the end of input.
    fn parse_attrs(&mut self) -> bool {
        self.attrs.clear();
        loop {
            self.skip_ws();
            if self.pos >= self.end {
                return true;
            }
            let b = self.doc[self.pos];
            if b == b'>' || b == b'/' {
                return true;
            }
            let name = self.read_name();
            if name.is_empty() {
                self.pos += 1;
                continue;
            }
            self.skip_ws();
            if self.pos >= self.end || self.doc[self.pos] != b'=' {
                continue;
            }
            self.pos += 1;
            self.skip_ws();
            if self.pos >= self.end {
                return true;
            }
            let quote = self.doc[self.pos];
            if quote != b'"' && quote != b'\'' {
                // Unquoted value: skip it, drop the attribute.
                while self.pos < self.end {
                    let b = self.doc[self.pos];
                    if is_ws(b) || b == b'>' {
                        break;
                    }
                    if b == b'/' && self.doc.get(self.pos + 1) == Some(&b'>') {
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            let value_start = self.pos + 1;
            let Some(close) = self.doc[value_start..self.end]
                .iter()
                .position(|&c| c == quote)
            else {
                return false;
            };
            let value_end = value_start + close;
            self.attrs.push(Attr {
                name,
                value: Span::new(&self.doc[value_start..value_end]),
            });
            self.pos = value_end + 1;
        }
    }

    pub fn next(&mut self) -> Token {
        self.text = Span::default();
        while self.pos < self.end {
            if self.doc[self.pos] != b'<' {
                let start = self.pos;
                while self.pos < self.end && self.doc[self.pos] != b'<' {
                    self.pos += 1;
                }
                let text = &self.doc[start..self.pos];
                if text.iter().any(|&b| !is_ws(b)) {
                    self.tag_start = start;
                    self.text = Span::new(text);
                    self.attrs.clear();
                    return Token::Text;
                }
                continue;
            }

            self.tag_start = self.pos;
            let doc = self.doc;
            let rest = &doc[..self.end];
            if rest[self.pos..].starts_with(b"<!--") {
                match find(rest, self.pos + 4, b"-->") {
                    Some(close) => self.pos = close + 3,
                    None => return self.eof(),
                }
                continue;
            }
            if rest[self.pos..].starts_with(b"<![CDATA[") {
                match find(rest, self.pos + 9, b"]]>") {
                    Some(close) => self.pos = close + 3,
                    None => return self.eof(),
                }
                continue;
            }
            if rest[self.pos..].starts_with(b"<!") {
                match find(rest, self.pos + 2, b">") {
                    Some(close) => self.pos = close + 1,
                    None => return self.eof(),
                }
                continue;
            }
            if rest[self.pos..].starts_with(b"<?") {
                match find(rest, self.pos + 2, b"?>") {
                    Some(close) => self.pos = close + 2,
                    None => return self.eof(),
                }
                continue;
            }

            self.pos += 1;
            if self.pos >= self.end {
                return self.eof();
            }

            if self.doc[self.pos] == b'/' {
                self.pos += 1;
                self.tag_name = self.read_name();
                match find(rest, self.pos, b">") {
                    Some(close) => self.pos = close + 1,
                    None => return self.eof(),
                }
                self.attrs.clear();
                self.self_closing = false;
                return Token::CloseTag;
            }

            self.tag_name = self.read_name();
            if !self.parse_attrs() {
                return self.eof();
            }
            self.self_closing = false;
            self.skip_ws();
            if self.pos < self.end && self.doc[self.pos] == b'/' {
                self.self_closing = true;
                self.pos += 1;
            }
            if self.pos >= self.end || self.doc[self.pos] != b'>' {
                return self.eof();
            }
            self.pos += 1;
            return if self.self_closing {
                Token::SelfCloseTag
            } else {
                Token::OpenTag
            };
        }
        Token::Eof
    }

    /// After an open tag, consumes tokens up to and including its matching close tag.
    pub fn skip_subtree(&mut self) {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next() {
                Token::Eof => break,
                Token::OpenTag => depth += 1,
                Token::CloseTag => depth -= 1,
                _ => {}
            }
        }
    }
}

/// Byte offset of the first open/self-close tag whose `id` attribute equals `id`.
pub(crate) fn scan_for_id(doc: &[u8], id: Span<'_>) -> Option<usize> {
    if id.is_empty() {
        return None;
    }
    let mut cursor = XmlCursor::new(doc);
    loop {
        match cursor.next() {
            Token::Eof => return None,
            Token::OpenTag | Token::SelfCloseTag => {
                if cursor.attr("id") == Some(id) {
                    return Some(cursor.tag_start());
                }
            }
            _ => {}
        }
    }
}
