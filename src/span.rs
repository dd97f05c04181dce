use std::fmt;

/// Borrowed byte range of an SVG document. Equality and hashing are byte-wise.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span<'a>(&'a [u8]);

impl<'a> Span<'a> {
    pub const EMPTY: Span<'static> = Span(b"");

    pub fn new(bytes: &'a [u8]) -> Self {
        Span(bytes)
    }

    pub fn as_bytes(self) -> &'a [u8] {
        self.0
    }

    pub fn len(self) -> usize {
        self.0.len()
    }

    pub fn is_empty(self) -> bool {
        self.0.is_empty()
    }

    pub fn trim(self) -> Span<'a> {
        Span(self.0.trim_ascii())
    }

    pub fn eq_str(self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }

    pub fn eq_ignore_ascii_case(self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.as_bytes())
    }

    pub fn starts_with_ignore_ascii_case(self, prefix: &str) -> bool {
        self.0.len() >= prefix.len()
            && self.0[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    }

    pub fn slice(self, start: usize, end: usize) -> Span<'a> {
        let end = end.min(self.0.len());
        let start = start.min(end);
        Span(&self.0[start..end])
    }

    pub fn skip(self, n: usize) -> Span<'a> {
        self.slice(n, self.0.len())
    }

    /// Trimmed value equals `none` (ASCII case-insensitive).
    pub fn is_none(self) -> bool {
        self.trim().eq_ignore_ascii_case("none")
    }

    pub fn is_inherit(self) -> bool {
        self.trim().eq_ignore_ascii_case("inherit")
    }

    pub fn to_string_lossy(self) -> String {
        String::from_utf8_lossy(self.0).into_owned()
    }
}

impl fmt::Debug for Span<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.0))
    }
}

impl<'a> From<&'a str> for Span<'a> {
    fn from(value: &'a str) -> Self {
        Span(value.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for Span<'a> {
    fn from(value: &'a [u8]) -> Self {
        Span(value)
    }
}
