use crate::span::Span;

/// Forward cursor over comma/whitespace separated numbers.
pub(crate) struct NumberCursor<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> NumberCursor<'a> {
    pub fn new(span: Span<'a>) -> Self {
        Self {
            bytes: span.as_bytes(),
            i: 0,
        }
    }

    pub fn skip_ws(&mut self) {
        while self.i < self.bytes.len() {
            let b = self.bytes[self.i];
            if b == b' ' || b == b'\n' || b == b'\r' || b == b'\t' || b == b',' {
                self.i += 1;
            } else {
                break;
            }
        }
    }

    pub fn has_more(&self) -> bool {
        self.i < self.bytes.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.i).copied()
    }

    pub fn bump(&mut self) {
        if self.i < self.bytes.len() {
            self.i += 1;
        }
    }

    pub fn position(&self) -> usize {
        self.i
    }

    pub fn rest(&self) -> Span<'a> {
        Span::new(&self.bytes[self.i..])
    }

    /// Scans one number. On failure the cursor is left where it was.
    pub fn next_number(&mut self) -> Option<f32> {
        self.skip_ws();
        if self.i >= self.bytes.len() {
            return None;
        }
        let start = self.i;
        let mut has = false;

        if matches!(self.bytes[self.i], b'+' | b'-') {
            self.i += 1;
        }
        while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
            self.i += 1;
            has = true;
        }
        if self.i < self.bytes.len() && self.bytes[self.i] == b'.' {
            self.i += 1;
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
                has = true;
            }
        }
        if has && self.i < self.bytes.len() && matches!(self.bytes[self.i], b'e' | b'E') {
            self.i += 1;
            if self.i < self.bytes.len() && matches!(self.bytes[self.i], b'+' | b'-') {
                self.i += 1;
            }
            let mut has_exp = false;
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
                has_exp = true;
            }
            if !has_exp {
                has = false;
            }
        }

        if !has {
            self.i = start;
            return None;
        }

        let value = std::str::from_utf8(&self.bytes[start..self.i])
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .filter(|v| v.is_finite());
        if value.is_none() {
            self.i = start;
        }
        value
    }

    /// Lenient variant: a token that is not a number is consumed one byte at a time and reads
    /// as `0`.
    pub fn next_float(&mut self) -> f32 {
        match self.next_number() {
            Some(v) => v,
            None => {
                self.bump();
                0.0
            }
        }
    }

    /// Arc flag: a single character, `0` is false and anything else true.
    pub fn next_flag(&mut self) -> Option<bool> {
        self.skip_ws();
        let b = self.peek()?;
        self.i += 1;
        Some(b != b'0')
    }

    pub fn next_pair(&mut self) -> Option<(f32, f32)> {
        let start = self.i;
        let x = self.next_number()?;
        match self.next_number() {
            Some(y) => Some((x, y)),
            None => {
                self.i = start;
                None
            }
        }
    }

    /// True when another argument follows before `)` or the end of input.
    pub fn has_argument(&mut self) -> bool {
        self.skip_ws();
        matches!(self.peek(), Some(b) if b != b')')
    }
}

/// Leading number of `value` with any unit suffix ignored; `0` when absent.
pub(crate) fn parse_float(value: Span<'_>) -> f32 {
    NumberCursor::new(value.trim()).next_number().unwrap_or(0.0)
}

pub(crate) fn parse_float_clamped01(value: Span<'_>) -> f32 {
    parse_float(value).clamp(0.0, 1.0)
}

/// `50%` reads as `0.5`; plain numbers are returned as-is.
pub(crate) fn parse_number_or_percent(value: Span<'_>) -> Option<f32> {
    let mut cursor = NumberCursor::new(value.trim());
    let v = cursor.next_number()?;
    if cursor.peek() == Some(b'%') {
        return Some(v / 100.0);
    }
    Some(v)
}

/// Viewport lengths: percentages have no reference size here and read as `0`.
pub(crate) fn parse_length(value: Span<'_>) -> f32 {
    let mut cursor = NumberCursor::new(value.trim());
    match cursor.next_number() {
        Some(_) if cursor.peek() == Some(b'%') => 0.0,
        Some(v) => v,
        None => 0.0,
    }
}

/// Parses a `viewBox` list. Width and height must be positive.
pub(crate) fn parse_viewbox(value: Span<'_>) -> Option<(f32, f32, f32, f32)> {
    let mut cursor = NumberCursor::new(value);
    let x = cursor.next_number()?;
    let y = cursor.next_number()?;
    let w = cursor.next_number()?;
    let h = cursor.next_number()?;
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some((x, y, w, h))
}
