use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSON-lines event log for degraded rendering paths (cycles, depth limits, cache
/// fallbacks). Cloning shares the underlying file.
#[derive(Clone)]
pub struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    counters: HashMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: HashMap::new(),
            })),
        })
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    /// Writes `{"type": kind, "glyph": glyph, ...fields}` and bumps the `kind` counter.
    pub(crate) fn event(&self, kind: &str, glyph: Option<u32>, fields: &[(&str, EventValue<'_>)]) {
        let glyph = glyph
            .map(|g| g.to_string())
            .unwrap_or_else(|| "null".to_string());
        let mut json = format!(
            "{{\"type\":\"{}\",\"glyph\":{}",
            json_escape(kind),
            glyph
        );
        for (key, value) in fields {
            json.push_str(&format!(",\"{}\":", json_escape(key)));
            match value {
                EventValue::Str(s) => json.push_str(&format!("\"{}\"", json_escape(s))),
                EventValue::Bytes(b) => json.push_str(&format!(
                    "\"{}\"",
                    json_escape(&String::from_utf8_lossy(b))
                )),
                EventValue::Int(v) => json.push_str(&v.to_string()),
            }
        }
        json.push('}');
        self.log_json(&json);
        self.increment(kind, 1);
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let mut counters: Vec<(String, u64)> = state.counters.drain().collect();
            counters.sort_by(|a, b| a.0.cmp(&b.0));
            let mut counts_json = String::from("{");
            for (idx, (key, value)) in counters.iter().enumerate() {
                if idx > 0 {
                    counts_json.push(',');
                }
                counts_json.push_str(&format!("\"{}\":{}", json_escape(key), value));
            }
            counts_json.push('}');
            let json = format!(
                "{{\"type\":\"debug.summary\",\"context\":\"{}\",\"counts\":{}}}",
                json_escape(context),
                counts_json
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

/// Debug events scoped to one glyph render. Does nothing when logging is off.
#[derive(Clone, Copy, Default)]
pub(crate) struct GlyphLog<'l> {
    logger: Option<&'l DebugLogger>,
    glyph: Option<u32>,
}

impl<'l> GlyphLog<'l> {
    pub fn new(logger: Option<&'l DebugLogger>, glyph: Option<u32>) -> Self {
        Self { logger, glyph }
    }

    pub fn event(&self, kind: &str, fields: &[(&str, EventValue<'_>)]) {
        if let Some(logger) = self.logger {
            logger.event(kind, self.glyph, fields);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum EventValue<'a> {
    Str(&'a str),
    Bytes(&'a [u8]),
    Int(i64),
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_control_characters() {
        assert_eq!(json_escape("a\"b\\c\n"), "a\\\"b\\\\c\\n");
        assert_eq!(json_escape("\u{1}"), "\\u0001");
    }

    #[test]
    fn events_are_written_as_json_lines_with_a_summary() {
        let path = std::env::temp_dir().join(format!("svgglyph_debug_{}.log", std::process::id()));
        let logger = DebugLogger::new(&path).expect("create debug log");
        logger.event(
            "svg.use.cycle",
            Some(5),
            &[("target", EventValue::Bytes(b"loop")), ("depth", EventValue::Int(3))],
        );
        logger.event("svg.use.cycle", None, &[]);
        logger.emit_summary("test");
        logger.flush();

        let text = std::fs::read_to_string(&path).expect("read debug log");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "{\"type\":\"svg.use.cycle\",\"glyph\":5,\"target\":\"loop\",\"depth\":3}"
        );
        assert_eq!(lines[1], "{\"type\":\"svg.use.cycle\",\"glyph\":null}");
        assert!(lines[2].contains("\"svg.use.cycle\":2"));
        let _ = std::fs::remove_file(&path);
    }
}
