use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::debug::json_escape;

/// Per-span timing log. On drop a `<stem>_hot.log` file ranks spans by total time.
#[derive(Clone)]
pub struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: HashMap<String, f64>,
    span_counts: HashMap<String, u64>,
    count_totals: HashMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: HashMap::new(),
                span_counts: HashMap::new(),
                count_totals: HashMap::new(),
            })),
        })
    }

    pub fn log_span_ms(&self, name: &str, glyph: Option<u32>, ms: f64) {
        let glyph = glyph
            .map(|v| v.to_string())
            .unwrap_or_else(|| "null".to_string());
        let json = format!(
            "{{\"type\":\"perf.span\",\"name\":\"{}\",\"glyph\":{},\"unit\":\"ms\",\"ms\":{:.3}}}",
            json_escape(name),
            glyph,
            ms
        );
        if let Ok(mut state) = self.inner.lock() {
            *state.span_totals.entry(name.to_string()).or_insert(0.0) += ms;
            let entry = state.span_counts.entry(name.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn log_counts(&self, name: &str, glyph: Option<u32>, counts: &[(&str, u64)]) {
        let glyph = glyph
            .map(|v| v.to_string())
            .unwrap_or_else(|| "null".to_string());
        let mut out = format!(
            "{{\"type\":\"perf.counts\",\"name\":\"{}\",\"glyph\":{},\"counts\":{{",
            json_escape(name),
            glyph
        );
        for (idx, (key, value)) in counts.iter().enumerate() {
            if idx > 0 {
                out.push(',');
            }
            out.push_str(&format!("\"{}\":{}", json_escape(key), value));
        }
        out.push_str("}}");
        if let Ok(mut state) = self.inner.lock() {
            for (key, value) in counts {
                let full_key = format!("{name}.{key}");
                let entry = state.count_totals.entry(full_key).or_insert(0);
                *entry = entry.saturating_add(*value);
            }
            let _ = writeln!(state.writer, "{out}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

/// Times a span against an optional logger; logs when dropped.
pub(crate) struct SpanTimer<'a> {
    perf: Option<&'a PerfLogger>,
    name: &'static str,
    glyph: Option<u32>,
    start: Instant,
}

impl<'a> SpanTimer<'a> {
    pub fn start(perf: Option<&'a PerfLogger>, name: &'static str, glyph: Option<u32>) -> Self {
        Self {
            perf,
            name,
            glyph,
            start: Instant::now(),
        }
    }
}

impl Drop for SpanTimer<'_> {
    fn drop(&mut self) {
        if let Some(perf) = self.perf {
            perf.log_span_ms(self.name, self.glyph, self.start.elapsed().as_secs_f64() * 1000.0);
        }
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let hot_path = hot_path_for(&self.path);
        let Ok(file) = File::create(&hot_path) else {
            return;
        };
        let mut writer = BufWriter::new(file);

        let mut spans: Vec<(&String, &f64)> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (rank, (name, ms)) in spans.into_iter().take(100).enumerate() {
            let count = *self.span_counts.get(name).unwrap_or(&1);
            let avg = if count == 0 { 0.0 } else { ms / count as f64 };
            let _ = writeln!(
                writer,
                "{{\"type\":\"perf.hot.span\",\"rank\":{},\"name\":\"{}\",\"unit\":\"ms\",\"agg\":\"sum\",\"ms\":{:.3},\"count\":{},\"avg_ms\":{:.3}}}",
                rank + 1,
                json_escape(name),
                ms,
                count,
                avg
            );
        }

        let mut counts: Vec<(&String, &u64)> = self.count_totals.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));
        for (rank, (name, value)) in counts.into_iter().take(100).enumerate() {
            let _ = writeln!(
                writer,
                "{{\"type\":\"perf.hot.count\",\"rank\":{},\"name\":\"{}\",\"value\":{}}}",
                rank + 1,
                json_escape(name),
                value
            );
        }
    }
}

fn hot_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("svgglyph_perf.log");
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(file_name);
    path.with_file_name(format!("{stem}_hot.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_log_sits_next_to_the_perf_log() {
        assert_eq!(
            hot_path_for(Path::new("/tmp/run.perf.log")),
            PathBuf::from("/tmp/run.perf_hot.log")
        );
        assert_eq!(hot_path_for(Path::new("/tmp/perf")), PathBuf::from("/tmp/perf_hot.log"));
    }

    #[test]
    fn spans_and_hot_summary_are_written() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("svgglyph_perf_{}.log", std::process::id()));
        {
            let perf = PerfLogger::new(&path).expect("create perf log");
            {
                let _timer = SpanTimer::start(Some(&perf), "svg.render_glyph", Some(9));
            }
            perf.log_counts("svg.render_glyph", Some(9), &[("paint_calls", 4)]);
        }
        let text = std::fs::read_to_string(&path).expect("read perf log");
        assert!(text.contains("\"name\":\"svg.render_glyph\",\"glyph\":9"));
        assert!(text.contains("\"paint_calls\":4"));
        let hot = hot_path_for(&path);
        let hot_text = std::fs::read_to_string(&hot).expect("read hot log");
        assert!(hot_text.contains("perf.hot.span"));
        assert!(hot_text.contains("svg.render_glyph.paint_calls"));
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(&hot);
    }
}
