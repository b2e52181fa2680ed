//! Log sanitization for patient identifiers and key material.
//!
//! Clinical inputs are numeric and are never logged verbatim, but error
//! messages and file paths can still carry identifiers. Every formatted log
//! line passes through [`SanitizingMakeWriter`], which redacts:
//! - UUIDs
//! - medical record numbers and resident ID numbers
//! - email addresses and phone numbers
//! - secrets and long hex strings (signing seeds, hashes)
//!
//! `sanitize()` caps the input size (`GNSTART_SANITIZE_MAX_BYTES`, default
//! 16 KiB) so a huge line cannot stall the logger.

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static PII_PATTERNS: OnceLock<Option<PiiPatterns>> = OnceLock::new();

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

/// Emitted instead of a line when the patterns failed to compile.
const DROPPED_LINE: &str = "[LOG LINE DROPPED: sanitizer unavailable]\n";

const RULES: [(&str, &str); 9] = [
    (
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        "[REDACTED-UUID]",
    ),
    (r"\bMRN[:\s]?\d{6,10}\b", "[REDACTED-MRN]"),
    // 18-character resident identity number
    (r"\b\d{17}[\dXx]\b", "[REDACTED-ID]"),
    (
        r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
        "[REDACTED-EMAIL]",
    ),
    // Mainland mobile numbers
    (r"\b(?:\+?86[-\s]?)?1[3-9]\d{9}\b", "[REDACTED-PHONE]"),
    (
        r"\b(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b",
        "[REDACTED-PHONE]",
    ),
    (
        r"(?i)\b(?:secret|password|private[_-]?key|seed|signature|sig|token|key)\b\s*[:=]\s*[A-Za-z0-9+/]{32,}={0,2}",
        "[REDACTED-SECRET]",
    ),
    (
        r"(?i)\b(?:secret|password|private[_-]?key|seed|signature|sig|token|key)\b\s*[:=]\s*[0-9a-fA-F]{16,}\b",
        "[REDACTED-SECRET]",
    ),
    (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-KEY]"),
];

struct PiiPattern {
    regex: Regex,
    replacement: &'static str,
}

struct PiiPatterns {
    set: RegexSet,
    patterns: Vec<PiiPattern>,
}

impl PiiPatterns {
    fn compile() -> Result<Self, regex::Error> {
        let set = RegexSet::new(RULES.iter().map(|(p, _)| *p))?;
        let patterns = RULES
            .iter()
            .map(|&(pattern, replacement)| {
                Ok(PiiPattern {
                    regex: Regex::new(pattern)?,
                    replacement,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { set, patterns })
    }
}

fn get_patterns() -> Option<&'static PiiPatterns> {
    PII_PATTERNS
        .get_or_init(|| PiiPatterns::compile().ok())
        .as_ref()
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var("GNSTART_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

/// Replace every identifier and secret pattern in `input`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let Some(patterns) = get_patterns() else {
        return DROPPED_LINE.to_string();
    };

    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    // Apply in rule order, only the rules that matched the original text.
    for idx in patterns.set.matches(prefix).iter() {
        let pattern = &patterns.patterns[idx];
        result = pattern
            .regex
            .replace_all(&result, pattern.replacement)
            .into_owned();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Whether `input` contains anything `sanitize` would redact.
#[must_use]
pub fn contains_pii(input: &str) -> bool {
    let (prefix, _) = truncate_to_char_boundary(input, max_sanitize_bytes());
    get_patterns().map_or(true, |p| p.set.is_match(prefix))
}

/// A `tracing_subscriber` writer wrapper that sanitizes each formatted line
/// before it reaches the underlying sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

pub struct SanitizingWriter<W> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W> SanitizingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let sanitized = sanitize(&String::from_utf8_lossy(&line));
            self.inner.write_all(sanitized.as_bytes())?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A line with no newline must not buffer without bound.
        let hard_cap = max_sanitize_bytes().saturating_mul(2);
        if self.buffer.len() > hard_cap {
            let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(sanitized.as_bytes())?;
            self.inner.write_all(b"\n[TRUNCATED]\n")?;
            self.buffer.clear();
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(sanitized.as_bytes())?;
            self.buffer.clear();
        }
        self.inner.flush()
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_patterns_compile() {
        assert!(get_patterns().is_some());
    }

    #[test]
    fn test_sanitize_uuid() {
        let sanitized = sanitize("Assessment 550e8400-e29b-41d4-a716-446655440000 complete");
        assert!(sanitized.contains("[REDACTED-UUID]"));
        assert!(!sanitized.contains("550e8400"));
    }

    #[test]
    fn test_sanitize_mrn() {
        let sanitized = sanitize("MRN:12345678 found");
        assert!(sanitized.contains("[REDACTED-MRN]"));
    }

    #[test]
    fn test_sanitize_resident_id() {
        let sanitized = sanitize("id 11010519900307123X submitted");
        assert!(sanitized.contains("[REDACTED-ID]"));
        assert!(!sanitized.contains("19900307"));
    }

    #[test]
    fn test_sanitize_mobile_and_email() {
        let sanitized = sanitize("call 13812345678 or mail patient@hospital.cn");
        assert!(sanitized.contains("[REDACTED-PHONE]"));
        assert!(sanitized.contains("[REDACTED-EMAIL]"));
        assert!(!sanitized.contains("13812345678"));
    }

    #[test]
    fn test_sanitize_seed_and_hash() {
        let seed = sanitize("seed=QWxhZGRpbjpvcGVuIHNlc2FtZSB3aXRoIGxvbmcgc2VjcmV0IHZhbHVl");
        assert!(seed.contains("[REDACTED-SECRET]"));

        let hash =
            sanitize("sha256 ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert!(hash.contains("[REDACTED-KEY]"));
    }

    #[test]
    fn test_clinical_log_lines_pass_through() {
        let line = "Prediction complete: dose=150 IU, drug=rFSH, protocol=Antagonist, total_dose=1800 IU, total_days=9.0, trigger=day 11 (class 1)";
        assert!(!contains_pii(line));
        assert_eq!(sanitize(line), line);
    }

    #[test]
    fn test_sanitize_truncates_large_inputs() {
        let sanitized = sanitize_with_limit("年龄 0123456789abcdef0123456789abcdef", 4);
        assert!(sanitized.ends_with("[TRUNCATED]"));
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_sanitizes_whole_lines() {
        let sink = Sink::default();
        let make = SanitizingMakeWriter::new({
            let sink = sink.clone();
            move || sink.clone()
        });

        let mut writer = make.make_writer();
        writer.write_all(b"loaded MRN:1234").expect("write");
        writer.write_all(b"5678 ok\npartial").expect("write");
        writer.flush().expect("flush");

        let out = String::from_utf8(sink.0.lock().expect("lock").clone()).expect("utf8");
        assert_eq!(out, "loaded [REDACTED-MRN] ok\npartial");
    }
}
