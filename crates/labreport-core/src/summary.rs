//! Short titles derived from analysis text.
//!
//! The analysis engine is asked to open its report with a labelled line such
//! as `**检测项目**: 血常规、肝功能`. The value of the first such line becomes
//! the record's summary; anything else falls back to a fixed label.

use once_cell::sync::Lazy;
use regex::Regex;

/// Label of the field holding the primary test category.
pub const SUMMARY_LABEL: &str = "检测项目";

/// Summary used when the labelled field is absent or empty.
pub const FALLBACK_SUMMARY: &str = "化验单解读";

// Up to two emphasis markers on either side of the label, a half- or
// full-width colon, then the rest of the line.
static SUMMARY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*{0,2}检测项目\*{0,2}[ \t]*[:：][ \t]*([^\r\n]+)")
        .expect("summary pattern is a valid regex")
});

/// Derive a short title from raw analysis text.
///
/// Pure and infallible: when no usable labelled field exists the
/// [`FALLBACK_SUMMARY`] is returned.
pub fn extract_summary(analysis_text: &str) -> String {
    SUMMARY_PATTERN
        .captures_iter(analysis_text)
        .next()
        .and_then(|caps| caps.get(1))
        .map(|m| strip_emphasis(m.as_str()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_SUMMARY.to_string())
}

fn strip_emphasis(value: &str) -> String {
    value.replace("**", "").trim().to_string()
}
