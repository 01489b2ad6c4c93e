//! Display text for keys and values.
//!
//! Pure functions from values to text: no display state, no surface calls.
//! Numeric rendering honors a configurable decimal precision (negative means
//! "no rounding") and strips trailing zeros and a trailing decimal point.
//! Truncation is grapheme-aware and measured in display cells.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::value::{Key, Value, ValueKind};

/// Placeholder shown for callable values.
pub const CALLABLE_PLACEHOLDER: &str = "<callable>";

// =============================================================================
// Options
// =============================================================================

/// Formatting knobs, derived from the viewer config.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    /// Decimal places for numbers. Negative = no rounding.
    pub precision: i32,
    /// Render containers as an element-count summary; empty text otherwise.
    pub summarize_containers: bool,
    /// Maximum display width in cells for value text. 0 = unlimited.
    pub truncate_width: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            precision: -1,
            summarize_containers: true,
            truncate_width: 0,
        }
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Render a key for display and filter matching.
pub fn format_key(key: &Key) -> String {
    match key {
        Key::Text(s) => s.clone(),
        Key::Number(n) => format_number(*n, -1),
    }
}

/// Coerce an arbitrary value into a key.
///
/// Text and numbers map directly; callables and containers stringify through
/// their display form; anything else renders as `kind (repr)`.
pub fn coerce_key(value: &Value) -> Key {
    match value {
        Value::Text(s) => Key::Text(s.clone()),
        Value::Number(n) => Key::Number(*n),
        Value::Callable(_) | Value::Table(_) => {
            Key::Text(format_value(value, &FormatOptions::default()))
        }
        other => Key::Text(format!(
            "{} ({})",
            other.kind().name(),
            format_value(other, &FormatOptions::default())
        )),
    }
}

// =============================================================================
// Values
// =============================================================================

/// Element-count summary for containers. Shared with the reconciler, which
/// knows counts but not a `Value::Table`.
pub fn container_summary(count: usize, summarize: bool) -> String {
    if summarize {
        format!("[{count} items]")
    } else {
        String::new()
    }
}

/// Render a value according to the options.
pub fn format_value(value: &Value, opts: &FormatOptions) -> String {
    let text = match value {
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n, opts.precision),
        Value::Text(s) => format!("\"{s}\""),
        Value::Table(t) => container_summary(t.len(), opts.summarize_containers),
        Value::Callable(_) => CALLABLE_PLACEHOLDER.to_string(),
        Value::External(id) => format!("<external {id}>"),
        Value::Other(s) => {
            if opts.precision >= 0 {
                round_embedded_numbers(s, opts.precision)
            } else {
                s.clone()
            }
        }
    };
    truncate_display(&text, opts.truncate_width)
}

/// Render a number with the given precision, stripping trailing zeros and a
/// trailing decimal point.
pub fn format_number(n: f64, precision: i32) -> String {
    if precision < 0 {
        return n.to_string();
    }
    let places = precision as usize;
    let rendered = format!("{n:.places$}");
    if rendered.contains('.') {
        rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        rendered
    }
}

/// Re-round numeric substrings embedded in stringified scalars, so values
/// like `"vec(1.23456, 2.5)"` honor the configured precision.
fn round_embedded_numbers(s: &str, precision: i32) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run = String::new();
    let mut seen_dot = false;

    let flush = |out: &mut String, run: &mut String, seen_dot: &mut bool| {
        if *seen_dot {
            match run.parse::<f64>() {
                Ok(n) => out.push_str(&format_number(n, precision)),
                Err(_) => out.push_str(run),
            }
        } else {
            out.push_str(run);
        }
        run.clear();
        *seen_dot = false;
    };

    for c in s.chars() {
        if c.is_ascii_digit() {
            run.push(c);
        } else if c == '.' && !seen_dot && !run.is_empty() {
            run.push(c);
            seen_dot = true;
        } else {
            flush(&mut out, &mut run, &mut seen_dot);
            out.push(c);
        }
    }
    flush(&mut out, &mut run, &mut seen_dot);
    out
}

// =============================================================================
// Truncation
// =============================================================================

/// Truncate to a display width in cells, appending an ellipsis.
///
/// Cuts on grapheme boundaries so combining sequences and emoji survive.
/// `max_width` of 0 disables truncation.
pub fn truncate_display(s: &str, max_width: usize) -> String {
    if max_width == 0 || s.width() <= max_width {
        return s.to_string();
    }
    let budget = max_width.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0usize;
    for grapheme in s.graphemes(true) {
        let w = grapheme.width();
        if used + w > budget {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out.push('…');
    out
}

// =============================================================================
// Tests
// =============================================================================
