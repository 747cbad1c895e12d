//! Resource value parsing for time, size and plain numeric option values.

/// The unit family a value was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Seconds, written with colons (`[[HH:]MM:]SS`).
    Time,
    /// Bytes, written with a size suffix (`b`, `kb`, ..., `pb`, `w`).
    Size,
    Number,
    Boolean,
}

/// A parsed resource value. Time is in seconds, size in bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceValue {
    pub amount: f64,
    pub kind: ValueKind,
}

impl ResourceValue {
    pub fn is_time(&self) -> bool {
        self.kind == ValueKind::Time
    }
}

/// Converts option values carrying units into numbers.
pub trait ResourceValueParser {
    /// Returns `None` when the value is not understood at all.
    fn parse(&self, value: &str) -> Option<ResourceValue>;
}

/// Default parser following the scheduler's resource value conventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitParser;

/// Bytes in one word.
const WORD_SIZE: f64 = 8.0;

impl ResourceValueParser for UnitParser {
    fn parse(&self, value: &str) -> Option<ResourceValue> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value.contains(':') {
            return parse_time(value).map(|secs| ResourceValue {
                amount: secs,
                kind: ValueKind::Time,
            });
        }
        if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
            return Some(ResourceValue {
                amount: if value.eq_ignore_ascii_case("true") { 1.0 } else { 0.0 },
                kind: ValueKind::Boolean,
            });
        }
        if let Ok(amount) = value.parse::<f64>() {
            return amount.is_finite().then_some(ResourceValue {
                amount,
                kind: ValueKind::Number,
            });
        }
        parse_size(value).map(|bytes| ResourceValue {
            amount: bytes,
            kind: ValueKind::Size,
        })
    }
}

fn parse_time(value: &str) -> Option<f64> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let (last, whole) = parts.split_last()?;
    let seconds = decimal_seconds(last)?;
    let mut total = 0.0;
    for part in whole {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        total = total * 60.0 + part.parse::<f64>().ok()?;
    }
    Some(total * 60.0 + seconds)
}

/// `digits[.digits]` only, so exponents and signs never count as seconds.
fn decimal_seconds(part: &str) -> Option<f64> {
    let (int, frac) = part.split_once('.').unwrap_or((part, "0"));
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !(digits(int) && digits(frac)) {
        return None;
    }
    part.parse().ok()
}

fn parse_size(value: &str) -> Option<f64> {
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|i| *i > 0)?;
    let (number, suffix) = value.split_at(split);
    let number: f64 = number.parse().ok()?;
    let multiplier = match suffix.to_ascii_lowercase().as_str() {
        "b" => 1.0,
        "w" => WORD_SIZE,
        "kb" => 1024.0,
        "kw" => 1024.0 * WORD_SIZE,
        "mb" => 1024f64.powi(2),
        "mw" => 1024f64.powi(2) * WORD_SIZE,
        "gb" => 1024f64.powi(3),
        "gw" => 1024f64.powi(3) * WORD_SIZE,
        "tb" => 1024f64.powi(4),
        "tw" => 1024f64.powi(4) * WORD_SIZE,
        "pb" => 1024f64.powi(5),
        "pw" => 1024f64.powi(5) * WORD_SIZE,
        _ => return None,
    };
    Some(number * multiplier)
}
