//! Splits a raw line into option name, value and time-window qualifier.

use crate::lexer::LineScanner;
use crate::policy::Window;
use crate::report::LineError;

/// The time-window qualifier trailing an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    Prime,
    NonPrime,
    #[default]
    All,
    None,
}

impl TimeWindow {
    pub fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("prime") {
            Some(TimeWindow::Prime)
        } else if token.eq_ignore_ascii_case("non_prime") {
            Some(TimeWindow::NonPrime)
        } else if token.eq_ignore_ascii_case("all") {
            Some(TimeWindow::All)
        } else if token.eq_ignore_ascii_case("none") {
            Some(TimeWindow::None)
        } else {
            None
        }
    }

    pub fn includes(self, window: Window) -> bool {
        match window {
            Window::Prime => matches!(self, TimeWindow::Prime | TimeWindow::All),
            Window::NonPrime => matches!(self, TimeWindow::NonPrime | TimeWindow::All),
        }
    }

    /// The concrete windows this qualifier writes to.
    pub fn windows(self) -> impl Iterator<Item = Window> {
        [Window::Prime, Window::NonPrime]
            .into_iter()
            .filter(move |w| self.includes(*w))
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeWindow::Prime => "prime",
            TimeWindow::NonPrime => "non_prime",
            TimeWindow::All => "all",
            TimeWindow::None => "none",
        }
    }
}

/// One classified configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLine<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub window: TimeWindow,
    /// `true`/`false` as 1/0, or the leading base-10 digits of the value.
    pub number: Option<i64>,
}

impl ConfigLine<'_> {
    pub fn flag(&self) -> Option<bool> {
        self.number.map(|n| n != 0)
    }
}

/// Blank lines and `#` comments carry no configuration.
pub fn is_skippable(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Classify one raw line. Returns `Ok(None)` for lines to skip.
pub fn classify(raw: &str) -> Result<Option<ConfigLine<'_>>, LineError> {
    if is_skippable(raw) {
        return Ok(None);
    }

    let mut scanner = LineScanner::new(raw);
    let name = scanner.next_token(Some(':'));
    scanner.skip_char(':');
    let value = scanner.next_token(None);
    let qualifier = scanner.next_token(None);

    let (Some(name), Some(value)) = (name, value) else {
        return Err(LineError::Incomplete);
    };

    let window = match qualifier {
        Some(token) => {
            TimeWindow::parse(token).ok_or_else(|| LineError::InvalidQualifier(token.to_string()))?
        }
        None => TimeWindow::All,
    };

    Ok(Some(ConfigLine {
        name,
        value,
        window,
        number: literal_number(value),
    }))
}

fn literal_number(value: &str) -> Option<i64> {
    if value.eq_ignore_ascii_case("true") {
        return Some(1);
    }
    if value.eq_ignore_ascii_case("false") {
        return Some(0);
    }
    let digits = value.len() - value.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    value[..digits].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_skip() {
        assert_eq!(classify("").unwrap(), None);
        assert_eq!(classify("   \n").unwrap(), None);
        assert_eq!(classify("  # round_robin: true").unwrap(), None);
    }

    #[test]
    fn booleans_are_case_insensitive() {
        let line = classify("by_queue: TRUE").unwrap().unwrap();
        assert_eq!(line.name, "by_queue");
        assert_eq!(line.number, Some(1));
        assert_eq!(line.window, TimeWindow::All);
        let line = classify("by_queue: False prime").unwrap().unwrap();
        assert_eq!(line.flag(), Some(false));
        assert_eq!(line.window, TimeWindow::Prime);
    }

    #[test]
    fn numbers_take_leading_digits() {
        assert_eq!(classify("unknown_shares: 10").unwrap().unwrap().number, Some(10));
        assert_eq!(classify("max_starve: 24:00:00").unwrap().unwrap().number, Some(24));
        assert_eq!(classify("fairshare_usage_res: cput").unwrap().unwrap().number, None);
    }

    #[test]
    fn qualifiers() {
        for (token, expected) in [
            ("NON_PRIME", TimeWindow::NonPrime),
            ("non_prime", TimeWindow::NonPrime),
            ("ALL", TimeWindow::All),
            ("none", TimeWindow::None),
        ] {
            let text = format!("round_robin: true {token}");
            assert_eq!(classify(&text).unwrap().unwrap().window, expected);
        }
        assert_eq!(
            classify("round_robin: true sometimes"),
            Err(LineError::InvalidQualifier("sometimes".to_string()))
        );
    }

    #[test]
    fn missing_value_is_an_error() {
        assert_eq!(classify("round_robin:"), Err(LineError::Incomplete));
        assert_eq!(classify("round_robin"), Err(LineError::Incomplete));
    }

    #[test]
    fn window_expansion() {
        assert_eq!(TimeWindow::All.windows().count(), 2);
        assert_eq!(TimeWindow::Prime.windows().collect::<Vec<_>>(), vec![Window::Prime]);
        assert_eq!(TimeWindow::None.windows().count(), 0);
    }
}
