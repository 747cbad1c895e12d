//! Tokenizer for a single sched_config line.

/// Whitespace- and quote-aware scanner over one line.
///
/// Each call to [`LineScanner::next_token`] resumes where the previous one
/// stopped. A token starting with `'` or `"` runs to the matching quote and is
/// returned without the quotes; any other token ends at whitespace, the
/// delimiter, or end of line. The terminating character is consumed.
#[derive(Debug, Clone)]
pub struct LineScanner<'a> {
    line: &'a str,
    cursor: Option<usize>,
}

impl<'a> LineScanner<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            line,
            cursor: Some(0),
        }
    }

    /// Return the next token, or `None` once the line is exhausted.
    ///
    /// `delimiter` is honoured in addition to whitespace; `None` means space.
    pub fn next_token(&mut self, delimiter: Option<char>) -> Option<&'a str> {
        let target = delimiter.unwrap_or(' ');
        let pos = self.cursor?;

        let rest = &self.line[pos..];
        let Some(skip) = rest.find(|c: char| !(c.is_ascii_whitespace() || c == target)) else {
            self.cursor = None;
            return None;
        };
        let start = pos + skip;
        let tail = &self.line[start..];

        if let Some(quote) = tail.chars().next().filter(|c| *c == '"' || *c == '\'') {
            let body = start + quote.len_utf8();
            return match self.line[body..].find(quote) {
                Some(len) => {
                    let end = body + len;
                    self.cursor = Some(end + quote.len_utf8());
                    Some(&self.line[body..end])
                }
                None => {
                    self.cursor = None;
                    Some(&self.line[body..])
                }
            };
        }

        match tail.find(|c: char| c.is_ascii_whitespace() || c == target) {
            Some(len) => {
                let end = start + len;
                let term = self.line[end..].chars().next().map_or(1, char::len_utf8);
                self.cursor = Some(end + term);
                Some(&self.line[start..end])
            }
            None => {
                self.cursor = None;
                Some(tail)
            }
        }
    }

    /// Skip whitespace and at most one `c`.
    pub fn skip_char(&mut self, c: char) {
        let Some(pos) = self.cursor else {
            return;
        };
        let rest = &self.line[pos..];
        let trimmed = rest.trim_start_matches(|ch: char| ch.is_ascii_whitespace());
        let mut next = pos + (rest.len() - trimmed.len());
        if trimmed.starts_with(c) {
            next += c.len_utf8();
        }
        self.cursor = Some(next);
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }
}

/// Split a comma-separated list, trimming items and dropping empty ones.
pub fn split_comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_value_qualifier() {
        let mut scanner = LineScanner::new("round_robin: true\tprime");
        assert_eq!(scanner.next_token(Some(':')), Some("round_robin"));
        assert_eq!(scanner.next_token(None), Some("true"));
        assert_eq!(scanner.next_token(None), Some("prime"));
        assert_eq!(scanner.next_token(None), None);
        assert!(scanner.is_exhausted());
    }

    #[test]
    fn quoted_values_keep_inner_whitespace() {
        let mut scanner = LineScanner::new("job_sort_key: \"ncpus HIGH\" all");
        assert_eq!(scanner.next_token(Some(':')), Some("job_sort_key"));
        assert_eq!(scanner.next_token(None), Some("ncpus HIGH"));
        assert_eq!(scanner.next_token(None), Some("all"));
        assert_eq!(scanner.next_token(None), None);
    }

    #[test]
    fn single_quotes_and_unterminated_quote() {
        let mut scanner = LineScanner::new("a: 'x y");
        assert_eq!(scanner.next_token(Some(':')), Some("a"));
        assert_eq!(scanner.next_token(None), Some("x y"));
        assert_eq!(scanner.next_token(None), None);
    }

    #[test]
    fn colon_inside_value_is_not_a_delimiter() {
        let mut scanner = LineScanner::new("max_starve: 24:00:00");
        assert_eq!(scanner.next_token(Some(':')), Some("max_starve"));
        assert_eq!(scanner.next_token(None), Some("24:00:00"));
    }

    #[test]
    fn skip_char_handles_spaced_colon() {
        let mut scanner = LineScanner::new("backfill   :  false");
        assert_eq!(scanner.next_token(Some(':')), Some("backfill"));
        scanner.skip_char(':');
        assert_eq!(scanner.next_token(None), Some("false"));
    }

    #[test]
    fn empty_line_has_no_tokens() {
        let mut scanner = LineScanner::new("   \t ");
        assert_eq!(scanner.next_token(None), None);
        assert_eq!(scanner.next_token(None), None);
    }

    #[test]
    fn comma_lists() {
        assert_eq!(split_comma_list("ncpus, mem,,arch "), vec!["ncpus", "mem", "arch"]);
        assert!(split_comma_list("").is_empty());
    }
}
