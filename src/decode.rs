use crate::statics;
use indexmap::IndexMap;
use thiserror::Error;

/// Decoded key/value pairs in order of first appearance.
pub type Entries = IndexMap<String, String>;

/// Lexical failure while decoding properties text. Aborts the whole decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("incomplete unicode escape '{escape}' on line {line}")]
    IncompleteUnicodeEscape { line: usize, escape: String },
}

/// Decode properties text into an ordered mapping.
///
/// Later occurrences of a key overwrite the value but keep the position of the first one.
/// On error nothing is returned; callers never observe a partially decoded mapping.
pub fn decode(text: &str) -> Result<Entries, LexError> {
    let mut entries = Entries::new();
    let mut lines = PhysicalLines::new(text);

    while let Some((line_no, line)) = lines.next() {
        if is_comment_or_blank(line) {
            continue;
        }

        let mut logical = LogicalLine::default();
        let (mut line_no, mut line) = (line_no, line);
        loop {
            match logical.scan(line_no, line)? {
                LineEnd::Done => break,
                // A continuation marker on the last line simply ends the entry.
                LineEnd::Continued => match lines.next() {
                    Some(next) => {
                        (line_no, line) = next;
                    }
                    None => break,
                },
            }
        }

        let (key, value) = logical.finish();
        entries.insert(key, value);
    }

    tracing::trace!(entries = entries.len(), "decoded properties text");
    Ok(entries)
}

fn is_comment_or_blank(line: &str) -> bool {
    match line.chars().next() {
        None => true,
        Some(c) => c == statics::COMMENT_HASH || c == statics::COMMENT_BANG,
    }
}

/// Physical lines split on `\r\n`, `\r` or `\n`, leading whitespace stripped.
/// Yields 1-based line numbers alongside the text.
struct PhysicalLines<'a> {
    rest: Option<&'a str>,
    line: usize,
}

impl<'a> PhysicalLines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            rest: Some(text),
            line: 0,
        }
    }
}

impl<'a> Iterator for PhysicalLines<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        let (line, tail) = match rest.find(['\r', '\n']) {
            Some(i) => {
                let terminator = if rest[i..].starts_with(statics::NL_CRLF) { 2 } else { 1 };
                (&rest[..i], Some(&rest[i + terminator..]))
            }
            None => (rest, None),
        };
        self.rest = tail;
        self.line += 1;
        Some((self.line, line.trim_start_matches(statics::is_horizontal_ws)))
    }
}

/// Whether the separator can still be recognized on the current logical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ScanState {
    #[default]
    Key,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnd {
    Done,
    Continued,
}

/// Accumulator for one logical line (a physical line plus its continuations).
#[derive(Debug, Default)]
struct LogicalLine {
    state: ScanState,
    key: Option<String>,
    buf: String,
    /// High surrogate from a `\u` escape, waiting for its low half.
    pending_high: Option<u32>,
}

impl LogicalLine {
    fn scan(&mut self, line_no: usize, line: &str) -> Result<LineEnd, LexError> {
        let mut pos = 0;
        while let Some(c) = line[pos..].chars().next() {
            let rest = &line[pos..];
            if c == statics::ESCAPE {
                let after = &rest[1..];
                match after.chars().next() {
                    None => return Ok(LineEnd::Continued),
                    Some(statics::UNICODE_ESCAPE_MARKER) => {
                        self.unicode_escape(line_no, &after[1..])?;
                        pos += 2 + statics::UNICODE_ESCAPE_DIGITS;
                    }
                    Some(e) => {
                        self.push(statics::special_escape(e).unwrap_or(e));
                        pos += 1 + e.len_utf8();
                    }
                }
            } else if self.state == ScanState::Key
                && (statics::is_horizontal_ws(c) || statics::is_explicit_separator(c))
            {
                self.flush_pending();
                self.key = Some(std::mem::take(&mut self.buf));
                self.state = ScanState::Value;
                pos += separator_len(rest);
            } else {
                self.push(c);
                pos += c.len_utf8();
            }
        }
        Ok(LineEnd::Done)
    }

    /// Decode the four hex digits following `\u` as one UTF-16 unit.
    fn unicode_escape(&mut self, line_no: usize, digits: &str) -> Result<(), LexError> {
        let Some(unit) = hex_unit(digits) else {
            let found = digits
                .bytes()
                .take(statics::UNICODE_ESCAPE_DIGITS)
                .take_while(u8::is_ascii_hexdigit)
                .count();
            return Err(LexError::IncompleteUnicodeEscape {
                line: line_no,
                escape: format!("\\u{}", &digits[..found]),
            });
        };

        match (self.pending_high.take(), unit) {
            (Some(high), 0xDC00..=0xDFFF) => {
                let cp = 0x1_0000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                self.buf
                    .push(char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            (pending, 0xD800..=0xDBFF) => {
                if pending.is_some() {
                    self.buf.push(char::REPLACEMENT_CHARACTER);
                }
                self.pending_high = Some(unit);
            }
            (pending, _) => {
                if pending.is_some() {
                    self.buf.push(char::REPLACEMENT_CHARACTER);
                }
                self.buf
                    .push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
        }
        Ok(())
    }

    fn push(&mut self, c: char) {
        self.flush_pending();
        self.buf.push(c);
    }

    /// An unpaired high surrogate cannot be held in a `String`.
    fn flush_pending(&mut self) {
        if self.pending_high.take().is_some() {
            self.buf.push(char::REPLACEMENT_CHARACTER);
        }
    }

    fn finish(mut self) -> (String, String) {
        self.flush_pending();
        match self.key {
            Some(key) => (key, self.buf),
            None => (self.buf, String::new()),
        }
    }
}

/// Exactly four hex digits at the start of `s`, as a UTF-16 code unit.
fn hex_unit(s: &str) -> Option<u32> {
    let digits = s.get(..statics::UNICODE_ESCAPE_DIGITS)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Length in bytes of `[ \t\f]*[ \t\f:=][ \t\f]*` at the start of `rest`.
/// `rest` must start with whitespace or an explicit separator.
fn separator_len(rest: &str) -> usize {
    let ws_run = |s: &str| s.len() - s.trim_start_matches(statics::is_horizontal_ws).len();

    let lead = ws_run(rest);
    match rest[lead..].chars().next() {
        Some(c) if statics::is_explicit_separator(c) => {
            lead + c.len_utf8() + ws_run(&rest[lead + c.len_utf8()..])
        }
        _ => lead,
    }
}

#[cfg(test)]
mod tests {
    use super::{LexError, decode, separator_len};

    fn pairs(text: &str) -> Vec<(String, String)> {
        decode(text).unwrap().into_iter().collect()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn separators_comments_and_blank_lines() {
        assert_eq!(
            pairs("a=1\nb:2\n# comment\nc 3\n"),
            vec![pair("a", "1"), pair("b", "2"), pair("c", "3")]
        );
        assert_eq!(
            pairs("\n   \n! bang comment\n\t# indented comment\nx=y"),
            vec![pair("x", "y")]
        );
    }

    #[test]
    fn empty_text_is_empty_mapping() {
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn separator_absorbs_surrounding_whitespace_once() {
        assert_eq!(pairs("key  =  value"), vec![pair("key", "value")]);
        assert_eq!(pairs("key\t:\tvalue"), vec![pair("key", "value")]);
        assert_eq!(pairs("key   value"), vec![pair("key", "value")]);
        // Only the first separator counts; the rest is value text.
        assert_eq!(pairs("key = a = b : c"), vec![pair("key", "a = b : c")]);
        assert_eq!(pairs("key : = v"), vec![pair("key", "= v")]);
    }

    #[test]
    fn separator_len_matches_greedy_pattern() {
        assert_eq!(separator_len(" = v"), 3);
        assert_eq!(separator_len("   v"), 3);
        assert_eq!(separator_len(":v"), 1);
        assert_eq!(separator_len("\t:\u{000C} v"), 4);
    }

    #[test]
    fn missing_separator_yields_empty_value() {
        assert_eq!(pairs("onlykey"), vec![pair("onlykey", "")]);
        assert_eq!(pairs("=value"), vec![pair("", "value")]);
    }

    #[test]
    fn leading_whitespace_stripped_trailing_kept() {
        assert_eq!(pairs("  \t key=value  "), vec![pair("key", "value  ")]);
    }

    #[test]
    fn escapes_in_key_and_value() {
        assert_eq!(pairs(r"a\=b\:c=d\\e"), vec![pair("a=b:c", r"d\e")]);
        assert_eq!(pairs(r"sp\ ace=x"), vec![pair("sp ace", "x")]);
        assert_eq!(pairs(r"k=\t\n\r\f\q\#"), vec![pair("k", "\t\n\r\u{000C}q#")]);
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!(pairs(r"k=\u0041BC"), vec![pair("k", "ABC")]);
        assert_eq!(pairs(r"\u00e9t\u00E9=caf\u00e9"), vec![pair("été", "café")]);
        // Only four digits belong to the escape.
        assert_eq!(pairs(r"k=\u00410"), vec![pair("k", "A0")]);
    }

    #[test]
    fn surrogate_pairs_combine_and_lone_surrogates_are_replaced() {
        assert_eq!(pairs(r"k=\ud83d\ude00"), vec![pair("k", "😀")]);
        assert_eq!(pairs(r"k=\ud83dx"), vec![pair("k", "\u{FFFD}x")]);
        assert_eq!(pairs(r"k=\ude00"), vec![pair("k", "\u{FFFD}")]);
        assert_eq!(pairs(r"k=\ud83d\ud83d\ude00"), vec![pair("k", "\u{FFFD}😀")]);
        assert_eq!(pairs(r"k=\ud83d"), vec![pair("k", "\u{FFFD}")]);
        // The key ends at the separator, so a pending half is not carried into the value.
        assert_eq!(pairs(r"\ud83d=\ude00"), vec![pair("\u{FFFD}", "\u{FFFD}")]);
    }

    #[test]
    fn surrogate_pair_split_by_continuation_combines() {
        assert_eq!(pairs("k=\\ud83d\\\n  \\ude00!"), vec![pair("k", "😀!")]);
    }

    #[test]
    fn incomplete_unicode_escape_is_fatal() {
        assert_eq!(
            decode("ok=1\nk=\\u41"),
            Err(LexError::IncompleteUnicodeEscape {
                line: 2,
                escape: "\\u41".to_string(),
            })
        );
        assert_eq!(
            decode("k=\\uzzzz"),
            Err(LexError::IncompleteUnicodeEscape {
                line: 1,
                escape: "\\u".to_string(),
            })
        );
    }

    #[test]
    fn continuation_joins_lines_without_terminator() {
        assert_eq!(pairs("k=line1\\\n   line2"), vec![pair("k", "line1line2")]);
        assert_eq!(
            pairs("k=a\\\r\n  b\\\r  c\nnext=1"),
            vec![pair("k", "abc"), pair("next", "1")]
        );
    }

    #[test]
    fn continuation_keeps_separator_state() {
        // Key still being scanned: the separator can appear on the next line.
        assert_eq!(pairs("ke\\\ny=v"), vec![pair("key", "v")]);
        // Value already started: a separator on the next line is literal.
        assert_eq!(pairs("k=a\\\n=b"), vec![pair("k", "a=b")]);
    }

    #[test]
    fn continuation_line_is_never_a_comment() {
        assert_eq!(pairs("k=a\\\n# not a comment"), vec![pair("k", "a# not a comment")]);
    }

    #[test]
    fn continuation_on_last_line_ends_entry() {
        assert_eq!(pairs("k=v\\"), vec![pair("k", "v")]);
    }

    #[test]
    fn escaped_backslash_at_end_is_not_continuation() {
        assert_eq!(pairs("k=v\\\\\nn=1"), vec![pair("k", "v\\"), pair("n", "1")]);
    }

    #[test]
    fn duplicate_keys_last_write_wins_first_position_kept() {
        assert_eq!(
            pairs("a=1\nb=2\na=3"),
            vec![pair("a", "3"), pair("b", "2")]
        );
    }

    #[test]
    fn non_ascii_text_passes_through() {
        assert_eq!(pairs("grüße = straße"), vec![pair("grüße", "straße")]);
    }
}
