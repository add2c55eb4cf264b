// Central place for format characters and other fixed constants.
// Keep these out of the scanner/encoder so both sides agree on the same sets.

// Line endings
pub const NL_LF: &str = "\n";
pub const NL_CRLF: &str = "\r\n";

// Characters that start a comment line (after leading whitespace is stripped).
pub const COMMENT_HASH: char = '#';
pub const COMMENT_BANG: char = '!';

// Horizontal whitespace recognized by the format (space, tab, form-feed).
pub const WS_SPACE: char = ' ';
pub const WS_TAB: char = '\t';
pub const WS_FORM_FEED: char = '\u{000C}';

// Explicit key/value separators.
pub const SEP_COLON: char = ':';
pub const SEP_EQUALS: char = '=';

pub const ESCAPE: char = '\\';
pub const UNICODE_ESCAPE_MARKER: char = 'u';
pub const UNICODE_ESCAPE_DIGITS: usize = 4;

/// Single-letter escapes mapped to the control character they stand for.
pub const SPECIAL_ESCAPES: [(char, char); 4] = [
    ('f', '\u{000C}'),
    ('n', '\n'),
    ('r', '\r'),
    ('t', '\t'),
];

// Leading bytes of a gzip stream.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
pub const GZIP_EXTENSION: &str = "gz";

// UTF-8 byte order mark, tolerated at the start of loaded resources.
pub const UTF8_BOM: char = '\u{FEFF}';

pub const COMMENT_PREFIX: &str = "# ";

pub fn is_horizontal_ws(c: char) -> bool {
    matches!(c, WS_SPACE | WS_TAB | WS_FORM_FEED)
}

pub fn is_explicit_separator(c: char) -> bool {
    matches!(c, SEP_COLON | SEP_EQUALS)
}

pub fn special_escape(c: char) -> Option<char> {
    SPECIAL_ESCAPES
        .iter()
        .find_map(|&(letter, ctrl)| (letter == c).then_some(ctrl))
}

pub fn special_escape_letter(ctrl: char) -> Option<char> {
    SPECIAL_ESCAPES
        .iter()
        .find_map(|&(letter, c)| (c == ctrl).then_some(letter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_escape_tables_are_inverse() {
        for (letter, ctrl) in SPECIAL_ESCAPES {
            assert_eq!(special_escape(letter), Some(ctrl));
            assert_eq!(special_escape_letter(ctrl), Some(letter));
        }
        assert_eq!(special_escape('x'), None);
        assert_eq!(special_escape_letter('x'), None);
    }

    #[test]
    fn whitespace_set_excludes_line_breaks() {
        assert!(is_horizontal_ws(' '));
        assert!(is_horizontal_ws('\t'));
        assert!(is_horizontal_ws('\u{000C}'));
        assert!(!is_horizontal_ws('\n'));
        assert!(!is_horizontal_ws('\r'));
    }
}
