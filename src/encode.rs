use crate::statics;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => statics::NL_LF,
            LineEnding::CrLf => statics::NL_CRLF,
        }
    }
}

/// Controls how [`encode`] renders entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    pub line_ending: LineEnding,
    /// Escape everything above U+007F as `\uxxxx` (surrogate pairs for astral chars).
    pub ascii_only: bool,
    /// Written first, one `# ` line per comment line.
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Key,
    Value,
}

/// Serialize entries as `key=value` lines that decode back to the same mapping.
pub fn encode<'a, I>(entries: I, options: &EncodeOptions) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let newline = options.line_ending.as_str();
    let mut out = String::new();

    if let Some(comment) = &options.comment {
        // Split on every terminator the decoder honors, including a lone `\r`.
        let comment = comment.replace(statics::NL_CRLF, statics::NL_LF);
        for line in comment.split_terminator(['\r', '\n']) {
            out.push_str(statics::COMMENT_PREFIX);
            out.push_str(line);
            out.push_str(newline);
        }
    }

    for (key, value) in entries {
        write_escaped(&mut out, key, Part::Key, options.ascii_only);
        out.push(statics::SEP_EQUALS);
        write_escaped(&mut out, value, Part::Value, options.ascii_only);
        out.push_str(newline);
    }
    out
}

fn write_escaped(out: &mut String, s: &str, part: Part, ascii_only: bool) {
    // Leading spaces of a value would otherwise be eaten by the separator.
    let mut leading = true;
    for ch in s.chars() {
        match ch {
            statics::WS_SPACE if part == Part::Key || leading => {
                out.push(statics::ESCAPE);
                out.push(ch);
            }
            statics::ESCAPE
            | statics::SEP_EQUALS
            | statics::SEP_COLON
            | statics::COMMENT_HASH
            | statics::COMMENT_BANG => {
                out.push(statics::ESCAPE);
                out.push(ch);
            }
            c if statics::special_escape_letter(c).is_some() => {
                out.push(statics::ESCAPE);
                out.extend(statics::special_escape_letter(c));
            }
            c if c.is_control() => {
                write!(out, "\\u{:04x}", c as u32).ok();
            }
            c if ascii_only && (c as u32) > 0x7F => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units).iter() {
                    write!(out, "\\u{:04x}", unit).ok();
                }
            }
            c => out.push(c),
        }
        if ch != statics::WS_SPACE {
            leading = false;
        }
    }
}
