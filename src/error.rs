//! The diagnostic engine: turns a raw failure into a located, human-legible
//! [`Error`].
//!
//! Every fallible path in the crate returns `Result<_, Error>`; there is no
//! partial-tree recovery (see spec.md §7 — all errors are fatal).

use crate::scanner::{text_pos_from_str, TextPos};

/// The taxonomy of well-formedness violations this parser can report.
///
/// Grouped the way spec.md §7 groups them: Lexical, Structural, Attribute,
/// Reference, Declaration.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    // --- Lexical ---
    /// A code point outside the `Char` production (spec.md §4.A).
    InvalidCharacter(char),
    /// Reserved for a transport layer that hands this parser an already
    /// UTF-8-decoded `&str`; unreachable from within this crate, since
    /// `&str` is a UTF-8 invariant enforced by the type itself, but kept in
    /// the taxonomy so callers that wrap a byte-oriented transport have a
    /// variant to surface its failures through.
    InvalidEncoding,

    // --- Structural ---
    UnexpectedToken,
    UnexpectedEndOfInput,
    ExpectedChar(char, Option<char>),
    InvalidName,
    UnclosedTag { name: String },
    MismatchedEndTag { expected: String, actual: String },
    MultipleRootElements,
    MissingRootElement,
    UnclosedComment,
    UnclosedCdata,
    UnclosedProcessingInstruction,

    // --- Attribute ---
    DuplicateAttribute(String),
    UnquotedAttributeValue,
    InvalidCharacterInAttribute,
    MalformedReferenceInAttribute,

    // --- Reference ---
    UndefinedEntity(String),
    InvalidCharacterReference,
    MalformedEntityReference,

    // --- Declaration ---
    InvalidXmlDeclaration(&'static str),
    UnsupportedEncoding(String),
    InvalidPiTarget,
    InvalidCommentContent,
}

impl ErrorKind {
    fn description(&self) -> String {
        match self {
            ErrorKind::InvalidCharacter(c) => {
                format!("character U+{:04X} is not permitted in an XML document", *c as u32)
            }
            ErrorKind::InvalidEncoding => "the input is not valid UTF-8".to_string(),
            ErrorKind::UnexpectedToken => "unexpected token".to_string(),
            ErrorKind::UnexpectedEndOfInput => "unexpected end of input".to_string(),
            ErrorKind::ExpectedChar(expected, Some(found)) => {
                format!("expected '{}', found '{}'", expected, found)
            }
            ErrorKind::ExpectedChar(expected, None) => {
                format!("expected '{}', found end of input", expected)
            }
            ErrorKind::InvalidName => "expected a valid XML name".to_string(),
            ErrorKind::UnclosedTag { name } => format!("missing end tag for element {}", name),
            ErrorKind::MismatchedEndTag { expected, actual } => {
                format!("expected closing tag '</{}>', found '</{}>'", expected, actual)
            }
            ErrorKind::MultipleRootElements => {
                "a document may have only one root element".to_string()
            }
            ErrorKind::MissingRootElement => {
                "the document does not have a root element".to_string()
            }
            ErrorKind::UnclosedComment => "unclosed comment".to_string(),
            ErrorKind::UnclosedCdata => "unclosed CDATA section".to_string(),
            ErrorKind::UnclosedProcessingInstruction => {
                "unclosed processing instruction".to_string()
            }
            ErrorKind::DuplicateAttribute(name) => {
                format!("attribute '{}' is already defined", name)
            }
            ErrorKind::UnquotedAttributeValue => {
                "attribute values must be quoted with '\"' or '\\''".to_string()
            }
            ErrorKind::InvalidCharacterInAttribute => {
                "unescaped '<' found in attribute value".to_string()
            }
            ErrorKind::MalformedReferenceInAttribute => {
                "malformed entity reference in attribute value".to_string()
            }
            ErrorKind::UndefinedEntity(name) => format!("undefined entity reference '{}'", name),
            ErrorKind::InvalidCharacterReference => {
                "character reference does not resolve to a valid character".to_string()
            }
            ErrorKind::MalformedEntityReference => "malformed entity reference".to_string(),
            ErrorKind::InvalidXmlDeclaration(why) => {
                format!("invalid XML declaration: {}", why)
            }
            ErrorKind::UnsupportedEncoding(name) => {
                format!("unsupported encoding '{}', only UTF-8 is supported", name)
            }
            ErrorKind::InvalidPiTarget => {
                "a processing instruction target must not be 'xml'".to_string()
            }
            ErrorKind::InvalidCommentContent => {
                "a comment must not contain '--' or end in '-'".to_string()
            }
        }
    }
}

/// A located, fatal parse error.
///
/// `message` and `excerpt` together reproduce the user-visible form
/// mandated by spec.md §7: `<description> (line L, column C)` followed by
/// an excerpt line and a caret line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    line: u32,
    column: u32,
    pos: usize,
    excerpt: String,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, source: &str, byte_pos: usize) -> Self {
        let text_pos = text_pos_from_str(source, byte_pos);
        let char_pos = source[..byte_pos.min(source.len())].chars().count();
        let excerpt = render_excerpt(source, text_pos);
        let message = format!("{} (line {}, column {})", kind.description(), text_pos.line, text_pos.column);

        Error {
            kind,
            message,
            line: text_pos.line,
            column: text_pos.column,
            pos: char_pos,
            excerpt,
        }
    }

    /// The specific taxonomy entry this error belongs to.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// `<Human description> (line L, column C)`, with no trailing newline.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// 0-based character (not byte) offset of the first offending code
    /// point.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn text_pos(&self) -> TextPos {
        TextPos::new(self.line, self.column)
    }

    /// The excerpt line plus caret-pointer line, joined by `\n`.
    pub fn excerpt(&self) -> &str {
        &self.excerpt
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}\n{}", self.message, self.excerpt)
    }
}

impl std::error::Error for Error {}

/// Renders the bounded, single-line excerpt described by spec.md §4.F: the
/// whole physical line if it fits in 80 characters, otherwise a
/// 40-characters-either-side window around the caret with ellipses marking
/// truncation.
fn render_excerpt(source: &str, pos: TextPos) -> String {
    let line_text = physical_line(source, pos.line);
    let chars: Vec<char> = line_text.chars().collect();
    let caret_idx = (pos.column as usize).saturating_sub(1).min(chars.len());

    const FULL_LINE_LIMIT: usize = 80;
    const WINDOW: usize = 40;

    if chars.len() <= FULL_LINE_LIMIT {
        let excerpt_line: String = chars.iter().collect();
        let caret_line = format!("{}^", " ".repeat(caret_idx));
        return format!("{}\n{}", excerpt_line, caret_line);
    }

    let start = caret_idx.saturating_sub(WINDOW);
    let end = (caret_idx + WINDOW).min(chars.len());

    let mut excerpt_line = String::new();
    let mut caret_offset = caret_idx - start;
    if start > 0 {
        excerpt_line.push_str("...");
        caret_offset += 3;
    }
    excerpt_line.extend(&chars[start..end]);
    if end < chars.len() {
        excerpt_line.push_str("...");
    }

    let caret_line = format!("{}^", " ".repeat(caret_offset));
    format!("{}\n{}", excerpt_line, caret_line)
}

fn physical_line(source: &str, line_number: u32) -> &str {
    source.lines().nth((line_number - 1) as usize).unwrap_or("")
}
