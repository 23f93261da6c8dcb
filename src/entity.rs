//! Entity and character-reference resolution (spec.md §4.C) plus the
//! attribute-value and character-data normalization that consumes it.
//!
//! Resolution is single-pass: there are no entity declarations to recurse
//! into (spec.md Non-goals), so unlike a DTD-aware parser this module has
//! no expansion-depth bookkeeping.

use crate::chars;
use crate::error::{Error, ErrorKind};
use crate::scanner::Scanner;
use crate::ParsingOptions;

/// Where a reference is being resolved, since the well-formedness rules
/// differ slightly between content text and attribute values (spec.md
/// §4.C: a bare `&` that isn't a well-formed reference is always an error,
/// but the taxonomy names the attribute case separately).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RefContext {
    Content,
    Attribute,
}

fn malformed(ctx: RefContext) -> ErrorKind {
    match ctx {
        RefContext::Content => ErrorKind::MalformedEntityReference,
        RefContext::Attribute => ErrorKind::MalformedReferenceInAttribute,
    }
}

/// Resolves a single reference starting at the scanner's current `&` and
/// appends its expansion to `out`. The scanner is advanced past the
/// trailing `;`.
pub fn resolve_reference(
    s: &mut Scanner,
    ctx: RefContext,
    opt: &ParsingOptions,
    out: &mut String,
) -> Result<(), Error> {
    let amp_pos = s.pos();
    s.consume_byte_exact('&')?;

    if s.peek_char() == Some('#') {
        s.consume_byte_exact('#')?;
        let cp = parse_char_ref(s)?;
        out.push(cp);
        s.consume_byte_exact(';')?;
        return Ok(());
    }

    let name_start = s.pos();
    let name = match s.peek_char() {
        Some(c) if chars::is_name_start_char(c) => s.consume_name()?,
        _ => return Err(s.error_at(amp_pos.byte(), malformed(ctx))),
    };
    let _ = name_start;

    match s.peek_char() {
        Some(';') => {
            s.consume_byte_exact(';')?;
        }
        _ => return Err(s.error_at(amp_pos.byte(), malformed(ctx))),
    }

    if let Some(c) = predefined_entity(name) {
        out.push(c);
        return Ok(());
    }

    if let Some(hook) = opt.resolve_undefined_entity {
        if let Some(replacement) = hook(name) {
            out.push_str(&replacement);
            return Ok(());
        }
    }

    if opt.ignore_undefined_entities {
        out.push('&');
        out.push_str(name);
        out.push(';');
        return Ok(());
    }

    Err(s.error_at(amp_pos.byte(), ErrorKind::UndefinedEntity(name.to_string())))
}

fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

/// Parses the digits of a `&#...;` or `&#x...;` reference (the scanner is
/// positioned right after the `#`) and validates the result against `Char`.
fn parse_char_ref(s: &mut Scanner) -> Result<char, Error> {
    let start = s.pos();
    let (digits, radix) = if s.peek_char() == Some('x') {
        s.consume_byte_exact('x')?;
        (s.consume_while(|c| c.is_ascii_hexdigit())?, 16)
    } else {
        (s.consume_while(|c| c.is_ascii_digit())?, 10)
    };

    let value = u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
        .filter(|c| chars::is_char(*c));

    value.ok_or_else(|| s.error_at(start.byte(), ErrorKind::InvalidCharacterReference))
}

/// Expands character data (element/comment-free text between tags):
/// entity/character references are resolved, and line endings are
/// normalized to `\n` (spec.md invariant 6). Returns `None` untouched when
/// the run contains neither `&` nor `\r`, so the common case stays
/// allocation-free at the call site.
pub fn expand_char_data<'input>(
    raw: &'input str,
    opt: &ParsingOptions,
) -> Result<Option<String>, Error> {
    if !raw.bytes().any(|b| b == b'&' || b == b'\r') {
        return Ok(None);
    }

    let mut out = String::with_capacity(raw.len());
    let mut s = Scanner::new(raw);
    while !s.at_end() {
        match s.peek_char() {
            Some('&') => resolve_reference(&mut s, RefContext::Content, opt, &mut out)?,
            Some('\r') => {
                s.consume()?;
                if s.peek_char() == Some('\n') {
                    s.consume()?;
                }
                out.push('\n');
            }
            Some(_) => {
                let c = s.consume()?.unwrap();
                out.push(c);
            }
            None => unreachable!(),
        }
    }

    Ok(Some(out))
}

/// Normalizes line endings only (CRLF/lone CR → LF), leaving `&` and `<`
/// untouched. Used for CDATA section bodies, which are literal text with no
/// reference expansion (spec.md §4.D `CDSect`).
pub fn normalize_line_endings(raw: &str) -> Option<String> {
    if !raw.as_bytes().contains(&b'\r') {
        return None;
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Implements attribute-value normalization per
/// <https://www.w3.org/TR/REC-xml/#AVNormalize>, restricted to the
/// character-level rule this spec mandates (spec.md §3 invariant 6, §9):
/// literal whitespace (#x9/#xA/#xD) becomes a single space, a reference
/// that happens to produce whitespace is copied through verbatim, and a
/// literal `<` is always a well-formedness error.
pub fn normalize_attribute_value(
    raw: &str,
    opt: &ParsingOptions,
) -> Result<String, Error> {
    let mut out = String::with_capacity(raw.len());
    let mut s = Scanner::new(raw);

    while !s.at_end() {
        match s.peek_char() {
            Some('<') => {
                return Err(s.error_here(ErrorKind::InvalidCharacterInAttribute));
            }
            Some('&') => resolve_reference(&mut s, RefContext::Attribute, opt, &mut out)?,
            Some('\r') => {
                s.consume()?;
                if s.peek_char() == Some('\n') {
                    s.consume()?;
                }
                out.push(' ');
            }
            Some('\t') | Some('\n') => {
                s.consume()?;
                out.push(' ');
            }
            Some(_) => {
                let c = s.consume()?.unwrap();
                out.push(c);
            }
            None => unreachable!(),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt() -> ParsingOptions {
        ParsingOptions::default()
    }

    #[test]
    fn expands_predefined_entities() {
        let out = expand_char_data("&lt;&amp;&gt;&apos;&quot;", &opt()).unwrap().unwrap();
        assert_eq!(out, "<&>'\"");
    }

    #[test]
    fn expands_decimal_and_hex_char_refs() {
        let out = expand_char_data("&#65;&#x42;", &opt()).unwrap().unwrap();
        assert_eq!(out, "AB");
    }

    #[test]
    fn rejects_char_ref_outside_char_range() {
        let err = expand_char_data("&#xFFFE;", &opt()).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::InvalidCharacterReference);
    }

    #[test]
    fn undefined_entity_errors_by_default() {
        let err = expand_char_data("&bogus;", &opt()).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::UndefinedEntity("bogus".to_string()));
    }

    #[test]
    fn undefined_entity_preserved_when_ignored() {
        let mut o = opt();
        o.ignore_undefined_entities = true;
        let out = expand_char_data("&bogus;", &o).unwrap().unwrap();
        assert_eq!(out, "&bogus;");
    }

    #[test]
    fn resolver_hook_takes_priority_over_ignore_flag() {
        let mut o = opt();
        o.ignore_undefined_entities = true;
        o.resolve_undefined_entity = Some(|name| {
            if name == "bogus" {
                Some("X".to_string())
            } else {
                None
            }
        });
        let out = expand_char_data("&bogus;", &o).unwrap().unwrap();
        assert_eq!(out, "X");
    }

    #[test]
    fn cr_and_crlf_normalize_to_lf() {
        let out = expand_char_data("a\r\nb\rc", &opt()).unwrap().unwrap();
        assert_eq!(out, "a\nb\nc");
    }

    #[test]
    fn attribute_whitespace_collapses_to_space() {
        let out = normalize_attribute_value("a\tb\nc\r\nd", &opt()).unwrap();
        assert_eq!(out, "a b c d");
    }

    #[test]
    fn attribute_rejects_literal_lt() {
        let err = normalize_attribute_value("a<b", &opt()).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::InvalidCharacterInAttribute);
    }

    #[test]
    fn attribute_reference_whitespace_not_collapsed() {
        let out = normalize_attribute_value("a&#9;b", &opt()).unwrap();
        assert_eq!(out, "a\tb");
    }

    #[test]
    fn line_ending_normalization_leaves_ampersand_literal() {
        let out = normalize_line_endings("a&b\r\nc\rd").unwrap();
        assert_eq!(out, "a&b\nc\nd");
    }

    #[test]
    fn line_ending_normalization_is_noop_without_cr() {
        assert_eq!(normalize_line_endings("a&b\nc"), None);
    }
}
