//! Recursive-descent realization of the XML 1.0 productions (component D),
//! fused with tree construction (component E) the way a single-pass parser
//! naturally interleaves the two: every production that recognizes a node
//! appends it to the arena as soon as it is recognized, never building an
//! intermediate event stream.

use crate::chars;
use crate::entity::{self, RefContext};
use crate::error::{Error, ErrorKind};
use crate::scanner::Scanner;
use crate::{Attribute, Document, NodeData, NodeId, NodeKind, ParsingOptions, Pi};

pub(crate) fn parse(text: &str, options: ParsingOptions) -> Result<Document, Error> {
    let text = strip_bom(text);
    let mut p = Parser::new(text, options);
    p.parse_document()?;

    if !p.root_seen {
        return Err(p.scanner.error_at(0, ErrorKind::MissingRootElement));
    }

    Ok(Document { text, nodes: p.nodes, attrs: p.attrs })
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}

struct Parser<'d> {
    scanner: Scanner<'d>,
    opt: ParsingOptions,
    nodes: Vec<NodeData>,
    attrs: Vec<Attribute>,
    stack: Vec<NodeId>,
    root_seen: bool,
}

impl<'d> Parser<'d> {
    fn new(text: &'d str, opt: ParsingOptions) -> Self {
        let root = NodeData {
            parent: None,
            prev_sibling: None,
            next_sibling: None,
            children: None,
            kind: NodeKind::Document,
            orig_pos: 0,
        };

        Parser {
            scanner: Scanner::new(text),
            opt,
            nodes: vec![root],
            attrs: Vec::new(),
            stack: vec![NodeId(0)],
            root_seen: false,
        }
    }

    // --- tree construction (component E) ---

    fn append_child(&mut self, kind: NodeKind, orig_pos: usize) -> NodeId {
        let parent_id = *self.stack.last().expect("document frame is never popped");
        let prev_sibling = self.nodes[parent_id.0].children.map(|(_, last)| last);
        let new_id = NodeId(self.nodes.len());

        self.nodes.push(NodeData {
            parent: Some(parent_id),
            prev_sibling,
            next_sibling: None,
            children: None,
            kind,
            orig_pos,
        });

        if let Some(prev_id) = prev_sibling {
            self.nodes[prev_id.0].next_sibling = Some(new_id);
        }

        let parent = &mut self.nodes[parent_id.0];
        parent.children = Some(match parent.children {
            Some((first, _)) => (first, new_id),
            None => (new_id, new_id),
        });

        new_id
    }

    /// Appends text, merging into the current last child if it is also a
    /// plain text node (spec.md §3 invariant 3).
    fn append_text(&mut self, text: String, orig_pos: usize) {
        if text.is_empty() {
            return;
        }

        let parent_id = *self.stack.last().unwrap();
        if let Some((_, last_id)) = self.nodes[parent_id.0].children {
            if let NodeKind::Text(existing) = &mut self.nodes[last_id.0].kind {
                existing.push_str(&text);
                return;
            }
        }

        self.append_child(NodeKind::Text(text), orig_pos);
    }

    fn open_element(&mut self, name: String, orig_pos: usize) -> NodeId {
        let is_root = self.stack.len() == 1;
        let id = self.append_child(
            NodeKind::Element { name, attributes: 0..0, is_root },
            orig_pos,
        );
        self.stack.push(id);
        id
    }

    fn set_attributes(&mut self, id: NodeId, list: Vec<Attribute>) {
        let start = self.attrs.len();
        self.attrs.extend(list);
        let end = self.attrs.len();
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            *attributes = start..end;
        }
    }

    fn close_element(&mut self) {
        self.stack.pop();
    }

    // --- grammar (component D) ---

    fn parse_document(&mut self) -> Result<(), Error> {
        // "<?xml" alone also matches a PI target like "<?xml-stylesheet ...?>";
        // the declaration requires whitespace right after the literal.
        if self.scanner.starts_with("<?xml") && self.scanner.peek(5).map_or(false, chars::is_whitespace) {
            self.parse_xml_decl()?;
        }

        self.parse_misc_sequence()?;

        if self.scanner.starts_with("<!DOCTYPE") {
            self.parse_doctype()?;
            self.parse_misc_sequence()?;
        }

        if self.at_element_start() {
            self.root_seen = true;
            self.parse_element()?;
            self.parse_misc_sequence()?;
        }

        if !self.scanner.at_end() {
            if self.at_element_start() {
                return Err(self.scanner.error_here(ErrorKind::MultipleRootElements));
            }
            return Err(self.scanner.error_here(ErrorKind::UnexpectedToken));
        }

        Ok(())
    }

    fn at_element_start(&self) -> bool {
        self.scanner.peek_char() == Some('<') && !self.scanner.starts_with("<!") && !self.scanner.starts_with("<?")
    }

    /// `Misc*`: comments, PIs, and whitespace outside the root element.
    fn parse_misc_sequence(&mut self) -> Result<(), Error> {
        loop {
            self.scanner.skip_whitespace()?;
            if self.scanner.starts_with("<!--") {
                self.parse_comment()?;
            } else if self.scanner.starts_with("<?") {
                self.parse_pi()?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_xml_decl(&mut self) -> Result<(), Error> {
        let start = self.scanner.pos().byte();
        self.scanner.match_str("<?xml")?;
        self.scanner
            .consume_while(chars::is_whitespace)?;

        let version = self.parse_pseudo_attribute("version")?;
        if !is_version_num(&version) {
            return Err(self.scanner.error_at(start, ErrorKind::InvalidXmlDeclaration("version must match 1.x")));
        }

        self.scanner.consume_while(chars::is_whitespace)?;
        let mut encoding = None;
        let mut standalone = None;

        if self.scanner.starts_with("encoding") {
            encoding = Some(self.parse_pseudo_attribute("encoding")?);
            self.scanner.consume_while(chars::is_whitespace)?;
        }

        if self.scanner.starts_with("standalone") {
            standalone = Some(self.parse_pseudo_attribute("standalone")?);
            self.scanner.consume_while(chars::is_whitespace)?;
        }

        if let Some(enc) = &encoding {
            if !enc.eq_ignore_ascii_case("utf-8") && !enc.eq_ignore_ascii_case("utf8") {
                return Err(self.scanner.error_at(start, ErrorKind::UnsupportedEncoding(enc.clone())));
            }
        }

        if let Some(sa) = &standalone {
            if sa != "yes" && sa != "no" {
                return Err(self.scanner.error_at(start, ErrorKind::InvalidXmlDeclaration("standalone must be 'yes' or 'no'")));
            }
        }

        if self.scanner.starts_with("encoding") || self.scanner.starts_with("standalone") {
            // A duplicate or out-of-order pseudo-attribute (e.g. `standalone`
            // before `encoding`, or either one repeated).
            return Err(self.scanner.error_here(ErrorKind::InvalidXmlDeclaration("pseudo-attributes out of order or duplicated")));
        }

        self.scanner.match_str("?>")?;
        Ok(())
    }

    fn parse_pseudo_attribute(&mut self, expected_name: &str) -> Result<String, Error> {
        let name = self.scanner.consume_name()?;
        if name != expected_name {
            return Err(self.scanner.error_here(ErrorKind::InvalidXmlDeclaration("pseudo-attributes out of order")));
        }
        self.scanner.consume_while(chars::is_whitespace)?;
        self.scanner.consume_byte_exact('=')?;
        self.scanner.consume_while(chars::is_whitespace)?;
        let quote = self.expect_quote()?;
        let value = self.scanner.scan_until(&quote.to_string())?.to_string();
        self.scanner.consume_byte_exact(quote)?;
        Ok(value)
    }

    fn expect_quote(&mut self) -> Result<char, Error> {
        match self.scanner.peek_char() {
            Some(c @ '"') | Some(c @ '\'') => {
                self.scanner.consume()?;
                Ok(c)
            }
            _ => Err(self.scanner.error_here(ErrorKind::UnquotedAttributeValue)),
        }
    }

    /// Consumes and discards `<!DOCTYPE ... >`, tracking bracket nesting so
    /// an internal subset's `[ ... ]` is skipped as a unit, and tracking
    /// quotes/comments so a `>` or `]` inside either doesn't end the
    /// declaration early. No DTD semantics take effect (spec.md Non-goals).
    fn parse_doctype(&mut self) -> Result<(), Error> {
        let start = self.scanner.pos().byte();
        self.scanner.match_str("<!DOCTYPE")?;

        let mut depth: u32 = 0;
        loop {
            if self.scanner.at_end() {
                return Err(self.scanner.error_at(start, ErrorKind::UnexpectedEndOfInput));
            }

            if self.scanner.starts_with("<!--") {
                self.scanner.match_str("<!--")?;
                self.scanner.scan_until("-->")?;
                self.scanner.match_str("-->")?;
                continue;
            }

            match self.scanner.peek_char() {
                Some('"') | Some('\'') => {
                    let quote = self.scanner.consume()?.unwrap();
                    self.scanner.scan_until(&quote.to_string())?;
                    self.scanner.consume()?;
                }
                Some('[') => {
                    depth += 1;
                    self.scanner.consume()?;
                }
                Some(']') => {
                    depth = depth.saturating_sub(1);
                    self.scanner.consume()?;
                }
                Some('>') if depth == 0 => {
                    self.scanner.consume()?;
                    return Ok(());
                }
                Some(_) => {
                    self.scanner.consume()?;
                }
                None => unreachable!(),
            }
        }
    }

    fn parse_element(&mut self) -> Result<(), Error> {
        let start = self.scanner.pos().byte();
        self.scanner.consume_byte_exact('<')?;
        let name = self.scanner.consume_name()?.to_string();

        let mut local_attrs: Vec<Attribute> = Vec::new();
        loop {
            let had_ws = !self.scanner.consume_while(chars::is_whitespace)?.is_empty();

            match self.scanner.peek_char() {
                Some('/') | Some('>') => break,
                Some(c) if chars::is_name_start_char(c) => {
                    if !had_ws {
                        return Err(self.scanner.error_here(ErrorKind::UnexpectedToken));
                    }
                    let attr = self.parse_attribute()?;
                    if local_attrs.iter().any(|a| a.name() == attr.name()) {
                        return Err(self.scanner.error_at(attr.pos(), ErrorKind::DuplicateAttribute(attr.name().to_string())));
                    }
                    local_attrs.push(attr);
                }
                _ => return Err(self.scanner.error_here(ErrorKind::UnexpectedToken)),
            }
        }

        let is_empty = self.scanner.match_str("/>")?;
        if !is_empty {
            self.scanner.consume_byte_exact('>')?;
        }

        let id = self.open_element(name.clone(), start);
        self.set_attributes(id, local_attrs);

        if is_empty {
            self.close_element();
            return Ok(());
        }

        self.parse_content()?;
        self.parse_end_tag(&name)?;
        self.close_element();
        Ok(())
    }

    fn parse_attribute(&mut self) -> Result<Attribute, Error> {
        let attr_pos = self.scanner.pos().byte();
        let name = self.scanner.consume_name()?.to_string();
        self.scanner.consume_while(chars::is_whitespace)?;
        self.scanner.consume_byte_exact('=')?;
        self.scanner.consume_while(chars::is_whitespace)?;
        let quote = self.expect_quote()?;
        let value_pos = self.scanner.pos().byte();
        let raw = self.scanner.scan_until(&quote.to_string())?;
        let value = entity::normalize_attribute_value(raw, &self.opt)?;
        self.scanner.consume_byte_exact(quote)?;

        Ok(Attribute { name, value, attr_pos, value_pos })
    }

    fn parse_end_tag(&mut self, expected: &str) -> Result<(), Error> {
        let close_pos = self.scanner.pos().byte();
        self.scanner.consume_byte_exact('<')?;
        self.scanner.consume_byte_exact('/')?;
        let actual = self.scanner.consume_name()?.to_string();
        self.scanner.consume_while(chars::is_whitespace)?;
        self.scanner.consume_byte_exact('>')?;

        if actual == expected {
            return Ok(());
        }

        let matches_ancestor = self.stack[..self.stack.len() - 1].iter().rev().any(|&id| match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => name == &actual,
            _ => false,
        });

        if matches_ancestor {
            Err(self.scanner.error_at(close_pos, ErrorKind::UnclosedTag { name: expected.to_string() }))
        } else {
            Err(self.scanner.error_at(close_pos, ErrorKind::MismatchedEndTag { expected: expected.to_string(), actual }))
        }
    }

    fn parse_content(&mut self) -> Result<(), Error> {
        let mut buf = String::new();
        let mut buf_start: Option<usize> = None;

        loop {
            if self.scanner.at_end() {
                return Err(self.scanner.error_here(ErrorKind::UnexpectedEndOfInput));
            }

            if self.scanner.starts_with("</") {
                break;
            }

            match self.scanner.peek_char() {
                Some('<') => {
                    self.flush_text(&mut buf, &mut buf_start);

                    if self.scanner.starts_with("<!--") {
                        self.parse_comment()?;
                    } else if self.scanner.starts_with("<![CDATA[") {
                        self.parse_cdata()?;
                    } else if self.scanner.starts_with("<?") {
                        self.parse_pi()?;
                    } else if self.scanner.starts_with("<!") {
                        return Err(self.scanner.error_here(ErrorKind::UnexpectedToken));
                    } else {
                        self.parse_element()?;
                    }
                }
                Some('&') => {
                    if buf_start.is_none() {
                        buf_start = Some(self.scanner.byte_pos());
                    }
                    entity::resolve_reference(&mut self.scanner, RefContext::Content, &self.opt, &mut buf)?;
                }
                Some(_) => {
                    let start = self.scanner.pos();
                    let raw = self.scanner.consume_while(|c| c != '<' && c != '&')?;
                    if let Some(bad) = raw.find("]]>") {
                        return Err(self.scanner.error_at(start.byte() + bad, ErrorKind::UnexpectedToken));
                    }
                    if buf_start.is_none() {
                        buf_start = Some(start.byte());
                    }
                    match entity::expand_char_data(raw, &self.opt)? {
                        Some(expanded) => buf.push_str(&expanded),
                        None => buf.push_str(raw),
                    }
                }
                None => unreachable!(),
            }
        }

        self.flush_text(&mut buf, &mut buf_start);
        Ok(())
    }

    fn flush_text(&mut self, buf: &mut String, buf_start: &mut Option<usize>) {
        if buf.is_empty() {
            return;
        }
        let text = std::mem::take(buf);
        let pos = buf_start.take().unwrap_or(0);
        self.append_text(text, pos);
    }

    fn parse_comment(&mut self) -> Result<(), Error> {
        let start = self.scanner.pos().byte();
        self.scanner.match_str("<!--")?;
        let body_pos = self.scanner.byte_pos();
        let body = self.scan_until_or("-->", start, ErrorKind::UnclosedComment)?.to_string();
        self.scanner.match_str("-->")?;

        if body.contains("--") || body.ends_with('-') {
            return Err(self.scanner.error_at(body_pos, ErrorKind::InvalidCommentContent));
        }

        if self.opt.preserve_comments {
            self.append_child(NodeKind::Comment(body), start);
        }

        Ok(())
    }

    fn parse_pi(&mut self) -> Result<(), Error> {
        let start = self.scanner.pos().byte();
        self.scanner.match_str("<?")?;
        let target_pos = self.scanner.byte_pos();
        let target = self.scanner.consume_name()?.to_string();

        if target.eq_ignore_ascii_case("xml") {
            return Err(self.scanner.error_at(target_pos, ErrorKind::InvalidPiTarget));
        }

        let had_ws = !self.scanner.consume_while(chars::is_whitespace)?.is_empty();
        let body_pos = self.scanner.byte_pos();
        let body = self.scan_until_or("?>", start, ErrorKind::UnclosedProcessingInstruction)?;

        if !had_ws && !body.is_empty() {
            return Err(self.scanner.error_at(body_pos, ErrorKind::UnexpectedToken));
        }

        let value = if body.is_empty() { None } else { Some(body.to_string()) };
        self.scanner.match_str("?>")?;

        self.append_child(NodeKind::Pi(Pi { target, value }), start);
        Ok(())
    }

    fn parse_cdata(&mut self) -> Result<(), Error> {
        let start = self.scanner.pos().byte();
        self.scanner.match_str("<![CDATA[")?;
        let body = self.scan_until_or("]]>", start, ErrorKind::UnclosedCdata)?;
        let text = entity::normalize_line_endings(body).unwrap_or_else(|| body.to_string());
        self.scanner.match_str("]]>")?;

        if self.opt.preserve_cdata {
            self.append_child(NodeKind::Cdata(text), start);
        } else {
            self.append_text(text, start);
        }

        Ok(())
    }

    fn scan_until_or(&mut self, literal: &str, start: usize, kind: ErrorKind) -> Result<&'d str, Error> {
        match self.scanner.scan_until(literal) {
            Ok(s) => Ok(s),
            Err(_) => Err(self.scanner.error_at(start, kind)),
        }
    }
}

fn is_version_num(s: &str) -> bool {
    match s.strip_prefix("1.") {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
