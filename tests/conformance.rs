//! Representative well-formedness conformance checks, standing in for the
//! W3C XML Conformance Test Suite (not vendored here): a spread of
//! productions that must parse cleanly, paired with the "not-wf" inputs one
//! character away from each that must raise.

extern crate xmldoc;

use xmldoc::{Document, ParsingOptions};

fn assert_wf(input: &str) {
    if let Err(e) = Document::parse(input, ParsingOptions::default()) {
        panic!("expected well-formed, got error: {} on input {:?}", e.message(), input);
    }
}

fn assert_not_wf(input: &str) {
    if Document::parse(input, ParsingOptions::default()).is_ok() {
        panic!("expected a well-formedness error on input {:?}", input);
    }
}

#[test]
fn valid_minimal_documents() {
    assert_wf("<r/>");
    assert_wf("<r></r>");
    assert_wf("<ns:r/>");
    assert_wf("<r a=\"1\" b='2'/>");
    assert_wf("<r>plain text</r>");
}

#[test]
fn valid_prolog_variants() {
    assert_wf("<?xml version=\"1.0\"?><r/>");
    assert_wf("<?xml version=\"1.0\" encoding=\"UTF-8\"?><r/>");
    assert_wf("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><r/>");
    assert_wf("<?xml version=\"1.1\"?><r/>");
    assert_wf("\u{FEFF}<r/>");
}

#[test]
fn not_wf_prolog_variants() {
    assert_not_wf("<?xml version=\"1.0\" standalone=\"yes\" encoding=\"UTF-8\"?><r/>");
    assert_not_wf("<?xml version=\"1.0\" encoding=\"UTF-8\" encoding=\"UTF-8\"?><r/>");
    assert_not_wf("<?xml encoding=\"UTF-8\"?><r/>");
    assert_not_wf("<?xml version=\"\"?><r/>");
}

#[test]
fn valid_doctype_is_skipped_without_affecting_the_tree() {
    assert_wf("<!DOCTYPE r><r/>");
    assert_wf("<!DOCTYPE r SYSTEM \"r.dtd\"><r/>");
    assert_wf("<!DOCTYPE r [ <!ELEMENT r (#PCDATA)> <!ATTLIST r a CDATA #IMPLIED> ]><r/>");
}

#[test]
fn valid_comments_and_pis() {
    assert_wf("<!-- top --><r><!-- inner --></r><!-- bottom -->");
    assert_wf("<?app-specific data?><r><?another pi?></r>");
    assert_wf("<r><!----></r>");
}

#[test]
fn not_wf_comments_and_pis() {
    assert_not_wf("<r><!--a--b--></r>");
    assert_not_wf("<r><!--trailing--->...</r>");
    assert_not_wf("<r><?xml target?></r>");
    assert_not_wf("<r><!-- unterminated </r>");
}

#[test]
fn valid_cdata_sections() {
    assert_wf("<r><![CDATA[<not><a><tag>]]></r>");
    assert_wf("<r><![CDATA[]]></r>");
    assert_wf("<r><![CDATA[a & b < c]]></r>");
}

#[test]
fn not_wf_cdata_sections() {
    assert_not_wf("<r><![CDATA[unterminated</r>");
}

#[test]
fn valid_references() {
    assert_wf("<r>&amp;&lt;&gt;&apos;&quot;</r>");
    assert_wf("<r>&#65;&#x41;</r>");
    assert_wf(r#"<r a="&amp;&#65;"/>"#);
}

#[test]
fn not_wf_references() {
    assert_not_wf("<r>&undefined;</r>");
    assert_not_wf("<r>&amp</r>");
    assert_not_wf("<r>&#xFFFFFFFF;</r>");
    assert_not_wf("<r>&;</r>");
}

#[test]
fn valid_nesting_and_attributes() {
    assert_wf("<a><b><c/><c/></b><d/></a>");
    assert_wf(r#"<a x="1" y="2" z="3"/>"#);
    assert_wf("<a>\t\n text \r\n more</a>");
}

#[test]
fn not_wf_structural_violations() {
    assert_not_wf("<a><b></a></b>");
    assert_not_wf("<a><b></a>");
    assert_not_wf("<a/><b/>");
    assert_not_wf("<a a=\"1\" a=\"2\"/>");
    assert_not_wf("<a b=unquoted/>");
    assert_not_wf("");
    assert_not_wf("not xml at all");
}

#[test]
fn crlf_and_lf_produce_equivalent_documents() {
    let crlf = Document::parse("<r>line1\r\nline2\rline3</r>", ParsingOptions::default()).unwrap();
    let lf = Document::parse("<r>line1\nline2\nline3</r>", ParsingOptions::default()).unwrap();
    assert_eq!(crlf.root_element().text(), lf.root_element().text());
    assert_eq!(crlf.to_json().to_json_string(), lf.to_json().to_json_string());
}

#[test]
fn ignore_undefined_entities_option_changes_well_formedness_outcome() {
    let opt = ParsingOptions { ignore_undefined_entities: true, ..ParsingOptions::default() };
    let doc = Document::parse("<r>&made-up;</r>", opt).unwrap();
    assert_eq!(doc.root_element().text(), Some("&made-up;"));
}

#[test]
fn resolve_undefined_entity_hook_overrides_ignore_and_error() {
    fn hook(name: &str) -> Option<String> {
        if name == "copyright" {
            Some("(c)".to_string())
        } else {
            None
        }
    }

    let opt = ParsingOptions { resolve_undefined_entity: Some(hook), ..ParsingOptions::default() };
    let doc = Document::parse("<r>&copyright;</r>", opt).unwrap();
    assert_eq!(doc.root_element().text(), Some("(c)"));
}
