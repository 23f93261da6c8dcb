//! Navigation and accessor surface: attributes, text/tail, axes, positions,
//! and the JSON projection.

extern crate xmldoc;
#[macro_use]
extern crate pretty_assertions;

use xmldoc::{Document, NodeType, ParsingOptions, TextPos};

#[test]
fn root_element_skips_leading_comments() {
    let data = "<!-- note -->\n<kittens/>\n";
    let doc = Document::parse(data, ParsingOptions::default()).unwrap();
    assert_eq!(doc.root_element().tag_name(), "kittens");
}

#[test]
fn get_text_and_tail() {
    let data = "\
<kittens>
    purring softly
    <toy>
        squeaky
    </toy>
    napping now
</kittens>
";

    let doc = Document::parse(data, ParsingOptions::default()).unwrap();
    let root = doc.root_element();

    assert_eq!(root.text(), Some("\n    purring softly\n    "));
    assert_eq!(root.tail(), None);

    let toy = root.children().nth(1).unwrap();
    assert_eq!(toy.text(), Some("\n        squeaky\n    "));
    assert_eq!(toy.tail(), Some("\n    napping now\n"));
}

#[test]
fn get_text_through_a_reference() {
    // Concrete scenario 2: all five predefined entities expand in place.
    let doc = Document::parse("<a>&lt;&amp;&gt;&apos;&quot;</a>", ParsingOptions::default()).unwrap();
    assert_eq!(doc.root_element().text(), Some("<&>'\""));
}

#[test]
fn attribute_lookup() {
    let data = r#"<e a="1" b="2"/>"#;
    let doc = Document::parse(data, ParsingOptions::default()).unwrap();
    let e = doc.root_element();

    assert_eq!(e.attribute("a"), Some("1"));
    assert!(e.has_attribute("b"));
    assert_eq!(e.attribute("c"), None);
    assert!(!e.has_attribute("c"));
    assert_eq!(e.attributes().len(), 2);
}

#[test]
fn pi_target_and_value() {
    let data = "<?config env=\"dev\"?>\n<kittens/>\n";
    let doc = Document::parse(data, ParsingOptions::default()).unwrap();
    let node = doc.root().first_child().unwrap();
    let pi = node.pi().unwrap();
    assert_eq!(pi.target(), "config");
    assert_eq!(pi.value(), Some("env=\"dev\""));
}

#[test]
fn pi_with_no_body_has_no_value() {
    let doc = Document::parse("<?target?><root/>", ParsingOptions::default()).unwrap();
    let pi = doc.root().first_child().unwrap().pi().unwrap();
    assert_eq!(pi.value(), None);
}

#[test]
fn text_positions_of_node_and_attribute() {
    let data = "\
<kittens fuzzy='yes'>
    <!-- purring -->
    <toy>String</toy>
</kittens>
";

    let doc = Document::parse(data, ParsingOptions::default()).unwrap();
    let node = doc.root_element();

    assert_eq!(node.text_pos(), TextPos::new(1, 1));
    assert_eq!(node.attribute_pos("fuzzy").unwrap(), TextPos::new(1, 10));
    assert_eq!(node.attribute_value_pos("fuzzy").unwrap(), TextPos::new(1, 17));

    let comment = node.first_child().unwrap().next_sibling().unwrap();
    assert_eq!(comment.text_pos(), TextPos::new(2, 5));

    let toy = comment.next_sibling().unwrap().next_sibling().unwrap();
    assert_eq!(toy.text_pos(), TextPos::new(3, 5));

    let text = toy.first_child().unwrap();
    assert_eq!(text.text_pos(), TextPos::new(3, 10));
}

#[test]
fn text_pos_accounts_for_leading_misc() {
    let data = "<!-- leading -->\n<kittens/>\n";
    let doc = Document::parse(data, ParsingOptions::default()).unwrap();
    assert_eq!(doc.root_element().text_pos(), TextPos::new(2, 1));
}

#[test]
fn ancestors_walk_up_to_but_not_including_the_document() {
    let doc = Document::parse("<a><b><c/></b></a>", ParsingOptions::default()).unwrap();
    let c = doc.root_element().first_child().unwrap().first_child().unwrap();
    let names: Vec<&str> = c.ancestors().map(|n| n.tag_name()).collect();
    assert_eq!(names, vec!["c", "b", "a"]);
}

#[test]
fn children_iterator_is_double_ended() {
    let doc = Document::parse("<r><a/><b/><c/></r>", ParsingOptions::default()).unwrap();
    let mut it = doc.root_element().children();
    assert_eq!(it.next().unwrap().tag_name(), "a");
    assert_eq!(it.next_back().unwrap().tag_name(), "c");
    assert_eq!(it.next().unwrap().tag_name(), "b");
    assert_eq!(it.next(), None);
}

#[test]
fn parent_element_skips_the_document_node() {
    let doc = Document::parse("<a/>", ParsingOptions::default()).unwrap();
    let a = doc.root_element();
    assert_eq!(a.parent_element(), None);
}

#[test]
fn to_json_matches_the_documented_field_order() {
    let doc = Document::parse(r#"<r a="1">text</r>"#, ParsingOptions::default()).unwrap();
    let json = doc.to_json().to_json_string();
    assert_eq!(
        json,
        r#"{"type":"Document","children":[{"type":"Element","name":"r","attributes":{"a":"1"},"children":[{"type":"Text","text":"text"}],"isRootNode":true}]}"#
    );
}

#[test]
fn debug_format_is_stable_and_indented() {
    let doc = Document::parse("<a><b/></a>", ParsingOptions::default()).unwrap();
    let rendered = format!("{:?}", doc);
    assert!(rendered.starts_with("Document ["));
    assert!(rendered.contains("Element { name: \"a\""));
    assert!(rendered.contains("        Element { name: \"b\""));
}

#[test]
fn node_type_reports_the_closed_set_of_kinds() {
    let opt = ParsingOptions { preserve_cdata: true, ..ParsingOptions::default() };
    let doc = Document::parse(
        "<!--c--><?p v?><r><![CDATA[x]]>y</r>",
        opt,
    )
    .unwrap();

    let mut top = doc.root().children();
    assert_eq!(top.next().unwrap().node_type(), NodeType::Comment);
    assert_eq!(top.next().unwrap().node_type(), NodeType::Pi);
    let r = top.next().unwrap();
    assert_eq!(r.node_type(), NodeType::Element);

    let mut inner = r.children();
    assert_eq!(inner.next().unwrap().node_type(), NodeType::Cdata);
    assert_eq!(inner.next().unwrap().node_type(), NodeType::Text);
}
