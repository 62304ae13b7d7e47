use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;

/// Reduces markup to plain text.
///
/// Every `<table>` subtree is dropped, remaining text nodes are joined with a
/// space and all whitespace runs collapse to a single space.
pub fn normalize_markup(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut fragments: Vec<&str> = Vec::new();
    for child in document.root_element().children() {
        collect_text(child, &mut fragments);
    }
    let joined = fragments.join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text<'a>(node: NodeRef<'a, Node>, out: &mut Vec<&'a str>) {
    match node.value() {
        Node::Text(text) => out.push(text),
        Node::Element(element) if element.name().eq_ignore_ascii_case("table") => {}
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

/// Whitespace-separated token count of normalized text.
pub fn count_tokens(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
