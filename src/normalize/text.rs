use scraper::{ElementRef, Html, Node};

// Elements whose boundaries separate words in the rendered text
const BREAKING_ELEMENTS: &[&str] = &[
    "br", "p", "div", "li", "ul", "ol", "tr", "td", "th", "table", "h1", "h2", "h3", "h4", "h5",
    "h6", "blockquote", "section", "article", "hr",
];
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Reduce a markup fragment to its visible text on a single line.
///
/// Malformed markup is parsed leniently by html5ever, so this never fails;
/// it returns `None` when nothing visible remains.
pub fn sanitize_html(markup: &str) -> Option<String> {
    if markup.trim().is_empty() {
        return None;
    }

    let fragment = Html::parse_fragment(markup);
    let mut text = String::with_capacity(markup.len());

    push_visible_text(fragment.root_element(), &mut text);

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

// Block boundaries become spaces on both sides so adjacent words stay apart
fn push_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child.value().name();
                if HIDDEN_ELEMENTS.contains(&name) {
                    continue;
                }
                let breaks = BREAKING_ELEMENTS.contains(&name);
                if breaks {
                    out.push(' ');
                }
                push_visible_text(child, out);
                if breaks {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}
