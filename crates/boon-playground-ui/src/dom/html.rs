//! Lenient HTML fragment parsing and serialization.
//!
//! The parser accepts what `innerHTML` assignments see in practice: unmatched
//! closing tags are dropped, unclosed elements end with the input, comments
//! and doctypes are skipped.

use super::{Document, NodeData, NodeId};

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

struct StartTag {
    name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
}

/// Parses `markup` into detached top-level nodes (text nodes included).
pub fn parse_fragment(document: &mut Document, markup: &str) -> Vec<NodeId> {
    let mut roots = Vec::new();
    let mut open: Vec<NodeId> = Vec::new();
    let mut rest = markup;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            rest = rest.find('>').map_or("", |end| &rest[end + 1..]);
        } else if let Some(after) = rest.strip_prefix("</") {
            let end = after.find('>').unwrap_or(after.len());
            let name = after[..end].trim().to_ascii_lowercase();
            rest = after.get(end + 1..).unwrap_or("");
            if let Some(position) = open.iter().rposition(|node| document.tag(*node) == Some(name.as_str())) {
                open.truncate(position);
            }
        } else if starts_tag(rest) {
            let (tag, consumed) = parse_start_tag(&rest[1..]);
            rest = &rest[1 + consumed..];

            let element = document.create_element(&tag.name);
            for (name, value) in &tag.attributes {
                document.set_attribute(element, name, value);
            }
            attach(document, &mut roots, &open, element);

            if tag.self_closing || is_void(&tag.name) {
                continue;
            }
            if is_raw_text(&tag.name) {
                let end = find_closing_tag(rest, &tag.name).unwrap_or(rest.len());
                if end > 0 {
                    let text = document.create_text(&rest[..end]);
                    document.append_child(element, text);
                }
                rest = &rest[end..];
            }
            open.push(element);
        } else {
            let end = next_markup(rest);
            let text = document.create_text(&decode_entities(&rest[..end]));
            attach(document, &mut roots, &open, text);
            rest = &rest[end..];
        }
    }
    roots
}

fn attach(document: &mut Document, roots: &mut Vec<NodeId>, open: &[NodeId], node: NodeId) {
    match open.last() {
        Some(parent) => {
            document.append_child(*parent, node);
        }
        None => roots.push(node),
    }
}

fn starts_tag(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
}

/// Byte offset of the next construct that ends a text run. A lone `<` that
/// does not open markup stays part of the text.
fn next_markup(text: &str) -> usize {
    text.char_indices()
        .skip(1)
        .find(|(index, c)| {
            *c == '<'
                && text[index + 1..]
                    .chars()
                    .next()
                    .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?'))
        })
        .map_or(text.len(), |(index, _)| index)
}

fn find_closing_tag(text: &str, name: &str) -> Option<usize> {
    let needle = format!("</{name}");
    text.to_ascii_lowercase().find(&needle)
}

/// Parses a start tag from just after `<`. Returns the tag and the number of
/// bytes consumed, including the closing `>` when present.
fn parse_start_tag(input: &str) -> (StartTag, usize) {
    let bytes = input.as_bytes();
    let mut position = 0;
    while position < bytes.len() && !is_tag_delimiter(bytes[position]) {
        position += 1;
    }
    let mut tag = StartTag {
        name: input[..position].to_ascii_lowercase(),
        attributes: Vec::new(),
        self_closing: false,
    };

    loop {
        while position < bytes.len() && bytes[position].is_ascii_whitespace() {
            position += 1;
        }
        match bytes.get(position) {
            None => return (tag, position),
            Some(b'>') => return (tag, position + 1),
            Some(b'/') => {
                position += 1;
                if bytes.get(position) == Some(&b'>') {
                    tag.self_closing = true;
                    return (tag, position + 1);
                }
                continue;
            }
            Some(_) => {}
        }

        let name_start = position;
        while position < bytes.len() && !is_tag_delimiter(bytes[position]) && bytes[position] != b'=' {
            position += 1;
        }
        let name = input[name_start..position].to_ascii_lowercase();

        while position < bytes.len() && bytes[position].is_ascii_whitespace() {
            position += 1;
        }
        let mut value = String::new();
        if bytes.get(position) == Some(&b'=') {
            position += 1;
            while position < bytes.len() && bytes[position].is_ascii_whitespace() {
                position += 1;
            }
            match bytes.get(position) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let value_start = position + 1;
                    let value_end = input[value_start..]
                        .find(quote as char)
                        .map_or(input.len(), |offset| value_start + offset);
                    value = decode_entities(&input[value_start..value_end]);
                    position = (value_end + 1).min(input.len());
                }
                _ => {
                    let value_start = position;
                    while position < bytes.len()
                        && !bytes[position].is_ascii_whitespace()
                        && bytes[position] != b'>'
                    {
                        position += 1;
                    }
                    value = decode_entities(&input[value_start..position]);
                }
            }
        }
        if !name.is_empty() && !tag.attributes.iter().any(|(existing, _)| *existing == name) {
            tag.attributes.push((name, value));
        }
    }
}

fn is_tag_delimiter(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == b'/' || byte == b'>'
}

pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(ampersand) = rest.find('&') {
        out.push_str(&rest[..ampersand]);
        rest = &rest[ampersand..];
        let decoded = rest
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn serialize_children(document: &Document, id: NodeId, out: &mut String, id_attribute: Option<&str>) {
    let raw = document.tag(id).is_some_and(is_raw_text);
    for child in document.children(id) {
        match document.node(*child).map(|node| node.data()) {
            Some(NodeData::Text(text)) if raw => out.push_str(text),
            _ => serialize_node(document, *child, out, id_attribute),
        }
    }
}

pub(crate) fn serialize_node(document: &Document, id: NodeId, out: &mut String, id_attribute: Option<&str>) {
    let Some(node) = document.node(id) else {
        return;
    };
    match node.data() {
        NodeData::Document => serialize_children(document, id, out, id_attribute),
        NodeData::Text(text) => out.push_str(&escape_text(text)),
        NodeData::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            if let Some(attribute) = id_attribute {
                out.push_str(&format!(" {attribute}=\"{id}\""));
            }
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(value));
                out.push('"');
            }
            if !element.style.is_empty() {
                out.push_str(" style=\"");
                out.push_str(&escape_attribute(&element.style_text()));
                out.push('"');
            }
            out.push('>');
            if is_void(&element.tag) {
                return;
            }
            serialize_children(document, id, out, id_attribute);
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(markup: &str) -> String {
        let document = Document::from_html(markup);
        document.inner_html(document.root())
    }

    #[test]
    fn nested_elements_and_attributes() {
        assert_eq!(
            parsed(r#"<div data-export="buttons"><a class='file active' href=javascript:void(0)>x</a></div>"#),
            r#"<div data-export="buttons"><a class="file active" href="javascript:void(0)">x</a></div>"#
        );
    }

    #[test]
    fn void_and_self_closing_elements_take_no_children() {
        assert_eq!(
            parsed(r#"<a><img src="a.png"/><br>text</a><span/>after"#),
            r#"<a><img src="a.png"><br>text</a><span></span>after"#
        );
    }

    #[test]
    fn unmatched_closing_tags_are_ignored_and_open_ones_closed() {
        assert_eq!(parsed("</p><div><span>a</div>b"), "<div><span>a</span></div>b");
    }

    #[test]
    fn comments_and_doctype_are_skipped() {
        assert_eq!(parsed("<!doctype html><!-- note --><p>x</p>"), "<p>x</p>");
    }

    #[test]
    fn entities_are_decoded_and_reescaped() {
        let document = Document::from_html("<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp;&#65;&#x42; &bogus;</p>");
        let p = document.children(document.root())[0];
        assert_eq!(document.attribute(p, "title").as_deref(), Some("a \"b\""));
        assert_eq!(document.text_content(p), "1 < 2 &AB &bogus;");
        assert_eq!(
            document.inner_html(document.root()),
            "<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp;AB &amp;bogus;</p>"
        );
    }

    #[test]
    fn lone_angle_bracket_stays_text() {
        assert_eq!(parsed("a < b"), "a &lt; b");
    }

    #[test]
    fn script_content_is_raw() {
        assert_eq!(
            parsed("<script>if (a < b && c) {}</script>"),
            "<script>if (a < b && c) {}</script>"
        );
    }

    #[test]
    fn empty_markup_produces_nothing() {
        assert_eq!(parsed(""), "");
    }
}
