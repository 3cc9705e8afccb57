//! The CSS selector subset the toolkit resolves: compounds of type, `#id`,
//! `.class`, `[attr]` and `[attr=value]`, joined by descendant combinators.

use super::{Document, NodeId};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError {
    pub reason: String,
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

fn error<T>(reason: impl Into<String>) -> Result<T, SelectorError> {
    Err(SelectorError { reason: reason.into() })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attributes.is_empty()
    }

    fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(element) = document.element(node) else {
            return false;
        };
        self.tag.as_ref().is_none_or(|tag| *tag == element.tag)
            && self
                .id
                .as_ref()
                .is_none_or(|id| element.attributes.get("id") == Some(id))
            && self.classes.iter().all(|class| element.has_class(class))
            && self.attributes.iter().all(|(name, expected)| {
                match (document.attribute(node, name), expected) {
                    (Some(actual), Some(expected)) => actual == *expected,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            })
    }
}

/// Compounds separated by whitespace, subject last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    compounds: Vec<Compound>,
}

impl Selector {
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        text.parse()
    }

    /// Ancestors are matched against the whole document, not a query scope.
    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some((subject, ancestors)) = self.compounds.split_last() else {
            return false;
        };
        if !subject.matches(document, node) {
            return false;
        }
        let mut remaining = ancestors;
        let mut current = document.parent(node);
        while let Some((compound, outer)) = remaining.split_last() {
            let Some(ancestor) = current else {
                return false;
            };
            if compound.matches(document, ancestor) {
                remaining = outer;
            }
            current = document.parent(ancestor);
        }
        true
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = text.trim().chars().collect();
        if chars.is_empty() {
            return error("empty selector");
        }
        let mut compounds = Vec::new();
        let mut position = 0;
        while position < chars.len() {
            if chars[position].is_whitespace() {
                position += 1;
                continue;
            }
            compounds.push(parse_compound(&chars, &mut position)?);
        }
        Ok(Self { compounds })
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn parse_name(chars: &[char], position: &mut usize) -> Result<String, SelectorError> {
    let start = *position;
    while *position < chars.len() && is_name_char(chars[*position]) {
        *position += 1;
    }
    if start == *position {
        return error("expected a name");
    }
    Ok(chars[start..*position].iter().collect())
}

fn parse_compound(chars: &[char], position: &mut usize) -> Result<Compound, SelectorError> {
    let mut compound = Compound::default();
    if is_name_char(chars[*position]) {
        compound.tag = Some(parse_name(chars, position)?.to_ascii_lowercase());
    }

    while *position < chars.len() {
        match chars[*position] {
            '#' => {
                *position += 1;
                compound.id = Some(parse_name(chars, position)?);
            }
            '.' => {
                *position += 1;
                compound.classes.push(parse_name(chars, position)?);
            }
            '[' => {
                *position += 1;
                compound.attributes.push(parse_attribute(chars, position)?);
            }
            c if c.is_whitespace() => break,
            c => return error(format!("unexpected '{c}'")),
        }
    }
    if compound.is_empty() {
        return error("expected a selector");
    }
    Ok(compound)
}

fn parse_attribute(chars: &[char], position: &mut usize) -> Result<(String, Option<String>), SelectorError> {
    skip_whitespace(chars, position);
    let name = parse_name(chars, position)?.to_ascii_lowercase();
    skip_whitespace(chars, position);
    let value = match chars.get(*position) {
        Some(']') => None,
        Some('=') => {
            *position += 1;
            skip_whitespace(chars, position);
            let value = match chars.get(*position) {
                Some(&quote) if quote == '"' || quote == '\'' => {
                    *position += 1;
                    let start = *position;
                    while *position < chars.len() && chars[*position] != quote {
                        *position += 1;
                    }
                    if *position == chars.len() {
                        return error("unterminated string");
                    }
                    let value: String = chars[start..*position].iter().collect();
                    *position += 1;
                    value
                }
                _ => parse_name(chars, position)?,
            };
            skip_whitespace(chars, position);
            Some(value)
        }
        _ => return error("expected '=' or ']'"),
    };
    if chars.get(*position) != Some(&']') {
        return error("expected ']'");
    }
    *position += 1;
    Ok((name, value))
}

fn skip_whitespace(chars: &[char], position: &mut usize) {
    while *position < chars.len() && chars[*position].is_whitespace() {
        *position += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(markup: &str, selector: &str) -> Vec<String> {
        let document = Document::from_html(markup);
        let selector = Selector::parse(selector).unwrap();
        document
            .query_selector_all(document.root(), &selector)
            .into_iter()
            .map(|node| document.attribute(node, "id").unwrap_or_default())
            .collect()
    }

    const MARKUP: &str = r#"
        <div id="app" class="app">
            <div id="layout" class="layout"></div>
            <section id="section"><div id="nested" class="layout wide"></div></section>
            <a id="file" data-export="file"></a>
            <a id="name" data-export="name"></a>
        </div>
        <div id="outside" class="layout"></div>
    "#;

    #[test]
    fn descendant_combinator() {
        assert_eq!(select(MARKUP, ".app .layout"), vec!["layout", "nested"]);
        assert_eq!(select(MARKUP, "#app   section div.wide"), vec!["nested"]);
        assert_eq!(select(MARKUP, "section .app"), Vec::<String>::new());
    }

    #[test]
    fn attribute_selectors() {
        assert_eq!(select(MARKUP, "[data-export]"), vec!["file", "name"]);
        assert_eq!(select(MARKUP, r#"a[data-export="name"]"#), vec!["name"]);
        assert_eq!(select(MARKUP, "[data-export=file]"), vec!["file"]);
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        for selector in ["", "  ", ".", "div > a", "*", "[data", "a..b", "a, b", "a[x=\"y]"] {
            assert!(Selector::parse(selector).is_err(), "{selector:?} should not parse");
        }
    }

    #[test]
    fn scoped_query_may_match_ancestors_outside_scope() {
        let document = Document::from_html(MARKUP);
        let section = document
            .query_selector(document.root(), &Selector::parse("section").unwrap())
            .unwrap();
        let found = document.query_selector(section, &Selector::parse(".app .wide").unwrap());
        assert_eq!(found.and_then(|node| document.attribute(node, "id")).as_deref(), Some("nested"));
    }
}
