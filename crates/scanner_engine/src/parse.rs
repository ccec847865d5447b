use std::fmt;

use scraper::{ElementRef, Html};

use crate::extract::strip_tags;

/// Ways to re-view captured markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseKind {
    /// Text with all markup removed.
    Text,
    /// `href` of every link, one per line.
    Links,
    /// `src` of every image, one per line.
    Images,
    /// Outer HTML of every table, each followed by a blank line.
    Tables,
}

impl ParseKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "text" => Some(ParseKind::Text),
            "links" => Some(ParseKind::Links),
            "images" => Some(ParseKind::Images),
            "tables" => Some(ParseKind::Tables),
            _ => None,
        }
    }
}

impl fmt::Display for ParseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseKind::Text => "text",
            ParseKind::Links => "links",
            ParseKind::Images => "images",
            ParseKind::Tables => "tables",
        };
        f.write_str(name)
    }
}

/// Renders `content` as the view named by `kind`, in document order.
pub fn parse_content(content: &str, kind: ParseKind) -> String {
    match kind {
        ParseKind::Text => strip_tags(content),
        ParseKind::Links => attribute_lines(content, "a", "href"),
        ParseKind::Images => attribute_lines(content, "img", "src"),
        ParseKind::Tables => {
            let mut out = String::new();
            for table in elements(&Html::parse_fragment(content), "table") {
                out.push_str(&table.html());
                out.push_str("\n\n");
            }
            out
        }
    }
}

fn attribute_lines(content: &str, tag: &str, attribute: &str) -> String {
    let doc = Html::parse_fragment(content);
    let mut out = String::new();
    for element in elements(&doc, tag) {
        if let Some(value) = element.value().attr(attribute) {
            out.push_str(value);
            out.push('\n');
        }
    }
    out
}

fn elements<'a>(doc: &'a Html, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |element| element.value().name() == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURE: &str = "<div><a href=\"/one\">One</a> <a>none</a>\
        <img src=\"a.png\"><img alt=\"x\"></div>\n\n\
        <table><tbody><tr><td>cell</td></tr></tbody></table>\n\n\
        <p><a href=\"https://example.com/two\">Two</a></p>\n\n";

    #[test]
    fn links_and_images_list_their_targets() {
        assert_eq!(
            parse_content(CAPTURE, ParseKind::Links),
            "/one\nhttps://example.com/two\n"
        );
        assert_eq!(parse_content(CAPTURE, ParseKind::Images), "a.png\n");
    }

    #[test]
    fn tables_keep_their_markup() {
        assert_eq!(
            parse_content(CAPTURE, ParseKind::Tables),
            "<table><tbody><tr><td>cell</td></tr></tbody></table>\n\n"
        );
    }

    #[test]
    fn text_drops_markup() {
        assert_eq!(
            parse_content("<h2>One <a href=\"/x\">link</a></h2>", ParseKind::Text),
            "One link"
        );
    }

    #[test]
    fn nothing_matching_is_empty() {
        assert_eq!(parse_content("<p>plain</p>", ParseKind::Links), "");
        assert_eq!(parse_content("<p>plain</p>", ParseKind::Tables), "");
    }

    #[test]
    fn kinds_are_named() {
        assert_eq!(ParseKind::from_name("Links"), Some(ParseKind::Links));
        assert_eq!(ParseKind::from_name("pictures"), None);
        assert_eq!(ParseKind::Tables.to_string(), "tables");
    }
}
