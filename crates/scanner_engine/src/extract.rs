use scanner_core::ConfigurationError;
use scraper::{Html, Selector};

/// Parses a CSS selector, reporting syntax errors as configuration errors.
pub fn parse_selector(selector: &str) -> Result<Selector, ConfigurationError> {
    Selector::parse(selector).map_err(|err| ConfigurationError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{err:?}"),
    })
}

/// Outer HTML of every element matching `selector`, in document order, each
/// followed by a blank line. Empty when nothing matches.
pub fn extract_elements(html: &str, selector: &Selector) -> String {
    let doc = Html::parse_document(html);
    let mut out = String::new();
    for element in doc.select(selector) {
        out.push_str(&element.html());
        out.push_str("\n\n");
    }
    out
}

/// Text content of an HTML fragment with all markup removed.
pub fn strip_tags(fragment: &str) -> String {
    Html::parse_fragment(fragment)
        .root_element()
        .text()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_elements_keep_their_markup() {
        let selector = parse_selector("h2").unwrap();
        let html = "<html><body><h2>One</h2><p>skip</p><h2 class=\"x\">Two</h2></body></html>";
        assert_eq!(
            extract_elements(html, &selector),
            "<h2>One</h2>\n\n<h2 class=\"x\">Two</h2>\n\n"
        );
    }

    #[test]
    fn no_match_is_empty() {
        let selector = parse_selector("table").unwrap();
        assert_eq!(extract_elements("<p>nothing</p>", &selector), "");
    }

    #[test]
    fn stripping_keeps_text_only() {
        assert_eq!(
            strip_tags("<h2>One <a href=\"/x\">link</a></h2>\n\n<h2>Two</h2>"),
            "One link\n\nTwo"
        );
    }

    #[test]
    fn bad_selector_is_a_configuration_error() {
        assert!(matches!(
            parse_selector("h2[["),
            Err(ConfigurationError::InvalidSelector { .. })
        ));
    }
}
