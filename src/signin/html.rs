//! Scrapes the confirmation page for its CSRF token and form.
//!
//! The pages this runs against are small server-rendered documents, so
//! regex scraping holds up fine and keeps the dependency footprint where
//! it is.

use regex::Regex;

/// A confirmation form flattened to what the replay step needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationForm {
    pub action: Option<String>,
    pub fields: Vec<(String, String)>,
    pub submit_label: Option<String>,
}

/// CSRF token from `<meta name="csrf-token" content="...">`. Accepts either
/// attribute order.
pub fn csrf_meta_token(html: &str) -> Option<String> {
    let name_first = Regex::new(
        r#"(?i)<meta[^>]*name\s*=\s*["']csrf-token["'][^>]*content\s*=\s*["']([^"']+)["']"#,
    )
    .unwrap();
    if let Some(cap) = name_first.captures(html) {
        return Some(cap[1].to_string());
    }
    let content_first = Regex::new(
        r#"(?i)<meta[^>]*content\s*=\s*["']([^"']+)["'][^>]*name\s*=\s*["']csrf-token["']"#,
    )
    .unwrap();
    content_first.captures(html).map(|cap| cap[1].to_string())
}

/// Pick the form to replay: the first `<form>` on the page.
///
/// This is a heuristic, not a guarantee. A page carrying a second form,
/// like a search box above the confirmation block, would make this pick
/// the wrong one. Any smarter selection strategy, such as matching on the
/// submit label, replaces this function and nothing else.
pub fn first_form(html: &str) -> Option<&str> {
    let re = Regex::new(r"(?is)<form[^>]*>.*?</form>").unwrap();
    re.find(html).map(|m| m.as_str())
}

/// Flatten a form into its action, its named inputs, and the submit label.
/// Submit inputs are kept out of the field list; the replay step re-adds the
/// label under the name the server expects.
pub fn parse_form(form_html: &str) -> ConfirmationForm {
    let open_re = Regex::new(r"(?is)<form[^>]*>").unwrap();
    let action = open_re
        .find(form_html)
        .and_then(|m| attr_value(m.as_str(), "action"));

    let input_re = Regex::new(r"(?is)<input[^>]*>").unwrap();
    let mut fields = Vec::new();
    let mut submit_label = None;
    for m in input_re.find_iter(form_html) {
        let tag = m.as_str();
        let input_type = attr_value(tag, "type").unwrap_or_default();
        let value = attr_value(tag, "value");
        if input_type.eq_ignore_ascii_case("submit") {
            if submit_label.is_none() {
                submit_label = value;
            }
            continue;
        }
        if let Some(name) = attr_value(tag, "name") {
            fields.push((name, value.unwrap_or_default()));
        }
    }

    // <button type="submit">Label</button> is the other common shape
    if submit_label.is_none() {
        let button_re = Regex::new(r"(?is)<button[^>]*>\s*([^<]+?)\s*</button>").unwrap();
        submit_label = button_re
            .captures(form_html)
            .map(|cap| cap[1].to_string());
    }

    ConfirmationForm {
        action,
        fields,
        submit_label,
    }
}

fn attr_value(tag: &str, attr: &str) -> Option<String> {
    // \b keeps "action" from matching inside "formaction"
    let re = Regex::new(&format!(r#"(?i)\b{}\s*=\s*["']([^"']*)["']"#, attr)).unwrap();
    re.captures(tag).map(|cap| cap[1].to_string())
}
