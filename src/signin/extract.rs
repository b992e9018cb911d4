//! Pulls the confirmation link out of a sign-in message body.

use regex::Regex;

/// Scan a decoded message body for the sign-in confirmation link.
///
/// Anchor hrefs are tried first since HTML mail wraps its links in markup;
/// a bare URL scan covers plain-text bodies. When a domain hint is given,
/// only links containing it qualify. Returns `None` when nothing matches so
/// the caller can move on to the next candidate message.
pub fn extract_sign_in_link(body: &str, domain_hint: Option<&str>) -> Option<String> {
    let href_re = Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap();
    for cap in href_re.captures_iter(body) {
        let url = &cap[1];
        // mailto:, tel: and fragment links are not confirmation links. Check
        // bytes, not a str slice; hrefs can open with multibyte text.
        let bytes = url.as_bytes();
        if bytes.len() < 4 || !bytes[..4].eq_ignore_ascii_case(b"http") {
            continue;
        }
        if matches_hint(url, domain_hint) {
            return Some(decode_entities(url));
        }
    }

    let bare_re = Regex::new(r#"https?://[^\s"'<>]+"#).unwrap();
    for m in bare_re.find_iter(body) {
        let url = m.as_str().trim_end_matches(['.', ',', ')', ']']);
        if matches_hint(url, domain_hint) {
            return Some(decode_entities(url));
        }
    }

    None
}

fn matches_hint(url: &str, hint: Option<&str>) -> bool {
    match hint {
        Some(hint) => url.contains(hint),
        None => true,
    }
}

// HTML bodies escape query separators; undo the entities that show up in
// practice before the link is fetched.
fn decode_entities(url: &str) -> String {
    url.replace("&amp;", "&")
        .replace("&#43;", "+")
        .replace("&#61;", "=")
}
