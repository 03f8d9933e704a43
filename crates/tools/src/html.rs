//! HTML to readable text.
//!
//! Regex based, not a DOM parser: boilerplate elements are cut out, the
//! content region is chosen (`<article>`, then `<main>`, then `<body>`),
//! block tags become line breaks and every other tag is dropped. Line
//! breaks survive so the synthesizer can split on them.

use std::sync::LazyLock;

use regex_lite::{Captures, Regex};

/// Elements whose entire content is noise.
const BOILERPLATE: [&str; 8] = [
    "head", "script", "style", "noscript", "nav", "header", "footer", "aside",
];

/// Content regions, most specific first.
const REGIONS: [&str; 3] = ["article", "main", "body"];

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static HTML pattern is valid")
}

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)<!--.*?-->"));

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<title\b[^>]*>(.*?)</title\s*>"));

static BOILERPLATE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    BOILERPLATE
        .iter()
        .map(|tag| compile(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
        .collect()
});

static REGION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    REGIONS
        .iter()
        .map(|tag| compile(&format!(r"(?is)<{tag}\b[^>]*>(.*)</{tag}\s*>")))
        .collect()
});

static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)</?(?:p|div|br|hr|h[1-6]|li|ul|ol|tr|table|section|blockquote|pre|dd|dt)\b[^>]*>")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)<[^>]*>"));

static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));"));

/// The page `<title>`, cleaned. `None` when absent or blank.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let title = collapse_whitespace(&decode_entities(&TAG_RE.replace_all(raw, "")));
    (!title.is_empty()).then_some(title)
}

/// Readable text of the page's main content region.
///
/// Returns an empty string when nothing readable is left.
pub fn extract_text(html: &str) -> String {
    let mut cleaned = COMMENT_RE.replace_all(html, "").into_owned();
    for re in BOILERPLATE_RES.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }

    for re in REGION_RES.iter() {
        if let Some(region) = re.captures(&cleaned).and_then(|c| c.get(1)) {
            let text = region_to_text(region.as_str());
            if !text.is_empty() {
                return text;
            }
        }
    }

    region_to_text(&cleaned)
}

fn region_to_text(fragment: &str) -> String {
    let broken = BLOCK_TAG_RE.replace_all(fragment, "\n");
    let stripped = TAG_RE.replace_all(&broken, "");
    collapse_whitespace(&decode_entities(&stripped))
}

/// Collapse runs of whitespace inside each line, drop blank lines.
fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY_RE.replace_all(text, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    // &amp; last so "&amp;lt;" stays "&lt;".
    numeric
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
