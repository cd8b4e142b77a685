use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid"));
static BRACES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(.*?)\}").expect("braces regex is valid"));
static MD_LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(([^\)]*)\)").expect("link regex is valid"));

/// Remove HTML tags, keeping the text between them.
pub fn strip_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").into_owned()
}

/// Remove `{...}` template tags from stored content.
pub fn strip_braces(text: &str) -> String {
    BRACES_REGEX.replace_all(text, "").into_owned()
}

/// Wrap text on word boundaries so no line exceeds `width` characters.
/// Words longer than `width` are kept whole on their own line.
pub fn word_wrap(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Cut text to at most `width` characters, ending with `marker` when cut.
pub fn truncate(text: &str, width: usize, marker: &str) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let keep = width.saturating_sub(marker.chars().count());
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(marker);
    cut
}

/// Plain-text description for meta tags: tags and template braces
/// removed, limited to 155 characters.
pub fn meta_description(content: &str) -> String {
    let plain = strip_tags(&strip_braces(content));
    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&collapsed, 155, "...")
}

/// Turn `[label](url)` links into anchors opening in a new tab.
pub fn markdown_links_to_html(text: &str) -> String {
    MD_LINK_REGEX
        .replace_all(text, r#"<a href="$2" target="_blank">$1</a>"#)
        .into_owned()
}

/// Compare dotted version strings numerically (`1.10.0` > `1.9.3`).
/// Missing components count as zero, non-numeric ones as zero too.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .trim_start_matches('v')
            .split('.')
            .map(|part| {
                part.chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let (left, right) = (parse(a), parse(b));
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Language slug used in URLs: `en_english` becomes `en`.
pub fn lang_prefix(lang: &str) -> &str {
    lang.split('_').next().unwrap_or(lang)
}
