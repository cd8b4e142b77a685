use once_cell::sync::Lazy;
use regex::Regex;

static SLUG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("Failed to compile slug regex"));

/// Fold common Latin diacritics to their ASCII base letter.
fn transliterate(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ą' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ą' => "a",
        'æ' | 'Æ' => "ae",
        'ç' | 'ć' | 'č' | 'Ç' | 'Ć' | 'Č' => "c",
        'ď' | 'đ' | 'Ď' | 'Đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ę' | 'ě' | 'È' | 'É' | 'Ê' | 'Ë' | 'Ę' | 'Ě' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ł' | 'Ł' => "l",
        'ñ' | 'ń' | 'ň' | 'Ñ' | 'Ń' | 'Ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "o",
        'œ' | 'Œ' => "oe",
        'ř' | 'Ř' => "r",
        'ś' | 'š' | 'Ś' | 'Š' => "s",
        'ß' => "ss",
        'ť' | 'Ť' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ů' | 'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ů' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ź' | 'ż' | 'ž' | 'Ź' | 'Ż' | 'Ž' => "z",
        _ => return None,
    };
    Some(folded)
}

/// Generate a URL-friendly slug from a title
pub fn create_slug(title: &str) -> String {
    let folded: String = title
        .trim()
        .chars()
        .map(|c| match transliterate(c) {
            Some(ascii) => ascii.to_string(),
            None => c.to_string(),
        })
        .collect();

    let mut slug = SLUG_REGEX
        .replace_all(&folded.to_lowercase(), "-")
        .trim_matches('-')
        .to_string();

    if slug.is_empty() {
        slug = "untitled".to_string();
    }

    // Ensure slug doesn't exceed reasonable length (100 chars)
    if slug.len() > 100 {
        slug = slug
            .chars()
            .take(100)
            .collect::<String>()
            .trim_end_matches('-')
            .to_string();
    }

    slug
}

/// Picture file stem derived from a title: spaces become hyphens, anything
/// outside `[A-Za-z0-9-]` is dropped and hyphen runs collapse.
pub fn picture_stem(title: &str) -> String {
    let dashed = title.replace(' ', "-");
    let kept: String = dashed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    let mut stem = String::with_capacity(kept.len());
    for c in kept.chars() {
        if c == '-' && stem.ends_with('-') {
            continue;
        }
        stem.push(c);
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_slug_basic() {
        assert_eq!(create_slug("Hello World"), "hello-world");
        assert_eq!(create_slug("About Us"), "about-us");
        assert_eq!(create_slug("Contact"), "contact");
    }

    #[test]
    fn test_create_slug_special_characters() {
        assert_eq!(create_slug("Hello, World!"), "hello-world");
        assert_eq!(create_slug("What's New?"), "what-s-new");
        assert_eq!(create_slug("Price: $99.99"), "price-99-99");
    }

    #[test]
    fn test_create_slug_diacritics() {
        assert_eq!(create_slug("Café René"), "cafe-rene");
        assert_eq!(create_slug("Zażółć gęślą jaźń"), "zazolc-gesla-jazn");
        assert_eq!(create_slug("Über uns"), "uber-uns");
        assert_eq!(create_slug("Hello 世界"), "hello");
    }

    #[test]
    fn test_create_slug_edge_cases() {
        assert_eq!(create_slug(""), "untitled");
        assert_eq!(create_slug("   "), "untitled");
        assert_eq!(create_slug("---"), "untitled");
        assert_eq!(create_slug("Hello---World"), "hello-world");
        assert_eq!(create_slug("Test___Case"), "test-case");
    }

    #[test]
    fn test_create_slug_long_title() {
        let slug = create_slug(&"long title ".repeat(20));
        assert!(slug.len() <= 100);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_picture_stem() {
        assert_eq!(picture_stem("Summer Marathon 2024"), "Summer-Marathon-2024");
        assert_eq!(picture_stem("A  -  B!"), "A-B");
        assert_eq!(picture_stem("Été"), "t");
    }
}
