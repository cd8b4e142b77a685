// Roost - A modular content management system built with Rust
// Copyright (C) 2025 Roost Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SEGMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{lang: ([a-z]{2}_[a-z]+)\}(.*?)\{/lang\}").expect("segment regex is valid")
});

/// Reusable block of content embedded in pages with `{$snippet.<slug>}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snippet {
    pub id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub content: LocalizedContent,
}

impl Snippet {
    pub fn tag(&self) -> String {
        format!("{{$snippet.{}}}", self.slug)
    }
}

/// Per-language variants of a text, stored as
/// `{lang: en_english}...{/lang}{lang: fr_french}...{/lang}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LocalizedContent(pub Vec<(String, String)>);

impl LocalizedContent {
    pub fn parse(raw: &str) -> Self {
        let segments = SEGMENT_REGEX
            .captures_iter(raw)
            .map(|c| (c[1].trim().to_string(), c[2].trim().to_string()))
            .collect();
        LocalizedContent(segments)
    }

    pub fn serialize(&self) -> String {
        self.0
            .iter()
            .map(|(lang, text)| format!("{{lang: {}}}{}{{/lang}}", lang, text))
            .collect()
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == lang)
            .map(|(_, text)| text.as_str())
    }

    /// Text for `lang`, falling back to the first variant.
    pub fn for_lang(&self, lang: &str) -> &str {
        self.get(lang)
            .or_else(|| self.0.first().map(|(_, text)| text.as_str()))
            .unwrap_or_default()
    }

    pub fn set(&mut self, lang: &str, text: String) {
        match self.0.iter_mut().find(|(l, _)| l == lang) {
            Some(entry) => entry.1 = text,
            None => self.0.push((lang.to_string(), text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_segments() {
        let content = LocalizedContent::parse(
            "{lang: en_english}Hello{/lang}{lang: fr_french}\n Bonjour \n{/lang}",
        );
        assert_eq!(content.get("en_english"), Some("Hello"));
        assert_eq!(content.get("fr_french"), Some("Bonjour"));
        assert_eq!(content.get("de_german"), None);
    }

    #[test]
    fn test_for_lang_falls_back_to_first() {
        let content = LocalizedContent::parse("{lang: en_english}Hello{/lang}");
        assert_eq!(content.for_lang("fr_french"), "Hello");
        assert_eq!(LocalizedContent::default().for_lang("fr_french"), "");
    }

    #[test]
    fn test_serialize_and_set() {
        let mut content = LocalizedContent::default();
        content.set("en_english", "Hi".to_string());
        content.set("pl_polski", "Cześć".to_string());
        content.set("en_english", "Hello".to_string());
        assert_eq!(
            content.serialize(),
            "{lang: en_english}Hello{/lang}{lang: pl_polski}Cześć{/lang}"
        );
    }

    #[test]
    fn test_snippet_tag() {
        let snippet = Snippet {
            id: Some(1),
            name: "Footer".to_string(),
            slug: "footer".to_string(),
            content: LocalizedContent::default(),
        };
        assert_eq!(snippet.tag(), "{$snippet.footer}");
    }
}
