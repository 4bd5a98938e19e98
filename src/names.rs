//! Name cleaning for derived person-name fields.

use lazy_static::lazy_static;
use regex::Regex;

/// Longest cleaned name we hand to downstream classifiers
pub const MAX_NAME_LEN: usize = 64;

lazy_static! {
    static ref NAME_CHARS: Regex =
        Regex::new(r"[A-Za-z ,.'-]+").expect("name character class is a valid regex");
}

/// Keep ASCII letters, spaces and `,.'-`; drop everything else.
///
/// The filter is character based, so an email address loses its `@` but
/// keeps its dots: `gel@microsoft.com` becomes `gelmicrosoft.com`.
pub fn clean_name(name: &str) -> String {
    let mut cleaned: String = NAME_CHARS
        .find_iter(name)
        .map(|m| m.as_str())
        .collect();
    if cleaned.len() > MAX_NAME_LEN {
        // Only ASCII survives the filter, so any byte index is a char boundary.
        cleaned.truncate(MAX_NAME_LEN);
    }
    cleaned
}

/// First whitespace-separated token of the cleaned name
pub fn first_name(full_name: &str) -> Option<String> {
    clean_name(full_name)
        .split_whitespace()
        .next()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphabetic()).to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        let cases = [
            ("nothing", "david", "david"),
            ("no weird symbols", "d@vid", "dvid"),
            ("no emails", "gel@microsoft.com", "gelmicrosoft.com"),
            ("capitalized", "Oliver", "Oliver"),
            ("keeps punctuation", "Mary-Jane O'Neil, Jr.", "Mary-Jane O'Neil, Jr."),
            ("drops digits", "r2d2", "rd"),
            ("drops non-ascii", "Zoë", "Zo"),
            ("empty", "", ""),
        ];

        for (label, input, want) in cases {
            assert_eq!(clean_name(input), want, "case: {}", label);
        }
    }

    #[test]
    fn test_clean_name_is_bounded() {
        let long = "a".repeat(500);
        assert_eq!(clean_name(&long).len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_first_name() {
        assert_eq!(first_name("Ann Lee").as_deref(), Some("Ann"));
        assert_eq!(first_name("  d@vid  smith").as_deref(), Some("dvid"));
        assert_eq!(first_name("'Jo' Brown").as_deref(), Some("Jo"));
        assert_eq!(first_name("1234"), None);
        assert_eq!(first_name(""), None);
    }
}
