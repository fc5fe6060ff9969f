//! ASIN detection in free text.
//!
//! Only the modern `B0` + 8 uppercase alphanumerics form is recognised.
//! Product URLs (`/dp/B0...`, `/gp/product/B0...`) match because the token
//! itself sits between word boundaries.

use std::sync::OnceLock;

use regex::Regex;

fn asin_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\bB0[A-Z0-9]{8}\b").ok())
        .as_ref()
}

/// Distinct ASINs in order of first appearance.
pub fn find_asins(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let Some(pattern) = asin_pattern() else {
        return found;
    };
    for m in pattern.find_iter(text) {
        if !found.iter().any(|a| a == m.as_str()) {
            found.push(m.as_str().to_string());
        }
    }
    found
}

pub fn first_asin(text: &str) -> Option<String> {
    asin_pattern()?.find(text).map(|m| m.as_str().to_string())
}

pub fn is_asin(candidate: &str) -> bool {
    candidate.len() == 10
        && asin_pattern()
            .and_then(|p| p.find(candidate))
            .is_some_and(|m| m.as_str() == candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_asin_in_question() {
        assert_eq!(
            find_asins("What are the top complaints for ASIN B09XYZ1234?"),
            vec!["B09XYZ1234"]
        );
    }

    #[test]
    fn test_distinct_in_order() {
        let text = "Compare B0C1234567 with B09XYZ1234, then B0C1234567 again";
        assert_eq!(find_asins(text), vec!["B0C1234567", "B09XYZ1234"]);
    }

    #[test]
    fn test_product_urls() {
        assert_eq!(
            find_asins("https://www.amazon.com/dp/B08N5WRWNW?ref=x and /gp/product/B07XJ8C8F5"),
            vec!["B08N5WRWNW", "B07XJ8C8F5"]
        );
    }

    #[test]
    fn test_rejects_lookalikes() {
        assert!(find_asins("b09xyz1234 is lowercase").is_empty());
        assert!(find_asins("XB09XYZ1234 has a prefix").is_empty());
        assert!(find_asins("B09XYZ12345 is too long").is_empty());
        assert!(find_asins("ISBN 0306406152").is_empty());
    }

    #[test]
    fn test_is_asin() {
        assert!(is_asin("B09XYZ1234"));
        assert!(!is_asin(" B09XYZ1234"));
        assert!(!is_asin("B09XYZ123"));
    }

    #[test]
    fn test_first_asin() {
        assert_eq!(first_asin("no asin here"), None);
        assert_eq!(first_asin("B0AAAAAAAA B0BBBBBBBB").as_deref(), Some("B0AAAAAAAA"));
    }
}
