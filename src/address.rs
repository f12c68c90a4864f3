use once_cell::sync::Lazy;
use regex::Regex;

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());

/// Canonicalizes a free-text address for geocoding and display: drops every
/// parenthetical note, and collapses addresses with extra middle segments
/// (apartment or floor descriptors) down to "<first>, <last>".
pub fn normalize_address(raw: &str) -> String {
    let stripped = PARENTHETICAL.replace_all(raw, "");
    if stripped.matches(',').count() > 1 {
        let first = stripped.split(',').next().unwrap_or_default().trim();
        let last = stripped.split(',').next_back().unwrap_or_default().trim();
        return format!("{}, {}", first, last);
    }
    stripped.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_parenthetical_notes() {
        assert_eq!(
            normalize_address("Storgata 1 (pent oppusset), Oslo"),
            "Storgata 1, Oslo"
        );
    }

    #[test]
    fn collapses_middle_segments() {
        assert_eq!(
            normalize_address("Storgata 1, leil. 402, 3. etasje, Oslo"),
            "Storgata 1, Oslo"
        );
    }

    #[test]
    fn short_addresses_pass_through() {
        assert_eq!(normalize_address("Storgata 1, Oslo"), "Storgata 1, Oslo");
        assert_eq!(normalize_address(""), "");
    }
}
