//! Country display name to ISO code mapping.
//!
//! The shipping quote service keys its rates on two-letter lowercase
//! country codes, while saved addresses store display names. This table is
//! the single place the two are reconciled; unmapped names fall back to
//! [`DEFAULT_COUNTRY_CODE`].

/// Fallback code for names absent from the table.
pub const DEFAULT_COUNTRY_CODE: &str = "fr";

/// Display name → ISO 3166-1 alpha-2 code, matched case-insensitively.
const COUNTRY_CODES: &[(&str, &str)] = &[
    ("France", "fr"),
    ("Germany", "de"),
    ("Belgium", "be"),
    ("Spain", "es"),
    ("Italy", "it"),
    ("Luxembourg", "lu"),
    ("Netherlands", "nl"),
    ("Portugal", "pt"),
    ("Switzerland", "ch"),
    ("United Kingdom", "gb"),
    ("Austria", "at"),
    ("Ireland", "ie"),
    ("Monaco", "mc"),
];

/// Resolve a country display name to its two-letter code.
///
/// Already-normalized codes pass through unchanged; anything unrecognized
/// maps to [`DEFAULT_COUNTRY_CODE`].
#[must_use]
pub fn country_code(name: &str) -> &'static str {
    let name = name.trim();

    for (display, code) in COUNTRY_CODES {
        if display.eq_ignore_ascii_case(name) || code.eq_ignore_ascii_case(name) {
            return code;
        }
    }

    DEFAULT_COUNTRY_CODE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names() {
        assert_eq!(country_code("France"), "fr");
        assert_eq!(country_code("Germany"), "de");
        assert_eq!(country_code("Portugal"), "pt");
    }

    #[test]
    fn test_case_insensitive_and_trimmed() {
        assert_eq!(country_code("  BELGIUM "), "be");
        assert_eq!(country_code("switzerland"), "ch");
    }

    #[test]
    fn test_code_passthrough() {
        assert_eq!(country_code("de"), "de");
        assert_eq!(country_code("GB"), "gb");
    }

    #[test]
    fn test_unmapped_falls_back_to_fr() {
        assert_eq!(country_code("Atlantis"), "fr");
        assert_eq!(country_code(""), "fr");
    }
}
