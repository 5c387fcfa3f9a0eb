use regex::Regex;
use std::sync::LazyLock;

// Canonical catalog code: letter run, hyphen, digit run.
static RE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]+-[0-9]+").unwrap());

/// Extract the canonical catalog code from a noisy title or filename.
///
/// The input is case-folded to uppercase and the first substring matching
/// `LETTERS-DIGITS` wins. Pure and deterministic; already-canonical input
/// comes back unchanged. `None` when nothing matches.
pub fn extract_code(raw: &str) -> Option<String> {
    let folded = raw.to_uppercase();
    RE_CODE.find(&folded).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_input_is_a_fixpoint() {
        assert_eq!(extract_code("ABC-123").as_deref(), Some("ABC-123"));
        let once = extract_code("abc-123").unwrap();
        assert_eq!(extract_code(&once).as_deref(), Some(once.as_str()));
    }

    #[test]
    fn lowercase_is_case_folded() {
        assert_eq!(extract_code("ssis-001 something").as_deref(), Some("SSIS-001"));
    }

    #[test]
    fn surrounding_noise_is_tolerated() {
        assert_eq!(
            extract_code("[StudioX] ABC-123 (1080p) part2").as_deref(),
            Some("ABC-123")
        );
        assert_eq!(
            extract_code("prefix words MIAD-001.mkv").as_deref(),
            Some("MIAD-001")
        );
    }

    #[test]
    fn leading_zeros_are_kept() {
        assert_eq!(extract_code("abc-00123").as_deref(), Some("ABC-00123"));
    }

    #[test]
    fn first_of_multiple_matches_wins() {
        assert_eq!(
            extract_code("ABC-123 vs DEF-456").as_deref(),
            Some("ABC-123")
        );
        // Multi-hyphen string: the first valid span wins.
        assert_eq!(extract_code("ABC-123-456").as_deref(), Some("ABC-123"));
    }

    #[test]
    fn no_match_is_none_not_a_panic() {
        assert_eq!(extract_code(""), None);
        assert_eq!(extract_code("Just A Regular Title"), None);
        assert_eq!(extract_code("12345"), None);
        assert_eq!(extract_code("ABC-"), None);
        assert_eq!(extract_code("-123"), None);
    }
}
