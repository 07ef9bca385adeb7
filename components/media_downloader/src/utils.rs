// components/media_downloader/src/utils.rs

/// Strip characters that are invalid on common filesystems and trim
/// surrounding whitespace. Idempotent.
pub fn sanitize_folder_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("My Playlist", "My Playlist")]
    #[case("AC/DC: Best * Of?", "ACDC Best  Of")]
    #[case("  padded  ", "padded")]
    #[case("<>:\"/\\|?*", "")]
    fn strips_invalid_characters(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_folder_name(input), expected);
    }

    #[rstest]
    #[case("Road Trip <Summer>")]
    #[case("a|b?c*d")]
    #[case("plain name")]
    fn sanitization_is_idempotent(#[case] input: &str) {
        let once = sanitize_folder_name(input);
        assert_eq!(sanitize_folder_name(&once), once);
    }

    #[test]
    fn result_never_contains_forbidden_characters() {
        let sanitized = sanitize_folder_name("every<bad>char:\"here/now\\or|maybe?not*");
        for forbidden in ['<', '>', ':', '"', '/', '\\', '|', '?', '*'] {
            assert!(
                !sanitized.contains(forbidden),
                "'{sanitized}' still contains '{forbidden}'"
            );
        }
    }
}
