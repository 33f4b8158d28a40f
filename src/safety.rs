//! Deny-list filter applied to every candidate before it reaches a chat.
//!
//! Matching is a plain case-insensitive substring test with no word-boundary
//! or Unicode normalization. Benign words that contain a banned token are
//! blocked too. Changing this changes moderation behavior.

const BANNED_SUBSTRINGS: &[&str] = &[
    "retard",
    "retarded",
    "faggot",
    "tranny",
    "kike",
    "spic",
    "wetback",
    "chink",
    "gook",
    "sandnigger",
    "nigger",
];

/// Returns `false` if any deny-listed token occurs anywhere in `text`.
pub fn is_clean(text: &str) -> bool {
    let lowered = text.to_lowercase();

    !BANNED_SUBSTRINGS.iter().any(|bad| lowered.contains(bad))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_banned_token_regardless_of_case() {
        assert!(!is_clean("you are a FAGGOTry expert"));
        assert!(!is_clean("Retard"));
    }

    #[test]
    fn accepts_clean_text() {
        assert!(is_clean("this is clean"));
        assert!(is_clean("You make hard things look easy."));
    }

    #[test]
    fn blocks_benign_superstrings() {
        // "spicy" contains "spic"
        assert!(!is_clean("a spicy take"));
    }
}
