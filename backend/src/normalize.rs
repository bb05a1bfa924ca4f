//! Text canonicalization shared by training and every prediction entry point.
//!
//! Category values reach the classifier exactly as the training data stored
//! them: trimmed and title-cased. Any drift between the two sides silently
//! turns a known country into an unseen one.

/// Trim surrounding whitespace and title-case the remainder.
///
/// A letter is uppercased when the character before it is not a letter and
/// lowercased otherwise, so word boundaries include hyphens, apostrophes
/// and digits as well as spaces. Inner whitespace is kept as-is.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_is_letter = false;

    for ch in raw.trim().chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_word_country() {
        assert_eq!(normalize("  bosnia and herzegovina "), "Bosnia And Herzegovina");
    }

    #[test]
    fn mixed_case_collapses() {
        assert_eq!(normalize("jAPAN"), "Japan");
        assert_eq!(normalize("UNITED STATES"), "United States");
    }

    #[test]
    fn punctuation_starts_a_new_word() {
        assert_eq!(normalize("guinea-bissau"), "Guinea-Bissau");
        assert_eq!(normalize("côte d'ivoire"), "Côte D'Ivoire");
    }

    #[test]
    fn empty_and_blank_pass_through_as_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t "), "");
    }

    #[test]
    fn idempotent() {
        let once = normalize(" saint vincent and the grenadines");
        assert_eq!(normalize(&once), once);
    }
}
