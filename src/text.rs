//! Whole-word keyword matching over free text

/// Lowercased alphanumeric words; any other character separates words
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `term` occurs in `words` as a whole word or consecutive word run.
///
/// Punctuation inside the term splits it the same way (`u.s.` is `u s`), and
/// the last word may carry a plural `s` (`share` matches `shares`).
pub(crate) fn mentions(words: &[String], term: &str) -> bool {
    let parts: Vec<&str> = term
        .split(|c: char| !c.is_alphanumeric())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() || parts.len() > words.len() {
        return false;
    }

    let last = parts.len() - 1;
    words.windows(parts.len()).any(|window| {
        window.iter().zip(&parts).enumerate().all(|(i, (word, part))| {
            word == part || (i == last && word.strip_suffix('s') == Some(*part))
        })
    })
}

/// Number of distinct `terms` mentioned in `words`
pub(crate) fn count_mentions(words: &[String], terms: &[&str]) -> usize {
    terms.iter().filter(|term| mentions(words, term)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_words_only() {
        let w = words("Goodwill impairment hit the focus stock");
        assert!(!mentions(&w, "will"));
        assert!(!mentions(&w, "us"));
        assert!(mentions(&w, "stock"));
    }

    #[test]
    fn test_phrases_and_plurals() {
        let w = words("The Reserve Bank of India held rates; shares of U.S. banks fell.");
        assert!(mentions(&w, "reserve bank of india"));
        assert!(mentions(&w, "u.s."));
        assert!(mentions(&w, "share"));
        assert!(!mentions(&w, "bank of england"));
        assert_eq!(count_mentions(&w, &["share", "india", "profit"]), 2);
    }
}
