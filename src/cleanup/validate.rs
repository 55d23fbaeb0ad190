//! Rewrite acceptance heuristics.
//!
//! A rewrite provider's output is never trusted as-is: chat models narrate,
//! paraphrase, expand and silently translate.  [`validate_rewrite`] applies
//! the checks in a fixed order and any failure rejects the candidate, which
//! sends the cleanup engine on to the next provider (or the deterministic
//! floor).

use crate::language::OutputMode;

/// Closed set of colloquial Hindi-in-Roman-script words.  In Hinglish mode a
/// rewrite that drops every one of these present in the original is assumed
/// to have translated the text into English and is rejected.
pub const HINDI_ROMAN_KEEP_TOKENS: &[&str] = &[
    "bhai", "behen", "kya", "kyun", "kaise", "haan", "nahi", "hai", "hain", "tha", "thi", "the",
    "acha", "accha", "yaar", "bhaiya", "didi", "tum", "aap", "mera", "meri", "apna", "apni", "kar",
    "karo", "karna", "chalo", "chal", "mat", "toh", "bas", "thik", "theek", "haanji",
];

/// Conversational preamble markers; a candidate starting with one of these is
/// narrating instead of answering.
const META_PREFIXES: &[&str] = &[
    "certainly", "sure", "here's", "here is", "cleaned", "revised", "output:",
];

/// Tuned rejection thresholds (see the cleanup config for the defaults).
#[derive(Debug, Clone, Copy)]
pub struct RewriteLimits {
    /// Minimum `overlap_ratio` between original and candidate tokens.
    pub min_overlap_ratio: f32,
    /// Maximum candidate-to-original word count ratio.
    pub max_expansion_ratio: f32,
}

// ---------------------------------------------------------------------------
// Tokenization / overlap
// ---------------------------------------------------------------------------

/// Lowercased alphabetic word tokens (ASCII letters and apostrophes).
pub fn tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_alphabetic() || c == '\'' {
            current.push(c.to_ascii_lowercase());
        } else if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Fraction of source tokens "covered" by the candidate: the number of
/// candidate tokens found in the source token set, over the source token
/// count.  `1.0` for an empty source.
///
/// Identity holds (`overlap_ratio(t, t) == 1.0` for duplicate-free `t`) and
/// removing candidate tokens can only lower the ratio.
pub fn overlap_ratio(source: &[String], candidate: &[String]) -> f32 {
    if source.is_empty() {
        return 1.0;
    }
    let source_set: std::collections::HashSet<&str> =
        source.iter().map(String::as_str).collect();
    let kept = candidate
        .iter()
        .filter(|t| source_set.contains(t.as_str()))
        .count();
    kept as f32 / source.len() as f32
}

// ---------------------------------------------------------------------------
// Candidate cleanup
// ---------------------------------------------------------------------------

/// Strip a single matching pair of wrapping quotes, trimming the remainder.
pub fn strip_wrapping_quotes(text: &str) -> &str {
    const PAIRS: [(char, char); 3] = [('"', '"'), ('\'', '\''), ('\u{201C}', '\u{201D}')];

    let mut chars = text.chars();
    let (first, rest) = match chars.next() {
        Some(c) => (c, chars.as_str()),
        None => return text,
    };
    let last = match rest.chars().last() {
        Some(c) => c,
        None => return text, // single character, nothing to strip
    };

    for (left, right) in PAIRS {
        if first == left && last == right {
            return text[left.len_utf8()..text.len() - right.len_utf8()].trim();
        }
    }
    text
}

fn looks_like_meta_response(text: &str) -> bool {
    let lowered = text.to_lowercase();
    META_PREFIXES.iter().any(|p| lowered.starts_with(p))
}

fn translated_hinglish_terms(source: &[String], candidate: &[String]) -> bool {
    let protected: Vec<&str> = source
        .iter()
        .map(String::as_str)
        .filter(|t| HINDI_ROMAN_KEEP_TOKENS.contains(t))
        .collect();
    if protected.is_empty() {
        return false;
    }
    let candidate_set: std::collections::HashSet<&str> =
        candidate.iter().map(String::as_str).collect();
    !protected.iter().any(|t| candidate_set.contains(t))
}

// ---------------------------------------------------------------------------
// validate_rewrite
// ---------------------------------------------------------------------------

/// Validate a provider rewrite against the original text.
///
/// Returns the cleaned-up candidate when accepted, `None` when rejected.
/// Checks, in order: non-empty after whitespace/quote cleanup, meta-response
/// preamble, lexical overlap, expansion ratio, and (Hinglish only) the
/// protected-token survival rule.
pub fn validate_rewrite(
    original: &str,
    rewritten: &str,
    mode: OutputMode,
    limits: &RewriteLimits,
) -> Option<String> {
    let flattened = rewritten.replace('\n', " ");
    let collapsed = crate::language::normalize_spaces(&flattened);
    let candidate = strip_wrapping_quotes(&collapsed).to_string();
    if candidate.is_empty() {
        return None;
    }

    if looks_like_meta_response(&candidate) {
        log::warn!("cleanup: rewrite rejected, meta response detected");
        return None;
    }

    let original_tokens = tokens(original);
    let candidate_tokens = tokens(&candidate);

    if !original_tokens.is_empty() && !candidate_tokens.is_empty() {
        let overlap = overlap_ratio(&original_tokens, &candidate_tokens);
        if overlap < limits.min_overlap_ratio {
            log::warn!("cleanup: rewrite rejected, low lexical overlap ({overlap:.2})");
            return None;
        }
    }

    let original_words = original_tokens.len().max(1);
    if candidate_tokens.len() as f32 > original_words as f32 * limits.max_expansion_ratio {
        log::warn!("cleanup: rewrite rejected, output expanded too much");
        return None;
    }

    if mode == OutputMode::HinglishRoman
        && translated_hinglish_terms(&original_tokens, &candidate_tokens)
    {
        log::warn!("cleanup: rewrite rejected, likely Hinglish-to-English translation");
        return None;
    }

    Some(candidate)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> RewriteLimits {
        RewriteLimits {
            min_overlap_ratio: 0.45,
            max_expansion_ratio: 2.0,
        }
    }

    // ---- tokens ----

    #[test]
    fn tokens_lowercase_alphabetic_runs() {
        assert_eq!(tokens("Hello, there!"), vec!["hello", "there"]);
    }

    #[test]
    fn tokens_keep_apostrophes() {
        assert_eq!(tokens("don't stop"), vec!["don't", "stop"]);
    }

    #[test]
    fn tokens_skip_digits_and_symbols() {
        assert_eq!(tokens("a1b 2c"), vec!["a", "b", "c"]);
    }

    // ---- overlap_ratio ----

    #[test]
    fn overlap_identity_is_one() {
        let t = tokens("hello there friend");
        assert!((overlap_ratio(&t, &t) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn overlap_empty_source_is_one() {
        assert_eq!(overlap_ratio(&[], &tokens("anything")), 1.0);
    }

    #[test]
    fn overlap_monotonic_under_candidate_removal() {
        let source = tokens("one two three four");
        let mut candidate = source.clone();
        let mut previous = overlap_ratio(&source, &candidate);
        while candidate.pop().is_some() {
            let current = overlap_ratio(&source, &candidate);
            assert!(current <= previous);
            previous = current;
        }
        assert_eq!(previous, 0.0);
    }

    // ---- strip_wrapping_quotes ----

    #[test]
    fn strips_matching_double_quotes() {
        assert_eq!(strip_wrapping_quotes("\"hello\""), "hello");
    }

    #[test]
    fn strips_curly_quotes() {
        assert_eq!(strip_wrapping_quotes("\u{201C}hello\u{201D}"), "hello");
    }

    #[test]
    fn keeps_unmatched_quotes() {
        assert_eq!(strip_wrapping_quotes("\"hello"), "\"hello");
        assert_eq!(strip_wrapping_quotes("he said \"hi\""), "he said \"hi\"");
    }

    #[test]
    fn single_char_untouched() {
        assert_eq!(strip_wrapping_quotes("\""), "\"");
    }

    // ---- validate_rewrite ----

    #[test]
    fn accepts_faithful_cleanup() {
        let out = validate_rewrite(
            "hello there how are you",
            "Hello there, how are you?",
            OutputMode::English,
            &limits(),
        );
        assert_eq!(out.as_deref(), Some("Hello there, how are you?"));
    }

    #[test]
    fn rejects_low_overlap_paraphrase() {
        let out = validate_rewrite(
            "hello there",
            "The weather is nice today",
            OutputMode::English,
            &limits(),
        );
        assert!(out.is_none());
    }

    #[test]
    fn rejects_meta_preamble() {
        for candidate in [
            "Certainly! Here you go",
            "Sure, hello there",
            "Here's the cleaned text: hello there",
            "Output: hello there",
        ] {
            assert!(
                validate_rewrite("hello there", candidate, OutputMode::English, &limits())
                    .is_none(),
                "should reject {candidate:?}"
            );
        }
    }

    #[test]
    fn rejects_excessive_expansion() {
        let out = validate_rewrite(
            "hi there",
            "hi there hi there hi there hi there hi",
            OutputMode::English,
            &limits(),
        );
        assert!(out.is_none());
    }

    #[test]
    fn rejects_hinglish_translation() {
        // "bhai" and "kya" are protected; none survive in the candidate.
        let out = validate_rewrite(
            "bhai kya haal hai",
            "Brother, what is going on?",
            OutputMode::HinglishRoman,
            &limits(),
        );
        assert!(out.is_none());
    }

    #[test]
    fn accepts_hinglish_with_surviving_tokens() {
        let out = validate_rewrite(
            "bhai kya haal hai",
            "bhai kya haal hai?",
            OutputMode::HinglishRoman,
            &limits(),
        );
        assert!(out.is_some());
    }

    #[test]
    fn english_mode_skips_protected_token_rule() {
        // Same translation is fine when the target mode is English.
        let out = validate_rewrite(
            "kya haal hai bhai how are you doing today friend",
            "haal hai how are you doing today friend",
            OutputMode::English,
            &limits(),
        );
        assert!(out.is_some());
    }

    #[test]
    fn rejects_empty_candidate() {
        assert!(validate_rewrite("hello", "  \n ", OutputMode::English, &limits()).is_none());
        assert!(validate_rewrite("hello", "\"\"", OutputMode::English, &limits()).is_none());
    }

    #[test]
    fn collapses_newlines_and_quotes() {
        let out = validate_rewrite(
            "hello there",
            "\"hello\nthere\"",
            OutputMode::English,
            &limits(),
        );
        assert_eq!(out.as_deref(), Some("hello there"));
    }
}
