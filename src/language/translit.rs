//! Devanagari → Roman transliteration.
//!
//! A finite, lookup-driven transducer over the Devanagari block, not a
//! general transliteration library: one left-to-right scan with fixed tables
//! for consonants (including the nukta forms), independent vowels, dependent
//! vowel signs (matras) and the special modifiers.  A consonant with no
//! following vowel sign carries the inherent "a"; a following virama
//! suppresses it.  Anything outside the tables passes through unchanged.

/// The virama (vowel-suppression marker).
const VIRAMA: char = '\u{094D}';

/// The nukta combining mark; `consonant + nukta` pairs form the borrowed
/// Urdu/Persian sounds and must be matched before the bare consonant.
const NUKTA: char = '\u{093C}';

fn independent_vowel(c: char) -> Option<&'static str> {
    Some(match c {
        'अ' => "a",
        'आ' => "aa",
        'इ' => "i",
        'ई' => "ee",
        'उ' => "u",
        'ऊ' => "oo",
        'ऋ' => "ri",
        'ए' => "e",
        'ऐ' => "ai",
        'ओ' => "o",
        'औ' => "au",
        _ => return None,
    })
}

fn matra(c: char) -> Option<&'static str> {
    Some(match c {
        'ा' => "aa",
        'ि' => "i",
        'ी' => "ee",
        'ु' => "u",
        'ू' => "oo",
        'ृ' => "ri",
        'े' => "e",
        'ै' => "ai",
        'ो' => "o",
        'ौ' => "au",
        _ => return None,
    })
}

fn consonant(c: char) -> Option<&'static str> {
    Some(match c {
        'क' => "k",
        'ख' => "kh",
        'ग' => "g",
        'घ' => "gh",
        'ङ' => "ng",
        'च' => "ch",
        'छ' => "chh",
        'ज' => "j",
        'झ' => "jh",
        'ञ' => "ny",
        'ट' => "t",
        'ठ' => "th",
        'ड' => "d",
        'ढ' => "dh",
        'ण' => "n",
        'त' => "t",
        'थ' => "th",
        'द' => "d",
        'ध' => "dh",
        'न' => "n",
        'प' => "p",
        'फ' => "ph",
        'ब' => "b",
        'भ' => "bh",
        'म' => "m",
        'य' => "y",
        'र' => "r",
        'ल' => "l",
        'व' => "v",
        'श' => "sh",
        'ष' => "sh",
        'स' => "s",
        'ह' => "h",
        _ => return None,
    })
}

/// Consonant + nukta pairs (e.g. ज + ़ → z).
fn nukta_consonant(c: char) -> Option<&'static str> {
    Some(match c {
        'क' => "q",
        'ख' => "kh",
        'ग' => "g",
        'ज' => "z",
        'फ' => "f",
        'ड' => "r",
        'ढ' => "rh",
        _ => return None,
    })
}

/// Anusvara, chandrabindu and visarga.
fn special(c: char) -> Option<&'static str> {
    Some(match c {
        'ं' => "m",
        'ँ' => "n",
        'ः' => "h",
        VIRAMA => "",
        _ => return None,
    })
}

/// Transliterate Devanagari text to Roman script.
///
/// Correctness target is the fixed dictation vocabulary, round-tripped in the
/// tests below — phonetic completeness for arbitrary Hindi is out of scope.
///
/// ```
/// use speakflow::language::transliterate_devanagari;
///
/// assert_eq!(transliterate_devanagari("क्या"), "kyaa");
/// ```
pub fn transliterate_devanagari(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(v) = independent_vowel(c) {
            out.push_str(v);
            i += 1;
            continue;
        }

        // Nukta forms take priority over the bare consonant.
        let mut base: Option<&'static str> = None;
        if i + 1 < chars.len() && chars[i + 1] == NUKTA {
            if let Some(b) = nukta_consonant(c) {
                base = Some(b);
                i += 2;
            }
        }
        if base.is_none() {
            if let Some(b) = consonant(c) {
                base = Some(b);
                i += 1;
            }
        }

        if let Some(base) = base {
            match chars.get(i) {
                Some(&VIRAMA) => {
                    // Explicit vowel suppression: bare consonant, no "a".
                    out.push_str(base);
                    i += 1;
                }
                Some(&next) if matra(next).is_some() => {
                    out.push_str(base);
                    out.push_str(matra(next).unwrap_or_default());
                    i += 1;
                }
                _ => {
                    out.push_str(base);
                    out.push('a');
                }
            }
            continue;
        }

        if let Some(m) = matra(c) {
            out.push_str(m);
            i += 1;
            continue;
        }

        if let Some(s) = special(c) {
            out.push_str(s);
            i += 1;
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- fixed test vocabulary ----

    #[test]
    fn bare_consonant_carries_inherent_a() {
        assert_eq!(transliterate_devanagari("क"), "ka");
    }

    #[test]
    fn matra_replaces_inherent_vowel() {
        assert_eq!(transliterate_devanagari("का"), "kaa");
    }

    #[test]
    fn virama_suppresses_inherent_vowel() {
        assert_eq!(transliterate_devanagari("क्या"), "kyaa");
    }

    #[test]
    fn common_words() {
        assert_eq!(transliterate_devanagari("नमस्ते"), "namaste");
        assert_eq!(transliterate_devanagari("भाई"), "bhaaee");
        assert_eq!(transliterate_devanagari("है"), "hai");
    }

    // ---- structural cases ----

    #[test]
    fn independent_vowels() {
        assert_eq!(transliterate_devanagari("अ"), "a");
        assert_eq!(transliterate_devanagari("आओ"), "aao");
    }

    #[test]
    fn nukta_consonant_before_plain() {
        // ज + nukta is z, plain ज is j.
        assert_eq!(transliterate_devanagari("ज\u{093C}"), "za");
        assert_eq!(transliterate_devanagari("ज"), "ja");
    }

    #[test]
    fn anusvara_renders_as_m() {
        assert_eq!(transliterate_devanagari("मं"), "mam");
    }

    #[test]
    fn unmapped_codepoints_pass_through() {
        assert_eq!(transliterate_devanagari("क hello!"), "ka hello!");
        assert_eq!(transliterate_devanagari("123"), "123");
    }

    #[test]
    fn empty_input() {
        assert_eq!(transliterate_devanagari(""), "");
    }

    #[test]
    fn mixed_script_sentence() {
        assert_eq!(
            transliterate_devanagari("क्या time है"),
            "kyaa time hai"
        );
    }
}
