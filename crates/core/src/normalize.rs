use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical text form used for all supplier matching: NFD-decomposed with
/// combining marks dropped, lowercased, and stripped of whitespace and
/// hyphen/underscore/dot/slash separators. Idempotent, so accented and
/// unaccented spellings of the same name collapse to one form.
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '.' | '/'))
        .collect()
}

/// Uppercase the first letter of each whitespace-separated word, lowercase
/// the rest. Used to render stored aliases back as display names.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
