use contrapart_core::normalize::{normalize, title_case};

use crate::store::{SupplierEntry, SupplierRegistry};

/// Resolve `term` to the match patterns of the supplier it refers to.
///
/// Entries are scanned in key order and the first entry with an alias whose
/// normalized form equals, contains, or is contained by the normalized term
/// wins. When alias sets overlap across entries this tie-break is
/// deterministic but carries no semantic meaning — callers should not read
/// significance into which of two overlapping suppliers is returned.
///
/// An unknown term falls back to a single pattern: the normalized term
/// itself.
pub fn patterns_for(registry: &SupplierRegistry, term: &str) -> Vec<String> {
    let term_n = normalize(term);
    match lookup(registry, &term_n) {
        Some((_, entry)) => entry.patterns.iter().map(|p| normalize(p)).collect(),
        None => vec![term_n],
    }
}

/// True iff any pattern for `term` occurs as a substring of the normalized
/// description. Matching is case- and diacritic-insensitive.
pub fn matches(registry: &SupplierRegistry, description: &str, term: &str) -> bool {
    let description_n = normalize(description);
    patterns_for(registry, term)
        .iter()
        .any(|p| !p.is_empty() && description_n.contains(p.as_str()))
}

/// Canonical display form of `term`: the title-cased first alias of the
/// matched supplier, or a title-cased echo of the input when unknown.
pub fn display_name(registry: &SupplierRegistry, term: &str) -> String {
    let term_n = normalize(term);
    match lookup(registry, &term_n) {
        Some((key, entry)) => title_case(entry.aliases.first().map(String::as_str).unwrap_or(key)),
        None => title_case(term),
    }
}

fn lookup<'a>(
    registry: &'a SupplierRegistry,
    term_n: &str,
) -> Option<(&'a str, &'a SupplierEntry)> {
    if term_n.is_empty() {
        return None;
    }
    registry
        .all()
        .iter()
        .find(|(_, entry)| entry.aliases.iter().any(|alias| alias_matches(alias, term_n)))
        .map(|(key, entry)| (key.as_str(), entry))
}

fn alias_matches(alias: &str, term_n: &str) -> bool {
    let alias_n = normalize(alias);
    !alias_n.is_empty()
        && (alias_n == term_n || alias_n.contains(term_n) || term_n.contains(&alias_n))
}
