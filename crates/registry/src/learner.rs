use std::sync::OnceLock;

use regex::Regex;

use crate::resolver;
use crate::store::{AddOutcome, SupplierRegistry};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Statement grammar: "NAME : free text" or "NAME *** free text".
re!(re_leading_segment, r"^(.{4,}?)\s*(?::|\*{3,}|-{3,}|={3,})");

// Statement grammar: transfer marker, beneficiary, then an IBAN-like token
// or a communication marker.
re!(re_transfer_beneficiary,
    r"(?i)\b(?:virement\s+(?:en\s+faveur\s+de|au\s+profit\s+de|a|vers)|overschrijving\s+(?:naar|aan)|ten\s+gunste\s+van|transfer\s+to|payment\s+to|in\s+favou?r\s+of)\s+(.+?)(?:\s+[a-z]{2}\d{2}[a-z0-9]*\b|\s+(?:communication|mededeling|reference|ref)\b|\s*$)");

// Statement grammar: collection keyword, optional European qualifier, entity
// name, then a long digit run. The qualifier belongs to the marker, not the
// captured name.
re!(re_collection_entity,
    r"(?i)\b(?:recouvrement|domiciliation|domiciliering|incasso|encaissement)\b(?:\s+europ[eé]en(?:ne)?)?\s+(\D{4,}?)(?:\s+\d{3,}|\s*$)");

// Statement grammar: two-plus consecutive all-caps words closed by a
// legal-entity suffix token.
re!(re_uppercase_company,
    r"\b((?:\p{Lu}[\p{Lu}&'.-]+\s+){2,}(?:SA/NV|NV/SA|SPRL|BVBA|CVBA|GMBH|SARL|LTD|PLC|INC|LLC|SA|NV|BV|AG))\b");

// ── Vocabulary ───────────────────────────────────────────────────────────────

const LEGAL_SUFFIXES: &[&str] = &[
    "sa/nv", "nv/sa", "sa", "nv", "sprl", "bvba", "cvba", "bv", "vof", "gmbh", "ag", "sarl",
    "sas", "se", "ltd", "plc", "inc", "llc", "co",
];

const STOP_WORDS: &[&str] = &["de", "la", "le", "les", "du", "des", "the", "of"];

const MIN_NAME_CHARS: usize = 4;
const MAX_NAME_WORDS: usize = 6;

// ── Extraction cascade ───────────────────────────────────────────────────────

type RuleFn = fn(&str) -> Option<String>;

/// Heuristic rules in priority order. The first rule whose candidate passes
/// the sanity check wins; later rules are not tried.
const RULES: &[(&str, RuleFn)] = &[
    ("leading-segment", extract_leading_segment),
    ("transfer-beneficiary", extract_transfer_beneficiary),
    ("collection-keyword", extract_collection_entity),
    ("uppercase-legal-suffix", extract_uppercase_company),
];

/// Mine a transaction description for a supplier name candidate.
pub fn extract(description: &str) -> Option<String> {
    for &(rule_name, rule) in RULES {
        if let Some(candidate) = rule(description) {
            let candidate = candidate.trim().to_string();
            if passes_sanity_check(&candidate) {
                tracing::debug!(rule = rule_name, candidate = %candidate, "extracted supplier candidate");
                return Some(candidate);
            }
        }
    }
    None
}

fn extract_leading_segment(description: &str) -> Option<String> {
    capture(re_leading_segment(), description)
}

fn extract_transfer_beneficiary(description: &str) -> Option<String> {
    capture(re_transfer_beneficiary(), description)
}

fn extract_collection_entity(description: &str) -> Option<String> {
    capture(re_collection_entity(), description)
}

fn extract_uppercase_company(description: &str) -> Option<String> {
    capture(re_uppercase_company(), description)
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn passes_sanity_check(name: &str) -> bool {
    let words = name.split_whitespace().count();
    name.chars().count() >= MIN_NAME_CHARS
        && (1..=MAX_NAME_WORDS).contains(&words)
        && name.chars().any(|c| c.is_alphabetic())
}

// ── Key derivation ───────────────────────────────────────────────────────────

/// Canonical key for a captured name: lowercase, one trailing legal-entity
/// suffix stripped, stop words dropped, reduced to alphanumerics and single
/// spaces.
pub fn normalize_key(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();

    if tokens.len() > 1 && tokens.last().is_some_and(|t| LEGAL_SUFFIXES.contains(t)) {
        tokens.pop();
    }

    let joined = tokens
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(t))
        .collect::<Vec<_>>()
        .join(" ");

    joined
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase alphanumeric-and-space form of a name, legal suffix kept.
fn clean_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A candidate supplier identity derived from one captured name; discarded
/// unless it is converted into a registry entry.
#[derive(Debug, Clone)]
pub(crate) struct ExtractionCandidate {
    pub(crate) raw_name: String,
    pub(crate) key: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) patterns: Vec<String>,
}

pub(crate) fn build_candidate(raw_name: &str) -> Option<ExtractionCandidate> {
    let key = normalize_key(raw_name);
    if key.is_empty() {
        return None;
    }

    let full = clean_name(raw_name);
    let words: Vec<&str> = full.split_whitespace().collect();

    let mut aliases = vec![full.clone()];
    if key != full {
        aliases.push(key.clone());
    }
    if let Some(first) = words.first() {
        push_unique(&mut aliases, first.to_string());
    }
    if words.len() > 1 {
        push_unique(&mut aliases, words[..2].join(" "));
    }

    let pattern: String = full.chars().filter(|c| c.is_alphanumeric()).collect();

    Some(ExtractionCandidate {
        raw_name: raw_name.to_string(),
        key,
        aliases,
        patterns: vec![pattern],
    })
}

fn push_unique(aliases: &mut Vec<String>, alias: String) {
    if !alias.is_empty() && !aliases.contains(&alias) {
        aliases.push(alias);
    }
}

// ── Registry mutation ────────────────────────────────────────────────────────

/// True iff `name` already resolves to some registered supplier. Linear in
/// the registry size.
pub fn is_known(registry: &SupplierRegistry, name: &str) -> bool {
    registry
        .all()
        .keys()
        .any(|key| resolver::matches(registry, name, key))
}

/// Attempt to grow the registry from one transaction description. Returns
/// true only when a previously-unknown supplier was registered.
pub fn learn(registry: &mut SupplierRegistry, description: &str) -> bool {
    let Some(raw_name) = extract(description) else {
        return false;
    };
    if is_known(registry, &raw_name) {
        return false;
    }
    let Some(candidate) = build_candidate(&raw_name) else {
        return false;
    };

    let outcome = registry.add(
        &candidate.key,
        &candidate.aliases[0],
        candidate.aliases[1..].to_vec(),
        candidate.patterns.clone(),
    );
    if outcome.is_added() {
        tracing::info!(key = %candidate.key, from = %candidate.raw_name, "learned new supplier");
    }
    outcome.is_added()
}

/// Operator-driven registration of a supplier by name, with optional extra
/// aliases. Extra aliases contribute derived patterns as well.
pub fn add_manual(
    registry: &mut SupplierRegistry,
    name: &str,
    extra_aliases: &[String],
) -> AddOutcome {
    let Some(candidate) = build_candidate(name) else {
        return AddOutcome::Rejected;
    };

    let mut aliases = candidate.aliases[1..].to_vec();
    let mut patterns = candidate.patterns.clone();
    for extra in extra_aliases {
        let extra = extra.trim();
        if extra.is_empty() {
            continue;
        }
        push_unique(&mut aliases, extra.to_string());
        push_unique(&mut patterns, contrapart_core::normalize(extra));
    }

    registry.add(&candidate.key, &candidate.aliases[0], aliases, patterns)
}
