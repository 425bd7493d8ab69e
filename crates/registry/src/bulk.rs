use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use contrapart_core::normalize;

use crate::learner;
use crate::store::{SupplierEntry, SupplierRegistry};

/// Manually-curated replacement alias sets for canonical keys whose
/// generated aliases are too generic (a single common word can otherwise
/// match unrelated transactions). Applied only during bulk re-imports; the
/// matching algorithm itself stays permissive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AliasOverrides {
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

impl AliasOverrides {
    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub replaced: usize,
    pub skipped: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} replaced, {} skipped",
            self.imported, self.replaced, self.skipped
        )
    }
}

/// Seed or refresh the registry from historical counterparty names (for
/// example an invoice export). Existing keys are replaced wholesale;
/// patterns are re-derived from the effective alias set.
pub fn import_names(
    registry: &mut SupplierRegistry,
    names: &[String],
    overrides: &AliasOverrides,
) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for name in names {
        let Some(candidate) = learner::build_candidate(name) else {
            tracing::debug!(name = %name, "skipping unusable counterparty name");
            summary.skipped += 1;
            continue;
        };

        let aliases = overrides
            .aliases
            .get(&candidate.key)
            .cloned()
            .unwrap_or(candidate.aliases);

        let mut patterns: Vec<String> = Vec::new();
        for alias in &aliases {
            let pattern = normalize(alias);
            if !pattern.is_empty() && !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }

        let entry = SupplierEntry { aliases, patterns };
        if registry.insert_entry(&candidate.key, entry) {
            summary.replaced += 1;
        } else {
            summary.imported += 1;
        }
    }

    tracing::info!(%summary, total = names.len(), "bulk supplier import finished");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_registry() -> (tempfile::TempDir, SupplierRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let reg = SupplierRegistry::new(dir.path().join("suppliers.json"));
        (dir, reg)
    }

    #[test]
    fn imports_new_names_with_generated_aliases() {
        let (_dir, mut reg) = empty_registry();
        let names = vec!["Acme Consulting SPRL".to_string(), "Globex NV".to_string()];

        let summary = import_names(&mut reg, &names, &AliasOverrides::default());

        assert_eq!(summary, ImportSummary { imported: 2, replaced: 0, skipped: 0 });
        let entry = &reg.all()["acme consulting"];
        assert_eq!(entry.aliases[0], "acme consulting sprl");
        assert!(entry.patterns.contains(&"acmeconsultingsprl".to_string()));
    }

    #[test]
    fn override_replaces_generated_alias_set() {
        let (_dir, mut reg) = empty_registry();
        let mut overrides = AliasOverrides::default();
        overrides.aliases.insert(
            "acme consulting".to_string(),
            vec!["acme consulting".to_string(), "acme cv".to_string()],
        );

        import_names(
            &mut reg,
            &["Acme Consulting SPRL".to_string()],
            &overrides,
        );

        let entry = &reg.all()["acme consulting"];
        assert_eq!(entry.aliases, vec!["acme consulting".to_string(), "acme cv".to_string()]);
        assert_eq!(
            entry.patterns,
            vec!["acmeconsulting".to_string(), "acmecv".to_string()]
        );
    }

    #[test]
    fn reimport_replaces_existing_entries() {
        let (_dir, mut reg) = empty_registry();
        let names = vec!["Globex NV".to_string()];

        import_names(&mut reg, &names, &AliasOverrides::default());
        let summary = import_names(&mut reg, &names, &AliasOverrides::default());

        assert_eq!(summary, ImportSummary { imported: 0, replaced: 1, skipped: 0 });
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unusable_names_are_skipped() {
        let (_dir, mut reg) = empty_registry();
        let summary = import_names(
            &mut reg,
            &["///".to_string(), "Globex NV".to_string()],
            &AliasOverrides::default(),
        );
        assert_eq!(summary, ImportSummary { imported: 1, replaced: 0, skipped: 1 });
    }

    #[test]
    fn overrides_parse_from_toml() {
        let overrides = AliasOverrides::from_toml(
            r#"
            [aliases]
            "acme consulting" = ["acme consulting", "acme cv"]
            "#,
        )
        .unwrap();
        assert_eq!(overrides.aliases["acme consulting"].len(), 2);
    }
}
