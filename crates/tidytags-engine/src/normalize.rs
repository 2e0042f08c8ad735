//! Per-link normalization of freshly generated tags against the existing
//! vocabulary.

use std::collections::BTreeSet;

use tidytags_core::Tag;

use crate::canonical::normalize_case;
use crate::similarity::{check_threshold, fuzzy_match, SimilarityError};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationKind {
    Matched,
    CaseNormalized,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTag {
    pub name: String,
    pub kind: NormalizationKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkNormalization {
    pub tags: Vec<String>,
    pub fuzzy_matched: usize,
    pub case_normalized: usize,
}

/// Existing names are scanned most-used first (ties by name), which makes
/// first-match-wins deterministic across runs.
#[derive(Debug, Clone)]
pub struct TagNormalizer<'v> {
    acronyms: &'v BTreeSet<String>,
    existing: Vec<String>,
    threshold: f64,
}

impl<'v> TagNormalizer<'v> {
    pub fn new(
        acronyms: &'v BTreeSet<String>,
        existing_tags: &[Tag],
        threshold: f64,
    ) -> Result<Self, SimilarityError> {
        let threshold = check_threshold(threshold)?;
        let mut ordered: Vec<&Tag> = existing_tags.iter().filter(|t| !t.name.is_empty()).collect();
        ordered.sort_by(|a, b| {
            b.usage_count()
                .cmp(&a.usage_count())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(Self {
            acronyms,
            existing: ordered.into_iter().map(|t| t.name.clone()).collect(),
            threshold,
        })
    }

    pub fn existing_names(&self) -> &[String] {
        &self.existing
    }

    pub fn normalize_tag(&self, name: &str) -> NormalizedTag {
        if let Some(existing) = fuzzy_match(name, &self.existing, self.threshold) {
            let kind = if existing == name {
                NormalizationKind::Unchanged
            } else {
                NormalizationKind::Matched
            };
            return NormalizedTag {
                name: existing.to_string(),
                kind,
            };
        }
        let normalized = normalize_case(name, self.acronyms);
        let kind = if normalized == name {
            NormalizationKind::Unchanged
        } else {
            NormalizationKind::CaseNormalized
        };
        NormalizedTag {
            name: normalized,
            kind,
        }
    }

    /// Normalized, de-duplicated tag list for a link, or `None` when nothing
    /// would change.
    pub fn normalize_link_tags<S: AsRef<str>>(&self, names: &[S]) -> Option<LinkNormalization> {
        let mut result = LinkNormalization::default();
        let mut changed = false;
        for name in names.iter().map(AsRef::as_ref).filter(|n| !n.is_empty()) {
            let normalized = self.normalize_tag(name);
            match normalized.kind {
                NormalizationKind::Matched => result.fuzzy_matched += 1,
                NormalizationKind::CaseNormalized => result.case_normalized += 1,
                NormalizationKind::Unchanged => {}
            }
            changed |= normalized.kind != NormalizationKind::Unchanged;
            if !result.tags.contains(&normalized.name) {
                result.tags.push(normalized.name);
            }
        }
        changed.then_some(result)
    }
}
