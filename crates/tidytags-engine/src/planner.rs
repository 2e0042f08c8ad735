//! Offline consolidation planning over a snapshot of the tag vocabulary.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tidytags_core::{
    ConsolidationPlan, DeletionReason, PlanError, TagDeletion, Tag, UsageStatistics,
};
use tracing::{debug, warn};

use crate::canonical::choose_canonical_form;
use crate::classify::classify;
use crate::similarity::{case_duplicate_groups, find_semantic_overlaps, near_duplicate_pairs, ReviewPair};
use crate::vocabulary::Vocabulary;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanOptions {
    pub low_use_threshold: u64,
    pub delete_low_use: bool,
    pub include_junk: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            low_use_threshold: 3,
            delete_low_use: true,
            include_junk: false,
        }
    }
}

/// Case duplicates are folded first, synonym groups second, and only tags
/// untouched by either are considered for deletion. Tags that other names
/// are folded into are never deleted.
pub fn plan(
    tags: &[Tag],
    options: &PlanOptions,
    vocabulary: &Vocabulary,
) -> Result<ConsolidationPlan, PlanError> {
    let case = case_normalizations(tags, vocabulary);
    let semantic = semantic_consolidations(tags, vocabulary, &case);

    let targets: BTreeSet<&str> = case
        .values()
        .chain(semantic.values())
        .map(String::as_str)
        .collect();

    let mut deletions = Vec::new();
    let mut scheduled = BTreeSet::new();
    for tag in tags.iter().filter(|t| !t.name.is_empty()) {
        let name = tag.name.as_str();
        if case.contains_key(name) || semantic.contains_key(name) || targets.contains(name) {
            continue;
        }
        let junk = options
            .include_junk
            .then(|| classify(name, vocabulary.junk_words(), vocabulary.valid_acronyms()))
            .filter(|result| result.is_junk)
            .map(|result| DeletionReason::Junk {
                reason: result.reason,
            });
        let low_use = (options.delete_low_use && tag.usage_count() < options.low_use_threshold)
            .then_some(DeletionReason::LowUse);

        if let Some(reason) = junk.or(low_use) {
            if !scheduled.insert((name, tag.id.clone())) {
                continue;
            }
            deletions.push(TagDeletion {
                name: name.to_string(),
                id: tag.id.clone(),
                usage: tag.usage_count(),
                reason,
            });
        }
    }

    debug!(
        case = case.len(),
        semantic = semantic.len(),
        deletions = deletions.len(),
        "consolidation plan built"
    );
    ConsolidationPlan::from_snapshot(tags, case, semantic, deletions)
}

fn case_normalizations(tags: &[Tag], vocabulary: &Vocabulary) -> BTreeMap<String, String> {
    let mut mapping = BTreeMap::new();
    for (_, mut members) in case_duplicate_groups(tags) {
        // stable: equal usage keeps input order
        members.sort_by(|a, b| b.usage_count().cmp(&a.usage_count()));
        let names: Vec<&str> = members.iter().map(|t| t.name.as_str()).collect();
        let Some(canonical) = choose_canonical_form(&names, vocabulary.acronyms()) else {
            continue;
        };
        for name in names {
            if name != canonical {
                mapping.insert(name.to_string(), canonical.clone());
            }
        }
    }
    mapping
}

/// A matched spelling that is itself being case-normalized contributes its
/// canonical form as the key, whether or not that form exists yet; the plan
/// resolves the chain so the fold lands in one run.
fn semantic_consolidations(
    tags: &[Tag],
    vocabulary: &Vocabulary,
    case: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut mapping: BTreeMap<String, String> = BTreeMap::new();

    for overlap in find_semantic_overlaps(tags, vocabulary.synonym_groups()) {
        let label = overlap.label;
        if case.contains_key(&label) || mapping.contains_key(&label) {
            warn!(label = %label, "synonym label is itself being renamed; group skipped");
            continue;
        }
        for matched in &overlap.names {
            let source = case.get(matched).map(String::as_str).unwrap_or(matched.as_str());
            if source == label || case.contains_key(source) || mapping.contains_key(source) {
                continue;
            }
            mapping.insert(source.to_string(), label.clone());
        }
    }
    mapping
}

pub fn usage_statistics(tags: &[Tag]) -> UsageStatistics {
    if tags.is_empty() {
        return UsageStatistics::default();
    }
    let usages: Vec<u64> = tags.iter().map(Tag::usage_count).collect();
    let total_links: u64 = usages.iter().sum();
    UsageStatistics {
        total_tags: tags.len(),
        unused_tags: usages.iter().filter(|&&u| u == 0).count(),
        single_use_tags: usages.iter().filter(|&&u| u == 1).count(),
        low_use_tags: usages.iter().filter(|&&u| u <= 3).count(),
        high_use_tags: usages.iter().filter(|&&u| u >= 10).count(),
        total_links,
        avg_usage: total_links as f64 / tags.len() as f64,
    }
}

/// Near-duplicates the plan leaves alone, for manual review. Each
/// lower-cased name is considered once.
pub fn review_candidates(
    tags: &[Tag],
    plan: &ConsolidationPlan,
    review_threshold: f64,
) -> Vec<ReviewPair> {
    let mut seen = BTreeSet::new();
    let names: Vec<&str> = tags
        .iter()
        .map(|t| plan.resolve(&t.name))
        .filter(|name| !name.is_empty() && !plan.is_marked_for_deletion(name))
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect();
    near_duplicate_pairs(&names, review_threshold)
}
