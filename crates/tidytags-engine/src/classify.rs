//! Junk-tag classification: an ordered decision list, first match wins.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tidytags_core::{ClassificationResult, JunkReason, RecordId, Tag};

use crate::vocabulary::Vocabulary;

const GENERIC_SUFFIXES: &[&str] = &["ing", "ed", "er", "est", "ly"];
const GENERIC_SUFFIX_MAX_LEN: usize = 6;

/// Decide whether `tag_name` is junk.
///
/// Rule order: valid acronym (forces keep), blocklist, single character,
/// too short (unless all upper-case), all digits, no alphanumerics,
/// short word with a generic suffix.
pub fn classify(
    tag_name: &str,
    blocklist: &BTreeSet<String>,
    valid_acronyms: &BTreeSet<String>,
) -> ClassificationResult {
    let lower = tag_name.trim().to_lowercase();
    let lower_len = lower.chars().count();

    if valid_acronyms.contains(&lower) {
        return ClassificationResult::keep(tag_name, JunkReason::ValidAcronym);
    }
    if blocklist.contains(&lower) {
        return ClassificationResult::junk(tag_name, JunkReason::Blocklist);
    }
    if tag_name.chars().count() == 1 {
        return ClassificationResult::junk(tag_name, JunkReason::SingleChar);
    }
    if lower_len <= 2 && !is_all_upper(tag_name) {
        return ClassificationResult::junk(tag_name, JunkReason::TooShort);
    }
    if tag_name.chars().all(char::is_numeric) {
        return ClassificationResult::junk(tag_name, JunkReason::AllDigits);
    }
    if !tag_name.chars().any(char::is_alphanumeric) {
        return ClassificationResult::junk(tag_name, JunkReason::NoAlphanumeric);
    }
    if lower_len <= GENERIC_SUFFIX_MAX_LEN && GENERIC_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return ClassificationResult::junk(tag_name, JunkReason::GenericSuffix);
    }
    ClassificationResult::keep(tag_name, JunkReason::None)
}

fn is_all_upper(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}

#[derive(Debug, Clone, PartialEq)]
pub struct JunkTag {
    pub tag: Tag,
    pub reason: JunkReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JunkAnalysis {
    pub junk_tags: Vec<JunkTag>,
    pub good_tags: Vec<Tag>,
    pub total: usize,
}

pub fn analyze_junk(tags: &[Tag], vocabulary: &Vocabulary) -> JunkAnalysis {
    let mut analysis = JunkAnalysis {
        total: tags.len(),
        ..Default::default()
    };
    for tag in tags {
        let result = classify(&tag.name, vocabulary.junk_words(), vocabulary.valid_acronyms());
        if result.is_junk {
            analysis.junk_tags.push(JunkTag {
                tag: tag.clone(),
                reason: result.reason,
            });
        } else {
            analysis.good_tags.push(tag.clone());
        }
    }
    analysis
}

impl JunkAnalysis {
    pub fn breakdown(&self) -> BTreeMap<JunkReason, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.junk_tags {
            *counts.entry(item.reason).or_default() += 1;
        }
        counts
    }

    pub fn total_link_references(&self) -> u64 {
        self.junk_tags.iter().map(|j| j.tag.usage_count()).sum()
    }

    /// Junk tags in deletion order (least used first). With `min_usage > 0`
    /// only tags used at most `min_usage` times are returned.
    pub fn deletion_order(&self, min_usage: u64) -> Vec<&JunkTag> {
        let mut ordered: Vec<&JunkTag> = self
            .junk_tags
            .iter()
            .filter(|j| min_usage == 0 || j.tag.usage_count() <= min_usage)
            .collect();
        ordered.sort_by_key(|j| j.tag.usage_count());
        ordered
    }

    pub fn export(&self) -> JunkExport {
        JunkExport {
            total_tags: self.total,
            junk_count: self.junk_tags.len(),
            junk_tags: self
                .junk_tags
                .iter()
                .map(|j| JunkExportEntry {
                    name: j.tag.name.clone(),
                    id: j.tag.id.clone(),
                    usage: j.tag.usage_count(),
                    reason: j.reason,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunkExport {
    pub total_tags: usize,
    pub junk_count: usize,
    pub junk_tags: Vec<JunkExportEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunkExportEntry {
    pub name: String,
    pub id: Option<RecordId>,
    pub usage: u64,
    pub reason: JunkReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn reason(name: &str) -> (bool, JunkReason) {
        let result = classify(name, &set(&["the", "stuff"]), &set(&["ml", "docker"]));
        (result.is_junk, result.reason)
    }

    #[test]
    fn valid_acronym_overrides_blocklist() {
        let both = set(&["ai"]);
        let result = classify("ai", &both, &both);
        assert!(!result.is_junk);
        assert_eq!(result.reason, JunkReason::ValidAcronym);
    }

    #[test]
    fn each_rule_fires_in_order() {
        assert_eq!(reason("The"), (true, JunkReason::Blocklist));
        assert_eq!(reason("ml"), (false, JunkReason::ValidAcronym));
        assert_eq!(reason("a"), (true, JunkReason::SingleChar));
        assert_eq!(reason("A"), (true, JunkReason::SingleChar));
        assert_eq!(reason("go"), (true, JunkReason::TooShort));
        assert_eq!(reason("12"), (true, JunkReason::TooShort));
        assert_eq!(reason("2024"), (true, JunkReason::AllDigits));
        assert_eq!(reason("???"), (true, JunkReason::NoAlphanumeric));
        assert_eq!(reason("Boxing"), (true, JunkReason::GenericSuffix));
        assert_eq!(reason("quickly"), (false, JunkReason::None));
        assert_eq!(reason("Rust"), (false, JunkReason::None));
    }

    #[test]
    fn short_all_caps_names_survive_length_rule() {
        let empty = BTreeSet::new();
        let result = classify("AI", &empty, &empty);
        assert!(!result.is_junk);
        assert_eq!(result.reason, JunkReason::None);
    }

    #[test]
    fn generic_suffix_rule_hits_short_brand_names() {
        // known heuristic limitation: short proper nouns ending in -er are flagged
        let empty = BTreeSet::new();
        assert_eq!(classify("Uber", &empty, &empty).reason, JunkReason::GenericSuffix);
        assert_eq!(classify("Docker", &empty, &empty).reason, JunkReason::GenericSuffix);
        assert_eq!(classify("Docker", &empty, &set(&["docker"])).reason, JunkReason::ValidAcronym);
    }

    #[test]
    fn analysis_orders_deletions_by_usage_and_honours_min_usage() {
        let tags = vec![
            Tag::with_usage(1, "stuff", 7),
            Tag::with_usage(2, "Rust", 40),
            Tag::with_usage(3, "x", 0),
            Tag::with_usage(4, "the", 2),
        ];
        let vocabulary = Vocabulary::empty().with_junk_words(["stuff", "the"]);
        let analysis = analyze_junk(&tags, &vocabulary);

        assert_eq!(analysis.total, 4);
        assert_eq!(analysis.good_tags.len(), 1);
        assert_eq!(analysis.total_link_references(), 9);
        assert_eq!(analysis.breakdown()[&JunkReason::Blocklist], 2);

        let all: Vec<_> = analysis.deletion_order(0).iter().map(|j| j.tag.name.as_str()).collect();
        assert_eq!(all, vec!["x", "the", "stuff"]);
        let capped: Vec<_> = analysis.deletion_order(2).iter().map(|j| j.tag.name.as_str()).collect();
        assert_eq!(capped, vec!["x", "the"]);

        let export = analysis.export();
        assert_eq!(export.junk_count, 3);
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["junk_tags"][0]["reason"], "blocklist");
    }
}
