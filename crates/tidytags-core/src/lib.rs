//! Core domain model for tidytags: store records, consolidation plans, and
//! classification results.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

pub const CRATE_NAME: &str = "tidytags-core";

/// Store-assigned identifier, kept verbatim so reused records round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    #[serde(default)]
    pub links: u64,
}

/// The `_count` block is derived by the store and must never be sent back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<TagCount>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Tag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            count: None,
            extra: Map::new(),
        }
    }

    pub fn with_usage(id: impl Into<RecordId>, name: impl Into<String>, links: u64) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            count: Some(TagCount { links }),
            extra: Map::new(),
        }
    }

    pub fn usage_count(&self) -> u64 {
        self.count.map(|c| c.links).unwrap_or(0)
    }

    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Copy suitable for embedding in a link write: id and store metadata
    /// preserved, derived counters stripped.
    pub fn for_reuse(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            count: None,
            extra: self.extra.clone(),
        }
    }
}

/// A bookmark. Only `id` and `tags` are interpreted; every other field is
/// owned by the store and round-trips through `extra` unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: RecordId,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Link {
    pub fn url(&self) -> Option<&str> {
        self.extra.get("url").and_then(JsonValue::as_str)
    }

    /// Parsed `updatedAt`; the raw string stays in `extra` so the write
    /// payload keeps the store's exact formatting.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.extra
            .get("updatedAt")
            .and_then(JsonValue::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags
            .iter()
            .map(|t| t.name.as_str())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JunkReason {
    Blocklist,
    TooShort,
    SingleChar,
    AllDigits,
    NoAlphanumeric,
    GenericSuffix,
    ValidAcronym,
    None,
}

impl JunkReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocklist => "blocklist",
            Self::TooShort => "too_short",
            Self::SingleChar => "single_char",
            Self::AllDigits => "all_digits",
            Self::NoAlphanumeric => "no_alphanumeric",
            Self::GenericSuffix => "generic_suffix",
            Self::ValidAcronym => "valid_acronym",
            Self::None => "none",
        }
    }
}

impl fmt::Display for JunkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub tag: String,
    pub is_junk: bool,
    pub reason: JunkReason,
}

impl ClassificationResult {
    pub fn junk(tag: impl Into<String>, reason: JunkReason) -> Self {
        Self {
            tag: tag.into(),
            is_junk: true,
            reason,
        }
    }

    pub fn keep(tag: impl Into<String>, reason: JunkReason) -> Self {
        Self {
            tag: tag.into(),
            is_junk: false,
            reason,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStatistics {
    pub total_tags: usize,
    pub unused_tags: usize,
    pub single_use_tags: usize,
    pub low_use_tags: usize,
    pub high_use_tags: usize,
    pub total_links: u64,
    pub avg_usage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeletionReason {
    LowUse,
    Junk { reason: JunkReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDeletion {
    pub name: String,
    pub id: Option<RecordId>,
    pub usage: u64,
    pub reason: DeletionReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSection {
    CaseNormalizations,
    SemanticConsolidations,
    TagsToDelete,
}

impl fmt::Display for PlanSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CaseNormalizations => "case_normalizations",
            Self::SemanticConsolidations => "semantic_consolidations",
            Self::TagsToDelete => "tags_to_delete",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("tag {name:?} appears in both {first} and {second}")]
    Overlap {
        name: String,
        first: PlanSection,
        second: PlanSection,
    },
    #[error("empty tag name in {0}")]
    EmptyName(PlanSection),
    #[error("rename chain starting at {0:?} never settles")]
    Cycle(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStatistics {
    pub total_tags: usize,
    pub total_case_normalizations: usize,
    pub total_semantic_consolidations: usize,
    pub total_deletions: usize,
    pub estimated_final_tag_count: usize,
}

/// Immutable description of every rename/delete decision for one run.
///
/// Construction validates that no name is a key in more than one section
/// and that rename chains terminate; a plan that exists is sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PlanDocument")]
pub struct ConsolidationPlan {
    case_normalizations: BTreeMap<String, String>,
    semantic_consolidations: BTreeMap<String, String>,
    tags_to_delete: Vec<TagDeletion>,
    statistics: PlanStatistics,
}

#[derive(Deserialize)]
struct PlanDocument {
    #[serde(default)]
    case_normalizations: BTreeMap<String, String>,
    #[serde(default)]
    semantic_consolidations: BTreeMap<String, String>,
    #[serde(default)]
    tags_to_delete: Vec<TagDeletion>,
    statistics: PlanDocumentStatistics,
}

#[derive(Deserialize)]
struct PlanDocumentStatistics {
    total_tags: usize,
    #[serde(default)]
    estimated_final_tag_count: Option<usize>,
}

impl TryFrom<PlanDocument> for ConsolidationPlan {
    type Error = PlanError;

    fn try_from(doc: PlanDocument) -> Result<Self, Self::Error> {
        let mut plan = Self::new(
            doc.statistics.total_tags,
            doc.case_normalizations,
            doc.semantic_consolidations,
            doc.tags_to_delete,
        )?;
        if let Some(estimate) = doc.statistics.estimated_final_tag_count {
            plan.statistics.estimated_final_tag_count = estimate.min(plan.statistics.total_tags);
        }
        Ok(plan)
    }
}

impl ConsolidationPlan {
    pub fn new(
        total_tags: usize,
        case_normalizations: BTreeMap<String, String>,
        semantic_consolidations: BTreeMap<String, String>,
        tags_to_delete: Vec<TagDeletion>,
    ) -> Result<Self, PlanError> {
        for (section, map) in [
            (PlanSection::CaseNormalizations, &case_normalizations),
            (PlanSection::SemanticConsolidations, &semantic_consolidations),
        ] {
            if map.iter().any(|(k, v)| k.is_empty() || v.is_empty()) {
                return Err(PlanError::EmptyName(section));
            }
        }
        if tags_to_delete.iter().any(|d| d.name.is_empty()) {
            return Err(PlanError::EmptyName(PlanSection::TagsToDelete));
        }

        if let Some(name) = case_normalizations
            .keys()
            .find(|k| semantic_consolidations.contains_key(*k))
        {
            return Err(PlanError::Overlap {
                name: name.clone(),
                first: PlanSection::CaseNormalizations,
                second: PlanSection::SemanticConsolidations,
            });
        }
        for deletion in &tags_to_delete {
            let clash = if case_normalizations.contains_key(&deletion.name) {
                Some(PlanSection::CaseNormalizations)
            } else if semantic_consolidations.contains_key(&deletion.name) {
                Some(PlanSection::SemanticConsolidations)
            } else {
                None
            };
            if let Some(first) = clash {
                return Err(PlanError::Overlap {
                    name: deletion.name.clone(),
                    first,
                    second: PlanSection::TagsToDelete,
                });
            }
        }

        let removed = case_normalizations.len() + semantic_consolidations.len() + tags_to_delete.len();
        let statistics = PlanStatistics {
            total_tags,
            total_case_normalizations: case_normalizations.len(),
            total_semantic_consolidations: semantic_consolidations.len(),
            total_deletions: tags_to_delete.len(),
            estimated_final_tag_count: total_tags.saturating_sub(removed),
        };

        let plan = Self {
            case_normalizations,
            semantic_consolidations,
            tags_to_delete,
            statistics,
        };
        plan.check_chains()?;
        Ok(plan)
    }

    /// Like [`new`](Self::new), but the final count only subtracts rename
    /// keys that name a tag in `tags`; other keys are chain steps.
    pub fn from_snapshot(
        tags: &[Tag],
        case_normalizations: BTreeMap<String, String>,
        semantic_consolidations: BTreeMap<String, String>,
        tags_to_delete: Vec<TagDeletion>,
    ) -> Result<Self, PlanError> {
        let mut plan = Self::new(tags.len(), case_normalizations, semantic_consolidations, tags_to_delete)?;
        let existing: BTreeSet<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        let removed = plan.rename_sources().filter(|name| existing.contains(name)).count()
            + plan.tags_to_delete.len();
        plan.statistics.estimated_final_tag_count = plan.statistics.total_tags.saturating_sub(removed);
        Ok(plan)
    }

    pub fn empty(total_tags: usize) -> Self {
        Self {
            case_normalizations: BTreeMap::new(),
            semantic_consolidations: BTreeMap::new(),
            tags_to_delete: Vec::new(),
            statistics: PlanStatistics {
                total_tags,
                total_case_normalizations: 0,
                total_semantic_consolidations: 0,
                total_deletions: 0,
                estimated_final_tag_count: total_tags,
            },
        }
    }

    pub fn case_normalizations(&self) -> &BTreeMap<String, String> {
        &self.case_normalizations
    }

    pub fn semantic_consolidations(&self) -> &BTreeMap<String, String> {
        &self.semantic_consolidations
    }

    pub fn tags_to_delete(&self) -> &[TagDeletion] {
        &self.tags_to_delete
    }

    pub fn statistics(&self) -> &PlanStatistics {
        &self.statistics
    }

    pub fn is_empty(&self) -> bool {
        self.case_normalizations.is_empty()
            && self.semantic_consolidations.is_empty()
            && self.tags_to_delete.is_empty()
    }

    pub fn rename_sources(&self) -> impl Iterator<Item = &str> {
        self.case_normalizations
            .keys()
            .chain(self.semantic_consolidations.keys())
            .map(String::as_str)
    }

    pub fn is_rename_target(&self, name: &str) -> bool {
        self.case_normalizations
            .values()
            .chain(self.semantic_consolidations.values())
            .any(|target| target == name)
    }

    pub fn is_marked_for_deletion(&self, name: &str) -> bool {
        self.tags_to_delete.iter().any(|d| d.name == name)
    }

    /// Final spelling for `name` after following every rename, or `name`
    /// itself when the plan does not touch it.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        for _ in 0..=self.rename_count() {
            match self.rename_target(current) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        current
    }

    fn rename_count(&self) -> usize {
        self.case_normalizations.len() + self.semantic_consolidations.len()
    }

    fn rename_target(&self, name: &str) -> Option<&str> {
        self.case_normalizations
            .get(name)
            .or_else(|| self.semantic_consolidations.get(name))
            .map(String::as_str)
    }

    fn check_chains(&self) -> Result<(), PlanError> {
        for start in self.rename_sources() {
            let mut seen = BTreeSet::new();
            let mut current = start;
            while let Some(next) = self.rename_target(current) {
                if !seen.insert(current) {
                    return Err(PlanError::Cycle(start.to_string()));
                }
                current = next;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn low_use(name: &str) -> TagDeletion {
        TagDeletion {
            name: name.to_string(),
            id: Some(RecordId::Int(9)),
            usage: 0,
            reason: DeletionReason::LowUse,
        }
    }

    #[test]
    fn tag_round_trip_keeps_store_fields_and_reuse_strips_counters() {
        let raw = r#"{"id":7,"name":"Music","ownerId":3,"createdAt":"2024-05-01T10:00:00.000Z","_count":{"links":5}}"#;
        let tag: Tag = serde_json::from_str(raw).unwrap();
        assert_eq!(tag.id, Some(RecordId::Int(7)));
        assert_eq!(tag.usage_count(), 5);

        let reused = serde_json::to_value(tag.for_reuse()).unwrap();
        assert_eq!(reused["id"], 7);
        assert_eq!(reused["ownerId"], 3);
        assert_eq!(reused["createdAt"], "2024-05-01T10:00:00.000Z");
        assert!(reused.get("_count").is_none());
    }

    #[test]
    fn link_round_trip_preserves_opaque_fields_verbatim() {
        let raw = serde_json::json!({
            "id": "abc",
            "url": "https://example.com",
            "name": "Example",
            "collection": {"id": 1, "name": "Unorganized"},
            "updatedAt": "2025-01-02T03:04:05.678Z",
            "pinnedBy": [],
            "tags": [{"id": 1, "name": "music"}]
        });
        let link: Link = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(link.id, RecordId::Text("abc".into()));
        assert_eq!(link.url(), Some("https://example.com"));
        assert_eq!(link.tag_names(), vec!["music"]);
        assert!(link.updated_at().is_some());
        assert_eq!(serde_json::to_value(&link).unwrap(), raw);
    }

    #[test]
    fn plan_rejects_overlapping_sections() {
        let err = ConsolidationPlan::new(
            3,
            map(&[("music", "Music")]),
            map(&[("music", "Audio")]),
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::Overlap { ref name, .. } if name == "music"));

        let err = ConsolidationPlan::new(3, BTreeMap::new(), map(&[("ml", "AI")]), vec![low_use("ml")])
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::Overlap {
                name: "ml".into(),
                first: PlanSection::SemanticConsolidations,
                second: PlanSection::TagsToDelete,
            }
        );
    }

    #[test]
    fn plan_rejects_rename_cycles() {
        let err = ConsolidationPlan::new(2, map(&[("AI", "Ai")]), map(&[("Ai", "AI")]), vec![])
            .unwrap_err();
        assert!(matches!(err, PlanError::Cycle(_)));
    }

    #[test]
    fn statistics_clamp_at_zero() {
        let plan = ConsolidationPlan::new(
            1,
            map(&[("music", "Music")]),
            map(&[("ml", "AI")]),
            vec![low_use("xyz")],
        )
        .unwrap();
        assert_eq!(plan.statistics().estimated_final_tag_count, 0);
        assert_eq!(plan.statistics().total_deletions, 1);
    }

    #[test]
    fn snapshot_estimate_skips_keys_that_are_only_chain_steps() {
        let tags = vec![
            Tag::with_usage(1, "AI", 10),
            Tag::with_usage(2, "ml", 5),
            Tag::with_usage(3, "Ml", 2),
        ];
        let plan = ConsolidationPlan::from_snapshot(
            &tags,
            map(&[("ml", "ML"), ("Ml", "ML")]),
            map(&[("ML", "AI")]),
            vec![],
        )
        .unwrap();
        assert_eq!(plan.statistics().estimated_final_tag_count, 1);
        assert_eq!(plan.statistics().total_semantic_consolidations, 1);
        assert!(plan.is_rename_target("ML"));
        assert!(!plan.is_rename_target("ml"));

        let reloaded: ConsolidationPlan =
            serde_json::from_value(serde_json::to_value(&plan).unwrap()).unwrap();
        assert_eq!(reloaded, plan);
    }

    #[test]
    fn resolve_follows_case_then_semantic_chain() {
        let plan = ConsolidationPlan::new(
            4,
            map(&[("Ml", "ML"), ("ml", "ML")]),
            map(&[("ML", "AI")]),
            vec![],
        )
        .unwrap();
        assert_eq!(plan.resolve("ml"), "AI");
        assert_eq!(plan.resolve("ML"), "AI");
        assert_eq!(plan.resolve("Rust"), "Rust");
    }

    #[test]
    fn persisted_plan_is_revalidated_on_load() {
        let good = ConsolidationPlan::new(5, map(&[("music", "Music")]), BTreeMap::new(), vec![low_use("xyz")])
            .unwrap();
        let json = serde_json::to_string(&good).unwrap();
        let loaded: ConsolidationPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, good);

        let bad = serde_json::json!({
            "case_normalizations": {"music": "Music"},
            "semantic_consolidations": {},
            "tags_to_delete": [{"name": "music", "id": 2, "usage": 0, "reason": {"kind": "low_use"}}],
            "statistics": {"total_tags": 2}
        });
        assert!(serde_json::from_value::<ConsolidationPlan>(bad).is_err());
    }
}
