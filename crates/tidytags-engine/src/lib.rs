//! Pure tag consolidation logic: vocabulary tables, canonical spelling,
//! duplicate detection, junk classification, and plan construction.
//!
//! Nothing in this crate performs I/O against the bookmark store.

pub mod canonical;
pub mod classify;
pub mod normalize;
pub mod planner;
pub mod similarity;
pub mod vocabulary;

pub use canonical::{choose_canonical_form, normalize_case};
pub use classify::{analyze_junk, classify, JunkAnalysis, JunkExport, JunkExportEntry, JunkTag};
pub use normalize::{
    LinkNormalization, NormalizationKind, NormalizedTag, TagNormalizer,
    DEFAULT_SIMILARITY_THRESHOLD,
};
pub use planner::{plan, review_candidates, usage_statistics, PlanOptions};
pub use similarity::{
    case_duplicate_groups, check_threshold, find_semantic_overlaps, fuzzy_match,
    group_by_lowercase_key, near_duplicate_pairs, sequence_ratio, ReviewPair, SemanticOverlap,
    SimilarityError,
};
pub use vocabulary::{SynonymGroup, Vocabulary, VocabularyError};

pub const CRATE_NAME: &str = "tidytags-engine";
