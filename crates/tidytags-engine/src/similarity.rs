//! Duplicate detection over tag names: exact case-insensitive groups,
//! static synonym-table lookups, and edit-similarity matching.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use thiserror::Error;
use tidytags_core::Tag;

use crate::vocabulary::SynonymGroup;

#[derive(Debug, Error, PartialEq)]
pub enum SimilarityError {
    #[error("similarity threshold {0} is outside [0, 1]")]
    ThresholdOutOfRange(f64),
}

pub fn check_threshold(threshold: f64) -> Result<f64, SimilarityError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(SimilarityError::ThresholdOutOfRange(threshold))
    }
}

pub fn group_by_lowercase_key(tags: &[Tag]) -> BTreeMap<String, Vec<&Tag>> {
    let mut groups: BTreeMap<String, Vec<&Tag>> = BTreeMap::new();
    for tag in tags.iter().filter(|t| !t.name.is_empty()) {
        groups.entry(tag.key()).or_default().push(tag);
    }
    groups
}

pub fn case_duplicate_groups(tags: &[Tag]) -> BTreeMap<String, Vec<&Tag>> {
    group_by_lowercase_key(tags)
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticOverlap {
    pub label: String,
    pub names: Vec<String>,
}

/// Synonym groups with at least two distinct matching tag names, in table
/// order. Each matched key reports its most-used spelling.
pub fn find_semantic_overlaps(tags: &[Tag], groups: &[SynonymGroup]) -> Vec<SemanticOverlap> {
    let by_key = group_by_lowercase_key(tags);
    let mut overlaps = Vec::new();

    for group in groups {
        let mut seen = BTreeSet::new();
        let mut names = Vec::new();
        for variant in &group.variants {
            let key = variant.to_lowercase();
            if !seen.insert(key.clone()) {
                continue;
            }
            let Some(members) = by_key.get(&key) else {
                continue;
            };
            let mut best = members[0];
            for member in &members[1..] {
                if member.usage_count() > best.usage_count() {
                    best = member;
                }
            }
            names.push(best.name.clone());
        }
        if names.len() > 1 {
            overlaps.push(SemanticOverlap {
                label: group.label.clone(),
                names,
            });
        }
    }

    overlaps
}

/// Ratcliff/Obershelp similarity: twice the number of characters in the
/// recursively found longest common blocks over the total length.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest common block in `a[alo..ahi]` x `b[blo..bhi]`; ties resolve to
/// the earliest start in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    let width = bhi - blo + 1;
    let mut prev = vec![0usize; width];
    for i in alo..ahi {
        let mut row = vec![0usize; width];
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let k = prev[j - blo] + 1;
            row[j - blo + 1] = k;
            if k > best_size {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best_size = k;
            }
        }
        prev = row;
    }
    (best_i, best_j, best_size)
}

/// First existing name, in scan order, that equals `candidate` ignoring case
/// or reaches `threshold`. An earlier similar name beats a later exact one.
pub fn fuzzy_match<'a, S: AsRef<str>>(
    candidate: &str,
    existing_names: &'a [S],
    threshold: f64,
) -> Option<&'a str> {
    let needle = candidate.to_lowercase();
    existing_names.iter().map(AsRef::as_ref).find(|name| {
        let lower = name.to_lowercase();
        lower == needle || sequence_ratio(&needle, &lower) >= threshold
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPair {
    pub a: String,
    pub b: String,
    pub score: f64,
}

/// Jaro-Winkler scan over lower-cased names; pairs that only differ by case
/// are left to case consolidation and skipped. Highest score first.
pub fn near_duplicate_pairs<S: AsRef<str>>(names: &[S], review_threshold: f64) -> Vec<ReviewPair> {
    let lowered: Vec<String> = names.iter().map(|n| n.as_ref().to_lowercase()).collect();
    let mut pairs = Vec::new();
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            if lowered[i] == lowered[j] {
                continue;
            }
            let score = jaro_winkler(&lowered[i], &lowered[j]);
            if score >= review_threshold {
                pairs.push(ReviewPair {
                    a: names[i].as_ref().to_string(),
                    b: names[j].as_ref().to_string(),
                    score,
                });
            }
        }
    }
    pairs.sort_by(|x, y| y.score.total_cmp(&x.score));
    pairs
}
