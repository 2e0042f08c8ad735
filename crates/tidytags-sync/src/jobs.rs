use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tidytags_core::{ConsolidationPlan, RecordId, UsageStatistics};
use tidytags_engine::{
    analyze_junk, plan, review_candidates, usage_statistics, JunkAnalysis, PlanOptions,
    ReviewPair, TagNormalizer, DEFAULT_SIMILARITY_THRESHOLD,
};
use tidytags_storage::{BookmarkStore, StoredArtifact};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::reconcile::{DeleteOutcome, RewriteOutcome, TagIndex};
use crate::{TagPipeline, JUNK_ARTIFACT, PLAN_ARTIFACT, REVIEW_ARTIFACT, TAG_BACKUP_ARTIFACT};

#[derive(Debug, Clone, Copy)]
pub struct AnalyzeOptions {
    pub plan: PlanOptions,
    pub review_threshold: f64,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            plan: PlanOptions::default(),
            review_threshold: 0.92,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub usage: UsageStatistics,
    pub plan: ConsolidationPlan,
    pub review: Vec<ReviewPair>,
    pub artifacts: Vec<StoredArtifact>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplySummary {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub links_processed: usize,
    pub links_updated: usize,
    pub links_unchanged: usize,
    pub tags_deleted: usize,
    pub misses: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub lookback: ChronoDuration,
    pub similarity_threshold: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            lookback: ChronoDuration::minutes(15),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeSummary {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub links_seen: usize,
    pub links_processed: usize,
    pub links_updated: usize,
    pub tags_normalized: usize,
    pub tags_fuzzy_matched: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JunkOptions {
    pub analyze_only: bool,
    pub min_usage: u64,
    pub export: bool,
    /// Deletion requires explicit confirmation; without it the job only
    /// reports what it would delete.
    pub confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct JunkSummary {
    pub run_id: Uuid,
    pub analysis: JunkAnalysis,
    pub export: Option<StoredArtifact>,
    pub deletion_attempted: bool,
    pub dry_run: bool,
    pub candidates: usize,
    pub deleted: usize,
    pub skipped_by_usage: usize,
    pub misses: usize,
    pub errors: usize,
}

impl<S: BookmarkStore> TagPipeline<S> {
    pub async fn analyze(&self, options: &AnalyzeOptions) -> Result<AnalysisSummary> {
        let started_at = Utc::now();
        let span = info_span!("analyze", run_id = %self.run_id);
        async {
            let tags = self.store.list_tags().await.context("fetching tags")?;
            info!(tags = tags.len(), "fetched tags");

            let mut artifacts = vec![self
                .artifacts
                .write_json(self.run_id, TAG_BACKUP_ARTIFACT, &tags)
                .await?];

            let usage = usage_statistics(&tags);
            let plan = plan(&tags, &options.plan, &self.vocabulary).context("building consolidation plan")?;
            let review = review_candidates(&tags, &plan, options.review_threshold);

            artifacts.push(self.artifacts.write_json(self.run_id, PLAN_ARTIFACT, &plan).await?);
            if !review.is_empty() {
                artifacts.push(self.artifacts.write_json(self.run_id, REVIEW_ARTIFACT, &review).await?);
            }

            info!(
                case = plan.statistics().total_case_normalizations,
                semantic = plan.statistics().total_semantic_consolidations,
                deletions = plan.statistics().total_deletions,
                review = review.len(),
                "analysis complete"
            );

            Ok(AnalysisSummary {
                run_id: self.run_id,
                started_at,
                finished_at: Utc::now(),
                usage,
                plan,
                review,
                artifacts,
            })
        }
        .instrument(span)
        .await
    }

    /// Execute a plan: move every link off each rename source, then delete
    /// the emptied sources and the plan's deletion list.
    pub async fn apply(
        &self,
        plan_override: Option<ConsolidationPlan>,
        options: &PlanOptions,
    ) -> Result<ApplySummary> {
        let span = info_span!("apply", run_id = %self.run_id, dry_run = self.dry_run);
        async {
            let tags = self.store.list_tags().await.context("fetching tags")?;
            let plan = match plan_override {
                Some(plan) => plan,
                None => plan(&tags, options, &self.vocabulary).context("building consolidation plan")?,
            };
            let mut index = TagIndex::new(&tags);
            let reconciler = self.reconciler();
            let mut summary = ApplySummary {
                run_id: self.run_id,
                dry_run: self.dry_run,
                ..Default::default()
            };

            let mut link_order: Vec<RecordId> = Vec::new();
            let mut seen_links = BTreeSet::new();
            let mut source_links: BTreeMap<&str, (RecordId, Vec<RecordId>)> = BTreeMap::new();

            for source in plan.rename_sources() {
                let Some(tag_id) = index.get(source).and_then(|t| t.id.clone()) else {
                    if plan.is_rename_target(source) {
                        debug!(tag = source, "rename source is only a chain step");
                    } else {
                        warn!(tag = source, "rename source no longer exists");
                        summary.misses += 1;
                    }
                    continue;
                };
                match self.store.list_links(Some(&tag_id)).await {
                    Ok(links) => {
                        let ids: Vec<RecordId> = links.into_iter().map(|l| l.id).collect();
                        for id in &ids {
                            if seen_links.insert(id.clone()) {
                                link_order.push(id.clone());
                            }
                        }
                        source_links.insert(source, (tag_id, ids));
                    }
                    Err(err) => {
                        warn!(tag = source, error = %err, "could not list links for tag");
                        summary.errors += 1;
                    }
                }
            }

            let mut failed_links = BTreeSet::new();
            for link_id in &link_order {
                summary.links_processed += 1;
                let outcome = reconciler
                    .rewrite_link_with(link_id, &mut index, |link| {
                        link.tag_names()
                            .into_iter()
                            .map(|name| plan.resolve(name).to_string())
                            .collect()
                    })
                    .await;
                match outcome {
                    Ok(RewriteOutcome::Unchanged) => summary.links_unchanged += 1,
                    Ok(_) => summary.links_updated += 1,
                    Err(err) if err.is_not_found() => {
                        warn!(link_id = %link_id, "link disappeared before rewrite");
                        summary.misses += 1;
                    }
                    Err(err) => {
                        warn!(link_id = %link_id, error = %err, "link rewrite failed");
                        summary.errors += 1;
                        failed_links.insert(link_id.clone());
                    }
                }
            }

            let mut deletions: Vec<(&str, RecordId)> = Vec::new();
            for (source, (tag_id, links)) in &source_links {
                if links.iter().any(|id| failed_links.contains(id)) {
                    warn!(tag = *source, "keeping rename source; some of its links failed to update");
                    continue;
                }
                deletions.push((*source, tag_id.clone()));
            }
            for deletion in plan.tags_to_delete() {
                match &deletion.id {
                    Some(id) => deletions.push((deletion.name.as_str(), id.clone())),
                    None => match index.get(&deletion.name).and_then(|t| t.id.clone()) {
                        Some(id) => deletions.push((deletion.name.as_str(), id)),
                        None => {
                            warn!(tag = %deletion.name, "tag marked for deletion no longer exists");
                            summary.misses += 1;
                        }
                    },
                }
            }

            for (name, id) in deletions {
                match reconciler.delete_tag(&id, name).await {
                    Ok(DeleteOutcome::Missing) => summary.misses += 1,
                    Ok(_) => {
                        summary.tags_deleted += 1;
                        index.forget(name);
                    }
                    Err(err) => {
                        warn!(tag = name, error = %err, "tag deletion failed");
                        summary.errors += 1;
                    }
                }
            }

            info!(
                processed = summary.links_processed,
                updated = summary.links_updated,
                deleted = summary.tags_deleted,
                misses = summary.misses,
                errors = summary.errors,
                "plan applied"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    pub async fn normalize_recent(&self, options: &NormalizeOptions) -> Result<NormalizeSummary> {
        let cutoff = Utc::now().checked_sub_signed(options.lookback).with_context(|| {
            format!(
                "lookback of {} minutes reaches outside the supported date range",
                options.lookback.num_minutes()
            )
        })?;
        self.normalize_since(cutoff, options.similarity_threshold).await
    }

    pub async fn normalize_since(
        &self,
        cutoff: DateTime<Utc>,
        similarity_threshold: f64,
    ) -> Result<NormalizeSummary> {
        let span = info_span!("normalize", run_id = %self.run_id, dry_run = self.dry_run);
        async {
            let tags = self.store.list_tags().await.context("fetching tags")?;
            let normalizer = TagNormalizer::new(self.vocabulary.acronyms(), &tags, similarity_threshold)
                .context("configuring tag normalizer")?;
            let links = self.store.list_links(None).await.context("fetching links")?;
            let mut index = TagIndex::new(&tags);
            let reconciler = self.reconciler();
            let mut summary = NormalizeSummary {
                run_id: self.run_id,
                dry_run: self.dry_run,
                links_seen: links.len(),
                ..Default::default()
            };

            let recent = links
                .iter()
                .filter(|link| link.updated_at().is_some_and(|ts| ts >= cutoff));
            for link in recent {
                summary.links_processed += 1;
                if normalizer.normalize_link_tags(&link.tag_names()).is_none() {
                    continue;
                }

                let mut change = None;
                let outcome = reconciler
                    .rewrite_link_with(&link.id, &mut index, |fresh| {
                        let names = fresh.tag_names();
                        match normalizer.normalize_link_tags(&names) {
                            Some(normalized) => {
                                let tags = normalized.tags.clone();
                                change = Some(normalized);
                                tags
                            }
                            None => names.into_iter().map(str::to_string).collect(),
                        }
                    })
                    .await;
                match outcome {
                    Ok(outcome) if outcome.changed() => {
                        summary.links_updated += 1;
                        if let Some(change) = change {
                            summary.tags_normalized += change.case_normalized;
                            summary.tags_fuzzy_matched += change.fuzzy_matched;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(link_id = %link.id, error = %err, "link normalization failed");
                        summary.errors += 1;
                    }
                }
            }

            info!(
                processed = summary.links_processed,
                updated = summary.links_updated,
                normalized = summary.tags_normalized,
                fuzzy = summary.tags_fuzzy_matched,
                errors = summary.errors,
                "normalization complete"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    pub async fn remove_junk(&self, options: &JunkOptions) -> Result<JunkSummary> {
        let span = info_span!("junk", run_id = %self.run_id);
        async {
            let tags = self.store.list_tags().await.context("fetching tags")?;
            let analysis = analyze_junk(&tags, &self.vocabulary);

            let export = if options.export {
                Some(
                    self.artifacts
                        .write_json(self.run_id, JUNK_ARTIFACT, &analysis.export())
                        .await?,
                )
            } else {
                None
            };

            let dry_run = self.dry_run || !options.confirmed;
            let mut summary = JunkSummary {
                run_id: self.run_id,
                export,
                deletion_attempted: !options.analyze_only,
                dry_run,
                candidates: 0,
                deleted: 0,
                skipped_by_usage: 0,
                misses: 0,
                errors: 0,
                analysis: JunkAnalysis::default(),
            };

            if !options.analyze_only {
                let reconciler = self.reconciler().with_dry_run(dry_run);
                let ordered = analysis.deletion_order(options.min_usage);
                summary.candidates = ordered.len();
                summary.skipped_by_usage = analysis.junk_tags.len() - ordered.len();
                for junk in ordered {
                    let Some(id) = junk.tag.id.as_ref() else {
                        summary.misses += 1;
                        continue;
                    };
                    match reconciler.delete_tag(id, &junk.tag.name).await {
                        Ok(DeleteOutcome::Missing) => summary.misses += 1,
                        Ok(_) => summary.deleted += 1,
                        Err(err) => {
                            warn!(tag = %junk.tag.name, error = %err, "junk tag deletion failed");
                            summary.errors += 1;
                        }
                    }
                }
            }

            info!(
                junk = analysis.junk_tags.len(),
                deleted = summary.deleted,
                dry_run,
                "junk pass complete"
            );
            summary.analysis = analysis;
            Ok(summary)
        }
        .instrument(span)
        .await
    }
}
