//! Plain-text run reports for stdout.

use crate::jobs::{AnalysisSummary, ApplySummary, JunkSummary, NormalizeSummary};

const CASE_PREVIEW: usize = 20;
const JUNK_PREVIEW: usize = 50;

fn rule() -> String {
    "=".repeat(60)
}

pub fn render_analysis(summary: &AnalysisSummary) -> String {
    let usage = &summary.usage;
    let stats = summary.plan.statistics();
    let reduction = if stats.total_tags == 0 {
        0.0
    } else {
        (stats.total_tags - stats.estimated_final_tag_count) as f64 / stats.total_tags as f64 * 100.0
    };

    let mut lines = vec![
        rule(),
        "TAG ANALYSIS REPORT".to_string(),
        rule(),
        String::new(),
        "Current state:".to_string(),
        format!("  Total tags:              {}", usage.total_tags),
        format!("  Unused tags (0 links):   {}", usage.unused_tags),
        format!("  Single-use tags:         {}", usage.single_use_tags),
        format!("  Low-use tags (<=3):      {}", usage.low_use_tags),
        format!("  High-use tags (>=10):    {}", usage.high_use_tags),
        format!("  Average usage:           {:.1}", usage.avg_usage),
        String::new(),
        "Planned changes:".to_string(),
        format!("  Case normalizations:     {}", stats.total_case_normalizations),
        format!("  Semantic consolidations: {}", stats.total_semantic_consolidations),
        format!("  Tags to delete:          {}", stats.total_deletions),
        format!("  Estimated final count:   {}", stats.estimated_final_tag_count),
        format!("  Reduction:               {reduction:.1}%"),
    ];

    let case = summary.plan.case_normalizations();
    if !case.is_empty() {
        lines.push(String::new());
        lines.push(format!("Case normalizations (first {CASE_PREVIEW}):"));
        for (from, to) in case.iter().take(CASE_PREVIEW) {
            lines.push(format!("  {from} -> {to}"));
        }
        if case.len() > CASE_PREVIEW {
            lines.push(format!("  ... and {} more", case.len() - CASE_PREVIEW));
        }
    }

    let semantic = summary.plan.semantic_consolidations();
    if !semantic.is_empty() {
        lines.push(String::new());
        lines.push("Semantic consolidations:".to_string());
        for (from, to) in semantic {
            lines.push(format!("  {from} -> {to}"));
        }
    }

    if !summary.review.is_empty() {
        lines.push(String::new());
        lines.push("Near-duplicates for manual review:".to_string());
        for pair in &summary.review {
            lines.push(format!("  {} ~ {} ({:.2})", pair.a, pair.b, pair.score));
        }
    }

    if !summary.artifacts.is_empty() {
        lines.push(String::new());
        lines.push(format!("Artifacts (run {}):", summary.run_id));
        for artifact in &summary.artifacts {
            lines.push(format!(
                "  {} sha256={}",
                artifact.absolute_path.display(),
                artifact.content_hash
            ));
        }
    }

    lines.join("\n")
}

pub fn render_apply(summary: &ApplySummary) -> String {
    let mode = if summary.dry_run { " (dry run)" } else { "" };
    [
        format!("Plan applied{mode}: run_id={}", summary.run_id),
        format!("  Links processed: {}", summary.links_processed),
        format!("  Links updated:   {}", summary.links_updated),
        format!("  Links unchanged: {}", summary.links_unchanged),
        format!("  Tags deleted:    {}", summary.tags_deleted),
        format!("  Misses:          {}", summary.misses),
        format!("  Errors:          {}", summary.errors),
    ]
    .join("\n")
}

pub fn render_normalize(summary: &NormalizeSummary) -> String {
    let mode = if summary.dry_run { " (dry run)" } else { "" };
    [
        format!("Normalization complete{mode}: run_id={}", summary.run_id),
        format!("  Recent links processed: {} of {}", summary.links_processed, summary.links_seen),
        format!("  Links updated:          {}", summary.links_updated),
        format!("  Tags case-normalized:   {}", summary.tags_normalized),
        format!("  Tags fuzzy matched:     {}", summary.tags_fuzzy_matched),
        format!("  Errors:                 {}", summary.errors),
    ]
    .join("\n")
}

pub fn render_junk(summary: &JunkSummary) -> String {
    let analysis = &summary.analysis;
    let mut lines = vec![
        rule(),
        "JUNK TAG REPORT".to_string(),
        rule(),
        format!("  Total tags:      {}", analysis.total),
        format!("  Junk tags:       {}", analysis.junk_tags.len()),
        format!("  Good tags:       {}", analysis.good_tags.len()),
        format!("  Link references: {}", analysis.total_link_references()),
    ];

    let breakdown = analysis.breakdown();
    if !breakdown.is_empty() {
        lines.push(String::new());
        lines.push("By reason:".to_string());
        for (reason, count) in &breakdown {
            lines.push(format!("  {:<16} {count}", reason.as_str()));
        }

        lines.push(String::new());
        lines.push(format!("Junk tags (first {JUNK_PREVIEW}):"));
        for junk in analysis.junk_tags.iter().take(JUNK_PREVIEW) {
            lines.push(format!(
                "  {:<30} {:>5} links  [{}]",
                junk.tag.name,
                junk.tag.usage_count(),
                junk.reason
            ));
        }
        if analysis.junk_tags.len() > JUNK_PREVIEW {
            lines.push(format!("  ... and {} more", analysis.junk_tags.len() - JUNK_PREVIEW));
        }
    }

    if let Some(export) = &summary.export {
        lines.push(String::new());
        lines.push(format!(
            "Exported to {} sha256={}",
            export.absolute_path.display(),
            export.content_hash
        ));
    }

    if summary.deletion_attempted {
        lines.push(String::new());
        let verb = if summary.dry_run { "Would delete" } else { "Deleted" };
        lines.push(format!("{verb}: {} of {} candidates", summary.deleted, summary.candidates));
        if summary.skipped_by_usage > 0 {
            lines.push(format!("  Skipped (above min usage): {}", summary.skipped_by_usage));
        }
        lines.push(format!("  Misses: {}  Errors: {}", summary.misses, summary.errors));
        if summary.dry_run {
            lines.push("  Re-run with --yes to delete.".to_string());
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tidytags_core::{ConsolidationPlan, JunkReason, Tag, UsageStatistics};
    use tidytags_engine::{JunkAnalysis, JunkTag};
    use uuid::Uuid;

    #[test]
    fn analysis_report_lists_case_preview_and_reduction() {
        let case: BTreeMap<String, String> = (0..25)
            .map(|i| (format!("tag{i}"), format!("Tag{i}")))
            .collect();
        let plan = ConsolidationPlan::new(50, case, BTreeMap::new(), Vec::new()).unwrap();
        let summary = AnalysisSummary {
            run_id: Uuid::nil(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            usage: UsageStatistics::default(),
            plan,
            review: Vec::new(),
            artifacts: Vec::new(),
        };

        let text = render_analysis(&summary);
        assert!(text.contains("50.0%"));
        assert!(text.contains("... and 5 more"));
        assert!(!text.contains("Semantic consolidations:\n"));
    }

    #[test]
    fn junk_report_explains_dry_run() {
        let summary = JunkSummary {
            run_id: Uuid::nil(),
            analysis: JunkAnalysis {
                junk_tags: vec![JunkTag {
                    tag: Tag::with_usage(1, "the", 4),
                    reason: JunkReason::Blocklist,
                }],
                good_tags: Vec::new(),
                total: 1,
            },
            export: None,
            deletion_attempted: true,
            dry_run: true,
            candidates: 1,
            deleted: 1,
            skipped_by_usage: 0,
            misses: 0,
            errors: 0,
        };

        let text = render_junk(&summary);
        assert!(text.contains("Would delete: 1 of 1 candidates"));
        assert!(text.contains("--yes"));
        assert!(text.contains("blocklist"));
    }
}
