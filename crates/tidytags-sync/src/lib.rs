//! Tag maintenance jobs run against a live bookmark store.

mod jobs;
#[cfg(test)]
mod memory;
pub mod reconcile;
pub mod report;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tidytags_core::ConsolidationPlan;
use tidytags_engine::Vocabulary;
use tidytags_storage::{ArtifactStore, BookmarkStore, StoreClient, StoreClientConfig};
use uuid::Uuid;

pub use jobs::{
    AnalysisSummary, AnalyzeOptions, ApplySummary, JunkOptions, JunkSummary, NormalizeOptions,
    NormalizeSummary,
};
pub use reconcile::{DeleteOutcome, Reconciler, RewriteOutcome, TagIndex};

pub const CRATE_NAME: &str = "tidytags-sync";

pub const PLAN_ARTIFACT: &str = "consolidation_plan.json";
pub const TAG_BACKUP_ARTIFACT: &str = "tags_backup.json";
pub const REVIEW_ARTIFACT: &str = "review_candidates.json";
pub const JUNK_ARTIFACT: &str = "junk_tags.json";

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub http_timeout_secs: u64,
    pub pacing_ms: u64,
    pub rules_path: Option<PathBuf>,
    pub blocklist_path: PathBuf,
    pub reports_dir: PathBuf,
    pub user_agent: String,
    pub dry_run: bool,
}

impl RunConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_url: var("TIDYTAGS_API_URL").or_else(|| var("LINKWARDEN_API_URL")),
            token: var("TIDYTAGS_TOKEN").or_else(|| var("LINKWARDEN_TOKEN")),
            http_timeout_secs: var("TIDYTAGS_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            pacing_ms: var("TIDYTAGS_PACING_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            rules_path: var("TIDYTAGS_RULES").map(PathBuf::from),
            blocklist_path: var("TIDYTAGS_BLOCKLIST")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("junk_tags_blocklist.txt")),
            reports_dir: var("TIDYTAGS_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./reports")),
            user_agent: var("TIDYTAGS_USER_AGENT").unwrap_or_else(|| "tidytags/0.1".to_string()),
            dry_run: false,
        }
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn store_client(&self) -> Result<StoreClient> {
        let base_url = self
            .api_url
            .clone()
            .context("TIDYTAGS_API_URL (or LINKWARDEN_API_URL) is not set")?;
        StoreClient::new(StoreClientConfig {
            base_url,
            token: self.token.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
        })
    }

    pub fn vocabulary(&self) -> Result<Vocabulary> {
        Vocabulary::load(self.rules_path.as_deref(), Some(self.blocklist_path.as_path()))
            .context("loading tag vocabulary")
    }
}

/// One run of a tag maintenance job: store, vocabulary and artifact
/// directory bound to a fresh run id.
pub struct TagPipeline<S> {
    store: S,
    vocabulary: Vocabulary,
    artifacts: ArtifactStore,
    run_id: Uuid,
    dry_run: bool,
    pacing: Duration,
}

impl<S: BookmarkStore> TagPipeline<S> {
    pub fn new(store: S, vocabulary: Vocabulary, artifacts: ArtifactStore) -> Self {
        Self {
            store,
            vocabulary,
            artifacts,
            run_id: Uuid::new_v4(),
            dry_run: false,
            pacing: Duration::ZERO,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.artifacts.run_dir(self.run_id)
    }

    fn reconciler(&self) -> Reconciler<'_, S> {
        Reconciler::new(&self.store)
            .with_dry_run(self.dry_run)
            .with_pacing(self.pacing)
    }
}

impl TagPipeline<StoreClient> {
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let store = config.store_client()?;
        let vocabulary = config.vocabulary()?;
        Ok(Self::new(store, vocabulary, ArtifactStore::new(config.reports_dir.clone()))
            .with_dry_run(config.dry_run)
            .with_pacing(config.pacing()))
    }
}

/// Read a persisted plan; the plan's invariants are re-checked on load.
pub async fn load_plan(path: &Path) -> Result<ConsolidationPlan> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing plan {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn config_defaults_and_fallbacks() {
        let env: BTreeMap<&str, &str> = [
            ("LINKWARDEN_API_URL", "https://links.example/api/v1"),
            ("LINKWARDEN_TOKEN", "legacy"),
            ("TIDYTAGS_TOKEN", "preferred"),
            ("TIDYTAGS_PACING_MS", "not-a-number"),
            ("TIDYTAGS_RULES", ""),
        ]
        .into_iter()
        .collect();
        let config = RunConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_url.as_deref(), Some("https://links.example/api/v1"));
        assert_eq!(config.token.as_deref(), Some("preferred"));
        assert_eq!(config.pacing(), Duration::from_millis(100));
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.rules_path, None);
        assert_eq!(config.blocklist_path, PathBuf::from("junk_tags_blocklist.txt"));
        assert_eq!(config.user_agent, "tidytags/0.1");
    }

    #[test]
    fn store_client_requires_an_api_url() {
        let config = RunConfig::from_lookup(|_| None);
        let err = config.store_client().unwrap_err();
        assert!(err.to_string().contains("TIDYTAGS_API_URL"));
    }

    #[tokio::test]
    async fn persisted_plans_are_revalidated_on_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("plan.json");
        std::fs::write(
            &path,
            r#"{
                "case_normalizations": {"music": "Music"},
                "semantic_consolidations": {"music": "Audio"},
                "tags_to_delete": [],
                "statistics": {"total_tags": 3}
            }"#,
        )
        .unwrap();
        assert!(load_plan(&path).await.is_err());

        std::fs::write(
            &path,
            r#"{"case_normalizations": {"music": "Music"}, "statistics": {"total_tags": 2}}"#,
        )
        .unwrap();
        let plan = load_plan(&path).await.unwrap();
        assert_eq!(plan.resolve("music"), "Music");
    }
}
