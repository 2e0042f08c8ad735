//! Read-modify-write of link records against the bookmark store.
//!
//! The store only accepts whole records, so every rewrite starts from a
//! fresh read of the link and changes nothing but its tag list.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tidytags_core::{Link, RecordId, Tag};
use tidytags_storage::{BookmarkStore, StoreError};
use tracing::{debug, info, warn};

/// Known tags by exact name. Grows as writes reveal ids the store minted.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    by_name: BTreeMap<String, Tag>,
}

impl TagIndex {
    pub fn new(tags: &[Tag]) -> Self {
        let mut index = Self::default();
        index.learn(tags);
        index
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn learn(&mut self, tags: &[Tag]) -> usize {
        let mut learned = 0;
        for tag in tags.iter().filter(|t| t.id.is_some() && !t.name.is_empty()) {
            if !self.by_name.contains_key(&tag.name) {
                self.by_name.insert(tag.name.clone(), tag.clone());
                learned += 1;
            }
        }
        learned
    }

    pub fn forget(&mut self, name: &str) -> Option<Tag> {
        self.by_name.remove(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    Updated,
    WouldUpdate,
    Unchanged,
}

impl RewriteOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    WouldDelete,
    Missing,
}

pub fn dedupe_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !name.is_empty() && seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Tag list for a write: indexed tags are reused with their id, tags the
/// link already carries keep theirs, anything else is sent by name alone.
pub fn build_tag_list(desired: &[String], current: &Link, index: &TagIndex) -> Vec<Tag> {
    desired
        .iter()
        .map(|name| {
            index
                .get(name)
                .or_else(|| current.tags.iter().find(|t| t.name == *name && t.id.is_some()))
                .map(Tag::for_reuse)
                .unwrap_or_else(|| Tag::named(name.clone()))
        })
        .collect()
}

#[derive(Debug)]
pub struct Reconciler<'s, S: ?Sized> {
    store: &'s S,
    dry_run: bool,
    pacing: Duration,
}

impl<'s, S: BookmarkStore + ?Sized> Reconciler<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
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

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn rewrite_link_tags<N: AsRef<str> + Sync>(
        &self,
        link_id: &RecordId,
        desired: &[N],
        index: &mut TagIndex,
    ) -> Result<RewriteOutcome, StoreError> {
        let desired = dedupe_names(desired);
        self.rewrite_link_with(link_id, index, |_| desired).await
    }

    /// Like [`rewrite_link_tags`](Self::rewrite_link_tags), with the desired
    /// names computed from the freshly read record.
    pub async fn rewrite_link_with<F>(
        &self,
        link_id: &RecordId,
        index: &mut TagIndex,
        decide: F,
    ) -> Result<RewriteOutcome, StoreError>
    where
        F: FnOnce(&Link) -> Vec<String>,
    {
        let current = self.store.get_link(link_id).await?;
        let desired = dedupe_names(&decide(&current));

        let current_set: BTreeSet<&str> = current.tag_names().into_iter().collect();
        let desired_set: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
        if current_set == desired_set {
            debug!(link_id = %link_id, "tags already match; skipping write");
            return Ok(RewriteOutcome::Unchanged);
        }

        let tags = build_tag_list(&desired, &current, index);
        let mints_tags = tags.iter().any(|t| t.id.is_none());
        let updated = Link {
            tags,
            ..current.clone()
        };

        if self.dry_run {
            info!(
                link_id = %link_id,
                from = ?current.tag_names(),
                to = ?desired,
                "dry run: would rewrite link tags"
            );
            return Ok(RewriteOutcome::WouldUpdate);
        }

        let echoed = self.store.replace_link(&updated).await?;
        info!(link_id = %link_id, to = ?desired, "rewrote link tags");
        self.pace().await;

        if mints_tags {
            self.learn_minted(link_id, echoed, index).await;
        }
        Ok(RewriteOutcome::Updated)
    }

    async fn learn_minted(&self, link_id: &RecordId, echoed: Option<Link>, index: &mut TagIndex) {
        let written = match echoed {
            Some(link) => link,
            None => match self.store.get_link(link_id).await {
                Ok(link) => link,
                Err(err) => {
                    warn!(link_id = %link_id, error = %err, "could not re-read link to learn new tag ids");
                    return;
                }
            },
        };
        let learned = index.learn(&written.tags);
        if learned > 0 {
            debug!(link_id = %link_id, learned, "learned ids of newly created tags");
        }
    }

    pub async fn delete_tag(&self, id: &RecordId, name: &str) -> Result<DeleteOutcome, StoreError> {
        if self.dry_run {
            info!(tag = name, tag_id = %id, "dry run: would delete tag");
            return Ok(DeleteOutcome::WouldDelete);
        }
        match self.store.delete_tag(id).await {
            Ok(()) => {
                info!(tag = name, tag_id = %id, "deleted tag");
                self.pace().await;
                Ok(DeleteOutcome::Deleted)
            }
            Err(err) if err.is_not_found() => {
                warn!(tag = name, tag_id = %id, "tag already gone");
                Ok(DeleteOutcome::Missing)
            }
            Err(err) => Err(err),
        }
    }

    async fn pace(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    const NOW: &str = "2026-10-19T10:00:00Z";

    fn music_store() -> MemoryStore {
        MemoryStore::new()
            .with_tag(1, "Music")
            .with_tag(2, "music")
            .with_link(10, &["music"], NOW)
            .with_link(11, &["Music", "music"], NOW)
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        assert_eq!(dedupe_names(&["Music", "", "Rust", "Music"]), vec!["Music", "Rust"]);
    }

    #[tokio::test]
    async fn rewrite_reuses_existing_tag_ids_and_dedupes() {
        let store = music_store();
        let mut index = TagIndex::new(&store.list_tags().await.unwrap());
        let reconciler = Reconciler::new(&store);

        let outcome = reconciler
            .rewrite_link_tags(&RecordId::Int(11), &["Music", "Music"], &mut index)
            .await
            .unwrap();
        assert_eq!(outcome, RewriteOutcome::Updated);
        assert_eq!(store.link_tag_names(11), vec!["Music"]);

        let written = &store.writes()[0];
        assert_eq!(written.tags[0].id, Some(RecordId::Int(1)));
        assert!(written.tags[0].count.is_none());
        assert_eq!(written.url(), Some("https://example.com/11"));
        assert_eq!(written.extra["collectionId"], 1);
    }

    #[tokio::test]
    async fn second_identical_rewrite_is_a_no_op() {
        let store = music_store();
        let mut index = TagIndex::new(&store.list_tags().await.unwrap());
        let reconciler = Reconciler::new(&store);

        let first = reconciler
            .rewrite_link_tags(&RecordId::Int(10), &["Music"], &mut index)
            .await
            .unwrap();
        let second = reconciler
            .rewrite_link_tags(&RecordId::Int(10), &["Music"], &mut index)
            .await
            .unwrap();

        assert_eq!(first, RewriteOutcome::Updated);
        assert_eq!(second, RewriteOutcome::Unchanged);
        assert_eq!(store.writes().len(), 1);
        assert_eq!(store.link_tag_names(10), vec!["Music"]);
    }

    #[tokio::test]
    async fn dry_run_reads_but_never_writes() {
        let store = music_store();
        let mut index = TagIndex::new(&store.list_tags().await.unwrap());
        let reconciler = Reconciler::new(&store).with_dry_run(true);

        let outcome = reconciler
            .rewrite_link_tags(&RecordId::Int(10), &["Music"], &mut index)
            .await
            .unwrap();
        assert_eq!(outcome, RewriteOutcome::WouldUpdate);
        assert_eq!(
            reconciler.delete_tag(&RecordId::Int(2), "music").await.unwrap(),
            DeleteOutcome::WouldDelete
        );
        assert!(store.writes().is_empty());
        assert!(store.deleted().is_empty());
        assert_eq!(store.link_tag_names(10), vec!["music"]);
    }

    #[tokio::test]
    async fn new_tags_are_learned_from_echo_or_reread() {
        for store in [music_store(), music_store().without_echo()] {
            let mut index = TagIndex::new(&store.list_tags().await.unwrap());
            let reconciler = Reconciler::new(&store);

            reconciler
                .rewrite_link_tags(&RecordId::Int(10), &["Music", "Jazz"], &mut index)
                .await
                .unwrap();
            let jazz = index.get("Jazz").expect("jazz learned").id.clone();
            assert!(jazz.is_some());

            reconciler
                .rewrite_link_tags(&RecordId::Int(11), &["Jazz"], &mut index)
                .await
                .unwrap();
            let second_write = &store.writes()[1];
            assert_eq!(second_write.tags[0].id, jazz);
        }
    }

    #[tokio::test]
    async fn deleting_a_missing_tag_is_not_an_error() {
        let store = music_store();
        let reconciler = Reconciler::new(&store);
        assert_eq!(
            reconciler.delete_tag(&RecordId::Int(2), "music").await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            reconciler.delete_tag(&RecordId::Int(2), "music").await.unwrap(),
            DeleteOutcome::Missing
        );
    }

    #[tokio::test]
    async fn write_failures_surface_as_errors() {
        let store = music_store().failing_writes_for(10);
        let mut index = TagIndex::new(&store.list_tags().await.unwrap());
        let err = Reconciler::new(&store)
            .rewrite_link_tags(&RecordId::Int(10), &["Music"], &mut index)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::HttpStatus { status: 500, .. }));
    }
}
