//! In-memory bookmark store used by the job tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map};
use tidytags_core::{Link, RecordId, Tag, TagCount};
use tidytags_storage::{BookmarkStore, StoreError};

#[derive(Debug, Default)]
struct State {
    tags: Vec<Tag>,
    links: BTreeMap<RecordId, Link>,
    next_id: i64,
    writes: Vec<Link>,
    deleted: Vec<RecordId>,
    failing_links: BTreeSet<RecordId>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    echo_writes: bool,
}

fn not_found(url: String) -> StoreError {
    StoreError::HttpStatus {
        status: 404,
        url,
        body: "not found".into(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1000,
                ..State::default()
            }),
            echo_writes: true,
        }
    }

    /// Writes succeed but return no body, forcing a re-read to learn ids.
    pub fn without_echo(mut self) -> Self {
        self.echo_writes = false;
        self
    }

    pub fn with_tag(self, id: i64, name: &str) -> Self {
        self.state.lock().unwrap().tags.push(Tag {
            id: Some(RecordId::Int(id)),
            name: name.into(),
            count: None,
            extra: Map::new(),
        });
        self
    }

    pub fn with_link(self, id: i64, tag_names: &[&str], updated_at: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let tags = tag_names
                .iter()
                .map(|name| {
                    let tag = state
                        .tags
                        .iter()
                        .find(|t| t.name == *name)
                        .unwrap_or_else(|| panic!("unknown tag {name}"));
                    tag.for_reuse()
                })
                .collect();
            let mut extra = Map::new();
            extra.insert("url".into(), json!(format!("https://example.com/{id}")));
            extra.insert("collectionId".into(), json!(1));
            extra.insert("updatedAt".into(), json!(updated_at));
            state.links.insert(
                RecordId::Int(id),
                Link {
                    id: RecordId::Int(id),
                    tags,
                    extra,
                },
            );
        }
        self
    }

    pub fn failing_writes_for(self, link_id: i64) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_links
            .insert(RecordId::Int(link_id));
        self
    }

    pub fn link_tag_names(&self, link_id: i64) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.links[&RecordId::Int(link_id)]
            .tags
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    pub fn tag_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.tags.iter().map(|t| t.name.clone()).collect()
    }

    pub fn writes(&self) -> Vec<Link> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn deleted(&self) -> Vec<RecordId> {
        self.state.lock().unwrap().deleted.clone()
    }
}

fn usage(state: &State, id: &RecordId) -> u64 {
    state
        .links
        .values()
        .filter(|link| link.tags.iter().any(|t| t.id.as_ref() == Some(id)))
        .count() as u64
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tags
            .iter()
            .map(|tag| {
                let mut tag = tag.clone();
                let links = tag.id.as_ref().map(|id| usage(&state, id)).unwrap_or(0);
                tag.count = Some(TagCount { links });
                tag
            })
            .collect())
    }

    async fn list_links(&self, tag_id: Option<&RecordId>) -> Result<Vec<Link>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .links
            .values()
            .filter(|link| match tag_id {
                Some(id) => link.tags.iter().any(|t| t.id.as_ref() == Some(id)),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_link(&self, id: &RecordId) -> Result<Link, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .links
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(format!("/links/{id}")))
    }

    async fn replace_link(&self, link: &Link) -> Result<Option<Link>, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_links.contains(&link.id) {
            return Err(StoreError::HttpStatus {
                status: 500,
                url: format!("/links/{}", link.id),
                body: "boom".into(),
            });
        }
        if !state.links.contains_key(&link.id) {
            return Err(not_found(format!("/links/{}", link.id)));
        }
        state.writes.push(link.clone());

        let mut stored = link.clone();
        for tag in &mut stored.tags {
            tag.count = None;
            if tag.id.is_some() {
                continue;
            }
            let existing = state.tags.iter().find(|t| t.name == tag.name).and_then(|t| t.id.clone());
            let id = match existing {
                Some(id) => id,
                None => {
                    state.next_id += 1;
                    let id = RecordId::Int(state.next_id);
                    state.tags.push(Tag {
                        id: Some(id.clone()),
                        name: tag.name.clone(),
                        count: None,
                        extra: Map::new(),
                    });
                    id
                }
            };
            tag.id = Some(id);
        }
        state.links.insert(stored.id.clone(), stored.clone());
        Ok(self.echo_writes.then_some(stored))
    }

    async fn delete_tag(&self, id: &RecordId) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let before = state.tags.len();
        state.tags.retain(|t| t.id.as_ref() != Some(id));
        if state.tags.len() == before {
            return Err(not_found(format!("/tags/{id}")));
        }
        for link in state.links.values_mut() {
            link.tags.retain(|t| t.id.as_ref() != Some(id));
        }
        state.deleted.push(id.clone());
        Ok(())
    }
}
