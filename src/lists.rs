use crate::article::{ArticleAuthor, ArticleComment, ArticleMention, doi_from_article_id};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, GroupRef, ListContext, ListMeta, UserRef};
use crate::sync::lock;
use crate::view::MaterializedView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Lists with fewer articles than this are left out of activity rankings
/// unless the caller asks otherwise.
pub const DEFAULT_MIN_ARTICLE_COUNT: usize = 1;

/// Host prefixed to avatar paths that are not already absolute URLs.
pub const AVATAR_BASE_URL: &str = "https://sciety.org";

/// Resolve an avatar reference to an absolute URL.
///
/// Empty references are returned unchanged.
pub fn avatar_url_for_path_or_url(path_or_url: Option<&str>) -> Option<String> {
    match path_or_url {
        None => None,
        Some(value) if value.is_empty() || value.contains("://") => Some(value.to_string()),
        Some(path) => Some(format!("{AVATAR_BASE_URL}{path}")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    User,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerMeta {
    pub kind: OwnerKind,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub slug: Option<String>,
    pub twitter_handle: Option<String>,
}

impl OwnerMeta {
    pub fn from_user(user: &UserRef) -> Self {
        OwnerMeta {
            kind: OwnerKind::User,
            display_name: user.user_display_name.clone(),
            avatar_url: avatar_url_for_path_or_url(user.avatar_url.as_deref()),
            slug: None,
            twitter_handle: user.twitter_handle.clone(),
        }
    }

    pub fn from_group(group: &GroupRef) -> Self {
        OwnerMeta {
            kind: OwnerKind::Group,
            display_name: group.group_name.clone(),
            avatar_url: avatar_url_for_path_or_url(group.avatar_path.as_deref()),
            slug: group.slug.clone(),
            twitter_handle: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleListEntry {
    pub article_id: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleCommentEntry {
    pub article_id: String,
    pub text: String,
    pub added_at: DateTime<Utc>,
}

/// Point-in-time summary of one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSummary {
    pub list_meta: ListMeta,
    pub owner: Option<OwnerMeta>,
    pub article_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Order summaries most active first.
///
/// Higher `article_count` first; ties go to the more recently updated list
/// (lists never updated come last), then to the smaller list id, so the
/// order is total and stable across refreshes.
pub fn sort_by_most_active(summaries: &mut [ListSummary]) {
    summaries.sort_by(compare_by_activity);
}

fn compare_by_activity(a: &ListSummary, b: &ListSummary) -> Ordering {
    b.article_count
        .cmp(&a.article_count)
        .then_with(|| b.last_updated.cmp(&a.last_updated))
        .then_with(|| a.list_meta.list_id.cmp(&b.list_meta.list_id))
}

#[derive(Debug, Clone)]
struct ListState {
    meta: ListMeta,
    owner: Option<OwnerMeta>,
    entries: HashMap<String, ArticleListEntry>,
    comments: HashMap<String, ArticleCommentEntry>,
    last_updated: Option<DateTime<Utc>>,
}

impl ListState {
    fn new(meta: ListMeta) -> Self {
        ListState {
            meta,
            owner: None,
            entries: HashMap::new(),
            comments: HashMap::new(),
            last_updated: None,
        }
    }

    fn set_owner(&mut self, owner: OwnerMeta) {
        if let Some(previous) = &self.owner {
            if previous.kind != owner.kind {
                log::warn!(
                    "owner kind of list '{}' changed from {:?} to {:?}",
                    self.meta.list_id,
                    previous.kind,
                    owner.kind
                );
            }
        }
        self.owner = Some(owner);
    }

    fn summary(&self) -> ListSummary {
        ListSummary {
            list_meta: self.meta.clone(),
            owner: self.owner.clone(),
            article_count: self.entries.len(),
            last_updated: self.last_updated,
        }
    }
}

#[derive(Debug, Default)]
struct ListsState {
    lists: HashMap<String, ListState>,
}

impl ListsState {
    fn touch(&mut self, list: &ListContext) -> &mut ListState {
        let state = self
            .lists
            .entry(list.meta.list_id.clone())
            .and_modify(|state| state.meta = list.meta.clone())
            .or_insert_with(|| ListState::new(list.meta.clone()));

        if let Some(user) = list.user.as_ref().filter(|user| !user.user_id.is_empty()) {
            state.set_owner(OwnerMeta::from_user(user));
        }
        if let Some(group) = list.group.as_ref().filter(|group| !group.group_id.is_empty()) {
            state.set_owner(OwnerMeta::from_group(group));
        }
        state
    }

    fn apply(&mut self, event: &Event) {
        let Some(list) = event.list() else {
            return;
        };
        if list.is_deleted {
            if self.lists.remove(list.list_id()).is_some() {
                log::debug!("deleted list '{}'", list.list_id());
            }
            return;
        }

        let state = self.touch(list);
        match &event.kind {
            EventKind::ArticleAddedToList { article_id, .. } => {
                state.entries.insert(
                    article_id.clone(),
                    ArticleListEntry {
                        article_id: article_id.clone(),
                        added_at: event.timestamp,
                    },
                );
                state.last_updated = Some(event.timestamp);
            }
            EventKind::ArticleRemovedFromList { article_id, .. } => {
                if state.entries.remove(article_id).is_some() {
                    state.last_updated = Some(event.timestamp);
                }
            }
            EventKind::ArticleAnnotated {
                article_id,
                content,
                ..
            } => {
                state.comments.insert(
                    article_id.clone(),
                    ArticleCommentEntry {
                        article_id: article_id.clone(),
                        text: content.clone(),
                        added_at: event.timestamp,
                    },
                );
            }
            _ => {}
        }
    }

    fn get(&self, list_id: &str) -> Result<&ListState> {
        self.lists
            .get(list_id)
            .ok_or_else(|| Error::ListNotFound(list_id.to_string()))
    }
}

/// The articles of one list, newest first, captured at call time.
///
/// Iterating is lazy and can be repeated; entries whose article id is not
/// a DOI are skipped.
#[derive(Debug, Clone)]
pub struct ArticleMentions {
    author: ArticleAuthor,
    items: Vec<(ArticleListEntry, Option<ArticleCommentEntry>)>,
}

impl ArticleMentions {
    pub fn iter(&self) -> impl Iterator<Item = ArticleMention> + '_ {
        self.items.iter().filter_map(|(entry, comment)| {
            let doi = doi_from_article_id(&entry.article_id)?;
            let mut mention = ArticleMention::new(doi).with_created_at(entry.added_at);
            if let Some(comment) = comment {
                mention = mention.with_comment(ArticleComment {
                    text: comment.text.clone(),
                    author: self.author.clone(),
                });
            }
            Some(mention)
        })
    }
}

/// Curated list membership, ownership and activity folded from events.
///
/// Events are applied incrementally on top of the existing state; replaying
/// the same full log again leaves the state unchanged.
#[derive(Debug, Default)]
pub struct ListAggregator {
    state: Mutex<ListsState>,
}

impl ListAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of events in order. Holds the lock for the whole batch.
    pub fn apply_events(&self, events: &[Event]) {
        let mut state = lock(&self.state);
        for event in events {
            state.apply(event);
        }
        log::info!(
            "applied {} events to lists, list count={}",
            events.len(),
            state.lists.len()
        );
    }

    fn most_active(
        &self,
        kind: OwnerKind,
        top_n: Option<NonZeroUsize>,
        min_article_count: usize,
    ) -> Vec<ListSummary> {
        let mut summaries: Vec<ListSummary> = {
            let state = lock(&self.state);
            state
                .lists
                .values()
                .filter(|list| list.owner.as_ref().is_some_and(|owner| owner.kind == kind))
                .filter(|list| list.entries.len() >= min_article_count)
                .map(ListState::summary)
                .collect()
        };
        sort_by_most_active(&mut summaries);
        if let Some(top_n) = top_n {
            summaries.truncate(top_n.get());
        }
        summaries
    }

    /// User-owned lists with at least `min_article_count` articles, most
    /// active first, truncated to `top_n` when given.
    ///
    /// `NonZeroUsize::new(n)` is a convenient argument: a zero `n` becomes
    /// `None` and returns every qualifying list.
    pub fn get_most_active_user_lists(
        &self,
        top_n: Option<NonZeroUsize>,
        min_article_count: usize,
    ) -> Vec<ListSummary> {
        self.most_active(OwnerKind::User, top_n, min_article_count)
    }

    /// Group-owned counterpart of [`get_most_active_user_lists`].
    ///
    /// [`get_most_active_user_lists`]: ListAggregator::get_most_active_user_lists
    pub fn get_most_active_group_lists(
        &self,
        top_n: Option<NonZeroUsize>,
        min_article_count: usize,
    ) -> Vec<ListSummary> {
        self.most_active(OwnerKind::Group, top_n, min_article_count)
    }

    /// # Errors
    ///
    /// Returns [`Error::ListNotFound`] for an unknown list id.
    pub fn get_list_meta_by_list_id(&self, list_id: &str) -> Result<ListMeta> {
        Ok(lock(&self.state).get(list_id)?.meta.clone())
    }

    /// # Errors
    ///
    /// Returns [`Error::ListNotFound`] for an unknown list id.
    pub fn get_list_summary_data_by_list_id(&self, list_id: &str) -> Result<ListSummary> {
        Ok(lock(&self.state).get(list_id)?.summary())
    }

    /// Mentions of every article in the list, most recently added first.
    ///
    /// Comments are attributed to the list owner. Ties on the added time
    /// are broken by article id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListNotFound`] for an unknown list id.
    pub fn iter_article_mentions_by_list_id(&self, list_id: &str) -> Result<ArticleMentions> {
        let state = lock(&self.state);
        let list = state.get(list_id)?;

        let mut items: Vec<(ArticleListEntry, Option<ArticleCommentEntry>)> = list
            .entries
            .values()
            .map(|entry| (entry.clone(), list.comments.get(&entry.article_id).cloned()))
            .collect();
        items.sort_by(|(a, _), (b, _)| {
            b.added_at
                .cmp(&a.added_at)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });

        let author = ArticleAuthor {
            name: list
                .owner
                .as_ref()
                .map(|owner| owner.display_name.clone())
                .unwrap_or_default(),
        };
        Ok(ArticleMentions { author, items })
    }
}

impl MaterializedView for ListAggregator {
    fn view_name(&self) -> &str {
        "lists"
    }

    fn apply_events(&self, events: &[Event]) {
        ListAggregator::apply_events(self, events);
    }
}
