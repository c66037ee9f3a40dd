use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream event names understood by the views.
///
/// Several facts have two accepted spellings; the aliases decode to the
/// same [`EventKind`] variant.
pub mod names {
    pub const ARTICLE_ADDED_TO_LIST: &str = "ArticleAddedToList";
    pub const ARTICLE_REMOVED_FROM_LIST: &str = "ArticleRemovedFromList";
    pub const ANNOTATION_CREATED: &str = "AnnotationCreated";
    pub const ARTICLE_IN_LIST_ANNOTATED: &str = "ArticleInListAnnotated";
    pub const EVALUATION_RECORDED: &str = "EvaluationRecorded";
    pub const EVALUATION_PUBLICATION_RECORDED: &str = "EvaluationPublicationRecorded";
    pub const INCORRECTLY_RECORDED_EVALUATION_ERASED: &str = "IncorrectlyRecordedEvaluationErased";
    pub const EVALUATION_REMOVAL_RECORDED: &str = "EvaluationRemovalRecorded";
}

/// Name and description of a curated list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    pub list_id: String,
    pub list_name: String,
    pub list_description: String,
}

/// User sub-record attached to list events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_handle: Option<String>,
}

/// Group sub-record attached to list events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

/// The list an event touches, together with whoever owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListContext {
    pub meta: ListMeta,
    pub user: Option<UserRef>,
    pub group: Option<GroupRef>,
    pub is_deleted: bool,
}

impl ListContext {
    /// Create a list context with no owner.
    ///
    /// # Examples
    ///
    /// ```
    /// use curatefold::{ListContext, UserRef};
    ///
    /// let list = ListContext::new("list_1", "Reading", "Things to read")
    ///     .with_user(UserRef { user_id: "user_1".into(), ..Default::default() });
    /// assert_eq!(list.meta.list_id, "list_1");
    /// assert!(list.user.is_some());
    /// ```
    pub fn new(
        list_id: impl Into<String>,
        list_name: impl Into<String>,
        list_description: impl Into<String>,
    ) -> Self {
        ListContext {
            meta: ListMeta {
                list_id: list_id.into(),
                list_name: list_name.into(),
                list_description: list_description.into(),
            },
            user: None,
            group: None,
            is_deleted: false,
        }
    }

    pub fn with_user(mut self, user: UserRef) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_group(mut self, group: GroupRef) -> Self {
        self.group = Some(group);
        self
    }

    /// Mark the list as deleted upstream.
    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    pub fn list_id(&self) -> &str {
        &self.meta.list_id
    }
}

/// Decoded payload of an [`Event`], one variant per kind of fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    ArticleAddedToList {
        list: ListContext,
        article_id: String,
    },
    ArticleRemovedFromList {
        list: ListContext,
        article_id: String,
    },
    ArticleAnnotated {
        list: ListContext,
        article_id: String,
        content: String,
    },
    EvaluationRecorded {
        article_id: String,
        evaluation_locator: String,
        published_at: Option<DateTime<Utc>>,
    },
    /// The evaluation identified by the locator no longer counts. The
    /// article id is frequently absent on these events.
    EvaluationErased {
        article_id: Option<String>,
        evaluation_locator: String,
    },
    /// Anything the views do not interpret, including known event names
    /// whose required fields are missing. The list context is kept so list
    /// metadata and ownership still update.
    Unknown { list: Option<ListContext> },
}

/// An immutable curation event.
///
/// `name` is the upstream event name as delivered; `kind` is its decoded
/// meaning. Events (de)serialize through the flat [`RawEvent`] record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEvent", into = "RawEvent")]
pub struct Event {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    /// Create an event from an already decoded kind.
    pub fn new(name: &str, timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Event {
            name: name.to_string(),
            timestamp,
            kind,
        }
    }

    pub fn article_added(timestamp: DateTime<Utc>, list: ListContext, article_id: &str) -> Self {
        Event::new(
            names::ARTICLE_ADDED_TO_LIST,
            timestamp,
            EventKind::ArticleAddedToList {
                list,
                article_id: article_id.to_string(),
            },
        )
    }

    pub fn article_removed(timestamp: DateTime<Utc>, list: ListContext, article_id: &str) -> Self {
        Event::new(
            names::ARTICLE_REMOVED_FROM_LIST,
            timestamp,
            EventKind::ArticleRemovedFromList {
                list,
                article_id: article_id.to_string(),
            },
        )
    }

    pub fn article_annotated(
        timestamp: DateTime<Utc>,
        list: ListContext,
        article_id: &str,
        content: &str,
    ) -> Self {
        Event::new(
            names::ANNOTATION_CREATED,
            timestamp,
            EventKind::ArticleAnnotated {
                list,
                article_id: article_id.to_string(),
                content: content.to_string(),
            },
        )
    }

    pub fn evaluation_recorded(
        timestamp: DateTime<Utc>,
        article_id: &str,
        evaluation_locator: &str,
    ) -> Self {
        Event::new(
            names::EVALUATION_RECORDED,
            timestamp,
            EventKind::EvaluationRecorded {
                article_id: article_id.to_string(),
                evaluation_locator: evaluation_locator.to_string(),
                published_at: None,
            },
        )
    }

    pub fn evaluation_erased(timestamp: DateTime<Utc>, evaluation_locator: &str) -> Self {
        Event::new(
            names::INCORRECTLY_RECORDED_EVALUATION_ERASED,
            timestamp,
            EventKind::EvaluationErased {
                article_id: None,
                evaluation_locator: evaluation_locator.to_string(),
            },
        )
    }

    /// The list this event touches, if any.
    pub fn list(&self) -> Option<&ListContext> {
        match &self.kind {
            EventKind::ArticleAddedToList { list, .. }
            | EventKind::ArticleRemovedFromList { list, .. }
            | EventKind::ArticleAnnotated { list, .. } => Some(list),
            EventKind::Unknown { list } => list.as_ref(),
            EventKind::EvaluationRecorded { .. } | EventKind::EvaluationErased { .. } => None,
        }
    }
}

/// List sub-record as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawList {
    #[serde(default)]
    pub list_id: String,
    #[serde(default)]
    pub list_name: String,
    #[serde(default)]
    pub list_description: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_list_deleted: bool,
}

/// Flat upstream event record; every field except name and timestamp is
/// optional and only meaningful for some event names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_name: String,
    pub event_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sciety_list: Option<RawList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sciety_user: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sciety_group: Option<GroupRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at_timestamp: Option<DateTime<Utc>>,
}

impl RawEvent {
    fn list_context(&self) -> Option<ListContext> {
        let raw = self.sciety_list.as_ref()?;
        if raw.list_id.is_empty() {
            return None;
        }
        Some(ListContext {
            meta: ListMeta {
                list_id: raw.list_id.clone(),
                list_name: raw.list_name.clone(),
                list_description: raw.list_description.clone(),
            },
            user: self.sciety_user.clone(),
            group: self.sciety_group.clone(),
            is_deleted: raw.is_list_deleted,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        let list = raw.list_context();
        let article_id = non_empty(raw.article_id.clone());
        let locator = non_empty(raw.evaluation_locator.clone());

        let kind = match (raw.event_name.as_str(), list, article_id, locator) {
            (names::ARTICLE_ADDED_TO_LIST, Some(list), Some(article_id), _) => {
                EventKind::ArticleAddedToList { list, article_id }
            }
            (names::ARTICLE_REMOVED_FROM_LIST, Some(list), Some(article_id), _) => {
                EventKind::ArticleRemovedFromList { list, article_id }
            }
            (
                names::ANNOTATION_CREATED | names::ARTICLE_IN_LIST_ANNOTATED,
                Some(list),
                Some(article_id),
                _,
            ) => EventKind::ArticleAnnotated {
                list,
                article_id,
                content: raw.content.clone().unwrap_or_default(),
            },
            (
                names::EVALUATION_RECORDED | names::EVALUATION_PUBLICATION_RECORDED,
                _,
                Some(article_id),
                Some(evaluation_locator),
            ) => EventKind::EvaluationRecorded {
                article_id,
                evaluation_locator,
                published_at: raw.published_at_timestamp,
            },
            (
                names::INCORRECTLY_RECORDED_EVALUATION_ERASED | names::EVALUATION_REMOVAL_RECORDED,
                _,
                article_id,
                Some(evaluation_locator),
            ) => EventKind::EvaluationErased {
                article_id,
                evaluation_locator,
            },
            (_, list, _, _) => {
                log::debug!("event '{}' not interpreted by any view", raw.event_name);
                EventKind::Unknown { list }
            }
        };

        Event {
            name: raw.event_name,
            timestamp: raw.event_timestamp,
            kind,
        }
    }
}

fn raw_list(list: &ListContext) -> RawList {
    RawList {
        list_id: list.meta.list_id.clone(),
        list_name: list.meta.list_name.clone(),
        list_description: list.meta.list_description.clone(),
        is_list_deleted: list.is_deleted,
    }
}

impl From<Event> for RawEvent {
    fn from(event: Event) -> Self {
        let mut raw = RawEvent {
            event_name: event.name,
            event_timestamp: event.timestamp,
            sciety_list: None,
            sciety_user: None,
            sciety_group: None,
            article_id: None,
            evaluation_locator: None,
            content: None,
            published_at_timestamp: None,
        };
        let list = match event.kind {
            EventKind::ArticleAddedToList { list, article_id }
            | EventKind::ArticleRemovedFromList { list, article_id } => {
                raw.article_id = Some(article_id);
                Some(list)
            }
            EventKind::ArticleAnnotated {
                list,
                article_id,
                content,
            } => {
                raw.article_id = Some(article_id);
                raw.content = Some(content);
                Some(list)
            }
            EventKind::EvaluationRecorded {
                article_id,
                evaluation_locator,
                published_at,
            } => {
                raw.article_id = Some(article_id);
                raw.evaluation_locator = Some(evaluation_locator);
                raw.published_at_timestamp = published_at;
                None
            }
            EventKind::EvaluationErased {
                article_id,
                evaluation_locator,
            } => {
                raw.article_id = article_id;
                raw.evaluation_locator = Some(evaluation_locator);
                None
            }
            EventKind::Unknown { list } => list,
        };
        if let Some(list) = list {
            raw.sciety_list = Some(raw_list(&list));
            raw.sciety_user = list.user;
            raw.sciety_group = list.group;
        }
        raw
    }
}

/// Decode a JSON array of upstream event records.
///
/// # Examples
///
/// ```
/// use curatefold::{decode_events, EventKind};
///
/// let events = decode_events(r#"[
///     {"event_name": "EvaluationRecorded", "event_timestamp": "2001-02-03T00:00:00Z",
///      "article_id": "doi:10.1/a", "evaluation_locator": "ev1"},
///     {"event_name": "SomethingNew", "event_timestamp": "2001-02-03T00:00:01Z"}
/// ]"#).unwrap();
/// assert!(matches!(events[0].kind, EventKind::EvaluationRecorded { .. }));
/// assert_eq!(events[1].kind, EventKind::Unknown { list: None });
/// ```
pub fn decode_events(json: &str) -> crate::Result<Vec<Event>> {
    Ok(serde_json::from_str(json)?)
}
