//! Materialized views over a periodically refetched curation event log.
//!
//! The event log is fetched through a [`cache`] chain, folded into a
//! [`ListAggregator`] and an [`EvaluationAggregator`], and refreshed on an
//! interval by a [`RefreshScheduler`].

mod article;
pub mod cache;
mod config;
mod error;
mod evaluation;
mod event;
mod lists;
mod scheduler;
mod source;
mod sync;
mod update;
mod view;

pub use article::{
    ArticleAuthor, ArticleComment, ArticleMention, ArticleStats, DOI_ARTICLE_ID_PREFIX,
    article_id_from_doi, doi_from_article_id, normalize_article_id,
};
pub use cache::{CacheChain, CacheLayer, LoadPolicy, PassThrough};
pub use config::Config;
pub use error::{BoxError, Error, Result};
pub use evaluation::{EvaluationAggregator, EvaluationRecord};
pub use event::{
    Event, EventKind, GroupRef, ListContext, ListMeta, RawEvent, RawList, UserRef, decode_events,
    names,
};
pub use lists::{
    ArticleCommentEntry, ArticleListEntry, ArticleMentions, AVATAR_BASE_URL,
    DEFAULT_MIN_ARTICLE_COUNT, ListAggregator, ListSummary, OwnerKind, OwnerMeta,
    avatar_url_for_path_or_url, sort_by_most_active,
};
pub use scheduler::{RefreshFn, RefreshScheduler};
pub use source::{
    CachedEventProvider, EventBatch, EventSource, FileModifiedOracle, FreshnessOracle,
    JsonlEventSource,
};
pub use update::UpdateManager;
pub use view::MaterializedView;
