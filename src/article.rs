use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DOI_ARTICLE_ID_PREFIX: &str = "doi:";

/// Extract the DOI from a `doi:`-prefixed article id.
///
/// # Examples
///
/// ```
/// use curatefold::doi_from_article_id;
///
/// assert_eq!(doi_from_article_id("doi:10.1101/123"), Some("10.1101/123"));
/// assert_eq!(doi_from_article_id("arxiv:2101.0001"), None);
/// ```
pub fn doi_from_article_id(article_id: &str) -> Option<&str> {
    article_id
        .strip_prefix(DOI_ARTICLE_ID_PREFIX)
        .filter(|doi| !doi.is_empty())
}

pub fn article_id_from_doi(article_doi: &str) -> String {
    format!("{DOI_ARTICLE_ID_PREFIX}{article_doi}")
}

/// Case-folded key used for evaluation lookups.
pub fn normalize_article_id(article_id: &str) -> String {
    article_id.to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleAuthor {
    pub name: String,
}

/// A list owner's note on an article, as shown alongside a mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleComment {
    pub text: String,
    pub author: ArticleAuthor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleStats {
    pub evaluation_count: usize,
    pub latest_evaluation_published_at: Option<DateTime<Utc>>,
}

/// An article surfaced by some source (a list, a search), optionally
/// decorated with a comment and evaluation stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMention {
    pub article_doi: String,
    pub created_at: Option<DateTime<Utc>>,
    pub comment: Option<ArticleComment>,
    pub article_stats: Option<ArticleStats>,
}

impl ArticleMention {
    pub fn new(article_doi: impl Into<String>) -> Self {
        ArticleMention {
            article_doi: article_doi.into(),
            created_at: None,
            comment: None,
            article_stats: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_comment(mut self, comment: ArticleComment) -> Self {
        self.comment = Some(comment);
        self
    }

    pub fn with_article_stats(mut self, article_stats: ArticleStats) -> Self {
        self.article_stats = Some(article_stats);
        self
    }
}
