use crate::article::{ArticleMention, ArticleStats, article_id_from_doi, normalize_article_id};
use crate::event::{Event, EventKind};
use crate::sync::lock;
use crate::view::MaterializedView;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationRecord {
    pub article_id: String,
    pub evaluation_locator: String,
    pub published_at: Option<DateTime<Utc>>,
}

fn article_stats(records: &[EvaluationRecord]) -> ArticleStats {
    ArticleStats {
        evaluation_count: records.len(),
        latest_evaluation_published_at: records
            .iter()
            .filter_map(|record| record.published_at)
            .max(),
    }
}

#[derive(Debug, Default)]
struct EvaluationState {
    by_article_id: HashMap<String, Vec<EvaluationRecord>>,
    article_id_by_locator: HashMap<String, String>,
}

impl EvaluationState {
    fn record(&mut self, record: EvaluationRecord) {
        let key = normalize_article_id(&record.article_id);
        self.article_id_by_locator
            .insert(record.evaluation_locator.clone(), key.clone());
        self.by_article_id.entry(key).or_default().push(record);
    }

    fn erase(&mut self, locator: &str) {
        let Some(key) = self.article_id_by_locator.get(locator).cloned() else {
            log::warn!("ignoring erasure of unknown evaluation locator: {locator}");
            return;
        };
        let Some(records) = self.by_article_id.get_mut(&key) else {
            return;
        };
        if let Some(position) = records
            .iter()
            .position(|record| record.evaluation_locator == locator)
        {
            let removed = records.remove(position);
            log::debug!("removed evaluation: {removed:?}");
        }
        if !records
            .iter()
            .any(|record| record.evaluation_locator == locator)
        {
            self.article_id_by_locator.remove(locator);
        }
        if records.is_empty() {
            self.by_article_id.remove(&key);
        }
    }

    fn records(&self, article_id: &str) -> &[EvaluationRecord] {
        self.by_article_id
            .get(&normalize_article_id(article_id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Evaluation counts per article folded from events.
///
/// Every batch is a full rebuild: state is cleared and the whole log
/// replayed. Erasure events often carry no article id, so they are
/// resolved through the locator index built during the same replay.
/// Article ids are matched case-insensitively.
#[derive(Debug, Default)]
pub struct EvaluationAggregator {
    state: Mutex<EvaluationState>,
}

impl EvaluationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_events(&self, events: &[Event]) {
        let mut state = lock(&self.state);
        *state = EvaluationState::default();
        for event in events {
            match &event.kind {
                EventKind::EvaluationRecorded {
                    article_id,
                    evaluation_locator,
                    published_at,
                } => state.record(EvaluationRecord {
                    article_id: article_id.clone(),
                    evaluation_locator: evaluation_locator.clone(),
                    published_at: *published_at,
                }),
                EventKind::EvaluationErased {
                    evaluation_locator,
                    ..
                } => state.erase(evaluation_locator),
                _ => {}
            }
        }
        log::info!(
            "applied {} events to evaluations, evaluated article count={}",
            events.len(),
            state.by_article_id.len()
        );
    }

    pub fn get_evaluation_count_by_article_id(&self, article_id: &str) -> usize {
        lock(&self.state).records(article_id).len()
    }

    pub fn get_article_stats_by_article_id(&self, article_id: &str) -> ArticleStats {
        article_stats(lock(&self.state).records(article_id))
    }

    pub fn get_article_stats_by_article_doi(&self, article_doi: &str) -> ArticleStats {
        self.get_article_stats_by_article_id(&article_id_from_doi(article_doi))
    }

    pub fn get_article_mention_with_article_stats(&self, mention: ArticleMention) -> ArticleMention {
        let stats = self.get_article_stats_by_article_doi(&mention.article_doi);
        mention.with_article_stats(stats)
    }

    /// Attach current stats to each mention as it is consumed.
    ///
    /// Each element takes the lock separately, so a refresh running
    /// concurrently may be visible part way through the sequence.
    pub fn iter_article_mention_with_article_stats<'a, I>(
        &'a self,
        mentions: I,
    ) -> impl Iterator<Item = ArticleMention> + 'a
    where
        I: IntoIterator<Item = ArticleMention>,
        I::IntoIter: 'a,
    {
        mentions
            .into_iter()
            .map(move |mention| self.get_article_mention_with_article_stats(mention))
    }

    /// Keep only mentions of articles with at least one evaluation.
    pub fn iter_evaluated_only_article_mention<'a, I>(
        &'a self,
        mentions: I,
    ) -> impl Iterator<Item = ArticleMention> + 'a
    where
        I: IntoIterator<Item = ArticleMention>,
        I::IntoIter: 'a,
    {
        mentions.into_iter().filter(move |mention| {
            self.get_evaluation_count_by_article_id(&article_id_from_doi(&mention.article_doi)) > 0
        })
    }
}

impl MaterializedView for EvaluationAggregator {
    fn view_name(&self) -> &str {
        "evaluations"
    }

    fn apply_events(&self, events: &[Event]) {
        EvaluationAggregator::apply_events(self, events);
    }
}
