mod common;

use common::{LIST_ID_1, StaticSource, added, recorded, user_list};
use curatefold::cache::InMemoryCache;
use curatefold::{
    CacheLayer, CachedEventProvider, EvaluationAggregator, EventBatch, ListAggregator,
    MaterializedView, PassThrough, RefreshScheduler, UpdateManager,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(20);

/// Poll `condition` until it holds or `timeout` passes.
fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

struct Fixture {
    source: Arc<StaticSource>,
    lists: Arc<ListAggregator>,
    evaluations: Arc<EvaluationAggregator>,
    manager: Arc<UpdateManager>,
}

fn fixture(cache: Arc<dyn CacheLayer<EventBatch>>) -> Fixture {
    let list = user_list(LIST_ID_1);
    let source = Arc::new(StaticSource::new(vec![
        added(1, &list, "doi:10.1/a"),
        recorded(2, "doi:10.1/a", "ev1"),
    ]));
    let lists = Arc::new(ListAggregator::new());
    let evaluations = Arc::new(EvaluationAggregator::new());
    let provider = CachedEventProvider::new("curation", source.clone(), cache);
    let manager = Arc::new(UpdateManager::new(
        provider,
        vec![
            lists.clone() as Arc<dyn MaterializedView>,
            evaluations.clone() as Arc<dyn MaterializedView>,
        ],
    ));
    Fixture {
        source,
        lists,
        evaluations,
        manager,
    }
}

fn cached_fixture() -> Fixture {
    fixture(Arc::new(InMemoryCache::<EventBatch>::new(None)))
}

fn article_count(fixture: &Fixture) -> usize {
    fixture
        .lists
        .get_list_summary_data_by_list_id(LIST_ID_1)
        .map(|summary| summary.article_count)
        .unwrap_or(0)
}

#[test]
fn test_scheduler_ticks_repeatedly() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let scheduler = RefreshScheduler::start(TICK, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    assert!(wait_for(Duration::from_secs(5), || calls.load(Ordering::SeqCst) >= 3));
    assert!(scheduler.is_running());
    assert_eq!(scheduler.interval(), TICK);
}

#[test]
fn test_scheduler_sleeps_before_first_refresh() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let _scheduler = RefreshScheduler::start(Duration::from_secs(3600), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_scheduler_survives_panicking_refresh() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let scheduler = RefreshScheduler::start(TICK, move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if n == 1 {
            panic!("first refresh fails");
        }
    })
    .unwrap();

    assert!(wait_for(Duration::from_secs(5), || calls.load(Ordering::SeqCst) >= 3));
    assert!(scheduler.is_running());
}

#[test]
fn test_trigger_runs_on_calling_thread() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let scheduler = RefreshScheduler::start(Duration::from_secs(3600), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    assert!(scheduler.trigger());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_trigger_reports_panic() {
    let scheduler = RefreshScheduler::start(Duration::from_secs(3600), || {
        panic!("refresh exploded");
    })
    .unwrap();
    assert!(!scheduler.trigger());
    // Still usable after a contained panic.
    assert!(!scheduler.trigger());
}

#[test]
fn test_check_or_reload_data_populates_every_view() {
    let fixture = cached_fixture();
    fixture.manager.check_or_reload_data().unwrap();

    assert_eq!(article_count(&fixture), 1);
    assert_eq!(
        fixture
            .evaluations
            .get_evaluation_count_by_article_id("doi:10.1/a"),
        1
    );
}

#[test]
fn test_repeated_refresh_uses_cache() {
    let fixture = cached_fixture();
    fixture.manager.preload().unwrap();
    fixture.manager.check_or_reload_data().unwrap();
    fixture.manager.check_or_reload_data().unwrap();

    assert_eq!(fixture.source.fetches(), 1);
    // Replaying the same log leaves the views as they were.
    assert_eq!(article_count(&fixture), 1);
}

#[test]
fn test_reload_data_bypasses_cache() {
    let fixture = cached_fixture();
    fixture.manager.check_or_reload_data().unwrap();

    let list = user_list(LIST_ID_1);
    fixture.source.set_events(vec![
        added(1, &list, "doi:10.1/a"),
        added(3, &list, "doi:10.1/b"),
    ]);
    fixture.manager.check_or_reload_data().unwrap();
    assert_eq!(article_count(&fixture), 1);

    fixture.manager.reload_data().unwrap();
    assert_eq!(fixture.source.fetches(), 2);
    assert_eq!(article_count(&fixture), 2);
    assert_eq!(
        fixture
            .evaluations
            .get_evaluation_count_by_article_id("doi:10.1/a"),
        0
    );
}

#[test]
fn test_failing_source_leaves_views_intact() {
    let fixture = fixture(Arc::new(PassThrough));
    fixture.manager.check_or_reload_data().unwrap();

    fixture.source.set_failing(true);
    assert!(matches!(
        fixture.manager.check_or_reload_data(),
        Err(curatefold::Error::Source(_))
    ));
    assert!(fixture.manager.reload_data().is_err());
    assert_eq!(article_count(&fixture), 1);
}

#[test]
fn test_refresh_fn_swallows_errors() {
    let fixture = fixture(Arc::new(PassThrough));
    fixture.source.set_failing(true);
    let refresh = fixture.manager.refresh_fn();
    refresh();
    assert_eq!(fixture.source.fetches(), 1);
    assert_eq!(article_count(&fixture), 0);

    fixture.source.set_failing(false);
    refresh();
    assert_eq!(article_count(&fixture), 1);
}

#[test]
fn test_manager_start_refreshes_in_background() {
    let fixture = fixture(Arc::new(PassThrough));
    let scheduler = fixture.manager.start(TICK).unwrap();

    assert!(wait_for(Duration::from_secs(5), || fixture.source.fetches() >= 2));
    assert!(wait_for(Duration::from_secs(5), || article_count(&fixture) == 1));
    assert!(scheduler.is_running());
}
