#![allow(dead_code)]

use chrono::{DateTime, Utc};
use curatefold::cache::Clock;
use curatefold::{Error, Event, EventSource, FreshnessOracle, GroupRef, ListContext, UserRef};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub const LIST_ID_1: &str = "list_1";
pub const LIST_ID_2: &str = "list_2";
pub const LIST_ID_3: &str = "list_3";

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_000_000_000 + secs, 0).unwrap()
}

pub fn user(id: &str) -> UserRef {
    UserRef {
        user_id: id.to_string(),
        user_display_name: format!("User {id}"),
        avatar_url: Some(format!("https://avatars.example/{id}")),
        twitter_handle: Some(format!("@{id}")),
    }
}

pub fn group(id: &str) -> GroupRef {
    GroupRef {
        group_id: id.to_string(),
        group_name: format!("Group {id}"),
        avatar_path: Some(format!("/static/groups/{id}.png")),
        slug: Some(id.to_string()),
    }
}

pub fn user_list(list_id: &str) -> ListContext {
    ListContext::new(list_id, format!("Name {list_id}"), format!("About {list_id}"))
        .with_user(user("user_1"))
}

pub fn group_list(list_id: &str) -> ListContext {
    ListContext::new(list_id, format!("Name {list_id}"), format!("About {list_id}"))
        .with_group(group("group_1"))
}

pub fn added(secs: i64, list: &ListContext, article_id: &str) -> Event {
    Event::article_added(ts(secs), list.clone(), article_id)
}

pub fn removed(secs: i64, list: &ListContext, article_id: &str) -> Event {
    Event::article_removed(ts(secs), list.clone(), article_id)
}

pub fn annotated(secs: i64, list: &ListContext, article_id: &str, text: &str) -> Event {
    Event::article_annotated(ts(secs), list.clone(), article_id, text)
}

pub fn recorded(secs: i64, article_id: &str, locator: &str) -> Event {
    Event::evaluation_recorded(ts(secs), article_id, locator)
}

pub fn erased(secs: i64, locator: &str) -> Event {
    Event::evaluation_erased(ts(secs), locator)
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

/// Counts how often a loader ran and hands out numbered values.
#[derive(Default)]
pub struct CountingLoader {
    calls: AtomicUsize,
}

impl CountingLoader {
    pub fn next(&self) -> curatefold::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("value_{n}"))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// In-memory event source whose contents and failure mode can change.
#[derive(Default)]
pub struct StaticSource {
    events: Mutex<Vec<Event>>,
    failing: Mutex<bool>,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new(events: Vec<Event>) -> Self {
        StaticSource {
            events: Mutex::new(events),
            ..Default::default()
        }
    }

    pub fn set_events(&self, events: Vec<Event>) {
        *self.events.lock().unwrap() = events;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl EventSource for StaticSource {
    fn fetch_all_events(&self) -> curatefold::Result<Vec<Event>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() {
            return Err(Error::source_failed("upstream unavailable"));
        }
        Ok(self.events.lock().unwrap().clone())
    }
}

/// Freshness oracle reporting whatever time the test sets.
pub struct FakeOracle {
    modified: Mutex<DateTime<Utc>>,
    calls: AtomicUsize,
}

impl FakeOracle {
    pub fn new(modified: DateTime<Utc>) -> Self {
        FakeOracle {
            modified: Mutex::new(modified),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_modified(&self, modified: DateTime<Utc>) {
        *self.modified.lock().unwrap() = modified;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FreshnessOracle for FakeOracle {
    fn modified_time(&self, _dataset_id: &str) -> curatefold::Result<DateTime<Utc>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.modified.lock().unwrap())
    }
}
