//! Per-browser session context: active page, page load state, stale-load detection and
//! the in-flight mutation guard.

use crate::config::Catalog;
use crate::error::AppError;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_SESSION: &str = "default";

/// A navigable page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    /// A table page, by the table's page slug.
    Table(String),
    Queries,
    Triggers,
    Transactions,
}

impl Page {
    pub fn parse(slug: &str, catalog: &Catalog) -> Option<Page> {
        match slug {
            "dashboard" => Some(Page::Dashboard),
            "queries" => Some(Page::Queries),
            "triggers" => Some(Page::Triggers),
            "transactions" => Some(Page::Transactions),
            other => catalog.table_for_page(other).map(|t| Page::Table(t.page.clone())),
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            Page::Dashboard => "dashboard",
            Page::Table(slug) => slug,
            Page::Queries => "queries",
            Page::Triggers => "triggers",
            Page::Transactions => "transactions",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(s: &str) -> Theme {
        if s.trim().eq_ignore_ascii_case("dark") {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageState {
    Loading,
    Loaded,
    LoadFailed(String),
}

/// Proof of a started load; only the newest ticket may publish its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

/// Identifies a mutating action for duplicate-submission detection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MutationKey {
    pub table: String,
    pub action: &'static str,
    pub id: Option<String>,
}

impl MutationKey {
    pub fn new(table: &str, action: &'static str, id: Option<&str>) -> Self {
        MutationKey {
            table: table.to_string(),
            action,
            id: id.map(str::to_string),
        }
    }
}

impl fmt::Display for MutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} {} {}", self.action, self.table, id),
            None => write!(f, "{} {}", self.action, self.table),
        }
    }
}

struct SessionInner {
    page: Page,
    state: PageState,
    generation: u64,
    in_flight: HashSet<MutationKey>,
}

pub struct Session {
    id: String,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(id: &str) -> Self {
        Session {
            id: id.to_string(),
            inner: Mutex::new(SessionInner {
                page: Page::Dashboard,
                state: PageState::Loaded,
                generation: 0,
                in_flight: HashSet::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn active_page(&self) -> Page {
        self.lock().page.clone()
    }

    pub fn state(&self) -> PageState {
        self.lock().state.clone()
    }

    /// Makes `page` active and moves to `Loading`. Any earlier ticket becomes stale.
    pub fn begin_load(&self, page: Page) -> LoadTicket {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.page = page;
        inner.state = PageState::Loading;
        LoadTicket {
            generation: inner.generation,
        }
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.lock().generation == ticket.generation
    }

    /// Records the outcome of a load. Returns false, changing nothing, when a newer load
    /// has started since `ticket` was issued.
    pub fn finish_load(&self, ticket: LoadTicket, outcome: Result<(), String>) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            return false;
        }
        inner.state = match outcome {
            Ok(()) => PageState::Loaded,
            Err(msg) => PageState::LoadFailed(msg),
        };
        true
    }

    /// Claims `key` until the returned guard is dropped. A second claim while the first
    /// is held is a `Conflict`.
    pub fn begin_mutation(self: &Arc<Self>, key: MutationKey) -> Result<MutationGuard, AppError> {
        let mut inner = self.lock();
        if !inner.in_flight.insert(key.clone()) {
            return Err(AppError::Conflict(format!("{} is already in progress", key)));
        }
        Ok(MutationGuard {
            session: Arc::clone(self),
            key,
        })
    }
}

pub struct MutationGuard {
    session: Arc<Session>,
    key: MutationKey,
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        self.session.lock().in_flight.remove(&self.key);
    }
}

/// Sessions kept at most.
pub const DEFAULT_SESSION_CAPACITY: usize = 1024;
/// Sessions unused this long are dropped on the next lookup.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

struct Entry {
    session: Arc<Session>,
    last_seen: Instant,
    /// Access order; breaks ties between equal `Instant`s.
    tick: u64,
}

#[derive(Default)]
struct Slots {
    entries: HashMap<String, Entry>,
    clock: u64,
}

/// Session lookup by id. Bounded: idle sessions expire, and when full the least recently
/// used session is evicted. An evicted session still in use by a request stays valid for
/// that request; the next request with its id starts a fresh one.
pub struct SessionRegistry {
    slots: Mutex<Slots>,
    capacity: usize,
    idle: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_limits(DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_IDLE)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, idle: Duration) -> Self {
        SessionRegistry {
            slots: Mutex::new(Slots::default()),
            capacity: capacity.max(1),
            idle,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        let now = Instant::now();
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.clock += 1;
        let tick = slots.clock;
        let sessions = &mut slots.entries;
        if let Some(entry) = sessions.get_mut(id) {
            entry.last_seen = now;
            entry.tick = tick;
            return Arc::clone(&entry.session);
        }
        let idle = self.idle;
        let before = sessions.len();
        sessions.retain(|_, e| now.duration_since(e.last_seen) < idle);
        if sessions.len() < before {
            tracing::debug!(expired = before - sessions.len(), "expired idle sessions");
        }
        while sessions.len() >= self.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, e)| e.tick)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    sessions.remove(&k);
                }
                None => break,
            }
        }
        let session = Arc::new(Session::new(id));
        sessions.insert(
            id.to_string(),
            Entry {
                session: Arc::clone(&session),
                last_seen: now,
                tick,
            },
        );
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_load_makes_older_ticket_stale() {
        let s = Session::new("s1");
        let first = s.begin_load(Page::Table("patients".into()));
        let second = s.begin_load(Page::Table("doctors".into()));
        assert_eq!(s.state(), PageState::Loading);
        assert!(!s.finish_load(first, Ok(())));
        assert_eq!(s.state(), PageState::Loading);
        assert!(s.finish_load(second, Err("boom".into())));
        assert_eq!(s.state(), PageState::LoadFailed("boom".into()));
        assert_eq!(s.active_page(), Page::Table("doctors".into()));
    }

    #[test]
    fn duplicate_mutation_is_refused_until_released() {
        let s = Arc::new(Session::new("s1"));
        let key = MutationKey::new("patients", "delete", Some("3"));
        let guard = s.begin_mutation(key.clone()).unwrap();
        assert!(matches!(s.begin_mutation(key.clone()), Err(AppError::Conflict(_))));
        assert!(s.begin_mutation(MutationKey::new("patients", "delete", Some("4"))).is_ok());
        drop(guard);
        assert!(s.begin_mutation(key).is_ok());
    }

    #[test]
    fn registry_returns_the_same_session() {
        let r = SessionRegistry::new();
        let a = r.get_or_create("abc");
        let b = r.get_or_create("abc");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &r.get_or_create(DEFAULT_SESSION)));
    }

    #[test]
    fn pages_parse_from_slugs() {
        let catalog = Catalog::hospital().unwrap();
        assert_eq!(Page::parse("billing", &catalog), Some(Page::Table("billing".into())));
        assert_eq!(Page::parse("bills", &catalog), None);
        assert_eq!(Page::parse("queries", &catalog), Some(Page::Queries));
        assert_eq!(Theme::parse("DARK").toggled(), Theme::Light);
    }

    #[test]
    fn registry_stays_within_capacity() {
        let r = SessionRegistry::with_limits(8, Duration::from_secs(3600));
        let keep = r.get_or_create("keep");
        for i in 0..500 {
            r.get_or_create(&format!("tab-{i}"));
            // touched every round, so never the least recently used
            assert!(Arc::ptr_eq(&keep, &r.get_or_create("keep")));
        }
        assert_eq!(r.len(), 8);
    }

    #[test]
    fn idle_sessions_expire_on_lookup() {
        let r = SessionRegistry::with_limits(100, Duration::ZERO);
        let first = r.get_or_create("a");
        r.get_or_create("b");
        assert_eq!(r.len(), 1);
        assert!(!Arc::ptr_eq(&first, &r.get_or_create("a")));
    }
}
