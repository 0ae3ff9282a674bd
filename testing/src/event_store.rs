//! In-memory behavior event store.
//!
//! Mirrors the grouped queries of the Postgres store so report services can be
//! tested without a database.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use storefront_insights_core::environment::{Clock, SystemClock};
use storefront_insights_core::event::{BehaviorEvent, EventKind, NewBehaviorEvent};
use storefront_insights_core::store::{
    BehaviorEventReader, BehaviorEventWriter, CohortCell, DeviceCount, EventQuery, PageCount,
    SessionSummary, StepReach, StoreError, StoreFuture,
};
use storefront_insights_core::time::{week_start, ReportWindow};
use uuid::Uuid;

/// In-memory event store implementing both the writer and the reader.
///
/// # Example
///
/// ```
/// use storefront_insights_core::event::{EventKind, NewBehaviorEvent, TrackedEvent};
/// use storefront_insights_core::store::BehaviorEventWriter;
/// use storefront_insights_testing::{test_clock, InMemoryEventStore};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryEventStore::with_clock(test_clock());
/// let row = store
///     .insert(NewBehaviorEvent::from_tracked(TrackedEvent::new(EventKind::PageView, "s-1")))
///     .await
///     .unwrap();
/// assert_eq!(row.id, 1);
/// assert_eq!(store.len(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<BehaviorEvent>>>,
    viewed: Arc<RwLock<HashMap<(i64, String), DateTime<Utc>>>>,
    next_id: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
    failing: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventStore")
            .field("events", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl InMemoryEventStore {
    /// Empty store stamping rows with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store stamping rows with `clock`.
    #[must_use]
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            viewed: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            clock: Arc::new(clock),
            failing: Arc::new(RwLock::new(None)),
        }
    }

    /// Insert a row with an explicit `created_at`.
    pub fn seed(&self, event: NewBehaviorEvent, created_at: DateTime<Utc>) -> BehaviorEvent {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = event.into_event(id, Uuid::new_v4(), created_at);
        self.events.write().unwrap().push(row.clone());
        row
    }

    /// Make every subsequent operation fail with a database error.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failing.write().unwrap() = Some(reason.into());
    }

    /// All stored rows in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<BehaviorEvent> {
        self.events.read().unwrap().clone()
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().unwrap().is_empty()
    }

    /// Recently-viewed records as `(customer_id, product_id)`, sorted.
    #[must_use]
    pub fn viewed_products(&self) -> Vec<(i64, String)> {
        let mut keys: Vec<_> = self.viewed.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self) -> Result<(), StoreError> {
        match self.failing.read().unwrap().as_ref() {
            Some(reason) => Err(StoreError::Database(reason.clone())),
            None => Ok(()),
        }
    }

    fn select(&self, query: &EventQuery) -> Vec<BehaviorEvent> {
        let mut rows: Vec<BehaviorEvent> = self
            .events
            .read()
            .unwrap()
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        rows
    }
}

impl BehaviorEventWriter for InMemoryEventStore {
    fn insert(&self, event: NewBehaviorEvent) -> StoreFuture<'_, BehaviorEvent> {
        Box::pin(async move {
            self.check()?;
            Ok(self.seed(event, self.clock.now()))
        })
    }

    fn record_viewed_product(&self, customer_id: i64, product_id: String) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            if product_id.trim().is_empty() {
                return Err(StoreError::InvalidInput("empty product id".to_string()));
            }
            self.viewed
                .write()
                .unwrap()
                .insert((customer_id, product_id), self.clock.now());
            Ok(())
        })
    }
}

impl BehaviorEventReader for InMemoryEventStore {
    fn events(&self, query: EventQuery) -> StoreFuture<'_, Vec<BehaviorEvent>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.select(&query))
        })
    }

    fn session_summaries(&self, window: ReportWindow) -> StoreFuture<'_, Vec<SessionSummary>> {
        Box::pin(async move {
            self.check()?;
            let mut order: Vec<String> = Vec::new();
            let mut sessions: HashMap<String, SessionSummary> = HashMap::new();
            let mut kinds: HashMap<String, BTreeSet<String>> = HashMap::new();

            for event in self.select(&EventQuery::all(window)) {
                let summary = sessions.entry(event.session_id.clone()).or_insert_with(|| {
                    order.push(event.session_id.clone());
                    SessionSummary {
                        session_id: event.session_id.clone(),
                        first_seen: event.created_at,
                        last_seen: event.created_at,
                        event_count: 0,
                        meaningful_kinds: Vec::new(),
                        authenticated: false,
                        customer_id: None,
                    }
                });
                summary.last_seen = summary.last_seen.max(event.created_at);
                summary.event_count += 1;
                if let Some(customer_id) = event.customer_id {
                    summary.authenticated = true;
                    summary.customer_id =
                        Some(summary.customer_id.map_or(customer_id, |c| c.min(customer_id)));
                }
                if event.event_type.is_meaningful_interaction() {
                    kinds
                        .entry(event.session_id.clone())
                        .or_default()
                        .insert(event.event_type.as_str().to_string());
                }
            }

            Ok(order
                .into_iter()
                .filter_map(|id| {
                    let mut summary = sessions.remove(&id)?;
                    summary.meaningful_kinds = kinds
                        .remove(&id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(EventKind::from)
                        .collect();
                    Some(summary)
                })
                .collect())
        })
    }

    fn sessions_reaching(
        &self,
        window: ReportWindow,
        steps: Vec<EventKind>,
    ) -> StoreFuture<'_, Vec<StepReach>> {
        Box::pin(async move {
            self.check()?;
            let rows = self.select(&EventQuery::of(window, steps.iter().cloned()));
            let mut reached: BTreeMap<String, HashSet<String>> = BTreeMap::new();
            for event in rows {
                reached
                    .entry(event.event_type.as_str().to_string())
                    .or_default()
                    .insert(event.session_id);
            }
            Ok(reached
                .into_iter()
                .map(|(tag, sessions)| StepReach {
                    event_type: EventKind::from(tag),
                    sessions: sessions.len() as u64,
                })
                .collect())
        })
    }

    fn cohort_activity(&self, window: ReportWindow) -> StoreFuture<'_, Vec<CohortCell>> {
        Box::pin(async move {
            self.check()?;
            let all = self.events.read().unwrap().clone();

            let mut first_seen: HashMap<&str, DateTime<Utc>> = HashMap::new();
            for event in &all {
                first_seen
                    .entry(event.session_id.as_str())
                    .and_modify(|ts| *ts = (*ts).min(event.created_at))
                    .or_insert(event.created_at);
            }

            let mut cells: BTreeMap<(NaiveDate, NaiveDate), HashSet<&str>> = BTreeMap::new();
            for event in all.iter().filter(|e| window.contains(e.created_at)) {
                let Some(first) = first_seen.get(event.session_id.as_str()) else {
                    continue;
                };
                if !window.contains(*first) {
                    continue;
                }
                let cohort = week_start(window.local_day(*first));
                let active = week_start(window.local_day(event.created_at));
                cells
                    .entry((cohort, active))
                    .or_default()
                    .insert(event.session_id.as_str());
            }

            Ok(cells
                .into_iter()
                .map(|((cohort_week, activity_week), sessions)| CohortCell {
                    cohort_week,
                    activity_week,
                    sessions: sessions.len() as u64,
                })
                .collect())
        })
    }

    fn device_breakdown(&self, window: ReportWindow) -> StoreFuture<'_, Vec<DeviceCount>> {
        Box::pin(async move {
            self.check()?;
            // First non-null deviceInfo per session, with its event count.
            let mut sessions: Vec<String> = Vec::new();
            let mut profiles: HashMap<String, (Option<serde_json::Value>, u64)> = HashMap::new();
            for event in self.select(&EventQuery::all(window)) {
                let profile = profiles.entry(event.session_id.clone()).or_insert_with(|| {
                    sessions.push(event.session_id.clone());
                    (None, 0)
                });
                if profile.0.is_none() {
                    profile.0.clone_from(&event.device_info);
                }
                profile.1 += 1;
            }

            let mut order: Vec<String> = Vec::new();
            let mut groups: HashMap<String, DeviceCount> = HashMap::new();
            for (device_info, events) in sessions.iter().filter_map(|id| profiles.remove(id)) {
                let key = device_info
                    .as_ref()
                    .map_or_else(String::new, serde_json::Value::to_string);
                let group = groups.entry(key.clone()).or_insert_with(|| {
                    order.push(key);
                    DeviceCount {
                        device_info,
                        sessions: 0,
                        events: 0,
                    }
                });
                group.sessions += 1;
                group.events += events;
            }

            let mut rows: Vec<DeviceCount> =
                order.into_iter().filter_map(|key| groups.remove(&key)).collect();
            rows.sort_by(|a, b| b.sessions.cmp(&a.sessions));
            Ok(rows)
        })
    }

    fn page_counts(
        &self,
        window: ReportWindow,
        kinds: Vec<EventKind>,
    ) -> StoreFuture<'_, Vec<PageCount>> {
        Box::pin(async move {
            self.check()?;
            let mut groups: BTreeMap<Option<String>, (u64, HashSet<String>)> = BTreeMap::new();
            for event in self.select(&EventQuery::of(window, kinds)) {
                let group = groups.entry(event.page_url).or_default();
                group.0 += 1;
                group.1.insert(event.session_id);
            }

            let mut rows: Vec<PageCount> = groups
                .into_iter()
                .map(|(page_url, (views, sessions))| PageCount {
                    page_url,
                    views,
                    sessions: sessions.len() as u64,
                })
                .collect();
            rows.sort_by(|a, b| b.views.cmp(&a.views));
            Ok(rows)
        })
    }
}
