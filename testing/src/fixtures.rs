//! Event and time fixtures.

#![allow(clippy::unwrap_used)] // Fixtures use hardcoded, valid dates
#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use storefront_insights_core::event::{EventKind, NewBehaviorEvent, TrackedEvent};
use storefront_insights_core::time::ReportWindow;

/// A bare behavior event of `kind` in `session`.
#[must_use]
pub fn behavior(kind: EventKind, session: &str) -> NewBehaviorEvent {
    NewBehaviorEvent::from_tracked(TrackedEvent::new(kind, session))
}

/// A bare tracking envelope of `kind` in `session`.
#[must_use]
pub fn tracked(kind: EventKind, session: &str) -> TrackedEvent {
    TrackedEvent::new(kind, session)
}

/// Builder-style setters for fixture events.
pub trait BehaviorEventFixture: Sized {
    /// Set the customer id.
    #[must_use]
    fn customer(self, customer_id: i64) -> Self;
    /// Set the page URL.
    #[must_use]
    fn page(self, url: &str) -> Self;
    /// Set `eventData`.
    #[must_use]
    fn data(self, data: Value) -> Self;
    /// Set `deviceInfo`.
    #[must_use]
    fn device(self, device_info: Value) -> Self;
    /// Set the entity id.
    #[must_use]
    fn entity(self, entity_id: &str) -> Self;
}

impl BehaviorEventFixture for NewBehaviorEvent {
    fn customer(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    fn page(mut self, url: &str) -> Self {
        self.page_url = Some(url.to_string());
        self
    }

    fn data(mut self, data: Value) -> Self {
        self.event_data = Some(data);
        self
    }

    fn device(mut self, device_info: Value) -> Self {
        self.device_info = Some(device_info);
        self
    }

    fn entity(mut self, entity_id: &str) -> Self {
        self.entity_id = Some(entity_id.to_string());
        self
    }
}

impl BehaviorEventFixture for TrackedEvent {
    fn customer(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    fn page(mut self, url: &str) -> Self {
        self.page_url = Some(url.to_string());
        self
    }

    fn data(mut self, data: Value) -> Self {
        self.event_data = Some(data);
        self
    }

    fn device(mut self, device_info: Value) -> Self {
        self.device_info = Some(device_info);
        self
    }

    fn entity(mut self, entity_id: &str) -> Self {
        self.entity_id = Some(entity_id.to_string());
        self
    }
}

/// A UTC instant.
#[must_use]
pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec).unwrap()
}

/// A calendar date.
#[must_use]
pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A UTC report window over `[start, end)`.
#[must_use]
pub fn window(start: NaiveDate, end: NaiveDate) -> ReportWindow {
    ReportWindow::utc(start, end).unwrap()
}
