//! Sign-in, sign-out and registration activity.

use super::{payload, BehaviorAnalytics};
use crate::tally::{breakdown, Tally};
use crate::{observe, AnalyticsError, Breakdown};
use serde::Serialize;
use std::collections::HashSet;
use storefront_insights_core::event::EventKind;
use storefront_insights_core::payload::EventPayload;
use storefront_insights_core::store::EventQuery;
use storefront_insights_core::time::ReportWindow;

/// One day of auth events.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAuth {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `user_authenticated` events.
    pub logins: u64,
    /// `user_logout` events.
    pub logouts: u64,
    /// `user_registered` events.
    pub registrations: u64,
}

/// Authentication activity over a window.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthActivity {
    /// `user_authenticated` events.
    pub logins: u64,
    /// `user_logout` events.
    pub logouts: u64,
    /// `user_registered` events.
    pub registrations: u64,
    /// Distinct customer ids on auth events.
    pub unique_customers: u64,
    /// Customer accounts created in the window, per the customers table.
    pub registered_customers: u64,
    /// Logins by method (credentials, OTP, provider).
    pub login_methods: Vec<Breakdown>,
    /// Dense daily series.
    pub daily: Vec<DailyAuth>,
}

impl BehaviorAnalytics {
    /// Logins, logouts and registrations with a daily series.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if a store query fails.
    pub async fn auth_activity(&self, window: ReportWindow) -> Result<AuthActivity, AnalyticsError> {
        observe("behavior.auth_activity", async {
            let kinds = EventKind::KNOWN.into_iter().filter(EventKind::is_auth);
            let events = self.events.events(EventQuery::of(window, kinds)).await?;
            let registered_customers = self.catalog.customers_registered(window).await?;

            let mut series = window.series::<DailyAuth>();
            let mut methods: Tally<String, u64> = Tally::new();
            let mut customers = HashSet::new();
            let (mut logins, mut logouts, mut registrations) = (0, 0, 0);
            for event in &events {
                if let Some(customer_id) = event.customer_id {
                    customers.insert(customer_id);
                }
                let day = series.bucket_mut(window.local_day(event.created_at));
                match event.event_type {
                    EventKind::UserAuthenticated => {
                        logins += 1;
                        if let Some(day) = day {
                            day.logins += 1;
                        }
                        let method = match payload(event) {
                            Some(EventPayload::Auth(auth)) => auth.provider.or(auth.method),
                            _ => None,
                        };
                        *methods.entry(method.unwrap_or_else(|| "unknown".to_string())) += 1;
                    },
                    EventKind::UserLogout => {
                        logouts += 1;
                        if let Some(day) = day {
                            day.logouts += 1;
                        }
                    },
                    EventKind::UserRegistered => {
                        registrations += 1;
                        if let Some(day) = day {
                            day.registrations += 1;
                        }
                    },
                    _ => {},
                }
            }

            Ok(AuthActivity {
                logins,
                logouts,
                registrations,
                unique_customers: customers.len() as u64,
                registered_customers,
                login_methods: breakdown(methods),
                daily: series.into_points(|date, day| DailyAuth { date, ..day }),
            })
        })
        .await
    }
}
