//! Visitor counts and session engagement.

use super::BehaviorAnalytics;
use crate::{observe, AnalyticsError, DECIMALS};
use serde::Serialize;
use storefront_insights_core::coerce::{count_f64, percentage, ratio};
use storefront_insights_core::event::EventKind;
use storefront_insights_core::store::{EventQuery, SessionSummary};
use storefront_insights_core::time::ReportWindow;

/// Sessions shorter than this with at most one meaningful interaction bounce.
pub const BOUNCE_SECONDS: i64 = 10;

/// Whether a session had negligible engagement.
///
/// A bounce has at most one distinct meaningful interaction kind and either
/// that kind is `product_viewed`, or the session lasted under
/// [`BOUNCE_SECONDS`].
#[must_use]
pub fn is_bounce(session: &SessionSummary) -> bool {
    let kinds = &session.meaningful_kinds;
    if kinds.len() > 1 {
        return false;
    }
    kinds.first() == Some(&EventKind::ProductViewed) || session.duration_secs() < BOUNCE_SECONDS
}

/// Visitor totals.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorOverview {
    /// Sessions in the window.
    pub total_visitors: u64,
    /// Sessions with no authenticated event.
    pub new_visitors: u64,
    /// Sessions with at least one authenticated event.
    pub returning_visitors: u64,
    /// `page_view` events.
    pub page_views: u64,
    /// Dense daily series.
    pub daily: Vec<DailyVisitors>,
}

/// One day of visitors.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyVisitors {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Sessions starting that day.
    pub visitors: u64,
    /// Of those, new.
    pub new_visitors: u64,
    /// Of those, returning.
    pub returning_visitors: u64,
    /// `page_view` events that day.
    pub page_views: u64,
}

/// Session engagement.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    /// Sessions in the window.
    pub total_sessions: u64,
    /// Sessions classified as bounces.
    pub bounced_sessions: u64,
    /// Percent of sessions that bounced.
    pub bounce_rate: f64,
    /// Mean duration of sessions spanning more than one instant.
    pub average_session_seconds: f64,
    /// Mean events per session.
    pub average_events_per_session: f64,
    /// Dense daily series.
    pub daily: Vec<DailyEngagement>,
}

/// One day of engagement.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEngagement {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Sessions starting that day.
    pub sessions: u64,
    /// Percent of them that bounced.
    pub bounce_rate: f64,
    /// Mean duration of those spanning more than one instant.
    pub average_session_seconds: f64,
}

#[derive(Default)]
struct EngagementBucket {
    sessions: u64,
    bounces: u64,
    events: u64,
    timed_sessions: u64,
    seconds: i64,
}

impl EngagementBucket {
    fn add(&mut self, session: &SessionSummary) {
        self.sessions += 1;
        self.events += session.event_count;
        if is_bounce(session) {
            self.bounces += 1;
        }
        // Single-instant sessions carry no duration information.
        if session.first_seen != session.last_seen {
            self.timed_sessions += 1;
            self.seconds += session.duration_secs();
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn average_seconds(&self) -> f64 {
        ratio(self.seconds as f64, count_f64(self.timed_sessions), DECIMALS)
    }

    fn bounce_rate(&self) -> f64 {
        percentage(count_f64(self.bounces), count_f64(self.sessions), DECIMALS)
    }
}

impl BehaviorAnalytics {
    /// Visitors split into new and returning, with page views.
    ///
    /// A session is returning iff any of its events in the window carries a
    /// customer id, so `new + returning == total` for the summary and every day.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if a store query fails.
    pub async fn visitor_overview(
        &self,
        window: ReportWindow,
    ) -> Result<VisitorOverview, AnalyticsError> {
        observe("behavior.visitor_overview", async {
            let sessions = self.events.session_summaries(window).await?;
            let page_views = self
                .events
                .events(EventQuery::of(window, [EventKind::PageView]))
                .await?;

            let mut series = window.series::<DailyVisitors>();
            let (mut new_visitors, mut returning_visitors) = (0, 0);
            for session in &sessions {
                let bucket = series.bucket_mut(window.local_day(session.first_seen));
                if session.authenticated {
                    returning_visitors += 1;
                } else {
                    new_visitors += 1;
                }
                if let Some(day) = bucket {
                    day.visitors += 1;
                    if session.authenticated {
                        day.returning_visitors += 1;
                    } else {
                        day.new_visitors += 1;
                    }
                }
            }
            for event in &page_views {
                if let Some(day) = series.bucket_mut(window.local_day(event.created_at)) {
                    day.page_views += 1;
                }
            }

            Ok(VisitorOverview {
                total_visitors: sessions.len() as u64,
                new_visitors,
                returning_visitors,
                page_views: page_views.len() as u64,
                daily: series.into_points(|date, day| DailyVisitors { date, ..day }),
            })
        })
        .await
    }

    /// Bounce rate, session duration and depth.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the store query fails.
    pub async fn engagement(&self, window: ReportWindow) -> Result<Engagement, AnalyticsError> {
        observe("behavior.engagement", async {
            let sessions = self.events.session_summaries(window).await?;

            let mut total = EngagementBucket::default();
            let mut series = window.series::<EngagementBucket>();
            for session in &sessions {
                total.add(session);
                if let Some(day) = series.bucket_mut(window.local_day(session.first_seen)) {
                    day.add(session);
                }
            }

            Ok(Engagement {
                total_sessions: total.sessions,
                bounced_sessions: total.bounces,
                bounce_rate: total.bounce_rate(),
                average_session_seconds: total.average_seconds(),
                average_events_per_session: ratio(
                    count_f64(total.events),
                    count_f64(total.sessions),
                    DECIMALS,
                ),
                daily: series.into_points(|date, day| DailyEngagement {
                    date,
                    sessions: day.sessions,
                    bounce_rate: day.bounce_rate(),
                    average_session_seconds: day.average_seconds(),
                }),
            })
        })
        .await
    }
}
