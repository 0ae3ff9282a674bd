//! Conversion funnel and weekly cohort retention.

use super::BehaviorAnalytics;
use crate::{observe, AnalyticsError, DECIMALS};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use storefront_insights_core::coerce::{count_f64, percentage};
use storefront_insights_core::event::EventKind;
use storefront_insights_core::time::ReportWindow;

/// Steps used when the caller names none.
pub const DEFAULT_FUNNEL: [EventKind; 4] = [
    EventKind::ProductViewed,
    EventKind::ProductAddedToCart,
    EventKind::OrderCreated,
    EventKind::PaymentCompleted,
];

/// One funnel step.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStep {
    /// 1-based position.
    pub step: usize,
    /// Event type tag.
    pub event_type: String,
    /// Distinct sessions with at least one event of this type.
    pub users: u64,
    /// `users[i-1] - users[i]`; negative when a later step is reached more often.
    pub dropoff: i64,
    /// `100 * users[i] / users[i-1]`; the first step is 100 (0 when empty).
    pub conversion_rate: f64,
}

/// A funnel over the requested steps.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Funnel {
    /// Steps in the requested order.
    pub steps: Vec<FunnelStep>,
    /// `100 * users[last] / users[first]`.
    pub overall_conversion_rate: f64,
}

/// Build funnel steps from per-step session counts.
///
/// Each step is counted independently; nothing requires a session to have
/// reached the previous step first.
#[must_use]
pub fn funnel_steps(steps: &[(EventKind, u64)]) -> Funnel {
    let mut rows = Vec::with_capacity(steps.len());
    let mut previous: Option<u64> = None;
    for (index, (kind, users)) in steps.iter().enumerate() {
        let (dropoff, conversion_rate) = match previous {
            None => (0, if *users > 0 { 100.0 } else { 0.0 }),
            Some(prev) => (
                i64::try_from(prev).unwrap_or(i64::MAX) - i64::try_from(*users).unwrap_or(i64::MAX),
                percentage(count_f64(*users), count_f64(prev), DECIMALS),
            ),
        };
        rows.push(FunnelStep {
            step: index + 1,
            event_type: kind.as_str().to_string(),
            users: *users,
            dropoff,
            conversion_rate,
        });
        previous = Some(*users);
    }

    let overall_conversion_rate = match (steps.first(), steps.last()) {
        (Some((_, first)), Some((_, last))) => {
            percentage(count_f64(*last), count_f64(*first), DECIMALS)
        },
        _ => 0.0,
    };
    Funnel {
        steps: rows,
        overall_conversion_rate,
    }
}

/// Retention of one cohort in one week.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortWeek {
    /// Weeks since the cohort week; 0 is the cohort week itself.
    pub week: i64,
    /// Cohort sessions active that week.
    pub active_sessions: u64,
    /// `100 * active / cohort size`.
    pub retention_rate: f64,
}

/// Sessions first seen in the same ISO week.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cohort {
    /// Monday of the cohort week, `YYYY-MM-DD`.
    pub cohort_week: String,
    /// Sessions in the cohort.
    pub size: u64,
    /// Activity per week offset, ascending.
    pub retention: Vec<CohortWeek>,
}

/// Weekly cohorts, oldest first.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortReport {
    /// One entry per cohort week.
    pub cohorts: Vec<Cohort>,
}

impl BehaviorAnalytics {
    /// Distinct sessions reaching each step, with drop-off and conversion.
    ///
    /// An empty `steps` uses [`DEFAULT_FUNNEL`].
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the store query fails.
    pub async fn funnel(
        &self,
        window: ReportWindow,
        steps: Vec<EventKind>,
    ) -> Result<Funnel, AnalyticsError> {
        observe("behavior.funnel", async {
            if let Some(EventKind::Unknown(tag)) =
                steps.iter().find(|kind| matches!(kind, EventKind::Unknown(_)))
            {
                return Err(AnalyticsError::InvalidParameter {
                    name: "steps",
                    reason: format!("unknown event type '{tag}'"),
                });
            }
            let steps = if steps.is_empty() {
                DEFAULT_FUNNEL.to_vec()
            } else {
                steps
            };
            let reached: HashMap<EventKind, u64> = self
                .events
                .sessions_reaching(window, steps.clone())
                .await?
                .into_iter()
                .map(|row| (row.event_type, row.sessions))
                .collect();

            let counts: Vec<(EventKind, u64)> = steps
                .into_iter()
                .map(|kind| {
                    let users = reached.get(&kind).copied().unwrap_or(0);
                    (kind, users)
                })
                .collect();
            Ok(funnel_steps(&counts))
        })
        .await
    }

    /// Weekly cohorts by first-ever session week and their retention.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the store query fails.
    pub async fn cohorts(&self, window: ReportWindow) -> Result<CohortReport, AnalyticsError> {
        observe("behavior.cohorts", async {
            let cells = self.events.cohort_activity(window).await?;

            let mut by_cohort: BTreeMap<NaiveDate, BTreeMap<i64, u64>> = BTreeMap::new();
            for cell in cells {
                let offset = (cell.activity_week - cell.cohort_week).num_days() / 7;
                if offset < 0 {
                    continue;
                }
                *by_cohort
                    .entry(cell.cohort_week)
                    .or_default()
                    .entry(offset)
                    .or_default() += cell.sessions;
            }

            let cohorts = by_cohort
                .into_iter()
                .map(|(week, activity)| {
                    let size = activity.get(&0).copied().unwrap_or(0);
                    Cohort {
                        cohort_week: week.format("%Y-%m-%d").to_string(),
                        size,
                        retention: activity
                            .into_iter()
                            .map(|(week, active)| CohortWeek {
                                week,
                                active_sessions: active,
                                retention_rate: percentage(
                                    count_f64(active),
                                    count_f64(size),
                                    DECIMALS,
                                ),
                            })
                            .collect(),
                    }
                })
                .collect();
            Ok(CohortReport { cohorts })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_follow_consecutive_steps() {
        let funnel = funnel_steps(&[
            (EventKind::ProductViewed, 100),
            (EventKind::ProductAddedToCart, 40),
            (EventKind::OrderCreated, 10),
            (EventKind::PaymentCompleted, 8),
        ]);

        let rates: Vec<f64> = funnel.steps.iter().map(|s| s.conversion_rate).collect();
        let dropoffs: Vec<i64> = funnel.steps.iter().map(|s| s.dropoff).collect();
        assert_eq!(rates, vec![100.0, 40.0, 25.0, 80.0]);
        assert_eq!(dropoffs, vec![0, 60, 30, 2]);
        assert!((funnel.overall_conversion_rate - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn independent_steps_may_grow() {
        let funnel = funnel_steps(&[(EventKind::ProductViewed, 2), (EventKind::Search, 3)]);
        assert_eq!(funnel.steps[1].dropoff, -1);
        assert!((funnel.steps[1].conversion_rate - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_first_step_is_zero() {
        let funnel = funnel_steps(&[(EventKind::ProductViewed, 0), (EventKind::OrderCreated, 0)]);
        assert!(funnel.steps[0].conversion_rate.abs() < f64::EPSILON);
        assert!(funnel.steps[1].conversion_rate.abs() < f64::EPSILON);
        assert!(funnel.overall_conversion_rate.abs() < f64::EPSILON);
    }
}
