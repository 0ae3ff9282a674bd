//! Catalog search insights.

use super::{payload, BehaviorAnalytics};
use crate::tally::{rank_desc, Tally};
use crate::{observe, AnalyticsError, DECIMALS};
use serde::Serialize;
use storefront_insights_core::coerce::{count_f64, percentage, ratio};
use storefront_insights_core::event::EventKind;
use storefront_insights_core::payload::EventPayload;
use storefront_insights_core::store::EventQuery;
use storefront_insights_core::time::{DatedCount, ReportWindow};

/// A normalized query and how it performed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    /// Trimmed, lowercased query.
    pub query: String,
    /// Times searched.
    pub count: u64,
    /// Mean results shown.
    pub average_results: f64,
}

/// Search behavior over a window.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchInsights {
    /// `search` events with a non-blank query.
    pub total_searches: u64,
    /// Distinct normalized queries.
    pub unique_queries: u64,
    /// Mean results per search.
    pub average_results: f64,
    /// Searches that returned nothing.
    pub zero_result_searches: u64,
    /// `100 * zero-result / total`.
    pub zero_result_rate: f64,
    /// Most frequent queries.
    pub top_queries: Vec<QueryStats>,
    /// Most frequent queries that returned nothing.
    pub zero_result_queries: Vec<QueryStats>,
    /// Searches per day.
    pub daily: Vec<DatedCount>,
}

#[derive(Default)]
struct QueryTally {
    count: u64,
    results: u64,
    zero: u64,
}

impl BehaviorAnalytics {
    /// Query volume, top queries and queries that found nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the store query fails.
    pub async fn search_insights(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<SearchInsights, AnalyticsError> {
        observe("behavior.search_insights", async {
            let events = self
                .events
                .events(EventQuery::of(window, [EventKind::Search]))
                .await?;

            let mut queries: Tally<String, QueryTally> = Tally::new();
            let mut series = window.series::<u64>();
            let (mut total, mut results, mut zero) = (0_u64, 0_u64, 0_u64);
            for event in &events {
                let Some(EventPayload::Search(search)) = payload(event) else {
                    continue;
                };
                let query = search.query.trim().to_lowercase();
                if query.is_empty() {
                    continue;
                }
                total += 1;
                results += search.results_count;
                let tally = queries.entry(query);
                tally.count += 1;
                tally.results += search.results_count;
                if search.results_count == 0 {
                    zero += 1;
                    tally.zero += 1;
                }
                if let Some(day) = series.bucket_mut(window.local_day(event.created_at)) {
                    *day += 1;
                }
            }

            let unique_queries = queries.len() as u64;
            let entries = queries.into_vec();
            let stats = |query: &String, tally: &QueryTally| QueryStats {
                query: query.clone(),
                count: tally.count,
                average_results: ratio(count_f64(tally.results), count_f64(tally.count), DECIMALS),
            };

            let mut top_queries: Vec<QueryStats> =
                entries.iter().map(|(query, tally)| stats(query, tally)).collect();
            rank_desc(&mut top_queries, limit, |row| count_f64(row.count));

            let mut zero_result_queries: Vec<QueryStats> = entries
                .iter()
                .filter(|(_, tally)| tally.zero > 0)
                .map(|(query, tally)| QueryStats {
                    count: tally.zero,
                    ..stats(query, tally)
                })
                .collect();
            rank_desc(&mut zero_result_queries, limit, |row| count_f64(row.count));

            Ok(SearchInsights {
                total_searches: total,
                unique_queries,
                average_results: ratio(count_f64(results), count_f64(total), DECIMALS),
                zero_result_searches: zero,
                zero_result_rate: percentage(count_f64(zero), count_f64(total), DECIMALS),
                top_queries,
                zero_result_queries,
                daily: series.into_points(|date, count| DatedCount { date, count }),
            })
        })
        .await
    }
}
