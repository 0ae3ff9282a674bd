//! Devices, pages and navigation paths.

use super::BehaviorAnalytics;
use crate::tally::{breakdown, rank_desc, Tally};
use crate::{observe, AnalyticsError, Breakdown, DECIMALS};
use serde::Serialize;
use storefront_insights_core::coerce::{count_f64, percentage, ratio};
use storefront_insights_core::event::EventKind;
use storefront_insights_core::store::EventQuery;
use storefront_insights_core::time::ReportWindow;

/// Journeys longer than this are cut after this many steps.
pub const MAX_JOURNEY_STEPS: usize = 6;

/// Sessions by device type, operating system and browser.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBreakdown {
    /// Sum of sessions over all device groups.
    pub total_sessions: u64,
    /// Desktop, mobile, tablet.
    pub device_types: Vec<Breakdown>,
    /// OS families.
    pub operating_systems: Vec<Breakdown>,
    /// Browser families.
    pub browsers: Vec<Breakdown>,
}

/// Views of one page category.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryViews {
    /// Category label.
    pub category: String,
    /// Page views.
    pub views: u64,
    /// Distinct URLs.
    pub pages: u64,
    /// Percent of all page views.
    pub share: f64,
}

/// Views of one URL.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStats {
    /// URL as recorded.
    pub page_url: String,
    /// Category label.
    pub category: String,
    /// Page views.
    pub views: u64,
    /// Distinct sessions.
    pub sessions: u64,
}

/// Page view distribution.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePerformance {
    /// `page_view` events.
    pub total_views: u64,
    /// Views per category, most viewed first.
    pub categories: Vec<CategoryViews>,
    /// Most viewed URLs.
    pub top_pages: Vec<PageStats>,
}

/// A navigation path shared by several sessions.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyPath {
    /// Page categories in visit order.
    pub path: Vec<String>,
    /// Sessions that followed it.
    pub sessions: u64,
    /// Percent of sessions with a journey.
    pub share: f64,
}

/// How sessions move between page categories.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJourneys {
    /// Sessions with at least one page.
    pub total_sessions: u64,
    /// Mean steps per journey, after collapsing and capping.
    pub average_path_length: f64,
    /// Most common paths.
    pub top_paths: Vec<JourneyPath>,
    /// Category of each session's first page.
    pub entry_pages: Vec<Breakdown>,
    /// Category of each session's last page.
    pub exit_pages: Vec<Breakdown>,
}

/// Collapse consecutive repeats and cap at [`MAX_JOURNEY_STEPS`].
#[must_use]
pub fn journey_path<I, S>(steps: I) -> Vec<S>
where
    I: IntoIterator<Item = S>,
    S: PartialEq,
{
    let mut path: Vec<S> = Vec::new();
    for step in steps {
        if path.last() == Some(&step) {
            continue;
        }
        if path.len() == MAX_JOURNEY_STEPS {
            break;
        }
        path.push(step);
    }
    path
}

impl BehaviorAnalytics {
    /// Sessions grouped by classified `deviceInfo`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the store query fails.
    pub async fn device_breakdown(
        &self,
        window: ReportWindow,
    ) -> Result<DeviceBreakdown, AnalyticsError> {
        observe("behavior.device_breakdown", async {
            let groups = self.events.device_breakdown(window).await?;

            let mut device_types: Tally<String, u64> = Tally::new();
            let mut systems: Tally<String, u64> = Tally::new();
            let mut browsers: Tally<String, u64> = Tally::new();
            let mut total = 0;
            for group in &groups {
                let profile = self.devices.classify_device(group.device_info.as_ref());
                total += group.sessions;
                *device_types.entry(profile.device_type.label().to_string()) += group.sessions;
                *systems.entry(profile.os.label().to_string()) += group.sessions;
                *browsers.entry(profile.browser.label().to_string()) += group.sessions;
            }

            Ok(DeviceBreakdown {
                total_sessions: total,
                device_types: breakdown(device_types),
                operating_systems: breakdown(systems),
                browsers: breakdown(browsers),
            })
        })
        .await
    }

    /// Page views per category and the most viewed URLs.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the store query fails.
    pub async fn page_performance(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<PagePerformance, AnalyticsError> {
        observe("behavior.page_performance", async {
            let pages = self
                .events
                .page_counts(window, vec![EventKind::PageView])
                .await?;

            let mut categories: Tally<String, (u64, u64)> = Tally::new();
            let mut top_pages = Vec::new();
            let mut total = 0;
            for page in pages {
                let category = self.pages.classify_page(page.page_url.as_deref()).label();
                total += page.views;
                let (views, urls) = categories.entry(category.to_string());
                *views += page.views;
                *urls += 1;
                if let Some(page_url) = page.page_url {
                    top_pages.push(PageStats {
                        page_url,
                        category: category.to_string(),
                        views: page.views,
                        sessions: page.sessions,
                    });
                }
            }
            rank_desc(&mut top_pages, limit, |row| count_f64(row.views));

            let mut categories: Vec<CategoryViews> = categories
                .into_vec()
                .into_iter()
                .map(|(category, (views, pages))| CategoryViews {
                    category,
                    views,
                    pages,
                    share: percentage(count_f64(views), count_f64(total), DECIMALS),
                })
                .collect();
            rank_desc(&mut categories, usize::MAX, |row| count_f64(row.views));

            Ok(PagePerformance {
                total_views: total,
                categories,
                top_pages,
            })
        })
        .await
    }

    /// Per-session paths through page categories.
    ///
    /// Every event with a page URL is a step; consecutive visits to the same
    /// category collapse into one.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the store query fails.
    pub async fn user_journeys(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<UserJourneys, AnalyticsError> {
        observe("behavior.user_journeys", async {
            let events = self.events.events(EventQuery::all(window)).await?;

            let mut visits: Tally<String, Vec<&'static str>> = Tally::new();
            for event in &events {
                let Some(url) = event.page_url.as_deref().filter(|u| !u.trim().is_empty()) else {
                    continue;
                };
                visits
                    .entry(event.session_id.clone())
                    .push(self.pages.classify_page(Some(url)).label());
            }

            let mut paths: Tally<Vec<&'static str>, u64> = Tally::new();
            let mut entries: Tally<String, u64> = Tally::new();
            let mut exits: Tally<String, u64> = Tally::new();
            let (mut sessions, mut steps) = (0_u64, 0_u64);
            for (_, visited) in visits.into_vec() {
                let path = journey_path(visited.iter().copied());
                let (Some(first), Some(last)) = (visited.first(), visited.last()) else {
                    continue;
                };
                *entries.entry((*first).to_string()) += 1;
                *exits.entry((*last).to_string()) += 1;
                sessions += 1;
                steps += path.len() as u64;
                *paths.entry(path) += 1;
            }

            let mut top_paths: Vec<JourneyPath> = paths
                .into_vec()
                .into_iter()
                .map(|(path, count)| JourneyPath {
                    path: path.into_iter().map(str::to_string).collect(),
                    sessions: count,
                    share: percentage(count_f64(count), count_f64(sessions), DECIMALS),
                })
                .collect();
            rank_desc(&mut top_paths, limit, |row| count_f64(row.sessions));

            let mut entry_pages = breakdown(entries);
            entry_pages.truncate(limit);
            let mut exit_pages = breakdown(exits);
            exit_pages.truncate(limit);

            Ok(UserJourneys {
                total_sessions: sessions,
                average_path_length: ratio(count_f64(steps), count_f64(sessions), DECIMALS),
                top_paths,
                entry_pages,
                exit_pages,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_repeats_collapse() {
        let path = journey_path(["Homepage", "Product", "Product", "Cart", "Product"]);
        assert_eq!(path, vec!["Homepage", "Product", "Cart", "Product"]);
    }

    #[test]
    fn paths_are_capped() {
        let path = journey_path(["A", "B", "A", "B", "A", "B", "A", "B"]);
        assert_eq!(path.len(), MAX_JOURNEY_STEPS);
    }
}
