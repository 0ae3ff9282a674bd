//! PC-build configurator insights.

use super::{payload, BehaviorAnalytics};
use crate::tally::{breakdown, rank_desc, Tally};
use crate::text::{WordCloud, WordCloudBuilder};
use crate::{observe, AnalyticsError, Breakdown, DECIMALS};
use serde::Serialize;
use std::collections::HashSet;
use storefront_insights_core::coerce::{count_f64, percentage, ratio};
use storefront_insights_core::event::EventKind;
use storefront_insights_core::payload::{EventPayload, PcComponentPayload};
use storefront_insights_core::store::EventQuery;
use storefront_insights_core::time::ReportWindow;

/// A component and how often builders chose it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularComponent {
    /// Product id.
    pub product_id: String,
    /// Name seen on the events.
    pub product_name: Option<String>,
    /// CPU, GPU, RAM, ...
    pub component_type: String,
    /// Manual selections plus appearances in carted builds.
    pub selections: u64,
}

/// One day of configurator activity.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPcBuild {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Free-text build requests.
    pub auto_requests: u64,
    /// Manual component selections.
    pub manual_selections: u64,
    /// Builds added to the cart.
    pub add_to_cart: u64,
}

/// Configurator usage over a window.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcBuildInsights {
    /// `auto_build_pc_request` events.
    pub auto_requests: u64,
    /// `manual_build_pc_component_select` events.
    pub manual_selections: u64,
    /// `manual_build_pc_component_remove` events.
    pub manual_removals: u64,
    /// `auto_build_pc_add_to_cart` events.
    pub auto_add_to_cart: u64,
    /// `manual_build_pc_add_to_cart` events.
    pub manual_add_to_cart: u64,
    /// Sessions with any configurator event.
    pub build_sessions: u64,
    /// Of those, sessions that carted a build.
    pub converted_sessions: u64,
    /// `100 * converted / build sessions`.
    pub build_conversion_rate: f64,
    /// Mean total of carted builds.
    pub average_build_value: f64,
    /// Most chosen components.
    pub popular_components: Vec<PopularComponent>,
    /// Selections per component type.
    pub component_types: Vec<Breakdown>,
    /// Terms mined from free-text requests.
    pub word_cloud: WordCloud,
    /// Dense daily series.
    pub daily: Vec<DailyPcBuild>,
}

#[derive(Default)]
struct ComponentTally {
    name: Option<String>,
    component_type: String,
    selections: u64,
}

fn count_component(
    components: &mut Tally<String, ComponentTally>,
    types: &mut Tally<String, u64>,
    component: PcComponentPayload,
) {
    *types.entry(component.component_type.clone()) += 1;
    let Some(product_id) = component.product_id else {
        return;
    };
    let tally = components.entry(product_id);
    tally.selections += 1;
    if tally.name.is_none() {
        tally.name = component.product_name;
    }
    if tally.component_type.is_empty() {
        tally.component_type = component.component_type;
    }
}

impl BehaviorAnalytics {
    /// Automatic and manual build activity, popular parts and request wording.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Store`] if the store query fails.
    pub async fn pc_build_insights(
        &self,
        window: ReportWindow,
        limit: usize,
    ) -> Result<PcBuildInsights, AnalyticsError> {
        observe("behavior.pc_build_insights", async {
            let kinds = EventKind::KNOWN.into_iter().filter(EventKind::is_pc_build);
            let events = self.events.events(EventQuery::of(window, kinds)).await?;

            let mut series = window.series::<DailyPcBuild>();
            let mut words = WordCloudBuilder::new();
            let mut components: Tally<String, ComponentTally> = Tally::new();
            let mut types: Tally<String, u64> = Tally::new();
            let mut sessions: HashSet<&str> = HashSet::new();
            let mut converted: HashSet<&str> = HashSet::new();
            let (mut auto_requests, mut selections, mut removals) = (0, 0, 0);
            let (mut auto_cart, mut manual_cart) = (0, 0);
            let mut build_value = 0.0;

            for event in &events {
                sessions.insert(event.session_id.as_str());
                let mut day = series.bucket_mut(window.local_day(event.created_at));
                match event.event_type {
                    EventKind::AutoBuildPcRequest => {
                        auto_requests += 1;
                        if let Some(day) = day.as_deref_mut() {
                            day.auto_requests += 1;
                        }
                        if let Some(EventPayload::PcBuildRequest(request)) = payload(event) {
                            if let Some(text) = request.user_input {
                                words.add(&text);
                            }
                        }
                    },
                    EventKind::ManualBuildPcComponentSelect => {
                        selections += 1;
                        if let Some(day) = day.as_deref_mut() {
                            day.manual_selections += 1;
                        }
                        if let Some(EventPayload::PcComponent(component)) = payload(event) {
                            count_component(&mut components, &mut types, component);
                        }
                    },
                    EventKind::ManualBuildPcComponentRemove => removals += 1,
                    EventKind::AutoBuildPcAddToCart | EventKind::ManualBuildPcAddToCart => {
                        if event.event_type == EventKind::AutoBuildPcAddToCart {
                            auto_cart += 1;
                        } else {
                            manual_cart += 1;
                        }
                        converted.insert(event.session_id.as_str());
                        if let Some(day) = day.as_deref_mut() {
                            day.add_to_cart += 1;
                        }
                        if let Some(EventPayload::PcBuildCart(cart)) = payload(event) {
                            build_value += cart.total_price;
                            for component in cart.components {
                                count_component(&mut components, &mut types, component);
                            }
                        }
                    },
                    _ => {},
                }
            }

            let mut popular: Vec<PopularComponent> = components
                .into_vec()
                .into_iter()
                .map(|(product_id, tally)| PopularComponent {
                    product_id,
                    product_name: tally.name,
                    component_type: tally.component_type,
                    selections: tally.selections,
                })
                .collect();
            rank_desc(&mut popular, limit, |row| count_f64(row.selections));

            let build_sessions = sessions.len() as u64;
            let converted_sessions = converted.len() as u64;
            Ok(PcBuildInsights {
                auto_requests,
                manual_selections: selections,
                manual_removals: removals,
                auto_add_to_cart: auto_cart,
                manual_add_to_cart: manual_cart,
                build_sessions,
                converted_sessions,
                build_conversion_rate: percentage(
                    count_f64(converted_sessions),
                    count_f64(build_sessions),
                    DECIMALS,
                ),
                average_build_value: ratio(build_value, count_f64(auto_cart + manual_cart), DECIMALS),
                popular_components: popular,
                component_types: breakdown(types),
                word_cloud: words.finish(limit),
                daily: series.into_points(|date, day| DailyPcBuild { date, ..day }),
            })
        })
        .await
    }
}
