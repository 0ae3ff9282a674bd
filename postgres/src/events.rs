//! The `behavior_events` store.

use crate::db_error;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use storefront_insights_core::event::{BehaviorEvent, EventKind, NewBehaviorEvent};
use storefront_insights_core::store::{
    BehaviorEventReader, BehaviorEventWriter, CohortCell, DeviceCount, EventQuery, PageCount,
    SessionSummary, StepReach, StoreError, StoreFuture,
};
use storefront_insights_core::time::ReportWindow;
use uuid::Uuid;

const EVENT_COLUMNS: &str = "id, event_id, customer_id, session_id, event_type, entity_id, \
     entity_type, page_url, referrer_url, device_info, event_data, ip_address, created_at";

#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    event_id: Uuid,
    customer_id: Option<i64>,
    session_id: String,
    event_type: String,
    entity_id: Option<String>,
    entity_type: Option<String>,
    page_url: Option<String>,
    referrer_url: Option<String>,
    device_info: Option<Value>,
    event_data: Option<Value>,
    ip_address: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for BehaviorEvent {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            event_id: row.event_id,
            customer_id: row.customer_id,
            session_id: row.session_id,
            event_type: EventKind::from(row.event_type),
            entity_id: row.entity_id,
            entity_type: row.entity_type,
            page_url: row.page_url,
            referrer_url: row.referrer_url,
            device_info: row.device_info,
            event_data: row.event_data,
            ip_address: row.ip_address,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL-backed behavior event store.
#[derive(Clone, Debug)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_error("Failed to connect"))?;
        Ok(Self::from_pool(pool))
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))
    }

    /// Round-trip a trivial query; used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database is unreachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("Ping failed"))?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn tags(kinds: &[EventKind]) -> Vec<String> {
    kinds.iter().map(|k| k.as_str().to_string()).collect()
}

#[allow(clippy::cast_sign_loss)] // COUNT(*) is never negative
const fn count(value: i64) -> u64 {
    if value < 0 { 0 } else { value as u64 }
}

impl BehaviorEventWriter for PostgresEventStore {
    fn insert(&self, event: NewBehaviorEvent) -> StoreFuture<'_, BehaviorEvent> {
        Box::pin(async move {
            let event_id = Uuid::new_v4();
            let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
                r"
                INSERT INTO behavior_events (
                    event_id, customer_id, session_id, event_type, entity_id, entity_type,
                    page_url, referrer_url, device_info, event_data, ip_address
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING id, created_at
                ",
            )
            .bind(event_id)
            .bind(event.customer_id)
            .bind(&event.session_id)
            .bind(event.event_type.as_str())
            .bind(&event.entity_id)
            .bind(&event.entity_type)
            .bind(&event.page_url)
            .bind(&event.referrer_url)
            .bind(&event.device_info)
            .bind(&event.event_data)
            .bind(&event.ip_address)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to insert behavior event"))?;

            metrics::counter!("event_store.inserted", "event_type" => event.event_type.to_string())
                .increment(1);
            tracing::debug!(id, event_type = %event.event_type, session_id = %event.session_id, "Behavior event stored");

            Ok(event.into_event(id, event_id, created_at))
        })
    }

    fn record_viewed_product(&self, customer_id: i64, product_id: String) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if product_id.trim().is_empty() {
                return Err(StoreError::InvalidInput("empty product id".to_string()));
            }
            sqlx::query(
                r"
                INSERT INTO viewed_products (customer_id, product_id, viewed_at)
                VALUES ($1, $2, now())
                ON CONFLICT (customer_id, product_id)
                DO UPDATE SET viewed_at = EXCLUDED.viewed_at
                ",
            )
            .bind(customer_id)
            .bind(product_id.trim())
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to upsert viewed product"))?;
            Ok(())
        })
    }
}

impl BehaviorEventReader for PostgresEventStore {
    fn events(&self, query: EventQuery) -> StoreFuture<'_, Vec<BehaviorEvent>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM behavior_events \
                 WHERE created_at >= $1 AND created_at < $2 \
                 AND (cardinality($3::text[]) = 0 OR event_type = ANY($3)) \
                 ORDER BY created_at, id"
            );
            let rows: Vec<EventRow> = sqlx::query_as(&sql)
                .bind(query.window.from_utc())
                .bind(query.window.to_utc())
                .bind(query.tags())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("Failed to query behavior events"))?;
            Ok(rows.into_iter().map(BehaviorEvent::from).collect())
        })
    }

    fn session_summaries(&self, window: ReportWindow) -> StoreFuture<'_, Vec<SessionSummary>> {
        Box::pin(async move {
            #[allow(clippy::type_complexity)]
            let rows: Vec<(
                String,
                DateTime<Utc>,
                DateTime<Utc>,
                i64,
                Vec<String>,
                bool,
                Option<i64>,
            )> = sqlx::query_as(
                r"
                SELECT session_id,
                       MIN(created_at),
                       MAX(created_at),
                       COUNT(*),
                       COALESCE(
                           ARRAY_AGG(DISTINCT event_type ORDER BY event_type)
                               FILTER (WHERE event_type = ANY($3)),
                           '{}'::text[]
                       ),
                       BOOL_OR(customer_id IS NOT NULL),
                       MIN(customer_id)
                FROM behavior_events
                WHERE created_at >= $1 AND created_at < $2
                GROUP BY session_id
                ORDER BY MIN(created_at), session_id
                ",
            )
            .bind(window.from_utc())
            .bind(window.to_utc())
            .bind(EventKind::meaningful_tags())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to query session summaries"))?;

            Ok(rows
                .into_iter()
                .map(
                    |(session_id, first_seen, last_seen, events, kinds, authenticated, customer_id)| {
                        SessionSummary {
                            session_id,
                            first_seen,
                            last_seen,
                            event_count: count(events),
                            meaningful_kinds: kinds.into_iter().map(EventKind::from).collect(),
                            authenticated,
                            customer_id,
                        }
                    },
                )
                .collect())
        })
    }

    fn sessions_reaching(
        &self,
        window: ReportWindow,
        steps: Vec<EventKind>,
    ) -> StoreFuture<'_, Vec<StepReach>> {
        Box::pin(async move {
            let rows: Vec<(String, i64)> = sqlx::query_as(
                r"
                SELECT event_type, COUNT(DISTINCT session_id)
                FROM behavior_events
                WHERE created_at >= $1 AND created_at < $2 AND event_type = ANY($3)
                GROUP BY event_type
                ",
            )
            .bind(window.from_utc())
            .bind(window.to_utc())
            .bind(tags(&steps))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to query funnel steps"))?;

            Ok(rows
                .into_iter()
                .map(|(event_type, sessions)| StepReach {
                    event_type: EventKind::from(event_type),
                    sessions: count(sessions),
                })
                .collect())
        })
    }

    fn cohort_activity(&self, window: ReportWindow) -> StoreFuture<'_, Vec<CohortCell>> {
        Box::pin(async move {
            let rows: Vec<(NaiveDate, NaiveDate, i64)> = sqlx::query_as(
                r"
                WITH first_seen AS (
                    SELECT session_id, MIN(created_at) AS first_at
                    FROM behavior_events
                    GROUP BY session_id
                ),
                cohort AS (
                    SELECT session_id,
                           date_trunc('week', first_at AT TIME ZONE $3)::date AS cohort_week
                    FROM first_seen
                    WHERE first_at >= $1 AND first_at < $2
                )
                SELECT c.cohort_week,
                       date_trunc('week', e.created_at AT TIME ZONE $3)::date AS activity_week,
                       COUNT(DISTINCT e.session_id)
                FROM behavior_events e
                JOIN cohort c USING (session_id)
                WHERE e.created_at >= $1 AND e.created_at < $2
                GROUP BY 1, 2
                ORDER BY 1, 2
                ",
            )
            .bind(window.from_utc())
            .bind(window.to_utc())
            .bind(window.tz().name())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to query cohort activity"))?;

            Ok(rows
                .into_iter()
                .map(|(cohort_week, activity_week, sessions)| CohortCell {
                    cohort_week,
                    activity_week,
                    sessions: count(sessions),
                })
                .collect())
        })
    }

    fn device_breakdown(&self, window: ReportWindow) -> StoreFuture<'_, Vec<DeviceCount>> {
        Box::pin(async move {
            let rows: Vec<(Option<Value>, i64, i64)> = sqlx::query_as(
                r"
                WITH profiles AS (
                    SELECT session_id,
                           COUNT(*) AS events,
                           (ARRAY_AGG(device_info ORDER BY created_at, id)
                               FILTER (WHERE device_info IS NOT NULL))[1] AS device_info
                    FROM behavior_events
                    WHERE created_at >= $1 AND created_at < $2
                    GROUP BY session_id
                )
                SELECT device_info, COUNT(*), SUM(events)::BIGINT
                FROM profiles
                GROUP BY device_info
                ORDER BY 2 DESC
                ",
            )
            .bind(window.from_utc())
            .bind(window.to_utc())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to query device breakdown"))?;

            Ok(rows
                .into_iter()
                .map(|(device_info, sessions, events)| DeviceCount {
                    device_info,
                    sessions: count(sessions),
                    events: count(events),
                })
                .collect())
        })
    }

    fn page_counts(
        &self,
        window: ReportWindow,
        kinds: Vec<EventKind>,
    ) -> StoreFuture<'_, Vec<PageCount>> {
        Box::pin(async move {
            let rows: Vec<(Option<String>, i64, i64)> = sqlx::query_as(
                r"
                SELECT page_url, COUNT(*), COUNT(DISTINCT session_id)
                FROM behavior_events
                WHERE created_at >= $1 AND created_at < $2
                  AND (cardinality($3::text[]) = 0 OR event_type = ANY($3))
                GROUP BY page_url
                ORDER BY 2 DESC, page_url
                ",
            )
            .bind(window.from_utc())
            .bind(window.to_utc())
            .bind(tags(&kinds))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to query page counts"))?;

            Ok(rows
                .into_iter()
                .map(|(page_url, views, sessions)| PageCount {
                    page_url,
                    views: count(views),
                    sessions: count(sessions),
                })
                .collect())
        })
    }
}
