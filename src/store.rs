//! PostgreSQL access: the historical candidate index, upcoming events, the
//! alert log and the statistics behind `/status`.
//!
//! Everything here is read-mostly. Schema and ingestion are owned elsewhere.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::candidate::{CandidateQuery, CandidateRow, HistoricalCandidate, MatchTier, TIER2_TOLERANCE};
use crate::error::{LookupError, StoreError};
use crate::event::UpcomingEvent;
use crate::lookup::{collect_candidates, CandidateSource};
use crate::report::AlertReport;
use crate::variation::{EventOdds, Shape};

/// Materialized view of finished events with results and variations.
pub const ALERT_VIEW: &str = "mv_alert_events";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableCounts {
    pub events_count: i64,
    pub odds_count: i64,
    pub results_count: i64,
    pub alerts_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct UpcomingRow {
    id: i64,
    home_team: String,
    away_team: String,
    competition: String,
    sport: String,
    country: Option<String>,
    start_time: DateTime<Utc>,
    has_odds: bool,
    one_open: Option<f64>,
    x_open: Option<f64>,
    two_open: Option<f64>,
    one_final: Option<f64>,
    x_final: Option<f64>,
    two_final: Option<f64>,
}

impl From<UpcomingRow> for UpcomingEvent {
    fn from(row: UpcomingRow) -> Self {
        let odds = row.has_odds.then(|| EventOdds {
            one_open: row.one_open,
            x_open: row.x_open,
            two_open: row.two_open,
            one_final: row.one_final,
            x_final: row.x_final,
            two_final: row.two_final,
        });
        Self {
            id: row.id,
            home_team: row.home_team,
            away_team: row.away_team,
            competition: row.competition,
            sport: row.sport,
            country: row.country,
            start_time: row.start_time,
            odds,
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect_with_retry(url: &str, max_retries: u32) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await
            {
                Ok(pool) => {
                    info!("Connected to PostgreSQL");
                    return Ok(Self::new(pool));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(anyhow!(
                            "Failed to connect to database after {} attempts: {}",
                            max_retries,
                            e
                        ));
                    }
                    warn!("Database connection attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Rebuild the candidate index so results that landed since the last
    /// sweep become candidates.
    pub async fn refresh_alert_view(&self) -> Result<(), StoreError> {
        let started = std::time::Instant::now();
        sqlx::query(&format!("REFRESH MATERIALIZED VIEW {}", ALERT_VIEW))
            .execute(&self.pool)
            .await?;
        info!("Refreshed {} in {:?}", ALERT_VIEW, started.elapsed());
        Ok(())
    }

    /// Events starting in `[now, now + window_minutes]`, with their odds if any.
    pub async fn upcoming_events(
        &self,
        now: DateTime<Utc>,
        window_minutes: i64,
    ) -> Result<Vec<UpcomingEvent>, StoreError> {
        let window_end = now + chrono::Duration::minutes(window_minutes);

        let rows: Vec<UpcomingRow> = sqlx::query_as(
            r#"
            SELECT
                e.id::int8 AS id,
                e.home_team,
                e.away_team,
                e.competition,
                e.sport,
                e.country,
                (e.start_time_utc AT TIME ZONE 'UTC') AS start_time,
                (o.event_id IS NOT NULL) AS has_odds,
                o.one_open::float8 AS one_open,
                o.x_open::float8 AS x_open,
                o.two_open::float8 AS two_open,
                o.one_final::float8 AS one_final,
                o.x_final::float8 AS x_final,
                o.two_final::float8 AS two_final
            FROM events e
            LEFT JOIN event_odds o ON o.event_id = e.id
            WHERE (e.start_time_utc AT TIME ZONE 'UTC') BETWEEN $1 AND $2
            ORDER BY e.start_time_utc, e.id
            "#,
        )
        .bind(now)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await?;

        debug!("Loaded {} events starting within {} minutes", rows.len(), window_minutes);
        Ok(rows.into_iter().map(UpcomingEvent::from).collect())
    }

    pub async fn already_alerted(&self, event_id: i64, rule_key: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM alerts_log WHERE event_id = $1 AND rule_key = $2)",
        )
        .bind(log_event_id(event_id)?)
        .bind(rule_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn log_alert(&self, report: &AlertReport) -> Result<(), StoreError> {
        let event_id = log_event_id(report.event_id)?;
        let payload = serde_json::to_string(report)?;
        sqlx::query(
            r#"
            INSERT INTO alerts_log (event_id, rule_key, triggered_at, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event_id)
        .bind(&report.rule_key)
        .bind(report.generated_at.naive_utc())
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn table_counts(&self) -> Result<TableCounts, StoreError> {
        let (events_count, odds_count, results_count, alerts_count): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM events),
                    (SELECT COUNT(*) FROM event_odds),
                    (SELECT COUNT(*) FROM results),
                    (SELECT COUNT(*) FROM alerts_log)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;
        Ok(TableCounts {
            events_count,
            odds_count,
            results_count,
            alerts_count,
        })
    }

    pub fn candidate_source(&self) -> PgCandidateSource {
        PgCandidateSource {
            pool: self.pool.clone(),
        }
    }
}

/// `alerts_log.event_id` is an `INTEGER` column.
fn log_event_id(event_id: i64) -> Result<i32, StoreError> {
    i32::try_from(event_id).map_err(|_| StoreError::EventIdOutOfRange(event_id))
}

/// Candidate source over [`ALERT_VIEW`].
#[derive(Clone)]
pub struct PgCandidateSource {
    pool: PgPool,
}

/// SQL for one tier lookup. Parameters: `$1` sport, `$2` var_shape, `$3`
/// excluded ids, `$4` var_one, `$5` var_two, then `$6` tolerance (Tier 2) and
/// the draw variation last when the market is three-way.
pub fn candidate_sql(tier: MatchTier, shape: Shape) -> String {
    let cmp = |column: &str, param: usize| match tier {
        MatchTier::Exact => format!("{} = ROUND(${}::numeric, 2)", column, param),
        MatchTier::Similar => format!(
            "ABS({} - ROUND(${}::numeric, 2)) <= $6::numeric",
            column, param
        ),
    };

    let mut conditions = vec![cmp("var_one", 4), cmp("var_two", 5)];
    match shape {
        Shape::TwoWay => conditions.push("var_x IS NULL".to_string()),
        Shape::ThreeWay => {
            let draw_param = match tier {
                MatchTier::Exact => 6,
                MatchTier::Similar => 7,
            };
            conditions.push("var_x IS NOT NULL".to_string());
            conditions.push(cmp("var_x", draw_param));
        }
    }

    format!(
        r#"
        SELECT
            event_id::int8 AS event_id,
            sport,
            participants,
            result_text,
            winner_side,
            point_diff::int4 AS point_diff,
            var_one::float8 AS var_one,
            var_x::float8 AS var_x,
            var_two::float8 AS var_two
        FROM {}
        WHERE sport = $1
          AND var_shape = $2
          AND NOT (event_id::int8 = ANY($3))
          AND {}
        "#,
        ALERT_VIEW,
        conditions.join("\n          AND ")
    )
}

#[async_trait]
impl CandidateSource for PgCandidateSource {
    async fn find_tier(
        &self,
        query: &CandidateQuery<'_>,
    ) -> Result<Vec<HistoricalCandidate>, LookupError> {
        let sql = candidate_sql(query.tier, query.shape);

        let mut q = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(query.sport)
            .bind(query.shape.has_draw())
            .bind(query.exclude_ids.to_vec())
            .bind(query.vector.one)
            .bind(query.vector.two);
        if query.tier == MatchTier::Similar {
            q = q.bind(TIER2_TOLERANCE);
        }
        if let Some(x) = query.vector.x {
            q = q.bind(x);
        }

        let rows = q.fetch_all(&self.pool).await?;
        debug!(
            tier = ?query.tier,
            rows = rows.len(),
            excluded = query.exclude_ids.len(),
            "Fetched candidate rows"
        );
        Ok(collect_candidates(query, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_two_way_sql_requires_null_draw() {
        let sql = candidate_sql(MatchTier::Exact, Shape::TwoWay);
        assert!(sql.contains("var_one = ROUND($4::numeric, 2)"));
        assert!(sql.contains("var_two = ROUND($5::numeric, 2)"));
        assert!(sql.contains("var_x IS NULL"));
        assert!(!sql.contains("$6"));
    }

    #[test]
    fn similar_three_way_sql_binds_tolerance_before_draw() {
        let sql = candidate_sql(MatchTier::Similar, Shape::ThreeWay);
        assert!(sql.contains("ABS(var_one - ROUND($4::numeric, 2)) <= $6::numeric"));
        assert!(sql.contains("ABS(var_x - ROUND($7::numeric, 2)) <= $6::numeric"));
        assert!(sql.contains("var_x IS NOT NULL"));
        assert!(sql.contains("FROM mv_alert_events"));
    }

    #[test]
    fn oversized_event_ids_are_rejected_for_the_alert_log() {
        assert_eq!(log_event_id(12_345).unwrap(), 12_345);
        assert!(matches!(
            log_event_id(i64::from(i32::MAX) + 1),
            Err(StoreError::EventIdOutOfRange(id)) if id == i64::from(i32::MAX) + 1
        ));
    }

    #[test]
    fn exact_three_way_sql_uses_sixth_param_for_draw() {
        let sql = candidate_sql(MatchTier::Exact, Shape::ThreeWay);
        assert!(sql.contains("var_x = ROUND($6::numeric, 2)"));
    }
}
