//! Redis Streams publication of reports for downstream consumers.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use super::ReportSink;
use crate::error::NotifyError;
use crate::report::AlertReport;

pub const REPORT_STREAM: &str = "alerts.reports";

pub struct RedisStreamSink {
    redis: redis::aio::ConnectionManager,
}

impl RedisStreamSink {
    pub async fn connect(url: &str, max_retries: u32) -> Result<Self> {
        let redis = connect_redis_with_retry(url, max_retries).await?;
        Ok(Self { redis })
    }
}

/// Stream entry fields: a few scalar columns for filtering plus the full JSON.
pub fn stream_fields(report: &AlertReport) -> Result<Vec<(&'static str, String)>, NotifyError> {
    Ok(vec![
        ("event_id", report.event_id.to_string()),
        ("rule_key", report.rule_key.clone()),
        ("status", report.status.as_str().to_string()),
        ("confidence", format!("{:.1}", report.confidence_percent)),
        ("data", serde_json::to_string(report)?),
    ])
}

#[async_trait]
impl ReportSink for RedisStreamSink {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn deliver(&self, report: &AlertReport) -> Result<(), NotifyError> {
        let fields = stream_fields(report)?;
        let mut conn = self.redis.clone();
        let id: String = conn.xadd(REPORT_STREAM, "*", fields.as_slice()).await?;
        debug!("Published report for event {} as {}", report.event_id, id);
        Ok(())
    }
}

async fn connect_redis_with_retry(
    url: &str,
    max_retries: u32,
) -> Result<redis::aio::ConnectionManager> {
    let mut attempt = 0;
    loop {
        let result = match redis::Client::open(url) {
            Ok(client) => redis::aio::ConnectionManager::new(client).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(conn) => {
                info!("Connected to Redis");
                return Ok(conn);
            }
            Err(e) => {
                attempt += 1;
                if attempt >= max_retries {
                    return Err(anyhow!(
                        "Failed to connect to Redis after {} attempts: {}",
                        max_retries,
                        e
                    ));
                }
                warn!("Redis connection attempt {} failed: {}. Retrying...", attempt, e);
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::UpcomingEvent;
    use crate::lookup::CandidateSets;
    use crate::scoring::evaluate;
    use crate::variation::{EventOdds, VariationVector};
    use chrono::Utc;

    #[test]
    fn stream_fields_carry_status_and_payload() {
        let event = UpcomingEvent {
            id: 99,
            home_team: "A".into(),
            away_team: "B".into(),
            competition: "Open".into(),
            sport: "Tennis".into(),
            country: None,
            start_time: Utc::now(),
            odds: Some(EventOdds::default()),
        };
        let q = VariationVector::two_way(0.05, -0.05);
        let sets = CandidateSets::default();
        let report = AlertReport::assemble(&event, &q, &sets, evaluate(&q, &sets), Utc::now());

        let fields = stream_fields(&report).unwrap();
        assert_eq!(fields[0], ("event_id", "99".to_string()));
        assert_eq!(fields[2], ("status", "no_candidates".to_string()));

        let data: serde_json::Value = serde_json::from_str(&fields[4].1).unwrap();
        assert_eq!(data["rule_key"], "candidate_report_99");
        assert_eq!(data["status"], "no_candidates");
    }
}
