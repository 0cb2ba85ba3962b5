//! Sweep loop: upcoming events in, reports out to every enabled sink.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::AlertEngine;
use crate::health::HealthState;
use crate::notify::{RedisStreamSink, ReportSink, TelegramSink};
use crate::report::AlertReport;
use crate::scoring::EvaluationStatus;
use crate::store::PgStore;

/// Outcome counts of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub events: usize,
    pub reports: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed_deliveries: usize,
}

pub struct AlertService {
    config: Config,
    store: PgStore,
    engine: AlertEngine,
    sinks: Vec<Box<dyn ReportSink>>,
    health: HealthState,
}

/// Whether a report should go out at all. Empty-candidate reports stay
/// internal unless explicitly requested.
pub fn should_deliver(report: &AlertReport, notify_no_candidates: bool) -> bool {
    report.status != EvaluationStatus::NoCandidates || notify_no_candidates
}

impl AlertService {
    pub async fn new(config: Config) -> Result<Self> {
        let store = PgStore::connect_with_retry(&config.database_url, 5).await?;
        let engine = AlertEngine::new(Arc::new(store.candidate_source()));

        let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();
        if config.notifications_enabled {
            if let (Some(token), Some(chat_id)) =
                (config.telegram_bot_token.clone(), config.telegram_chat_id.clone())
            {
                let sink = TelegramSink::new(token, chat_id)
                    .context("Failed to create Telegram client")?;
                sinks.push(Box::new(sink));
            } else {
                warn!("Telegram not configured (TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID)");
            }

            if let Some(url) = &config.redis_url {
                sinks.push(Box::new(RedisStreamSink::connect(url, 5).await?));
            }
        } else {
            info!("Notifications disabled (NOTIFICATIONS_ENABLED=false)");
        }

        info!(
            "Report sinks: [{}]",
            sinks.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
        );

        Ok(Self::with_parts(config, store, engine, sinks))
    }

    pub fn with_parts(
        config: Config,
        store: PgStore,
        engine: AlertEngine,
        sinks: Vec<Box<dyn ReportSink>>,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            sinks,
            health: HealthState::new(),
        }
    }

    pub fn health(&self) -> HealthState {
        self.health.clone()
    }

    pub fn store(&self) -> &PgStore {
        &self.store
    }

    /// Main sweep loop
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting alert loop (interval: {}s, window: {} min)",
            self.config.poll_interval_seconds, self.config.pre_start_window_minutes
        );

        loop {
            let start = std::time::Instant::now();

            match self.sweep_once().await {
                Ok(summary) => {
                    self.health.record_success(summary.reports).await;
                    info!(
                        "Sweep completed: {} events, {} reports, {} delivered, {} skipped in {:?}",
                        summary.events,
                        summary.reports,
                        summary.delivered,
                        summary.skipped,
                        start.elapsed()
                    );
                }
                Err(e) => {
                    self.health.record_error().await;
                    error!("Sweep failed: {:?}", e);
                }
            }

            tokio::time::sleep(Duration::from_secs(self.config.poll_interval_seconds)).await;
        }
    }

    /// Single sweep
    pub async fn sweep_once(&self) -> Result<SweepSummary> {
        if self.config.refresh_view_on_sweep {
            if let Err(e) = self.store.refresh_alert_view().await {
                // Stale candidates are still usable.
                warn!("Failed to refresh candidate view: {}", e);
            }
        }

        let now = Utc::now();
        let events = self
            .store
            .upcoming_events(now, self.config.pre_start_window_minutes)
            .await
            .context("Failed to load upcoming events")?;

        let mut summary = SweepSummary {
            events: events.len(),
            ..Default::default()
        };
        if events.is_empty() {
            info!(
                "No events starting within {} minutes",
                self.config.pre_start_window_minutes
            );
            return Ok(summary);
        }

        let reports = self.engine.evaluate_events(&events, now).await;
        summary.reports = reports.len();

        for report in &reports {
            if !should_deliver(report, self.config.notify_no_candidates) {
                summary.skipped += 1;
                continue;
            }

            if self
                .store
                .already_alerted(report.event_id, &report.rule_key)
                .await
                .context("Failed to check alert log")?
            {
                info!("Event {} already alerted, skipping", report.event_id);
                summary.skipped += 1;
                continue;
            }

            let failures = self.deliver(report).await;
            summary.failed_deliveries += failures;

            if failures < self.sinks.len() || self.sinks.is_empty() {
                self.store
                    .log_alert(report)
                    .await
                    .context("Failed to record alert")?;
                summary.delivered += 1;
            }
        }

        Ok(summary)
    }

    /// Fan a report out to every sink. Returns the number of failed sinks.
    async fn deliver(&self, report: &AlertReport) -> usize {
        let mut failures = 0;
        for sink in &self.sinks {
            match sink.deliver(report).await {
                Ok(()) => info!(
                    "Delivered {} report for event {} via {}",
                    report.status.as_str(),
                    report.event_id,
                    sink.name()
                ),
                Err(e) => {
                    failures += 1;
                    error!(
                        "Failed to deliver report for event {} via {}: {}",
                        report.event_id,
                        sink.name(),
                        e
                    );
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::UpcomingEvent;
    use crate::lookup::CandidateSets;
    use crate::scoring::evaluate;
    use crate::variation::VariationVector;

    fn report(sets: CandidateSets) -> AlertReport {
        let event = UpcomingEvent {
            id: 3,
            home_team: "A".into(),
            away_team: "B".into(),
            competition: "Cup".into(),
            sport: "Tennis".into(),
            country: None,
            start_time: Utc::now(),
            odds: None,
        };
        let q = VariationVector::two_way(0.05, -0.05);
        AlertReport::assemble(&event, &q, &sets, evaluate(&q, &sets), Utc::now())
    }

    #[test]
    fn no_candidate_reports_are_held_back_by_default() {
        let empty = report(CandidateSets::default());
        assert!(!should_deliver(&empty, false));
        assert!(should_deliver(&empty, true));
    }
}
