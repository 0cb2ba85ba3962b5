//! Telegram delivery of candidate reports.

use std::fmt::Write as _;
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde_json::json;
use tracing::{error, info};

use super::ReportSink;
use crate::candidate::MatchTier;
use crate::error::NotifyError;
use crate::report::{AlertReport, CandidateEntry, RuleActivation};
use crate::scoring::EvaluationStatus;
use crate::variation::VariationVector;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram allows roughly 20 messages per minute into one group chat.
const MESSAGES_PER_MINUTE: u32 = 20;

type DirectLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

pub struct TelegramSink {
    bot_token: String,
    chat_id: String,
    http_client: reqwest::Client,
    rate_limiter: DirectLimiter,
}

impl TelegramSink {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        let per_minute = NonZeroU32::new(MESSAGES_PER_MINUTE).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            bot_token,
            chat_id,
            http_client,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    pub async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, self.bot_token);
        let response = self
            .http_client
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Telegram notification failed: {} - {}", status, body);
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("Telegram notification sent successfully");
        Ok(())
    }
}

#[async_trait]
impl ReportSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn deliver(&self, report: &AlertReport) -> Result<(), NotifyError> {
        self.send_message(&render_report(report)).await
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn header(status: EvaluationStatus) -> &'static str {
    match status {
        EvaluationStatus::Success => "✅ CANDIDATE REPORT - SUCCESS",
        EvaluationStatus::Partial => "⚠️ CANDIDATE REPORT - PARTIAL",
        EvaluationStatus::NoMatch => "❌ CANDIDATE REPORT - NO MATCH",
        EvaluationStatus::NoCandidates => "❓ CANDIDATE REPORT - NO VALID CANDIDATES",
    }
}

/// Render a report as Telegram HTML. Pure so it can be checked offline.
pub fn render_report(report: &AlertReport) -> String {
    let mut msg = String::new();

    let _ = writeln!(msg, "<b>{}</b>\n", header(report.status));

    let _ = writeln!(msg, "🏆 {}", escape(&report.participants));
    let _ = writeln!(msg, "🏟️ {} ({})", escape(&report.competition), escape(&report.sport));
    let _ = write!(msg, "⏰ Starts at {} UTC", report.start_time.format("%H:%M"));
    if report.minutes_until_start >= 0 {
        let _ = write!(msg, " (in {} minutes)", report.minutes_until_start);
    }
    msg.push_str("\n\n");

    let _ = writeln!(msg, "📈 Current Variations:\n   {}\n", report.vars_display());
    let _ = writeln!(
        msg,
        "💰 Current Odds:\n   {}\n",
        report.odds_display.as_deref().unwrap_or("Not available")
    );

    msg.push_str("🔍 Candidate Summary:\n");
    let _ = writeln!(msg, "   • Tier 1 (exact): {} candidates", report.tier1.count);
    let _ = write!(msg, "   • Tier 2 (similar): {} candidates", report.tier2.count);
    if report.non_symmetrical_excluded_count > 0 {
        let _ = write!(
            msg,
            " ({} non-symmetrical filtered out)",
            report.non_symmetrical_excluded_count
        );
    }
    msg.push('\n');
    let _ = writeln!(
        msg,
        "   • Selected tier: {}",
        report.selected_tier.map(|t| t.label()).unwrap_or("None")
    );
    let _ = writeln!(
        msg,
        "   • Successful: {}/{} candidates",
        report.successful_count, report.total_count
    );
    let _ = writeln!(msg, "   • Confidence: {}\n", report.primary_confidence());

    if !report.rule_activations.is_empty() {
        render_activations(&mut msg, &report.rule_activations);
    }

    if let Some(listing) = report.selected_listing() {
        let (icon, title) = if listing.tier == MatchTier::Exact {
            ("🎯", "Tier 1 - Exact Variations")
        } else {
            ("📊", "Tier 2 - Similar Variations")
        };
        let _ = writeln!(msg, "{} <b>{} ({}):</b>", icon, title, listing.count);
        // Offsets explain the symmetry verdict; exact matches have none.
        let query = (listing.tier == MatchTier::Similar).then_some(&report.variations);
        for (i, entry) in listing.matches.iter().enumerate() {
            render_candidate(&mut msg, i + 1, entry, query);
        }
        msg.push('\n');
    }

    match (report.primary_prediction(), report.status) {
        (Some(text), _) => {
            let _ = writeln!(msg, "🎯 <b>Primary Prediction:</b> {}\n", escape(text));
        }
        (None, EvaluationStatus::Partial) => msg.push_str(
            "⚠️ <b>Partial prediction:</b> No consistent patterns found, need at least 2 candidates\n\n",
        ),
        (None, _) => msg.push_str("❌ <b>No Prediction:</b> No consistent patterns found\n\n"),
    }

    msg.push_str("<i>Comprehensive candidate analysis completed</i>");
    msg
}

fn render_activations(msg: &mut String, activations: &[RuleActivation]) {
    msg.push_str("📋 <b>Rule Activations:</b>\n");
    for activation in activations {
        let _ = writeln!(
            msg,
            "   • Tier {} ({}): {} candidates (weight: {})",
            activation.tier.letter(),
            activation.description,
            activation.count,
            activation.weight
        );
        for candidate in &activation.candidates {
            let _ = writeln!(
                msg,
                "     - {} → {}",
                escape(&candidate.participants),
                escape(&candidate.result_text)
            );
        }
    }
    msg.push('\n');
}

fn render_candidate(
    msg: &mut String,
    position: usize,
    entry: &CandidateEntry,
    query: Option<&VariationVector>,
) {
    let marker = if entry.is_symmetrical {
        " ✅"
    } else {
        " ❌ (unsymmetrical)"
    };
    let _ = writeln!(
        msg,
        "   {}. {} → {}{}",
        position,
        escape(&entry.participants),
        escape(&entry.result_text),
        marker
    );
    let _ = writeln!(msg, "      Variations: {}", entry.variations.display());
    if let Some(query) = query {
        let _ = writeln!(msg, "      Differences: {}", entry.variations.differences_from(query));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{HistoricalCandidate, WinnerSide};
    use crate::event::UpcomingEvent;
    use crate::lookup::CandidateSets;
    use crate::scoring::evaluate;
    use crate::variation::EventOdds;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn event() -> UpcomingEvent {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();
        UpcomingEvent {
            id: 7,
            home_team: "Ajax & Co".into(),
            away_team: "PSV".into(),
            competition: "Eredivisie".into(),
            sport: "Football".into(),
            country: Some("Netherlands".into()),
            start_time: now + ChronoDuration::minutes(25),
            odds: Some(EventOdds {
                one_open: Some(1.85),
                x_open: Some(3.40),
                two_open: Some(4.20),
                one_final: Some(1.95),
                x_final: Some(3.42),
                two_final: Some(4.08),
            }),
        }
    }

    fn cand(event_id: i64, v: VariationVector, result: &str, side: WinnerSide, diff: i32) -> HistoricalCandidate {
        HistoricalCandidate {
            event_id,
            participants: format!("Team{} vs Other{}", event_id, event_id),
            result_text: result.into(),
            winner_side: side,
            point_diff: diff,
            variations: v,
            sport: "Football".into(),
        }
    }

    fn render(sets: CandidateSets) -> String {
        let q = VariationVector::three_way(0.10, 0.02, -0.12);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();
        let report = AlertReport::assemble(&event(), &q, &sets, evaluate(&q, &sets), now);
        render_report(&report)
    }

    #[test]
    fn success_message_has_all_sections() {
        let q = VariationVector::three_way(0.10, 0.02, -0.12);
        let msg = render(CandidateSets {
            tier1: vec![
                cand(1, q, "2-1", WinnerSide::Home, 1),
                cand(2, q, "2-1", WinnerSide::Home, 1),
            ],
            tier2: vec![],
        });

        assert!(msg.starts_with("<b>✅ CANDIDATE REPORT - SUCCESS</b>"));
        assert!(msg.contains("🏆 Ajax &amp; Co vs PSV"));
        assert!(msg.contains("Starts at 18:25 UTC (in 25 minutes)"));
        assert!(msg.contains("Δ1: 0.10, ΔX: 0.02, Δ2: -0.12"));
        assert!(msg.contains("1: 1.85→1.95, X: 3.40→3.42, 2: 4.20→4.08"));
        assert!(msg.contains("Selected tier: Tier 1 (exact variations)"));
        assert!(msg.contains("Successful: 2/2 candidates"));
        assert!(msg.contains("Confidence: 100.0%"));
        assert!(msg.contains("Tier A (Identical Results): 2 candidates (weight: 4)"));
        assert!(!msg.contains("Differences:"));
        assert!(msg.contains("Primary Prediction:"));
        assert!(msg.ends_with("<i>Comprehensive candidate analysis completed</i>"));
    }

    #[test]
    fn tier2_listing_marks_unsymmetrical_candidates() {
        let msg = render(CandidateSets {
            tier1: vec![],
            tier2: vec![
                cand(1, VariationVector::three_way(0.13, 0.05, -0.09), "1-0", WinnerSide::Home, 1),
                cand(2, VariationVector::three_way(0.13, 0.05, -0.16), "0-3", WinnerSide::Away, 3),
            ],
        });

        assert!(msg.contains("(1 non-symmetrical filtered out)"));
        assert!(msg.contains("Tier 2 - Similar Variations (2):"));
        assert!(msg.contains("Team1 vs Other1 → 1-0 ✅"));
        assert!(msg.contains("Team2 vs Other2 → 0-3 ❌ (unsymmetrical)"));
        assert!(msg.contains("Differences: Δ1: +0.03, ΔX: +0.03, Δ2: +0.03"));
        assert!(msg.contains("Differences: Δ1: +0.03, ΔX: +0.03, Δ2: -0.04"));
        assert!(msg.contains("Partial prediction:"));
    }

    #[test]
    fn empty_report_has_no_prediction_line() {
        let msg = render(CandidateSets::default());
        assert!(msg.starts_with("<b>❓ CANDIDATE REPORT - NO VALID CANDIDATES</b>"));
        assert!(msg.contains("Selected tier: None"));
        assert!(msg.contains("No Prediction:"));
        assert!(!msg.contains("Rule Activations"));
    }
}
