//! Upcoming events handed to the engine.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::variation::EventOdds;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingEvent {
    pub id: i64,
    pub home_team: String,
    pub away_team: String,
    pub competition: String,
    pub sport: String,
    pub country: Option<String>,
    pub start_time: DateTime<Utc>,
    pub odds: Option<EventOdds>,
}

impl UpcomingEvent {
    pub fn participants(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }

    /// Whole minutes from `now` to kick-off, rounded to nearest.
    pub fn minutes_until_start(&self, now: DateTime<Utc>) -> i64 {
        let secs = (self.start_time - now).num_seconds();
        (secs as f64 / 60.0).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn minutes_until_start_rounds() {
        let now = Utc::now();
        let event = UpcomingEvent {
            id: 1,
            home_team: "Lions".into(),
            away_team: "Tigers".into(),
            competition: "League".into(),
            sport: "Football".into(),
            country: None,
            start_time: now + Duration::seconds(29 * 60 + 40),
            odds: None,
        };
        assert_eq!(event.minutes_until_start(now), 30);
        assert_eq!(event.participants(), "Lions vs Tigers");
    }
}
