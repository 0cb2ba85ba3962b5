//! Configuration from the environment and mounted secrets.

use std::env;

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};

/// Configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    /// Report stream target; the Redis sink is off when unset.
    pub redis_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub poll_interval_seconds: u64,
    /// Events starting within this many minutes are evaluated.
    pub pre_start_window_minutes: i64,
    pub health_port: u16,
    /// If true, run a single sweep and exit
    pub run_once: bool,
    pub notifications_enabled: bool,
    pub notify_no_candidates: bool,
    pub refresh_view_on_sweep: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Credentials come from env vars, falling back to /run/secrets/* when
        // running under Docker secrets.
        let db_user = env::var("DB_USER").unwrap_or_else(|_| "odds".to_string());
        let db_name = env::var("DB_NAME").unwrap_or_else(|_| "odds".to_string());
        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "postgres".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());

        let database_url = match env::var("DATABASE_URL") {
            Ok(v) if !v.trim().is_empty() => v,
            Ok(_) => return Err(anyhow!("DATABASE_URL is set but empty")),
            Err(_) => {
                let db_password = match env::var("DB_PASSWORD") {
                    Ok(v) if !v.trim().is_empty() => v,
                    _ => read_secret_file("/run/secrets/db_password", "db_password")?,
                };
                format!(
                    "postgresql://{}:{}@{}:{}/{}",
                    db_user, db_password, db_host, db_port, db_name
                )
            }
        };

        let redis_url = non_empty_var("REDIS_URL");

        let telegram_bot_token = non_empty_var("TELEGRAM_BOT_TOKEN").or_else(|| {
            read_secret_file("/run/secrets/telegram_bot_token", "telegram_bot_token").ok()
        });
        let telegram_chat_id = non_empty_var("TELEGRAM_CHAT_ID");

        Ok(Self {
            database_url,
            redis_url,
            telegram_bot_token,
            telegram_chat_id,
            poll_interval_seconds: parse_var("POLL_INTERVAL_SECONDS", 300),
            pre_start_window_minutes: parse_var("PRE_START_WINDOW_MINUTES", 30),
            health_port: parse_var("HEALTH_PORT", 8000),
            run_once: flag_var("RUN_ONCE", false),
            notifications_enabled: flag_var("NOTIFICATIONS_ENABLED", true),
            notify_no_candidates: flag_var("NOTIFY_NO_CANDIDATES", false),
            refresh_view_on_sweep: flag_var("REFRESH_VIEW_ON_SWEEP", true),
        })
    }

    pub fn telegram_configured(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }

    /// Non-secret settings for `/status`.
    pub fn summary(&self) -> Value {
        json!({
            "poll_interval_seconds": self.poll_interval_seconds,
            "pre_start_window_minutes": self.pre_start_window_minutes,
            "notifications_enabled": self.notifications_enabled,
            "notify_no_candidates": self.notify_no_candidates,
            "refresh_view_on_sweep": self.refresh_view_on_sweep,
            "telegram": self.telegram_configured(),
            "redis_stream": self.redis_url.is_some(),
        })
    }
}

/// Read a secret from a Docker secret file
fn read_secret_file(file_path: &str, secret_name: &str) -> Result<String> {
    std::fs::read_to_string(file_path)
        .map(|s| s.trim().to_string())
        .context(format!(
            "Secret file not found at {} ({}). Set the variable or mount the secret.",
            file_path, secret_name
        ))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn flag_var(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => parse_flag(&v).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn unset_tunables_fall_back_to_defaults() {
        assert_eq!(parse_var("ODDS_ALERTS_TEST_UNSET_INTERVAL", 300u64), 300);
        assert!(flag_var("ODDS_ALERTS_TEST_UNSET_FLAG", true));
        assert_eq!(non_empty_var("ODDS_ALERTS_TEST_UNSET_URL"), None);
    }
}
