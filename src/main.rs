//! Odds Alerts Service
//!
//! Sweeps events starting within the pre-start window, matches their odds
//! movement against finished events and delivers candidate reports to
//! Telegram and a Redis stream.

use anyhow::Result;
use tracing::{error, info};

use odds_alerts::config::Config;
use odds_alerts::health::{self, HealthContext};
use odds_alerts::service::AlertService;

#[tokio::main]
async fn main() -> Result<()> {
    // Local runs pick up a .env file; containers use env vars and secrets.
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("odds_alerts=info".parse()?),
        )
        .init();

    info!("Odds Alerts Service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let health_port = config.health_port;
    let run_once = config.run_once;
    let config_summary = config.summary();

    let service = AlertService::new(config).await?;

    // Start health check server
    let app = health::router(HealthContext {
        health: service.health(),
        store: service.store().clone(),
        config_summary,
    });

    let health_addr = format!("0.0.0.0:{}", health_port);
    info!("Health endpoint listening on {}", health_addr);

    let listener = tokio::net::TcpListener::bind(&health_addr).await?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Health server error: {:?}", e);
        }
    });

    if run_once {
        info!("Running in one-shot mode (RUN_ONCE=true)");
        match service.sweep_once().await {
            Ok(summary) => {
                info!(
                    "One-shot sweep completed: {} events, {} reports, {} delivered",
                    summary.events, summary.reports, summary.delivered
                );
            }
            Err(e) => {
                error!("One-shot sweep failed: {:?}", e);
                return Err(e);
            }
        }
        return Ok(());
    }

    // Handle shutdown gracefully (continuous mode)
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        result = service.run() => {
            if let Err(e) = result {
                error!("Service error: {:?}", e);
            }
        }
        _ = ctrl_c => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
