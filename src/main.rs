//! rival-watch binary entrypoint: one-shot run modes, the scheduler and the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rival_watch::analyze::rules::load_rules_default;
use rival_watch::api::{self, AppState};
use rival_watch::config::AppConfig;
use rival_watch::ingest::config::load_competitors_default;
use rival_watch::metrics::Metrics;
use rival_watch::scheduler::{run_scheduler, ScheduleCfg};
use rival_watch::{AlertLevel, App};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Alerts run, plus the weekly brief on Sundays.
    Full,
    Alerts,
    Weekly,
    /// Fetch only and save the raw items under `DATA_DIR`.
    Fetch,
    /// Send one synthetic alert to every configured channel.
    Test,
    Scheduler,
    Serve,
    ConfigCheck,
}

#[derive(Parser, Debug)]
#[command(name = "rival-watch", version, about = "Competitor activity alerts and weekly briefs")]
struct Cli {
    #[arg(long, value_enum, default_value_t = Mode::Full)]
    mode: Mode,

    /// Read items from a JSON fixture instead of the live providers.
    #[arg(long)]
    fixture: Option<PathBuf>,
}

/// `LOG_FORMAT=json` switches to JSON lines; `RUST_LOG` overrides the filter.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rival_watch=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("configuration")?;
    let rules = load_rules_default().context("alert rules")?;
    let competitors = load_competitors_default().context("competitors")?;

    if cli.mode == Mode::ConfigCheck {
        let compiled = rules.compile().context("alert rules")?;
        for level in AlertLevel::PRIORITY_ORDER {
            println!(
                "{:<6} patterns={} channels={:?} cadence={}",
                level.as_str(),
                compiled.pattern_count(level),
                compiled.channels_for(level),
                compiled.cadence_for(level).as_str()
            );
        }
        println!("competitors={}", competitors.len());
        for (name, on) in config.capabilities() {
            println!("{name:<10} {}", if on { "configured" } else { "off" });
        }
        return Ok(());
    }

    let app = App::from_config(config, &rules, &competitors, cli.fixture)?;
    let now = Utc::now();

    match cli.mode {
        Mode::Full | Mode::Alerts => {
            let report = if cli.mode == Mode::Full {
                app.run_full(now).await?
            } else {
                app.run_alerts(now).await?
            };
            tracing::info!(
                fetched = report.fetched,
                duplicates = report.duplicates,
                alerts = report.alerts,
                low = report.low,
                immediate = report.dispatch.immediate.len(),
                queued = report.dispatch.queued,
                "run complete"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Mode::Weekly => {
            let brief = app.run_weekly(now).await?;
            println!("{}", serde_json::to_string_pretty(&brief)?);
        }
        Mode::Fetch => {
            let (count, path) = app.run_fetch(now).await?;
            println!("saved {count} raw items to {}", path.display());
        }
        Mode::Test => {
            let report = app.send_test_alert(now).await;
            if report.deliveries.is_empty() {
                println!("no channels configured");
            }
            for (channel, outcome) in &report.deliveries {
                println!("{:<8} {}", channel.as_str(), outcome.as_str());
            }
        }
        Mode::Scheduler => {
            run_scheduler(Arc::new(app), ScheduleCfg::default()).await;
        }
        Mode::Serve => {
            let metrics = match Metrics::init() {
                Ok(m) => Some(m),
                Err(e) => {
                    tracing::warn!(error = ?e, "metrics disabled");
                    None
                }
            };
            let bind = app.config().http_bind;
            let state = AppState::new(app.pipeline().classifier().clone());
            let router = api::router(state, metrics);
            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("bind {bind}"))?;
            tracing::info!(%bind, "http api listening");
            axum::serve(listener, router).await?;
        }
        Mode::ConfigCheck => {}
    }
    Ok(())
}
