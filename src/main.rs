use anyhow::Result;
use i94etl::{run, Config};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config_path = Config::default_path();
    let config = Config::load(&config_path)?;
    info!(path = %config_path.display(), "loaded config");

    // ─── 3) immigration, then demographics ───────────────────────────
    let start = Instant::now();
    let summary = run(&config)?;

    info!(
        immigration_rows = summary.immigration.rows,
        arrival_dates = summary.arrival_dates.rows,
        demographics_rows = summary.demographics.rows,
        elapsed = ?start.elapsed(),
        "all done"
    );
    Ok(())
}
