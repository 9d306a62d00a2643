use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::Parser;
use daytrader::config::EngineSettings;
use daytrader::execution::RecordingGateway;
use daytrader::indicators::atr_info_from_daily;
use daytrader::models::plan::load_plans;
use daytrader::replay::{synthetic_plan, ReplayRunner, SessionScenario, SyntheticSessionGenerator};
use daytrader::session::Session;
use daytrader::strategy::TracingAdvisor;

const PREMARKET_MINUTES: usize = 60;
const DAILY_BARS: usize = 30;
const ATR_PERIOD: usize = 14;

/// Replays a seeded synthetic session through the decision engine
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Trading plan JSON (array of plans); the first plan's symbol is replayed
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Engine settings file (TOML/JSON/YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed for the synthetic session
    #[arg(long, default_value = "42")]
    seed: u64,

    #[arg(long, value_enum, default_value = "drive-up")]
    scenario: SessionScenario,

    /// Session minutes to generate
    #[arg(long, default_value = "120")]
    minutes: usize,

    /// Base price when no plan is given
    #[arg(long, default_value = "50.0")]
    base_price: f64,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    tracing::info!("🚀 daytrader replay starting: {} scenario, seed {}", args.scenario, args.seed);

    let settings = EngineSettings::load(args.config.as_deref()).context("loading engine settings")?;

    let market_open = Utc
        .with_ymd_and_hms(2024, 3, 1, 14, 30, 0)
        .single()
        .context("invalid market open")?;

    let plans = match &args.plan {
        Some(path) => load_plans(path).with_context(|| format!("loading plans from {}", path.display()))?,
        None => {
            // Synthetic plans take their ATR from a synthetic daily history
            let mut plan = synthetic_plan("SYNTH", args.base_price);
            let daily = SyntheticSessionGenerator::new(args.seed, "SYNTH", args.base_price)
                .generate_daily(DAILY_BARS, market_open);
            if let Some(atr) = atr_info_from_daily(&daily, ATR_PERIOD) {
                plan.atr = atr;
            }
            vec![plan]
        }
    };
    let plan = plans.first().context("plan file holds no plans")?.clone();
    // Synthetic sessions trade just under the key level
    let base_price = plan.key_level.mid() / 1.006;

    tracing::info!("📊 Configuration:");
    tracing::info!("  Symbol: {}", plan.symbol);
    tracing::info!("  Key level: {:.2}-{:.2}", plan.key_level.low, plan.key_level.high);
    tracing::info!("  ATR: {:.2}", plan.atr.average);
    tracing::info!("  Dry run: {}", settings.dry_run);

    let candles = SyntheticSessionGenerator::new(args.seed, &plan.symbol, base_price).generate(
        args.scenario,
        market_open,
        PREMARKET_MINUTES,
        args.minutes,
    );

    let mut runner = ReplayRunner::new(&plan.symbol, market_open, plan.atr);
    let mut session = Session::new(settings, plans, RecordingGateway::new(), TracingAdvisor)?;
    let report = runner
        .run(&mut session, &candles)
        .map_err(|e| anyhow::anyhow!("replay failed: {}", e))?;

    tracing::info!("✅ Replay complete: {} session candles", report.session_candles);
    for t in &report.transitions {
        tracing::info!("  {} {} {} -> {}", t.timestamp.format("%H:%M"), t.tradebook_id, t.from, t.to);
    }
    if let Some(ordering) = session.ordering(&plan.symbol) {
        tracing::info!("  Final ordering: {}", ordering);
    }
    for book in session.registry().for_symbol(&plan.symbol) {
        tracing::info!("  {}", book.live_stats());
    }

    let entries = &session.gateway().submitted;
    tracing::info!("📝 {} entry instruction(s)", entries.len());
    for entry in entries {
        tracing::info!(
            "  {} {} {} size {:.2} @ {:.2} stop {:.2} targets {:?}",
            entry.tradebook_id,
            if entry.dry_run { "dry-run" } else { "live" },
            entry.id,
            entry.size,
            entry.price,
            entry.stop_price,
            entry.target_prices
        );
    }

    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("daytrader=info")),
        )
        .init();
}
