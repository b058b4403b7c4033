//! Roundhouse command line
//!
//! `simulate` measures the return of a game's generator over seeded rounds,
//! `live` plays crash rounds in real time against an in-memory ledger.

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use roundhouse::{
    config::CrashConfig,
    errors::EngineResult,
    games::{Difficulty, RiskLevel, SegmentCount},
    ledger::InMemoryLedger,
    round::{drive_rounds, CrashRoundMachine},
    simulation::{SimulationConfig, Simulator},
    ConfigLoader, EngineConfig, GameType, Money, RoundEvent, Wallet,
};
use serde::de::DeserializeOwned;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{sync::broadcast, time::Instant};
use tracing::{info, warn};

/// Roundhouse round engine CLI
#[derive(Parser)]
#[command(name = "roundhouse")]
#[command(about = "Round-resolution engine for short games of chance")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure a game's return to player
    Simulate {
        /// crash, dino, mines, pump, wheel, roulette, cases or upgrader
        #[arg(short, long, default_value = "crash", value_parser = parse_lowercase::<GameType>)]
        game: GameType,

        #[arg(short, long, default_value = "100000")]
        rounds: u64,

        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Stake per round
        #[arg(long, default_value = "1.00")]
        stake: f64,

        /// Crash auto-collect target
        #[arg(long, default_value = "2.0")]
        target: f64,

        #[arg(long, default_value = "5")]
        mines: usize,

        /// Safe reveals before cashing out
        #[arg(long, default_value = "3")]
        picks: usize,

        #[arg(long, default_value = "medium", value_parser = parse_lowercase::<Difficulty>)]
        difficulty: Difficulty,

        /// Pumps before cashing out
        #[arg(long, default_value = "3")]
        steps: usize,

        #[arg(long, default_value = "medium", value_parser = parse_lowercase::<RiskLevel>)]
        risk: RiskLevel,

        #[arg(long, default_value = "30", value_parser = parse_segments)]
        segments: SegmentCount,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play crash rounds in real time
    Live {
        #[arg(short = 'n', long, default_value = "3")]
        cycles: u64,

        /// Opening balance
        #[arg(short, long, default_value = "100.00")]
        balance: f64,

        #[arg(short, long, default_value = "1.00")]
        stake: f64,

        /// Auto-collect target
        #[arg(short, long)]
        auto: Option<f64>,

        /// Use the runner variant timings
        #[arg(long)]
        dino: bool,

        /// Shortened phases
        #[arg(long)]
        fast: bool,
    },

    /// Write the default configuration to a file
    InitConfig {
        #[arg(short, long, default_value = "roundhouse.toml")]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> EngineResult<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let config = loader.load()?;

    let default_filter = if cli.verbose {
        "roundhouse=debug".to_string()
    } else {
        config.monitoring.log_filter.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Simulate {
            game,
            rounds,
            seed,
            stake,
            target,
            mines,
            picks,
            difficulty,
            steps,
            risk,
            segments,
            json,
        } => {
            let sim = SimulationConfig {
                game,
                rounds,
                seed,
                stake: Money::from_decimal(stake),
                crash_target: target,
                mines,
                picks,
                difficulty,
                pump_steps: steps,
                risk,
                segments,
                ..SimulationConfig::for_game(game)
            };
            run_simulation(config, &sim, json)
        }
        Commands::Live {
            cycles,
            balance,
            stake,
            auto,
            dino,
            fast,
        } => {
            let mut config = if fast { EngineConfig::fast() } else { config };
            let game = if dino {
                config.crash = CrashConfig {
                    rtp: config.crash.rtp,
                    ..CrashConfig::dino()
                };
                GameType::Dino
            } else {
                GameType::Crash
            };
            run_live(config, game, cycles, Money::from_decimal(balance), Money::from_decimal(stake), auto).await
        }
        Commands::InitConfig { output } => {
            ConfigLoader::new().save(&EngineConfig::default(), &output.to_string_lossy())?;
            println!("Wrote default configuration to {}", output.display());
            Ok(())
        }
    }
}

fn run_simulation(config: EngineConfig, sim: &SimulationConfig, json: bool) -> EngineResult<()> {
    let report = Simulator::new(config)?.run(sim)?;
    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{}", out),
            Err(e) => warn!(error = %e, "Report serialization failed"),
        }
    } else {
        println!("{}", report);
    }
    Ok(())
}

async fn run_live(
    config: EngineConfig,
    game: GameType,
    cycles: u64,
    balance: Money,
    stake: Money,
    auto: Option<f64>,
) -> EngineResult<()> {
    let ledger = Arc::new(InMemoryLedger::new(balance));
    let wallet = Wallet::open(ledger, &config.ledger).await?;
    let mut machine = CrashRoundMachine::new(game, &config, wallet, StdRng::from_entropy(), Instant::now())?;

    let events = machine.subscribe();
    let printer = tokio::spawn(print_events(events));

    info!(%game, cycles, %balance, %stake, ?auto, "Starting live rounds");
    for _ in 0..cycles {
        match machine.place_bet(0, stake, auto, Instant::now()).await {
            Ok(_) => {}
            Err(e) if e.is_user_visible() => {
                warn!(error = %e, "Bet rejected");
                break;
            }
            Err(e) => return Err(e),
        }
        drive_rounds(&mut machine, Duration::from_millis(50), 1).await;
    }

    let snapshot = machine.metrics().snapshot();
    println!(
        "Balance {} after {} rounds (staked {}, paid {}, RTP {:.4})",
        machine.wallet().cached_balance(),
        snapshot.rounds_resolved,
        snapshot.staked,
        snapshot.paid,
        snapshot.observed_rtp
    );
    let recent: Vec<String> = machine.history().map(|point| point.to_string()).collect();
    println!("Recent crash points: {}", recent.join(" "));

    drop(machine);
    let _ = printer.await;
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<RoundEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "Event serialization failed"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn parse_lowercase<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
        .map_err(|_| format!("unknown value '{}'", raw))
}

fn parse_segments(raw: &str) -> Result<SegmentCount, String> {
    let count: u32 = raw.parse().map_err(|_| format!("not a number: '{}'", raw))?;
    SegmentCount::try_from(count)
}
