//! Headless room server.
//!
//! Runs one room at 20Hz with scripted bots. Bots are funded through the
//! same settlement path a vault deposit takes, join by burning their stake
//! and eventually hold exit for a ticket.
//!
//! ```text
//! room_server --config room.toml --bots 16 --ticks 2400
//! RUST_LOG=bullion=debug room_server --fast
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use alloy_primitives::{Address, B256, U256};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use bullion::chain::{SettlementEvent, SettlementSync, VaultTransfer};
use bullion::economy::{accounts, unix_now};
use bullion::sim::TickLoop;
use bullion::{NoticeBus, RoomDriver, RoomError, RoomResult, ScriptedBot, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "BULLION headless room server")]
struct Args {
    /// TOML config; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ticks to run; overrides `max_ticks`. 0 runs until killed.
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Scripted bots; overrides `bots`.
    #[arg(short, long)]
    bots: Option<u32>,

    /// Step as fast as possible instead of at 20Hz.
    #[arg(long)]
    fast: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "room server failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> RoomResult<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(ticks) = args.ticks {
        config.max_ticks = ticks;
    }
    if let Some(bots) = args.bots {
        config.bots = bots;
    }

    let store = config.store()?;
    let (notices, inbox) = NoticeBus::create_pair(config.notice_capacity);
    let mut driver = RoomDriver::from_config(&config, store, notices)?;
    let epoch = driver.settings().epoch;

    // Bots hold exit at staggered ticks over the second half of the run.
    let horizon = if config.max_ticks == 0 { 2_400 } else { config.max_ticks };
    let mut bots: Vec<ScriptedBot> = (0..config.bots)
        .map(|i| {
            let exit_at = horizon / 2 + u64::from(i) * horizon / (2 * u64::from(config.bots.max(1)) + 2);
            ScriptedBot::new(i, config.seed, Some(exit_at))
        })
        .collect();

    fund_bots(&config, &driver, &bots, epoch)?;
    for bot in &bots {
        if !driver.join(&bot.session_id, &bot.wallet, &bot.session_id)? {
            error!(session_id = %bot.session_id, "bot could not join");
        }
    }

    let mut clock = TickLoop::room();
    while config.max_ticks == 0 || driver.engine().tick() < config.max_ticks {
        if !args.fast && !clock.should_tick() {
            clock.wait_for_next_tick();
            continue;
        }

        let started = clock.begin_tick();
        let tick = driver.engine().tick();
        for bot in &mut bots {
            let input = bot.input(tick);
            driver.set_input(&bot.session_id, input);
        }
        let report = driver.tick(unix_now());
        clock.end_tick(started);

        for notice in inbox.drain() {
            debug!(?notice, "notice");
        }
        if report.tick % 200 == 0 {
            info!(
                tick = report.tick,
                alive = driver.engine().alive_players(),
                world_mass = driver.engine().world_mass(),
                avg_tick_us = clock.stats().avg_tick_us,
                "room status"
            );
        }
        if driver.engine().alive_players() == 0 && driver.pending_exits().is_empty() {
            info!(tick = report.tick, "room empty");
            break;
        }
    }

    let stats = driver.stats();
    let reservations = driver.reservations();
    info!(
        ticks = stats.ticks,
        joins = stats.joins,
        exits_paid = stats.exits_paid,
        exits_unpaid = stats.exits_unpaid,
        deaths = stats.deaths,
        pellets_funded = stats.pellets_funded,
        pellets_revoked = stats.pellets_revoked,
        recycled = stats.recycled,
        ledger_failures = stats.ledger_failures,
        bankroll = reservations.bankroll()?,
        pellet_reserve = reservations.pellet_reserve()?,
        exit_pool = driver.ledger().balance(accounts::EXIT_POOL)?,
        "room finished"
    );
    Ok(())
}

/// Credits each bot's stake through a synthetic vault deposit.
fn fund_bots(config: &ServerConfig, driver: &RoomDriver, bots: &[ScriptedBot], epoch: u64) -> RoomResult<()> {
    let mut sync = SettlementSync::new(driver.ledger().clone(), config.pellet_share_bps);
    for (i, bot) in bots.iter().enumerate() {
        let player: Address = bot
            .wallet
            .parse()
            .map_err(|_| RoomError::InvalidConfig(format!("bot wallet {}", bot.wallet)))?;
        let mut id = [0u8; 32];
        id[16..24].copy_from_slice(&epoch.to_be_bytes());
        id[24..].copy_from_slice(&(i as u64).to_be_bytes());
        sync.apply(&SettlementEvent::Deposited(VaultTransfer {
            event_id: B256::from(id),
            player,
            amount: U256::from(config.spawn_mass * 2),
            block_number: 0,
            log_index: u32::try_from(i).unwrap_or(u32::MAX),
        }))?;
    }
    info!(bots = bots.len(), applied = sync.events_applied(), "bots funded");
    Ok(())
}
