//! # Room Driver
//!
//! Owns one [`Engine`] and settles what each step reports:
//!
//! ```text
//! Tick N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. STEP                                                             │
//! │    └─ engine.step() (no I/O, never fails)                           │
//! │                                                                     │
//! │ 2. ROUTE EVENTS                                                     │
//! │    ├─ RecycleMass   → credit pellet reserve (key recycle:{epoch}:{tick})
//! │    ├─ PelletSpawned → spend from pellet reserve, revoke on failure  │
//! │    ├─ PlayerExited  → queue exit settlement                         │
//! │    └─ PlayerDied    → notice                                        │
//! │                                                                     │
//! │ 3. SETTLE EXITS                                                     │
//! │    └─ reserve → commit → ticket (key exit:{session}), resumable     │
//! │                                                                     │
//! │ 4. SWEEP (every sweep_interval_ticks)                               │
//! │    └─ release expired exit reservations                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ledger failures never stop the room. Every ledger call is keyed, so work
//! that failed is retried on the next tick without double-applying.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use bullion_core::EntityId;
use bullion_economy::{
    accounts, unix_now, ExitRequest, ExitTicket, KvStore, Ledger, LedgerError, LedgerResult,
    ReservationService, TicketSigner,
};
use bullion_sim::{Engine, InputPatch, SimEvent};

use crate::config::ServerConfig;
use crate::error::RoomResult;
use crate::notices::{NoticeSender, RoomNotice};

/// Driver tuning, usually taken from [`ServerConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverSettings {
    /// Buy-in burned from the stake on join.
    pub spawn_mass: u64,
    /// Ticks between reservation sweeps.
    pub sweep_interval_ticks: u64,
    /// Reservations released per sweep at most.
    pub sweep_limit: usize,
    /// Lifetime of an exit reservation.
    pub reservation_ttl_secs: u64,
    /// Distinguishes this run's per-tick keys from a previous run's, since
    /// the engine's tick counter restarts at zero.
    pub epoch: u64,
}

impl DriverSettings {
    /// Settings from a server config, with the current time as epoch.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            spawn_mass: config.spawn_mass,
            sweep_interval_ticks: config.sweep_interval_ticks,
            sweep_limit: config.sweep_limit,
            reservation_ttl_secs: config.ledger.reservation_ttl_secs,
            epoch: unix_now(),
        }
    }
}

/// Counters since the driver started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Steps run.
    pub ticks: u64,
    /// Players admitted.
    pub joins: u64,
    /// Joins refused for a short stake or a spent session.
    pub joins_refused: u64,
    /// Mass credited to the pellet reserve.
    pub recycled: u64,
    /// Pellets paid for.
    pub pellets_funded: u64,
    /// Pellets removed unpaid.
    pub pellets_revoked: u64,
    /// Exit tickets issued.
    pub exits_paid: u64,
    /// Exits given up on: exit pool short after commit, or an amount over
    /// the ledger cap.
    pub exits_unpaid: u64,
    /// Deaths, liquidations and timeouts.
    pub deaths: u64,
    /// Reservations released by sweeps.
    pub reservations_swept: u64,
    /// Ledger calls that failed and were deferred.
    pub ledger_failures: u64,
}

/// Where an exit's settlement stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStage {
    /// Needs bankroll escrowed.
    Reserve,
    /// Escrowed, needs moving into the exit pool.
    Commit,
    /// In the pool, needs a ticket.
    Ticket,
}

/// An exit still being settled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingExit {
    /// Session that exited.
    pub session_id: String,
    /// Payout wallet.
    pub wallet: String,
    /// Amount owed.
    pub amount: u64,
    /// Next step.
    pub stage: ExitStage,
    /// Settlement attempts so far.
    pub attempts: u32,
}

enum ExitProgress {
    Paid(ExitTicket),
    Waiting,
    Unpaid,
}

/// What one tick produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number after the step.
    pub tick: u64,
    /// Engine events, as emitted.
    pub events: Vec<SimEvent>,
    /// Tickets issued this tick (including retried exits).
    pub tickets: Vec<ExitTicket>,
}

/// One room wired to the ledger.
pub struct RoomDriver {
    engine: Engine,
    ledger: Ledger,
    reservations: ReservationService,
    signer: Arc<dyn TicketSigner>,
    notices: NoticeSender,
    settings: DriverSettings,
    spent_sessions: HashSet<String>,
    pending_exits: Vec<PendingExit>,
    unposted_recycle: Vec<(u64, u64)>,
    stats: DriverStats,
}

impl RoomDriver {
    /// Driver over parts built elsewhere.
    #[must_use]
    pub fn new(
        engine: Engine,
        ledger: Ledger,
        signer: Arc<dyn TicketSigner>,
        notices: NoticeSender,
        settings: DriverSettings,
    ) -> Self {
        Self {
            engine,
            reservations: ReservationService::new(ledger.clone()),
            ledger,
            signer,
            notices,
            settings,
            spent_sessions: HashSet::new(),
            pending_exits: Vec::new(),
            unposted_recycle: Vec::new(),
            stats: DriverStats::default(),
        }
    }

    /// Driver for `config` over `store`.
    ///
    /// # Errors
    ///
    /// Invalid sim or ledger config, or a bad signer key.
    pub fn from_config(config: &ServerConfig, store: Arc<dyn KvStore>, notices: NoticeSender) -> RoomResult<Self> {
        let engine = Engine::new(config.sim.clone(), config.seed)?;
        let ledger = config.ledger(store)?;
        let signer = Arc::new(config.signer()?);
        info!(
            server_id = %config.server_id,
            seed = config.seed,
            issuer = %signer.address(),
            "room driver ready"
        );
        Ok(Self::new(engine, ledger, signer, notices, DriverSettings::from_config(config)))
    }

    /// Returns the engine.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns the engine mutably, for lifecycle calls the driver does not
    /// wrap (rekeying).
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Returns the ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Returns the reservation service.
    #[must_use]
    pub const fn reservations(&self) -> &ReservationService {
        &self.reservations
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Returns the counters.
    #[must_use]
    pub const fn stats(&self) -> &DriverStats {
        &self.stats
    }

    /// Exits still being settled.
    #[must_use]
    pub fn pending_exits(&self) -> &[PendingExit] {
        &self.pending_exits
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Charges the buy-in from `stake:{wallet}` and adds the player.
    ///
    /// Returns `false` when the stake is short or the session was already
    /// used in this room. Re-joining a live session is a no-op returning
    /// `true`.
    ///
    /// # Errors
    ///
    /// Ledger failure; the join may be retried with the same session.
    pub fn join(&mut self, session_id: &str, wallet: &str, display_name: &str) -> RoomResult<bool> {
        if self.engine.player(session_id).is_some() {
            return Ok(true);
        }
        if self.spent_sessions.contains(session_id) {
            warn!(session_id, "session already played in this room");
            self.stats.joins_refused += 1;
            return Ok(false);
        }

        let spawn_mass = self.settings.spawn_mass;
        let key = format!("join:{session_id}");
        if !self.ledger.burn(&accounts::stake(wallet), spawn_mass, Some(&key))? {
            warn!(session_id, wallet, spawn_mass, "stake too small to join");
            self.stats.joins_refused += 1;
            return Ok(false);
        }

        self.engine.add_player(session_id, wallet, display_name, spawn_mass)?;
        self.spent_sessions.insert(session_id.to_string());
        self.stats.joins += 1;
        self.notices.send(RoomNotice::PlayerJoined {
            session_id: session_id.to_string(),
            wallet: wallet.to_string(),
        });
        Ok(true)
    }

    /// Transport lost the client; the engine starts its grace period.
    pub fn disconnect(&mut self, session_id: &str) -> bool {
        self.engine.mark_disconnected(session_id)
    }

    /// Forwards input to the engine.
    pub fn set_input(&mut self, session_id: &str, patch: impl Into<InputPatch>) -> bool {
        self.engine.set_input(session_id, patch)
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Steps the world and settles its events. `now_secs` is the wall clock
    /// used for reservation and ticket deadlines.
    pub fn tick(&mut self, now_secs: u64) -> TickReport {
        let result = self.engine.step();
        let tick = result.tick;

        for event in &result.events {
            match event {
                SimEvent::RecycleMass { mass } => self.unposted_recycle.push((tick, *mass)),
                SimEvent::PelletSpawned { id, mass } => self.fund_pellet(*id, *mass),
                SimEvent::PlayerExited { session_id, wallet, mass } => {
                    debug!(session_id = %session_id, wallet = %wallet, mass, "exit queued");
                    self.pending_exits.push(PendingExit {
                        session_id: session_id.clone(),
                        wallet: wallet.clone(),
                        amount: *mass,
                        stage: ExitStage::Reserve,
                        attempts: 0,
                    });
                }
                SimEvent::PlayerDied { session_id, wallet, spilled } => {
                    info!(session_id = %session_id, wallet = %wallet, spilled, "player died");
                    self.stats.deaths += 1;
                    self.notices.send(RoomNotice::PlayerDied {
                        session_id: session_id.clone(),
                        wallet: wallet.clone(),
                        spilled: *spilled,
                    });
                }
            }
        }

        self.post_recycle();
        let tickets = self.settle_exits(now_secs);
        if self.settings.sweep_interval_ticks > 0 && tick % self.settings.sweep_interval_ticks == 0 {
            self.sweep(now_secs);
        }

        self.stats.ticks += 1;
        TickReport {
            tick,
            events: result.events,
            tickets,
        }
    }

    fn post_recycle(&mut self) {
        let epoch = self.settings.epoch;
        let reservations = &self.reservations;
        let stats = &mut self.stats;
        self.unposted_recycle.retain(|&(tick, mass)| {
            let key = format!("recycle:{epoch}:{tick}");
            match reservations.credit_pellet_reserve(mass, Some(&key)) {
                Ok(_) => {
                    stats.recycled += mass;
                    false
                }
                Err(e) => {
                    error!(tick, mass, error = %e, "pellet reserve credit failed, will retry");
                    stats.ledger_failures += 1;
                    true
                }
            }
        });
    }

    fn fund_pellet(&mut self, id: EntityId, cost: u64) {
        let funded = match self.reservations.spend_pellet(cost) {
            Ok(funded) => funded,
            Err(e) => {
                error!(id = %id, cost, error = %e, "pellet spend failed");
                self.stats.ledger_failures += 1;
                false
            }
        };
        if funded {
            self.stats.pellets_funded += 1;
            return;
        }
        if self.engine.remove_pickup(id).is_some() {
            debug!(id = %id, cost, "pellet revoked");
            self.stats.pellets_revoked += 1;
            self.notices.send(RoomNotice::PelletRevoked { id });
        }
    }

    fn settle_exits(&mut self, now_secs: u64) -> Vec<ExitTicket> {
        let mut tickets = Vec::new();
        let mut waiting = Vec::new();

        for mut exit in std::mem::take(&mut self.pending_exits) {
            exit.attempts += 1;
            match self.advance_exit(&mut exit, now_secs) {
                Ok(ExitProgress::Paid(ticket)) => {
                    info!(session_id = %exit.session_id, amount = exit.amount, "exit ticket issued");
                    self.stats.exits_paid += 1;
                    self.notices.send(RoomNotice::PlayerExited {
                        session_id: exit.session_id.clone(),
                        ticket: ticket.clone(),
                    });
                    tickets.push(ticket);
                }
                Ok(ExitProgress::Waiting) => {
                    if exit.attempts == 1 {
                        self.notices.send(RoomNotice::ExitPending {
                            session_id: exit.session_id.clone(),
                            amount: exit.amount,
                        });
                    }
                    waiting.push(exit);
                }
                Ok(ExitProgress::Unpaid) => {
                    error!(session_id = %exit.session_id, amount = exit.amount, "exit pool short after commit, needs reconciliation");
                    self.stats.exits_unpaid += 1;
                }
                Err(e @ LedgerError::InvalidAmount { .. }) => {
                    error!(session_id = %exit.session_id, error = %e, "exit amount unpayable, needs reconciliation");
                    self.stats.exits_unpaid += 1;
                }
                Err(e) => {
                    error!(session_id = %exit.session_id, stage = ?exit.stage, error = %e, "exit settlement failed, will retry");
                    self.stats.ledger_failures += 1;
                    waiting.push(exit);
                }
            }
        }

        self.pending_exits = waiting;
        tickets
    }

    fn advance_exit(&self, exit: &mut PendingExit, now_secs: u64) -> LedgerResult<ExitProgress> {
        if exit.stage == ExitStage::Reserve {
            let reserved = self.reservations.reserve_exit(
                &exit.session_id,
                exit.amount,
                self.settings.reservation_ttl_secs,
                now_secs,
            )?;
            // A previous attempt may have reserved before failing.
            if !reserved && self.reservations.reservation(&exit.session_id)?.is_none() {
                if exit.attempts == 1 {
                    warn!(session_id = %exit.session_id, amount = exit.amount, "bankroll short, exit waiting");
                }
                return Ok(ExitProgress::Waiting);
            }
            exit.stage = ExitStage::Commit;
        }

        if exit.stage == ExitStage::Commit {
            // A repeated commit returns the recorded amount; None means the
            // escrow was released (swept) before it was ever committed.
            if self.reservations.commit_exit(&exit.session_id)?.is_none() {
                warn!(session_id = %exit.session_id, amount = exit.amount, "exit escrow released before commit, reserving again");
                exit.stage = ExitStage::Reserve;
                return Ok(ExitProgress::Waiting);
            }
            exit.stage = ExitStage::Ticket;
        }

        let request = ExitRequest {
            wallet: exit.wallet.clone(),
            session_id: exit.session_id.clone(),
            amount: exit.amount,
            deadline: self.ledger.ticket_deadline(now_secs),
        };
        let key = format!("exit:{}", exit.session_id);
        Ok(
            match self
                .ledger
                .withdraw_with_ticket(&request, self.signer.as_ref(), Some(&key))?
            {
                Some(ticket) => ExitProgress::Paid(ticket),
                None => ExitProgress::Unpaid,
            },
        )
    }

    fn sweep(&mut self, now_secs: u64) {
        match self
            .reservations
            .sweep_expired_reservations(now_secs, self.settings.sweep_limit)
        {
            Ok(released) => self.stats.reservations_swept += released as u64,
            Err(e) => {
                error!(error = %e, "reservation sweep failed");
                self.stats.ledger_failures += 1;
            }
        }
    }
}
