//! Scripted players for headless rooms and load tests.
//!
//! A bot wanders, fires charged shots in bursts, dashes now and then, and
//! eventually holds exit. Every decision comes from its own seeded RNG, so a
//! room full of bots replays identically.

use bullion_shared::DeterministicRng;
use bullion_sim::PlayerInput;

/// Ticks between heading changes.
const WANDER_TICKS: u64 = 40;

/// One scripted player.
#[derive(Clone, Debug)]
pub struct ScriptedBot {
    /// Session the bot plays under.
    pub session_id: String,
    /// Wallet it stakes from.
    pub wallet: String,
    rng: DeterministicRng,
    heading: (bool, bool, bool, bool),
    aim: (f64, f64),
    exit_at_tick: Option<u64>,
    phase: u64,
}

impl ScriptedBot {
    /// Bot number `index` seeded from `seed`. It starts holding exit at
    /// `exit_at_tick`, or never.
    #[must_use]
    pub fn new(index: u32, seed: u32, exit_at_tick: Option<u64>) -> Self {
        Self {
            session_id: format!("bot-{index}"),
            wallet: format!("0x{:040x}", u64::from(index) + 1),
            rng: DeterministicRng::new(seed ^ index.wrapping_mul(0x9e37_79b9)),
            heading: (false, false, false, false),
            aim: (1.0, 0.0),
            exit_at_tick,
            phase: u64::from(index) * 17,
        }
    }

    /// Controls for `tick`.
    pub fn input(&mut self, tick: u64) -> PlayerInput {
        if self.exit_at_tick.is_some_and(|at| tick >= at) {
            return PlayerInput {
                exit: true,
                ..PlayerInput::default()
            };
        }

        if tick % WANDER_TICKS == 0 {
            let r = &mut self.rng;
            self.heading = (r.next_f64() < 0.4, r.next_f64() < 0.4, r.next_f64() < 0.4, r.next_f64() < 0.4);
            let angle = r.angle();
            self.aim = (angle.cos(), angle.sin());
        }

        let (w, a, s, d) = self.heading;
        PlayerInput {
            w,
            a,
            s,
            d,
            aim_x: self.aim.0,
            aim_y: self.aim.1,
            // Hold for 15 ticks, release for 10: one charged shot per cycle.
            shoot: tick % 25 < 15,
            // Ten-tick hold then release: a fully charged dash every 120 ticks.
            dash: (tick + self.phase) % 120 >= 110,
            exit: false,
        }
    }
}
