use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use snake_hunt::config::GameConfig;
use snake_hunt::game::constants::tick::TICK_DURATION_MS;
use snake_hunt::game::simulation::Simulation;
use snake_hunt::util::vec2::Vec2;

/// Headless runner settings
#[derive(Debug, Clone)]
struct RunnerConfig {
    rounds: u32,
    max_ticks: u64,
    /// Tick at the real frame rate instead of as fast as possible
    realtime: bool,
    seed: u64,
}

impl RunnerConfig {
    fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str, default: T) -> T {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Self {
            rounds: var("SIM_ROUNDS", 5),
            max_ticks: var("SIM_MAX_TICKS", 3600),
            realtime: var("SIM_REALTIME", true),
            seed: var("SIM_SEED", rand::random()),
        }
    }
}

/// Scripted stand-in for the pointer: wanders, and heads for the centre near the border
struct Wanderer {
    heading: f32,
    rng: StdRng,
}

impl Wanderer {
    const REACH: f32 = 40.0;

    fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            heading: rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI),
            rng,
        }
    }

    fn next(&mut self, head: Vec2, arena_size: f32) -> Vec2 {
        let margin = arena_size * 0.15;
        let near_border = head.x < margin
            || head.y < margin
            || head.x > arena_size - margin
            || head.y > arena_size - margin;
        if near_border {
            self.heading = head.bearing_to(Vec2::new(arena_size / 2.0, arena_size / 2.0));
        } else {
            self.heading += self.rng.gen_range(-0.3..0.3);
        }
        (head + Vec2::from_angle(self.heading) * Self::REACH).clamp_components(0.0, arena_size)
    }
}

async fn run_rounds(sim: &mut Simulation, runner: &RunnerConfig) {
    let mut interval = tokio::time::interval(Duration::from_millis(TICK_DURATION_MS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let arena_size = sim.config().arena_size;

    for round in 1..=runner.rounds {
        sim.reset();
        let mut wanderer = Wanderer::new(runner.seed.wrapping_add(round as u64));

        loop {
            if runner.realtime {
                interval.tick().await;
            } else {
                tokio::task::yield_now().await;
            }

            let head = sim.state().head();
            sim.set_pointer(wanderer.next(head, arena_size));
            let outcome = sim.step();
            if outcome.game_over.is_some() || outcome.tick >= runner.max_ticks {
                break;
            }
        }

        let state = sim.state();
        info!(
            round,
            ticks = state.tick,
            score = state.score,
            level = state.level,
            phase = ?state.phase,
            strategy = ?state.adversary.strategy,
            "Round finished"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Snake Hunt v{}", env!("CARGO_PKG_VERSION"));

    let config = GameConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    let runner = RunnerConfig::from_env();
    info!(
        "Configuration loaded: arena={}, boids={}, strategy={}, table={:?}",
        config.arena_size,
        config.boid_count,
        config
            .fixed_strategy
            .map_or_else(|| "tiered".to_string(), |s| s.to_string()),
        config.learning.table_path
    );
    info!(
        rounds = runner.rounds,
        max_ticks = runner.max_ticks,
        realtime = runner.realtime,
        seed = runner.seed,
        "Runner configured"
    );

    let mut sim = Simulation::from_config(config, runner.seed);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        _ = run_rounds(&mut sim, &runner) => {
            info!("All rounds finished");
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    sim.shutdown();
    info!("Simulation stopped");

    Ok(())
}
