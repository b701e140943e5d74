use adaptive_difficulty::adaptation::config::EngineConfig;
use adaptive_difficulty::adaptation::random::RandomSource;
use adaptive_difficulty::adaptation::types::{
    AdaptationType, Attempt, RatedRecord, ScenarioRecord,
};
use adaptive_difficulty::config::{Config, SimulationConfig};
use adaptive_difficulty::engine::{DifficultyEngine, EngineError};
use adaptive_difficulty::logging::init_tracing;
use adaptive_difficulty::store::Store;

const GAME_ID: &str = "simulation";
const PLAYER_ID: &str = "sim-player";
const SCENARIO_RATING_MIN: f64 = -2.0;
const SCENARIO_RATING_MAX: f64 = 6.0;

#[derive(Debug, Default)]
struct Summary {
    rounds: u32,
    successes: u32,
    final_rating: f64,
}

fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(&config.log).expect("Failed to initialize tracing");
    tracing::info!("Starting adaptive-difficulty simulation");

    let engine_config = EngineConfig::from_env(&config.engine);
    let mut engine = DifficultyEngine::new(engine_config).expect("Invalid engine configuration");
    if config.persist {
        let store = Store::open(&config.sled_path).expect("Failed to open sled database");
        engine = engine.with_store(store);
    }

    let mut outcome_rng = match config.engine.seed {
        Some(seed) => RandomSource::from_seed(seed.wrapping_add(100)),
        None => RandomSource::from_entropy(),
    };

    for adaptation_type in AdaptationType::ALL {
        match simulate(&mut engine, adaptation_type, &config.simulation, &mut outcome_rng) {
            Ok(summary) => tracing::info!(
                %adaptation_type,
                rounds = summary.rounds,
                successes = summary.successes,
                latent_skill = config.simulation.player_skill,
                final_rating = summary.final_rating,
                "Simulation finished"
            ),
            Err(e) => tracing::error!(%adaptation_type, error = %e, "Simulation failed"),
        }
    }

    if let Some(store) = engine.store() {
        if let Err(e) = store.flush() {
            tracing::error!(error = %e, "Failed to flush store");
        }
    }
    tracing::info!(entries = engine.gameplay_log().len(), "Gameplay log size");
}

fn register_game(
    engine: &mut DifficultyEngine,
    adaptation_type: AdaptationType,
    scenarios: u32,
) -> Result<(), EngineError> {
    if engine.store().is_some() {
        engine.load_game(adaptation_type, GAME_ID)?;
    }
    engine.ensure_player(adaptation_type, GAME_ID, PLAYER_ID)?;

    let step = if scenarios > 1 {
        (SCENARIO_RATING_MAX - SCENARIO_RATING_MIN) / f64::from(scenarios - 1)
    } else {
        0.0
    };
    for i in 0..scenarios {
        let scenario_id = format!("level-{i:02}");
        if engine
            .scenario(adaptation_type, GAME_ID, &scenario_id)
            .is_some()
        {
            continue;
        }
        let mut scenario = ScenarioRecord::new(adaptation_type, GAME_ID, &scenario_id);
        scenario.set_rating(SCENARIO_RATING_MIN + step * f64::from(i))?;
        engine.insert_scenario(scenario)?;
    }
    Ok(())
}

/// 以固定真实能力的玩家反复“选关 → 作答 → 更新”
fn simulate(
    engine: &mut DifficultyEngine,
    adaptation_type: AdaptationType,
    sim: &SimulationConfig,
    rng: &mut RandomSource,
) -> Result<Summary, EngineError> {
    register_game(engine, adaptation_type, sim.scenarios)?;

    let mut summary = Summary::default();
    for _ in 0..sim.rounds {
        let scenario = engine.target_scenario(adaptation_type, GAME_ID, PLAYER_ID)?;
        let scenario_id = scenario.scenario_id().to_string();
        let difficulty = scenario.rating();
        let time_limit = scenario.time_limit();

        let p_success = 1.0 / (1.0 + (difficulty - sim.player_skill).exp());
        let success = rng.uniform01() < p_success;
        let accuracy = if success { 1.0 } else { 0.0 };
        // 越有把握作答越快
        let response_time = time_limit * (1.0 - 0.8 * p_success) * rng.uniform01().max(0.05);

        engine.update_ratings(
            adaptation_type,
            GAME_ID,
            PLAYER_ID,
            &scenario_id,
            &Attempt::new(response_time, accuracy),
        )?;
        summary.rounds += 1;
        summary.successes += u32::from(success);
    }

    summary.final_rating = engine
        .player(adaptation_type, GAME_ID, PLAYER_ID)
        .map(|p| p.rating())
        .unwrap_or_default();
    Ok(summary)
}
