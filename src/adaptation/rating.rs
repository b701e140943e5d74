//! Rating math shared by both adapters: uncertainty decay, K-factors, the
//! update step itself, and the fuzzy target-difficulty interval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::{RatingConfig, TargetDistribution};
use super::random::RandomSource;
use super::types::sealed::StateAccess;
use super::types::{
    Attempt, GameplayLogEntry, PlayerRecord, RatedRecord, RatingState, ScenarioRecord,
};
use super::AdapterError;
use crate::constants::{
    DISTR_LOWER_LIMIT, DISTR_UPPER_LIMIT, MAX_SAMPLING_ATTEMPTS, MILLIS_PER_DAY, MIN_K_FACTOR,
};

/// Difficulty band derived from a player rating, in ascending order:
/// `lower <= min_core <= max_core <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuzzyInterval {
    pub lower: f64,
    pub min_core: f64,
    pub max_core: f64,
    pub upper: f64,
}

impl FuzzyInterval {
    pub fn as_array(&self) -> [f64; 4] {
        [self.lower, self.min_core, self.max_core, self.upper]
    }

    pub fn in_core(&self, rating: f64) -> bool {
        rating >= self.min_core && rating <= self.max_core
    }

    /// Inside the acceptable band but outside the core.
    pub fn in_support(&self, rating: f64) -> bool {
        rating >= self.lower && rating <= self.upper && !self.in_core(rating)
    }

    /// Distance to the nearest core boundary.
    pub fn core_distance(&self, rating: f64) -> f64 {
        (rating - self.min_core)
            .abs()
            .min((rating - self.max_core).abs())
    }
}

/// Whole days elapsed since `last_played`, capped at `max_delay`.
pub fn days_since(last_played: DateTime<Utc>, now: DateTime<Utc>, max_delay: f64) -> f64 {
    let elapsed_ms = (now - last_played).num_milliseconds().max(0);
    ((elapsed_ms / MILLIS_PER_DAY) as f64).min(max_delay)
}

/// Shrinks with every play, grows with idle days; always in `[0, 1]`.
/// Same shape for players (theta) and scenarios (beta).
pub fn calc_uncertainty(current: f64, days_since_last_play: f64, cfg: &RatingConfig) -> f64 {
    // min/max 而非 clamp：max_delay 非法时不能 panic
    let days = days_since_last_play.min(cfg.max_delay).max(0.0);
    let idle = if cfg.max_delay > 0.0 { days / cfg.max_delay } else { 0.0 };
    let played = if cfg.max_play > 0.0 { 1.0 / cfg.max_play } else { 0.0 };
    (current - played + idle).clamp(0.0, 1.0)
}

/// K-factor for one side of an update. A positive `custom_k` replaces the
/// computed value entirely, calibration included.
pub fn calc_k_factor(
    own_uncertainty: f64,
    other_uncertainty: f64,
    calibration_bonus: f64,
    custom_k: f64,
    cfg: &RatingConfig,
) -> f64 {
    if custom_k > 0.0 {
        return custom_k;
    }
    let base = cfg.k_const * (1.0 + cfg.k_up * own_uncertainty - cfg.k_down * other_uncertainty);
    (base + calibration_bonus).max(MIN_K_FACTOR)
}

pub fn calibration_bonus(play_count: u32, calibration_length: u32, bonus: f64) -> f64 {
    if play_count < calibration_length {
        bonus
    } else {
        0.0
    }
}

pub fn calc_theta(rating: f64, k_factor: f64, actual: f64, expected: f64) -> f64 {
    rating + k_factor * (actual - expected)
}

/// Mirrored sign: a scenario the player beat becomes easier.
pub fn calc_beta(rating: f64, k_factor: f64, actual: f64, expected: f64) -> f64 {
    rating + k_factor * (expected - actual)
}

/// Rating at which the expected success probability equals `p`.
pub fn probability_to_rating(theta: f64, p: f64) -> f64 {
    theta + ((1.0 - p) / p).ln()
}

pub fn target_difficulty_rating(theta: f64, target: &TargetDistribution) -> f64 {
    probability_to_rating(theta, target.mean)
}

pub fn calc_target_betas(
    theta: f64,
    cfg: &RatingConfig,
    rng: &mut RandomSource,
) -> Result<FuzzyInterval, AdapterError> {
    let target = &cfg.target;

    let first = sample_core_probability(rng, target)?;
    let second = sample_core_probability(rng, target)?;
    let (min_core_p, max_core_p) = if first <= second {
        (first, second)
    } else {
        (second, first)
    };

    let outer_sd = target.sd * cfg.fi_sd_multiplier;
    let lower_center = (target.mean - target.sd).clamp(DISTR_LOWER_LIMIT, DISTR_UPPER_LIMIT);
    let upper_center = (target.mean + target.sd).clamp(DISTR_LOWER_LIMIT, DISTR_UPPER_LIMIT);
    let lower_p = sample_outside_core(rng, lower_center, outer_sd, false, min_core_p)?;
    let upper_p = sample_outside_core(rng, upper_center, outer_sd, true, max_core_p)?;

    // Higher success probability means an easier scenario, hence the swap.
    Ok(FuzzyInterval {
        lower: probability_to_rating(theta, upper_p),
        min_core: probability_to_rating(theta, max_core_p),
        max_core: probability_to_rating(theta, min_core_p),
        upper: probability_to_rating(theta, lower_p),
    })
}

fn sample_core_probability(
    rng: &mut RandomSource,
    target: &TargetDistribution,
) -> Result<f64, AdapterError> {
    let mut last = target.mean;
    for _ in 0..MAX_SAMPLING_ATTEMPTS {
        last = rng.normal(target.mean, target.sd)?;
        if last > target.lower_limit && last < target.upper_limit {
            return Ok(last.clamp(DISTR_LOWER_LIMIT, DISTR_UPPER_LIMIT));
        }
    }
    tracing::warn!(
        mean = target.mean,
        sd = target.sd,
        attempts = MAX_SAMPLING_ATTEMPTS,
        "Core probability sampling exhausted, clamping last draw into target limits"
    );
    Ok(last
        .clamp(target.lower_limit, target.upper_limit)
        .clamp(DISTR_LOWER_LIMIT, DISTR_UPPER_LIMIT))
}

fn sample_outside_core(
    rng: &mut RandomSource,
    center: f64,
    sd: f64,
    upper: bool,
    core_bound: f64,
) -> Result<f64, AdapterError> {
    for _ in 0..MAX_SAMPLING_ATTEMPTS {
        let p = rng
            .normal_one_sided(center, sd, upper)?
            .clamp(DISTR_LOWER_LIMIT, DISTR_UPPER_LIMIT);
        let outside = if upper { p >= core_bound } else { p <= core_bound };
        if outside {
            return Ok(p);
        }
    }
    tracing::warn!(
        center,
        core_bound,
        upper,
        "Support probability sampling exhausted, falling back to core bound"
    );
    Ok(core_bound)
}

/// Score pair for one attempt, already on the adapter's scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Scores {
    pub actual: f64,
    pub expected: f64,
}

/// Per-side calibration bonus; zero for adapters without a calibration phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Calibration {
    pub player: f64,
    pub scenario: f64,
}

pub(crate) fn next_states(
    player: &RatingState,
    scenario: &RatingState,
    scores: Scores,
    calibration: Calibration,
    attempt: &Attempt,
    cfg: &RatingConfig,
    now: DateTime<Utc>,
) -> (RatingState, RatingState) {
    let player_days = days_since(player.last_played, now, cfg.max_delay);
    let scenario_days = days_since(scenario.last_played, now, cfg.max_delay);

    let player_u = calc_uncertainty(player.uncertainty, player_days, cfg);
    let scenario_u = calc_uncertainty(scenario.uncertainty, scenario_days, cfg);

    let player_k = calc_k_factor(
        player_u,
        scenario_u,
        calibration.player,
        attempt.custom_player_k,
        cfg,
    );
    let scenario_k = calc_k_factor(
        scenario_u,
        player_u,
        calibration.scenario,
        attempt.custom_scenario_k,
        cfg,
    );

    let next_player = RatingState {
        rating: calc_theta(player.rating, player_k, scores.actual, scores.expected),
        play_count: player.play_count.saturating_add(1),
        k_factor: player_k,
        uncertainty: player_u,
        last_played: now,
    };
    let next_scenario = RatingState {
        rating: calc_beta(scenario.rating, scenario_k, scores.actual, scores.expected),
        play_count: scenario.play_count.saturating_add(1),
        k_factor: scenario_k,
        uncertainty: scenario_u,
        last_played: now,
    };
    (next_player, next_scenario)
}

/// Writes the new states back and builds the log entry under the player's
/// adaptation identity.
pub(crate) fn commit(
    player: &mut PlayerRecord,
    scenario: &mut ScenarioRecord,
    next: (RatingState, RatingState),
    attempt: &Attempt,
    now: DateTime<Utc>,
) -> GameplayLogEntry {
    let (next_player, next_scenario) = next;
    *player.state_mut() = next_player;
    if attempt.update_scenario {
        *scenario.state_mut() = next_scenario;
    }

    tracing::debug!(
        player_id = player.player_id(),
        scenario_id = scenario.scenario_id(),
        player_rating = player.rating(),
        scenario_rating = scenario.rating(),
        "Ratings updated"
    );

    GameplayLogEntry::new(
        player.adaptation_type(),
        player.game_id(),
        player.player_id(),
        scenario.scenario_id(),
        attempt.response_time,
        attempt.accuracy,
        player.rating(),
        scenario.rating(),
        now,
    )
}

pub(crate) fn validate_custom_k(attempt: &Attempt) -> Result<(), AdapterError> {
    for (field, value) in [
        ("customPlayerK", attempt.custom_player_k),
        ("customScenarioK", attempt.custom_scenario_k),
    ] {
        if !value.is_finite() {
            tracing::warn!(field, value, "Custom K-factor is not finite");
            return Err(AdapterError::InvalidRecord {
                field,
                reason: format!("{value} is not finite"),
            });
        }
    }
    Ok(())
}
