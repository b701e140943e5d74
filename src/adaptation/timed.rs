//! Response-time-aware CAP adapter. Scores live on `[-1, 1]`: a fast correct
//! answer scores close to 1, a correct answer at the time limit scores 0, and
//! wrong answers mirror that range below zero.

use chrono::{DateTime, Utc};

use super::config::{CalibrationConfig, RatingConfig, TimedConfig};
use super::random::RandomSource;
use super::rating::{self, Calibration, FuzzyInterval, Scores};
use super::selector;
use super::types::{Attempt, GameplayLogEntry, PlayerRecord, RatedRecord, ScenarioRecord};
use super::AdapterError;
use crate::constants::ZERO_DIFF_SUBSTITUTE;
use crate::validation::{is_binary_accuracy, is_valid_max_duration, is_valid_response_time};

#[derive(Debug)]
pub struct TimedAdapter {
    config: TimedConfig,
    interval_rng: RandomSource,
    selection_rng: RandomSource,
}

impl TimedAdapter {
    pub fn new(config: TimedConfig) -> Self {
        Self {
            config,
            interval_rng: RandomSource::from_entropy(),
            selection_rng: RandomSource::from_entropy(),
        }
    }

    pub fn with_seed(config: TimedConfig, seed: u64) -> Self {
        Self {
            config,
            interval_rng: RandomSource::from_seed(seed),
            selection_rng: RandomSource::from_seed(seed.wrapping_add(1)),
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.interval_rng.reseed(seed);
        self.selection_rng.reseed(seed.wrapping_add(1));
    }

    pub fn config(&self) -> &TimedConfig {
        &self.config
    }

    pub fn rating_config_mut(&mut self) -> &mut RatingConfig {
        &mut self.config.rating
    }

    pub fn reload_config(&mut self, config: TimedConfig) -> Result<(), AdapterError> {
        config.validate().map_err(|reason| {
            tracing::warn!(%reason, "Rejected timed adapter config");
            AdapterError::config("timed", reason)
        })?;
        self.config = config;
        tracing::info!("Timed adapter config reloaded");
        Ok(())
    }

    fn apply_calibration(
        &mut self,
        candidate: CalibrationConfig,
        field: &'static str,
    ) -> Result<(), AdapterError> {
        candidate.validate().map_err(|reason| {
            tracing::warn!(field, %reason, "Rejected calibration config");
            AdapterError::config(field, reason)
        })?;
        self.config.calibration = candidate;
        Ok(())
    }

    pub fn set_calibration(&mut self, calibration: CalibrationConfig) -> Result<(), AdapterError> {
        self.apply_calibration(calibration, "calibration")
    }

    /// 玩家前 `length` 次游玩的 K 因子加成
    pub fn set_player_calibration(&mut self, length: u32, k: f64) -> Result<(), AdapterError> {
        let candidate = CalibrationConfig {
            player_length: length,
            player_k: k,
            ..self.config.calibration
        };
        self.apply_calibration(candidate, "playerCalibration")
    }

    pub fn set_scenario_calibration(&mut self, length: u32, k: f64) -> Result<(), AdapterError> {
        let candidate = CalibrationConfig {
            scenario_length: length,
            scenario_k: k,
            ..self.config.calibration
        };
        self.apply_calibration(candidate, "scenarioCalibration")
    }

    pub fn reset_calibration(&mut self) {
        self.config.calibration = CalibrationConfig::default();
    }

    pub fn calc_actual_score(
        &self,
        accuracy: f64,
        response_time: f64,
        max_duration: f64,
    ) -> Result<f64, AdapterError> {
        validate_accuracy(accuracy)?;
        validate_response_time(response_time)?;
        validate_max_duration(max_duration)?;

        let response_time = if response_time > max_duration {
            tracing::warn!(
                response_time,
                max_duration,
                "Response time exceeds time limit, clamping"
            );
            max_duration
        } else {
            response_time
        };

        let discrimination = 1.0 / max_duration;
        Ok((2.0 * accuracy - 1.0) * discrimination * (max_duration - response_time))
    }

    pub fn calc_expected_score(
        &self,
        theta: f64,
        beta: f64,
        max_duration: f64,
    ) -> Result<f64, AdapterError> {
        validate_max_duration(max_duration)?;

        let weight = (1.0 / max_duration) * max_duration;
        let mut diff = theta - beta;
        if diff == 0.0 {
            diff = ZERO_DIFF_SUBSTITUTE;
        }
        // (e^{2wd} + 1) / (e^{2wd} - 1) == coth(wd); tanh keeps large gaps finite.
        let coth = 1.0 / (weight * diff).tanh();
        Ok(weight * coth - 1.0 / diff)
    }

    pub fn calc_theta_uncertainty(&self, current: f64, days_since_last_play: f64) -> f64 {
        rating::calc_uncertainty(current, days_since_last_play, &self.config.rating)
    }

    pub fn calc_beta_uncertainty(&self, current: f64, days_since_last_play: f64) -> f64 {
        rating::calc_uncertainty(current, days_since_last_play, &self.config.rating)
    }

    pub fn calc_theta_k_factor(
        &self,
        player_uncertainty: f64,
        scenario_uncertainty: f64,
        player_play_count: u32,
        custom_k: f64,
    ) -> f64 {
        let cal = &self.config.calibration;
        rating::calc_k_factor(
            player_uncertainty,
            scenario_uncertainty,
            rating::calibration_bonus(player_play_count, cal.player_length, cal.player_k),
            custom_k,
            &self.config.rating,
        )
    }

    pub fn calc_beta_k_factor(
        &self,
        scenario_uncertainty: f64,
        player_uncertainty: f64,
        scenario_play_count: u32,
        custom_k: f64,
    ) -> f64 {
        let cal = &self.config.calibration;
        rating::calc_k_factor(
            scenario_uncertainty,
            player_uncertainty,
            rating::calibration_bonus(scenario_play_count, cal.scenario_length, cal.scenario_k),
            custom_k,
            &self.config.rating,
        )
    }

    pub fn update_ratings(
        &self,
        player: &mut PlayerRecord,
        scenario: &mut ScenarioRecord,
        attempt: &Attempt,
    ) -> Result<GameplayLogEntry, AdapterError> {
        self.update_ratings_at(player, scenario, attempt, Utc::now())
    }

    /// Nothing is written to either record unless every input validates.
    pub fn update_ratings_at(
        &self,
        player: &mut PlayerRecord,
        scenario: &mut ScenarioRecord,
        attempt: &Attempt,
        now: DateTime<Utc>,
    ) -> Result<GameplayLogEntry, AdapterError> {
        rating::validate_custom_k(attempt)?;
        let max_duration = scenario.time_limit();
        let actual = self.calc_actual_score(attempt.accuracy, attempt.response_time, max_duration)?;
        let expected = self.calc_expected_score(player.rating(), scenario.rating(), max_duration)?;

        let cal = &self.config.calibration;
        let calibration = Calibration {
            player: rating::calibration_bonus(player.play_count(), cal.player_length, cal.player_k),
            scenario: rating::calibration_bonus(
                scenario.play_count(),
                cal.scenario_length,
                cal.scenario_k,
            ),
        };

        let next = rating::next_states(
            &player.snapshot(),
            &scenario.snapshot(),
            Scores { actual, expected },
            calibration,
            attempt,
            &self.config.rating,
            now,
        );
        Ok(rating::commit(player, scenario, next, attempt, now))
    }

    pub fn calc_target_betas(&mut self, theta: f64) -> Result<FuzzyInterval, AdapterError> {
        rating::calc_target_betas(theta, &self.config.rating, &mut self.interval_rng)
    }

    pub fn target_difficulty_rating(&self, theta: f64) -> f64 {
        rating::target_difficulty_rating(theta, &self.config.rating.target)
    }

    pub fn target_scenario<'a, I>(
        &mut self,
        player: &PlayerRecord,
        candidates: I,
    ) -> Result<&'a ScenarioRecord, AdapterError>
    where
        I: IntoIterator<Item = &'a ScenarioRecord>,
    {
        let candidates: Vec<&ScenarioRecord> = candidates.into_iter().collect();
        if candidates.is_empty() {
            tracing::warn!(player_id = player.player_id(), "No candidate scenarios");
            return Err(AdapterError::NoCandidates);
        }
        let interval = self.calc_target_betas(player.rating())?;
        selector::select_scenario(&interval, &candidates, &mut self.selection_rng)
    }
}

fn validate_accuracy(accuracy: f64) -> Result<(), AdapterError> {
    if !is_binary_accuracy(accuracy) {
        tracing::warn!(accuracy, "Accuracy must be 0 or 1 for the timed adapter");
        return Err(AdapterError::InvalidAccuracy {
            accuracy,
            expected: "must be 0 or 1",
        });
    }
    Ok(())
}

fn validate_response_time(response_time: f64) -> Result<(), AdapterError> {
    if !is_valid_response_time(response_time) {
        tracing::warn!(response_time, "Response time must be > 0");
        return Err(AdapterError::InvalidResponseTime(response_time));
    }
    Ok(())
}

fn validate_max_duration(max_duration: f64) -> Result<(), AdapterError> {
    if !is_valid_max_duration(max_duration) {
        tracing::warn!(max_duration, "Max duration must be > 0");
        return Err(AdapterError::InvalidMaxDuration(max_duration));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptation::types::AdaptationType;
    use crate::constants::{DEFAULT_MAX_DELAY_DAYS, DEFAULT_PLAYER_CAL_K};
    use chrono::TimeZone;

    fn adapter() -> TimedAdapter {
        TimedAdapter::with_seed(TimedConfig::default(), 42)
    }

    fn records(player_rating: f64, scenario_rating: f64) -> (PlayerRecord, ScenarioRecord) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut player = PlayerRecord::new_at(AdaptationType::Timed, "g", "p", now);
        player.set_rating(player_rating).unwrap();
        let mut scenario = ScenarioRecord::new_at(AdaptationType::Timed, "g", "s", now);
        scenario.set_rating(scenario_rating).unwrap();
        scenario.set_time_limit(900_000.0).unwrap();
        (player, scenario)
    }

    #[test]
    fn actual_score_extremes() {
        let a = adapter();
        assert_eq!(a.calc_actual_score(1.0, 900.0, 900.0).unwrap(), 0.0);
        assert_eq!(a.calc_actual_score(0.0, 900.0, 900.0).unwrap(), 0.0);
        let fast_correct = a.calc_actual_score(1.0, 1.0, 900.0).unwrap();
        let fast_wrong = a.calc_actual_score(0.0, 1.0, 900.0).unwrap();
        assert!(fast_correct > 0.99 && fast_correct <= 1.0);
        assert_eq!(fast_wrong, -fast_correct);
    }

    #[test]
    fn actual_score_clamps_overlong_response() {
        let a = adapter();
        assert_eq!(a.calc_actual_score(1.0, 5000.0, 900.0).unwrap(), 0.0);
    }

    #[test]
    fn actual_score_rejects_bad_inputs() {
        let a = adapter();
        assert!(matches!(
            a.calc_actual_score(0.5, 10.0, 900.0),
            Err(AdapterError::InvalidAccuracy { .. })
        ));
        assert_eq!(
            a.calc_actual_score(1.0, 0.0, 900.0),
            Err(AdapterError::InvalidResponseTime(0.0))
        );
        assert_eq!(
            a.calc_actual_score(1.0, 10.0, -1.0),
            Err(AdapterError::InvalidMaxDuration(-1.0))
        );
    }

    #[test]
    fn expected_score_handles_equal_ratings() {
        let a = adapter();
        let e = a.calc_expected_score(1.0, 1.0, 900.0).unwrap();
        assert!(e.is_finite());
        assert!(e.abs() < 0.01);
    }

    #[test]
    fn expected_score_is_monotonic_and_bounded() {
        let a = adapter();
        let weak = a.calc_expected_score(-3.0, 0.0, 900.0).unwrap();
        let even = a.calc_expected_score(0.0, 0.0, 900.0).unwrap();
        let strong = a.calc_expected_score(3.0, 0.0, 900.0).unwrap();
        assert!(weak < even && even < strong);
        assert!(weak > -1.0 && strong < 1.0);
        let huge = a.calc_expected_score(1000.0, 0.0, 900.0).unwrap();
        assert!(huge.is_finite() && huge <= 1.0);
    }

    #[test]
    fn strong_scenario_beaten_quickly() {
        let a = adapter();
        let (mut player, mut scenario) = records(0.01, 6.0);
        let now = player.last_played();
        let expected = a.calc_expected_score(0.01, 6.0, 900_000.0).unwrap();
        let actual = a.calc_actual_score(1.0, 30_000.0, 900_000.0).unwrap();
        assert!(expected < actual);

        let entry = a
            .update_ratings_at(&mut player, &mut scenario, &Attempt::new(30_000.0, 1.0), now)
            .unwrap();

        assert!(player.rating() > 0.01);
        assert!(scenario.rating() < 6.0);
        assert_eq!(player.play_count(), 1);
        assert_eq!(scenario.play_count(), 1);
        assert_eq!(entry.player_rating(), player.rating());
        assert_eq!(entry.scenario_rating(), scenario.rating());
        assert_eq!(entry.adaptation_type(), AdaptationType::Timed);
    }

    #[test]
    fn rating_changes_mirror_scaled_by_k() {
        let a = adapter();
        let (mut player, mut scenario) = records(0.5, 0.0);
        let now = player.last_played();
        a.update_ratings_at(&mut player, &mut scenario, &Attempt::new(100.0, 1.0), now)
            .unwrap();
        let player_delta = (player.rating() - 0.5) / player.k_factor();
        let scenario_delta = (scenario.rating() - 0.0) / scenario.k_factor();
        assert!(player_delta > 0.0);
        assert!((player_delta + scenario_delta).abs() < 1e-12);
    }

    #[test]
    fn invalid_accuracy_leaves_records_untouched() {
        let a = adapter();
        let (mut player, mut scenario) = records(0.01, 6.0);
        let before = (player.clone(), scenario.clone());
        let result = a.update_ratings(&mut player, &mut scenario, &Attempt::new(100.0, 2.0));
        assert!(result.is_err());
        assert_eq!(player, before.0);
        assert_eq!(scenario, before.1);
    }

    #[test]
    fn scenario_untouched_when_update_disabled() {
        let a = adapter();
        let (mut player, mut scenario) = records(0.01, 1.0);
        let before = scenario.clone();
        a.update_ratings(
            &mut player,
            &mut scenario,
            &Attempt::new(100.0, 1.0).without_scenario_update(),
        )
        .unwrap();
        assert_eq!(scenario, before);
        assert_eq!(player.play_count(), 1);
    }

    #[test]
    fn calibration_bonus_raises_early_k() {
        let a = adapter();
        let early = a.calc_theta_k_factor(0.5, 0.5, 0, 0.0);
        let late = a.calc_theta_k_factor(0.5, 0.5, 100, 0.0);
        assert!((early - late - a.config().calibration.player_k).abs() < 1e-12);
    }

    #[test]
    fn custom_k_used_verbatim() {
        let a = adapter();
        let (mut player, mut scenario) = records(0.0, 0.0);
        a.update_ratings(
            &mut player,
            &mut scenario,
            &Attempt::new(100.0, 1.0).with_custom_k(0.25, 0.5),
        )
        .unwrap();
        assert_eq!(player.k_factor(), 0.25);
        assert_eq!(scenario.k_factor(), 0.5);
    }

    #[test]
    fn calibration_bonus_applies_until_length_is_reached() {
        let mut a = adapter();
        a.set_player_calibration(2, 0.2).unwrap();
        a.set_scenario_calibration(1, 0.05).unwrap();
        let cfg = a.config().rating;
        let base = |u: f64| cfg.k_const() * (1.0 + cfg.k_up() * u - cfg.k_down() * u);

        let (mut player, mut scenario) = records(0.0, 0.0);
        let now = player.last_played();
        let attempt = Attempt::new(100.0, 1.0);

        a.update_ratings_at(&mut player, &mut scenario, &attempt, now).unwrap();
        assert!((player.k_factor() - (base(0.975) + 0.2)).abs() < 1e-12);
        assert!((scenario.k_factor() - (base(0.975) + 0.05)).abs() < 1e-12);

        a.update_ratings_at(&mut player, &mut scenario, &attempt, now).unwrap();
        assert!((player.k_factor() - (base(0.95) + 0.2)).abs() < 1e-12);
        assert!((scenario.k_factor() - base(0.95)).abs() < 1e-12);

        a.update_ratings_at(&mut player, &mut scenario, &attempt, now).unwrap();
        assert_eq!(player.play_count(), 3);
        assert!((player.k_factor() - base(0.925)).abs() < 1e-12);
    }

    #[test]
    fn calibration_setters_are_atomic() {
        let mut a = adapter();
        assert!(matches!(
            a.set_player_calibration(5, 0.0),
            Err(AdapterError::InvalidConfig { field: "playerCalibration", .. })
        ));
        assert!(a.set_scenario_calibration(5, f64::NAN).is_err());
        assert_eq!(a.config().calibration, CalibrationConfig::default());

        a.set_scenario_calibration(3, 0.3).unwrap();
        assert_eq!(a.config().calibration.scenario_length(), 3);
        assert_eq!(a.config().calibration.scenario_k(), 0.3);
        assert_eq!(a.config().calibration.player_k(), DEFAULT_PLAYER_CAL_K);

        a.reset_calibration();
        assert_eq!(a.config().calibration, CalibrationConfig::default());
    }

    #[test]
    fn idle_days_raise_uncertainty_on_update() {
        let a = adapter();
        let (mut player, mut scenario) = records(0.0, 0.0);
        player.set_uncertainty(0.2).unwrap();
        scenario.set_uncertainty(0.2).unwrap();
        let later = player.last_played() + chrono::Duration::days(5) + chrono::Duration::hours(3);

        a.update_ratings_at(&mut player, &mut scenario, &Attempt::new(100.0, 1.0), later)
            .unwrap();
        let expected = 0.2 - 1.0 / 40.0 + 5.0 / 30.0;
        assert!((player.uncertainty() - expected).abs() < 1e-12);
        assert!((scenario.uncertainty() - expected).abs() < 1e-12);
        assert_eq!(player.last_played(), later);

        // 空闲天数超过 max_delay 按上限计
        let much_later = later + chrono::Duration::days(45);
        a.update_ratings_at(&mut player, &mut scenario, &Attempt::new(100.0, 0.0), much_later)
            .unwrap();
        assert_eq!(player.uncertainty(), 1.0);
    }

    #[test]
    fn rejected_rating_setting_keeps_updates_working() {
        let mut a = adapter();
        assert!(a.rating_config_mut().set_max_delay(-1.0).is_err());
        assert!(a.rating_config_mut().set_max_delay(0.0).is_err());
        assert_eq!(a.config().rating.max_delay(), DEFAULT_MAX_DELAY_DAYS);

        let (mut player, mut scenario) = records(0.0, 0.0);
        a.update_ratings(&mut player, &mut scenario, &Attempt::new(100.0, 1.0))
            .unwrap();
        assert!(player.rating().is_finite());
        assert!((0.0..=1.0).contains(&player.uncertainty()));
    }

    #[test]
    fn reload_config_is_atomic() {
        let mut a = adapter();
        let mut bad = TimedConfig::default();
        bad.rating.max_play = 0.0;
        assert!(a.reload_config(bad).is_err());
        assert_eq!(*a.config(), TimedConfig::default());
    }
}
