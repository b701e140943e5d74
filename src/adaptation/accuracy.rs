//! Accuracy-only adapter: Elo-style logistic expectation, accuracy as the
//! actual score, no calibration phase.

use chrono::{DateTime, Utc};

use super::config::{AccuracyOnlyConfig, EloScoreConfig, RatingConfig};
use super::random::RandomSource;
use super::rating::{self, Calibration, FuzzyInterval, Scores};
use super::selector;
use super::types::{Attempt, GameplayLogEntry, PlayerRecord, RatedRecord, ScenarioRecord};
use super::AdapterError;
use crate::validation::is_ratio_accuracy;

#[derive(Debug)]
pub struct AccuracyOnlyAdapter {
    config: AccuracyOnlyConfig,
    interval_rng: RandomSource,
    selection_rng: RandomSource,
}

impl AccuracyOnlyAdapter {
    pub fn new(config: AccuracyOnlyConfig) -> Self {
        Self {
            config,
            interval_rng: RandomSource::from_entropy(),
            selection_rng: RandomSource::from_entropy(),
        }
    }

    pub fn with_seed(config: AccuracyOnlyConfig, seed: u64) -> Self {
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

    pub fn config(&self) -> &AccuracyOnlyConfig {
        &self.config
    }

    pub fn rating_config_mut(&mut self) -> &mut RatingConfig {
        &mut self.config.rating
    }

    pub fn reload_config(&mut self, config: AccuracyOnlyConfig) -> Result<(), AdapterError> {
        config.validate().map_err(|reason| {
            tracing::warn!(%reason, "Rejected accuracy-only adapter config");
            AdapterError::config("accuracyOnly", reason)
        })?;
        self.config = config;
        tracing::info!("Accuracy-only adapter config reloaded");
        Ok(())
    }

    pub fn set_magnifier(&mut self, magnifier: f64) -> Result<(), AdapterError> {
        let candidate = EloScoreConfig {
            magnifier,
            ..self.config.elo
        };
        self.apply_elo(candidate, "magnifier")
    }

    pub fn set_step_size(&mut self, step_size: f64) -> Result<(), AdapterError> {
        let candidate = EloScoreConfig {
            step_size,
            ..self.config.elo
        };
        self.apply_elo(candidate, "stepSize")
    }

    pub fn reset_elo_score(&mut self) {
        self.config.elo = EloScoreConfig::default();
    }

    fn apply_elo(&mut self, candidate: EloScoreConfig, field: &'static str) -> Result<(), AdapterError> {
        candidate.validate().map_err(|reason| {
            tracing::warn!(field, %reason, "Rejected expected-score setting");
            AdapterError::config(field, reason)
        })?;
        self.config.elo = candidate;
        Ok(())
    }

    pub fn calc_expected_score(&self, theta: f64, beta: f64) -> f64 {
        let elo = &self.config.elo;
        1.0 / (1.0 + elo.magnifier.powf((beta - theta) / elo.step_size))
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
        custom_k: f64,
    ) -> f64 {
        rating::calc_k_factor(
            player_uncertainty,
            scenario_uncertainty,
            0.0,
            custom_k,
            &self.config.rating,
        )
    }

    pub fn calc_beta_k_factor(
        &self,
        scenario_uncertainty: f64,
        player_uncertainty: f64,
        custom_k: f64,
    ) -> f64 {
        rating::calc_k_factor(
            scenario_uncertainty,
            player_uncertainty,
            0.0,
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

    /// Response time is recorded in the log entry but takes no part in scoring.
    pub fn update_ratings_at(
        &self,
        player: &mut PlayerRecord,
        scenario: &mut ScenarioRecord,
        attempt: &Attempt,
        now: DateTime<Utc>,
    ) -> Result<GameplayLogEntry, AdapterError> {
        if !is_ratio_accuracy(attempt.accuracy) {
            tracing::warn!(
                accuracy = attempt.accuracy,
                "Accuracy must be in [0,1] for the accuracy-only adapter"
            );
            return Err(AdapterError::InvalidAccuracy {
                accuracy: attempt.accuracy,
                expected: "must be in [0,1]",
            });
        }
        rating::validate_custom_k(attempt)?;

        let scores = Scores {
            actual: attempt.accuracy,
            expected: self.calc_expected_score(player.rating(), scenario.rating()),
        };
        let next = rating::next_states(
            &player.snapshot(),
            &scenario.snapshot(),
            scores,
            Calibration::default(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptation::types::AdaptationType;

    fn adapter() -> AccuracyOnlyAdapter {
        AccuracyOnlyAdapter::with_seed(AccuracyOnlyConfig::default(), 7)
    }

    #[test]
    fn expected_score_is_half_at_equal_ratings() {
        let a = adapter();
        assert!((a.calc_expected_score(1.3, 1.3) - 0.5).abs() < 1e-12);
        assert!(a.calc_expected_score(2.0, 0.0) > 0.5);
        assert!(a.calc_expected_score(0.0, 2.0) < 0.5);
    }

    #[test]
    fn default_step_size_tracks_natural_logistic() {
        let a = adapter();
        let logistic = 1.0 / (1.0 + (-1.0_f64).exp());
        assert!((a.calc_expected_score(1.0, 0.0) - logistic).abs() < 1e-4);
    }

    #[test]
    fn half_accuracy_at_even_odds_barely_moves() {
        let a = adapter();
        let mut player = PlayerRecord::new(AdaptationType::AccuracyOnly, "g", "p");
        let mut scenario = ScenarioRecord::new(AdaptationType::AccuracyOnly, "g", "s");
        a.update_ratings(&mut player, &mut scenario, &Attempt::new(1.0, 0.5))
            .unwrap();
        assert!((player.rating() - 0.01).abs() < 1e-9);
        assert!((scenario.rating() - 0.01).abs() < 1e-9);
        assert_eq!(player.play_count(), 1);
    }

    #[test]
    fn fractional_accuracy_accepted_out_of_range_rejected() {
        let a = adapter();
        let mut player = PlayerRecord::new(AdaptationType::AccuracyOnly, "g", "p");
        let mut scenario = ScenarioRecord::new(AdaptationType::AccuracyOnly, "g", "s");
        assert!(a
            .update_ratings(&mut player, &mut scenario, &Attempt::new(1.0, 0.8))
            .is_ok());

        let before = (player.clone(), scenario.clone());
        assert!(matches!(
            a.update_ratings(&mut player, &mut scenario, &Attempt::new(1.0, 2.0)),
            Err(AdapterError::InvalidAccuracy { .. })
        ));
        assert_eq!((player, scenario), before);
    }

    #[test]
    fn response_time_is_not_validated() {
        let a = adapter();
        let mut player = PlayerRecord::new(AdaptationType::AccuracyOnly, "g", "p");
        let mut scenario = ScenarioRecord::new(AdaptationType::AccuracyOnly, "g", "s");
        let entry = a
            .update_ratings(&mut player, &mut scenario, &Attempt::new(0.0, 1.0))
            .unwrap();
        assert_eq!(entry.response_time(), 0.0);
    }

    #[test]
    fn setters_reject_and_keep_previous() {
        let mut a = adapter();
        assert!(a.set_step_size(0.5).is_err());
        assert!(a.set_magnifier(-1.0).is_err());
        assert_eq!(a.config().elo, EloScoreConfig::default());
        a.set_magnifier(2.0).unwrap();
        assert_eq!(a.config().elo.magnifier, 2.0);
        a.reset_elo_score();
        assert_eq!(a.config().elo, EloScoreConfig::default());
    }

    #[test]
    fn update_uses_idle_days_and_no_calibration() {
        use chrono::TimeZone;

        let a = adapter();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let mut player = PlayerRecord::new_at(AdaptationType::AccuracyOnly, "g", "p", t0);
        let mut scenario = ScenarioRecord::new_at(AdaptationType::AccuracyOnly, "g", "s", t0);
        player.set_uncertainty(0.4).unwrap();
        scenario.set_uncertainty(0.4).unwrap();

        let later = t0 + chrono::Duration::days(3);
        a.update_ratings_at(&mut player, &mut scenario, &Attempt::new(1.0, 1.0), later)
            .unwrap();

        let rc = a.config().rating;
        let u = 0.4 - 1.0 / rc.max_play() + 3.0 / rc.max_delay();
        assert!((player.uncertainty() - u).abs() < 1e-12);
        let base = rc.k_const() * (1.0 + rc.k_up() * u - rc.k_down() * u);
        assert!((player.k_factor() - base).abs() < 1e-12);
        assert!((scenario.k_factor() - base).abs() < 1e-12);
    }

    #[test]
    fn no_calibration_bonus() {
        let a = adapter();
        let k = a.calc_theta_k_factor(1.0, 0.0, 0.0);
        assert!((k - a.config().rating.k_const * (1.0 + a.config().rating.k_up)).abs() < 1e-12);
    }
}
