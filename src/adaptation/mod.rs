//! Rating-and-matching core: two interchangeable rating adapters, the records
//! they update, and fuzzy-interval scenario selection.

pub mod accuracy;
pub mod config;
pub mod random;
pub mod rating;
pub mod selector;
pub mod timed;
pub mod types;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::adaptation::accuracy::AccuracyOnlyAdapter;
use crate::adaptation::config::RatingConfig;
use crate::adaptation::rating::FuzzyInterval;
use crate::adaptation::timed::TimedAdapter;
use crate::adaptation::types::{AdaptationType, Attempt, GameplayLogEntry, PlayerRecord, ScenarioRecord};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("invalid accuracy {accuracy}: {expected}")]
    InvalidAccuracy { accuracy: f64, expected: &'static str },
    #[error("invalid response time {0}: must be > 0")]
    InvalidResponseTime(f64),
    #[error("invalid max duration {0}: must be > 0")]
    InvalidMaxDuration(f64),
    #[error("invalid standard deviation {0}: must be > 0")]
    InvalidDeviation(f64),
    #[error("invalid config value for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("invalid record field {field}: {reason}")]
    InvalidRecord { field: &'static str, reason: String },
    #[error("no candidate scenarios to choose from")]
    NoCandidates,
}

impl AdapterError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// 按适配类型分派的评分适配器
#[derive(Debug)]
pub enum Adapter {
    Timed(TimedAdapter),
    AccuracyOnly(AccuracyOnlyAdapter),
}

impl Adapter {
    pub fn for_type(adaptation_type: AdaptationType, seed: Option<u64>) -> Self {
        match adaptation_type {
            AdaptationType::Timed => Self::Timed(match seed {
                Some(seed) => TimedAdapter::with_seed(Default::default(), seed),
                None => TimedAdapter::new(Default::default()),
            }),
            AdaptationType::AccuracyOnly => Self::AccuracyOnly(match seed {
                Some(seed) => AccuracyOnlyAdapter::with_seed(Default::default(), seed),
                None => AccuracyOnlyAdapter::new(Default::default()),
            }),
        }
    }

    pub fn adaptation_type(&self) -> AdaptationType {
        match self {
            Self::Timed(_) => AdaptationType::Timed,
            Self::AccuracyOnly(_) => AdaptationType::AccuracyOnly,
        }
    }

    pub fn update_ratings_at(
        &self,
        player: &mut PlayerRecord,
        scenario: &mut ScenarioRecord,
        attempt: &Attempt,
        now: DateTime<Utc>,
    ) -> Result<GameplayLogEntry, AdapterError> {
        match self {
            Self::Timed(a) => a.update_ratings_at(player, scenario, attempt, now),
            Self::AccuracyOnly(a) => a.update_ratings_at(player, scenario, attempt, now),
        }
    }

    pub fn target_scenario<'a, I>(
        &mut self,
        player: &PlayerRecord,
        candidates: I,
    ) -> Result<&'a ScenarioRecord, AdapterError>
    where
        I: IntoIterator<Item = &'a ScenarioRecord>,
    {
        match self {
            Self::Timed(a) => a.target_scenario(player, candidates),
            Self::AccuracyOnly(a) => a.target_scenario(player, candidates),
        }
    }

    pub fn calc_target_betas(&mut self, theta: f64) -> Result<FuzzyInterval, AdapterError> {
        match self {
            Self::Timed(a) => a.calc_target_betas(theta),
            Self::AccuracyOnly(a) => a.calc_target_betas(theta),
        }
    }

    pub fn target_difficulty_rating(&self, theta: f64) -> f64 {
        match self {
            Self::Timed(a) => a.target_difficulty_rating(theta),
            Self::AccuracyOnly(a) => a.target_difficulty_rating(theta),
        }
    }

    /// `max_duration` is only consulted by the timed adapter; it falls back to
    /// the default scenario time limit when absent.
    pub fn expected_score(
        &self,
        theta: f64,
        beta: f64,
        max_duration: Option<f64>,
    ) -> Result<f64, AdapterError> {
        match self {
            Self::Timed(a) => a.calc_expected_score(
                theta,
                beta,
                max_duration.unwrap_or(crate::constants::DEFAULT_TIME_LIMIT_MS),
            ),
            Self::AccuracyOnly(a) => Ok(a.calc_expected_score(theta, beta)),
        }
    }

    pub fn rating_config(&self) -> &RatingConfig {
        match self {
            Self::Timed(a) => &a.config().rating,
            Self::AccuracyOnly(a) => &a.config().rating,
        }
    }

    /// 共享评分参数的可变入口；各 setter 自行校验
    pub fn rating_config_mut(&mut self) -> &mut RatingConfig {
        match self {
            Self::Timed(a) => a.rating_config_mut(),
            Self::AccuracyOnly(a) => a.rating_config_mut(),
        }
    }

    /// 以当前配置重新播种两个随机源
    pub fn reseed(&mut self, seed: u64) {
        match self {
            Self::Timed(a) => a.reseed(seed),
            Self::AccuracyOnly(a) => a.reseed(seed),
        }
    }
}
