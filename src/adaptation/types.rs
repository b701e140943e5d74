use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AdapterError;
use crate::constants::{
    DEFAULT_K_CONST, DEFAULT_K_UP, DEFAULT_TIME_LIMIT_MS, INITIAL_RATING, INITIAL_UNCERTAINTY,
};

/// 评分与日志时间戳的可排序序列化格式 `yyyy-MM-ddTHH:mm:ss`（UTC，秒精度）
pub mod sortable_timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::constants::TIMESTAMP_FORMAT;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdaptationType {
    /// Response-time-aware CAP adapter.
    #[serde(rename = "Game difficulty - Player skill")]
    Timed,
    /// Accuracy-only Elo-style adapter.
    #[serde(rename = "Game difficulty - Player skill (accuracy)")]
    AccuracyOnly,
}

impl AdaptationType {
    pub const ALL: [AdaptationType; 2] = [Self::Timed, Self::AccuracyOnly];

    /// External identifier, kept stable for stored documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timed => "Game difficulty - Player skill",
            Self::AccuracyOnly => "Game difficulty - Player skill (accuracy)",
        }
    }

    /// Short code used inside storage keys.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timed => "timed",
            Self::AccuracyOnly => "accuracy",
        }
    }

    pub fn default_k_factor(&self) -> f64 {
        match self {
            Self::Timed | Self::AccuracyOnly => DEFAULT_K_CONST * (1.0 + DEFAULT_K_UP),
        }
    }
}

impl fmt::Display for AdaptationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdaptationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.code() == s)
            .ok_or_else(|| format!("unknown adaptation type: {s}"))
    }
}

/// Mutable rating fields shared by players and scenarios. `Copy`, so a
/// snapshot is a plain value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingState {
    pub rating: f64,
    pub play_count: u32,
    pub k_factor: f64,
    pub uncertainty: f64,
    #[serde(with = "sortable_timestamp")]
    pub last_played: DateTime<Utc>,
}

impl RatingState {
    pub fn initial(k_factor: f64, now: DateTime<Utc>) -> Self {
        Self {
            rating: INITIAL_RATING,
            play_count: 0,
            k_factor,
            uncertainty: INITIAL_UNCERTAINTY,
            last_played: now,
        }
    }

    pub fn validate(&self) -> Result<(), AdapterError> {
        check_rating(self.rating)?;
        check_k_factor(self.k_factor)?;
        check_uncertainty(self.uncertainty)
    }
}

fn check_rating(rating: f64) -> Result<(), AdapterError> {
    if !rating.is_finite() {
        return Err(AdapterError::InvalidRecord {
            field: "rating",
            reason: format!("{rating} is not finite"),
        });
    }
    Ok(())
}

fn check_k_factor(k_factor: f64) -> Result<(), AdapterError> {
    if !(k_factor.is_finite() && k_factor > 0.0) {
        return Err(AdapterError::InvalidRecord {
            field: "kFactor",
            reason: format!("{k_factor} must be > 0"),
        });
    }
    Ok(())
}

fn check_uncertainty(uncertainty: f64) -> Result<(), AdapterError> {
    if !(0.0..=1.0).contains(&uncertainty) {
        return Err(AdapterError::InvalidRecord {
            field: "uncertainty",
            reason: format!("{uncertainty} must be in [0,1]"),
        });
    }
    Ok(())
}

pub(crate) mod sealed {
    use super::RatingState;

    /// 原始状态写入口只在 crate 内可见，外部只能走带校验的 setter
    pub trait StateAccess {
        fn state_mut(&mut self) -> &mut RatingState;
    }
}

/// Field access shared by [`PlayerRecord`] and [`ScenarioRecord`].
pub trait RatedRecord: sealed::StateAccess {
    fn state(&self) -> &RatingState;

    fn rating(&self) -> f64 {
        self.state().rating
    }

    fn play_count(&self) -> u32 {
        self.state().play_count
    }

    fn k_factor(&self) -> f64 {
        self.state().k_factor
    }

    fn uncertainty(&self) -> f64 {
        self.state().uncertainty
    }

    fn last_played(&self) -> DateTime<Utc> {
        self.state().last_played
    }

    fn set_rating(&mut self, rating: f64) -> Result<(), AdapterError> {
        check_rating(rating)?;
        self.state_mut().rating = rating;
        Ok(())
    }

    fn set_play_count(&mut self, play_count: u32) {
        self.state_mut().play_count = play_count;
    }

    fn set_k_factor(&mut self, k_factor: f64) -> Result<(), AdapterError> {
        check_k_factor(k_factor)?;
        self.state_mut().k_factor = k_factor;
        Ok(())
    }

    fn set_uncertainty(&mut self, uncertainty: f64) -> Result<(), AdapterError> {
        check_uncertainty(uncertainty)?;
        self.state_mut().uncertainty = uncertainty;
        Ok(())
    }

    fn set_last_played(&mut self, last_played: DateTime<Utc>) {
        self.state_mut().last_played = last_played;
    }

    /// Value copy of the mutable rating fields.
    fn snapshot(&self) -> RatingState {
        *self.state()
    }

    /// Puts a previously taken snapshot back, rejecting one that breaks the
    /// record invariants.
    fn restore(&mut self, state: RatingState) -> Result<(), AdapterError> {
        state.validate()?;
        *self.state_mut() = state;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "PlayerRecordFields")]
pub struct PlayerRecord {
    adaptation_type: AdaptationType,
    game_id: String,
    player_id: String,
    #[serde(flatten)]
    state: RatingState,
}

impl PlayerRecord {
    pub fn new(adaptation_type: AdaptationType, game_id: &str, player_id: &str) -> Self {
        Self::new_at(adaptation_type, game_id, player_id, Utc::now())
    }

    pub fn new_at(
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            adaptation_type,
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            state: RatingState::initial(adaptation_type.default_k_factor(), now),
        }
    }

    pub fn with_state(
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
        state: RatingState,
    ) -> Result<Self, AdapterError> {
        state.validate()?;
        Ok(Self {
            adaptation_type,
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            state,
        })
    }

    pub fn adaptation_type(&self) -> AdaptationType {
        self.adaptation_type
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }
}

impl RatedRecord for PlayerRecord {
    fn state(&self) -> &RatingState {
        &self.state
    }
}

impl sealed::StateAccess for PlayerRecord {
    fn state_mut(&mut self) -> &mut RatingState {
        &mut self.state
    }
}

/// 反序列化的中间形态，经 [`PlayerRecord::with_state`] 校验后才成为记录
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerRecordFields {
    adaptation_type: AdaptationType,
    game_id: String,
    player_id: String,
    #[serde(flatten)]
    state: RatingState,
}

impl TryFrom<PlayerRecordFields> for PlayerRecord {
    type Error = AdapterError;

    fn try_from(fields: PlayerRecordFields) -> Result<Self, Self::Error> {
        Self::with_state(
            fields.adaptation_type,
            &fields.game_id,
            &fields.player_id,
            fields.state,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ScenarioRecordFields")]
pub struct ScenarioRecord {
    adaptation_type: AdaptationType,
    game_id: String,
    scenario_id: String,
    #[serde(flatten)]
    state: RatingState,
    /// 时间上限（毫秒），仅限时适配器使用
    time_limit: f64,
}

impl ScenarioRecord {
    pub fn new(adaptation_type: AdaptationType, game_id: &str, scenario_id: &str) -> Self {
        Self::new_at(adaptation_type, game_id, scenario_id, Utc::now())
    }

    pub fn new_at(
        adaptation_type: AdaptationType,
        game_id: &str,
        scenario_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            adaptation_type,
            game_id: game_id.to_string(),
            scenario_id: scenario_id.to_string(),
            state: RatingState::initial(adaptation_type.default_k_factor(), now),
            time_limit: DEFAULT_TIME_LIMIT_MS,
        }
    }

    pub fn with_state(
        adaptation_type: AdaptationType,
        game_id: &str,
        scenario_id: &str,
        state: RatingState,
        time_limit: f64,
    ) -> Result<Self, AdapterError> {
        state.validate()?;
        let mut record = Self {
            adaptation_type,
            game_id: game_id.to_string(),
            scenario_id: scenario_id.to_string(),
            state,
            time_limit: DEFAULT_TIME_LIMIT_MS,
        };
        record.set_time_limit(time_limit)?;
        Ok(record)
    }

    pub fn adaptation_type(&self) -> AdaptationType {
        self.adaptation_type
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    pub fn time_limit(&self) -> f64 {
        self.time_limit
    }

    pub fn set_time_limit(&mut self, time_limit: f64) -> Result<(), AdapterError> {
        if !crate::validation::is_valid_max_duration(time_limit) {
            return Err(AdapterError::InvalidRecord {
                field: "timeLimit",
                reason: format!("{time_limit} must be > 0"),
            });
        }
        self.time_limit = time_limit;
        Ok(())
    }
}

impl RatedRecord for ScenarioRecord {
    fn state(&self) -> &RatingState {
        &self.state
    }
}

impl sealed::StateAccess for ScenarioRecord {
    fn state_mut(&mut self) -> &mut RatingState {
        &mut self.state
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioRecordFields {
    adaptation_type: AdaptationType,
    game_id: String,
    scenario_id: String,
    #[serde(flatten)]
    state: RatingState,
    time_limit: f64,
}

impl TryFrom<ScenarioRecordFields> for ScenarioRecord {
    type Error = AdapterError;

    fn try_from(fields: ScenarioRecordFields) -> Result<Self, Self::Error> {
        Self::with_state(
            fields.adaptation_type,
            &fields.game_id,
            &fields.scenario_id,
            fields.state,
            fields.time_limit,
        )
    }
}

/// 一次作答的输入参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    /// 响应时间（毫秒）
    pub response_time: f64,
    pub accuracy: f64,
    pub update_scenario: bool,
    /// 大于 0 时完全替代计算得到的玩家 K 因子
    pub custom_player_k: f64,
    /// 大于 0 时完全替代计算得到的场景 K 因子
    pub custom_scenario_k: f64,
}

impl Attempt {
    pub fn new(response_time: f64, accuracy: f64) -> Self {
        Self {
            response_time,
            accuracy,
            update_scenario: true,
            custom_player_k: 0.0,
            custom_scenario_k: 0.0,
        }
    }

    pub fn with_custom_k(mut self, player_k: f64, scenario_k: f64) -> Self {
        self.custom_player_k = player_k;
        self.custom_scenario_k = scenario_k;
        self
    }

    pub fn without_scenario_update(mut self) -> Self {
        self.update_scenario = false;
        self
    }
}

/// Append-only analytics record produced by every successful rating update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameplayLogEntry {
    adaptation_type: AdaptationType,
    game_id: String,
    player_id: String,
    scenario_id: String,
    #[serde(with = "sortable_timestamp")]
    timestamp: DateTime<Utc>,
    response_time: f64,
    accuracy: f64,
    player_rating: f64,
    scenario_rating: f64,
}

impl GameplayLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
        scenario_id: &str,
        response_time: f64,
        accuracy: f64,
        player_rating: f64,
        scenario_rating: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            adaptation_type,
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            scenario_id: scenario_id.to_string(),
            timestamp,
            response_time,
            accuracy,
            player_rating,
            scenario_rating,
        }
    }

    pub fn adaptation_type(&self) -> AdaptationType {
        self.adaptation_type
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn response_time(&self) -> f64 {
        self.response_time
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn player_rating(&self) -> f64 {
        self.player_rating
    }

    pub fn scenario_rating(&self) -> f64 {
        self.scenario_rating
    }
}
