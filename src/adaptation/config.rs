use serde::{Deserialize, Serialize};

use super::AdapterError;
use crate::constants::*;

/// 目标成功概率分布：均值、标准差及采样上下限，四者必须整体设置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDistribution {
    pub(crate) mean: f64,
    pub(crate) sd: f64,
    pub(crate) lower_limit: f64,
    pub(crate) upper_limit: f64,
}

impl Default for TargetDistribution {
    fn default() -> Self {
        Self {
            mean: DEFAULT_TARGET_MEAN,
            sd: DEFAULT_TARGET_SD,
            lower_limit: DEFAULT_TARGET_LOWER_LIMIT,
            upper_limit: DEFAULT_TARGET_UPPER_LIMIT,
        }
    }
}

impl TargetDistribution {
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sd(&self) -> f64 {
        self.sd
    }

    pub fn lower_limit(&self) -> f64 {
        self.lower_limit
    }

    pub fn upper_limit(&self) -> f64 {
        self.upper_limit
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.mean > 0.0 && self.mean < 1.0) {
            return Err("target.mean must be in (0,1)".to_string());
        }
        if !(self.sd > 0.0 && self.sd < 1.0) {
            return Err("target.sd must be in (0,1)".to_string());
        }
        if !(0.0..=1.0).contains(&self.lower_limit) || !(0.0..=1.0).contains(&self.upper_limit) {
            return Err("target limits must be in [0,1]".to_string());
        }
        if self.lower_limit >= self.mean {
            return Err("target.lower_limit must be < target.mean".to_string());
        }
        if self.upper_limit <= self.mean {
            return Err("target.upper_limit must be > target.mean".to_string());
        }
        Ok(())
    }
}

/// 字段只能经由带校验的 setter 修改；反序列化同样先整体校验
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RatingConfigFields")]
pub struct RatingConfig {
    pub(crate) target: TargetDistribution,
    /// 模糊区间外带的标准差倍数
    pub(crate) fi_sd_multiplier: f64,
    /// 不确定度回升到最大所需的空闲天数
    pub(crate) max_delay: f64,
    /// 不确定度从最大降到 0 所需的游玩次数
    pub(crate) max_play: f64,
    pub(crate) k_const: f64,
    pub(crate) k_up: f64,
    pub(crate) k_down: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatingConfigFields {
    #[serde(default)]
    target: TargetDistribution,
    #[serde(default = "default_fi_sd_multiplier")]
    fi_sd_multiplier: f64,
    #[serde(default = "default_max_delay")]
    max_delay: f64,
    #[serde(default = "default_max_play")]
    max_play: f64,
    #[serde(default = "default_k_const")]
    k_const: f64,
    #[serde(default = "default_k_up")]
    k_up: f64,
    #[serde(default = "default_k_down")]
    k_down: f64,
}

impl TryFrom<RatingConfigFields> for RatingConfig {
    type Error = String;

    fn try_from(fields: RatingConfigFields) -> Result<Self, Self::Error> {
        let config = RatingConfig {
            target: fields.target,
            fi_sd_multiplier: fields.fi_sd_multiplier,
            max_delay: fields.max_delay,
            max_play: fields.max_play,
            k_const: fields.k_const,
            k_up: fields.k_up,
            k_down: fields.k_down,
        };
        config.validate()?;
        Ok(config)
    }
}

fn default_fi_sd_multiplier() -> f64 {
    DEFAULT_FI_SD_MULTIPLIER
}
fn default_max_delay() -> f64 {
    DEFAULT_MAX_DELAY_DAYS
}
fn default_max_play() -> f64 {
    DEFAULT_MAX_PLAY
}
fn default_k_const() -> f64 {
    DEFAULT_K_CONST
}
fn default_k_up() -> f64 {
    DEFAULT_K_UP
}
fn default_k_down() -> f64 {
    DEFAULT_K_DOWN
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            target: TargetDistribution::default(),
            fi_sd_multiplier: DEFAULT_FI_SD_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY_DAYS,
            max_play: DEFAULT_MAX_PLAY,
            k_const: DEFAULT_K_CONST,
            k_up: DEFAULT_K_UP,
            k_down: DEFAULT_K_DOWN,
        }
    }
}

impl RatingConfig {
    pub fn target(&self) -> &TargetDistribution {
        &self.target
    }

    pub fn fi_sd_multiplier(&self) -> f64 {
        self.fi_sd_multiplier
    }

    pub fn max_delay(&self) -> f64 {
        self.max_delay
    }

    pub fn max_play(&self) -> f64 {
        self.max_play
    }

    pub fn k_const(&self) -> f64 {
        self.k_const
    }

    pub fn k_up(&self) -> f64 {
        self.k_up
    }

    pub fn k_down(&self) -> f64 {
        self.k_down
    }

    pub fn validate(&self) -> Result<(), String> {
        self.target.validate()?;
        if !(self.fi_sd_multiplier > 0.0) {
            return Err("fi_sd_multiplier must be > 0".to_string());
        }
        if !(self.max_delay > 0.0) {
            return Err("max_delay must be > 0".to_string());
        }
        if !(self.max_play > 0.0) {
            return Err("max_play must be > 0".to_string());
        }
        if !(self.k_const > 0.0) {
            return Err("k_const must be > 0".to_string());
        }
        if !(self.k_up >= 0.0) {
            return Err("k_up must be >= 0".to_string());
        }
        if !(self.k_down >= 0.0) {
            return Err("k_down must be >= 0".to_string());
        }
        Ok(())
    }
}

// 以下 setter 先构造候选配置整体校验，失败时保留原值
impl RatingConfig {
    fn apply(&mut self, candidate: RatingConfig, field: &'static str) -> Result<(), AdapterError> {
        candidate.validate().map_err(|reason| {
            tracing::warn!(field, %reason, "Rejected rating config setting");
            AdapterError::config(field, reason)
        })?;
        *self = candidate;
        Ok(())
    }

    pub fn set_target_distribution(
        &mut self,
        mean: f64,
        sd: f64,
        lower_limit: f64,
        upper_limit: f64,
    ) -> Result<(), AdapterError> {
        let candidate = RatingConfig {
            target: TargetDistribution {
                mean,
                sd,
                lower_limit,
                upper_limit,
            },
            ..*self
        };
        self.apply(candidate, "targetDistribution")
    }

    pub fn set_fi_sd_multiplier(&mut self, value: f64) -> Result<(), AdapterError> {
        let candidate = RatingConfig {
            fi_sd_multiplier: value,
            ..*self
        };
        self.apply(candidate, "fiSdMultiplier")
    }

    pub fn set_max_delay(&mut self, value: f64) -> Result<(), AdapterError> {
        let candidate = RatingConfig {
            max_delay: value,
            ..*self
        };
        self.apply(candidate, "maxDelay")
    }

    pub fn set_max_play(&mut self, value: f64) -> Result<(), AdapterError> {
        let candidate = RatingConfig {
            max_play: value,
            ..*self
        };
        self.apply(candidate, "maxPlay")
    }

    pub fn set_k_const(&mut self, value: f64) -> Result<(), AdapterError> {
        let candidate = RatingConfig {
            k_const: value,
            ..*self
        };
        self.apply(candidate, "kConst")
    }

    pub fn set_k_up(&mut self, value: f64) -> Result<(), AdapterError> {
        let candidate = RatingConfig { k_up: value, ..*self };
        self.apply(candidate, "kUp")
    }

    pub fn set_k_down(&mut self, value: f64) -> Result<(), AdapterError> {
        let candidate = RatingConfig {
            k_down: value,
            ..*self
        };
        self.apply(candidate, "kDown")
    }

    pub fn reset_target_distribution(&mut self) {
        self.target = TargetDistribution::default();
    }
}

/// 校准期：前 N 次游玩额外增加 K 因子（仅限时适配器）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationConfig {
    pub(crate) player_length: u32,
    pub(crate) scenario_length: u32,
    pub(crate) player_k: f64,
    pub(crate) scenario_k: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            player_length: DEFAULT_PLAYER_CAL_LENGTH,
            scenario_length: DEFAULT_SCENARIO_CAL_LENGTH,
            player_k: DEFAULT_PLAYER_CAL_K,
            scenario_k: DEFAULT_SCENARIO_CAL_K,
        }
    }
}

impl CalibrationConfig {
    pub fn player_length(&self) -> u32 {
        self.player_length
    }

    pub fn scenario_length(&self) -> u32 {
        self.scenario_length
    }

    pub fn player_k(&self) -> f64 {
        self.player_k
    }

    pub fn scenario_k(&self) -> f64 {
        self.scenario_k
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.player_k > 0.0) {
            return Err("calibration.player_k must be > 0".to_string());
        }
        if !(self.scenario_k > 0.0) {
            return Err("calibration.scenario_k must be > 0".to_string());
        }
        Ok(())
    }
}

/// Elo 风格期望得分的底数与步长
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EloScoreConfig {
    pub(crate) magnifier: f64,
    pub(crate) step_size: f64,
}

impl Default for EloScoreConfig {
    fn default() -> Self {
        Self {
            magnifier: DEFAULT_EXPECT_SCORE_MAGNIFIER,
            step_size: DEFAULT_MAGNIFIER_STEP_SIZE,
        }
    }
}

impl EloScoreConfig {
    pub fn magnifier(&self) -> f64 {
        self.magnifier
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.magnifier >= 0.0) {
            return Err("elo.magnifier must be >= 0".to_string());
        }
        if !(self.step_size >= 1.0) {
            return Err("elo.step_size must be >= 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedConfig {
    #[serde(default)]
    pub rating: RatingConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

impl TimedConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.rating.validate()?;
        self.calibration.validate()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyOnlyConfig {
    #[serde(default)]
    pub rating: RatingConfig,
    #[serde(default)]
    pub elo: EloScoreConfig,
}

impl AccuracyOnlyConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.rating.validate()?;
        self.elo.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub timed: TimedConfig,
    #[serde(default)]
    pub accuracy_only: AccuracyOnlyConfig,
    /// 固定种子用于可复现的采样与选择；缺省时使用系统熵
    #[serde(default)]
    pub seed: Option<u64>,
}

impl EngineConfig {
    pub fn from_env(env_config: &crate::config::EngineEnvConfig) -> Self {
        let mut config = Self {
            seed: env_config.seed,
            ..Self::default()
        };
        if let Some(mean) = env_config.target_mean {
            config.timed.rating.target.mean = mean;
            config.accuracy_only.rating.target.mean = mean;
        }
        config
    }

    pub fn validate(&self) -> Result<(), String> {
        self.timed
            .validate()
            .map_err(|e| format!("timed: {e}"))?;
        self.accuracy_only
            .validate()
            .map_err(|e| format!("accuracy_only: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_target_ordering_is_rejected() {
        let mut target = TargetDistribution::default();
        target.lower_limit = target.mean;
        assert!(target.validate().is_err());

        let mut target = TargetDistribution::default();
        target.upper_limit = 0.6;
        assert!(target.validate().is_err());

        let mut target = TargetDistribution::default();
        target.sd = 1.0;
        assert!(target.validate().is_err());
    }

    #[test]
    fn invalid_step_size_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.accuracy_only.elo.step_size = 0.5;
        let err = cfg.validate().unwrap_err();
        assert!(err.starts_with("accuracy_only"));
    }

    #[test]
    fn nan_values_are_rejected() {
        let mut cfg = RatingConfig::default();
        cfg.k_const = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejected_target_distribution_keeps_all_four_values() {
        let mut cfg = RatingConfig::default();
        cfg.set_target_distribution(0.7, 0.05, 0.55, 0.95).unwrap();
        let before = cfg.target;

        let err = cfg.set_target_distribution(0.6, 0.1, 0.6, 0.9).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidConfig { field: "targetDistribution", .. }));
        assert_eq!(cfg.target, before);

        cfg.reset_target_distribution();
        assert_eq!(cfg.target, TargetDistribution::default());
    }

    #[test]
    fn scalar_setters_validate() {
        let mut cfg = RatingConfig::default();
        assert!(cfg.set_max_play(0.0).is_err());
        assert!(cfg.set_max_delay(-1.0).is_err());
        assert!(cfg.set_k_up(f64::NAN).is_err());
        assert_eq!(cfg, RatingConfig::default());

        cfg.set_k_down(0.0).unwrap();
        cfg.set_fi_sd_multiplier(2.0).unwrap();
        assert_eq!(cfg.k_down, 0.0);
        assert_eq!(cfg.fi_sd_multiplier, 2.0);
    }

    #[test]
    fn invalid_rating_json_is_rejected() {
        assert!(serde_json::from_str::<RatingConfig>(r#"{"maxDelay":-1.0}"#).is_err());
        assert!(serde_json::from_str::<RatingConfig>(r#"{"maxPlay":0.0}"#).is_err());
        let err = serde_json::from_str::<EngineConfig>(
            r#"{"accuracyOnly":{"rating":{"target":{"mean":0.5,"sd":0.1,"lowerLimit":0.6,"upperLimit":0.9}}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("lower_limit"));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"timed":{"rating":{"kConst":0.01}}}"#).unwrap();
        assert_eq!(cfg.timed.rating.k_const, 0.01);
        assert_eq!(cfg.timed.rating.max_play, DEFAULT_MAX_PLAY);
        assert_eq!(cfg.accuracy_only, AccuracyOnlyConfig::default());
        assert!(cfg.validate().is_ok());
    }
}
