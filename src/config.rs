use std::env;
use std::str::FromStr;

use crate::logging::LogConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub log: LogConfig,
    pub sled_path: String,
    /// 关闭时引擎只在内存中运行，不打开 sled
    pub persist: bool,
    pub engine: EngineEnvConfig,
    pub simulation: SimulationConfig,
}

/// 覆盖引擎默认参数的环境变量；未设置时使用内置默认值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineEnvConfig {
    pub seed: Option<u64>,
    pub target_mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub rounds: u32,
    pub scenarios: u32,
    /// 模拟玩家的真实能力（与场景评分同一量纲）
    pub player_skill: f64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            log: LogConfig {
                log_level: env_or("RUST_LOG", "info"),
                enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
                log_dir: env_or("LOG_DIR", "./logs"),
            },
            sled_path: env_or("SLED_PATH", "./data/adaptive-difficulty.sled"),
            persist: env_or_bool("PERSIST", false),
            engine: EngineEnvConfig {
                seed: env_opt_parse("ENGINE_SEED"),
                target_mean: env_opt_parse("TARGET_DISTR_MEAN"),
            },
            simulation: SimulationConfig {
                rounds: env_or_parse("SIM_ROUNDS", 200_u32),
                scenarios: env_or_parse("SIM_SCENARIOS", 12_u32),
                player_skill: env_or_parse("SIM_PLAYER_SKILL", 2.5_f64),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    env_opt_parse(key).unwrap_or(default)
}

/// 未设置返回 None；设置了但无法解析时记录警告并同样返回 None
pub fn env_opt_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Failed to parse env var, using default");
            None
        }
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                tracing::warn!(key, value = %raw, "Unrecognised boolean env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "RUST_LOG",
            "PERSIST",
            "ENGINE_SEED",
            "TARGET_DISTR_MEAN",
            "SIM_ROUNDS",
            "SIM_PLAYER_SKILL",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.log.log_level, "info");
        assert!(!cfg.persist);
        assert_eq!(cfg.engine, EngineEnvConfig::default());
        assert_eq!(cfg.simulation.rounds, 200);
    }

    #[test]
    fn parses_engine_overrides() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("ENGINE_SEED", "42");
        env::set_var("TARGET_DISTR_MEAN", "0.7");
        env::set_var("SIM_ROUNDS", "15");
        env::set_var("PERSIST", "yes");

        let cfg = Config::from_env();
        assert_eq!(cfg.engine.seed, Some(42));
        assert_eq!(cfg.engine.target_mean, Some(0.7));
        assert_eq!(cfg.simulation.rounds, 15);
        assert!(cfg.persist);
        clear_keys(managed_keys());
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("ENGINE_SEED", "not-a-number");
        env::set_var("SIM_PLAYER_SKILL", "x");
        env::set_var("PERSIST", "maybe");

        let cfg = Config::from_env();
        assert_eq!(cfg.engine.seed, None);
        assert_eq!(cfg.simulation.player_skill, 2.5);
        assert!(!cfg.persist);
        clear_keys(managed_keys());
    }
}
