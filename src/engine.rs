//! 引擎门面：按适配类型持有适配器、玩家与场景集合以及游戏日志，
//! 可选地把每次变更同步到 sled。

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::adaptation::accuracy::AccuracyOnlyAdapter;
use crate::adaptation::config::EngineConfig;
use crate::adaptation::rating::FuzzyInterval;
use crate::adaptation::timed::TimedAdapter;
use crate::adaptation::types::{
    AdaptationType, Attempt, GameplayLogEntry, PlayerRecord, RatedRecord, ScenarioRecord,
};
use crate::adaptation::{Adapter, AdapterError};
use crate::store::operations::documents::AdaptationDocument;
use crate::store::{Store, StoreError};
use crate::validation::validate_key_component;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("player not found: {adaptation_type}/{game_id}/{player_id}")]
    PlayerNotFound {
        adaptation_type: AdaptationType,
        game_id: String,
        player_id: String,
    },
    #[error("scenario not found: {adaptation_type}/{game_id}/{scenario_id}")]
    ScenarioNotFound {
        adaptation_type: AdaptationType,
        game_id: String,
        scenario_id: String,
    },
    #[error("{entity} already registered: {id}")]
    Duplicate { entity: &'static str, id: String },
    #[error("adaptation type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: AdaptationType,
        actual: AdaptationType,
    },
    #[error("invalid id {id:?}: {reason}")]
    InvalidId { id: String, reason: &'static str },
    #[error("no store attached")]
    NoStore,
}

type GameKey = (AdaptationType, String);

fn game_key(adaptation_type: AdaptationType, game_id: &str) -> GameKey {
    (adaptation_type, game_id.to_string())
}

fn check_id(id: &str) -> Result<(), EngineError> {
    validate_key_component(id).map_err(|reason| EngineError::InvalidId {
        id: id.to_string(),
        reason,
    })
}

/// 一次试算的结果；引擎内状态不变
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePreview {
    pub player: PlayerRecord,
    pub scenario: ScenarioRecord,
    pub entry: GameplayLogEntry,
}

#[derive(Debug)]
struct Adapters {
    timed: Adapter,
    accuracy_only: Adapter,
}

impl Adapters {
    fn from_config(config: &EngineConfig) -> Self {
        let (timed, accuracy_only) = match config.seed {
            Some(seed) => (
                TimedAdapter::with_seed(config.timed, seed),
                AccuracyOnlyAdapter::with_seed(config.accuracy_only, seed.wrapping_add(2)),
            ),
            None => (
                TimedAdapter::new(config.timed),
                AccuracyOnlyAdapter::new(config.accuracy_only),
            ),
        };
        Self {
            timed: Adapter::Timed(timed),
            accuracy_only: Adapter::AccuracyOnly(accuracy_only),
        }
    }

    fn get(&self, adaptation_type: AdaptationType) -> &Adapter {
        match adaptation_type {
            AdaptationType::Timed => &self.timed,
            AdaptationType::AccuracyOnly => &self.accuracy_only,
        }
    }

    fn get_mut(&mut self, adaptation_type: AdaptationType) -> &mut Adapter {
        match adaptation_type {
            AdaptationType::Timed => &mut self.timed,
            AdaptationType::AccuracyOnly => &mut self.accuracy_only,
        }
    }
}

#[derive(Debug)]
pub struct DifficultyEngine {
    adapters: Adapters,
    players: HashMap<GameKey, BTreeMap<String, PlayerRecord>>,
    scenarios: HashMap<GameKey, BTreeMap<String, ScenarioRecord>>,
    gameplay_log: Vec<GameplayLogEntry>,
    store: Option<Store>,
}

impl DifficultyEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate().map_err(|reason| {
            tracing::warn!(%reason, "Rejected engine config");
            AdapterError::config("engine", reason)
        })?;
        Ok(Self {
            adapters: Adapters::from_config(&config),
            players: HashMap::new(),
            scenarios: HashMap::new(),
            gameplay_log: Vec::new(),
            store: None,
        })
    }

    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    pub fn adapter(&self, adaptation_type: AdaptationType) -> &Adapter {
        self.adapters.get(adaptation_type)
    }

    pub fn adapter_mut(&mut self, adaptation_type: AdaptationType) -> &mut Adapter {
        self.adapters.get_mut(adaptation_type)
    }

    /// 两个适配器分别使用 `seed` 与 `seed + 2` 起始的随机流
    pub fn reseed(&mut self, seed: u64) {
        self.adapters.timed.reseed(seed);
        self.adapters.accuracy_only.reseed(seed.wrapping_add(2));
    }

    // ── 玩家 ──

    pub fn add_player(
        &mut self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Result<&PlayerRecord, EngineError> {
        self.insert_player(PlayerRecord::new(adaptation_type, game_id, player_id))
    }

    /// 注册一个已有状态的玩家（如从外部导入）；同键已存在时报错
    pub fn insert_player(&mut self, player: PlayerRecord) -> Result<&PlayerRecord, EngineError> {
        check_id(player.game_id())?;
        check_id(player.player_id())?;
        let key = game_key(player.adaptation_type(), player.game_id());
        if self
            .players
            .get(&key)
            .is_some_and(|game| game.contains_key(player.player_id()))
        {
            return Err(EngineError::Duplicate {
                entity: "player",
                id: player.player_id().to_string(),
            });
        }
        if let Some(store) = &self.store {
            store.upsert_player(&player)?;
        }
        tracing::info!(
            adaptation_type = %player.adaptation_type(),
            game_id = player.game_id(),
            player_id = player.player_id(),
            "Player registered"
        );
        let id = player.player_id().to_string();
        Ok(&*self
            .players
            .entry(key)
            .or_default()
            .entry(id)
            .or_insert(player))
    }

    /// 不存在时以默认值创建
    pub fn ensure_player(
        &mut self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Result<&PlayerRecord, EngineError> {
        if self.player(adaptation_type, game_id, player_id).is_none() {
            self.add_player(adaptation_type, game_id, player_id)?;
        }
        self.player(adaptation_type, game_id, player_id)
            .ok_or_else(|| EngineError::PlayerNotFound {
                adaptation_type,
                game_id: game_id.to_string(),
                player_id: player_id.to_string(),
            })
    }

    pub fn remove_player(
        &mut self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Result<PlayerRecord, EngineError> {
        let removed = self
            .players
            .get_mut(&game_key(adaptation_type, game_id))
            .and_then(|game| game.remove(player_id))
            .ok_or_else(|| EngineError::PlayerNotFound {
                adaptation_type,
                game_id: game_id.to_string(),
                player_id: player_id.to_string(),
            })?;
        if let Some(store) = &self.store {
            store.delete_player(adaptation_type, game_id, player_id)?;
        }
        Ok(removed)
    }

    pub fn player(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Option<&PlayerRecord> {
        self.players
            .get(&game_key(adaptation_type, game_id))?
            .get(player_id)
    }

    pub fn players_in_game(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
    ) -> Vec<&PlayerRecord> {
        self.players
            .get(&game_key(adaptation_type, game_id))
            .map(|game| game.values().collect())
            .unwrap_or_default()
    }

    // ── 场景 ──

    pub fn add_scenario(
        &mut self,
        adaptation_type: AdaptationType,
        game_id: &str,
        scenario_id: &str,
    ) -> Result<&ScenarioRecord, EngineError> {
        self.insert_scenario(ScenarioRecord::new(adaptation_type, game_id, scenario_id))
    }

    pub fn insert_scenario(
        &mut self,
        scenario: ScenarioRecord,
    ) -> Result<&ScenarioRecord, EngineError> {
        check_id(scenario.game_id())?;
        check_id(scenario.scenario_id())?;
        let key = game_key(scenario.adaptation_type(), scenario.game_id());
        if self
            .scenarios
            .get(&key)
            .is_some_and(|game| game.contains_key(scenario.scenario_id()))
        {
            return Err(EngineError::Duplicate {
                entity: "scenario",
                id: scenario.scenario_id().to_string(),
            });
        }
        if let Some(store) = &self.store {
            store.upsert_scenario(&scenario)?;
        }
        tracing::info!(
            adaptation_type = %scenario.adaptation_type(),
            game_id = scenario.game_id(),
            scenario_id = scenario.scenario_id(),
            "Scenario registered"
        );
        let id = scenario.scenario_id().to_string();
        Ok(&*self
            .scenarios
            .entry(key)
            .or_default()
            .entry(id)
            .or_insert(scenario))
    }

    pub fn remove_scenario(
        &mut self,
        adaptation_type: AdaptationType,
        game_id: &str,
        scenario_id: &str,
    ) -> Result<ScenarioRecord, EngineError> {
        let removed = self
            .scenarios
            .get_mut(&game_key(adaptation_type, game_id))
            .and_then(|game| game.remove(scenario_id))
            .ok_or_else(|| EngineError::ScenarioNotFound {
                adaptation_type,
                game_id: game_id.to_string(),
                scenario_id: scenario_id.to_string(),
            })?;
        if let Some(store) = &self.store {
            store.delete_scenario(adaptation_type, game_id, scenario_id)?;
        }
        Ok(removed)
    }

    pub fn scenario(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        scenario_id: &str,
    ) -> Option<&ScenarioRecord> {
        self.scenarios
            .get(&game_key(adaptation_type, game_id))?
            .get(scenario_id)
    }

    pub fn scenarios_in_game(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
    ) -> Vec<&ScenarioRecord> {
        self.scenarios
            .get(&game_key(adaptation_type, game_id))
            .map(|game| game.values().collect())
            .unwrap_or_default()
    }

    fn require_player(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Result<&PlayerRecord, EngineError> {
        self.player(adaptation_type, game_id, player_id)
            .ok_or_else(|| {
                tracing::warn!(%adaptation_type, game_id, player_id, "Unknown player");
                EngineError::PlayerNotFound {
                    adaptation_type,
                    game_id: game_id.to_string(),
                    player_id: player_id.to_string(),
                }
            })
    }

    fn require_scenario(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        scenario_id: &str,
    ) -> Result<&ScenarioRecord, EngineError> {
        self.scenario(adaptation_type, game_id, scenario_id)
            .ok_or_else(|| {
                tracing::warn!(%adaptation_type, game_id, scenario_id, "Unknown scenario");
                EngineError::ScenarioNotFound {
                    adaptation_type,
                    game_id: game_id.to_string(),
                    scenario_id: scenario_id.to_string(),
                }
            })
    }

    // ── 评分 ──

    pub fn update_ratings(
        &mut self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
        scenario_id: &str,
        attempt: &Attempt,
    ) -> Result<GameplayLogEntry, EngineError> {
        self.update_ratings_at(
            adaptation_type,
            game_id,
            player_id,
            scenario_id,
            attempt,
            Utc::now(),
        )
    }

    /// 在副本上计算并先落盘，成功后才替换内存中的记录并追加日志
    pub fn update_ratings_at(
        &mut self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
        scenario_id: &str,
        attempt: &Attempt,
        now: DateTime<Utc>,
    ) -> Result<GameplayLogEntry, EngineError> {
        let UpdatePreview {
            player,
            scenario,
            entry,
        } = self.preview_update_at(adaptation_type, game_id, player_id, scenario_id, attempt, now)?;

        if let Some(store) = &self.store {
            store.commit_update(&player, attempt.update_scenario.then_some(&scenario), &entry)?;
        }

        let key = game_key(adaptation_type, game_id);
        if let Some(slot) = self
            .players
            .get_mut(&key)
            .and_then(|game| game.get_mut(player_id))
        {
            *slot = player;
        }
        if attempt.update_scenario {
            if let Some(slot) = self
                .scenarios
                .get_mut(&key)
                .and_then(|game| game.get_mut(scenario_id))
            {
                *slot = scenario;
            }
        }
        self.gameplay_log.push(entry.clone());
        Ok(entry)
    }

    /// 试算一次更新：返回更新后的副本和将产生的日志，不修改任何状态
    pub fn preview_update(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
        scenario_id: &str,
        attempt: &Attempt,
    ) -> Result<UpdatePreview, EngineError> {
        self.preview_update_at(
            adaptation_type,
            game_id,
            player_id,
            scenario_id,
            attempt,
            Utc::now(),
        )
    }

    pub fn preview_update_at(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
        scenario_id: &str,
        attempt: &Attempt,
        now: DateTime<Utc>,
    ) -> Result<UpdatePreview, EngineError> {
        let mut player = self
            .require_player(adaptation_type, game_id, player_id)?
            .clone();
        let mut scenario = self
            .require_scenario(adaptation_type, game_id, scenario_id)?
            .clone();
        let entry = self
            .adapters
            .get(adaptation_type)
            .update_ratings_at(&mut player, &mut scenario, attempt, now)?;
        Ok(UpdatePreview {
            player,
            scenario,
            entry,
        })
    }

    /// 更新调用方自行持有的记录；两条记录必须属于同一适配类型。
    /// 日志照常追加，但不落盘。
    pub fn update_records(
        &mut self,
        player: &mut PlayerRecord,
        scenario: &mut ScenarioRecord,
        attempt: &Attempt,
    ) -> Result<GameplayLogEntry, EngineError> {
        if player.adaptation_type() != scenario.adaptation_type() {
            return Err(EngineError::TypeMismatch {
                expected: player.adaptation_type(),
                actual: scenario.adaptation_type(),
            });
        }
        let entry = self
            .adapters
            .get(player.adaptation_type())
            .update_ratings_at(player, scenario, attempt, Utc::now())?;
        self.gameplay_log.push(entry.clone());
        Ok(entry)
    }

    pub fn target_scenario(
        &mut self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Result<&ScenarioRecord, EngineError> {
        let key = game_key(adaptation_type, game_id);
        let player = self
            .players
            .get(&key)
            .and_then(|game| game.get(player_id))
            .ok_or_else(|| EngineError::PlayerNotFound {
                adaptation_type,
                game_id: game_id.to_string(),
                player_id: player_id.to_string(),
            })?;
        let candidates = self
            .scenarios
            .get(&key)
            .into_iter()
            .flat_map(|game| game.values());
        Ok(self
            .adapters
            .get_mut(adaptation_type)
            .target_scenario(player, candidates)?)
    }

    pub fn target_interval(
        &mut self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Result<FuzzyInterval, EngineError> {
        let theta = self
            .require_player(adaptation_type, game_id, player_id)?
            .rating();
        Ok(self
            .adapters
            .get_mut(adaptation_type)
            .calc_target_betas(theta)?)
    }

    pub fn target_difficulty_rating(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Result<f64, EngineError> {
        let theta = self
            .require_player(adaptation_type, game_id, player_id)?
            .rating();
        Ok(self
            .adapters
            .get(adaptation_type)
            .target_difficulty_rating(theta))
    }

    /// 限时适配器使用场景自身的时间上限
    pub fn expected_score(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
        scenario_id: &str,
    ) -> Result<f64, EngineError> {
        let player = self.require_player(adaptation_type, game_id, player_id)?;
        let scenario = self.require_scenario(adaptation_type, game_id, scenario_id)?;
        Ok(self.adapters.get(adaptation_type).expected_score(
            player.rating(),
            scenario.rating(),
            Some(scenario.time_limit()),
        )?)
    }

    // ── 日志 ──

    pub fn gameplay_log(&self) -> &[GameplayLogEntry] {
        &self.gameplay_log
    }

    pub fn gameplay_log_for_player(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Vec<&GameplayLogEntry> {
        self.gameplay_log
            .iter()
            .filter(|entry| {
                entry.adaptation_type() == adaptation_type
                    && entry.game_id() == game_id
                    && entry.player_id() == player_id
            })
            .collect()
    }

    // ── 持久化 ──

    /// 从存储中载入某个游戏的玩家与场景，覆盖内存中的同名记录；返回 (玩家数, 场景数)
    pub fn load_game(
        &mut self,
        adaptation_type: AdaptationType,
        game_id: &str,
    ) -> Result<(usize, usize), EngineError> {
        let store = self.store.as_ref().ok_or(EngineError::NoStore)?;
        let players = store.list_players(adaptation_type, game_id)?;
        let scenarios = store.list_scenarios(adaptation_type, game_id)?;
        let counts = (players.len(), scenarios.len());

        let key = game_key(adaptation_type, game_id);
        let player_slot = self.players.entry(key.clone()).or_default();
        for player in players {
            player_slot.insert(player.player_id().to_string(), player);
        }
        let scenario_slot = self.scenarios.entry(key).or_default();
        for scenario in scenarios {
            scenario_slot.insert(scenario.scenario_id().to_string(), scenario);
        }
        tracing::info!(
            %adaptation_type,
            game_id,
            players = counts.0,
            scenarios = counts.1,
            "Game loaded from store"
        );
        Ok(counts)
    }

    /// 导出内存中的全部记录
    pub fn to_document(&self) -> AdaptationDocument {
        let mut document = AdaptationDocument::default();
        for game in self.players.values() {
            for player in game.values() {
                document.insert_player(player.clone());
            }
        }
        for game in self.scenarios.values() {
            for scenario in game.values() {
                document.insert_scenario(scenario.clone());
            }
        }
        document
    }

    /// 导入文档（覆盖同键记录）；挂载了存储时一并写入
    pub fn import_document(&mut self, document: &AdaptationDocument) -> Result<usize, EngineError> {
        document.validate()?;
        if let Some(store) = &self.store {
            store.import_document(document)?;
        }
        let mut count = 0;
        for (adaptation_type, games) in &document.games {
            for (game_id, game) in games {
                let key = game_key(*adaptation_type, game_id);
                let players = self.players.entry(key.clone()).or_default();
                for player in &game.players {
                    players.insert(player.player_id().to_string(), player.clone());
                    count += 1;
                }
                let scenarios = self.scenarios.entry(key).or_default();
                for scenario in &game.scenarios {
                    scenarios.insert(scenario.scenario_id().to_string(), scenario.clone());
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}
