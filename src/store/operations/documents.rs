//! 分层导入导出：适配类型 → 游戏 → {players, scenarios}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::adaptation::types::{AdaptationType, PlayerRecord, ScenarioRecord};
use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDocument {
    #[serde(default)]
    pub players: Vec<PlayerRecord>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdaptationDocument {
    pub games: BTreeMap<AdaptationType, BTreeMap<String, GameDocument>>,
}

impl AdaptationDocument {
    fn game_mut(&mut self, adaptation_type: AdaptationType, game_id: &str) -> &mut GameDocument {
        self.games
            .entry(adaptation_type)
            .or_default()
            .entry(game_id.to_string())
            .or_default()
    }

    pub fn insert_player(&mut self, player: PlayerRecord) {
        self.game_mut(player.adaptation_type(), player.game_id())
            .players
            .push(player);
    }

    pub fn insert_scenario(&mut self, scenario: ScenarioRecord) {
        self.game_mut(scenario.adaptation_type(), scenario.game_id())
            .scenarios
            .push(scenario);
    }

    pub fn game(&self, adaptation_type: AdaptationType, game_id: &str) -> Option<&GameDocument> {
        self.games.get(&adaptation_type)?.get(game_id)
    }

    pub fn record_count(&self) -> usize {
        self.games
            .values()
            .flat_map(|games| games.values())
            .map(|game| game.players.len() + game.scenarios.len())
            .sum()
    }

    /// 每条记录的类型与游戏必须和它在文档中的位置一致，且能构成合法存储键
    pub fn validate(&self) -> Result<(), StoreError> {
        for (adaptation_type, games) in &self.games {
            for (game_id, game) in games {
                let misplaced = game
                    .players
                    .iter()
                    .map(|p| (p.adaptation_type(), p.game_id(), p.player_id()))
                    .chain(
                        game.scenarios
                            .iter()
                            .map(|s| (s.adaptation_type(), s.game_id(), s.scenario_id())),
                    )
                    .find(|(t, g, _)| *t != *adaptation_type || *g != game_id.as_str());
                if let Some((_, _, id)) = misplaced {
                    return Err(StoreError::InvalidDocument(format!(
                        "record {id} is filed under {adaptation_type}/{game_id} but belongs elsewhere"
                    )));
                }
                for player in &game.players {
                    keys::player_key(*adaptation_type, game_id, player.player_id())?;
                }
                for scenario in &game.scenarios {
                    keys::scenario_key(*adaptation_type, game_id, scenario.scenario_id())?;
                }
            }
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let document: Self = serde_json::from_str(raw)?;
        document.validate()?;
        Ok(document)
    }
}

impl Store {
    pub fn export_document(&self) -> Result<AdaptationDocument, StoreError> {
        let mut document = AdaptationDocument::default();
        for adaptation_type in AdaptationType::ALL {
            for player in self.list_players_of_type(adaptation_type)? {
                document.insert_player(player);
            }
            for scenario in self.list_scenarios_of_type(adaptation_type)? {
                document.insert_scenario(scenario);
            }
        }
        Ok(document)
    }

    /// 整体校验后批量写入（覆盖同键记录），返回写入条数
    pub fn import_document(&self, document: &AdaptationDocument) -> Result<usize, StoreError> {
        document.validate()?;

        let mut players = sled::Batch::default();
        let mut scenarios = sled::Batch::default();
        let mut count = 0;
        for (adaptation_type, games) in &document.games {
            for (game_id, game) in games {
                for player in &game.players {
                    let key = keys::player_key(*adaptation_type, game_id, player.player_id())?;
                    players.insert(key.as_bytes(), Self::serialize(player)?);
                    count += 1;
                }
                for scenario in &game.scenarios {
                    let key = keys::scenario_key(*adaptation_type, game_id, scenario.scenario_id())?;
                    scenarios.insert(key.as_bytes(), Self::serialize(scenario)?);
                    count += 1;
                }
            }
        }
        self.players.apply_batch(players)?;
        self.scenarios.apply_batch(scenarios)?;
        tracing::info!(records = count, "Adaptation document imported");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::adaptation::types::RatedRecord;

    fn sample_document() -> AdaptationDocument {
        let mut document = AdaptationDocument::default();
        let mut player = PlayerRecord::new(AdaptationType::Timed, "maze", "alice");
        player.set_rating(2.0).unwrap();
        document.insert_player(player);
        document.insert_scenario(ScenarioRecord::new(AdaptationType::Timed, "maze", "s1"));
        document.insert_scenario(ScenarioRecord::new(
            AdaptationType::AccuracyOnly,
            "quiz",
            "q1",
        ));
        document
    }

    #[test]
    fn document_is_keyed_by_type_then_game() {
        let json = sample_document().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let maze = &value["Game difficulty - Player skill"]["maze"];
        assert_eq!(maze["players"][0]["playerId"], "alice");
        assert_eq!(maze["scenarios"].as_array().unwrap().len(), 1);
        assert!(value["Game difficulty - Player skill (accuracy)"]["quiz"].is_object());
    }

    #[test]
    fn import_then_export_preserves_records() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();

        let document = sample_document();
        assert_eq!(store.import_document(&document).unwrap(), 3);

        let exported = store.export_document().unwrap();
        assert_eq!(exported.record_count(), 3);
        let maze = exported.game(AdaptationType::Timed, "maze").unwrap();
        assert_eq!(maze.players[0].rating(), 2.0);
    }

    #[test]
    fn misplaced_record_is_rejected_before_writing() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();

        let mut document = sample_document();
        document
            .games
            .entry(AdaptationType::Timed)
            .or_default()
            .entry("maze".to_string())
            .or_default()
            .players
            .push(PlayerRecord::new(AdaptationType::Timed, "other", "bob"));

        assert!(matches!(
            store.import_document(&document),
            Err(StoreError::InvalidDocument(_))
        ));
        assert_eq!(store.export_document().unwrap().record_count(), 0);
    }

    #[test]
    fn out_of_range_record_fields_fail_to_parse() {
        let mut value = serde_json::to_value(sample_document()).unwrap();
        let maze = &mut value["Game difficulty - Player skill"]["maze"];
        maze["players"][0]["kFactor"] = serde_json::json!(-2.0);
        maze["players"][0]["uncertainty"] = serde_json::json!(5.0);
        assert!(matches!(
            AdaptationDocument::from_json(&value.to_string()),
            Err(StoreError::Serialization(_))
        ));

        let mut value = serde_json::to_value(sample_document()).unwrap();
        value["Game difficulty - Player skill"]["maze"]["scenarios"][0]["timeLimit"] =
            serde_json::json!(-1.0);
        let err = AdaptationDocument::from_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("timeLimit"));
    }
}
