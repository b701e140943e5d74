use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use uuid::Uuid;

use crate::adaptation::types::{AdaptationType, GameplayLogEntry, PlayerRecord, ScenarioRecord};
use crate::store::keys;
use crate::store::{Store, StoreError};

fn log_key(entry: &GameplayLogEntry) -> Result<String, StoreError> {
    keys::gameplay_log_key(
        entry.adaptation_type(),
        entry.game_id(),
        entry.timestamp().timestamp_millis(),
        &Uuid::new_v4().to_string(),
    )
}

impl Store {
    /// 追加一条游戏日志，返回其存储键
    pub fn append_gameplay_log(&self, entry: &GameplayLogEntry) -> Result<String, StoreError> {
        let key = log_key(entry)?;
        self.gameplay_logs
            .insert(key.as_bytes(), Self::serialize(entry)?)?;
        Ok(key)
    }

    /// 一次评分更新的落盘：玩家、（可选）场景与日志在同一事务内写入
    pub fn commit_update(
        &self,
        player: &PlayerRecord,
        scenario: Option<&ScenarioRecord>,
        entry: &GameplayLogEntry,
    ) -> Result<(), StoreError> {
        let player_key =
            keys::player_key(player.adaptation_type(), player.game_id(), player.player_id())?;
        let player_bytes = Self::serialize(player)?;
        let scenario_payload = match scenario {
            Some(s) => Some((
                keys::scenario_key(s.adaptation_type(), s.game_id(), s.scenario_id())?,
                Self::serialize(s)?,
            )),
            None => None,
        };
        let entry_key = log_key(entry)?;
        let entry_bytes = Self::serialize(entry)?;

        (&self.players, &self.scenarios, &self.gameplay_logs)
            .transaction(|(tx_players, tx_scenarios, tx_logs)| {
                tx_players.insert(player_key.as_bytes(), player_bytes.as_slice())?;
                if let Some((key, bytes)) = &scenario_payload {
                    tx_scenarios.insert(key.as_bytes(), bytes.as_slice())?;
                }
                tx_logs.insert(entry_key.as_bytes(), entry_bytes.as_slice())?;
                Ok::<(), ConflictableTransactionError<StoreError>>(())
            })
            .map_err(|error: TransactionError<StoreError>| match error {
                TransactionError::Abort(store_error) => store_error,
                TransactionError::Storage(storage_error) => StoreError::Sled(storage_error),
            })
    }

    /// 按时间先后返回某游戏的全部日志
    pub fn list_gameplay_logs(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
    ) -> Result<Vec<GameplayLogEntry>, StoreError> {
        let prefix = keys::game_prefix(adaptation_type, game_id)?;
        Self::scan_values(&self.gameplay_logs, &prefix)
    }

    pub fn list_player_gameplay_logs(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Result<Vec<GameplayLogEntry>, StoreError> {
        Ok(self
            .list_gameplay_logs(adaptation_type, game_id)?
            .into_iter()
            .filter(|entry| entry.player_id() == player_id)
            .collect())
    }

    pub fn count_gameplay_logs(&self) -> usize {
        self.gameplay_logs.len()
    }
}
