use crate::adaptation::types::{AdaptationType, PlayerRecord};
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn upsert_player(&self, player: &PlayerRecord) -> Result<(), StoreError> {
        let key = keys::player_key(player.adaptation_type(), player.game_id(), player.player_id())?;
        self.players
            .insert(key.as_bytes(), Self::serialize(player)?)?;
        Ok(())
    }

    pub fn get_player(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Result<Option<PlayerRecord>, StoreError> {
        let key = keys::player_key(adaptation_type, game_id, player_id)?;
        match self.players.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// 返回是否确实删除了记录
    pub fn delete_player(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        player_id: &str,
    ) -> Result<bool, StoreError> {
        let key = keys::player_key(adaptation_type, game_id, player_id)?;
        Ok(self.players.remove(key.as_bytes())?.is_some())
    }

    pub fn list_players(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
    ) -> Result<Vec<PlayerRecord>, StoreError> {
        let prefix = keys::game_prefix(adaptation_type, game_id)?;
        Self::scan_values(&self.players, &prefix)
    }

    pub fn list_players_of_type(
        &self,
        adaptation_type: AdaptationType,
    ) -> Result<Vec<PlayerRecord>, StoreError> {
        Self::scan_values(&self.players, &keys::type_prefix(adaptation_type))
    }
}
