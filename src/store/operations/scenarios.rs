use crate::adaptation::types::{AdaptationType, ScenarioRecord};
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn upsert_scenario(&self, scenario: &ScenarioRecord) -> Result<(), StoreError> {
        let key = keys::scenario_key(
            scenario.adaptation_type(),
            scenario.game_id(),
            scenario.scenario_id(),
        )?;
        self.scenarios
            .insert(key.as_bytes(), Self::serialize(scenario)?)?;
        Ok(())
    }

    pub fn get_scenario(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        scenario_id: &str,
    ) -> Result<Option<ScenarioRecord>, StoreError> {
        let key = keys::scenario_key(adaptation_type, game_id, scenario_id)?;
        match self.scenarios.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn delete_scenario(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
        scenario_id: &str,
    ) -> Result<bool, StoreError> {
        let key = keys::scenario_key(adaptation_type, game_id, scenario_id)?;
        Ok(self.scenarios.remove(key.as_bytes())?.is_some())
    }

    pub fn list_scenarios(
        &self,
        adaptation_type: AdaptationType,
        game_id: &str,
    ) -> Result<Vec<ScenarioRecord>, StoreError> {
        let prefix = keys::game_prefix(adaptation_type, game_id)?;
        Self::scan_values(&self.scenarios, &prefix)
    }

    pub fn list_scenarios_of_type(
        &self,
        adaptation_type: AdaptationType,
    ) -> Result<Vec<ScenarioRecord>, StoreError> {
        Self::scan_values(&self.scenarios, &keys::type_prefix(adaptation_type))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::adaptation::types::{AdaptationType, RatedRecord, ScenarioRecord};
    use crate::store::Store;

    #[test]
    fn scenario_time_limit_survives_storage() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();

        let mut scenario = ScenarioRecord::new(AdaptationType::Timed, "maze", "hard");
        scenario.set_time_limit(45_000.0).unwrap();
        scenario.set_rating(4.0).unwrap();
        store.upsert_scenario(&scenario).unwrap();

        let loaded = store
            .get_scenario(AdaptationType::Timed, "maze", "hard")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.time_limit(), 45_000.0);
        assert_eq!(loaded.rating(), 4.0);
        assert_eq!(store.list_scenarios(AdaptationType::Timed, "maze").unwrap().len(), 1);

        assert!(store.delete_scenario(AdaptationType::Timed, "maze", "hard").unwrap());
        assert!(store.list_scenarios_of_type(AdaptationType::Timed).unwrap().is_empty());
    }
}
