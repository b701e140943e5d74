//! Key layout: `<type code>:<game>:<id>` for records and
//! `<type code>:<game>:<ms timestamp, zero padded>:<entry id>` for the log, so
//! a prefix scan over a game returns log entries oldest first.

use crate::adaptation::types::AdaptationType;
use crate::store::StoreError;
use crate::validation::validate_key_component;

fn checked(component: &str) -> Result<&str, StoreError> {
    validate_key_component(component).map_err(|reason| StoreError::InvalidKey {
        component: component.to_string(),
        reason,
    })?;
    Ok(component)
}

pub fn type_prefix(adaptation_type: AdaptationType) -> String {
    format!("{}:", adaptation_type.code())
}

pub fn game_prefix(adaptation_type: AdaptationType, game_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:{}:", adaptation_type.code(), checked(game_id)?))
}

pub fn player_key(
    adaptation_type: AdaptationType,
    game_id: &str,
    player_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}{}",
        game_prefix(adaptation_type, game_id)?,
        checked(player_id)?
    ))
}

pub fn scenario_key(
    adaptation_type: AdaptationType,
    game_id: &str,
    scenario_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}{}",
        game_prefix(adaptation_type, game_id)?,
        checked(scenario_id)?
    ))
}

pub fn gameplay_log_key(
    adaptation_type: AdaptationType,
    game_id: &str,
    timestamp_ms: i64,
    entry_id: &str,
) -> Result<String, StoreError> {
    let ts = timestamp_ms.max(0) as u64;
    Ok(format!(
        "{}{:020}:{}",
        game_prefix(adaptation_type, game_id)?,
        ts,
        checked(entry_id)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_type_and_game() {
        let key = player_key(AdaptationType::Timed, "g1", "p1").unwrap();
        assert_eq!(key, "timed:g1:p1");
        let key = scenario_key(AdaptationType::AccuracyOnly, "g1", "s1").unwrap();
        assert_eq!(key, "accuracy:g1:s1");
        assert!(key.starts_with(&game_prefix(AdaptationType::AccuracyOnly, "g1").unwrap()));
    }

    #[test]
    fn log_keys_sort_chronologically() {
        let early = gameplay_log_key(AdaptationType::Timed, "g", 999, "b").unwrap();
        let late = gameplay_log_key(AdaptationType::Timed, "g", 1_000, "a").unwrap();
        assert!(early < late);
    }

    #[test]
    fn separator_in_component_is_rejected() {
        assert!(matches!(
            player_key(AdaptationType::Timed, "g:x", "p"),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(player_key(AdaptationType::Timed, "g", "").is_err());
    }
}
