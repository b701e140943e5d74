pub mod keys;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub players: sled::Tree,
    pub scenarios: sled::Tree,
    pub gameplay_logs: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid key component {component:?}: {reason}")]
    InvalidKey {
        component: String,
        reason: &'static str,
    },
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        Self::from_db(db)
    }

    /// 仅内存、进程退出即丢弃的数据库，用于测试和演示
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let players = db.open_tree(trees::PLAYERS)?;
        let scenarios = db.open_tree(trees::SCENARIOS)?;
        let gameplay_logs = db.open_tree(trees::GAMEPLAY_LOGS)?;
        tracing::debug!(
            players = players.len(),
            scenarios = scenarios.len(),
            gameplay_logs = gameplay_logs.len(),
            "Store opened"
        );
        Ok(Self {
            db,
            players,
            scenarios,
            gameplay_logs,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn raw_db(&self) -> &Db {
        &self.db
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn open_creates_trees() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        let names: Vec<Vec<u8>> = store
            .raw_db()
            .tree_names()
            .into_iter()
            .map(|n| n.to_vec())
            .collect();
        for tree in [trees::PLAYERS, trees::SCENARIOS, trees::GAMEPLAY_LOGS] {
            assert!(names.contains(&tree.as_bytes().to_vec()));
        }
        store.flush().unwrap();
    }
}
