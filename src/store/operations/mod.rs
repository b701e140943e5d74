pub mod documents;
pub mod gameplay_logs;
pub mod players;
pub mod scenarios;

use serde::de::DeserializeOwned;

use crate::store::{Store, StoreError};

impl Store {
    /// 按前缀扫描并反序列化全部值，顺序与键序一致
    pub(crate) fn scan_values<T: DeserializeOwned>(
        tree: &sled::Tree,
        prefix: &str,
    ) -> Result<Vec<T>, StoreError> {
        let mut values = Vec::new();
        for item in tree.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            values.push(Self::deserialize(&value)?);
        }
        Ok(values)
    }
}
