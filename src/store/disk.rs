use crate::core::store::KeyValueStore;
use anyhow::{Context, Result};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "fxcache";

/// fjall-backed store. Every write is synced so a restart sees it.
pub struct DiskStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create store directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open keyspace at {}", path.display()))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open store partition")?;

        debug!(path = %path.display(), "Opened disk store");
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn sync(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist keyspace")
    }
}

impl KeyValueStore for DiskStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(bytes) = self.partition.get(key.as_bytes())? else {
            debug!("Store MISS for key: {}", key);
            return Ok(None);
        };
        debug!("Store HIT for key: {}", key);
        let value = String::from_utf8(bytes.to_vec())
            .with_context(|| format!("Stored value for {key} is not UTF-8"))?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.partition.insert(key.as_bytes(), value.as_bytes())?;
        debug!("Store PUT for key: {}", key);
        self.sync()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.partition.remove(key.as_bytes())?;
        debug!("Store REMOVE for key: {}", key);
        self.sync()
    }
}
