pub mod disk;
pub mod memory;

use crate::core::store::KeyValueStore;
use disk::DiskStore;
use memory::MemoryStore;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Opens the disk store under `data_path`, falling back to memory.
///
/// A missing disk store only costs an extra fetch on the next start, so it
/// is not fatal.
pub fn open_store(data_path: &Path) -> Arc<dyn KeyValueStore> {
    match DiskStore::open(&data_path.join("store")) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "Disk store unavailable, rates will not persist");
            Arc::new(MemoryStore::new())
        }
    }
}
