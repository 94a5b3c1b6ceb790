//! Storage backends for hdpm-memory snapshots

mod json;
mod sqlite;

pub use json::JsonSnapshotFile;
pub use sqlite::SqliteSnapshotStore;

use crate::config::{Config, StorageBackend};
use crate::error::Result;
use crate::hdpm::HdpmSnapshot;

/// A place a whole-memory snapshot can be saved to and loaded from
pub trait SnapshotStore: Send + Sync {
    /// Load the saved snapshot; nothing saved yet yields an empty one
    fn load(&self) -> Result<HdpmSnapshot>;

    /// Replace the saved snapshot
    fn save(&self, snapshot: &HdpmSnapshot) -> Result<()>;
}

impl SnapshotStore for JsonSnapshotFile {
    fn load(&self) -> Result<HdpmSnapshot> {
        JsonSnapshotFile::load(self)
    }

    fn save(&self, snapshot: &HdpmSnapshot) -> Result<()> {
        JsonSnapshotFile::save(self, snapshot)
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&self) -> Result<HdpmSnapshot> {
        SqliteSnapshotStore::load(self)
    }

    fn save(&self, snapshot: &HdpmSnapshot) -> Result<()> {
        SqliteSnapshotStore::save(self, snapshot)
    }
}

/// Open the backend selected by `config.storage`
pub fn open(config: &Config) -> Result<Box<dyn SnapshotStore>> {
    match config.storage {
        StorageBackend::Json => Ok(Box::new(JsonSnapshotFile::from_config(config))),
        StorageBackend::Sqlite => Ok(Box::new(SqliteSnapshotStore::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdpm::Hdpm;
    use crate::reflect::ReflectAgent;
    use crate::trajectory::{AgentRole, TrajectoryStep};

    fn filed_snapshot() -> HdpmSnapshot {
        let mut hdpm = Hdpm::new();
        ReflectAgent::default()
            .update_memory(
                &[
                    TrajectoryStep::new(AgentRole::Planner, "Dock ligand Gamma with QuickBind."),
                    TrajectoryStep::new(AgentRole::Critic, "Steric clashes: failure."),
                ],
                -1,
                &mut hdpm,
            )
            .unwrap();
        hdpm.to_snapshot()
    }

    #[test]
    fn configured_backend_writes_its_own_file() {
        for backend in [StorageBackend::Json, StorageBackend::Sqlite] {
            let dir = tempfile::tempdir().unwrap();
            let config = Config {
                storage: backend,
                ..Config::with_data_dir(dir.path())
            };
            let store = open(&config).unwrap();
            assert_eq!(store.load().unwrap(), HdpmSnapshot::default());

            let snapshot = filed_snapshot();
            store.save(&snapshot).unwrap();
            assert_eq!(store.load().unwrap(), snapshot);

            let written = match backend {
                StorageBackend::Json => config.snapshot_path(),
                StorageBackend::Sqlite => config.sqlite_path(),
            };
            assert!(written.exists(), "{} backend wrote nothing", backend);
        }
    }
}
