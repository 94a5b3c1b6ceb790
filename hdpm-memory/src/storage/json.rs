//! JSON file storage for memory snapshots

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::hdpm::HdpmSnapshot;

/// A snapshot persisted as a single pretty-printed JSON document
pub struct JsonSnapshotFile {
    path: PathBuf,
}

impl JsonSnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the configured snapshot path
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.snapshot_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the snapshot, or an empty one if nothing was saved yet
    pub fn load(&self) -> Result<HdpmSnapshot> {
        if !self.path.exists() {
            return Ok(HdpmSnapshot::default());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write the snapshot, replacing the previous file
    pub fn save(&self, snapshot: &HdpmSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write a sibling temp file, then rename it over the target
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, snapshot)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}
