//! Configuration for hdpm-memory

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

/// Where snapshots are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageBackend {
    /// One pretty-printed JSON file at [`Config::snapshot_path`]
    #[default]
    Json,
    /// Flat tables in the database at [`Config::sqlite_path`]
    Sqlite,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Json => write!(f, "json"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(StorageBackend::Json),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(Error::config(format!("Unknown storage backend: {}", other))),
        }
    }
}

/// Configuration for the memory system
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for persisted snapshots
    pub data_dir: PathBuf,

    /// Snapshot persistence used by the server
    pub storage: StorageBackend,

    /// Number of insights retrieved per valence when a caller gives no k
    pub default_top_k: usize,

    /// Minimum relevance score for retrieval. `None` keeps every candidate.
    pub min_score: Option<f32>,

    /// Maximum evidence cards quoted per prompt section
    pub max_evidence_per_section: usize,

    /// Maximum length (in characters) of a distilled insight
    pub max_insight_chars: usize,

    /// Trajectories shorter than this are not worth distilling
    pub min_trajectory_steps: usize,

    /// HTTP server port
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hdpm-memory");

        Self {
            data_dir,
            storage: StorageBackend::default(),
            default_top_k: 1,
            min_score: None,
            max_evidence_per_section: 3,
            max_insight_chars: 300,
            min_trajectory_steps: 1,
            server_port: 8430,
        }
    }
}

impl Config {
    /// Create a new config with a custom data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Get the path to the JSON snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("hdpm.json")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("hdpm.db")
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}
