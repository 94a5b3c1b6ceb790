//! SQLite storage for memory snapshots as flat tables

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};

use crate::config::Config;
use crate::entity::{AtomicEvidenceCard, Insight, PolicyPathway};
use crate::error::{Error, Result};
use crate::hdpm::HdpmSnapshot;
use crate::memory::StoreSnapshot;
use crate::trajectory::{AgentRole, Valence};

const VALENCES: [Valence; 2] = [Valence::Positive, Valence::Negative];

/// SQLite storage backend holding one snapshot
pub struct SqliteSnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSnapshotStore {
    /// Open the configured database
    pub fn new(config: &Config) -> Result<Self> {
        config.ensure_dirs()?;
        Self::open(config.sqlite_path())
    }

    /// Open a database at `path`, creating the schema if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Initialize schema
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Replace the stored snapshot in one transaction
    pub fn save(&self, snapshot: &HdpmSnapshot) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM insights", [])?;
        tx.execute("DELETE FROM pathways", [])?;
        tx.execute("DELETE FROM evidence", [])?;

        for valence in VALENCES {
            let store = match valence {
                Valence::Positive => &snapshot.positive,
                Valence::Negative => &snapshot.negative,
            };
            save_store(&tx, valence, store)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Load the stored snapshot; an empty database yields an empty snapshot
    pub fn load(&self) -> Result<HdpmSnapshot> {
        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;

        Ok(HdpmSnapshot {
            positive: load_store(&conn, Valence::Positive)?,
            negative: load_store(&conn, Valence::Negative)?,
        })
    }
}

fn save_store(tx: &Transaction<'_>, valence: Valence, store: &StoreSnapshot) -> Result<()> {
    let valence = valence.to_string();

    for (seq, card) in store.evidence.values().enumerate() {
        tx.execute(
            r#"
            INSERT INTO evidence (valence, seq, id, content, role, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                valence,
                seq as i64,
                card.id,
                card.content,
                card.role.to_string(),
                card.timestamp.to_rfc3339(),
            ],
        )?;
    }

    for (seq, pathway) in store.pathways.values().enumerate() {
        tx.execute(
            r#"
            INSERT INTO pathways (valence, seq, id, evidence_card_ids, linked_insight_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                valence,
                seq as i64,
                pathway.id,
                serde_json::to_string(&pathway.evidence_card_ids)?,
                pathway.linked_insight_id,
            ],
        )?;
    }

    for (seq, insight) in store.insights.values().enumerate() {
        tx.execute(
            r#"
            INSERT INTO insights (valence, seq, id, content, source_pathway_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                valence,
                seq as i64,
                insight.id,
                insight.content,
                insight.source_pathway_id,
            ],
        )?;
    }

    Ok(())
}

fn load_store(conn: &Connection, valence: Valence) -> Result<StoreSnapshot> {
    let valence = valence.to_string();
    let mut store = StoreSnapshot::default();

    let mut stmt = conn.prepare(
        "SELECT id, content, role, timestamp FROM evidence WHERE valence = ?1 ORDER BY seq",
    )?;
    let rows = stmt.query_map(params![valence], |row| {
        Ok(EvidenceRow {
            id: row.get(0)?,
            content: row.get(1)?,
            role: row.get(2)?,
            timestamp: row.get(3)?,
        })
    })?;
    for row in rows {
        let card = row?.into_card()?;
        store.evidence.insert(card.id.clone(), card);
    }

    let mut stmt = conn.prepare(
        r#"
        SELECT id, evidence_card_ids, linked_insight_id
        FROM pathways WHERE valence = ?1 ORDER BY seq
        "#,
    )?;
    let rows = stmt.query_map(params![valence], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;
    for row in rows {
        let (id, card_ids, linked_insight_id) = row?;
        let pathway = PolicyPathway {
            id: id.clone(),
            evidence_card_ids: serde_json::from_str(&card_ids)?,
            linked_insight_id,
        };
        store.pathways.insert(id, pathway);
    }

    let mut stmt = conn.prepare(
        "SELECT id, content, source_pathway_id FROM insights WHERE valence = ?1 ORDER BY seq",
    )?;
    let rows = stmt.query_map(params![valence], |row| {
        Ok(Insight {
            id: row.get(0)?,
            content: row.get(1)?,
            source_pathway_id: row.get(2)?,
        })
    })?;
    for row in rows {
        let insight = row?;
        store.insights.insert(insight.id.clone(), insight);
    }

    Ok(store)
}

/// Intermediate struct for reading evidence from SQLite
struct EvidenceRow {
    id: String,
    content: String,
    role: String,
    timestamp: String,
}

impl EvidenceRow {
    fn into_card(self) -> Result<AtomicEvidenceCard> {
        let role = self
            .role
            .parse::<AgentRole>()
            .map_err(|_| Error::storage(format!("Unknown role: {}", self.role)))?;

        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::storage(e.to_string()))?;

        Ok(AtomicEvidenceCard {
            id: self.id,
            content: self.content,
            role,
            timestamp,
        })
    }
}
