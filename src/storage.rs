use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::now_s;
use crate::plate::{is_valid_plate, normalize_plate_text};

/// Owner reported for plates that are not on the allow-list.
pub const GUEST_OWNER: &str = "guest";

/// Allow-list verdict for one plate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub owner: String,
    pub user_id: Option<i64>,
}

impl AccessDecision {
    pub fn guest() -> Self {
        Self {
            allowed: false,
            owner: GUEST_OWNER.to_string(),
            user_id: None,
        }
    }
}

/// One audit row to be written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub plate: String,
    pub allowed: bool,
    pub description: String,
    pub user_id: Option<i64>,
    pub timestamp_s: u64,
}

/// One audit row as stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub id: i64,
    pub plate: String,
    pub allowed: bool,
    pub description: String,
    pub user_id: Option<i64>,
    pub timestamp_s: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedPlate {
    pub plate: String,
    pub owner: String,
    pub user_id: i64,
    pub created_at_s: u64,
}

/// Allow-list and decision audit log.
pub trait AccessStore {
    fn lookup(&mut self, plate: &str) -> Result<AccessDecision>;

    fn record_decision(&mut self, record: &DecisionRecord) -> Result<()>;

    /// Newest first.
    fn recent_decisions(&mut self, limit: usize) -> Result<Vec<AccessLogEntry>>;

    fn latest_decision(&mut self) -> Result<Option<AccessLogEntry>> {
        Ok(self.recent_decisions(1)?.into_iter().next())
    }

    /// Add `plate` for `owner`. The plate is normalized first and must be valid.
    fn allow_plate(&mut self, plate: &str, owner: &str) -> Result<AllowedPlate>;

    /// Returns whether a plate was removed.
    fn revoke_plate(&mut self, plate: &str) -> Result<bool>;

    fn allowed_plates(&mut self) -> Result<Vec<AllowedPlate>>;
}

fn admissible_plate(raw: &str) -> Result<String> {
    let plate = normalize_plate_text(raw);
    if !is_valid_plate(&plate) {
        return Err(anyhow!("'{}' is not a valid plate", raw));
    }
    Ok(plate)
}

fn admissible_owner(owner: &str) -> Result<&str> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(anyhow!("owner name must not be empty"));
    }
    Ok(owner)
}

fn epoch_i64(seconds: u64) -> Result<i64> {
    i64::try_from(seconds).map_err(|_| anyhow!("timestamp exceeds i64 range"))
}

// ----------------------------------------------------------------------------
// SQLite
// ----------------------------------------------------------------------------

pub struct SqliteAccessStore {
    conn: Connection,
}

impl SqliteAccessStore {
    /// Open (or create) the database at `db_path`; `file:` URIs are accepted.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = crate::open_db_connection(db_path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS users (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL UNIQUE,
              created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS allowed_plates (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              plate_number TEXT NOT NULL UNIQUE,
              user_id INTEGER NOT NULL REFERENCES users(id),
              created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS access_logs (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              plate_number TEXT NOT NULL,
              access_status INTEGER NOT NULL,
              vlm_description TEXT NOT NULL,
              related_user_id INTEGER REFERENCES users(id),
              timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_access_logs_plate ON access_logs(plate_number);
            "#,
        )?;
        Ok(())
    }

    fn user_id_for(&self, owner: &str) -> Result<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE name = ?1",
                params![owner],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        self.conn.execute(
            "INSERT INTO users(name, created_at) VALUES (?1, ?2)",
            params![owner, epoch_i64(now_s()?)?],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl AccessStore for SqliteAccessStore {
    fn lookup(&mut self, plate: &str) -> Result<AccessDecision> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT p.user_id, u.name
                FROM allowed_plates p JOIN users u ON u.id = p.user_id
                WHERE p.plate_number = ?1
                "#,
                params![plate],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(match row {
            Some((user_id, owner)) => AccessDecision {
                allowed: true,
                owner,
                user_id: Some(user_id),
            },
            None => AccessDecision::guest(),
        })
    }

    fn record_decision(&mut self, record: &DecisionRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO access_logs(plate_number, access_status, vlm_description, related_user_id, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.plate,
                record.allowed,
                record.description,
                record.user_id,
                epoch_i64(record.timestamp_s)?
            ],
        )?;
        Ok(())
    }

    fn recent_decisions(&mut self, limit: usize) -> Result<Vec<AccessLogEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, plate_number, access_status, vlm_description, related_user_id, timestamp
            FROM access_logs ORDER BY id DESC LIMIT ?1
            "#,
        )?;
        let mut rows = stmt.query(params![limit])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let timestamp: i64 = row.get(5)?;
            out.push(AccessLogEntry {
                id: row.get(0)?,
                plate: row.get(1)?,
                allowed: row.get(2)?,
                description: row.get(3)?,
                user_id: row.get(4)?,
                timestamp_s: u64::try_from(timestamp)
                    .map_err(|_| anyhow!("corrupt access log: negative timestamp"))?,
            });
        }
        Ok(out)
    }

    fn allow_plate(&mut self, plate: &str, owner: &str) -> Result<AllowedPlate> {
        let plate = admissible_plate(plate)?;
        let owner = admissible_owner(owner)?;
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM allowed_plates WHERE plate_number = ?1",
                params![plate],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(anyhow!("plate {} is already on the allow-list", plate));
        }

        let user_id = self.user_id_for(owner)?;
        let created_at_s = now_s()?;
        self.conn.execute(
            "INSERT INTO allowed_plates(plate_number, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![plate, user_id, epoch_i64(created_at_s)?],
        )?;
        Ok(AllowedPlate {
            plate,
            owner: owner.to_string(),
            user_id,
            created_at_s,
        })
    }

    fn revoke_plate(&mut self, plate: &str) -> Result<bool> {
        let plate = normalize_plate_text(plate);
        let removed = self.conn.execute(
            "DELETE FROM allowed_plates WHERE plate_number = ?1",
            params![plate],
        )?;
        Ok(removed > 0)
    }

    fn allowed_plates(&mut self) -> Result<Vec<AllowedPlate>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.plate_number, u.name, p.user_id, p.created_at
            FROM allowed_plates p JOIN users u ON u.id = p.user_id
            ORDER BY p.plate_number ASC
            "#,
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let created_at: i64 = row.get(3)?;
            out.push(AllowedPlate {
                plate: row.get(0)?,
                owner: row.get(1)?,
                user_id: row.get(2)?,
                created_at_s: u64::try_from(created_at)
                    .map_err(|_| anyhow!("corrupt allow-list: negative created_at"))?,
            });
        }
        Ok(out)
    }
}

// ----------------------------------------------------------------------------
// In-memory
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct InMemoryAccessStore {
    users: Vec<String>,
    plates: Vec<AllowedPlate>,
    logs: Vec<AccessLogEntry>,
}

impl InMemoryAccessStore {
    fn user_id_for(&mut self, owner: &str) -> i64 {
        let index = match self.users.iter().position(|name| name == owner) {
            Some(index) => index,
            None => {
                self.users.push(owner.to_string());
                self.users.len() - 1
            }
        };
        index as i64 + 1
    }
}

impl AccessStore for InMemoryAccessStore {
    fn lookup(&mut self, plate: &str) -> Result<AccessDecision> {
        Ok(match self.plates.iter().find(|p| p.plate == plate) {
            Some(entry) => AccessDecision {
                allowed: true,
                owner: entry.owner.clone(),
                user_id: Some(entry.user_id),
            },
            None => AccessDecision::guest(),
        })
    }

    fn record_decision(&mut self, record: &DecisionRecord) -> Result<()> {
        let id = self.logs.len() as i64 + 1;
        self.logs.push(AccessLogEntry {
            id,
            plate: record.plate.clone(),
            allowed: record.allowed,
            description: record.description.clone(),
            user_id: record.user_id,
            timestamp_s: record.timestamp_s,
        });
        Ok(())
    }

    fn recent_decisions(&mut self, limit: usize) -> Result<Vec<AccessLogEntry>> {
        Ok(self.logs.iter().rev().take(limit).cloned().collect())
    }

    fn allow_plate(&mut self, plate: &str, owner: &str) -> Result<AllowedPlate> {
        let plate = admissible_plate(plate)?;
        let owner = admissible_owner(owner)?;
        if self.plates.iter().any(|p| p.plate == plate) {
            return Err(anyhow!("plate {} is already on the allow-list", plate));
        }
        let entry = AllowedPlate {
            plate,
            owner: owner.to_string(),
            user_id: self.user_id_for(owner),
            created_at_s: now_s()?,
        };
        self.plates.push(entry.clone());
        Ok(entry)
    }

    fn revoke_plate(&mut self, plate: &str) -> Result<bool> {
        let plate = normalize_plate_text(plate);
        let before = self.plates.len();
        self.plates.retain(|p| p.plate != plate);
        Ok(self.plates.len() != before)
    }

    fn allowed_plates(&mut self) -> Result<Vec<AllowedPlate>> {
        let mut plates = self.plates.clone();
        plates.sort_by(|a, b| a.plate.cmp(&b.plate));
        Ok(plates)
    }
}
