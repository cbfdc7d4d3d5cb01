//! SQLite correction log

use super::log::{CorrectionLog, OpenLog, StorageError, StorageResult};
use super::types::{Correction, PromotionEvent, Provenance};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// SQLite-backed correction log
///
/// Both tables are append-only; `seq` preserves insertion order.
/// Thread-safe via internal mutex on the connection.
pub struct SqliteCorrectionLog {
    conn: Mutex<Connection>,
}

/// Raw `corrections` row, decoded outside the rusqlite closure so
/// serde and date errors surface as `StorageError`.
type CorrectionRow = (String, String, String, String, String, String, String);

impl SqliteCorrectionLog {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS corrections (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                surface_form TEXT NOT NULL,
                surface_key TEXT NOT NULL,
                sentence_json TEXT NOT NULL,
                corrected_json TEXT NOT NULL,
                provenance_kind TEXT NOT NULL,
                provenance_id TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_corrections_surface
                ON corrections(surface_key);

            CREATE TABLE IF NOT EXISTS promotions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                version INTEGER NOT NULL,
                promoted_json TEXT NOT NULL,
                promoted_at TEXT NOT NULL
            );

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn query_corrections(&self, filter_key: Option<&str>) -> StorageResult<Vec<Correction>> {
        let conn = self.conn();
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<CorrectionRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        };
        const COLUMNS: &str = "SELECT id, surface_form, sentence_json, corrected_json, \
             provenance_kind, provenance_id, recorded_at FROM corrections";

        let rows: Vec<CorrectionRow> = match filter_key {
            Some(key) => {
                let mut stmt = conn.prepare(&format!("{} WHERE surface_key = ?1 ORDER BY seq", COLUMNS))?;
                let collected: Vec<CorrectionRow> =
                    stmt.query_map(params![key], map_row)?.collect::<Result<_, _>>()?;
                collected
            }
            None => {
                let mut stmt = conn.prepare(&format!("{} ORDER BY seq", COLUMNS))?;
                let collected: Vec<CorrectionRow> =
                    stmt.query_map([], map_row)?.collect::<Result<_, _>>()?;
                collected
            }
        };
        rows.into_iter().map(row_to_correction).collect()
    }
}

impl OpenLog for SqliteCorrectionLog {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CorrectionLog for SqliteCorrectionLog {
    fn append(&self, correction: &Correction) -> StorageResult<()> {
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO corrections (id, surface_form, surface_key, sentence_json, corrected_json,
                                     provenance_kind, provenance_id, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                correction.id.to_string(),
                correction.surface_form,
                correction.surface_key(),
                serde_json::to_string(&correction.sentence)?,
                serde_json::to_string(&correction.corrected)?,
                correction.provenance.kind(),
                correction.provenance.id(),
                correction.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn corrections(&self) -> StorageResult<Vec<Correction>> {
        self.query_corrections(None)
    }

    fn corrections_for(&self, surface: &str) -> StorageResult<Vec<Correction>> {
        self.query_corrections(Some(&crate::morphology::normalize(surface)))
    }

    fn record_promotion(&self, event: &PromotionEvent) -> StorageResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO promotions (id, version, promoted_json, promoted_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.id.to_string(),
                event.version as i64,
                serde_json::to_string(&event.promoted)?,
                event.promoted_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn promotions(&self) -> StorageResult<Vec<PromotionEvent>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, version, promoted_json, promoted_at FROM promotions ORDER BY seq")?;
        let rows: Vec<(String, i64, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<Result<_, _>>()?;

        rows.into_iter()
            .map(|(id, version, promoted_json, promoted_at)| {
                Ok(PromotionEvent {
                    id: parse_uuid(&id)?,
                    version: version as u64,
                    promoted: serde_json::from_str(&promoted_json)?,
                    promoted_at: parse_timestamp(&promoted_at)?,
                })
            })
            .collect()
    }

    fn len(&self) -> StorageResult<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM corrections", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn row_to_correction(row: CorrectionRow) -> StorageResult<Correction> {
    let (id, surface_form, sentence_json, corrected_json, provenance_kind, provenance_id, recorded_at) = row;
    let provenance = Provenance::from_parts(&provenance_kind, provenance_id).ok_or_else(|| StorageError::Corrupt {
        id: id.clone(),
        reason: format!("unknown provenance kind '{}'", provenance_kind),
    })?;
    Ok(Correction {
        id: parse_uuid(&id)?,
        surface_form,
        sentence: serde_json::from_str(&sentence_json)?,
        corrected: serde_json::from_str(&corrected_json)?,
        provenance,
        recorded_at: parse_timestamp(&recorded_at)?,
    })
}

fn parse_uuid(id: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(id).map_err(|e| StorageError::Corrupt {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| StorageError::DateParse(e.to_string()))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrections::types::PromotedForm;
    use crate::morphology::{AnalysisCandidate, Case, Features, Number, Pos};
    use tempfile::tempdir;

    fn correction(surface: &str, lemma: &str, reviewer: &str) -> Correction {
        Correction::new(
            surface,
            vec![surface.to_string(), "video".to_string()],
            AnalysisCandidate::new("review", lemma, Pos::Noun)
                .with_features(Features::new().with_case(Case::Accusative).with_number(Number::Singular)),
            Provenance::Reviewer(reviewer.into()),
        )
    }

    #[test]
    fn corrections_round_trip_in_order() {
        let log = SqliteCorrectionLog::open_in_memory().unwrap();
        let first = correction("Piratam", "pirata", "ana");
        let second = correction("nautam", "nauta", "ben");
        log.append(&first).unwrap();
        log.append(&second).unwrap();

        let all = log.corrections().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[0].corrected, first.corrected);
        assert_eq!(all[0].provenance, Provenance::Reviewer("ana".into()));
        assert_eq!(all[0].sentence, first.sentence);
        assert_eq!(all[1].id, second.id);
        assert_eq!(log.len().unwrap(), 2);
    }

    #[test]
    fn corrections_for_uses_surface_key() {
        let log = SqliteCorrectionLog::open_in_memory().unwrap();
        log.append(&correction("Piratam", "pirata", "ana")).unwrap();
        log.append(&correction("nautam", "nauta", "ana")).unwrap();

        let hits = log.corrections_for("PIRATAM").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].surface_form, "Piratam");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let log = SqliteCorrectionLog::open_in_memory().unwrap();
        let c = correction("piratam", "pirata", "ana");
        log.append(&c).unwrap();
        assert!(matches!(log.append(&c), Err(StorageError::Database(_))));
    }

    #[test]
    fn log_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("corrections.db");

        {
            let log = SqliteCorrectionLog::open(&path).unwrap();
            log.append(&correction("piratam", "pirata", "ana")).unwrap();
            log.record_promotion(&PromotionEvent::new(
                2,
                vec![PromotedForm {
                    surface_form: "piratam".into(),
                    lemma: "pirata".into(),
                    pos: Pos::Noun,
                    features: Features::new().with_case(Case::Accusative),
                    occurrences: 3,
                }],
            ))
            .unwrap();
        }

        let log = SqliteCorrectionLog::open(&path).unwrap();
        assert_eq!(log.corrections().unwrap().len(), 1);
        let promotions = log.promotions().unwrap();
        assert_eq!(promotions.len(), 1);
        assert_eq!(promotions[0].version, 2);
        assert_eq!(promotions[0].promoted[0].lemma, "pirata");
    }
}
