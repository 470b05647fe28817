//! Analysis record database operations.

use rusqlite::{params, ErrorCode, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::history::History;
use crate::models::{AnalysisRecord, FilePayload, PatientInfo, RecordParts};

const RECORD_COLUMNS: &str =
    "id, timestamp, files, patient_info, analysis_result, summary";

impl Database {
    /// Insert a new record. An existing id is reported as [`DbError::Duplicate`].
    pub fn insert_record(&self, record: &AnalysisRecord) -> DbResult<()> {
        let files_json = serde_json::to_string(record.files())?;
        let patient_json = record
            .patient_info()
            .map(serde_json::to_string)
            .transpose()?;

        let result = self.conn.execute(
            r#"
            INSERT INTO analysis_records (
                id, timestamp, files, patient_info, analysis_result, summary, file_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.id(),
                record.timestamp(),
                files_json,
                patient_json,
                record.analysis_result(),
                record.summary(),
                record.file_count() as i64,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                if self.record_exists(record.id())? {
                    Err(DbError::Duplicate(record.id().to_string()))
                } else {
                    Err(rusqlite::Error::SqliteFailure(err, msg).into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether a record id is present.
    pub fn record_exists(&self, id: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM analysis_records WHERE id = ?",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get a record by ID.
    pub fn get_record(&self, id: &str) -> DbResult<Option<AnalysisRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM analysis_records WHERE id = ?", RECORD_COLUMNS),
                [id],
                RecordRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all records in insertion order.
    pub fn list_records(&self) -> DbResult<Vec<AnalysisRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM analysis_records ORDER BY seq",
            RECORD_COLUMNS
        ))?;

        let rows = stmt.query_map([], RecordRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// Search records whose summary or analysis text contains `query`,
    /// newest first. A blank query lists everything.
    ///
    /// Matching goes through [`History::search`], the same Unicode case
    /// folding as in-memory history.
    pub fn search_records(&self, query: &str, limit: usize) -> DbResult<Vec<AnalysisRecord>> {
        let mut records = History::new(self.list_records()?).search(query);
        records.truncate(limit);
        Ok(records)
    }

    /// Delete a record. Returns whether a row was removed.
    pub fn delete_record(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM analysis_records WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Number of stored records.
    pub fn count_records(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM analysis_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Intermediate row struct for database mapping.
struct RecordRow {
    id: String,
    timestamp: i64,
    files: String,
    patient_info: Option<String>,
    analysis_result: String,
    summary: String,
}

impl RecordRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            files: row.get(2)?,
            patient_info: row.get(3)?,
            analysis_result: row.get(4)?,
            summary: row.get(5)?,
        })
    }
}

impl TryFrom<RecordRow> for AnalysisRecord {
    type Error = DbError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let files: Vec<FilePayload> = serde_json::from_str(&row.files)?;
        let patient_info: Option<PatientInfo> = row
            .patient_info
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        AnalysisRecord::restore(RecordParts {
            id: row.id,
            timestamp: row.timestamp,
            files,
            patient_info,
            analysis_result: row.analysis_result,
            summary: row.summary,
        })
        .map_err(|e| DbError::Constraint(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn make_record(text: &str, files: usize) -> AnalysisRecord {
        let files = (0..files)
            .map(|i| FilePayload::from_bytes(format!("report-{}.jpg", i), "image/jpeg", b"jpeg"))
            .collect();
        AnalysisRecord::create(files, Some(PatientInfo::named("张三")), text.into()).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let record = make_record("**检测项目**: 血常规\n白细胞偏高", 2);

        db.insert_record(&record).unwrap();

        let retrieved = db.get_record(record.id()).unwrap().unwrap();
        assert_eq!(retrieved, record);
        assert_eq!(retrieved.summary(), "血常规");
        assert_eq!(retrieved.file_count(), 2);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let db = setup_db();
        let record = make_record("text", 1);

        db.insert_record(&record).unwrap();
        let err = db.insert_record(&record).unwrap_err();
        assert!(matches!(err, DbError::Duplicate(id) if id == record.id()));
        assert_eq!(db.count_records().unwrap(), 1);
    }

    #[test]
    fn test_list_in_insertion_order() {
        let db = setup_db();
        let first = make_record("first", 1);
        let second = make_record("second", 1);
        let third = make_record("third", 1);

        db.insert_record(&second).unwrap();
        db.insert_record(&first).unwrap();
        db.insert_record(&third).unwrap();

        let ids: Vec<String> = db
            .list_records()
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec![second.id(), first.id(), third.id()]);
    }

    #[test]
    fn test_search_records() {
        let db = setup_db();
        db.insert_record(&make_record("**检测项目**: 血常规", 1)).unwrap();
        db.insert_record(&make_record("**检测项目**: 肝功能\nALT 升高", 1)).unwrap();
        db.insert_record(&make_record("**检测项目**: 尿常规", 1)).unwrap();

        assert_eq!(db.search_records("肝功能", 10).unwrap().len(), 1);
        assert_eq!(db.search_records("alt", 10).unwrap().len(), 1);
        assert_eq!(db.search_records("常规", 10).unwrap().len(), 2);
        assert_eq!(db.search_records("  ", 10).unwrap().len(), 3);
        assert_eq!(db.search_records("", 2).unwrap().len(), 2);
        assert!(db.search_records("甲状腺", 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_folds_non_ascii_like_history() {
        let db = setup_db();
        let record = make_record("**检测项目**: Élastase fécale", 1);
        db.insert_record(&record).unwrap();

        let from_db = db.search_records("élastase", 10).unwrap();
        let in_memory = History::new(db.list_records().unwrap()).search("élastase");
        assert_eq!(from_db, vec![record.clone()]);
        assert_eq!(from_db, in_memory);
        assert_eq!(db.search_records("ÉLASTASE", 10).unwrap(), vec![record]);
    }

    #[test]
    fn test_search_newest_first() {
        let db = setup_db();
        let older = AnalysisRecord::restore(RecordParts {
            timestamp: 1_000,
            ..make_record("**检测项目**: 血常规", 1).into_parts()
        })
        .unwrap();
        let newer = AnalysisRecord::restore(RecordParts {
            timestamp: 2_000,
            ..make_record("**检测项目**: 血常规 复查", 1).into_parts()
        })
        .unwrap();
        db.insert_record(&older).unwrap();
        db.insert_record(&newer).unwrap();

        let ids: Vec<String> = db
            .search_records("血常规", 10)
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec![newer.id(), older.id()]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let db = setup_db();
        let record = make_record("text", 1);
        db.insert_record(&record).unwrap();

        assert!(db.delete_record(record.id()).unwrap());
        assert!(!db.delete_record(record.id()).unwrap());
        assert!(db.get_record(record.id()).unwrap().is_none());
        assert_eq!(db.count_records().unwrap(), 0);
    }

    #[test]
    fn test_absent_patient_info_stored_as_null() {
        let db = setup_db();
        let record = AnalysisRecord::create(
            vec![FilePayload::from_bytes("a.pdf", "application/pdf", b"%PDF")],
            None,
            "text".into(),
        )
        .unwrap();
        db.insert_record(&record).unwrap();

        let stored: Option<String> = db
            .conn()
            .query_row(
                "SELECT patient_info FROM analysis_records WHERE id = ?",
                [record.id()],
                |row| row.get(0),
            )
            .unwrap();
        assert!(stored.is_none());
        assert!(db.get_record(record.id()).unwrap().unwrap().patient_info().is_none());
    }
}
