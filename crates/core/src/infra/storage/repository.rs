use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::error::AppError;
use crate::domain::interview::{
    ExtractedInfo, FaqExchange, InterestDistribution, InterviewDetail, InterviewListItem,
    InterviewRecord, InterviewStats, Level, QaPair,
};

/// SQLiteストレージ（interviews + questions_answers + extracted_info + faq_exchanges）
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// 新規接続（ファイルパス指定）
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let conn = Connection::open(path)
            .map_err(|e| AppError::storage(format!("DB接続に失敗: {e}")))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// in-memory DB（テスト用）
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::storage(format!("in-memory DB作成に失敗: {e}")))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// スキーママイグレーション
    fn migrate(&self) -> Result<(), AppError> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS interviews (
                    id         TEXT PRIMARY KEY,
                    started_at TEXT NOT NULL,
                    summary    TEXT NOT NULL DEFAULT ''
                );

                CREATE TABLE IF NOT EXISTS questions_answers (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    interview_id    TEXT NOT NULL,
                    question_number INTEGER NOT NULL,
                    question        TEXT NOT NULL,
                    answer          TEXT NOT NULL DEFAULT '',
                    confidence      REAL NOT NULL DEFAULT 0.0,
                    answered_at     TEXT NOT NULL DEFAULT '',
                    FOREIGN KEY (interview_id) REFERENCES interviews(id)
                );

                CREATE TABLE IF NOT EXISTS extracted_info (
                    interview_id   TEXT PRIMARY KEY,
                    name           TEXT,
                    interest_level TEXT,
                    readiness      TEXT,
                    background     TEXT,
                    FOREIGN KEY (interview_id) REFERENCES interviews(id)
                );

                CREATE TABLE IF NOT EXISTS faq_exchanges (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    interview_id TEXT NOT NULL,
                    position     INTEGER NOT NULL,
                    question     TEXT NOT NULL,
                    matched_faq  INTEGER,
                    reply        TEXT NOT NULL,
                    FOREIGN KEY (interview_id) REFERENCES interviews(id)
                );

                CREATE INDEX IF NOT EXISTS idx_qa_interview
                    ON questions_answers(interview_id);
                CREATE INDEX IF NOT EXISTS idx_faq_interview
                    ON faq_exchanges(interview_id);
                CREATE INDEX IF NOT EXISTS idx_interviews_started
                    ON interviews(started_at DESC);
                ",
            )
            .map_err(|e| AppError::storage(format!("マイグレーション失敗: {e}")))?;
        Ok(())
    }

    // --- Interview CRUD ---

    /// 面接1件を1トランザクションで保存する
    pub fn save_interview(&self, record: &InterviewRecord) -> Result<(), AppError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| AppError::storage(format!("トランザクション開始失敗: {e}")))?;

        tx.execute(
            "INSERT INTO interviews (id, started_at, summary) VALUES (?1, ?2, ?3)",
            params![record.interview_id, record.started_at, record.summary],
        )
        .map_err(|e| AppError::storage(format!("面接保存失敗: {e}")))?;

        for qa in &record.answers {
            tx.execute(
                "INSERT INTO questions_answers
                    (interview_id, question_number, question, answer, confidence, answered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.interview_id,
                    qa.number,
                    qa.question,
                    qa.answer,
                    qa.confidence as f64,
                    qa.answered_at
                ],
            )
            .map_err(|e| AppError::storage(format!("回答保存失敗: {e}")))?;
        }

        for (position, faq) in record.faq_log.iter().enumerate() {
            tx.execute(
                "INSERT INTO faq_exchanges (interview_id, position, question, matched_faq, reply)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.interview_id,
                    position as i64,
                    faq.question,
                    faq.matched.map(|m| m as i64),
                    faq.reply
                ],
            )
            .map_err(|e| AppError::storage(format!("FAQ保存失敗: {e}")))?;
        }

        let info = &record.extracted_info;
        tx.execute(
            "INSERT INTO extracted_info (interview_id, name, interest_level, readiness, background)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.interview_id,
                info.name,
                info.interest_level.as_str(),
                info.readiness.as_str(),
                info.background
            ],
        )
        .map_err(|e| AppError::storage(format!("抽出情報保存失敗: {e}")))?;

        tx.commit()
            .map_err(|e| AppError::storage(format!("コミット失敗: {e}")))?;
        log::info!("Interview saved to database: {}", record.interview_id);
        Ok(())
    }

    // --- Queries ---

    /// 新しい順の一覧
    pub fn list_interviews(&self, limit: u32) -> Result<Vec<InterviewListItem>, AppError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT i.id, i.started_at, e.name, e.interest_level
                 FROM interviews i
                 LEFT JOIN extracted_info e ON e.interview_id = i.id
                 ORDER BY i.started_at DESC, i.id DESC
                 LIMIT ?1",
            )
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(InterviewListItem {
                    interview_id: row.get(0)?,
                    started_at: row.get(1)?,
                    name: row.get(2)?,
                    interest_level: row
                        .get::<_, Option<String>>(3)?
                        .map(|s| Level::parse(&s)),
                })
            })
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;
        Ok(rows)
    }

    pub fn get_interview(&self, interview_id: &str) -> Result<Option<InterviewDetail>, AppError> {
        let head = self
            .conn
            .query_row(
                "SELECT id, started_at, summary FROM interviews WHERE id = ?1",
                params![interview_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| AppError::storage(format!("面接取得失敗: {e}")))?;

        let Some((id, started_at, summary)) = head else {
            return Ok(None);
        };

        Ok(Some(InterviewDetail {
            answers: self.answers_for(&id)?,
            faq_log: self.faq_log_for(&id)?,
            extracted_info: self.extracted_for(&id)?,
            interview_id: id,
            started_at,
            summary,
        }))
    }

    fn answers_for(&self, interview_id: &str) -> Result<Vec<QaPair>, AppError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT question_number, question, answer, confidence, answered_at
                 FROM questions_answers WHERE interview_id = ?1 ORDER BY question_number, id",
            )
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let rows = stmt
            .query_map(params![interview_id], |row| {
                Ok(QaPair {
                    number: row.get(0)?,
                    question: row.get(1)?,
                    answer: row.get(2)?,
                    confidence: row.get::<_, f64>(3)? as f32,
                    answered_at: row.get(4)?,
                })
            })
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;
        Ok(rows)
    }

    fn faq_log_for(&self, interview_id: &str) -> Result<Vec<FaqExchange>, AppError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT question, matched_faq, reply
                 FROM faq_exchanges WHERE interview_id = ?1 ORDER BY position",
            )
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let rows = stmt
            .query_map(params![interview_id], |row| {
                Ok(FaqExchange {
                    question: row.get(0)?,
                    matched: row.get::<_, Option<i64>>(1)?.map(|m| m as usize),
                    reply: row.get(2)?,
                })
            })
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;
        Ok(rows)
    }

    fn extracted_for(&self, interview_id: &str) -> Result<Option<ExtractedInfo>, AppError> {
        self.conn
            .query_row(
                "SELECT name, interest_level, readiness, background
                 FROM extracted_info WHERE interview_id = ?1",
                params![interview_id],
                |row| {
                    Ok(ExtractedInfo {
                        name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        interest_level: Level::parse(
                            &row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        ),
                        readiness: Level::parse(
                            &row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        ),
                        background: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    })
                },
            )
            .optional()
            .map_err(|e| AppError::storage(format!("抽出情報取得失敗: {e}")))
    }

    /// 全件を古い順にエクスポート
    pub fn export_all(&self) -> Result<Vec<InterviewDetail>, AppError> {
        let ids: Vec<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM interviews ORDER BY started_at, id")
                .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;
            let ids = stmt
                .query_map([], |row| row.get(0))
                .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;
            ids
        };

        let mut details = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(detail) = self.get_interview(&id)? {
                details.push(detail);
            }
        }
        Ok(details)
    }

    // --- Statistics ---

    /// `today` は "YYYY-MM-DD"
    pub fn statistics(&self, today: &str) -> Result<InterviewStats, AppError> {
        let total_interviews: u32 = self
            .conn
            .query_row("SELECT COUNT(*) FROM interviews", [], |row| row.get(0))
            .map_err(|e| AppError::storage(format!("集計失敗: {e}")))?;

        let today_interviews: u32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM interviews WHERE substr(started_at, 1, 10) = ?1",
                params![today],
                |row| row.get(0),
            )
            .map_err(|e| AppError::storage(format!("集計失敗: {e}")))?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT interest_level, COUNT(*) FROM extracted_info
                 WHERE interest_level IN ('high', 'medium', 'low')
                 GROUP BY interest_level",
            )
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let mut dist = InterestDistribution::default();
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?;
        for row in rows {
            let (level, count) =
                row.map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;
            match Level::parse(&level) {
                Level::High => dist.high = count,
                Level::Medium => dist.medium = count,
                Level::Low => dist.low = count,
                Level::Unknown => {}
            }
        }

        Ok(InterviewStats {
            total_interviews,
            today_interviews,
            avg_interest: InterviewStats::average_label(&dist),
            interest_distribution: dist,
        })
    }

    // --- Data cleanup ---

    /// 全データ削除。削除した面接数を返す。
    pub fn clear_all(&self) -> Result<u32, AppError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| AppError::storage(format!("トランザクション開始失敗: {e}")))?;
        for table in ["questions_answers", "extracted_info", "faq_exchanges"] {
            tx.execute(&format!("DELETE FROM {table}"), [])
                .map_err(|e| AppError::storage(format!("{table} 削除失敗: {e}")))?;
        }
        let affected = tx
            .execute("DELETE FROM interviews", [])
            .map_err(|e| AppError::storage(format!("面接削除失敗: {e}")))?;
        tx.commit()
            .map_err(|e| AppError::storage(format!("コミット失敗: {e}")))?;
        Ok(affected as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, started_at: &str, interest: Level) -> InterviewRecord {
        InterviewRecord {
            interview_id: id.to_string(),
            started_at: started_at.to_string(),
            candidate_name: "John".to_string(),
            answers: vec![
                QaPair {
                    number: 1,
                    question: "Your name?".into(),
                    answer: "My name is John".into(),
                    confidence: 0.7,
                    answered_at: "10:00:05".into(),
                },
                QaPair {
                    number: 2,
                    question: "Why?".into(),
                    answer: "I love data".into(),
                    confidence: 0.6,
                    answered_at: "10:00:40".into(),
                },
            ],
            faq_log: vec![FaqExchange {
                question: "How much?".into(),
                matched: Some(0),
                reply: "It costs nothing.".into(),
            }],
            summary: "Good interview.".to_string(),
            extracted_info: ExtractedInfo {
                name: "John".into(),
                interest_level: interest,
                readiness: Level::Medium,
                background: "Student".into(),
            },
        }
    }

    #[test]
    fn test_save_and_get_interview() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .save_interview(&record("20250115_100000", "2025-01-15 10:00:00", Level::High))
            .unwrap();

        let detail = storage.get_interview("20250115_100000").unwrap().unwrap();
        assert_eq!(detail.summary, "Good interview.");
        assert_eq!(detail.answers.len(), 2);
        assert_eq!(detail.answers[1].answer, "I love data");
        assert!((detail.answers[0].confidence - 0.7).abs() < 1e-6);
        assert_eq!(detail.faq_log[0].matched, Some(0));
        let info = detail.extracted_info.unwrap();
        assert_eq!(info.interest_level, Level::High);
        assert_eq!(info.background, "Student");
    }

    #[test]
    fn test_get_nonexistent_interview() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(storage.get_interview("nope").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_rolls_back() {
        let storage = Storage::open_in_memory().unwrap();
        let r = record("id1", "2025-01-15 10:00:00", Level::High);
        storage.save_interview(&r).unwrap();
        let err = storage.save_interview(&r).unwrap_err();
        assert_eq!(err.code, crate::domain::error::ErrorCode::Storage);
        let detail = storage.get_interview("id1").unwrap().unwrap();
        assert_eq!(detail.answers.len(), 2);
    }

    #[test]
    fn test_list_newest_first() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .save_interview(&record("a", "2025-01-14 09:00:00", Level::Low))
            .unwrap();
        storage
            .save_interview(&record("b", "2025-01-15 09:00:00", Level::High))
            .unwrap();

        let items = storage.list_interviews(10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].interview_id, "b");
        assert_eq!(items[0].interest_level, Some(Level::High));
        assert_eq!(items[1].name.as_deref(), Some("John"));

        assert_eq!(storage.list_interviews(1).unwrap().len(), 1);
    }

    #[test]
    fn test_statistics() {
        let storage = Storage::open_in_memory().unwrap();
        let empty = storage.statistics("2025-01-15").unwrap();
        assert_eq!(empty.total_interviews, 0);
        assert_eq!(empty.avg_interest, "N/A");

        storage
            .save_interview(&record("a", "2025-01-14 09:00:00", Level::High))
            .unwrap();
        storage
            .save_interview(&record("b", "2025-01-15 09:00:00", Level::Medium))
            .unwrap();
        storage
            .save_interview(&record("c", "2025-01-15 11:00:00", Level::Unknown))
            .unwrap();

        let stats = storage.statistics("2025-01-15").unwrap();
        assert_eq!(stats.total_interviews, 3);
        assert_eq!(stats.today_interviews, 2);
        assert_eq!(stats.interest_distribution.high, 1);
        assert_eq!(stats.interest_distribution.medium, 1);
        assert_eq!(stats.interest_distribution.low, 0);
        // (3 + 2) / 2 = 2.5
        assert_eq!(stats.avg_interest, "High");
    }

    #[test]
    fn test_export_and_clear() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .save_interview(&record("b", "2025-01-15 09:00:00", Level::High))
            .unwrap();
        storage
            .save_interview(&record("a", "2025-01-14 09:00:00", Level::Low))
            .unwrap();

        let all = storage.export_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].interview_id, "a");

        assert_eq!(storage.clear_all().unwrap(), 2);
        assert!(storage.export_all().unwrap().is_empty());
        assert_eq!(storage.statistics("2025-01-15").unwrap().total_interviews, 0);
    }

    #[test]
    fn test_open_file_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interviews.db");
        {
            let storage = Storage::open(&path).unwrap();
            storage
                .save_interview(&record("a", "2025-01-14 09:00:00", Level::Low))
                .unwrap();
        }
        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.list_interviews(10).unwrap().len(), 1);
    }
}
