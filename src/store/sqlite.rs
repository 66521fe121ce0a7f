//! SQLite-based persistent storage for conversations and response patterns

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{FindOrCreate, PatternStore};
use crate::error::{LearningError, Result};
use crate::learning::matcher::KeywordMatcher;
use crate::types::{
    ConversationRecord, Feedback, NewConversation, NewPattern, PatternUpdate, Quality,
    ResponsePattern,
};

const CONVERSATION_COLUMNS: &str =
    "id, user_id, context, user_message, bot_response, feedback, quality, created_at, updated_at";

const PATTERN_COLUMNS: &str =
    "id, pattern_type, context_keywords, response_template, effectiveness_score, usage_count, created_at, updated_at";

/// SQLite-based pattern store
pub struct SqlitePatternStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePatternStore {
    /// Open (or create) a store at the given path
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| LearningError::Persistence(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open(&path)?;

        // Enable WAL mode for better performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS learning_conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                context TEXT NOT NULL,
                user_message TEXT NOT NULL,
                bot_response TEXT NOT NULL,
                feedback INTEGER,
                quality INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- seq records creation order for stable ranking ties
            CREATE TABLE IF NOT EXISTS response_patterns (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                pattern_type TEXT NOT NULL,
                context_keywords TEXT NOT NULL DEFAULT '[]',
                response_template TEXT NOT NULL,
                effectiveness_score REAL NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_user ON learning_conversations(user_id);
            CREATE INDEX IF NOT EXISTS idx_patterns_score ON response_patterns(effectiveness_score DESC);
            CREATE INDEX IF NOT EXISTS idx_patterns_type ON response_patterns(pattern_type);
        "#)?;

        Ok(())
    }

    /// Store statistics
    pub async fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().await;

        let conversations: i64 = conn.query_row(
            "SELECT COUNT(*) FROM learning_conversations", [], |row| row.get(0)
        )?;

        let with_feedback: i64 = conn.query_row(
            "SELECT COUNT(*) FROM learning_conversations WHERE feedback IS NOT NULL", [], |row| row.get(0)
        )?;

        let patterns: i64 = conn.query_row(
            "SELECT COUNT(*) FROM response_patterns", [], |row| row.get(0)
        )?;

        let positive: i64 = conn.query_row(
            "SELECT COUNT(*) FROM response_patterns WHERE effectiveness_score > 0", [], |row| row.get(0)
        )?;

        Ok(StoreStats {
            total_conversations: conversations as usize,
            conversations_with_feedback: with_feedback as usize,
            total_patterns: patterns as usize,
            positive_patterns: positive as usize,
        })
    }

    fn load_conversation(conn: &Connection, id: &str) -> Result<Option<ConversationRecord>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM learning_conversations WHERE id = ?1",
            CONVERSATION_COLUMNS
        ))?;
        let raw = stmt.query_row(params![id], RawConversation::from_row).optional()?;
        raw.map(RawConversation::into_record).transpose()
    }

    fn load_pattern(conn: &Connection, id: &str) -> Result<Option<ResponsePattern>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM response_patterns WHERE id = ?1",
            PATTERN_COLUMNS
        ))?;
        let raw = stmt.query_row(params![id], RawPattern::from_row).optional()?;
        raw.map(RawPattern::into_pattern).transpose()
    }

    /// All patterns, highest score first, creation order on ties
    fn load_patterns_ranked(conn: &Connection, limit: Option<usize>) -> Result<Vec<ResponsePattern>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM response_patterns
             ORDER BY effectiveness_score DESC, seq ASC
             LIMIT ?1",
            PATTERN_COLUMNS
        ))?;
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let raws = stmt
            .query_map(params![limit], RawPattern::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawPattern::into_pattern).collect()
    }

    fn load_matching_ranked(
        conn: &Connection,
        keywords: &[String],
        matcher: &dyn KeywordMatcher,
    ) -> Result<Vec<ResponsePattern>> {
        Ok(Self::load_patterns_ranked(conn, None)?
            .into_iter()
            .filter(|p| matcher.matches(&p.context_keywords, keywords))
            .collect())
    }

    fn write_pattern(conn: &Connection, pattern: &ResponsePattern) -> Result<()> {
        let keywords_json = serde_json::to_string(&pattern.context_keywords)?;
        conn.execute(
            r#"INSERT INTO response_patterns
               (id, pattern_type, context_keywords, response_template, effectiveness_score, usage_count, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                pattern.id,
                pattern.pattern_type,
                keywords_json,
                pattern.response_template,
                pattern.effectiveness_score,
                pattern.usage_count as i64,
                pattern.created_at.to_rfc3339(),
                pattern.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl PatternStore for SqlitePatternStore {
    async fn insert_conversation(&self, conversation: NewConversation) -> Result<ConversationRecord> {
        let conn = self.conn.lock().await;
        let record = conversation.into_record();

        conn.execute(
            r#"INSERT INTO learning_conversations
               (id, user_id, context, user_message, bot_response, feedback, quality, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                record.id,
                record.user_id,
                record.context,
                record.user_message,
                record.bot_response,
                record.feedback.map(i64::from),
                record.quality.map(|q| q.get() as i64),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(record)
    }

    async fn update_conversation_feedback(
        &self,
        id: &str,
        feedback: Feedback,
        quality: Option<Quality>,
    ) -> Result<ConversationRecord> {
        let conn = self.conn.lock().await;

        // Absent quality leaves the stored rating untouched
        let changed = conn.execute(
            r#"UPDATE learning_conversations
               SET feedback = ?2, quality = COALESCE(?3, quality), updated_at = ?4
               WHERE id = ?1"#,
            params![
                id,
                i64::from(feedback),
                quality.map(|q| q.get() as i64),
                Utc::now().to_rfc3339(),
            ],
        )?;

        if changed == 0 {
            return Err(LearningError::conversation_not_found(id));
        }

        Self::load_conversation(&conn, id)?
            .ok_or_else(|| LearningError::conversation_not_found(id))
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationRecord> {
        let conn = self.conn.lock().await;
        Self::load_conversation(&conn, id)?
            .ok_or_else(|| LearningError::conversation_not_found(id))
    }

    async fn find_pattern_by_keywords(
        &self,
        keywords: &[String],
        matcher: &dyn KeywordMatcher,
    ) -> Result<Option<ResponsePattern>> {
        let conn = self.conn.lock().await;
        Ok(Self::load_matching_ranked(&conn, keywords, matcher)?.into_iter().next())
    }

    async fn insert_pattern(&self, pattern: NewPattern) -> Result<ResponsePattern> {
        let conn = self.conn.lock().await;
        let pattern = pattern.into_pattern();
        Self::write_pattern(&conn, &pattern)?;
        Ok(pattern)
    }

    async fn update_pattern(&self, id: &str, update: PatternUpdate) -> Result<ResponsePattern> {
        let conn = self.conn.lock().await;

        let changed = conn.execute(
            r#"UPDATE response_patterns
               SET effectiveness_score = COALESCE(?2, effectiveness_score),
                   usage_count = COALESCE(?3, usage_count),
                   updated_at = ?4
               WHERE id = ?1"#,
            params![
                id,
                update.effectiveness_score,
                update.usage_count.map(|c| c as i64),
                Utc::now().to_rfc3339(),
            ],
        )?;

        if changed == 0 {
            return Err(LearningError::pattern_not_found(id));
        }

        Self::load_pattern(&conn, id)?
            .ok_or_else(|| LearningError::pattern_not_found(id))
    }

    async fn fold_feedback(&self, id: &str, feedback: Feedback) -> Result<ResponsePattern> {
        let conn = self.conn.lock().await;

        // Right-hand sides see the pre-update row, so this is one atomic fold
        let changed = conn.execute(
            r#"UPDATE response_patterns
               SET effectiveness_score = (effectiveness_score * usage_count + ?2) / (usage_count + 1),
                   usage_count = MIN(usage_count + 1, ?3),
                   updated_at = ?4
               WHERE id = ?1"#,
            params![
                id,
                feedback.value() as f64,
                u32::MAX as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if changed == 0 {
            return Err(LearningError::pattern_not_found(id));
        }

        Self::load_pattern(&conn, id)?
            .ok_or_else(|| LearningError::pattern_not_found(id))
    }

    async fn list_patterns_by_keywords_ranked(
        &self,
        keywords: &[String],
        matcher: &dyn KeywordMatcher,
        limit: usize,
    ) -> Result<Vec<ResponsePattern>> {
        let conn = self.conn.lock().await;
        let mut matched = Self::load_matching_ranked(&conn, keywords, matcher)?;
        matched.truncate(limit);
        Ok(matched)
    }

    async fn list_conversations_by_user(&self, user_id: &str) -> Result<Vec<ConversationRecord>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM learning_conversations
             WHERE user_id = ?1
             ORDER BY created_at ASC",
            CONVERSATION_COLUMNS
        ))?;

        let raws = stmt
            .query_map(params![user_id], RawConversation::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raws.into_iter().map(RawConversation::into_record).collect()
    }

    async fn list_all_patterns_ranked(&self, limit: Option<usize>) -> Result<Vec<ResponsePattern>> {
        let conn = self.conn.lock().await;
        Self::load_patterns_ranked(&conn, limit)
    }

    fn supports_atomic_find_or_create(&self) -> bool {
        true
    }

    async fn find_or_create_pattern(
        &self,
        keywords: &[String],
        matcher: &dyn KeywordMatcher,
        candidate: NewPattern,
    ) -> Result<FindOrCreate> {
        let mut conn = self.conn.lock().await;

        // IMMEDIATE takes the write lock up front, so other processes sharing
        // the file cannot insert between our lookup and insert
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = Self::load_matching_ranked(&tx, keywords, matcher)?.into_iter().next() {
            tx.commit()?;
            return Ok(FindOrCreate::Found(existing));
        }

        let pattern = candidate.into_pattern();
        Self::write_pattern(&tx, &pattern)?;
        tx.commit()?;
        Ok(FindOrCreate::Created(pattern))
    }
}

/// Conversation row before domain validation
struct RawConversation {
    id: String,
    user_id: String,
    context: String,
    user_message: String,
    bot_response: String,
    feedback: Option<i64>,
    quality: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl RawConversation {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            context: row.get(2)?,
            user_message: row.get(3)?,
            bot_response: row.get(4)?,
            feedback: row.get(5)?,
            quality: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<ConversationRecord> {
        let feedback = self.feedback.map(Feedback::try_from).transpose().map_err(|e| {
            LearningError::Persistence(format!("conversation {}: {}", self.id, e))
        })?;
        let quality = self
            .quality
            .map(|q| {
                u8::try_from(q)
                    .map_err(|_| LearningError::Persistence(format!("conversation {}: quality {} out of range", self.id, q)))
                    .and_then(|q| {
                        Quality::new(q).map_err(|e| LearningError::Persistence(format!("conversation {}: {}", self.id, e)))
                    })
            })
            .transpose()?;

        Ok(ConversationRecord {
            id: self.id,
            user_id: self.user_id,
            context: self.context,
            user_message: self.user_message,
            bot_response: self.bot_response,
            feedback,
            quality,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

/// Pattern row before keyword decoding
struct RawPattern {
    id: String,
    pattern_type: String,
    context_keywords: String,
    response_template: String,
    effectiveness_score: f64,
    usage_count: i64,
    created_at: String,
    updated_at: String,
}

impl RawPattern {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            pattern_type: row.get(1)?,
            context_keywords: row.get(2)?,
            response_template: row.get(3)?,
            effectiveness_score: row.get(4)?,
            usage_count: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_pattern(self) -> Result<ResponsePattern> {
        Ok(ResponsePattern {
            context_keywords: serde_json::from_str(&self.context_keywords)?,
            id: self.id,
            pattern_type: self.pattern_type,
            response_template: self.response_template,
            effectiveness_score: self.effectiveness_score,
            usage_count: u32::try_from(self.usage_count.max(0)).unwrap_or(u32::MAX),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Learning database statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub total_conversations: usize,
    pub conversations_with_feedback: usize,
    pub total_patterns: usize,
    pub positive_patterns: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::matcher::{ExactMatcher, SubstringMatcher};
    use tempfile::tempdir;

    fn conversation(user: &str) -> NewConversation {
        NewConversation {
            user_id: user.to_string(),
            context: "help me debug a crash".to_string(),
            user_message: "my app crashes on start".to_string(),
            bot_response: "check your null pointer handling".to_string(),
            feedback: Some(Feedback::Neutral),
            quality: None,
        }
    }

    fn pattern(keywords: &[&str], score: f64) -> NewPattern {
        NewPattern {
            pattern_type: "contextual".to_string(),
            context_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            response_template: format!("template {}", score),
            effectiveness_score: score,
            usage_count: 1,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_conversation() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("learning.db");
        let store = SqlitePatternStore::open(&db_path).await.unwrap();

        let record = store.insert_conversation(conversation("u1")).await.unwrap();
        let loaded = store.get_conversation(&record.id).await.unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.user_message, "my app crashes on start");
        assert_eq!(loaded.feedback, Some(Feedback::Neutral));
        assert!(loaded.quality.is_none());
    }

    #[tokio::test]
    async fn test_feedback_update() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        let record = store.insert_conversation(conversation("u1")).await.unwrap();

        let updated = store
            .update_conversation_feedback(&record.id, Feedback::Positive, Some(Quality::new(5).unwrap()))
            .await
            .unwrap();
        assert_eq!(updated.feedback, Some(Feedback::Positive));
        assert_eq!(updated.quality.map(Quality::get), Some(5));

        let updated = store
            .update_conversation_feedback(&record.id, Feedback::Negative, None)
            .await
            .unwrap();
        assert_eq!(updated.feedback, Some(Feedback::Negative));
        assert_eq!(updated.quality.map(Quality::get), Some(5));

        let err = store
            .update_conversation_feedback("missing", Feedback::Positive, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_pattern_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("learning.db");

        let id = {
            let store = SqlitePatternStore::open(&db_path).await.unwrap();
            let created = store.insert_pattern(pattern(&["crash", "debug"], 1.0)).await.unwrap();
            store
                .update_pattern(&created.id, PatternUpdate { effectiveness_score: Some(0.5), usage_count: Some(2) })
                .await
                .unwrap();
            created.id
        };

        let store = SqlitePatternStore::open(&db_path).await.unwrap();
        let all = store.list_all_patterns_ranked(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].context_keywords, vec!["crash", "debug"]);
        assert_eq!(all[0].effectiveness_score, 0.5);
        assert_eq!(all[0].usage_count, 2);
    }

    #[tokio::test]
    async fn test_ranked_matching() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        store.insert_pattern(pattern(&["crashes"], 0.3)).await.unwrap();
        store.insert_pattern(pattern(&["crash"], 0.7)).await.unwrap();
        store.insert_pattern(pattern(&["deploy"], 0.9)).await.unwrap();
        store.insert_pattern(pattern(&["crash"], 0.3)).await.unwrap();

        let keywords = vec!["crash".to_string()];
        let ranked = store
            .list_patterns_by_keywords_ranked(&keywords, &SubstringMatcher, 10)
            .await
            .unwrap();
        let summary: Vec<_> = ranked
            .iter()
            .map(|p| (p.context_keywords[0].as_str(), p.effectiveness_score))
            .collect();
        // Equal scores keep creation order
        assert_eq!(summary, vec![("crash", 0.7), ("crashes", 0.3), ("crash", 0.3)]);

        let exact = store
            .list_patterns_by_keywords_ranked(&keywords, &ExactMatcher, 10)
            .await
            .unwrap();
        assert_eq!(exact.len(), 2);

        let best = store.find_pattern_by_keywords(&keywords, &SubstringMatcher).await.unwrap();
        assert_eq!(best.unwrap().effectiveness_score, 0.7);
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent_for_cluster() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        let keywords = vec!["crash".to_string()];

        let first = store
            .find_or_create_pattern(&keywords, &SubstringMatcher, pattern(&["crash"], 1.0))
            .await
            .unwrap();
        assert!(matches!(first, FindOrCreate::Created(_)));

        let second = store
            .find_or_create_pattern(&keywords, &SubstringMatcher, pattern(&["crash"], -1.0))
            .await
            .unwrap();
        assert!(matches!(second, FindOrCreate::Found(_)));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_patterns, 1);
        assert_eq!(stats.positive_patterns, 1);
    }

    #[tokio::test]
    async fn test_fold_feedback() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        let created = store.insert_pattern(pattern(&["crash"], 0.5)).await.unwrap();
        store
            .update_pattern(&created.id, PatternUpdate { effectiveness_score: None, usage_count: Some(3) })
            .await
            .unwrap();

        let folded = store.fold_feedback(&created.id, Feedback::Positive).await.unwrap();
        assert!((folded.effectiveness_score - 0.625).abs() < 1e-12);
        assert_eq!(folded.usage_count, 4);

        let folded = store.fold_feedback(&created.id, Feedback::Neutral).await.unwrap();
        assert!((folded.effectiveness_score - 0.5).abs() < 1e-12);
        assert_eq!(folded.usage_count, 5);

        assert!(store.fold_feedback("missing", Feedback::Positive).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_fold_feedback_caps_usage_count() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        let mut candidate = pattern(&["crash"], 1.0);
        candidate.usage_count = u32::MAX;
        let created = store.insert_pattern(candidate).await.unwrap();

        let folded = store.fold_feedback(&created.id, Feedback::Positive).await.unwrap();
        assert_eq!(folded.usage_count, u32::MAX);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_folds_keep_every_count() {
        let store = Arc::new(SqlitePatternStore::open_in_memory().unwrap());
        let created = store.insert_pattern(pattern(&["crash"], 1.0)).await.unwrap();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                let id = created.id.clone();
                tokio::spawn(async move { store.fold_feedback(&id, Feedback::Positive).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let all = store.list_all_patterns_ranked(None).await.unwrap();
        assert_eq!(all[0].usage_count, 51);
        assert_eq!(all[0].effectiveness_score, 1.0);
    }

    #[tokio::test]
    async fn test_out_of_range_quality_row_is_a_persistence_error() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        let record = store.insert_conversation(conversation("u1")).await.unwrap();
        {
            let conn = store.conn.lock().await;
            conn.execute(
                "UPDATE learning_conversations SET quality = 300 WHERE id = ?1",
                params![record.id],
            )
            .unwrap();
        }

        let err = store.get_conversation(&record.id).await.unwrap_err();
        assert!(matches!(err, LearningError::Persistence(ref msg) if msg.contains("out of range")));
    }

    #[tokio::test]
    async fn test_stats_empty() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_conversations, 0);
        assert_eq!(stats.total_patterns, 0);
    }
}
