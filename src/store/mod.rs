//! Pattern Store - persistence of conversations and response patterns
//!
//! Provides:
//! - The [`PatternStore`] trait the learning engine requires
//! - An in-memory backend for tests and ephemeral use
//! - A SQLite backend for durable storage
//!
//! Every write is committed on its own; there is no transaction spanning
//! conversations and patterns. Folding feedback into an existing pattern is
//! atomic in every backend, so concurrent feedback never loses a count. Backends that can look up and insert a
//! pattern atomically override [`PatternStore::find_or_create_pattern`].

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::learning::matcher::KeywordMatcher;
use crate::types::{
    ConversationRecord, Feedback, NewConversation, NewPattern, PatternUpdate, Quality,
    ResponsePattern,
};

pub use memory::InMemoryPatternStore;
pub use sqlite::SqlitePatternStore;

/// Result of a find-or-create lookup
#[derive(Debug, Clone, PartialEq)]
pub enum FindOrCreate {
    /// An existing pattern matched the keywords
    Found(ResponsePattern),
    /// Nothing matched; the candidate was inserted
    Created(ResponsePattern),
}

/// Persistence collaborator of the learning engine
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Persist a new conversation and return it with its assigned ID
    async fn insert_conversation(&self, conversation: NewConversation) -> Result<ConversationRecord>;

    /// Overwrite feedback (and quality, when given) on a conversation
    async fn update_conversation_feedback(
        &self,
        id: &str,
        feedback: Feedback,
        quality: Option<Quality>,
    ) -> Result<ConversationRecord>;

    async fn get_conversation(&self, id: &str) -> Result<ConversationRecord>;

    /// Highest-scoring pattern whose keywords match, if any
    async fn find_pattern_by_keywords(
        &self,
        keywords: &[String],
        matcher: &dyn KeywordMatcher,
    ) -> Result<Option<ResponsePattern>>;

    async fn insert_pattern(&self, pattern: NewPattern) -> Result<ResponsePattern>;

    async fn update_pattern(&self, id: &str, update: PatternUpdate) -> Result<ResponsePattern>;

    /// Fold one feedback value into a pattern's score and bump its usage
    /// count, as a single atomic read-modify-write
    async fn fold_feedback(&self, id: &str, feedback: Feedback) -> Result<ResponsePattern>;

    /// Matching patterns, highest score first, creation order on ties
    async fn list_patterns_by_keywords_ranked(
        &self,
        keywords: &[String],
        matcher: &dyn KeywordMatcher,
        limit: usize,
    ) -> Result<Vec<ResponsePattern>>;

    async fn list_conversations_by_user(&self, user_id: &str) -> Result<Vec<ConversationRecord>>;

    /// All patterns, highest score first, optionally truncated
    async fn list_all_patterns_ranked(&self, limit: Option<usize>) -> Result<Vec<ResponsePattern>>;

    /// Whether `find_or_create_pattern` is atomic in this backend
    fn supports_atomic_find_or_create(&self) -> bool {
        false
    }

    /// Find the best matching pattern or insert `candidate`.
    ///
    /// The default is a plain lookup followed by an insert: two concurrent
    /// callers can both miss and each insert a pattern for the same keyword
    /// cluster. Both patterns stay valid and split future usage.
    async fn find_or_create_pattern(
        &self,
        keywords: &[String],
        matcher: &dyn KeywordMatcher,
        candidate: NewPattern,
    ) -> Result<FindOrCreate> {
        if let Some(existing) = self.find_pattern_by_keywords(keywords, matcher).await? {
            return Ok(FindOrCreate::Found(existing));
        }
        Ok(FindOrCreate::Created(self.insert_pattern(candidate).await?))
    }
}
