//! In-memory pattern store
//!
//! Vectors behind a tokio `RwLock`. Insertion order doubles as creation
//! order, which gives ranked listings their stable tie-break.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{FindOrCreate, PatternStore};
use crate::error::{LearningError, Result};
use crate::learning::matcher::KeywordMatcher;
use crate::learning::updater::fold_score;
use crate::types::{
    rank_by_effectiveness, ConversationRecord, Feedback, NewConversation, NewPattern,
    PatternUpdate, Quality, ResponsePattern,
};

/// Non-durable store, lost when dropped
#[derive(Default)]
pub struct InMemoryPatternStore {
    conversations: RwLock<Vec<ConversationRecord>>,
    patterns: RwLock<Vec<ResponsePattern>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored patterns
    pub async fn pattern_count(&self) -> usize {
        self.patterns.read().await.len()
    }

    /// Number of stored conversations
    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }

    fn ranked_matches(
        patterns: &[ResponsePattern],
        keywords: &[String],
        matcher: &dyn KeywordMatcher,
    ) -> Vec<ResponsePattern> {
        let mut matched: Vec<ResponsePattern> = patterns
            .iter()
            .filter(|p| matcher.matches(&p.context_keywords, keywords))
            .cloned()
            .collect();
        rank_by_effectiveness(&mut matched);
        matched
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn insert_conversation(&self, conversation: NewConversation) -> Result<ConversationRecord> {
        let record = conversation.into_record();
        self.conversations.write().await.push(record.clone());
        Ok(record)
    }

    async fn update_conversation_feedback(
        &self,
        id: &str,
        feedback: Feedback,
        quality: Option<Quality>,
    ) -> Result<ConversationRecord> {
        let mut conversations = self.conversations.write().await;
        let record = conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| LearningError::conversation_not_found(id))?;

        record.feedback = Some(feedback);
        if quality.is_some() {
            record.quality = quality;
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationRecord> {
        self.conversations
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| LearningError::conversation_not_found(id))
    }

    async fn find_pattern_by_keywords(
        &self,
        keywords: &[String],
        matcher: &dyn KeywordMatcher,
    ) -> Result<Option<ResponsePattern>> {
        let patterns = self.patterns.read().await;
        Ok(Self::ranked_matches(&patterns, keywords, matcher).into_iter().next())
    }

    async fn insert_pattern(&self, pattern: NewPattern) -> Result<ResponsePattern> {
        let pattern = pattern.into_pattern();
        self.patterns.write().await.push(pattern.clone());
        Ok(pattern)
    }

    async fn update_pattern(&self, id: &str, update: PatternUpdate) -> Result<ResponsePattern> {
        let mut patterns = self.patterns.write().await;
        let pattern = patterns
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| LearningError::pattern_not_found(id))?;
        update.apply_to(pattern);
        Ok(pattern.clone())
    }

    async fn fold_feedback(&self, id: &str, feedback: Feedback) -> Result<ResponsePattern> {
        let mut patterns = self.patterns.write().await;
        let pattern = patterns
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| LearningError::pattern_not_found(id))?;
        PatternUpdate {
            effectiveness_score: Some(fold_score(pattern.effectiveness_score, pattern.usage_count, feedback)),
            usage_count: Some(pattern.usage_count.saturating_add(1)),
        }
        .apply_to(pattern);
        Ok(pattern.clone())
    }

    async fn list_patterns_by_keywords_ranked(
        &self,
        keywords: &[String],
        matcher: &dyn KeywordMatcher,
        limit: usize,
    ) -> Result<Vec<ResponsePattern>> {
        let patterns = self.patterns.read().await;
        let mut matched = Self::ranked_matches(&patterns, keywords, matcher);
        matched.truncate(limit);
        Ok(matched)
    }

    async fn list_conversations_by_user(&self, user_id: &str) -> Result<Vec<ConversationRecord>> {
        Ok(self
            .conversations
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all_patterns_ranked(&self, limit: Option<usize>) -> Result<Vec<ResponsePattern>> {
        let mut patterns = self.patterns.read().await.clone();
        rank_by_effectiveness(&mut patterns);
        if let Some(limit) = limit {
            patterns.truncate(limit);
        }
        Ok(patterns)
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
        // Hold the write lock across lookup and insert
        let mut patterns = self.patterns.write().await;
        if let Some(existing) = Self::ranked_matches(&patterns, keywords, matcher).into_iter().next() {
            return Ok(FindOrCreate::Found(existing));
        }
        let pattern = candidate.into_pattern();
        patterns.push(pattern.clone());
        Ok(FindOrCreate::Created(pattern))
    }
}
