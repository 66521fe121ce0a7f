//! Adaptive Learning Service - the public face of the learning engine
//!
//! Records conversations and feedback, learns patterns from that feedback,
//! and serves suggestions and analytics. All state lives in the store; the
//! service itself is immutable and cheap to clone per request.
//!
//! Failure policy:
//! - writes that record a user action (storing a conversation, the feedback
//!   patch) return their errors
//! - pattern learning after a feedback patch is logged and never fails the call
//! - reads that only enhance the prompt or dashboards degrade to empty/zero

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::analytics::{aggregate, LearningAnalytics};
use super::keywords::KeywordExtractor;
use super::matcher::PatternMatcher;
use super::updater::{EffectivenessUpdater, LearningOutcome};
use crate::config::LearningConfig;
use crate::error::Result;
use crate::store::PatternStore;
use crate::types::{ConversationRecord, Feedback, NewConversation, Quality, ResponsePattern};

/// Feedback write plus what the learning step made of it
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackReceipt {
    pub conversation: ConversationRecord,
    /// Present when pattern learning succeeded
    pub outcome: Option<LearningOutcome>,
    /// Present when pattern learning failed
    pub learning_error: Option<String>,
}

/// Adaptive response learning service
#[derive(Clone)]
pub struct AdaptiveLearningService {
    store: Arc<dyn PatternStore>,
    config: LearningConfig,
    extractor: KeywordExtractor,
    matcher: PatternMatcher,
    updater: EffectivenessUpdater,
}

impl AdaptiveLearningService {
    /// Create a service over `store`
    pub fn new(store: Arc<dyn PatternStore>, config: LearningConfig) -> Self {
        let extractor = KeywordExtractor::from_config(&config);
        let matcher = PatternMatcher::new(store.clone(), config.match_strategy.matcher());
        let updater = EffectivenessUpdater::new(store.clone(), matcher.clone(), extractor)
            .with_pattern_type(config.pattern_type.clone());

        Self {
            store,
            config,
            extractor,
            matcher,
            updater,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(store: Arc<dyn PatternStore>) -> Self {
        Self::new(store, LearningConfig::default())
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Keywords the engine would derive from a context and message
    pub fn keywords_for(&self, context: &str, user_message: &str) -> Vec<String> {
        self.extractor.extract(&format!("{} {}", context, user_message))
    }

    /// Record one conversation turn, returning its ID
    pub async fn store_conversation(
        &self,
        user_id: &str,
        context: &str,
        user_message: &str,
        bot_response: &str,
        feedback: Option<Feedback>,
    ) -> Result<String> {
        let record = self
            .store
            .insert_conversation(NewConversation {
                user_id: user_id.to_string(),
                context: context.to_string(),
                user_message: user_message.to_string(),
                bot_response: bot_response.to_string(),
                feedback,
                quality: None,
            })
            .await?;

        info!("Stored conversation {} for user {}", record.id, user_id);
        Ok(record.id)
    }

    /// Record feedback on a conversation and learn from it
    pub async fn apply_feedback(
        &self,
        conversation_id: &str,
        feedback: Feedback,
        quality: Option<Quality>,
    ) -> Result<ConversationRecord> {
        Ok(self
            .apply_feedback_detailed(conversation_id, feedback, quality)
            .await?
            .conversation)
    }

    /// Same as [`apply_feedback`](Self::apply_feedback), also reporting the learning step
    pub async fn apply_feedback_detailed(
        &self,
        conversation_id: &str,
        feedback: Feedback,
        quality: Option<Quality>,
    ) -> Result<FeedbackReceipt> {
        let conversation = self
            .store
            .update_conversation_feedback(conversation_id, feedback, quality)
            .await?;

        // The feedback write stands regardless of what happens below
        let (outcome, learning_error) = match self.updater.apply(conversation_id, feedback).await {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                warn!("Pattern learning failed for conversation {}: {}", conversation_id, e);
                (None, Some(e.to_string()))
            }
        };

        Ok(FeedbackReceipt {
            conversation,
            outcome,
            learning_error,
        })
    }

    /// Ranked positive patterns relevant to the upcoming response.
    ///
    /// Never fails: on any store error the caller gets an empty list and
    /// proceeds with an unenhanced prompt.
    pub async fn suggest(&self, context: &str, user_message: &str) -> Vec<ResponsePattern> {
        let keywords = self.keywords_for(context, user_message);
        match self.matcher.suggest(&keywords, self.config.suggestion_limit).await {
            Ok(patterns) => patterns,
            Err(e) => {
                warn!("Failed to get adaptive suggestions: {}", e);
                Vec::new()
            }
        }
    }

    /// Append learned guidance to `original_prompt`, or return it unchanged
    /// when nothing relevant has been learned
    pub async fn enhance_prompt(&self, original_prompt: &str, context: &str, user_message: &str) -> String {
        let suggestions = self.suggest(context, user_message).await;
        if suggestions.is_empty() {
            return original_prompt.to_string();
        }
        debug!("Enhancing prompt with {} learned patterns", suggestions.len());
        format_guidance(original_prompt, &suggestions)
    }

    /// Feedback statistics for `user_id`; all zero if the store is unavailable
    pub async fn analytics(&self, user_id: &str) -> LearningAnalytics {
        match self.try_analytics(user_id).await {
            Ok(analytics) => analytics,
            Err(e) => {
                warn!("Failed to compute learning analytics for {}: {}", user_id, e);
                LearningAnalytics::default()
            }
        }
    }

    async fn try_analytics(&self, user_id: &str) -> Result<LearningAnalytics> {
        let conversations = self.store.list_conversations_by_user(user_id).await?;
        let top = self
            .store
            .list_all_patterns_ranked(Some(self.config.analytics_top_limit))
            .await?;
        Ok(aggregate(&conversations, top))
    }

    /// Global patterns ranked by effectiveness
    pub async fn top_patterns(&self, limit: Option<usize>) -> Result<Vec<ResponsePattern>> {
        self.store.list_all_patterns_ranked(limit).await
    }
}

/// Render suggestions as a guidance block appended to a prompt
pub fn format_guidance(original_prompt: &str, suggestions: &[ResponsePattern]) -> String {
    let guidance = suggestions
        .iter()
        .map(|pattern| {
            format!(
                "Based on successful past interactions with similar context (effectiveness: {:.2}), consider: \"{}\"",
                pattern.effectiveness_score, pattern.response_template
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nADAPTIVE LEARNING GUIDANCE:\n{}\n\nUse these successful patterns as inspiration while maintaining your own voice and ensuring accuracy. Adapt the suggestions to the current context.",
        original_prompt, guidance
    )
}
