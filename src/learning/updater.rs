//! Effectiveness Updater - folds feedback into response patterns
//!
//! Each feedback event either creates a new pattern for the conversation's
//! keyword cluster or revises the best matching one. The score is a
//! streaming weighted average with no decay: old feedback loses relative
//! weight only through dilution by volume.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::keywords::KeywordExtractor;
use super::matcher::PatternMatcher;
use crate::error::Result;
use crate::store::{FindOrCreate, PatternStore};
use crate::types::{Feedback, NewPattern, ResponsePattern};

/// Pattern type assigned to patterns learned from conversations
pub const DEFAULT_PATTERN_TYPE: &str = "contextual";

/// What a feedback event did to the pattern set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LearningOutcome {
    /// No pattern matched; a new one was created
    Created(ResponsePattern),
    /// An existing pattern absorbed the feedback
    Updated(ResponsePattern),
    /// The conversation no longer exists; nothing changed
    Skipped { conversation_id: String },
}

impl LearningOutcome {
    pub fn pattern(&self) -> Option<&ResponsePattern> {
        match self {
            LearningOutcome::Created(p) | LearningOutcome::Updated(p) => Some(p),
            LearningOutcome::Skipped { .. } => None,
        }
    }
}

/// Score of a freshly created pattern.
///
/// Neutral feedback maps to -1 here while analytics counts it as neither
/// positive nor negative. The asymmetry is kept as-is.
pub fn initial_score(feedback: Feedback) -> f64 {
    if feedback.value() > 0 {
        1.0
    } else {
        -1.0
    }
}

/// Weighted average of the prior score (weight `usage_count`) and the new
/// feedback value (weight 1)
pub fn fold_score(score: f64, usage_count: u32, feedback: Feedback) -> f64 {
    let weight = usage_count as f64;
    (score * weight + feedback.value() as f64) / (weight + 1.0)
}

/// Applies feedback events to the pattern store
#[derive(Clone)]
pub struct EffectivenessUpdater {
    store: Arc<dyn PatternStore>,
    matcher: PatternMatcher,
    extractor: KeywordExtractor,
    pattern_type: String,
}

impl EffectivenessUpdater {
    pub fn new(store: Arc<dyn PatternStore>, matcher: PatternMatcher, extractor: KeywordExtractor) -> Self {
        Self {
            store,
            matcher,
            extractor,
            pattern_type: DEFAULT_PATTERN_TYPE.to_string(),
        }
    }

    /// Tag newly created patterns with a different type
    pub fn with_pattern_type(mut self, pattern_type: impl Into<String>) -> Self {
        self.pattern_type = pattern_type.into();
        self
    }

    /// Fold one feedback event on `conversation_id` into the pattern set
    pub async fn apply(&self, conversation_id: &str, feedback: Feedback) -> Result<LearningOutcome> {
        let conversation = match self.store.get_conversation(conversation_id).await {
            Ok(conversation) => conversation,
            Err(e) if e.is_not_found() => {
                debug!("Conversation {} vanished before learning, skipping", conversation_id);
                return Ok(LearningOutcome::Skipped {
                    conversation_id: conversation_id.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let keywords = self
            .extractor
            .extract(&format!("{} {}", conversation.context, conversation.user_message));

        let candidate = NewPattern {
            pattern_type: self.pattern_type.clone(),
            context_keywords: keywords.clone(),
            response_template: conversation.bot_response.clone(),
            effectiveness_score: initial_score(feedback),
            usage_count: 1,
        };

        match self.matcher.find_or_create(&keywords, candidate).await? {
            FindOrCreate::Created(pattern) => {
                info!(
                    "Created pattern {} for keywords {:?} (score {:+.1})",
                    pattern.id, pattern.context_keywords, pattern.effectiveness_score
                );
                Ok(LearningOutcome::Created(pattern))
            }
            FindOrCreate::Found(existing) => {
                let updated = self.store.fold_feedback(&existing.id, feedback).await?;
                debug!(
                    "Pattern {} score {:.3} -> {:.3} after {} feedback (usage {})",
                    updated.id, existing.effectiveness_score, updated.effectiveness_score, feedback, updated.usage_count
                );
                Ok(LearningOutcome::Updated(updated))
            }
        }
    }
}
