//! Analytics Aggregator - per-user feedback statistics

use serde::{Deserialize, Serialize};

use crate::types::{ConversationRecord, ResponsePattern};

/// Default number of top patterns in analytics views
pub const DEFAULT_ANALYTICS_TOP_LIMIT: usize = 5;

/// Summary of a user's feedback and the best global patterns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningAnalytics {
    pub total_conversations: usize,
    pub positive_feedback: usize,
    pub negative_feedback: usize,
    /// Mean quality over rated conversations, 0 when none are rated
    pub avg_quality: f64,
    /// Number of entries in `top_patterns`, not the total pattern count
    pub learned_patterns: usize,
    pub top_patterns: Vec<ResponsePattern>,
}

impl LearningAnalytics {
    /// Percentage of conversations with positive feedback, 0 when there are none
    pub fn satisfaction_rate(&self) -> f64 {
        if self.total_conversations == 0 {
            return 0.0;
        }
        self.positive_feedback as f64 / self.total_conversations as f64 * 100.0
    }
}

/// Aggregate a user's conversations and the already-ranked top patterns
pub fn aggregate(conversations: &[ConversationRecord], top_patterns: Vec<ResponsePattern>) -> LearningAnalytics {
    let positive_feedback = conversations
        .iter()
        .filter(|c| c.feedback.is_some_and(|f| f.value() > 0))
        .count();
    let negative_feedback = conversations
        .iter()
        .filter(|c| c.feedback.is_some_and(|f| f.value() < 0))
        .count();

    let ratings: Vec<f64> = conversations
        .iter()
        .filter_map(|c| c.quality)
        .map(|q| q.get() as f64)
        .collect();
    let avg_quality = if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<f64>() / ratings.len() as f64
    };

    LearningAnalytics {
        total_conversations: conversations.len(),
        positive_feedback,
        negative_feedback,
        avg_quality,
        learned_patterns: top_patterns.len(),
        top_patterns,
    }
}
