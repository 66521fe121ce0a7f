//! Shared types used across modules
//!
//! Conversation records, response patterns and the feedback value types
//! live here so the stores and the learning engine can share them without
//! depending on each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LearningError;

/// User signal on a bot response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Feedback {
    Negative,
    Neutral,
    Positive,
}

impl Feedback {
    /// Signed value folded into effectiveness scores
    pub fn value(self) -> i32 {
        match self {
            Feedback::Negative => -1,
            Feedback::Neutral => 0,
            Feedback::Positive => 1,
        }
    }

    pub fn is_positive(self) -> bool {
        self == Feedback::Positive
    }

    pub fn is_negative(self) -> bool {
        self == Feedback::Negative
    }
}

impl TryFrom<i64> for Feedback {
    type Error = LearningError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Feedback::Negative),
            0 => Ok(Feedback::Neutral),
            1 => Ok(Feedback::Positive),
            other => Err(LearningError::InvalidInput(format!(
                "feedback must be -1, 0 or 1, got {}",
                other
            ))),
        }
    }
}

impl From<Feedback> for i64 {
    fn from(feedback: Feedback) -> Self {
        feedback.value() as i64
    }
}

impl std::str::FromStr for Feedback {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .trim_start_matches('+')
            .parse()
            .map_err(|_| LearningError::InvalidInput(format!("feedback is not an integer: {}", s)))?;
        Feedback::try_from(value)
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feedback::Negative => write!(f, "-1"),
            Feedback::Neutral => write!(f, "0"),
            Feedback::Positive => write!(f, "+1"),
        }
    }
}

/// Response quality rating, 1 to 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, LearningError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(LearningError::InvalidInput(format!(
                "quality must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Quality {
    type Error = LearningError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Quality::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

impl std::str::FromStr for Quality {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| LearningError::InvalidInput(format!("quality is not an integer: {}", s)))?;
        Quality::new(value)
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One user turn and the bot response it produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique conversation ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Free text describing prior turns
    pub context: String,
    pub user_message: String,
    pub bot_response: String,
    /// Last feedback submitted, if any
    pub feedback: Option<Feedback>,
    pub quality: Option<Quality>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when recording a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversation {
    pub user_id: String,
    pub context: String,
    pub user_message: String,
    pub bot_response: String,
    pub feedback: Option<Feedback>,
    pub quality: Option<Quality>,
}

impl NewConversation {
    /// Materialize a record with a fresh ID and timestamps
    pub fn into_record(self) -> ConversationRecord {
        let now = Utc::now();
        ConversationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.user_id,
            context: self.context,
            user_message: self.user_message,
            bot_response: self.bot_response,
            feedback: self.feedback,
            quality: self.quality,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A learned (keyword cluster, response template) association
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePattern {
    /// Unique pattern ID
    pub id: String,
    /// Free-form category tag, e.g. "contextual"
    pub pattern_type: String,
    /// Normalized tokens, fixed at creation
    pub context_keywords: Vec<String>,
    /// Typically the bot response that earned the first feedback
    pub response_template: String,
    /// Running weighted average of folded feedback, not clamped
    pub effectiveness_score: f64,
    /// Number of feedback events folded into the score
    pub usage_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResponsePattern {
    /// Whether the pattern has net-positive historical feedback
    pub fn is_recommendable(&self) -> bool {
        self.effectiveness_score > 0.0
    }
}

/// Fields supplied when creating a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPattern {
    pub pattern_type: String,
    pub context_keywords: Vec<String>,
    pub response_template: String,
    pub effectiveness_score: f64,
    pub usage_count: u32,
}

impl NewPattern {
    pub fn into_pattern(self) -> ResponsePattern {
        let now = Utc::now();
        ResponsePattern {
            id: uuid::Uuid::new_v4().to_string(),
            pattern_type: self.pattern_type,
            context_keywords: self.context_keywords,
            response_template: self.response_template,
            effectiveness_score: self.effectiveness_score,
            usage_count: self.usage_count,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a pattern.
///
/// Keywords and template are immutable after creation, so only the score
/// and usage count can be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternUpdate {
    pub effectiveness_score: Option<f64>,
    pub usage_count: Option<u32>,
}

impl PatternUpdate {
    /// Apply the set fields and bump `updated_at`
    pub fn apply_to(&self, pattern: &mut ResponsePattern) {
        if let Some(score) = self.effectiveness_score {
            pattern.effectiveness_score = score;
        }
        if let Some(count) = self.usage_count {
            pattern.usage_count = count;
        }
        pattern.updated_at = Utc::now();
    }
}

/// Sort patterns by effectiveness, highest first.
///
/// The sort is stable, so callers that feed patterns in creation order get
/// creation order as the tie-break.
pub fn rank_by_effectiveness(patterns: &mut [ResponsePattern]) {
    patterns.sort_by(|a, b| {
        b.effectiveness_score
            .partial_cmp(&a.effectiveness_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(score: f64, template: &str) -> ResponsePattern {
        NewPattern {
            pattern_type: "contextual".to_string(),
            context_keywords: vec!["crash".to_string()],
            response_template: template.to_string(),
            effectiveness_score: score,
            usage_count: 1,
        }
        .into_pattern()
    }

    #[test]
    fn test_feedback_conversion() {
        assert_eq!(Feedback::try_from(-1).unwrap(), Feedback::Negative);
        assert_eq!(Feedback::try_from(0).unwrap(), Feedback::Neutral);
        assert_eq!(Feedback::try_from(1).unwrap(), Feedback::Positive);
        assert!(Feedback::try_from(2).is_err());
        assert_eq!("+1".parse::<Feedback>().unwrap(), Feedback::Positive);
        assert_eq!("-1".parse::<Feedback>().unwrap(), Feedback::Negative);
        assert!("yes".parse::<Feedback>().is_err());
    }

    #[test]
    fn test_feedback_serializes_as_integer() {
        let json = serde_json::to_string(&Feedback::Negative).unwrap();
        assert_eq!(json, "-1");
        let parsed: Feedback = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Feedback::Positive);
        assert!(serde_json::from_str::<Feedback>("5").is_err());
    }

    #[test]
    fn test_quality_bounds() {
        assert!(Quality::new(0).is_err());
        assert_eq!(Quality::new(1).unwrap().get(), 1);
        assert_eq!(Quality::new(5).unwrap().get(), 5);
        assert!(Quality::new(6).is_err());
        assert!(serde_json::from_str::<Quality>("9").is_err());
    }

    #[test]
    fn test_pattern_update_leaves_keywords() {
        let mut p = pattern(1.0, "restart it");
        let keywords = p.context_keywords.clone();
        PatternUpdate { effectiveness_score: Some(0.5), usage_count: Some(2) }.apply_to(&mut p);
        assert_eq!(p.effectiveness_score, 0.5);
        assert_eq!(p.usage_count, 2);
        assert_eq!(p.context_keywords, keywords);
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let mut patterns = vec![pattern(0.5, "a"), pattern(1.0, "b"), pattern(0.5, "c")];
        rank_by_effectiveness(&mut patterns);
        let order: Vec<_> = patterns.iter().map(|p| p.response_template.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }
}
