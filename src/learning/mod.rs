//! Adaptive Response Learning
//!
//! Learns from user feedback on bot responses: feedback folds into
//! keyword-clustered response patterns with a running effectiveness score,
//! and the best patterns are fed back into prompt construction.

pub mod keywords;
pub mod matcher;
pub mod updater;
pub mod analytics;
pub mod service;

pub use keywords::{extract_keywords, KeywordExtractor};
pub use matcher::{ExactMatcher, KeywordMatcher, MatchStrategy, PatternMatcher, SubstringMatcher};
pub use updater::{fold_score, initial_score, EffectivenessUpdater, LearningOutcome};
pub use analytics::{aggregate, LearningAnalytics};
pub use service::{AdaptiveLearningService, FeedbackReceipt};
