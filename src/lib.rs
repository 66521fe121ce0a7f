//! Adaptive Learning - feedback-driven response patterns for chat assistants
//!
//! - Lexical keyword extraction from conversation context
//! - Response patterns with a running effectiveness score
//! - Pluggable keyword matching (substring or exact)
//! - In-memory and SQLite pattern stores
//! - Prompt enhancement from the best learned patterns
//! - Per-user feedback analytics
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use adaptive_learning::{AdaptiveLearningService, Feedback, InMemoryPatternStore};
//!
//! #[tokio::main]
//! async fn main() -> adaptive_learning::Result<()> {
//!     let service = AdaptiveLearningService::with_defaults(Arc::new(InMemoryPatternStore::new()));
//!     let id = service
//!         .store_conversation("user-1", "help me debug a crash", "my app crashes on start", "check null handling", None)
//!         .await?;
//!     service.apply_feedback(&id, Feedback::Positive, None).await?;
//!     let prompt = service.enhance_prompt("You are helpful.", "another crash", "it crashes again").await;
//!     println!("{}", prompt);
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod store;
pub mod learning;
pub mod cli;

pub use config::{Config, LearningConfig, StorageConfig};
pub use error::{LearningError, Result};
pub use learning::{
    AdaptiveLearningService,
    FeedbackReceipt,
    LearningAnalytics,
    LearningOutcome,
    MatchStrategy,
    KeywordExtractor,
    KeywordMatcher,
};
pub use store::{FindOrCreate, InMemoryPatternStore, PatternStore, SqlitePatternStore};
pub use types::{ConversationRecord, Feedback, NewConversation, NewPattern, PatternUpdate, Quality, ResponsePattern};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Adaptive Response Learning Engine", NAME, VERSION)
}
