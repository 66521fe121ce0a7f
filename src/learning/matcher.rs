//! Pattern Matcher - keyword-driven lookup of response patterns
//!
//! The matching rule itself is a [`KeywordMatcher`] strategy so the loose
//! substring default can be swapped for exact matching (or anything else)
//! without touching the service.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::store::{FindOrCreate, PatternStore};
use crate::types::{NewPattern, ResponsePattern};

/// Default number of suggestions returned for prompt enhancement
pub const DEFAULT_SUGGESTION_LIMIT: usize = 3;

/// Decides whether a pattern's keywords match a query
pub trait KeywordMatcher: Send + Sync {
    fn matches(&self, pattern_keywords: &[String], query: &[String]) -> bool;

    /// Strategy name, for logs and diagnostics
    fn name(&self) -> &'static str;
}

/// A pattern keyword containing any query keyword as a substring matches.
///
/// "crashes" matches a query for "crash".
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl KeywordMatcher for SubstringMatcher {
    fn matches(&self, pattern_keywords: &[String], query: &[String]) -> bool {
        pattern_keywords.iter().any(|keyword| {
            let keyword = keyword.to_lowercase();
            query.iter().any(|q| keyword.contains(&q.to_lowercase()))
        })
    }

    fn name(&self) -> &'static str {
        "substring"
    }
}

/// Case-insensitive token equality
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl KeywordMatcher for ExactMatcher {
    fn matches(&self, pattern_keywords: &[String], query: &[String]) -> bool {
        pattern_keywords
            .iter()
            .any(|keyword| query.iter().any(|q| keyword.to_lowercase() == q.to_lowercase()))
    }

    fn name(&self) -> &'static str {
        "exact"
    }
}

/// Configurable choice of matching strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    #[default]
    Substring,
    Exact,
}

impl MatchStrategy {
    pub fn matcher(self) -> Arc<dyn KeywordMatcher> {
        match self {
            MatchStrategy::Substring => Arc::new(SubstringMatcher),
            MatchStrategy::Exact => Arc::new(ExactMatcher),
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStrategy::Substring => write!(f, "substring"),
            MatchStrategy::Exact => write!(f, "exact"),
        }
    }
}

/// Store-backed pattern lookup using a matching strategy
#[derive(Clone)]
pub struct PatternMatcher {
    store: Arc<dyn PatternStore>,
    strategy: Arc<dyn KeywordMatcher>,
}

impl PatternMatcher {
    pub fn new(store: Arc<dyn PatternStore>, strategy: Arc<dyn KeywordMatcher>) -> Self {
        Self { store, strategy }
    }

    pub fn strategy(&self) -> &dyn KeywordMatcher {
        self.strategy.as_ref()
    }

    /// Best matching pattern by effectiveness, if any.
    ///
    /// Empty keywords never reach the store.
    pub async fn find_match(&self, keywords: &[String]) -> Result<Option<ResponsePattern>> {
        if keywords.is_empty() {
            return Ok(None);
        }
        let found = self
            .store
            .find_pattern_by_keywords(keywords, self.strategy.as_ref())
            .await?;
        if let Some(ref pattern) = found {
            debug!(
                "Matched pattern {} (score {:.3}) via {} strategy",
                pattern.id,
                pattern.effectiveness_score,
                self.strategy.name()
            );
        }
        Ok(found)
    }

    /// Return the best match, or insert `candidate` when nothing matches.
    ///
    /// Atomic when the store supports it; otherwise two concurrent callers
    /// may both insert a pattern for the same keyword cluster.
    pub async fn find_or_create(&self, keywords: &[String], candidate: NewPattern) -> Result<FindOrCreate> {
        if keywords.is_empty() {
            return Ok(FindOrCreate::Created(self.store.insert_pattern(candidate).await?));
        }
        self.store
            .find_or_create_pattern(keywords, self.strategy.as_ref(), candidate)
            .await
    }

    /// Matching patterns with a positive score, highest first, at most `limit`
    pub async fn suggest(&self, keywords: &[String], limit: usize) -> Result<Vec<ResponsePattern>> {
        if keywords.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // Ranked descending, so positive scores come first
        let ranked = self
            .store
            .list_patterns_by_keywords_ranked(keywords, self.strategy.as_ref(), limit)
            .await?;

        let suggestions: Vec<ResponsePattern> = ranked
            .into_iter()
            .filter(ResponsePattern::is_recommendable)
            .take(limit)
            .collect();

        debug!("Found {} suggestions for {:?}", suggestions.len(), keywords);
        Ok(suggestions)
    }
}
