//! CLI interface for adaptive-learning

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::learning::{AdaptiveLearningService, FeedbackReceipt, LearningAnalytics, LearningOutcome};
use crate::store::SqlitePatternStore;
use crate::types::{Feedback, Quality, ResponsePattern};

#[derive(Parser)]
#[command(name = "adaptive-learning")]
#[command(about = "Adaptive response learning engine: record feedback, learn patterns, enhance prompts", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the SQLite learning database (overrides config)
    #[arg(long, global = true, env = "ADAPTIVE_LEARNING_DB")]
    db: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a conversation turn
    Store {
        /// Owning user ID
        #[arg(short, long)]
        user: String,
        /// Prior conversation context
        #[arg(short, long, default_value = "")]
        context: String,
        /// The user's message
        #[arg(short, long)]
        message: String,
        /// The bot's response
        #[arg(short, long)]
        response: String,
        /// Initial feedback (-1, 0 or 1)
        #[arg(short, long, allow_hyphen_values = true)]
        feedback: Option<Feedback>,
    },
    /// Apply feedback to a stored conversation and learn from it
    Feedback {
        /// Conversation ID
        id: String,
        /// Feedback value (-1, 0 or 1)
        #[arg(allow_hyphen_values = true)]
        feedback: Feedback,
        /// Quality rating (1-5)
        #[arg(short, long)]
        quality: Option<Quality>,
    },
    /// Show patterns that would be suggested for a context and message
    Suggest {
        #[arg(short, long, default_value = "")]
        context: String,
        #[arg(short, long)]
        message: String,
    },
    /// Print a prompt enhanced with learned guidance
    Enhance {
        /// The base prompt
        #[arg(short, long)]
        prompt: String,
        #[arg(short, long, default_value = "")]
        context: String,
        #[arg(short, long)]
        message: String,
    },
    /// Show feedback analytics for a user
    Analytics {
        #[arg(short, long)]
        user: String,
    },
    /// List learned patterns by effectiveness
    Patterns {
        /// Maximum patterns to list
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show the keywords extracted from a text
    Keywords {
        text: String,
    },
    /// Show database statistics
    Stats,
    /// Print the effective configuration
    Config,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(db) = cli.db.clone() {
        config.storage.database_path = db;
    }

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
        Commands::Store { user, context, message, response, feedback } => {
            let (_, service) = open_service(&config).await?;
            let id = service
                .store_conversation(&user, &context, &message, &response, feedback)
                .await?;
            if cli.json {
                print_json(&serde_json::json!({ "id": id }))?;
            } else {
                println!("Stored conversation {}", id);
            }
        }
        Commands::Feedback { id, feedback, quality } => {
            let (_, service) = open_service(&config).await?;
            let receipt = service.apply_feedback_detailed(&id, feedback, quality).await?;
            if cli.json {
                print_json(&receipt)?;
            } else {
                display_receipt(&receipt);
            }
        }
        Commands::Suggest { context, message } => {
            let (_, service) = open_service(&config).await?;
            let suggestions = service.suggest(&context, &message).await;
            if cli.json {
                print_json(&suggestions)?;
            } else if suggestions.is_empty() {
                println!("No suggestions for keywords {:?}", service.keywords_for(&context, &message));
            } else {
                display_patterns(&suggestions);
            }
        }
        Commands::Enhance { prompt, context, message } => {
            let (_, service) = open_service(&config).await?;
            let enhanced = service.enhance_prompt(&prompt, &context, &message).await;
            if cli.json {
                print_json(&serde_json::json!({ "prompt": enhanced }))?;
            } else {
                println!("{}", enhanced);
            }
        }
        Commands::Analytics { user } => {
            let (_, service) = open_service(&config).await?;
            let analytics = service.analytics(&user).await;
            if cli.json {
                print_json(&analytics)?;
            } else {
                display_analytics(&user, &analytics);
            }
        }
        Commands::Patterns { limit } => {
            let (_, service) = open_service(&config).await?;
            let patterns = service.top_patterns(limit).await?;
            if cli.json {
                print_json(&patterns)?;
            } else if patterns.is_empty() {
                println!("No patterns learned yet.");
            } else {
                display_patterns(&patterns);
            }
        }
        Commands::Keywords { text } => {
            let keywords = crate::learning::KeywordExtractor::from_config(&config.learning).extract(&text);
            if cli.json {
                print_json(&keywords)?;
            } else {
                println!("{}", keywords.join(", "));
            }
        }
        Commands::Stats => {
            let (store, _) = open_service(&config).await?;
            let stats = store.stats().await?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("\nLearning Database Statistics");
                println!("============================");
                println!("  Database:               {}", config.storage.database_path.display());
                println!("  Conversations:          {}", stats.total_conversations);
                println!("  With feedback:          {}", stats.conversations_with_feedback);
                println!("  Patterns:               {}", stats.total_patterns);
                println!("  Positive patterns:      {}", stats.positive_patterns);
            }
        }
    }

    Ok(())
}

/// Open the configured database and build a service over it
async fn open_service(config: &Config) -> Result<(Arc<SqlitePatternStore>, AdaptiveLearningService)> {
    let path = &config.storage.database_path;
    let store = Arc::new(
        SqlitePatternStore::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?,
    );
    let service = AdaptiveLearningService::new(store.clone(), config.learning.clone());
    Ok((store, service))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn display_receipt(receipt: &FeedbackReceipt) {
    let conversation = &receipt.conversation;
    let quality = conversation
        .quality
        .map(|q| q.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Recorded feedback {} (quality {}) on {}",
        conversation.feedback.map(|f| f.to_string()).unwrap_or_default(),
        quality,
        conversation.id
    );

    match (&receipt.outcome, &receipt.learning_error) {
        (Some(LearningOutcome::Created(p)), _) => {
            println!("  New pattern {} [{}] score {:+.3}", p.id, p.context_keywords.join(", "), p.effectiveness_score);
        }
        (Some(LearningOutcome::Updated(p)), _) => {
            println!(
                "  Updated pattern {} score {:+.3} after {} uses",
                p.id, p.effectiveness_score, p.usage_count
            );
        }
        (Some(LearningOutcome::Skipped { .. }), _) => {
            println!("  Conversation disappeared before learning; no pattern changed");
        }
        (None, Some(err)) => {
            println!("  Pattern learning failed: {}", err);
        }
        (None, None) => {}
    }
}

fn display_patterns(patterns: &[ResponsePattern]) {
    println!("{:<38} {:>8} {:>6}  Keywords", "ID", "Score", "Uses");
    println!("{}", "-".repeat(80));
    for p in patterns {
        println!(
            "{:<38} {:>+8.3} {:>6}  {}",
            p.id,
            p.effectiveness_score,
            p.usage_count,
            p.context_keywords.join(", ")
        );
        println!("{:<38} {}", "", truncate(&p.response_template, 70));
    }
}

fn display_analytics(user: &str, analytics: &LearningAnalytics) {
    println!("\nLearning Analytics for {}", user);
    println!("============================");
    println!("  Conversations:      {}", analytics.total_conversations);
    println!("  Positive feedback:  {}", analytics.positive_feedback);
    println!("  Negative feedback:  {}", analytics.negative_feedback);
    println!("  Satisfaction rate:  {:.1}%", analytics.satisfaction_rate());
    println!("  Average quality:    {:.1}/5.0", analytics.avg_quality);
    println!("  Learned patterns:   {}", analytics.learned_patterns);

    if !analytics.top_patterns.is_empty() {
        println!();
        display_patterns(&analytics.top_patterns);
    }
}

/// Truncate to `max_chars` characters with an ellipsis
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_negative_feedback() {
        let cli = Cli::try_parse_from(["adaptive-learning", "feedback", "abc", "-1", "--quality", "4"]).unwrap();
        match cli.command {
            Commands::Feedback { id, feedback, quality } => {
                assert_eq!(id, "abc");
                assert_eq!(feedback, Feedback::Negative);
                assert_eq!(quality.map(Quality::get), Some(4));
            }
            _ => panic!("expected feedback command"),
        }
    }

    #[test]
    fn test_rejects_out_of_range_quality() {
        assert!(Cli::try_parse_from(["adaptive-learning", "feedback", "abc", "1", "--quality", "9"]).is_err());
    }

    #[test]
    fn test_parse_config_command() {
        let cli = Cli::try_parse_from(["adaptive-learning", "--json", "config"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Config));
    }

    #[tokio::test]
    async fn test_open_service_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.database_path = dir.path().join("nested").join("learning.db");

        let (store, service) = open_service(&config).await.unwrap();
        service
            .store_conversation("u", "", "tokio runtime panic", "use block_in_place", None)
            .await
            .unwrap();
        assert_eq!(store.stats().await.unwrap().total_conversations, 1);
        assert!(config.storage.database_path.exists());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world foo bar", 10), "hello w...");
    }
}
