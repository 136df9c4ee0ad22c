use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use promptcraft::config::{LoggingConfig, PromptCraftConfig};
use promptcraft::history::EntryId;
use promptcraft::service::models::{AnalyzeResponse, GenerationResult};
use promptcraft::service::HttpPromptService;
use promptcraft::session::SubmitOutcome;

#[derive(Parser)]
#[command(
    name = "promptcraft",
    about = "Turn rough ideas into structured prompts, with a local history",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an enhanced, structured prompt and record it in history
    Generate {
        /// The idea or prompt to enhance
        #[arg(required = true)]
        prompt: Vec<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Score a prompt for clarity, specificity, structure and completeness
    Analyze {
        /// The prompt to analyze
        #[arg(required = true)]
        prompt: Vec<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Browse and manage past generations
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Check that the generation service is reachable
    Ping,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List recent generations, newest first
    List {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show the full result of a past generation
    Show {
        /// Entry id (see `history list`)
        id: EntryId,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Delete a past generation
    Remove {
        /// Entry id (see `history list`)
        id: EntryId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The configured subscriber needs the config, so warnings raised while
    // loading it go through a temporary stderr-only one.
    let bootstrap = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .finish();
    let mut config = tracing::subscriber::with_default(bootstrap, || match &cli.config {
        Some(path) => PromptCraftConfig::load(path),
        None => Ok(PromptCraftConfig::load_or_default()),
    })?;
    config.apply_env_overrides();

    init_tracing(&config.logging);

    match cli.command {
        Commands::Generate { prompt, json } => {
            let prompt = prompt.join(" ");
            tracing::info!(url = %config.service.base_url, "Generating prompt");
            let session = promptcraft::open_session(&config)?;

            match session.submit(&prompt).await {
                SubmitOutcome::Succeeded(result) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                    } else {
                        print_generation(&result);
                    }
                    if !session.is_durable().await {
                        eprintln!("warning: result could not be saved to history");
                    }
                }
                SubmitOutcome::Failed(message) => bail!("{}", message),
                SubmitOutcome::Rejected => bail!("Please enter a prompt to generate"),
                SubmitOutcome::Superseded => bail!("request was superseded"),
            }
        }
        Commands::Analyze { prompt, json } => {
            let prompt = prompt.join(" ");
            if prompt.trim().is_empty() {
                bail!("Please enter a prompt to analyze");
            }
            let service = HttpPromptService::new(&config.service)?;
            let report = service
                .analyze(&prompt)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_analysis(&report);
            }
        }
        Commands::History { action } => {
            let session = promptcraft::open_session(&config)?;

            match action {
                HistoryAction::List { json } => {
                    let entries = session.history().await;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&entries)?);
                    } else if entries.is_empty() {
                        println!("No history yet.");
                    } else {
                        println!("{:<15} | {:<24} | Prompt", "ID", "Created");
                        println!("{:-<15}-|-{:-<24}-|-{:-<40}", "", "", "");
                        for entry in entries {
                            println!(
                                "{:<15} | {:<24} | {}",
                                entry.id,
                                entry.timestamp,
                                truncate(&entry.prompt, 60)
                            );
                        }
                    }
                }
                HistoryAction::Show { id, json } => {
                    let entry = session
                        .load_from_history(id)
                        .await
                        .with_context(|| format!("No history entry with id {}", id))?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&entry)?);
                    } else {
                        println!("Prompt:  {}", entry.prompt);
                        println!("Created: {}", entry.timestamp);
                        print_generation(&entry.result);
                    }
                }
                HistoryAction::Remove { id } => {
                    if session.remove(id).await {
                        println!("Entry {} removed.", id);
                    } else {
                        println!("No history entry with id {}.", id);
                    }
                }
            }
        }
        Commands::Ping => {
            let service = HttpPromptService::new(&config.service)?;
            match service.ping().await {
                Ok(message) => println!("{} -> {}", service.base_url(), message),
                Err(e) => {
                    tracing::debug!(error = %e, "ping failed");
                    bail!("{}", e.user_message());
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_generation(result: &GenerationResult) {
    println!("\n=== Enhanced Prompt ===");
    println!("{}", result.enhanced_prompt);
    println!("\nIntent: {}", result.intent);
    if let Some(score) = result.confidence_score {
        println!("Confidence: {}%", score);
    }
    if result.is_vague == Some(true) {
        println!("Note: the original prompt looks vague.");
    }

    let s = &result.structured_prompt;
    println!("\n--- Structure ---");
    println!("{:<10} {}", "Situation:", s.situation);
    println!("{:<10} {}", "Task:", s.task);
    println!("{:<10} {}", "Objective:", s.objective);
    println!("{:<10} {}", "Knowledge:", s.knowledge);

    if !result.suggestions.is_empty() {
        println!("\nSuggestions:");
        for suggestion in &result.suggestions {
            println!(" - {}", suggestion);
        }
    }
    println!();
}

fn print_analysis(report: &AnalyzeResponse) {
    let a = &report.analysis;
    println!("\n=== Prompt Analysis ===");
    println!("Overall:      {}", a.overall_score);
    println!("Clarity:      {}", a.clarity_score);
    println!("Specificity:  {}", a.specificity_score);
    println!("Structure:    {}", a.structure_score);
    println!("Completeness: {}", a.completeness_score);

    if !a.issues.is_empty() {
        println!("\nIssues:");
        for issue in &a.issues {
            println!(" - [{}] {}: {}", issue.severity, issue.kind, issue.message);
        }
    }
    if !a.suggestions.is_empty() {
        println!("\nSuggestions:");
        for suggestion in &a.suggestions {
            println!(" - {}", suggestion);
        }
    }
    if !a.metrics.is_empty() {
        println!("\nMetrics:");
        for (name, value) in &a.metrics {
            println!(" {:<16} {}", name, value);
        }
    }

    println!("\n=== Optimized Prompt ===");
    println!("{}\n", report.optimized_prompt);
}

fn truncate(s: &str, max: usize) -> String {
    let line = s.lines().next().unwrap_or("");
    if line.chars().count() <= max && line.len() == s.len() {
        return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}
