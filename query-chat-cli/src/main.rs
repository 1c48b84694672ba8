//! CLI entry point for query-chat

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use query_chat_core::config::{Config, ConfigLoader};
use query_chat_core::feedback::{CsvFeedbackLog, Feedback, FeedbackRecord};
use query_chat_core::logging::init_logging;
use query_chat_core::session::{Role, Session, SessionManager, Turn};
use query_chat_core::QueryEngine;
use query_chat_engine::load_engine;
use query_chat_manager::server::start_manager;
use query_chat_manager::run_server;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "query-chat")]
#[command(about = "Chat with a precomputed query engine and collect feedback")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file
    Init {
        /// Accept all defaults without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// Run the web chat server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat interactively in the terminal
    Chat {
        /// Session key for conversation continuity
        #[arg(short, long, default_value = "cli")]
        session: String,
    },
    /// Ask a single question
    Ask {
        /// Question to send
        #[arg(short, long)]
        message: String,
    },
    /// List or delete stored sessions
    Sessions {
        /// Delete the session with this key
        #[arg(short, long)]
        delete: Option<String>,
    },
    /// Summarize the feedback log
    Feedback {
        /// Number of most recent records to show
        #[arg(short, long, default_value_t = 5)]
        last: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Init { yes } => run_init(&config_loader, yes),
        Commands::Serve { host, port } => {
            let mut config = config_loader.load()?;
            if let Some(host) = host {
                config.server.host = host.to_string();
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let _guard = init_logging(&config.logging);
            run_serve(&config).await
        }
        Commands::Chat { session } => {
            init_cli_tracing();
            let config = config_loader.load()?;
            run_chat(&config, &session).await
        }
        Commands::Ask { message } => {
            init_cli_tracing();
            let config = config_loader.load()?;
            run_ask(&config, &message).await
        }
        Commands::Sessions { delete } => {
            let config = config_loader.load()?;
            run_sessions(&config, delete)
        }
        Commands::Feedback { last } => {
            let config = config_loader.load()?;
            run_feedback(&config, last)
        }
    }
}

/// Quiet stderr logging for the interactive commands; `RUST_LOG` opts in
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn load_configured_engine(config: &Config) -> Result<Arc<dyn QueryEngine>> {
    let engine: Arc<dyn QueryEngine> =
        load_engine(&config.engine.artifact_path, config.engine.top_k).with_context(|| {
            format!(
                "failed to load query engine from {}",
                config.engine.artifact_path
            )
        })?;
    Ok(engine)
}

fn session_manager(config: &Config) -> SessionManager {
    if config.sessions.persist {
        SessionManager::persistent(&config.sessions.dir, config.chat.greeting.clone())
            .with_idle_ttl(Duration::from_secs(config.sessions.idle_ttl_secs))
    } else {
        SessionManager::in_memory(config.chat.greeting.clone())
    }
}

/// Write a config file, optionally asking for the key paths
fn run_init(loader: &ConfigLoader, yes: bool) -> Result<()> {
    let config_path = loader.config_path();
    println!("{}", style("Setting up query-chat").bold().cyan());

    if config_path.exists() && !yes {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", config_path.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Keeping existing configuration.");
            return Ok(());
        }
    }

    let mut config = Config::default();
    if !yes {
        config.engine.artifact_path = Input::new()
            .with_prompt("Path of the engine artifact")
            .default(config.engine.artifact_path.clone())
            .interact_text()?;
        config.feedback.log_path = Input::new()
            .with_prompt("Path of the feedback log")
            .default(config.feedback.log_path.clone())
            .interact_text()?;
    }

    loader.save(&config)?;
    println!(
        "\n{}",
        style("Configuration saved successfully!").green().bold()
    );
    println!("Config location: {}", config_path.display());
    println!("\nYou can now run:");
    println!("  {} - Start the web chat", style("query-chat serve").cyan());
    println!("  {} - Chat in the terminal", style("query-chat chat").cyan());
    Ok(())
}

async fn run_serve(config: &Config) -> Result<()> {
    println!("{}", style("Starting query-chat server...").bold().cyan());

    let engine = match load_configured_engine(config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("{:#}", e);
            return Err(e);
        }
    };
    let feedback = Arc::new(CsvFeedbackLog::new(&config.feedback.log_path));
    info!(path = %feedback.path().display(), "Feedback log ready");

    let (state, manager_handle) =
        start_manager(engine, feedback, session_manager(config), &config.chat);

    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host '{}'", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{}", style("Shutting down...").yellow());
            let _ = shutdown_tx.send(());
        }
    });

    println!(
        "{}",
        style(format!("Chat is running at http://{}. Press Ctrl+C to stop.", addr)).green()
    );
    run_server(state, addr, shutdown_rx).await?;

    // The router held the last command sender, so the manager loop ends here.
    match manager_handle.await {
        Ok(Err(e)) => warn!("Manager loop ended with error: {}", e),
        Err(e) => warn!("Manager task failed: {}", e),
        Ok(Ok(())) => {}
    }

    println!("{}", style("Server stopped.").green());
    Ok(())
}

fn print_turn(turn: &Turn) {
    match (turn.role, turn.error) {
        (_, true) => println!("{} {}", style("assistant>").red().bold(), turn.content),
        (Role::Assistant, false) => {
            println!("{} {}", style("assistant>").cyan().bold(), turn.content)
        }
        (Role::User, false) => println!("{} {}", style("you>").green().bold(), turn.content),
    }
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Offer the two feedback choices plus a skip option
fn prompt_feedback() -> Result<Option<Feedback>> {
    let mut items: Vec<&str> = Feedback::ALL.iter().map(|f| f.prompt_label()).collect();
    items.push("Skip");

    let idx = Select::new()
        .with_prompt("How was the answer?")
        .items(&items)
        .default(items.len() - 1)
        .interact()?;
    Ok(Feedback::ALL.get(idx).copied())
}

async fn run_chat(config: &Config, session_key: &str) -> Result<()> {
    let engine = load_configured_engine(config)?;
    let log = CsvFeedbackLog::new(&config.feedback.log_path);
    let mut sessions = session_manager(config);

    println!("{}", style(format!("💬 {}", config.chat.title)).bold());
    println!("{}", style(&config.chat.caption).dim());
    println!("{}\n", style("Type /quit to leave.").dim());

    for turn in sessions.get_or_create(session_key).turns() {
        print_turn(turn);
    }

    loop {
        let input: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let input = input.trim();
        if input == "/quit" || input == "/exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let session = sessions.get_or_create(session_key);
        let spinner = thinking_spinner();
        let outcome = session
            .submit_user_message(engine.as_ref(), input)
            .await
            .map(|_| ());
        spinner.finish_and_clear();

        if let Some(turn) = session.last_turn() {
            print_turn(turn);
        }
        if let Err(e) = outcome {
            eprintln!("{} {}", style("error:").red().bold(), e);
        }

        if session.is_feedback_eligible() {
            if let Some(choice) = prompt_feedback()? {
                match session.submit_feedback(&log, choice) {
                    Ok(Some(_)) => println!("{}", style("Thanks for the feedback!").green()),
                    Ok(None) => {}
                    Err(e) => eprintln!("{} {}", style("Failed to record feedback:").red(), e),
                }
            }
        }

        if let Err(e) = sessions.save_key(session_key) {
            warn!("Failed to persist session {}: {}", session_key, e);
        }
    }

    Ok(())
}

async fn run_ask(config: &Config, message: &str) -> Result<()> {
    let engine = load_configured_engine(config)?;
    let mut session = Session::new("ask", config.chat.greeting.clone());

    let spinner = thinking_spinner();
    let outcome = session.submit_user_message(engine.as_ref(), message).await;
    spinner.finish_and_clear();

    let reply = outcome?;
    println!("{}", reply.content);
    Ok(())
}

fn run_sessions(config: &Config, delete: Option<String>) -> Result<()> {
    let mut sessions = session_manager(config);
    if !sessions.is_persistent() {
        println!(
            "Session persistence is off; set {} to keep sessions on disk.",
            style("sessions.persist").cyan()
        );
        return Ok(());
    }

    if let Some(key) = delete {
        if sessions.delete(&key)? {
            println!("{} {}", style("Deleted session").green(), key);
        } else {
            println!("No stored session named {}", key);
        }
        return Ok(());
    }

    let stored = sessions.list_sessions();
    if stored.is_empty() {
        println!("No stored sessions in {}", config.sessions.dir);
    }
    for info in stored {
        println!(
            "  {}  updated {}",
            style(&info.key).bold(),
            info.updated_at.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}

/// Totals per feedback choice
fn tally(records: &[FeedbackRecord]) -> (usize, usize) {
    let good = records
        .iter()
        .filter(|r| r.feedback == Feedback::Good)
        .count();
    (good, records.len() - good)
}

fn run_feedback(config: &Config, last: usize) -> Result<()> {
    let log = CsvFeedbackLog::new(&config.feedback.log_path);
    let records = log
        .read_all()
        .with_context(|| format!("failed to read {}", log.path().display()))?;

    let (good, bad) = tally(&records);
    println!("{}", style("Feedback summary").bold());
    println!("  Log:   {}", log.path().display());
    println!("  Total: {}", records.len());
    println!("  {}: {}", Feedback::Good.prompt_label(), good);
    println!("  {}: {}", Feedback::Bad.prompt_label(), bad);

    let start = records.len().saturating_sub(last);
    for record in &records[start..] {
        println!(
            "\n  [{}] {}\n      {}",
            record.feedback,
            query_chat_core::utils::truncate(&record.question, 80),
            query_chat_core::utils::truncate(&record.response, 120)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["query-chat", "serve", "--port", "9000", "--host", "0.0.0.0"])
            .unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(port, Some(9000));
                assert_eq!(host, Some("0.0.0.0".parse().unwrap()));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_host() {
        assert!(Cli::try_parse_from(["query-chat", "serve", "--host", "localhost"]).is_err());
    }

    #[test]
    fn test_parse_chat_default_session() {
        let cli = Cli::try_parse_from(["query-chat", "-c", "/tmp/qc", "chat"]).unwrap();
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/qc")));
        match cli.command {
            Commands::Chat { session } => assert_eq!(session, "cli"),
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_tally() {
        let records = vec![
            FeedbackRecord::new("q1", "r1", Feedback::Good),
            FeedbackRecord::new("q2", "r2", Feedback::Bad),
            FeedbackRecord::new("q3", "r3", Feedback::Good),
        ];
        assert_eq!(tally(&records), (2, 1));
        assert_eq!(tally(&[]), (0, 0));
    }

    #[test]
    fn test_session_manager_follows_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        assert!(!session_manager(&config).is_persistent());

        config.sessions.persist = true;
        config.sessions.dir = temp_dir.path().to_string_lossy().to_string();
        assert!(session_manager(&config).is_persistent());
    }

    #[test]
    fn test_sessions_delete_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.sessions.persist = true;
        config.sessions.dir = temp_dir.path().to_string_lossy().to_string();

        let mut sessions = session_manager(&config);
        sessions.get_or_create("web-1");
        sessions.save_key("web-1").unwrap();
        assert_eq!(sessions.list_sessions().len(), 1);

        run_sessions(&config, Some("web-1".to_string())).unwrap();
        assert!(session_manager(&config).list_sessions().is_empty());
    }

    #[test]
    fn test_missing_artifact_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.engine.artifact_path = temp_dir
            .path()
            .join("rag_model.json")
            .to_string_lossy()
            .to_string();

        let err = load_configured_engine(&config).err().unwrap();
        assert!(format!("{:#}", err).contains("not found"));
    }

    #[test]
    fn test_init_with_defaults_writes_config() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        run_init(&loader, true).unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.engine.artifact_path, "rag_model.json");
    }
}
