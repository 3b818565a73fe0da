mod backend;
mod config;
mod console;
mod engine;
mod error;
mod state;
mod types;
mod view;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use crossterm::{cursor, execute, terminal::{Clear, ClearType}};
use std::io::{stdout, BufRead, Write};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use backend::{DashboardBackend, HttpBackend};
use crate::config::{parse_assignment, ClientConfig, DEFAULT_CONFIG_PATH};
use console::{Console, ConsoleCommand, HELP};
use engine::{CommandDispatcher, Lifecycle, Poller};
use state::{DashboardStore, ViewStatus};
use types::{AlertSide, TradeSide};
use view::{format_timestamp, run_state_label, DashboardView};

#[derive(Parser)]
#[command(name = "bot-dashboard")]
#[command(version = "0.1.0")]
#[command(about = "Terminal dashboard for a running trading bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Live dashboard with an interactive command prompt
    Watch,
    /// Fetch metrics and price once and print the dashboard
    Status,
    /// Show the backend health report
    Health,
    /// Start the bot if it is stopped, stop it if it is running
    Toggle,
    /// Place a manual trade
    Trade {
        /// buy or sell
        side: String,
        /// Amount in base currency
        amount: String,
    },
    /// Register a price alert
    Alert {
        /// above or below
        side: String,
        /// Trigger price in USD
        price: String,
    },
    /// Show or change the bot settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the editable settings
    Show,
    /// Change one or more settings and save them
    Set {
        /// KEY=VALUE pairs
        #[arg(required = true)]
        assignments: Vec<String>,
    },
}

/// Everything one dashboard instance runs on.
struct Session {
    lifecycle: Lifecycle,
    backend: Arc<dyn DashboardBackend>,
    store: DashboardStore,
    poller: Arc<Poller>,
    dispatcher: Arc<CommandDispatcher>,
}

impl Session {
    fn connect(config: &ClientConfig) -> Result<Self> {
        let backend: Arc<dyn DashboardBackend> = Arc::new(HttpBackend::new(&config.backend)?);
        let lifecycle = Lifecycle::new();
        let store = DashboardStore::new();
        let poller = Arc::new(Poller::new(backend.clone(), store.clone(), lifecycle.token()));
        let dispatcher = Arc::new(CommandDispatcher::new(
            backend.clone(),
            store.clone(),
            poller.clone(),
            lifecycle.token(),
        ));
        Ok(Self {
            lifecycle,
            backend,
            store,
            poller,
            dispatcher,
        })
    }

    /// Fails unless the metrics fetch left the dashboard ready.
    async fn require_ready(&self) -> Result<()> {
        match self.store.read(|d| d.status.clone()).await {
            ViewStatus::Error(message) => bail!(message),
            ViewStatus::Loading => bail!("metrics not loaded"),
            ViewStatus::Ready => Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    if cli.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let config = ClientConfig::load(&cli.config)?;

    match cli.command {
        Commands::Watch => run_watch(&config).await?,
        Commands::Status => show_status(&config).await?,
        Commands::Health => show_health(&config).await?,
        Commands::Toggle => toggle_bot(&config).await?,
        Commands::Trade { side, amount } => place_trade(&config, &side, &amount).await?,
        Commands::Alert { side, price } => add_alert(&config, &side, &price).await?,
        Commands::Settings { action } => match action {
            SettingsAction::Show => show_settings(&config).await?,
            SettingsAction::Set { assignments } => set_settings(&config, &assignments).await?,
        },
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}

async fn run_watch(config: &ClientConfig) -> Result<()> {
    info!("Bot dashboard v0.1.0 watching {}", config.backend.base_url);
    let session = Session::connect(config)?;
    let console = Console::new(
        session.store.clone(),
        session.poller.clone(),
        session.dispatcher.clone(),
        config.display,
    );

    let polls = session.poller.spawn(&config.polling);
    let mut events = session.store.subscribe();
    let mut lines = spawn_stdin_reader();
    let mut stdin_open = true;

    info!("Type 'help' for commands, Ctrl+C to stop");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    if let Err(e) = redraw(&console.screen().await) {
                        warn!("Redraw failed: {}", e);
                    }
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.recv(), if stdin_open => match line {
                Some(line) => match ConsoleCommand::parse(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(ConsoleCommand::Help)) => println!("{}", HELP),
                    Ok(Some(command)) => {
                        let console = console.clone();
                        tokio::spawn(async move { console.execute(command).await });
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{}", e),
                },
                None => {
                    info!("Console input closed, dashboard keeps running until Ctrl+C");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    session.lifecycle.shutdown();
    polls.join().await;
    Ok(())
}

fn redraw(screen: &str) -> std::io::Result<()> {
    let mut out = stdout();
    execute!(out, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    write!(out, "{}", screen)?;
    writeln!(out, "> ")?;
    out.flush()
}

/// Reads console lines on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Console input error: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

async fn show_status(config: &ClientConfig) -> Result<()> {
    let session = Session::connect(config)?;
    tokio::join!(
        session.poller.fetch_metrics(),
        session.poller.fetch_price(),
        session.poller.fetch_price_history(),
    );
    let data = session.store.snapshot().await;
    print!("{}", DashboardView::project(&data, &config.display));
    session.require_ready().await
}

async fn show_health(config: &ClientConfig) -> Result<()> {
    let session = Session::connect(config)?;
    let health = session.backend.fetch_health().await?;

    println!("\n=== Backend Health ===");
    println!("Status:             {}", health.status);
    println!("Last Update:        {}", format_timestamp(health.last_update.as_ref()));
    println!("Bot:                {}", run_state_label(health.bot_running));
    println!("Exchange Connected: {}", health.exchange_connected);
    println!("Open Position:      {}", health.current_position);
    Ok(())
}

async fn toggle_bot(config: &ClientConfig) -> Result<()> {
    let session = Session::connect(config)?;
    session.poller.fetch_metrics().await;
    session.require_ready().await?;

    let is_running = session.dispatcher.toggle_current().await?;
    println!("Status: {}", run_state_label(is_running));
    Ok(())
}

async fn place_trade(config: &ClientConfig, side: &str, amount: &str) -> Result<()> {
    let side = TradeSide::from_str(side).ok_or_else(|| anyhow!("trade side must be buy or sell, got {:?}", side))?;
    let session = Session::connect(config)?;
    let result = session.dispatcher.place_trade(side, amount).await;

    if let Some(status) = session.store.read(|d| d.trade_form.status.clone()).await {
        println!("{}", status);
    }
    result?;
    Ok(())
}

async fn add_alert(config: &ClientConfig, side: &str, price: &str) -> Result<()> {
    let side = AlertSide::from_str(side).ok_or_else(|| anyhow!("alert side must be above or below, got {:?}", side))?;
    let session = Session::connect(config)?;
    session.dispatcher.add_price_alert(side, price).await?;
    println!("Prisvarning tillagd: {} {}", side.label(), price);
    Ok(())
}

async fn show_settings(config: &ClientConfig) -> Result<()> {
    let session = Session::connect(config)?;
    session.poller.fetch_settings().await;
    let data = session.store.snapshot().await;
    if let Some(error) = data.settings_error {
        bail!(error);
    }

    println!("\n=== Bot Inställningar ===");
    for field in data.settings.form_fields() {
        println!("{:<28} {}", format!("{}:", field.label), field.value);
    }
    Ok(())
}

async fn set_settings(config: &ClientConfig, assignments: &[String]) -> Result<()> {
    let session = Session::connect(config)?;
    session.poller.fetch_settings().await;
    if let Some(error) = session.store.read(|d| d.settings_error.clone()).await {
        bail!(error);
    }

    for raw in assignments {
        let (key, value) = parse_assignment(raw)?;
        session.store.edit_setting(&key, &value).await?;
    }

    let settings = session.store.read(|d| d.settings.clone()).await;
    let saved = session.dispatcher.save_settings(settings).await?;
    info!("Saved {} settings", saved.len());
    for field in saved.form_fields() {
        println!("{:<28} {}", format!("{}:", field.label), field.value);
    }
    Ok(())
}
