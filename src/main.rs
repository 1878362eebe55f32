//! flipkit - CAT S22 Flip root toolkit

mod app;
mod commands;
mod config;
mod constants;
mod headless;
mod paths;
mod system;
#[cfg(test)]
mod test_support;
mod ui;
mod workflow;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, OperationFinished};
use commands::executor::SystemRunner;
use commands::provision::HttpFetcher;
use commands::WorkflowEvent;
use config::AppConfig;
use headless::HeadlessCommand;
use system::scripts::{ScriptBundle, EMBEDDED_SCRIPTS};
use workflow::state::ActionKind;
use workflow::{Collaborators, WorkflowController};

/// CAT S22 Flip root toolkit
#[derive(Parser)]
#[command(name = "flipkit")]
#[command(version)]
#[command(about = "Detect, root and debloat a CAT S22 Flip - TUI by default, subcommands for scripted use")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Working directory (default: <system temp>/CAT_S22_Root)
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    /// Configuration file (default: ~/.config/flipkit/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Accept risk warnings without prompting
    #[arg(short, long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the connected device and its firmware
    Detect,
    /// Unlock the bootloader and root the device
    Root,
    /// Remove bloatware from a rooted device
    Debloat,
    /// Delete downloaded tools, extracted scripts and logs
    Cleanup,
    /// Show the paths in use
    Paths,
    /// Print an example configuration file
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging to file
    let log_dir = paths::data_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, paths::DIAGNOSTIC_LOG_FILE);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!("flipkit {} starting", constants::APP_VERSION);

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if let Some(dir) = cli.work_dir {
        config.paths.work_dir = Some(dir);
    }

    let headless = match cli.command {
        Some(Commands::Paths) => {
            print_paths(&config);
            return Ok(());
        }
        Some(Commands::Config) => {
            print!("{}", AppConfig::example_toml());
            return Ok(());
        }
        Some(Commands::Detect) => Some(HeadlessCommand::Detect),
        Some(Commands::Root) => Some(HeadlessCommand::Action(ActionKind::Root)),
        Some(Commands::Debloat) => Some(HeadlessCommand::Action(ActionKind::Debloat)),
        Some(Commands::Cleanup) => Some(HeadlessCommand::Cleanup),
        None => None,
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let controller = build_controller(&config, event_tx)?;

    match headless {
        Some(command) => headless::run(controller, event_rx, command, cli.yes).await,
        None => run_tui(controller, event_rx).await,
    }
}

fn build_controller(
    config: &AppConfig,
    events: mpsc::UnboundedSender<WorkflowEvent>,
) -> Result<WorkflowController> {
    let fetcher = HttpFetcher::new(config.timeouts.http_connect())
        .context("Failed to create HTTP client")?;

    let mut bundle = ScriptBundle::new().with_builtin();
    tracing::debug!("Embedded scripts: {}", bundle.embedded_count());
    if let Some(dir) = config.bundle_dir() {
        tracing::debug!("Script bundle directory: {}", dir.display());
        bundle = bundle.with_dir(dir);
    }

    Ok(WorkflowController::new(
        config,
        Collaborators {
            runner: Arc::new(SystemRunner::new()),
            fetcher: Arc::new(fetcher),
            bundle,
        },
        Some(events),
    ))
}

fn print_paths(config: &AppConfig) {
    let work_dir = config.work_dir();
    println!("Working directory: {}", work_dir.display());
    println!(
        "Activity log:      {}",
        work_dir.join(constants::ACTIVITY_LOG_FILE).display()
    );
    println!("Config file:       {}", paths::config_file().display());
    println!("Diagnostic logs:   {}", paths::data_dir().display());
    match config.bundle_dir() {
        Some(dir) => println!("Script bundle:     {}", dir.display()),
        None => println!("Script bundle:     (none)"),
    }
    let embedded: Vec<&str> = EMBEDDED_SCRIPTS.iter().map(|(name, _)| *name).collect();
    if embedded.is_empty() {
        println!("Embedded scripts:  (none)");
    } else {
        println!("Embedded scripts:  {}", embedded.join(", "));
    }
    println!("Project:           {}", constants::PROJECT_URL);
}

async fn run_tui(
    controller: WorkflowController,
    mut event_rx: mpsc::UnboundedReceiver<WorkflowEvent>,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<OperationFinished>();
    let mut app = App::new(controller, done_tx);

    // Run the app
    let result = run_app(&mut terminal, &mut app, &mut event_rx, &mut done_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Print log path
    println!("Activity log: {}", app.log_path.display());

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
        return Err(err);
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    event_rx: &mut mpsc::UnboundedReceiver<WorkflowEvent>,
    done_rx: &mut mpsc::UnboundedReceiver<OperationFinished>,
) -> Result<()> {
    if let Err(e) = app.controller.startup() {
        tracing::error!("Startup failed: {}", e);
        app.popup = Some(app::Popup::Error(
            commands::errors::ParsedError::from_workflow_error(&e, "Startup"),
        ));
    }
    app.sync_snapshot();

    // Create async event stream for responsive input
    let mut event_stream = EventStream::new();

    loop {
        // Draw UI
        terminal.draw(|frame| ui::draw(frame, app))?;

        let timeout = Duration::from_millis(constants::EVENT_POLL_TIMEOUT_MS);

        tokio::select! {
            biased;  // Prioritize in order: keys, workflow events, completions, timeout

            // Terminal key events (instant response)
            Some(Ok(event)) = event_stream.next() => {
                if let Event::Key(key) = event {
                    if key.kind == KeyEventKind::Press {
                        app.handle_key(key.code);
                    }
                }
            }
            // Log lines, status and state changes from the controller
            Some(event) = event_rx.recv() => {
                app.handle_workflow_event(event);
            }
            // Results of operations started from the menu
            Some(finished) = done_rx.recv() => {
                app.handle_operation_finished(finished);
            }
            // Timeout for spinner animation and redraw
            _ = tokio::time::sleep(timeout) => {}
        }

        // Update spinner animation
        app.tick();

        if app.should_quit {
            break;
        }
    }

    // Let a cancelled operation reap its process and remove temp files
    let deadline = Instant::now() + Duration::from_secs(constants::READER_DRAIN_TIMEOUT_SECS);
    while !app.controller.state().is_idle() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    Ok(())
}
