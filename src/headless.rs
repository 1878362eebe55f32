//! Line-oriented front end for scripted use
//!
//! Prints the activity log to stdout as it happens, asks for a typed
//! confirmation before destructive actions and cancels the running operation
//! on Ctrl-C.

use anyhow::{Context, Result};
use std::future::Future;
use std::io::{BufRead, Write};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::commands::action::ExitOutcome;
use crate::commands::errors::{ParsedError, WorkflowError};
use crate::commands::{LogLevel, WorkflowEvent};
use crate::workflow::state::{ActionKind, RiskAcknowledgement};
use crate::workflow::WorkflowController;

/// Operations available without the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessCommand {
    Detect,
    Action(ActionKind),
    Cleanup,
}

/// Run one operation to completion
pub async fn run(
    controller: WorkflowController,
    events: mpsc::UnboundedReceiver<WorkflowEvent>,
    command: HeadlessCommand,
    assume_yes: bool,
) -> Result<()> {
    let printer = tokio::spawn(print_events(events));
    drive(controller, printer, command, assume_yes).await
}

/// Execute `command`, then let `printer` drain every event before returning
async fn drive(
    controller: WorkflowController,
    printer: JoinHandle<()>,
    command: HeadlessCommand,
    assume_yes: bool,
) -> Result<()> {
    let outcome = execute(&controller, command, assume_yes).await;

    // Dropping the controller closes the event channel so the printer ends
    drop(controller);
    if let Err(e) = printer.await {
        tracing::debug!("Event printer ended abnormally: {}", e);
    }

    outcome?.map_err(|e| report_failure(command, e))
}

/// The outer error covers setup and prompting; the inner one is the
/// operation's own failure
async fn execute(
    controller: &WorkflowController,
    command: HeadlessCommand,
    assume_yes: bool,
) -> Result<Result<(), WorkflowError>> {
    controller
        .startup()
        .context("Failed to prepare working directory")?;

    let result = match command {
        HeadlessCommand::Detect => {
            let outcome = until_ctrl_c(controller, controller.detect()).await;
            outcome.map(|report| {
                let firmware = report
                    .firmware
                    .map(|f| f.label())
                    .unwrap_or_else(|| "Unknown".to_string());
                println!("Device: {}", report.state.label());
                println!("Firmware: {}", firmware);
            })
        }
        HeadlessCommand::Action(kind) => {
            let ack = acknowledge(kind, assume_yes)?;
            match until_ctrl_c(controller, controller.run_action(kind, ack)).await {
                Ok(ExitOutcome::Cancelled) => {
                    anyhow::bail!("{} cancelled", kind.label());
                }
                other => other.map(|_| ()),
            }
        }
        HeadlessCommand::Cleanup => {
            if !assume_yes && !confirm(&["This will delete all temporary files."])? {
                println!("Cleanup aborted.");
                return Ok(Ok(()));
            }
            controller.cleanup()
        }
    };
    Ok(result)
}

/// Await `operation`, cancelling it through the controller on Ctrl-C
async fn until_ctrl_c<T>(
    controller: &WorkflowController,
    operation: impl Future<Output = Result<T, WorkflowError>>,
) -> Result<T, WorkflowError> {
    tokio::pin!(operation);
    tokio::select! {
        result = &mut operation => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted, cancelling...");
            controller.cancel();
            operation.await
        }
    }
}

fn acknowledge(kind: ActionKind, assume_yes: bool) -> Result<RiskAcknowledgement> {
    if assume_yes || confirm(kind.risk_notice())? {
        Ok(RiskAcknowledgement::accepted(kind))
    } else {
        Ok(RiskAcknowledgement::declined(kind))
    }
}

fn confirm(notice: &[&str]) -> Result<bool> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    confirm_with(notice, stdin.lock(), &mut stdout)
}

/// Show `notice` and read an explicit "yes"
fn confirm_with(notice: &[&str], mut input: impl BufRead, output: &mut impl Write) -> Result<bool> {
    for line in notice {
        writeln!(output, "{}", line)?;
    }
    write!(output, "\nType 'yes' to continue: ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

async fn print_events(mut events: mpsc::UnboundedReceiver<WorkflowEvent>) {
    let mut last_percent = None;
    while let Some(event) = events.recv().await {
        match event {
            WorkflowEvent::Log(line) if line.level == LogLevel::Debug => {}
            WorkflowEvent::Log(line) if line.level >= LogLevel::Warning => eprintln!("{}", line),
            WorkflowEvent::Log(line) => println!("{}", line),
            WorkflowEvent::Progress(progress) => {
                let percent = progress.percent();
                if percent != last_percent && percent.is_some_and(|p| p % 10 == 0) {
                    eprintln!("Downloading Platform Tools: {}%", percent.unwrap_or_default());
                }
                last_percent = percent;
            }
            _ => {}
        }
    }
}

fn report_failure(command: HeadlessCommand, err: WorkflowError) -> anyhow::Error {
    let operation = match command {
        HeadlessCommand::Detect => "Detect Device",
        HeadlessCommand::Action(kind) => kind.label(),
        HeadlessCommand::Cleanup => "Cleanup",
    };
    let parsed = ParsedError::from_workflow_error(&err, operation);
    eprintln!();
    eprintln!("{}", parsed.summary);
    if let Some(detail) = &parsed.detail {
        eprintln!("  {}", detail);
    }
    eprintln!("  Suggestion: {}", parsed.suggestion);

    anyhow::Error::new(err).context(format!("{} failed", operation))
}
