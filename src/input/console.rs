//! Interactive console standing in for the physical buttons
//!
//! Useful on a bench without GPIO wiring:
//!
//! ```text
//! buttons> tap play
//! buttons> hold up 1.5
//! buttons> press down
//! buttons> release down
//! ```

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::ButtonEvent;
use crate::state::ButtonId;

const TAP_LENGTH: Duration = Duration::from_millis(50);
const DEFAULT_HOLD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Press(ButtonId),
    Release(ButtonId),
    Tap(ButtonId),
    Hold(ButtonId, Duration),
    Help,
    Quit,
}

/// Parse one console line; `Ok(None)` for a blank line
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let button = |word: Option<&str>| -> Result<ButtonId, String> {
        word.ok_or_else(|| format!("'{}' needs a button (up, down, play)", verb))?
            .parse()
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        "press" => ConsoleCommand::Press(button(words.next())?),
        "release" => ConsoleCommand::Release(button(words.next())?),
        "tap" => ConsoleCommand::Tap(button(words.next())?),
        "hold" => {
            let target = button(words.next())?;
            let duration = match words.next() {
                Some(secs) => {
                    let secs: f64 = secs
                        .parse()
                        .map_err(|_| format!("invalid duration '{}'", secs))?;
                    if !secs.is_finite() || secs <= 0.0 {
                        return Err(format!("invalid duration '{}'", secs));
                    }
                    Duration::from_secs_f64(secs)
                }
                None => DEFAULT_HOLD,
            };
            ConsoleCommand::Hold(target, duration)
        }
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(Some(command))
}

fn print_help() {
    println!("{}", "Button console".bold().cyan());
    println!("  {} <up|down|play>          press and release", "tap".yellow());
    println!("  {} <up|down|play> [secs]  press, wait, release", "hold".yellow());
    println!("  {} / {} <button>      single edges", "press".yellow(), "release".yellow());
    println!("  {}                          leave the console", "quit".yellow());
}

/// Run the console until `quit` or end of input
pub async fn run(events: mpsc::Sender<ButtonEvent>) -> Result<()> {
    let (line_tx, mut lines) = mpsc::channel::<String>(8);

    let reader = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut editor = DefaultEditor::new()?;
        loop {
            match editor.readline("buttons> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    });

    print_help();
    while let Some(line) = lines.recv().await {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e.red());
                continue;
            }
        };
        debug!(?command, "Console command");

        let edges: Vec<(ButtonEvent, Duration)> = match command {
            ConsoleCommand::Help => {
                print_help();
                continue;
            }
            ConsoleCommand::Quit => break,
            ConsoleCommand::Press(b) => vec![(ButtonEvent::pressed(b), Duration::ZERO)],
            ConsoleCommand::Release(b) => vec![(ButtonEvent::released(b), Duration::ZERO)],
            ConsoleCommand::Tap(b) => vec![
                (ButtonEvent::pressed(b), TAP_LENGTH),
                (ButtonEvent::released(b), Duration::ZERO),
            ],
            ConsoleCommand::Hold(b, length) => vec![
                (ButtonEvent::pressed(b), length),
                (ButtonEvent::released(b), Duration::ZERO),
            ],
        };

        for (event, wait) in edges {
            if events.send(event).await.is_err() {
                warn!("Button debouncer is gone, leaving console");
                return Ok(());
            }
            tokio::time::sleep(wait).await;
        }
    }

    // The blocking reader stays parked in readline until the next line
    drop(lines);
    if reader.is_finished() {
        reader.await??;
    }
    Ok(())
}
