//! Subprocess helpers for the command-line tools the appliance drives

use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Run a program to completion and return its trimmed stdout
pub async fn run(program: &str, args: &[&str]) -> Result<String, CommandError> {
    trace!("exec {} {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(CommandError::Failed {
            program: program.to_string(),
            status: output.status,
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a program whose failure only matters as a log line
pub async fn run_quiet(program: &str, args: &[&str]) {
    if let Err(e) = run(program, args).await {
        debug!("{}", e);
    }
}

/// Start a long-running program without waiting for it
///
/// The child is reaped in the background so it never lingers as a zombie.
pub fn spawn_detached(program: &str, args: &[String]) -> Result<(), CommandError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let name = program.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!("{} exited with {}", name, status),
            Err(e) => debug!("waiting on {} failed: {}", name, e),
        }
    });
    Ok(())
}
