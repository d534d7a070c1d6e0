//! Sequential script execution with best-effort revert.
//!
//! Commands are issued one at a time over a blocking request/response
//! channel. The first failure aborts the rest of the script and triggers
//! `uci revert` for every group the run could have touched. The revert
//! is advisory cleanup, not a rollback: it can itself fail, and state
//! already committed stays committed.

use crate::remote::RemoteExecutor;
use log::{debug, warn};
use thiserror::Error;

/// Execution failures for one device's script.
#[derive(Debug, Error)]
pub enum RunError {
    /// A command ran on the device and exited non-zero.
    #[error("remote command failed: `{command}`: {detail}")]
    CommandFailed { command: String, detail: String },

    /// The transport failed before the command's result was observed.
    #[error("transport failed while running `{command}`: {error}")]
    Transport {
        command: String,
        error: anyhow::Error,
    },
}

/// Run a script to completion, or revert and report the first failure.
pub fn run_script(
    executor: &dyn RemoteExecutor,
    commands: &[String],
    revert: &[String],
) -> Result<(), RunError> {
    for command in commands {
        debug!("executing: {command}");
        match executor.execute(command) {
            Ok(output) if output.success => {}
            Ok(output) => {
                warn!("command failed, reverting: {command}");
                run_revert(executor, revert);
                return Err(RunError::CommandFailed {
                    command: command.clone(),
                    detail: output.detail().to_string(),
                });
            }
            Err(error) => {
                run_revert(executor, revert);
                return Err(RunError::Transport {
                    command: command.clone(),
                    error,
                });
            }
        }
    }
    Ok(())
}

fn run_revert(executor: &dyn RemoteExecutor, revert: &[String]) {
    for command in revert {
        match executor.execute(command) {
            Ok(output) if output.success => {}
            Ok(output) => warn!("revert command failed: {command}: {}", output.detail()),
            Err(err) => warn!("revert command failed: {command}: {err}"),
        }
    }
}
