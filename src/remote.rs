//! Remote command execution.
//!
//! The engine never opens connections itself; everything that touches a
//! device goes through the [`RemoteExecutor`] capability. The production
//! implementation shells out to the system `ssh` binary (wrapped in
//! `sshpass` when password authentication is configured), which keeps
//! key management and known-host policy in the operator's hands.

use anyhow::{Context, Result, bail};
use log::debug;
use std::process::Command;

/// Output of one remotely executed command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    /// The most useful line of diagnostics for a failed command.
    pub fn detail(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Capability to run a command on a device and observe its result.
pub trait RemoteExecutor {
    /// Run one command, returning its output. `Err` means the transport
    /// itself failed; a command that ran and exited non-zero comes back
    /// as `Ok` with `success == false`.
    fn execute(&self, command: &str) -> Result<CommandOutput>;
}

/// SSH transport to a single device, via the system `ssh` binary.
pub struct SshSession {
    host: String,
    username: String,
    password: Option<String>,
}

impl SshSession {
    /// Open a session and probe it with a no-op command, so auth and
    /// reachability problems surface before any real work starts.
    pub fn connect(host: &str, username: &str, password: Option<&str>) -> Result<Self> {
        let session = Self {
            host: host.to_string(),
            username: username.to_string(),
            password: password.map(str::to_string),
        };
        let probe = session.execute("true")?;
        if !probe.success {
            bail!(
                "SSH probe to {}@{} failed: {}",
                username,
                host,
                probe.detail()
            );
        }
        Ok(session)
    }
}

impl RemoteExecutor for SshSession {
    fn execute(&self, command: &str) -> Result<CommandOutput> {
        debug!("ssh {}@{}: {command}", self.username, self.host);

        let mut cmd = if let Some(password) = &self.password {
            let mut cmd = Command::new("sshpass");
            cmd.arg("-e").env("SSHPASS", password).arg("ssh");
            cmd
        } else {
            let mut cmd = Command::new("ssh");
            cmd.args(["-o", "BatchMode=yes"]);
            cmd
        };

        // Embedded targets regenerate host keys on every reflash; strict
        // checking would make each firmware upgrade a manual intervention.
        cmd.args([
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            "-o",
            "LogLevel=ERROR",
        ]);
        cmd.arg(format!("{}@{}", self.username, self.host));
        cmd.arg(command);

        let output = cmd
            .output()
            .with_context(|| format!("Failed to spawn ssh for {}", self.host))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted executor for exercising discovery, export and the
    //! runner without a device.

    use super::{CommandOutput, RemoteExecutor};
    use anyhow::Result;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct ScriptedExecutor {
        responses: HashMap<String, CommandOutput>,
        /// Every command received, in order.
        pub executed: RefCell<Vec<String>>,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Respond to `command` with `stdout` and a zero exit status.
        #[must_use]
        pub fn respond(mut self, command: &str, stdout: &str) -> Self {
            self.responses.insert(
                command.to_string(),
                CommandOutput {
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                    success: true,
                },
            );
            self
        }

        /// Respond to `command` with `stderr` and a failing exit status.
        #[must_use]
        pub fn fail(mut self, command: &str, stderr: &str) -> Self {
            self.responses.insert(
                command.to_string(),
                CommandOutput {
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                    success: false,
                },
            );
            self
        }

        pub fn commands(&self) -> Vec<String> {
            self.executed.borrow().clone()
        }
    }

    impl RemoteExecutor for ScriptedExecutor {
        fn execute(&self, command: &str) -> Result<CommandOutput> {
            self.executed.borrow_mut().push(command.to_string());
            Ok(self
                .responses
                .get(command)
                .cloned()
                .unwrap_or(CommandOutput {
                    stdout: String::new(),
                    stderr: String::new(),
                    success: true,
                }))
        }
    }
}
