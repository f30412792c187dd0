//! Command execution boundary.
//!
//! Every out-of-process effect the engine performs goes through
//! [`CommandRunner`], so tests can substitute a recording mock.

use std::process::Command;

use crate::error::{Error, Result};

/// Runs a shell command, optionally as another user, returning the
/// combined stdout and stderr. A non-zero exit status is an error whose
/// message carries the combined output, so callers can match on tool
/// diagnostics like `no such user`.
pub trait CommandRunner {
    fn run(&self, user: &str, command: &str) -> Result<Vec<u8>>;
}

/// Executes commands on the live system via `sh -c`, or `su -l` when a
/// target user is given.
pub struct LiveCommandRunner;

impl CommandRunner for LiveCommandRunner {
    fn run(&self, user: &str, command: &str) -> Result<Vec<u8>> {
        let output = if user.is_empty() {
            Command::new("sh").args(["-c", command]).output()
        } else {
            Command::new("su").args(["-l", user, "-c", command]).output()
        }
        .map_err(|e| Error::Command {
            command: command.to_string(),
            message: e.to_string(),
        })?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        if !output.status.success() {
            return Err(Error::Command {
                command: command.to_string(),
                message: String::from_utf8_lossy(&combined).trim().to_string(),
            });
        }

        Ok(combined)
    }
}
