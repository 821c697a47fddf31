//! Process invocation seam.
//!
//! `CommandRunner` is what the iproute2 backend calls to execute `ip`.
//! `SystemRunner` spawns the real program, blocking until it exits.

use std::process::Command;

use thiserror::Error;

/// Failure to run an external command.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("failed to execute `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("`{command}` exited with {}: {}", status_text(.status), .stderr.trim())]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

/// Render a program and its arguments as one line for logs.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Trait for executing external commands, returning captured stdout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError>;
}

/// Production runner: spawns the program directly, no shell, no timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        tracing::trace!(command = %command_line(program, args), "Executing");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| CommandError::Spawn {
                command: command_line(program, args),
                message: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(CommandError::Failed {
                command: command_line(program, args),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}
