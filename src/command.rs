//! External collaborator processes
//!
//! OCR, language identification and entity extraction run as separate
//! programs that print JSON on stdout.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Errors raised while talking to an external collaborator
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("malformed output from `{program}`: {source}")]
    Parse {
        program: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Program plus fixed leading arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Executable name or path
    pub program: String,
    /// Arguments passed before any per-call argument
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Run with `path` appended to the arguments and parse stdout as JSON
    pub fn run_with_path<T: DeserializeOwned>(&self, path: &Path) -> Result<T, CollaboratorError> {
        debug!("Running {} {:?} {}", self.program, self.args, path.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| self.spawn_error(source))?;

        self.parse_output(output)
    }

    /// Run with `input` written to stdin and parse stdout as JSON.
    ///
    /// Stdin is fed from a scoped thread while stdout and stderr are drained,
    /// so a child echoing large output cannot block on a full pipe.
    pub fn run_with_stdin<T: DeserializeOwned>(&self, input: &str) -> Result<T, CollaboratorError> {
        debug!("Running {} {:?} with {} bytes on stdin", self.program, self.args, input.len());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| self.spawn_error(source))?;

        let stdin = child.stdin.take();
        let (output, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                // Dropping the handle closes the pipe
                Some(mut stdin) => stdin.write_all(input.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "stdin writer panicked")));
            (output, written)
        });

        let output = output.map_err(|source| self.spawn_error(source))?;
        match written {
            // The child stopped reading; its status and stdout decide the result
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("{} closed stdin early", self.program);
            }
            Err(e) => return Err(self.spawn_error(e)),
            Ok(()) => {}
        }

        self.parse_output(output)
    }

    fn spawn_error(&self, source: std::io::Error) -> CollaboratorError {
        CollaboratorError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    fn parse_output<T: DeserializeOwned>(&self, output: std::process::Output) -> Result<T, CollaboratorError> {
        if !output.status.success() {
            return Err(CollaboratorError::Exit {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|source| CollaboratorError::Parse {
            program: self.program.clone(),
            source,
        })
    }
}
