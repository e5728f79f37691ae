//! Backend that shells out to a text-generation CLI.
//!
//! The prompt is written to the child's stdin and the completion is read from
//! stdout, e.g. `claude --print` or `llm -m <model>`.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use super::{GenerationOptions, TextGenerator};
use crate::errors::GenerationError;

/// Placeholder in configured arguments that is replaced by the model name.
pub const MODEL_PLACEHOLDER: &str = "{model}";

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    /// Create a generator; `{model}` in `args` is replaced by `model`.
    pub fn new(command: &str, args: &[String], model: &str, timeout: Duration) -> Self {
        let args = args
            .iter()
            .map(|a| a.replace(MODEL_PLACEHOLDER, model))
            .collect();
        Self {
            command: command.to_string(),
            args,
            timeout,
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    async fn run(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GenerationError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            GenerationError::Io(std::io::Error::other("generator stdin was not captured"))
        })?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            GenerationError::Io(std::io::Error::other("generator stdout was not captured"))
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            GenerationError::Io(std::io::Error::other("generator stderr was not captured"))
        })?;

        // Feed stdin while draining both pipes so a large prompt cannot deadlock
        let feed = async move {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await
        };
        let mut output = String::new();
        let mut errors = String::new();
        let (fed, out_read, err_read) = tokio::join!(
            feed,
            stdout.read_to_string(&mut output),
            stderr.read_to_string(&mut errors)
        );
        out_read?;
        err_read?;

        let status = child.wait().await?;
        if !status.success() {
            return Err(GenerationError::NonZeroExit {
                exit_code: status.code().unwrap_or(-1),
                stderr: errors.trim().to_string(),
            });
        }

        // A CLI may exit successfully without reading all of stdin
        if let Err(e) = fed
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(e.into());
        }

        let output = output.trim().to_string();
        if output.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(output)
    }
}

#[async_trait]
impl TextGenerator for CommandGenerator {
    /// Sampling options are not forwarded; the CLI decides them.
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let start = Instant::now();
        debug!(command = %self.command, prompt_chars = prompt.chars().count(), "invoking generator command");

        let result = tokio::time::timeout(self.timeout, self.run(prompt))
            .await
            .map_err(|_| GenerationError::Timeout {
                secs: self.timeout.as_secs(),
            })?;

        debug!(
            command = %self.command,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "generator command finished"
        );
        result
    }

    fn name(&self) -> &str {
        &self.command
    }
}
