//! Interactive terminal front end for the badge and panel

use crate::clipboard::ClipboardSink;
use crate::errors::Result;
use crate::runner::{DiagnosticRunner, RunOutcome};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, error};

const HELP: &str = "Commands: [o] toggle panel  [r] run tests  [c] copy report  [s] show  [q] quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TogglePanel,
    Run,
    Copy,
    Show,
    Help,
    Quit,
    Unknown(String),
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "o" | "open" | "toggle" => Command::TogglePanel,
            "r" | "run" => Command::Run,
            "c" | "copy" => Command::Copy,
            "" | "s" | "show" => Command::Show,
            "?" | "h" | "help" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Drives a [`DiagnosticRunner`] from line-based user input
pub struct Console {
    runner: Arc<DiagnosticRunner>,
    clipboard: Box<dyn ClipboardSink>,
}

impl Console {
    pub fn new(runner: Arc<DiagnosticRunner>, clipboard: Box<dyn ClipboardSink>) -> Self {
        Self { runner, clipboard }
    }

    /// Start the automatic run in the background and serve commands until quit or EOF.
    ///
    /// Runs execute in spawned tasks so the panel stays responsive; the badge
    /// and panel are redrawn whenever one finishes.
    pub async fn run<R, W>(&self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut runs: FuturesUnordered<JoinHandle<RunOutcome>> = FuturesUnordered::new();
        if let Some(handle) = self.runner.spawn_auto_run().await {
            runs.push(handle);
        }

        write_block(output, &format!("{}\n{}", self.runner.render().await, HELP)).await?;

        let mut lines = input.lines();
        loop {
            let message = tokio::select! {
                biased;

                Some(joined) = runs.next(), if !runs.is_empty() => match joined {
                    Ok(_) => self.runner.render().await,
                    Err(e) => {
                        error!("Diagnostic run task failed: {}", e);
                        format!("Diagnostic run failed: {}", e)
                    }
                },

                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let command = Command::from(line.as_str());
                    debug!("Console command: {:?}", command);

                    match command {
                        Command::Quit => break,
                        Command::Run => match self.runner.spawn_run().await {
                            Ok(handle) => {
                                runs.push(handle);
                                self.runner.render().await
                            }
                            Err(RunOutcome::NotConfigured) => "No backend URL configured.".to_string(),
                            Err(_) => "A run is already in progress.".to_string(),
                        },
                        other => self.handle(other).await,
                    }
                }
            };

            write_block(output, &message).await?;
        }

        for handle in runs.iter() {
            handle.abort();
        }
        Ok(())
    }

    async fn handle(&self, command: Command) -> String {
        match command {
            Command::TogglePanel => {
                self.runner.toggle_open().await;
                self.runner.render().await
            }
            Command::Copy => match self.runner.copy_report(self.clipboard.as_ref()).await {
                Ok(true) => "Report copied.".to_string(),
                Ok(false) => "No report to copy yet.".to_string(),
                Err(e) => {
                    error!("Copy failed: {}", e);
                    format!("Copy failed: {}", e)
                }
            },
            Command::Show => self.runner.render().await,
            Command::Help => HELP.to_string(),
            Command::Unknown(other) => format!("Unknown command {:?}. {}", other, HELP),
            Command::Run | Command::Quit => String::new(),
        }
    }
}

async fn write_block<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
