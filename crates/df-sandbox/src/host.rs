//! Host side of the compile exchange.
//!
//! Every compile runs in a fresh worker process so that project code can
//! never take the caller down with it. The whole exchange is bounded by a
//! timeout; a worker that overruns it is killed and reaped.

use crate::error::{HostError, HostResult};
use crate::protocol::{CompileRequest, CompileResponse};
use df_core::CompiledGraph;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Compile timeout when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Subcommand that turns the binary into a worker
pub const WORKER_SUBCOMMAND: &str = "worker";

/// How to start a worker process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The running executable's hidden worker subcommand
    pub fn current_exe() -> HostResult<Self> {
        Ok(Self::new(
            std::env::current_exe()?,
            vec![WORKER_SUBCOMMAND.to_string()],
        ))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompileHost {
    command: WorkerCommand,
    timeout: Duration,
}

impl CompileHost {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Compile in a worker and decode the resulting graph
    pub async fn compile(&self, request: &CompileRequest) -> HostResult<CompiledGraph> {
        let encoded = self.exchange(request).await?;
        Ok(CompiledGraph::from_json(&encoded)?)
    }

    /// Send one request and return the encoded graph the worker answered with
    pub async fn exchange(&self, request: &CompileRequest) -> HostResult<String> {
        let payload = serde_json::to_vec(request)?;
        let program = self.command.program.display().to_string();

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HostError::Spawn {
                program: program.clone(),
                source,
            })?;
        log::debug!("started worker {} (pid {:?})", program, child.id());

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| HostError::Protocol("worker stdin unavailable".to_string()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| HostError::Protocol("worker stdout unavailable".to_string()))?;

        let exchange = async {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
            drop(stdin);

            let mut output = Vec::new();
            stdout.read_to_end(&mut output).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, output))
        };

        let finished = tokio::time::timeout(self.timeout, exchange).await;
        let (status, output) = match finished {
            Ok(finished) => finished?,
            Err(_) => {
                log::warn!(
                    "worker {} timed out after {:?}; killing it",
                    program,
                    self.timeout
                );
                if let Err(e) = child.kill().await {
                    log::debug!("failed to kill worker: {}", e);
                }
                return Err(HostError::Timeout(self.timeout));
            }
        };

        match serde_json::from_slice::<CompileResponse>(&output) {
            Ok(CompileResponse::Success { encoded_graph }) => Ok(encoded_graph),
            Ok(CompileResponse::Error { error }) => Err(HostError::Fatal(error)),
            Err(_) if !status.success() => Err(HostError::WorkerCrashed {
                status: status.to_string(),
            }),
            Err(e) => Err(HostError::Protocol(e.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "host_test.rs"]
mod tests;
