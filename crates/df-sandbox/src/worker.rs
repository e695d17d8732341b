//! Worker side of the compile exchange.
//!
//! The worker reads one request from stdin, compiles, writes one response to
//! stdout and exits. Fatal errors are sent back as data so the host can tell
//! them apart from a crashed worker.

use crate::error::{SandboxError, SandboxResult};
use crate::executor::compile_project;
use crate::protocol::{CompileRequest, CompileResponse};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Compile one request into a response
pub fn handle_request(request: &CompileRequest) -> CompileResponse {
    let compiled =
        compile_project(request).and_then(|graph| graph.to_json().map_err(SandboxError::from));
    match compiled {
        Ok(encoded) => CompileResponse::Success {
            encoded_graph: request.return_override.clone().unwrap_or(encoded),
        },
        Err(e) => {
            log::debug!("compile of {} failed: {}", request.project_dir, e);
            CompileResponse::Error {
                error: e.to_serialized(),
            }
        }
    }
}

/// Decode a raw request and handle it
pub fn respond(input: &str) -> CompileResponse {
    match serde_json::from_str::<CompileRequest>(input) {
        Ok(request) => handle_request(&request),
        Err(e) => CompileResponse::Error {
            error: SandboxError::InvalidRequest(e.to_string()).to_serialized(),
        },
    }
}

/// Serve one request over stdin/stdout
pub async fn serve_stdio() -> SandboxResult<()> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;

    let response = tokio::task::spawn_blocking(move || respond(&input))
        .await
        .map_err(|e| SandboxError::Panic(e.to_string()))?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&serde_json::to_vec(&response)?).await?;
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
