//! Hidden worker command: one compile request in, one response out

use anyhow::{Context, Result};

/// Execute the worker command
pub(crate) async fn execute() -> Result<()> {
    df_sandbox::serve_stdio()
        .await
        .context("Worker failed to serve the compile request")
}
