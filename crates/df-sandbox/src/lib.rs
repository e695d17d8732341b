//! df-sandbox - Compile host for Dataforge
//!
//! This crate turns a project directory into a compiled graph. It selects a
//! bundled core library, discovers include and definition files, and
//! evaluates each of them in isolation. Callers normally go through
//! [`CompileHost`], which runs the compile in a separate worker process
//! under a timeout.

pub mod error;
pub mod executor;
pub mod host;
pub mod index;
pub mod library;
pub mod protocol;
pub mod worker;

pub use error::{HostError, HostResult, SandboxError, SandboxResult};
pub use executor::compile_project;
pub use host::{CompileHost, WorkerCommand, DEFAULT_TIMEOUT, WORKER_SUBCOMMAND};
pub use index::{generate_index, legacy_generate_index, ProjectIndex};
pub use library::{CoreLibrary, EntryPointMode, EntryPoints, CORE_VERSION, LEGACY_CORE_VERSION};
pub use protocol::{CompileRequest, CompileResponse, SerializedError};
pub use worker::{handle_request, serve_stdio};
