//! df-template - Sandboxed Jinja evaluation for Dataforge
//!
//! This crate evaluates compiled project files. Each file gets a fresh
//! minijinja environment with a project-scoped loader, a fuel limit, and
//! only the functions its action type may call: `ref()`, `self()`,
//! `config()` and friends for SQL files, `publish()`, `operate()`,
//! `assert()`, `declare()` and `notebook()` for scripts. Every environment
//! also gets `var()`, `log()`, `error()`, `warn()`, `from_json()` and
//! `to_json()`.

pub mod capabilities;
pub mod context;
pub mod environment;
pub mod error;
pub mod functions;
pub mod handle;
pub mod loader;

pub use capabilities::{supported_capabilities, UnsupportedCapabilityPolicy};
pub use context::ActionContext;
pub use environment::{FileOutput, SandboxEnvironment, TemplateOptions, DEFAULT_FUEL};
pub use error::{TemplateError, TemplateResult};
pub use handle::ActionHandle;
pub use loader::ProjectLoader;
