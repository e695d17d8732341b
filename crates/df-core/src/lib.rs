//! df-core - Core library for Dataforge
//!
//! This crate provides the action model, workflow settings, target
//! resolution, and the session that assembles registrations from project
//! files into a compiled graph.

pub mod action;
pub mod builder;
pub mod checksum;
pub mod credentials;
pub mod dag;
pub mod error;
pub mod graph;
pub mod path;
pub mod reference;
pub mod schedules;
pub mod session;
pub mod settings;
pub mod target;

pub use action::{
    Action, ActionConfig, ActionDescriptor, ActionKind, ColumnDoc, ConfigType, Registration,
    RegistrationPayload, TableType, UnitTest, UnitTestRegistration,
};
pub use builder::{ActionBuilder, BuilderState};
pub use checksum::compute_checksum;
pub use error::{CoreError, CoreResult};
pub use graph::{CompilationError, CompiledGraph, GraphErrors, GraphWarning, ValidationError};
pub use reference::Deferred;
pub use session::Session;
pub use settings::{ProjectConfig, SettingsOverrides, SettingsSource, Warehouse};
pub use target::{Target, TargetRef};
