//! CLI command implementations

pub(crate) mod common;
pub(crate) mod compile;
pub(crate) mod validate;
pub(crate) mod worker;
