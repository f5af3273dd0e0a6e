//! devrunner-core - Shared functionality for devrunner
//!
//! Standard paths, layered configuration and installed-tool lookup.

pub mod config;
pub mod format;
pub mod paths;
pub mod tools;

pub use config::{ConfigLayer, Settings};
pub use paths::Paths;
pub use tools::{StaticChecker, ToolChecker, WhichChecker};
