//! devrunner - Universal project command runner
//!
//! Finds the project's toolchain by probing the working directory and a
//! bounded number of parents for manifests and lockfiles, then runs the
//! user's command through the winning tool with the arguments untouched.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod error;
pub mod exec;
pub mod output;
pub mod probe;
pub mod resolve;
pub mod scripts;
pub mod suggest;
pub mod update;

pub use error::{exit_codes, RunError};
pub use exec::{CommandBackend, Invocation, Outcome, ProcessBackend};
pub use resolve::{Advisory, ResolveContext, Resolution, SearchOptions};
