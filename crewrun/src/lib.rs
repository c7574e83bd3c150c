//! Markdown-defined crew workflows: parser, content resolver, output router
//! and execution scheduler.
//!
//! The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (grammar, placeholders, sampling,
//!   routing, verdicts). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, output files, processes,
//!   providers, run logs). Isolated to enable scripted providers in tests.
//!
//! Orchestration modules ([`scheduler`], [`run`], [`validate`]) coordinate core
//! logic with I/O to implement the CLI commands.

pub mod core;
pub mod definition;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
