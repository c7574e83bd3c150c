//! Side-effecting helpers: configuration, files, processes and providers.

pub mod config;
pub mod init;
pub mod outputs;
pub mod process;
pub mod prompt;
pub mod provider;
pub mod resolver;
pub mod run_log;
