//! Side-effecting helpers: configuration files, resource lookup, and child processes.

pub mod access;
pub mod config;
pub mod process;
pub mod resolve;
