// src/lib.rs
// Library interface for ct-scanlog
pub mod artifact;
pub mod cert_parser;
pub mod cli;
pub mod config;
pub mod ct_log;
pub mod director;
pub mod error;
pub mod output;
pub mod processor;
pub mod progress;
pub mod scanner;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod types;

#[cfg(test)]
mod testing;
