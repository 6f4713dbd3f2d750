// src/ct_log/mod.rs
pub mod client;
pub mod leaf;
pub mod types;

pub use client::{CtLogClient, LogSource};
pub use leaf::{EntryType, RawLogEntry};
pub use types::{GetEntriesResponse, LogEntry, SignedTreeHead};
