//! Shared configuration, error and data-model types for the mailflow workspace.

pub mod config;
pub mod db;
pub mod error;
pub mod redis_pool;
pub mod types;
