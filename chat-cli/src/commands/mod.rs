//! CLI command implementations.

pub mod chat;
pub mod init;
pub mod show_config;
pub mod status;
