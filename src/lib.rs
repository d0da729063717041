pub mod agents;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod plugins;
pub mod utils;
