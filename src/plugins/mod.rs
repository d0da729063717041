//! Plugin records consumed by the agent loader.

pub mod registry;
pub mod types;

pub use registry::PluginRegistry;
pub use types::{Plugin, PluginCapabilities, PluginManifest, PluginMetadata, PluginStatus};
