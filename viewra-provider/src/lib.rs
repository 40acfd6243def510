//! C5: Provider Plugin Boundary.
//!
//! Discovers plugin binaries under a configured directory, spawns each as a
//! supervised subprocess listening on a Unix domain socket, dials it over
//! gRPC, and routes `StartTranscode`/`GetProgress`/`StopTranscode`/
//! `StartStream`/`GetStream`/`StopStream` calls across that boundary. Hot
//! reload respawns a plugin whose binary changed on disk without dropping
//! the provider id clients already hold.

pub mod client;
pub mod convert;
pub mod error;
pub mod manifest;
pub mod pool;
pub mod reload;
mod uds;

pub use client::ProviderClient;
pub use error::{ProviderError, Result};
pub use manifest::{discover_plugins, DiscoveredPlugin, PluginManifest};
pub use pool::{ProviderEvent, ProviderPool};
