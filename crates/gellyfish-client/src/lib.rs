//! gellyfish-client: Access to the hosted gelly.fish backend.
//!
//! Implements the `gellyfish-core` backend traits over the GraphQL API,
//! plus an in-memory backend with the same validation rules for tests and
//! offline use.

pub mod config;
pub mod error;
pub mod gadget;
pub mod memory;

pub use config::{create_client, load_config, EnvironmentConfig, GellyfishConfig};
pub use error::ConfigError;
pub use gadget::GadgetClient;
pub use memory::InMemoryBackend;
