pub mod error;
pub mod handle_validator;
pub mod profile_store;
pub mod ranking_engine;
pub mod registry_events;
pub mod registry_service;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use error::{ErrorKind, RegistryError};
pub use profile_store::{Identity, Profile, ProfileStore};
pub use ranking_engine::{LeaderboardEntry, RegistryStats};
pub use registry_events::{FactKind, FactPayload, FactReceiver, RegistryFact};
pub use registry_service::{RegistryConfig, RegistryService};
