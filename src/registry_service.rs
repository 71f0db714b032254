//! Registry service: serializes mutations, stamps times, checks the
//! privileged caller and emits mutation facts.
//!
//! The service is the single entry point collaborators use. Mutations
//! take the writer lock so each one is an indivisible state transition;
//! queries take the reader lock and see one consistent snapshot. The
//! caller identity on every mutating call is trusted; authenticating it
//! is the hosting environment's job, not ours.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::profile_store::{Identity, Profile, ProfileStore};
use crate::ranking_engine::{self, LeaderboardEntry, RegistryStats};
use crate::registry_events::{fact_channel, FactReceiver, FactSender, RegistryFact};

/// Configuration for the registry service.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// The single identity allowed to call the privileged override.
    pub admin_identity: Identity,
    /// Path to the profile snapshot file.
    pub snapshot_file: PathBuf,
    /// How often the snapshot is rewritten.
    pub snapshot_interval: Duration,
    /// How often aggregate stats are logged.
    pub stats_log_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            admin_identity: Identity::new("registry-admin"),
            snapshot_file: PathBuf::from("./data/registry_snapshot.json"),
            snapshot_interval: Duration::from_secs(30),
            stats_log_interval: Duration::from_secs(60),
        }
    }
}

/// Thread-safe registry front end.
pub struct RegistryService {
    config: RegistryConfig,
    store: RwLock<ProfileStore>,
    facts: FactSender,
}

impl RegistryService {
    /// Create a service over an empty store. Returns the receiving end
    /// of the fact channel for the observability collaborator.
    pub fn new(config: RegistryConfig) -> (Self, FactReceiver) {
        Self::with_store(config, ProfileStore::new())
    }

    /// Create a service over a restored store (snapshot load path).
    pub fn with_store(config: RegistryConfig, store: ProfileStore) -> (Self, FactReceiver) {
        let (facts, fact_rx) = fact_channel();
        let service = Self {
            config,
            store: RwLock::new(store),
            facts,
        };
        (service, fact_rx)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a profile for the calling identity.
    pub fn create_profile(
        &self,
        caller: &Identity,
        content_pointer: &str,
        handle: &str,
    ) -> Result<Profile, RegistryError> {
        let now = unix_now();
        let profile = {
            let mut store = self.store.write();
            store
                .create_profile(caller, content_pointer, handle, now)?
                .clone()
        };

        info!("Registered profile for {} with handle {}", caller, handle);
        self.emit(RegistryFact::created(caller, handle, content_pointer, now));
        Ok(profile)
    }

    /// Replace the content pointer of the caller's own profile. Returns
    /// the previous pointer together with the updated profile.
    pub fn update_profile(
        &self,
        caller: &Identity,
        new_content_pointer: &str,
    ) -> Result<(String, Profile), RegistryError> {
        let now = unix_now();
        let (previous, profile) = {
            let mut store = self.store.write();
            let previous = store.update_content(caller, new_content_pointer, now)?;
            (previous, store.profile(caller)?.clone())
        };

        debug!("Updated content pointer for {}", caller);
        self.emit(RegistryFact::updated(
            caller,
            &previous,
            new_content_pointer,
            now,
        ));
        Ok((previous, profile))
    }

    /// Record one view of `target`'s profile. The caller needs no
    /// profile of its own; self-views count too.
    pub fn record_view(&self, target: &Identity) -> Result<u64, RegistryError> {
        let now = unix_now();
        let count = self.store.write().record_view(target)?;

        debug!("View #{} recorded for {}", count, target);
        self.emit(RegistryFact::view_recorded(target, count, now));
        Ok(count)
    }

    /// Privileged content overwrite for abuse remediation. Only the
    /// configured admin identity may call this; the hosting environment
    /// has already authenticated the caller value itself.
    pub fn admin_override(
        &self,
        caller: &Identity,
        target: &Identity,
        new_content_pointer: &str,
    ) -> Result<(String, Profile), RegistryError> {
        if *caller != self.config.admin_identity {
            return Err(RegistryError::Unauthorized {
                caller: caller.to_string(),
            });
        }

        let now = unix_now();
        let (previous, profile) = {
            let mut store = self.store.write();
            let previous = store.override_content(target, new_content_pointer, now)?;
            (previous, store.profile(target)?.clone())
        };

        warn!(
            "Privileged override on {}: content pointer replaced by {}",
            target, caller
        );
        self.emit(RegistryFact::updated(
            target,
            &previous,
            new_content_pointer,
            now,
        ));
        Ok((previous, profile))
    }

    pub fn profile(&self, identity: &Identity) -> Result<Profile, RegistryError> {
        self.store.read().profile(identity).cloned()
    }

    pub fn profile_by_handle(&self, handle: &str) -> Result<Profile, RegistryError> {
        self.store.read().profile_by_handle(handle).cloned()
    }

    pub fn is_handle_available(&self, handle: &str) -> bool {
        self.store.read().is_handle_available(handle)
    }

    pub fn list_identities(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Identity>, RegistryError> {
        ranking_engine::list_identities(&self.store.read(), offset, limit)
    }

    pub fn top_profiles(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, RegistryError> {
        ranking_engine::top_profiles(&self.store.read(), limit)
    }

    pub fn stats(&self) -> RegistryStats {
        ranking_engine::stats(&self.store.read())
    }

    pub fn profile_count(&self) -> usize {
        self.store.read().profile_count()
    }

    /// Every profile in roster order, for the persistence collaborator.
    pub fn snapshot_profiles(&self) -> Vec<Profile> {
        self.store
            .read()
            .profiles_in_roster_order()
            .cloned()
            .collect()
    }

    fn emit(&self, fact: RegistryFact) {
        // send only fails when every receiver is gone; running without
        // observers is legal
        if self.facts.send(fact).is_err() {
            debug!("No fact subscribers connected, dropping fact");
        }
    }
}

fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
