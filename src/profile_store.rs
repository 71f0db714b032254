//! Canonical profile storage and the invariants it enforces.
//!
//! The store owns four co-located structures that must only ever change
//! together: the identity→profile map, the two handle index maps, and the
//! insertion-ordered roster. Every mutation validates its preconditions
//! first and then applies all structure updates before returning, so no
//! caller can observe a profile without its handle index entries or vice
//! versa.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::handle_validator::{self, MAX_HANDLE_LENGTH, MIN_HANDLE_LENGTH};

/// An opaque account address owning at most one profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A registered profile.
///
/// `created_at` is set once at registration; `updated_at` moves on every
/// content mutation; `view_count` only ever increases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub identity: Identity,
    pub handle: String,
    pub content_pointer: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub view_count: u64,
}

/// In-memory profile registry state.
///
/// Mutating methods take `&mut self`; the surrounding service serializes
/// them behind a single writer lock. Timestamps are passed in by the
/// caller so the store itself stays clock-free.
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: HashMap<Identity, Profile>,
    handle_to_identity: HashMap<String, Identity>,
    identity_to_handle: HashMap<Identity, String>,
    /// Every identity that ever registered, in registration order.
    roster: Vec<Identity>,
    /// Running sum of all view counts, bumped once per recorded view.
    total_views: u64,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from profiles in roster order, re-checking every
    /// invariant. Used when loading a snapshot produced by a persistence
    /// collaborator.
    pub fn restore(profiles: Vec<Profile>) -> Result<Self, RegistryError> {
        let mut store = Self::new();

        for profile in profiles {
            if store.profiles.contains_key(&profile.identity) {
                return Err(RegistryError::ProfileExists {
                    identity: profile.identity.to_string(),
                });
            }
            if store.handle_to_identity.contains_key(&profile.handle) {
                return Err(RegistryError::HandleTaken {
                    handle: profile.handle.clone(),
                });
            }
            if !handle_validator::is_valid_length(&profile.handle) {
                let length = profile.handle.chars().count();
                return Err(if length < MIN_HANDLE_LENGTH {
                    RegistryError::HandleTooShort {
                        handle: profile.handle.clone(),
                        length,
                    }
                } else {
                    RegistryError::HandleTooLong {
                        handle: profile.handle.clone(),
                        length,
                    }
                });
            }
            if !handle_validator::is_valid_charset(&profile.handle) {
                return Err(RegistryError::HandleInvalidChars {
                    handle: profile.handle.clone(),
                });
            }
            if profile.created_at > profile.updated_at {
                return Err(RegistryError::TimestampOrder {
                    identity: profile.identity.to_string(),
                });
            }

            store.total_views += profile.view_count;
            store
                .handle_to_identity
                .insert(profile.handle.clone(), profile.identity.clone());
            store
                .identity_to_handle
                .insert(profile.identity.clone(), profile.handle.clone());
            store.roster.push(profile.identity.clone());
            store.profiles.insert(profile.identity.clone(), profile);
        }

        Ok(store)
    }

    /// Register a new profile for `identity`.
    ///
    /// Precondition checks run in a fixed order and the first failure
    /// wins: handle too short, handle too long, handle taken, handle has
    /// invalid characters, profile already exists, content pointer empty.
    /// On success all four structures are updated before returning.
    pub fn create_profile(
        &mut self,
        identity: &Identity,
        content_pointer: &str,
        handle: &str,
        now: u64,
    ) -> Result<&Profile, RegistryError> {
        let length = handle.chars().count();
        if length < MIN_HANDLE_LENGTH {
            return Err(RegistryError::HandleTooShort {
                handle: handle.to_string(),
                length,
            });
        }
        if length > MAX_HANDLE_LENGTH {
            return Err(RegistryError::HandleTooLong {
                handle: handle.to_string(),
                length,
            });
        }
        if self.handle_to_identity.contains_key(handle) {
            return Err(RegistryError::HandleTaken {
                handle: handle.to_string(),
            });
        }
        if !handle_validator::is_valid_charset(handle) {
            return Err(RegistryError::HandleInvalidChars {
                handle: handle.to_string(),
            });
        }
        if self.profiles.contains_key(identity) {
            return Err(RegistryError::ProfileExists {
                identity: identity.to_string(),
            });
        }
        if content_pointer.is_empty() {
            return Err(RegistryError::EmptyContentPointer);
        }

        let profile = Profile {
            identity: identity.clone(),
            handle: handle.to_string(),
            content_pointer: content_pointer.to_string(),
            created_at: now,
            updated_at: now,
            view_count: 0,
        };

        self.handle_to_identity
            .insert(handle.to_string(), identity.clone());
        self.identity_to_handle
            .insert(identity.clone(), handle.to_string());
        self.roster.push(identity.clone());
        self.profiles.insert(identity.clone(), profile);

        Ok(&self.profiles[identity])
    }

    /// Replace the content pointer of an existing profile and bump
    /// `updated_at`. Handle and view count are untouched. Returns the
    /// previous pointer value.
    pub fn update_content(
        &mut self,
        identity: &Identity,
        new_content_pointer: &str,
        now: u64,
    ) -> Result<String, RegistryError> {
        if new_content_pointer.is_empty() {
            return Err(RegistryError::EmptyContentPointer);
        }
        let profile = self.profile_mut(identity)?;
        let previous = std::mem::replace(
            &mut profile.content_pointer,
            new_content_pointer.to_string(),
        );
        // created_at stays the floor if the wall clock stepped backwards
        profile.updated_at = now.max(profile.created_at);
        Ok(previous)
    }

    /// Privileged content overwrite. Skips the non-empty pointer check so
    /// an operator can blank out abusive content; the only precondition
    /// is that the profile exists.
    pub fn override_content(
        &mut self,
        identity: &Identity,
        new_content_pointer: &str,
        now: u64,
    ) -> Result<String, RegistryError> {
        let profile = self.profile_mut(identity)?;
        let previous = std::mem::replace(
            &mut profile.content_pointer,
            new_content_pointer.to_string(),
        );
        profile.updated_at = now.max(profile.created_at);
        Ok(previous)
    }

    /// Record one view of `identity`'s profile. Any caller may view any
    /// profile, including their own. Returns the new view count.
    pub fn record_view(&mut self, identity: &Identity) -> Result<u64, RegistryError> {
        let profile = self.profile_mut(identity)?;
        profile.view_count += 1;
        let count = profile.view_count;
        self.total_views += 1;
        Ok(count)
    }

    /// Look up a profile by identity.
    pub fn profile(&self, identity: &Identity) -> Result<&Profile, RegistryError> {
        self.profiles
            .get(identity)
            .ok_or_else(|| RegistryError::ProfileNotFound {
                identity: identity.to_string(),
            })
    }

    /// Look up a profile by handle.
    ///
    /// An unknown handle is a normal miss. A handle that resolves to an
    /// identity without a profile means the dual indexes disagree, which
    /// the mutation paths make impossible; it is surfaced as a distinct
    /// internal error rather than NotFound.
    pub fn profile_by_handle(&self, handle: &str) -> Result<&Profile, RegistryError> {
        let identity =
            self.handle_to_identity
                .get(handle)
                .ok_or_else(|| RegistryError::HandleNotFound {
                    handle: handle.to_string(),
                })?;
        self.profiles
            .get(identity)
            .ok_or_else(|| RegistryError::HandleIndexDesync {
                handle: handle.to_string(),
            })
    }

    /// Resolve an identity's claimed handle, if any.
    pub fn handle_of(&self, identity: &Identity) -> Option<&str> {
        self.identity_to_handle.get(identity).map(String::as_str)
    }

    /// Check whether a handle could be claimed right now: syntactically
    /// valid and absent from the handle index.
    pub fn is_handle_available(&self, handle: &str) -> bool {
        handle_validator::is_valid_length(handle)
            && handle_validator::is_valid_charset(handle)
            && !self.handle_to_identity.contains_key(handle)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.profiles.contains_key(identity)
    }

    /// All identities that ever registered, in registration order.
    pub fn roster(&self) -> &[Identity] {
        &self.roster
    }

    pub fn profile_count(&self) -> usize {
        self.roster.len()
    }

    /// Incrementally maintained sum of all view counts. The ranking
    /// engine recomputes the same sum by full iteration; the two must
    /// always agree.
    pub fn running_view_total(&self) -> u64 {
        self.total_views
    }

    /// Iterate profiles in roster (registration) order.
    pub fn profiles_in_roster_order(&self) -> impl Iterator<Item = &Profile> {
        self.roster.iter().map(|identity| &self.profiles[identity])
    }

    fn profile_mut(&mut self, identity: &Identity) -> Result<&mut Profile, RegistryError> {
        self.profiles
            .get_mut(identity)
            .ok_or_else(|| RegistryError::ProfileNotFound {
                identity: identity.to_string(),
            })
    }
}
