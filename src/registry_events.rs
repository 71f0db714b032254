//! Mutation facts emitted for external observers.
//!
//! Every successful mutation produces one structured fact. The registry
//! does not persist facts; it pushes them into a channel and whoever
//! holds the receiving end (an indexer, a logger, a test) consumes them
//! at its own pace.

use serde::{Deserialize, Serialize};

use crate::profile_store::Identity;

/// What kind of mutation a fact describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Created,
    Updated,
    ViewRecorded,
}

/// Kind-specific fact data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactPayload {
    Created {
        handle: String,
        content_pointer: String,
    },
    Updated {
        previous_pointer: String,
        content_pointer: String,
    },
    ViewRecorded {
        view_count: u64,
    },
}

/// A single mutation fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFact {
    pub kind: FactKind,
    pub identity: Identity,
    pub payload: FactPayload,
    pub timestamp: u64,
}

impl RegistryFact {
    pub fn created(
        identity: &Identity,
        handle: &str,
        content_pointer: &str,
        timestamp: u64,
    ) -> Self {
        Self {
            kind: FactKind::Created,
            identity: identity.clone(),
            payload: FactPayload::Created {
                handle: handle.to_string(),
                content_pointer: content_pointer.to_string(),
            },
            timestamp,
        }
    }

    pub fn updated(
        identity: &Identity,
        previous_pointer: &str,
        content_pointer: &str,
        timestamp: u64,
    ) -> Self {
        Self {
            kind: FactKind::Updated,
            identity: identity.clone(),
            payload: FactPayload::Updated {
                previous_pointer: previous_pointer.to_string(),
                content_pointer: content_pointer.to_string(),
            },
            timestamp,
        }
    }

    pub fn view_recorded(identity: &Identity, view_count: u64, timestamp: u64) -> Self {
        Self {
            kind: FactKind::ViewRecorded,
            identity: identity.clone(),
            payload: FactPayload::ViewRecorded { view_count },
            timestamp,
        }
    }
}

pub type FactSender = flume::Sender<RegistryFact>;
pub type FactReceiver = flume::Receiver<RegistryFact>;

/// Create the fact channel. Unbounded: the registry never blocks on a
/// slow observer, and flume receivers can be cloned for multi-consumer
/// fan-out.
pub fn fact_channel() -> (FactSender, FactReceiver) {
    flume::unbounded()
}
