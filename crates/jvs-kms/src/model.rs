use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Mirrors the KMS `CryptoKeyVersion` lifecycle states relevant to rotation.
/// `Importing`/`Pending*` are grouped under `Pending` since the Planner
/// treats them identically (§4.C rule 7): never acted on, always `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionState {
    Pending,
    Enabled,
    Disabled,
    Destroyed,
    DestroyScheduled,
    Importing,
}

/// An immutable, ordered unit of signing material owned by the KMS service.
/// The core only ever holds a reference (its fully-qualified name); state
/// transitions happen through the KMS Adapter.
#[derive(Debug, Clone)]
pub struct Version {
    pub name: String,
    pub state: VersionState,
    pub create_time: DateTime<Utc>,
}

/// The container for a family of Key Versions sharing a signing identity.
/// `labels` carries at most one `primary` entry (see `jvs_kms::label`).
#[derive(Debug, Clone)]
pub struct Key {
    pub name: String,
    pub labels: HashMap<String, String>,
}
