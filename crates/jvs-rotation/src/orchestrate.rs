//! Glues the KMS Adapter, Primary-Label Protocol, Planner, and Executor
//! into the single entry point a rotation trigger (or an operator-invoked
//! out-of-band rotation) calls per key.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use jvs_kms::{KmsAdapter, KmsError, label};

use crate::executor::{PartialRotationFailure, execute};
use crate::planner::{plan, plan_forced};
use crate::policy::RotationPolicy;

#[derive(Error, Debug)]
pub enum RotationError {
    #[error(transparent)]
    Kms(#[from] KmsError),
    #[error(transparent)]
    Partial(#[from] PartialRotationFailure),
}

/// Aggregate error returned when rotating a batch of keys and at least one
/// key's rotation failed. Mirrors `PartialRotationFailure`'s aggregation of
/// per-action failures within a single key's rotation, one level up: every
/// key is attempted regardless of earlier keys' outcomes.
#[derive(Error, Debug)]
#[error("{} of {} key rotations failed", .failures.len(), .attempted)]
pub struct RotationBatchFailure {
    pub attempted: usize,
    pub failures: Vec<KeyRotationFailure>,
}

#[derive(Debug)]
pub struct KeyRotationFailure {
    pub key_name: String,
    pub error: RotationError,
}

/// Fetches current versions and the primary election for `key_name`,
/// plans, and executes. `force` bypasses the `RotationAge` gate as if the
/// primary were already due for pre-rotation.
pub async fn rotate(
    adapter: &dyn KmsAdapter,
    key_name: &str,
    policy: &RotationPolicy,
    now: DateTime<Utc>,
    force: bool,
) -> Result<(), RotationError> {
    let versions = adapter.list_versions(key_name).await?;
    let primary = label::get_primary(adapter, key_name).await?;

    let actions = if force {
        plan_forced(&versions, primary.as_deref(), policy, now)
    } else {
        plan(&versions, primary.as_deref(), policy, now)
    };

    execute(adapter, key_name, actions).await?;
    Ok(())
}

/// Calls `rotate` for every name in `key_names`, aggregating failures
/// instead of stopping at the first one: every key is attempted regardless
/// of earlier keys' outcomes.
pub async fn rotate_all(
    adapter: &dyn KmsAdapter,
    key_names: &[String],
    policy: &RotationPolicy,
    now: DateTime<Utc>,
    force: bool,
) -> Result<(), RotationBatchFailure> {
    let mut failures = Vec::new();

    for key_name in key_names {
        match rotate(adapter, key_name, policy, now, force).await {
            Ok(()) => info!(key_name = %key_name, "rotation pass completed"),
            Err(error) => {
                warn!(key_name = %key_name, %error, "rotation pass failed");
                failures.push(KeyRotationFailure {
                    key_name: key_name.clone(),
                    error,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(RotationBatchFailure {
            attempted: key_names.len(),
            failures,
        })
    }
}
