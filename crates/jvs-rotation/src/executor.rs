//! The Rotation Executor (§4.D): walks a plan produced by the Planner and
//! applies it through the KMS Adapter and Primary-Label Protocol, with
//! partial-failure aggregation. Unlike the Planner, the Executor is
//! stateful in the sense that it observes KMS-allocated names it cannot
//! predict in advance.

use thiserror::Error;
use tracing::{info, warn};

use jvs_kms::{KmsAdapter, KmsError, VersionState, label};

use crate::planner::Action;

/// Aggregate error returned when at least one action in a rotation pass
/// failed. A non-empty aggregate does not imply any particular action
/// succeeded or failed; callers retry on the next schedule tick.
#[derive(Error, Debug)]
#[error("{} of {} rotation actions failed", .failures.len(), .attempted)]
pub struct PartialRotationFailure {
    pub attempted: usize,
    pub failures: Vec<ActionFailure>,
}

#[derive(Debug)]
pub struct ActionFailure {
    pub action: String,
    pub error: KmsError,
}

/// Applies `plan` against `key_name` in order. Returns `Ok(())` if every
/// action succeeded, or the aggregate failure otherwise.
pub async fn execute(
    adapter: &dyn KmsAdapter,
    key_name: &str,
    plan: Vec<Action>,
) -> Result<(), PartialRotationFailure> {
    let mut failures = Vec::new();
    let attempted = plan.len();
    // If CreateNew/CreateNewAndPromote fails on this pass, any action that
    // depends on the version it would have produced is skipped rather than
    // attempted against a version that doesn't exist.
    let mut create_failed = false;

    for action in plan {
        match action {
            Action::CreateNew => match adapter.create_version(key_name).await {
                Ok(version) => info!(key_name, version = %version.name, "created successor version"),
                Err(error) => {
                    warn!(key_name, %error, "CreateNew failed");
                    create_failed = true;
                    failures.push(ActionFailure {
                        action: "CreateNew".to_string(),
                        error,
                    });
                }
            },
            Action::CreateNewAndPromote => match adapter.create_version(key_name).await {
                Ok(version) => {
                    // Creation succeeded; a label-update failure here must
                    // not roll back the version. The next planner pass will
                    // observe an unpromoted Enabled version and promote it.
                    if let Err(error) = label::set_primary(adapter, key_name, &version.name).await
                    {
                        warn!(key_name, version = %version.name, %error, "CreateNewAndPromote(set_primary) failed");
                        failures.push(ActionFailure {
                            action: "CreateNewAndPromote(set_primary)".to_string(),
                            error,
                        });
                    } else {
                        info!(key_name, version = %version.name, "bootstrapped primary");
                    }
                }
                Err(error) => {
                    warn!(key_name, %error, "CreateNewAndPromote failed");
                    create_failed = true;
                    failures.push(ActionFailure {
                        action: "CreateNewAndPromote".to_string(),
                        error,
                    });
                }
            },
            Action::Promote(version_name) => {
                if create_failed {
                    continue;
                }
                if let Err(error) = label::set_primary(adapter, key_name, &version_name).await {
                    warn!(key_name, version = %version_name, %error, "Promote failed");
                    failures.push(ActionFailure {
                        action: format!("Promote({version_name})"),
                        error,
                    });
                } else {
                    info!(key_name, version = %version_name, "promoted to primary");
                }
            }
            Action::Disable(version_name) => {
                if let Err(error) = adapter
                    .update_version_state(&version_name, VersionState::Disabled)
                    .await
                {
                    warn!(key_name, version = %version_name, %error, "Disable failed");
                    failures.push(ActionFailure {
                        action: format!("Disable({version_name})"),
                        error,
                    });
                } else {
                    info!(key_name, version = %version_name, "disabled version");
                }
            }
            Action::Destroy(version_name) => {
                if let Err(error) = adapter.destroy_version(&version_name).await {
                    warn!(key_name, version = %version_name, %error, "Destroy failed");
                    failures.push(ActionFailure {
                        action: format!("Destroy({version_name})"),
                        error,
                    });
                } else {
                    info!(key_name, version = %version_name, "destroyed version");
                }
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(PartialRotationFailure {
            attempted,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jvs_kms::adapter::fake::FakeKmsAdapter;

    const KEY: &str = "projects/p/locations/l/keyRings/r/cryptoKeys/k";

    #[tokio::test]
    async fn bootstrap_creates_and_promotes() {
        let adapter = FakeKmsAdapter::new();
        execute(&adapter, KEY, vec![Action::CreateNewAndPromote])
            .await
            .unwrap();

        let versions = adapter.list_versions(KEY).await.unwrap();
        assert_eq!(versions.len(), 1);
        let primary = label::get_primary(&adapter, KEY).await.unwrap();
        assert_eq!(primary, Some(versions[0].name.clone()));
    }

    #[tokio::test]
    async fn disable_and_destroy_apply_independently() {
        let adapter = FakeKmsAdapter::new();
        let v1 = adapter.seed_version(KEY, "1", VersionState::Enabled, Utc::now());

        execute(&adapter, KEY, vec![Action::Disable(v1.clone())])
            .await
            .unwrap();
        let v = adapter.get_version(&v1).await.unwrap();
        assert_eq!(v.state, VersionState::Disabled);

        execute(&adapter, KEY, vec![Action::Destroy(v1.clone())])
            .await
            .unwrap();
        let v = adapter.get_version(&v1).await.unwrap();
        assert_eq!(v.state, VersionState::Destroyed);
    }

    #[tokio::test]
    async fn partial_failure_reports_aggregate_without_aborting() {
        let adapter = FakeKmsAdapter::new();
        let v1 = adapter.seed_version(KEY, "1", VersionState::Enabled, Utc::now());

        let err = execute(
            &adapter,
            KEY,
            vec![
                Action::Disable("does-not-exist".to_string()),
                Action::Disable(v1.clone()),
            ],
        )
        .await
        .unwrap_err();

        assert_eq!(err.attempted, 2);
        assert_eq!(err.failures.len(), 1);
        let v = adapter.get_version(&v1).await.unwrap();
        assert_eq!(v.state, VersionState::Disabled);
    }
}
