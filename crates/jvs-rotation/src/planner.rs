//! The Rotation Planner (§4.C): a pure, total function over a version set,
//! the current primary election, a time policy, and the wall clock. It
//! never errors and never mutates anything; the Executor is the only
//! component that touches KMS.

use chrono::{DateTime, Utc};

use jvs_kms::{Version, VersionState};

use crate::policy::RotationPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateNew,
    CreateNewAndPromote,
    Promote(String),
    Disable(String),
    Destroy(String),
}

/// `plan(versions, primary_name, policy, now) → ordered list of Actions`.
///
/// Ties among versions are broken by ascending `create_time`, then by
/// ascending name, so the result is stable for identical input. `None`
/// actions from the decision table (§4.C) are never materialized; they are
/// simply absent from the returned list.
pub fn plan(
    versions: &[Version],
    primary_name: Option<&str>,
    policy: &RotationPolicy,
    now: DateTime<Utc>,
) -> Vec<Action> {
    plan_with(versions, primary_name, policy, now, false)
}

/// Like `plan`, but treats the current primary as already past
/// `RotationAge` regardless of its actual age. Used by the operator-invoked
/// out-of-band rotation entry point; the rest of the decision table
/// (successor promotion, disable/destroy sweep) is unchanged.
pub fn plan_forced(
    versions: &[Version],
    primary_name: Option<&str>,
    policy: &RotationPolicy,
    now: DateTime<Utc>,
) -> Vec<Action> {
    plan_with(versions, primary_name, policy, now, true)
}

fn plan_with(
    versions: &[Version],
    primary_name: Option<&str>,
    policy: &RotationPolicy,
    now: DateTime<Utc>,
    force: bool,
) -> Vec<Action> {
    let primary = primary_name.and_then(|name| versions.iter().find(|v| v.name == name));

    let (older, newer): (Vec<&Version>, Vec<&Version>) = versions
        .iter()
        .filter(|v| Some(v.name.as_str()) != primary_name)
        .partition(|v| match primary {
            Some(p) => v.create_time < p.create_time,
            None => false,
        });

    let mut actions = Vec::new();

    match primary {
        Some(p) => {
            let primary_age = now - p.create_time;
            let mut candidates: Vec<&Version> = newer
                .iter()
                .copied()
                .filter(|v| {
                    v.state == VersionState::Enabled
                        && now - v.create_time >= policy.propagation_delay
                })
                .collect();
            sort_by_create_time_then_name(&mut candidates);

            if candidates.is_empty() {
                if !force && primary_age < policy.rotation_age() {
                    // Rule 1: steady state, nothing to do for the primary.
                } else {
                    // Rule 3: due for pre-rotation, no successor ready yet.
                    actions.push(Action::CreateNew);
                }
            } else {
                // Rule 2: a successor has propagated long enough; promote it.
                let successor = candidates[0];
                actions.push(Action::Promote(successor.name.clone()));
            }
        }
        None => {
            let mut enabled_newer: Vec<&Version> = newer
                .iter()
                .copied()
                .filter(|v| v.state == VersionState::Enabled)
                .collect();

            if enabled_newer.is_empty() {
                // Rule 4: nothing exists yet.
                actions.push(Action::CreateNewAndPromote);
            } else {
                // Rule 5: bootstrap promotion, PropagationDelay waived.
                sort_by_create_time_then_name(&mut enabled_newer);
                let newest = enabled_newer.last().expect("non-empty");
                actions.push(Action::Promote(newest.name.clone()));
            }
        }
    }

    // Rule 2's "former primary becomes older" disable clause, and rule 6's
    // general sweep, collapse into the same uniform pass: any `Enabled`
    // member of `older` (i.e. not primary, not newer) past `KeyTTL` is
    // disabled, and any `Disabled` version past `DestroyAge` is destroyed.
    // Disable only ever touches `older`, and Promote only ever touches
    // `newer`, so the two can never collide on the same version.
    let mut to_disable: Vec<&Version> = older
        .iter()
        .copied()
        .filter(|v| v.state == VersionState::Enabled && now - v.create_time >= policy.key_ttl)
        .collect();
    sort_by_create_time_then_name(&mut to_disable);
    for v in to_disable {
        actions.push(Action::Disable(v.name.clone()));
    }

    let mut to_destroy: Vec<&Version> = versions
        .iter()
        .filter(|v| {
            v.state == VersionState::Disabled && now - v.create_time >= policy.destroy_age()
        })
        .collect();
    sort_by_create_time_then_name(&mut to_destroy);
    for v in to_destroy {
        actions.push(Action::Destroy(v.name.clone()));
    }

    actions
}

fn sort_by_create_time_then_name(versions: &mut [&Version]) {
    versions.sort_by(|a, b| {
        a.create_time
            .cmp(&b.create_time)
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn policy() -> RotationPolicy {
        RotationPolicy::try_new(
            Duration::minutes(10),
            Duration::minutes(5),
            Duration::minutes(5),
            Duration::minutes(2),
        )
        .unwrap()
    }

    fn version(name: &str, state: VersionState, create_time: DateTime<Utc>) -> Version {
        Version {
            name: name.to_string(),
            state,
            create_time,
        }
    }

    #[test]
    fn bootstrap_with_no_versions() {
        let actions = plan(&[], None, &policy(), t(0));
        assert_eq!(actions, vec![Action::CreateNewAndPromote]);
    }

    #[test]
    fn steady_state_is_a_no_op() {
        let v1 = version("v1", VersionState::Enabled, t(0));
        let actions = plan(&[v1], Some("v1"), &policy(), t(2));
        assert_eq!(actions, vec![]);
    }

    #[test]
    fn pre_creates_successor_past_rotation_age() {
        let v1 = version("v1", VersionState::Enabled, t(0));
        let actions = plan(&[v1], Some("v1"), &policy(), t(6));
        assert_eq!(actions, vec![Action::CreateNew]);
    }

    #[test]
    fn promotes_once_propagation_delay_elapses() {
        let v1 = version("v1", VersionState::Enabled, t(0));
        let v2 = version("v2", VersionState::Enabled, t(6));
        let actions = plan(&[v1, v2], Some("v1"), &policy(), t(11));
        assert_eq!(actions, vec![Action::Promote("v2".to_string())]);
    }

    #[test]
    fn disables_old_primary_past_key_ttl() {
        // v2 (the current primary) is itself well past RotationAge here
        // with no successor yet, so CreateNew also appears alongside the
        // Disable this test is checking for.
        let v1 = version("v1", VersionState::Enabled, t(0));
        let v2 = version("v2", VersionState::Enabled, t(6));
        let actions = plan(&[v1, v2], Some("v2"), &policy(), t(21));
        assert!(actions.contains(&Action::Disable("v1".to_string())));
    }

    #[test]
    fn destroys_disabled_version_past_destroy_age() {
        let v1 = version("v1", VersionState::Disabled, t(0));
        let v2 = version("v2", VersionState::Enabled, t(6));
        let actions = plan(&[v1, v2], Some("v2"), &policy(), t(23));
        assert!(actions.contains(&Action::Destroy("v1".to_string())));
    }

    #[test]
    fn bootstrap_promotes_existing_enabled_version_when_no_primary() {
        let v1 = version("v1", VersionState::Enabled, t(0));
        let actions = plan(&[v1], None, &policy(), t(0));
        assert_eq!(actions, vec![Action::Promote("v1".to_string())]);
    }

    #[test]
    fn never_both_disables_and_promotes_the_same_version() {
        let v1 = version("v1", VersionState::Enabled, t(0));
        let v2 = version("v2", VersionState::Enabled, t(6));
        let actions = plan(&[v1, v2], Some("v1"), &policy(), t(21));
        let names_disabled: Vec<&str> = actions
            .iter()
            .filter_map(|a| match a {
                Action::Disable(n) => Some(n.as_str()),
                _ => None,
            })
            .collect();
        let names_promoted: Vec<&str> = actions
            .iter()
            .filter_map(|a| match a {
                Action::Promote(n) => Some(n.as_str()),
                _ => None,
            })
            .collect();
        for n in names_disabled {
            assert!(!names_promoted.contains(&n));
        }
    }

    #[test]
    fn at_most_one_promote_or_create_and_promote() {
        let v1 = version("v1", VersionState::Enabled, t(0));
        let v2 = version("v2", VersionState::Enabled, t(6));
        let v3 = version("v3", VersionState::Enabled, t(7));
        let actions = plan(&[v1, v2, v3], Some("v1"), &policy(), t(20));
        let promotions = actions
            .iter()
            .filter(|a| matches!(a, Action::Promote(_) | Action::CreateNewAndPromote))
            .count();
        assert!(promotions <= 1);
    }

    #[test]
    fn pending_and_importing_versions_are_never_acted_on() {
        let v1 = version("v1", VersionState::Enabled, t(0));
        let pending = version("pending", VersionState::Pending, t(1));
        let importing = version("importing", VersionState::Importing, t(2));
        let actions = plan(&[v1, pending, importing], Some("v1"), &policy(), t(2));
        assert_eq!(actions, vec![]);
    }
}
