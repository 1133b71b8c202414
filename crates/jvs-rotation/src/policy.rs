use chrono::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("PropagationDelay ({propagation_delay:?}) must be <= GracePeriod ({grace_period:?})")]
    PropagationExceedsGrace {
        propagation_delay: Duration,
        grace_period: Duration,
    },
}

/// Immutable-per-run rotation timing policy (§3). `RotationAge`/`DestroyAge`
/// are derived once at construction rather than recomputed per plan call.
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    pub key_ttl: Duration,
    pub grace_period: Duration,
    pub propagation_delay: Duration,
    pub disabled_period: Duration,
    rotation_age: Duration,
    destroy_age: Duration,
}

impl RotationPolicy {
    pub fn try_new(
        key_ttl: Duration,
        grace_period: Duration,
        propagation_delay: Duration,
        disabled_period: Duration,
    ) -> Result<Self, PolicyError> {
        let zero = Duration::zero();
        if key_ttl <= zero {
            return Err(PolicyError::NotPositive { field: "KeyTTL" });
        }
        if grace_period <= zero {
            return Err(PolicyError::NotPositive {
                field: "GracePeriod",
            });
        }
        if propagation_delay <= zero {
            return Err(PolicyError::NotPositive {
                field: "PropagationDelay",
            });
        }
        if disabled_period <= zero {
            return Err(PolicyError::NotPositive {
                field: "DisabledPeriod",
            });
        }
        if propagation_delay > grace_period {
            return Err(PolicyError::PropagationExceedsGrace {
                propagation_delay,
                grace_period,
            });
        }

        Ok(Self {
            key_ttl,
            grace_period,
            propagation_delay,
            disabled_period,
            rotation_age: key_ttl - grace_period,
            destroy_age: key_ttl + disabled_period,
        })
    }

    pub fn rotation_age(&self) -> Duration {
        self.rotation_age
    }

    pub fn destroy_age(&self) -> Duration {
        self.destroy_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mins(n: i64) -> Duration {
        Duration::minutes(n)
    }

    #[test]
    fn derives_rotation_and_destroy_age() {
        let policy = RotationPolicy::try_new(mins(10), mins(5), mins(5), mins(2)).unwrap();
        assert_eq!(policy.rotation_age(), mins(5));
        assert_eq!(policy.destroy_age(), mins(12));
    }

    #[test]
    fn rejects_propagation_delay_exceeding_grace_period() {
        let err = RotationPolicy::try_new(mins(10), mins(5), mins(6), mins(2)).unwrap_err();
        assert!(matches!(err, PolicyError::PropagationExceedsGrace { .. }));
    }

    #[test]
    fn rejects_non_positive_durations() {
        assert!(RotationPolicy::try_new(mins(0), mins(5), mins(5), mins(2)).is_err());
        assert!(RotationPolicy::try_new(mins(10), mins(0), mins(5), mins(2)).is_err());
        assert!(RotationPolicy::try_new(mins(10), mins(5), mins(0), mins(2)).is_err());
        assert!(RotationPolicy::try_new(mins(10), mins(5), mins(5), mins(0)).is_err());
    }
}
