//! Typed configuration loaded from the environment (§6). Every duration
//! is parsed with `humantime` so operators can write `10m`/`30s` rather
//! than raw seconds. Validation is eager: a malformed or contradictory
//! configuration is a `ConfigurationError` at startup, never discovered
//! mid-request.

use std::env;
use std::time::Duration;

use jvs_rotation::RotationPolicy;

use crate::error::JvsError;

const DEFAULT_ISSUER: &str = "jvs.abcxyz.dev";
const DEFAULT_JWKS_CACHE_TIMEOUT: Duration = Duration::from_secs(300);

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn require_var(name: &str) -> Result<String, JvsError> {
    var(name).ok_or_else(|| JvsError::Configuration(format!("missing required env var {name}")))
}

fn parse_duration(name: &str, raw: &str) -> Result<Duration, JvsError> {
    humantime::parse_duration(raw)
        .map_err(|e| JvsError::Configuration(format!("invalid duration for {name}: {e}")))
}

/// Recognized environment options for rotation (§6). Combined with the
/// configured `KeyNames`, this drives the Rotation Planner for every
/// configured key.
#[derive(Debug, Clone)]
pub struct RotationPolicyConfig {
    pub key_ttl: Duration,
    pub grace_period: Duration,
    pub propagation_delay: Duration,
    pub disabled_period: Duration,
}

impl RotationPolicyConfig {
    pub fn from_env() -> Result<Self, JvsError> {
        let key_ttl = parse_duration("KeyTTL", &require_var("KeyTTL")?)?;
        let grace_period = parse_duration("GracePeriod", &require_var("GracePeriod")?)?;
        let propagation_delay =
            parse_duration("PropagationDelay", &require_var("PropagationDelay")?)?;
        let disabled_period = parse_duration("DisabledPeriod", &require_var("DisabledPeriod")?)?;

        Ok(Self {
            key_ttl,
            grace_period,
            propagation_delay,
            disabled_period,
        })
    }

    pub fn to_policy(&self) -> Result<RotationPolicy, JvsError> {
        let to_chrono = |d: Duration| {
            chrono::Duration::from_std(d)
                .map_err(|e| JvsError::Configuration(format!("duration out of range: {e}")))
        };
        RotationPolicy::try_new(
            to_chrono(self.key_ttl)?,
            to_chrono(self.grace_period)?,
            to_chrono(self.propagation_delay)?,
            to_chrono(self.disabled_period)?,
        )
        .map_err(|e| JvsError::Configuration(e.to_string()))
    }
}

/// The full service configuration (§6). `AllowBreakglass` and `Port` are
/// scoped per-deployment (signer vs. rotation server), so they are read
/// directly by the binaries rather than bundled here.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub key_names: Vec<String>,
    pub rotation_policy: RotationPolicyConfig,
    pub signer_cache_timeout: Duration,
    pub public_key_cache_timeout: Duration,
    pub issuer: String,
    pub default_ttl_seconds: i64,
    pub max_ttl_seconds: i64,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, JvsError> {
        let key_names: Vec<String> = require_var("KeyNames")?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if key_names.is_empty() {
            return Err(JvsError::Configuration(
                "KeyNames must name at least one KMS key".to_string(),
            ));
        }

        let rotation_policy = RotationPolicyConfig::from_env()?;
        // Validate eagerly so a contradictory policy fails at startup,
        // not on the first rotation pass.
        rotation_policy.to_policy()?;

        let signer_cache_timeout = var("SignerCacheTimeout")
            .map(|raw| parse_duration("SignerCacheTimeout", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_JWKS_CACHE_TIMEOUT);
        let public_key_cache_timeout = var("PublicKeyCacheTimeout")
            .map(|raw| parse_duration("PublicKeyCacheTimeout", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_JWKS_CACHE_TIMEOUT);

        let issuer = var("Issuer").unwrap_or_else(|| DEFAULT_ISSUER.to_string());

        let max_ttl_seconds = var("MaxTTL")
            .map(|raw| parse_seconds("MaxTTL", &raw))
            .transpose()?
            .unwrap_or(3600);
        let default_ttl_seconds = var("DefaultTTL")
            .map(|raw| parse_seconds("DefaultTTL", &raw))
            .transpose()?
            .unwrap_or(900);
        if default_ttl_seconds > max_ttl_seconds {
            return Err(JvsError::Configuration(
                "DefaultTTL must not exceed MaxTTL".to_string(),
            ));
        }

        Ok(Self {
            key_names,
            rotation_policy,
            signer_cache_timeout,
            public_key_cache_timeout,
            issuer,
            default_ttl_seconds,
            max_ttl_seconds,
        })
    }
}

fn parse_seconds(name: &str, raw: &str) -> Result<i64, JvsError> {
    parse_duration(name, raw).map(|d| d.as_secs() as i64)
}

/// `AllowBreakglass` is a client-side opt-in (§6); read it where the
/// caller constructs a `Verification` request rather than globally.
pub fn allow_breakglass_from_env() -> bool {
    var("AllowBreakglass")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// `Port` is read per-server (rotation server vs. signer), so it takes
/// the env var name as a parameter.
pub fn port_from_env(var_name: &str, default_port: u16) -> Result<u16, JvsError> {
    match var(var_name) {
        None => Ok(default_port),
        Some(raw) => raw
            .parse()
            .map_err(|e| JvsError::Configuration(format!("invalid {var_name}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for name in [
            "KeyTTL",
            "GracePeriod",
            "PropagationDelay",
            "DisabledPeriod",
            "KeyNames",
            "SignerCacheTimeout",
            "PublicKeyCacheTimeout",
            "Issuer",
            "DefaultTTL",
            "MaxTTL",
            "AllowBreakglass",
        ] {
            unsafe { env::remove_var(name) };
        }
    }

    #[test]
    fn rejects_missing_key_names() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("KeyTTL", "10m");
            env::set_var("GracePeriod", "5m");
            env::set_var("PropagationDelay", "5m");
            env::set_var("DisabledPeriod", "2m");
        }
        let err = ServiceConfig::from_env().unwrap_err();
        assert!(matches!(err, JvsError::Configuration(_)));
        clear_env();
    }

    #[test]
    fn loads_a_valid_configuration() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("KeyTTL", "10m");
            env::set_var("GracePeriod", "5m");
            env::set_var("PropagationDelay", "5m");
            env::set_var("DisabledPeriod", "2m");
            env::set_var("KeyNames", "projects/p/locations/l/keyRings/r/cryptoKeys/k");
        }
        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.key_names.len(), 1);
        assert_eq!(config.issuer, DEFAULT_ISSUER);
        assert_eq!(config.default_ttl_seconds, 900);
        clear_env();
    }

    #[test]
    fn rejects_default_ttl_over_max_ttl() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("KeyTTL", "10m");
            env::set_var("GracePeriod", "5m");
            env::set_var("PropagationDelay", "5m");
            env::set_var("DisabledPeriod", "2m");
            env::set_var("KeyNames", "projects/p/locations/l/keyRings/r/cryptoKeys/k");
            env::set_var("DefaultTTL", "2h");
            env::set_var("MaxTTL", "1h");
        }
        let err = ServiceConfig::from_env().unwrap_err();
        assert!(matches!(err, JvsError::Configuration(_)));
        clear_env();
    }
}
