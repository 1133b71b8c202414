//! JWKS publication and cache (§3, §4.F). The document is cached
//! in-process under a single entry, refreshed by write-through lookup
//! keyed by a configurable TTL. Single-flighting a concurrent refresh is
//! recommended but not required for correctness — a duplicate refresh is
//! wasteful, not wrong — so this cache uses a plain mutex rather than a
//! more elaborate coalescing scheme.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use jvs_kms::{KmsAdapter, VersionState};

use crate::error::JvsError;

pub const CACHE_KEY: &str = "jwks";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EcdsaJwk {
    pub crv: &'static str,
    pub kid: String,
    pub kty: &'static str,
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwksDocument {
    pub keys: Vec<EcdsaJwk>,
}

struct CacheEntry {
    document: String,
    fetched_at: Instant,
}

pub struct JwksCache {
    key_names: Vec<String>,
    ttl: Duration,
    entry: Mutex<Option<CacheEntry>>,
}

impl JwksCache {
    pub fn new(key_names: Vec<String>, ttl: Duration) -> Self {
        Self {
            key_names,
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Returns the cached JWKS document, re-deriving it from KMS on a
    /// cache miss or TTL expiry.
    pub async fn get(&self, adapter: &dyn KmsAdapter) -> Result<String, JvsError> {
        {
            let guard = self.entry.lock().unwrap();
            if let Some(entry) = guard.as_ref() {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.document.clone());
                }
            }
        }

        let document = self.derive(adapter).await?;
        let serialized = serde_json::to_string(&document).map_err(|e| JvsError::Configuration(
            format!("failed to serialize JWKS document: {e}"),
        ))?;

        let mut guard = self.entry.lock().unwrap();
        *guard = Some(CacheEntry {
            document: serialized.clone(),
            fetched_at: Instant::now(),
        });
        Ok(serialized)
    }

    pub fn invalidate(&self) {
        *self.entry.lock().unwrap() = None;
    }

    async fn derive(&self, adapter: &dyn KmsAdapter) -> Result<JwksDocument, JvsError> {
        let mut keys = Vec::new();
        for key_name in &self.key_names {
            let versions = adapter.list_versions(key_name).await?;
            for version in versions {
                if version.state != VersionState::Enabled {
                    continue;
                }
                let pem = adapter.get_public_key(&version.name).await?;
                let (x, y) = pem_to_coordinates(&pem)?;
                keys.push(EcdsaJwk {
                    crv: "P-256",
                    kid: version.name,
                    kty: "EC",
                    x,
                    y,
                });
            }
        }
        keys.sort_by(|a, b| a.kid.cmp(&b.kid));
        Ok(JwksDocument { keys })
    }
}

fn pem_to_coordinates(pem: &str) -> Result<(String, String), JvsError> {
    use base64::Engine;
    use p256::elliptic_curve::sec1::ToEncodedPoint;
    use p256::pkcs8::DecodePublicKey;

    let verifying_key = p256::ecdsa::VerifyingKey::from_public_key_pem(pem).map_err(|e| {
        JvsError::Configuration(format!("KMS returned a public key that is not valid P-256: {e}"))
    })?;
    let point = verifying_key.to_encoded_point(false);
    let x = point
        .x()
        .ok_or_else(|| JvsError::Configuration("public key point missing x coordinate".into()))?;
    let y = point
        .y()
        .ok_or_else(|| JvsError::Configuration("public key point missing y coordinate".into()))?;

    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    Ok((engine.encode(x), engine.encode(y)))
}
