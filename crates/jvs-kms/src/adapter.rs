use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::KmsError;
use crate::model::{Key, Version, VersionState};

/// A capability surface over an external asymmetric-key service. Every
/// operation is fallible and idempotent from the core's perspective: a
/// retry that observes the already-applied effect must succeed.
#[async_trait]
pub trait KmsAdapter: Send + Sync {
    async fn list_versions(&self, key_name: &str) -> Result<Vec<Version>, KmsError>;

    async fn get_version(&self, version_name: &str) -> Result<Version, KmsError>;

    /// PEM-encoded SubjectPublicKeyInfo.
    async fn get_public_key(&self, version_name: &str) -> Result<String, KmsError>;

    /// Raw ASN.1 DER `SEQUENCE { r INTEGER, s INTEGER }` over the given
    /// SHA-256 digest.
    async fn sign_digest(&self, version_name: &str, digest: &[u8; 32])
    -> Result<Vec<u8>, KmsError>;

    /// KMS allocates the new version's name; callers must not predict it.
    async fn create_version(&self, key_name: &str) -> Result<Version, KmsError>;

    async fn destroy_version(&self, version_name: &str) -> Result<Version, KmsError>;

    async fn update_version_state(
        &self,
        version_name: &str,
        new_state: VersionState,
    ) -> Result<Version, KmsError>;

    async fn get_key(&self, key_name: &str) -> Result<Key, KmsError>;

    async fn update_key_labels(
        &self,
        key_name: &str,
        labels: HashMap<String, String>,
    ) -> Result<Key, KmsError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    use super::*;
    use p256::ecdsa::{Signature, SigningKey};
    use rand_core::OsRng;
    use std::sync::Mutex;

    struct KeyState {
        labels: HashMap<String, String>,
        versions: HashMap<String, (Version, SigningKey)>,
        next_id: u64,
    }

    /// In-memory stand-in for a single KMS key family, used by the
    /// Planner/Executor/Signing Pipeline test suites. Keeps real P-256
    /// signing keys so `sign_digest` and `get_public_key` round-trip
    /// exactly like the production adapter would.
    pub struct FakeKmsAdapter {
        keys: Mutex<HashMap<String, KeyState>>,
    }

    impl Default for FakeKmsAdapter {
        fn default() -> Self {
            Self {
                keys: Mutex::new(HashMap::new()),
            }
        }
    }

    impl FakeKmsAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Test seam: register a key with an explicit version and
        /// `create_time`, bypassing `create_version`'s clock.
        pub fn seed_version(
            &self,
            key_name: &str,
            version_suffix: &str,
            state: VersionState,
            create_time: chrono::DateTime<chrono::Utc>,
        ) -> String {
            let mut keys = self.keys.lock().unwrap();
            let entry = keys.entry(key_name.to_string()).or_insert_with(|| KeyState {
                labels: HashMap::new(),
                versions: HashMap::new(),
                next_id: 1,
            });
            let name = format!("{key_name}/cryptoKeyVersions/{version_suffix}");
            let signing_key = SigningKey::random(&mut OsRng);
            entry.versions.insert(
                name.clone(),
                (
                    Version {
                        name: name.clone(),
                        state,
                        create_time,
                    },
                    signing_key,
                ),
            );
            name
        }

        pub fn set_labels(&self, key_name: &str, labels: HashMap<String, String>) {
            let mut keys = self.keys.lock().unwrap();
            let entry = keys.entry(key_name.to_string()).or_insert_with(|| KeyState {
                labels: HashMap::new(),
                versions: HashMap::new(),
                next_id: 1,
            });
            entry.labels = labels;
        }
    }

    #[async_trait]
    impl KmsAdapter for FakeKmsAdapter {
        async fn list_versions(&self, key_name: &str) -> Result<Vec<Version>, KmsError> {
            let keys = self.keys.lock().unwrap();
            Ok(keys
                .get(key_name)
                .map(|k| k.versions.values().map(|(v, _)| v.clone()).collect())
                .unwrap_or_default())
        }

        async fn get_version(&self, version_name: &str) -> Result<Version, KmsError> {
            let keys = self.keys.lock().unwrap();
            keys.values()
                .find_map(|k| k.versions.get(version_name).map(|(v, _)| v.clone()))
                .ok_or_else(|| KmsError::Permanent {
                    msg: format!("version not found: {version_name}"),
                    source: None,
                })
        }

        async fn get_public_key(&self, version_name: &str) -> Result<String, KmsError> {
            use p256::pkcs8::EncodePublicKey;
            let keys = self.keys.lock().unwrap();
            let signing_key = keys
                .values()
                .find_map(|k| k.versions.get(version_name).map(|(_, sk)| sk.clone()))
                .ok_or_else(|| KmsError::Permanent {
                    msg: format!("version not found: {version_name}"),
                    source: None,
                })?;
            signing_key
                .verifying_key()
                .to_public_key_pem(Default::default())
                .map_err(|e| KmsError::permanent("failed to encode public key", anyhow::anyhow!(e)))
        }

        async fn sign_digest(
            &self,
            version_name: &str,
            digest: &[u8; 32],
        ) -> Result<Vec<u8>, KmsError> {
            use p256::ecdsa::signature::hazmat::PrehashSigner;
            let keys = self.keys.lock().unwrap();
            let signing_key = keys
                .values()
                .find_map(|k| k.versions.get(version_name).map(|(_, sk)| sk.clone()))
                .ok_or_else(|| KmsError::Permanent {
                    msg: format!("version not found: {version_name}"),
                    source: None,
                })?;
            let sig: Signature = signing_key
                .sign_prehash(digest)
                .map_err(|e| KmsError::permanent("failed to sign digest", anyhow::anyhow!(e)))?;
            let raw = sig.to_bytes();
            Ok(crate::der::encode_ecdsa_der_signature(&raw[..32], &raw[32..]))
        }

        async fn create_version(&self, key_name: &str) -> Result<Version, KmsError> {
            let mut keys = self.keys.lock().unwrap();
            let entry = keys.entry(key_name.to_string()).or_insert_with(|| KeyState {
                labels: HashMap::new(),
                versions: HashMap::new(),
                next_id: 1,
            });
            let id = entry.next_id;
            entry.next_id += 1;
            let name = format!("{key_name}/cryptoKeyVersions/{id}");
            let signing_key = SigningKey::random(&mut OsRng);
            let version = Version {
                name: name.clone(),
                state: VersionState::Enabled,
                create_time: chrono::Utc::now(),
            };
            entry
                .versions
                .insert(name.clone(), (version.clone(), signing_key));
            Ok(version)
        }

        async fn destroy_version(&self, version_name: &str) -> Result<Version, KmsError> {
            self.update_version_state(version_name, VersionState::Destroyed)
                .await
        }

        async fn update_version_state(
            &self,
            version_name: &str,
            new_state: VersionState,
        ) -> Result<Version, KmsError> {
            let mut keys = self.keys.lock().unwrap();
            for key_state in keys.values_mut() {
                if let Some((v, _)) = key_state.versions.get_mut(version_name) {
                    v.state = new_state;
                    return Ok(v.clone());
                }
            }
            Err(KmsError::Permanent {
                msg: format!("version not found: {version_name}"),
                source: None,
            })
        }

        async fn get_key(&self, key_name: &str) -> Result<Key, KmsError> {
            let keys = self.keys.lock().unwrap();
            let labels = keys
                .get(key_name)
                .map(|k| k.labels.clone())
                .unwrap_or_default();
            Ok(Key {
                name: key_name.to_string(),
                labels,
            })
        }

        async fn update_key_labels(
            &self,
            key_name: &str,
            labels: HashMap<String, String>,
        ) -> Result<Key, KmsError> {
            let mut keys = self.keys.lock().unwrap();
            let entry = keys.entry(key_name.to_string()).or_insert_with(|| KeyState {
                labels: HashMap::new(),
                versions: HashMap::new(),
                next_id: 1,
            });
            entry.labels = labels.clone();
            Ok(Key {
                name: key_name.to_string(),
                labels,
            })
        }
    }
}
