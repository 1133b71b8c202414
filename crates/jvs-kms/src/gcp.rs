//! Google Cloud KMS-backed implementation of the `KmsAdapter` capability.
//! The Key Version model this crate assumes (multiple `CryptoKeyVersion`s
//! per key, explicit `Enabled`/`Disabled`/`Destroyed` lifecycle, label-based
//! metadata on the parent key) maps directly onto Cloud KMS's asymmetric
//! signing key resources; it does not map onto providers whose key
//! abstraction has no multi-version, mutable-label surface.

use std::collections::HashMap;

use async_trait::async_trait;
use google_cloud_kms_v1::client::KeyManagementService;
use google_cloud_kms_v1::model::{CryptoKey, CryptoKeyVersion, crypto_key_version::CryptoKeyVersionState};
use google_cloud_wkt::FieldMask;

use crate::adapter::KmsAdapter;
use crate::error::{KmsError, classify};
use crate::model::{Key, Version, VersionState};

pub struct GcpKmsAdapter {
    client: KeyManagementService,
}

impl GcpKmsAdapter {
    pub fn new(client: KeyManagementService) -> Self {
        Self { client }
    }
}

fn to_domain_state(state: CryptoKeyVersionState) -> VersionState {
    match state {
        CryptoKeyVersionState::Enabled => VersionState::Enabled,
        CryptoKeyVersionState::Disabled => VersionState::Disabled,
        CryptoKeyVersionState::Destroyed => VersionState::Destroyed,
        CryptoKeyVersionState::DestroyScheduled => VersionState::DestroyScheduled,
        CryptoKeyVersionState::PendingImport => VersionState::Importing,
        _ => VersionState::Pending,
    }
}

fn to_wire_state(state: VersionState) -> CryptoKeyVersionState {
    match state {
        VersionState::Enabled => CryptoKeyVersionState::Enabled,
        VersionState::Disabled => CryptoKeyVersionState::Disabled,
        VersionState::Destroyed => CryptoKeyVersionState::Destroyed,
        VersionState::DestroyScheduled => CryptoKeyVersionState::DestroyScheduled,
        VersionState::Importing => CryptoKeyVersionState::PendingImport,
        VersionState::Pending => CryptoKeyVersionState::PendingGeneration,
    }
}

fn to_domain_version(v: CryptoKeyVersion) -> Version {
    let create_time = v
        .create_time
        .and_then(|ts| chrono::DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32))
        .unwrap_or_else(chrono::Utc::now);
    Version {
        name: v.name,
        state: to_domain_state(v.state),
        create_time,
    }
}

#[async_trait]
impl KmsAdapter for GcpKmsAdapter {
    async fn list_versions(&self, key_name: &str) -> Result<Vec<Version>, KmsError> {
        let mut versions = Vec::new();
        let mut page_token = String::new();
        loop {
            let mut request = self.client.list_crypto_key_versions().set_parent(key_name);
            if !page_token.is_empty() {
                request = request.set_page_token(page_token.clone());
            }
            let response = request
                .send()
                .await
                .map_err(|e| classify("list_crypto_key_versions failed", e))?;
            versions.extend(response.crypto_key_versions.into_iter().map(to_domain_version));
            page_token = response.next_page_token;
            if page_token.is_empty() {
                break;
            }
        }
        Ok(versions)
    }

    async fn get_version(&self, version_name: &str) -> Result<Version, KmsError> {
        let response = self
            .client
            .get_crypto_key_version()
            .set_name(version_name)
            .send()
            .await
            .map_err(|e| classify("get_crypto_key_version failed", e))?;
        Ok(to_domain_version(response))
    }

    async fn get_public_key(&self, version_name: &str) -> Result<String, KmsError> {
        let response = self
            .client
            .get_public_key()
            .set_name(version_name)
            .send()
            .await
            .map_err(|e| classify("get_public_key failed", e))?;
        Ok(response.pem)
    }

    async fn sign_digest(
        &self,
        version_name: &str,
        digest: &[u8; 32],
    ) -> Result<Vec<u8>, KmsError> {
        let response = self
            .client
            .asymmetric_sign()
            .set_name(version_name)
            .set_data(digest.to_vec())
            .send()
            .await
            .map_err(|e| classify("asymmetric_sign failed", e))?;
        Ok(response.signature.to_vec())
    }

    async fn create_version(&self, key_name: &str) -> Result<Version, KmsError> {
        let response = self
            .client
            .create_crypto_key_version()
            .set_parent(key_name)
            .set_crypto_key_version(CryptoKeyVersion::new())
            .send()
            .await
            .map_err(|e| classify("create_crypto_key_version failed", e))?;
        Ok(to_domain_version(response))
    }

    async fn destroy_version(&self, version_name: &str) -> Result<Version, KmsError> {
        let response = self
            .client
            .destroy_crypto_key_version()
            .set_name(version_name)
            .send()
            .await
            .map_err(|e| classify("destroy_crypto_key_version failed", e))?;
        Ok(to_domain_version(response))
    }

    async fn update_version_state(
        &self,
        version_name: &str,
        new_state: VersionState,
    ) -> Result<Version, KmsError> {
        let version = CryptoKeyVersion::new()
            .set_name(version_name)
            .set_state(to_wire_state(new_state));
        let response = self
            .client
            .update_crypto_key_version()
            .set_crypto_key_version(version)
            .set_update_mask(FieldMask::default().set_paths(["state"]))
            .send()
            .await
            .map_err(|e| classify("update_crypto_key_version failed", e))?;
        Ok(to_domain_version(response))
    }

    async fn get_key(&self, key_name: &str) -> Result<Key, KmsError> {
        let response = self
            .client
            .get_crypto_key()
            .set_name(key_name)
            .send()
            .await
            .map_err(|e| classify("get_crypto_key failed", e))?;
        Ok(Key {
            name: response.name,
            labels: response.labels.into_iter().collect::<HashMap<_, _>>(),
        })
    }

    async fn update_key_labels(
        &self,
        key_name: &str,
        labels: HashMap<String, String>,
    ) -> Result<Key, KmsError> {
        let key = CryptoKey::new().set_name(key_name).set_labels(labels);
        let response = self
            .client
            .update_crypto_key()
            .set_crypto_key(key)
            .set_update_mask(FieldMask::default().set_paths(["labels"]))
            .send()
            .await
            .map_err(|e| classify("update_crypto_key failed", e))?;
        Ok(Key {
            name: response.name,
            labels: response.labels.into_iter().collect::<HashMap<_, _>>(),
        })
    }
}
