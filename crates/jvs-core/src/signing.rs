//! The Signing Pipeline (§4.E): resolves the primary version, assembles
//! claims, obtains a KMS signature over the signing input, reformats it to
//! raw `r‖s`, and assembles the compact serialization.

use base64::Engine;
use chrono::Utc;
use sha2::{Digest, Sha256};

use jvs_kms::{KmsAdapter, label};

use crate::claims::{BREAKGLASS_CATEGORY, Claims, Header, Justification, RawJustification};
use crate::error::JvsError;
use crate::sig_format::der_to_raw;
use crate::validator::ValidatorSet;

const BREAKGLASS_SENTINEL: &str = "NOT_SIGNED";

fn b64url(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub struct IssuanceRequest {
    pub subject: String,
    pub justifications: Vec<RawJustification>,
    pub audiences: Vec<String>,
    pub ttl_seconds: Option<i64>,
}

pub struct SigningPipeline {
    adapter: Box<dyn KmsAdapter>,
    key_name: String,
    issuer: String,
    default_audience: String,
    default_ttl_seconds: i64,
    max_ttl_seconds: i64,
    validators: ValidatorSet,
    /// Test seam for a fixed clock; `None` uses the wall clock.
    clock_override: Option<chrono::DateTime<Utc>>,
}

impl SigningPipeline {
    pub fn new(
        adapter: Box<dyn KmsAdapter>,
        key_name: impl Into<String>,
        issuer: impl Into<String>,
        default_audience: impl Into<String>,
        default_ttl_seconds: i64,
        max_ttl_seconds: i64,
        validators: ValidatorSet,
    ) -> Self {
        Self {
            adapter,
            key_name: key_name.into(),
            issuer: issuer.into(),
            default_audience: default_audience.into(),
            default_ttl_seconds,
            max_ttl_seconds,
            validators,
            clock_override: None,
        }
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn with_clock(mut self, now: chrono::DateTime<Utc>) -> Self {
        self.clock_override = Some(now);
        self
    }

    fn now(&self) -> chrono::DateTime<Utc> {
        self.clock_override.unwrap_or_else(Utc::now)
    }

    fn build_claims(&self, request: &IssuanceRequest) -> Result<Claims, JvsError> {
        let now = self.now();
        let iat = now.timestamp();
        let ttl = request
            .ttl_seconds
            .unwrap_or(self.default_ttl_seconds)
            .min(self.max_ttl_seconds);

        let audiences = if request.audiences.is_empty() {
            vec![self.default_audience.clone()]
        } else {
            request.audiences.clone()
        };

        let justs = request
            .justifications
            .iter()
            .map(|raw| self.validators.validate(raw))
            .collect::<Result<Vec<Justification>, JvsError>>()?;

        Ok(Claims {
            iss: self.issuer.clone(),
            sub: request.subject.clone(),
            aud: audiences,
            iat,
            nbf: iat,
            exp: iat + ttl,
            jti: uuid::Uuid::new_v4().to_string(),
            justs,
        })
    }

    /// Resolves the primary version, signs, and assembles the compact
    /// serialization.
    pub async fn issue(&self, request: IssuanceRequest) -> Result<String, JvsError> {
        let primary = label::get_primary(self.adapter.as_ref(), &self.key_name)
            .await?
            .ok_or(JvsError::NoPrimary)?;

        let claims = self.build_claims(&request)?;
        let header = Header::es256(primary.clone());

        let header_b64 = b64url(&serde_json::to_vec(&header).map_err(ser_err)?);
        let payload_b64 = b64url(&serde_json::to_vec(&claims).map_err(ser_err)?);
        let signing_input = format!("{header_b64}.{payload_b64}");

        let digest: [u8; 32] = Sha256::digest(signing_input.as_bytes()).into();
        let der_signature = self.adapter.sign_digest(&primary, &digest).await?;
        let raw_signature = der_to_raw(&der_signature)?;

        Ok(format!("{signing_input}.{}", b64url(&raw_signature)))
    }

    /// No key is touched; the token carries a single `breakglass`
    /// justification and the literal sentinel signature segment.
    pub fn issue_breakglass(
        &self,
        subject: String,
        explanation: String,
        audiences: Vec<String>,
        ttl_seconds: Option<i64>,
    ) -> Result<String, JvsError> {
        let now = self.now();
        let iat = now.timestamp();
        let ttl = ttl_seconds
            .unwrap_or(self.default_ttl_seconds)
            .min(self.max_ttl_seconds);
        let audiences = if audiences.is_empty() {
            vec![self.default_audience.clone()]
        } else {
            audiences
        };

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject,
            aud: audiences,
            iat,
            nbf: iat,
            exp: iat + ttl,
            jti: uuid::Uuid::new_v4().to_string(),
            justs: vec![Justification {
                category: BREAKGLASS_CATEGORY.to_string(),
                value: explanation,
                annotation: None,
            }],
        };

        // `kid` is meaningless for an unsigned token but the header shape
        // must still parse like any other JWS header.
        let header = Header::es256("breakglass");
        let header_b64 = b64url(&serde_json::to_vec(&header).map_err(ser_err)?);
        let payload_b64 = b64url(&serde_json::to_vec(&claims).map_err(ser_err)?);
        Ok(format!("{header_b64}.{payload_b64}.{BREAKGLASS_SENTINEL}"))
    }
}

fn ser_err(e: serde_json::Error) -> JvsError {
    JvsError::Configuration(format!("failed to serialize token: {e}"))
}
