//! Verification (§4.F): parses a compact serialization (standard or
//! breakglass), selects the verification key by `kid`, checks the
//! signature and standard claims, and optionally checks the subject.

use base64::Engine;
use chrono::Utc;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::claims::{BREAKGLASS_CATEGORY, Claims, Header};
use crate::error::JvsError;
use crate::jwks::JwksDocument;

const BREAKGLASS_SENTINEL: &str = "NOT_SIGNED";
/// Acceptable clock skew when checking `nbf`/`exp` against `now`.
const CLOCK_SKEW_SECONDS: i64 = 30;

pub struct VerifyOptions<'a> {
    pub allow_breakglass: bool,
    pub subject: Option<&'a str>,
}

fn b64url_decode(segment: &str) -> Result<Vec<u8>, JvsError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| JvsError::InvalidToken {
            reason: format!("malformed base64url segment: {e}"),
        })
}

/// Verifies `token` against `jwks` (the cached document's deserialized
/// form). The breakglass sentinel is checked before any signature
/// verification is attempted, per the design notes' ordering requirement.
pub fn verify(token: &str, jwks: &JwksDocument, options: VerifyOptions) -> Result<Claims, JvsError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(JvsError::InvalidToken {
            reason: "compact serialization must have exactly three segments".to_string(),
        });
    }
    let (header_b64, payload_b64, signature_segment) = (segments[0], segments[1], segments[2]);

    if signature_segment == BREAKGLASS_SENTINEL {
        return verify_breakglass(payload_b64, options.allow_breakglass).and_then(|claims| {
            check_subject(claims, options.subject)
        });
    }

    let header: Header = serde_json::from_slice(&b64url_decode(header_b64)?)
        .map_err(|e| JvsError::InvalidToken {
            reason: format!("malformed header: {e}"),
        })?;
    if header.alg != "ES256" {
        return Err(JvsError::InvalidToken {
            reason: format!("unsupported alg '{}'", header.alg),
        });
    }

    let key = jwks
        .keys
        .iter()
        .find(|k| k.kid == header.kid)
        .ok_or_else(|| JvsError::InvalidToken {
            reason: format!("unknown kid '{}'", header.kid),
        })?;

    let verifying_key = jwk_to_verifying_key(key)?;
    let signature_bytes = b64url_decode(signature_segment)?;
    if signature_bytes.len() != 64 {
        return Err(JvsError::InvalidToken {
            reason: "signature segment is not 64 raw bytes".to_string(),
        });
    }
    let signature = Signature::from_slice(&signature_bytes).map_err(|e| JvsError::InvalidToken {
        reason: format!("malformed raw signature: {e}"),
    })?;

    let signing_input = format!("{header_b64}.{payload_b64}");
    let digest: [u8; 32] = Sha256::digest(signing_input.as_bytes()).into();
    verifying_key
        .verify_prehash(&digest, &signature)
        .map_err(|_| JvsError::InvalidToken {
            reason: "signature does not verify".to_string(),
        })?;

    let claims: Claims = serde_json::from_slice(&b64url_decode(payload_b64)?)
        .map_err(|e| JvsError::InvalidToken {
            reason: format!("malformed payload: {e}"),
        })?;

    check_time_claims(&claims)?;
    check_subject(claims, options.subject)
}

fn verify_breakglass(payload_b64: &str, allow_breakglass: bool) -> Result<Claims, JvsError> {
    if !allow_breakglass {
        return Err(JvsError::BreakglassForbidden);
    }

    let claims: Claims = serde_json::from_slice(&b64url_decode(payload_b64)?)
        .map_err(|e| JvsError::InvalidToken {
            reason: format!("malformed payload: {e}"),
        })?;

    if claims.justs.len() != 1 || claims.justs[0].category != BREAKGLASS_CATEGORY {
        return Err(JvsError::InvalidToken {
            reason: "breakglass token must carry exactly one justification of category 'breakglass'"
                .to_string(),
        });
    }

    check_time_claims(&claims)?;
    Ok(claims)
}

fn check_time_claims(claims: &Claims) -> Result<(), JvsError> {
    let now = Utc::now().timestamp();
    if now + CLOCK_SKEW_SECONDS < claims.nbf {
        return Err(JvsError::InvalidToken {
            reason: "token not yet valid (nbf)".to_string(),
        });
    }
    if now - CLOCK_SKEW_SECONDS >= claims.exp {
        return Err(JvsError::InvalidToken {
            reason: "token has expired (exp)".to_string(),
        });
    }
    Ok(())
}

/// A `subject` argument is optional; when present it must match `sub`
/// exactly, or verification fails with `SubjectMismatch`. Omitting it
/// skips the check entirely.
fn check_subject(claims: Claims, subject: Option<&str>) -> Result<Claims, JvsError> {
    match subject {
        Some(expected) if expected != claims.sub => Err(JvsError::SubjectMismatch),
        _ => Ok(claims),
    }
}

fn jwk_to_verifying_key(key: &crate::jwks::EcdsaJwk) -> Result<VerifyingKey, JvsError> {
    use p256::EncodedPoint;

    let x = b64url_decode(&key.x)?;
    let y = b64url_decode(&key.y)?;
    let point = EncodedPoint::from_affine_coordinates(
        x.as_slice().into(),
        y.as_slice().into(),
        false,
    );
    VerifyingKey::from_encoded_point(&point).map_err(|e| JvsError::InvalidToken {
        reason: format!("malformed JWKS key: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::RawJustification;
    use crate::signing::{IssuanceRequest, SigningPipeline};
    use crate::validator::{ExplanationValidator, ValidatorSet};
    use jvs_kms::VersionState;
    use jvs_kms::adapter::fake::FakeKmsAdapter;
    use std::sync::Arc;

    const KEY: &str = "projects/p/locations/l/keyRings/r/cryptoKeys/k";

    async fn issue_token(subject: &str) -> (String, JwksDocument) {
        let adapter = FakeKmsAdapter::new();
        let v1 = adapter.seed_version(KEY, "1", VersionState::Enabled, chrono::Utc::now());
        jvs_kms::label::set_primary(&adapter, KEY, &v1).await.unwrap();

        let jwks_cache = crate::jwks::JwksCache::new(
            vec![KEY.to_string()],
            std::time::Duration::from_secs(300),
        );
        let jwks_str = jwks_cache.get(&adapter).await.unwrap();
        let jwks: JwksDocument = serde_json::from_str(&jwks_str).unwrap();

        let validators =
            ValidatorSet::new().register("explanation", Arc::new(ExplanationValidator));

        // Signing borrows the adapter by value into the pipeline; clone
        // the public key state is irrelevant here since we already
        // derived the JWKS document above.
        let pipeline = SigningPipeline::new(
            Box::new(adapter),
            KEY,
            "jvs.example.dev",
            "aud.example.dev",
            900,
            3600,
            validators,
        );

        let token = pipeline
            .issue(IssuanceRequest {
                subject: subject.to_string(),
                justifications: vec![RawJustification {
                    category: "explanation".to_string(),
                    value: "testing".to_string(),
                }],
                audiences: vec![],
                ttl_seconds: None,
            })
            .await
            .unwrap();

        (token, jwks)
    }

    #[tokio::test]
    async fn round_trips_sign_then_verify() {
        let (token, jwks) = issue_token("user@example.dev").await;

        let claims = verify(
            &token,
            &jwks,
            VerifyOptions {
                allow_breakglass: false,
                subject: Some("user@example.dev"),
            },
        )
        .unwrap();

        assert_eq!(claims.sub, "user@example.dev");
        assert_eq!(claims.justs[0].category, "explanation");
    }

    #[tokio::test]
    async fn breakglass_forbidden_when_not_opted_in() {
        let adapter = FakeKmsAdapter::new();
        let pipeline = SigningPipeline::new(
            Box::new(adapter),
            KEY,
            "jvs.example.dev",
            "aud.example.dev",
            900,
            3600,
            ValidatorSet::new(),
        );
        let token = pipeline
            .issue_breakglass(
                "user@example.dev".to_string(),
                "prod is down".to_string(),
                vec![],
                None,
            )
            .unwrap();

        let empty_jwks = JwksDocument { keys: vec![] };
        let err = verify(
            &token,
            &empty_jwks,
            VerifyOptions {
                allow_breakglass: false,
                subject: None,
            },
        )
        .unwrap_err();

        assert!(matches!(err, JvsError::BreakglassForbidden));
    }

    #[test]
    fn rejects_malformed_compact_serialization() {
        let empty_jwks = JwksDocument { keys: vec![] };
        let err = verify(
            "not-a-jwt",
            &empty_jwks,
            VerifyOptions {
                allow_breakglass: false,
                subject: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, JvsError::InvalidToken { .. }));
    }
}
