//! Converts between KMS's ASN.1 DER ECDSA signatures and the raw `r‖s`
//! concatenation required by JWS ES256 (§4.E, §9). The DER codec itself
//! lives in `jvs_kms::der` (closest to where KMS responses are produced);
//! this module owns the curve-width padding rule that the design notes
//! call out explicitly: never truncate a leading zero.

use jvs_kms::der::decode_ecdsa_der_signature;

use crate::error::JvsError;

const FIELD_WIDTH: usize = 32;

/// `der` is the ASN.1 `SEQUENCE { r INTEGER, s INTEGER }` KMS returns from
/// `asymmetric_sign`. Returns exactly 64 bytes: `r` left-padded to 32
/// bytes, then `s` left-padded to 32 bytes.
pub fn der_to_raw(der: &[u8]) -> Result<[u8; 64], JvsError> {
    let (r, s) = decode_ecdsa_der_signature(der).map_err(|e| JvsError::InvalidToken {
        reason: format!("signature is not a valid DER ECDSA signature: {e}"),
    })?;

    if r.len() > FIELD_WIDTH || s.len() > FIELD_WIDTH {
        return Err(JvsError::InvalidToken {
            reason: "ECDSA signature component wider than the P-256 field".to_string(),
        });
    }

    let mut raw = [0u8; 64];
    raw[FIELD_WIDTH - r.len()..FIELD_WIDTH].copy_from_slice(&r);
    raw[64 - s.len()..64].copy_from_slice(&s);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jvs_kms::der::encode_ecdsa_der_signature;

    #[test]
    fn produces_exactly_64_bytes() {
        let r = [0x11u8; 32];
        let s = [0x22u8; 32];
        let der = encode_ecdsa_der_signature(&r, &s);
        let raw = der_to_raw(&der).unwrap();
        assert_eq!(raw.len(), 64);
        assert_eq!(&raw[..32], &r[..]);
        assert_eq!(&raw[32..], &s[..]);
    }

    #[test]
    fn preserves_leading_zero_in_r() {
        let mut r = [0x00u8; 32];
        r[0] = 0x00;
        r[1] = 0x7f;
        let s = [0x01u8; 32];
        let der = encode_ecdsa_der_signature(&r, &s);
        let raw = der_to_raw(&der).unwrap();
        assert_eq!(&raw[..32], &r[..]);
    }

    #[test]
    fn preserves_high_bit_sign_guard() {
        let mut r = [0u8; 32];
        r[0] = 0x80;
        let s = [0u8; 32];
        let der = encode_ecdsa_der_signature(&r, &s);
        let raw = der_to_raw(&der).unwrap();
        assert_eq!(raw[0], 0x80);
    }
}
