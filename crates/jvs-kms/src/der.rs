//! Minimal, purpose-built ASN.1 DER codec for the one shape KMS returns from
//! `asymmetric_sign`: `SEQUENCE { r INTEGER, s INTEGER }`. Hand-rolled
//! rather than delegated to a general crypto library's signature type,
//! because a generic decoder that treats `r`/`s` as trimmed big-ints will
//! silently drop a leading zero byte that the raw JWS `r‖s` form must keep.

use crate::error::KmsError;

const SEQUENCE_TAG: u8 = 0x30;
const INTEGER_TAG: u8 = 0x02;

/// Encodes `r` and `s` (already the minimal big-endian two's-complement
/// form, as produced by an ECDSA signer) as a DER `SEQUENCE { INTEGER, INTEGER }`.
pub fn encode_ecdsa_der_signature(r: &[u8], s: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    encode_integer(&mut body, r);
    encode_integer(&mut body, s);

    let mut out = Vec::with_capacity(body.len() + 4);
    out.push(SEQUENCE_TAG);
    encode_length(&mut out, body.len());
    out.extend_from_slice(&body);
    out
}

fn encode_integer(out: &mut Vec<u8>, value: &[u8]) {
    let mut bytes = value;
    while bytes.len() > 1 && bytes[0] == 0x00 && bytes[1] & 0x80 == 0 {
        bytes = &bytes[1..];
    }
    let needs_pad = !bytes.is_empty() && bytes[0] & 0x80 != 0;
    let len = bytes.len() + usize::from(needs_pad);

    out.push(INTEGER_TAG);
    encode_length(out, len);
    if needs_pad {
        out.push(0x00);
    }
    out.extend_from_slice(bytes);
}

fn encode_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let len_bytes = len.to_be_bytes();
    let first_nonzero = len_bytes.iter().position(|b| *b != 0).unwrap_or(len_bytes.len() - 1);
    let trimmed = &len_bytes[first_nonzero..];
    out.push(0x80 | trimmed.len() as u8);
    out.extend_from_slice(trimmed);
}

/// Decodes a DER `SEQUENCE { r INTEGER, s INTEGER }`, returning `r` and `s`
/// as minimal big-endian byte slices (DER's own leading-zero sign-guard
/// byte stripped, but no further truncation). Callers left-pad to the
/// curve's field width before concatenating.
pub fn decode_ecdsa_der_signature(der: &[u8]) -> Result<(Vec<u8>, Vec<u8>), KmsError> {
    let mut cursor = Cursor::new(der);
    let (tag, seq_body) = cursor.read_tlv()?;
    if tag != SEQUENCE_TAG {
        return Err(malformed("expected DER SEQUENCE"));
    }

    let mut inner = Cursor::new(seq_body);
    let (r_tag, r) = inner.read_tlv()?;
    if r_tag != INTEGER_TAG {
        return Err(malformed("expected DER INTEGER for r"));
    }
    let (s_tag, s) = inner.read_tlv()?;
    if s_tag != INTEGER_TAG {
        return Err(malformed("expected DER INTEGER for s"));
    }
    if !inner.is_empty() {
        return Err(malformed("trailing bytes after s"));
    }

    Ok((strip_sign_byte(r), strip_sign_byte(s)))
}

fn strip_sign_byte(mut value: &[u8]) -> Vec<u8> {
    while value.len() > 1 && value[0] == 0x00 {
        value = &value[1..];
    }
    value.to_vec()
}

fn malformed(msg: &str) -> KmsError {
    KmsError::Permanent {
        msg: format!("malformed DER signature: {msg}"),
        source: None,
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), KmsError> {
        let (tag, rest) = self
            .buf
            .split_first()
            .ok_or_else(|| malformed("unexpected end of input reading tag"))?;
        let (len, rest) = read_length(rest)?;
        if rest.len() < len {
            return Err(malformed("length exceeds remaining input"));
        }
        let (value, rest) = rest.split_at(len);
        self.buf = rest;
        Ok((*tag, value))
    }
}

fn read_length(buf: &[u8]) -> Result<(usize, &[u8]), KmsError> {
    let (first, rest) = buf
        .split_first()
        .ok_or_else(|| malformed("unexpected end of input reading length"))?;
    if *first & 0x80 == 0 {
        return Ok((*first as usize, rest));
    }
    let num_bytes = (*first & 0x7f) as usize;
    if num_bytes == 0 || num_bytes > std::mem::size_of::<usize>() {
        return Err(malformed("unsupported long-form length"));
    }
    if rest.len() < num_bytes {
        return Err(malformed("truncated long-form length"));
    }
    let (len_bytes, rest) = rest.split_at(num_bytes);
    let mut len = 0usize;
    for b in len_bytes {
        len = (len << 8) | (*b as usize);
    }
    Ok((len, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_r_s() {
        let r = [0x01u8; 32];
        let s = [0xffu8; 32];
        let der = encode_ecdsa_der_signature(&r, &s);
        let (got_r, got_s) = decode_ecdsa_der_signature(&der).unwrap();

        let mut padded_r = vec![0u8; 32 - got_r.len()];
        padded_r.extend_from_slice(&got_r);
        let mut padded_s = vec![0u8; 32 - got_s.len()];
        padded_s.extend_from_slice(&got_s);

        assert_eq!(padded_r, r.to_vec());
        assert_eq!(padded_s, s.to_vec());
    }

    #[test]
    fn preserves_high_bit_padding_byte() {
        // r has its high bit set, so DER must insert a leading 0x00.
        let mut r = [0u8; 32];
        r[0] = 0x80;
        let s = [0x01u8; 32];
        let der = encode_ecdsa_der_signature(&r, &s);
        // 2 (seq tag+len) + (1 tag + 1 len + 1 pad + 32) + (1 tag + 1 len + 32)
        assert_eq!(der[0], SEQUENCE_TAG);

        let (got_r, got_s) = decode_ecdsa_der_signature(&der).unwrap();
        assert_eq!(got_r.len(), 32);
        assert_eq!(got_r[0], 0x80);
        assert_eq!(got_s, vec![0x01u8; 32]);
    }

    #[test]
    fn preserves_leading_zero_without_high_bit() {
        // r has a leading zero byte that is NOT a DER sign-guard (next
        // byte's high bit is clear); DER encoding must strip it since it's
        // not significant, but decode + left-pad must restore it.
        let mut r = [0u8; 32];
        r[0] = 0x00;
        r[1] = 0x01;
        let s = [0x02u8; 32];
        let der = encode_ecdsa_der_signature(&r, &s);
        let (got_r, _) = decode_ecdsa_der_signature(&der).unwrap();

        let mut padded_r = vec![0u8; 32 - got_r.len()];
        padded_r.extend_from_slice(&got_r);
        assert_eq!(padded_r, r.to_vec());
    }

    #[test]
    fn rejects_non_sequence() {
        let bad = [INTEGER_TAG, 0x01, 0x00];
        assert!(decode_ecdsa_der_signature(&bad).is_err());
    }
}
