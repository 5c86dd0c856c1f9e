//! HMAC-SHA1 Webhook Signatures
//!
//! Verifies the `X-Hub-Signature` header GitHub attaches to every delivery.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// Algorithm tag GitHub prefixes to the hex digest.
pub const SIGNATURE_PREFIX: &str = "sha1=";

/// Length in bytes of an HMAC-SHA1 digest.
const DIGEST_LEN: usize = 20;

/// Reasons a signature header fails verification.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is missing the sha1= prefix")]
    UnsupportedAlgorithm,
    #[error("signature is not valid hex")]
    InvalidHex,
    #[error("signature has the wrong length")]
    InvalidLength,
    #[error("signature does not match payload")]
    Mismatch,
}

/// Sign a payload with HMAC-SHA1 and return the header value (`sha1=<hex>`).
pub fn sign_payload(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Verify a `sha1=<hex>` signature header against the raw body.
///
/// The digest comparison runs in constant time.
pub fn verify_signature(
    secret: &[u8],
    payload: &[u8],
    signature_header: &str,
) -> Result<(), SignatureError> {
    let hex_sig = signature_header
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(SignatureError::UnsupportedAlgorithm)?;

    let expected = hex::decode(hex_sig).map_err(|_| SignatureError::InvalidHex)?;
    if expected.len() != DIGEST_LEN {
        return Err(SignatureError::InvalidLength);
    }

    let mut mac = HmacSha1::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"c2VjcmV0LXNlY3JldC1zZWNyZXQtc2VjcmV0LXNlYw==";

    #[test]
    fn sign_and_verify() {
        let payload = br#"{"zen":"Keep it logically awesome."}"#;
        let sig = sign_payload(SECRET, payload);
        assert!(sig.starts_with("sha1="));
        assert_eq!(sig.len(), 5 + 40);
        assert_eq!(verify_signature(SECRET, payload, &sig), Ok(()));
        assert_eq!(
            verify_signature(b"wrong_secret", payload, &sig),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature(SECRET, b"wrong payload", &sig),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn known_vector() {
        // RFC 2202 test case 2
        let sig = sign_payload(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(sig, "sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
    }

    #[test]
    fn single_bit_flip_in_body_fails() {
        let payload = b"hello world".to_vec();
        let sig = sign_payload(SECRET, &payload);
        for i in 0..payload.len() {
            for bit in 0..8 {
                let mut tampered = payload.clone();
                tampered[i] ^= 1 << bit;
                assert_eq!(
                    verify_signature(SECRET, &tampered, &sig),
                    Err(SignatureError::Mismatch)
                );
            }
        }
    }

    #[test]
    fn single_bit_flip_in_signature_fails() {
        let payload = b"hello world";
        let sig = sign_payload(SECRET, payload);
        let mut digest = hex::decode(sig.strip_prefix("sha1=").unwrap()).unwrap();
        for i in 0..digest.len() {
            for bit in 0..8 {
                digest[i] ^= 1 << bit;
                let tampered = format!("sha1={}", hex::encode(&digest));
                assert_eq!(
                    verify_signature(SECRET, payload, &tampered),
                    Err(SignatureError::Mismatch)
                );
                digest[i] ^= 1 << bit;
            }
        }
    }

    #[test]
    fn wrong_prefix_is_rejected() {
        let sig = sign_payload(SECRET, b"body");
        let sha256 = sig.replace("sha1=", "sha256=");
        assert_eq!(
            verify_signature(SECRET, b"body", &sha256),
            Err(SignatureError::UnsupportedAlgorithm)
        );
        let bare = sig.trim_start_matches("sha1=");
        assert_eq!(
            verify_signature(SECRET, b"body", bare),
            Err(SignatureError::UnsupportedAlgorithm)
        );
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert_eq!(
            verify_signature(SECRET, b"body", "sha1=not-valid-hex!"),
            Err(SignatureError::InvalidHex)
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(
            verify_signature(SECRET, b"body", "sha1=abcdef"),
            Err(SignatureError::InvalidLength)
        );
        let too_long = format!("sha1={}", "ab".repeat(32));
        assert_eq!(
            verify_signature(SECRET, b"body", &too_long),
            Err(SignatureError::InvalidLength)
        );
    }

    #[test]
    fn empty_body_with_valid_sig_passes() {
        let sig = sign_payload(SECRET, b"");
        assert_eq!(verify_signature(SECRET, b"", &sig), Ok(()));
    }
}
