//! QR payload sealing for the status webhook.
//!
//! Format: `base64(iv):base64(ciphertext):base64(tag)`.
//!
//! - key: SHA-256 of the shared secret;
//! - plaintext: `"{unix_millis}:{qr}"`, AES-256-CBC with PKCS#7 padding and a
//!   random 16-byte IV per call;
//! - tag: HMAC-SHA256 over the ciphertext, keyed with the same derived key.
//!
//! The receiver must hold the same secret. `open_qr` is the reference reader
//! for that side; the age check only happens when a caller asks for it.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::SilviaError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

fn derive_key(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

fn tag_for(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>, SilviaError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SilviaError::Crypto(format!("hmac key: {e}")))?;
    mac.update(ciphertext);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Seal a pairing code, stamping it with the current time.
pub fn seal_qr(secret: &str, qr: &str) -> Result<String, SilviaError> {
    seal_qr_at(secret, qr, chrono::Utc::now().timestamp_millis())
}

/// Seal a pairing code with an explicit timestamp (milliseconds).
pub fn seal_qr_at(secret: &str, qr: &str, now_ms: i64) -> Result<String, SilviaError> {
    let key = derive_key(secret);
    let iv: [u8; IV_LEN] = rand::random();

    let plaintext = format!("{now_ms}:{qr}");
    let pt = plaintext.as_bytes();
    let mut buf = vec![0u8; pt.len() + BLOCK_LEN];
    buf[..pt.len()].copy_from_slice(pt);

    let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
        .map_err(|e| SilviaError::Crypto(format!("cipher init: {e}")))?
        .encrypt_padded_mut::<Pkcs7>(&mut buf, pt.len())
        .map_err(|e| SilviaError::Crypto(format!("encrypt: {e}")))?;

    let tag = tag_for(&key, ciphertext)?;

    Ok(format!(
        "{}:{}:{}",
        BASE64.encode(iv),
        BASE64.encode(ciphertext),
        BASE64.encode(tag)
    ))
}

/// A verified, decrypted QR payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedQr {
    pub issued_at_ms: i64,
    pub qr: String,
}

/// Verify and decrypt a sealed payload.
///
/// With `max_age_ms`, payloads stamped earlier than `now_ms - max_age_ms`
/// are rejected.
pub fn open_qr(
    secret: &str,
    sealed: &str,
    max_age_ms: Option<i64>,
    now_ms: i64,
) -> Result<OpenedQr, SilviaError> {
    let parts: Vec<&str> = sealed.split(':').collect();
    let [iv_b64, ct_b64, tag_b64] = parts.as_slice() else {
        return Err(SilviaError::Crypto(format!(
            "expected 3 segments, got {}",
            parts.len()
        )));
    };

    let decode = |s: &str, what: &str| -> Result<Vec<u8>, SilviaError> {
        BASE64
            .decode(s)
            .map_err(|e| SilviaError::Crypto(format!("invalid {what} encoding: {e}")))
    };
    let iv = decode(*iv_b64, "iv")?;
    let mut ciphertext = decode(*ct_b64, "ciphertext")?;
    let tag = decode(*tag_b64, "tag")?;

    let key = derive_key(secret);
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| SilviaError::Crypto(format!("hmac key: {e}")))?;
    mac.update(&ciphertext);
    mac.verify_slice(&tag)
        .map_err(|_| SilviaError::Crypto("tag mismatch".into()))?;

    let plaintext = Aes256CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| SilviaError::Crypto(format!("cipher init: {e}")))?
        .decrypt_padded_mut::<Pkcs7>(&mut ciphertext)
        .map_err(|e| SilviaError::Crypto(format!("decrypt: {e}")))?;

    let text = std::str::from_utf8(plaintext)
        .map_err(|e| SilviaError::Crypto(format!("payload is not utf-8: {e}")))?;
    let (ts, qr) = text
        .split_once(':')
        .ok_or_else(|| SilviaError::Crypto("payload missing timestamp".into()))?;
    let issued_at_ms: i64 = ts
        .parse()
        .map_err(|_| SilviaError::Crypto(format!("invalid timestamp '{ts}'")))?;

    if let Some(max_age) = max_age_ms {
        if now_ms.saturating_sub(issued_at_ms) > max_age {
            return Err(SilviaError::Crypto(format!(
                "payload expired ({} ms old)",
                now_ms - issued_at_ms
            )));
        }
    }

    Ok(OpenedQr {
        issued_at_ms,
        qr: qr.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "shared-secret";
    const QR: &str = "2@Xb8x1,9kQ+0=,Zm9v,YmFy";

    fn is_base64(s: &str) -> bool {
        !s.is_empty() && BASE64.decode(s).is_ok()
    }

    #[test]
    fn test_sealed_format_three_base64_segments() {
        let sealed = seal_qr(SECRET, QR).unwrap();
        let parts: Vec<&str> = sealed.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| is_base64(p)));
        assert_eq!(BASE64.decode(parts[0]).unwrap().len(), 16);
        assert_eq!(BASE64.decode(parts[2]).unwrap().len(), 32);
        assert_eq!(BASE64.decode(parts[1]).unwrap().len() % 16, 0);
    }

    #[test]
    fn test_sealing_twice_differs() {
        let a = seal_qr_at(SECRET, QR, 1_700_000_000_000).unwrap();
        let b = seal_qr_at(SECRET, QR, 1_700_000_000_000).unwrap();
        assert_ne!(a, b, "random IV must change the output");
        assert_eq!(a.split(':').count(), 3);
        assert_eq!(b.split(':').count(), 3);
    }

    #[test]
    fn test_open_recovers_code_and_timestamp() {
        let sealed = seal_qr_at(SECRET, QR, 1_700_000_000_000).unwrap();
        let opened = open_qr(SECRET, &sealed, None, 0).unwrap();
        assert_eq!(opened.qr, QR);
        assert_eq!(opened.issued_at_ms, 1_700_000_000_000);
    }

    #[test]
    fn test_wrong_secret_fails_tag() {
        let sealed = seal_qr(SECRET, QR).unwrap();
        let err = open_qr("other", &sealed, None, 0).unwrap_err();
        assert!(err.to_string().contains("tag mismatch"));
    }

    #[test]
    fn test_tampered_ciphertext_fails_tag() {
        let sealed = seal_qr(SECRET, QR).unwrap();
        let parts: Vec<&str> = sealed.split(':').collect();
        let mut ct = BASE64.decode(parts[1]).unwrap();
        ct[0] ^= 0x01;
        let forged = format!("{}:{}:{}", parts[0], BASE64.encode(ct), parts[2]);
        assert!(open_qr(SECRET, &forged, None, 0).is_err());
    }

    #[test]
    fn test_max_age_enforced() {
        let sealed = seal_qr_at(SECRET, QR, 1_000).unwrap();
        assert!(open_qr(SECRET, &sealed, Some(60_000), 30_000).is_ok());
        let err = open_qr(SECRET, &sealed, Some(60_000), 120_000).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_malformed_input() {
        assert!(open_qr(SECRET, "only:two", None, 0).is_err());
        assert!(open_qr(SECRET, "a:b:c:d", None, 0).is_err());
        assert!(open_qr(SECRET, "!!:!!:!!", None, 0).is_err());
    }
}
