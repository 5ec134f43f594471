use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::domain::error::{DomainError, DomainResult};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 32;

/// Seals provider API keys for storage at rest. Encrypt-then-MAC with an
/// HMAC-SHA-256 counter keystream and an HMAC tag over nonce and
/// ciphertext; the sealed blob is base64(nonce || ciphertext || tag).
#[derive(Clone)]
pub struct CredentialSealer {
    key: [u8; 32],
}

impl std::fmt::Debug for CredentialSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSealer").finish_non_exhaustive()
    }
}

impl CredentialSealer {
    /// Derives the sealing key from the configured secret.
    pub fn new(secret: &str) -> DomainResult<Self> {
        if secret.len() < 16 {
            return Err(DomainError::configuration(
                "sealing secret must be at least 16 characters",
            ));
        }
        let mut hasher = Sha256::new();
        hasher.update(b"promptdeck-credential-sealing-v1");
        hasher.update(secret.as_bytes());
        Ok(Self {
            key: hasher.finalize().into(),
        })
    }

    pub fn seal(&self, plaintext: &str) -> DomainResult<String> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut ciphertext = plaintext.as_bytes().to_vec();
        self.apply_keystream(&nonce, &mut ciphertext);
        let tag = self.tag(&nonce, &ciphertext)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len() + TAG_LEN);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        blob.extend_from_slice(&tag);
        Ok(BASE64.encode(blob))
    }

    pub fn open(&self, sealed: &str) -> DomainResult<String> {
        let blob = BASE64
            .decode(sealed)
            .map_err(|_| DomainError::credential("sealed credential is not valid base64"))?;
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(DomainError::credential("sealed credential is truncated"));
        }
        let (nonce, rest) = blob.split_at(NONCE_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

        self.tag_mac(nonce, ciphertext)?
            .verify_slice(tag)
            .map_err(|_| DomainError::credential("sealed credential failed integrity check"))?;

        let mut plaintext = ciphertext.to_vec();
        let mut nonce_arr = [0u8; NONCE_LEN];
        nonce_arr.copy_from_slice(nonce);
        self.apply_keystream(&nonce_arr, &mut plaintext);
        String::from_utf8(plaintext)
            .map_err(|_| DomainError::credential("unsealed credential is not valid utf-8"))
    }

    fn apply_keystream(&self, nonce: &[u8; NONCE_LEN], data: &mut [u8]) {
        for (block_index, chunk) in data.chunks_mut(32).enumerate() {
            let mut mac = HmacSha256::new_from_slice(&self.key)
                .expect("hmac accepts any key length");
            mac.update(b"stream");
            mac.update(nonce);
            mac.update(&(block_index as u64).to_be_bytes());
            let keystream = mac.finalize().into_bytes();
            for (byte, pad) in chunk.iter_mut().zip(keystream.iter()) {
                *byte ^= pad;
            }
        }
    }

    fn tag_mac(&self, nonce: &[u8], ciphertext: &[u8]) -> DomainResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| DomainError::internal("hmac key rejected"))?;
        mac.update(b"tag");
        mac.update(nonce);
        mac.update(ciphertext);
        Ok(mac)
    }

    fn tag(&self, nonce: &[u8], ciphertext: &[u8]) -> DomainResult<[u8; TAG_LEN]> {
        let mac = self.tag_mac(nonce, ciphertext)?;
        Ok(mac.finalize().into_bytes().into())
    }
}

/// The non-secret tail of a key, shown in place of the key itself.
pub fn key_hint(plaintext: &str) -> String {
    let tail: String = plaintext
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealer() -> CredentialSealer {
        CredentialSealer::new("an-adequately-long-test-secret").unwrap()
    }

    #[test]
    fn test_seal_open_round_trip() {
        let sealer = sealer();
        let sealed = sealer.seal("sk-live-abc123xyz").unwrap();
        assert_ne!(sealed, "sk-live-abc123xyz");
        assert_eq!(sealer.open(&sealed).unwrap(), "sk-live-abc123xyz");
    }

    #[test]
    fn test_seal_is_randomized() {
        let sealer = sealer();
        let a = sealer.seal("same-key").unwrap();
        let b = sealer.seal("same-key").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_blob_rejected() {
        let sealer = sealer();
        let sealed = sealer.seal("sk-live-abc123xyz").unwrap();
        let mut blob = BASE64.decode(&sealed).unwrap();
        blob[NONCE_LEN] ^= 0x01;
        let tampered = BASE64.encode(blob);
        assert!(sealer.open(&tampered).is_err());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let sealed = sealer().seal("sk-live-abc123xyz").unwrap();
        let other = CredentialSealer::new("a-different-long-test-secret").unwrap();
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(CredentialSealer::new("short").is_err());
    }

    #[test]
    fn test_long_plaintext_spans_blocks() {
        let sealer = sealer();
        let long = "k".repeat(100);
        let sealed = sealer.seal(&long).unwrap();
        assert_eq!(sealer.open(&sealed).unwrap(), long);
    }

    #[test]
    fn test_key_hint() {
        assert_eq!(key_hint("sk-live-abc123xyz"), "...3xyz");
        assert_eq!(key_hint("ab"), "...ab");
    }
}
