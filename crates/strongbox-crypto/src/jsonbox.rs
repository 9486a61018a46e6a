//! The authenticated-encryption envelope wrapped around every secret that
//! touches disk or the wire.
//!
//! Two ciphers share one JSON shape:
//! `{"encryptionType": t, "iv_hex": "...", "data_base64": "..."}`.
//! Type 0 is the legacy AES-256-CBC package; enormous amounts of stored data
//! exist in that format, so its layout must never drift. Type 1 is
//! ChaCha20-Poly1305 (IETF) and is what new writes produce.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use strongbox_core::fileio;
use strongbox_core::{Error, Result};

use crate::encoding::{base16_decode, base16_encode, base64_decode, base64_encode};
use crate::hash::sha256;
use crate::random::random_bytes;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const TYPE_AES256_CBC: i64 = 0;
const TYPE_CHACHA20_POLY1305: i64 = 1;

const AES_IV_LENGTH: usize = 16;
const CHACHA_NONCE_LENGTH: usize = 12;
const SHA256_LENGTH: usize = 32;

/// A JSON object holding encrypted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonBox {
    #[serde(rename = "encryptionType")]
    pub encryption_type: i64,
    pub iv_hex: String,
    pub data_base64: String,
}

impl JsonBox {
    /// Puts a value into the box. New data always uses the AEAD cipher.
    pub fn encrypt(data: &[u8], key: &[u8]) -> Result<Self> {
        let nonce_bytes = random_bytes(CHACHA_NONCE_LENGTH)?;
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| Error::Encrypt("key must be 32 bytes".into()))?;
        let cyphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload { msg: data, aad: &[] },
            )
            .map_err(|_| Error::Encrypt("AEAD seal failed".into()))?;

        Ok(JsonBox {
            encryption_type: TYPE_CHACHA20_POLY1305,
            iv_hex: base16_encode(&nonce_bytes),
            data_base64: base64_encode(&cyphertext),
        })
    }

    /// Produces a legacy AES-256-CBC package. Only needed when writing for
    /// consumers that predate the AEAD cipher.
    pub fn encrypt_legacy(data: &[u8], key: &[u8]) -> Result<Self> {
        let iv = random_bytes(AES_IV_LENGTH)?;
        let cyphertext = aes_package_encrypt(data, key, &iv)?;

        Ok(JsonBox {
            encryption_type: TYPE_AES256_CBC,
            iv_hex: base16_encode(&iv),
            data_base64: base64_encode(&cyphertext),
        })
    }

    /// Extracts the value from the box, dispatching on the cipher type.
    pub fn decrypt(&self, key: &[u8]) -> Result<Vec<u8>> {
        let nonce = base16_decode(&self.iv_hex)
            .map_err(|_| Error::Decrypt("bad iv_hex".into()))?;
        let cyphertext = base64_decode(&self.data_base64)
            .map_err(|_| Error::Decrypt("bad data_base64".into()))?;

        match self.encryption_type {
            TYPE_AES256_CBC => aes_package_decrypt(&cyphertext, key, &nonce),

            TYPE_CHACHA20_POLY1305 => {
                if nonce.len() != CHACHA_NONCE_LENGTH {
                    return Err(Error::Decrypt("bad nonce size".into()));
                }
                let cipher = ChaCha20Poly1305::new_from_slice(key)
                    .map_err(|_| Error::Decrypt("bad key size".into()))?;
                cipher
                    .decrypt(
                        Nonce::from_slice(&nonce),
                        Payload { msg: &cyphertext, aad: &[] },
                    )
                    .map_err(|_| Error::DecryptFailure)
            }

            other => Err(Error::UnknownCryptoType(other)),
        }
    }

    // ── JSON payload helpers ──────────────────────────────────────────────────

    /// Encrypts a serde value's JSON text.
    pub fn encrypt_json<T: Serialize>(value: &T, key: &[u8]) -> Result<Self> {
        let text = serde_json::to_string(value)?;
        Self::encrypt(text.as_bytes(), key)
    }

    /// Decrypts and parses the payload as JSON.
    pub fn decrypt_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<T> {
        let plain = self.decrypt(key)?;
        // Stored payloads may carry a trailing NUL from older writers.
        let end = plain.iter().position(|&b| b == 0).unwrap_or(plain.len());
        serde_json::from_slice(&plain[..end]).map_err(|e| Error::Json(e.to_string()))
    }

    // ── File helpers ──────────────────────────────────────────────────────────

    pub fn load(path: &std::path::Path) -> Result<Self> {
        fileio::json_load(path)
    }

    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        fileio::json_save(path, self)
    }
}

/// Pads or truncates a key to the AES-256 width. Part of the legacy format.
fn aes_key(key: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let len = key.len().min(32);
    out[..len].copy_from_slice(&key[..len]);
    out
}

fn aes_iv(iv: &[u8]) -> [u8; AES_IV_LENGTH] {
    let mut out = [0u8; AES_IV_LENGTH];
    let len = iv.len().min(AES_IV_LENGTH);
    out[..len].copy_from_slice(&iv[..len]);
    out
}

/// Builds and encrypts the legacy integrity envelope:
///
/// ```text
/// [h:1][random header:h][len:4 BE][data][f:1][random footer:f][sha256:32]
/// ```
///
/// The SHA-256 covers every byte before it, including both count bytes.
fn aes_package_encrypt(data: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    let header_len = random_bytes(1)?[0] as usize;
    let footer_len = random_bytes(1)?[0] as usize;
    let header = random_bytes(header_len)?;
    let footer = random_bytes(footer_len)?;

    let mut plain =
        Vec::with_capacity(1 + header_len + 4 + data.len() + 1 + footer_len + SHA256_LENGTH);
    plain.push(header_len as u8);
    plain.extend_from_slice(&header);
    plain.extend_from_slice(&(data.len() as u32).to_be_bytes());
    plain.extend_from_slice(data);
    plain.push(footer_len as u8);
    plain.extend_from_slice(&footer);
    let digest = sha256(&plain);
    plain.extend_from_slice(&digest);

    let cipher = Aes256CbcEnc::new(&aes_key(key).into(), &aes_iv(iv).into());
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(&plain))
}

/// Decrypts and validates the legacy envelope. Every failure path reports
/// `DecryptFailure`: callers rely on that exact error to detect a wrong key.
fn aes_package_decrypt(cyphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcDec::new(&aes_key(key).into(), &aes_iv(iv).into());
    let plain = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(cyphertext)
        .map_err(|_| Error::DecryptFailure)?;

    // Walk the envelope, checking each length before trusting it:
    let header_len = *plain.first().ok_or(Error::DecryptFailure)? as usize;
    let min = 1 + header_len + 4 + 1 + 1 + SHA256_LENGTH;
    if plain.len() < min {
        return Err(Error::DecryptFailure);
    }

    let len_at = 1 + header_len;
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&plain[len_at..len_at + 4]);
    let data_len = u32::from_be_bytes(len_bytes) as usize;
    let min = 1 + header_len + 4 + data_len + 1 + SHA256_LENGTH;
    if plain.len() < min {
        return Err(Error::DecryptFailure);
    }

    let footer_at = 1 + header_len + 4 + data_len;
    let footer_len = plain[footer_at] as usize;
    let digest_at = footer_at + 1 + footer_len;
    if plain.len() < digest_at + SHA256_LENGTH {
        return Err(Error::DecryptFailure);
    }

    if sha256(&plain[..digest_at]) != plain[digest_at..digest_at + SHA256_LENGTH] {
        return Err(Error::DecryptFailure);
    }

    let data_at = 1 + header_len + 4;
    Ok(plain[data_at..data_at + data_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("Satoshi"):
    fn fixture_key() -> Vec<u8> {
        base16_decode("002688cc350a5333a87fa622eacec626c3d1c0ebf9f3793de3885fa254d7e393")
            .unwrap()
    }

    #[test]
    fn aes_package_fixture() {
        let box_json: JsonBox = serde_json::from_str(
            r#"{
            "data_base64":
            "X08Snnou2PrMW21ZNyJo5C8StDjTNgMtuEoAJL5bJ6LDPdZGQLhjaUMetOknaPYnmfBCHNQ3ApqmE922Hkp30vdxzXBloopfPLJKdYwQxURYNbiL4TvNakP7i0bnTlIsR7bj1q/65ZyJOW1HyOKV/tmXCf56Fhe3Hcmb/ebsBF72FZr3jX5pkSBO+angK15IlCIiem1kPi6QmzyFtMB11i0GTjSS67tLrWkGIqAmik+bGqy7WtQgfMRxQNNOxePPSHHp09431Ogrc9egY3txnBN2FKnfEM/0Wa/zLWKCVQXCGhmrTx1tmf4HouNDOnnCgkRWJYs8FJdrDP8NZy4Fkzs7FoH7RIaUiOvosNKMil1CBknKremP6ohK7SMLGoOHpv+bCgTXcAeB3P4Slx3iy+RywTSLb3yh+HDo6bwt+vhujP0RkUamI5523bwz3/7vLO8BzyF6WX0By2s4gvMdFQ==",
            "encryptionType": 0,
            "iv_hex": "96a4cd52670c13df9712fdc1b564d44b"
            }"#,
        )
        .unwrap();

        let data = box_json.decrypt(&fixture_key()).unwrap();
        assert_eq!(data, b"payload");
    }

    #[test]
    fn chacha20_fixture() {
        let box_json: JsonBox = serde_json::from_str(
            r#"{
            "data_base64": "enXJcWh6uKdTsAGGtT91dULURYlnsCs=",
            "encryptionType": 1,
            "iv_hex": "0ed6eb831af3b55470f15c39"
            }"#,
        )
        .unwrap();

        let data = box_json.decrypt(&fixture_key()).unwrap();
        assert_eq!(data, b"payload");
    }

    #[test]
    fn round_trip_both_types() {
        let key = fixture_key();
        let payload = b"payload";

        let aead = JsonBox::encrypt(payload, &key).unwrap();
        assert_eq!(aead.encryption_type, 1);
        assert_eq!(aead.decrypt(&key).unwrap(), payload);

        let legacy = JsonBox::encrypt_legacy(payload, &key).unwrap();
        assert_eq!(legacy.encryption_type, 0);
        assert_eq!(legacy.decrypt(&key).unwrap(), payload);
    }

    #[test]
    fn wrong_key_fails() {
        let key = fixture_key();
        let mut bad_key = key.clone();
        bad_key[0] ^= 1;

        for boxed in [
            JsonBox::encrypt(b"payload", &key).unwrap(),
            JsonBox::encrypt_legacy(b"payload", &key).unwrap(),
        ] {
            assert!(matches!(
                boxed.decrypt(&bad_key),
                Err(Error::DecryptFailure)
            ));
        }
    }

    #[test]
    fn legacy_cyphertext_length_is_block_aligned() {
        let key = fixture_key();
        let boxed = JsonBox::encrypt_legacy(b"some plaintext", &key).unwrap();
        let cyphertext = base64_decode(&boxed.data_base64).unwrap();
        assert_eq!(cyphertext.len() % 16, 0);
        assert!(cyphertext.len() >= 48 + b"some plaintext".len());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let boxed = JsonBox {
            encryption_type: 7,
            iv_hex: "00".repeat(12),
            data_base64: base64_encode(b"junk"),
        };
        assert!(matches!(
            boxed.decrypt(&fixture_key()),
            Err(Error::UnknownCryptoType(7))
        ));
    }

    #[test]
    fn json_payload_round_trip() {
        let key = fixture_key();
        let value = serde_json::json!({"hello": "world", "n": 5});
        let boxed = JsonBox::encrypt_json(&value, &key).unwrap();
        let back: serde_json::Value = boxed.decrypt_json(&key).unwrap();
        assert_eq!(back, value);
    }
}
