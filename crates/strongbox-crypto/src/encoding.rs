//! Binary-to-text codecs used by the on-disk and wire formats.
//!
//! Encoders always emit canonical output. Decoders are strict: embedded
//! whitespace, bad padding, and out-of-alphabet characters are rejected,
//! since these strings live inside authenticated data formats.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use strongbox_core::{Error, Result};

// ── Base16 ────────────────────────────────────────────────────────────────────

pub fn base16_encode(data: &[u8]) -> String {
    hex::encode(data)
}

pub fn base16_decode(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::Parse(format!("bad base16: {e}")))
}

// ── Base58 ────────────────────────────────────────────────────────────────────

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn base58_decode(text: &str) -> Result<Vec<u8>> {
    bs58::decode(text)
        .into_vec()
        .map_err(|e| Error::Parse(format!("bad base58: {e}")))
}

// ── Base64 ────────────────────────────────────────────────────────────────────

pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

pub fn base64_decode(text: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text)
        .map_err(|e| Error::Parse(format!("bad base64: {e}")))
}

// ── Base32 (rfc4648 §6) ───────────────────────────────────────────────────────

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Encodes with `=` padding to a multiple of 8 characters.
pub fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(8 * data.len().div_ceil(5));

    // Bits waiting to be written out, MSB first.
    let mut buffer: u16 = 0;
    let mut bits = 0i32;
    let mut iter = data.iter();
    let mut next = iter.next();

    while next.is_some() || bits > 0 {
        if bits < 5 {
            if let Some(&byte) = next {
                buffer |= (byte as u16) << (8 - bits);
                bits += 8;
                next = iter.next();
            }
        }
        out.push(BASE32_ALPHABET[(buffer >> 11) as usize] as char);
        buffer <<= 5;
        bits -= 5;
    }

    while out.len() % 8 != 0 {
        out.push('=');
    }
    out
}

/// Strict decoder: the input must be a multiple of 8 characters, padding must
/// be shorter than one full group, and nothing may follow the first `=`.
pub fn base32_decode(text: &str) -> Result<Vec<u8>> {
    let bad = || Error::Parse("bad base32".into());

    if text.len() % 8 != 0 {
        return Err(bad());
    }

    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(5 * (bytes.len() / 8));
    let mut buffer: u16 = 0;
    let mut bits = 0i32;
    let mut pos = 0;

    while pos < bytes.len() {
        let value = match bytes[pos] {
            c @ b'A'..=b'Z' => (c - b'A') as u16,
            c @ b'2'..=b'7' => (26 + c - b'2') as u16,
            _ => break,
        };
        pos += 1;

        buffer |= value << (11 - bits);
        bits += 5;
        if bits >= 8 {
            out.push((buffer >> 8) as u8);
            buffer <<= 8;
            bits -= 8;
        }
    }

    // The tail must be all padding, and less than a full group of it:
    if !bytes[pos..].iter().all(|&c| c == b'=') {
        return Err(bad());
    }
    if bytes.len() - pos >= 8 {
        return Err(bad());
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base32_rfc4648_vectors() {
        let cases: &[(&[u8], &str)] = &[
            (b"", ""),
            (b"f", "MY======"),
            (b"fo", "MZXQ===="),
            (b"foo", "MZXW6==="),
            (b"foob", "MZXW6YQ="),
            (b"fooba", "MZXW6YTB"),
            (b"foobar", "MZXW6YTBOI======"),
        ];
        for (raw, encoded) in cases {
            assert_eq!(base32_encode(raw), *encoded);
            assert_eq!(base32_decode(encoded).unwrap(), raw.to_vec());
        }
    }

    #[test]
    fn base32_rejects_bad_input() {
        assert!(base32_decode("MZXW6YTB=").is_err()); // not 0 mod 8
        assert!(base32_decode("MZXW6Y=B").is_err()); // data after padding
        assert!(base32_decode("mzxw6ytb").is_err()); // lowercase
        assert!(base32_decode("MZXW 6YT").is_err()); // whitespace
        assert!(base32_decode("========").is_err()); // a full group of padding
        assert!(base32_decode("MZXW1YTB").is_err()); // '1' not in alphabet
    }

    #[test]
    fn round_trips() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(base16_decode(&base16_encode(&data)).unwrap(), data);
        assert_eq!(base32_decode(&base32_encode(&data)).unwrap(), data);
        assert_eq!(base58_decode(&base58_encode(&data)).unwrap(), data);
        assert_eq!(base64_decode(&base64_encode(&data)).unwrap(), data);
    }

    #[test]
    fn base64_rejects_missing_padding() {
        assert!(base64_decode("AAA").is_err());
    }
}
