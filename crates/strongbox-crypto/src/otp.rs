//! The TOTP algorithm defined by rfc6238, plus the underlying HOTP (rfc4226).

use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroize;

use strongbox_core::constants::OTP_KEY_LENGTH;
use strongbox_core::Result;

use crate::encoding::{base32_decode, base32_encode};
use crate::random::random_bytes;

/// A shared OTP secret. Wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpKey {
    key: Vec<u8>,
}

impl OtpKey {
    /// Initializes the key with random data.
    pub fn create(key_size: usize) -> Result<Self> {
        Ok(OtpKey {
            key: random_bytes(key_size)?,
        })
    }

    /// The usual key size for new accounts.
    pub fn create_default() -> Result<Self> {
        Self::create(OTP_KEY_LENGTH)
    }

    pub fn from_bytes(key: &[u8]) -> Self {
        OtpKey { key: key.to_vec() }
    }

    /// Initializes the key from its base32 string form.
    pub fn decode_base32(text: &str) -> Result<Self> {
        Ok(OtpKey {
            key: base32_decode(text)?,
        })
    }

    pub fn encode_base32(&self) -> String {
        base32_encode(&self.key)
    }

    /// Produces a counter-based password: HMAC-SHA1 over the big-endian
    /// counter, dynamic truncation, last `digits` decimal digits.
    pub fn hotp(&self, counter: u64, digits: usize) -> String {
        let mut mac =
            Hmac::<Sha1>::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let offset = (digest[19] & 0xf) as usize;
        let p = (u32::from(digest[offset]) << 24
            | u32::from(digest[offset + 1]) << 16
            | u32::from(digest[offset + 2]) << 8
            | u32::from(digest[offset + 3]))
            & 0x7fff_ffff;

        let wide = format!("{p:0>width$}", width = digits);
        wide[wide.len() - digits..].to_string()
    }

    /// Produces a time-based password for the current moment.
    pub fn totp(&self, time_step: u64, digits: usize) -> String {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.hotp(now / time_step, digits)
    }

    /// The rfc6238 defaults: 30-second step, 6 digits.
    pub fn totp_now(&self) -> String {
        self.totp(30, 6)
    }
}

impl Drop for OtpKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for OtpKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OtpKey({} bytes)", self.key.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc4226_test_vectors() {
        // Appendix D of rfc4226, key "12345678901234567890".
        let key = OtpKey::from_bytes(b"12345678901234567890");
        let expected = [
            "755224", "287082", "359152", "969429", "338314", "254676", "287922", "162583",
            "399871", "520489",
        ];
        for (counter, want) in expected.iter().enumerate() {
            assert_eq!(key.hotp(counter as u64, 6), *want);
        }
    }

    #[test]
    fn rfc6238_time_step_vector() {
        // rfc6238 Appendix B: T = 59 s with a 30-second step is counter 1,
        // and the 8-digit SHA-1 output is 94287082.
        let key = OtpKey::from_bytes(b"12345678901234567890");
        assert_eq!(key.hotp(59 / 30, 8), "94287082");
    }

    #[test]
    fn digits_are_zero_padded() {
        let key = OtpKey::from_bytes(b"12345678901234567890");
        for counter in 0..64 {
            assert_eq!(key.hotp(counter, 6).len(), 6);
            assert_eq!(key.hotp(counter, 8).len(), 8);
        }
    }

    #[test]
    fn base32_round_trip() {
        let key = OtpKey::create_default().unwrap();
        let encoded = key.encode_base32();
        assert_eq!(encoded.len(), 16);
        assert_eq!(OtpKey::decode_base32(&encoded).unwrap(), key);
    }
}
