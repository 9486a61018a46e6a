//! Serialised scrypt parameter sets ("SNRP"s) and the startup calibration.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use strongbox_core::context::{SCRYPT_DEFAULT_N, SCRYPT_DEFAULT_R};
use strongbox_core::{Error, Result};

use crate::encoding::{base16_decode, base16_encode};
use crate::random::random_bytes;

/// Hard ceiling on the calibrated cost parameter.
const SCRYPT_MAX_CLIENT_N: u64 = 1 << 17;

/// Calibration target in microseconds (~500 ms per stretch).
const SCRYPT_TARGET_MICROS: u128 = 500_000;

const SALT_LENGTH: usize = 32;

/// The fixed server-side salt. Every client shares it, so `userId` and
/// `passwordAuth` are stable across devices. Do not change: the server
/// indexes accounts by the products of this salt.
const SERVER_SALT: [u8; 32] = [
    0xb5, 0x86, 0x5f, 0xfb, 0x9f, 0xa7, 0xb3, 0xbf, 0xe4, 0xb2, 0x38, 0x4d, 0x47, 0xce, 0x83,
    0x1e, 0xe2, 0x2a, 0x4a, 0x9d, 0x5c, 0x34, 0xc7, 0xef, 0x7d, 0x21, 0x46, 0x7c, 0xc7, 0x58,
    0xf8, 0x1b,
];

/// Testnet variant, distinct so the same username yields a different userId
/// on each network.
const SERVER_SALT_TESTNET: [u8; 32] = [
    0xa5, 0x96, 0x3f, 0x3b, 0x9c, 0xa6, 0xb3, 0xbf, 0xe4, 0xb2, 0x36, 0x42, 0x37, 0xfe, 0x87,
    0x1e, 0xf2, 0x2a, 0x4a, 0x9d, 0x4c, 0x34, 0xa7, 0xef, 0x3d, 0x21, 0x47, 0x8c, 0xc7, 0x58,
    0xf8, 0x1b,
];

/// A scrypt parameter set: salt plus the `N`, `r`, `p` cost factors.
///
/// The JSON form is the on-disk and wire format:
/// `{"salt_hex": "...", "n": 16384, "r": 1, "p": 1}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snrp {
    pub salt: Vec<u8>,
    pub n: u64,
    pub r: u32,
    pub p: u32,
}

#[derive(Serialize, Deserialize)]
struct SnrpJson {
    salt_hex: String,
    n: u64,
    r: u32,
    p: u32,
}

impl serde::Serialize for Snrp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SnrpJson {
            salt_hex: base16_encode(&self.salt),
            n: self.n,
            r: self.r,
            p: self.p,
        }
        .serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Snrp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;
        let json = SnrpJson::deserialize(deserializer)?;
        let salt = base16_decode(&json.salt_hex).map_err(D::Error::custom)?;
        if salt.is_empty() {
            return Err(D::Error::custom("bad SNRP: empty salt"));
        }
        if json.n == 0 || json.r == 0 || json.p == 0 {
            return Err(D::Error::custom("bad SNRP: zero parameter"));
        }
        Ok(Snrp {
            salt,
            n: json.n,
            r: json.r,
            p: json.p,
        })
    }
}

impl Snrp {
    /// Creates a fresh per-account SNRP with a random salt and the
    /// calibrated cost parameters.
    pub fn create(scrypt_n: u64, scrypt_r: u32) -> Result<Self> {
        Ok(Snrp {
            salt: random_bytes(SALT_LENGTH)?,
            n: scrypt_n,
            r: scrypt_r,
            p: 1,
        })
    }

    /// Stretches a secret to a 32-byte key.
    pub fn hash(&self, secret: &[u8]) -> Result<[u8; 32]> {
        scrypt_hash(secret, &self.salt, self.n, self.r, self.p)
    }

}

/// The fixed SNRP shared by every client, used for `userId`, `passwordAuth`,
/// and the other server-visible authenticators.
pub fn username_snrp(testnet: bool) -> Snrp {
    let salt = if testnet {
        SERVER_SALT_TESTNET
    } else {
        SERVER_SALT
    };
    Snrp {
        salt: salt.to_vec(),
        n: SCRYPT_DEFAULT_N,
        r: SCRYPT_DEFAULT_R,
        p: 1,
    }
}

fn scrypt_hash(secret: &[u8], salt: &[u8], n: u64, r: u32, p: u32) -> Result<[u8; 32]> {
    if n < 2 || !n.is_power_of_two() {
        return Err(Error::Scrypt(format!("N must be a power of two, got {n}")));
    }
    let log_n = n.trailing_zeros() as u8;
    let params = scrypt::Params::new(log_n, r, p, 32)
        .map_err(|e| Error::Scrypt(format!("bad parameters: {e}")))?;

    let mut out = [0u8; 32];
    scrypt::scrypt(secret, salt, &params, &mut out)
        .map_err(|e| Error::Scrypt(format!("stretch failed: {e}")))?;
    Ok(out)
}

/// Benchmarks one baseline stretch and scales `(n, r)` toward the 500 ms
/// target: slow devices keep the defaults, medium devices raise `r` up to 8,
/// fast devices then double `n` up to 2^17.
pub fn calibrate() -> (u64, u32) {
    let mut n = SCRYPT_DEFAULT_N;
    let mut r = SCRYPT_DEFAULT_R;

    let started = Instant::now();
    let timing =
        scrypt_hash(&SERVER_SALT, &SERVER_SALT, SCRYPT_DEFAULT_N, SCRYPT_DEFAULT_R, 1);
    let elapsed = started.elapsed().as_micros();

    if timing.is_err() {
        return (n, r);
    }

    if elapsed >= SCRYPT_TARGET_MICROS || elapsed == 0 {
        // Slow device: the defaults are already the floor.
    } else if elapsed >= SCRYPT_TARGET_MICROS / 8 {
        r = (SCRYPT_TARGET_MICROS / elapsed) as u32;
    } else {
        r = 8;
        let doublings = (SCRYPT_TARGET_MICROS / 8 / elapsed) as u32;
        // 16384 << 3 already hits the 2^17 ceiling.
        n <<= doublings.saturating_sub(1).min(3);
        if n > SCRYPT_MAX_CLIENT_N {
            n = SCRYPT_MAX_CLIENT_N;
        }
    }

    tracing::debug!(elapsed_us = elapsed as u64, n, r, "scrypt calibration");
    (n, r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let snrp = Snrp {
            salt: vec![0xab; 32],
            n: 1024,
            r: 2,
            p: 1,
        };
        let text = serde_json::to_string(&snrp).unwrap();
        assert!(text.contains("\"salt_hex\""));
        let back: Snrp = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snrp);
    }

    #[test]
    fn json_rejects_bad_parameters() {
        let bad = serde_json::json!({"salt_hex": "", "n": 1024, "r": 1, "p": 1});
        assert!(serde_json::from_value::<Snrp>(bad).is_err());

        let bad = serde_json::json!({"salt_hex": "aa", "n": 0, "r": 1, "p": 1});
        assert!(serde_json::from_value::<Snrp>(bad).is_err());
    }

    #[test]
    fn hash_is_deterministic() {
        let snrp = Snrp {
            salt: vec![1; 32],
            n: 1024,
            r: 1,
            p: 1,
        };
        assert_eq!(snrp.hash(b"secret").unwrap(), snrp.hash(b"secret").unwrap());
        assert_ne!(snrp.hash(b"secret").unwrap(), snrp.hash(b"other").unwrap());
    }

    #[test]
    fn hash_rejects_non_power_of_two() {
        let snrp = Snrp {
            salt: vec![1; 32],
            n: 1000,
            r: 1,
            p: 1,
        };
        assert!(snrp.hash(b"secret").is_err());
    }

    #[test]
    fn mainnet_and_testnet_salts_differ() {
        assert_ne!(username_snrp(false), username_snrp(true));
    }
}
