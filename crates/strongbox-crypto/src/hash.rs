use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

/// SHA-256 of arbitrary bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// HMAC-SHA-256 over `data` with `key`. Argument order matters: the data
/// formats in this workspace are all defined as `hmac(message, key)`.
pub fn hmac_sha256(data: &[u8], key: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// HMAC-SHA-512 over `data` with `key`.
pub fn hmac_sha512(data: &[u8], key: &[u8]) -> [u8; 64] {
    let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Derives an opaque filename from a secret key and a logical name, so the
/// names of per-wallet and per-plugin files reveal nothing about contents.
pub fn crypto_filename(key: &[u8], name: &str) -> String {
    bs58::encode(hmac_sha256(name.as_bytes(), key)).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_known_answer() {
        assert_eq!(
            crypto_filename(b"Satoshi", "1PeChFbhxDD9NLbU21DfD55aQBC4ZTR3tE"),
            "5vJNMWZ68tsp2HJa1AfMhZpcpU9Wm9ccEw7cTwvARHXh"
        );
    }

    #[test]
    fn sha256_known_answer() {
        // sha256("Satoshi"), also the key for the box fixtures.
        assert_eq!(
            hex::encode(sha256(b"Satoshi")),
            "002688cc350a5333a87fa622eacec626c3d1c0ebf9f3793de3885fa254d7e393"
        );
    }

    #[test]
    fn hmac_argument_order_is_not_symmetric() {
        assert_ne!(hmac_sha256(b"a", b"b"), hmac_sha256(b"b", b"a"));
    }
}
