pub mod encoding;
pub mod hash;
pub mod jsonbox;
pub mod otp;
pub mod random;
pub mod snrp;

pub use hash::{crypto_filename, hmac_sha256, hmac_sha512, sha256};
pub use jsonbox::JsonBox;
pub use otp::OtpKey;
pub use random::{random_bytes, random_uuid, seed_rng};
pub use snrp::{username_snrp, Snrp};
