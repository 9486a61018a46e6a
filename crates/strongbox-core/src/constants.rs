/// Length of every account-level symmetric key (`dataKey`, `pin2Key`, …).
pub const DATA_KEY_LENGTH: usize = 32;

/// Length of a repository sync key.
pub const SYNC_KEY_LENGTH: usize = 20;

/// Length of the random id inside a repository key box.
pub const KEY_ID_LENGTH: usize = 32;

/// Repository type owned by the account itself (as opposed to a wallet or
/// plugin). The legacy `syncKeyBox` is folded into this type on demand.
pub const REPO_TYPE_ACCOUNT: &str = "account:repo:co.airbitz.wallet";

/// Default OTP key size in bytes (base32-encodes to 16 characters).
pub const OTP_KEY_LENGTH: usize = 10;

/// HTTP connect timeout for auth-server requests.
pub const CONNECT_TIMEOUT_SECONDS: u64 = 10;
