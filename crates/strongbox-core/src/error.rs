use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // ── General ──────────────────────────────────────────────────────────────
    #[error("{0}")]
    Generic(String),

    #[error("unexpected null value: {0}")]
    NullPointer(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    // ── Filesystem ───────────────────────────────────────────────────────────
    #[error("file does not exist: {0}")]
    FileDoesNotExist(String),

    #[error("error reading file: {0}")]
    FileRead(String),

    #[error("error opening file: {0}")]
    FileOpen(String),

    #[error("system error: {0}")]
    Sys(String),

    #[error("error reading directory: {0}")]
    DirRead(String),

    // ── Cryptography ─────────────────────────────────────────────────────────
    #[error("decryption error: {0}")]
    Decrypt(String),

    /// The ciphertext integrity check failed. Callers use this specific
    /// error to detect a wrong key, so it must not be merged with `Decrypt`.
    #[error("decrypted data failed its integrity check")]
    DecryptFailure,

    #[error("encryption error: {0}")]
    Encrypt(String),

    #[error("unknown encryption type {0}")]
    UnknownCryptoType(i64),

    #[error("invalid encryption type")]
    InvalidCryptoType,

    #[error("scrypt error: {0}")]
    Scrypt(String),

    // ── Network & server ─────────────────────────────────────────────────────
    #[error("server error: {0}")]
    Server(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("account already exists on server")]
    AccountAlreadyExists,

    #[error("account does not exist")]
    AccountDoesNotExist,

    #[error("invalid password")]
    BadPassword,

    /// Invalid password or PIN, with a server-imposed lockout window.
    #[error("invalid credentials; retry in {0} seconds")]
    InvalidPinWait(u32),

    /// The server wants a 2FA token. The reset token and timeout date let the
    /// caller offer a "request 2FA reset" path.
    #[error("invalid OTP")]
    InvalidOtp {
        reset_token: String,
        reset_date: String,
    },

    #[error("this client version is obsolete; please upgrade")]
    Obsolete,

    #[error("account has no recovery questions")]
    NoRecoveryQuestions,

    // ── Account state ────────────────────────────────────────────────────────
    #[error("no such wallet: {0}")]
    InvalidWalletId(String),

    #[error("the PIN login package has expired")]
    PinExpired,

    #[error("the library has already been initialized")]
    Reinitialization,

    #[error("the library has not been initialized")]
    NotInitialized,

    #[error("mutex poisoned")]
    Mutex,
}

impl Error {
    /// Wraps an I/O failure as the matching filesystem error kind.
    pub fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        let what = format!("{}: {}", path.display(), err);
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::FileDoesNotExist(what),
            std::io::ErrorKind::PermissionDenied => Error::FileOpen(what),
            _ => Error::FileRead(what),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::Mutex
    }
}
