use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default auth-server root. Overridable at construction for test harnesses.
pub const DEFAULT_SERVER_ROOT: &str = "https://auth.strongbox.co/api";

/// Baseline scrypt cost, shared with the server's own parameter set.
pub const SCRYPT_DEFAULT_N: u64 = 16384;
pub const SCRYPT_DEFAULT_R: u32 = 1;

/// Process-wide configuration, fixed at initialization and read-only after.
///
/// Constructed once by the host (see `strongbox_login::initialize`), then
/// shared by reference into every store, login, and account. The scrypt
/// parameters come from the startup calibration run; everything else is a
/// build-time constant or constructor argument. No environment variables.
#[derive(Debug)]
pub struct Context {
    pub root_dir: PathBuf,
    pub api_key: String,
    pub server_root: String,
    pub testnet: bool,
    pub hidden_bits_key: Option<String>,

    /// Calibrated scrypt cost for newly created SNRPs.
    pub scrypt_n: u64,
    /// Calibrated scrypt block size for newly created SNRPs.
    pub scrypt_r: u32,
}

/// Shared handle to the context.
pub type ContextHandle = Arc<Context>;

impl Context {
    pub fn new(root_dir: impl Into<PathBuf>, api_key: &str) -> Self {
        Context {
            root_dir: root_dir.into(),
            api_key: api_key.to_owned(),
            server_root: DEFAULT_SERVER_ROOT.to_owned(),
            testnet: false,
            hidden_bits_key: None,
            scrypt_n: SCRYPT_DEFAULT_N,
            scrypt_r: SCRYPT_DEFAULT_R,
        }
    }

    /// The directory holding all account subdirectories.
    /// Testnet accounts live apart so the same username can exist on both
    /// networks without colliding.
    pub fn accounts_dir(&self) -> PathBuf {
        if self.testnet {
            self.root_dir.join("Accounts-testnet")
        } else {
            self.root_dir.join("Accounts")
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}
