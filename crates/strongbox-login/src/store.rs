use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use strongbox_core::{fileio, ContextHandle, Error, Result};
use strongbox_crypto::{username_snrp, OtpKey};

use crate::paths::{self, AccountPaths};

/// `OtpKey.json`: the locally stored 2FA secret.
#[derive(Serialize, Deserialize)]
struct OtpFile {
    #[serde(rename = "TOTP")]
    totp: String,
}

struct StoreInner {
    paths: Option<AccountPaths>,
    otp_key: Option<OtpKey>,
}

/// The account state knowable from just the username, before any login.
///
/// The store outlives every `Login` made from it; the cache keeps one store
/// alive per username.
pub struct LoginStore {
    ctx: ContextHandle,
    username: String,
    user_id: [u8; 32],
    inner: Mutex<StoreInner>,
}

impl LoginStore {
    pub fn new(ctx: ContextHandle, username: &str) -> Result<Arc<Self>> {
        let username = Self::fix_username(username)?;
        let user_id = username_snrp(ctx.testnet).hash(username.as_bytes())?;

        // Failure is acceptable: the directory appears on first login.
        let paths = paths::account_dir(&ctx, &username).ok();

        // Load the OTP key, if possible:
        let otp_key = paths.as_ref().and_then(|p| {
            let file: OtpFile = fileio::json_load(&p.otp_key_path()).ok()?;
            OtpKey::decode_base32(&file.totp).ok()
        });

        Ok(Arc::new(LoginStore {
            ctx,
            username,
            user_id,
            inner: Mutex::new(StoreInner { paths, otp_key }),
        }))
    }

    pub fn context(&self) -> &ContextHandle {
        &self.ctx
    }

    /// The normalized username for this account.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The hashed username used to authenticate with the server,
    /// formerly known as L1.
    pub fn user_id(&self) -> &[u8; 32] {
        &self.user_id
    }

    /// The directory structure for this user.
    /// With `create`, allocates the next free account directory on demand.
    pub fn paths(&self, create: bool) -> Result<AccountPaths> {
        let mut inner = self.inner.lock()?;

        if inner.paths.is_none() {
            if !create {
                return Err(Error::FileDoesNotExist("no account directory".into()));
            }
            let fresh = paths::account_dir_new(&self.ctx, &self.username)?;
            inner.paths = Some(fresh);
            Self::otp_key_save(&inner)?;
        }

        Ok(inner.paths.clone().expect("paths set above"))
    }

    /// The OTP key associated with this user, if any.
    pub fn otp_key(&self) -> Option<OtpKey> {
        self.inner.lock().ok()?.otp_key.clone()
    }

    /// Assigns an OTP key to the account and syncs it to disk.
    pub fn otp_key_set(&self, key: OtpKey) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.otp_key = Some(key);
        Self::otp_key_save(&inner)
    }

    /// Removes the OTP key and deletes the file, if any.
    pub fn otp_key_remove(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if let Some(paths) = &inner.paths {
            fileio::file_delete(&paths.otp_key_path())?;
        }
        inner.otp_key = None;
        Ok(())
    }

    /// Writes the OTP key to disk. Caller holds the store mutex.
    fn otp_key_save(inner: &StoreInner) -> Result<()> {
        if let (Some(paths), Some(key)) = (&inner.paths, &inner.otp_key) {
            fileio::json_save(
                &paths.otp_key_path(),
                &OtpFile {
                    totp: key.encode_base32(),
                },
            )?;
        }
        Ok(())
    }

    /// Re-formats a username to all-lowercase, collapsing whitespace and
    /// rejecting characters outside printable ASCII. Idempotent.
    pub fn fix_username(username: &str) -> Result<String> {
        let mut out = String::with_capacity(username.len());

        // Collapse leading & internal spaces:
        let mut space = true;
        for c in username.chars() {
            if c.is_whitespace() {
                if !space {
                    out.push(' ');
                }
                space = true;
            } else {
                out.push(c);
                space = false;
            }
        }
        if out.ends_with(' ') {
            out.pop();
        }

        // Scan for bad characters, and make lowercase:
        out.chars()
            .map(|c| match c {
                ' '..='~' => Ok(c.to_ascii_lowercase()),
                _ => Err(Error::NotSupported("bad username".into())),
            })
            .collect()
    }
}

impl std::fmt::Debug for LoginStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoginStore({})", self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_core::Context;

    #[test]
    fn fix_username_normalizes() {
        assert_eq!(
            LoginStore::fix_username("  Alice  Smith ").unwrap(),
            "alice smith"
        );
        assert_eq!(LoginStore::fix_username("BOB").unwrap(), "bob");
        assert_eq!(LoginStore::fix_username("tab\there").unwrap(), "tab here");
    }

    #[test]
    fn fix_username_is_idempotent() {
        let once = LoginStore::fix_username("  Alice  Smith ").unwrap();
        assert_eq!(LoginStore::fix_username(&once).unwrap(), once);
    }

    #[test]
    fn fix_username_rejects_non_ascii() {
        assert!(LoginStore::fix_username("señor").is_err());
        assert!(LoginStore::fix_username("smile\u{1F600}").is_err());
    }

    #[test]
    fn user_id_depends_on_network() {
        let tmp = tempfile::tempdir().unwrap();

        let mainnet = Arc::new(Context::new(tmp.path(), "key"));
        let mut t = Context::new(tmp.path(), "key");
        t.testnet = true;
        let testnet = Arc::new(t);

        let a = LoginStore::new(mainnet, "alice").unwrap();
        let b = LoginStore::new(testnet, "alice").unwrap();
        assert_ne!(a.user_id(), b.user_id());
    }

    #[test]
    fn paths_create_allocates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = Arc::new(Context::new(tmp.path(), "key"));
        let store = LoginStore::new(ctx, "carol").unwrap();

        assert!(store.paths(false).is_err());
        let paths = store.paths(true).unwrap();
        assert!(paths.user_name_path().exists());

        let text = std::fs::read_to_string(paths.user_name_path()).unwrap();
        assert!(text.contains("\"userName\""));
        assert!(text.contains("carol"));
    }
}
