//! Locations of the files inside an account directory, plus the scan logic
//! that maps usernames onto `Account<N>` subdirectories.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use strongbox_core::fileio;
use strongbox_core::{Context, Error, Result};

const ACCOUNT_PREFIX: &str = "Account";

/// `UserName.json`: the only cleartext identity inside an account dir.
#[derive(Serialize, Deserialize)]
struct UserNameJson {
    #[serde(rename = "userName")]
    user_name: String,
}

/// Knows how to calculate paths within one account directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPaths {
    dir: PathBuf,
}

impl AccountPaths {
    pub fn new(dir: PathBuf) -> Self {
        AccountPaths { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Directories:
    pub fn sync_dir(&self) -> PathBuf {
        self.dir.join("sync")
    }
    pub fn wallets_dir(&self) -> PathBuf {
        self.sync_dir().join("Wallets")
    }
    pub fn plugins_dir(&self) -> PathBuf {
        self.sync_dir().join("Plugins")
    }

    // Files:
    pub fn user_name_path(&self) -> PathBuf {
        self.dir.join("UserName.json")
    }
    pub fn care_package_path(&self) -> PathBuf {
        self.dir.join("CarePackage.json")
    }
    pub fn login_package_path(&self) -> PathBuf {
        self.dir.join("LoginPackage.json")
    }
    pub fn pin_package_path(&self) -> PathBuf {
        self.dir.join("PinPackage.json")
    }
    pub fn otp_key_path(&self) -> PathBuf {
        self.dir.join("OtpKey.json")
    }
    pub fn pin2_key_path(&self) -> PathBuf {
        self.dir.join("pin2Key")
    }
    pub fn recovery2_key_path(&self) -> PathBuf {
        self.dir.join("Recovery2Key.json")
    }
    pub fn root_key_path(&self) -> PathBuf {
        self.dir.join("RootKey.json")
    }
    pub fn repos_path(&self) -> PathBuf {
        self.dir.join("Repos.json")
    }
    pub fn stash_path(&self) -> PathBuf {
        self.dir.join("LoginStash.json")
    }
    pub fn settings_path(&self) -> PathBuf {
        self.sync_dir().join("Settings.json")
    }
}

/// Reads the username recorded in one `Account<N>` directory.
fn dir_username(dir: &Path) -> Result<String> {
    let json: UserNameJson = fileio::json_load(&dir.join("UserName.json"))?;
    Ok(json.user_name)
}

/// Locates the account directory for a normalized username.
pub fn account_dir(ctx: &Context, username: &str) -> Result<AccountPaths> {
    let accounts = ctx.accounts_dir();
    let entries = std::fs::read_dir(&accounts)
        .map_err(|e| Error::DirRead(format!("{}: {e}", accounts.display())))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(ACCOUNT_PREFIX) {
            continue;
        }
        match dir_username(&path) {
            Ok(found) if found == username => return Ok(AccountPaths::new(path)),
            _ => continue,
        }
    }

    Err(Error::FileDoesNotExist(format!(
        "no account directory for {username}"
    )))
}

/// Allocates the next unused `Account<N>` directory and stamps it with the
/// username.
pub fn account_dir_new(ctx: &Context, username: &str) -> Result<AccountPaths> {
    let accounts = ctx.accounts_dir();
    fileio::ensure_dir(&accounts)?;

    let mut n = 0u32;
    let dir = loop {
        let candidate = accounts.join(format!("{ACCOUNT_PREFIX}{n}"));
        if !candidate.exists() {
            break candidate;
        }
        n += 1;
    };

    fileio::ensure_dir(&dir)?;
    fileio::json_save(
        &dir.join("UserName.json"),
        &UserNameJson {
            user_name: username.to_owned(),
        },
    )?;
    Ok(AccountPaths::new(dir))
}

/// Lists the usernames of every account directory under the root.
pub fn account_list(ctx: &Context) -> Result<Vec<String>> {
    let accounts = ctx.accounts_dir();
    if !accounts.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(&accounts)
        .map_err(|e| Error::DirRead(format!("{}: {e}", accounts.display())))?;

    let mut out = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && entry.file_name().to_string_lossy().starts_with(ACCOUNT_PREFIX) {
            if let Ok(name) = dir_username(&path) {
                out.push(name);
            }
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_context(dir: &Path) -> Arc<Context> {
        Arc::new(Context::new(dir, "test-api-key"))
    }

    #[test]
    fn allocate_and_find() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path());

        let a = account_dir_new(&ctx, "alice").unwrap();
        let b = account_dir_new(&ctx, "bob").unwrap();
        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().ends_with("Account0"));
        assert!(b.dir().ends_with("Account1"));

        assert_eq!(account_dir(&ctx, "bob").unwrap(), b);
        assert!(account_dir(&ctx, "carol").is_err());
        assert_eq!(account_list(&ctx).unwrap(), vec!["alice", "bob"]);
    }

    #[test]
    fn testnet_accounts_live_apart() {
        let tmp = tempfile::tempdir().unwrap();
        let mainnet = test_context(tmp.path());
        let mut ctx = Context::new(tmp.path(), "test-api-key");
        ctx.testnet = true;
        let testnet = Arc::new(ctx);

        account_dir_new(&mainnet, "alice").unwrap();
        assert!(account_dir(&testnet, "alice").is_err());
    }
}
