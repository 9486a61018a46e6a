//! The account object: a logged-in user's sync directory and wallet list.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::json;

use strongbox_core::constants::{DATA_KEY_LENGTH, REPO_TYPE_ACCOUNT, SYNC_KEY_LENGTH};
use strongbox_core::{fileio, Result};
use strongbox_crypto::encoding::{base16_encode, base64_encode};
use strongbox_crypto::{random_bytes, random_uuid};
use strongbox_login::server::LoginServer;
use strongbox_login::Login;

use crate::settings;
use crate::sync::SyncRepo;
use crate::wallets::WalletList;

/// Manages the account sync directory. Holds the login alive for as long
/// as the account exists.
pub struct Account {
    pub login: Arc<Login>,
    dir: PathBuf,
    data_key: Vec<u8>,
    sync_key: Vec<u8>,
    pub wallets: WalletList,

    /// The PIN observed when settings were last loaded or saved, used to
    /// detect changes that need a server-side PIN update.
    pub(crate) pin: Mutex<Option<String>>,
}

impl Account {
    pub fn new(login: Arc<Login>) -> Result<Arc<Self>> {
        let repo = login.repo_find(REPO_TYPE_ACCOUNT, true)?;
        let dir = login.paths.sync_dir();
        let wallets = WalletList::new(login.paths.wallets_dir(), &repo.data_key);

        let account = Arc::new(Account {
            login,
            dir,
            data_key: repo.data_key,
            sync_key: repo.sync_key,
            wallets,
            pin: Mutex::new(None),
        });
        account.load()?;
        Ok(account)
    }

    /// The account sync directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The key for everything inside the sync directory.
    pub fn data_key(&self) -> &[u8] {
        &self.data_key
    }

    pub fn sync_key(&self) -> &[u8] {
        &self.sync_key
    }

    /// Syncs the account with the file server and re-reads everything
    /// when the transport brought down changes.
    pub fn sync(&self, repo: &dyn SyncRepo) -> Result<bool> {
        let dirty = repo.pull(&self.dir, &self.sync_key)?;
        repo.push(&self.dir, &self.sync_key)?;
        if dirty {
            self.load()?;
        }
        Ok(dirty)
    }

    fn load(&self) -> Result<()> {
        // If the sync dir doesn't exist, create it:
        fileio::ensure_dir(&self.dir)?;

        // Settings drive the PIN package, so reconcile those first:
        let loaded = settings::settings_load(self)?;
        *self.pin.lock()? = loaded.pin.clone();
        settings::settings_pin_sync(&self.login, &loaded, false)?;

        self.wallets.load()
    }

    /// Creates a new wallet repository: fresh keys, a server-side repo, and
    /// a wallet-list entry. Returns the new wallet id.
    pub fn wallet_create(&self, extra_keys: serde_json::Value) -> Result<String> {
        let id = random_uuid()?;
        let data_key = random_bytes(DATA_KEY_LENGTH)?;
        let sync_key = random_bytes(SYNC_KEY_LENGTH)?;

        let server = LoginServer::new(self.login.store.context())?;
        server.wallet_create(&self.login, &base16_encode(&sync_key))?;

        let mut keys = extra_keys;
        if !keys.is_object() {
            keys = json!({});
        }
        keys["dataKey"] = json!(base64_encode(&data_key));
        keys["syncKey"] = json!(base64_encode(&sync_key));
        self.wallets.insert(&id, &keys)?;

        server.wallet_activate(&self.login, &base16_encode(&sync_key))?;
        Ok(id)
    }

    /// Ships the rotating debug log to the server for a support case.
    pub fn upload_logs(&self) -> Result<()> {
        let server = LoginServer::new(self.login.store.context())?;
        server.debug_upload(Some(&self.login), &[])
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Account({})", self.login.store.username())
    }
}
