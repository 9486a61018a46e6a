//! The in-memory state of a logged-in account.

use std::sync::{Arc, Mutex};

use zeroize::Zeroize;

use strongbox_core::constants::{DATA_KEY_LENGTH, KEY_ID_LENGTH, REPO_TYPE_ACCOUNT, SYNC_KEY_LENGTH};
use strongbox_core::{fileio, Error, Result};
use strongbox_crypto::encoding::{base16_encode, base64_decode, base64_encode};
use strongbox_crypto::{hmac_sha256, random_bytes, username_snrp, JsonBox, Snrp};

use crate::auth::AuthJson;
use crate::packages::{CarePackage, LoginPackage};
use crate::paths::AccountPaths;
use crate::server::LoginServer;
use crate::stash::{AccountRepoJson, KeyJson, LoginReplyJson, LoginStash};
use crate::store::LoginStore;

const INFO_KEY_HMAC_KEY: &[u8] = b"infoKey";

/// The decrypted keys for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub data_key: Vec<u8>,
    pub sync_key: Vec<u8>,
}

impl RepoInfo {
    fn from_json(json: &AccountRepoJson) -> Result<Self> {
        Ok(RepoInfo {
            data_key: base64_decode(&json.data_key)?,
            sync_key: base64_decode(&json.sync_key)?,
        })
    }
}

struct LoginInner {
    password_auth: Vec<u8>,
    root_key: Option<Vec<u8>>,
}

impl Drop for LoginInner {
    fn drop(&mut self) {
        self.password_auth.zeroize();
        if let Some(root_key) = &mut self.root_key {
            root_key.zeroize();
        }
    }
}

/// Holds the keys unlocked by a successful credential flow. The store is
/// the parent and outlives this object; the cache owns both.
pub struct Login {
    pub store: Arc<LoginStore>,
    pub paths: AccountPaths,
    data_key: Vec<u8>,
    inner: Mutex<LoginInner>,
}

impl Drop for Login {
    fn drop(&mut self) {
        self.data_key.zeroize();
    }
}

impl Login {
    // ── Construction ──────────────────────────────────────────────────────────

    /// Creates a brand-new account, both on the server and on disk.
    pub fn create_new(store: &Arc<LoginStore>, password: Option<&str>) -> Result<Arc<Self>> {
        let ctx = store.context();
        let server = LoginServer::new(ctx)?;
        let data_key = random_bytes(DATA_KEY_LENGTH)?;

        // Set up care package:
        let mut care = CarePackage::default();
        care.password_key_snrp = Some(Snrp::create(ctx.scrypt_n, ctx.scrypt_r)?);

        // Set up syncKey:
        let sync_key = random_bytes(SYNC_KEY_LENGTH)?;
        let sync_key_box = JsonBox::encrypt(&sync_key, &data_key)?;

        let mut login_pkg = LoginPackage {
            sync_key_box: Some(sync_key_box.clone()),
            ..Default::default()
        };

        // Set up passwordAuth (and the password box, when there is one):
        let password_auth = match password {
            Some(password) => {
                let lp = format!("{}{}", store.username(), password);
                let password_auth = username_snrp(ctx.testnet).hash(lp.as_bytes())?;

                let password_key = care.password_key_snrp()?.hash(lp.as_bytes())?;
                login_pkg.password_box = Some(JsonBox::encrypt(&data_key, &password_key)?);
                password_auth.to_vec()
            }
            None => random_bytes(DATA_KEY_LENGTH)?,
        };
        login_pkg.password_auth_box = Some(JsonBox::encrypt(&password_auth, &data_key)?);

        // Create the account on the server:
        server.account_create(store, &password_auth, &care, &login_pkg, &base16_encode(&sync_key))?;

        // Set up the on-disk login:
        let paths = store.paths(true)?;
        care.save(&paths.care_package_path())?;
        login_pkg.save(&paths.login_package_path())?;

        let login = Arc::new(Login {
            store: Arc::clone(store),
            paths: paths.clone(),
            data_key,
            inner: Mutex::new(LoginInner {
                password_auth,
                root_key: None,
            }),
        });
        login.root_key_upgrade(&server)?;

        // Save the bare minimum needed to re-open the account offline:
        let stash = LoginStash {
            login_id: Some(base64_encode(store.user_id())),
            sync_key_box: Some(sync_key_box),
            ..Default::default()
        };
        stash.save(&paths.stash_path())?;

        // Latch the account:
        server.account_activate(&login)?;

        Ok(login)
    }

    /// Opens the account from the on-disk packages alone.
    pub fn create_offline(store: &Arc<LoginStore>, data_key: &[u8]) -> Result<Arc<Self>> {
        let server = LoginServer::new(store.context())?;
        let paths = store.paths(true)?;

        let login_pkg = LoginPackage::load(&paths.login_package_path())?;
        let password_auth = login_pkg.password_auth_box()?.decrypt(data_key)?;

        let login = Arc::new(Login {
            store: Arc::clone(store),
            paths: paths.clone(),
            data_key: data_key.to_vec(),
            inner: Mutex::new(LoginInner {
                password_auth,
                root_key: None,
            }),
        });

        // Look for an existing rootKeyBox:
        let root_key_box = if fileio::file_exists(&paths.root_key_path()) {
            Some(JsonBox::load(&paths.root_key_path())?)
        } else {
            // Try asking the server:
            let reply = server.login_fetch(&AuthJson::login_set(&login)?)?;
            reply.save(&paths, data_key, store.username())?;
            reply.root_key_box
        };

        match root_key_box {
            Some(root_key_box) => {
                login.inner.lock()?.root_key = Some(root_key_box.decrypt(data_key)?);
            }
            None => login.root_key_upgrade(&server)?,
        }

        Ok(login)
    }

    /// Builds the login from a fresh server reply, saving it to disk.
    pub fn create_online(
        store: &Arc<LoginStore>,
        data_key: &[u8],
        reply: LoginReplyJson,
    ) -> Result<Arc<Self>> {
        let server = LoginServer::new(store.context())?;
        let paths = store.paths(true)?;
        reply.save(&paths, data_key, store.username())?;

        let password_auth = reply
            .password_auth_box
            .as_ref()
            .ok_or_else(|| Error::Json("login reply has no passwordAuthBox".into()))?
            .decrypt(data_key)?;

        let login = Arc::new(Login {
            store: Arc::clone(store),
            paths: paths.clone(),
            data_key: data_key.to_vec(),
            inner: Mutex::new(LoginInner {
                password_auth,
                root_key: None,
            }),
        });

        match &reply.root_key_box {
            Some(root_key_box) => {
                login.inner.lock()?.root_key = Some(root_key_box.decrypt(data_key)?);
            }
            None if fileio::file_exists(&paths.root_key_path()) => {
                return Err(Error::Generic(
                    "the account has a rootKey, but it is missing from the server".into(),
                ));
            }
            None => login.root_key_upgrade(&server)?,
        }

        Ok(login)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// The 32-byte key that unlocks everything in the account.
    /// Never written to disk in cleartext.
    pub fn data_key(&self) -> &[u8] {
        &self.data_key
    }

    pub fn password_auth(&self) -> Result<Vec<u8>> {
        Ok(self.inner.lock()?.password_auth.clone())
    }

    pub fn password_auth_set(&self, password_auth: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.password_auth.zeroize();
        inner.password_auth = password_auth.to_vec();
        Ok(())
    }

    pub fn root_key(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.lock()?.root_key.clone())
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Re-fetches the login from the server and refreshes the on-disk stash.
    /// Server state wins over anything local.
    pub fn update(&self) -> Result<()> {
        let server = LoginServer::new(self.store.context())?;
        let reply = server.login_fetch(&AuthJson::login_set(self)?)?;
        reply.save(&self.paths, &self.data_key, self.store.username())
    }

    /// Finds the keys for a repository of the given type, checking the
    /// on-disk catalog first, then the legacy sync key, then (optionally)
    /// creating a fresh repository.
    pub fn repo_find(&self, repo_type: &str, create: bool) -> Result<RepoInfo> {
        // Search the on-disk array:
        let mut stash = match LoginStash::load(&self.paths.stash_path()) {
            Ok(stash) => stash,
            Err(_) if repo_type == REPO_TYPE_ACCOUNT => LoginStash::default(),
            Err(_) => {
                return Err(Error::FileDoesNotExist(
                    "account is offline and has no key catalog".into(),
                ))
            }
        };

        for key_box in stash.key_boxes() {
            let key_json: KeyJson = key_box.decrypt_json(&self.data_key)?;
            if key_json.key_type == repo_type {
                let repo: AccountRepoJson = serde_json::from_value(key_json.keys)
                    .map_err(|e| Error::Json(format!("bad repo keys: {e}")))?;
                return RepoInfo::from_json(&repo);
            }
        }

        // The account repo predates the catalog; synthesize it from the
        // legacy syncKeyBox when needed:
        if repo_type == REPO_TYPE_ACCOUNT {
            if let Some(sync_key_box) = &stash.sync_key_box {
                let sync_key = sync_key_box.decrypt(&self.data_key)?;
                return Ok(RepoInfo {
                    data_key: self.data_key.clone(),
                    sync_key,
                });
            }
        }

        if !create {
            return Err(Error::AccountDoesNotExist);
        }

        // Make the keys:
        let repo_data_key = random_bytes(DATA_KEY_LENGTH)?;
        let sync_key = random_bytes(SYNC_KEY_LENGTH)?;
        let repo_json = AccountRepoJson {
            sync_key: base64_encode(&sync_key),
            data_key: base64_encode(&repo_data_key),
        };

        // Make the metadata:
        let key_json = KeyJson {
            id: base64_encode(&random_bytes(KEY_ID_LENGTH)?),
            key_type: repo_type.to_owned(),
            keys: serde_json::to_value(&repo_json)?,
        };
        let key_box = JsonBox::encrypt_json(&key_json, &self.data_key)?;

        // Push the repository to the server:
        let server = LoginServer::new(self.store.context())?;
        server.keys_put(AuthJson::login_set(self)?, std::slice::from_ref(&key_box))?;

        // Save to disk:
        stash.key_box_push(key_box);
        stash.save(&self.paths.stash_path())?;

        RepoInfo::from_json(&repo_json)
    }

    /// Gives the account a BIP-39 root key, enabling mnemonic-only recovery.
    /// Idempotent: an account that already has `RootKey.json` is left alone.
    pub fn root_key_upgrade(&self, server: &LoginServer) -> Result<()> {
        if fileio::file_exists(&self.paths.root_key_path()) {
            let root_key_box = JsonBox::load(&self.paths.root_key_path())?;
            self.inner.lock()?.root_key = Some(root_key_box.decrypt(&self.data_key)?);
            return Ok(());
        }

        // Create a BIP-39 mnemonic, and use it to derive the rootKey:
        let entropy = random_bytes(32)?;
        let mnemonic = bip39::Mnemonic::from_entropy(&entropy)
            .map_err(|e| Error::Generic(format!("mnemonic: {e}")))?;
        let seed = mnemonic.to_seed("");
        let root_key = seed[..32].to_vec();

        // Pack the keys into various boxes:
        let root_key_box = JsonBox::encrypt(&root_key, &self.data_key)?;
        let info_key = hmac_sha256(&root_key, INFO_KEY_HMAC_KEY);
        let mnemonic_box = JsonBox::encrypt(mnemonic.to_string().as_bytes(), &info_key)?;
        let data_key_box = JsonBox::encrypt(&self.data_key, &info_key)?;

        // Upgrade the account on the server:
        server.account_upgrade(self, &root_key_box, &mnemonic_box, &data_key_box)?;
        root_key_box.save(&self.paths.root_key_path())?;

        self.inner.lock()?.root_key = Some(root_key);
        Ok(())
    }
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Login({})", self.store.username())
    }
}
