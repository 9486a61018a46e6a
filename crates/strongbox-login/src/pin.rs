//! PIN login, v2 (HMAC-keyed) and the legacy v1 double-scrypt chain.
//!
//! v1 survives only long enough to log in once; the cache upgrades such
//! accounts to v2 on the spot and deletes the old package.

use std::sync::Arc;

use serde_json::json;

use strongbox_core::{fileio, Context, Error, Result};
use strongbox_crypto::encoding::{base64_decode, base64_encode};
use strongbox_crypto::{hmac_sha256, random_bytes, username_snrp, JsonBox};

use crate::auth::AuthJson;
use crate::login::Login;
use crate::packages::{pin2_key_load, pin2_key_save, CarePackage, PinPackage};
use crate::paths::{self, AccountPaths};
use crate::server::LoginServer;
use crate::store::LoginStore;

/// How long a v1 PIN package stays fresh. Advisory: the server enforces it.
const PIN_V1_EXPIRE_DAYS: i64 = 60;

// ── PIN v1 (legacy) ──────────────────────────────────────────────────────────

/// Whether the named account still has a v1 PIN package on disk.
pub fn login_pin_exists(ctx: &Context, username: &str) -> Result<bool> {
    let fixed = LoginStore::fix_username(username)?;
    let account = paths::account_dir(ctx, &fixed)?;
    Ok(fileio::file_exists(&account.pin_package_path()))
}

/// Removes the local v1 PIN package.
pub fn login_pin_delete(store: &LoginStore) -> Result<()> {
    if let Ok(paths) = store.paths(false) {
        fileio::file_delete(&paths.pin_package_path())?;
    }
    Ok(())
}

/// v1 PIN login: fetch EPINK from the server, unwrap PINK, unwrap `dataKey`.
pub fn login_pin(store: &Arc<LoginStore>, pin: &str) -> Result<Arc<Login>> {
    let lpin = format!("{}{}", store.username(), pin);
    let paths = store.paths(false)?;

    // Load the packages:
    let care = CarePackage::load(&paths.care_package_path())?;
    let local = PinPackage::load(&paths.pin_package_path())?;
    let pin_auth_id = base64_decode(&local.pin_auth_id)?;

    // Get EPINK from the server:
    let pin_auth_key = username_snrp(store.context().testnet).hash(lpin.as_bytes())?;
    let server = LoginServer::new(store.context())?;
    let epink = server.pin_package_get(&pin_auth_id, &pin_auth_key)?;
    let pin_key_box: JsonBox =
        serde_json::from_str(&epink).map_err(|e| Error::Json(format!("bad EPINK: {e}")))?;

    // Decrypt dataKey:
    let pin_key_key = care.password_key_snrp()?.hash(lpin.as_bytes())?;
    let pin_key = pin_key_box.decrypt(&pin_key_key)?;
    let data_key = local.pin_box.decrypt(&pin_key)?;

    Login::create_offline(store, &data_key)
}

/// v1 PIN setup. Kept for compatibility with servers that still hand out
/// v1 packages; new code should call [`login_pin2_set`].
pub fn login_pin_set(login: &Login, pin: &str) -> Result<()> {
    let ctx = login.store.context();
    let lpin = format!("{}{}", login.store.username(), pin);

    let care = CarePackage::load(&login.paths.care_package_path())?;

    // The two scrypt products: LPIN1 names the package server-side,
    // LPIN2 wraps PINK.
    let pin_auth_key = username_snrp(ctx.testnet).hash(lpin.as_bytes())?;
    let pin_key_key = care.password_key_snrp()?.hash(lpin.as_bytes())?;

    // A fresh PINK wraps the dataKey:
    let pin_key = random_bytes(32)?;
    let pin_box = JsonBox::encrypt(login.data_key(), &pin_key)?;
    let epink = serde_json::to_string(&JsonBox::encrypt(&pin_key, &pin_key_key)?)?;

    let pin_auth_id = random_bytes(32)?;
    let expires = chrono::Utc::now() + chrono::Duration::days(PIN_V1_EXPIRE_DAYS);

    // Server first, disk second:
    let server = LoginServer::new(ctx)?;
    server.pin_package_update(login, &pin_auth_id, &pin_auth_key, &epink, expires)?;

    PinPackage {
        pin_box,
        pin_auth_id: base64_encode(&pin_auth_id),
        expires: expires.timestamp(),
    }
    .save(&login.paths.pin_package_path())
}

// ── PIN v2 ───────────────────────────────────────────────────────────────────

/// Loads the account's `pin2Key` from disk.
pub fn login_pin2_key(paths: &AccountPaths) -> Result<Vec<u8>> {
    pin2_key_load(&paths.pin2_key_path())
}

/// v2 PIN login: the key on disk plus the PIN unlock the server copy of
/// `dataKey`.
pub fn login_pin2(store: &Arc<LoginStore>, pin2_key: &[u8], pin: &str) -> Result<Arc<Login>> {
    let pin2_id = hmac_sha256(store.username().as_bytes(), pin2_key);
    let pin2_auth = hmac_sha256(pin.as_bytes(), pin2_key);

    // Grab the login information from the server:
    let server = LoginServer::new(store.context())?;
    let reply = server.login_fetch(&AuthJson::pin2_set(store, &pin2_id, &pin2_auth))?;

    // Unlock pin2Box:
    let data_key = reply
        .pin2_box
        .as_ref()
        .ok_or_else(|| Error::Json("login reply has no pin2Box".into()))?
        .decrypt(pin2_key)?;

    Login::create_online(store, &data_key, reply)
}

/// Installs or changes the v2 PIN. Returns the `pin2Key`, minting and
/// persisting one on first use.
pub fn login_pin2_set(login: &Login, pin: &str) -> Result<Vec<u8>> {
    let pin2_key = match login_pin2_key(&login.paths) {
        Ok(key) => key,
        Err(_) => {
            let key = random_bytes(32)?;
            pin2_key_save(&login.paths.pin2_key_path(), &key)?;
            key
        }
    };

    // Create pin2Auth:
    let pin2_id = hmac_sha256(login.store.username().as_bytes(), &pin2_key);
    let pin2_auth = hmac_sha256(pin.as_bytes(), &pin2_key);

    // Create pin2Box and pin2KeyBox:
    let pin2_box = JsonBox::encrypt(login.data_key(), &pin2_key)?;
    let pin2_key_box = JsonBox::encrypt(&pin2_key, login.data_key())?;

    // Change the server login:
    let server = LoginServer::new(login.store.context())?;
    server.pin2_put(
        AuthJson::login_set(login)?,
        json!({
            "pin2Id": base64_encode(&pin2_id),
            "pin2Auth": base64_encode(&pin2_auth),
            "pin2Box": pin2_box,
            "pin2KeyBox": pin2_key_box,
        }),
    )?;

    Ok(pin2_key)
}

/// Removes the v2 PIN from the server and forgets the local key.
pub fn login_pin2_delete(login: &Login) -> Result<()> {
    let server = LoginServer::new(login.store.context())?;
    server.pin2_delete(&AuthJson::login_set(login)?)?;

    fileio::file_delete(&login.paths.pin2_key_path())
}
