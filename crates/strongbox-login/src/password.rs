//! Password login and password change.

use std::sync::Arc;

use strongbox_core::{Context, Error, Result};
use strongbox_crypto::{username_snrp, JsonBox, Snrp};

use crate::auth::AuthJson;
use crate::login::Login;
use crate::packages::{CarePackage, LoginPackage};
use crate::paths;
use crate::server::LoginServer;
use crate::store::LoginStore;

/// Offline attempt: stretch the password against the local care package and
/// try to open the password box. A clean failure means "wrong password or
/// no local data", and the caller moves on to the server.
fn login_password_disk(store: &Arc<LoginStore>, password: &str) -> Result<Arc<Login>> {
    let lp = format!("{}{}", store.username(), password);
    let paths = store.paths(false)?;

    // Load the packages:
    let care = CarePackage::load(&paths.care_package_path())?;
    let login_pkg = LoginPackage::load(&paths.login_package_path())?;

    // Make passwordKey (unlocks dataKey):
    let password_key = care.password_key_snrp()?.hash(lp.as_bytes())?;

    // Decrypt dataKey (unlocks the account):
    let data_key = login_pkg.password_box()?.decrypt(&password_key)?;

    Login::create_offline(store, &data_key)
}

/// Online fallback: authenticate with `passwordAuth` and decrypt the boxes
/// out of the server's reply.
fn login_password_server(store: &Arc<LoginStore>, password: &str) -> Result<Arc<Login>> {
    let ctx = store.context();
    let lp = format!("{}{}", store.username(), password);

    // Create passwordAuth:
    let password_auth = username_snrp(ctx.testnet).hash(lp.as_bytes())?;

    // Grab the login information from the server:
    let server = LoginServer::new(ctx)?;
    let reply = server.login_fetch(&AuthJson::password_set(store, &password_auth))?;

    // Unlock passwordBox:
    let password_key_snrp = reply
        .password_key_snrp
        .as_ref()
        .ok_or_else(|| Error::Json("login reply has no passwordKeySnrp".into()))?;
    let password_key = password_key_snrp.hash(lp.as_bytes())?;
    let data_key = reply
        .password_box
        .as_ref()
        .ok_or(Error::BadPassword)?
        .decrypt(&password_key)?;

    Login::create_online(store, &data_key, reply)
}

/// Tries the login offline first, then against the server.
pub fn login_password(store: &Arc<LoginStore>, password: &str) -> Result<Arc<Login>> {
    match login_password_disk(store, password) {
        Ok(login) => Ok(login),
        Err(_) => login_password_server(store, password),
    }
}

/// Changes (or first sets) the account password. The server is updated
/// before the disk so a failure cannot leave the two out of step.
pub fn login_password_set(login: &Login, password: &str) -> Result<()> {
    let ctx = login.store.context();
    let lp = format!("{}{}", login.store.username(), password);

    // Create passwordBox:
    let password_key_snrp = Snrp::create(ctx.scrypt_n, ctx.scrypt_r)?;
    let password_key = password_key_snrp.hash(lp.as_bytes())?;
    let password_box = JsonBox::encrypt(login.data_key(), &password_key)?;

    // Create passwordAuth:
    let password_auth = username_snrp(ctx.testnet).hash(lp.as_bytes())?;
    let password_auth_box = JsonBox::encrypt(&password_auth, login.data_key())?;

    // Change the server login:
    let server = LoginServer::new(ctx)?;
    server.password_put(
        AuthJson::login_set(login)?,
        serde_json::json!({
            "passwordAuth": strongbox_crypto::encoding::base64_encode(&password_auth),
            "passwordAuthSnrp": username_snrp(ctx.testnet),
            "passwordKeySnrp": password_key_snrp,
            "passwordBox": password_box,
            "passwordAuthBox": password_auth_box,
        }),
    )?;

    // Change the in-memory login:
    login.password_auth_set(&password_auth)?;

    // Change the on-disk login:
    let mut care = CarePackage::load(&login.paths.care_package_path()).unwrap_or_default();
    care.password_key_snrp = Some(password_key_snrp);
    care.save(&login.paths.care_package_path())?;

    let mut login_pkg = LoginPackage::load(&login.paths.login_package_path()).unwrap_or_default();
    login_pkg.password_box = Some(password_box);
    login_pkg.password_auth_box = Some(password_auth_box);
    login_pkg.save(&login.paths.login_package_path())?;

    Ok(())
}

/// Verifies a password against the local packages without logging in.
pub fn login_password_ok(login: &Login, password: &str) -> Result<bool> {
    let lp = format!("{}{}", login.store.username(), password);

    let care = CarePackage::load(&login.paths.care_package_path())?;
    let login_pkg = LoginPackage::load(&login.paths.login_package_path())?;

    let password_key = care.password_key_snrp()?.hash(lp.as_bytes())?;
    Ok(login_pkg.password_box()?.decrypt(&password_key).is_ok())
}

/// Whether the named account has a password configured on disk.
pub fn login_password_exists(ctx: &Context, username: &str) -> Result<bool> {
    let fixed = LoginStore::fix_username(username)?;
    let account = paths::account_dir(ctx, &fixed)?;

    let login_pkg = LoginPackage::load(&account.login_package_path())?;
    Ok(login_pkg.password_box.is_some())
}
