//! Two-factor management: enabling, disabling, and reset handling.

use std::sync::Arc;

use strongbox_core::{ContextHandle, Result};
use strongbox_crypto::OtpKey;

use crate::login::Login;
use crate::server::LoginServer;
use crate::store::LoginStore;

/// Whether 2FA is enabled server-side, and its reset timeout.
pub fn otp_auth_get(login: &Login) -> Result<(bool, i64)> {
    let server = LoginServer::new(login.store.context())?;
    server.otp_status(login)
}

/// Turns on 2FA, minting a local key if the store has none yet.
pub fn otp_auth_set(login: &Login, timeout: i64) -> Result<()> {
    // Install a key if needed:
    if login.store.otp_key().is_none() {
        login.store.otp_key_set(OtpKey::create_default()?)?;
    }
    let key = login.store.otp_key().expect("key installed above");

    let server = LoginServer::new(login.store.context())?;
    server.otp_enable(login, &key.encode_base32(), timeout)
}

/// Turns off 2FA server-side. The local key stays, which is harmless.
pub fn otp_auth_remove(login: &Login) -> Result<()> {
    let server = LoginServer::new(login.store.context())?;
    server.otp_disable(login)
}

/// Filters `usernames` down to the ones with a pending 2FA reset.
pub fn otp_reset_get(ctx: &ContextHandle, usernames: &[String]) -> Result<Vec<String>> {
    // List the users:
    let mut user_ids = Vec::with_capacity(usernames.len());
    for username in usernames {
        let store = LoginStore::new(ContextHandle::clone(ctx), username)?;
        user_ids.push(store.user_id().to_vec());
    }

    // Make the request:
    let server = LoginServer::new(ctx)?;
    let flags = server.otp_pending(&user_ids)?;

    Ok(usernames
        .iter()
        .zip(flags)
        .filter(|(_, pending)| *pending)
        .map(|(username, _)| username.clone())
        .collect())
}

/// Starts the 2FA reset countdown with a token from an `InvalidOtp` error.
pub fn otp_reset_set(store: &Arc<LoginStore>, token: &str) -> Result<()> {
    let server = LoginServer::new(store.context())?;
    server.otp_reset(store, token)
}

/// Cancels a pending 2FA reset (the legitimate owner noticed).
pub fn otp_reset_remove(login: &Login) -> Result<()> {
    let server = LoginServer::new(login.store.context())?;
    server.otp_reset_cancel(login)
}
