//! The process-global login cache.
//!
//! One user at a time: the cache pins the current store, login, and account
//! so host callers can run account operations without re-authenticating.
//! Reference counting keeps objects alive for any thread still using them
//! after a cache swap; the mutex only guards the slots themselves.

use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use strongbox_core::{ContextHandle, Error, Result};
use strongbox_login::pin::{login_pin, login_pin2, login_pin2_key, login_pin2_set, login_pin_delete};
use strongbox_login::password::login_password;
use strongbox_login::recovery::login_recovery;
use strongbox_login::recovery2::login_recovery2;
use strongbox_login::{Login, LoginStore};

use crate::account::Account;

#[derive(Default)]
struct Cache {
    store: Option<Arc<LoginStore>>,
    login: Option<Arc<Login>>,
    account: Option<Arc<Account>>,
}

static CACHE: Lazy<Mutex<Cache>> = Lazy::new(|| Mutex::new(Cache::default()));

fn lock() -> Result<std::sync::MutexGuard<'static, Cache>> {
    CACHE.lock().map_err(|_| Error::Mutex)
}

/// Clears the cached login. Everything downstream of the store dies with it.
pub fn cache_logout() -> Result<()> {
    let mut cache = lock()?;
    *cache = Cache::default();
    Ok(())
}

/// Returns the store for `username`, evicting any other user's state first.
pub fn cache_login_store(ctx: &ContextHandle, username: &str) -> Result<Arc<LoginStore>> {
    let mut cache = lock()?;

    // Clear the cache if the username has changed:
    if let Some(store) = &cache.store {
        let fixed = LoginStore::fix_username(username)?;
        if store.username() != fixed {
            *cache = Cache::default();
        }
    }

    // Load the new store, if necessary:
    if cache.store.is_none() {
        cache.store = Some(LoginStore::new(ContextHandle::clone(ctx), username)?);
    }

    Ok(Arc::clone(cache.store.as_ref().expect("store set above")))
}

/// Runs one credential flow under the cache lock, reusing a cached login.
fn cache_login_with<F>(ctx: &ContextHandle, username: &str, flow: F) -> Result<Arc<Login>>
where
    F: FnOnce(&Arc<LoginStore>) -> Result<Arc<Login>>,
{
    let store = cache_login_store(ctx, username)?;

    let mut cache = lock()?;
    if cache.login.is_none() {
        cache.login = Some(flow(&store)?);
    }
    Ok(Arc::clone(cache.login.as_ref().expect("login set above")))
}

/// Creates a brand-new account and caches its login.
pub fn cache_login_new(
    ctx: &ContextHandle,
    username: &str,
    password: Option<&str>,
) -> Result<Arc<Login>> {
    cache_login_with(ctx, username, |store| Login::create_new(store, password))
}

pub fn cache_login_password(
    ctx: &ContextHandle,
    username: &str,
    password: &str,
) -> Result<Arc<Login>> {
    cache_login_with(ctx, username, |store| login_password(store, password))
}

pub fn cache_login_recovery(
    ctx: &ContextHandle,
    username: &str,
    answers: &str,
) -> Result<Arc<Login>> {
    cache_login_with(ctx, username, |store| login_recovery(store, answers))
}

pub fn cache_login_recovery2(
    ctx: &ContextHandle,
    username: &str,
    recovery2_key: &[u8],
    answers: &[String],
) -> Result<Arc<Login>> {
    cache_login_with(ctx, username, |store| {
        login_recovery2(store, recovery2_key, answers)
    })
}

/// PIN login. Prefers v2; a v1 success upgrades the account to v2 on the
/// spot and deletes the old package.
pub fn cache_login_pin(ctx: &ContextHandle, username: &str, pin: &str) -> Result<Arc<Login>> {
    cache_login_with(ctx, username, |store| {
        let paths = store.paths(false)?;
        match login_pin2_key(&paths) {
            Ok(pin2_key) => {
                // Always use PIN login v2 if we have it:
                login_pin2(store, &pin2_key, pin)
            }
            Err(_) => {
                // Otherwise try PIN login v1:
                let login = login_pin(store, pin)?;

                // Upgrade to PIN login v2:
                login.update()?;
                login_pin2_set(&login, pin)?;
                login_pin_delete(store)?;
                Ok(login)
            }
        }
    })
}

/// The account over the cached login, building it on first use.
pub fn cache_account(ctx: &ContextHandle, username: &str) -> Result<Arc<Account>> {
    let _store = cache_login_store(ctx, username)?;

    let mut cache = lock()?;
    let login = cache
        .login
        .as_ref()
        .ok_or_else(|| Error::NullPointer("no cached login".into()))?;

    if cache.account.is_none() {
        cache.account = Some(Account::new(Arc::clone(login))?);
    }
    Ok(Arc::clone(cache.account.as_ref().expect("account set above")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_core::Context;

    // One test only: the cache is process-global, and parallel tests would
    // race on it.
    #[test]
    fn cache_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx: ContextHandle = Arc::new(Context::new(tmp.path(), "key"));

        // Same username (after normalization) reuses the store:
        let a1 = cache_login_store(&ctx, "alice").unwrap();
        let a2 = cache_login_store(&ctx, " ALICE ").unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));

        // A different username evicts it:
        let b = cache_login_store(&ctx, "bob").unwrap();
        assert_eq!(b.username(), "bob");
        assert!(!Arc::ptr_eq(&a1, &b));

        // No login, no account:
        assert!(cache_account(&ctx, "bob").is_err());

        cache_logout().unwrap();
    }
}
