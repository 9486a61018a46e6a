//! Credential handling and login state machines.
//!
//! A [`LoginStore`] is everything knowable about an account from the
//! username alone; a [`Login`] is the unlocked state after a credential
//! flow succeeds. Flows live in their own modules (`password`, `pin`,
//! `recovery`, `recovery2`, `sharing`) and all converge on the same
//! `Login` construction paths.

pub mod auth;
pub mod login;
pub mod otp;
pub mod packages;
pub mod password;
pub mod paths;
pub mod pin;
pub mod recovery;
pub mod recovery2;
pub mod server;
pub mod sharing;
pub mod stash;
pub mod store;

use std::sync::Arc;

use strongbox_core::{Context, ContextHandle, Result};

pub use login::{Login, RepoInfo};
pub use paths::AccountPaths;
pub use store::LoginStore;

/// One-time process setup: calibrates scrypt against this machine, seeds the
/// process RNG, and opens the rotating debug log. Returns the context handle
/// that every store and login hangs off.
pub fn initialize(mut context: Context, extra_entropy: &[u8]) -> Result<ContextHandle> {
    strongbox_core::fileio::ensure_dir(&context.root_dir)?;
    strongbox_crypto::seed_rng(&context.root_dir, extra_entropy)?;
    if let Err(err) = strongbox_core::debuglog::debug_log_init(&context.root_dir) {
        tracing::warn!("debug log unavailable: {err}");
    }

    let (n, r) = strongbox_crypto::snrp::calibrate();
    context.scrypt_n = n;
    context.scrypt_r = r;

    Ok(Arc::new(context))
}
