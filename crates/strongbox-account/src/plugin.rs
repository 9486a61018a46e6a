//! Per-plugin key/value storage under the account sync directory.
//!
//! Both the plugin directory and each key file are named by HMAC, so a
//! directory listing reveals neither plugin names nor keys.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use strongbox_core::{fileio, Error, Result};
use strongbox_crypto::{crypto_filename, JsonBox};

use crate::account::Account;

#[derive(Serialize, Deserialize)]
struct PluginDataFile {
    key: String,
    data: String,
}

fn plugin_directory(account: &Account, plugin: &str) -> PathBuf {
    account
        .login
        .paths
        .plugins_dir()
        .join(crypto_filename(account.data_key(), plugin))
}

fn key_filename(account: &Account, plugin: &str, key: &str) -> PathBuf {
    plugin_directory(account, plugin)
        .join(format!("{}.json", crypto_filename(account.data_key(), key)))
}

pub fn plugin_data_get(account: &Account, plugin: &str, key: &str) -> Result<String> {
    let boxed = JsonBox::load(&key_filename(account, plugin, key))?;
    let file: PluginDataFile = boxed.decrypt_json(account.data_key())?;

    if file.key != key {
        return Err(Error::Json("plugin filename does not match contents".into()));
    }
    Ok(file.data)
}

pub fn plugin_data_set(account: &Account, plugin: &str, key: &str, data: &str) -> Result<()> {
    fileio::ensure_dir(&plugin_directory(account, plugin))?;

    let file = PluginDataFile {
        key: key.to_owned(),
        data: data.to_owned(),
    };
    JsonBox::encrypt_json(&file, account.data_key())?.save(&key_filename(account, plugin, key))
}

pub fn plugin_data_remove(account: &Account, plugin: &str, key: &str) -> Result<()> {
    fileio::file_delete(&key_filename(account, plugin, key))
}

pub fn plugin_data_clear(account: &Account, plugin: &str) -> Result<()> {
    fileio::file_delete(&plugin_directory(account, plugin))
}
