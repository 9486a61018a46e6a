//! The list of wallets stored under the account sync directory.
//!
//! Uses a write-through caching scheme: changes go straight to disk, but
//! queries come out of RAM. A wallet file's name is an HMAC of its id, so
//! the directory listing reveals nothing; discovery works by decrypting
//! every `.json` file and reading the id back out of the plaintext.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{json, Value};

use strongbox_core::{fileio, Error, Result};
use strongbox_crypto::{crypto_filename, JsonBox};

const SORT_FIELD: &str = "SortIndex";
const ARCHIVED_FIELD: &str = "Archived";
const ID_FIELD: &str = "id";

/// One row of the wallets screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletItem {
    pub id: String,
    pub archived: bool,
}

pub struct WalletList {
    dir: PathBuf,
    data_key: Vec<u8>,
    wallets: Mutex<BTreeMap<String, Value>>,
}

impl WalletList {
    pub fn new(dir: PathBuf, data_key: &[u8]) -> Self {
        WalletList {
            dir,
            data_key: data_key.to_vec(),
            wallets: Mutex::new(BTreeMap::new()),
        }
    }

    /// Loads the wallets off disk. Call after logging in and after a dirty
    /// sync. Files that fail to decrypt are skipped, not fatal: the sync
    /// directory may hold foreign data.
    pub fn load(&self) -> Result<()> {
        let mut wallets = self.wallets.lock()?;
        wallets.clear();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(()), // No directory, so no wallets.
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let Ok(boxed) = JsonBox::load(&path) else {
                continue;
            };
            let Ok(value) = boxed.decrypt_json::<Value>(&self.data_key) else {
                continue;
            };
            let Some(id) = value.get(ID_FIELD).and_then(Value::as_str) else {
                continue;
            };
            wallets.insert(id.to_owned(), value);
        }
        Ok(())
    }

    /// A sorted list of wallets: ascending `SortIndex`, ties broken by id.
    pub fn list(&self) -> Result<Vec<WalletItem>> {
        let wallets = self.wallets.lock()?;

        let mut out: Vec<(i64, WalletItem)> = wallets
            .iter()
            .map(|(id, value)| {
                let sort = value.get(SORT_FIELD).and_then(Value::as_i64).unwrap_or(0);
                let archived = value
                    .get(ARCHIVED_FIELD)
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                (
                    sort,
                    WalletItem {
                        id: id.clone(),
                        archived,
                    },
                )
            })
            .collect();
        out.sort_by_key(|(sort, item)| (*sort, item.id.clone()));
        Ok(out.into_iter().map(|(_, item)| item).collect())
    }

    /// The decrypted meta-data file for a wallet (keys and seeds live here).
    pub fn json(&self, id: &str) -> Result<Value> {
        let wallets = self.wallets.lock()?;
        wallets
            .get(id)
            .cloned()
            .ok_or_else(|| Error::InvalidWalletId(id.to_owned()))
    }

    /// Adds a new wallet to the account. The new wallet sorts last and
    /// starts un-archived.
    pub fn insert(&self, id: &str, keys: &Value) -> Result<()> {
        let mut wallets = self.wallets.lock()?;

        let mut value = keys.clone();
        if !value.is_object() {
            value = json!({});
        }
        value[ID_FIELD] = json!(id);
        value[SORT_FIELD] = json!(wallets.len());
        value[ARCHIVED_FIELD] = json!(false);

        fileio::ensure_dir(&self.dir)?;
        self.save_one(id, &value)?;
        wallets.insert(id.to_owned(), value);
        Ok(())
    }

    /// Adjusts the sort index of one wallet, touching only its own file.
    pub fn reorder(&self, id: &str, index: i64) -> Result<()> {
        let mut wallets = self.wallets.lock()?;
        let value = wallets
            .get_mut(id)
            .ok_or_else(|| Error::InvalidWalletId(id.to_owned()))?;

        value[SORT_FIELD] = json!(index);
        let value = value.clone();
        self.save_one(id, &value)
    }

    /// Adjusts the archived flag of one wallet.
    pub fn archive(&self, id: &str, archived: bool) -> Result<()> {
        let mut wallets = self.wallets.lock()?;
        let value = wallets
            .get_mut(id)
            .ok_or_else(|| Error::InvalidWalletId(id.to_owned()))?;

        value[ARCHIVED_FIELD] = json!(archived);
        let value = value.clone();
        self.save_one(id, &value)
    }

    pub fn archived(&self, id: &str) -> Result<bool> {
        let wallets = self.wallets.lock()?;
        let value = wallets
            .get(id)
            .ok_or_else(|| Error::InvalidWalletId(id.to_owned()))?;
        Ok(value
            .get(ARCHIVED_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Drops a wallet from the list and deletes its file.
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut wallets = self.wallets.lock()?;
        if wallets.remove(id).is_none() {
            return Err(Error::InvalidWalletId(id.to_owned()));
        }
        fileio::file_delete(&self.path(id))
    }

    fn save_one(&self, id: &str, value: &Value) -> Result<()> {
        JsonBox::encrypt_json(value, &self.data_key)?.save(&self.path(id))
    }

    /// The file holding one wallet, named so it reveals nothing.
    fn path(&self, id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", crypto_filename(&self.data_key, id)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_list() -> (tempfile::TempDir, WalletList) {
        let tmp = tempfile::tempdir().unwrap();
        let list = WalletList::new(tmp.path().join("Wallets"), &[0x11; 32]);
        (tmp, list)
    }

    #[test]
    fn insert_orders_by_arrival() {
        let (_tmp, list) = test_list();
        list.insert("w1", &json!({"syncKey": "aa"})).unwrap();
        list.insert("w2", &json!({"syncKey": "bb"})).unwrap();

        let ids: Vec<String> = list.list().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["w1", "w2"]);
    }

    #[test]
    fn reorder_touches_one_file_and_moves_the_wallet() {
        let (_tmp, list) = test_list();
        list.insert("w1", &json!({})).unwrap();
        list.insert("w2", &json!({})).unwrap();
        list.reorder("w1", 5).unwrap();

        let ids: Vec<String> = list.list().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["w2", "w1"]);
    }

    #[test]
    fn list_survives_a_reload() {
        let (_tmp, list) = test_list();
        list.insert("w1", &json!({"extra": 1})).unwrap();
        list.insert("w2", &json!({})).unwrap();
        list.archive("w1", true).unwrap();

        // A second list over the same directory sees the same state:
        let reloaded = WalletList::new(list.dir().to_path_buf(), &[0x11; 32]);
        reloaded.load().unwrap();
        let items = reloaded.list().unwrap();
        assert_eq!(items.len(), 2);
        assert!(reloaded.archived("w1").unwrap());
        assert_eq!(reloaded.json("w1").unwrap()["extra"], 1);
    }

    #[test]
    fn filenames_hide_the_wallet_id() {
        let (_tmp, list) = test_list();
        list.insert("w1", &json!({})).unwrap();

        let names: Vec<String> = std::fs::read_dir(list.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(!names[0].contains("w1"));
    }

    #[test]
    fn wrong_key_files_are_skipped() {
        let (_tmp, list) = test_list();
        list.insert("w1", &json!({})).unwrap();

        let foreign = WalletList::new(list.dir().to_path_buf(), &[0x99; 32]);
        foreign.load().unwrap();
        assert!(foreign.list().unwrap().is_empty());
    }

    #[test]
    fn unknown_ids_error() {
        let (_tmp, list) = test_list();
        assert!(matches!(
            list.reorder("ghost", 1),
            Err(Error::InvalidWalletId(_))
        ));
    }
}
