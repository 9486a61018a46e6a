//! The v2 login reply and its on-disk mirror, `LoginStash.json`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use strongbox_core::{fileio, Error, Result};
use strongbox_crypto::encoding::base58_encode;
use strongbox_crypto::{JsonBox, Snrp};

use crate::packages::{pin2_key_save, recovery2_key_save, CarePackage, LoginPackage};
use crate::paths::AccountPaths;

/// One entry in the account's repository key catalog, as decrypted from a
/// key box. Each wallet or plugin repo is one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyJson {
    /// Random 32 bytes, base64. Names the repo server-side.
    pub id: String,
    /// e.g. `account:repo:co.airbitz.wallet`.
    #[serde(rename = "type")]
    pub key_type: String,
    /// The repo keys themselves; shape depends on the type.
    pub keys: serde_json::Value,
}

/// Keys for an account or wallet repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRepoJson {
    /// base64-encoded 20-byte sync key.
    #[serde(rename = "syncKey")]
    pub sync_key: String,
    /// base64-encoded 32-byte data key.
    #[serde(rename = "dataKey")]
    pub data_key: String,
}

/// Login information returned by `GET /v2/login`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginReplyJson {
    // Identity:
    #[serde(rename = "appId", default)]
    pub app_id: Option<String>,
    #[serde(rename = "loginId", default)]
    pub login_id: Option<String>,
    #[serde(rename = "loginAuthBox", default)]
    pub login_auth_box: Option<JsonBox>,

    // Password:
    #[serde(rename = "passwordAuthBox", default)]
    pub password_auth_box: Option<JsonBox>,
    #[serde(rename = "passwordBox", default)]
    pub password_box: Option<JsonBox>,
    #[serde(rename = "passwordKeySnrp", default)]
    pub password_key_snrp: Option<Snrp>,

    // PIN v2:
    #[serde(rename = "pin2Box", default)]
    pub pin2_box: Option<JsonBox>,
    #[serde(rename = "pin2KeyBox", default)]
    pub pin2_key_box: Option<JsonBox>,

    // Recovery v1:
    #[serde(rename = "questionBox", default)]
    pub question_box: Option<JsonBox>,
    #[serde(rename = "questionKeySnrp", default)]
    pub question_key_snrp: Option<Snrp>,
    #[serde(rename = "recoveryBox", default)]
    pub recovery_box: Option<JsonBox>,
    #[serde(rename = "recoveryKeySnrp", default)]
    pub recovery_key_snrp: Option<Snrp>,

    // Recovery v2:
    #[serde(rename = "question2Box", default)]
    pub question2_box: Option<JsonBox>,
    #[serde(rename = "recovery2Box", default)]
    pub recovery2_box: Option<JsonBox>,
    #[serde(rename = "recovery2KeyBox", default)]
    pub recovery2_key_box: Option<JsonBox>,

    // Keys:
    #[serde(rename = "mnemonicBox", default)]
    pub mnemonic_box: Option<JsonBox>,
    #[serde(rename = "rootKeyBox", default)]
    pub root_key_box: Option<JsonBox>,
    #[serde(rename = "syncKeyBox", default)]
    pub sync_key_box: Option<JsonBox>,
    #[serde(rename = "keyBoxes", default)]
    pub key_boxes: Option<Vec<JsonBox>>,
}

/// Login information saved to disk (the v2 format). The legacy
/// CarePackage/LoginPackage files are written alongside it so older readers
/// keep working.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginStash {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub username: Option<String>,

    #[serde(rename = "loginId", skip_serializing_if = "Option::is_none", default)]
    pub login_id: Option<String>,

    #[serde(rename = "passwordBox", skip_serializing_if = "Option::is_none", default)]
    pub password_box: Option<JsonBox>,
    #[serde(rename = "passwordKeySnrp", skip_serializing_if = "Option::is_none", default)]
    pub password_key_snrp: Option<Snrp>,
    #[serde(rename = "passwordAuthBox", skip_serializing_if = "Option::is_none", default)]
    pub password_auth_box: Option<JsonBox>,

    #[serde(rename = "pin2Key", skip_serializing_if = "Option::is_none", default)]
    pub pin2_key: Option<String>,
    #[serde(rename = "recovery2Key", skip_serializing_if = "Option::is_none", default)]
    pub recovery2_key: Option<String>,

    #[serde(rename = "questionBox", skip_serializing_if = "Option::is_none", default)]
    pub question_box: Option<JsonBox>,
    #[serde(rename = "questionKeySnrp", skip_serializing_if = "Option::is_none", default)]
    pub question_key_snrp: Option<Snrp>,
    #[serde(rename = "recoveryBox", skip_serializing_if = "Option::is_none", default)]
    pub recovery_box: Option<JsonBox>,
    #[serde(rename = "recoveryKeySnrp", skip_serializing_if = "Option::is_none", default)]
    pub recovery_key_snrp: Option<Snrp>,

    #[serde(rename = "mnemonicBox", skip_serializing_if = "Option::is_none", default)]
    pub mnemonic_box: Option<JsonBox>,
    #[serde(rename = "rootKeyBox", skip_serializing_if = "Option::is_none", default)]
    pub root_key_box: Option<JsonBox>,
    #[serde(rename = "syncKeyBox", skip_serializing_if = "Option::is_none", default)]
    pub sync_key_box: Option<JsonBox>,
    #[serde(rename = "keyBoxes", skip_serializing_if = "Option::is_none", default)]
    pub key_boxes: Option<Vec<JsonBox>>,
}

impl LoginStash {
    pub fn load(path: &Path) -> Result<Self> {
        fileio::json_load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fileio::json_save(path, self)
    }

    pub fn key_boxes(&self) -> &[JsonBox] {
        self.key_boxes.as_deref().unwrap_or(&[])
    }

    pub fn key_box_push(&mut self, key_box: JsonBox) {
        self.key_boxes.get_or_insert_with(Vec::new).push(key_box);
    }
}

impl LoginReplyJson {
    pub fn from_results(results: serde_json::Value) -> Result<Self> {
        serde_json::from_value(results).map_err(|e| Error::Json(format!("bad login reply: {e}")))
    }

    /// Breaks the reply out into the on-disk files: the legacy package pair,
    /// `RootKey.json`, the bare v2 key files (decrypted with `dataKey`), and
    /// the stash itself.
    pub fn save(&self, paths: &AccountPaths, data_key: &[u8], username: &str) -> Result<()> {
        let mut care = CarePackage::default();
        let mut login_pkg = LoginPackage::default();

        // Password:
        care.password_key_snrp = self.password_key_snrp.clone();
        login_pkg.password_box = self.password_box.clone();
        login_pkg.password_auth_box = self.password_auth_box.clone();

        // Recovery v1:
        care.question_box = self.question_box.clone();
        care.question_key_snrp = self.question_key_snrp.clone();
        care.recovery_key_snrp = self.recovery_key_snrp.clone();
        login_pkg.recovery_box = self.recovery_box.clone();

        // Keys:
        login_pkg.sync_key_box = self.sync_key_box.clone();
        if let Some(root_key_box) = &self.root_key_box {
            root_key_box.save(&paths.root_key_path())?;
        }

        // Keys to save unencrypted:
        let mut stash = self.make_stash(data_key, username)?;
        if let Some(pin2_key) = stash.pin2_key.take() {
            let raw = strongbox_crypto::encoding::base58_decode(&pin2_key)?;
            pin2_key_save(&paths.pin2_key_path(), &raw)?;
            stash.pin2_key = Some(pin2_key);
        }
        if let Some(recovery2_key) = stash.recovery2_key.take() {
            let raw = strongbox_crypto::encoding::base58_decode(&recovery2_key)?;
            recovery2_key_save(&paths.recovery2_key_path(), &raw)?;
            stash.recovery2_key = Some(recovery2_key);
        }

        // Write to disk:
        stash.save(&paths.stash_path())?;
        care.save(&paths.care_package_path())?;
        login_pkg.save(&paths.login_package_path())?;

        Ok(())
    }

    /// Filters the server reply down to the on-disk storage format.
    fn make_stash(&self, data_key: &[u8], username: &str) -> Result<LoginStash> {
        let mut out = LoginStash {
            username: (!username.is_empty()).then(|| username.to_owned()),
            login_id: self.login_id.clone(),
            password_box: self.password_box.clone(),
            password_key_snrp: self.password_key_snrp.clone(),
            password_auth_box: self.password_auth_box.clone(),
            question_box: self.question_box.clone(),
            question_key_snrp: self.question_key_snrp.clone(),
            recovery_box: self.recovery_box.clone(),
            recovery_key_snrp: self.recovery_key_snrp.clone(),
            mnemonic_box: self.mnemonic_box.clone(),
            root_key_box: self.root_key_box.clone(),
            sync_key_box: self.sync_key_box.clone(),
            key_boxes: self.key_boxes.clone(),
            ..Default::default()
        };

        // Decrypt keys:
        if let Some(pin2_key_box) = &self.pin2_key_box {
            if let Ok(raw) = pin2_key_box.decrypt(data_key) {
                out.pin2_key = Some(base58_encode(&raw));
            }
        }
        if let Some(recovery2_key_box) = &self.recovery2_key_box {
            if let Ok(raw) = recovery2_key_box.decrypt(data_key) {
                out.recovery2_key = Some(base58_encode(&raw));
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_parses_sparse_json() {
        let reply = LoginReplyJson::from_results(serde_json::json!({
            "loginId": "abc",
            "passwordAuthBox": JsonBox::encrypt(b"x", &[0u8; 32]).unwrap(),
        }))
        .unwrap();
        assert_eq!(reply.login_id.as_deref(), Some("abc"));
        assert!(reply.password_box.is_none());
    }

    #[test]
    fn save_splits_reply_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AccountPaths::new(dir.path().to_path_buf());
        let data_key = [3u8; 32];

        let reply = LoginReplyJson {
            password_auth_box: Some(JsonBox::encrypt(b"auth", &data_key).unwrap()),
            sync_key_box: Some(JsonBox::encrypt(&[5u8; 20], &data_key).unwrap()),
            pin2_key_box: Some(JsonBox::encrypt(&[6u8; 32], &data_key).unwrap()),
            root_key_box: Some(JsonBox::encrypt(&[7u8; 32], &data_key).unwrap()),
            ..Default::default()
        };
        reply.save(&paths, &data_key, "alice").unwrap();

        assert!(paths.stash_path().exists());
        assert!(paths.login_package_path().exists());
        assert!(paths.care_package_path().exists());
        assert!(paths.root_key_path().exists());
        assert!(paths.pin2_key_path().exists());
        assert!(!paths.recovery2_key_path().exists());

        let stash = LoginStash::load(&paths.stash_path()).unwrap();
        assert_eq!(stash.username.as_deref(), Some("alice"));
        assert!(stash.pin2_key.is_some());
    }
}
