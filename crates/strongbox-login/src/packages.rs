//! The data-at-rest bundles shared between disk and server.
//!
//! The field names are the storage format and predate this codebase; they
//! cannot change without orphaning every existing account.

use std::path::Path;

use serde::{Deserialize, Serialize};

use strongbox_core::{fileio, Error, Result};
use strongbox_crypto::encoding::{base58_decode, base58_encode};
use strongbox_crypto::{JsonBox, Snrp};

/// `CarePackage.json`: the key-stretching parameters for each credential.
/// Optional SNRPs are present iff the matching credential is configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarePackage {
    /// Stretches `username||password` into `passwordKey`.
    #[serde(rename = "SNRP2", skip_serializing_if = "Option::is_none")]
    pub password_key_snrp: Option<Snrp>,

    /// Stretches `username||answers` into `recoveryKey`.
    #[serde(rename = "SNRP3", skip_serializing_if = "Option::is_none")]
    pub recovery_key_snrp: Option<Snrp>,

    /// Stretches the bare username into `questionKey`.
    #[serde(rename = "SNRP4", skip_serializing_if = "Option::is_none")]
    pub question_key_snrp: Option<Snrp>,

    /// Recovery questions, encrypted with `questionKey`.
    #[serde(rename = "ERQ", skip_serializing_if = "Option::is_none")]
    pub question_box: Option<JsonBox>,
}

impl CarePackage {
    pub fn load(path: &Path) -> Result<Self> {
        fileio::json_load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fileio::json_save(path, self)
    }

    pub fn password_key_snrp(&self) -> Result<&Snrp> {
        self.password_key_snrp
            .as_ref()
            .ok_or_else(|| Error::Json("CarePackage has no SNRP2".into()))
    }
}

/// `LoginPackage.json`: the encrypted keys themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginPackage {
    /// `dataKey`, encrypted with `passwordKey`.
    #[serde(rename = "EMK_LP2", skip_serializing_if = "Option::is_none")]
    pub password_box: Option<JsonBox>,

    /// `dataKey`, encrypted with `recoveryKey`.
    #[serde(rename = "EMK_LRA3", skip_serializing_if = "Option::is_none")]
    pub recovery_box: Option<JsonBox>,

    /// The account sync key, encrypted with `dataKey`.
    #[serde(rename = "ESyncKey", skip_serializing_if = "Option::is_none")]
    pub sync_key_box: Option<JsonBox>,

    /// `passwordAuth`, encrypted with `dataKey`, so a logged-in session can
    /// rebuild its own server authenticator.
    #[serde(rename = "ELP1", skip_serializing_if = "Option::is_none")]
    pub password_auth_box: Option<JsonBox>,

    /// Legacy `recoveryAuth`, encrypted with `dataKey`.
    #[serde(rename = "ELRA1", skip_serializing_if = "Option::is_none")]
    pub recovery_auth_box: Option<JsonBox>,
}

impl LoginPackage {
    pub fn load(path: &Path) -> Result<Self> {
        fileio::json_load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fileio::json_save(path, self)
    }

    pub fn password_box(&self) -> Result<&JsonBox> {
        self.password_box
            .as_ref()
            .ok_or_else(|| Error::Json("LoginPackage has no EMK_LP2".into()))
    }

    pub fn password_auth_box(&self) -> Result<&JsonBox> {
        self.password_auth_box
            .as_ref()
            .ok_or_else(|| Error::Json("LoginPackage has no ELP1".into()))
    }

    pub fn sync_key_box(&self) -> Result<&JsonBox> {
        self.sync_key_box
            .as_ref()
            .ok_or_else(|| Error::Json("LoginPackage has no ESyncKey".into()))
    }
}

/// `PinPackage.json`: the legacy v1 PIN re-login file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinPackage {
    /// `dataKey`, encrypted with PINK.
    #[serde(rename = "EMK_PINK")]
    pub pin_box: JsonBox,

    /// The device id the server indexes EPINK under (base64).
    #[serde(rename = "DID")]
    pub pin_auth_id: String,

    /// Advisory expiry, seconds since the epoch. The server enforces it.
    #[serde(rename = "Expires")]
    pub expires: i64,
}

impl PinPackage {
    pub fn load(path: &Path) -> Result<Self> {
        fileio::json_load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fileio::json_save(path, self)
    }
}

// ── Bare key files ────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct Pin2KeyJson {
    #[serde(rename = "pin2Key")]
    pin2_key: String,
}

#[derive(Serialize, Deserialize)]
struct Recovery2KeyJson {
    #[serde(rename = "recovery2Key")]
    recovery2_key: String,
}

pub fn pin2_key_load(path: &Path) -> Result<Vec<u8>> {
    let json: Pin2KeyJson = fileio::json_load(path)?;
    base58_decode(&json.pin2_key)
}

pub fn pin2_key_save(path: &Path, key: &[u8]) -> Result<()> {
    fileio::json_save(
        path,
        &Pin2KeyJson {
            pin2_key: base58_encode(key),
        },
    )
}

pub fn recovery2_key_load(path: &Path) -> Result<Vec<u8>> {
    let json: Recovery2KeyJson = fileio::json_load(path)?;
    base58_decode(&json.recovery2_key)
}

pub fn recovery2_key_save(path: &Path, key: &[u8]) -> Result<()> {
    fileio::json_save(
        path,
        &Recovery2KeyJson {
            recovery2_key: base58_encode(key),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn care_package_round_trip_preserves_absence() {
        let pkg = CarePackage {
            password_key_snrp: Some(Snrp {
                salt: vec![7; 32],
                n: 1024,
                r: 1,
                p: 1,
            }),
            ..Default::default()
        };

        let text = serde_json::to_string(&pkg).unwrap();
        assert!(text.contains("SNRP2"));
        assert!(!text.contains("SNRP3"));
        assert!(!text.contains("ERQ"));

        let back: CarePackage = serde_json::from_str(&text).unwrap();
        assert!(back.recovery_key_snrp.is_none());
        assert_eq!(back.password_key_snrp.unwrap().salt, vec![7; 32]);
    }

    #[test]
    fn login_package_field_names() {
        let key = [1u8; 32];
        let pkg = LoginPackage {
            password_box: Some(JsonBox::encrypt(b"data", &key).unwrap()),
            sync_key_box: Some(JsonBox::encrypt(b"sync", &key).unwrap()),
            password_auth_box: Some(JsonBox::encrypt(b"auth", &key).unwrap()),
            ..Default::default()
        };

        let value = serde_json::to_value(&pkg).unwrap();
        assert!(value.get("EMK_LP2").is_some());
        assert!(value.get("ESyncKey").is_some());
        assert!(value.get("ELP1").is_some());
        assert!(value.get("EMK_LRA3").is_none());
    }

    #[test]
    fn pin2_key_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pin2Key");
        pin2_key_save(&path, &[9u8; 32]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("pin2Key"));
        assert_eq!(pin2_key_load(&path).unwrap(), vec![9u8; 32]);
    }
}
