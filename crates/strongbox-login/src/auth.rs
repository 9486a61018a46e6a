//! The outgoing request body for the v2 login endpoints.
//!
//! Invariant: every authenticated request carries the current TOTP code
//! whenever the store has an OTP key installed.

use serde::Serialize;

use strongbox_core::Result;
use strongbox_crypto::encoding::base64_encode;

use crate::login::Login;
use crate::store::LoginStore;

/// A proof of a user's identity for the login server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "passwordAuth", skip_serializing_if = "Option::is_none")]
    pub password_auth: Option<String>,
    #[serde(rename = "recoveryAuth", skip_serializing_if = "Option::is_none")]
    pub recovery_auth: Option<String>,
    #[serde(rename = "recovery2Id", skip_serializing_if = "Option::is_none")]
    pub recovery2_id: Option<String>,
    #[serde(rename = "recovery2Auth", skip_serializing_if = "Option::is_none")]
    pub recovery2_auth: Option<Vec<String>>,
    #[serde(rename = "pin2Id", skip_serializing_if = "Option::is_none")]
    pub pin2_id: Option<String>,
    #[serde(rename = "pin2Auth", skip_serializing_if = "Option::is_none")]
    pub pin2_auth: Option<String>,

    /// Payload for the PUT/POST endpoints; absent on plain logins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl AuthJson {
    fn otp_from(store: &LoginStore) -> Option<String> {
        store.otp_key().map(|key| key.totp_now())
    }

    /// Identity only: enough to fetch the public parts of a login.
    pub fn user_id_set(store: &LoginStore) -> Self {
        AuthJson {
            user_id: Some(base64_encode(store.user_id())),
            ..Default::default()
        }
    }

    pub fn password_set(store: &LoginStore, password_auth: &[u8]) -> Self {
        AuthJson {
            otp: Self::otp_from(store),
            user_id: Some(base64_encode(store.user_id())),
            password_auth: Some(base64_encode(password_auth)),
            ..Default::default()
        }
    }

    pub fn recovery_set(store: &LoginStore, recovery_auth: &[u8]) -> Self {
        AuthJson {
            otp: Self::otp_from(store),
            user_id: Some(base64_encode(store.user_id())),
            recovery_auth: Some(base64_encode(recovery_auth)),
            ..Default::default()
        }
    }

    /// Question fetch: the id alone is enough, and no OTP is required.
    pub fn recovery2_set(_store: &LoginStore, recovery2_id: &[u8]) -> Self {
        AuthJson {
            recovery2_id: Some(base64_encode(recovery2_id)),
            ..Default::default()
        }
    }

    pub fn recovery2_set_with_auth(
        store: &LoginStore,
        recovery2_id: &[u8],
        recovery2_auth: Vec<String>,
    ) -> Self {
        AuthJson {
            otp: Self::otp_from(store),
            recovery2_id: Some(base64_encode(recovery2_id)),
            recovery2_auth: Some(recovery2_auth),
            ..Default::default()
        }
    }

    /// PIN v2 identifies the account by `pin2Id`, not `userId`.
    pub fn pin2_set(store: &LoginStore, pin2_id: &[u8], pin2_auth: &[u8]) -> Self {
        AuthJson {
            otp: Self::otp_from(store),
            pin2_id: Some(base64_encode(pin2_id)),
            pin2_auth: Some(base64_encode(pin2_auth)),
            ..Default::default()
        }
    }

    /// The all-purpose authenticated-session form.
    pub fn login_set(login: &Login) -> Result<Self> {
        Ok(Self::password_set(&login.store, &login.password_auth()?))
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strongbox_core::Context;
    use strongbox_crypto::OtpKey;

    fn test_store() -> (tempfile::TempDir, Arc<LoginStore>) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(Context::new(dir.path(), "key"));
        let store = LoginStore::new(ctx, "alice").unwrap();
        store.paths(true).unwrap();
        (dir, store)
    }

    #[test]
    fn user_id_form_has_no_credentials() {
        let (_dir, store) = test_store();
        let json = serde_json::to_value(AuthJson::user_id_set(&store)).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("passwordAuth").is_none());
        assert!(json.get("otp").is_none());
    }

    #[test]
    fn otp_rides_along_when_installed() {
        let (_dir, store) = test_store();
        store.otp_key_set(OtpKey::create_default().unwrap()).unwrap();

        let json = serde_json::to_value(AuthJson::password_set(&store, &[1; 32])).unwrap();
        let otp = json.get("otp").and_then(|v| v.as_str()).unwrap();
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn pin2_form_omits_user_id() {
        let (_dir, store) = test_store();
        let json = serde_json::to_value(AuthJson::pin2_set(&store, &[1; 32], &[2; 32])).unwrap();
        assert!(json.get("pin2Id").is_some());
        assert!(json.get("pin2Auth").is_some());
        assert!(json.get("userId").is_none());
    }
}
