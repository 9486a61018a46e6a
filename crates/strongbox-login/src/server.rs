//! Client for the auth server's v1 and v2 endpoints.
//!
//! Every reply shares the `{status_code, message, results}` shape; the
//! status codes map onto the client error taxonomy in `decode_reply`.

use reqwest::blocking::Client;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use strongbox_core::constants::CONNECT_TIMEOUT_SECONDS;
use strongbox_core::{ContextHandle, Error, Result};
use strongbox_crypto::encoding::base64_encode;
use strongbox_crypto::JsonBox;

use crate::auth::AuthJson;
use crate::login::Login;
use crate::packages::{CarePackage, LoginPackage};
use crate::stash::LoginReplyJson;
use crate::store::LoginStore;

// Status codes defined by the server protocol:
const CODE_SUCCESS: i64 = 0;
const CODE_ACCOUNT_EXISTS: i64 = 2;
const CODE_NO_ACCOUNT: i64 = 3;
const CODE_INVALID_PASSWORD: i64 = 4;
const CODE_INVALID_ANSWERS: i64 = 5;
const CODE_INVALID_API_KEY: i64 = 6;
const CODE_PIN_EXPIRED: i64 = 7; // only v1 servers still send this
const CODE_INVALID_OTP: i64 = 8;
const CODE_OBSOLETE: i64 = 1000;

/// Pinned server certificates, PEM-encoded. The production build embeds the
/// leaf and root here; an empty list falls back to the system trust store.
const PINNED_CERTS: &[&str] = &[];

/// The common format shared by server reply messages.
#[derive(Deserialize)]
struct ServerReplyJson {
    #[serde(default)]
    status_code: i64,
    #[serde(default = "default_message")]
    message: String,
    #[serde(default)]
    results: Option<Value>,
}

fn default_message() -> String {
    "<no server message>".into()
}

/// Checks the server status code for errors and unwraps `results`.
fn decode_reply(http_ok: bool, body: &str) -> Result<Value> {
    let reply: ServerReplyJson =
        serde_json::from_str(body).map_err(|e| Error::Server(format!("bad reply: {e}")))?;

    match reply.status_code {
        CODE_SUCCESS => {}

        CODE_ACCOUNT_EXISTS => return Err(Error::AccountAlreadyExists),
        CODE_NO_ACCOUNT => return Err(Error::AccountDoesNotExist),

        CODE_INVALID_PASSWORD => {
            #[derive(Deserialize)]
            struct WaitJson {
                wait_seconds: Option<u32>,
            }
            let wait = reply
                .results
                .as_ref()
                .and_then(|r| serde_json::from_value::<WaitJson>(r.clone()).ok())
                .and_then(|w| w.wait_seconds);
            return Err(match wait {
                Some(seconds) => Error::InvalidPinWait(seconds),
                None => Error::BadPassword,
            });
        }

        CODE_INVALID_OTP => {
            #[derive(Deserialize, Default)]
            struct OtpJson {
                #[serde(default)]
                otp_reset_auth: String,
                #[serde(default)]
                otp_timeout_date: String,
            }
            let info: OtpJson = reply
                .results
                .as_ref()
                .and_then(|r| serde_json::from_value(r.clone()).ok())
                .unwrap_or_default();
            return Err(Error::InvalidOtp {
                reset_token: info.otp_reset_auth,
                reset_date: info.otp_timeout_date,
            });
        }

        CODE_PIN_EXPIRED => return Err(Error::PinExpired),
        CODE_OBSOLETE => return Err(Error::Obsolete),

        CODE_INVALID_ANSWERS | CODE_INVALID_API_KEY => {
            return Err(Error::Server(reply.message));
        }
        _ => return Err(Error::Server(reply.message)),
    }

    if !http_ok {
        return Err(Error::Server("unexpected HTTP failure".into()));
    }

    Ok(reply.results.unwrap_or(Value::Null))
}

/// A connection to the auth server. Each request opens its own connection;
/// there is no pooled state callers can observe.
pub struct LoginServer {
    ctx: ContextHandle,
    client: Client,
}

impl LoginServer {
    pub fn new(ctx: &ContextHandle) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECONDS));

        // Certificate pinning: when certs are embedded, trust only those.
        for pem in PINNED_CERTS {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes())
                .map_err(|e| Error::Generic(format!("bad pinned cert: {e}")))?;
            builder = builder
                .add_root_certificate(cert)
                .tls_built_in_root_certs(false);
        }

        Ok(LoginServer {
            ctx: ContextHandle::clone(ctx),
            client: builder
                .build()
                .map_err(|e| Error::Generic(format!("HTTP client: {e}")))?,
        })
    }

    fn request(&self, method: Method, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.ctx.server_root, path);
        tracing::debug!(%url, "auth server request");

        let response = self
            .client
            .request(method, url.as_str())
            .header("Content-Type", "application/json")
            .header("X-API-Key", &self.ctx.api_key)
            .json(body)
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;

        let http_ok = response.status().is_success();
        let text = response
            .text()
            .map_err(|e| Error::Network(e.to_string()))?;
        decode_reply(http_ok, &text)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, body)
    }

    // ── v1 request scaffolding ────────────────────────────────────────────────

    /// The v1 endpoints use the original field names (`l1`, `lp1`, …).
    fn v1_body(store: &LoginStore) -> serde_json::Map<String, Value> {
        let mut body = serde_json::Map::new();
        body.insert("l1".into(), json!(base64_encode(store.user_id())));
        if let Some(otp_key) = store.otp_key() {
            body.insert("otp".into(), json!(otp_key.totp_now()));
        }
        body
    }

    fn v1_body_login(login: &Login) -> Result<serde_json::Map<String, Value>> {
        let mut body = Self::v1_body(&login.store);
        body.insert(
            "lp1".into(),
            json!(base64_encode(&login.password_auth()?)),
        );
        Ok(body)
    }

    // ── v1 account endpoints ──────────────────────────────────────────────────

    pub fn account_create(
        &self,
        store: &LoginStore,
        password_auth: &[u8],
        care: &CarePackage,
        login_pkg: &LoginPackage,
        sync_key_hex: &str,
    ) -> Result<()> {
        let mut body = Self::v1_body(store);
        body.insert("lp1".into(), json!(base64_encode(password_auth)));
        body.insert("care_package".into(), json!(serde_json::to_string(care)?));
        body.insert(
            "login_package".into(),
            json!(serde_json::to_string(login_pkg)?),
        );
        body.insert("repo_account_key".into(), json!(sync_key_hex));

        self.post("/v1/account/create", &Value::Object(body))?;
        Ok(())
    }

    pub fn account_activate(&self, login: &Login) -> Result<()> {
        let body = Self::v1_body_login(login)?;
        self.post("/v1/account/activate", &Value::Object(body))?;
        Ok(())
    }

    /// Checks that a username is not taken. Success means available.
    pub fn account_available(&self, store: &LoginStore) -> Result<()> {
        let body = Self::v1_body(store);
        self.post("/v1/account/available", &Value::Object(body))?;
        Ok(())
    }

    pub fn account_upgrade(
        &self,
        login: &Login,
        root_key_box: &JsonBox,
        mnemonic_box: &JsonBox,
        data_key_box: &JsonBox,
    ) -> Result<()> {
        let mut body = Self::v1_body_login(login)?;
        body.insert("rootKeyBox".into(), serde_json::to_value(root_key_box)?);
        body.insert("mnemonicBox".into(), serde_json::to_value(mnemonic_box)?);
        body.insert("syncDataKeyBox".into(), serde_json::to_value(data_key_box)?);

        self.post("/v1/account/upgrade", &Value::Object(body))?;
        Ok(())
    }

    /// The v1 credential-change endpoint, still used for recovery v1 setup.
    pub fn change_password_v1(
        &self,
        login: &Login,
        new_password_auth: &[u8],
        new_recovery_auth: Option<&[u8]>,
        care: &CarePackage,
        login_pkg: &LoginPackage,
    ) -> Result<()> {
        let mut body = Self::v1_body_login(login)?;
        body.insert("new_lp1".into(), json!(base64_encode(new_password_auth)));
        if let Some(recovery_auth) = new_recovery_auth {
            body.insert("new_lra1".into(), json!(base64_encode(recovery_auth)));
        }
        body.insert("care_package".into(), json!(serde_json::to_string(care)?));
        body.insert(
            "login_package".into(),
            json!(serde_json::to_string(login_pkg)?),
        );

        self.post("/v1/account/password/update", &Value::Object(body))?;
        Ok(())
    }

    // ── v1 PIN package (legacy) ───────────────────────────────────────────────

    pub fn pin_package_get(&self, pin_auth_id: &[u8], lpin1: &[u8]) -> Result<String> {
        let body = json!({
            "did": base64_encode(pin_auth_id),
            "lpin1": base64_encode(lpin1),
        });
        let results = self.post("/v1/account/pinpackage/get", &body)?;

        #[derive(Deserialize)]
        struct ResultJson {
            pin_package: String,
        }
        let result: ResultJson = serde_json::from_value(results)
            .map_err(|e| Error::Json(format!("bad pin package reply: {e}")))?;
        Ok(result.pin_package)
    }

    pub fn pin_package_update(
        &self,
        login: &Login,
        pin_auth_id: &[u8],
        lpin1: &[u8],
        pin_package: &str,
        expires: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let mut body = Self::v1_body_login(login)?;
        body.insert("did".into(), json!(base64_encode(pin_auth_id)));
        body.insert("lpin1".into(), json!(base64_encode(lpin1)));
        body.insert("pin_package".into(), json!(pin_package));
        body.insert(
            "ali".into(),
            json!(expires.format("%Y-%m-%dT%H:%M:%S").to_string()),
        );

        self.post("/v1/account/pinpackage/update", &Value::Object(body))?;
        Ok(())
    }

    // ── v1 wallet endpoints ───────────────────────────────────────────────────

    pub fn wallet_create(&self, login: &Login, sync_key_hex: &str) -> Result<()> {
        let mut body = Self::v1_body_login(login)?;
        body.insert("repo_wallet_key".into(), json!(sync_key_hex));
        self.post("/v1/wallet/create", &Value::Object(body))?;
        Ok(())
    }

    pub fn wallet_activate(&self, login: &Login, sync_key_hex: &str) -> Result<()> {
        let mut body = Self::v1_body_login(login)?;
        body.insert("repo_wallet_key".into(), json!(sync_key_hex));
        self.post("/v1/wallet/activate", &Value::Object(body))?;
        Ok(())
    }

    // ── v1 information endpoints ──────────────────────────────────────────────

    pub fn general_info(&self) -> Result<Value> {
        self.post("/v1/getinfo", &json!({}))
    }

    pub fn questions(&self) -> Result<Value> {
        self.post("/v1/questions", &json!({}))
    }

    /// Uploads the debug log (and any watcher data the caller collected).
    pub fn debug_upload(&self, login: Option<&Login>, watchers: &[Vec<u8>]) -> Result<()> {
        let mut body = match login {
            Some(login) => Self::v1_body_login(login)?,
            None => serde_json::Map::new(),
        };
        if !watchers.is_empty() {
            let encoded: Vec<String> = watchers.iter().map(|w| base64_encode(w)).collect();
            body.insert("watchers".into(), json!(encoded));
        }
        let log = strongbox_core::debuglog::debug_log_load()
            .map_err(|e| Error::FileRead(e.to_string()))?;
        body.insert("log".into(), json!(base64_encode(&log)));

        self.post("/v1/account/debug", &Value::Object(body))?;
        Ok(())
    }

    // ── v1 OTP endpoints ──────────────────────────────────────────────────────

    pub fn otp_enable(&self, login: &Login, otp_secret: &str, timeout: i64) -> Result<()> {
        let mut body = Self::v1_body_login(login)?;
        body.insert("otp_secret".into(), json!(otp_secret));
        body.insert("otp_timeout".into(), json!(timeout));
        self.post("/v1/otp/on", &Value::Object(body))?;
        Ok(())
    }

    pub fn otp_disable(&self, login: &Login) -> Result<()> {
        let body = Self::v1_body_login(login)?;
        self.post("/v1/otp/off", &Value::Object(body))?;
        Ok(())
    }

    pub fn otp_status(&self, login: &Login) -> Result<(bool, i64)> {
        let body = Self::v1_body_login(login)?;
        let results = self.post("/v1/otp/status", &Value::Object(body))?;

        #[derive(Deserialize)]
        struct StatusJson {
            #[serde(default)]
            on: bool,
            #[serde(default)]
            otp_timeout: i64,
        }
        let status: StatusJson = serde_json::from_value(results)
            .map_err(|e| Error::Json(format!("bad otp status: {e}")))?;
        Ok((status.on, status.otp_timeout))
    }

    pub fn otp_reset(&self, store: &LoginStore, token: &str) -> Result<()> {
        let mut body = Self::v1_body(store);
        body.insert("otp_reset_auth".into(), json!(token));
        self.post("/v1/otp/reset", &Value::Object(body))?;
        Ok(())
    }

    /// Checks which of the given userIds have a pending 2FA reset.
    pub fn otp_pending(&self, user_ids: &[Vec<u8>]) -> Result<Vec<bool>> {
        let encoded: Vec<String> = user_ids.iter().map(|id| base64_encode(id)).collect();
        let body = json!({ "l1s": encoded.join(",") });
        let results = self.post("/v1/otp/pending/check", &body)?;

        #[derive(Deserialize)]
        struct RowJson {
            login: String,
            #[serde(default)]
            pending: bool,
        }
        let rows: Vec<RowJson> = serde_json::from_value(results)
            .map_err(|e| Error::Json(format!("bad otp pending reply: {e}")))?;

        Ok(encoded
            .iter()
            .map(|id| rows.iter().any(|row| &row.login == id && row.pending))
            .collect())
    }

    pub fn otp_reset_cancel(&self, login: &Login) -> Result<()> {
        let body = Self::v1_body_login(login)?;
        self.post("/v1/otp/pending/cancel", &Value::Object(body))?;
        Ok(())
    }

    // ── v2 login endpoints ────────────────────────────────────────────────────

    /// Fetches the full login object. Authentication travels in the body.
    pub fn login_fetch(&self, auth: &AuthJson) -> Result<LoginReplyJson> {
        let results = self.request(Method::GET, "/v2/login", &serde_json::to_value(auth)?)?;
        LoginReplyJson::from_results(results)
    }

    pub fn password_put(&self, auth: AuthJson, data: Value) -> Result<()> {
        let body = serde_json::to_value(auth.with_data(data))?;
        self.request(Method::PUT, "/v2/login/password", &body)?;
        Ok(())
    }

    pub fn pin2_put(&self, auth: AuthJson, data: Value) -> Result<()> {
        let body = serde_json::to_value(auth.with_data(data))?;
        self.request(Method::PUT, "/v2/login/pin2", &body)?;
        Ok(())
    }

    pub fn pin2_delete(&self, auth: &AuthJson) -> Result<()> {
        self.request(Method::DELETE, "/v2/login/pin2", &serde_json::to_value(auth)?)?;
        Ok(())
    }

    pub fn recovery2_put(&self, auth: AuthJson, data: Value) -> Result<()> {
        let body = serde_json::to_value(auth.with_data(data))?;
        self.request(Method::PUT, "/v2/login/recovery2", &body)?;
        Ok(())
    }

    pub fn recovery2_delete(&self, auth: &AuthJson) -> Result<()> {
        self.request(
            Method::DELETE,
            "/v2/login/recovery2",
            &serde_json::to_value(auth)?,
        )?;
        Ok(())
    }

    /// Adds a repository key box to the account's catalog.
    pub fn keys_put(&self, auth: AuthJson, key_boxes: &[JsonBox]) -> Result<()> {
        let data = json!({ "keyBoxes": key_boxes });
        let body = serde_json::to_value(auth.with_data(data))?;
        self.request(Method::PUT, "/v2/login/keys", &body)?;
        Ok(())
    }

    // ── Lobby endpoints (edge login) ──────────────────────────────────────────

    pub fn lobby_create(&self, id: &str, lobby: &Value) -> Result<()> {
        let body = json!({ "data": lobby });
        self.post(&format!("/v1/lobby/{id}"), &body)?;
        Ok(())
    }

    pub fn lobby_get(&self, id: &str) -> Result<Value> {
        self.request(Method::GET, &format!("/v1/lobby/{id}"), &json!({}))
    }

    pub fn lobby_put(&self, id: &str, lobby: &Value) -> Result<()> {
        let body = json!({ "data": lobby });
        self.request(Method::PUT, &format!("/v1/lobby/{id}"), &body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_success_unwraps_results() {
        let results =
            decode_reply(true, r#"{"status_code": 0, "message": "", "results": {"x": 1}}"#)
                .unwrap();
        assert_eq!(results["x"], 1);
    }

    #[test]
    fn decode_error_table() {
        let cases: &[(&str, fn(&Error) -> bool)] = &[
            (r#"{"status_code": 2, "message": "m"}"#, |e| {
                matches!(e, Error::AccountAlreadyExists)
            }),
            (r#"{"status_code": 3, "message": "m"}"#, |e| {
                matches!(e, Error::AccountDoesNotExist)
            }),
            (r#"{"status_code": 4, "message": "m"}"#, |e| {
                matches!(e, Error::BadPassword)
            }),
            (
                r#"{"status_code": 4, "message": "m", "results": {"wait_seconds": 30}}"#,
                |e| matches!(e, Error::InvalidPinWait(30)),
            ),
            (r#"{"status_code": 5, "message": "bad answers"}"#, |e| {
                matches!(e, Error::Server(_))
            }),
            (r#"{"status_code": 7, "message": "m"}"#, |e| {
                matches!(e, Error::PinExpired)
            }),
            (r#"{"status_code": 1000, "message": "m"}"#, |e| {
                matches!(e, Error::Obsolete)
            }),
        ];
        for (body, check) in cases {
            let err = decode_reply(true, body).unwrap_err();
            assert!(check(&err), "wrong mapping for {body}: {err:?}");
        }
    }

    #[test]
    fn decode_otp_error_carries_reset_info() {
        let body = r#"{
            "status_code": 8, "message": "otp",
            "results": {"otp_reset_auth": "token123", "otp_timeout_date": "2016-01-01"}
        }"#;
        match decode_reply(true, body).unwrap_err() {
            Error::InvalidOtp {
                reset_token,
                reset_date,
            } => {
                assert_eq!(reset_token, "token123");
                assert_eq!(reset_date, "2016-01-01");
            }
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_http_failure_with_ok_body() {
        assert!(decode_reply(false, r#"{"status_code": 0}"#).is_err());
    }
}
