//! Edge login: handing account keys to a new device through a short-lived
//! server-side "lobby" object and an ECDH exchange. Neither device reveals a
//! long-term secret; the lobby only ever carries ciphertext.

use k256::ecdh::diffie_hellman;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use serde::Deserialize;
use serde_json::json;

use strongbox_core::{ContextHandle, Error, Result};
use strongbox_crypto::encoding::{base16_decode, base16_encode};
use strongbox_crypto::{hmac_sha256, random_bytes, JsonBox};

use crate::login::Login;
use crate::server::LoginServer;

const DATA_KEY_HMAC_KEY: &[u8] = b"dataKey";

/// A lobby fetched from the server.
#[derive(Debug, Clone)]
pub struct Lobby {
    pub id: String,
    pub json: serde_json::Value,
}

/// What a requesting device is asking for.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "displayImageUrl", default)]
    pub display_image_url: String,
    #[serde(rename = "requestKey")]
    pub request_key: String,
    #[serde(rename = "type")]
    pub repo_type: String,
}

/// Downloads the contents of a lobby.
pub fn lobby_fetch(ctx: &ContextHandle, id: &str) -> Result<Lobby> {
    let server = LoginServer::new(ctx)?;
    Ok(Lobby {
        id: id.to_owned(),
        json: server.lobby_get(id)?,
    })
}

/// Reads the account request out of a lobby, if there is one.
pub fn login_request_load(lobby: &Lobby) -> Result<LoginRequest> {
    let request = lobby
        .json
        .get("accountRequest")
        .ok_or_else(|| Error::Json("lobby has no accountRequest".into()))?;
    serde_json::from_value(request.clone()).map_err(|e| Error::Json(format!("bad lobby: {e}")))
}

/// Approves an account request: derives a shared key against the
/// requester's ephemeral public key, packages the repo info, and uploads
/// the updated lobby.
pub fn login_request_approve(login: &Login, lobby: &mut Lobby, pin: Option<&str>) -> Result<()> {
    let request = login_request_load(lobby)?;

    // Make an ephemeral private key:
    let reply_secret = loop {
        if let Ok(secret) = SecretKey::from_slice(&random_bytes(32)?) {
            break secret;
        }
    };

    // Derive the encryption key via ECDH:
    let request_key = PublicKey::from_sec1_bytes(&base16_decode(&request.request_key)?)
        .map_err(|_| Error::Encrypt("bad lobby request key".into()))?;
    let shared = diffie_hellman(reply_secret.to_nonzero_scalar(), request_key.as_affine());
    let data_key = hmac_sha256(DATA_KEY_HMAC_KEY, shared.raw_secret_bytes().as_slice());

    // Get the repo info we need:
    let repo_info = login.repo_find(&request.repo_type, true)?;

    // Assemble the reply:
    let mut reply = json!({
        "info": {
            "dataKey": base16_encode(&repo_info.data_key),
            "syncKey": base16_encode(&repo_info.sync_key),
        },
        "username": login.store.username(),
    });
    if let Some(pin) = pin.filter(|pin| pin.len() == 4) {
        reply["pinString"] = json!(pin);
    }
    let reply_box = JsonBox::encrypt_json(&reply, &data_key)?;

    // Update the lobby JSON:
    let request_json = lobby
        .json
        .get_mut("accountRequest")
        .ok_or_else(|| Error::Json("lobby has no accountRequest".into()))?;
    request_json["replyBox"] = serde_json::to_value(&reply_box)?;
    request_json["replyKey"] = json!(base16_encode(
        reply_secret.public_key().to_encoded_point(false).as_bytes()
    ));

    // Upload:
    let server = LoginServer::new(login.store.context())?;
    server.lobby_put(&lobby.id, &lobby.json)
}

// ── Requesting side ──────────────────────────────────────────────────────────

/// What the approving device handed over, decrypted.
#[derive(Debug, Clone, Deserialize)]
pub struct LobbyReply {
    pub info: LobbyRepoInfo,
    pub username: String,
    #[serde(rename = "pinString", default)]
    pub pin_string: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LobbyRepoInfo {
    /// base16-encoded repo data key.
    #[serde(rename = "dataKey")]
    pub data_key: String,
    /// base16-encoded repo sync key.
    #[serde(rename = "syncKey")]
    pub sync_key: String,
}

/// The requesting device's half of an edge login: an ephemeral key plus the
/// lobby it posted. Render the id as a QR code for the approving device.
pub struct LobbyRequest {
    pub id: String,
    secret: SecretKey,
}

impl LobbyRequest {
    /// Creates the lobby on the server and returns the handle to poll.
    pub fn create(
        ctx: &ContextHandle,
        repo_type: &str,
        display_name: &str,
    ) -> Result<Self> {
        let secret = loop {
            if let Ok(secret) = SecretKey::from_slice(&random_bytes(32)?) {
                break secret;
            }
        };
        let id = base16_encode(&random_bytes(8)?);

        let lobby = json!({
            "accountRequest": {
                "displayName": display_name,
                "requestKey": base16_encode(
                    secret.public_key().to_encoded_point(false).as_bytes()
                ),
                "type": repo_type,
            }
        });
        let server = LoginServer::new(ctx)?;
        server.lobby_create(&id, &lobby)?;

        Ok(LobbyRequest { id, secret })
    }

    /// Polls the lobby. `None` until the other device approves.
    pub fn fetch_reply(&self, ctx: &ContextHandle) -> Result<Option<LobbyReply>> {
        let lobby = lobby_fetch(ctx, &self.id)?;
        let request = lobby
            .json
            .get("accountRequest")
            .ok_or_else(|| Error::Json("lobby has no accountRequest".into()))?;

        let (Some(reply_key), Some(reply_box)) =
            (request.get("replyKey"), request.get("replyBox"))
        else {
            return Ok(None);
        };

        let reply_key = reply_key
            .as_str()
            .ok_or_else(|| Error::Json("bad replyKey".into()))?;
        let reply_box: JsonBox = serde_json::from_value(reply_box.clone())
            .map_err(|e| Error::Json(format!("bad replyBox: {e}")))?;

        let data_key = self.reply_data_key(reply_key)?;
        Ok(Some(reply_box.decrypt_json(&data_key)?))
    }

    /// ECDH against the approver's ephemeral public key.
    fn reply_data_key(&self, reply_key_hex: &str) -> Result<[u8; 32]> {
        let reply_key = PublicKey::from_sec1_bytes(&base16_decode(reply_key_hex)?)
            .map_err(|_| Error::Decrypt("bad lobby reply key".into()))?;
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), reply_key.as_affine());
        Ok(hmac_sha256(
            DATA_KEY_HMAC_KEY,
            shared.raw_secret_bytes().as_slice(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The requester's half of the exchange, for testing the approver
    /// against: decrypt the reply box with our own ephemeral secret.
    fn requester_decrypt(
        secret: &SecretKey,
        reply_key_hex: &str,
        reply_box: &JsonBox,
    ) -> serde_json::Value {
        let reply_key =
            PublicKey::from_sec1_bytes(&base16_decode(reply_key_hex).unwrap()).unwrap();
        let shared = diffie_hellman(secret.to_nonzero_scalar(), reply_key.as_affine());
        let data_key = hmac_sha256(DATA_KEY_HMAC_KEY, shared.raw_secret_bytes().as_slice());
        reply_box.decrypt_json(&data_key).unwrap()
    }

    #[test]
    fn ecdh_shared_secret_agrees() {
        let a = SecretKey::from_slice(&[1u8; 32]).unwrap();
        let b = SecretKey::from_slice(&[2u8; 32]).unwrap();

        let ab = diffie_hellman(a.to_nonzero_scalar(), b.public_key().as_affine());
        let ba = diffie_hellman(b.to_nonzero_scalar(), a.public_key().as_affine());
        assert_eq!(ab.raw_secret_bytes(), ba.raw_secret_bytes());
    }

    #[test]
    fn reply_box_round_trips_through_requester() {
        // Both halves in one process, no server: just the crypto path.
        let requester = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let approver = SecretKey::from_slice(&[9u8; 32]).unwrap();

        let shared = diffie_hellman(
            approver.to_nonzero_scalar(),
            requester.public_key().as_affine(),
        );
        let data_key = hmac_sha256(DATA_KEY_HMAC_KEY, shared.raw_secret_bytes().as_slice());
        let reply = json!({"username": "alice", "info": {"dataKey": "aa", "syncKey": "bb"}});
        let reply_box = JsonBox::encrypt_json(&reply, &data_key).unwrap();

        let reply_key_hex =
            base16_encode(approver.public_key().to_encoded_point(false).as_bytes());
        let decrypted = requester_decrypt(&requester, &reply_key_hex, &reply_box);
        assert_eq!(decrypted, reply);
    }

    #[test]
    fn typed_reply_decodes_through_the_request_handle() {
        let request = LobbyRequest {
            id: "cafebabe".into(),
            secret: SecretKey::from_slice(&[3u8; 32]).unwrap(),
        };
        let approver = SecretKey::from_slice(&[4u8; 32]).unwrap();

        // Approver derives the shared key against the request key:
        let shared = diffie_hellman(
            approver.to_nonzero_scalar(),
            request.secret.public_key().as_affine(),
        );
        let data_key = hmac_sha256(DATA_KEY_HMAC_KEY, shared.raw_secret_bytes().as_slice());
        let reply_box = JsonBox::encrypt_json(
            &json!({
                "info": {"dataKey": "00ff", "syncKey": "11ee"},
                "username": "alice",
                "pinString": "1234",
            }),
            &data_key,
        )
        .unwrap();

        // Requester decrypts with the approver's public key:
        let reply_key_hex =
            base16_encode(approver.public_key().to_encoded_point(false).as_bytes());
        let derived = request.reply_data_key(&reply_key_hex).unwrap();
        let reply: LobbyReply = reply_box.decrypt_json(&derived).unwrap();

        assert_eq!(reply.username, "alice");
        assert_eq!(reply.pin_string.as_deref(), Some("1234"));
        assert_eq!(reply.info.sync_key, "11ee");
    }

    #[test]
    fn request_load_parses_lobby_shape() {
        let lobby = Lobby {
            id: "abc".into(),
            json: json!({
                "accountRequest": {
                    "displayName": "New Phone",
                    "requestKey": "02abcd",
                    "type": "account:repo:co.airbitz.wallet",
                }
            }),
        };
        let request = login_request_load(&lobby).unwrap();
        assert_eq!(request.display_name, "New Phone");
        assert_eq!(request.repo_type, "account:repo:co.airbitz.wallet");
    }
}
