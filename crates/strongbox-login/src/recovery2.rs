//! Recovery v2: a random `recovery2Key` held by the user, with per-answer
//! HMAC authenticators.

use std::sync::Arc;

use serde_json::json;

use strongbox_core::{fileio, Error, Result};
use strongbox_crypto::encoding::base64_encode;
use strongbox_crypto::{hmac_sha256, random_bytes, JsonBox};

use crate::auth::AuthJson;
use crate::login::Login;
use crate::packages::{recovery2_key_load, recovery2_key_save};
use crate::paths::AccountPaths;
use crate::server::LoginServer;
use crate::store::LoginStore;

/// Builds the per-answer authenticator array.
fn recovery2_auth_build(recovery2_key: &[u8], answers: &[String]) -> Vec<String> {
    answers
        .iter()
        .map(|answer| base64_encode(&hmac_sha256(answer.as_bytes(), recovery2_key)))
        .collect()
}

/// Loads the account's `recovery2Key` from disk.
pub fn login_recovery2_key(paths: &AccountPaths) -> Result<Vec<u8>> {
    recovery2_key_load(&paths.recovery2_key_path())
}

/// Fetches the questions. The server only demands the derived id, so anyone
/// holding the `recovery2Key` can see them without answering anything.
pub fn login_recovery2_questions(
    store: &Arc<LoginStore>,
    recovery2_key: &[u8],
) -> Result<Vec<String>> {
    let recovery2_id = hmac_sha256(store.username().as_bytes(), recovery2_key);

    // Grab the login information from the server:
    let server = LoginServer::new(store.context())?;
    let reply = server.login_fetch(&AuthJson::recovery2_set(store, &recovery2_id))?;

    // Decrypt:
    let question2_box = reply
        .question2_box
        .as_ref()
        .ok_or(Error::NoRecoveryQuestions)?;
    question2_box.decrypt_json(recovery2_key)
}

/// Logs in with the recovery answers.
pub fn login_recovery2(
    store: &Arc<LoginStore>,
    recovery2_key: &[u8],
    answers: &[String],
) -> Result<Arc<Login>> {
    let recovery2_id = hmac_sha256(store.username().as_bytes(), recovery2_key);
    let recovery2_auth = recovery2_auth_build(recovery2_key, answers);

    // Grab the login information from the server:
    let server = LoginServer::new(store.context())?;
    let reply = server.login_fetch(&AuthJson::recovery2_set_with_auth(
        store,
        &recovery2_id,
        recovery2_auth,
    ))?;

    // Unlock recovery2Box:
    let data_key = reply
        .recovery2_box
        .as_ref()
        .ok_or_else(|| Error::Json("login reply has no recovery2Box".into()))?
        .decrypt(recovery2_key)?;

    Login::create_online(store, &data_key, reply)
}

/// Installs or changes the questions and answers. Returns the
/// `recovery2Key`, minting and persisting one on first use.
pub fn login_recovery2_set(
    login: &Login,
    questions: &[String],
    answers: &[String],
) -> Result<Vec<u8>> {
    let recovery2_key = match login_recovery2_key(&login.paths) {
        Ok(key) => key,
        Err(_) => {
            let key = random_bytes(32)?;
            recovery2_key_save(&login.paths.recovery2_key_path(), &key)?;
            key
        }
    };

    // Create recovery2Auth:
    let recovery2_id = hmac_sha256(login.store.username().as_bytes(), &recovery2_key);
    let recovery2_auth = recovery2_auth_build(&recovery2_key, answers);

    // Create question2Box, recovery2Box, and recovery2KeyBox:
    let question2_box = JsonBox::encrypt_json(&questions, &recovery2_key)?;
    let recovery2_box = JsonBox::encrypt(login.data_key(), &recovery2_key)?;
    let recovery2_key_box = JsonBox::encrypt(&recovery2_key, login.data_key())?;

    // Change the server login:
    let server = LoginServer::new(login.store.context())?;
    server.recovery2_put(
        AuthJson::login_set(login)?,
        json!({
            "recovery2Id": base64_encode(&recovery2_id),
            "recovery2Auth": recovery2_auth,
            "question2Box": question2_box,
            "recovery2Box": recovery2_box,
            "recovery2KeyBox": recovery2_key_box,
        }),
    )?;

    Ok(recovery2_key)
}

/// Removes recovery v2 from the server and forgets the local key.
pub fn login_recovery2_delete(login: &Login) -> Result<()> {
    let server = LoginServer::new(login.store.context())?;
    server.recovery2_delete(&AuthJson::login_set(login)?)?;

    fileio::file_delete(&login.paths.recovery2_key_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_array_is_per_answer_and_ordered() {
        let key = [5u8; 32];
        let answers = vec!["a1".to_string(), "a2".to_string()];
        let auth = recovery2_auth_build(&key, &answers);

        assert_eq!(auth.len(), 2);
        assert_eq!(auth[0], base64_encode(&hmac_sha256(b"a1", &key)));
        assert_eq!(auth[1], base64_encode(&hmac_sha256(b"a2", &key)));
        assert_ne!(auth[0], auth[1]);
    }
}
