//! Legacy v1 recovery: a single answers string stretched with scrypt.

use std::sync::Arc;

use strongbox_core::{Error, Result};
use strongbox_crypto::{username_snrp, JsonBox, Snrp};

use crate::auth::AuthJson;
use crate::login::Login;
use crate::packages::{CarePackage, LoginPackage};
use crate::server::LoginServer;
use crate::store::LoginStore;

/// Fetches the recovery questions, which only need the user's identity.
pub fn login_recovery_questions(store: &Arc<LoginStore>) -> Result<String> {
    let server = LoginServer::new(store.context())?;
    let reply = server.login_fetch(&AuthJson::user_id_set(store))?;

    // Verify that the questions exist:
    let question_box = reply.question_box.as_ref().ok_or(Error::NoRecoveryQuestions)?;
    let question_key_snrp = reply
        .question_key_snrp
        .as_ref()
        .ok_or(Error::NoRecoveryQuestions)?;

    // Decrypt:
    let question_key = question_key_snrp.hash(store.username().as_bytes())?;
    let questions = question_box.decrypt(&question_key)?;
    String::from_utf8(questions).map_err(|e| Error::Json(format!("bad questions: {e}")))
}

/// Logs in with the recovery answers.
pub fn login_recovery(store: &Arc<LoginStore>, answers: &str) -> Result<Arc<Login>> {
    let ctx = store.context();
    let lra = format!("{}{}", store.username(), answers);

    // Create recoveryAuth:
    let recovery_auth = username_snrp(ctx.testnet).hash(lra.as_bytes())?;

    // Grab the login information from the server:
    let server = LoginServer::new(ctx)?;
    let reply = server.login_fetch(&AuthJson::recovery_set(store, &recovery_auth))?;

    // Unlock recoveryBox:
    let recovery_key_snrp = reply
        .recovery_key_snrp
        .as_ref()
        .ok_or_else(|| Error::Json("login reply has no recoveryKeySnrp".into()))?;
    let recovery_key = recovery_key_snrp.hash(lra.as_bytes())?;
    let data_key = reply
        .recovery_box
        .as_ref()
        .ok_or_else(|| Error::Json("login reply has no recoveryBox".into()))?
        .decrypt(&recovery_key)?;

    Login::create_online(store, &data_key, reply)
}

/// Installs or changes the recovery questions and answers.
pub fn login_recovery_set(login: &Login, questions: &str, answers: &str) -> Result<()> {
    let ctx = login.store.context();
    let lra = format!("{}{}", login.store.username(), answers);

    // Load the packages:
    let mut care = CarePackage::load(&login.paths.care_package_path())?;
    let mut login_pkg = LoginPackage::load(&login.paths.login_package_path())?;

    // Update scrypt parameters:
    let recovery_key_snrp = Snrp::create(ctx.scrypt_n, ctx.scrypt_r)?;
    let question_key_snrp = Snrp::create(ctx.scrypt_n, ctx.scrypt_r)?;

    // Encrypt the questions under questionKey:
    let question_key = question_key_snrp.hash(login.store.username().as_bytes())?;
    care.question_box = Some(JsonBox::encrypt(questions.as_bytes(), &question_key)?);
    care.question_key_snrp = Some(question_key_snrp);

    // Encrypt dataKey under recoveryKey:
    let recovery_key = recovery_key_snrp.hash(lra.as_bytes())?;
    login_pkg.recovery_box = Some(JsonBox::encrypt(login.data_key(), &recovery_key)?);
    care.recovery_key_snrp = Some(recovery_key_snrp);

    // Make recoveryAuth (unlocks the server):
    let recovery_auth = username_snrp(ctx.testnet).hash(lra.as_bytes())?;

    // Change the server login, keeping the current passwordAuth:
    let server = LoginServer::new(ctx)?;
    let password_auth = login.password_auth()?;
    server.change_password_v1(login, &password_auth, Some(&recovery_auth), &care, &login_pkg)?;

    // Change the on-disk login:
    care.save(&login.paths.care_package_path())?;
    login_pkg.save(&login.paths.login_package_path())?;

    Ok(())
}
