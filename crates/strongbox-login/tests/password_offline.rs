//! Offline password login against a hand-built account directory.
//!
//! These tests exercise the same files a live login writes, without any
//! network: care package, login package, root key box, and stash.

use std::sync::Arc;

use strongbox_core::Context;
use strongbox_crypto::{username_snrp, JsonBox, Snrp};
use strongbox_login::packages::{CarePackage, LoginPackage};
use strongbox_login::password::{login_password, login_password_ok};
use strongbox_login::stash::LoginStash;
use strongbox_login::LoginStore;

const USERNAME: &str = "william test";
const PASSWORD: &str = "open sesame";

/// A low-cost SNRP so tests stay fast.
fn test_snrp() -> Snrp {
    Snrp {
        salt: vec![0x42; 32],
        n: 1024,
        r: 1,
        p: 1,
    }
}

/// Writes the on-disk state `Login::create_new` would have produced.
fn seed_account(store: &Arc<LoginStore>, data_key: &[u8]) {
    let paths = store.paths(true).unwrap();
    let lp = format!("{USERNAME}{PASSWORD}");

    let snrp = test_snrp();
    let password_key = snrp.hash(lp.as_bytes()).unwrap();
    let password_auth = username_snrp(false).hash(lp.as_bytes()).unwrap();

    let care = CarePackage {
        password_key_snrp: Some(snrp),
        ..Default::default()
    };
    care.save(&paths.care_package_path()).unwrap();

    let login_pkg = LoginPackage {
        password_box: Some(JsonBox::encrypt(data_key, &password_key).unwrap()),
        password_auth_box: Some(JsonBox::encrypt(&password_auth, data_key).unwrap()),
        sync_key_box: Some(JsonBox::encrypt(&[7u8; 20], data_key).unwrap()),
        ..Default::default()
    };
    login_pkg.save(&paths.login_package_path()).unwrap();

    JsonBox::encrypt(&[9u8; 32], data_key)
        .unwrap()
        .save(&paths.root_key_path())
        .unwrap();

    let stash = LoginStash {
        sync_key_box: login_pkg.sync_key_box.clone(),
        ..Default::default()
    };
    stash.save(&paths.stash_path()).unwrap();
}

#[test]
fn offline_login_recovers_data_key() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = Arc::new(Context::new(tmp.path(), "test-key"));
    let store = LoginStore::new(ctx, USERNAME).unwrap();

    let data_key = [0xCDu8; 32];
    seed_account(&store, &data_key);

    let login = login_password(&store, PASSWORD).unwrap();
    assert_eq!(login.data_key(), data_key);

    // The recovered passwordAuth must equal the scrypt product:
    let lp = format!("{USERNAME}{PASSWORD}");
    let expected = username_snrp(false).hash(lp.as_bytes()).unwrap();
    assert_eq!(login.password_auth().unwrap(), expected);

    // The root key came out of RootKey.json:
    assert_eq!(login.root_key().unwrap().unwrap(), vec![9u8; 32]);

    // And password verification agrees:
    assert!(login_password_ok(&login, PASSWORD).unwrap());
    assert!(!login_password_ok(&login, "wrong horse").unwrap());
}

#[test]
fn wrong_password_does_not_log_in() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = Arc::new(Context::new(tmp.path(), "test-key"));
    let store = LoginStore::new(ctx, USERNAME).unwrap();

    seed_account(&store, &[0xCDu8; 32]);

    // The offline decrypt fails, and with no server reachable the online
    // fallback fails too:
    assert!(login_password(&store, "not the password").is_err());
}

#[test]
fn repo_find_reads_the_key_catalog() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = Arc::new(Context::new(tmp.path(), "test-key"));
    let store = LoginStore::new(ctx, USERNAME).unwrap();

    let data_key = [0xCDu8; 32];
    seed_account(&store, &data_key);
    let login = login_password(&store, PASSWORD).unwrap();

    // Append a wallet-type key box to the on-disk catalog:
    let repo_keys = serde_json::json!({
        "syncKey": strongbox_crypto::encoding::base64_encode(&[0xA1; 20]),
        "dataKey": strongbox_crypto::encoding::base64_encode(&[0xB2; 32]),
    });
    let key_json = serde_json::json!({
        "id": strongbox_crypto::encoding::base64_encode(&[0xC3; 32]),
        "type": "wallet:repo:bitcoin",
        "keys": repo_keys,
    });
    let mut stash = LoginStash::load(&login.paths.stash_path()).unwrap();
    stash
        .key_boxes
        .get_or_insert_with(Vec::new)
        .push(JsonBox::encrypt_json(&key_json, &data_key).unwrap());
    stash.save(&login.paths.stash_path()).unwrap();

    let repo = login.repo_find("wallet:repo:bitcoin", false).unwrap();
    assert_eq!(repo.sync_key, vec![0xA1; 20]);
    assert_eq!(repo.data_key, vec![0xB2; 32]);
}

#[test]
fn repo_find_reads_the_legacy_sync_key() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = Arc::new(Context::new(tmp.path(), "test-key"));
    let store = LoginStore::new(ctx, USERNAME).unwrap();

    let data_key = [0xCDu8; 32];
    seed_account(&store, &data_key);

    let login = login_password(&store, PASSWORD).unwrap();
    let repo = login
        .repo_find(strongbox_core::constants::REPO_TYPE_ACCOUNT, false)
        .unwrap();
    assert_eq!(repo.sync_key, vec![7u8; 20]);
    assert_eq!(repo.data_key, data_key);

    // Unknown repo types are a clean failure when creation is off:
    assert!(login.repo_find("account:repo:com.example", false).is_err());
}
