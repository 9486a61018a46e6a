//! Account construction and settings over a hand-seeded offline login.

use std::sync::Arc;

use serde_json::json;
use strongbox_core::Context;
use strongbox_crypto::{username_snrp, JsonBox, Snrp};
use strongbox_login::packages::{CarePackage, LoginPackage};
use strongbox_login::password::login_password;
use strongbox_login::stash::LoginStash;
use strongbox_login::{Login, LoginStore};

use strongbox_account::settings::{settings_load, settings_save, AccountSettings};
use strongbox_account::sync::{LocalSync, SyncRepo};
use strongbox_account::Account;

const USERNAME: &str = "william test";
const PASSWORD: &str = "open sesame";
const DATA_KEY: [u8; 32] = [0xCD; 32];

fn seed_login(root: &std::path::Path) -> Arc<Login> {
    let ctx = Arc::new(Context::new(root, "test-key"));
    let store = LoginStore::new(ctx, USERNAME).unwrap();
    let paths = store.paths(true).unwrap();
    let lp = format!("{USERNAME}{PASSWORD}");

    let snrp = Snrp {
        salt: vec![0x42; 32],
        n: 1024,
        r: 1,
        p: 1,
    };
    let password_key = snrp.hash(lp.as_bytes()).unwrap();
    let password_auth = username_snrp(false).hash(lp.as_bytes()).unwrap();

    CarePackage {
        password_key_snrp: Some(snrp),
        ..Default::default()
    }
    .save(&paths.care_package_path())
    .unwrap();

    let login_pkg = LoginPackage {
        password_box: Some(JsonBox::encrypt(&DATA_KEY, &password_key).unwrap()),
        password_auth_box: Some(JsonBox::encrypt(&password_auth, &DATA_KEY).unwrap()),
        sync_key_box: Some(JsonBox::encrypt(&[7u8; 20], &DATA_KEY).unwrap()),
        ..Default::default()
    };
    login_pkg.save(&paths.login_package_path()).unwrap();

    JsonBox::encrypt(&[9u8; 32], &DATA_KEY)
        .unwrap()
        .save(&paths.root_key_path())
        .unwrap();

    LoginStash {
        sync_key_box: login_pkg.sync_key_box.clone(),
        ..Default::default()
    }
    .save(&paths.stash_path())
    .unwrap();

    login_password(&store, PASSWORD).unwrap()
}

#[test]
fn account_over_offline_login() {
    let tmp = tempfile::tempdir().unwrap();
    let login = seed_login(tmp.path());
    let account = Account::new(login).unwrap();

    // The account repo is the legacy synthesis, so its dataKey is the
    // login's own:
    assert_eq!(account.data_key(), DATA_KEY);
    assert_eq!(account.sync_key(), [7u8; 20]);
    assert!(account.dir().ends_with("sync"));

    // Wallet catalog works end to end:
    account.wallets.insert("w1", &json!({})).unwrap();
    account.wallets.insert("w2", &json!({})).unwrap();
    account.wallets.reorder("w1", 5).unwrap();
    let ids: Vec<String> = account
        .wallets
        .list()
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(ids, vec!["w2", "w1"]);

    // Settings round-trip without a PIN (no server involved):
    let mut settings = AccountSettings::default();
    settings.language = "pt".into();
    settings_save(&account, &settings).unwrap();

    let loaded = settings_load(&account).unwrap();
    assert_eq!(loaded.language, "pt");

    // The settings file itself is an opaque box:
    let raw = std::fs::read_to_string(account.login.paths.settings_path()).unwrap();
    assert!(!raw.contains("language"));

    // A clean sync leaves everything in place:
    let dirty = account.sync(&LocalSync).unwrap();
    assert!(!dirty);
    assert_eq!(account.wallets.list().unwrap().len(), 2);
}
