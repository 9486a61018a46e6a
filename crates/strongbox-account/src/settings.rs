//! Account settings, stored encrypted in the sync directory.
//!
//! Saving the settings also reconciles the server-side PIN login state:
//! the settings file is the source of truth for whether PIN login exists.

use serde::{Deserialize, Serialize};

use strongbox_core::{fileio, Result};
use strongbox_crypto::JsonBox;
use strongbox_login::pin::{login_pin2_delete, login_pin2_key, login_pin2_set};
use strongbox_login::Login;

use crate::account::Account;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinDenomination {
    /// 0 = BTC, 1 = mBTC, 2 = bits.
    #[serde(rename = "labeltype")]
    pub label_type: i64,
    pub satoshi: i64,
}

impl Default for BitcoinDenomination {
    fn default() -> Self {
        BitcoinDenomination {
            label_type: 2,
            satoshi: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    // Account:
    #[serde(rename = "PIN", skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    #[serde(rename = "disablePINLogin")]
    pub disable_pin_login: bool,
    #[serde(rename = "pinLoginCount")]
    pub pin_login_count: i64,
    #[serde(rename = "minutesAutoLogout")]
    pub minutes_auto_logout: i64,
    #[serde(rename = "secondsAutoLogout")]
    pub seconds_auto_logout: i64,
    #[serde(rename = "recoveryReminderCount")]
    pub recovery_reminder_count: i64,

    // Payment requests:
    #[serde(rename = "nameOnPayments")]
    pub name_on_payments: bool,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub nickname: String,

    // Spend limits:
    #[serde(rename = "spendRequirePinEnabled")]
    pub spend_require_pin_enabled: bool,
    #[serde(rename = "spendRequirePinSatoshis")]
    pub spend_require_pin_satoshis: i64,
    #[serde(rename = "dailySpendLimitEnabled")]
    pub daily_spend_limit_enabled: bool,
    #[serde(rename = "dailySpendLimitSatoshis")]
    pub daily_spend_limit_satoshis: i64,

    // Personalization:
    #[serde(rename = "advancedFeatures")]
    pub advanced_features: bool,
    #[serde(rename = "bitcoinDenomination")]
    pub bitcoin_denomination: BitcoinDenomination,
    #[serde(rename = "exchangeRateSource")]
    pub exchange_rate_source: String,
    pub language: String,
    #[serde(rename = "numCurrency")]
    pub num_currency: i64,

    // Servers:
    #[serde(rename = "overrideBitcoinServers")]
    pub override_bitcoin_servers: bool,
    #[serde(rename = "overrideBitcoinServerList")]
    pub override_bitcoin_server_list: String,
}

impl Default for AccountSettings {
    fn default() -> Self {
        AccountSettings {
            pin: None,
            disable_pin_login: false,
            pin_login_count: 0,
            minutes_auto_logout: 60,
            seconds_auto_logout: 60 * 60,
            recovery_reminder_count: 0,
            name_on_payments: false,
            first_name: String::new(),
            last_name: String::new(),
            nickname: String::new(),
            spend_require_pin_enabled: true,
            spend_require_pin_satoshis: 5_000_000,
            daily_spend_limit_enabled: false,
            daily_spend_limit_satoshis: 0,
            advanced_features: false,
            bitcoin_denomination: BitcoinDenomination::default(),
            exchange_rate_source: "Bitstamp".into(),
            language: "en".into(),
            num_currency: 840, // USD
            override_bitcoin_servers: false,
            override_bitcoin_server_list: String::new(),
        }
    }
}

/// Loads the settings file, falling back to defaults when absent.
pub fn settings_load(account: &Account) -> Result<AccountSettings> {
    let path = account.login.paths.settings_path();
    if !fileio::file_exists(&path) {
        return Ok(AccountSettings::default());
    }
    JsonBox::load(&path)?.decrypt_json(account.data_key())
}

/// Writes the settings and reconciles the PIN package with them.
pub fn settings_save(account: &Account, settings: &AccountSettings) -> Result<()> {
    let path = account.login.paths.settings_path();
    JsonBox::encrypt_json(settings, account.data_key())?.save(&path)?;

    // Update the PIN package to match:
    let mut last_pin = account.pin.lock()?;
    let pin_changed = match (&settings.pin, &*last_pin) {
        (Some(new), Some(old)) => new != old,
        (Some(_), None) => true,
        (None, _) => false,
    };
    settings_pin_sync(&account.login, settings, pin_changed)?;
    last_pin.clone_from(&settings.pin);

    Ok(())
}

/// The PIN reconciliation rule: an explicit opt-out deletes the server-side
/// PIN login; otherwise a new or changed PIN (re)installs it.
pub(crate) fn settings_pin_sync(
    login: &Login,
    settings: &AccountSettings,
    pin_changed: bool,
) -> Result<()> {
    let pin_exists = login_pin2_key(&login.paths).is_ok();

    if settings.disable_pin_login {
        // Only delete the PIN if the user explicitly asked for that:
        if pin_exists {
            if let Err(err) = login_pin2_delete(login) {
                tracing::warn!("PIN delete failed: {err}");
            }
        }
    } else if let Some(pin) = &settings.pin {
        if !pin_exists || pin_changed {
            login_pin2_set(login, pin)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = AccountSettings::default();
        assert_eq!(settings.minutes_auto_logout, 60);
        assert_eq!(settings.bitcoin_denomination.satoshi, 100);
        assert!(!settings.disable_pin_login);
        assert!(settings.pin.is_none());
    }

    #[test]
    fn json_field_names_are_the_storage_format() {
        let settings = AccountSettings {
            pin: Some("1234".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["PIN"], "1234");
        assert_eq!(value["disablePINLogin"], false);
        assert!(value["bitcoinDenomination"]["labeltype"].is_i64());
    }
}
