//! Post-login account state: the wallet catalog, settings, plugin storage,
//! and the process-global login cache.

pub mod account;
pub mod cache;
pub mod plugin;
pub mod settings;
pub mod sync;
pub mod wallets;

pub use account::Account;
pub use settings::AccountSettings;
pub use wallets::WalletList;
