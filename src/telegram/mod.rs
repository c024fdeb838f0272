//! Telegram host integration: init data and the identity bridge

pub mod init_data;
pub mod provider;

pub use init_data::{Credential, InitData};
pub use provider::{EnvInitData, IdentityProvider, InitDataBridge, StaticInitData};
