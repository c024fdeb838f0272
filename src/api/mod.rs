//! Resource client for the chat backend

pub mod client;
pub mod models;

pub use client::{ApiClient, ResourceApi};
pub use models::{Chat, ChatMember, Gender, Identity, Lookup, Message, UiLanguage};
